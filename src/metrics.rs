use crate::config::{AgreementConfig, AggregationPolicy};
use crate::label::ScoringCategory;
use crate::reporter::{CategoryKappa, Reporter};
use crate::scenario::Scenario;
use ndarray::prelude::*;
use ndarray::ScalarOperand;
use num::{Float, NumCast};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::fmt::Debug;
use thiserror::Error;

/// Internal extension trait for Num's Float trait
pub trait FloatExt: Float + Send + Sync + Clone + ScalarOperand + Debug {}

impl<T: Float + Send + Sync + Clone + Copy + ScalarOperand + Debug> FloatExt for T {}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// Errors raised on rating tables that kappa cannot be computed on.
pub enum KappaError {
    #[error("rating row {row} has length {found}, expected {expected}")]
    DimensionMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("at least 2 raters are needed to compute an agreement, found {0}")]
    InsufficientRaters(usize),
    #[error("rating rows are empty")]
    EmptyRatings,
    #[error("item {item} was rated by {found} raters, expected {expected}")]
    UnevenRaters {
        item: usize,
        expected: usize,
        found: usize,
    },
}

#[inline(always)]
fn to_float<F: FloatExt>(value: usize) -> F {
    <F as NumCast>::from(value).unwrap_or_else(F::nan)
}

/// Tallies a rater-major binary table into an `items x 2` count matrix. Column 0 counts the
/// raters who rated the item 0, column 1 those who rated it 1 (any non-zero rating counts as 1).
fn rating_counts<R: AsRef<[u8]>>(table: &[R]) -> Result<Array2<usize>, KappaError> {
    let raters = table.len();
    if raters < 2 {
        return Err(KappaError::InsufficientRaters(raters));
    }
    let items = table[0].as_ref().len();
    for (row, ratings) in table.iter().enumerate() {
        let found = ratings.as_ref().len();
        if found != items {
            return Err(KappaError::DimensionMismatch {
                row,
                expected: items,
                found,
            });
        }
    }
    if items == 0 {
        return Err(KappaError::EmptyRatings);
    }
    let ratings = Array2::from_shape_fn((raters, items), |(r, i)| table[r].as_ref()[i] != 0);
    let mut counts = Array2::zeros((items, 2));
    for (item, votes) in ratings.t().axis_iter(Axis(0)).enumerate() {
        let ones = votes.iter().filter(|v| **v).count();
        counts[[item, 0]] = raters - ones;
        counts[[item, 1]] = ones;
    }
    Ok(counts)
}

/// Fleiss' kappa of an `items x categories` count matrix in which every row sums to the same
/// number of raters, at least 2.
///
/// When every rating falls in a single category the expected agreement is 1 and the statistic is
/// 0/0; the raters then agree perfectly and 1 is returned.
pub fn fleiss_kappa<F: FloatExt>(counts: ArrayView2<usize>) -> Result<F, KappaError> {
    let items = counts.nrows();
    if items == 0 || counts.ncols() == 0 {
        return Err(KappaError::EmptyRatings);
    }
    let raters = counts.row(0).sum();
    if raters < 2 {
        return Err(KappaError::InsufficientRaters(raters));
    }
    for (item, row) in counts.outer_iter().enumerate() {
        let found = row.sum();
        if found != raters {
            return Err(KappaError::UnevenRaters {
                item,
                expected: raters,
                found,
            });
        }
    }
    let n = to_float::<F>(raters);
    let total = to_float::<F>(items) * n;

    let category_share = counts
        .sum_axis(Axis(0))
        .mapv(|c| to_float::<F>(c) / total);
    let expected = category_share.mapv(|p| p * p).sum();

    let per_item = counts.map_axis(Axis(1), |row| {
        let squares = row
            .iter()
            .fold(F::zero(), |acc, c| acc + to_float::<F>(*c) * to_float::<F>(*c));
        (squares - n) / (n * (n - F::one()))
    });
    let observed = per_item.sum() / to_float::<F>(items);

    let chance = F::one() - expected;
    if chance.abs() <= F::epsilon() {
        return Ok(F::one());
    }
    Ok((observed - expected) / chance)
}

/// Fleiss' kappa of a rating table: one row per rater, one binary rating per item.
///
/// * `table`: Rows of equal length, at least two of them.
///
/// # Example
/// ```rust
/// use crowdkappa::compute_kappa;
///
/// let table: Vec<Vec<u8>> = vec![vec![1, 1, 0, 0], vec![1, 1, 0, 0], vec![1, 1, 0, 0]];
/// let kappa = compute_kappa(&table).unwrap();
/// assert!((kappa - 1.0).abs() < 1e-12);
/// ```
pub fn compute_kappa<R: AsRef<[u8]>>(table: &[R]) -> Result<f64, KappaError> {
    let counts = rating_counts(table)?;
    fleiss_kappa::<f64>(counts.view())
}

/// Kappa of every scoring category of a scenario.
pub fn scenario_kappas(
    scenario: &Scenario,
) -> Result<BTreeMap<ScoringCategory, f64>, KappaError> {
    ScoringCategory::iter()
        .map(|category| {
            let table = scenario.scoring_ratings(category);
            compute_kappa(&table).map(|kappa| (category, kappa))
        })
        .collect()
}

/// Kappas of a single scenario, along with the number of workers who produced them.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScenarioScore {
    pub(crate) workers: usize,
    pub(crate) kappas: Result<BTreeMap<ScoringCategory, f64>, KappaError>,
}

impl From<&Scenario> for ScenarioScore {
    fn from(scenario: &Scenario) -> Self {
        Self {
            workers: scenario.worker_count(),
            kappas: scenario_kappas(scenario),
        }
    }
}

/// Averages per-scenario kappas into a report, following `policy`. Scenarios whose kappa could
/// not be computed are counted as skipped and left out.
pub(crate) fn reduce_scores(scores: &[ScenarioScore], policy: AggregationPolicy) -> Reporter {
    let mut sums: BTreeMap<ScoringCategory, f64> =
        ScoringCategory::iter().map(|c| (c, 0.0)).collect();
    let mut scored = 0;
    let mut excluded = 0;
    let mut skipped = 0;
    for (index, score) in scores.iter().enumerate() {
        if let AggregationPolicy::QuorumNormalized { workers, .. } = policy {
            if score.workers != workers {
                log::debug!(
                    "Scenario #{} has {} workers instead of {}, excluded",
                    index,
                    score.workers,
                    workers
                );
                excluded += 1;
                continue;
            }
        }
        match &score.kappas {
            Ok(kappas) => {
                log::debug!("Scenario #{} kappas: {:?}", index, kappas);
                for (category, kappa) in kappas.iter() {
                    if let Some(sum) = sums.get_mut(category) {
                        *sum += kappa;
                    }
                }
                scored += 1;
            }
            Err(err) => {
                log::warn!("Skipping scenario #{}: {}", index, err);
                skipped += 1;
            }
        }
    }

    let mut reporter = Reporter::new(policy, scored, excluded, skipped);
    let averaged: Option<(f64, f64)> = match policy {
        AggregationPolicy::RunningMean if scored == 0 => None,
        AggregationPolicy::RunningMean => Some((0.0, scored as f64)),
        AggregationPolicy::QuorumNormalized {
            quota, pass_credit, ..
        } => {
            let missing = quota.saturating_sub(scored);
            let padding = pass_credit * missing as f64;
            Some((padding, quota.max(scored) as f64))
        }
    };
    if let Some((padding, denominator)) = averaged {
        for (category, sum) in sums.into_iter() {
            reporter.insert(CategoryKappa {
                category,
                kappa: (sum + padding) / denominator,
                scenarios: scored,
            });
        }
    }
    reporter
}

/// Computes the kappa of every scenario and averages them according to the configured policy.
/// With `parallel` set, the per-scenario kappas are computed on the rayon thread pool; the
/// reduction always runs in scenario order, so both paths give the same report.
pub fn aggregate_kappa(scenarios: &[Scenario], config: &AgreementConfig) -> Reporter {
    let scores: Vec<ScenarioScore> = if config.parallel() {
        scenarios.par_iter().map(ScenarioScore::from).collect()
    } else {
        scenarios.iter().map(ScenarioScore::from).collect()
    };
    let reporter = reduce_scores(&scores, config.policy());
    log::info!(
        "Aggregated {} scenarios: {} scored, {} excluded, {} skipped",
        scenarios.len(),
        reporter.scored(),
        reporter.excluded(),
        reporter.skipped()
    );
    reporter
}
