/*!
This library measures how much crowd workers agree when they label spans of text. Each worker of a
scenario marks entities (a label and a character span) on the scenario's text. The entities are
turned into one binary vector per label, as long as the scenario, and the vectors of all the
workers are compared with Fleiss' kappa. The per-scenario kappas are then averaged over the corpus.

# Labels
The closed set of labels is `UC-System`, `UC-Name`, `UC-Goal`, `UC-User`, `UC-step`,
`UC-DataPractice` and `UC-ExternalEntity`. Any other label is rejected. For scoring, `UC-step` and
`UC-DataPractice` are merged into a single category: a character is rated 1 when either label
marks it.

# Offsets
The annotation tool reports offsets shifted from the character positions of the scenario. An
entity spanning `[start, end)` marks the positions `i` such that `start - 2 < i < end - 1`. Within
a worker, entities are applied in ascending start offset and, by default, each entity rewrites the
whole vector of its label (see `OverlapStrategy`).

# Aggregation
* `AggregationPolicy::RunningMean`: the arithmetic mean of the kappas of every scenario.
* `AggregationPolicy::QuorumNormalized`: only scenarios annotated by exactly `workers` workers
    count. Each scenario missing to reach `quota` is credited `pass_credit`, and the padded sum is
    divided by the quota (or by the number of scored scenarios, when it exceeds the quota).

# Terminology
* A scenario is one text submitted to the workers, along with their annotations.
* A rating table holds one row per worker and one column per character of the scenario, for a
    single scoring category.
*/

mod annotation;
mod config;
mod label;
mod loader;
mod metrics;
mod reporter;
mod scenario;
pub mod schema;

// The public api starts here
pub use annotation::{
    label_spans, AnnotationError, Entity, LabelVectors, OverlapStrategy,
    ParsingOverlapStrategyError, SpanVectorizer, WorkerAnnotation,
};

pub use config::{
    AgreementConfig, AgreementConfigBuilder, AggregationPolicy, ConfigError, ConfigFile,
    PolicyKind, DEFAULT_PASS_CREDIT, DEFAULT_QUOTA, DEFAULT_WORKERS,
};

pub use label::{Label, ScoringCategory, UnknownLabelError};

pub use loader::{load_file, load_paths, Corpus, LoadError};

pub use metrics::{
    aggregate_kappa, compute_kappa, fleiss_kappa, scenario_kappas, FloatExt, KappaError,
};

pub use reporter::{CategoryKappa, Reporter};

pub use scenario::{Scenario, ScenarioAnnotations, WorkerVectors};

pub use schema::{RawEntity, ScenarioRecord, WorkerRecord};

/// Builds a `Scenario` out of every record. Records that fail (unknown label, malformed worker)
/// are logged and counted instead of stopping the whole corpus.
///
/// * `records`: Records as read from the export.
/// * `overlap`: How entities of the same label combine within a worker.
pub fn build_scenarios(
    records: &[ScenarioRecord],
    overlap: OverlapStrategy,
) -> (Vec<Scenario>, usize) {
    let mut failed = 0;
    let scenarios = records
        .iter()
        .enumerate()
        .filter_map(|(index, record)| match Scenario::try_from_record(record, overlap) {
            Ok(scenario) => Some(scenario),
            Err(err) => {
                log::warn!("Skipping record #{}: {}", index, err);
                failed += 1;
                None
            }
        })
        .collect();
    (scenarios, failed)
}

/// Main entrypoint of the library. Builds the scenarios of `records` and averages their kappas
/// following `config`. Records that could not be turned into a scenario are counted as skipped
/// in the report.
///
/// * `records`: Records as read from the export.
/// * `config`: Aggregation policy, overlap strategy and parallelism.
///
/// #Example
/// ```rust
/// use crowdkappa::{agreement_report, AgreementConfigBuilder, RawEntity, ScenarioRecord,
/// ScoringCategory, WorkerRecord};
///
/// let workers = vec![
///     WorkerRecord::new("w1", vec![RawEntity::new("UC-System", 2, 4)]).to_value(),
///     WorkerRecord::new("w2", vec![RawEntity::new("UC-System", 2, 4)]).to_value(),
/// ];
/// let records = vec![ScenarioRecord::new("\"ABCDE\"", workers)];
/// let config = AgreementConfigBuilder::default().build().unwrap();
///
/// let reporter = agreement_report(&records, &config);
/// assert_eq!(reporter.scored(), 1);
/// assert_eq!(reporter.get(ScoringCategory::System), Some(1.0));
/// ```
pub fn agreement_report(records: &[ScenarioRecord], config: &AgreementConfig) -> Reporter {
    let (scenarios, failed) = build_scenarios(records, config.overlap());
    aggregate_kappa(&scenarios, config).with_skipped(failed)
}
