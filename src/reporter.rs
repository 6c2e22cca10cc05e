use crate::config::AggregationPolicy;
use crate::label::ScoringCategory;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;
use std::ops::Deref;

/// Corpus-wide agreement: one averaged kappa per scoring category, along with how many scenarios
/// went into it.
#[derive(Debug, Clone, Serialize)]
pub struct Reporter {
    categories: BTreeSet<CategoryKappa>,
    policy: AggregationPolicy,
    scored: usize,
    excluded: usize,
    skipped: usize,
}

impl Deref for Reporter {
    type Target = BTreeSet<CategoryKappa>;
    fn deref(&self) -> &Self::Target {
        &self.categories
    }
}

/// Two reports are equal when they hold the same categories with the same kappas and counts.
impl PartialEq for Reporter {
    fn eq(&self, other: &Self) -> bool {
        self.policy == other.policy
            && self.scored == other.scored
            && self.excluded == other.excluded
            && self.skipped == other.skipped
            && self.categories.len() == other.categories.len()
            && self
                .categories
                .iter()
                .zip(other.categories.iter())
                .all(|(a, b)| {
                    a.category == b.category && a.kappa == b.kappa && a.scenarios == b.scenarios
                })
    }
}

/// Averaged kappa of one scoring category. Ordered and compared by category only, so a report
/// holds at most one entry per category.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CategoryKappa {
    pub category: ScoringCategory,
    pub kappa: f64,
    pub scenarios: usize,
}

impl PartialEq for CategoryKappa {
    fn eq(&self, other: &Self) -> bool {
        self.category == other.category
    }
}
impl Eq for CategoryKappa {}

impl PartialOrd for CategoryKappa {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for CategoryKappa {
    fn cmp(&self, other: &Self) -> Ordering {
        self.category.cmp(&other.category)
    }
}

impl Reporter {
    pub fn new(policy: AggregationPolicy, scored: usize, excluded: usize, skipped: usize) -> Self {
        Self {
            categories: BTreeSet::new(),
            policy,
            scored,
            excluded,
            skipped,
        }
    }

    /// Adds the kappa of a category, replacing any previous value for it.
    pub(crate) fn insert(&mut self, category_kappa: CategoryKappa) {
        self.categories.replace(category_kappa);
    }

    pub fn get(&self, category: ScoringCategory) -> Option<f64> {
        self.categories
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.kappa)
    }

    pub fn policy(&self) -> AggregationPolicy {
        self.policy
    }
    /// Scenarios whose kappas went into the averages.
    pub fn scored(&self) -> usize {
        self.scored
    }
    /// Scenarios left out by the policy because of their worker count.
    pub fn excluded(&self) -> usize {
        self.excluded
    }
    /// Scenarios whose kappa could not be computed, or that could not be built at all.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Adds `count` scenarios that failed before reaching the kappa computation.
    pub fn with_skipped(mut self, count: usize) -> Self {
        self.skipped += count;
        self
    }

    /// Category name to kappa.
    pub fn kappas(&self) -> BTreeMap<String, f64> {
        self.categories
            .iter()
            .map(|c| (c.category.to_string(), c.kappa))
            .collect()
    }
}

impl From<Reporter> for BTreeMap<ScoringCategory, f64> {
    fn from(reporter: Reporter) -> Self {
        reporter
            .categories
            .into_iter()
            .map(|c| (c.category, c.kappa))
            .collect()
    }
}

impl Display for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Category, Kappa, Scenarios")?;
        for c in self.categories.iter() {
            writeln!(f, "{}, {:.4}, {}", c.category, c.kappa, c.scenarios)?;
        }
        write!(
            f,
            "Scenarios scored: {}, excluded: {}, skipped: {}",
            self.scored, self.excluded, self.skipped
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reporter() -> Reporter {
        let mut reporter = Reporter::new(AggregationPolicy::RunningMean, 4, 0, 1);
        for (category, kappa) in [
            (ScoringCategory::User, 0.25),
            (ScoringCategory::System, 0.5),
            (ScoringCategory::ExternalEntity, -0.125),
        ] {
            reporter.insert(CategoryKappa {
                category,
                kappa,
                scenarios: 4,
            });
        }
        reporter
    }

    #[test]
    fn test_categories_are_ordered() {
        let reporter = reporter();
        let order: Vec<ScoringCategory> = reporter.iter().map(|c| c.category).collect();
        assert_eq!(
            order,
            vec![
                ScoringCategory::System,
                ScoringCategory::User,
                ScoringCategory::ExternalEntity
            ]
        );
    }

    #[test]
    fn test_insert_replaces() {
        let mut reporter = reporter();
        reporter.insert(CategoryKappa {
            category: ScoringCategory::User,
            kappa: 0.75,
            scenarios: 4,
        });
        assert_eq!(reporter.len(), 3);
        assert_eq!(reporter.get(ScoringCategory::User), Some(0.75));
        assert_eq!(reporter.get(ScoringCategory::Goal), None);
    }

    #[test]
    fn test_reports_with_different_kappas_differ() {
        let mut low = Reporter::new(AggregationPolicy::RunningMean, 1, 0, 0);
        let mut high = low.clone();
        for (reporter, kappa) in [(&mut low, 0.1), (&mut high, 0.9)] {
            reporter.insert(CategoryKappa {
                category: ScoringCategory::Goal,
                kappa,
                scenarios: 1,
            });
        }
        assert_ne!(low, high);
        assert_eq!(low, low.clone());
        assert_ne!(reporter(), reporter().with_skipped(1));
    }

    #[test]
    fn test_with_skipped() {
        let reporter = reporter().with_skipped(2);
        assert_eq!(reporter.skipped(), 3);
        assert_eq!(reporter.scored(), 4);
    }

    #[test]
    fn test_kappas_by_name() {
        let kappas = reporter().kappas();
        assert_eq!(kappas.get("UC-System"), Some(&0.5));
        assert_eq!(kappas.get("UC-ExternalEntity"), Some(&-0.125));
        let by_category: BTreeMap<ScoringCategory, f64> = reporter().into();
        assert_eq!(by_category.len(), 3);
    }

    #[test]
    fn test_display() {
        let expected = "Category, Kappa, Scenarios\n\
                        UC-System, 0.5000, 4\n\
                        UC-User, 0.2500, 4\n\
                        UC-ExternalEntity, -0.1250, 4\n\
                        Scenarios scored: 4, excluded: 0, skipped: 1";
        assert_eq!(reporter().to_string(), expected);
    }

    #[test]
    fn test_serialize() {
        let value = serde_json::to_value(reporter()).unwrap();
        assert_eq!(value["scored"], 4);
        assert_eq!(value["policy"], "RunningMean");
        assert_eq!(value["categories"][0]["category"], "UC-System");
    }
}
