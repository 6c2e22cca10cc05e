/*
 * This module contains the configuration of the agreement computation. The `AgreementConfig`
 * struct selects how per-scenario kappas are averaged, how overlapping entities are vectorized and
 * whether scenarios are scored in parallel. It is built with `AgreementConfigBuilder`, either from
 * scratch or starting from a TOML file.
*/
use crate::annotation::{OverlapStrategy, ParsingOverlapStrategyError};
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display};
use std::fs::read_to_string;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Number of scenarios the quorum-normalized average is computed over.
pub const DEFAULT_QUOTA: usize = 50;
/// Number of workers a scenario needs to count toward the quorum-normalized average.
pub const DEFAULT_WORKERS: usize = 3;
/// Kappa credited for each scenario missing from the quota.
pub const DEFAULT_PASS_CREDIT: f64 = 1.0;

/// How per-scenario kappas are combined into a corpus-wide kappa.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum AggregationPolicy {
    /// Arithmetic mean over every scenario whose kappa could be computed.
    RunningMean,
    /// Only scenarios with exactly `workers` workers contribute. Each scenario missing to reach
    /// `quota` adds `pass_credit`, and the sum is divided by the larger of `quota` and the number
    /// of contributing scenarios.
    QuorumNormalized {
        quota: usize,
        workers: usize,
        pass_credit: f64,
    },
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        Self::RunningMean
    }
}

impl Display for AggregationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RunningMean => write!(f, "running mean"),
            Self::QuorumNormalized {
                quota,
                workers,
                pass_credit,
            } => write!(
                f,
                "quorum normalized (quota: {}, workers: {}, pass credit: {})",
                quota, workers, pass_credit
            ),
        }
    }
}

/// Name of an aggregation policy, without its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    Mean,
    Quorum,
}

impl FromStr for PolicyKind {
    type Err = ConfigError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_ref() {
            "mean" | "runningmean" | "running-mean" => Ok(Self::Mean),
            "quorum" | "quorumnormalized" | "quorum-normalized" => Ok(Self::Quorum),
            _ => Err(ConfigError::UnknownPolicy(String::from(s))),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("the quota must be at least 1")]
    InvalidQuota,
    #[error("at least 2 workers per scenario are needed to compute an agreement, got {0}")]
    InvalidWorkers(usize),
    #[error("the pass credit must be a finite number, got {0}")]
    InvalidPassCredit(f64),
    #[error("unknown aggregation policy `{0}` (expected `mean` or `quorum`)")]
    UnknownPolicy(String),
    #[error(transparent)]
    UnknownOverlap(#[from] ParsingOverlapStrategyError),
    #[error("could not read the configuration file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),
}

#[derive(Clone, Debug, PartialEq)]
/// Parameters of an agreement computation. It implements the default trait: running mean, last
/// write wins, sequential.
pub struct AgreementConfig {
    /// How per-scenario kappas are averaged.
    policy: AggregationPolicy,
    /// How entities of the same label are combined within a worker.
    overlap: OverlapStrategy,
    /// Can we use multiple cores to score the scenarios? Each scenario is cheap, so this only
    /// pays off on large corpora.
    parallel: bool,
}

impl Default for AgreementConfig {
    fn default() -> Self {
        Self {
            policy: AggregationPolicy::default(),
            overlap: OverlapStrategy::default(),
            parallel: false,
        }
    }
}

impl AgreementConfig {
    pub fn policy(&self) -> AggregationPolicy {
        self.policy
    }
    pub fn overlap(&self) -> OverlapStrategy {
        self.overlap
    }
    pub fn parallel(&self) -> bool {
        self.parallel
    }
}

impl Display for AgreementConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Aggregation policy: {}\n Overlapping entities: {}\n Using parallel computations: {}",
            self.policy, self.overlap, self.parallel
        )
    }
}

/// Configuration as written in a TOML file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    pub policy: Option<String>,
    pub quota: Option<usize>,
    pub workers: Option<usize>,
    pub pass_credit: Option<f64>,
    pub overlap: Option<String>,
    pub parallel: Option<bool>,
}

/// This builder can be used to build and customize an `AgreementConfig` structure. Settings are
/// only validated by `build`.
#[derive(Debug, Clone, PartialEq)]
pub struct AgreementConfigBuilder {
    policy: PolicyKind,
    quota: usize,
    workers: usize,
    pass_credit: f64,
    overlap: OverlapStrategy,
    parallel: bool,
}

impl Default for AgreementConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AgreementConfigBuilder {
    pub fn new() -> Self {
        Self {
            policy: PolicyKind::Mean,
            quota: DEFAULT_QUOTA,
            workers: DEFAULT_WORKERS,
            pass_credit: DEFAULT_PASS_CREDIT,
            overlap: OverlapStrategy::default(),
            parallel: false,
        }
    }
    pub fn policy(mut self, policy: PolicyKind) -> Self {
        self.policy = policy;
        self
    }
    pub fn quota(mut self, quota: usize) -> Self {
        self.quota = quota;
        self
    }
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
    pub fn pass_credit(mut self, pass_credit: f64) -> Self {
        self.pass_credit = pass_credit;
        self
    }
    pub fn overlap(mut self, overlap: OverlapStrategy) -> Self {
        self.overlap = overlap;
        self
    }
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Overrides the current settings with the keys present in `file`.
    pub fn merge_file(mut self, file: ConfigFile) -> Result<Self, ConfigError> {
        if let Some(policy) = file.policy {
            self.policy = PolicyKind::from_str(&policy)?;
        }
        if let Some(overlap) = file.overlap {
            self.overlap = OverlapStrategy::from_str(&overlap)?;
        }
        self.quota = file.quota.unwrap_or(self.quota);
        self.workers = file.workers.unwrap_or(self.workers);
        self.pass_credit = file.pass_credit.unwrap_or(self.pass_credit);
        self.parallel = file.parallel.unwrap_or(self.parallel);
        Ok(self)
    }

    /// Starts from the default settings overridden by the TOML file at `path`.
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let file: ConfigFile = toml::from_str(content)?;
        Self::new().merge_file(file)
    }

    pub fn build(self) -> Result<AgreementConfig, ConfigError> {
        let policy = match self.policy {
            PolicyKind::Mean => AggregationPolicy::RunningMean,
            PolicyKind::Quorum => {
                if self.quota == 0 {
                    return Err(ConfigError::InvalidQuota);
                }
                if self.workers < 2 {
                    return Err(ConfigError::InvalidWorkers(self.workers));
                }
                if !self.pass_credit.is_finite() {
                    return Err(ConfigError::InvalidPassCredit(self.pass_credit));
                }
                AggregationPolicy::QuorumNormalized {
                    quota: self.quota,
                    workers: self.workers,
                    pass_credit: self.pass_credit,
                }
            }
        };
        Ok(AgreementConfig {
            policy,
            overlap: self.overlap,
            parallel: self.parallel,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_default_config() {
        let config = AgreementConfigBuilder::default().build().unwrap();
        assert_eq!(config, AgreementConfig::default());
        assert_eq!(config.policy(), AggregationPolicy::RunningMean);
        assert_eq!(config.overlap(), OverlapStrategy::LastWriteWins);
        assert!(!config.parallel());
    }

    #[test]
    fn test_builder_quorum() {
        let config = AgreementConfigBuilder::default()
            .policy(PolicyKind::Quorum)
            .quota(20)
            .workers(4)
            .pass_credit(0.5)
            .build()
            .unwrap();
        assert_eq!(
            config.policy(),
            AggregationPolicy::QuorumNormalized {
                quota: 20,
                workers: 4,
                pass_credit: 0.5
            }
        );
    }

    #[rstest]
    #[case(OverlapStrategy::LastWriteWins)]
    #[case(OverlapStrategy::Union)]
    fn test_builder_setters_overlap(#[case] overlap: OverlapStrategy) {
        let config = AgreementConfigBuilder::default()
            .overlap(overlap)
            .build()
            .unwrap();
        assert_eq!(config.overlap(), overlap)
    }

    #[rstest]
    #[case(true)]
    #[case(false)]
    fn test_builder_setters_parallel(#[case] parallel: bool) {
        let config = AgreementConfigBuilder::default()
            .parallel(parallel)
            .build()
            .unwrap();
        assert_eq!(config.parallel(), parallel)
    }

    #[test]
    fn test_invalid_quorum_settings() {
        let quorum = AgreementConfigBuilder::default().policy(PolicyKind::Quorum);
        assert!(matches!(
            quorum.clone().quota(0).build(),
            Err(ConfigError::InvalidQuota)
        ));
        assert!(matches!(
            quorum.clone().workers(1).build(),
            Err(ConfigError::InvalidWorkers(1))
        ));
        assert!(matches!(
            quorum.pass_credit(f64::NAN).build(),
            Err(ConfigError::InvalidPassCredit(_))
        ));
    }

    #[test]
    fn test_quorum_settings_are_ignored_by_the_mean() {
        let config = AgreementConfigBuilder::default().quota(0).build().unwrap();
        assert_eq!(config.policy(), AggregationPolicy::RunningMean);
    }

    #[rstest]
    #[case("mean", PolicyKind::Mean)]
    #[case("Running-Mean", PolicyKind::Mean)]
    #[case("quorum", PolicyKind::Quorum)]
    #[case("QuorumNormalized", PolicyKind::Quorum)]
    fn test_parse_policy(#[case] input: &str, #[case] expected: PolicyKind) {
        assert_eq!(PolicyKind::from_str(input).unwrap(), expected);
    }

    #[test]
    fn test_unknown_policy() {
        assert!(matches!(
            PolicyKind::from_str("median"),
            Err(ConfigError::UnknownPolicy(p)) if p == "median"
        ));
    }

    #[test]
    fn test_from_toml() {
        let content = r#"
            policy = "quorum"
            quota = 10
            overlap = "union"
            parallel = true
        "#;
        let config = AgreementConfigBuilder::from_toml_str(content)
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(
            config.policy(),
            AggregationPolicy::QuorumNormalized {
                quota: 10,
                workers: DEFAULT_WORKERS,
                pass_credit: DEFAULT_PASS_CREDIT
            }
        );
        assert_eq!(config.overlap(), OverlapStrategy::Union);
        assert!(config.parallel());
    }

    #[test]
    fn test_toml_unknown_key_is_rejected() {
        let res = AgreementConfigBuilder::from_toml_str("quorum = 3");
        assert!(matches!(res, Err(ConfigError::Toml(_))));
    }

    #[test]
    fn test_missing_toml_file() {
        let res = AgreementConfigBuilder::from_toml_file("does/not/exist.toml");
        assert!(matches!(res, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_display() {
        let config = AgreementConfig::default();
        assert_eq!(
            config.to_string(),
            "Aggregation policy: running mean\n Overlapping entities: last-write-wins\n Using parallel computations: false"
        );
    }
}
