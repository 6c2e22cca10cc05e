/*
 * The closed set of label categories the annotation tool can emit, and the categories agreement
 * is reported on. `UC-step` and `UC-DataPractice` are scored together as a single category.
*/
use enum_iterator::{all, Sequence};
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::str::FromStr;
use thiserror::Error;

/// A label category an annotator can apply to a span of a scenario.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Sequence, Serialize, Deserialize,
)]
pub enum Label {
    #[serde(rename = "UC-System")]
    System,
    #[serde(rename = "UC-Name")]
    Name,
    #[serde(rename = "UC-Goal")]
    Goal,
    #[serde(rename = "UC-User")]
    User,
    #[serde(rename = "UC-step")]
    Step,
    #[serde(rename = "UC-DataPractice")]
    DataPractice,
    #[serde(rename = "UC-ExternalEntity")]
    ExternalEntity,
}

impl Label {
    /// Name of the label, as written by the annotation tool.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "UC-System",
            Self::Name => "UC-Name",
            Self::Goal => "UC-Goal",
            Self::User => "UC-User",
            Self::Step => "UC-step",
            Self::DataPractice => "UC-DataPractice",
            Self::ExternalEntity => "UC-ExternalEntity",
        }
    }

    /// Every recognized label, in declaration order.
    pub fn iter() -> impl Iterator<Item = Label> {
        all::<Label>()
    }
}

impl Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown label category `{0}`")]
pub struct UnknownLabelError(pub String);

/// Labels are matched exactly. The annotation tool is consistent about casing (note `UC-step`), so
/// no normalization is attempted.
impl FromStr for Label {
    type Err = UnknownLabelError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Label::iter()
            .find(|label| label.as_str() == s)
            .ok_or_else(|| UnknownLabelError(String::from(s)))
    }
}

/// Category on which agreement is computed. Each one is backed by one or more `Label`s; when
/// there are several, a character is rated 1 if any of them marks it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Sequence, Serialize, Deserialize,
)]
pub enum ScoringCategory {
    #[serde(rename = "UC-System")]
    System,
    #[serde(rename = "UC-Name")]
    Name,
    #[serde(rename = "UC-Goal")]
    Goal,
    #[serde(rename = "UC-User")]
    User,
    #[serde(rename = "UC-step+DataPractice")]
    StepOrDataPractice,
    #[serde(rename = "UC-ExternalEntity")]
    ExternalEntity,
}

impl ScoringCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "UC-System",
            Self::Name => "UC-Name",
            Self::Goal => "UC-Goal",
            Self::User => "UC-User",
            Self::StepOrDataPractice => "UC-step+DataPractice",
            Self::ExternalEntity => "UC-ExternalEntity",
        }
    }

    /// Labels merged into this category.
    pub fn labels(&self) -> &'static [Label] {
        match self {
            Self::System => &[Label::System],
            Self::Name => &[Label::Name],
            Self::Goal => &[Label::Goal],
            Self::User => &[Label::User],
            Self::StepOrDataPractice => &[Label::Step, Label::DataPractice],
            Self::ExternalEntity => &[Label::ExternalEntity],
        }
    }

    pub fn iter() -> impl Iterator<Item = ScoringCategory> {
        all::<ScoringCategory>()
    }
}

impl Display for ScoringCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
