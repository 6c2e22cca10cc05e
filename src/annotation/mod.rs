/*!
A worker's annotation of one scenario. The worker's entities are validated against the closed set
of labels and turned into one binary vector per label, each as long as the scenario.
*/
mod vectorizer;

pub use vectorizer::{
    label_spans, LabelVectors, OverlapStrategy, ParsingOverlapStrategyError, SpanVectorizer,
};

use crate::label::{Label, UnknownLabelError};
use crate::schema::{RawEntity, WorkerRecord};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Write};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
/// Failures happening while turning a worker entry into a `WorkerAnnotation`.
pub enum AnnotationError {
    #[error("worker {worker}: {source}")]
    UnknownLabel {
        worker: String,
        #[source]
        source: UnknownLabelError,
    },
    #[error("malformed annotation for worker #{index}: {reason}")]
    Malformed { index: usize, reason: String },
}

/// A labeled span of a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Entity {
    label: Label,
    start: usize,
    end: usize,
    text: String,
}

impl Entity {
    pub fn new<S: Into<String>>(label: Label, start: usize, end: usize, text: S) -> Self {
        Self {
            label,
            start,
            end,
            text: text.into(),
        }
    }

    /// Validates the label of `raw` and extracts its substring from `content`. The substring uses
    /// the literal `[start, end)` character range, clamped to the content.
    pub fn try_from_raw(raw: &RawEntity, content: &str) -> Result<Self, UnknownLabelError> {
        let label = Label::from_str(&raw.label)?;
        let text = content
            .chars()
            .skip(raw.start_offset)
            .take(raw.end_offset.saturating_sub(raw.start_offset))
            .collect::<String>();
        Ok(Self::new(label, raw.start_offset, raw.end_offset, text))
    }

    pub fn label(&self) -> Label {
        self.label
    }
    pub fn start(&self) -> usize {
        self.start
    }
    pub fn end(&self) -> usize {
        self.end
    }
    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]: \"{}\"", self.label, self.text)
    }
}

/// Everything one worker annotated on one scenario. Built once and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerAnnotation {
    worker_id: String,
    entities: Vec<Entity>,
    labels: LabelVectors,
}

impl WorkerAnnotation {
    /// Builds the annotation of a worker from its typed record.
    ///
    /// * `raw_content`: Scenario text as exported, used to extract the entities' substrings.
    /// * `len`: Number of characters of the (quote-stripped) scenario.
    /// * `index`: Position of the worker in the scenario, used for error reporting.
    pub fn try_from_record(
        record: &WorkerRecord,
        raw_content: &str,
        len: usize,
        index: usize,
        overlap: OverlapStrategy,
    ) -> Result<Self, AnnotationError> {
        let raw_entities = record
            .entities()
            .map_err(|err| AnnotationError::Malformed {
                index,
                reason: format!("annotationData.content: {}", err),
            })?;
        let mut entities = raw_entities
            .iter()
            .map(|raw| Entity::try_from_raw(raw, raw_content))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|source| AnnotationError::UnknownLabel {
                worker: record.worker_id.clone(),
                source,
            })?;
        entities.sort_by_key(|e| e.start());
        let labels = SpanVectorizer::new(len, overlap).vectorize(&entities);
        Ok(Self {
            worker_id: record.worker_id.clone(),
            entities,
            labels,
        })
    }

    /// Same as `try_from_record`, starting from the untyped worker entry of a `ScenarioRecord`.
    pub fn try_from_value(
        value: &serde_json::Value,
        raw_content: &str,
        len: usize,
        index: usize,
        overlap: OverlapStrategy,
    ) -> Result<Self, AnnotationError> {
        let record = WorkerRecord::deserialize(value).map_err(|err| AnnotationError::Malformed {
            index,
            reason: err.to_string(),
        })?;
        Self::try_from_record(&record, raw_content, len, index, overlap)
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Entities in ascending start offset.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn labels(&self) -> &LabelVectors {
        &self.labels
    }

    pub fn vector(&self, label: Label) -> &[u8] {
        self.labels.get(label)
    }

    /// Prints every label vector as a line of digits above the scenario text, so the marked
    /// characters can be checked by eye.
    pub fn compare(&self, content: &str) -> String {
        let mut out = String::new();
        for (label, vector) in self.labels.iter() {
            let digits: String = vector
                .iter()
                .map(|v| if *v == 0 { '0' } else { '1' })
                .collect();
            // Writing into a String cannot fail.
            let _ = write!(out, "{}\n\t{}\n\t{}\n", label, digits, content);
        }
        out
    }
}

impl Display for WorkerAnnotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Worker: {}", self.worker_id)?;
        writeln!(f, "Annotations:")?;
        for entity in self.entities.iter() {
            writeln!(f, "\t{}", entity)?;
        }
        for (label, vector) in self.labels.iter() {
            writeln!(f, "\t[{}]: {:?}", label, vector)?;
        }
        Ok(())
    }
}
