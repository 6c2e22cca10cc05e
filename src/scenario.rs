use crate::annotation::{AnnotationError, LabelVectors, OverlapStrategy, WorkerAnnotation};
use crate::label::{Label, ScoringCategory};
use crate::schema::ScenarioRecord;
use serde::Serialize;
use std::fmt::Display;

/// Removes one leading and one trailing double quote, if present.
pub(crate) fn strip_quotes(content: &str) -> &str {
    let content = content.strip_prefix('"').unwrap_or(content);
    content.strip_suffix('"').unwrap_or(content)
}

/// A scenario and the annotations of every worker who labeled it. The workers keep the order of
/// the input record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scenario {
    content: Vec<char>,
    workers: Vec<WorkerAnnotation>,
}

impl Scenario {
    /// Builds the scenario and vectorizes the entities of every worker.
    ///
    /// * `raw_content`: Scenario text as exported, possibly wrapped in double quotes.
    /// * `workers`: Untyped worker entries.
    /// * `overlap`: How entities of the same label combine within a worker.
    pub fn try_new(
        raw_content: &str,
        workers: &[serde_json::Value],
        overlap: OverlapStrategy,
    ) -> Result<Self, AnnotationError> {
        let content: Vec<char> = strip_quotes(raw_content).chars().collect();
        let len = content.len();
        let workers = workers
            .iter()
            .enumerate()
            .map(|(index, value)| {
                WorkerAnnotation::try_from_value(value, raw_content, len, index, overlap)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { content, workers })
    }

    pub fn try_from_record(
        record: &ScenarioRecord,
        overlap: OverlapStrategy,
    ) -> Result<Self, AnnotationError> {
        Self::try_new(record.content(), &record.annotations, overlap)
    }

    /// Characters of the scenario, without its surrounding quotes.
    pub fn content(&self) -> &[char] {
        &self.content
    }

    pub fn text(&self) -> String {
        self.content.iter().collect()
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    pub fn workers(&self) -> &[WorkerAnnotation] {
        &self.workers
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// One row per worker, holding the worker's vector for `label`.
    pub fn ratings(&self, label: Label) -> Vec<&[u8]> {
        self.workers.iter().map(|w| w.vector(label)).collect()
    }

    /// One row per worker for a scoring category. A character is rated 1 when any label of the
    /// category marks it.
    pub fn scoring_ratings(&self, category: ScoringCategory) -> Vec<Vec<u8>> {
        self.workers
            .iter()
            .map(|worker| {
                let mut row = vec![0; self.len()];
                for label in category.labels() {
                    for (merged, v) in row.iter_mut().zip(worker.vector(*label)) {
                        *merged |= *v;
                    }
                }
                row
            })
            .collect()
    }

    /// Serializable view: the scenario as characters and each worker's label vectors.
    pub fn annotations(&self) -> ScenarioAnnotations<'_> {
        ScenarioAnnotations {
            scenario: &self.content,
            workers: self
                .workers
                .iter()
                .map(|w| WorkerVectors {
                    id: w.worker_id(),
                    annotations: w.labels(),
                })
                .collect(),
        }
    }
}

impl Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = self.text();
        writeln!(f, "Scenario: {}", text)?;
        for worker in self.workers.iter() {
            writeln!(f, "\nWorker: {}", worker.worker_id())?;
            for entity in worker.entities() {
                writeln!(f, "\t{}", entity)?;
            }
            write!(f, "{}", worker.compare(&text))?;
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
pub struct ScenarioAnnotations<'a> {
    pub scenario: &'a [char],
    pub workers: Vec<WorkerVectors<'a>>,
}

#[derive(Debug, Serialize)]
pub struct WorkerVectors<'a> {
    pub id: &'a str,
    pub annotations: &'a LabelVectors,
}
