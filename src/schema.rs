//! Typed shape of the crowd annotation export. Each scenario record carries the scenario text and
//! one entry per worker; a worker's entities are stored as a JSON document serialized into a
//! string (`annotationData.content`), so they go through a second parsing step.
use serde::{Deserialize, Serialize};

/// One scenario, as exported by the labeling job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioRecord {
    pub data_object: DataObject,
    /// Worker entries are kept untyped until the scenario is built, so a single malformed worker
    /// can be reported with its position instead of failing the whole record.
    #[serde(default)]
    pub annotations: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataObject {
    pub content: String,
}

impl ScenarioRecord {
    pub fn new<S: Into<String>>(content: S, annotations: Vec<serde_json::Value>) -> Self {
        Self {
            data_object: DataObject {
                content: content.into(),
            },
            annotations,
        }
    }

    pub fn content(&self) -> &str {
        &self.data_object.content
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerRecord {
    pub worker_id: String,
    pub annotation_data: AnnotationData,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationData {
    /// Serialized `CrowdAnnotation`.
    pub content: String,
}

impl WorkerRecord {
    /// Builds a worker entry in the export format, serializing the entities into
    /// `annotationData.content`.
    pub fn new<S: Into<String>>(worker_id: S, entities: Vec<RawEntity>) -> Self {
        let payload = CrowdAnnotation {
            entity_annotation: EntityAnnotation { entities },
        };
        Self {
            worker_id: worker_id.into(),
            annotation_data: AnnotationData {
                content: serde_json::json!(payload).to_string(),
            },
        }
    }

    /// The worker entry as a JSON value, ready to be placed in `ScenarioRecord::annotations`.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!(self)
    }

    pub(crate) fn entities(&self) -> Result<Vec<RawEntity>, serde_json::Error> {
        let parsed: CrowdAnnotation = serde_json::from_str(&self.annotation_data.content)?;
        Ok(parsed.entity_annotation.entities)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrowdAnnotation {
    #[serde(rename = "crowd-entity-annotation")]
    pub entity_annotation: EntityAnnotation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityAnnotation {
    #[serde(default)]
    pub entities: Vec<RawEntity>,
}

/// An entity before its label is validated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntity {
    pub label: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl RawEntity {
    pub fn new<S: Into<String>>(label: S, start_offset: usize, end_offset: usize) -> Self {
        Self {
            label: label.into(),
            start_offset,
            end_offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"{
        "dataObject": {"content": "\"The app stores data.\""},
        "annotations": [
            {
                "workerId": "private.us-east-1.a1",
                "annotationData": {
                    "content": "{\"crowd-entity-annotation\":{\"entities\":[{\"endOffset\":9,\"label\":\"UC-System\",\"startOffset\":5}]}}"
                }
            }
        ]
    }"#;

    #[test]
    fn test_parse_export() {
        let record: ScenarioRecord = serde_json::from_str(EXPORT).unwrap();
        assert_eq!(record.content(), "\"The app stores data.\"");
        assert_eq!(record.annotations.len(), 1);
        let worker: WorkerRecord = serde_json::from_value(record.annotations[0].clone()).unwrap();
        assert_eq!(worker.worker_id, "private.us-east-1.a1");
        assert_eq!(
            worker.entities().unwrap(),
            vec![RawEntity::new("UC-System", 5, 9)]
        );
    }

    #[test]
    fn test_worker_record_builder_matches_export_shape() {
        let worker = WorkerRecord::new("w1", vec![RawEntity::new("UC-Goal", 0, 3)]);
        let value = worker.to_value();
        assert_eq!(value["workerId"], "w1");
        let nested = value["annotationData"]["content"].as_str().unwrap();
        let parsed: CrowdAnnotation = serde_json::from_str(nested).unwrap();
        assert_eq!(
            parsed.entity_annotation.entities,
            vec![RawEntity::new("UC-Goal", 0, 3)]
        );
    }

    #[test]
    fn test_missing_data_object_is_rejected() {
        let res = serde_json::from_str::<ScenarioRecord>(r#"{"annotations": []}"#);
        assert!(res.is_err());
    }

    #[test]
    fn test_negative_offset_is_rejected() {
        let res = serde_json::from_str::<RawEntity>(
            r#"{"label": "UC-Name", "startOffset": -1, "endOffset": 2}"#,
        );
        assert!(res.is_err());
    }
}
