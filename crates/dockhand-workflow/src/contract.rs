//! JSON-schema description of the host-facing contract.
//!
//! Hosts send [`WorkflowParams`](crate::WorkflowParams) as JSON and receive a
//! [`WorkflowResult`](crate::WorkflowResult). These schemas document both
//! shapes; they are not used for validation at runtime.

use serde_json::{json, Value};

const SCHEMA_DRAFT: &str = "https://json-schema.org/draft/2020-12/schema";

fn step_status_enum() -> Value {
    json!(["pending", "running", "completed", "failed", "skipped"])
}

/// Schema for the run parameters.
pub fn params_schema() -> Value {
    json!({
        "$schema": SCHEMA_DRAFT,
        "title": "WorkflowParams",
        "type": "object",
        "required": ["repoPath"],
        "properties": {
            "repoPath": { "type": "string", "description": "Repository to containerize" },
            "sessionId": { "type": ["string", "null"], "description": "Reuse or create this session" },
            "environment": {
                "type": "string",
                "enum": ["development", "staging", "production"],
                "default": "production"
            },
            "namespace": { "type": "string", "default": "default" },
            "imageName": { "type": ["string", "null"] },
            "imageTag": { "type": "string", "default": "0.1.0" },
            "replicas": { "type": "integer", "minimum": 0, "default": 1 },
            "baseImage": { "type": ["string", "null"] },
            "sampling": { "type": "boolean", "default": true },
            "scan": { "type": "boolean", "default": true },
            "remediate": { "type": "boolean", "default": true },
            "deploy": { "type": "boolean", "default": true },
            "verify": { "type": "boolean", "default": true }
        }
    })
}

/// Schema for the run result.
pub fn result_schema() -> Value {
    json!({
        "$schema": SCHEMA_DRAFT,
        "title": "WorkflowResult",
        "type": "object",
        "required": ["success", "sessionId", "steps", "artifacts", "warnings", "durationMs"],
        "properties": {
            "success": { "type": "boolean" },
            "sessionId": { "type": "string" },
            "steps": {
                "type": "array",
                "items": {
                    "type": "object",
                    "required": ["name", "status"],
                    "properties": {
                        "name": { "type": "string" },
                        "status": { "type": "string", "enum": step_status_enum() },
                        "startTime": { "type": ["string", "null"], "format": "date-time" },
                        "endTime": { "type": ["string", "null"], "format": "date-time" },
                        "error": { "type": "string" },
                        "output": {}
                    }
                }
            },
            "artifacts": {
                "type": "object",
                "description": "Step outputs keyed by step name",
                "additionalProperties": true
            },
            "warnings": { "type": "array", "items": { "type": "string" } },
            "error": { "type": "string" },
            "failedStep": { "type": "string" },
            "durationMs": { "type": "integer", "minimum": 0 }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::WorkflowResult;
    use crate::params::WorkflowParams;

    fn property_names(schema: &Value) -> Vec<String> {
        schema["properties"]
            .as_object()
            .expect("properties")
            .keys()
            .cloned()
            .collect()
    }

    #[test]
    fn test_params_schema_covers_serialized_fields() {
        let schema = params_schema();
        let mut params = WorkflowParams::new("/repo");
        params.session_id = Some("s".into());
        params.image_name = Some("app".into());
        params.base_image = Some("python:3.12-slim".into());
        let json = serde_json::to_value(&params).expect("serialize");

        let props = property_names(&schema);
        for key in json.as_object().expect("object").keys() {
            assert!(props.contains(key), "schema missing {key}");
        }
        assert_eq!(schema["required"], json!(["repoPath"]));
    }

    #[test]
    fn test_result_schema_covers_serialized_fields() {
        let result = WorkflowResult {
            success: false,
            session_id: "s".into(),
            steps: Vec::new(),
            artifacts: Default::default(),
            warnings: Vec::new(),
            error: Some("Build failed: no FROM".into()),
            failed_step: Some("build-image".into()),
            duration_ms: 3,
        };
        let json = serde_json::to_value(&result).expect("serialize");
        let props = property_names(&result_schema());
        for key in json.as_object().expect("object").keys() {
            assert!(props.contains(key), "schema missing {key}");
        }
    }

    #[test]
    fn test_minimal_params_deserialize_with_defaults() {
        let params: WorkflowParams =
            serde_json::from_value(json!({ "repoPath": "/srv/app" })).expect("parse");
        assert_eq!(params.namespace, "default");
        assert!(params.deploy);
        assert_eq!(params_schema()["properties"]["imageTag"]["default"], json!(params.image_tag));
    }
}
