// Template Domain Model — prompt templates run against foundation models (§3)

use serde::{Deserialize, Serialize};

/// A model tier label, mapped by configuration to a concrete model id (§6 glossary).
pub type Tier = String;

/// One step of a template: a single model invocation whose output may be
/// referenced by later steps via `step_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateStep {
    pub step_id: String,
    pub tier: Tier,
    pub prompt_source: String,
    pub required_schema_fields: Vec<String>,
}

/// A (template_id, version) pair, immutable once written (I6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Template {
    pub template_id: String,
    pub version: i64,
    pub steps: Vec<TemplateStep>,
    /// Union of every step's required_schema_fields, dot-path notation,
    /// used by the worker's record validator.
    pub schema_requirements: Vec<String>,
}

impl Template {
    pub fn new(template_id: impl Into<String>, version: i64, steps: Vec<TemplateStep>) -> Self {
        let mut schema_requirements: Vec<String> = steps
            .iter()
            .flat_map(|s| s.required_schema_fields.iter().cloned())
            .collect();
        schema_requirements.sort();
        schema_requirements.dedup();

        Self {
            template_id: template_id.into(),
            version,
            steps,
            schema_requirements,
        }
    }

    pub fn step(&self, step_id: &str) -> Option<&TemplateStep> {
        self.steps.iter().find(|s| s.step_id == step_id)
    }
}
