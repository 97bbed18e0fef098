use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use synthdoc_core::{IssueSeverity, ValidationIssue};

use crate::errors::GenerationError;
use crate::faker::LocaleKey;

const BATCH_CONCURRENCY: usize = 100;
const STREAM_CONCURRENCY: usize = 10;

/// How finished documents reach the sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMode {
    /// Collect a model's documents and hand them over at once.
    #[default]
    Batch,
    /// Hand over each document as soon as it is built.
    Stream,
}

impl DeliveryMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Batch => "batch",
            Self::Stream => "stream",
        }
    }

    pub fn default_concurrency(self) -> usize {
        match self {
            Self::Batch => BATCH_CONCURRENCY,
            Self::Stream => STREAM_CONCURRENCY,
        }
    }
}

impl FromStr for DeliveryMode {
    type Err = GenerationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "batch" => Ok(Self::Batch),
            "stream" => Ok(Self::Stream),
            other => Err(GenerationError::InvalidParams(format!(
                "unknown delivery mode '{other}'"
            ))),
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Options for the generation engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerateOptions {
    pub mode: DeliveryMode,
    /// Maximum builds in flight; the mode decides when unset.
    pub concurrency: Option<usize>,
    /// Global document count that wins over every model setting.
    pub count_override: Option<u64>,
    /// Global seed that wins over every model seed.
    pub seed_override: Option<u64>,
    /// Escalate recovered hook errors to fatal.
    pub strict: bool,
    pub locale: LocaleKey,
}

impl GenerateOptions {
    pub fn concurrency_limit(&self) -> usize {
        self.concurrency
            .unwrap_or_else(|| self.mode.default_concurrency())
            .max(1)
    }
}

/// Summary of one generated model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelReport {
    pub model: String,
    pub requested: u64,
    pub generated: u64,
    pub delivered: u64,
    pub duplicates: u64,
    pub hook_errors: u64,
    pub seed: Option<u64>,
    pub duration_ms: u64,
}

/// Structured generation issue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationIssue {
    pub level: String,
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl GenerationIssue {
    pub fn warning(code: &str, model: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            level: "warning".to_string(),
            code: code.to_string(),
            message: message.into(),
            model: model.map(str::to_string),
            path: None,
        }
    }
}

impl From<ValidationIssue> for GenerationIssue {
    fn from(issue: ValidationIssue) -> Self {
        let level = match issue.severity {
            IssueSeverity::Error => "error",
            IssueSeverity::Warning => "warning",
        };
        Self {
            level: level.to_string(),
            code: issue.code,
            message: issue.message,
            model: issue.model,
            path: Some(issue.path),
        }
    }
}

/// Report for a generation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub mode: DeliveryMode,
    pub models: Vec<ModelReport>,
    pub documents_total: u64,
    pub hook_errors_total: u64,
    pub duplicates_total: u64,
    pub warnings_by_code: BTreeMap<String, u64>,
    pub warnings: Vec<GenerationIssue>,
    pub duration_ms: u64,
    pub cancelled: bool,
}

impl GenerationReport {
    pub fn new(run_id: String, mode: DeliveryMode) -> Self {
        Self {
            run_id,
            started_at: Utc::now(),
            mode,
            models: Vec::new(),
            documents_total: 0,
            hook_errors_total: 0,
            duplicates_total: 0,
            warnings_by_code: BTreeMap::new(),
            warnings: Vec::new(),
            duration_ms: 0,
            cancelled: false,
        }
    }

    pub fn record_model(&mut self, model: ModelReport) {
        self.documents_total += model.delivered;
        self.hook_errors_total += model.hook_errors;
        self.duplicates_total += model.duplicates;
        self.models.push(model);
    }

    pub fn record_warning(&mut self, issue: GenerationIssue) {
        *self.warnings_by_code.entry(issue.code.clone()).or_insert(0) += 1;
        self.warnings.push(issue);
    }

    pub fn model(&self, name: &str) -> Option<&ModelReport> {
        self.models.iter().find(|report| report.model == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_defaults_follow_the_mode() {
        let batch = GenerateOptions::default();
        assert_eq!(batch.concurrency_limit(), 100);

        let stream = GenerateOptions {
            mode: DeliveryMode::Stream,
            ..GenerateOptions::default()
        };
        assert_eq!(stream.concurrency_limit(), 10);

        let zero = GenerateOptions {
            concurrency: Some(0),
            ..GenerateOptions::default()
        };
        assert_eq!(zero.concurrency_limit(), 1);
    }

    #[test]
    fn model_reports_roll_up_into_totals() {
        let mut report = GenerationReport::new("run".to_string(), DeliveryMode::Batch);
        for (model, delivered) in [("users", 4), ("orders", 6)] {
            report.record_model(ModelReport {
                model: model.to_string(),
                requested: delivered,
                generated: delivered,
                delivered,
                duplicates: 1,
                hook_errors: 2,
                seed: None,
                duration_ms: 0,
            });
        }
        assert_eq!(report.documents_total, 10);
        assert_eq!(report.duplicates_total, 2);
        assert_eq!(report.hook_errors_total, 4);
        assert_eq!(report.model("orders").map(|m| m.delivered), Some(6));
    }
}
