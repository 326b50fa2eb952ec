use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::schema_client::CreationResult;

/// Reporter for summarizing migration runs in various formats
pub struct MigrationReporter {
    output_format: ReportFormat,
}

/// Available output formats for migration reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
pub enum ReportFormat {
    Console,
    Json,
    Yaml,
}

/// Summary of one migration run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationReport {
    pub kind: String,
    pub total: usize,
    pub created: usize,
    pub failed: usize,
    pub unresolved_references: Vec<String>,
    pub failures: Vec<FailedDefinition>,
    pub recommendations: Vec<String>,
}

/// A definition the target store did not accept
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedDefinition {
    /// Position in the run's result list
    pub index: usize,
    pub messages: Vec<String>,
    pub codes: Vec<String>,
}

impl MigrationReporter {
    pub fn new() -> Self {
        Self {
            output_format: ReportFormat::Console,
        }
    }

    pub fn with_format(mut self, format: ReportFormat) -> Self {
        self.output_format = format;
        self
    }

    pub fn generate_report(&self, kind: &str, results: &[CreationResult]) -> MigrationReport {
        let mut failures = Vec::new();
        let mut unresolved_references = Vec::new();

        for (index, result) in results.iter().enumerate() {
            unresolved_references.extend(result.unresolved_references.iter().cloned());
            if !result.is_success() {
                failures.push(FailedDefinition {
                    index,
                    messages: result.error_messages(),
                    codes: result
                        .user_errors()
                        .into_iter()
                        .filter_map(|e| e.code)
                        .collect(),
                });
            }
        }
        unresolved_references.sort();
        unresolved_references.dedup();

        let recommendations = self.generate_recommendations(&failures, &unresolved_references);

        MigrationReport {
            kind: kind.to_string(),
            total: results.len(),
            created: results.len() - failures.len(),
            failed: failures.len(),
            unresolved_references,
            failures,
            recommendations,
        }
    }

    /// Format the report according to the configured output format
    pub fn format_report(&self, report: &MigrationReport) -> Result<String, ReportError> {
        match self.output_format {
            ReportFormat::Console => Ok(self.format_console_report(report)),
            ReportFormat::Json => serde_json::to_string_pretty(report)
                .map_err(|e| ReportError::SerializationError(e.to_string())),
            ReportFormat::Yaml => serde_yaml::to_string(report)
                .map_err(|e| ReportError::SerializationError(e.to_string())),
        }
    }

    fn generate_recommendations(
        &self,
        failures: &[FailedDefinition],
        unresolved_references: &[String],
    ) -> Vec<String> {
        let mut recommendations = Vec::new();

        if !unresolved_references.is_empty() {
            recommendations.push(
                "Migrate metaobject definitions first so every referenced type exists in the target store, then re-run"
                    .to_string(),
            );
        }

        if failures
            .iter()
            .any(|f| f.codes.iter().any(|code| code == "TAKEN"))
        {
            recommendations.push(
                "Some definitions already exist in the target store; existing definitions are left unchanged"
                    .to_string(),
            );
        }

        if recommendations.is_empty() && !failures.is_empty() {
            recommendations.push("Inspect the failed definitions before re-running".to_string());
        }

        if recommendations.is_empty() {
            recommendations.push("Migration completed successfully".to_string());
        }

        recommendations
    }

    fn format_console_report(&self, report: &MigrationReport) -> String {
        let mut output = String::new();

        output.push_str(&format!("=== {} migration ===\n\n", report.kind));
        output.push_str(&format!("Definitions processed: {}\n", report.total));
        output.push_str(&format!("  ✓ Created: {}\n", report.created));
        output.push_str(&format!("  ✗ Failed:  {}\n", report.failed));

        if !report.unresolved_references.is_empty() {
            output.push_str("\nUnresolved references:\n");
            for reference in &report.unresolved_references {
                output.push_str(&format!("  - {}\n", reference));
            }
        }

        if !report.failures.is_empty() {
            output.push_str("\nFailures:\n");
            for failure in &report.failures {
                output.push_str(&format!(
                    "  #{}: {}\n",
                    failure.index,
                    failure.messages.join("; ")
                ));
            }
        }

        output.push_str("\nRecommendations:\n");
        for rec in &report.recommendations {
            output.push_str(&format!("  • {}\n", rec));
        }

        output
    }
}

impl Default for MigrationReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("Serialization error: {0}")]
    SerializationError(String),
}
