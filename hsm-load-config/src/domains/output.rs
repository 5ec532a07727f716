//! Output configuration for the end-of-run summary

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where and how the summary is written
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// JSON file receiving the full test result; `null` disables it
    #[serde(default = "default_summary_json")]
    pub summary_json: Option<PathBuf>,

    /// Print the text summary to stdout
    #[serde(default = "crate::domains::utils::default_true")]
    pub text_summary: bool,

    /// Color the text summary
    #[serde(default = "crate::domains::utils::default_true")]
    pub colors: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            summary_json: default_summary_json(),
            text_summary: true,
            colors: true,
        }
    }
}

impl Validatable for OutputConfig {
    fn validate(&self) -> ConfigResult<()> {
        if let Some(path) = &self.summary_json {
            if path.as_os_str().is_empty() {
                return Err(self.validation_error("summary_json cannot be an empty path"));
            }
            if path.is_dir() {
                return Err(self.validation_error(format!(
                    "summary_json points at a directory: {}",
                    path.display()
                )));
            }
        }
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "output"
    }
}

fn default_summary_json() -> Option<PathBuf> {
    Some(PathBuf::from("load-test-results.json"))
}
