//! JSON coverage summary

use crate::coverage::CoverageData;
use serde::{Deserialize, Serialize};

/// Coverage of a single image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonImageCoverage {
    /// Image path as it appears in the logs
    pub image: String,
    pub total_functions: usize,
    pub called_functions: usize,
    /// Called over total, in percent
    pub coverage_percent: f64,
    pub called: Vec<String>,
    pub uncalled: Vec<String>,
}

/// Complete JSON document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonCoverage {
    /// Tool version
    pub version: String,
    /// Document format identifier
    pub format: String,
    pub images: Vec<JsonImageCoverage>,
}

impl JsonCoverage {
    /// Build the document from analyzed coverage, ordered by image
    pub fn from_data(data: &CoverageData) -> Self {
        let images = data
            .images()
            .map(|(image, coverage)| JsonImageCoverage {
                image: image.to_string(),
                total_functions: coverage.total_count(),
                called_functions: coverage.called_count(),
                coverage_percent: coverage.percentage(),
                called: coverage.called.iter().cloned().collect(),
                uncalled: coverage.uncalled().into_iter().map(String::from).collect(),
            })
            .collect();

        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            format: "functrace-coverage-v1".to_string(),
            images,
        }
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
