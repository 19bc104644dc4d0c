use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::core::PipelineError;

/// Named trade-off between output size and fidelity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionProfile {
    Light,
    Recommended,
    Extreme,
}

impl CompressionProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionProfile::Light => "light",
            CompressionProfile::Recommended => "recommended",
            CompressionProfile::Extreme => "extreme",
        }
    }

    /// Ghostscript `-dPDFSETTINGS` preset used by the primary strategy.
    pub fn ghostscript_preset(&self) -> &'static str {
        match self {
            CompressionProfile::Light => "/printer",
            CompressionProfile::Recommended => "/ebook",
            CompressionProfile::Extreme => "/screen",
        }
    }

    /// Flat JPEG quality used by the fallback strategy.
    pub fn fallback_quality(&self) -> u8 {
        match self {
            CompressionProfile::Light => 80,
            CompressionProfile::Recommended => 60,
            CompressionProfile::Extreme => 40,
        }
    }
}

impl fmt::Display for CompressionProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionProfile {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "light" => Ok(CompressionProfile::Light),
            "recommended" => Ok(CompressionProfile::Recommended),
            "extreme" => Ok(CompressionProfile::Extreme),
            other => Err(PipelineError::InvalidRequest(format!(
                "unknown compression profile '{}'",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompressionResult {
    pub original_size_kb: f64,
    pub compressed_size_kb: f64,
    /// Negative when the output grew.
    pub compression_ratio_percent: i64,
    pub processing_time_seconds: f64,
    pub method_used: String,
    pub output_path: PathBuf,
}

impl CompressionResult {
    pub fn new(
        original_bytes: u64,
        compressed_bytes: u64,
        processing_time_seconds: f64,
        method_used: impl Into<String>,
        output_path: PathBuf,
    ) -> Self {
        let original_size_kb = to_kb(original_bytes);
        let compressed_size_kb = to_kb(compressed_bytes);
        CompressionResult {
            original_size_kb,
            compressed_size_kb,
            compression_ratio_percent: ratio_percent(original_size_kb, compressed_size_kb),
            processing_time_seconds: round2(processing_time_seconds),
            method_used: method_used.into(),
            output_path,
        }
    }
}

/// `round(100 * (1 - compressed / original))`, 0 for an empty original.
pub fn ratio_percent(original: f64, compressed: f64) -> i64 {
    if original <= 0.0 {
        return 0;
    }
    (100.0 * (1.0 - compressed / original)).round() as i64
}

fn to_kb(bytes: u64) -> f64 {
    round2(bytes as f64 / 1024.0)
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompressionRequest {
    pub artifact_path: PathBuf,
    pub profile: CompressionProfile,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergeRequest {
    pub source_paths: Vec<PathBuf>,
    #[serde(default)]
    pub output_path: Option<PathBuf>,
}
