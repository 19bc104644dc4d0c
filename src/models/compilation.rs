use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::{DocumentReference, ItemOutcome, Outcome, ResponseType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StampPosition {
    #[default]
    BottomRight,
    BottomLeft,
    TopRight,
    TopLeft,
    Center,
}

/// Which pages of the compiled output receive the stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StampScope {
    #[default]
    AllPages,
    /// Every page except the generated index pages.
    ContentOnly,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StampOptions {
    pub image_path: Option<PathBuf>,
    #[serde(default)]
    pub position: StampPosition,
    #[serde(default = "default_opacity")]
    pub opacity: f32,
    /// Stamp width as a fraction of the page width.
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default)]
    pub scope: StampScope,
}

fn default_opacity() -> f32 {
    0.85
}

fn default_scale() -> f32 {
    0.2
}

impl Default for StampOptions {
    fn default() -> Self {
        StampOptions {
            image_path: None,
            position: StampPosition::default(),
            opacity: default_opacity(),
            scale: default_scale(),
            scope: StampScope::default(),
        }
    }
}

impl StampOptions {
    pub fn new(image_path: impl Into<PathBuf>) -> Self {
        StampOptions {
            image_path: Some(image_path.into()),
            ..Default::default()
        }
    }

    pub fn with_position(mut self, position: StampPosition) -> Self {
        self.position = position;
        self
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_scope(mut self, scope: StampScope) -> Self {
        self.scope = scope;
        self
    }

    /// Opacity and scale clamped into (0, 1]; non-finite or non-positive
    /// values fall back to the defaults.
    pub fn normalized(&self) -> (f32, f32) {
        let clamp = |value: f32, fallback: f32| {
            if value.is_finite() && value > 0.0 {
                value.min(1.0)
            } else {
                fallback
            }
        };
        (clamp(self.opacity, default_opacity()), clamp(self.scale, default_scale()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilationRequest {
    pub tender_id: i64,
    pub response_name: String,
    pub response_type: ResponseType,
    #[serde(default)]
    pub remarks: Option<String>,
    pub checklist_id: i64,
    pub documents: Vec<DocumentReference>,
    #[serde(default)]
    pub include_index: bool,
    #[serde(default = "default_index_start")]
    pub index_start_from: i64,
    #[serde(default)]
    pub stamp: Option<StampOptions>,
    /// Destination; a timestamped name under the output directory when absent.
    /// A given path must not exist yet and must not be one of the sources.
    #[serde(default)]
    pub output_path: Option<PathBuf>,
}

fn default_index_start() -> i64 {
    1
}

impl CompilationRequest {
    pub fn new(
        tender_id: i64,
        response_name: impl Into<String>,
        response_type: ResponseType,
        checklist_id: i64,
        documents: Vec<DocumentReference>,
    ) -> Self {
        CompilationRequest {
            tender_id,
            response_name: response_name.into(),
            response_type,
            remarks: None,
            checklist_id,
            documents,
            include_index: false,
            index_start_from: default_index_start(),
            stamp: None,
            output_path: None,
        }
    }

    pub fn with_index(mut self, start_from: i64) -> Self {
        self.include_index = true;
        self.index_start_from = start_from;
        self
    }

    pub fn with_stamp(mut self, stamp: StampOptions) -> Self {
        self.stamp = Some(stamp);
        self
    }

    pub fn with_output_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output_path = Some(path.into());
        self
    }

    pub fn index_title(&self) -> String {
        format!("{} ({})", self.response_name, self.response_type)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CompiledArtifact {
    pub file_path: PathBuf,
    pub file_size_bytes: u64,
    pub page_count: usize,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompilationReport {
    pub artifact: CompiledArtifact,
    pub documents: Vec<ItemOutcome>,
    pub index_pages: usize,
    pub stamp: Outcome,
}

impl CompilationReport {
    pub fn included_count(&self) -> usize {
        self.documents.iter().filter(|d| d.outcome.is_included()).count()
    }
}
