use serde::Deserialize;
use std::path::PathBuf;

use super::error::PipelineResult;

const POINTS_PER_MM: f32 = 72.0 / 25.4;

pub fn mm_to_pt(mm: f32) -> f32 {
    mm * POINTS_PER_MM
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageSize {
    A4,
    Letter,
    Legal,
    A3,
    Custom(f32, f32), // width, height in mm
}

impl PageSize {
    pub fn dimensions(&self) -> (f32, f32) {
        match self {
            PageSize::A4 => (210.0, 297.0),
            PageSize::Letter => (215.9, 279.4),
            PageSize::Legal => (215.9, 355.6),
            PageSize::A3 => (297.0, 420.0),
            PageSize::Custom(w, h) => (*w, *h),
        }
    }

    /// Page dimensions in PDF user space units.
    pub fn dimensions_pt(&self) -> (f32, f32) {
        let (w, h) = self.dimensions();
        (mm_to_pt(w), mm_to_pt(h))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Margin {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Default for Margin {
    fn default() -> Self {
        Margin {
            top: 20.0,
            bottom: 20.0,
            left: 20.0,
            right: 20.0,
        }
    }
}

impl Margin {
    pub fn uniform(size: f32) -> Self {
        Margin {
            top: size,
            bottom: size,
            left: size,
            right: size,
        }
    }
}

/// Geometry and typography of generated index pages. Margins are in mm,
/// font sizes in points.
#[derive(Debug, Clone)]
pub struct IndexLayout {
    pub page_size: PageSize,
    pub margin: Margin,
    pub title_font_size: f32,
    pub font_size: f32,
    pub line_height: f32,
}

impl Default for IndexLayout {
    fn default() -> Self {
        IndexLayout {
            page_size: PageSize::A4,
            margin: Margin::uniform(25.0),
            title_font_size: 18.0,
            font_size: 12.0,
            line_height: 1.6,
        }
    }
}

impl IndexLayout {
    pub fn builder() -> IndexLayoutBuilder {
        IndexLayoutBuilder::default()
    }

    /// Vertical advance between two entry lines.
    pub fn line_advance(&self) -> f32 {
        self.font_size * self.line_height
    }

    /// How many entry lines fit on one page below the title block.
    pub fn entries_per_page(&self) -> usize {
        let (_, height) = self.page_size.dimensions_pt();
        let usable = height
            - mm_to_pt(self.margin.top)
            - mm_to_pt(self.margin.bottom)
            - self.title_block_height();
        ((usable / self.line_advance()).floor() as usize).max(1)
    }

    pub fn title_block_height(&self) -> f32 {
        self.title_font_size * 2.5
    }
}

#[derive(Default)]
pub struct IndexLayoutBuilder {
    page_size: Option<PageSize>,
    margin: Option<Margin>,
    title_font_size: Option<f32>,
    font_size: Option<f32>,
    line_height: Option<f32>,
}

impl IndexLayoutBuilder {
    pub fn page_size(mut self, size: PageSize) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn margin(mut self, margin: Margin) -> Self {
        self.margin = Some(margin);
        self
    }

    pub fn title_font_size(mut self, size: f32) -> Self {
        self.title_font_size = Some(size);
        self
    }

    pub fn font_size(mut self, size: f32) -> Self {
        self.font_size = Some(size);
        self
    }

    pub fn line_height(mut self, line_height: f32) -> Self {
        self.line_height = Some(line_height);
        self
    }

    pub fn build(self) -> IndexLayout {
        let default = IndexLayout::default();
        IndexLayout {
            page_size: self.page_size.unwrap_or(default.page_size),
            margin: self.margin.unwrap_or(default.margin),
            title_font_size: self.title_font_size.unwrap_or(default.title_font_size),
            font_size: self.font_size.unwrap_or(default.font_size),
            line_height: self.line_height.unwrap_or(default.line_height),
        }
    }
}

/// Service configuration. Values come from built-in defaults overridden by
/// `TENDER__*` environment variables (a `.env` file is honoured by `main`).
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Base directory that relative stored paths are joined onto.
    pub storage_root: PathBuf,
    /// Where compiled, compressed and merged artifacts are written.
    pub output_dir: PathBuf,
    pub database_url: String,
    /// Largest identifier the generic file store can hold.
    pub max_file_id: i64,
    pub ghostscript_binary: String,
    /// Upper bound on how long a merged bundle outlives its response.
    pub merge_grace_seconds: u64,
    pub host: String,
    pub port: u16,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            storage_root: PathBuf::from("uploads"),
            output_dir: PathBuf::from("uploads/compiled"),
            database_url: "sqlite://tender.db".to_string(),
            max_file_id: i32::MAX as i64,
            ghostscript_binary: "gs".to_string(),
            merge_grace_seconds: 30,
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl PipelineConfig {
    pub fn from_env() -> PipelineResult<Self> {
        let defaults = PipelineConfig::default();

        let settings = config::Config::builder()
            .set_default("storage_root", defaults.storage_root.to_string_lossy().to_string())?
            .set_default("output_dir", defaults.output_dir.to_string_lossy().to_string())?
            .set_default("database_url", defaults.database_url)?
            .set_default("max_file_id", defaults.max_file_id)?
            .set_default("ghostscript_binary", defaults.ghostscript_binary)?
            .set_default("merge_grace_seconds", defaults.merge_grace_seconds as i64)?
            .set_default("host", defaults.host)?
            .set_default("port", defaults.port as i64)?
            .add_source(
                config::Environment::with_prefix("TENDER")
                    .prefix_separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
