use image::codecs::jpeg::JpegEncoder;
use image::{ColorType, GenericImageView, ImageFormat};
use lopdf::{Document, Object, ObjectId, Stream};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Instant;

use crate::core::{PipelineError, PipelineResult};
use crate::metrics::PipelineMetrics;
use crate::models::{CompressionProfile, CompressionResult};
use crate::pdf::{load_document, save_document};
use crate::storage::paths::{compressed_path_for, original_of};

/// One way of producing a smaller copy of a PDF.
pub trait CompressionStrategy: Send + Sync {
    /// Short name, used as the metrics label.
    fn name(&self) -> &'static str;

    /// Value reported as `method_used` for `profile`.
    fn method(&self, profile: CompressionProfile) -> String;

    /// Writes the compressed copy of `input` to `output`.
    fn compress(&self, input: &Path, output: &Path, profile: CompressionProfile) -> PipelineResult<()>;
}

/// Runs Ghostscript's `pdfwrite` device with the profile's preset.
pub struct GhostscriptStrategy {
    binary: String,
}

impl GhostscriptStrategy {
    pub fn new(binary: impl Into<String>) -> Self {
        GhostscriptStrategy {
            binary: binary.into(),
        }
    }

    pub fn arguments(input: &Path, output: &Path, profile: CompressionProfile) -> Vec<String> {
        let mut args = vec![
            "-sDEVICE=pdfwrite".to_string(),
            "-dCompatibilityLevel=1.4".to_string(),
            format!("-dPDFSETTINGS={}", profile.ghostscript_preset()),
            "-dNOPAUSE".to_string(),
            "-dQUIET".to_string(),
            "-dBATCH".to_string(),
        ];

        if profile == CompressionProfile::Extreme {
            for kind in ["Color", "Gray", "Mono"] {
                args.push(format!("-dDownsample{}Images=true", kind));
                args.push(format!("-d{}ImageResolution=72", kind));
            }
        }

        args.push(format!("-sOutputFile={}", output.display()));
        args.push(input.display().to_string());
        args
    }
}

impl CompressionStrategy for GhostscriptStrategy {
    fn name(&self) -> &'static str {
        "ghostscript"
    }

    fn method(&self, profile: CompressionProfile) -> String {
        format!("ghostscript:{}", profile.ghostscript_preset())
    }

    fn compress(&self, input: &Path, output: &Path, profile: CompressionProfile) -> PipelineResult<()> {
        let result = Command::new(&self.binary)
            .args(Self::arguments(input, output, profile))
            .output()
            .map_err(|e| PipelineError::external_tool(&self.binary, e.to_string()))?;

        if !result.status.success() {
            return Err(PipelineError::external_tool(
                &self.binary,
                format!(
                    "exited with {}: {}",
                    result.status,
                    String::from_utf8_lossy(&result.stderr).trim()
                ),
            ));
        }
        Ok(())
    }
}

/// In-process fallback: re-encodes raster images as JPEG at the profile's
/// quality, deflates the remaining streams and drops unreachable objects.
#[derive(Debug, Default)]
pub struct ReencodeStrategy;

impl ReencodeStrategy {
    pub fn new() -> Self {
        ReencodeStrategy
    }
}

impl CompressionStrategy for ReencodeStrategy {
    fn name(&self) -> &'static str {
        "reencode"
    }

    fn method(&self, profile: CompressionProfile) -> String {
        format!("reencode:{}%", profile.fallback_quality())
    }

    fn compress(&self, input: &Path, output: &Path, profile: CompressionProfile) -> PipelineResult<()> {
        let mut doc = load_document(input)?;
        let reencoded = reencode_images(&mut doc, profile.fallback_quality());
        tracing::debug!(images = reencoded, "Re-encoded raster images");

        doc.prune_objects();
        doc.delete_zero_length_streams();
        doc.compress();
        save_document(&mut doc, output)?;
        Ok(())
    }
}

/// Replaces image streams with JPEG re-encodes where that makes them
/// smaller. Returns how many were replaced.
pub fn reencode_images(doc: &mut Document, quality: u8) -> usize {
    let masks: HashSet<ObjectId> = doc
        .objects
        .values()
        .filter_map(|object| match object {
            Object::Stream(stream) => stream.dict.get(b"SMask").and_then(Object::as_reference).ok(),
            _ => None,
        })
        .collect();

    let mut replaced = 0;
    for (id, object) in doc.objects.iter_mut() {
        let Object::Stream(stream) = object else {
            continue;
        };
        if masks.contains(id) || !is_image(stream) {
            continue;
        }
        match reencode_stream(stream, quality) {
            Some(jpeg) if jpeg.len() < stream.content.len() => {
                stream.dict.set("Filter", "DCTDecode");
                stream.dict.remove(b"DecodeParms");
                stream.set_content(jpeg);
                stream.allows_compression = false;
                replaced += 1;
            }
            _ => {}
        }
    }
    replaced
}

fn is_image(stream: &Stream) -> bool {
    let name = |key: &[u8]| stream.dict.get(key).and_then(Object::as_name).ok();
    name(b"Subtype") == Some(b"Image".as_slice())
        && !matches!(stream.dict.get(b"ImageMask"), Ok(Object::Boolean(true)))
}

/// Single filter name of the stream, if it has exactly one.
fn single_filter(stream: &Stream) -> Option<Vec<u8>> {
    match stream.dict.get(b"Filter").ok()? {
        Object::Name(name) => Some(name.clone()),
        Object::Array(items) if items.len() == 1 => items[0].as_name().ok().map(|n| n.to_vec()),
        _ => None,
    }
}

fn reencode_stream(stream: &Stream, quality: u8) -> Option<Vec<u8>> {
    match single_filter(stream)?.as_slice() {
        b"DCTDecode" => {
            let decoded = image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg).ok()?;
            let color = match decoded.color() {
                ColorType::L8 => ColorType::L8,
                ColorType::Rgb8 => ColorType::Rgb8,
                _ => return None,
            };
            let (width, height) = decoded.dimensions();
            encode_jpeg(decoded.as_bytes(), width, height, color, quality)
        }
        b"FlateDecode" => {
            if stream.dict.has(b"DecodeParms") || stream.dict.has(b"Decode") {
                return None;
            }
            let bits = stream.dict.get(b"BitsPerComponent").and_then(Object::as_i64).ok()?;
            let color = match stream.dict.get(b"ColorSpace").and_then(Object::as_name).ok()? {
                b"DeviceRGB" => ColorType::Rgb8,
                b"DeviceGray" => ColorType::L8,
                _ => return None,
            };
            if bits != 8 {
                return None;
            }

            let width = u32::try_from(stream.dict.get(b"Width").and_then(Object::as_i64).ok()?).ok()?;
            let height = u32::try_from(stream.dict.get(b"Height").and_then(Object::as_i64).ok()?).ok()?;
            let raw = stream.decompressed_content().ok()?;
            let expected = width as usize * height as usize * color.bytes_per_pixel() as usize;
            if raw.len() != expected {
                return None;
            }
            encode_jpeg(&raw, width, height, color, quality)
        }
        _ => None,
    }
}

fn encode_jpeg(pixels: &[u8], width: u32, height: u32, color: ColorType, quality: u8) -> Option<Vec<u8>> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode(pixels, width, height, color)
        .ok()?;
    Some(buffer)
}

/// Applies a compression profile to existing documents, falling back to a
/// second strategy when the first fails.
pub struct Compressor {
    primary: Arc<dyn CompressionStrategy>,
    fallback: Arc<dyn CompressionStrategy>,
    metrics: Arc<PipelineMetrics>,
}

impl Compressor {
    pub fn new(
        primary: Arc<dyn CompressionStrategy>,
        fallback: Arc<dyn CompressionStrategy>,
        metrics: Arc<PipelineMetrics>,
    ) -> Self {
        Compressor {
            primary,
            fallback,
            metrics,
        }
    }

    /// Ghostscript first, in-process re-encode second.
    pub fn with_ghostscript(binary: impl Into<String>, metrics: Arc<PipelineMetrics>) -> Self {
        Self::new(
            Arc::new(GhostscriptStrategy::new(binary)),
            Arc::new(ReencodeStrategy::new()),
            metrics,
        )
    }

    /// Compressed artifacts are never compressed again: the input is mapped
    /// back to the original it was produced from.
    pub fn source_for(input: &Path) -> PipelineResult<PathBuf> {
        let source = original_of(input).unwrap_or_else(|| input.to_path_buf());
        if source.is_file() {
            Ok(source)
        } else {
            Err(PipelineError::SourceNotFound(source))
        }
    }

    pub fn compress(&self, input: &Path, profile: CompressionProfile) -> PipelineResult<CompressionResult> {
        let started = Instant::now();
        let source = Self::source_for(input)?;
        let original_bytes = std::fs::metadata(&source)?.len();
        let output = compressed_path_for(&source, profile);

        let strategy = match attempt(self.primary.as_ref(), &source, &output, profile) {
            Ok(()) => &self.primary,
            Err(primary_error) => {
                discard(&output);
                tracing::warn!(
                    source = %source.display(),
                    profile = %profile,
                    error = %primary_error,
                    strategy = self.primary.name(),
                    "Primary compression failed, using fallback"
                );
                self.metrics.compression_fallbacks.inc();

                if let Err(fallback_error) = attempt(self.fallback.as_ref(), &source, &output, profile) {
                    discard(&output);
                    tracing::error!(
                        source = %source.display(),
                        profile = %profile,
                        error = %fallback_error,
                        "Fallback compression failed"
                    );
                    return Err(PipelineError::CompressionFailed {
                        primary: primary_error.to_string(),
                        fallback: fallback_error.to_string(),
                    });
                }
                &self.fallback
            }
        };

        let compressed_bytes = std::fs::metadata(&output)?.len();
        let result = CompressionResult::new(
            original_bytes,
            compressed_bytes,
            started.elapsed().as_secs_f64(),
            strategy.method(profile),
            output,
        );
        self.metrics.compressions.with_label_values(&[strategy.name()]).inc();

        tracing::info!(
            source = %source.display(),
            output = %result.output_path.display(),
            method = %result.method_used,
            original_kb = result.original_size_kb,
            compressed_kb = result.compressed_size_kb,
            ratio = result.compression_ratio_percent,
            "Compression completed"
        );
        Ok(result)
    }
}

/// Runs `strategy` and accepts its output only if it is a non-empty,
/// loadable PDF. A successful exit says nothing about the file.
fn attempt(
    strategy: &dyn CompressionStrategy,
    source: &Path,
    output: &Path,
    profile: CompressionProfile,
) -> PipelineResult<()> {
    strategy.compress(source, output, profile)?;

    let size = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
    if size == 0 {
        return Err(PipelineError::external_tool(strategy.name(), "produced no output"));
    }
    load_document(output).map_err(|e| {
        PipelineError::external_tool(strategy.name(), format!("produced an unreadable file: {}", e))
    })?;
    Ok(())
}

fn discard(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial output");
        }
    }
}
