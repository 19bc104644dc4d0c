use image::{ColorType, DynamicImage, GenericImageView, ImageFormat};
use lopdf::{dictionary, Document, ObjectId, Stream};
use std::path::Path;

use super::builder::{DocumentBuilder, PageBuilder};
use super::objects::flate_stream;
use crate::core::{mm_to_pt, PageSize, PipelineResult};

/// Margin around an image placed on its own page, in millimetres.
const IMAGE_PAGE_MARGIN_MM: f32 = 15.0;

/// An image stored in a document as an XObject.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedImage {
    pub id: ObjectId,
    pub width: u32,
    pub height: u32,
}

impl EmbeddedImage {
    /// Height divided by width.
    pub fn aspect(&self) -> f32 {
        if self.width == 0 {
            1.0
        } else {
            self.height as f32 / self.width as f32
        }
    }
}

pub fn is_image_path(path: &Path) -> bool {
    matches!(
        path.extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .as_deref(),
        Some("png") | Some("jpg") | Some("jpeg")
    )
}

/// Embeds the image file at `path`. JPEG data is stored as-is; everything
/// else is decoded and stored deflated, with its alpha channel as a soft mask.
pub fn embed_image_file(doc: &mut Document, path: &Path) -> PipelineResult<EmbeddedImage> {
    let bytes = std::fs::read(path)?;
    let format = image::guess_format(&bytes)?;
    let decoded = image::load_from_memory_with_format(&bytes, format)?;

    if format == ImageFormat::Jpeg {
        if let Some(color_space) = jpeg_color_space(decoded.color()) {
            let (width, height) = decoded.dimensions();
            let mut stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => color_space,
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                bytes,
            );
            stream.allows_compression = false;
            let id = doc.add_object(stream);
            return Ok(EmbeddedImage { id, width, height });
        }
    }

    embed_image(doc, &decoded)
}

/// Pixel count widened before multiplying; `u32` sides overflow past 65535².
fn pixel_count(width: u32, height: u32) -> usize {
    (width as usize).saturating_mul(height as usize)
}

pub fn embed_image(doc: &mut Document, image: &DynamicImage) -> PipelineResult<EmbeddedImage> {
    let rgba = image.to_rgba8();
    let (width, height) = rgba.dimensions();

    let pixels = pixel_count(width, height);
    let mut rgb = Vec::with_capacity(pixels.saturating_mul(3));
    let mut alpha = Vec::with_capacity(pixels);
    for pixel in rgba.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
    };

    if alpha.iter().any(|a| *a != u8::MAX) {
        let mask = flate_stream(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            &alpha,
        )?;
        let mask_id = doc.add_object(mask);
        dict.set("SMask", mask_id);
    }

    let id = doc.add_object(flate_stream(dict, &rgb)?);
    Ok(EmbeddedImage { id, width, height })
}

/// A one-page A4 document showing the image at `path`, scaled to fit inside
/// the page margins and centred.
pub fn image_document(path: &Path) -> PipelineResult<Document> {
    let (page_w, page_h) = PageSize::A4.dimensions_pt();
    let margin = mm_to_pt(IMAGE_PAGE_MARGIN_MM);

    let mut builder = DocumentBuilder::new();
    let image = embed_image_file(builder.document_mut(), path)?;

    let (box_w, box_h) = (page_w - 2.0 * margin, page_h - 2.0 * margin);
    let natural_w = image.width.max(1) as f32;
    let natural_h = image.height.max(1) as f32;
    let scale = (box_w / natural_w).min(box_h / natural_h);
    let (width, height) = (natural_w * scale, natural_h * scale);

    let mut page = PageBuilder::new();
    page.add_image(
        "Im0",
        (page_w - width) / 2.0,
        (page_h - height) / 2.0,
        width,
        height,
        None,
    );
    let resources = dictionary! {
        "XObject" => dictionary! { "Im0" => image.id },
    };
    builder.add_page(page_w, page_h, page.build()?, resources)?;
    Ok(builder.finish())
}

fn jpeg_color_space(color: ColorType) -> Option<&'static str> {
    match color {
        ColorType::L8 => Some("DeviceGray"),
        ColorType::Rgb8 => Some("DeviceRGB"),
        _ => None,
    }
}
