//! PDF fixtures for unit tests.

use lopdf::content::Content;
use lopdf::{Document, Object};
use std::path::Path;

use super::builder::{standard_font_resources, DocumentBuilder, PageBuilder, FONT_REGULAR};
use super::image::embed_image;
use super::save_document;

/// Writes a document whose pages carry the texts `<label>-1`, `<label>-2`, ...
pub fn write_labelled_pdf(path: &Path, label: &str, pages: usize) {
    let mut builder = DocumentBuilder::new();
    for n in 1..=pages {
        let mut page = PageBuilder::new();
        page.add_text(FONT_REGULAR, 14.0, 72.0, 720.0, &format!("{}-{}", label, n));
        builder
            .add_page(595.0, 842.0, page.build().unwrap(), standard_font_resources())
            .unwrap();
    }
    let mut doc = builder.finish();
    save_document(&mut doc, path).unwrap();
}

/// Writes a one-page document holding a `side`x`side` RGB noise image,
/// stored deflated. Noise keeps the deflated stream close to its raw size.
pub fn write_image_pdf(path: &Path, side: u32) {
    let mut seed: u32 = 0x2545_f491;
    let noise = image::RgbImage::from_fn(side, side, |_, _| {
        let mut channel = || {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            (seed >> 16) as u8
        };
        image::Rgb([channel(), channel(), channel()])
    });

    let mut builder = DocumentBuilder::new();
    let embedded = embed_image(builder.document_mut(), &image::DynamicImage::ImageRgb8(noise)).unwrap();

    let mut page = PageBuilder::new();
    page.add_text(FONT_REGULAR, 14.0, 72.0, 760.0, "scan");
    page.add_image("Im0", 72.0, 300.0, 400.0, 400.0, None);
    let mut resources = standard_font_resources();
    resources.set("XObject", lopdf::dictionary! { "Im0" => embedded.id });
    builder
        .add_page(595.0, 842.0, page.build().unwrap(), resources)
        .unwrap();

    let mut doc = builder.finish();
    save_document(&mut doc, path).unwrap();
}

/// Literal strings shown on each page, in page order.
pub fn page_texts(doc: &Document) -> Vec<Vec<String>> {
    doc.get_pages()
        .values()
        .map(|page_id| {
            let raw = doc.get_page_content(*page_id).unwrap();
            let content = Content::decode(&raw).unwrap();
            content
                .operations
                .iter()
                .filter(|op| op.operator == "Tj")
                .filter_map(|op| match op.operands.first() {
                    Some(Object::String(bytes, _)) => Some(String::from_utf8_lossy(bytes).to_string()),
                    _ => None,
                })
                .collect()
        })
        .collect()
}

/// First text of every page; handy for checking page order.
pub fn first_texts(doc: &Document) -> Vec<String> {
    page_texts(doc)
        .into_iter()
        .map(|texts| texts.into_iter().next().unwrap_or_default())
        .collect()
}
