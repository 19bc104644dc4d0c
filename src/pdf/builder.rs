use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, StringFormat};

use crate::core::{DocumentMetadata, PipelineResult};

/// Resource name of the regular text font on generated pages.
pub const FONT_REGULAR: &str = "F1";
/// Resource name of the bold text font on generated pages.
pub const FONT_BOLD: &str = "F2";

/// Accumulates content stream operations for one page.
pub struct PageBuilder {
    operations: Vec<Operation>,
}

impl PageBuilder {
    pub fn new() -> Self {
        PageBuilder {
            operations: Vec::new(),
        }
    }

    pub fn add_text(&mut self, font: &str, size: f32, x: f32, y: f32, text: &str) -> &mut Self {
        self.operations.push(Operation::new("BT", vec![]));
        self.operations.push(Operation::new(
            "Tf",
            vec![Object::Name(font.as_bytes().to_vec()), Object::Real(size)],
        ));
        self.operations.push(Operation::new(
            "Td",
            vec![Object::Real(x), Object::Real(y)],
        ));
        self.operations.push(Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(text), StringFormat::Literal)],
        ));
        self.operations.push(Operation::new("ET", vec![]));
        self
    }

    pub fn add_horizontal_line(&mut self, x: f32, y: f32, length: f32, width: f32) -> &mut Self {
        self.operations.push(Operation::new("q", vec![]));
        self.operations.push(Operation::new("w", vec![Object::Real(width)]));
        self.operations.push(Operation::new("m", vec![Object::Real(x), Object::Real(y)]));
        self.operations.push(Operation::new(
            "l",
            vec![Object::Real(x + length), Object::Real(y)],
        ));
        self.operations.push(Operation::new("S", vec![]));
        self.operations.push(Operation::new("Q", vec![]));
        self
    }

    /// Paints image XObject `name` into the rectangle at (x, y), optionally
    /// under graphics state `state`.
    pub fn add_image(
        &mut self,
        name: &str,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        state: Option<&str>,
    ) -> &mut Self {
        self.operations.push(Operation::new("q", vec![]));
        if let Some(state) = state {
            self.operations.push(Operation::new(
                "gs",
                vec![Object::Name(state.as_bytes().to_vec())],
            ));
        }
        self.operations.push(Operation::new(
            "cm",
            vec![
                Object::Real(width),
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(height),
                Object::Real(x),
                Object::Real(y),
            ],
        ));
        self.operations.push(Operation::new(
            "Do",
            vec![Object::Name(name.as_bytes().to_vec())],
        ));
        self.operations.push(Operation::new("Q", vec![]));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    pub fn build(self) -> PipelineResult<Vec<u8>> {
        let content = Content {
            operations: self.operations,
        };
        Ok(content.encode()?)
    }
}

impl Default for PageBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Resources dictionary declaring the standard Helvetica fonts.
pub fn standard_font_resources() -> Dictionary {
    dictionary! {
        "Font" => dictionary! {
            FONT_REGULAR => dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica",
                "Encoding" => "WinAnsiEncoding",
            },
            FONT_BOLD => dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "Helvetica-Bold",
                "Encoding" => "WinAnsiEncoding",
            },
        },
    }
}

/// A standalone document assembled page by page.
pub struct DocumentBuilder {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        DocumentBuilder {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }

    pub fn add_page(
        &mut self,
        width: f32,
        height: f32,
        content: Vec<u8>,
        resources: Dictionary,
    ) -> PipelineResult<ObjectId> {
        let stream = super::objects::flate_stream(Dictionary::new(), &content)?;
        let content_id = self.doc.add_object(stream);
        let resources_id = self.doc.add_object(resources);
        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(width),
                Object::Real(height),
            ],
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        self.kids.push(page_id);
        Ok(page_id)
    }

    pub fn finish(mut self) -> Document {
        let kids: Vec<Object> = self.kids.iter().map(|id| Object::Reference(*id)).collect();
        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => self.kids.len() as i64,
            }),
        );
        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc
    }
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes the Info dictionary of `doc`.
pub fn set_metadata(doc: &mut Document, metadata: &DocumentMetadata) {
    let text = |value: &str| Object::String(encode_win_ansi(value), StringFormat::Literal);

    let mut info = dictionary! {
        "Title" => text(metadata.title.as_str()),
        "Producer" => text(concat!("tender-compiler ", env!("CARGO_PKG_VERSION"))),
        "CreationDate" => text(metadata.pdf_creation_date().as_str()),
    };
    if let Some(subject) = &metadata.subject {
        info.set("Subject", text(subject.as_str()));
    }
    if !metadata.keywords.is_empty() {
        info.set("Keywords", text(metadata.keywords.join(", ").as_str()));
    }

    let info_id = doc.add_object(info);
    doc.trailer.set("Info", info_id);
}

/// Encodes text for the standard 14 fonts with `WinAnsiEncoding`.
/// Characters outside the code page become `?`.
pub fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| match c {
            ' '..='~' => c as u8,
            '\u{a0}'..='\u{ff}' => c as u32 as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            _ => b'?',
        })
        .collect()
}

/// Rough Helvetica advance width, good enough to keep lines inside margins.
pub fn approximate_text_width(text: &str, font_size: f32) -> f32 {
    text.chars().count() as f32 * font_size * 0.52
}

/// Shortens `text` with an ellipsis so it fits in `max_width`.
pub fn fit_text(text: &str, font_size: f32, max_width: f32) -> String {
    if approximate_text_width(text, font_size) <= max_width {
        return text.to_string();
    }
    let max_chars = ((max_width / (font_size * 0.52)).floor() as usize).saturating_sub(3);
    let mut shortened: String = text.chars().take(max_chars).collect();
    shortened.push_str("...");
    shortened
}
