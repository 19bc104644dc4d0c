use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::io::Write;

use crate::core::{PageSize, PipelineResult};

/// Attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&str; 4] = ["Resources", "MediaBox", "CropBox", "Rotate"];

const MAX_TREE_DEPTH: usize = 64;

pub fn as_number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

/// Follows one level of indirection.
pub fn deref<'a>(doc: &'a Document, object: &'a Object) -> &'a Object {
    match object {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(object),
        _ => object,
    }
}

/// Value of `key` on the page or the nearest ancestor that defines it.
pub fn inherited_attribute(doc: &Document, page_id: ObjectId, key: &str) -> Option<Object> {
    let mut current = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key.as_bytes()) {
            return Some(value.clone());
        }
        let parent = current.get(b"Parent").and_then(Object::as_reference).ok()?;
        current = doc.get_dictionary(parent).ok()?;
    }
    None
}

/// Copies inherited attributes onto the page itself so it keeps its
/// geometry and resources once it is moved under a different page tree.
pub fn materialize_inherited(doc: &mut Document, page_id: ObjectId) -> PipelineResult<()> {
    let missing: Vec<(&str, Object)> = {
        let page = doc.get_dictionary(page_id)?;
        INHERITABLE
            .iter()
            .filter(|key| !page.has(key.as_bytes()))
            .filter_map(|key| inherited_attribute(doc, page_id, key).map(|value| (*key, value)))
            .collect()
    };

    if missing.is_empty() {
        return Ok(());
    }

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    for (key, value) in missing {
        page.set(key, value);
    }
    Ok(())
}

/// Page rectangle as `(x0, y0, width, height)`; A4 when none is declared.
pub fn page_box(doc: &Document, page_id: ObjectId) -> (f32, f32, f32, f32) {
    let fallback = {
        let (w, h) = PageSize::A4.dimensions_pt();
        (0.0, 0.0, w, h)
    };

    let Some(value) = inherited_attribute(doc, page_id, "MediaBox") else {
        return fallback;
    };
    let Ok(items) = deref(doc, &value).as_array() else {
        return fallback;
    };
    let numbers: Vec<f32> = items
        .iter()
        .filter_map(|item| as_number(deref(doc, item)))
        .collect();

    match numbers.as_slice() {
        [x0, y0, x1, y1] if x1 != x0 && y1 != y0 => {
            (x0.min(*x1), y0.min(*y1), (x1 - x0).abs(), (y1 - y0).abs())
        }
        _ => fallback,
    }
}

/// An owned copy of the page's resources with the sub-dictionaries that get
/// extended (`XObject`, `ExtGState`, `Font`) inlined.
pub fn owned_resources(doc: &Document, page_id: ObjectId) -> Dictionary {
    let mut resources = match inherited_attribute(doc, page_id, "Resources") {
        Some(Object::Dictionary(dict)) => dict,
        Some(Object::Reference(id)) => doc
            .get_dictionary(id)
            .cloned()
            .unwrap_or_else(|_| Dictionary::new()),
        _ => Dictionary::new(),
    };

    for key in ["XObject", "ExtGState", "Font"] {
        let referenced = resources.get(key.as_bytes()).and_then(Object::as_reference);
        if let Ok(id) = referenced {
            let inlined = doc
                .get_dictionary(id)
                .cloned()
                .unwrap_or_else(|_| Dictionary::new());
            resources.set(key, Object::Dictionary(inlined));
        }
    }
    resources
}

/// Adds `value` under `/category/name` of a resources dictionary.
pub fn add_resource(resources: &mut Dictionary, category: &str, name: &str, value: Object) {
    let mut entries = match resources.get(category.as_bytes()) {
        Ok(Object::Dictionary(dict)) => dict.clone(),
        _ => Dictionary::new(),
    };
    entries.set(name, value);
    resources.set(category, Object::Dictionary(entries));
}

/// First resource name `<prefix><n>` not yet used in `category`.
pub fn unused_resource_name(resources: &Dictionary, category: &str, prefix: &str) -> String {
    let existing = resources
        .get(category.as_bytes())
        .and_then(Object::as_dict)
        .ok();
    (0..)
        .map(|n| format!("{}{}", prefix, n))
        .find(|name| existing.map_or(true, |dict| !dict.has(name.as_bytes())))
        .unwrap_or_else(|| prefix.to_string())
}

/// Wraps the page's existing content between `prefix` and `suffix` streams.
pub fn wrap_page_content(
    doc: &mut Document,
    page_id: ObjectId,
    prefix: Vec<u8>,
    suffix: Vec<u8>,
) -> PipelineResult<()> {
    let existing: Vec<Object> = {
        let page = doc.get_dictionary(page_id)?;
        match page.get(b"Contents") {
            Ok(Object::Reference(id)) => match doc.get_object(*id) {
                Ok(Object::Array(items)) => items.clone(),
                _ => vec![Object::Reference(*id)],
            },
            Ok(Object::Array(items)) => items.clone(),
            _ => Vec::new(),
        }
    };

    let prefix_id = doc.add_object(Stream::new(Dictionary::new(), prefix));
    let suffix_id = doc.add_object(Stream::new(Dictionary::new(), suffix));

    let mut contents = Vec::with_capacity(existing.len() + 2);
    contents.push(Object::Reference(prefix_id));
    contents.extend(existing);
    contents.push(Object::Reference(suffix_id));

    let page = doc.get_object_mut(page_id)?.as_dict_mut()?;
    page.set("Contents", Object::Array(contents));
    Ok(())
}

pub fn deflate(data: &[u8], level: u32) -> PipelineResult<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::new(level));
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Stream whose content is deflated and tagged `FlateDecode`.
pub fn flate_stream(mut dict: Dictionary, data: &[u8]) -> PipelineResult<Stream> {
    let compressed = deflate(data, 6)?;
    dict.set("Filter", "FlateDecode");
    let mut stream = Stream::new(dict, compressed);
    stream.allows_compression = false;
    Ok(stream)
}

pub fn page_count(doc: &Document) -> usize {
    doc.get_pages().len()
}
