use lopdf::{dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;
use std::path::Path;

use super::objects::materialize_inherited;
use crate::core::{PipelineError, PipelineResult};

/// Object types that belong to a source's document structure rather than to
/// its pages; they are rebuilt for the combined output.
const STRUCTURAL_TYPES: [&[u8]; 4] = [b"Catalog", b"Pages", b"Outlines", b"Outline"];

pub fn load_document(path: &Path) -> PipelineResult<Document> {
    let doc = Document::load(path)?;
    if doc.get_pages().is_empty() {
        return Err(PipelineError::EmptyDocument(path.to_path_buf()));
    }
    Ok(doc)
}

/// Serialises `doc` to `path`, creating parent directories. Returns the size
/// written in bytes.
pub fn save_document(doc: &mut Document, path: &Path) -> PipelineResult<u64> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| PipelineError::output_write(path, e))?;
    }

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    std::fs::write(path, &buffer).map_err(|e| PipelineError::output_write(path, e))?;
    Ok(buffer.len() as u64)
}

fn object_type(object: &Object) -> Option<&[u8]> {
    object
        .as_dict()
        .and_then(|dict| dict.get(b"Type"))
        .and_then(Object::as_name)
        .ok()
}

/// Concatenates the pages of `documents`, in order, into a new document.
/// Within each source the page order is preserved.
pub fn concat_documents(documents: Vec<Document>) -> PipelineResult<Document> {
    let mut next_id = 1;
    let mut pages: Vec<(ObjectId, Object)> = Vec::new();
    let mut objects: BTreeMap<ObjectId, Object> = BTreeMap::new();

    for mut doc in documents {
        doc.renumber_objects_with(next_id);
        next_id = doc.max_id + 1;

        let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
        for page_id in page_ids {
            materialize_inherited(&mut doc, page_id)?;
            pages.push((page_id, doc.get_object(page_id)?.clone()));
        }
        objects.extend(doc.objects);
    }

    let mut output = Document::with_version("1.5");
    for (id, object) in objects {
        let structural = object_type(&object)
            .map(|kind| STRUCTURAL_TYPES.contains(&kind))
            .unwrap_or(false);
        if !structural {
            output.objects.insert(id, object);
        }
    }
    output.max_id = next_id;

    let pages_id = output.new_object_id();
    let kids: Vec<Object> = pages.iter().map(|(id, _)| Object::Reference(*id)).collect();
    let count = pages.len() as i64;

    for (id, mut page) in pages {
        if let Ok(dict) = page.as_dict_mut() {
            dict.set("Parent", pages_id);
        }
        output.objects.insert(id, page);
    }

    output.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = output.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    output.trailer.set("Root", catalog_id);

    output.prune_objects();
    Ok(output)
}
