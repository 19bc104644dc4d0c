use lopdf::{dictionary, Document, Object, ObjectId};

use crate::core::PipelineResult;
use crate::models::{Outcome, SkipReason, StampOptions, StampPosition, StampScope};
use crate::pdf::builder::PageBuilder;
use crate::pdf::image::{embed_image_file, EmbeddedImage};
use crate::pdf::objects::{add_resource, owned_resources, page_box, unused_resource_name, wrap_page_content};

/// Distance kept between the stamp and the page edge, in points.
const EDGE_INSET: f32 = 18.0;

/// Rectangle `(x, y, width, height)` for a stamp of the given aspect on a
/// page box `(x0, y0, width, height)`.
pub fn stamp_rect(
    page: (f32, f32, f32, f32),
    position: StampPosition,
    scale: f32,
    aspect: f32,
) -> (f32, f32, f32, f32) {
    let (x0, y0, page_w, page_h) = page;

    let mut width = page_w * scale;
    let mut height = width * aspect;
    let max_height = (page_h - 2.0 * EDGE_INSET).max(1.0);
    if height > max_height {
        height = max_height;
        width = height / aspect.max(f32::EPSILON);
    }

    let left = x0 + EDGE_INSET;
    let right = x0 + page_w - EDGE_INSET - width;
    let bottom = y0 + EDGE_INSET;
    let top = y0 + page_h - EDGE_INSET - height;

    let (x, y) = match position {
        StampPosition::BottomRight => (right, bottom),
        StampPosition::BottomLeft => (left, bottom),
        StampPosition::TopRight => (right, top),
        StampPosition::TopLeft => (left, top),
        StampPosition::Center => (x0 + (page_w - width) / 2.0, y0 + (page_h - height) / 2.0),
    };
    (x, y, width, height)
}

/// Draws the configured stamp on the pages of `doc`. `index_pages` leading
/// pages are left alone when the scope is [`StampScope::ContentOnly`].
///
/// Never fails: a missing or unusable image is reported as a skip.
pub fn apply_stamp(doc: &mut Document, options: Option<&StampOptions>, index_pages: usize) -> Outcome {
    let Some((options, image_path)) = options.and_then(|o| o.image_path.as_ref().map(|p| (o, p))) else {
        return Outcome::Skipped(SkipReason::NoStampConfigured);
    };

    if !image_path.is_file() {
        let reason = SkipReason::StampUnreadable(format!("{} does not exist", image_path.display()));
        tracing::warn!(path = %image_path.display(), "Stamp image missing, skipping overlay");
        return Outcome::Skipped(reason);
    }

    let image = match embed_image_file(doc, image_path) {
        Ok(image) => image,
        Err(e) => {
            tracing::warn!(path = %image_path.display(), error = %e, "Stamp image unreadable, skipping overlay");
            return Outcome::Skipped(SkipReason::StampUnreadable(e.to_string()));
        }
    };

    let skip = match options.scope {
        StampScope::AllPages => 0,
        StampScope::ContentOnly => index_pages,
    };

    match stamp_pages(doc, &image, options, skip) {
        Ok(stamped) => {
            tracing::info!(pages = stamped, position = ?options.position, "Applied stamp overlay");
            Outcome::Included
        }
        Err(e) => {
            tracing::warn!(error = %e, "Stamp overlay failed");
            Outcome::Skipped(SkipReason::StampUnreadable(e.to_string()))
        }
    }
}

fn stamp_pages(
    doc: &mut Document,
    image: &EmbeddedImage,
    options: &StampOptions,
    skip: usize,
) -> PipelineResult<usize> {
    let (opacity, scale) = options.normalized();
    let state_id = doc.add_object(dictionary! {
        "Type" => "ExtGState",
        "ca" => Object::Real(opacity),
        "CA" => Object::Real(opacity),
    });

    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().skip(skip).collect();
    for page_id in &page_ids {
        stamp_page(doc, *page_id, image, state_id, options.position, scale)?;
    }
    Ok(page_ids.len())
}

fn stamp_page(
    doc: &mut Document,
    page_id: ObjectId,
    image: &EmbeddedImage,
    state_id: ObjectId,
    position: StampPosition,
    scale: f32,
) -> PipelineResult<()> {
    let mut resources = owned_resources(doc, page_id);
    let image_name = unused_resource_name(&resources, "XObject", "Stamp");
    let state_name = unused_resource_name(&resources, "ExtGState", "StampGS");
    add_resource(&mut resources, "XObject", &image_name, Object::Reference(image.id));
    add_resource(&mut resources, "ExtGState", &state_name, Object::Reference(state_id));

    let (x, y, width, height) = stamp_rect(page_box(doc, page_id), position, scale, image.aspect());
    let mut overlay = PageBuilder::new();
    overlay.add_image(&image_name, x, y, width, height, Some(&state_name));

    let mut suffix = b"\nQ\n".to_vec();
    suffix.extend(overlay.build()?);
    wrap_page_content(doc, page_id, b"q\n".to_vec(), suffix)?;

    doc.get_object_mut(page_id)?
        .as_dict_mut()?
        .set("Resources", Object::Dictionary(resources));
    Ok(())
}
