use lopdf::Document;

use crate::core::{mm_to_pt, IndexLayout, PipelineError, PipelineResult};
use crate::pdf::builder::{
    fit_text, standard_font_resources, DocumentBuilder, PageBuilder, FONT_BOLD, FONT_REGULAR,
};

#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub order: i64,
    pub display_name: String,
}

impl IndexEntry {
    pub fn new(order: i64, display_name: impl Into<String>) -> Self {
        IndexEntry {
            order,
            display_name: display_name.into(),
        }
    }
}

/// Entry lines `"<label>. <name>"`, sorted by order (stable), labelled from
/// `start_from` upwards. Labels start at 1 and must fit in an `i64`.
pub fn index_lines(entries: &[IndexEntry], start_from: i64) -> PipelineResult<Vec<String>> {
    if start_from < 1 {
        return Err(PipelineError::InvalidRequest(format!(
            "index numbering must start at 1 or above, got {}",
            start_from
        )));
    }

    let mut sorted: Vec<&IndexEntry> = entries.iter().collect();
    sorted.sort_by_key(|entry| entry.order);

    sorted
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let label = i64::try_from(i)
                .ok()
                .and_then(|offset| start_from.checked_add(offset))
                .ok_or_else(|| {
                    PipelineError::InvalidRequest(format!(
                        "index numbering from {} overflows at entry {}",
                        start_from,
                        i + 1
                    ))
                })?;
            Ok(format!("{}. {}", label, entry.display_name))
        })
        .collect()
}

/// Renders the index as one or more pages. The title heads the first page;
/// continuation pages repeat it with a "(continued)" suffix.
pub fn build_index_document(
    title: &str,
    entries: &[IndexEntry],
    start_from: i64,
    layout: &IndexLayout,
) -> PipelineResult<Document> {
    let lines = index_lines(entries, start_from)?;
    let (width, height) = layout.page_size.dimensions_pt();
    let left = mm_to_pt(layout.margin.left);
    let text_width = width - left - mm_to_pt(layout.margin.right);
    let top = height - mm_to_pt(layout.margin.top);

    let per_page = layout.entries_per_page();
    let mut chunks: Vec<&[String]> = lines.chunks(per_page).collect();
    if chunks.is_empty() {
        chunks.push(&[]);
    }

    let mut builder = DocumentBuilder::new();
    for (page_number, chunk) in chunks.iter().enumerate() {
        let heading = if page_number == 0 {
            title.to_string()
        } else {
            format!("{} (continued)", title)
        };

        let mut page = PageBuilder::new();
        let title_y = top - layout.title_font_size;
        page.add_text(
            FONT_BOLD,
            layout.title_font_size,
            left,
            title_y,
            &fit_text(&heading, layout.title_font_size, text_width),
        );
        page.add_horizontal_line(left, title_y - layout.title_font_size * 0.6, text_width, 0.75);

        let mut y = top - layout.title_block_height() - layout.font_size;
        for line in chunk.iter() {
            page.add_text(
                FONT_REGULAR,
                layout.font_size,
                left,
                y,
                &fit_text(line, layout.font_size, text_width),
            );
            y -= layout.line_advance();
        }

        builder.add_page(width, height, page.build()?, standard_font_resources())?;
    }

    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PageSize;
    use crate::pdf::fixtures::page_texts;

    #[test]
    fn test_lines_sorted_and_numbered_from_start() {
        let entries = vec![IndexEntry::new(2, "A"), IndexEntry::new(1, "B")];
        assert_eq!(index_lines(&entries, 5).unwrap(), vec!["5. B", "6. A"]);
    }

    #[test]
    fn test_ties_keep_original_order() {
        let entries = vec![
            IndexEntry::new(3, "third"),
            IndexEntry::new(1, "first-x"),
            IndexEntry::new(1, "first-y"),
        ];
        assert_eq!(
            index_lines(&entries, 1).unwrap(),
            vec!["1. first-x", "2. first-y", "3. third"]
        );
    }

    #[test]
    fn test_numbering_bounds() {
        let entries = vec![IndexEntry::new(1, "X"), IndexEntry::new(2, "Y")];
        assert!(matches!(index_lines(&entries, 0), Err(PipelineError::InvalidRequest(_))));
        assert!(matches!(index_lines(&entries, -3), Err(PipelineError::InvalidRequest(_))));
        assert!(matches!(
            index_lines(&entries, i64::MAX),
            Err(PipelineError::InvalidRequest(_))
        ));
        assert_eq!(
            index_lines(&entries, i64::MAX - 1).unwrap(),
            vec![format!("{}. X", i64::MAX - 1), format!("{}. Y", i64::MAX)]
        );
        assert!(build_index_document("T", &entries, i64::MAX, &IndexLayout::default()).is_err());
    }

    #[test]
    fn test_single_page_index_document() {
        let entries = vec![IndexEntry::new(2, "A"), IndexEntry::new(1, "B")];
        let doc = build_index_document("Bid (Technical)", &entries, 5, &IndexLayout::default()).unwrap();

        let texts = page_texts(&doc);
        assert_eq!(texts.len(), 1);
        assert_eq!(texts[0], vec!["Bid (Technical)", "5. B", "6. A"]);
    }

    #[test]
    fn test_long_index_continues_on_next_page() {
        let layout = IndexLayout::builder()
            .page_size(PageSize::Custom(100.0, 110.0))
            .build();
        let per_page = layout.entries_per_page();
        let entries: Vec<IndexEntry> = (0..(per_page as i64 + 2))
            .map(|i| IndexEntry::new(i, format!("doc{}", i)))
            .collect();

        let doc = build_index_document("T", &entries, 1, &layout).unwrap();
        let texts = page_texts(&doc);
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[1][0], "T (continued)");
        assert_eq!(texts[1].len(), 3);
        assert_eq!(texts[1][2], format!("{}. doc{}", per_page + 2, per_page + 1));
    }

    #[test]
    fn test_empty_index_still_has_a_page() {
        let doc = build_index_document("Empty", &[], 1, &IndexLayout::default()).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }
}
