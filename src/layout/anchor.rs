//! Placement of image references in paged text.

use super::model::Page;

/// Put `tag` where the figure's source text sits, or at the end of its page.
///
/// Lookup order: first occurrence on the figure's own page, then the first
/// page in document order that contains the text, then an append to the
/// figure's page (or the first page when that page does not exist). Returns
/// `false` only when there are no pages at all.
pub fn place_image_tag(pages: &mut [Page], page_number: u32, source_text: &str, tag: &str) -> bool {
    if !source_text.is_empty() {
        let own_page = pages
            .iter()
            .position(|p| p.page_number == page_number && p.content.contains(source_text));
        let target = own_page.or_else(|| pages.iter().position(|p| p.content.contains(source_text)));
        if let Some(idx) = target {
            let page = &mut pages[idx];
            page.content = page.content.replacen(source_text, tag, 1);
            return true;
        }
    }

    let idx = pages
        .iter()
        .position(|p| p.page_number == page_number)
        .unwrap_or(0);
    let Some(page) = pages.get_mut(idx) else {
        return false;
    };
    let existing = page.content.trim_end();
    page.content = if existing.is_empty() {
        format!("{tag}\n")
    } else {
        format!("{existing}\n\n{tag}\n")
    };
    true
}
