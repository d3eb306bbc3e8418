//! Rebuild the content buffer with merged tables in place of their fragments.

use super::model::{ContentBuffer, Page, PAGE_BREAK};
use super::table_merge::MergedTableGroup;

/// Replace each group's offset range with its merged table followed by the
/// remark (the text that used to sit between the fragments).
///
/// Groups must be ordered and non-overlapping, as produced by
/// [`super::table_merge::TableMergeAnalyzer::merge_groups`]. With no groups
/// the content comes back unchanged.
#[must_use]
pub fn splice(buffer: &ContentBuffer<'_>, groups: &[MergedTableGroup]) -> String {
    if groups.is_empty() {
        return buffer.as_str().to_string();
    }

    let mut out = String::with_capacity(buffer.as_str().len());
    let mut cursor = 0;
    for group in groups {
        out.push_str(buffer.slice(cursor, group.offset_range.min));
        out.push_str(&group.merged_content);
        out.push_str(&group.remark);
        cursor = cursor.max(group.offset_range.max);
    }
    out.push_str(buffer.slice(cursor, buffer.char_len()));
    out
}

/// Split restructured text on page-break markers into pages numbered from 1.
///
/// Empty text still yields one empty page.
#[must_use]
pub fn split_pages(content: &str) -> Vec<Page> {
    content
        .split(PAGE_BREAK)
        .zip(1..)
        .map(|(text, page_number)| Page {
            page_number,
            content: text.to_string(),
        })
        .collect()
}
