//! Detection of tables split across a page boundary.
//!
//! A table that runs off the bottom of one page comes back from layout
//! analysis as two (or more) tables. Each table is paired with the eligible
//! table before it when it starts exactly one page later; the pair is then
//! classified as a vertical continuation (same columns, repeated header), a
//! horizontal continuation (same rows, the first table touches the right edge
//! and the second the left edge) or unrelated.
//!
//! Geometry checks never fail the document: any inconsistency in page sizes
//! or polygons makes the pair unmergeable.

use thiserror::Error;
use tracing::debug;

use super::model::{AnalyzeResult, ContentBuffer, Table};
use super::table_content;
use super::LayoutSettings;

/// How the second table of a pair continues the first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeKind {
    /// Stacked: more rows of the same columns.
    Vertical,
    /// Side by side: more columns of the same rows.
    Horizontal,
}

/// Offsets covering every span of one table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableIntegralSpan {
    pub min_offset: usize,
    pub max_offset: usize,
}

impl TableIntegralSpan {
    /// `None` for a table without spans; such tables never merge.
    #[must_use]
    pub fn of(table: &Table) -> Option<Self> {
        let min_offset = table.spans.iter().map(|s| s.offset).min()?;
        let max_offset = table.spans.iter().map(|s| s.end()).max()?;
        Some(Self {
            min_offset,
            max_offset,
        })
    }
}

/// A pair of page-adjacent tables worth classifying.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeCandidate {
    pub prev_table_index: usize,
    pub next_table_index: usize,
    /// End of the previous table.
    pub gap_start: usize,
    /// Start of the next table.
    pub gap_end: usize,
    pub min_offset: usize,
    pub max_offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OffsetRange {
    pub min: usize,
    pub max: usize,
}

/// A run of consecutive tables merged into one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedTableGroup {
    /// Contiguous, increasing table indices.
    pub table_indices: Vec<usize>,
    /// From the first table's start to the last table's end.
    pub offset_range: OffsetRange,
    pub merged_content: String,
    /// Text that sat between the fragments, kept after the merged table.
    pub remark: String,
}

impl MergedTableGroup {
    #[must_use]
    pub fn last_index(&self) -> Option<usize> {
        self.table_indices.last().copied()
    }
}

/// Reasons a geometry check could not be evaluated.
#[derive(Debug, Error)]
pub enum GeometryError {
    #[error("table {0} does not exist")]
    MissingTable(usize),

    #[error("page {0} not found in result")]
    MissingPage(u32),

    #[error("page {0} has zero width")]
    ZeroWidth(u32),

    #[error("polygon on page {page} has {len} coordinates, need 8")]
    ShortPolygon { page: u32, len: usize },

    #[error("table {0} has no bounding regions")]
    NoRegions(usize),
}

/// Classifies page-adjacent table pairs and accumulates merge groups.
pub struct TableMergeAnalyzer<'a> {
    result: &'a AnalyzeResult,
    buffer: &'a ContentBuffer<'a>,
    settings: &'a LayoutSettings,
    spans: Vec<Option<TableIntegralSpan>>,
}

impl<'a> TableMergeAnalyzer<'a> {
    #[must_use]
    pub fn new(
        result: &'a AnalyzeResult,
        buffer: &'a ContentBuffer<'a>,
        settings: &'a LayoutSettings,
    ) -> Self {
        let spans = result.tables.iter().map(TableIntegralSpan::of).collect();
        Self {
            result,
            buffer,
            settings,
            spans,
        }
    }

    /// Integral span of every table, in table order.
    #[must_use]
    pub fn integral_spans(&self) -> &[Option<TableIntegralSpan>] {
        &self.spans
    }

    /// Pairs of consecutive tables where the second starts one page after
    /// the first.
    ///
    /// Tables without spans or bounding regions are skipped and do not become
    /// the "previous" table; a pair is only registered when the second table
    /// is the immediate successor of the first.
    #[must_use]
    pub fn candidates(&self) -> Vec<MergeCandidate> {
        let mut candidates = Vec::new();
        let mut prev: Option<(usize, u32, usize)> = None;

        for (idx, table) in self.result.tables.iter().enumerate() {
            let (Some(span), Some(page)) = (self.spans[idx], table.first_page()) else {
                continue;
            };
            if let Some((prev_idx, prev_page, prev_max)) = prev {
                if page == prev_page + 1 && idx == prev_idx + 1 {
                    candidates.push(MergeCandidate {
                        prev_table_index: prev_idx,
                        next_table_index: idx,
                        gap_start: prev_max,
                        gap_end: span.min_offset,
                        min_offset: span.min_offset,
                        max_offset: span.max_offset,
                    });
                }
            }
            prev = Some((idx, page, span.max_offset));
        }

        candidates
    }

    /// Decide whether a candidate pair merges, and how.
    ///
    /// Vertical continuation is checked first and wins when both match.
    #[must_use]
    pub fn classify(&self, candidate: &MergeCandidate) -> Option<MergeKind> {
        if self.has_body_text_between(candidate.gap_start, candidate.gap_end) {
            debug!(prev = candidate.prev_table_index, "body text between tables");
            return None;
        }

        match self.either_is_banner(candidate) {
            Ok(false) => {}
            Ok(true) => return None,
            Err(e) => {
                debug!(prev = candidate.prev_table_index, error = %e, "banner check failed");
                return None;
            }
        }

        let prev = &self.result.tables[candidate.prev_table_index];
        let next = &self.result.tables[candidate.next_table_index];
        if prev.column_count == next.column_count && headers_match(prev, next) {
            return Some(MergeKind::Vertical);
        }

        match self.is_horizontal_continuation(candidate) {
            Ok(true) => Some(MergeKind::Horizontal),
            Ok(false) => None,
            Err(e) => {
                debug!(prev = candidate.prev_table_index, error = %e, "orientation check failed");
                None
            }
        }
    }

    /// Run every candidate and build the merge groups in document order.
    #[must_use]
    pub fn merge_groups(&self) -> Vec<MergedTableGroup> {
        let mut groups: Vec<MergedTableGroup> = Vec::new();

        for candidate in self.candidates() {
            let Some(kind) = self.classify(&candidate) else {
                continue;
            };
            let (Some(prev_span), Some(next_span)) = (
                self.spans[candidate.prev_table_index],
                self.spans[candidate.next_table_index],
            ) else {
                continue;
            };

            let remark = self.buffer.slice(prev_span.max_offset, next_span.min_offset);
            let next_content = self.buffer.slice(next_span.min_offset, next_span.max_offset);

            match groups.last_mut() {
                Some(group) if group.last_index() == Some(candidate.prev_table_index) => {
                    group.table_indices.push(candidate.next_table_index);
                    group.offset_range.max = next_span.max_offset;
                    group.merged_content =
                        table_content::merge(kind, &group.merged_content, next_content);
                    group.remark.push_str(remark);
                }
                _ => {
                    let prev_content =
                        self.buffer.slice(prev_span.min_offset, prev_span.max_offset);
                    groups.push(MergedTableGroup {
                        table_indices: vec![
                            candidate.prev_table_index,
                            candidate.next_table_index,
                        ],
                        offset_range: OffsetRange {
                            min: prev_span.min_offset,
                            max: next_span.max_offset,
                        },
                        merged_content: table_content::merge(kind, prev_content, next_content),
                        remark: remark.trim().to_string(),
                    });
                }
            }
        }

        groups
    }

    /// A paragraph that starts strictly inside the gap and is not page
    /// furniture means the tables are separated by real text.
    fn has_body_text_between(&self, start: usize, end: usize) -> bool {
        self.result.paragraphs.iter().any(|p| {
            p.spans.iter().any(|s| s.offset > start && s.offset < end)
                && !p.role.is_some_and(|r| r.is_page_furniture())
        })
    }

    fn either_is_banner(&self, candidate: &MergeCandidate) -> Result<bool, GeometryError> {
        Ok(self.is_banner(candidate.prev_table_index)? || self.is_banner(candidate.next_table_index)?)
    }

    /// A small table in the top band of its page, such as a letterhead.
    fn is_banner(&self, table_idx: usize) -> Result<bool, GeometryError> {
        let table = self
            .result
            .tables
            .get(table_idx)
            .ok_or(GeometryError::MissingTable(table_idx))?;
        if table.row_count > self.settings.banner_max_rows
            || table.column_count > self.settings.banner_max_columns
        {
            return Ok(false);
        }

        for region in &table.bounding_regions {
            let page = self
                .result
                .page(region.page_number)
                .ok_or(GeometryError::MissingPage(region.page_number))?;
            let top_y = region
                .polygon
                .iter()
                .skip(1)
                .step_by(2)
                .copied()
                .reduce(f64::min)
                .unwrap_or(0.0);
            let top_rate = if page.height > 0.0 {
                top_y / page.height
            } else {
                0.0
            };
            if top_rate < self.settings.banner_top_ratio {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Same row count, the first table reaches the right page edge on every
    /// region and the second starts at the left edge on every region.
    fn is_horizontal_continuation(&self, candidate: &MergeCandidate) -> Result<bool, GeometryError> {
        let prev = &self.result.tables[candidate.prev_table_index];
        let next = &self.result.tables[candidate.next_table_index];
        if prev.row_count != next.row_count {
            return Ok(false);
        }
        if prev.bounding_regions.is_empty() {
            return Err(GeometryError::NoRegions(candidate.prev_table_index));
        }
        if next.bounding_regions.is_empty() {
            return Err(GeometryError::NoRegions(candidate.next_table_index));
        }

        for region in &prev.bounding_regions {
            let (width, poly) = self.region_geometry(region.page_number, &region.polygon)?;
            let x_right = poly[2].max(poly[4]);
            if x_right / width <= self.settings.right_cover_ratio {
                return Ok(false);
            }
        }
        for region in &next.bounding_regions {
            let (width, poly) = self.region_geometry(region.page_number, &region.polygon)?;
            let x_left = poly[0].min(poly[6]);
            if x_left / width >= self.settings.left_cover_ratio {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn region_geometry<'p>(
        &self,
        page_number: u32,
        polygon: &'p [f64],
    ) -> Result<(f64, &'p [f64]), GeometryError> {
        let page = self
            .result
            .page(page_number)
            .ok_or(GeometryError::MissingPage(page_number))?;
        if page.width <= 0.0 {
            return Err(GeometryError::ZeroWidth(page_number));
        }
        if polygon.len() < 8 {
            return Err(GeometryError::ShortPolygon {
                page: page_number,
                len: polygon.len(),
            });
        }
        Ok((page.width, polygon))
    }
}

fn headers_match(a: &Table, b: &Table) -> bool {
    let ha = a.header_texts();
    !ha.is_empty() && ha == b.header_texts()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::model::{
        BoundingRegion, CellKind, Paragraph, ParagraphRole, ResultPage, Span, TableCell,
    };

    const PAGE_W: f64 = 100.0;
    const PAGE_H: f64 = 100.0;

    fn pages(n: u32) -> Vec<ResultPage> {
        (1..=n)
            .map(|page_number| ResultPage {
                page_number,
                width: PAGE_W,
                height: PAGE_H,
                unit: None,
            })
            .collect()
    }

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<f64> {
        vec![x0, y0, x1, y0, x1, y1, x0, y1]
    }

    fn header_cells(names: &[&str]) -> Vec<TableCell> {
        names
            .iter()
            .enumerate()
            .map(|(i, n)| TableCell {
                kind: CellKind::ColumnHeader,
                row_index: 0,
                column_index: i,
                content: (*n).to_string(),
            })
            .collect()
    }

    fn table(page: u32, polygon: Vec<f64>, rows: usize, headers: &[&str], span: Span) -> Table {
        Table {
            row_count: rows,
            column_count: headers.len(),
            cells: header_cells(headers),
            bounding_regions: vec![BoundingRegion {
                page_number: page,
                polygon,
            }],
            spans: vec![span],
        }
    }

    /// Two 5-row tables on consecutive pages, mid-page, same headers.
    fn split_table_result() -> AnalyzeResult {
        let t1 = "| A | B |\n| --- | --- |\n| 1 | 2 |\n";
        let gap = "\n<!-- PageBreak -->\n";
        let t2 = "| A | B |\n| --- | --- |\n| 3 | 4 |\n";
        let content = format!("{t1}{gap}{t2}");
        let l1 = t1.chars().count();
        let l2 = gap.chars().count();
        AnalyzeResult {
            content,
            pages: pages(2),
            tables: vec![
                table(1, rect(10.0, 50.0, 90.0, 90.0), 5, &["A", "B"], Span::new(0, l1)),
                table(2, rect(10.0, 30.0, 90.0, 60.0), 5, &["a ", "b"], Span::new(l1 + l2, t2.len())),
            ],
            ..Default::default()
        }
    }

    fn groups_for(result: &AnalyzeResult) -> Vec<MergedTableGroup> {
        let buffer = ContentBuffer::new(&result.content);
        let settings = LayoutSettings::default();
        TableMergeAnalyzer::new(result, &buffer, &settings).merge_groups()
    }

    fn classify_first(result: &AnalyzeResult) -> Option<MergeKind> {
        let buffer = ContentBuffer::new(&result.content);
        let settings = LayoutSettings::default();
        let analyzer = TableMergeAnalyzer::new(result, &buffer, &settings);
        let candidates = analyzer.candidates();
        assert_eq!(candidates.len(), 1);
        analyzer.classify(&candidates[0])
    }

    #[test]
    fn integral_span_covers_all_spans() {
        let t = Table {
            spans: vec![Span::new(10, 5), Span::new(3, 2), Span::new(12, 10)],
            ..Default::default()
        };
        assert_eq!(
            TableIntegralSpan::of(&t),
            Some(TableIntegralSpan {
                min_offset: 3,
                max_offset: 22
            })
        );
        assert_eq!(TableIntegralSpan::of(&Table::default()), None);
    }

    #[test]
    fn vertical_continuation_is_detected() {
        let result = split_table_result();
        assert_eq!(classify_first(&result), Some(MergeKind::Vertical));

        let groups = groups_for(&result);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].table_indices, vec![0, 1]);
        assert_eq!(groups[0].offset_range.min, 0);
        assert_eq!(groups[0].offset_range.max, result.content.chars().count());
        assert_eq!(groups[0].remark, "<!-- PageBreak -->");
        assert_eq!(
            groups[0].merged_content,
            "| A | B |\n| --- | --- |\n| 1 | 2 |\n| 3 | 4 |\n"
        );
    }

    #[test]
    fn different_headers_do_not_merge_vertically() {
        let mut result = split_table_result();
        result.tables[1].cells = header_cells(&["X", "Y"]);
        assert_eq!(classify_first(&result), None);
    }

    #[test]
    fn empty_headers_do_not_merge_vertically() {
        let mut result = split_table_result();
        result.tables[0].cells.clear();
        result.tables[1].cells.clear();
        assert_eq!(classify_first(&result), None);
    }

    #[test]
    fn tables_two_pages_apart_are_not_candidates() {
        let mut result = split_table_result();
        result.pages = pages(3);
        result.tables[1].bounding_regions[0].page_number = 3;
        let buffer = ContentBuffer::new(&result.content);
        let settings = LayoutSettings::default();
        assert!(TableMergeAnalyzer::new(&result, &buffer, &settings)
            .candidates()
            .is_empty());
    }

    #[test]
    fn spanless_table_in_between_blocks_pairing() {
        let mut result = split_table_result();
        let spanless = Table {
            bounding_regions: vec![BoundingRegion {
                page_number: 2,
                polygon: rect(0.0, 0.0, 1.0, 1.0),
            }],
            ..Default::default()
        };
        result.tables.insert(1, spanless);
        let buffer = ContentBuffer::new(&result.content);
        let settings = LayoutSettings::default();
        let analyzer = TableMergeAnalyzer::new(&result, &buffer, &settings);
        assert_eq!(analyzer.integral_spans()[1], None);
        assert!(analyzer.candidates().is_empty());
    }

    #[test]
    fn page_header_in_gap_does_not_block() {
        let mut result = split_table_result();
        let gap_mid = result.tables[0].spans[0].end() + 2;
        result.paragraphs.push(Paragraph {
            role: Some(ParagraphRole::PageHeader),
            content: "ACME Corp".into(),
            spans: vec![Span::new(gap_mid, 3)],
        });
        assert_eq!(classify_first(&result), Some(MergeKind::Vertical));
    }

    #[test]
    fn roleless_paragraph_in_gap_blocks() {
        let mut result = split_table_result();
        let gap_mid = result.tables[0].spans[0].end() + 2;
        result.paragraphs.push(Paragraph {
            role: None,
            content: "Some commentary".into(),
            spans: vec![Span::new(gap_mid, 3)],
        });
        assert_eq!(classify_first(&result), None);
    }

    #[test]
    fn paragraph_on_gap_boundary_does_not_block() {
        let mut result = split_table_result();
        let gap_start = result.tables[0].spans[0].end();
        result.paragraphs.push(Paragraph {
            role: Some(ParagraphRole::Title),
            content: "x".into(),
            spans: vec![Span::new(gap_start, 1)],
        });
        assert_eq!(classify_first(&result), Some(MergeKind::Vertical));
    }

    #[test]
    fn banner_table_is_never_merged() {
        let mut result = split_table_result();
        // top 20% of the page, 2 rows, 2 columns
        result.tables[1].bounding_regions[0].polygon = rect(10.0, 5.0, 90.0, 15.0);
        result.tables[1].row_count = 2;
        assert_eq!(classify_first(&result), None);
    }

    #[test]
    fn large_table_at_top_is_not_a_banner() {
        let mut result = split_table_result();
        result.tables[1].bounding_regions[0].polygon = rect(10.0, 5.0, 90.0, 95.0);
        assert_eq!(classify_first(&result), Some(MergeKind::Vertical));
    }

    #[test]
    fn banner_check_on_missing_page_is_not_mergeable() {
        let mut result = split_table_result();
        result.tables[1].row_count = 1;
        result.pages.truncate(1);
        assert_eq!(classify_first(&result), None);
    }

    fn horizontal_result() -> AnalyzeResult {
        let mut result = split_table_result();
        result.tables[0].cells = header_cells(&["A", "B"]);
        result.tables[1].cells = header_cells(&["C", "D", "E"]);
        result.tables[1].column_count = 3;
        result.tables[0].bounding_regions[0].polygon = rect(40.0, 40.0, 99.5, 90.0);
        result.tables[1].bounding_regions[0].polygon = rect(0.5, 40.0, 60.0, 90.0);
        result
    }

    #[test]
    fn horizontal_continuation_is_detected() {
        let result = horizontal_result();
        assert_eq!(classify_first(&result), Some(MergeKind::Horizontal));
    }

    #[test]
    fn horizontal_requires_equal_row_counts() {
        let mut result = horizontal_result();
        result.tables[1].row_count = 7;
        assert_eq!(classify_first(&result), None);
    }

    #[test]
    fn horizontal_requires_edge_coverage() {
        let mut result = horizontal_result();
        result.tables[0].bounding_regions[0].polygon = rect(40.0, 40.0, 95.0, 90.0);
        assert_eq!(classify_first(&result), None);
    }

    #[test]
    fn horizontal_needs_edge_coverage_on_every_region() {
        let mut result = horizontal_result();
        result.tables[0].bounding_regions.push(BoundingRegion {
            page_number: 1,
            polygon: rect(40.0, 20.0, 80.0, 35.0),
        });
        assert_eq!(classify_first(&result), None);

        let mut result = horizontal_result();
        result.tables[1].bounding_regions.push(BoundingRegion {
            page_number: 2,
            polygon: rect(30.0, 20.0, 60.0, 35.0),
        });
        assert_eq!(classify_first(&result), None);

        let mut result = horizontal_result();
        result.tables[0].bounding_regions.push(BoundingRegion {
            page_number: 1,
            polygon: rect(40.0, 20.0, 99.8, 35.0),
        });
        assert_eq!(classify_first(&result), Some(MergeKind::Horizontal));
    }

    #[test]
    fn horizontal_with_bad_geometry_is_not_mergeable() {
        let mut result = horizontal_result();
        result.tables[1].bounding_regions[0].polygon = vec![0.5, 40.0];
        assert_eq!(classify_first(&result), None);

        let mut result = horizontal_result();
        result.pages[0].width = 0.0;
        assert_eq!(classify_first(&result), None);
    }

    #[test]
    fn vertical_wins_when_both_match() {
        let mut result = horizontal_result();
        result.tables[1].cells = header_cells(&["A", "B"]);
        result.tables[1].column_count = 2;
        assert_eq!(classify_first(&result), Some(MergeKind::Vertical));
    }

    #[test]
    fn three_fragments_chain_into_one_group() {
        let t1 = "| A |\n| --- |\n| 1 |\n";
        let t2 = "| A |\n| --- |\n| 2 |\n";
        let t3 = "| A |\n| --- |\n| 3 |\n";
        let gap = "<!-- PageBreak -->\n";
        let content = format!("{t1}{gap}{t2}{gap}{t3}tail");
        let (a, g, b) = (t1.len(), gap.len(), t2.len());
        let result = AnalyzeResult {
            content,
            pages: pages(3),
            tables: vec![
                table(1, rect(10.0, 50.0, 90.0, 90.0), 5, &["A"], Span::new(0, a)),
                table(2, rect(10.0, 50.0, 90.0, 90.0), 5, &["A"], Span::new(a + g, b)),
                table(3, rect(10.0, 50.0, 90.0, 90.0), 5, &["A"], Span::new(a + g + b + g, t3.len())),
            ],
            ..Default::default()
        };

        let groups = groups_for(&result);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].table_indices, vec![0, 1, 2]);
        assert_eq!(groups[0].merged_content, "| A |\n| --- |\n| 1 |\n| 2 |\n| 3 |\n");
        assert_eq!(groups[0].offset_range.max, a + g + b + g + t3.len());
        assert_eq!(groups[0].remark, format!("<!-- PageBreak -->{gap}"));
    }
}
