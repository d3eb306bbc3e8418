//! Rendered-table merging.
//!
//! Tables arrive as pipe-delimited markdown blocks cut out of the content
//! buffer. A vertical continuation repeats the header, so its header block is
//! dropped and the remaining rows are appended. A horizontal continuation
//! holds the right-hand columns of the same rows, so both blocks are parsed
//! into grids, zipped row by row and re-rendered.

use super::table_merge::MergeKind;

/// Characters allowed in a header separator row such as `| --- | :-: |`.
const SEPARATOR_CHARS: &[char] = &['-', ':', '|', '+', ' ', '\t'];

/// Is this line a markdown header separator row?
fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty() && trimmed.contains('-') && trimmed.chars().all(|c| SEPARATOR_CHARS.contains(&c))
}

/// A table as a grid of cell strings, `rows[row][col]`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableGrid {
    pub rows: Vec<Vec<String>>,
}

impl TableGrid {
    /// Parse a pipe table, skipping blank and separator rows.
    #[must_use]
    pub fn parse(markdown: &str) -> Self {
        let rows = markdown
            .lines()
            .filter(|l| !l.trim().is_empty() && !is_separator_row(l))
            .map(|l| {
                let line = l.trim();
                let line = line.strip_prefix('|').unwrap_or(line);
                let line = line.strip_suffix('|').unwrap_or(line);
                line.split('|').map(|c| c.trim().to_string()).collect()
            })
            .collect();
        Self { rows }
    }

    /// Widest row.
    #[must_use]
    pub fn column_count(&self) -> usize {
        self.rows.iter().map(Vec::len).max().unwrap_or(0)
    }

    /// Pad every row with empty cells up to [`Self::column_count`].
    pub fn pad(&mut self) {
        let width = self.column_count();
        for row in &mut self.rows {
            row.resize(width, String::new());
        }
    }

    /// Render as a markdown table: header row, a fresh separator row sized
    /// to the column count, then body rows.
    #[must_use]
    pub fn to_markdown(&self) -> String {
        let col_count = self.column_count();
        if self.rows.is_empty() || col_count == 0 {
            return String::new();
        }

        let mut md = String::new();
        let push_row = |md: &mut String, row: &[String]| {
            md.push('|');
            for col in 0..col_count {
                let cell = row.get(col).map_or("", String::as_str);
                md.push_str(&format!(" {cell} |"));
            }
            md.push('\n');
        };

        push_row(&mut md, &self.rows[0]);

        md.push('|');
        for _ in 0..col_count {
            md.push_str(" --- |");
        }
        md.push('\n');

        for row in self.rows.iter().skip(1) {
            push_row(&mut md, row);
        }

        md
    }
}

/// Drop a leading header block (one header row plus its separator row).
///
/// Text without such a block is returned unchanged.
#[must_use]
pub fn strip_header_block(table: &str) -> String {
    let lines: Vec<&str> = table.lines().collect();
    let Some(sep) = lines.iter().position(|l| is_separator_row(l)) else {
        return table.to_string();
    };
    let header_lines = lines[..sep].iter().filter(|l| !l.trim().is_empty()).count();
    if header_lines > 1 {
        return table.to_string();
    }
    lines[sep + 1..].join("\n")
}

/// Append the body of `second` beneath `first`.
#[must_use]
pub fn merge_vertical(first: &str, second: &str) -> String {
    let body = strip_header_block(second);
    let first = first.trim();
    let body = body.trim();
    if body.is_empty() {
        return format!("{first}\n");
    }
    format!("{first}\n{body}\n")
}

/// Place the columns of `second` to the right of `first`, row by row.
///
/// The longer table decides the row count; missing rows on the shorter side
/// contribute empty cells.
#[must_use]
pub fn merge_horizontal(first: &str, second: &str) -> String {
    let mut left = TableGrid::parse(first);
    let mut right = TableGrid::parse(second);
    if left.rows.is_empty() {
        return second.to_string();
    }
    if right.rows.is_empty() {
        return first.to_string();
    }
    left.pad();
    right.pad();

    let left_width = left.column_count();
    let right_width = right.column_count();
    let row_count = left.rows.len().max(right.rows.len());

    let rows = (0..row_count)
        .map(|i| {
            let mut row = left
                .rows
                .get(i)
                .cloned()
                .unwrap_or_else(|| vec![String::new(); left_width]);
            match right.rows.get(i) {
                Some(r) => row.extend(r.iter().cloned()),
                None => row.extend(std::iter::repeat_n(String::new(), right_width)),
            }
            row
        })
        .collect();

    TableGrid { rows }.to_markdown()
}

/// Merge two rendered tables according to how they continue each other.
#[must_use]
pub fn merge(kind: MergeKind, first: &str, second: &str) -> String {
    match kind {
        MergeKind::Vertical => merge_vertical(first, second),
        MergeKind::Horizontal => merge_horizontal(first, second),
    }
}
