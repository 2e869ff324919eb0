// src/table/parse.rs

use super::{Record, Scalar};
use tracing::debug;

/// Result of parsing a rendered table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParsedTable {
    pub columns: Vec<String>,
    pub records: Vec<Record>,
    /// Data rows skipped because their field count differed from the header.
    pub dropped_rows: usize,
    /// True when the first data row looked like a repeated header and was skipped.
    pub skipped_header_row: bool,
}

/// Parse a pipe-and-dash ASCII table into records.
///
/// Never fails: border rows (`+---+`) and blank lines are ignored, fewer than two remaining
/// lines yields an empty result, and rows whose field count does not match the header are
/// dropped and counted.
pub fn parse_ascii_table(table: &str) -> ParsedTable {
    let lines: Vec<&str> = table
        .lines()
        .filter(|line| !line.trim().is_empty() && !line.trim_start().starts_with('+'))
        .collect();

    let mut parsed = ParsedTable::default();
    if lines.len() < 2 {
        return parsed;
    }

    let columns: Vec<String> = split_cells(lines[0])
        .into_iter()
        .map(str::to_string)
        .collect();

    let mut data = &lines[1..];
    if let Some(first) = data.first() {
        let cells = split_cells(first);
        if is_repeated_header(&cells, &columns) {
            debug!(row = %first.trim(), "skipping repeated header row");
            parsed.skipped_header_row = true;
            data = &data[1..];
        }
    }

    for line in data {
        let cells = split_cells(line);
        if cells.len() != columns.len() {
            parsed.dropped_rows += 1;
            continue;
        }
        let record = columns
            .iter()
            .cloned()
            .zip(cells.into_iter().map(Scalar::from_cell))
            .collect();
        parsed.records.push(record);
    }

    parsed.columns = columns;
    parsed
}

/// Split on `|`, drop the fragments outside the outer pipes, trim the rest.
fn split_cells(line: &str) -> Vec<&str> {
    let fragments: Vec<&str> = line.split('|').collect();
    if fragments.len() < 2 {
        return Vec::new();
    }
    fragments[1..fragments.len() - 1]
        .iter()
        .map(|f| f.trim())
        .collect()
}

/// An upper-cased copy of the header row. Cells must name the header columns, so rows of
/// upper-case codes or `NULL`s stay data.
fn is_repeated_header(cells: &[&str], columns: &[String]) -> bool {
    cells.len() == columns.len()
        && cells.iter().zip(columns).all(|(cell, column)| {
            is_upper(cell)
                && cell.eq_ignore_ascii_case(column)
                && !cell.eq_ignore_ascii_case("null")
        })
}

/// At least one cased character and no lower-case ones.
fn is_upper(s: &str) -> bool {
    s.chars().any(char::is_uppercase) && !s.chars().any(char::is_lowercase)
}
