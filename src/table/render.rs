// src/table/render.rs

use super::Table;

/// Render a grid as a fixed-width ASCII table:
///
/// ```text
/// +---------+-----+
/// | country | cnt |
/// +---------+-----+
/// | US      | 2   |
/// +---------+-----+
/// ```
///
/// Nulls render as `NULL`. A grid without columns renders as the empty string.
pub fn render_ascii_table(table: &Table) -> String {
    if table.columns.is_empty() {
        return String::new();
    }

    let cells: Vec<Vec<String>> = table
        .rows
        .iter()
        .map(|row| {
            (0..table.columns.len())
                .map(|i| row.get(i).map(ToString::to_string).unwrap_or_default())
                .collect()
        })
        .collect();

    let widths: Vec<usize> = table
        .columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            cells
                .iter()
                .map(|row| row[i].chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let border = {
        let mut line = String::from("+");
        for w in &widths {
            line.push_str(&"-".repeat(w + 2));
            line.push('+');
        }
        line
    };

    let mut out = String::new();
    out.push_str(&border);
    out.push('\n');
    push_row(&mut out, table.columns.iter().map(String::as_str), &widths);
    out.push_str(&border);
    out.push('\n');
    for row in &cells {
        push_row(&mut out, row.iter().map(String::as_str), &widths);
    }
    out.push_str(&border);
    out.push('\n');
    out
}

fn push_row<'a>(out: &mut String, cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    out.push('|');
    for (cell, width) in cells.zip(widths) {
        let pad = width - cell.chars().count();
        out.push(' ');
        out.push_str(cell);
        out.push_str(&" ".repeat(pad + 1));
        out.push('|');
    }
    out.push('\n');
}
