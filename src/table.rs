use std::fmt::Write as _;

use crate::session::ViewSnapshot;

/// Longest cell rendered before truncation.
pub const MAX_CELL_WIDTH: usize = 40;

const ASCENDING_MARK: &str = " ▲";
const DESCENDING_MARK: &str = " ▼";

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let cells = rows
        .iter()
        .map(|row| row.iter().map(|cell| clean_cell(cell)).collect::<Vec<_>>())
        .collect::<Vec<_>>();
    let mut widths = headers.iter().map(|h| h.chars().count().max(1)).collect::<Vec<_>>();
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", join_padded(headers.iter().map(String::as_str), &widths));
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", join_padded(rule.iter().map(String::as_str), &widths));
    for row in &cells {
        let _ = writeln!(output, "{}", join_padded(row.iter().map(String::as_str), &widths));
    }
    output
}

/// Renders the current page with the sort marker, paging line and status counts.
pub fn render_view(snapshot: &ViewSnapshot) -> String {
    let headers = snapshot
        .headers
        .iter()
        .enumerate()
        .map(|(idx, label)| match snapshot.sort {
            Some(sort) if sort.field.index() == idx => {
                let mark = if sort.ascending {
                    ASCENDING_MARK
                } else {
                    DESCENDING_MARK
                };
                format!("{label}{mark}")
            }
            _ => label.clone(),
        })
        .collect::<Vec<_>>();
    let rows = snapshot
        .rows
        .iter()
        .map(|row| row.to_record())
        .collect::<Vec<_>>();

    let mut output = if rows.is_empty() {
        String::from("No records match the current filters.\n")
    } else {
        render_table(&headers, &rows)
    };
    let page = &snapshot.page;
    let _ = writeln!(
        output,
        "\nPage {} / {} ({} record(s))",
        page.current_page, page.total_pages, page.total_items
    );
    let counts = &snapshot.counts;
    let _ = writeln!(
        output,
        "Open: {}  Closed: {}  Deferred: {}",
        counts.open, counts.closed, counts.deferred
    );
    if let Some(imported_at) = snapshot.last_import {
        let _ = writeln!(
            output,
            "Last import: {}",
            imported_at.format("%d.%m.%Y %H:%M UTC")
        );
    }
    output
}

fn join_padded<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) -> String {
    let mut line = cells
        .zip(widths)
        .map(|(cell, width)| {
            let pad = width.saturating_sub(cell.chars().count());
            format!("{cell}{}", " ".repeat(pad))
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.truncate(line.trim_end().len());
    line
}

/// Flattens control characters and shortens overlong text.
fn clean_cell(value: &str) -> String {
    let flat = value
        .chars()
        .map(|ch| if ch.is_control() { ' ' } else { ch })
        .collect::<String>();
    if flat.chars().count() <= MAX_CELL_WIDTH {
        return flat;
    }
    let mut shortened = flat.chars().take(MAX_CELL_WIDTH - 1).collect::<String>();
    shortened.push('…');
    shortened
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_table_aligns_columns() {
        let headers = vec!["WO".to_string(), "Status".to_string()];
        let rows = vec![
            vec!["W100".to_string(), "OPEN".to_string()],
            vec!["W2".to_string(), "CLOSED".to_string()],
        ];
        let rendered = render_table(&headers, &rows);
        let lines = rendered.lines().collect::<Vec<_>>();
        assert_eq!(lines, vec!["WO    Status", "----  ------", "W100  OPEN", "W2    CLOSED"]);
    }

    #[test]
    fn long_and_multiline_cells_are_cleaned() {
        let long = "x".repeat(60);
        let rows = vec![vec!["a\nb".to_string(), long]];
        let rendered = render_table(&["n".to_string(), "d".to_string()], &rows);
        let last = rendered.lines().last().unwrap();
        assert!(last.starts_with("a b"));
        assert!(last.ends_with('…'));
        assert_eq!(last.chars().count(), 3 + 2 + MAX_CELL_WIDTH);
    }
}
