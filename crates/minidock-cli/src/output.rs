//! Formatted output helpers for CLI commands.

use minidock_runtime::state::ContainerInfo;

const HEADERS: [&str; 6] = ["ID", "NAME", "PID", "STATUS", "COMMAND", "CREATED"];

/// Spaces between columns.
const PADDING: usize = 1;

/// Renders containers as a left-aligned table, one row per container.
///
/// Column widths follow the widest cell; the header is always printed.
#[must_use]
pub fn container_table(containers: &[ContainerInfo]) -> String {
    let rows: Vec<[String; 6]> = containers
        .iter()
        .map(|c| {
            [
                c.id.to_string(),
                c.name.clone(),
                c.pid.clone(),
                c.status.to_string(),
                c.command.clone(),
                c.created_time.clone(),
            ]
        })
        .collect();

    let mut widths = HEADERS.map(str::len);
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_row(&mut out, &HEADERS, &widths);
    for row in &rows {
        push_row(&mut out, row, &widths);
    }
    out
}

fn push_row<S: AsRef<str>>(out: &mut String, cells: &[S], widths: &[usize]) {
    let last = cells.len().saturating_sub(1);
    for (i, (cell, width)) in cells.iter().zip(widths).enumerate() {
        let cell = cell.as_ref();
        out.push_str(cell);
        if i < last {
            let pad = width - cell.chars().count() + PADDING;
            out.extend(std::iter::repeat_n(' ', pad));
        }
    }
    out.push('\n');
}
