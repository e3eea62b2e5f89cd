use std::collections::HashSet;

use crate::table::{EMPTY_CELL, Table, cell_text};

/// One heuristic of the sheet cleaning pipeline.
///
/// The heuristics target the layout of a published Google Sheet: a row of
/// column letters above the data, a column of row numbers on the left, the
/// real header as the first data row. Nothing here checks the result against
/// a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CleaningStep {
    /// Drop rows with no non-empty cell, then placeholder-named columns with
    /// no non-empty cell.
    DropEmpty,
    /// Drop a leading column of spreadsheet row numbers, and any row that only
    /// held a row number.
    DropIndexColumn,
    /// Use the first row as header when the current names are placeholders.
    PromoteHeader,
    /// Trim whitespace from column names.
    StripColumnNames,
    /// Drop rows where every cell reads the same.
    DropDegenerateRows,
}

impl CleaningStep {
    pub const PIPELINE: [CleaningStep; 5] = [
        CleaningStep::DropEmpty,
        CleaningStep::DropIndexColumn,
        CleaningStep::PromoteHeader,
        CleaningStep::StripColumnNames,
        CleaningStep::DropDegenerateRows,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CleaningStep::DropEmpty => "drop-empty",
            CleaningStep::DropIndexColumn => "drop-index-column",
            CleaningStep::PromoteHeader => "promote-header",
            CleaningStep::StripColumnNames => "strip-names",
            CleaningStep::DropDegenerateRows => "drop-degenerate",
        }
    }

    pub fn apply(self, table: Table) -> Table {
        if table.is_empty() {
            return table;
        }
        match self {
            CleaningStep::DropEmpty => drop_empty(table),
            CleaningStep::DropIndexColumn => drop_index_column(table),
            CleaningStep::PromoteHeader => promote_header(table),
            CleaningStep::StripColumnNames => strip_column_names(table),
            CleaningStep::DropDegenerateRows => drop_degenerate_rows(table),
        }
    }
}

/// Runs [`CleaningStep::PIPELINE`] until a pass leaves the table unchanged.
///
/// One step can enable another on the next pass: a promoted header may look
/// like column letters, a dropped degenerate row may leave a column of row
/// numbers behind. Every changing pass except the first drops a row or a
/// column, so the loop ends.
#[tracing::instrument(name = "Cleaning sheet table", skip(table))]
pub fn clean(mut table: Table) -> Table {
    let mut passes = 0;
    loop {
        passes += 1;
        let next = clean_once(table.clone());
        if next == table {
            break;
        }
        table = next;
    }
    tracing::info!(shape = ?table.shape(), passes, "Cleaned table");
    table
}

fn clean_once(table: Table) -> Table {
    CleaningStep::PIPELINE
        .into_iter()
        .fold(table, |table, step| {
            let before = table.shape();
            let table = step.apply(table);
            tracing::debug!(step = step.name(), ?before, after = ?table.shape());
            table
        })
}

/// Blank, `Unnamed: n`, a positional integer, or a single column letter.
fn is_placeholder_name(name: &str) -> bool {
    let name = name.trim();
    name.is_empty()
        || name.starts_with("Unnamed: ")
        || name.chars().all(|c| c.is_ascii_digit())
        || is_column_letter(name)
}

fn is_column_letter(value: &str) -> bool {
    let mut chars = value.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_ascii_uppercase())
}

fn has_placeholder_columns(table: &Table) -> bool {
    let placeholders = table
        .columns
        .iter()
        .filter(|name| is_placeholder_name(name))
        .count();
    placeholders * 2 >= table.columns.len()
}

fn drop_empty(mut table: Table) -> Table {
    table.rows.retain(|row| row.iter().any(Option::is_some));

    let keep: Vec<bool> = table
        .columns
        .iter()
        .enumerate()
        .map(|(idx, name)| {
            !is_placeholder_name(name) || table.column(idx).any(|cell| cell.is_some())
        })
        .collect();
    if keep.iter().all(|k| *k) {
        return table;
    }

    Table::new(
        retain_flagged(table.columns, &keep),
        table
            .rows
            .into_iter()
            .map(|row| retain_flagged(row, &keep))
            .collect(),
    )
}

fn retain_flagged<T>(values: Vec<T>, keep: &[bool]) -> Vec<T> {
    values
        .into_iter()
        .zip(keep)
        .filter_map(|(value, keep)| keep.then_some(value))
        .collect()
}

fn drop_index_column(mut table: Table) -> Table {
    let Some(name) = table.columns.first() else {
        return table;
    };
    let looks_like_index = is_placeholder_name(name)
        && table
            .column(0)
            .all(|cell| cell.is_some_and(|v| v.starts_with(|c: char| c.is_ascii_digit())));

    if looks_like_index {
        tracing::info!("Removing spreadsheet row identifiers from first column");
        table.drop_column(0);
        table.rows.retain(|row| row.iter().any(Option::is_some));
    }
    table
}

fn promote_header(mut table: Table) -> Table {
    if !has_placeholder_columns(&table) {
        return table;
    }
    let first = &table.rows[0];
    let letters = first
        .iter()
        .filter(|cell| cell.as_deref().is_some_and(is_column_letter))
        .count();

    if letters * 2 < table.columns.len() && first.iter().any(Option::is_some) {
        let header = table.rows.remove(0);
        table.columns = header
            .into_iter()
            .map(|name| name.unwrap_or_else(|| EMPTY_CELL.to_string()))
            .collect();
    }
    table
}

fn strip_column_names(mut table: Table) -> Table {
    for name in &mut table.columns {
        *name = name.trim().to_string();
    }
    table
}

fn drop_degenerate_rows(mut table: Table) -> Table {
    table.rows.retain(|row| {
        let distinct: HashSet<&str> = row.iter().map(cell_text).collect();
        distinct.len() != 1
    });
    table
}
