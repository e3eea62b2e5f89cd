/// A loosely typed table scraped from a sheet. `None` is an empty cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

/// How an empty cell reads when cells are compared as text.
pub const EMPTY_CELL: &str = "nan";

impl Table {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Option<String>>>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    /// `(rows, columns)`
    pub fn shape(&self) -> (usize, usize) {
        (self.rows.len(), self.columns.len())
    }

    pub fn column(&self, idx: usize) -> impl Iterator<Item = Option<&str>> {
        self.rows
            .iter()
            .map(move |row| row.get(idx).and_then(|c| c.as_deref()))
    }

    pub fn drop_column(&mut self, idx: usize) {
        if idx < self.columns.len() {
            self.columns.remove(idx);
        }
        for row in &mut self.rows {
            if idx < row.len() {
                row.remove(idx);
            }
        }
    }
}

pub fn cell_text(cell: &Option<String>) -> &str {
    cell.as_deref().unwrap_or(EMPTY_CELL)
}

#[cfg(test)]
pub(crate) fn cells(values: &[&str]) -> Vec<Option<String>> {
    values
        .iter()
        .map(|v| (!v.is_empty()).then(|| v.to_string()))
        .collect()
}
