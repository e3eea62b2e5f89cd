use std::fs::File;
use std::path::Path;

use csv::{Reader, ReaderBuilder, StringRecord, Writer};

use crate::table::Table;

/// Writes the cleaned table as UTF-8 CSV with a header row.
#[tracing::instrument(name = "Saving table to CSV", skip(table))]
pub fn write_csv(table: &Table, path: &Path) -> Result<(), csv::Error> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            tracing::info!("Created directory: {}", dir.display());
        }
    }

    let mut writer = Writer::from_path(path)?;
    writer.write_record(&table.columns)?;
    for row in &table.rows {
        writer.write_record(row.iter().map(|cell| cell.as_deref().unwrap_or("")))?;
    }
    writer.flush()?;

    tracing::info!(rows = table.rows.len(), "Successfully saved to {}", path.display());
    Ok(())
}

/// Reads a CSV artifact back in chunks of at most `batch_size` rows.
pub struct CsvChunks {
    reader: Reader<File>,
    columns: Vec<String>,
    batch_size: usize,
    done: bool,
}

impl CsvChunks {
    pub fn open(path: &Path, batch_size: usize) -> Result<Self, csv::Error> {
        let mut reader = ReaderBuilder::new().flexible(true).from_path(path)?;
        let columns = reader.headers()?.iter().map(str::to_string).collect();
        Ok(Self {
            reader,
            columns,
            batch_size: batch_size.max(1),
            done: false,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    fn to_row(&self, record: &StringRecord) -> Vec<Option<String>> {
        (0..self.columns.len())
            .map(|idx| {
                record
                    .get(idx)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            })
            .collect()
    }
}

impl Iterator for CsvChunks {
    type Item = Result<Vec<Vec<Option<String>>>, csv::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut chunk = Vec::with_capacity(self.batch_size);
        let mut record = StringRecord::new();
        while chunk.len() < self.batch_size {
            match self.reader.read_record(&mut record) {
                Ok(true) => chunk.push(self.to_row(&record)),
                Ok(false) => {
                    self.done = true;
                    break;
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }

        if chunk.is_empty() {
            None
        } else {
            Some(Ok(chunk))
        }
    }
}
