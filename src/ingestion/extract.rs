use std::time::Duration;

use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

use crate::helpers::error_chain_fmt;
use crate::table::Table;

#[derive(thiserror::Error)]
pub enum ExtractError {
    #[error("Failed to fetch the published sheet.")]
    Fetch(#[from] reqwest::Error),
    #[error("No <table> element found in the published sheet.")]
    NoTable,
}

impl std::fmt::Debug for ExtractError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

pub struct SheetClient {
    http_client: Client,
}

impl SheetClient {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        Ok(Self {
            http_client: Client::builder().timeout(timeout).build()?,
        })
    }

    #[tracing::instrument(name = "Fetching published sheet", skip(self))]
    pub async fn fetch_html(&self, sheet_url: &str) -> Result<String, reqwest::Error> {
        self.http_client
            .get(sheet_url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await
    }
}

/// Fetches the sheet and parses its first table.
pub async fn extract(client: &SheetClient, sheet_url: &str) -> Result<Table, ExtractError> {
    let html = client.fetch_html(sheet_url).await?;
    tracing::info!("Successfully extracted HTML content");

    let table = parse_first_table(&html)?;
    tracing::info!(
        rows = table.rows.len(),
        columns = table.columns.len(),
        "Table extracted from sheet"
    );
    Ok(table)
}

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("Static CSS selector failed to parse")
}

pub fn parse_first_table(html: &str) -> Result<Table, ExtractError> {
    let document = Html::parse_document(html);
    let tables: Vec<ElementRef> = document.select(&selector("table")).collect();
    let Some(table) = tables.first() else {
        tracing::warn!("No tables found inside the html content");
        return Err(ExtractError::NoTable);
    };
    tracing::info!("Found {} table(s). Will be using the first one.", tables.len());

    let head_rows: Vec<Vec<(bool, String)>> = table
        .select(&selector("thead > tr"))
        .map(row_cells)
        .collect();
    let mut body_rows: Vec<Vec<(bool, String)>> = table
        .select(&selector("tbody > tr"))
        .map(row_cells)
        .collect();

    let header = match head_rows.into_iter().last() {
        Some(header) => Some(header),
        None if body_rows
            .first()
            .is_some_and(|row| !row.is_empty() && row.iter().all(|(is_th, _)| *is_th)) =>
        {
            Some(body_rows.remove(0))
        }
        None => None,
    };

    let width = body_rows
        .iter()
        .map(Vec::len)
        .chain(header.iter().map(Vec::len))
        .max()
        .unwrap_or(0);

    let columns = (0..width)
        .map(|idx| match header.as_ref().and_then(|h| h.get(idx)) {
            Some((_, name)) if !name.is_empty() => name.clone(),
            Some(_) => format!("Unnamed: {idx}"),
            None if header.is_some() => format!("Unnamed: {idx}"),
            None => idx.to_string(),
        })
        .collect();

    let rows = body_rows
        .into_iter()
        .map(|row| {
            let mut cells: Vec<Option<String>> = row
                .into_iter()
                .map(|(_, text)| (!text.is_empty()).then_some(text))
                .collect();
            cells.resize(width, None);
            cells
        })
        .collect();

    Ok(Table::new(columns, rows))
}

/// `(is_header_cell, text)` for each direct `<th>`/`<td>` child of a row.
fn row_cells(row: ElementRef) -> Vec<(bool, String)> {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter_map(|cell| match cell.value().name() {
            "th" => Some((true, cell_text(cell))),
            "td" => Some((false, cell_text(cell))),
            _ => None,
        })
        .collect()
}

fn cell_text(cell: ElementRef) -> String {
    cell.text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}
