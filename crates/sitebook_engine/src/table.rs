use std::collections::HashSet;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_warn};
use scraper::{ElementRef, Html, Selector};

use crate::config::{SiteConfig, TableConfig};
use crate::exporter::{ExportError, PageExporter};
use crate::layout::RunLayout;
use crate::markup::{parse_selector, PageDocument, SelectorError};
use crate::persist::AtomicFileWriter;
use crate::render::SessionSlot;
use crate::PageExport;

/// Parsed form of [`TableConfig`].
#[derive(Debug, Clone)]
pub struct TableSettings {
    pub table: Selector,
    pub expand_selector: String,
    pub expand_skip: usize,
    pub columns: Vec<String>,
    pub boolean_columns: Vec<String>,
    pub list_columns: Vec<String>,
    pub detail_column: Option<String>,
    /// `None` when links are not followed.
    pub anchors: Option<Selector>,
    pub settle_delay: Duration,
}

impl TableSettings {
    pub fn new(table: &TableConfig, config: &SiteConfig) -> Result<Self, SelectorError> {
        parse_selector(&table.expand_selector)?;
        Ok(Self {
            table: parse_selector(&table.table_selector)?,
            expand_selector: table.expand_selector.clone(),
            expand_skip: table.expand_skip,
            columns: table.column_order.clone(),
            boolean_columns: table.boolean_columns.clone(),
            list_columns: table.list_columns.clone(),
            detail_column: table.detail_column.clone(),
            anchors: if table.follow_links {
                Some(parse_selector("a[href]")?)
            } else {
                None
            },
            settle_delay: config.settle_delay(),
        })
    }
}

/// Rows read from one page table, every row as wide as `columns`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl PageTable {
    /// Read the first table matching `settings.table`. `None` when the page
    /// has no such table.
    pub fn read(markup: &str, settings: &TableSettings) -> Option<Self> {
        let doc = Html::parse_document(markup);
        let table = doc.select(&settings.table).next()?;
        let trs = body_rows(table);

        let columns = if settings.columns.is_empty() {
            header_cells(table)
        } else {
            settings.columns.clone()
        };

        let mut rows = Vec::new();
        let mut current: Option<Vec<String>> = None;
        for tr in trs {
            if settings.detail_column.is_some() {
                if let Some(mut row) = current.take() {
                    row.push(tr.html());
                    rows.push(row);
                    continue;
                }
            }
            let mut row = vec![String::new(); columns.len()];
            for (cell, slot) in cells(tr).into_iter().zip(row.iter_mut()) {
                *slot = cell;
            }
            for (column, value) in columns.iter().zip(row.iter_mut()) {
                *value = normalize_cell(column, value, settings);
            }
            if settings.detail_column.is_some() {
                current = Some(row);
            } else {
                rows.push(row);
            }
        }
        if let Some(mut row) = current {
            row.push(String::new());
            rows.push(row);
        }

        let mut columns = columns;
        columns.extend(settings.detail_column.clone());
        Some(Self { columns, rows })
    }

    /// Comma-separated values with a header line, `\n` line endings.
    pub fn to_csv(&self) -> String {
        let mut out = String::new();
        push_record(&mut out, &self.columns);
        for row in &self.rows {
            push_record(&mut out, row);
        }
        out
    }
}

fn normalize_cell(column: &str, value: &str, settings: &TableSettings) -> String {
    if settings.boolean_columns.iter().any(|c| c == column) {
        return value.trim().eq_ignore_ascii_case(column).to_string();
    }
    if settings.list_columns.iter().any(|c| c == column) {
        return value.replace(',', ";");
    }
    value.to_string()
}

/// Direct `tr` children of the table's bodies. Rows of nested tables are
/// not included.
fn body_rows(table: ElementRef<'_>) -> Vec<ElementRef<'_>> {
    table
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "tbody")
        .flat_map(|tbody| tbody.children().filter_map(ElementRef::wrap))
        .filter(|el| el.value().name() == "tr")
        .collect()
}

fn header_cells(table: ElementRef<'_>) -> Vec<String> {
    table
        .children()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "thead")
        .flat_map(|thead| thead.children().filter_map(ElementRef::wrap))
        .find(|el| el.value().name() == "tr")
        .map(cells)
        .unwrap_or_default()
}

fn cells(tr: ElementRef<'_>) -> Vec<String> {
    tr.children()
        .filter_map(ElementRef::wrap)
        .filter(|el| matches!(el.value().name(), "td" | "th"))
        .map(|cell| collapse_whitespace(&cell.text().collect::<String>()))
        .collect()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn push_record(out: &mut String, fields: &[String]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if field.contains([',', '"', '\n', '\r']) {
            out.push('"');
            out.push_str(&field.replace('"', "\"\""));
            out.push('"');
        } else {
            out.push_str(field);
        }
    }
    out.push('\n');
}

/// Writes the first table of every page as a CSV file under `csv/`.
pub struct TableExporter {
    slot: SessionSlot,
    layout: RunLayout,
    settings: TableSettings,
}

impl TableExporter {
    pub fn new(slot: SessionSlot, layout: RunLayout, settings: TableSettings) -> Self {
        Self {
            slot,
            layout,
            settings,
        }
    }

    pub fn slot(&mut self) -> &mut SessionSlot {
        &mut self.slot
    }

    /// Click the configured controls so collapsed rows are in the markup.
    async fn expand(&mut self, url: &str) {
        let session = self.slot.session();
        match session
            .click_matching(&self.settings.expand_selector, self.settings.expand_skip)
            .await
        {
            Ok(0) => {}
            Ok(clicked) => {
                engine_debug!("{}: expanded {} table sections", url, clicked);
                session.settle(self.settings.settle_delay).await;
            }
            Err(err) => engine_warn!("{}: cannot expand tables: {}", url, err),
        }
    }
}

#[async_trait::async_trait]
impl PageExporter for TableExporter {
    async fn export_page(&mut self, index: usize, url: &str) -> Result<PageExport, ExportError> {
        engine_info!("exporting table of #{} {}", index, url);
        self.slot
            .navigate(url)
            .await
            .map_err(|source| ExportError::Navigation {
                url: url.to_string(),
                source,
            })?;
        self.expand(url).await;
        let markup = self
            .slot
            .session()
            .page_source()
            .await
            .map_err(|source| ExportError::Source {
                url: url.to_string(),
                source,
            })?;

        let table = PageTable::read(&markup, &self.settings).ok_or_else(|| ExportError::MissingTable {
            url: url.to_string(),
        })?;
        engine_debug!("{}: {} rows, {} columns", url, table.rows.len(), table.columns.len());

        let path = self.layout.table_file(url);
        AtomicFileWriter::write_str(&path, &table.to_csv()).map_err(|source| ExportError::Write {
            path: path.clone(),
            source,
        })?;

        let mut links = match &self.settings.anchors {
            Some(anchors) => PageDocument::parse(&markup).hrefs(anchors),
            None => Vec::new(),
        };
        let mut seen = HashSet::new();
        links.retain(|link| seen.insert(link.clone()));

        Ok(PageExport {
            index,
            url: url.to_string(),
            content_path: path,
            artifact_path: None,
            links,
            asset_failures: Vec::new(),
        })
    }

    async fn shutdown(&mut self) {
        self.slot.close().await;
    }
}
