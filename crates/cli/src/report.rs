//! Report rendering: the four comparison tables as XLSX, CSV or JSON files.
//!
//! Only non-empty tables are written. Key cells link to `report.key_url` and,
//! when `[report.address]` is configured, a `Search_URL` column links each
//! listing-side row to an address search.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use rust_xlsxwriter::{Format, Url, Workbook};

use parcelrec_recon::config::{PassthroughConfig, ReconConfig};
use parcelrec_recon::model::{Passthrough, RecordKey};
use parcelrec_recon::{ReconResult, Value};

use crate::links::LinkBuilder;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Xlsx,
    Csv,
    Json,
}

impl OutputFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

// ============================================================================
// Table model
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub value: Value,
    pub link: Option<String>,
}

impl Cell {
    fn plain(value: impl Into<Value>) -> Self {
        Self { value: value.into(), link: None }
    }

    fn linked(value: impl Into<Value>, link: Option<String>) -> Self {
        Self { value: value.into(), link }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportTable {
    /// File name without extension.
    pub file_stem: String,
    pub sheet: String,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

/// Make sure the address columns are carried as listing-side passthrough so
/// search links can be built from report rows.
pub fn include_address_passthrough(config: &mut ReconConfig) {
    let Some(address) = config.report.address.clone() else {
        return;
    };
    let columns = [Some(address.street), Some(address.city), address.state, Some(address.zip)];
    for column in columns.into_iter().flatten() {
        if !config.passthrough.a.contains(&column) {
            config.passthrough.a.push(column);
        }
    }
}

/// Lay out the non-empty tables in report order: missing in B, missing in A,
/// value mismatches, perfect matches.
pub fn build_tables(result: &ReconResult, config: &ReconConfig) -> Result<Vec<ReportTable>, String> {
    let links = LinkBuilder::new(&config.report)?;
    let layout = Layout::new(config, &links);
    let t = &result.tables;
    let mut tables = Vec::new();

    if !t.missing_in_b.is_empty() {
        let mut headers = layout.leading_headers(&config.passthrough.a);
        layout.push_search_header(&mut headers);
        let rows = t
            .missing_in_b
            .iter()
            .map(|row| {
                let mut cells = layout.leading_cells(&row.key, &row.passthrough);
                layout.push_search_cell(&mut cells, &row.passthrough);
                cells
            })
            .collect();
        tables.push(layout.table(format!("missing_in_{}", layout.label_b), format!("Missing in {}", layout.label_b), headers, rows));
    }

    if !t.missing_in_a.is_empty() {
        let headers = layout.leading_headers(&[]);
        let rows = t
            .missing_in_a
            .iter()
            .map(|row| layout.leading_cells(&row.key, &row.passthrough))
            .collect();
        tables.push(layout.table(format!("missing_in_{}", layout.label_a), format!("Missing in {}", layout.label_a), headers, rows));
    }

    if !t.mismatches.is_empty() {
        let mut headers = layout.leading_headers(&layout.both_passthrough);
        headers.extend([
            format!("Field_{}", layout.label_a),
            format!("Field_{}", layout.label_b),
            format!("{}_Value", layout.label_a),
            format!("{}_Value", layout.label_b),
            "Difference".to_string(),
            format!("Expected_{}_Value", layout.label_b),
            "Match_Rule".to_string(),
        ]);
        layout.push_search_header(&mut headers);

        let rows = t
            .mismatches
            .iter()
            .map(|row| {
                let d = &row.discrepancy;
                let mut cells = layout.leading_cells(&d.key, &row.passthrough);
                cells.extend([
                    Cell::plain(d.field_a.as_str()),
                    Cell::plain(d.field_b.as_str()),
                    Cell::plain(d.value_a.clone()),
                    Cell::plain(d.value_b.clone()),
                    Cell::plain(d.difference.map(|x| x.to_string())),
                    Cell::plain(d.expected_b.clone().unwrap_or(Value::Null)),
                    Cell::plain(d.rule_description.clone()),
                ]);
                layout.push_search_cell(&mut cells, &row.passthrough);
                cells
            })
            .collect();
        tables.push(layout.table("value_mismatches".into(), "Value Mismatches".into(), headers, rows));
    }

    if !t.perfect_matches.is_empty() {
        let mut headers = layout.leading_headers(&layout.both_passthrough);
        headers.extend(["Fields_Compared".to_string(), "Fields_List".to_string()]);
        layout.push_search_header(&mut headers);

        let rows = t
            .perfect_matches
            .iter()
            .map(|row| {
                let mut cells = layout.leading_cells(&row.key, &row.passthrough);
                cells.push(Cell::plain(row.fields_compared_count as f64));
                cells.push(Cell::plain(row.fields_compared.join(", ")));
                layout.push_search_cell(&mut cells, &row.passthrough);
                cells
            })
            .collect();
        tables.push(layout.table("perfect_matches".into(), "Perfect Matches".into(), headers, rows));
    }

    Ok(tables)
}

/// Column layout shared by all tables of one run.
struct Layout<'c> {
    config: &'c ReconConfig,
    links: &'c LinkBuilder,
    label_a: &'c str,
    label_b: &'c str,
    both_passthrough: Vec<String>,
}

impl<'c> Layout<'c> {
    fn new(config: &'c ReconConfig, links: &'c LinkBuilder) -> Self {
        let PassthroughConfig { a, b } = &config.passthrough;
        let label_a = config.sources.a.label.as_str();
        let label_b = config.sources.b.label.as_str();

        // A name carried from both sides gets its source label
        let qualify = |name: &String, other: &[String], label: &str| {
            if other.contains(name) {
                format!("{name} ({label})")
            } else {
                name.clone()
            }
        };
        let both_passthrough = a
            .iter()
            .map(|name| qualify(name, b, label_a))
            .chain(b.iter().map(|name| qualify(name, a, label_b)))
            .collect();

        Self {
            config,
            links,
            label_a,
            label_b,
            both_passthrough,
        }
    }

    fn table(&self, suffix: String, sheet: String, headers: Vec<String>, rows: Vec<Vec<Cell>>) -> ReportTable {
        ReportTable {
            file_stem: file_component(&format!("{}_{suffix}", self.config.report.prefix)),
            sheet: sheet_name(&sheet),
            headers,
            rows,
        }
    }

    fn leading_headers(&self, passthrough: &[String]) -> Vec<String> {
        let mut headers = vec![self.config.report.key_header.clone()];
        headers.extend(passthrough.iter().cloned());
        headers
    }

    fn leading_cells(&self, key: &RecordKey, passthrough: &Passthrough) -> Vec<Cell> {
        let mut cells = vec![Cell::linked(key.as_str(), self.links.key_url(key.as_str()))];
        cells.extend(passthrough.0.iter().map(|(_, value)| Cell::plain(value.clone())));
        cells
    }

    fn push_search_header(&self, headers: &mut Vec<String>) {
        if self.config.report.address.is_some() {
            headers.push("Search_URL".to_string());
        }
    }

    fn push_search_cell(&self, cells: &mut Vec<Cell>, passthrough: &Passthrough) {
        let Some(address) = &self.config.report.address else {
            return;
        };
        let text = |column: &str| passthrough.get(column).map(Value::to_string).unwrap_or_default();
        let state = address.state.as_deref().map(text);
        let url = self.links.address_url(
            &text(&address.street),
            &text(&address.city),
            state.as_deref(),
            &text(&address.zip),
        );
        cells.push(Cell::linked(url.clone(), url));
    }
}

/// Excel sheet names: no `[]:*?/\`, at most 31 characters.
fn sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .collect();
    cleaned.chars().take(31).collect()
}

fn file_component(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' { c } else { '_' })
        .collect()
}

// ============================================================================
// Writers
// ============================================================================

/// Write every table into `out_dir`, returning the paths written.
pub fn write_tables(
    tables: &[ReportTable],
    out_dir: &Path,
    format: OutputFormat,
) -> Result<Vec<PathBuf>, String> {
    std::fs::create_dir_all(out_dir)
        .map_err(|e| format!("cannot create {}: {e}", out_dir.display()))?;

    let mut written = Vec::with_capacity(tables.len());
    for table in tables {
        let path = out_dir.join(format!("{}.{}", table.file_stem, format.extension()));
        match format {
            OutputFormat::Xlsx => write_xlsx(table, &path)?,
            OutputFormat::Csv => write_csv(table, &path)?,
            OutputFormat::Json => write_json(table, &path)?,
        }
        tracing::info!("wrote {} rows to {}", table.rows.len(), path.display());
        written.push(path);
    }
    Ok(written)
}

fn write_csv(table: &ReportTable, path: &Path) -> Result<(), String> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| format!("cannot write {}: {e}", path.display()))?;
    wtr.write_record(&table.headers)
        .map_err(|e| format!("CSV write error: {e}"))?;
    for row in &table.rows {
        wtr.write_record(row.iter().map(|cell| cell.value.to_string()))
            .map_err(|e| format!("CSV write error: {e}"))?;
    }
    wtr.flush().map_err(|e| format!("cannot write {}: {e}", path.display()))
}

fn write_json(table: &ReportTable, path: &Path) -> Result<(), String> {
    let rows: Vec<serde_json::Value> = table
        .rows
        .iter()
        .map(|row| {
            let object: serde_json::Map<String, serde_json::Value> = table
                .headers
                .iter()
                .zip(row)
                .map(|(header, cell)| (header.clone(), json_value(&cell.value)))
                .collect();
            serde_json::Value::Object(object)
        })
        .collect();

    let json = serde_json::to_string_pretty(&rows)
        .map_err(|e| format!("JSON serialization error: {e}"))?;
    std::fs::write(path, json).map_err(|e| format!("cannot write {}: {e}", path.display()))
}

fn json_value(value: &Value) -> serde_json::Value {
    match value {
        Value::Number(n) => serde_json::Number::from_f64(*n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Null => serde_json::Value::Null,
    }
}

fn write_xlsx(table: &ReportTable, path: &Path) -> Result<(), String> {
    let mut workbook = Workbook::new();
    let bold = Format::new().set_bold();

    let worksheet = workbook.add_worksheet();
    worksheet
        .set_name(&table.sheet)
        .map_err(|e| format!("Failed to set sheet name: {}", e))?;

    for (col, header) in table.headers.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, header, &bold)
            .map_err(|e| format!("Failed to write header: {}", e))?;
    }

    for (row_idx, row) in table.rows.iter().enumerate() {
        let r = row_idx as u32 + 1;
        for (col_idx, cell) in row.iter().enumerate() {
            let c = col_idx as u16;
            if let Some(link) = &cell.link {
                let text = cell.value.to_string();
                // Over-long or malformed URLs fall back to plain text
                if worksheet.write_url_with_text(r, c, Url::new(link.as_str()), &text).is_ok() {
                    continue;
                }
                tracing::debug!("link not written for row {r}: {link}");
            }
            let written = match &cell.value {
                Value::Number(n) if n.is_finite() => worksheet.write_number(r, c, *n).map(|_| ()),
                Value::Null => Ok(()),
                other => worksheet.write_string(r, c, other.to_string()).map(|_| ()),
            };
            written.map_err(|e| format!("Failed to write cell: {}", e))?;
        }
    }

    worksheet
        .set_freeze_panes(1, 0)
        .map_err(|e| format!("Failed to freeze header: {}", e))?;
    worksheet.autofit();

    workbook
        .save(path)
        .map_err(|e| format!("Failed to save {}: {}", path.display(), e))
}

// ============================================================================
// Tests
// ============================================================================
