//! Dataset loading: CSV through the engine's reader, spreadsheets through
//! calamine (xlsx, xlsm, xls, xlsb, ods).

use std::fs::File;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use chrono::{Duration, NaiveDate};

use parcelrec_recon::model::dedupe_headers;
use parcelrec_recon::{Dataset, ReconError, Value};

/// File kinds we know how to read, decided by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Csv,
    Spreadsheet,
}

impl InputKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "csv" | "txt" => Some(Self::Csv),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Some(Self::Spreadsheet),
            _ => None,
        }
    }
}

fn load_err(label: &str, message: impl Into<String>) -> ReconError {
    ReconError::Load {
        source: label.to_string(),
        message: message.into(),
    }
}

/// Load one source. `sheet` selects a worksheet (first sheet when `None`) and
/// is ignored for CSV.
pub fn load_dataset(label: &str, path: &Path, sheet: Option<&str>) -> Result<Dataset, ReconError> {
    let kind = InputKind::from_path(path).ok_or_else(|| {
        load_err(
            label,
            format!("unsupported file type: {} (expected csv, xlsx, xls, xlsb or ods)", path.display()),
        )
    })?;

    let dataset = match kind {
        InputKind::Csv => {
            let file = File::open(path)
                .map_err(|e| ReconError::Io(format!("cannot read {}: {e}", path.display())))?;
            Dataset::from_csv_reader(label, file)?
        }
        InputKind::Spreadsheet => load_workbook(label, path, sheet)?,
    };

    tracing::info!(
        "loaded {} records ({} columns) from {} as {label}",
        dataset.len(),
        dataset.fields.len(),
        path.display()
    );
    Ok(dataset)
}

fn load_workbook(label: &str, path: &Path, sheet: Option<&str>) -> Result<Dataset, ReconError> {
    if !path.exists() {
        return Err(ReconError::Io(format!("cannot read {}: file not found", path.display())));
    }

    let mut workbook: Sheets<_> = open_workbook_auto(path)
        .map_err(|e| load_err(label, format!("failed to open workbook: {e}")))?;

    let sheet_name = match sheet {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| load_err(label, "workbook contains no sheets"))?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| load_err(label, format!("failed to read sheet '{sheet_name}': {e}")))?;

    let mut rows = range.rows();
    let Some(header) = rows.next() else {
        return Ok(Dataset::new(label, Vec::new()));
    };
    let header_text: Vec<String> = header.iter().map(header_cell).collect();
    let mut dataset = Dataset::new(label, dedupe_headers(header_text.iter().map(String::as_str)));

    for row in rows {
        // Trailing formatted-but-empty rows are part of the used range
        if row.iter().all(|cell| matches!(cell, Data::Empty)) {
            continue;
        }
        let record = dataset
            .fields
            .iter()
            .zip(row.iter())
            .map(|(field, cell)| (field.clone(), cell_value(cell)))
            .collect();
        dataset.push(record);
    }

    Ok(dataset)
}

fn header_cell(cell: &Data) -> String {
    match cell {
        Data::Float(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
        other => other.to_string().trim().to_string(),
    }
}

/// Spreadsheet cell to engine value. Numbers stay numbers; dates become ISO
/// text so they read naturally in reports.
pub fn cell_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) => Value::from_cell(s),
        Data::Float(n) => Value::Number(*n),
        Data::Int(n) => Value::Number(*n as f64),
        Data::Bool(b) => Value::from(if *b { "TRUE" } else { "FALSE" }),
        Data::Error(e) => Value::Text(format!("#{e:?}")),
        Data::DateTime(dt) => Value::Text(excel_serial_to_text(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Value::from(s.as_str()),
    }
}

/// Render a 1900-system date serial as `YYYY-MM-DD`, with a time part when
/// the serial has one.
fn excel_serial_to_text(serial: f64) -> String {
    let Some(epoch) = NaiveDate::from_ymd_opt(1899, 12, 30).and_then(|d| d.and_hms_opt(0, 0, 0))
    else {
        return serial.to_string();
    };
    let millis = (serial * 86_400_000.0).round() as i64;
    match epoch.checked_add_signed(Duration::milliseconds(millis)) {
        Some(dt) if serial.fract() == 0.0 => dt.format("%Y-%m-%d").to_string(),
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => serial.to_string(),
    }
}
