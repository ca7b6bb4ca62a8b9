//! Writing records to an xlsx workbook.
//!
//! Rows use a fixed nine-column layout with a Japanese header row. Item codes
//! and model numbers are stored as text so leading zeros survive. Missing
//! prices are written as 0.
//!
//! Writing borrows the records, so after a failure (typically
//! [`ChumonError::WorkbookLocked`] while the file is open in Excel) the same
//! records can be written again.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};

use umya_spreadsheet::{Spreadsheet, Worksheet};

use crate::record::ProductRecord;
use crate::{ChumonError, Result};

/// Default sheet name.
pub const DEFAULT_SHEET: &str = "注文内容";

pub const HEADERS: [&str; 9] =
    ["メーカー", "注文コード", "商品名", "品番/型番", "単価（税別）", "数量", "値段（税別）", "URL", "税込み"];

/// 1-based columns stored with the text number format.
const TEXT_COLUMNS: [u32; 2] = [2, 4];

const HEADER_FILL: &str = "FFDDDDDD";
const MIN_COLUMN_WIDTH: usize = 10;
const MAX_COLUMN_WIDTH: usize = 50;

/// Characters Excel refuses in sheet names.
const FORBIDDEN_SHEET_CHARS: [char; 7] = ['[', ']', ':', '*', '?', '/', '\\'];

/// How the target file is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum WriteMode {
    /// Create (or replace) the workbook with a single sheet.
    #[default]
    New,
    /// Add rows to an existing workbook. Falls back to `New` when the file
    /// does not exist yet.
    Append,
}

/// A single cell of a record row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellValue {
    Text(String),
    Number(i64),
}

/// The nine cells of one record, in column order.
pub fn row_values(record: &ProductRecord) -> [CellValue; 9] {
    [
        CellValue::Text(record.supplier.clone()),
        CellValue::Text(record.item_code.clone()),
        CellValue::Text(record.name.clone()),
        CellValue::Text(record.model.clone()),
        CellValue::Number(record.price_excl_tax.unwrap_or(0)),
        CellValue::Number(i64::from(record.quantity.get())),
        CellValue::Number(record.line_total_excl_tax().unwrap_or(0)),
        CellValue::Text(record.url.clone()),
        CellValue::Number(record.price_incl_tax.unwrap_or(0)),
    ]
}

/// What a write did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteSummary {
    pub path: PathBuf,
    pub sheet: String,
    /// First data row written (1-based).
    pub first_row: u32,
    pub rows_written: usize,
    pub created_file: bool,
    pub created_sheet: bool,
}

/// Writes records to one sheet of one workbook.
#[derive(Debug, Clone)]
pub struct WorkbookWriter {
    path: PathBuf,
    sheet: String,
    mode: WriteMode,
}

impl WorkbookWriter {
    /// # Errors
    ///
    /// Returns [`ChumonError::ConfigError`] for a sheet name Excel would
    /// reject.
    pub fn new(path: impl Into<PathBuf>, sheet: impl Into<String>, mode: WriteMode) -> Result<Self> {
        let sheet = sheet.into().trim().to_string();
        validate_sheet_name(&sheet)?;
        Ok(Self { path: path.into(), sheet, mode })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `records` after any existing rows.
    pub fn write(&self, records: &[ProductRecord]) -> Result<WriteSummary> {
        let append = self.mode == WriteMode::Append && self.path.exists();
        if self.mode == WriteMode::Append && !append {
            tracing::info!(path = %self.path.display(), "workbook does not exist yet, creating it");
        }

        let (mut book, created_sheet) = if append {
            probe_writable(&self.path)?;
            let mut book = umya_spreadsheet::reader::xlsx::read(&self.path)
                .map_err(|e| ChumonError::Workbook(format!("cannot read {}: {}", self.path.display(), e)))?;
            let created = book.get_sheet_by_name(&self.sheet).is_none();
            if created {
                book.new_sheet(self.sheet.as_str()).map_err(|e| ChumonError::Workbook(e.to_string()))?;
            }
            (book, created)
        } else {
            let mut book = umya_spreadsheet::new_file_empty_worksheet();
            book.new_sheet(self.sheet.as_str()).map_err(|e| ChumonError::Workbook(e.to_string()))?;
            (book, true)
        };

        let first_row = fill_sheet(&mut book, &self.sheet, records)?;

        if self.path.exists() {
            probe_writable(&self.path)?;
        }
        umya_spreadsheet::writer::xlsx::write(&book, &self.path)
            .map_err(|e| ChumonError::Workbook(format!("cannot write {}: {}", self.path.display(), e)))?;

        tracing::info!(path = %self.path.display(), sheet = %self.sheet, rows = records.len(), "workbook written");
        Ok(WriteSummary {
            path: self.path.clone(),
            sheet: self.sheet.clone(),
            first_row,
            rows_written: records.len(),
            created_file: !append,
            created_sheet,
        })
    }
}

/// Shorthand for [`WorkbookWriter::new`] followed by a write.
pub fn write_records(
    path: impl Into<PathBuf>, sheet: &str, mode: WriteMode, records: &[ProductRecord],
) -> Result<WriteSummary> {
    WorkbookWriter::new(path, sheet, mode)?.write(records)
}

fn validate_sheet_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ChumonError::ConfigError("sheet name is empty".to_string()));
    }
    if name.chars().count() > 31 {
        return Err(ChumonError::ConfigError(format!("sheet name {name:?} is longer than 31 characters")));
    }
    if name.contains(FORBIDDEN_SHEET_CHARS) {
        return Err(ChumonError::ConfigError(format!("sheet name {name:?} contains one of []:*?/\\")));
    }
    Ok(())
}

/// Appends the header (on an empty sheet) and the records, then resizes
/// columns. Returns the first data row.
fn fill_sheet(book: &mut Spreadsheet, sheet_name: &str, records: &[ProductRecord]) -> Result<u32> {
    let sheet = book
        .get_sheet_by_name_mut(sheet_name)
        .ok_or_else(|| ChumonError::Workbook(format!("sheet {sheet_name} is missing")))?;

    if sheet.get_highest_row() == 0 {
        write_header(sheet);
    }

    let first_row = sheet.get_highest_row() + 1;
    for (offset, record) in records.iter().enumerate() {
        let row = first_row + offset as u32;
        for (index, value) in row_values(record).into_iter().enumerate() {
            let col = index as u32 + 1;
            let cell = sheet.get_cell_mut((col, row));
            match value {
                CellValue::Text(text) => {
                    cell.set_value_string(text);
                }
                CellValue::Number(n) => {
                    cell.set_value_number(n as f64);
                }
            }
            if TEXT_COLUMNS.contains(&col) {
                sheet.get_style_mut((col, row)).get_number_format_mut().set_format_code("@");
            }
        }
    }

    autosize_columns(sheet);
    Ok(first_row)
}

fn write_header(sheet: &mut Worksheet) {
    for (index, header) in HEADERS.iter().enumerate() {
        let col = index as u32 + 1;
        sheet.get_cell_mut((col, 1)).set_value_string(*header);
        let style = sheet.get_style_mut((col, 1));
        style.get_font_mut().set_bold(true);
        style.set_background_color(HEADER_FILL);
    }
}

/// `min(max(longest + 2, 10), 50)` per column.
fn autosize_columns(sheet: &mut Worksheet) {
    let highest_row = sheet.get_highest_row();
    for col in 1..=HEADERS.len() as u32 {
        let longest = (1..=highest_row)
            .map(|row| sheet.get_value((col, row)).chars().count())
            .max()
            .unwrap_or(0);
        let width = column_width(longest);
        sheet.get_column_dimension_mut(&column_letter(col)).set_width(width as f64);
    }
}

fn column_width(longest: usize) -> usize {
    (longest + 2).clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
}

/// 1 → `A`, 27 → `AA`.
fn column_letter(mut col: u32) -> String {
    let mut letters = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        letters.push(char::from(b'A' + rem as u8));
        col = (col - 1) / 26;
    }
    letters.iter().rev().collect()
}

/// Opens the file for writing without touching it, so a workbook held open
/// by another program is reported before any work is done.
fn probe_writable(path: &Path) -> Result<()> {
    match OpenOptions::new().write(true).open(path) {
        Ok(_) => Ok(()),
        Err(e) => Err(classify_io_error(e, path)),
    }
}

/// `ERROR_SHARING_VIOLATION` and `ERROR_LOCK_VIOLATION`, raised while
/// another program holds the file open. std leaves both uncategorized.
#[cfg(windows)]
fn is_lock_violation(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(32 | 33))
}

#[cfg(not(windows))]
fn is_lock_violation(_err: &io::Error) -> bool {
    false
}

fn classify_io_error(err: io::Error, path: &Path) -> ChumonError {
    match err.kind() {
        io::ErrorKind::PermissionDenied | io::ErrorKind::ResourceBusy => {
            ChumonError::WorkbookLocked(path.to_path_buf())
        }
        _ if is_lock_violation(&err) => ChumonError::WorkbookLocked(path.to_path_buf()),
        _ => ChumonError::Io(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroU32;
    use tempfile::TempDir;

    fn record(name: &str, excl: Option<i64>, incl: Option<i64>, quantity: u32) -> ProductRecord {
        ProductRecord {
            supplier: "モノタロウ".to_string(),
            item_code: "01234567".to_string(),
            name: name.to_string(),
            model: "M2.5×16".to_string(),
            price_excl_tax: excl,
            price_incl_tax: incl,
            url: "https://www.monotaro.com/p/0123/4567/".to_string(),
            quantity: NonZeroU32::new(quantity).unwrap(),
        }
    }

    fn read_sheet(path: &Path, sheet: &str) -> Vec<Vec<String>> {
        let book = umya_spreadsheet::reader::xlsx::read(path).unwrap();
        let ws = book.get_sheet_by_name(sheet).unwrap();
        (1..=ws.get_highest_row())
            .map(|row| (1..=9).map(|col| ws.get_value((col, row))).collect())
            .collect()
    }

    #[test]
    fn test_row_values_layout() {
        let values = row_values(&record("Bolt", Some(1000), Some(1100), 3));
        assert_eq!(values[1], CellValue::Text("01234567".to_string()));
        assert_eq!(values[4], CellValue::Number(1000));
        assert_eq!(values[5], CellValue::Number(3));
        assert_eq!(values[6], CellValue::Number(3000));
        assert_eq!(values[8], CellValue::Number(1100));
    }

    #[test]
    fn test_row_values_absent_prices_are_zero() {
        let values = row_values(&record("Bolt", None, None, 2));
        assert_eq!(values[4], CellValue::Number(0));
        assert_eq!(values[6], CellValue::Number(0));
        assert_eq!(values[8], CellValue::Number(0));
    }

    #[test]
    fn test_column_width_bounds() {
        assert_eq!(column_width(0), 10);
        assert_eq!(column_width(12), 14);
        assert_eq!(column_width(200), 50);
    }

    #[test]
    fn test_column_letter() {
        assert_eq!(column_letter(1), "A");
        assert_eq!(column_letter(9), "I");
        assert_eq!(column_letter(27), "AA");
    }

    #[test]
    fn test_sheet_name_validation() {
        assert!(WorkbookWriter::new("x.xlsx", "  ", WriteMode::New).is_err());
        assert!(WorkbookWriter::new("x.xlsx", "a/b", WriteMode::New).is_err());
        assert!(WorkbookWriter::new("x.xlsx", "x".repeat(32), WriteMode::New).is_err());
        assert!(WorkbookWriter::new("x.xlsx", DEFAULT_SHEET, WriteMode::New).is_ok());
    }

    #[test]
    fn test_permission_denied_is_locked() {
        let err = classify_io_error(io::Error::from(io::ErrorKind::PermissionDenied), Path::new("o.xlsx"));
        assert!(matches!(err, ChumonError::WorkbookLocked(_)));
        let err = classify_io_error(io::Error::from(io::ErrorKind::NotFound), Path::new("o.xlsx"));
        assert!(matches!(err, ChumonError::Io(_)));
    }

    #[cfg(windows)]
    #[test]
    fn test_windows_sharing_violation_is_locked() {
        for code in [32, 33] {
            let err = classify_io_error(io::Error::from_raw_os_error(code), Path::new("o.xlsx"));
            assert!(matches!(err, ChumonError::WorkbookLocked(_)));
        }
        let err = classify_io_error(io::Error::from_raw_os_error(2), Path::new("o.xlsx"));
        assert!(matches!(err, ChumonError::Io(_)));
    }

    #[test]
    fn test_new_workbook_has_header_and_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("orders.xlsx");

        let summary =
            write_records(&path, DEFAULT_SHEET, WriteMode::New, &[record("Bolt", Some(1000), Some(1100), 2)]).unwrap();
        assert_eq!(summary.first_row, 2);
        assert!(summary.created_file);

        let rows = read_sheet(&path, DEFAULT_SHEET);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], HEADERS.iter().map(|h| h.to_string()).collect::<Vec<_>>());
        assert_eq!(rows[1][1], "01234567");
        assert_eq!(rows[1][6], "2000");
        assert_eq!(rows[1][8], "1100");
    }

    #[test]
    fn test_append_adds_after_last_row() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("orders.xlsx");
        write_records(&path, DEFAULT_SHEET, WriteMode::New, &[record("First", Some(10), Some(11), 1)]).unwrap();

        let summary =
            write_records(&path, DEFAULT_SHEET, WriteMode::Append, &[record("Second", None, Some(220), 1)]).unwrap();
        assert_eq!(summary.first_row, 3);
        assert!(!summary.created_sheet);

        let rows = read_sheet(&path, DEFAULT_SHEET);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1][2], "First");
        assert_eq!(rows[2][2], "Second");
        assert_eq!(rows[2][4], "0");
    }

    #[test]
    fn test_append_creates_missing_sheet_with_header() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("orders.xlsx");
        write_records(&path, DEFAULT_SHEET, WriteMode::New, &[record("First", None, None, 1)]).unwrap();

        let summary = write_records(&path, "追加分", WriteMode::Append, &[record("Other", None, None, 1)]).unwrap();
        assert!(summary.created_sheet);
        assert_eq!(summary.first_row, 2);
        assert_eq!(read_sheet(&path, "追加分")[0][0], "メーカー");
        assert_eq!(read_sheet(&path, DEFAULT_SHEET).len(), 2);
    }

    #[test]
    fn test_append_to_missing_file_creates_it() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("new.xlsx");
        let summary = write_records(&path, DEFAULT_SHEET, WriteMode::Append, &[record("Only", None, None, 1)]).unwrap();
        assert!(summary.created_file);
        assert_eq!(read_sheet(&path, DEFAULT_SHEET).len(), 2);
    }
}
