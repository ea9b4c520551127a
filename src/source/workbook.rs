use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Mutex;

use calamine::{open_workbook_auto, Data, Range, Reader};
use sha2::{Digest, Sha256};

use crate::error::SourceError;
use crate::monitor::types::{Region, Snapshot};

use super::SheetSource;

/// Sheet source over workbook files on the local filesystem (xlsx, xls,
/// ods). A table's `reference` is the file path.
///
/// Parsed worksheet grids are cached per `(path, worksheet)` together
/// with the file's checksum; while the checksum is unchanged the cached
/// grid is served without re-opening the workbook.
pub struct WorkbookSource {
    cache: Mutex<HashMap<(String, u32), CachedSheet>>,
}

struct CachedSheet {
    checksum: String,
    grid: Vec<Vec<String>>,
}

impl WorkbookSource {
    pub fn new() -> Self {
        WorkbookSource {
            cache: Mutex::new(HashMap::new()),
        }
    }

    fn load_grid(
        &self,
        reference: &str,
        worksheet_index: u32,
    ) -> Result<Vec<Vec<String>>, SourceError> {
        if !Path::new(reference).exists() {
            return Err(SourceError::NotFound(reference.to_string()));
        }

        let checksum = compute_checksum(reference)?;
        let key = (reference.to_string(), worksheet_index);
        {
            let cache = self.cache.lock().unwrap();
            if let Some(cached) = cache.get(&key) {
                if cached.checksum == checksum {
                    return Ok(cached.grid.clone());
                }
            }
        }

        let grid = read_worksheet(reference, worksheet_index)?;
        self.cache.lock().unwrap().insert(
            key,
            CachedSheet {
                checksum,
                grid: grid.clone(),
            },
        );
        Ok(grid)
    }
}

impl Default for WorkbookSource {
    fn default() -> Self {
        Self::new()
    }
}

impl SheetSource for WorkbookSource {
    fn fetch(
        &self,
        reference: &str,
        worksheet_index: u32,
        region: &Region,
    ) -> Result<Snapshot, SourceError> {
        let grid = self.load_grid(reference, worksheet_index)?;
        extract_region(&grid, region)
    }

    fn reachable(&self, reference: &str) -> Result<(), SourceError> {
        if !Path::new(reference).exists() {
            return Err(SourceError::NotFound(reference.to_string()));
        }
        open_workbook_auto(reference)
            .map(|_| ())
            .map_err(|err| SourceError::unreachable(reference, err))
    }
}

fn read_worksheet(reference: &str, worksheet_index: u32) -> Result<Vec<Vec<String>>, SourceError> {
    let mut workbook = open_workbook_auto(reference)
        .map_err(|err| SourceError::unreachable(reference, err))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let name = sheet_names
        .get(worksheet_index as usize)
        .ok_or_else(|| {
            SourceError::NotFound(format!("{} (worksheet {})", reference, worksheet_index))
        })?
        .clone();

    let range = workbook
        .worksheet_range(&name)
        .map_err(|err| SourceError::unreachable(reference, err))?;
    Ok(range_to_grid(&range))
}

fn range_to_grid(range: &Range<Data>) -> Vec<Vec<String>> {
    range
        .rows()
        .map(|row| row.iter().map(data_to_string).collect())
        .collect()
}

/// Render a cell the way a user sees it; empty cells become "".
fn data_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => format_excel_datetime(dt.as_f64()),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{:?}", e),
    }
}

/// Format an Excel datetime (days since 1899-12-30) as ISO 8601.
fn format_excel_datetime(value: f64) -> String {
    let days = value.floor() as i64;
    let time_fraction = value.fract();

    let epoch = chrono::NaiveDate::from_ymd_opt(1899, 12, 30).unwrap_or_default();
    let date = epoch + chrono::Duration::days(days);

    let total_seconds = (time_fraction * 86400.0).round() as u32;
    let time = chrono::NaiveTime::from_hms_opt(
        total_seconds / 3600,
        (total_seconds % 3600) / 60,
        total_seconds % 60,
    )
    .unwrap_or_default();

    chrono::NaiveDateTime::new(date, time)
        .format("%Y-%m-%dT%H:%M:%S")
        .to_string()
}

/// Cut one region out of a worksheet grid.
pub(crate) fn extract_region(grid: &[Vec<String>], region: &Region) -> Result<Snapshot, SourceError> {
    match region {
        Region::Cell { address } => {
            let (row, column) = parse_cell_address(address)?;
            let value = grid
                .get(row as usize - 1)
                .and_then(|r| r.get(column as usize - 1))
                .filter(|v| !v.is_empty())
                .cloned();
            Ok(Snapshot::Cell(value))
        }
        Region::Row { index } => {
            let index = check_index(*index, "row")?;
            let row = grid.get(index - 1).cloned().unwrap_or_default();
            Ok(Snapshot::Row(trim_trailing_empty(row)))
        }
        Region::Column { index } => {
            let index = check_index(*index, "column")?;
            let column = grid
                .iter()
                .map(|row| row.get(index - 1).cloned().unwrap_or_default())
                .collect();
            Ok(Snapshot::Column(trim_trailing_empty(column)))
        }
        Region::Sheet => Ok(Snapshot::Sheet(grid.to_vec())),
    }
}

fn check_index(index: u32, label: &str) -> Result<usize, SourceError> {
    if index == 0 {
        return Err(SourceError::InvalidAddress(format!("{} 0", label)));
    }
    Ok(index as usize)
}

/// Parse an A1-style cell address ("B3") into a 1-based (row, column)
/// pair.
pub fn parse_cell_address(address: &str) -> Result<(u32, u32), SourceError> {
    let invalid = || SourceError::InvalidAddress(address.to_string());
    let trimmed = address.trim();

    let letters_end = trimmed
        .find(|c: char| !c.is_ascii_alphabetic())
        .unwrap_or(trimmed.len());
    let (letters, digits) = trimmed.split_at(letters_end);
    if letters.is_empty() || digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }

    let mut column: u32 = 0;
    for letter in letters.bytes() {
        let value = (letter.to_ascii_uppercase() - b'A') as u32 + 1;
        column = column
            .checked_mul(26)
            .and_then(|c| c.checked_add(value))
            .ok_or_else(invalid)?;
    }

    let row: u32 = digits.parse().map_err(|_| invalid())?;
    if row == 0 {
        return Err(invalid());
    }
    Ok((row, column))
}

/// Drop empty cells off the end, the way users read a row or column
/// that simply "ends" rather than carrying trailing blanks.
fn trim_trailing_empty(mut values: Vec<String>) -> Vec<String> {
    while values.last().is_some_and(|v| v.is_empty()) {
        values.pop();
    }
    values
}

/// SHA-256 checksum of a file, streamed in 8 KiB chunks.
fn compute_checksum(path: &str) -> Result<String, SourceError> {
    let mut file = File::open(path).map_err(|err| SourceError::unreachable(path, err))?;

    let mut hasher = Sha256::new();
    let mut buffer = [0; 8192];
    loop {
        let bytes_read = file
            .read(&mut buffer)
            .map_err(|err| SourceError::unreachable(path, err))?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
