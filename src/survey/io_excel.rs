use calamine::{open_workbook, DataType, Reader, Xlsx};
use chrono::Duration;

use survey_report::TIMESTAMP_FORMAT;

use crate::survey::*;

/// Reads a dataset from an Excel workbook, such as the export of an online form.
///
/// The first row holds the column names. Rows made only of empty cells are dropped.
pub fn read_excel_dataset(path: &str, worksheet: Option<&str>) -> BAppResult<Dataset> {
    let wrange = get_range(path, worksheet)?;
    let mut iter = wrange.rows();
    let header = iter.next().context(EmptyExcelSnafu { path })?;
    debug!("read_excel_dataset: header: {:?}", header);

    let mut columns: Vec<String> = Vec::new();
    for (idx, cell) in header.iter().enumerate() {
        let name = cell_text(cell, 1)?.unwrap_or_else(|| format!("Column {}", idx + 1));
        columns.push(name.trim().to_string());
    }

    let mut rows: Vec<Vec<Option<String>>> = Vec::new();
    for (idx, row) in iter.enumerate() {
        // The header is on the first line.
        let lineno = (idx + 2) as u64;
        let mut cells: Vec<Option<String>> = Vec::new();
        for cell in row.iter() {
            cells.push(cell_text(cell, lineno)?);
        }
        if cells.iter().all(|c| c.is_none()) {
            debug!("read_excel_dataset: lineno {}: empty row dropped", lineno);
            continue;
        }
        rows.push(cells);
    }
    Ok(Dataset::new(columns, rows))
}

/// The textual content of a cell, or None for an empty cell.
///
/// Whole numbers are written without decimals, dates in the timestamp format.
pub fn cell_text(cell: &DataType, lineno: u64) -> BAppResult<Option<String>> {
    match cell {
        DataType::Empty => Ok(None),
        DataType::String(s) => Ok(Some(s.clone())),
        DataType::Int(i) => Ok(Some(i.to_string())),
        DataType::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => {
            Ok(Some(format!("{}", *f as i64)))
        }
        DataType::Float(f) => Ok(Some(f.to_string())),
        DataType::Bool(b) => Ok(Some(b.to_string())),
        DataType::DateTime(_) => {
            let text = excel_date(cell).context(ExcelWrongCellTypeSnafu {
                lineno,
                content: format!("{:?}", cell),
            })?;
            Ok(Some(text))
        }
        _ => Err(Box::new(AppError::ExcelWrongCellType {
            lineno,
            content: format!("{:?}", cell),
        })),
    }
}

// Rounded to the nearest second: serial dates carry floating point noise.
fn excel_date(cell: &DataType) -> Option<String> {
    let dt = cell.as_datetime()?;
    let rounded = dt.checked_add_signed(Duration::milliseconds(500))?;
    Some(rounded.format(TIMESTAMP_FORMAT).to_string())
}

fn get_range(path: &str, worksheet: Option<&str>) -> BAppResult<calamine::Range<DataType>> {
    debug!("get_range: path: {:?} worksheet: {:?}", path, worksheet);
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    // A worksheet name was provided, use it.
    if let Some(worksheet_name) = worksheet {
        let wrange = workbook
            .worksheet_range(worksheet_name)
            .context(MissingWorksheetSnafu {
                path,
                worksheet: worksheet_name,
            })?
            .context(OpeningExcelSnafu { path })?;
        Ok(wrange)
    } else {
        let all_worksheets = workbook.worksheets();
        match all_worksheets.as_slice() {
            [] => Err(Box::new(AppError::EmptyExcel {
                path: path.to_string(),
            })),
            [(worksheet_name, wrange)] => {
                debug!("get_range: using the only worksheet {:?}", worksheet_name);
                Ok(wrange.clone())
            }
            x => Err(Box::new(AppError::AmbiguousWorksheet {
                path: path.to_string(),
                count: x.len(),
            })),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cells() {
        assert_eq!(cell_text(&DataType::Empty, 2).unwrap(), None);
        assert_eq!(
            cell_text(&DataType::String("Lelaki".to_string()), 2).unwrap(),
            Some("Lelaki".to_string())
        );
        assert_eq!(
            cell_text(&DataType::Float(30.0), 2).unwrap(),
            Some("30".to_string())
        );
        assert_eq!(
            cell_text(&DataType::Float(2.5), 2).unwrap(),
            Some("2.5".to_string())
        );
        assert_eq!(
            cell_text(&DataType::Int(4), 2).unwrap(),
            Some("4".to_string())
        );
        assert_eq!(
            cell_text(&DataType::Bool(true), 2).unwrap(),
            Some("true".to_string())
        );
    }

    #[test]
    fn dates() {
        // 2024-01-01 12:00:00
        assert_eq!(
            cell_text(&DataType::DateTime(45292.5), 2).unwrap(),
            Some("2024-01-01 12:00:00".to_string())
        );
        // 2024-01-01 10:05:00, stored a hair below the exact value
        assert_eq!(
            cell_text(&DataType::DateTime(45292.420138888), 2).unwrap(),
            Some("2024-01-01 10:05:00".to_string())
        );
        assert_eq!(excel_date(&DataType::String("x".to_string())), None);
    }

    #[test]
    fn missing_workbook() {
        assert!(read_excel_dataset("/nonexistent/form.xlsx", None).is_err());
    }
}
