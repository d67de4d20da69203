// Primitives for reading and writing CSV files.

use std::io;

use crate::survey::{io_common::simplify_file_name, *};

/// Reads a dataset. The first line holds the column names.
///
/// Rows in which every cell is empty are dropped, short rows are padded with missing cells.
pub fn read_csv_dataset(path: &str) -> BAppResult<Dataset> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let columns: Vec<String> = rdr
        .headers()
        .context(CsvOpenSnafu { path })?
        .iter()
        .map(|s| s.trim().to_string())
        .collect();
    debug!("read_csv_dataset: {}: columns: {:?}", simplify_file_name(path), columns);

    let mut rows: Vec<Vec<Option<String>>> = Vec::new();
    for (idx, line_r) in rdr.records().enumerate() {
        // The header is on the first line.
        let lineno = (idx + 2) as u64;
        let line = line_r.context(CsvLineParseSnafu { path, lineno })?;
        if line.iter().all(|s| s.trim().is_empty()) {
            debug!("read_csv_dataset: lineno {}: empty row dropped", lineno);
            continue;
        }
        rows.push(line.iter().map(|s| Some(s.to_string())).collect());
    }
    Ok(Dataset::new(columns, rows))
}

/// Serializes one row, missing cells being written as empty fields.
pub fn encode_row(row: &[Option<String>]) -> BAppResult<Vec<u8>> {
    let mut wtr = csv::WriterBuilder::new().from_writer(Vec::new());
    wtr.write_record(row.iter().map(|c| c.as_deref().unwrap_or("")))
        .context(CsvWriteSnafu)?;
    let bytes = wtr
        .into_inner()
        .map_err(|e| AppError::Whatever {
            message: format!("Error flushing CSV data: {}", e),
            source: None,
        })?;
    Ok(bytes)
}

/// Writes the header and all the rows of a dataset.
pub fn write_csv_dataset<W: io::Write>(dataset: &Dataset, writer: W) -> BAppResult<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(dataset.columns()).context(CsvWriteSnafu)?;
    for row in dataset.rows().iter() {
        wtr.write_record(row.iter().map(|c| c.as_deref().unwrap_or("")))
            .context(CsvWriteSnafu)?;
    }
    wtr.flush().context(WritingOutputSnafu { path: "csv output" })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_and_normalizes() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("r.csv");
        fs::write(
            &p,
            "Timestamp, Gender ,Age\n2024-01-01 10:00:00,Male,30\n,,\n2024-01-01 10:05:00,  \n",
        )
        .unwrap();
        let ds = read_csv_dataset(p.to_str().unwrap()).unwrap();
        assert_eq!(ds.columns(), &["Timestamp", "Gender", "Age"]);
        assert_eq!(ds.num_rows(), 2);
        assert_eq!(
            ds.column("Gender").unwrap(),
            vec![Some("Male"), None]
        );
        assert_eq!(ds.column("Age").unwrap(), vec![Some("30"), None]);
    }

    #[test]
    fn missing_file() {
        assert!(read_csv_dataset("/nonexistent/dir/r.csv").is_err());
    }

    #[test]
    fn quoting() {
        let row = vec![Some("a, b".to_string()), None, Some("c".to_string())];
        assert_eq!(encode_row(&row).unwrap(), b"\"a, b\",,c\n".to_vec());

        let ds = Dataset::new(
            vec!["Q".to_string(), "R".to_string()],
            vec![vec![Some("say \"hi\"".to_string()), None]],
        );
        let mut buf: Vec<u8> = Vec::new();
        write_csv_dataset(&ds, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "Q,R\n\"say \"\"hi\"\"\",\n");
    }
}
