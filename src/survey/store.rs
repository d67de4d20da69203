//! Persistence of the submitted responses.
//!
//! Submissions are only ever appended. When a response brings a prompt that the file
//! does not know yet, the whole table is rewritten with the new column into a sibling
//! file which then replaces the original, so that a failure never leaves a truncated
//! file behind.

use std::fs::OpenOptions;
use std::io::Write;

use survey_report::{ResponseRecord, TIMESTAMP_COLUMN};

use crate::survey::{io_csv::*, *};

pub trait ResponseStore {
    /// A fresh snapshot of all the responses submitted so far.
    fn load(&self) -> BAppResult<Dataset>;

    /// Adds one response. Either the whole response is stored, or nothing is.
    fn append(&self, record: &ResponseRecord) -> BAppResult<()>;
}

#[derive(Debug, Clone)]
pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: &str) -> CsvStore {
        CsvStore {
            path: PathBuf::from(path),
        }
    }

    fn path_str(&self) -> String {
        self.path.display().to_string()
    }

    fn rewrite(&self, dataset: &Dataset) -> BAppResult<()> {
        let mut tmp_name = self.path.as_os_str().to_os_string();
        tmp_name.push(".tmp");
        let tmp = PathBuf::from(tmp_name);
        let mut buf: Vec<u8> = Vec::new();
        write_csv_dataset(dataset, &mut buf)?;
        fs::write(&tmp, &buf).context(PersistenceFailureSnafu {
            path: self.path_str(),
        })?;
        if let Err(e) = fs::rename(&tmp, &self.path) {
            let _ = fs::remove_file(&tmp);
            return Err(Box::new(AppError::PersistenceFailure {
                source: e,
                path: self.path_str(),
            }));
        }
        Ok(())
    }
}

impl ResponseStore for CsvStore {
    fn load(&self) -> BAppResult<Dataset> {
        if !self.path.exists() {
            debug!("CsvStore::load: {:?} does not exist yet", self.path);
            return Ok(Dataset::new(vec![TIMESTAMP_COLUMN.to_string()], vec![]));
        }
        read_csv_dataset(&self.path_str())
    }

    fn append(&self, record: &ResponseRecord) -> BAppResult<()> {
        let existing = self.load()?;
        // The response as a one-row dataset, with the same column normalization as the file.
        let incoming = Dataset::from_records(std::slice::from_ref(record));
        let mut columns: Vec<String> = existing.columns().to_vec();
        if !columns.iter().any(|c| c == TIMESTAMP_COLUMN) {
            columns.insert(0, TIMESTAMP_COLUMN.to_string());
        }
        let new_columns: Vec<String> = incoming
            .columns()
            .iter()
            .filter(|c| !columns.contains(c))
            .cloned()
            .collect();
        let widened = !new_columns.is_empty() || columns.len() != existing.columns().len();
        columns.extend(new_columns.iter().cloned());
        let row: Vec<Option<String>> = incoming
            .rows()
            .first()
            .map(|r| widen_row(incoming.columns(), &columns, r))
            .unwrap_or_default();

        if !self.path.exists() || widened {
            info!(
                "CsvStore::append: writing {:?} with the new columns {:?}",
                self.path, new_columns
            );
            let mut rows: Vec<Vec<Option<String>>> = Vec::new();
            for r in existing.rows().iter() {
                rows.push(widen_row(existing.columns(), &columns, r));
            }
            rows.push(row);
            return self.rewrite(&Dataset::new(columns, rows));
        }

        let mut bytes: Vec<u8> = Vec::new();
        let contents = fs::read(&self.path).context(PersistenceFailureSnafu {
            path: self.path_str(),
        })?;
        if contents.last().map_or(false, |c| *c != b'\n') {
            bytes.push(b'\n');
        }
        bytes.extend(encode_row(&row)?);
        let mut file = OpenOptions::new()
            .append(true)
            .open(&self.path)
            .context(PersistenceFailureSnafu {
                path: self.path_str(),
            })?;
        // A single write for the whole line.
        file.write_all(&bytes).context(PersistenceFailureSnafu {
            path: self.path_str(),
        })?;
        debug!("CsvStore::append: {} bytes appended to {:?}", bytes.len(), self.path);
        Ok(())
    }
}

// Moves the cells of a row under the same column names in a wider header.
fn widen_row(from: &[String], to: &[String], row: &[Option<String>]) -> Vec<Option<String>> {
    to.iter()
        .map(|c| {
            from.iter()
                .position(|f| f == c)
                .and_then(|idx| row.get(idx).cloned().flatten())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use survey_report::Outcome;

    fn record(minute: u32, answers: &[(&str, &str)]) -> ResponseRecord {
        ResponseRecord {
            submitted_at: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(10, minute, 0)
                .unwrap(),
            outcome: Outcome::Completed,
            answers: answers
                .iter()
                .map(|(p, a)| (p.to_string(), a.to_string()))
                .collect(),
        }
    }

    #[test]
    fn missing_file_is_an_empty_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::new(dir.path().join("r.csv").to_str().unwrap());
        let ds = store.load().unwrap();
        assert_eq!(ds.columns(), &[TIMESTAMP_COLUMN]);
        assert!(ds.is_empty());
    }

    #[test]
    fn appends_and_widens() {
        let _ = env_logger::try_init();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.csv");
        let store = CsvStore::new(path.to_str().unwrap());
        store
            .append(&record(0, &[("Consent", "Yes"), ("Gender", "Male")]))
            .unwrap();
        store.append(&record(1, &[("Consent", "No")])).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Timestamp,Consent,Gender\n2024-01-01 10:00:00,Yes,Male\n2024-01-01 10:01:00,No,\n"
        );

        store
            .append(&record(2, &[("Consent", "Yes"), ("Age", "30")]))
            .unwrap();
        let ds = store.load().unwrap();
        assert_eq!(ds.columns(), &["Timestamp", "Consent", "Gender", "Age"]);
        assert_eq!(ds.num_rows(), 3);
        assert_eq!(
            ds.column("Age").unwrap(),
            vec![None, None, Some("30")]
        );
        assert_eq!(
            ds.column("Gender").unwrap(),
            vec![Some("Male"), None, None]
        );
        assert!(!dir.path().join("r.csv.tmp").exists());
    }

    #[test]
    fn padded_prompts_land_in_their_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.csv");
        let store = CsvStore::new(path.to_str().unwrap());
        store.append(&record(0, &[(" Gender", "Male")])).unwrap();
        store.append(&record(1, &[(" Gender", "Female")])).unwrap();
        store.append(&record(2, &[("Gender ", "Male")])).unwrap();
        let ds = store.load().unwrap();
        assert_eq!(ds.columns(), &["Timestamp", "Gender"]);
        assert_eq!(
            ds.column("Gender").unwrap(),
            vec![Some("Male"), Some("Female"), Some("Male")]
        );
    }

    #[test]
    fn appends_after_a_file_without_final_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.csv");
        fs::write(&path, "Timestamp,Consent\n2024-01-01 09:00:00,Yes").unwrap();
        let store = CsvStore::new(path.to_str().unwrap());
        store.append(&record(0, &[("Consent", "No")])).unwrap();
        let ds = store.load().unwrap();
        assert_eq!(ds.column("Consent").unwrap(), vec![Some("Yes"), Some("No")]);
    }

    #[test]
    fn unwritable_location() {
        let store = CsvStore::new("/nonexistent/dir/r.csv");
        let res = store.append(&record(0, &[("Consent", "No")]));
        assert!(matches!(
            res.map_err(|e| *e),
            Err(AppError::PersistenceFailure { .. })
        ));
    }
}
