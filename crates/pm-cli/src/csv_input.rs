//! Parses the CSV test-input format described in the external-interfaces
//! contract: a header row naming "Read object N" / "Written object N"
//! columns, one transaction per subsequent row, empty cells meaning "no
//! object here".

use pm_core::{InputTransaction, ObjectAddress, Tid};
use thiserror::Error;

/// Errors that map 1:1 onto the CLI's documented exit codes.
#[derive(Debug, Error)]
pub enum CsvInputError {
    #[error("file not found: {0}")]
    FileNotFound(String),
    #[error("header missing Read/Written object columns")]
    HeaderMissing,
    #[error("non-numeric address in row {row}, column {column:?}: {value:?}")]
    NonNumericAddress {
        row: usize,
        column: String,
        value: String,
    },
    #[error("address out of range in row {row}, column {column:?}: {value}")]
    AddressOutOfRange {
        row: usize,
        column: String,
        value: u128,
    },
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl CsvInputError {
    /// Maps an error onto the process exit code documented for the CSV
    /// input format.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::FileNotFound(_) => 1,
            Self::HeaderMissing => 2,
            Self::NonNumericAddress { .. } => 3,
            Self::AddressOutOfRange { .. } => 4,
            Self::Csv(_) => 2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ColumnKind {
    Read,
    Write,
}

struct Column {
    index: usize,
    kind: ColumnKind,
    name: String,
}

/// Reads every transaction out of a CSV file at `path`.
///
/// # Errors
/// Returns [`CsvInputError::FileNotFound`] if `path` cannot be opened,
/// [`CsvInputError::HeaderMissing`] if no "Read object"/"Written object"
/// columns are present, and [`CsvInputError::NonNumericAddress`] /
/// [`CsvInputError::AddressOutOfRange`] for malformed cells.
pub fn read_transactions(path: &str) -> Result<Vec<InputTransaction>, CsvInputError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|_| CsvInputError::FileNotFound(path.to_owned()))?;

    let headers = reader.headers()?.clone();
    let columns: Vec<Column> = headers
        .iter()
        .enumerate()
        .filter_map(|(index, name)| {
            if name.starts_with("Read object") {
                Some(Column {
                    index,
                    kind: ColumnKind::Read,
                    name: name.to_owned(),
                })
            } else if name.starts_with("Written object") {
                Some(Column {
                    index,
                    kind: ColumnKind::Write,
                    name: name.to_owned(),
                })
            } else {
                None
            }
        })
        .collect();

    if columns.is_empty() {
        return Err(CsvInputError::HeaderMissing);
    }

    let mut transactions = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record?;
        let mut reads = Vec::new();
        let mut writes = Vec::new();
        for column in &columns {
            let Some(cell) = record.get(column.index) else {
                continue;
            };
            let cell = cell.trim();
            if cell.is_empty() {
                continue;
            }
            let address = parse_address(cell, row_idx, &column.name)?;
            match column.kind {
                ColumnKind::Read => reads.push(address),
                ColumnKind::Write => writes.push(address),
            }
        }
        transactions.push(InputTransaction::new(Tid(row_idx as u64), &reads, &writes));
    }
    Ok(transactions)
}

fn parse_address(cell: &str, row: usize, column: &str) -> Result<ObjectAddress, CsvInputError> {
    let value: u128 = cell.parse().map_err(|_| CsvInputError::NonNumericAddress {
        row,
        column: column.to_owned(),
        value: cell.to_owned(),
    })?;
    ObjectAddress::try_from(value).map_err(|_| CsvInputError::AddressOutOfRange {
        row,
        column: column.to_owned(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("create temp file");
        file.write_all(contents.as_bytes()).expect("write csv");
        file
    }

    #[test]
    fn parses_reads_and_writes_by_header_prefix() {
        let file = write_temp_csv(
            "Read object 0,Read object 1,Written object 0\n1,2,3\n",
        );
        let txs = read_transactions(file.path().to_str().unwrap()).expect("parses");
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].objects.len(), 3);
    }

    #[test]
    fn missing_header_columns_is_an_error() {
        let file = write_temp_csv("foo,bar\n1,2\n");
        let err = read_transactions(file.path().to_str().unwrap()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn non_numeric_address_is_an_error() {
        let file = write_temp_csv("Read object 0\nabc\n");
        let err = read_transactions(file.path().to_str().unwrap()).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn missing_file_reports_not_found() {
        let err = read_transactions("/no/such/path.csv").unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn empty_cells_are_skipped() {
        let file = write_temp_csv("Read object 0,Read object 1\n1,\n");
        let txs = read_transactions(file.path().to_str().unwrap()).expect("parses");
        assert_eq!(txs[0].objects.len(), 1);
    }
}
