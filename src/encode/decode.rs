//! Inverse of the dictionary encoding.
//!
//! Decoded values are the dictionary's string keys; [`ABSENT`] decodes to `null`.

use serde_json::Value;

use super::{ABSENT, Code, ColumnDictionary, DatasetBlock, EncodedCell, EncodedColumn};
use crate::record::Row;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("column {0} has no encoded values")]
    MissingColumn(String),
    #[error("column {0} has no dictionary")]
    MissingDictionary(String),
    #[error("column {column}: code {code} is not in the dictionary")]
    UnknownCode { column: String, code: Code },
    #[error("column {column}: {len} values for {total} records")]
    LengthMismatch {
        column: String,
        len: usize,
        total: usize,
    },
}

struct Inverse<'a> {
    column: &'a str,
    keys: Vec<&'a str>,
}

impl<'a> Inverse<'a> {
    fn new(column: &'a str, dictionary: &'a ColumnDictionary) -> Self {
        let mut keys = vec![""; dictionary.len()];
        for (key, code) in dictionary.iter() {
            if let Some(slot) = usize::try_from(code).ok().and_then(|i| keys.get_mut(i)) {
                *slot = key;
            }
        }
        Self { column, keys }
    }

    fn value(&self, code: Code) -> Result<Value, Error> {
        if code == ABSENT {
            return Ok(Value::Null);
        }
        usize::try_from(code)
            .ok()
            .and_then(|i| self.keys.get(i))
            .map(|key| Value::String(key.to_string()))
            .ok_or_else(|| Error::UnknownCode {
                column: self.column.to_owned(),
                code,
            })
    }
}

/// Decode one column of a block.
pub fn decode_column(block: &DatasetBlock, column: &str) -> Result<Vec<Value>, Error> {
    let encoded = block
        .columns
        .get(column)
        .ok_or_else(|| Error::MissingColumn(column.to_owned()))?;
    let dictionary = block
        .dictionaries
        .get(column)
        .ok_or_else(|| Error::MissingDictionary(column.to_owned()))?;
    if encoded.len() != block.total_records {
        return Err(Error::LengthMismatch {
            column: column.to_owned(),
            len: encoded.len(),
            total: block.total_records,
        });
    }
    let inverse = Inverse::new(column, dictionary);
    match encoded {
        EncodedColumn::Scalar(codes) => codes.iter().map(|code| inverse.value(*code)).collect(),
        EncodedColumn::MultiValue(cells) => cells
            .iter()
            .map(|cell| match cell {
                EncodedCell::Code(code) => inverse.value(*code),
                EncodedCell::Codes(codes) => codes
                    .iter()
                    .map(|code| inverse.value(*code))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array),
            })
            .collect(),
    }
}

/// Rebuild rows positionally, columns in block order.
pub fn decode_rows(block: &DatasetBlock) -> Result<Vec<Row>, Error> {
    let mut rows = vec![Row::new(); block.total_records];
    for column in &block.column_order {
        for (row, value) in rows.iter_mut().zip(decode_column(block, column)?) {
            row.insert(column.clone(), value);
        }
    }
    Ok(rows)
}

/// Check the length invariant of every column.
pub fn validate(block: &DatasetBlock) -> Result<(), Error> {
    for column in &block.column_order {
        decode_column(block, column)?;
    }
    Ok(())
}
