//! Columnar dictionary encoding
//!
//! Each column of a dataset becomes a dictionary of its distinct values plus a column of
//! integer codes pointing into that dictionary. Codes are dense and assigned in first-seen
//! order; [`ABSENT`] marks cells without a value.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    record::{self, Row},
    schema::{ColumnKind, DatasetSchema},
};

pub mod decode;

/// Integer code of a dictionary entry.
pub type Code = i32;

/// Code of a cell without a value. Never a dictionary entry.
pub const ABSENT: Code = -1;

/// Distinct values of one column mapped to their codes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ColumnDictionary(IndexMap<String, Code>);

impl ColumnDictionary {
    fn insert(&mut self, key: String) {
        let next = self.0.len() as Code;
        self.0.entry(key).or_insert(next);
    }

    pub fn code(&self, key: &str) -> Option<Code> {
        self.0.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Code)> {
        self.0.iter().map(|(key, code)| (key.as_str(), *code))
    }

    fn lookup(&self, value: Option<&Value>) -> Code {
        record::dictionary_key(value)
            .and_then(|key| self.code(&key))
            .unwrap_or(ABSENT)
    }
}

/// One cell of a multi-value column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EncodedCell {
    Code(Code),
    Codes(Vec<Code>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EncodedColumn {
    Scalar(Vec<Code>),
    MultiValue(Vec<EncodedCell>),
}

impl EncodedColumn {
    pub fn len(&self) -> usize {
        match self {
            Self::Scalar(codes) => codes.len(),
            Self::MultiValue(cells) => cells.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Encoded form of one dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetBlock {
    /// Per-column dictionaries.
    #[serde(rename = "m")]
    pub dictionaries: IndexMap<String, ColumnDictionary>,
    /// Per-column codes, one entry per record.
    #[serde(rename = "v")]
    pub columns: IndexMap<String, EncodedColumn>,
    /// Column order.
    #[serde(rename = "c")]
    pub column_order: Vec<String>,
    pub total_records: usize,
}

/// Dictionary of the present values of `column`, in first-seen order.
pub fn build_column_dictionary(records: &[Row], column: &str) -> ColumnDictionary {
    let mut dictionary = ColumnDictionary::default();
    for key in records
        .iter()
        .filter_map(|row| record::dictionary_key(row.get(column)))
    {
        dictionary.insert(key);
    }
    dictionary
}

/// Dictionary of a multi-value column: array elements get their own entries.
pub fn build_array_column_dictionary(records: &[Row], column: &str) -> ColumnDictionary {
    let mut dictionary = ColumnDictionary::default();
    for value in records.iter().filter_map(|row| row.get(column)) {
        match value {
            Value::Array(items) => {
                for key in items.iter().filter_map(|item| record::dictionary_key(Some(item))) {
                    dictionary.insert(key);
                }
            }
            value => {
                if let Some(key) = record::dictionary_key(Some(value)) {
                    dictionary.insert(key);
                }
            }
        }
    }
    dictionary
}

pub fn encode_scalar_column(
    records: &[Row],
    column: &str,
    dictionary: &ColumnDictionary,
) -> Vec<Code> {
    records
        .iter()
        .map(|row| dictionary.lookup(row.get(column)))
        .collect()
}

/// Array cells encode element-wise; any other present value stays a bare code.
pub fn encode_array_column(
    records: &[Row],
    column: &str,
    dictionary: &ColumnDictionary,
) -> Vec<EncodedCell> {
    records
        .iter()
        .map(|row| match row.get(column) {
            Some(Value::Array(items)) => EncodedCell::Codes(
                items
                    .iter()
                    .map(|item| dictionary.lookup(Some(item)))
                    .collect(),
            ),
            value => EncodedCell::Code(dictionary.lookup(value)),
        })
        .collect()
}

/// Encode every column declared by `schema`.
///
/// Keys of a record that the schema does not declare are not encoded.
pub fn encode_dataset(records: &[Row], schema: &DatasetSchema) -> DatasetBlock {
    let mut block = DatasetBlock {
        total_records: records.len(),
        ..Default::default()
    };
    for (column, kind) in schema.columns() {
        let (dictionary, encoded) = match kind {
            ColumnKind::Scalar => {
                let dictionary = build_column_dictionary(records, column);
                let encoded = encode_scalar_column(records, column, &dictionary);
                (dictionary, EncodedColumn::Scalar(encoded))
            }
            ColumnKind::MultiValue => {
                let dictionary = build_array_column_dictionary(records, column);
                let encoded = encode_array_column(records, column, &dictionary);
                (dictionary, EncodedColumn::MultiValue(encoded))
            }
        };
        block.dictionaries.insert(column.to_owned(), dictionary);
        block.columns.insert(column.to_owned(), encoded);
        block.column_order.push(column.to_owned());
    }
    block
}
