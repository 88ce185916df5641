//! Columnar encoding of a lift curve table as an arrow schema plus one chunk.
//!
//! Each body record becomes a `Float64Array` over the flow values. Its field
//! metadata holds the record's axis indices. Header words, header numbers and
//! axis values live in the schema metadata as text, axis values separated by
//! single spaces.
use itertools::Itertools;
use polars::export::arrow::array::{Array, Float64Array};
use polars::export::arrow::chunk::Chunk;
use polars::export::arrow::datatypes::{ArrowDataType, ArrowSchema, Field};

pub use polars::export::arrow::datatypes::Metadata;

use crate::table_error::{TableError, TableResult};

use super::common::BodyRecord;

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnarTable {
    pub schema: ArrowSchema,
    pub chunk: Chunk<Box<dyn Array>>,
}

pub fn encode_text(text: &str) -> String {
    text.to_owned()
}

/// Shortest text that parses back to the same `f64`
pub fn encode_reals(values: &[f64]) -> String {
    values.iter().join(" ")
}

fn invalid(key: &str, text: &str) -> TableError {
    TableError::InvalidValue { column: key.to_owned(), value: text.to_owned() }
}

pub fn decode_text(metadata: &Metadata, key: &str) -> TableResult<String> {
    metadata.get(key)
        .cloned()
        .ok_or_else(|| TableError::MissingColumn(key.to_owned()))
}

pub fn decode_number<T: std::str::FromStr>(metadata: &Metadata, key: &str) -> TableResult<T> {
    let text = decode_text(metadata, key)?;
    text.trim().parse().map_err(|_| invalid(key, &text))
}

pub fn decode_reals(metadata: &Metadata, key: &str) -> TableResult<Vec<f64>> {
    let text = decode_text(metadata, key)?;
    text.split_whitespace()
        .map(|v| v.parse().map_err(|_| invalid(key, v)))
        .collect()
}

impl ColumnarTable {
    /// One column per body record, in record order. `index_keys` name the
    /// axis index entries of each field's metadata, in the record's axis order.
    pub fn from_records(metadata: Metadata, records: &[BodyRecord], index_keys: &[&str]) -> TableResult<Self> {
        let fields: Vec<Field> = records.iter()
            .enumerate()
            .map(|(n, record)| {
                let mut field_meta: Metadata = index_keys.iter()
                    .zip(&record.indices)
                    .map(|(key, i)| (key.to_string(), i.to_string()))
                    .collect();
                field_meta.insert("record".to_string(), (n + 1).to_string());
                Field::new(record.indices.iter().join("_"), ArrowDataType::Float64, false).with_metadata(field_meta)
            })
            .collect();
        let arrays = records.iter()
            .map(|record| Float64Array::from_vec(record.values.clone()).boxed())
            .collect();

        Ok(Self {
            schema: ArrowSchema::from(fields).with_metadata(metadata),
            chunk: Chunk::try_new(arrays)?,
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.schema.metadata
    }

    /// Body records in column order.
    pub fn records(&self, index_keys: &[&str]) -> TableResult<Vec<BodyRecord>> {
        if self.schema.fields.len() != self.chunk.arrays().len() {
            return Err(TableError::DimensionMismatch(format!(
                "{} fields for {} columns", self.schema.fields.len(), self.chunk.arrays().len()
            )));
        }
        self.schema.fields.iter()
            .zip(self.chunk.arrays())
            .map(|(field, array)| {
                let indices = index_keys.iter()
                    .map(|key| decode_number::<usize>(&field.metadata, key))
                    .collect::<TableResult<Vec<_>>>()?;
                let values = array.as_any()
                    .downcast_ref::<Float64Array>()
                    .ok_or_else(|| invalid(&field.name, &format!("{:?}", array.data_type())))?;
                Ok(BodyRecord { indices, values: values.values().iter().copied().collect() })
            })
            .collect()
    }

    pub fn num_columns(&self) -> usize {
        self.chunk.arrays().len()
    }

    pub fn num_rows(&self) -> usize {
        self.chunk.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::export::arrow::array::Int64Array;

    #[test]
    fn test_metadata_values() -> TableResult<()> {
        let mut meta = Metadata::new();
        meta.insert("DATUM".to_string(), encode_text(&2000.5_f64.to_string()));
        meta.insert("THP_VALUES".to_string(), encode_reals(&[1.0, 2.5, -3.0, 0.1]));
        meta.insert("BAD".to_string(), "1.0 x".to_string());

        assert_eq!(decode_number::<f64>(&meta, "DATUM")?, 2000.5);
        assert_eq!(decode_reals(&meta, "THP_VALUES")?, vec![1.0, 2.5, -3.0, 0.1]);
        assert!(matches!(decode_reals(&meta, "BAD"), Err(TableError::InvalidValue { value, .. }) if value == "x"));
        assert!(matches!(decode_text(&meta, "NONE"), Err(TableError::MissingColumn(_))));
        Ok(())
    }

    #[test]
    fn test_records_by_column() -> TableResult<()> {
        let keys = ["thp_idx", "wfr_idx"];
        let records = [
            BodyRecord { indices: vec![1, 2], values: vec![10.0, 20.0] },
            BodyRecord { indices: vec![2, 1], values: vec![30.0, 40.0] },
        ];
        let mut meta = Metadata::new();
        meta.insert("VFP_TYPE".to_string(), encode_text("VFPPROD"));
        let table = ColumnarTable::from_records(meta, &records, &keys)?;

        assert_eq!(table.num_columns(), 2);
        assert_eq!(table.num_rows(), 2);
        assert_eq!(decode_text(table.metadata(), "VFP_TYPE")?, "VFPPROD");
        let field = &table.schema.fields[1];
        assert_eq!(field.name, "2_1");
        assert_eq!(field.data_type, ArrowDataType::Float64);
        assert_eq!(decode_text(&field.metadata, "record")?, "2");
        assert_eq!(decode_text(&field.metadata, "wfr_idx")?, "1");

        assert_eq!(table.records(&keys)?, records.to_vec());
        Ok(())
    }

    #[test]
    fn test_ragged_and_mistyped_columns() -> TableResult<()> {
        let ragged = [
            BodyRecord { indices: vec![1], values: vec![10.0, 20.0] },
            BodyRecord { indices: vec![2], values: vec![30.0] },
        ];
        assert!(ColumnarTable::from_records(Metadata::new(), &ragged, &["thp_idx"]).is_err());

        let mut table = ColumnarTable::from_records(Metadata::new(), &ragged[..1], &["thp_idx"])?;
        table.chunk = Chunk::try_new(vec![Int64Array::from_vec(vec![1, 2]).boxed()])?;
        assert!(matches!(table.records(&["thp_idx"]), Err(TableError::InvalidValue { .. })));
        Ok(())
    }
}
