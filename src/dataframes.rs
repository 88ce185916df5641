//! Row-wise staging between deck records and polars `DataFrame`s, and the
//! frame operations the readers and writers share.
//!
//! Deck records arrive one at a time, so readers stage them in [`Rows`]: an
//! ordered set of named columns holding optional [`DeckValue`]s. Rows may
//! carry different column sets; missing cells are `None`.
//! [`Rows::into_dataframe`] picks one dtype per column and builds the frame
//! with `DataFrame::from_rows_and_schema`. Everything after that (merging,
//! canonical ordering, keyword selection, grouping by region index) is done
//! on the `DataFrame` with the functions at the bottom of this module.
//!
//! # Notes
//! Building frames row by row is slower than column by column. The tables this
//! crate produces are small (one row per tabulated deck value), so clarity wins.
use polars::frame::row::Row;
use polars::functions::concat_df_diagonal;
use polars::prelude::{AnyValue, ChunkCompare, DataFrame, DataType, Field, PolarsResult, Schema, Series, SortOptions};

use crate::keyword_specs::DeckValue;

pub type Cell = Option<DeckValue>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
    columns: Vec<String>,
    data: Vec<Vec<Cell>>,
}

impl Rows {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.col_index(name).is_some()
    }

    fn col_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    fn col_or_insert(&mut self, name: &str) -> usize {
        if let Some(i) = self.col_index(name) {
            return i;
        }
        self.columns.push(name.to_owned());
        for row in self.data.iter_mut() {
            row.push(None);
        }
        self.columns.len() - 1
    }

    /// Append a row given as (column, cell) pairs. Unknown columns are added
    /// and back-filled with `None` for earlier rows.
    pub fn push_row<I, S>(&mut self, cells: I)
    where I: IntoIterator<Item = (S, Cell)>, S: AsRef<str>
    {
        let mut row = vec![None; self.columns.len()];
        for (name, cell) in cells {
            let i = self.col_or_insert(name.as_ref());
            if i >= row.len() {
                row.resize(i + 1, None);
            }
            row[i] = cell;
        }
        row.resize(self.columns.len(), None);
        self.data.push(row);
    }

    /// Set every row of `name` to `cell`, adding the column if needed.
    pub fn set_column(&mut self, name: &str, cell: Cell) {
        let i = self.col_or_insert(name);
        for row in self.data.iter_mut() {
            row[i] = cell.clone();
        }
    }

    pub fn cell(&self, row: usize, name: &str) -> Option<&DeckValue> {
        let c = self.col_index(name)?;
        self.data.get(row)?.get(c)?.as_ref()
    }

    /// Numeric value of a cell. NaN is returned as is; callers decide if it
    /// means "defaulted".
    pub fn real(&self, row: usize, name: &str) -> Option<f64> {
        self.cell(row, name).and_then(|v| v.as_f64())
    }

    pub fn int(&self, row: usize, name: &str) -> Option<i64> {
        self.cell(row, name).and_then(|v| v.as_i64())
    }

    pub fn text(&self, row: usize, name: &str) -> Option<String> {
        self.cell(row, name).map(|v| v.to_string())
    }

    /// Overwrite one cell; the column must exist.
    pub fn set_cell(&mut self, row: usize, name: &str, cell: Cell) {
        if let Some(c) = self.col_index(name) {
            if let Some(r) = self.data.get_mut(row) {
                r[c] = cell;
            }
        }
    }

    pub fn into_dataframe(self) -> PolarsResult<DataFrame> {
        if self.data.is_empty() {
            return Ok(DataFrame::default());
        }

        let dtypes: Vec<DataType> = (0..self.columns.len())
            .map(|c| column_dtype(self.data.iter().map(|r| &r[c])))
            .collect();
        let schema = Schema::from_iter(
            self.columns.iter().zip(dtypes.iter()).map(|(n, dt)| Field::new(n, dt.clone()))
        );

        let rows: Vec<Row> = self.data.into_iter()
            .map(|r| Row::new(r.into_iter().zip(dtypes.iter()).map(|(c, dt)| cell_to_any(c, dt)).collect()))
            .collect();
        DataFrame::from_rows_and_schema(&rows, &schema)
    }

    pub fn from_dataframe(df: &DataFrame) -> PolarsResult<Self> {
        let columns: Vec<String> = df.get_column_names().iter().map(|s| s.to_string()).collect();
        let mut data = Vec::with_capacity(df.height());
        for i in 0..df.height() {
            let row = df.get_row(i)?;
            data.push(row.0.into_iter().map(any_to_cell).collect());
        }
        Ok(Self { columns, data })
    }
}

fn column_dtype<'a, I: Iterator<Item = &'a Cell>>(cells: I) -> DataType {
    let mut dtype = None;
    for cell in cells.flatten() {
        dtype = match (cell, dtype) {
            (DeckValue::Char(_), _) => return DataType::Utf8,
            (DeckValue::Real(_), _) => Some(DataType::Float64),
            (DeckValue::Integer(_), None) => Some(DataType::Int64),
            (DeckValue::Integer(_), Some(dt)) => Some(dt),
        };
    }
    dtype.unwrap_or(DataType::Float64)
}

fn cell_to_any(cell: Cell, dtype: &DataType) -> AnyValue<'static> {
    match (cell, dtype) {
        (None, _) => AnyValue::Null,
        (Some(DeckValue::Integer(i)), DataType::Float64) => AnyValue::Float64(i as f64),
        (Some(v), DataType::Utf8) => AnyValue::Utf8Owned(v.to_string().into()),
        (Some(v), _) => v.into(),
    }
}

fn any_to_cell(value: AnyValue<'_>) -> Cell {
    match value {
        AnyValue::Null => None,
        AnyValue::Boolean(b) => Some(DeckValue::Integer(b as i64)),
        AnyValue::Utf8(s) => Some(DeckValue::Char(s.to_string())),
        AnyValue::Utf8Owned(s) => Some(DeckValue::Char(s.to_string())),
        AnyValue::Int32(i) => Some(DeckValue::Integer(i as i64)),
        AnyValue::Int64(i) => Some(DeckValue::Integer(i)),
        AnyValue::UInt32(i) => Some(DeckValue::Integer(i as i64)),
        AnyValue::UInt64(i) => Some(DeckValue::Integer(i as i64)),
        AnyValue::Float32(f) => Some(DeckValue::Real(f as f64)),
        AnyValue::Float64(f) => Some(DeckValue::Real(f)),
        other => Some(DeckValue::Char(format!("{other}"))),
    }
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().contains(&name)
}

/// Names of the columns holding at least one value
pub fn filled_columns(df: &DataFrame) -> Vec<String> {
    df.get_columns()
        .iter()
        .filter(|s| s.null_count() < s.len())
        .map(|s| s.name().to_owned())
        .collect()
}

fn wider(a: &DataType, b: &DataType) -> DataType {
    match (a, b) {
        _ if a == b => a.clone(),
        (DataType::Utf8, _) | (_, DataType::Utf8) => DataType::Utf8,
        (DataType::Float64 | DataType::Float32, _) | (_, DataType::Float64 | DataType::Float32) => DataType::Float64,
        _ => DataType::Int64,
    }
}

/// One dtype per column name across `frames`. Columns without values only
/// decide the dtype when no frame has values for that name.
fn common_dtypes(frames: &[DataFrame]) -> Vec<(String, DataType)> {
    let mut dtypes: Vec<(String, Option<DataType>, DataType)> = Vec::new();
    for s in frames.iter().flat_map(|df| df.get_columns()) {
        let filled = s.null_count() < s.len();
        match dtypes.iter_mut().find(|(name, ..)| name.as_str() == s.name()) {
            Some((_, widest, _)) if filled => {
                let dt = match widest.take() {
                    Some(dt) => wider(&dt, s.dtype()),
                    None => s.dtype().clone(),
                };
                *widest = Some(dt);
            },
            Some(_) => {},
            None => dtypes.push((s.name().to_owned(), filled.then(|| s.dtype().clone()), s.dtype().clone())),
        }
    }
    dtypes.into_iter()
        .map(|(name, widest, first)| (name, widest.unwrap_or(first)))
        .collect()
}

/// Stack frames in order over the union of their columns.
///
/// A column whose dtype differs between frames is cast first: integers
/// widen to floats and anything next to text becomes text. Cells of columns
/// a frame lacks are null. Frames without rows are skipped.
pub fn concat_frames<I: IntoIterator<Item = DataFrame>>(frames: I) -> PolarsResult<DataFrame> {
    let frames: Vec<DataFrame> = frames.into_iter().filter(|df| df.height() > 0).collect();
    if frames.is_empty() {
        return Ok(DataFrame::default());
    }

    let dtypes = common_dtypes(&frames);
    let cast = frames.iter()
        .map(|df| {
            let columns = df.get_columns()
                .iter()
                .map(|s| match dtypes.iter().find(|(name, _)| name.as_str() == s.name()) {
                    Some((_, dt)) if dt != s.dtype() => s.cast(dt),
                    _ => Ok(s.clone()),
                })
                .collect::<PolarsResult<Vec<Series>>>()?;
            DataFrame::new(columns)
        })
        .collect::<PolarsResult<Vec<_>>>()?;
    concat_df_diagonal(&cast)
}

/// Stable ascending sort on `keys`, the first key most significant.
/// Missing values sort last.
pub fn sort_frame(df: &DataFrame, keys: &[&str]) -> PolarsResult<DataFrame> {
    if df.height() == 0 {
        return Ok(df.clone());
    }
    let options = SortOptions { descending: false, nulls_last: true, multithreaded: false, maintain_order: true };
    keys.iter()
        .rev()
        .try_fold(df.clone(), |sorted, key| sorted.sort_with_options(key, options))
}

/// Rows whose text `column` equals `value`
pub fn filter_text(df: &DataFrame, column: &str, value: &str) -> PolarsResult<DataFrame> {
    let mask = df.column(column)?.utf8()?.equal(value);
    df.filter(&mask)
}

/// Split on an integer column into one frame per value, ascending by value.
/// Rows keep their order within a group; rows without a value are left out.
pub fn partition_by_index(df: &DataFrame, index: &str) -> PolarsResult<Vec<(i64, DataFrame)>> {
    let keyed = df.filter(&df.column(index)?.is_not_null())?;
    if keyed.height() == 0 {
        return Ok(Vec::new());
    }

    let mut groups = keyed.partition_by_stable([index], true)?
        .into_iter()
        .map(|group| {
            let key = group.column(index)?.cast(&DataType::Int64)?.i64()?.get(0);
            Ok((key.unwrap_or_default(), group))
        })
        .collect::<PolarsResult<Vec<_>>>()?;
    groups.sort_by_key(|(key, _)| *key);
    Ok(groups)
}

/// Distinct values of a column as text, in order of first appearance.
/// A missing value is rendered as an empty string.
pub fn unique_text(df: &DataFrame, column: &str) -> PolarsResult<Vec<String>> {
    let unique = df.column(column)?.unique_stable()?.cast(&DataType::Utf8)?;
    Ok(unique.utf8()?
        .into_iter()
        .map(|v| v.unwrap_or_default().to_owned())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::*;

    fn real(v: f64) -> Cell {
        Some(DeckValue::Real(v))
    }

    #[test]
    fn test_union_of_columns() {
        let mut rows = Rows::new();
        rows.push_row([("Z", real(1.0)), ("RS", real(10.0))]);
        rows.push_row([("Z", real(2.0)), ("RV", real(0.1))]);
        assert_eq!(rows.columns(), &["Z".to_string(), "RS".to_string(), "RV".to_string()]);
        assert_eq!(rows.real(0, "RV"), None);
        assert_eq!(rows.real(1, "RV"), Some(0.1));
        assert_eq!(rows.real(1, "RS"), None);
    }

    #[test]
    fn test_to_dataframe() -> PolarsResult<()> {
        let mut rows = Rows::new();
        rows.push_row([("KEYWORD", Some(DeckValue::Char("SWOF".into()))), ("SW", real(0.1)), ("SATNUM", Some(DeckValue::Integer(1)))]);
        rows.push_row([("KEYWORD", Some(DeckValue::Char("SWOF".into()))), ("SW", Some(DeckValue::Integer(1))), ("SATNUM", Some(DeckValue::Integer(1)))]);
        let df = rows.clone().into_dataframe()?;

        // Can't use the df! macro because it makes the integer column an i32 instead of i64
        let ex_schema = Schema::from_iter([
            Field::new("KEYWORD", DataType::Utf8),
            Field::new("SW", DataType::Float64),
            Field::new("SATNUM", DataType::Int64),
        ]);
        let ex_rows = vec![
            Row::new(vec![AnyValue::Utf8Owned("SWOF".into()), AnyValue::Float64(0.1), AnyValue::Int64(1)]),
            Row::new(vec![AnyValue::Utf8Owned("SWOF".into()), AnyValue::Float64(1.0), AnyValue::Int64(1)]),
        ];
        let expected = DataFrame::from_rows_and_schema(&ex_rows, &ex_schema)?;
        assert_eq!(df.column("KEYWORD")?, expected.column("KEYWORD")?);
        assert_eq!(df.column("SW")?, expected.column("SW")?);
        assert_eq!(df.column("SATNUM")?, expected.column("SATNUM")?);

        let back = Rows::from_dataframe(&df)?;
        assert_eq!(back.real(1, "SW"), Some(1.0));
        assert_eq!(back.int(0, "SATNUM"), Some(1));
        assert_eq!(back.text(0, "KEYWORD").as_deref(), Some("SWOF"));
        Ok(())
    }

    #[test]
    fn test_empty_frame() -> PolarsResult<()> {
        let df = Rows::new().into_dataframe()?;
        assert_eq!(df.height(), 0);
        assert!(Rows::from_dataframe(&df)?.is_empty());
        Ok(())
    }

    fn frame(cells: &[(i64, f64, &str)]) -> PolarsResult<DataFrame> {
        let mut rows = Rows::new();
        for (n, z, kw) in cells {
            rows.push_row([
                ("EQLNUM", Some(DeckValue::Integer(*n))),
                ("Z", real(*z)),
                ("KEYWORD", Some(DeckValue::Char(kw.to_string()))),
            ]);
        }
        rows.into_dataframe()
    }

    #[test]
    fn test_sort_and_partition() -> PolarsResult<()> {
        let df = frame(&[(2, 5.0, "RSVD"), (1, 3.0, "RSVD"), (2, 1.0, "RSVD"), (1, 4.0, "RSVD")])?;
        let sorted = sort_frame(&df, &["EQLNUM", "Z"])?;
        let zs: Vec<_> = sorted.column("Z")?.f64()?.into_no_null_iter().collect();
        assert_eq!(zs, vec![3.0, 4.0, 1.0, 5.0]);

        let groups = partition_by_index(&df, "EQLNUM")?;
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].0, 1);
        let zs: Vec<_> = groups[0].1.column("Z")?.f64()?.into_no_null_iter().collect();
        assert_eq!(zs, vec![3.0, 4.0], "Rows should keep their order within a group");
        assert_eq!(groups[1].1.height(), 2);
        Ok(())
    }

    #[test]
    fn test_missing_values_sort_last() -> PolarsResult<()> {
        let mut rows = Rows::new();
        rows.push_row([("SATNUM", None), ("SW", real(0.5))]);
        rows.push_row([("SATNUM", Some(DeckValue::Integer(2))), ("SW", real(0.2))]);
        rows.push_row([("SATNUM", Some(DeckValue::Integer(1))), ("SW", real(0.1))]);
        let df = rows.into_dataframe()?;

        let sorted = sort_frame(&df, &["SATNUM"])?;
        let sw: Vec<_> = sorted.column("SW")?.f64()?.into_no_null_iter().collect();
        assert_eq!(sw, vec![0.1, 0.2, 0.5]);

        let groups = partition_by_index(&df, "SATNUM")?;
        assert_eq!(groups.iter().map(|(n, g)| (*n, g.height())).collect::<Vec<_>>(), vec![(1, 1), (2, 1)]);
        Ok(())
    }

    #[test]
    fn test_concat_widens_dtypes() -> PolarsResult<()> {
        let mut ints = Rows::new();
        ints.push_row([("KEYWORD", Some(DeckValue::Char("PVTW".into()))), ("PRESSURE", Some(DeckValue::Integer(200)))]);
        let mut reals = Rows::new();
        reals.push_row([("KEYWORD", Some(DeckValue::Char("ROCK".into()))), ("PRESSURE", real(250.5)), ("COMPRESSIBILITY", real(1e-5))]);

        let merged = concat_frames([ints.into_dataframe()?, DataFrame::default(), reals.into_dataframe()?])?;
        assert_eq!(merged.height(), 2);
        assert_eq!(merged.get_column_names(), vec!["KEYWORD", "PRESSURE", "COMPRESSIBILITY"]);
        assert_eq!(merged.column("PRESSURE")?.dtype(), &DataType::Float64);
        assert_eq!(merged.column("PRESSURE")?.f64()?.get(0), Some(200.0));
        assert_eq!(merged.column("COMPRESSIBILITY")?.null_count(), 1);

        assert_eq!(concat_frames(Vec::<DataFrame>::new())?.height(), 0);
        Ok(())
    }

    #[test]
    fn test_filter_and_unique() -> PolarsResult<()> {
        let df = frame(&[(1, 1.0, "RSVD"), (1, 2.0, "PBVD"), (2, 3.0, "RSVD")])?;
        let rsvd = filter_text(&df, "KEYWORD", "RSVD")?;
        assert_eq!(rsvd.height(), 2);
        assert_eq!(unique_text(&df, "KEYWORD")?, vec!["RSVD", "PBVD"]);
        assert_eq!(unique_text(&df, "EQLNUM")?, vec!["1", "2"]);
        assert!(has_column(&df, "Z"));
        assert_eq!(filled_columns(&df), vec!["EQLNUM", "Z", "KEYWORD"]);
        Ok(())
    }
}
