//! Stacking and unstacking of lift curve tables.
//!
//! A lift curve table is a block of body records, one per combination of
//! interpolation axis values, each holding one tabulated value per flow
//! value. [`stack`] flattens that block into one row per (combination, flow)
//! pair; [`unstack`] recovers the axes and body records from such rows.
//! Both directions scatter values into the full Cartesian index space, so a
//! combination that is missing or given twice is reported instead of patched.
use itertools::Itertools;
use polars::prelude::{DataFrame, DataType};

use crate::dataframes::{sort_frame, unique_text, Rows};
use crate::keyword_specs::DeckValue;
use crate::table_error::{TableError, TableResult};
use crate::writer::{general_width, require_column};

pub const RATE: &str = "RATE";
pub const TAB: &str = "TAB";

const VALUES_PER_LINE: usize = 5;

/// Values of one interpolation axis and the table column holding them
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    pub column: &'static str,
    pub values: Vec<f64>,
}

/// One body record: 1-based indices into each axis, then one value per flow value
#[derive(Debug, Clone, PartialEq)]
pub struct BodyRecord {
    pub indices: Vec<usize>,
    pub values: Vec<f64>,
}

/// Table numbers from a selection like `"[1,2,6:9]"`. Ranges are inclusive.
pub fn string2intlist(text: &str) -> TableResult<Vec<i64>> {
    let parse = |s: &str| {
        s.trim().parse::<i64>()
            .map_err(|_| TableError::InvalidValue { column: "TABLE_NUMBER".to_string(), value: s.trim().to_owned() })
    };

    let inner = text.trim().trim_start_matches('[').trim_end_matches(']');
    let mut numbers = Vec::new();
    for item in inner.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        match item.split_once(':') {
            Some((lo, hi)) => numbers.extend(parse(lo)?..=parse(hi)?),
            None => numbers.push(parse(item)?),
        }
    }
    Ok(numbers)
}

/// Position of a combination in the index space, the first axis varying slowest.
/// `None` if an index is outside its axis.
fn slot_of(indices: &[usize], lengths: &[usize]) -> Option<usize> {
    indices.iter()
        .zip(lengths)
        .try_fold(0, |acc, (&i, &len)| (1..=len).contains(&i).then(|| acc * len + i - 1))
}

fn indices_of(mut slot: usize, lengths: &[usize]) -> Vec<usize> {
    let mut indices = vec![0; lengths.len()];
    for (i, len) in lengths.iter().enumerate().rev() {
        indices[i] = slot % len + 1;
        slot /= len;
    }
    indices
}

fn real(value: f64) -> Option<DeckValue> {
    Some(DeckValue::Real(value))
}

/// Flatten body records into rows of RATE, one column per axis, and TAB,
/// sorted by the axes in order and then by rate.
pub fn stack(flow: &[f64], axes: &[Axis], body: &[BodyRecord]) -> TableResult<DataFrame> {
    let lengths: Vec<usize> = axes.iter().map(|a| a.values.len()).collect();
    let mut slots: Vec<Option<&[f64]>> = vec![None; lengths.iter().product()];

    for (n, record) in body.iter().enumerate() {
        if record.values.len() != flow.len() {
            return Err(TableError::DimensionMismatch(format!(
                "record {} holds {} values for {} flow values", n + 1, record.values.len(), flow.len()
            )));
        }
        let slot = (record.indices.len() == axes.len())
            .then(|| slot_of(&record.indices, &lengths))
            .flatten()
            .ok_or_else(|| TableError::DimensionMismatch(format!(
                "record {} has axis indices {:?} outside axis lengths {:?}", n + 1, record.indices, lengths
            )))?;
        if slots[slot].replace(record.values.as_slice()).is_some() {
            return Err(TableError::DimensionMismatch(format!("axis indices {:?} given twice", record.indices)));
        }
    }

    let mut rows = Rows::new();
    for (slot, values) in slots.into_iter().enumerate() {
        let indices = indices_of(slot, &lengths);
        let values = values.ok_or_else(|| TableError::DimensionMismatch(format!("no record for axis indices {indices:?}")))?;
        for (rate, value) in flow.iter().zip(values) {
            let mut row = vec![(RATE, real(*rate))];
            row.extend(axes.iter().zip(&indices).map(|(axis, i)| (axis.column, real(axis.values[i - 1]))));
            row.push((TAB, real(*value)));
            rows.push_row(row);
        }
    }

    let keys: Vec<&str> = axes.iter().map(|a| a.column).chain([RATE]).collect();
    Ok(sort_frame(&rows.into_dataframe()?, &keys)?)
}

/// Sorted distinct values, NaN and signed zeros kept apart.
pub(crate) fn sorted_unique(values: &[f64]) -> Vec<f64> {
    values.iter()
        .copied()
        .sorted_by(f64::total_cmp)
        .dedup_by(|a, b| a.total_cmp(b).is_eq())
        .collect()
}

fn real_column(df: &DataFrame, column: &str) -> TableResult<Vec<f64>> {
    require_column(df, column)?;
    let series = df.column(column)?;
    let reals = series.cast(&DataType::Float64)?;
    let texts = series.cast(&DataType::Utf8)?;
    reals.f64()?
        .into_iter()
        .zip(texts.utf8()?)
        .map(|(real, text)| real.ok_or_else(|| TableError::InvalidValue {
            column: column.to_owned(),
            value: text.unwrap_or_default().to_owned(),
        }))
        .collect()
}

fn position(values: &[f64], x: f64) -> usize {
    values.binary_search_by(|v| v.total_cmp(&x)).unwrap_or_default()
}

/// Inverse of [`stack`]: flow values, axes (sorted distinct values per axis
/// column), and one body record per axis combination in index order.
pub fn unstack(df: &DataFrame, axis_columns: &[&'static str]) -> TableResult<(Vec<f64>, Vec<Axis>, Vec<BodyRecord>)> {
    let rates = real_column(df, RATE)?;
    let tab = real_column(df, TAB)?;
    let axis_data = axis_columns.iter()
        .map(|c| real_column(df, c))
        .collect::<TableResult<Vec<_>>>()?;

    let flow = sorted_unique(&rates);
    let axes: Vec<Axis> = axis_columns.iter()
        .zip(&axis_data)
        .map(|(&column, data)| Axis { column, values: sorted_unique(data) })
        .collect();
    let lengths: Vec<usize> = axes.iter().map(|a| a.values.len()).collect();

    for (len, name) in std::iter::once((flow.len(), RATE)).chain(lengths.iter().copied().zip(axis_columns.iter().copied())) {
        if len == 0 || df.height() % len != 0 {
            return Err(TableError::DimensionMismatch(format!(
                "{} rows is not a multiple of the {len} distinct {name} values", df.height()
            )));
        }
    }
    let combinations: usize = lengths.iter().product();
    let expected = combinations * flow.len();
    if df.height() != expected {
        return Err(TableError::DimensionMismatch(format!(
            "{} rows where the axes span {expected}", df.height()
        )));
    }

    let mut slots: Vec<Option<f64>> = vec![None; expected];
    for row in 0..df.height() {
        let indices: Vec<usize> = axes.iter()
            .zip(&axis_data)
            .map(|(axis, data)| position(&axis.values, data[row]) + 1)
            .collect();
        let combination = slot_of(&indices, &lengths).unwrap_or_default();
        let slot = combination * flow.len() + position(&flow, rates[row]);
        if slots[slot].replace(tab[row]).is_some() {
            return Err(TableError::DimensionMismatch(format!(
                "axis indices {indices:?} at rate {} given twice", rates[row]
            )));
        }
    }

    let body = slots.chunks(flow.len())
        .enumerate()
        .map(|(combination, chunk)| {
            let indices = indices_of(combination, &lengths);
            chunk.iter()
                .copied()
                .collect::<Option<Vec<f64>>>()
                .map(|values| BodyRecord { indices: indices.clone(), values })
                .ok_or_else(|| TableError::DimensionMismatch(format!("missing values for axis indices {indices:?}")))
        })
        .collect::<TableResult<Vec<_>>>()?;

    Ok((flow, axes, body))
}

/// The one value a header column holds across the table.
pub fn single_value(df: &DataFrame, column: &str) -> TableResult<String> {
    require_column(df, column)?;
    let values = unique_text(df, column)?;
    match values.as_slice() {
        [v] => Ok(v.clone()),
        _ => Err(TableError::InconsistentAxisType { column: column.to_owned(), values }),
    }
}

pub fn single_number<T: std::str::FromStr>(df: &DataFrame, column: &str) -> TableResult<T> {
    let value = single_value(df, column)?;
    value.trim()
        .parse()
        .map_err(|_| TableError::InvalidValue { column: column.to_owned(), value })
}

/// An axis record: a comment naming the quantity and unit, then the values
/// five per line.
pub fn write_range(values: &[f64], kind: &str, unit: &str) -> String {
    let mut text = format!("-- {kind} units - {unit} ( {} values )\n", values.len());
    for (i, v) in values.iter().enumerate() {
        text.push_str(&general_width(*v, 10));
        if (i + 1) % VALUES_PER_LINE == 0 && i + 1 < values.len() {
            text.push('\n');
        } else {
            text.push(' ');
        }
    }
    text.push_str(" /\n\n");
    text
}

/// Body records: the axis indices, then the values five per line with
/// continuation lines indented past the indices.
pub fn write_table_records(body: &[BodyRecord]) -> String {
    let mut text = String::new();
    for record in body {
        text.push_str(&record.indices.iter().map(|i| format!("{i:2}")).join(" "));
        let n = record.values.len();
        for (i, v) in record.values.iter().enumerate() {
            text.push_str(&general_width(*v, 10));
            if (i + 1) % VALUES_PER_LINE == 0 {
                text.push('\n');
                if i + 1 < n {
                    text.push_str(&" ".repeat(11));
                }
            } else if i + 1 == n {
                text.push('\n');
            } else {
                text.push(' ');
            }
        }
        if n == 0 {
            text.push('\n');
        }
        text.push_str("/\n");
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use polars::prelude::BooleanChunked;

    fn two_axes() -> (Vec<f64>, Vec<Axis>, Vec<BodyRecord>) {
        let flow = vec![10.0, 20.0, 30.0];
        let axes = vec![
            Axis { column: "PRESSURE", values: vec![5.0, 10.0] },
            Axis { column: "WFR", values: vec![0.0, 0.5] },
        ];
        let body = vec![
            BodyRecord { indices: vec![1, 1], values: vec![100.0, 110.0, 120.0] },
            BodyRecord { indices: vec![1, 2], values: vec![130.0, 140.0, 150.0] },
            BodyRecord { indices: vec![2, 1], values: vec![160.0, 170.0, 180.0] },
            BodyRecord { indices: vec![2, 2], values: vec![190.0, 200.0, 210.0] },
        ];
        (flow, axes, body)
    }

    #[test]
    fn test_string2intlist() -> TableResult<()> {
        assert_eq!(string2intlist("[1,2,6:9]")?, vec![1, 2, 6, 7, 8, 9]);
        assert_eq!(string2intlist("3")?, vec![3]);
        assert_eq!(string2intlist(" [ ] ")?, Vec::<i64>::new());
        assert!(string2intlist("[1,x]").is_err());
        Ok(())
    }

    #[test]
    fn test_stack_layout() -> TableResult<()> {
        let (flow, axes, body) = two_axes();
        let rows = Rows::from_dataframe(&stack(&flow, &axes, &body)?)?;
        assert_eq!(rows.len(), 12);
        assert_eq!(rows.columns(), &["RATE", "PRESSURE", "WFR", "TAB"]);
        assert_eq!(rows.real(0, "TAB"), Some(100.0));
        assert_eq!(rows.real(3, "WFR"), Some(0.5));
        assert_eq!(rows.real(3, "RATE"), Some(10.0));
        assert_eq!(rows.real(11, "PRESSURE"), Some(10.0));
        assert_eq!(rows.real(11, "TAB"), Some(210.0));
        Ok(())
    }

    #[test]
    fn test_stack_any_record_order() -> TableResult<()> {
        let (flow, axes, mut body) = two_axes();
        let expected = stack(&flow, &axes, &body)?;
        body.reverse();
        assert_eq!(stack(&flow, &axes, &body)?, expected);
        Ok(())
    }

    #[test]
    fn test_stack_rejects_holes() {
        let (flow, axes, mut body) = two_axes();
        body.pop();
        assert!(matches!(stack(&flow, &axes, &body), Err(TableError::DimensionMismatch(_))));

        let (flow, axes, mut body) = two_axes();
        body[3].indices = vec![1, 1];
        assert!(matches!(stack(&flow, &axes, &body), Err(TableError::DimensionMismatch(_))));

        let (flow, axes, mut body) = two_axes();
        body[0].indices = vec![3, 1];
        assert!(matches!(stack(&flow, &axes, &body), Err(TableError::DimensionMismatch(_))));

        let (flow, axes, mut body) = two_axes();
        body[0].values.pop();
        assert!(matches!(stack(&flow, &axes, &body), Err(TableError::DimensionMismatch(_))));
    }

    #[test]
    fn test_unstack_inverts_stack() -> TableResult<()> {
        let (flow, axes, body) = two_axes();
        let df = stack(&flow, &axes, &body)?;
        let (flow2, axes2, body2) = unstack(&df, &["PRESSURE", "WFR"])?;
        assert_eq!(flow2, flow);
        assert_eq!(axes2, axes);
        assert_eq!(body2, body);
        Ok(())
    }

    #[test]
    fn test_unstack_rejects_edited_table() -> TableResult<()> {
        let (flow, axes, body) = two_axes();
        let df = stack(&flow, &axes, &body)?;

        let keep: BooleanChunked = (0..df.height()).map(|i| i != 5).collect();
        let dropped = df.filter(&keep)?;
        assert!(matches!(unstack(&dropped, &["PRESSURE", "WFR"]), Err(TableError::DimensionMismatch(_))));

        let mut duplicated = Rows::from_dataframe(&df)?;
        duplicated.set_cell(1, "RATE", Some(DeckValue::Real(10.0)));
        assert!(matches!(unstack(&duplicated.into_dataframe()?, &["PRESSURE", "WFR"]), Err(TableError::DimensionMismatch(_))));

        let mut text = Rows::from_dataframe(&df)?;
        text.set_cell(0, "TAB", Some(DeckValue::Char("high".to_string())));
        assert!(matches!(
            unstack(&text.into_dataframe()?, &["PRESSURE", "WFR"]),
            Err(TableError::InvalidValue { value, .. }) if value == "high"
        ));
        Ok(())
    }

    #[test]
    fn test_write_range() {
        let text = write_range(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0], "GOR", "sm3/sm3");
        let expected = "-- GOR units - sm3/sm3 ( 6 values )\n         1          2          3          4          5\n         6  /\n\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_write_table_records() {
        let body = [BodyRecord { indices: vec![1, 2], values: vec![1.5, 2.0, 3.0, 4.0, 5.0, 6.0] }];
        let expected = " 1  2       1.5          2          3          4          5\n                    6\n/\n";
        assert_eq!(write_table_records(&body), expected);
    }
}
