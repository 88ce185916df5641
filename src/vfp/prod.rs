//! VFPPROD: production lift curves over four interpolation axes.
use log::debug;
use polars::prelude::{DataFrame, NamedFrom, Series};

use crate::deck::DeckKeyword;
use crate::records::{parse_record, RecordMap};
use crate::table_error::{TableError, TableResult};
use crate::writer::comment_formatter;

use super::columnar::{decode_number, decode_reals, decode_text, encode_reals, encode_text, ColumnarTable, Metadata};
use super::common::{single_number, single_value, stack, unstack, write_range, write_table_records, Axis, BodyRecord};
use super::defs::{parse_or, Alq, Gfr, ProdRate, ProdTab, ThpType, UnitType, VfpType, Wfr};

const KEYWORD: &str = "VFPPROD";
const AXIS_COLUMNS: [&str; 4] = ["PRESSURE", "WFR", "GFR", "ALQ"];
const INDEX_KEYS: [&str; 4] = ["thp_idx", "wfr_idx", "gfr_idx", "alq_idx"];
const HEADER_RECORDS: usize = 6;

#[derive(Debug, Clone, PartialEq)]
pub struct ProdBasicData {
    pub table_number: i64,
    pub datum: f64,
    pub rate_type: ProdRate,
    pub wfr_type: Wfr,
    pub gfr_type: Gfr,
    pub alq_type: Alq,
    pub thp_type: ThpType,
    pub unit_type: UnitType,
    pub tab_type: ProdTab,
    pub flow_values: Vec<f64>,
    pub thp_values: Vec<f64>,
    pub wfr_values: Vec<f64>,
    pub gfr_values: Vec<f64>,
    pub alq_values: Vec<f64>,
    /// Indices are (THP, WFR, GFR, ALQ)
    pub records: Vec<BodyRecord>,
}

pub(crate) fn header_text<'a>(map: &'a RecordMap, item: &str) -> Option<&'a str> {
    map.get(item).and_then(|v| v.as_str())
}

pub(crate) fn header_number<T>(map: &RecordMap, item: &str, get: impl Fn(&crate::records::ItemValue) -> Option<T>) -> TableResult<T> {
    map.get(item)
        .and_then(get)
        .ok_or_else(|| TableError::InvalidValue { column: item.to_owned(), value: String::new() })
}

pub(crate) fn list_record(keyword: &DeckKeyword, index: usize, item: &str) -> TableResult<Vec<f64>> {
    let map = parse_record(&keyword.records()[index], keyword.name(), index)?;
    Ok(map.get(item).map(|v| v.to_reals()).unwrap_or_default())
}

pub(crate) fn body_record(map: &RecordMap, index_items: &[&str]) -> TableResult<BodyRecord> {
    let indices = index_items.iter()
        .map(|item| {
            let i = header_number(map, item, |v| v.as_i64())?;
            usize::try_from(i).map_err(|_| TableError::InvalidValue { column: item.to_string(), value: i.to_string() })
        })
        .collect::<TableResult<Vec<_>>>()?;
    let values = map.get("VALUES").map(|v| v.to_reals()).unwrap_or_default();
    Ok(BodyRecord { indices, values })
}

/// Repeat each header value on every row of a stacked table.
pub(crate) fn with_header(mut df: DataFrame, header: Vec<Series>) -> TableResult<DataFrame> {
    let n = df.height();
    for column in header {
        df.with_column(column.new_from_index(0, n))?;
    }
    Ok(df)
}

impl ProdBasicData {
    /// Read one VFPPROD keyword. Blank header items take their deck defaults.
    pub fn from_keyword(keyword: &DeckKeyword) -> TableResult<Self> {
        let records = keyword.records();
        if records.len() < HEADER_RECORDS {
            return Err(TableError::DimensionMismatch(format!(
                "VFPPROD needs at least {HEADER_RECORDS} records, found {}", records.len()
            )));
        }

        let header = parse_record(&records[0], KEYWORD, 0)?;
        let data = Self {
            table_number: header_number(&header, "TABLE", |v| v.as_i64())?,
            datum: header_number(&header, "DATUM_DEPTH", |v| v.as_f64())?,
            rate_type: parse_or(header_text(&header, "RATE_TYPE"), ProdRate::Gas)?,
            wfr_type: parse_or(header_text(&header, "WFR"), Wfr::Wct)?,
            gfr_type: parse_or(header_text(&header, "GFR"), Gfr::Gor)?,
            thp_type: parse_or(header_text(&header, "PRESSURE_DEF"), ThpType::Thp)?,
            alq_type: parse_or(header_text(&header, "ALQ_DEF"), Alq::Undefined)?,
            unit_type: parse_or(header_text(&header, "UNITS"), UnitType::Default)?,
            tab_type: parse_or(header_text(&header, "BODY_DEF"), ProdTab::Bhp)?,
            flow_values: list_record(keyword, 1, "FLOW_VALUES")?,
            thp_values: list_record(keyword, 2, "THP_VALUES")?,
            wfr_values: list_record(keyword, 3, "WFR_VALUES")?,
            gfr_values: list_record(keyword, 4, "GFR_VALUES")?,
            alq_values: list_record(keyword, 5, "ALQ_VALUES")?,
            records: records[HEADER_RECORDS..].iter()
                .map(|rec| body_record(&parse_record(rec, KEYWORD, HEADER_RECORDS)?, &["THP_INDEX", "WFR_INDEX", "GFR_INDEX", "ALQ_INDEX"]))
                .collect::<TableResult<Vec<_>>>()?,
        };
        data.check()?;
        debug!("Read VFPPROD table {} with {} records", data.table_number, data.records.len());
        Ok(data)
    }

    /// Record count must equal the number of axis combinations, and every
    /// record must hold one value per flow value.
    pub fn check(&self) -> TableResult<()> {
        let combinations = self.thp_values.len() * self.wfr_values.len() * self.gfr_values.len() * self.alq_values.len();
        if combinations != self.records.len() {
            return Err(TableError::DimensionMismatch(format!(
                "VFPPROD table {}: axes span {combinations} records, found {}", self.table_number, self.records.len()
            )));
        }
        if let Some(rec) = self.records.iter().find(|r| r.values.len() != self.flow_values.len()) {
            return Err(TableError::DimensionMismatch(format!(
                "VFPPROD table {}: record {:?} holds {} values for {} flow values",
                self.table_number, rec.indices, rec.values.len(), self.flow_values.len()
            )));
        }
        Ok(())
    }

    fn axes(&self) -> Vec<Axis> {
        [&self.thp_values, &self.wfr_values, &self.gfr_values, &self.alq_values]
            .into_iter()
            .zip(AXIS_COLUMNS)
            .map(|(values, column)| Axis { column, values: values.clone() })
            .collect()
    }

    /// One row per (axis combination, flow value), header items repeated on every row.
    pub fn to_frame(&self) -> TableResult<DataFrame> {
        with_header(stack(&self.flow_values, &self.axes(), &self.records)?, vec![
            Series::new("VFP_TYPE", [VfpType::Prod.as_str()]),
            Series::new("TABLE_NUMBER", [self.table_number]),
            Series::new("DATUM", [self.datum]),
            Series::new("RATE_TYPE", [self.rate_type.as_str()]),
            Series::new("WFR_TYPE", [self.wfr_type.as_str()]),
            Series::new("GFR_TYPE", [self.gfr_type.as_str()]),
            Series::new("ALQ_TYPE", [self.alq_type.as_str()]),
            Series::new("PRESSURE_TYPE", [self.thp_type.as_str()]),
            Series::new("TAB_TYPE", [self.tab_type.as_str()]),
            Series::new("UNIT_TYPE", [self.unit_type.as_str()]),
        ])
    }

    /// Rebuild from the rows of a single table.
    pub fn from_frame(df: &DataFrame) -> TableResult<Self> {
        let vfp_type: VfpType = single_value(df, "VFP_TYPE")?.parse()?;
        if vfp_type != VfpType::Prod {
            return Err(TableError::InvalidValue { column: "VFP_TYPE".to_string(), value: vfp_type.to_string() });
        }

        let (flow_values, axes, records) = unstack(df, &AXIS_COLUMNS)?;
        let mut axes = axes.into_iter().map(|a| a.values);
        let mut next_axis = || axes.next().unwrap_or_default();
        let data = Self {
            table_number: single_number(df, "TABLE_NUMBER")?,
            datum: single_number(df, "DATUM")?,
            rate_type: single_value(df, "RATE_TYPE")?.parse()?,
            wfr_type: single_value(df, "WFR_TYPE")?.parse()?,
            gfr_type: single_value(df, "GFR_TYPE")?.parse()?,
            alq_type: parse_or(Some(single_value(df, "ALQ_TYPE")?.as_str()), Alq::Undefined)?,
            thp_type: single_value(df, "PRESSURE_TYPE")?.parse()?,
            unit_type: single_value(df, "UNIT_TYPE")?.parse()?,
            tab_type: single_value(df, "TAB_TYPE")?.parse()?,
            flow_values,
            thp_values: next_axis(),
            wfr_values: next_axis(),
            gfr_values: next_axis(),
            alq_values: next_axis(),
            records,
        };
        data.check()?;
        Ok(data)
    }

    pub fn to_columnar(&self) -> TableResult<ColumnarTable> {
        let metadata: Metadata = [
            ("VFP_TYPE", encode_text(VfpType::Prod.as_str())),
            ("TABLE_NUMBER", encode_text(&self.table_number.to_string())),
            ("DATUM", encode_text(&self.datum.to_string())),
            ("RATE_TYPE", encode_text(self.rate_type.as_str())),
            ("WFR_TYPE", encode_text(self.wfr_type.as_str())),
            ("GFR_TYPE", encode_text(self.gfr_type.as_str())),
            ("ALQ_TYPE", encode_text(self.alq_type.as_str())),
            ("THP_TYPE", encode_text(self.thp_type.as_str())),
            ("UNIT_TYPE", encode_text(self.unit_type.as_str())),
            ("TAB_TYPE", encode_text(self.tab_type.as_str())),
            ("FLOW_VALUES", encode_reals(&self.flow_values)),
            ("THP_VALUES", encode_reals(&self.thp_values)),
            ("WFR_VALUES", encode_reals(&self.wfr_values)),
            ("GFR_VALUES", encode_reals(&self.gfr_values)),
            ("ALQ_VALUES", encode_reals(&self.alq_values)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();

        ColumnarTable::from_records(metadata, &self.records, &INDEX_KEYS)
    }

    pub fn from_columnar(table: &ColumnarTable) -> TableResult<Self> {
        let meta = table.metadata();
        let data = Self {
            table_number: decode_number(meta, "TABLE_NUMBER")?,
            datum: decode_number(meta, "DATUM")?,
            rate_type: decode_text(meta, "RATE_TYPE")?.parse()?,
            wfr_type: decode_text(meta, "WFR_TYPE")?.parse()?,
            gfr_type: decode_text(meta, "GFR_TYPE")?.parse()?,
            alq_type: parse_or(Some(decode_text(meta, "ALQ_TYPE")?.as_str()), Alq::Undefined)?,
            thp_type: decode_text(meta, "THP_TYPE")?.parse()?,
            unit_type: decode_text(meta, "UNIT_TYPE")?.parse()?,
            tab_type: decode_text(meta, "TAB_TYPE")?.parse()?,
            flow_values: decode_reals(meta, "FLOW_VALUES")?,
            thp_values: decode_reals(meta, "THP_VALUES")?,
            wfr_values: decode_reals(meta, "WFR_VALUES")?,
            gfr_values: decode_reals(meta, "GFR_VALUES")?,
            alq_values: decode_reals(meta, "ALQ_VALUES")?,
            records: table.records(&INDEX_KEYS)?,
        };
        data.check()?;
        Ok(data)
    }

    /// VFPPROD keyword text for this table.
    pub fn to_deck_text(&self, comment: Option<&str>) -> String {
        let units = self.unit_type;
        let mut out = format!("{KEYWORD}\n");
        match comment_formatter(comment) {
            c if c.is_empty() => out.push('\n'),
            c => out.push_str(&c),
        }

        let unit_text = match units {
            UnitType::Default => "1*",
            u => u.as_str(),
        };
        out.push_str("-- Table  Datum Depth  Rate Type  WFR Type  GFR Type  THP Type  ALQ Type  UNITS   TAB Type\n");
        out.push_str("-- -----  -----------  ---------  --------  --------  --------  --------  ------  --------\n");
        out.push_str(&format!(
            "   {:5}  {:11.1}   {:>8}  {:>8}  {:>8}  {:>8}  {:>8}  {:>6}  {:>8} /\n\n",
            self.table_number, self.datum, self.rate_type, self.wfr_type, self.gfr_type,
            self.thp_type, self.alq_type, unit_text, self.tab_type,
        ));

        out.push_str(&write_range(&self.flow_values, self.rate_type.as_str(), self.rate_type.unit(units)));
        out.push_str(&write_range(&self.thp_values, self.thp_type.as_str(), self.thp_type.prod_unit(units)));
        out.push_str(&write_range(&self.wfr_values, self.wfr_type.as_str(), self.wfr_type.unit(units)));
        out.push_str(&write_range(&self.gfr_values, self.gfr_type.as_str(), self.gfr_type.unit(units)));
        out.push_str(&write_range(&self.alq_values, self.alq_type.as_str(), self.alq_type.unit(units)));
        out.push_str(&write_table_records(&self.records));
        out
    }
}
