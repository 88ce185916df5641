//! VFPINJ: injection lift curves, a single tubing head pressure axis.
use log::debug;
use polars::prelude::{DataFrame, NamedFrom, Series};

use crate::deck::DeckKeyword;
use crate::records::parse_record;
use crate::table_error::{TableError, TableResult};
use crate::writer::comment_formatter;

use super::columnar::{decode_number, decode_reals, decode_text, encode_reals, encode_text, ColumnarTable, Metadata};
use super::common::{single_number, single_value, stack, unstack, write_range, write_table_records, Axis, BodyRecord};
use super::defs::{parse_or, InjRate, InjTab, ThpType, UnitType, VfpType};
use super::prod::{body_record, header_number, header_text, list_record, with_header};

const KEYWORD: &str = "VFPINJ";
const AXIS_COLUMNS: [&str; 1] = ["PRESSURE"];
const INDEX_KEYS: [&str; 1] = ["thp_idx"];
const HEADER_RECORDS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct InjBasicData {
    pub table_number: i64,
    pub datum: f64,
    pub rate_type: InjRate,
    pub thp_type: ThpType,
    pub unit_type: UnitType,
    pub tab_type: InjTab,
    pub flow_values: Vec<f64>,
    pub thp_values: Vec<f64>,
    pub records: Vec<BodyRecord>,
}

impl InjBasicData {
    pub fn from_keyword(keyword: &DeckKeyword) -> TableResult<Self> {
        let records = keyword.records();
        if records.len() < HEADER_RECORDS {
            return Err(TableError::DimensionMismatch(format!(
                "VFPINJ needs at least {HEADER_RECORDS} records, found {}", records.len()
            )));
        }

        let header = parse_record(&records[0], KEYWORD, 0)?;
        let data = Self {
            table_number: header_number(&header, "TABLE", |v| v.as_i64())?,
            datum: header_number(&header, "DATUM_DEPTH", |v| v.as_f64())?,
            rate_type: parse_or(header_text(&header, "RATE_TYPE"), InjRate::Gas)?,
            thp_type: parse_or(header_text(&header, "PRESSURE_DEF"), ThpType::Thp)?,
            unit_type: parse_or(header_text(&header, "UNITS"), UnitType::Default)?,
            tab_type: parse_or(header_text(&header, "BODY_DEF"), InjTab::Bhp)?,
            flow_values: list_record(keyword, 1, "FLOW_VALUES")?,
            thp_values: list_record(keyword, 2, "THP_VALUES")?,
            records: records[HEADER_RECORDS..].iter()
                .map(|rec| body_record(&parse_record(rec, KEYWORD, HEADER_RECORDS)?, &["THP_INDEX"]))
                .collect::<TableResult<Vec<_>>>()?,
        };
        data.check()?;
        debug!("Read VFPINJ table {} with {} records", data.table_number, data.records.len());
        Ok(data)
    }

    pub fn check(&self) -> TableResult<()> {
        if self.thp_values.len() != self.records.len() {
            return Err(TableError::DimensionMismatch(format!(
                "VFPINJ table {}: {} THP values but {} records", self.table_number, self.thp_values.len(), self.records.len()
            )));
        }
        if let Some(rec) = self.records.iter().find(|r| r.values.len() != self.flow_values.len()) {
            return Err(TableError::DimensionMismatch(format!(
                "VFPINJ table {}: record {:?} holds {} values for {} flow values",
                self.table_number, rec.indices, rec.values.len(), self.flow_values.len()
            )));
        }
        Ok(())
    }

    fn axes(&self) -> Vec<Axis> {
        vec![Axis { column: AXIS_COLUMNS[0], values: self.thp_values.clone() }]
    }

    pub fn to_frame(&self) -> TableResult<DataFrame> {
        with_header(stack(&self.flow_values, &self.axes(), &self.records)?, vec![
            Series::new("VFP_TYPE", [VfpType::Inj.as_str()]),
            Series::new("TABLE_NUMBER", [self.table_number]),
            Series::new("DATUM", [self.datum]),
            Series::new("RATE_TYPE", [self.rate_type.as_str()]),
            Series::new("PRESSURE_TYPE", [self.thp_type.as_str()]),
            Series::new("TAB_TYPE", [self.tab_type.as_str()]),
            Series::new("UNIT_TYPE", [self.unit_type.as_str()]),
        ])
    }

    pub fn from_frame(df: &DataFrame) -> TableResult<Self> {
        let vfp_type: VfpType = single_value(df, "VFP_TYPE")?.parse()?;
        if vfp_type != VfpType::Inj {
            return Err(TableError::InvalidValue { column: "VFP_TYPE".to_string(), value: vfp_type.to_string() });
        }

        let (flow_values, axes, records) = unstack(df, &AXIS_COLUMNS)?;
        let data = Self {
            table_number: single_number(df, "TABLE_NUMBER")?,
            datum: single_number(df, "DATUM")?,
            rate_type: single_value(df, "RATE_TYPE")?.parse()?,
            thp_type: single_value(df, "PRESSURE_TYPE")?.parse()?,
            unit_type: single_value(df, "UNIT_TYPE")?.parse()?,
            tab_type: single_value(df, "TAB_TYPE")?.parse()?,
            flow_values,
            thp_values: axes.into_iter().next().map(|a| a.values).unwrap_or_default(),
            records,
        };
        data.check()?;
        Ok(data)
    }

    pub fn to_columnar(&self) -> TableResult<ColumnarTable> {
        let metadata: Metadata = [
            ("VFP_TYPE", encode_text(VfpType::Inj.as_str())),
            ("TABLE_NUMBER", encode_text(&self.table_number.to_string())),
            ("DATUM", encode_text(&self.datum.to_string())),
            ("RATE_TYPE", encode_text(self.rate_type.as_str())),
            ("THP_TYPE", encode_text(self.thp_type.as_str())),
            ("UNIT_TYPE", encode_text(self.unit_type.as_str())),
            ("TAB_TYPE", encode_text(self.tab_type.as_str())),
            ("FLOW_VALUES", encode_reals(&self.flow_values)),
            ("THP_VALUES", encode_reals(&self.thp_values)),
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
            thp_type: decode_text(meta, "THP_TYPE")?.parse()?,
            unit_type: decode_text(meta, "UNIT_TYPE")?.parse()?,
            tab_type: decode_text(meta, "TAB_TYPE")?.parse()?,
            flow_values: decode_reals(meta, "FLOW_VALUES")?,
            thp_values: decode_reals(meta, "THP_VALUES")?,
            records: table.records(&INDEX_KEYS)?,
        };
        data.check()?;
        Ok(data)
    }

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
        out.push_str("-- Table  Datum Depth  Rate Type  THP Type  UNITS     TAB Type\n");
        out.push_str("-- -----  -----------  ---------  --------  --------  --------\n");
        out.push_str(&format!(
            "   {:5}  {:11.1}  {:>9}  {:>8}  {:>8}  {:>8} /\n\n",
            self.table_number, self.datum, self.rate_type, self.thp_type, unit_text, self.tab_type,
        ));

        out.push_str(&write_range(&self.flow_values, self.rate_type.as_str(), self.rate_type.unit(units)));
        out.push_str(&write_range(&self.thp_values, self.thp_type.as_str(), self.thp_type.inj_unit(units)));
        out.push_str(&write_table_records(&self.records));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataframes::{has_column, Rows};
    use crate::deck::Deck;

    const VFPINJ_TEXT: &str = "
VFPINJ
  5  2500.0  WAT  THP  FIELD /
  1000 5000 10000 20000 40000 80000 /
  100 300 /
 1  2000 2100 2300 2600 3200 4400 /
 2  2200 2300 2500 2800 3400 4600 /
";

    fn read(text: &str) -> TableResult<InjBasicData> {
        let deck = Deck::parse(text)?;
        let kw = deck.first("VFPINJ").ok_or_else(|| TableError::UnsupportedKeyword("VFPINJ".to_string()))?;
        InjBasicData::from_keyword(kw)
    }

    #[test]
    fn test_from_keyword() -> TableResult<()> {
        let data = read(VFPINJ_TEXT)?;
        assert_eq!(data.table_number, 5);
        assert_eq!(data.rate_type, InjRate::Wat);
        assert_eq!(data.tab_type, InjTab::Bhp);
        assert_eq!(data.unit_type, UnitType::Field);
        assert_eq!(data.flow_values.len(), 6);
        assert_eq!(data.records[1].indices, vec![2]);
        Ok(())
    }

    #[test]
    fn test_frame() -> TableResult<()> {
        let df = read(VFPINJ_TEXT)?.to_frame()?;
        assert!(!has_column(&df, "WFR"));
        let rows = Rows::from_dataframe(&df)?;
        assert_eq!(rows.len(), 12);
        assert_eq!(rows.real(6, "PRESSURE"), Some(300.0));
        assert_eq!(rows.real(6, "TAB"), Some(2200.0));
        assert_eq!(rows.text(0, "VFP_TYPE").as_deref(), Some("VFPINJ"));
        Ok(())
    }

    #[test]
    fn test_round_trips() -> TableResult<()> {
        let data = read(VFPINJ_TEXT)?;
        assert_eq!(InjBasicData::from_frame(&data.to_frame()?)?, data);
        assert_eq!(InjBasicData::from_columnar(&data.to_columnar()?)?, data);

        let text = data.to_deck_text(None);
        assert!(text.starts_with("VFPINJ\n\n-- Table"));
        assert!(text.contains("-- WAT units - stb/day ( 6 values )\n"));
        assert!(text.contains("-- THP units - psia ( 2 values )\n"));
        assert_eq!(read(&text)?, data);
        Ok(())
    }

    #[test]
    fn test_record_count() {
        let text = "VFPINJ\n 1 100 /\n 10 20 /\n 50 60 /\n 1 1 2 /\n";
        assert!(matches!(read(text), Err(TableError::DimensionMismatch(_))));
    }

    #[test]
    fn test_frame_through_columnar() -> TableResult<()> {
        let df = read(VFPINJ_TEXT)?.to_frame()?;
        let table = InjBasicData::from_frame(&df)?.to_columnar()?;
        assert_eq!(table.num_columns(), 2);
        assert_eq!(table.schema.fields[1].metadata["thp_idx"], "2");
        assert_eq!(InjBasicData::from_columnar(&table)?.to_frame()?, df);
        Ok(())
    }

    #[test]
    fn test_prod_rows_rejected() -> TableResult<()> {
        let mut df = read(VFPINJ_TEXT)?.to_frame()?;
        df.with_column(Series::new("VFP_TYPE", vec!["VFPPROD"; df.height()]))?;
        assert!(matches!(InjBasicData::from_frame(&df), Err(TableError::InvalidValue { .. })));
        Ok(())
    }
}
