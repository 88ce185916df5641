//! Lift curve tables: VFPPROD and VFPINJ.
//!
//! A deck may hold many VFP keywords, each one table. Tables are read into
//! [`BasicData`], which converts to a frame (one row per axis combination
//! and flow value), to an arrow backed [`ColumnarTable`], and back to deck
//! text.
//!
//! ```
//! # use resframe::vfp::{self, VfpType};
//! let deck = "VFPINJ\n 1 2000 WAT /\n 100 200 /\n 50 /\n 1 210 250 /\n";
//! let table = vfp::table(deck, VfpType::Inj, None).unwrap();
//! assert_eq!(table.height(), 2);
//! ```
use itertools::Itertools;
use log::{info, warn};
use polars::prelude::DataFrame;

pub mod columnar;
pub mod common;
pub mod defs;
pub mod inj;
pub mod prod;

pub use columnar::ColumnarTable;
pub use defs::VfpType;
pub use inj::InjBasicData;
pub use prod::ProdBasicData;

use crate::dataframes::{concat_frames, unique_text};
use crate::deck::{Deck, Source};
use crate::table_error::{TableError, TableResult};
use crate::writer::{comment_formatter, require_column, WriteSettings, NO_DATA};

use common::{single_value, string2intlist};

/// One lift curve table of either kind
#[derive(Debug, Clone, PartialEq)]
pub enum BasicData {
    Prod(ProdBasicData),
    Inj(InjBasicData),
}

impl BasicData {
    pub fn vfp_type(&self) -> VfpType {
        match self {
            BasicData::Prod(_) => VfpType::Prod,
            BasicData::Inj(_) => VfpType::Inj,
        }
    }

    pub fn table_number(&self) -> i64 {
        match self {
            BasicData::Prod(d) => d.table_number,
            BasicData::Inj(d) => d.table_number,
        }
    }

    pub fn to_frame(&self) -> TableResult<DataFrame> {
        match self {
            BasicData::Prod(d) => d.to_frame(),
            BasicData::Inj(d) => d.to_frame(),
        }
    }

    /// Rebuild from the rows of one table, the kind taken from VFP_TYPE.
    pub fn from_frame(df: &DataFrame) -> TableResult<Self> {
        match single_value(df, "VFP_TYPE")?.parse()? {
            VfpType::Prod => Ok(BasicData::Prod(ProdBasicData::from_frame(df)?)),
            VfpType::Inj => Ok(BasicData::Inj(InjBasicData::from_frame(df)?)),
        }
    }

    pub fn to_columnar(&self) -> TableResult<ColumnarTable> {
        match self {
            BasicData::Prod(d) => d.to_columnar(),
            BasicData::Inj(d) => d.to_columnar(),
        }
    }

    pub fn from_columnar(table: &ColumnarTable) -> TableResult<Self> {
        match columnar::decode_text(table.metadata(), "VFP_TYPE")?.parse()? {
            VfpType::Prod => Ok(BasicData::Prod(ProdBasicData::from_columnar(table)?)),
            VfpType::Inj => Ok(BasicData::Inj(InjBasicData::from_columnar(table)?)),
        }
    }

    pub fn to_deck_text(&self, comment: Option<&str>) -> String {
        match self {
            BasicData::Prod(d) => d.to_deck_text(comment),
            BasicData::Inj(d) => d.to_deck_text(comment),
        }
    }
}

/// Every `vfp_type` table of the deck in deck order, optionally only those
/// whose number is in `vfpnumbers` (e.g. `"[1,2,6:9]"`).
pub fn basic_data(deck: &Deck, vfp_type: VfpType, vfpnumbers: Option<&str>) -> TableResult<Vec<BasicData>> {
    let wanted = vfpnumbers.map(string2intlist).transpose()?;
    let mut tables = vec![];
    for kw in deck.named(vfp_type.as_str()) {
        let data = match vfp_type {
            VfpType::Prod => BasicData::Prod(ProdBasicData::from_keyword(kw)?),
            VfpType::Inj => BasicData::Inj(InjBasicData::from_keyword(kw)?),
        };
        match &wanted {
            Some(numbers) if !numbers.contains(&data.table_number()) => {
                info!("Skipping {vfp_type} table {}", data.table_number());
            },
            _ => tables.push(data),
        }
    }
    Ok(tables)
}

/// One table per VFP keyword.
pub fn tables(source: impl Into<Source>, vfp_type: VfpType, vfpnumbers: Option<&str>) -> TableResult<Vec<DataFrame>> {
    let deck = source.into().into_deck()?;
    basic_data(&deck, vfp_type, vfpnumbers)?
        .iter()
        .map(BasicData::to_frame)
        .collect()
}

/// All tables of one kind stacked into a single table.
pub fn deck_table(deck: &Deck, vfp_type: VfpType, vfpnumbers: Option<&str>) -> TableResult<DataFrame> {
    let frames = basic_data(deck, vfp_type, vfpnumbers)?
        .iter()
        .map(BasicData::to_frame)
        .collect::<TableResult<Vec<_>>>()?;
    let df = concat_frames(frames)?;
    info!("Extracted {} {vfp_type} rows", df.height());
    Ok(df)
}

pub fn table(source: impl Into<Source>, vfp_type: VfpType, vfpnumbers: Option<&str>) -> TableResult<DataFrame> {
    let deck = source.into().into_deck()?;
    deck_table(&deck, vfp_type, vfpnumbers)
}

pub fn columnar_tables(source: impl Into<Source>, vfp_type: VfpType, vfpnumbers: Option<&str>) -> TableResult<Vec<ColumnarTable>> {
    let deck = source.into().into_deck()?;
    basic_data(&deck, vfp_type, vfpnumbers)?
        .iter()
        .map(BasicData::to_columnar)
        .collect()
}

/// Keyword text for each `vfp_type` table in `df`, tables in order of first
/// appearance. Tables of the other kind are skipped; a table number whose rows
/// mix both kinds is an error.
pub fn keyword_texts(df: &DataFrame, vfp_type: VfpType, comment: Option<&str>) -> TableResult<Vec<String>> {
    require_column(df, "TABLE_NUMBER")?;
    require_column(df, "VFP_TYPE")?;

    let mut texts = vec![];
    for subset in df.partition_by_stable(["TABLE_NUMBER"], true)? {
        let kinds = unique_text(&subset, "VFP_TYPE")?;
        match kinds.as_slice() {
            [kind] if kind == vfp_type.as_str() => {
                texts.push(BasicData::from_frame(&subset)?.to_deck_text(comment));
            },
            [_] => continue,
            _ => return Err(TableError::InconsistentAxisType { column: "VFP_TYPE".to_string(), values: kinds }),
        }
    }
    Ok(texts)
}

/// Deck text for the requested VFP keywords (both when `None`): the master
/// comment, then every table followed by a blank line.
pub fn to_deck(table: &DataFrame, keywords: Option<&[&str]>, settings: &WriteSettings) -> TableResult<String> {
    if table.height() == 0 {
        return Ok(format!("{NO_DATA}\n"));
    }

    let wanted: Vec<VfpType> = match keywords {
        None => vec![VfpType::Prod, VfpType::Inj],
        Some(kws) => kws.iter()
            .filter_map(|kw| match kw.parse::<VfpType>() {
                Ok(t) => Some(t),
                Err(_) => {
                    warn!("Requested keyword {kw} is not a VFP keyword, skipping");
                    None
                }
            })
            .unique()
            .collect(),
    };

    let mut out = comment_formatter(settings.get_comment("master"));
    for vfp_type in wanted {
        for text in keyword_texts(table, vfp_type, settings.get_comment(vfp_type.as_str()))? {
            out.push_str(&text);
            out.push('\n');
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataframes::Rows;
    use crate::keyword_specs::DeckValue;

    const DECK: &str = "
VFPPROD
  1  1000.0  GAS WGR GOR THP ' ' METRIC BHP /
  10000 50000 /
  20 60 /
  0 /
  100 /
  0 /
 1 1 1 1  120 150 /
 2 1 1 1  160 195 /

VFPINJ
  7  1500.0  WAT THP METRIC BHP /
  500 1000 /
  20 /
 1  110 140 /

VFPPROD
  3  1200.0  OIL WCT GOR THP GRAT METRIC BHP /
  100 /
  20 /
  0 /
  100 /
  0 /
 1 1 1 1  200 /
";

    #[test]
    fn test_all_occurrences() -> TableResult<()> {
        let deck = Deck::parse(DECK)?;
        let prod = basic_data(&deck, VfpType::Prod, None)?;
        assert_eq!(prod.iter().map(BasicData::table_number).collect::<Vec<_>>(), vec![1, 3]);
        let inj = basic_data(&deck, VfpType::Inj, None)?;
        assert_eq!(inj.len(), 1);
        assert_eq!(inj[0].vfp_type(), VfpType::Inj);

        let rows = Rows::from_dataframe(&deck_table(&deck, VfpType::Prod, None)?)?;
        assert_eq!(rows.len(), 5);
        assert_eq!(rows.int(4, "TABLE_NUMBER"), Some(3));
        assert_eq!(rows.text(0, "ALQ_TYPE").as_deref(), Some("''"));
        Ok(())
    }

    #[test]
    fn test_number_selection() -> TableResult<()> {
        let deck = Deck::parse(DECK)?;
        let prod = basic_data(&deck, VfpType::Prod, Some("[2:3]"))?;
        assert_eq!(prod.len(), 1);
        assert_eq!(prod[0].table_number(), 3);
        assert!(tables(deck, VfpType::Prod, Some("[5]"))?.is_empty());
        Ok(())
    }

    #[test]
    fn test_columnar_tables() -> TableResult<()> {
        let tables = columnar_tables(DECK, VfpType::Prod, None)?;
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].num_columns(), 2);
        let data = BasicData::from_columnar(&tables[0])?;
        let deck = Deck::parse(DECK)?;
        assert_eq!(data, basic_data(&deck, VfpType::Prod, Some("1"))?.remove(0));
        Ok(())
    }

    #[test]
    fn test_deck_round_trip() -> TableResult<()> {
        let deck = Deck::parse(DECK)?;
        let df = concat_frames([deck_table(&deck, VfpType::Prod, None)?, deck_table(&deck, VfpType::Inj, None)?])?;
        assert_eq!(df.height(), 7);

        let settings = WriteSettings::default()
            .master_comment("Lift curves")
            .comment("VFPINJ", "Water injectors");
        let text = to_deck(&df, None, &settings)?;
        assert!(text.starts_with("-- Lift curves\nVFPPROD\n"));
        assert!(text.contains("VFPINJ\n-- Water injectors\n"));

        let written = Deck::parse(&text)?;
        assert_eq!(basic_data(&written, VfpType::Prod, None)?, basic_data(&deck, VfpType::Prod, None)?);
        assert_eq!(basic_data(&written, VfpType::Inj, None)?, basic_data(&deck, VfpType::Inj, None)?);

        let only_inj = to_deck(&df, Some(&["VFPINJ", "WCONPROD"][..]), &WriteSettings::default())?;
        assert!(!only_inj.contains("VFPPROD"));
        Ok(())
    }

    #[test]
    fn test_mixed_table_number() -> TableResult<()> {
        let deck = Deck::parse(DECK)?;
        let mut rows = Rows::from_dataframe(&deck_table(&deck, VfpType::Prod, None)?)?;
        rows.set_cell(0, "VFP_TYPE", Some(DeckValue::Char("VFPINJ".to_string())));
        assert!(matches!(
            to_deck(&rows.into_dataframe()?, None, &WriteSettings::default()),
            Err(TableError::InconsistentAxisType { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_empty() -> TableResult<()> {
        assert_eq!(to_deck(&DataFrame::default(), None, &WriteSettings::default())?, "-- No data!\n");
        assert_eq!(table("RUNSPEC\n", VfpType::Prod, None)?.height(), 0);
        Ok(())
    }
}
