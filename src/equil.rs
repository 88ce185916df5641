//! Equilibration data: EQUIL and the depth tables RSVD, RVVD, PBVD and PDVD.
//!
//! How the contact items of an EQUIL record are named depends on which phases
//! the deck activates, so EQUIL is read with one of the [`Phases`] renamers.
//! Writing goes the other way and picks the renamer from the contact columns
//! present in the table.
use std::fmt::Display;

use log::{info, warn};
use polars::prelude::DataFrame;

use crate::dataframes::{concat_frames, filled_columns, unique_text, Rows};
use crate::deck::{Deck, Source};
use crate::inferdims::InferSettings;
use crate::keyword_specs::{schema_for, RegionDim};
use crate::mapper::{domain_table, keyword_to_table, Domain, KeywordHandler, KeywordSpec, Rename};
use crate::table_error::{TableError, TableResult};
use crate::writer::{comment_formatter, index_groups, keyword_subset, record_table, table_to_keyword_text, write_deck, IndexFallback, WriteSettings, NO_DATA};

/// Phase configurations with a defined meaning for EQUIL contacts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phases {
    OilWaterGas,
    GasWater,
    OilWater,
    OilGas,
}

impl Display for Phases {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Phases::OilWaterGas => "oil-water-gas",
            Phases::GasWater => "gas-water",
            Phases::OilWater => "oil-water",
            Phases::OilGas => "oil-gas",
        };
        write!(f, "{s}")
    }
}

impl Phases {
    /// Phase configuration from the phase keywords of a deck
    pub fn from_deck(deck: &Deck) -> Option<Self> {
        Self::from_flags(deck.contains("OIL"), deck.contains("WATER"), deck.contains("GAS"))
    }

    fn from_flags(oil: bool, water: bool, gas: bool) -> Option<Self> {
        match (oil, water, gas) {
            (true, true, true) => Some(Phases::OilWaterGas),
            (false, true, true) => Some(Phases::GasWater),
            (true, true, false) => Some(Phases::OilWater),
            (true, false, true) => Some(Phases::OilGas),
            _ => None,
        }
    }

    /// Phase configuration from the contact columns of an EQUIL table
    pub fn from_columns<S: AsRef<str>>(columns: &[S]) -> Option<Self> {
        let has = |name: &str| columns.iter().any(|c| c.as_ref() == name);
        match (has("OWC"), has("GOC"), has("GWC")) {
            (true, true, _) => Some(Phases::OilWaterGas),
            (false, false, true) => Some(Phases::GasWater),
            (true, false, false) => Some(Phases::OilWater),
            (false, true, false) => Some(Phases::OilGas),
            _ => None,
        }
    }

    /// Phase keywords activating this configuration, in deck order
    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Phases::OilWaterGas => &["OIL", "WATER", "GAS"],
            Phases::GasWater => &["GAS", "WATER"],
            Phases::OilWater => &["OIL", "WATER"],
            Phases::OilGas => &["OIL", "GAS"],
        }
    }

    pub fn renamer(&self) -> &'static [(&'static str, Rename)] {
        match self {
            Phases::OilWaterGas => OIL_WATER_GAS,
            Phases::GasWater => GAS_WATER,
            Phases::OilWater => OIL_WATER,
            Phases::OilGas => OIL_GAS,
        }
    }

    fn equil_spec(&self) -> KeywordSpec {
        KeywordSpec::new("EQUIL", self.renamer(), "EQLNUM")
    }
}

const OIL_WATER_GAS: &[(&str, Rename)] = &[
    ("DATUM_DEPTH", Rename::To("Z")),
    ("DATUM_PRESSURE", Rename::To("PRESSURE")),
    ("OWC", Rename::To("OWC")),
    ("PC_OWC", Rename::To("PCOWC")),
    ("GOC", Rename::To("GOC")),
    ("PC_GOC", Rename::To("PCGOC")),
    ("BLACK_OIL_INIT", Rename::To("INITRS")),
    ("BLACK_OIL_INIT_WG", Rename::To("INITRV")),
];

const GAS_WATER: &[(&str, Rename)] = &[
    ("DATUM_DEPTH", Rename::To("Z")),
    ("DATUM_PRESSURE", Rename::To("PRESSURE")),
    ("OWC", Rename::To("GWC")),
    ("PC_OWC", Rename::To("PCGWC")),
    ("GOC", Rename::To("IGNORE1")),
    ("PC_GOC", Rename::To("IGNORE2")),
    ("BLACK_OIL_INIT", Rename::To("IGNORE3")),
    ("BLACK_OIL_INIT_WG", Rename::To("IGNORE4")),
];

const OIL_WATER: &[(&str, Rename)] = &[
    ("DATUM_DEPTH", Rename::To("Z")),
    ("DATUM_PRESSURE", Rename::To("PRESSURE")),
    ("OWC", Rename::To("OWC")),
    ("PC_OWC", Rename::To("PCOWC")),
    ("GOC", Rename::To("IGNORE1")),
    ("PC_GOC", Rename::To("IGNORE2")),
    ("BLACK_OIL_INIT", Rename::To("IGNORE3")),
    ("BLACK_OIL_INIT_WG", Rename::To("IGNORE4")),
];

const OIL_GAS: &[(&str, Rename)] = &[
    ("DATUM_DEPTH", Rename::To("Z")),
    ("DATUM_PRESSURE", Rename::To("PRESSURE")),
    ("OWC", Rename::To("IGNORE1")),
    ("PC_OWC", Rename::To("IGNORE2")),
    ("GOC", Rename::To("GOC")),
    ("PC_GOC", Rename::To("PCGOC")),
    ("BLACK_OIL_INIT", Rename::To("IGNORE3")),
    ("BLACK_OIL_INIT_WG", Rename::To("IGNORE4")),
];

pub const RSVD: KeywordSpec = KeywordSpec::new("RSVD", &[("DATA", Rename::Data(&["Z", "RS"]))], "EQLNUM");
pub const RVVD: KeywordSpec = KeywordSpec::new("RVVD", &[("DATA", Rename::Data(&["Z", "RV"]))], "EQLNUM");
pub const PBVD: KeywordSpec = KeywordSpec::new("PBVD", &[("DATA", Rename::Data(&["Z", "PB"]))], "EQLNUM");
pub const PDVD: KeywordSpec = KeywordSpec::new("PDVD", &[("DATA", Rename::Data(&["Z", "PD"]))], "EQLNUM");

pub static DOMAIN: Domain = Domain {
    name: "equil",
    index: "EQLNUM",
    dim: RegionDim::Ntequl,
    handlers: &[
        KeywordHandler { keyword: "EQUIL", from_deck: equil_fromdeck, to_text: equil_text },
        KeywordHandler { keyword: "RSVD", from_deck: rsvd_fromdeck, to_text: rsvd_text },
        KeywordHandler { keyword: "RVVD", from_deck: rvvd_fromdeck, to_text: rvvd_text },
        KeywordHandler { keyword: "PBVD", from_deck: pbvd_fromdeck, to_text: pbvd_text },
        KeywordHandler { keyword: "PDVD", from_deck: pdvd_fromdeck, to_text: pdvd_text },
    ],
    sort_by_index: false,
};

/// Read EQUIL records, naming contacts after the deck's phase configuration.
pub fn equil_fromdeck(deck: &Deck) -> TableResult<DataFrame> {
    let phases = Phases::from_deck(deck)
        .ok_or_else(|| TableError::PhaseConfiguration("the deck must activate at least two of OIL, WATER and GAS".to_string()))?;
    keyword_to_table(deck, &phases.equil_spec())
}

pub fn rsvd_fromdeck(deck: &Deck) -> TableResult<DataFrame> {
    keyword_to_table(deck, &RSVD)
}

pub fn rvvd_fromdeck(deck: &Deck) -> TableResult<DataFrame> {
    keyword_to_table(deck, &RVVD)
}

pub fn pbvd_fromdeck(deck: &Deck) -> TableResult<DataFrame> {
    keyword_to_table(deck, &PBVD)
}

pub fn pdvd_fromdeck(deck: &Deck) -> TableResult<DataFrame> {
    keyword_to_table(deck, &PDVD)
}

/// Extract the equilibration keywords into one table indexed by EQLNUM.
///
/// `ntequl` is only used when the deck does not declare EQLDIMS; without it
/// the count is inferred, which requires `source` to be text.
pub fn table(source: impl Into<Source>, keywords: Option<&[&str]>, ntequl: Option<usize>) -> TableResult<DataFrame> {
    table_with_settings(source.into(), keywords, ntequl, &InferSettings::default())
}

pub fn table_with_settings(source: Source, keywords: Option<&[&str]>, ntequl: Option<usize>, settings: &InferSettings) -> TableResult<DataFrame> {
    let df = domain_table(&DOMAIN, source, keywords, ntequl, settings)?;
    if df.height() == 0 {
        warn!("No equil data found");
    } else {
        info!("Extracted keywords {:?} for {} EQLNUMs", unique_text(&df, "KEYWORD")?, unique_text(&df, "EQLNUM")?.len());
    }
    Ok(df)
}

/// Write EQUIL records, one per EQLNUM.
pub fn equil_text(df: &DataFrame, comment: Option<&str>) -> TableResult<String> {
    let subset = keyword_subset(df, "EQUIL")?;
    if subset.height() == 0 {
        return Ok(NO_DATA.to_owned());
    }

    let filled = filled_columns(&subset);
    let phases = Phases::from_columns(filled.as_slice())
        .ok_or_else(|| TableError::PhaseConfiguration(format!("cannot tell the contacts apart from columns {}", filled.join(", "))))?;
    let spec = phases.equil_spec();

    let mut firsts = Vec::new();
    for (n, group) in index_groups(&subset, "EQUIL", "EQLNUM", IndexFallback::OneRow)? {
        if group.height() > 1 {
            warn!("EQUIL has {} rows for EQLNUM={n}, writing the first", group.height());
        }
        firsts.push(group.head(Some(1)));
    }
    let ordered = Rows::from_dataframe(&concat_frames(firsts)?)?;

    let items = schema_for("EQUIL").map(|s| s.items(0)).unwrap_or(&[]);
    let columns: Vec<_> = items.iter().map(|item| (spec.column_for(item.name), item.kind)).collect();
    Ok(format!("EQUIL\n{}{}\n", comment_formatter(comment), record_table(&ordered, &columns, false)))
}

pub fn rsvd_text(df: &DataFrame, comment: Option<&str>) -> TableResult<String> {
    table_to_keyword_text(df, &RSVD, comment)
}

pub fn rvvd_text(df: &DataFrame, comment: Option<&str>) -> TableResult<String> {
    table_to_keyword_text(df, &RVVD, comment)
}

pub fn pbvd_text(df: &DataFrame, comment: Option<&str>) -> TableResult<String> {
    table_to_keyword_text(df, &PBVD, comment)
}

pub fn pdvd_text(df: &DataFrame, comment: Option<&str>) -> TableResult<String> {
    table_to_keyword_text(df, &PDVD, comment)
}

/// Deck text for an equilibration table.
///
/// With [`WriteSettings::with_phases`] the phase keywords matching the
/// contact columns are written first, so the output parses on its own.
pub fn to_deck(table: &DataFrame, keywords: Option<&[&str]>, settings: &WriteSettings) -> TableResult<String> {
    let mut out = String::new();
    if settings.get_with_phases() {
        let phases = Phases::from_columns(filled_columns(table).as_slice())
            .ok_or_else(|| TableError::PhaseConfiguration("no contact columns to derive phases from".to_string()))?;
        out.push_str(&phases.keywords().join("\n"));
        out.push_str("\n\n");
    }
    out.push_str(&write_deck(table, &DOMAIN, keywords, settings)?);
    Ok(out)
}
