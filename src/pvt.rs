//! PVT data: PVTO, PVDO, PVTG, PVDG, DENSITY, ROCK and PVTW, indexed by PVTNUM.
use itertools::Itertools;
use log::{info, warn};
use polars::prelude::DataFrame;

use crate::dataframes::{sort_frame, unique_text, Rows};
use crate::deck::{Deck, Source};
use crate::inferdims::InferSettings;
use crate::keyword_specs::RegionDim;
use crate::mapper::{domain_table, keyword_to_table, Counter, Domain, KeywordHandler, KeywordSpec, Rename};
use crate::table_error::TableResult;
use crate::writer::{comment_formatter, fixed, index_groups, keyword_subset, require_column, table_to_keyword_text, write_deck, IndexFallback, WriteSettings, NO_DATA};

const PVT_DATA: Rename = Rename::Data(&["PRESSURE", "VOLUMEFACTOR", "VISCOSITY"]);

pub const PVTO: KeywordSpec = KeywordSpec::new(
    "PVTO",
    &[("RS", Rename::To("RS")), ("DATA", PVT_DATA)],
    "PVTNUM",
).counting(Counter::PerEmptyRecord);

pub const PVTG: KeywordSpec = KeywordSpec::new(
    "PVTG",
    &[("GAS_PRESSURE", Rename::To("PRESSURE")), ("DATA", Rename::Data(&["OGR", "VOLUMEFACTOR", "VISCOSITY"]))],
    "PVTNUM",
).counting(Counter::PerEmptyRecord);

pub const PVDO: KeywordSpec = KeywordSpec::new("PVDO", &[("DATA", PVT_DATA)], "PVTNUM");
pub const PVDG: KeywordSpec = KeywordSpec::new("PVDG", &[("DATA", PVT_DATA)], "PVTNUM");

pub const PVTW: KeywordSpec = KeywordSpec::new(
    "PVTW",
    &[
        ("P_REF", Rename::To("PRESSURE")),
        ("WATER_VOL_FACTOR", Rename::To("VOLUMEFACTOR")),
        ("WATER_COMPRESSIBILITY", Rename::To("COMPRESSIBILITY")),
        ("WATER_VISCOSITY", Rename::To("VISCOSITY")),
        ("WATER_VISCOSIBILITY", Rename::To("VISCOSIBILITY")),
    ],
    "PVTNUM",
);

pub const DENSITY: KeywordSpec = KeywordSpec::new(
    "DENSITY",
    &[("OIL", Rename::To("OILDENSITY")), ("WATER", Rename::To("WATERDENSITY")), ("GAS", Rename::To("GASDENSITY"))],
    "PVTNUM",
);

pub const ROCK: KeywordSpec = KeywordSpec::new(
    "ROCK",
    &[("PREF", Rename::To("PRESSURE")), ("COMPRESSIBILITY", Rename::To("COMPRESSIBILITY"))],
    "PVTNUM",
);

pub static DOMAIN: Domain = Domain {
    name: "pvt",
    index: "PVTNUM",
    dim: RegionDim::Ntpvt,
    handlers: &[
        KeywordHandler { keyword: "PVTO", from_deck: pvto_fromdeck, to_text: pvto_text },
        KeywordHandler { keyword: "PVDO", from_deck: pvdo_fromdeck, to_text: pvdo_text },
        KeywordHandler { keyword: "PVTG", from_deck: pvtg_fromdeck, to_text: pvtg_text },
        KeywordHandler { keyword: "PVDG", from_deck: pvdg_fromdeck, to_text: pvdg_text },
        KeywordHandler { keyword: "DENSITY", from_deck: density_fromdeck, to_text: density_text },
        KeywordHandler { keyword: "ROCK", from_deck: rock_fromdeck, to_text: rock_text },
        KeywordHandler { keyword: "PVTW", from_deck: pvtw_fromdeck, to_text: pvtw_text },
    ],
    sort_by_index: false,
};

pub fn pvto_fromdeck(deck: &Deck) -> TableResult<DataFrame> {
    keyword_to_table(deck, &PVTO)
}

pub fn pvtg_fromdeck(deck: &Deck) -> TableResult<DataFrame> {
    keyword_to_table(deck, &PVTG)
}

pub fn pvdo_fromdeck(deck: &Deck) -> TableResult<DataFrame> {
    keyword_to_table(deck, &PVDO)
}

pub fn pvdg_fromdeck(deck: &Deck) -> TableResult<DataFrame> {
    keyword_to_table(deck, &PVDG)
}

pub fn pvtw_fromdeck(deck: &Deck) -> TableResult<DataFrame> {
    keyword_to_table(deck, &PVTW)
}

pub fn density_fromdeck(deck: &Deck) -> TableResult<DataFrame> {
    keyword_to_table(deck, &DENSITY)
}

pub fn rock_fromdeck(deck: &Deck) -> TableResult<DataFrame> {
    keyword_to_table(deck, &ROCK)
}

/// Extract PVT keywords into one table indexed by PVTNUM.
///
/// `ntpvt` is only used when the deck does not declare TABDIMS.
pub fn table(source: impl Into<Source>, keywords: Option<&[&str]>, ntpvt: Option<usize>) -> TableResult<DataFrame> {
    table_with_settings(source.into(), keywords, ntpvt, &InferSettings::default())
}

pub fn table_with_settings(source: Source, keywords: Option<&[&str]>, ntpvt: Option<usize>, settings: &InferSettings) -> TableResult<DataFrame> {
    let df = domain_table(&DOMAIN, source, keywords, ntpvt, settings)?;
    if df.height() == 0 {
        warn!("No PVT data found");
    } else {
        info!("Extracted PVT keywords {:?} for {} PVTNUMs", unique_text(&df, "KEYWORD")?, unique_text(&df, "PVTNUM")?.len());
    }
    Ok(df)
}

/// Write a live oil or wet gas table.
///
/// Each value of the outer column opens a record and the inner rows belonging
/// to it continue on indented lines. Every PVTNUM table is closed by an empty
/// record.
fn saturated_text(df: &DataFrame, spec: &KeywordSpec, outer: &str, comment: Option<&str>) -> TableResult<String> {
    let subset = keyword_subset(df, spec.keyword)?;
    if subset.height() == 0 {
        return Ok(NO_DATA.to_owned());
    }
    let inner = spec.data_columns().unwrap_or(&[]);
    require_column(&subset, outer)?;
    for col in inner {
        require_column(&subset, col)?;
    }

    let mut out = format!("{}\n{}", spec.keyword, comment_formatter(comment));
    let mut names = vec![outer];
    names.extend_from_slice(inner);
    out.push_str(&format!("-- {}\n", names.iter().map(|c| format!("{c:^22}")).join(" ")));
    out.push_str(&format!("-- {}\n", std::iter::repeat("*").take(inner.len() + 1).map(|c| format!("{c:^22}")).join(" ")));

    let continuation = " ".repeat(22);
    for (n, group) in index_groups(&subset, spec.keyword, spec.index, IndexFallback::OneGroup)? {
        let group = Rows::from_dataframe(&sort_frame(&group, &names[..2])?)?;
        out.push_str(&format!("-- {}: {n}\n", spec.index));
        let by_outer = (0..group.len()).group_by(|i| group.real(*i, outer).map(f64::to_bits));
        for (key, members) in &by_outer {
            let outer_value = key.map(f64::from_bits);
            out.push_str(&format!("{}  ", fixed(outer_value)));
            let lines = members
                .map(|i| inner.iter().map(|c| fixed(group.real(i, c))).join("  "))
                .join(&format!("\n{continuation}"));
            out.push_str(&lines);
            let label = outer_value.map(|v| v.to_string()).unwrap_or_else(|| "1*".to_string());
            out.push_str(&format!(" /\n-- End {outer}={label}\n"));
        }
        out.push_str("/\n");
    }
    out.push('\n');
    Ok(out)
}

pub fn pvto_text(df: &DataFrame, comment: Option<&str>) -> TableResult<String> {
    saturated_text(df, &PVTO, "RS", comment)
}

pub fn pvtg_text(df: &DataFrame, comment: Option<&str>) -> TableResult<String> {
    saturated_text(df, &PVTG, "PRESSURE", comment)
}

pub fn pvdo_text(df: &DataFrame, comment: Option<&str>) -> TableResult<String> {
    table_to_keyword_text(df, &PVDO, comment)
}

pub fn pvdg_text(df: &DataFrame, comment: Option<&str>) -> TableResult<String> {
    table_to_keyword_text(df, &PVDG, comment)
}

pub fn pvtw_text(df: &DataFrame, comment: Option<&str>) -> TableResult<String> {
    table_to_keyword_text(df, &PVTW, comment)
}

pub fn density_text(df: &DataFrame, comment: Option<&str>) -> TableResult<String> {
    table_to_keyword_text(df, &DENSITY, comment)
}

pub fn rock_text(df: &DataFrame, comment: Option<&str>) -> TableResult<String> {
    table_to_keyword_text(df, &ROCK, comment)
}

pub fn to_deck(table: &DataFrame, keywords: Option<&[&str]>, settings: &WriteSettings) -> TableResult<String> {
    write_deck(table, &DOMAIN, keywords, settings)
}
