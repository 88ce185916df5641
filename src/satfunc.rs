//! Saturation functions: SWOF, SGOF, SWFN, SGWFN, SOF2, SGFN, SOF3 and SLGOF.
//!
//! Tabulated columns may be defaulted in the deck (`1*`). On read such gaps are
//! filled by linear interpolation in the saturation column within each SATNUM
//! table; gaps before the first or after the last known value are left as NaN.
use log::{info, warn};
use polars::prelude::{DataFrame, DataType, NamedFrom, Series};

use crate::dataframes::{concat_frames, has_column, partition_by_index, unique_text};
use crate::deck::{Deck, Source};
use crate::inferdims::InferSettings;
use crate::keyword_specs::RegionDim;
use crate::mapper::{domain_table, keyword_to_table, Domain, KeywordHandler, KeywordSpec, Rename};
use crate::table_error::{TableError, TableResult};
use crate::writer::{table_to_keyword_text, write_deck, WriteSettings};

pub const SWOF: KeywordSpec = KeywordSpec::new("SWOF", &[("DATA", Rename::Data(&["SW", "KRW", "KROW", "PCOW"]))], "SATNUM");
pub const SGOF: KeywordSpec = KeywordSpec::new("SGOF", &[("DATA", Rename::Data(&["SG", "KRG", "KROG", "PCOG"]))], "SATNUM");
pub const SWFN: KeywordSpec = KeywordSpec::new("SWFN", &[("DATA", Rename::Data(&["SW", "KRW", "PCOW"]))], "SATNUM");
pub const SGWFN: KeywordSpec = KeywordSpec::new("SGWFN", &[("DATA", Rename::Data(&["SG", "KRG", "KRW", "PCGW"]))], "SATNUM");
pub const SOF2: KeywordSpec = KeywordSpec::new("SOF2", &[("DATA", Rename::Data(&["SO", "KRO"]))], "SATNUM");
pub const SGFN: KeywordSpec = KeywordSpec::new("SGFN", &[("DATA", Rename::Data(&["SG", "KRG", "PCOG"]))], "SATNUM");
pub const SOF3: KeywordSpec = KeywordSpec::new("SOF3", &[("DATA", Rename::Data(&["SO", "KROW", "KROG"]))], "SATNUM");
pub const SLGOF: KeywordSpec = KeywordSpec::new("SLGOF", &[("DATA", Rename::Data(&["SL", "KRG", "KRO", "PCOG"]))], "SATNUM");

const SATURATIONS: [&str; 4] = ["SW", "SO", "SG", "SL"];

macro_rules! satfunc_handler {
    ($kw:literal, $spec:ident) => {
        KeywordHandler {
            keyword: $kw,
            from_deck: |deck| satfunc_fromdeck(deck, &$spec),
            to_text: |df, comment| table_to_keyword_text(df, &$spec, comment),
        }
    };
}

pub static DOMAIN: Domain = Domain {
    name: "satfunc",
    index: "SATNUM",
    dim: RegionDim::Ntsfun,
    handlers: &[
        satfunc_handler!("SWOF", SWOF),
        satfunc_handler!("SGOF", SGOF),
        satfunc_handler!("SWFN", SWFN),
        satfunc_handler!("SGWFN", SGWFN),
        satfunc_handler!("SOF2", SOF2),
        satfunc_handler!("SGFN", SGFN),
        satfunc_handler!("SOF3", SOF3),
        satfunc_handler!("SLGOF", SLGOF),
    ],
    sort_by_index: true,
};

/// Read one saturation function keyword and fill its defaulted values.
pub fn satfunc_fromdeck(deck: &Deck, spec: &KeywordSpec) -> TableResult<DataFrame> {
    let df = keyword_to_table(deck, spec)?;
    if df.height() == 0 {
        return Ok(df);
    }
    interpolate_defaults(&df)
}

/// The saturation column of a single-keyword table
fn saturation_column(columns: &[&str]) -> TableResult<&'static str> {
    let present: Vec<&'static str> = SATURATIONS.into_iter().filter(|s| columns.contains(s)).collect();
    match present.as_slice() {
        [sat] => Ok(*sat),
        [] => Err(TableError::InvalidSaturation("no saturation column (SW, SO, SG or SL) in table".to_string())),
        _ => Err(TableError::InvalidSaturation(format!("several saturation columns in one table: {}", present.join(", ")))),
    }
}

fn is_known(value: Option<f64>) -> bool {
    matches!(value, Some(v) if !v.is_nan())
}

fn real_values(df: &DataFrame, column: &str) -> TableResult<Vec<Option<f64>>> {
    Ok(df.column(column)?.cast(&DataType::Float64)?.f64()?.into_iter().collect())
}

/// Linear interpolation in `x` for the unknown `y` values lying between two
/// known ones. Leading and trailing unknowns are kept.
fn interpolate(x: &[Option<f64>], y: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut out = y.to_vec();
    let known: Vec<usize> = (0..y.len()).filter(|i| is_known(y[*i])).collect();
    for pair in known.windows(2) {
        let (lo, hi) = (pair[0], pair[1]);
        let (s0, v0) = (x[lo].unwrap_or(f64::NAN), y[lo].unwrap_or(f64::NAN));
        let (s1, v1) = (x[hi].unwrap_or(f64::NAN), y[hi].unwrap_or(f64::NAN));
        for i in lo + 1..hi {
            let s = x[i].unwrap_or(f64::NAN);
            out[i] = Some(if s1 == s0 { v0 } else { v0 + (v1 - v0) * (s - s0) / (s1 - s0) });
        }
    }
    out
}

/// Fill missing and NaN values of the tabulated columns by linear
/// interpolation in saturation, per SATNUM table and in row order.
///
/// `df` must hold a single keyword, so that exactly one of SW, SO, SG and SL
/// is present. The saturation column itself may not have gaps. Values outside
/// the first and last known point of a column are not extrapolated. The
/// result holds the SATNUM tables in ascending order, followed by any rows
/// without a SATNUM.
pub fn interpolate_defaults(df: &DataFrame) -> TableResult<DataFrame> {
    let columns = df.get_column_names();
    let sat = saturation_column(&columns)?;
    if let Some(i) = real_values(df, sat)?.into_iter().position(|v| !is_known(v)) {
        return Err(TableError::InvalidSaturation(format!("{sat} is defaulted in row {}", i + 1)));
    }
    let value_columns: Vec<&str> = columns.iter()
        .copied()
        .filter(|c| !matches!(*c, "SATNUM" | "KEYWORD") && *c != sat)
        .collect();

    let mut tables = vec![];
    if has_column(df, "SATNUM") {
        tables.extend(partition_by_index(df, "SATNUM")?.into_iter().map(|(_, group)| group));
        let unindexed = df.filter(&df.column("SATNUM")?.is_null())?;
        if unindexed.height() > 0 {
            warn!("{} saturation rows without SATNUM are not interpolated", unindexed.height());
        }
        tables.push(unindexed);
    } else {
        tables.push(df.clone());
    }

    let mut filled = Vec::with_capacity(tables.len());
    for mut table in tables {
        if table.height() == 0 {
            continue;
        }
        let saturation = real_values(&table, sat)?;
        for col in value_columns.iter() {
            let values = interpolate(&saturation, &real_values(&table, col)?);
            table.replace(col, Series::new(col, values))?;
        }
        filled.push(table);
    }
    Ok(concat_frames(filled)?)
}

/// Extract saturation function keywords into one table sorted by SATNUM.
///
/// `ntsfun` is only used when the deck does not declare TABDIMS.
pub fn table(source: impl Into<Source>, keywords: Option<&[&str]>, ntsfun: Option<usize>) -> TableResult<DataFrame> {
    table_with_settings(source.into(), keywords, ntsfun, &InferSettings::default())
}

pub fn table_with_settings(source: Source, keywords: Option<&[&str]>, ntsfun: Option<usize>, settings: &InferSettings) -> TableResult<DataFrame> {
    let df = domain_table(&DOMAIN, source, keywords, ntsfun, settings)?;
    if df.height() == 0 {
        warn!("No saturation function data found");
    } else {
        info!("Extracted keywords {:?} for {} SATNUMs", unique_text(&df, "KEYWORD")?, unique_text(&df, "SATNUM")?.len());
    }
    Ok(df)
}

pub fn to_deck(table: &DataFrame, keywords: Option<&[&str]>, settings: &WriteSettings) -> TableResult<String> {
    write_deck(table, &DOMAIN, keywords, settings)
}
