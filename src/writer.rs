//! Normalized tables back to deck text.
//!
//! Every keyword writer starts its block with the keyword name on its own line
//! followed by an optional `--` comment, and returns [`NO_DATA`] when the table
//! holds no rows for the keyword. Tabulated numbers are written fixed point,
//! width 20 with 7 decimals; missing or NaN values are written as `1*`.
use std::collections::HashMap;

use itertools::Itertools;
use log::{info, warn};

use polars::prelude::{DataFrame, DataType};

use crate::dataframes::{filter_text, has_column, partition_by_index, sort_frame, unique_text, Rows};
use crate::keyword_specs::{schema_for, DeckValue, ItemKind};
use crate::mapper::{handle_wanted_keywords, is_ignored, Domain, KeywordSpec};
use crate::table_error::{TableError, TableResult};

/// Written instead of a keyword block when there is nothing to write
pub const NO_DATA: &str = "-- No data!";

/// Settings for [`write_deck`] and the domain writers built on it.
#[derive(Debug, Clone, Default)]
pub struct WriteSettings {
    comments: HashMap<String, String>,
    with_phases: bool,
}

impl WriteSettings {
    /// Builder-style setter for the comment written under `keyword`.
    /// The key `master` holds the comment written at the top of the output.
    pub fn comment(mut self, keyword: &str, text: &str) -> Self {
        self.comments.insert(keyword.to_owned(), text.to_owned());
        self
    }

    pub fn master_comment(self, text: &str) -> Self {
        self.comment("master", text)
    }

    /// Builder-style setter: write the phase keywords before equilibration data.
    pub fn with_phases(mut self, with_phases: bool) -> Self {
        self.with_phases = with_phases;
        self
    }

    pub fn get_comment(&self, keyword: &str) -> Option<&str> {
        self.comments.get(keyword).map(|s| s.as_str())
    }

    pub fn get_with_phases(&self) -> bool {
        self.with_phases
    }
}

/// Prefix every line of `comment` with `-- `.
///
/// Blank or missing comments give an empty string, anything else ends with a newline.
pub fn comment_formatter(comment: Option<&str>) -> String {
    comment_with_prefix(comment, "-- ")
}

pub fn comment_with_prefix(comment: Option<&str>, prefix: &str) -> String {
    let text = match comment {
        Some(c) if !c.trim().is_empty() => c,
        _ => return String::new(),
    };
    let joined = text.lines().map(|l| format!("{prefix}{}", l.trim())).join("\n");
    format!("{}\n", joined.trim())
}

/// Collapse runs of equal whitespace separated tokens to `n*token`.
///
/// A run of defaults (`1*`) becomes `n*`. The result is joined with `sep`.
///
/// ```
/// # use resframe::writer::runlength_compress;
/// assert_eq!(runlength_compress("1 1", " "), "2*1");
/// assert_eq!(runlength_compress("0.5  1*  1*   1*", " "), "0.5 3*");
/// ```
pub fn runlength_compress(text: &str, sep: &str) -> String {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    if tokens.len() <= 1 {
        return text.to_owned();
    }
    compress_tokens(tokens).join(sep)
}

pub(crate) fn compress_tokens<I, S>(tokens: I) -> Vec<String>
where I: IntoIterator<Item = S>, S: AsRef<str>
{
    tokens.into_iter()
        .map(|t| t.as_ref().to_owned())
        .dedup_with_count()
        .map(|(n, tok)| match n {
            1 => tok,
            _ if tok == "1*" => format!("{n}*"),
            _ => format!("{n}*{tok}"),
        })
        .collect()
}

/// Fixed point, width 20 and 7 decimals. Missing values become a padded `1*`.
pub fn fixed(value: Option<f64>) -> String {
    match value {
        Some(v) if !v.is_nan() => format!("{v:20.7}"),
        _ => format!("{:>20}", "1*"),
    }
}

/// Shortest of plain and exponent notation with 6 significant digits,
/// trailing zeros removed, like C's `%g`.
pub fn general(value: f64) -> String {
    const PRECISION: i32 = 6;
    if value.is_nan() {
        return "1*".to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let sci = format!("{:.*e}", (PRECISION - 1) as usize, value);
    let (mantissa, exponent) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => return sci,
    };

    if exponent < -4 || exponent >= PRECISION {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_zeros(mantissa), exponent.abs())
    } else {
        let decimals = (PRECISION - 1 - exponent).max(0) as usize;
        trim_zeros(&format!("{value:.decimals$}")).to_string()
    }
}

/// [`general`] right aligned in `width` characters
pub fn general_width(value: f64, width: usize) -> String {
    format!("{:>width$}", general(value))
}

fn trim_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Rows belonging to `keyword`, or every row when there is no KEYWORD column.
pub(crate) fn keyword_subset(df: &DataFrame, keyword: &str) -> TableResult<DataFrame> {
    if has_column(df, "KEYWORD") {
        Ok(filter_text(df, "KEYWORD", keyword)?)
    } else {
        Ok(df.clone())
    }
}

/// How a table without its index column is split into groups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum IndexFallback {
    /// All rows form one tabulated group with index 1
    OneGroup,
    /// Each row is its own record, so only a single row is unambiguous
    OneRow,
}

/// Split rows by the index column, ascending. Rows lacking an index value are skipped.
pub(crate) fn index_groups(df: &DataFrame, keyword: &str, index: &'static str, fallback: IndexFallback) -> TableResult<Vec<(i64, DataFrame)>> {
    if !has_column(df, index) {
        if fallback == IndexFallback::OneRow && df.height() > 1 {
            return Err(TableError::AmbiguousIndex { keyword: keyword.to_owned(), index, rows: df.height() });
        }
        return Ok(vec![(1, df.clone())]);
    }

    let groups = partition_by_index(df, index)?;
    let grouped: usize = groups.iter().map(|(_, group)| group.height()).sum();
    if grouped < df.height() {
        warn!("Ignoring {} {keyword} rows without a value for {index}", df.height() - grouped);
    }
    Ok(groups)
}

pub(crate) fn require_column(df: &DataFrame, column: &str) -> TableResult<()> {
    if has_column(df, column) {
        Ok(())
    } else {
        Err(TableError::MissingColumn(column.to_owned()))
    }
}

/// Comment line naming the columns, each centered over its value.
pub(crate) fn column_header(columns: &[&str]) -> String {
    format!("--   {}\n", columns.iter().map(|c| format!("{c:^21}")).join(" "))
}

/// Output columns of a keyword without a list item, in item order
pub(crate) fn scalar_columns(spec: &KeywordSpec) -> Vec<&'static str> {
    schema_for(spec.keyword)
        .map(|s| s.items(0))
        .unwrap_or(&[])
        .iter()
        .map(|item| spec.column_for(item.name))
        .filter(|c| !is_ignored(c))
        .collect()
}

/// Write one keyword with fixed point numbers.
///
/// Keywords with a list item are written as one table per index value,
/// sorted on the first tabulated column and closed by `/`. Other keywords
/// are written one record per index value; without an index column only a
/// single row is accepted.
pub fn table_to_keyword_text(df: &DataFrame, spec: &KeywordSpec, comment: Option<&str>) -> TableResult<String> {
    let subset = keyword_subset(df, spec.keyword)?;
    if subset.height() == 0 {
        return Ok(NO_DATA.to_owned());
    }

    let mut out = format!("{}\n{}", spec.keyword, comment_formatter(comment));
    match spec.data_columns() {
        Some(cols) => {
            require_column(&subset, cols[0])?;
            out.push_str(&column_header(cols));
            for (n, group) in index_groups(&subset, spec.keyword, spec.index, IndexFallback::OneGroup)? {
                let group = Rows::from_dataframe(&sort_frame(&group, &cols[..1])?)?;
                out.push_str(&format!("-- {}: {n}\n", spec.index));
                for i in 0..group.len() {
                    out.push_str(&format!("  {}\n", cols.iter().map(|c| fixed(group.real(i, c))).join(" ")));
                }
                out.push_str("/\n");
            }
        },
        None => {
            let cols = scalar_columns(spec);
            out.push_str(&column_header(&cols));
            for (n, group) in index_groups(&subset, spec.keyword, spec.index, IndexFallback::OneRow)? {
                if group.height() > 1 {
                    warn!("{} has {} rows for {}={n}, writing the first", spec.keyword, group.height(), spec.index);
                }
                let first = Rows::from_dataframe(&group.head(Some(1)))?;
                out.push_str(&format!("  {} /\n", cols.iter().map(|c| fixed(first.real(0, c))).join(" ")));
            }
        }
    }
    out.push('\n');
    Ok(out)
}

/// Write rows as records of typed tokens, one record per row.
///
/// Missing values become `1*` and runs of equal tokens are compressed. With
/// `drop_trailing` the defaults at the end of a record are left out.
pub fn record_table(rows: &Rows, columns: &[(&str, ItemKind)], drop_trailing: bool) -> String {
    let mut out = format!("-- {}\n", columns.iter().map(|(c, _)| *c).join(" "));
    for i in 0..rows.len() {
        let mut tokens: Vec<String> = columns.iter()
            .map(|(c, kind)| record_token(rows.cell(i, c), *kind))
            .collect();
        if drop_trailing {
            while tokens.last().map(|t| t == "1*").unwrap_or(false) {
                tokens.pop();
            }
        }
        out.push_str(&format!("  {} /\n", compress_tokens(tokens).join(" ")));
    }
    out
}

fn record_token(value: Option<&DeckValue>, kind: ItemKind) -> String {
    let value = match value {
        Some(v) => v,
        None => return "1*".to_string(),
    };
    match (kind, value) {
        (ItemKind::Char, v) => format!("'{v}'"),
        (ItemKind::Integer, v) => match v.as_i64() {
            Some(i) => i.to_string(),
            None => "1*".to_string(),
        },
        (ItemKind::Double, v) => match v.as_f64() {
            Some(x) if !x.is_nan() => x.to_string(),
            _ => "1*".to_string(),
        },
    }
}

/// Check that `index` runs 1, 2, .., n over the table.
pub(crate) fn check_consecutive(df: &DataFrame, index: &str) -> TableResult<()> {
    if !has_column(df, index) {
        return Ok(());
    }
    let unique = df.column(index)?.unique()?.cast(&DataType::Int64)?;
    let values: Vec<i64> = unique.i64()?.into_iter().flatten().sorted().collect();
    let expected: Vec<i64> = (1..=values.len() as i64).collect();
    if values != expected {
        return Err(TableError::NonConsecutiveIndex { index: index.to_owned(), values });
    }
    Ok(())
}

/// Write every requested keyword of a domain present in `df`, in the
/// domain's canonical order, below a master comment and a generated header.
pub fn write_deck(df: &DataFrame, domain: &Domain, keywords: Option<&[&str]>, settings: &WriteSettings) -> TableResult<String> {
    if df.height() == 0 {
        return Ok(format!("{NO_DATA}\n"));
    }
    require_column(df, "KEYWORD")?;
    check_consecutive(df, domain.index)?;

    let present = unique_text(df, "KEYWORD")?;
    let mut out = comment_formatter(settings.get_comment("master"));
    let header = format!(
        "Output file printed by {} {}\n at {}",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
    );
    out.push_str(&comment_formatter(Some(&header)));
    out.push('\n');

    for kw in handle_wanted_keywords(keywords, None, domain) {
        if !present.iter().any(|p| p == kw) {
            info!("No {kw} rows to write");
            continue;
        }
        if let Some(h) = domain.handler(kw) {
            out.push_str(&(h.to_text)(df, settings.get_comment(kw))?);
        }
    }
    Ok(out)
}
