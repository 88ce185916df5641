//! Deck keywords to normalized tables.
//!
//! A [`KeywordSpec`] says how the items of one keyword become columns: which
//! items are renamed, which list item is cut into rows, and which counter
//! column tells repeated regions apart. [`keyword_to_table`] applies one spec
//! to a deck. A [`Domain`] groups the handlers of keywords that share an index
//! column (all PVT keywords share PVTNUM, say) so their tables can be merged.
use log::{info, warn};
use polars::prelude::DataFrame;

use crate::dataframes::{concat_frames, has_column, sort_frame, unique_text, Cell, Rows};
use crate::deck::{Deck, Source};
use crate::inferdims::{inject_region_count, InferSettings};
use crate::keyword_specs::{DeckValue, RegionDim};
use crate::records::{parse_record, ItemValue};
use crate::table_error::{TableError, TableResult};

/// Output name(s) for one deck item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rename {
    /// Rename a scalar item. Targets starting with `IGNORE` drop the item.
    To(&'static str),
    /// Cut a list item into rows of these columns, consumed positionally.
    Data(&'static [&'static str]),
}

/// When the region counter advances
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    /// After every non-empty record
    PerRecord,
    /// At every empty record; the records in between form one region
    PerEmptyRecord,
}

#[derive(Debug, Clone, Copy)]
pub struct KeywordSpec {
    pub keyword: &'static str,
    pub renamer: &'static [(&'static str, Rename)],
    pub index: &'static str,
    pub counter: Counter,
}

impl KeywordSpec {
    pub const fn new(keyword: &'static str, renamer: &'static [(&'static str, Rename)], index: &'static str) -> Self {
        Self { keyword, renamer, index, counter: Counter::PerRecord }
    }

    pub const fn counting(self, counter: Counter) -> Self {
        Self { counter, ..self }
    }

    pub fn rename(&self, item: &str) -> Option<Rename> {
        self.renamer.iter().find(|(n, _)| *n == item).map(|(_, r)| *r)
    }

    /// Column name of a scalar item after renaming
    pub fn column_for<'a>(&self, item: &'a str) -> &'a str {
        match self.rename(item) {
            Some(Rename::To(c)) => c,
            _ => item,
        }
    }

    /// Columns produced from the keyword's list item, if it has one
    pub fn data_columns(&self) -> Option<&'static [&'static str]> {
        self.renamer.iter().find_map(|(_, r)| match r {
            Rename::Data(cols) => Some(*cols),
            Rename::To(_) => None,
        })
    }
}

pub(crate) fn is_ignored(column: &str) -> bool {
    column.starts_with("IGNORE")
}

/// Rows for one keyword, tagged with its index counter and `KEYWORD`.
///
/// Only the first occurrence of the keyword in the deck is read.
pub fn keyword_rows(deck: &Deck, spec: &KeywordSpec) -> TableResult<Rows> {
    let mut rows = Rows::new();
    let kw = match deck.first(spec.keyword) {
        Some(kw) => kw,
        None => return Ok(rows),
    };
    if deck.named(spec.keyword).count() > 1 {
        warn!("{} occurs several times, only the first occurrence is used", spec.keyword);
    }

    let mut counter: i64 = 1;
    for (ridx, record) in kw.records().iter().enumerate() {
        if record.is_empty() {
            if spec.counter == Counter::PerEmptyRecord {
                counter += 1;
            }
            continue;
        }

        let map = parse_record(record, spec.keyword, ridx)?;
        let mut scalars: Vec<(String, Cell)> = vec![];
        let mut data: Option<(&'static [&'static str], Vec<f64>)> = None;
        for (name, value) in map.iter() {
            if let Some(Rename::Data(cols)) = spec.rename(name) {
                data = Some((cols, value.to_reals()));
                continue;
            }
            let column = spec.column_for(name);
            if is_ignored(column) {
                continue;
            }
            let cell = match value {
                ItemValue::Null => None,
                ItemValue::Scalar(v) => Some(v.clone()),
                ItemValue::List(_) => continue,
            };
            scalars.push((column.to_owned(), cell));
        }

        let index_cell = (spec.index.to_owned(), Some(DeckValue::Integer(counter)));
        match data {
            Some((cols, values)) => {
                if values.len() % cols.len() != 0 {
                    return Err(TableError::DimensionMismatch(format!(
                        "{} record {} holds {} values, not a multiple of {} columns",
                        spec.keyword, ridx + 1, values.len(), cols.len()
                    )));
                }
                for chunk in values.chunks(cols.len()) {
                    let mut row = scalars.clone();
                    row.extend(cols.iter().zip(chunk).map(|(c, v)| (c.to_string(), Some(DeckValue::Real(*v)))));
                    row.push(index_cell.clone());
                    rows.push_row(row);
                }
            },
            None => {
                scalars.push(index_cell);
                rows.push_row(scalars);
            }
        }

        if spec.counter == Counter::PerRecord {
            counter += 1;
        }
    }

    rows.set_column("KEYWORD", Some(DeckValue::Char(spec.keyword.to_owned())));
    Ok(rows)
}

/// Normalized table for one keyword. Zero occurrences give an empty table.
pub fn keyword_to_table(deck: &Deck, spec: &KeywordSpec) -> TableResult<DataFrame> {
    Ok(keyword_rows(deck, spec)?.into_dataframe()?)
}

/// Reads and writes one keyword of a domain.
pub struct KeywordHandler {
    pub keyword: &'static str,
    pub from_deck: fn(&Deck) -> TableResult<DataFrame>,
    pub to_text: fn(&DataFrame, Option<&str>) -> TableResult<String>,
}

/// Keywords sharing an index column, in canonical output order
pub struct Domain {
    pub name: &'static str,
    pub index: &'static str,
    pub dim: RegionDim,
    pub handlers: &'static [KeywordHandler],
    /// Sort merged rows by index, keeping keyword priority within an index
    pub sort_by_index: bool,
}

impl Domain {
    pub fn handler(&self, keyword: &str) -> Option<&KeywordHandler> {
        self.handlers.iter().find(|h| h.keyword == keyword)
    }

    pub fn keywords(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.handlers.iter().map(|h| h.keyword)
    }

    fn priority(&self, keyword: &str) -> usize {
        self.handlers.iter().position(|h| h.keyword == keyword).unwrap_or(usize::MAX)
    }
}

/// Filter requested keywords down to those the domain supports and, when a
/// deck is given, those present in it. `None` requests every supported keyword.
pub fn handle_wanted_keywords(wanted: Option<&[&str]>, deck: Option<&Deck>, domain: &Domain) -> Vec<&'static str> {
    let requested: Vec<&str> = match wanted {
        Some(w) => w.to_vec(),
        None => domain.keywords().collect(),
    };

    for kw in requested.iter().filter(|k| domain.handler(k).is_none()) {
        warn!("Requested keyword {kw} is not supported by {}", domain.name);
    }

    domain.keywords()
        .filter(|k| requested.contains(k))
        .filter(|k| match deck {
            Some(d) if !d.contains(k) => {
                if wanted.is_some() {
                    info!("Requested keyword {k} not found in deck");
                }
                false
            },
            _ => true,
        })
        .collect()
}

/// Concatenate per-keyword tables and sort them into canonical order:
/// keywords in domain priority, and for domains sorted by index, index
/// values ascending with keyword priority kept within each index.
pub fn merge_keyword_tables(domain: &Domain, parts: Vec<DataFrame>) -> TableResult<DataFrame> {
    let mut priorities = Vec::with_capacity(parts.len());
    for part in &parts {
        let keyword = match has_column(part, "KEYWORD") && part.height() > 0 {
            true => unique_text(part, "KEYWORD")?.into_iter().next().unwrap_or_default(),
            false => String::new(),
        };
        priorities.push(domain.priority(&keyword));
    }
    let mut ordered: Vec<(usize, DataFrame)> = priorities.into_iter().zip(parts).collect();
    ordered.sort_by_key(|(priority, _)| *priority);

    let merged = concat_frames(ordered.into_iter().map(|(_, part)| part))?;
    if domain.sort_by_index && has_column(&merged, domain.index) {
        return Ok(sort_frame(&merged, &[domain.index])?);
    }
    Ok(merged)
}

/// Read every wanted keyword of a domain from a deck into one table.
///
/// The region count is made explicit first with [`inject_region_count`],
/// using `region_count` when given and probing the text otherwise.
pub fn domain_table(
    domain: &Domain,
    source: Source,
    keywords: Option<&[&str]>,
    region_count: Option<usize>,
    settings: &InferSettings,
) -> TableResult<DataFrame> {
    let deck = inject_region_count(domain.dim, source, region_count, settings)?;
    let wanted = handle_wanted_keywords(keywords, Some(&deck), domain);

    let mut parts = vec![];
    for kw in wanted {
        if let Some(h) = domain.handler(kw) {
            parts.push((h.from_deck)(&deck)?);
        }
    }
    merge_keyword_tables(domain, parts)
}
