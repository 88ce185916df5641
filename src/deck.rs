//! The in-memory deck: keywords, records and items.
//!
//! A [`Deck`] is built from text with [`Deck::parse`] (permissive) or
//! [`Deck::parse_with`] and a [`ParseContext`]. Known keywords are split into
//! records according to their [`RecordLayout`] and the region counts declared
//! by TABDIMS/EQLDIMS; unknown keywords are kept with untyped records.
//!
//! ```
//! # use resframe::deck::Deck;
//! let deck = Deck::parse("OIL\nWATER\nSWOF\n0 0 1 0\n1 1 0 0 /\n").unwrap();
//! assert!(deck.contains("SWOF"));
//! assert_eq!(deck.first("SWOF").unwrap().records().len(), 1);
//! ```
use std::collections::HashMap;
use std::fmt::Display;

use log::{debug, warn};

use crate::deck_error::{DeckError, DeckResult};
use crate::keyword_specs::{schema_for, DeckValue, ItemKind, ItemSize, ItemSpec, KeywordSchema, RecordLayout, RegionDim};
use crate::parsing::{split_keywords, RawKeyword, RawRecord, RawToken};

/// One item of a record: a single value, a list, or nothing when the item
/// was not written. `None` entries are explicit defaults (`1*`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeckItem {
    values: Vec<Option<DeckValue>>,
}

impl DeckItem {
    pub fn new(values: Vec<Option<DeckValue>>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[Option<DeckValue>] {
        &self.values
    }

    /// `true` if the item was not written at all or written as a single default.
    pub fn is_defaulted(&self) -> bool {
        self.values.is_empty() || (self.values.len() == 1 && self.values[0].is_none())
    }

    pub fn first(&self) -> Option<&DeckValue> {
        self.values.first().and_then(|v| v.as_ref())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeckRecord {
    items: Vec<DeckItem>,
}

impl DeckRecord {
    pub fn new(items: Vec<DeckItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[DeckItem] {
        &self.items
    }

    pub fn item(&self, index: usize) -> Option<&DeckItem> {
        self.items.get(index)
    }

    /// A lone `/` record, used as a table terminator by several keywords.
    pub fn is_empty(&self) -> bool {
        self.items.iter().all(|i| i.values.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeckKeyword {
    name: String,
    records: Vec<DeckRecord>,
}

impl DeckKeyword {
    pub fn new<S: Into<String>>(name: S, records: Vec<DeckRecord>) -> Self {
        Self { name: name.into(), records }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn records(&self) -> &[DeckRecord] {
        &self.records
    }
}

/// Settings controlling how forgiving deck structuring is.
///
/// The default context is permissive: records beyond a declared region count
/// are dropped with a warning. Use [`ParseContext::strict_for`] to turn that
/// overflow into [`DeckError::ExtraRecords`] for one region count.
#[derive(Debug, Clone, Default)]
pub struct ParseContext {
    strict: Option<RegionDim>,
}

impl ParseContext {
    pub fn strict_for(dim: RegionDim) -> Self {
        Self { strict: Some(dim) }
    }

    /// Builder-style setter for the region count checked strictly.
    pub fn with_strict(mut self, dim: Option<RegionDim>) -> Self {
        self.strict = dim;
        self
    }

    fn is_strict(&self, dim: RegionDim) -> bool {
        self.strict == Some(dim)
    }
}

/// A sequence of keywords in file order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Deck {
    keywords: Vec<DeckKeyword>,
}

impl Deck {
    pub fn new(keywords: Vec<DeckKeyword>) -> Self {
        Self { keywords }
    }

    /// Parse deck text permissively.
    pub fn parse(text: &str) -> DeckResult<Self> {
        Self::parse_with(text, &ParseContext::default())
    }

    pub fn parse_with(text: &str, ctx: &ParseContext) -> DeckResult<Self> {
        let raw = split_keywords(text)?;
        let dims = RegionCounts::scan(&raw)?;
        let keywords = raw.into_iter()
            .map(|kw| structure_keyword(kw, &dims, ctx))
            .collect::<DeckResult<Vec<_>>>()?;
        Ok(Self { keywords })
    }

    pub fn keywords(&self) -> &[DeckKeyword] {
        &self.keywords
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DeckKeyword> {
        self.keywords.iter()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.keywords.iter().any(|k| k.name == name)
    }

    /// All occurrences of a keyword, in deck order
    pub fn named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a DeckKeyword> + 'a {
        self.keywords.iter().filter(move |k| k.name == name)
    }

    pub fn first(&self, name: &str) -> Option<&DeckKeyword> {
        self.keywords.iter().find(|k| k.name == name)
    }

    /// Region count in effect for `dim`; 1 when the deck does not declare it.
    pub fn region_count(&self, dim: RegionDim) -> usize {
        self.first(dim.keyword())
            .and_then(|kw| kw.records.first())
            .and_then(|rec| rec.item(dim.position()))
            .and_then(|item| item.first())
            .and_then(|v| v.as_i64())
            .map(|n| n.max(1) as usize)
            .unwrap_or(1)
    }
}

impl<'a> IntoIterator for &'a Deck {
    type Item = &'a DeckKeyword;
    type IntoIter = std::slice::Iter<'a, DeckKeyword>;

    fn into_iter(self) -> Self::IntoIter {
        self.keywords.iter()
    }
}

/// Renders the deck back to text that parses to the same deck.
impl Display for Deck {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for kw in &self.keywords {
            writeln!(f, "{}", kw.name)?;
            for rec in &kw.records {
                if rec.is_empty() {
                    writeln!(f, "/")?;
                    continue;
                }
                let last = rec.items.iter().rposition(|i| !i.values.is_empty()).unwrap_or(0);
                let mut tokens = vec![];
                for item in &rec.items[..=last] {
                    if item.values.is_empty() {
                        tokens.push("1*".to_string());
                    }
                    for v in &item.values {
                        tokens.push(render_value(v.as_ref()));
                    }
                }
                writeln!(f, " {} /", tokens.join(" "))?;
            }
            if schema_for(&kw.name).map(|s| s.layout) == Some(RecordLayout::Terminated) {
                writeln!(f, "/")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

fn render_value(v: Option<&DeckValue>) -> String {
    match v {
        None => "1*".to_string(),
        Some(DeckValue::Char(s)) => format!("'{s}'"),
        Some(DeckValue::Integer(i)) => i.to_string(),
        Some(DeckValue::Real(x)) => format!("{x:?}"),
    }
}

/// Either deck text or an already parsed deck.
///
/// Only text can be re-parsed, which dimension inference relies on.
#[derive(Debug, Clone)]
pub enum Source {
    Text(String),
    Parsed(Deck),
}

impl Source {
    /// Parse the source permissively, or hand back the parsed deck.
    pub fn into_deck(self) -> DeckResult<Deck> {
        match self {
            Source::Text(s) => Deck::parse(&s),
            Source::Parsed(d) => Ok(d),
        }
    }
}

impl From<&str> for Source {
    fn from(value: &str) -> Self {
        Source::Text(value.to_owned())
    }
}

impl From<String> for Source {
    fn from(value: String) -> Self {
        Source::Text(value)
    }
}

impl From<Deck> for Source {
    fn from(value: Deck) -> Self {
        Source::Parsed(value)
    }
}

struct RegionCounts(HashMap<RegionDim, usize>);

impl RegionCounts {
    fn scan(raw: &[RawKeyword]) -> DeckResult<Self> {
        let mut counts = HashMap::new();
        for dim in [RegionDim::Ntsfun, RegionDim::Ntpvt, RegionDim::Ntequl] {
            let kw = match raw.iter().find(|k| k.name == dim.keyword()) {
                Some(kw) => kw,
                None => continue,
            };
            let schema = match schema_for(&kw.name) {
                Some(s) => s,
                None => continue,
            };
            let rec = match kw.records.first() {
                Some(r) => r,
                None => continue,
            };
            let (spec, tok) = match (schema.items(0).get(dim.position()), rec.get(dim.position())) {
                (Some(spec), Some(tok)) => (spec, tok),
                _ => continue,
            };
            if let Some(DeckValue::Integer(n)) = type_token(tok, spec, &kw.name)? {
                counts.insert(dim, n.max(1) as usize);
            }
        }
        Ok(Self(counts))
    }

    fn get(&self, dim: RegionDim) -> usize {
        self.0.get(&dim).copied().unwrap_or(1)
    }
}

fn structure_keyword(mut raw: RawKeyword, dims: &RegionCounts, ctx: &ParseContext) -> DeckResult<DeckKeyword> {
    if !raw.trailing.is_empty() {
        warn!("Keyword {} (line {}) ends with an unterminated record, keeping it", raw.name, raw.line);
        raw.records.push(std::mem::take(&mut raw.trailing));
    }

    let schema = match schema_for(&raw.name) {
        Some(s) => s,
        None => {
            debug!("Keyword {} (line {}) has no schema, keeping its records untyped", raw.name, raw.line);
            let records = raw.records.into_iter().map(untyped_record).collect();
            return Ok(DeckKeyword::new(raw.name, records));
        }
    };

    let records = select_records(&raw, schema, dims, ctx)?;
    let records = records.into_iter()
        .enumerate()
        .map(|(i, rec)| type_record(rec, schema, i))
        .collect::<DeckResult<Vec<_>>>()?;
    Ok(DeckKeyword::new(raw.name, records))
}

/// Apply the keyword's record layout, dropping or rejecting overflow.
fn select_records(raw: &RawKeyword, schema: &KeywordSchema, dims: &RegionCounts, ctx: &ParseContext) -> DeckResult<Vec<RawRecord>> {
    let found = raw.records.len();
    let (keep, overflow_dim) = match schema.layout {
        RecordLayout::Empty => (0, None),
        RecordLayout::Fixed(n) => (n.min(found), None),
        RecordLayout::Open => (found, None),
        RecordLayout::Terminated => {
            let end = raw.records.iter().position(|r| r.is_empty()).unwrap_or(found);
            if end == found {
                debug!("Keyword {} (line {}) has no terminating slash", raw.name, raw.line);
            }
            // The terminator itself is not kept
            if end + 1 < found {
                warn!("Ignoring {} records after the terminator of {}", found - end - 1, raw.name);
            }
            return Ok(raw.records[..end].to_vec());
        },
        RecordLayout::Regions(dim) => (dims.get(dim).min(found), Some(dim)),
        RecordLayout::RegionTables(dim) => {
            let n = dims.get(dim);
            let mut closed = 0;
            let mut end = found;
            for (i, rec) in raw.records.iter().enumerate() {
                if rec.is_empty() {
                    closed += 1;
                    if closed == n {
                        end = i + 1;
                        break;
                    }
                }
            }
            (end, Some(dim))
        },
    };

    if keep < found {
        let dropped = found - keep;
        match overflow_dim {
            Some(dim) if ctx.is_strict(dim) => {
                return Err(DeckError::ExtraRecords { keyword: raw.name.clone(), expected: keep, found });
            },
            Some(dim) => {
                warn!("Keyword {} holds more tables than {dim}={}, ignoring {dropped} records", raw.name, dims.get(dim));
            },
            None => {
                warn!("Ignoring {dropped} extra records of keyword {} (line {})", raw.name, raw.line);
            }
        }
    }
    Ok(raw.records[..keep].to_vec())
}

fn type_record(rec: RawRecord, schema: &KeywordSchema, index: usize) -> DeckResult<DeckRecord> {
    if rec.is_empty() {
        return Ok(DeckRecord::default());
    }

    let specs = schema.items(index);
    let mut tokens = rec.into_iter();
    let mut items = Vec::with_capacity(specs.len());
    for spec in specs {
        let item = match spec.size {
            ItemSize::Single => match tokens.next() {
                Some(tok) => DeckItem::new(vec![type_token(&tok, spec, schema.name)?]),
                None => DeckItem::default(),
            },
            ItemSize::All => {
                let values = tokens.by_ref()
                    .map(|tok| type_token(&tok, spec, schema.name))
                    .collect::<DeckResult<Vec<_>>>()?;
                DeckItem::new(values)
            }
        };
        items.push(item);
    }

    let surplus = tokens.count();
    if surplus > 0 {
        warn!("Ignoring {surplus} surplus items in record {} of {}", index + 1, schema.name);
    }
    Ok(DeckRecord::new(items))
}

fn type_token(tok: &Option<RawToken>, spec: &ItemSpec, keyword: &str) -> DeckResult<Option<DeckValue>> {
    let tok = match tok {
        Some(t) => t,
        None => return Ok(None),
    };
    let invalid = || DeckError::InvalidValue { keyword: keyword.to_owned(), item: spec.name, token: tok.text.clone() };

    let value = match spec.kind {
        ItemKind::Char => DeckValue::Char(tok.text.clone()),
        ItemKind::Integer => DeckValue::Integer(tok.text.parse().map_err(|_| invalid())?),
        ItemKind::Double => DeckValue::Real(parse_real(&tok.text).ok_or_else(invalid)?),
    };
    Ok(Some(value))
}

/// Parse a real number, accepting Fortran style `D` exponents.
fn parse_real(s: &str) -> Option<f64> {
    if s.contains(['d', 'D']) {
        s.replace(['d', 'D'], "e").parse().ok()
    } else {
        s.parse().ok()
    }
}

fn untyped_record(rec: RawRecord) -> DeckRecord {
    let items = rec.into_iter()
        .map(|tok| {
            let value = tok.map(|t| {
                if t.quoted {
                    DeckValue::Char(t.text)
                } else if let Ok(i) = t.text.parse::<i64>() {
                    DeckValue::Integer(i)
                } else if let Some(v) = parse_real(&t.text) {
                    DeckValue::Real(v)
                } else {
                    DeckValue::Char(t.text)
                }
            });
            DeckItem::new(vec![value])
        })
        .collect();
    DeckRecord::new(items)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_region_tables_split() -> DeckResult<()> {
        let text = "TABDIMS\n 1 2 /\nPVTO\n 20 50 1.1 0.9\n   100 1.05 1.0 /\n/\n 30 60 1.2 0.8 /\n/\n";
        let deck = Deck::parse(text)?;
        let pvto = deck.first("PVTO").unwrap();
        assert_eq!(pvto.records().len(), 4);
        assert!(pvto.records()[1].is_empty());
        assert_eq!(pvto.records()[0].item(1).unwrap().values().len(), 6);
        assert_eq!(deck.region_count(RegionDim::Ntpvt), 2);
        assert_eq!(deck.region_count(RegionDim::Ntsfun), 1);
        Ok(())
    }

    #[test]
    fn test_permissive_drops_overflow() -> DeckResult<()> {
        let text = "SWOF\n0 0 1 0\n1 1 0 0 /\n0 0 1 0\n1 1 0 0 /\n";
        let deck = Deck::parse(text)?;
        assert_eq!(deck.first("SWOF").unwrap().records().len(), 1, "Only NTSFUN=1 table should survive");
        Ok(())
    }

    #[test]
    fn test_strict_overflow() {
        let text = "SWOF\n0 0 1 0\n1 1 0 0 /\n0 0 1 0\n1 1 0 0 /\n";
        let err = Deck::parse_with(text, &ParseContext::strict_for(RegionDim::Ntsfun)).unwrap_err();
        if let DeckError::ExtraRecords { keyword, expected, found } = err {
            assert_eq!(keyword, "SWOF");
            assert_eq!(expected, 1);
            assert_eq!(found, 2);
        } else {
            assert!(false, "Wrong error type");
        }

        // Strictness on another count leaves SWOF alone
        assert!(Deck::parse_with(text, &ParseContext::strict_for(RegionDim::Ntpvt)).is_ok());
    }

    #[test]
    fn test_defaults_and_types() -> DeckResult<()> {
        let deck = Deck::parse("EQUIL\n 2000 200 2* 1950 /\n")?;
        let rec = &deck.first("EQUIL").unwrap().records()[0];
        assert_eq!(rec.item(0).unwrap().first(), Some(&DeckValue::Real(2000.0)));
        assert!(rec.item(2).unwrap().is_defaulted());
        assert!(rec.item(3).unwrap().is_defaulted());
        assert_eq!(rec.item(4).unwrap().first(), Some(&DeckValue::Real(1950.0)));
        assert!(rec.item(5).unwrap().values().is_empty(), "Unwritten items should be empty");
        Ok(())
    }

    #[test]
    fn test_invalid_value() {
        let err = Deck::parse("TABDIMS\n abc /\n").unwrap_err();
        if let DeckError::InvalidValue { keyword, item, token } = err {
            assert_eq!(keyword, "TABDIMS");
            assert_eq!(item, "NTSFUN");
            assert_eq!(token, "abc");
        } else {
            assert!(false, "Wrong error type");
        }
    }

    #[test]
    fn test_fortran_exponent() -> DeckResult<()> {
        let deck = Deck::parse("ROCK\n 1.0D+02 4.0d-5 /\n")?;
        let rec = &deck.first("ROCK").unwrap().records()[0];
        assert_eq!(rec.item(0).unwrap().first(), Some(&DeckValue::Real(100.0)));
        assert_eq!(rec.item(1).unwrap().first(), Some(&DeckValue::Real(4.0e-5)));
        Ok(())
    }

    #[test]
    fn test_unknown_keywords_kept() -> DeckResult<()> {
        let deck = Deck::parse("GRUPTREE\n 'A' 'FIELD' /\n/\nOIL\n")?;
        let kw = deck.first("GRUPTREE").unwrap();
        assert_eq!(kw.records().len(), 2);
        assert_eq!(kw.records()[0].item(0).unwrap().first(), Some(&DeckValue::Char("A".to_string())));
        assert!(deck.contains("OIL"));
        Ok(())
    }

    #[test]
    fn test_display_reparses() -> DeckResult<()> {
        let text = "EQLDIMS\n 2 /\nEQUIL\n 2000 200 1* 0 /\n 2100 210 /\nWCONPROD\n 'OP1' 'OPEN' 'ORAT' 100 /\n/\n";
        let deck = Deck::parse(text)?;
        let again = Deck::parse(&deck.to_string())?;
        assert_eq!(deck, again);
        Ok(())
    }
}
