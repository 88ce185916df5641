//! Find region counts that a stand-alone include file leaves undeclared.
//!
//! An include file holding, say, three SWOF tables without a TABDIMS keyword
//! parses as one table under the default count. [`inject_region_count`] either
//! injects a count the caller knows, or probes counts 1, 2, .. until the text
//! parses without records overflowing the count.
use log::{debug, info, warn};

use crate::deck::{Deck, DeckKeyword, ParseContext, Source};
use crate::deck_error::DeckError;
use crate::keyword_specs::{schema_for, RecordLayout, RegionDim};
use crate::table_error::{TableError, TableResult};

/// Settings for the probing search
#[derive(Debug, Clone)]
pub struct InferSettings {
    max_probe: usize,
}

impl Default for InferSettings {
    fn default() -> Self {
        Self { max_probe: 1000 }
    }
}

impl InferSettings {
    /// Builder-style setter for the largest count tried before giving up.
    pub fn max_probe(mut self, max_probe: usize) -> Self {
        self.max_probe = max_probe.max(1);
        self
    }

    pub fn get_max_probe(&self) -> usize {
        self.max_probe
    }
}

/// Text declaring `count` for `dim`, with the items before it defaulted.
///
/// ```
/// # use resframe::inferdims::dimension_text;
/// # use resframe::keyword_specs::RegionDim;
/// assert_eq!(dimension_text(RegionDim::Ntpvt, 3), "TABDIMS\n 1* 3 /\n\n");
/// ```
pub fn dimension_text(dim: RegionDim, count: usize) -> String {
    format!("{}\n {}{count} /\n\n", dim.keyword(), "1* ".repeat(dim.position()))
}

/// Prepend a dimension declaration to deck text and parse it.
///
/// With `strict`, records overflowing the injected count are an error
/// rather than being dropped.
pub fn inject_dimcount(text: &str, dim: RegionDim, count: usize, strict: bool) -> Result<Deck, DeckError> {
    let injected = dimension_text(dim, count) + text;
    let ctx = if strict {
        ParseContext::strict_for(dim)
    } else {
        ParseContext::default()
    };
    Deck::parse_with(&injected, &ctx)
}

/// Smallest count for `dim` under which `text` parses without overflow.
pub fn guess_dim(text: &str, dim: RegionDim, settings: &InferSettings) -> TableResult<usize> {
    for count in 1..=settings.max_probe {
        match inject_dimcount(text, dim, count, true) {
            Ok(_) => {
                debug!("{dim}={count} parses cleanly");
                return Ok(count);
            },
            Err(DeckError::ExtraRecords { .. }) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(TableError::DimensionInference { keyword: dim.keyword(), max_probe: settings.max_probe })
}

/// Return a deck in which the region count for `dim` is declared.
///
/// - A deck that already declares the count is returned as parsed, even if
///   `explicit_count` disagrees.
/// - Otherwise an `explicit_count` is injected at the top of the text (a
///   parsed deck is rendered back to text first) and the result must parse
///   without overflow. A parsed deck already lost the records that overflowed
///   its own count, so keywords holding fewer tables than `explicit_count`
///   are warned about.
/// - Without an explicit count the source must be text, which is probed with
///   [`guess_dim`]. A parsed deck fails with [`TableError::AmbiguousDimension`].
pub fn inject_region_count(
    dim: RegionDim,
    source: Source,
    explicit_count: Option<usize>,
    settings: &InferSettings,
) -> TableResult<Deck> {
    match source {
        Source::Parsed(deck) => {
            if deck.contains(dim.keyword()) {
                warn_ignored(&deck, dim, explicit_count);
                return Ok(deck);
            }
            match explicit_count {
                Some(n) => {
                    let deck = inject_dimcount(&deck.to_string(), dim, n, true)?;
                    for (name, tables) in short_keywords(&deck, dim, n) {
                        warn!("{name} holds {tables} tables for {dim}={n}, records dropped when the deck was parsed are not recovered");
                    }
                    Ok(deck)
                },
                None => Err(TableError::AmbiguousDimension(dim.to_string())),
            }
        },
        Source::Text(text) => {
            let deck = Deck::parse(&text)?;
            if deck.contains(dim.keyword()) {
                warn_ignored(&deck, dim, explicit_count);
                return Ok(deck);
            }
            let count = match explicit_count {
                Some(n) => n,
                None => {
                    let n = guess_dim(&text, dim, settings)?;
                    info!("Inferred {dim}={n}");
                    n
                }
            };
            Ok(inject_dimcount(&text, dim, count, true)?)
        }
    }
}

fn table_count(kw: &DeckKeyword, layout: RecordLayout) -> usize {
    match layout {
        RecordLayout::RegionTables(_) => {
            let closed = kw.records().iter().filter(|r| r.is_empty()).count();
            let open = kw.records().last().is_some_and(|r| !r.is_empty());
            closed + usize::from(open)
        },
        _ => kw.records().len(),
    }
}

/// Keywords scoped by `dim` holding fewer than `count` tables, with their table counts.
pub fn short_keywords(deck: &Deck, dim: RegionDim, count: usize) -> Vec<(String, usize)> {
    deck.iter()
        .filter_map(|kw| {
            let layout = schema_for(kw.name())?.layout;
            (layout.region_dim() == Some(dim)).then(|| (kw.name().to_owned(), table_count(kw, layout)))
        })
        .filter(|(_, tables)| *tables < count)
        .collect()
}

fn warn_ignored(deck: &Deck, dim: RegionDim, explicit_count: Option<usize>) {
    if let Some(n) = explicit_count {
        let declared = deck.region_count(dim);
        if declared != n {
            warn!("Ignoring {dim}={n}, the deck declares {dim}={declared}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyword_specs::RegionDim::*;

    const TWO_SWOF: &str = "SWOF\n0 0 1 0\n1 1 0 0 /\n0 0 1 0\n0.5 0.5 0.5 0\n1 1 0 0 /\n";

    #[test]
    fn test_guess_minimal_count() -> TableResult<()> {
        let settings = InferSettings::default();
        assert_eq!(guess_dim(TWO_SWOF, Ntsfun, &settings)?, 2);
        assert_eq!(guess_dim(TWO_SWOF, Ntsfun, &settings)?, 2, "Probing should be deterministic");
        assert_eq!(guess_dim("SWOF\n0 0 1 0 /\n", Ntsfun, &settings)?, 1);
        Ok(())
    }

    #[test]
    fn test_probe_limit() {
        let settings = InferSettings::default().max_probe(1);
        let err = guess_dim(TWO_SWOF, Ntsfun, &settings).unwrap_err();
        assert!(matches!(err, TableError::DimensionInference { keyword: "TABDIMS", max_probe: 1 }));
    }

    #[test]
    fn test_inject_from_text() -> TableResult<()> {
        let deck = inject_region_count(Ntsfun, TWO_SWOF.into(), None, &InferSettings::default())?;
        assert_eq!(deck.region_count(Ntsfun), 2);
        assert_eq!(deck.first("SWOF").unwrap().records().len(), 2);
        Ok(())
    }

    #[test]
    fn test_explicit_count() -> TableResult<()> {
        let deck = inject_region_count(Ntsfun, TWO_SWOF.into(), Some(3), &InferSettings::default())?;
        assert_eq!(deck.region_count(Ntsfun), 3);

        let err = inject_region_count(Ntsfun, TWO_SWOF.into(), Some(1), &InferSettings::default()).unwrap_err();
        assert!(matches!(err, TableError::Deck(DeckError::ExtraRecords { .. })), "Too small a count should not parse");
        Ok(())
    }

    #[test]
    fn test_declared_count_wins() -> TableResult<()> {
        let text = format!("TABDIMS\n 1 /\n{TWO_SWOF}");
        let deck = inject_region_count(Ntsfun, text.into(), Some(2), &InferSettings::default())?;
        assert_eq!(deck.region_count(Ntsfun), 1);
        assert_eq!(deck.first("SWOF").unwrap().records().len(), 1);
        Ok(())
    }

    #[test]
    fn test_parsed_deck_needs_count() -> TableResult<()> {
        let parsed = Deck::parse(TWO_SWOF)?;
        let err = inject_region_count(Ntsfun, parsed.clone().into(), None, &InferSettings::default()).unwrap_err();
        assert!(matches!(err, TableError::AmbiguousDimension(_)));

        assert_eq!(parsed.first("SWOF").unwrap().records().len(), 1, "Parsing under the default count drops the second table");
        let deck = inject_region_count(Ntsfun, parsed.into(), Some(2), &InferSettings::default())?;
        assert_eq!(deck.region_count(Ntsfun), 2);
        assert_eq!(deck.first("SWOF").unwrap().records().len(), 1);
        assert_eq!(short_keywords(&deck, Ntsfun, 2), vec![("SWOF".to_string(), 1)]);

        let full = inject_region_count(Ntsfun, TWO_SWOF.into(), Some(2), &InferSettings::default())?;
        assert!(short_keywords(&full, Ntsfun, 2).is_empty());
        Ok(())
    }

    #[test]
    fn test_dimension_text() {
        assert_eq!(dimension_text(Ntequl, 2), "EQLDIMS\n 2 /\n\n");
        assert_eq!(dimension_text(Ntsfun, 4), "TABDIMS\n 4 /\n\n");
    }
}
