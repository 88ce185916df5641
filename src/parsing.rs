//! Line tokenizer and keyword splitter for deck text.
//!
//! This is the lowest layer of deck reading: it knows nothing about which
//! keywords exist. It turns text into keyword blocks, each holding the raw
//! slash-terminated records that followed the keyword name.
use log::{debug, warn};
use pest::Parser;

use crate::deck_error::{DeckError, DeckResult};

#[derive(Parser)]
#[grammar = "deck.pest"]
pub(crate) struct DeckParser;

/// A single token as written in the deck. Quoted tokens are always strings,
/// bare ones are typed later by the item they land in.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawToken {
    pub(crate) text: String,
    pub(crate) quoted: bool,
}

impl RawToken {
    fn bare(text: &str) -> Self {
        Self { text: text.to_owned(), quoted: false }
    }

    fn quoted(text: &str) -> Self {
        Self { text: text.to_owned(), quoted: true }
    }
}

/// `None` entries are defaulted items (`1*`).
pub(crate) type RawRecord = Vec<Option<RawToken>>;

#[derive(Debug, Default)]
pub(crate) struct TokenLine {
    pub(crate) tokens: RawRecord,
    pub(crate) terminated: bool,
}

#[derive(Debug)]
pub(crate) struct RawKeyword {
    pub(crate) name: String,
    pub(crate) line: usize,
    pub(crate) records: Vec<RawRecord>,
    /// Tokens after the last slash that never got terminated.
    pub(crate) trailing: RawRecord,
}

impl RawKeyword {
    fn new(name: String, line: usize) -> Self {
        Self { name, line, records: vec![], trailing: vec![] }
    }
}

pub(crate) fn tokenize_line(text: &str, line_num: usize) -> DeckResult<TokenLine> {
    let mut out = TokenLine::default();
    let mut tree = DeckParser::parse(Rule::line, text)
        .map_err(|e| DeckError::from_pest(e, line_num))?;

    let line = match tree.next() {
        Some(line) => line,
        None => return Ok(out),
    };

    for pair in line.into_inner() {
        match pair.as_rule() {
            Rule::bare => out.tokens.push(Some(RawToken::bare(pair.as_str()))),
            Rule::quoted => out.tokens.push(Some(RawToken::quoted(inner_text(pair)))),
            Rule::repeat => {
                let mut inner = pair.into_inner();
                let count = inner.next()
                    .map(|p| p.as_str())
                    .unwrap_or("1");
                let count: usize = count.parse()
                    .map_err(|_| DeckError::Grammar { line: line_num, reason: format!("bad repeat count '{count}'") })?;
                let value = match inner.next() {
                    Some(p) if p.as_rule() == Rule::quoted => Some(RawToken::quoted(inner_text(p))),
                    Some(p) => Some(RawToken::bare(p.as_str())),
                    None => None,
                };
                out.tokens.extend(std::iter::repeat(value).take(count));
            },
            Rule::slash => {
                out.terminated = true;
            },
            _ => continue,
        }
    }

    Ok(out)
}

/// Return the text between the quotes of a `quoted` pair.
fn inner_text(pair: pest::iterators::Pair<'_, Rule>) -> &str {
    pair.into_inner()
        .next()
        .map(|p| p.as_str())
        .unwrap_or("")
}

/// Keywords are upper case identifiers of at most eight characters that sit
/// alone on their line.
pub(crate) fn is_keyword_token(token: &Option<RawToken>) -> bool {
    let tok = match token {
        Some(t) if !t.quoted => t,
        _ => return false,
    };

    let mut chars = tok.text.chars();
    let first_ok = chars.next().map(|c| c.is_ascii_uppercase()).unwrap_or(false);
    first_ok
        && tok.text.len() <= 8
        && chars.all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

/// Split deck text into keyword blocks.
///
/// Records may span several lines; a keyword name is only recognized when no
/// record is open. Text before the first keyword is ignored, and an `END`
/// keyword stops reading.
pub(crate) fn split_keywords(text: &str) -> DeckResult<Vec<RawKeyword>> {
    let mut blocks = vec![];
    let mut current: Option<RawKeyword> = None;
    let mut open: RawRecord = vec![];

    for (idx, raw_line) in text.lines().enumerate() {
        let line_num = idx + 1;
        let line = tokenize_line(raw_line, line_num)?;

        if open.is_empty() && !line.terminated && line.tokens.len() == 1 && is_keyword_token(&line.tokens[0]) {
            if let Some(mut kw) = current.take() {
                kw.trailing = std::mem::take(&mut open);
                blocks.push(kw);
            }
            let name = line.tokens[0].as_ref().map(|t| t.text.clone()).unwrap_or_default();
            if name == "END" {
                debug!("END keyword at line {line_num}, ignoring the rest of the deck");
                return Ok(blocks);
            }
            current = Some(RawKeyword::new(name, line_num));
            continue;
        }

        match current.as_mut() {
            Some(kw) => {
                open.extend(line.tokens);
                if line.terminated {
                    kw.records.push(std::mem::take(&mut open));
                }
            },
            None => {
                if !line.tokens.is_empty() || line.terminated {
                    warn!("Ignoring data on line {line_num} before the first keyword");
                }
            }
        }
    }

    if let Some(mut kw) = current.take() {
        kw.trailing = open;
        blocks.push(kw);
    }
    Ok(blocks)
}
