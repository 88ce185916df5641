//! Well control keywords stamped with the date they take effect.
//!
//! WCONHIST, WCONINJE, WCONINJH and WCONPROD records carry no date of their
//! own; the date comes from the START, DATES and TSTEP keywords before them.
//! The deck is scanned once, front to back, through a [`DateContext`].
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, error, info};
use polars::prelude::DataFrame;

use crate::dataframes::Rows;
use crate::deck::{Deck, DeckKeyword, DeckRecord, Source};
use crate::keyword_specs::DeckValue;
use crate::records::{parse_record, ItemValue};
use crate::table_error::{TableError, TableResult};

pub const WCON_KEYWORDS: [&str; 4] = ["WCONHIST", "WCONINJE", "WCONINJH", "WCONPROD"];

/// The date in effect at some point of the scan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DateContext {
    #[default]
    NoDate,
    Dated(NaiveDateTime),
}

impl DateContext {
    pub fn date(&self) -> Option<NaiveDate> {
        match self {
            DateContext::NoDate => None,
            DateContext::Dated(dt) => Some(dt.date()),
        }
    }

    /// Move to an explicit date (START or DATES)
    pub fn set(self, date: NaiveDate) -> Self {
        DateContext::Dated(NaiveDateTime::new(date, NaiveTime::default()))
    }

    /// Advance by a number of days, possibly fractional (TSTEP). A step
    /// that leaves the calendar range is an invalid value.
    pub fn advance(self, days: f64) -> TableResult<Self> {
        match self {
            DateContext::NoDate => Err(TableError::MissingStartDate { keyword: "TSTEP".to_string() }),
            DateContext::Dated(dt) => {
                let invalid = || TableError::InvalidValue { column: "TSTEP".to_string(), value: days.to_string() };
                let millis = (days * 86_400_000.0).round();
                if !millis.is_finite() || millis.abs() >= i64::MAX as f64 {
                    return Err(invalid());
                }
                dt.checked_add_signed(Duration::milliseconds(millis as i64))
                    .map(DateContext::Dated)
                    .ok_or_else(invalid)
            }
        }
    }

    /// Date for a record of `keyword`, an error before any date is set.
    pub fn stamp(&self, keyword: &str) -> TableResult<NaiveDate> {
        self.date().ok_or_else(|| TableError::MissingStartDate { keyword: keyword.to_owned() })
    }
}

/// Month number from a deck month name. JLY is accepted for July.
pub fn parse_month(name: &str) -> Option<u32> {
    let month = match name.trim().to_uppercase().as_str() {
        "JAN" => 1,
        "FEB" => 2,
        "MAR" => 3,
        "APR" => 4,
        "MAY" => 5,
        "JUN" => 6,
        "JUL" | "JLY" => 7,
        "AUG" => 8,
        "SEP" => 9,
        "OCT" => 10,
        "NOV" => 11,
        "DEC" => 12,
        _ => return None,
    };
    Some(month)
}

/// Date held by a START or DATES record.
pub fn parse_date_record(record: &DeckRecord, keyword: &str) -> TableResult<NaiveDate> {
    let map = parse_record(record, keyword, 0)?;
    let day = map.get("DAY").and_then(|v| v.as_i64()).unwrap_or(1);
    let month_name = map.get("MONTH").and_then(|v| v.as_str()).unwrap_or("JAN");
    let year = map.get("YEAR").and_then(|v| v.as_i64()).unwrap_or(1983);

    let month = parse_month(month_name)
        .ok_or_else(|| TableError::InvalidValue { column: "MONTH".to_string(), value: month_name.to_owned() })?;
    NaiveDate::from_ymd_opt(year as i32, month, day as u32)
        .ok_or_else(|| TableError::InvalidValue { column: "DATE".to_string(), value: format!("{day} {month_name} {year}") })
}

/// Rows gathered by a scan, and the error that ended it early, if any.
#[derive(Debug)]
pub struct WconScan {
    pub rows: Rows,
    pub stopped_by: Option<TableError>,
}

/// Scan the deck, stopping at the first keyword that cannot be dated.
pub fn scan(deck: &Deck) -> WconScan {
    let mut rows = Rows::new();
    let mut context = DateContext::default();
    for kw in deck.iter() {
        match next_context(context, kw, &mut rows) {
            Ok(c) => context = c,
            Err(e) => return WconScan { rows, stopped_by: Some(e) },
        }
    }
    WconScan { rows, stopped_by: None }
}

fn next_context(context: DateContext, kw: &DeckKeyword, rows: &mut Rows) -> TableResult<DateContext> {
    match kw.name() {
        "START" | "DATES" => match kw.records().last() {
            Some(rec) => {
                let date = parse_date_record(rec, kw.name())?;
                debug!("{} sets the date to {date}", kw.name());
                Ok(context.set(date))
            },
            None => Ok(context),
        },
        "TSTEP" => {
            let steps: Vec<f64> = kw.records()
                .iter()
                .map(|rec| parse_record(rec, "TSTEP", 0))
                .collect::<TableResult<Vec<_>>>()?
                .iter()
                .filter_map(|map| map.get("STEP_LIST").map(|v| v.to_reals()))
                .flatten()
                .collect();
            // a defaulted step has no length
            if let Some(step) = steps.iter().find(|d| !d.is_finite()) {
                let value = if step.is_nan() { "1*".to_string() } else { step.to_string() };
                return Err(TableError::InvalidValue { column: "TSTEP".to_string(), value });
            }
            context.advance(steps.iter().sum())
        },
        name if WCON_KEYWORDS.contains(&name) => {
            for rec in kw.records() {
                let date = context.stamp(name)?;
                rows.push_row(wcon_row(rec, name, date)?);
            }
            Ok(context)
        },
        _ => Ok(context),
    }
}

fn wcon_row(record: &DeckRecord, keyword: &str, date: NaiveDate) -> TableResult<Vec<(String, Option<DeckValue>)>> {
    let map = parse_record(record, keyword, 0)?;
    let mut row: Vec<(String, Option<DeckValue>)> = map.iter()
        .filter_map(|(name, value)| match value {
            ItemValue::Null => Some((name.to_string(), None)),
            ItemValue::Scalar(v) => Some((name.to_string(), Some(v.clone()))),
            ItemValue::List(_) => None,
        })
        .collect();
    row.push(("DATE".to_string(), Some(DeckValue::Char(date.format("%Y-%m-%d").to_string()))));
    row.push(("KEYWORD".to_string(), Some(DeckValue::Char(keyword.to_owned()))));
    Ok(row)
}

/// Dated well control rows. A scan stopped early is logged as an error and
/// the rows gathered up to that point are returned.
pub fn rows(deck: &Deck) -> Rows {
    let WconScan { rows, stopped_by } = scan(deck);
    if let Some(e) = stopped_by {
        error!("Well control scan stopped: {e}");
    }
    info!("Extracted {} well control records", rows.len());
    rows
}

pub fn table(source: impl Into<Source>) -> TableResult<DataFrame> {
    let deck = source.into().into_deck()?;
    Ok(rows(&deck).into_dataframe()?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tstep_advances_date() -> TableResult<()> {
        let deck = Deck::parse("START\n 1 'JAN' 2020 /\nSCHEDULE\nTSTEP\n 5 /\nWCONPROD\n 'OP1' 'OPEN' 'ORAT' 100 /\n/\n")?;
        let scan = scan(&deck);
        assert!(scan.stopped_by.is_none());
        assert_eq!(scan.rows.len(), 1);
        assert_eq!(scan.rows.text(0, "DATE").as_deref(), Some("2020-01-06"));
        assert_eq!(scan.rows.text(0, "WELL").as_deref(), Some("OP1"));
        assert_eq!(scan.rows.real(0, "ORAT"), Some(100.0));
        assert_eq!(scan.rows.text(0, "KEYWORD").as_deref(), Some("WCONPROD"));
        Ok(())
    }

    #[test]
    fn test_record_before_date() -> TableResult<()> {
        let deck = Deck::parse("WCONPROD\n 'OP1' 'OPEN' 'ORAT' 100 /\n/\nSTART\n 1 'JAN' 2020 /\n")?;
        let scan = scan(&deck);
        assert!(scan.rows.is_empty());
        assert!(matches!(scan.stopped_by, Some(TableError::MissingStartDate { ref keyword }) if keyword == "WCONPROD"));
        assert!(rows(&deck).is_empty(), "Logged, not raised");
        Ok(())
    }

    #[test]
    fn test_dates_and_steps() -> TableResult<()> {
        let text = "
DATES
 1 JLY 2021 /
/
WCONINJE
 'INJ1' 'WATER' 'OPEN' 'RATE' 5000 /
/
TSTEP
 0.5 0.5 /
WCONHIST
 'OP1' 'OPEN' 'ORAT' 200 /
 'OP2' 'SHUT' 'ORAT' 0 /
/
";
        let rows = rows(&Deck::parse(text)?);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.text(0, "DATE").as_deref(), Some("2021-07-01"));
        assert_eq!(rows.text(0, "TYPE").as_deref(), Some("WATER"));
        assert_eq!(rows.text(2, "DATE").as_deref(), Some("2021-07-02"), "Fractional steps add up");
        assert_eq!(rows.text(2, "STATUS").as_deref(), Some("SHUT"));
        assert_eq!(rows.real(1, "BHP"), Some(0.0), "Defaulted WCONHIST items take their default");
        Ok(())
    }

    #[test]
    fn test_dates_takes_last_record() -> TableResult<()> {
        let deck = Deck::parse("DATES\n 1 FEB 2020 /\n 15 MAR 2020 /\n/\nWCONPROD\n 'OP1' /\n/\n")?;
        let rows = rows(&deck);
        assert_eq!(rows.text(0, "DATE").as_deref(), Some("2020-03-15"));
        assert_eq!(rows.text(0, "STATUS").as_deref(), Some("OPEN"));
        assert_eq!(rows.cell(0, "CMODE"), None);
        Ok(())
    }

    #[test]
    fn test_partial_result() -> TableResult<()> {
        let deck = Deck::parse("START\n 1 JAN 2020 /\nWCONPROD\n 'OP1' /\n/\nDATES\n 1 FOO 2020 /\n/\nWCONPROD\n 'OP2' /\n/\n")?;
        let scan = scan(&deck);
        assert_eq!(scan.rows.len(), 1, "Rows before the bad date are kept");
        assert!(matches!(scan.stopped_by, Some(TableError::InvalidValue { .. })));
        Ok(())
    }

    #[test]
    fn test_months() {
        assert_eq!(parse_month("jly"), Some(7));
        assert_eq!(parse_month("JUL"), Some(7));
        assert_eq!(parse_month("DEC"), Some(12));
        assert_eq!(parse_month("XYZ"), None);
    }

    #[test]
    fn test_tstep_out_of_range() -> TableResult<()> {
        for step in ["1e12", "1e9", "-1e9"] {
            let text = format!("START\n 1 'JAN' 2020 /\nTSTEP\n {step} /\nWCONPROD\n 'OP1' 'OPEN' 'ORAT' 100 /\n/\n");
            let scan = scan(&Deck::parse(&text)?);
            assert!(scan.rows.is_empty());
            assert!(
                matches!(scan.stopped_by, Some(TableError::InvalidValue { ref column, .. }) if column == "TSTEP"),
                "TSTEP {step} should stop the scan"
            );
        }
        assert_eq!(table("START\n 1 'JAN' 2020 /\nTSTEP\n 1e12 /\n")?.height(), 0);
        Ok(())
    }

    #[test]
    fn test_defaulted_tstep() -> TableResult<()> {
        let deck = Deck::parse("START\n 1 'JAN' 2020 /\nTSTEP\n 5 1* /\nWCONPROD\n 'OP1' 'OPEN' 'ORAT' 100 /\n/\n")?;
        let scan = scan(&deck);
        assert!(scan.rows.is_empty(), "No record is stamped with a date from a defaulted step");
        assert!(matches!(scan.stopped_by, Some(TableError::InvalidValue { ref value, .. }) if value == "1*"));
        Ok(())
    }

    #[test]
    fn test_tstep_without_date() {
        assert!(matches!(DateContext::NoDate.advance(1.0), Err(TableError::MissingStartDate { .. })));
    }
}
