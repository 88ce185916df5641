//! Turn one deck record into a name → value mapping.
use crate::deck::DeckRecord;
use crate::keyword_specs::{schema_for, DeckValue, ItemSize};
use crate::table_error::{TableError, TableResult};

/// The value of one item after defaults are applied
#[derive(Debug, Clone, PartialEq)]
pub enum ItemValue {
    /// Item absent with no declared default
    Null,
    Scalar(DeckValue),
    /// Items that take the rest of the record. Defaulted entries are `None`.
    List(Vec<Option<DeckValue>>),
}

impl ItemValue {
    pub fn as_scalar(&self) -> Option<&DeckValue> {
        if let ItemValue::Scalar(v) = self {
            Some(v)
        } else {
            None
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        self.as_scalar().and_then(|v| v.as_f64())
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_scalar().and_then(|v| v.as_i64())
    }

    /// The string held by a scalar, `None` for absent or blank strings.
    pub fn as_str(&self) -> Option<&str> {
        self.as_scalar()
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
    }

    /// List entries as floats, defaulted entries as NaN.
    pub fn to_reals(&self) -> Vec<f64> {
        match self {
            ItemValue::List(vals) => vals.iter()
                .map(|v| v.as_ref().and_then(|v| v.as_f64()).unwrap_or(f64::NAN))
                .collect(),
            ItemValue::Scalar(v) => vec![v.as_f64().unwrap_or(f64::NAN)],
            ItemValue::Null => vec![],
        }
    }
}

/// Items of one record in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordMap {
    entries: Vec<(&'static str, ItemValue)>,
}

impl RecordMap {
    pub fn get(&self, name: &str) -> Option<&ItemValue> {
        self.entries.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = &(&'static str, ItemValue)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Map the items of `record` to their declared names.
///
/// `record_index` picks the item list for keywords whose records differ in
/// shape (VFPPROD, VFPINJ); other keywords use the same list for every record.
/// Absent scalar items take the schema default, or [`ItemValue::Null`] when
/// there is none. List items are always returned as lists, possibly empty.
pub fn parse_record(record: &DeckRecord, keyword: &str, record_index: usize) -> TableResult<RecordMap> {
    let schema = schema_for(keyword)
        .ok_or_else(|| TableError::UnsupportedKeyword(keyword.to_owned()))?;

    let entries = schema.items(record_index)
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            let item = record.item(i);
            let value = match spec.size {
                ItemSize::All => ItemValue::List(item.map(|it| it.values().to_vec()).unwrap_or_default()),
                ItemSize::Single => match item.and_then(|it| it.first()) {
                    Some(v) => ItemValue::Scalar(v.clone()),
                    None => spec.default.value().map(ItemValue::Scalar).unwrap_or(ItemValue::Null),
                },
            };
            (spec.name, value)
        })
        .collect();

    Ok(RecordMap { entries })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deck::Deck;

    #[test]
    fn test_defaults_applied() -> TableResult<()> {
        let deck = Deck::parse("PVTW\n 250 1* 5e-5 /\n")?;
        let rec = parse_record(&deck.first("PVTW").unwrap().records()[0], "PVTW", 0)?;
        assert_eq!(rec.get("P_REF").and_then(|v| v.as_f64()), Some(250.0));
        assert_eq!(rec.get("WATER_VOL_FACTOR").and_then(|v| v.as_f64()), Some(1.0), "Defaulted item should take its default");
        assert_eq!(rec.get("WATER_COMPRESSIBILITY").and_then(|v| v.as_f64()), Some(5e-5));
        assert_eq!(rec.get("WATER_VISCOSITY").and_then(|v| v.as_f64()), Some(0.5), "Absent item should take its default");
        assert_eq!(rec.len(), 5);
        Ok(())
    }

    #[test]
    fn test_null_and_lists() -> TableResult<()> {
        let deck = Deck::parse("EQUIL\n 1* /\nSWOF\n 0 0 1* 0\n 1 1 0 0 /\n")?;
        let rec = parse_record(&deck.first("EQUIL").unwrap().records()[0], "EQUIL", 0)?;
        assert_eq!(rec.get("DATUM_PRESSURE"), Some(&ItemValue::Null));

        let rec = parse_record(&deck.first("SWOF").unwrap().records()[0], "SWOF", 0)?;
        let data = rec.get("DATA").unwrap().to_reals();
        assert_eq!(data.len(), 8);
        assert!(data[2].is_nan(), "Defaulted list entries become NaN");
        Ok(())
    }

    #[test]
    fn test_record_index_selects_items() -> TableResult<()> {
        let text = "VFPINJ\n 1 2000 WAT THP METRIC BHP /\n 100 200 /\n 10 20 /\n 1 150 160 /\n 2 170 180 /\n";
        let deck = Deck::parse(text)?;
        let kw = deck.first("VFPINJ").unwrap();
        let head = parse_record(&kw.records()[0], "VFPINJ", 0)?;
        assert_eq!(head.get("RATE_TYPE").and_then(|v| v.as_str()), Some("WAT"));
        let body = parse_record(&kw.records()[4], "VFPINJ", 4)?;
        assert_eq!(body.get("THP_INDEX").and_then(|v| v.as_i64()), Some(2));
        assert_eq!(body.get("VALUES").unwrap().to_reals(), vec![170.0, 180.0]);
        Ok(())
    }

    #[test]
    fn test_unsupported() {
        let rec = DeckRecord::default();
        let err = parse_record(&rec, "GRUPTREE", 0).unwrap_err();
        assert!(matches!(err, TableError::UnsupportedKeyword(k) if k == "GRUPTREE"));
    }
}
