//! Static item schemas for the supported deck keywords.
//!
//! Every keyword the crate understands has a [`KeywordSchema`] describing how
//! its records are laid out and what items each record holds. The schemas are
//! plain `static` data; nothing here is mutated after compilation.
//!
//! ```
//! # use resframe::keyword_specs::schema_for;
//! let swof = schema_for("SWOF").unwrap();
//! assert_eq!(swof.items(0)[0].name, "DATA");
//! ```
use std::fmt::Display;

/// A typed value held by a deck item.
#[derive(Debug, Clone, PartialEq)]
pub enum DeckValue {
    Char(String),
    Integer(i64),
    Real(f64),
}

impl Display for DeckValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeckValue::Char(s) => write!(f, "{s}"),
            DeckValue::Integer(i) => write!(f, "{i}"),
            DeckValue::Real(v) => write!(f, "{v}"),
        }
    }
}

impl DeckValue {
    /// Numeric view of the value; strings are parsed if possible.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            DeckValue::Integer(i) => Some(*i as f64),
            DeckValue::Real(v) => Some(*v),
            DeckValue::Char(s) => s.trim().parse().ok(),
        }
    }

    /// Integer view of the value. Reals convert only when they hold a whole number.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DeckValue::Integer(i) => Some(*i),
            DeckValue::Real(v) if v.fract() == 0.0 && v.is_finite() => Some(*v as i64),
            DeckValue::Real(_) => None,
            DeckValue::Char(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        if let DeckValue::Char(s) = self {
            Some(s)
        } else {
            None
        }
    }
}

impl From<DeckValue> for polars::datatypes::AnyValue<'_> {
    fn from(value: DeckValue) -> Self {
        match value {
            DeckValue::Char(s) => polars::datatypes::AnyValue::Utf8Owned(s.into()),
            DeckValue::Integer(i) => polars::datatypes::AnyValue::Int64(i),
            DeckValue::Real(f) => polars::datatypes::AnyValue::Float64(f),
        }
    }
}

/// The type a deck item's tokens are converted to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Char,
    Integer,
    Double,
}

/// Whether an item takes one token or every remaining token of its record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemSize {
    Single,
    All,
}

/// Value substituted when a single item is absent or written as `1*`
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ItemDefault {
    None,
    Char(&'static str),
    Integer(i64),
    Real(f64),
}

impl ItemDefault {
    pub fn value(&self) -> Option<DeckValue> {
        match self {
            ItemDefault::None => None,
            ItemDefault::Char(s) => Some(DeckValue::Char(s.to_string())),
            ItemDefault::Integer(i) => Some(DeckValue::Integer(*i)),
            ItemDefault::Real(v) => Some(DeckValue::Real(*v)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ItemSpec {
    pub name: &'static str,
    pub kind: ItemKind,
    pub size: ItemSize,
    pub default: ItemDefault,
}

impl ItemSpec {
    pub const fn string(name: &'static str) -> Self {
        Self { name, kind: ItemKind::Char, size: ItemSize::Single, default: ItemDefault::None }
    }

    pub const fn int(name: &'static str) -> Self {
        Self { name, kind: ItemKind::Integer, size: ItemSize::Single, default: ItemDefault::None }
    }

    pub const fn double(name: &'static str) -> Self {
        Self { name, kind: ItemKind::Double, size: ItemSize::Single, default: ItemDefault::None }
    }

    /// A floating point item consuming the rest of the record
    pub const fn list(name: &'static str) -> Self {
        Self { name, kind: ItemKind::Double, size: ItemSize::All, default: ItemDefault::None }
    }

    pub const fn or_str(self, s: &'static str) -> Self {
        Self { default: ItemDefault::Char(s), ..self }
    }

    pub const fn or_int(self, i: i64) -> Self {
        Self { default: ItemDefault::Integer(i), ..self }
    }

    pub const fn or_real(self, v: f64) -> Self {
        Self { default: ItemDefault::Real(v), ..self }
    }
}

/// The region count keywords that size other keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionDim {
    /// Saturation function tables, TABDIMS item 1
    Ntsfun,
    /// PVT tables, TABDIMS item 2
    Ntpvt,
    /// Equilibration regions, EQLDIMS item 1
    Ntequl,
}

impl Display for RegionDim {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RegionDim::Ntsfun => "NTSFUN",
            RegionDim::Ntpvt => "NTPVT",
            RegionDim::Ntequl => "NTEQUL",
        };
        write!(f, "{s}")
    }
}

impl RegionDim {
    /// Keyword declaring this count
    pub fn keyword(&self) -> &'static str {
        match self {
            RegionDim::Ntsfun | RegionDim::Ntpvt => "TABDIMS",
            RegionDim::Ntequl => "EQLDIMS",
        }
    }

    /// Zero-based position of the count in the declaring keyword's record
    pub fn position(&self) -> usize {
        match self {
            RegionDim::Ntsfun => 0,
            RegionDim::Ntpvt => 1,
            RegionDim::Ntequl => 0,
        }
    }
}

/// How the records of a keyword are delimited
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLayout {
    /// No records at all, the keyword is a flag
    Empty,
    /// A fixed number of records
    Fixed(usize),
    /// One record per region
    Regions(RegionDim),
    /// One table per region, each table closed by an empty record
    RegionTables(RegionDim),
    /// Records until an empty record
    Terminated,
    /// Every record until the next keyword
    Open,
}

impl RecordLayout {
    pub fn region_dim(&self) -> Option<RegionDim> {
        match self {
            RecordLayout::Regions(d) | RecordLayout::RegionTables(d) => Some(*d),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct KeywordSchema {
    pub name: &'static str,
    pub layout: RecordLayout,
    /// Item lists by record index. Records past the end reuse the last list.
    pub records: &'static [&'static [ItemSpec]],
}

impl KeywordSchema {
    const fn new(name: &'static str, layout: RecordLayout, records: &'static [&'static [ItemSpec]]) -> Self {
        Self { name, layout, records }
    }

    pub fn items(&self, record_index: usize) -> &'static [ItemSpec] {
        self.records.get(record_index)
            .or_else(|| self.records.last())
            .copied()
            .unwrap_or(&[])
    }
}

const DATA: &[ItemSpec] = &[ItemSpec::list("DATA")];

const TABDIMS: &[ItemSpec] = &[
    ItemSpec::int("NTSFUN").or_int(1),
    ItemSpec::int("NTPVT").or_int(1),
    ItemSpec::int("NSSFUN").or_int(20),
    ItemSpec::int("NPPVT").or_int(20),
    ItemSpec::int("NTFIP").or_int(1),
    ItemSpec::int("NRPVT").or_int(20),
];

const EQLDIMS: &[ItemSpec] = &[
    ItemSpec::int("NTEQUL").or_int(1),
    ItemSpec::int("DEPTH_NODES_P").or_int(100),
    ItemSpec::int("DEPTH_NODES_TAB").or_int(20),
    ItemSpec::int("NTTRVD").or_int(1),
    ItemSpec::int("NSTRVD").or_int(20),
];

const EQUIL: &[ItemSpec] = &[
    ItemSpec::double("DATUM_DEPTH").or_real(0.0),
    ItemSpec::double("DATUM_PRESSURE"),
    ItemSpec::double("OWC").or_real(0.0),
    ItemSpec::double("PC_OWC").or_real(0.0),
    ItemSpec::double("GOC").or_real(0.0),
    ItemSpec::double("PC_GOC").or_real(0.0),
    ItemSpec::int("BLACK_OIL_INIT").or_int(0),
    ItemSpec::int("BLACK_OIL_INIT_WG").or_int(0),
    ItemSpec::int("OIP_INIT").or_int(-5),
];

const PVTO: &[ItemSpec] = &[ItemSpec::double("RS"), ItemSpec::list("DATA")];
const PVTG: &[ItemSpec] = &[ItemSpec::double("GAS_PRESSURE"), ItemSpec::list("DATA")];

const PVTW: &[ItemSpec] = &[
    ItemSpec::double("P_REF"),
    ItemSpec::double("WATER_VOL_FACTOR").or_real(1.0),
    ItemSpec::double("WATER_COMPRESSIBILITY").or_real(4e-5),
    ItemSpec::double("WATER_VISCOSITY").or_real(0.5),
    ItemSpec::double("WATER_VISCOSIBILITY").or_real(0.0),
];

const DENSITY: &[ItemSpec] = &[
    ItemSpec::double("OIL").or_real(600.0),
    ItemSpec::double("WATER").or_real(999.014),
    ItemSpec::double("GAS").or_real(1.0),
];

const ROCK: &[ItemSpec] = &[
    ItemSpec::double("PREF").or_real(1.0132),
    ItemSpec::double("COMPRESSIBILITY").or_real(0.0),
];

const DATE_RECORD: &[ItemSpec] = &[
    ItemSpec::int("DAY").or_int(1),
    ItemSpec::string("MONTH").or_str("JAN"),
    ItemSpec::int("YEAR").or_int(1983),
    ItemSpec::string("TIME").or_str("00:00:00"),
];

const TSTEP: &[ItemSpec] = &[ItemSpec::list("STEP_LIST")];

const WCONPROD: &[ItemSpec] = &[
    ItemSpec::string("WELL"),
    ItemSpec::string("STATUS").or_str("OPEN"),
    ItemSpec::string("CMODE"),
    ItemSpec::double("ORAT"),
    ItemSpec::double("WRAT"),
    ItemSpec::double("GRAT"),
    ItemSpec::double("LRAT"),
    ItemSpec::double("RESV"),
    ItemSpec::double("BHP"),
    ItemSpec::double("THP"),
    ItemSpec::int("VFP_TABLE").or_int(0),
    ItemSpec::double("ALQ").or_real(0.0),
];

const WCONHIST: &[ItemSpec] = &[
    ItemSpec::string("WELL"),
    ItemSpec::string("STATUS").or_str("OPEN"),
    ItemSpec::string("CMODE"),
    ItemSpec::double("ORAT").or_real(0.0),
    ItemSpec::double("WRAT").or_real(0.0),
    ItemSpec::double("GRAT").or_real(0.0),
    ItemSpec::int("VFP_TABLE").or_int(0),
    ItemSpec::double("ALQ").or_real(0.0),
    ItemSpec::double("THP").or_real(0.0),
    ItemSpec::double("BHP").or_real(0.0),
    ItemSpec::double("NGLRAT").or_real(0.0),
];

const WCONINJE: &[ItemSpec] = &[
    ItemSpec::string("WELL"),
    ItemSpec::string("TYPE"),
    ItemSpec::string("STATUS").or_str("OPEN"),
    ItemSpec::string("CMODE"),
    ItemSpec::double("RATE"),
    ItemSpec::double("RESV"),
    ItemSpec::double("BHP").or_real(6891.2),
    ItemSpec::double("THP"),
    ItemSpec::int("VFP_TABLE").or_int(0),
];

const WCONINJH: &[ItemSpec] = &[
    ItemSpec::string("WELL"),
    ItemSpec::string("TYPE"),
    ItemSpec::string("STATUS").or_str("OPEN"),
    ItemSpec::double("RATE"),
    ItemSpec::double("BHP"),
    ItemSpec::double("THP"),
    ItemSpec::int("VFP_TABLE").or_int(0),
    ItemSpec::string("CMODE").or_str("RATE"),
];

const VFPPROD: &[&[ItemSpec]] = &[
    &[
        ItemSpec::int("TABLE"),
        ItemSpec::double("DATUM_DEPTH"),
        ItemSpec::string("RATE_TYPE"),
        ItemSpec::string("WFR"),
        ItemSpec::string("GFR"),
        ItemSpec::string("PRESSURE_DEF"),
        ItemSpec::string("ALQ_DEF"),
        ItemSpec::string("UNITS"),
        ItemSpec::string("BODY_DEF"),
    ],
    &[ItemSpec::list("FLOW_VALUES")],
    &[ItemSpec::list("THP_VALUES")],
    &[ItemSpec::list("WFR_VALUES")],
    &[ItemSpec::list("GFR_VALUES")],
    &[ItemSpec::list("ALQ_VALUES")],
    &[
        ItemSpec::int("THP_INDEX"),
        ItemSpec::int("WFR_INDEX"),
        ItemSpec::int("GFR_INDEX"),
        ItemSpec::int("ALQ_INDEX"),
        ItemSpec::list("VALUES"),
    ],
];

const VFPINJ: &[&[ItemSpec]] = &[
    &[
        ItemSpec::int("TABLE"),
        ItemSpec::double("DATUM_DEPTH"),
        ItemSpec::string("RATE_TYPE"),
        ItemSpec::string("PRESSURE_DEF"),
        ItemSpec::string("UNITS"),
        ItemSpec::string("BODY_DEF"),
    ],
    &[ItemSpec::list("FLOW_VALUES")],
    &[ItemSpec::list("THP_VALUES")],
    &[ItemSpec::int("THP_INDEX"), ItemSpec::list("VALUES")],
];

use RecordLayout::*;
use RegionDim::*;

static SCHEMAS: &[KeywordSchema] = &[
    KeywordSchema::new("TABDIMS", Fixed(1), &[TABDIMS]),
    KeywordSchema::new("EQLDIMS", Fixed(1), &[EQLDIMS]),
    KeywordSchema::new("RUNSPEC", Empty, &[]),
    KeywordSchema::new("GRID", Empty, &[]),
    KeywordSchema::new("EDIT", Empty, &[]),
    KeywordSchema::new("PROPS", Empty, &[]),
    KeywordSchema::new("REGIONS", Empty, &[]),
    KeywordSchema::new("SOLUTION", Empty, &[]),
    KeywordSchema::new("SUMMARY", Empty, &[]),
    KeywordSchema::new("SCHEDULE", Empty, &[]),
    KeywordSchema::new("OIL", Empty, &[]),
    KeywordSchema::new("WATER", Empty, &[]),
    KeywordSchema::new("GAS", Empty, &[]),
    KeywordSchema::new("DISGAS", Empty, &[]),
    KeywordSchema::new("VAPOIL", Empty, &[]),
    KeywordSchema::new("METRIC", Empty, &[]),
    KeywordSchema::new("FIELD", Empty, &[]),
    KeywordSchema::new("LAB", Empty, &[]),
    KeywordSchema::new("EQUIL", Regions(Ntequl), &[EQUIL]),
    KeywordSchema::new("RSVD", Regions(Ntequl), &[DATA]),
    KeywordSchema::new("RVVD", Regions(Ntequl), &[DATA]),
    KeywordSchema::new("PBVD", Regions(Ntequl), &[DATA]),
    KeywordSchema::new("PDVD", Regions(Ntequl), &[DATA]),
    KeywordSchema::new("PVTO", RegionTables(Ntpvt), &[PVTO]),
    KeywordSchema::new("PVTG", RegionTables(Ntpvt), &[PVTG]),
    KeywordSchema::new("PVDO", Regions(Ntpvt), &[DATA]),
    KeywordSchema::new("PVDG", Regions(Ntpvt), &[DATA]),
    KeywordSchema::new("PVTW", Regions(Ntpvt), &[PVTW]),
    KeywordSchema::new("DENSITY", Regions(Ntpvt), &[DENSITY]),
    KeywordSchema::new("ROCK", Regions(Ntpvt), &[ROCK]),
    KeywordSchema::new("SWOF", Regions(Ntsfun), &[DATA]),
    KeywordSchema::new("SGOF", Regions(Ntsfun), &[DATA]),
    KeywordSchema::new("SWFN", Regions(Ntsfun), &[DATA]),
    KeywordSchema::new("SGWFN", Regions(Ntsfun), &[DATA]),
    KeywordSchema::new("SOF2", Regions(Ntsfun), &[DATA]),
    KeywordSchema::new("SGFN", Regions(Ntsfun), &[DATA]),
    KeywordSchema::new("SOF3", Regions(Ntsfun), &[DATA]),
    KeywordSchema::new("SLGOF", Regions(Ntsfun), &[DATA]),
    KeywordSchema::new("START", Fixed(1), &[DATE_RECORD]),
    KeywordSchema::new("DATES", Terminated, &[DATE_RECORD]),
    KeywordSchema::new("TSTEP", Fixed(1), &[TSTEP]),
    KeywordSchema::new("WCONPROD", Terminated, &[WCONPROD]),
    KeywordSchema::new("WCONHIST", Terminated, &[WCONHIST]),
    KeywordSchema::new("WCONINJE", Terminated, &[WCONINJE]),
    KeywordSchema::new("WCONINJH", Terminated, &[WCONINJH]),
    KeywordSchema::new("VFPPROD", Open, VFPPROD),
    KeywordSchema::new("VFPINJ", Open, VFPINJ),
];

/// Look up the schema registered for `name`.
pub fn schema_for(name: &str) -> Option<&'static KeywordSchema> {
    SCHEMAS.iter().find(|s| s.name == name)
}

/// Every keyword with a registered schema, in registry order.
pub fn supported_keywords() -> impl Iterator<Item = &'static str> {
    SCHEMAS.iter().map(|s| s.name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_lookup() {
        let equil = schema_for("EQUIL").unwrap();
        assert_eq!(equil.layout, RecordLayout::Regions(RegionDim::Ntequl));
        assert_eq!(equil.items(0)[2].name, "OWC");
        assert_eq!(equil.items(0)[3].default, ItemDefault::Real(0.0));
        assert!(schema_for("NOTAKEYWORD").is_none());
    }

    #[test]
    fn test_record_lists_reuse_last() {
        let vfp = schema_for("VFPINJ").unwrap();
        assert_eq!(vfp.items(1)[0].name, "FLOW_VALUES");
        assert_eq!(vfp.items(3)[0].name, "THP_INDEX");
        assert_eq!(vfp.items(40)[0].name, "THP_INDEX", "Body records should share the last item list");
    }

    #[test]
    fn test_value_views() {
        assert_eq!(DeckValue::Real(3.0).as_i64(), Some(3));
        assert_eq!(DeckValue::Real(3.5).as_i64(), None);
        assert_eq!(DeckValue::Char("12".to_string()).as_f64(), Some(12.0));
        assert_eq!(DeckValue::Integer(2).to_string(), "2");
    }

    #[test]
    fn test_registry_names_unique() {
        let names: Vec<_> = supported_keywords().collect();
        let mut deduped = names.clone();
        deduped.sort();
        deduped.dedup();
        assert_eq!(names.len(), deduped.len());
    }
}
