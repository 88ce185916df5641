//! Vocabularies of the VFPPROD and VFPINJ header items, and the unit labels
//! written next to each axis.
use std::fmt::Display;
use std::str::FromStr;

use crate::table_error::TableError;

macro_rules! deck_enum {
    ($(#[$meta:meta])* $name:ident, $column:literal { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            /// The word used for this value in deck text and table columns
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.pad(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = TableError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim() {
                    $($text => Ok($name::$variant),)+
                    other => Err(TableError::InvalidValue { column: $column.to_string(), value: other.to_string() }),
                }
            }
        }
    };
}

deck_enum!(
    /// Which lift curve keyword a table comes from
    VfpType, "VFP_TYPE" { Prod => "VFPPROD", Inj => "VFPINJ" }
);

deck_enum!(
    /// Flow rate quantity of a production table
    ProdRate, "RATE_TYPE" { Oil => "OIL", Liq => "LIQ", Gas => "GAS", Wg => "WG", Tm => "TM" }
);

deck_enum!(
    /// Flow rate quantity of an injection table
    InjRate, "RATE_TYPE" { Oil => "OIL", Wat => "WAT", Gas => "GAS", Wg => "WG", Tm => "TM" }
);

deck_enum!(
    /// Water fraction quantity
    Wfr, "WFR_TYPE" { Wor => "WOR", Wct => "WCT", Wgr => "WGR", Wwr => "WWR", Wtf => "WTF" }
);

deck_enum!(
    /// Gas fraction quantity
    Gfr, "GFR_TYPE" { Gor => "GOR", Glr => "GLR", Ogr => "OGR", Mmw => "MMW" }
);

deck_enum!(
    /// Artificial lift quantity. Tables without one use `Undefined`, written `''`.
    Alq, "ALQ_TYPE" {
        Grat => "GRAT",
        Iglr => "IGLR",
        Tglr => "TGLR",
        Pump => "PUMP",
        Comp => "COMP",
        Deno => "DENO",
        Deng => "DENG",
        Bean => "BEAN",
        Undefined => "''",
    }
);

deck_enum!(
    UnitType, "UNIT_TYPE" { Metric => "METRIC", Field => "FIELD", Lab => "LAB", PvtM => "PVT-M", Default => "DEFAULT" }
);

deck_enum!(
    ThpType, "THP_TYPE" { Thp => "THP" }
);

deck_enum!(
    /// What the body of a production table holds
    ProdTab, "TAB_TYPE" { Bhp => "BHP", Tht => "TEMP" }
);

deck_enum!(
    InjTab, "TAB_TYPE" { Bhp => "BHP" }
);

/// Parse an optional header item, falling back to `default` when it is blank.
pub fn parse_or<T: FromStr<Err = TableError>>(text: Option<&str>, default: T) -> Result<T, TableError> {
    match text.map(str::trim) {
        None | Some("") => Ok(default),
        Some(s) => s.parse(),
    }
}

impl ProdRate {
    pub fn unit(&self, units: UnitType) -> &'static str {
        use ProdRate::*;
        match (units, self) {
            (UnitType::Default, _) => "",
            (UnitType::Metric | UnitType::PvtM, Tm) => "kg-M/day",
            (UnitType::Metric | UnitType::PvtM, _) => "sm3/day",
            (UnitType::Field, Oil | Liq) => "stb/day",
            (UnitType::Field, Gas) => "Mscf/day",
            (UnitType::Field, Wg | Tm) => "lb-M/day",
            (UnitType::Lab, Tm) => "lb-M/day",
            (UnitType::Lab, _) => "scc/hr",
        }
    }
}

impl InjRate {
    pub fn unit(&self, units: UnitType) -> &'static str {
        use InjRate::*;
        match (units, self) {
            (UnitType::Default, _) => "",
            (UnitType::Metric | UnitType::PvtM, Tm) => "kg-M/day",
            (UnitType::Metric | UnitType::PvtM, _) => "sm3/day",
            (UnitType::Field, Oil | Wat) => "stb/day",
            (UnitType::Field, Gas | Wg) => "Mscf/day",
            (UnitType::Field, Tm) => "lb-M/day",
            (UnitType::Lab, Tm) => "gm-M/hr",
            (UnitType::Lab, _) => "scc/hr",
        }
    }
}

impl ThpType {
    /// Unit of tubing head pressure in a production table. Production tables
    /// without a unit system are labelled barsa.
    pub fn prod_unit(&self, units: UnitType) -> &'static str {
        match units {
            UnitType::Default | UnitType::Metric => "barsa",
            UnitType::Field => "psia",
            UnitType::Lab | UnitType::PvtM => "atma",
        }
    }

    pub fn inj_unit(&self, units: UnitType) -> &'static str {
        match units {
            UnitType::Default => "",
            UnitType::Metric => "barsa",
            UnitType::Field => "psia",
            UnitType::Lab | UnitType::PvtM => "atma",
        }
    }
}

impl Wfr {
    pub fn unit(&self, units: UnitType) -> &'static str {
        use Wfr::*;
        match (units, self) {
            (UnitType::Default, _) | (_, Wtf) => "",
            (UnitType::Metric | UnitType::PvtM, _) => "sm3/sm3",
            (UnitType::Field, Wor | Wct) => "stb/stb",
            (UnitType::Field, Wgr | Wwr) => "stb/Mscf",
            (UnitType::Lab, _) => "scc/scc",
        }
    }
}

impl Gfr {
    pub fn unit(&self, units: UnitType) -> &'static str {
        use Gfr::*;
        match (units, self) {
            (UnitType::Default, _) => "",
            (UnitType::Metric | UnitType::PvtM, Mmw) => "kg/kg-M",
            (UnitType::Metric | UnitType::PvtM, _) => "sm3/sm3",
            (UnitType::Field, Gor | Glr) => "Mscf/stb",
            (UnitType::Field, Ogr) => "stb/Mscf",
            (UnitType::Field | UnitType::Lab, Mmw) => "lb/lb-M",
            (UnitType::Lab, _) => "scc/scc",
        }
    }
}

impl Alq {
    pub fn unit(&self, units: UnitType) -> &'static str {
        use Alq::*;
        match (units, self) {
            (UnitType::Default, _) | (_, Undefined | Pump | Comp) => "",
            (UnitType::Metric | UnitType::PvtM, Grat) => "sm3/day",
            (UnitType::Metric | UnitType::PvtM, Iglr | Tglr) => "sm3/sm3",
            (UnitType::Metric | UnitType::PvtM, Deno | Deng) => "kg/m3",
            (UnitType::Metric | UnitType::PvtM | UnitType::Lab, Bean) => "mm",
            (UnitType::Field, Grat) => "Mscf/day",
            (UnitType::Field, Iglr | Tglr) => "Mscf/stb",
            (UnitType::Field, Deno | Deng) => "lb/ft3",
            (UnitType::Field, Bean) => "1/64",
            (UnitType::Lab, Grat) => "scc/hr",
            (UnitType::Lab, Iglr | Tglr) => "scc/scc",
            (UnitType::Lab, Deno | Deng) => "gm/cc",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_words() -> Result<(), TableError> {
        assert_eq!("VFPPROD".parse::<VfpType>()?, VfpType::Prod);
        assert_eq!("PVT-M".parse::<UnitType>()?, UnitType::PvtM);
        assert_eq!("TEMP".parse::<ProdTab>()?, ProdTab::Tht);
        assert_eq!(" WCT ".parse::<Wfr>()?, Wfr::Wct);
        assert!(matches!("XYZ".parse::<Gfr>(), Err(TableError::InvalidValue { .. })));
        Ok(())
    }

    #[test]
    fn test_defaults() -> Result<(), TableError> {
        assert_eq!(parse_or(None, Alq::Undefined)?, Alq::Undefined);
        assert_eq!(parse_or(Some(""), UnitType::Default)?, UnitType::Default);
        assert_eq!(parse_or(Some("''"), Alq::Grat)?, Alq::Undefined);
        assert_eq!(parse_or(Some("LIQ"), ProdRate::Gas)?, ProdRate::Liq);
        Ok(())
    }

    #[test]
    fn test_units() {
        assert_eq!(ProdRate::Gas.unit(UnitType::Field), "Mscf/day");
        assert_eq!(ProdRate::Tm.unit(UnitType::Metric), "kg-M/day");
        assert_eq!(ThpType::Thp.prod_unit(UnitType::Default), "barsa");
        assert_eq!(ThpType::Thp.inj_unit(UnitType::Default), "");
        assert_eq!(ThpType::Thp.prod_unit(UnitType::PvtM), "atma");
        assert_eq!(Wfr::Wgr.unit(UnitType::Field), "stb/Mscf");
        assert_eq!(Gfr::Mmw.unit(UnitType::Lab), "lb/lb-M");
        assert_eq!(Alq::Bean.unit(UnitType::Field), "1/64");
        assert_eq!(Alq::Undefined.unit(UnitType::Metric), "");
        assert_eq!(InjRate::Tm.unit(UnitType::Lab), "gm-M/hr");
    }
}
