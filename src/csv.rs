//! CSV interchange.
//!
//! Tables go to CSV through polars' writer and come back through its reader,
//! so a table written by one tool can be turned into deck text by another:
//!
//! ```
//! # use resframe::csv::csv_to_deck;
//! # use resframe::writer::WriteSettings;
//! let csv = "KEYWORD,SATNUM,SW,KRW,KROW,PCOW\nSWOF,1,0.1,0.0,1.0,0.0\nSWOF,1,1.0,1.0,0.0,0.0\n";
//! let deck = csv_to_deck(csv.as_bytes(), "satfunc", None, &WriteSettings::default()).unwrap();
//! assert!(deck.contains("SWOF"));
//! ```
use std::fs::File;
use std::io::{Cursor, Read, Write};
use std::path::Path;

use log::info;
use polars::prelude::{CsvReader, CsvWriter, DataFrame, SerReader, SerWriter};

use crate::table_error::{TableError, TableResult};
use crate::writer::WriteSettings;
use crate::{equil, pvt, satfunc, vfp};

/// Table families that can be written back to deck text
pub const SUBSYSTEMS: [&str; 4] = ["equil", "pvt", "satfunc", "vfp"];

pub fn write_csv<W: Write>(table: &mut DataFrame, writer: W) -> TableResult<()> {
    CsvWriter::new(writer).finish(table)?;
    Ok(())
}

pub fn write_csv_file<P: AsRef<Path>>(table: &mut DataFrame, path: P) -> TableResult<()> {
    let file = File::create(path.as_ref())?;
    write_csv(table, file)?;
    info!("Wrote {} rows to {}", table.height(), path.as_ref().display());
    Ok(())
}

/// Read a CSV table with a header line. Column types are inferred.
pub fn read_csv<R: Read>(mut reader: R) -> TableResult<DataFrame> {
    let mut bytes = vec![];
    reader.read_to_end(&mut bytes)?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(DataFrame::default());
    }
    Ok(CsvReader::new(Cursor::new(bytes)).finish()?)
}

pub fn read_csv_file<P: AsRef<Path>>(path: P) -> TableResult<DataFrame> {
    read_csv(File::open(path)?)
}

/// Deck text for a CSV table of one subsystem (see [`SUBSYSTEMS`]).
pub fn csv_to_deck<R: Read>(reader: R, subsystem: &str, keywords: Option<&[&str]>, settings: &WriteSettings) -> TableResult<String> {
    let table = read_csv(reader)?;
    match subsystem {
        "equil" => equil::to_deck(&table, keywords, settings),
        "pvt" => pvt::to_deck(&table, keywords, settings),
        "satfunc" => satfunc::to_deck(&table, keywords, settings),
        "vfp" => vfp::to_deck(&table, keywords, settings),
        other => Err(TableError::UnsupportedKeyword(other.to_owned())),
    }
}

#[cfg(test)]
mod tests {
    use std::io::BufReader;

    use stringreader::StringReader;

    use super::*;
    use crate::dataframes::Rows;
    use crate::deck::Deck;
    use crate::vfp::VfpType;

    #[test]
    fn test_read_csv() -> TableResult<()> {
        let csv = "KEYWORD,PVTNUM,PRESSURE,VOLUMEFACTOR,VISCOSITY\nPVDO,1,100.0,1.05,0.9\nPVDO,1,200.0,1.02,1.1\n";
        let table = read_csv(BufReader::new(StringReader::new(csv)))?;
        assert_eq!(table.height(), 2);
        assert_eq!(table.width(), 5);

        let rows = Rows::from_dataframe(&table)?;
        assert_eq!(rows.text(0, "KEYWORD").as_deref(), Some("PVDO"));
        assert_eq!(rows.int(1, "PVTNUM"), Some(1));
        assert_eq!(rows.real(1, "VISCOSITY"), Some(1.1));
        Ok(())
    }

    #[test]
    fn test_empty_input() -> TableResult<()> {
        assert_eq!(read_csv(StringReader::new(""))?.height(), 0);
        let text = csv_to_deck(StringReader::new("\n"), "pvt", None, &WriteSettings::default())?;
        assert_eq!(text, "-- No data!\n");
        Ok(())
    }

    #[test]
    fn test_write_then_read() -> TableResult<()> {
        let mut table = pvt::table("PVDG\n 100 0.05 0.01\n 200 0.03 0.02 /\n", None, Some(1))?;
        let mut buffer = vec![];
        write_csv(&mut table, &mut buffer)?;
        let text = String::from_utf8_lossy(&buffer).to_string();
        assert!(text.lines().next().unwrap_or_default().contains("VOLUMEFACTOR"));

        let back = read_csv(buffer.as_slice())?;
        assert_eq!(back.height(), table.height());
        assert_eq!(back.get_column_names(), table.get_column_names());
        Ok(())
    }

    #[test]
    fn test_vfp_through_csv() -> TableResult<()> {
        let deck = "VFPINJ\n 4 2000 WAT THP METRIC /\n 100 200 /\n 50 80 /\n 1 210 250 /\n 2 230 270 /\n";
        let mut table = vfp::table(deck, VfpType::Inj, None)?;
        let mut buffer = vec![];
        write_csv(&mut table, &mut buffer)?;

        let text = csv_to_deck(buffer.as_slice(), "vfp", None, &WriteSettings::default())?;
        let original = vfp::basic_data(&Deck::parse(deck)?, VfpType::Inj, None)?;
        assert_eq!(vfp::basic_data(&Deck::parse(&text)?, VfpType::Inj, None)?, original);
        Ok(())
    }

    #[test]
    fn test_unknown_subsystem() {
        let csv = "KEYWORD,X\nFOO,1\n";
        assert!(matches!(
            csv_to_deck(csv.as_bytes(), "grid", None, &WriteSettings::default()),
            Err(TableError::UnsupportedKeyword(_))
        ));
    }
}
