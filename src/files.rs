//! A simulation case on disk: the deck and the result files next to it.
//!
//! [`ResdataFiles`] is built from a case base path (`DROGON.DATA`, `DROGON.`
//! and `DROGON` all name the same case). The deck is read and parsed on first
//! request and kept. Result files (grid, INIT, summary, restart, RFT) are
//! opened on demand through a caller supplied [`ResultOpener`], since their
//! binary formats are not read by this crate, and at most one handle per
//! [`FileKind`] is kept open until [`ResdataFiles::close`].
//!
//! Failures are `error_stack` reports of [`SessionError`] with the offending
//! path attached.
use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::path::{Path, PathBuf};

use error_stack::{Report, ResultExt};
use log::{info, warn};
use polars::prelude::DataFrame;

use crate::dataframes::Rows;
use crate::deck::{Deck, Source};
use crate::keyword_specs::DeckValue;

pub type SessionResult<T> = Result<T, Report<SessionError>>;

/// Layer zone file looked for next to the deck when none is named
pub const DEFAULT_ZONE_FILE: &str = "zones.lyr";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Egrid,
    Init,
    Summary,
    Restart,
    Rft,
}

impl FileKind {
    pub fn extension(&self) -> &'static str {
        match self {
            FileKind::Egrid => "EGRID",
            FileKind::Init => "INIT",
            FileKind::Summary => "UNSMRY",
            FileKind::Restart => "UNRST",
            FileKind::Rft => "RFT",
        }
    }
}

impl Display for FileKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.extension())
    }
}

#[derive(Debug)]
pub enum SessionError {
    /// The file for a result kind does not exist
    NotFound(FileKind),
    /// The opener failed on an existing file
    Open(FileKind),
    ReadDeck,
    ParseDeck,
    ZoneFile,
    /// Building a table from result vectors failed
    Table,
}

impl Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::NotFound(kind) => write!(f, "No {kind} file for this case"),
            SessionError::Open(kind) => write!(f, "Could not open the {kind} file"),
            SessionError::ReadDeck => write!(f, "Could not read the deck file"),
            SessionError::ParseDeck => write!(f, "Could not parse the deck file"),
            SessionError::ZoneFile => write!(f, "Invalid layer zone file"),
            SessionError::Table => write!(f, "Could not build a table from result vectors"),
        }
    }
}

impl std::error::Error for SessionError {}

/// An open binary result file, seen as named vectors.
pub trait ResultFile {
    fn names(&self) -> Vec<String>;

    fn vector(&self, name: &str) -> Option<Vec<f64>>;

    fn active_count(&self) -> usize {
        0
    }

    /// 1-based (I, J, K) of every active cell in active order. Only grid files have geometry.
    fn active_ijk(&self) -> Option<Vec<[usize; 3]>> {
        None
    }
}

/// Opens result files. `include_restart` only matters for summary files, where
/// it asks for the time steps of the restart chain before this case.
pub trait ResultOpener {
    fn open(&self, path: &Path, kind: FileKind, include_restart: bool) -> std::io::Result<Box<dyn ResultFile>>;
}

pub struct ResdataFiles<O: ResultOpener> {
    base: String,
    opener: O,
    include_restart: bool,
    deck: Option<(String, Deck)>,
    handles: HashMap<FileKind, Box<dyn ResultFile>>,
}

fn strip_suffix_once<'a>(text: &'a str, suffix: &str) -> &'a str {
    text.strip_suffix(suffix).unwrap_or(text)
}

impl<O: ResultOpener> ResdataFiles<O> {
    pub fn new<P: AsRef<Path>>(base: P, opener: O) -> Self {
        let base = base.as_ref().to_string_lossy().to_string();
        if base.ends_with(".DATA") && !Path::new(&base).is_file() {
            warn!("File {base} does not exist");
        }
        let base = strip_suffix_once(strip_suffix_once(&base, ".DATA"), ".").to_owned();
        Self { base, opener, include_restart: true, deck: None, handles: HashMap::new() }
    }

    /// Whether summary handles include the restart chain (default true).
    pub fn include_restart(mut self, include_restart: bool) -> Self {
        self.include_restart = include_restart;
        self
    }

    /// The case path without extension
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Directory holding the case
    pub fn path(&self) -> PathBuf {
        Path::new(&self.base)
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default()
    }

    pub fn file_name(&self, kind: FileKind) -> PathBuf {
        PathBuf::from(format!("{}.{}", self.base, kind.extension()))
    }

    pub fn rst_filename(&self) -> PathBuf {
        self.file_name(FileKind::Restart)
    }

    pub fn prt_filename(&self) -> PathBuf {
        PathBuf::from(format!("{}.PRT", self.base))
    }

    /// `<base>.DATA` when it exists, otherwise the base path itself.
    pub fn deck_path(&self) -> PathBuf {
        let data = PathBuf::from(format!("{}.DATA", self.base));
        if data.is_file() {
            data
        } else {
            PathBuf::from(&self.base)
        }
    }

    fn load_deck(&mut self) -> SessionResult<&(String, Deck)> {
        if self.deck.is_none() {
            let path = self.deck_path();
            info!("Parsing deck file {}", path.display());
            let text = std::fs::read_to_string(&path)
                .change_context(SessionError::ReadDeck)
                .attach_printable_lazy(|| format!("path: {}", path.display()))?;
            let deck = Deck::parse(&text)
                .change_context(SessionError::ParseDeck)
                .attach_printable_lazy(|| format!("path: {}", path.display()))?;
            self.deck = Some((text, deck));
        }
        self.deck.as_ref().ok_or_else(|| Report::new(SessionError::ReadDeck))
    }

    pub fn deck(&mut self) -> SessionResult<&Deck> {
        Ok(&self.load_deck()?.1)
    }

    /// The deck as a conversion source. Handed over as text, so region counts
    /// can still be inferred from it.
    pub fn source(&mut self) -> SessionResult<Source> {
        Ok(Source::Text(self.load_deck()?.0.clone()))
    }

    /// The open handle for `kind`, opening it on first use.
    pub fn handle(&mut self, kind: FileKind) -> SessionResult<&dyn ResultFile> {
        if !self.handles.contains_key(&kind) {
            let path = self.file_name(kind);
            if !path.is_file() {
                return Err(Report::new(SessionError::NotFound(kind))
                    .attach_printable(format!("path: {}", path.display())));
            }
            info!("Opening {kind} file {}", path.display());
            let include_restart = kind == FileKind::Summary && self.include_restart;
            let handle = self.opener.open(&path, kind, include_restart)
                .change_context(SessionError::Open(kind))
                .attach_printable_lazy(|| format!("path: {}", path.display()))?;
            self.handles.insert(kind, handle);
        }
        self.handles.get(&kind)
            .map(|h| h.as_ref())
            .ok_or_else(|| Report::new(SessionError::Open(kind)))
    }

    pub fn is_open(&self, kind: FileKind) -> bool {
        self.handles.contains_key(&kind)
    }

    /// Drop every open handle. Closing a session with nothing open is fine.
    pub fn close(&mut self) {
        if !self.handles.is_empty() {
            info!("Closing {} result files", self.handles.len());
        }
        self.handles.clear();
    }

    /// K layer to zone name from a layer file. A relative `filename` is taken
    /// relative to the case directory. Without a filename, [`DEFAULT_ZONE_FILE`]
    /// is used and its absence is silent; a named file that is missing only
    /// warns. Both give an empty map.
    pub fn zonemap(&self, filename: Option<&Path>) -> SessionResult<BTreeMap<usize, String>> {
        let name = filename.unwrap_or(Path::new(DEFAULT_ZONE_FILE));
        let path = if name.is_absolute() { name.to_path_buf() } else { self.path().join(name) };
        if !path.is_file() {
            if filename.is_some() {
                warn!("Zone file {} not found, ignoring", path.display());
            }
            return Ok(BTreeMap::new());
        }

        let text = std::fs::read_to_string(&path)
            .change_context(SessionError::ZoneFile)
            .attach_printable_lazy(|| format!("path: {}", path.display()))?;
        parse_zonemap(&text).attach_printable_lazy(|| format!("path: {}", path.display()))
    }

    /// One row per active cell with its I, J, K and the requested INIT
    /// vectors (every per-cell INIT vector when `vectors` is `None`). A ZONE
    /// column is added from `zones` when given.
    pub fn init_rows(&mut self, vectors: Option<&[&str]>, zones: Option<&BTreeMap<usize, String>>) -> SessionResult<Rows> {
        let ijk = self.handle(FileKind::Egrid)?
            .active_ijk()
            .ok_or_else(|| Report::new(SessionError::Table).attach_printable("grid file has no cell geometry"))?;

        let init = self.handle(FileKind::Init)?;
        let names: Vec<String> = match vectors {
            Some(v) => v.iter().map(|s| s.to_string()).collect(),
            None => init.names(),
        };
        let mut columns: Vec<(String, Vec<f64>)> = vec![];
        for name in names {
            match init.vector(&name) {
                Some(values) if values.len() == ijk.len() => columns.push((name, values)),
                Some(values) => {
                    if vectors.is_some() {
                        warn!("INIT vector {name} has {} values for {} active cells, skipping", values.len(), ijk.len());
                    }
                },
                None => {
                    return Err(Report::new(SessionError::Table).attach_printable(format!("no INIT vector {name}")));
                },
            }
        }

        let mut rows = Rows::new();
        for (cell, [i, j, k]) in ijk.iter().enumerate() {
            let mut row: Vec<(&str, Option<DeckValue>)> = vec![
                ("I", Some(DeckValue::Integer(*i as i64))),
                ("J", Some(DeckValue::Integer(*j as i64))),
                ("K", Some(DeckValue::Integer(*k as i64))),
            ];
            row.extend(columns.iter().map(|(name, values)| (name.as_str(), Some(DeckValue::Real(values[cell])))));
            if let Some(zones) = zones {
                row.push(("ZONE", zones.get(k).map(|z| DeckValue::Char(z.clone()))));
            }
            rows.push_row(row);
        }
        Ok(rows)
    }

    pub fn init_table(&mut self, vectors: Option<&[&str]>, zones: Option<&BTreeMap<usize, String>>) -> SessionResult<DataFrame> {
        self.init_rows(vectors, zones)?
            .into_dataframe()
            .change_context(SessionError::Table)
    }
}

/// Parse layer file lines like `'ZoneA' 1-4`. Quotes are optional for names
/// without spaces, `--` starts a comment, and anything after the range (a
/// colour, say) is ignored. Later lines win for layers given twice.
pub fn parse_zonemap(text: &str) -> SessionResult<BTreeMap<usize, String>> {
    let mut zones = BTreeMap::new();
    for (n, raw) in text.lines().enumerate() {
        let line = raw.split("--").next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let bad_line = || Report::new(SessionError::ZoneFile).attach_printable(format!("line {}: {raw}", n + 1));

        let (name, rest) = match line.strip_prefix('\'') {
            Some(quoted) => quoted.split_once('\'').ok_or_else(bad_line)?,
            None => line.split_once(char::is_whitespace).ok_or_else(bad_line)?,
        };
        let range = rest.split_whitespace().next().ok_or_else(bad_line)?;
        let (from, to) = range.split_once('-').unwrap_or((range, range));
        let from: usize = from.trim().parse().map_err(|_| bad_line())?;
        let to: usize = to.trim().parse().map_err(|_| bad_line())?;
        if from == 0 || to < from {
            return Err(bad_line());
        }
        for k in from..=to {
            zones.insert(k, name.trim().to_owned());
        }
    }
    Ok(zones)
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;

    struct FakeGrid;

    impl ResultFile for FakeGrid {
        fn names(&self) -> Vec<String> {
            vec![]
        }

        fn vector(&self, _name: &str) -> Option<Vec<f64>> {
            None
        }

        fn active_count(&self) -> usize {
            3
        }

        fn active_ijk(&self) -> Option<Vec<[usize; 3]>> {
            Some(vec![[1, 1, 1], [2, 1, 1], [1, 1, 2]])
        }
    }

    struct FakeInit;

    impl ResultFile for FakeInit {
        fn names(&self) -> Vec<String> {
            vec!["PORO".to_string(), "PERMX".to_string(), "TABDIMS".to_string()]
        }

        fn vector(&self, name: &str) -> Option<Vec<f64>> {
            match name {
                "PORO" => Some(vec![0.2, 0.25, 0.3]),
                "PERMX" => Some(vec![100.0, 200.0, 300.0]),
                "TABDIMS" => Some(vec![1.0; 10]),
                _ => None,
            }
        }
    }

    #[derive(Default)]
    struct FakeOpener {
        opened: Rc<Cell<usize>>,
        restart_flags: Rc<Cell<Option<bool>>>,
    }

    impl ResultOpener for FakeOpener {
        fn open(&self, _path: &Path, kind: FileKind, include_restart: bool) -> std::io::Result<Box<dyn ResultFile>> {
            self.opened.set(self.opened.get() + 1);
            match kind {
                FileKind::Egrid => Ok(Box::new(FakeGrid)),
                FileKind::Init => Ok(Box::new(FakeInit)),
                FileKind::Summary => {
                    self.restart_flags.set(Some(include_restart));
                    Ok(Box::new(FakeInit))
                },
                _ => Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "unreadable")),
            }
        }
    }

    /// A scratch case directory holding `files`, removed on drop.
    struct Scratch(PathBuf);

    impl Scratch {
        fn new(tag: &str, files: &[(&str, &str)]) -> Self {
            let dir = std::env::temp_dir().join(format!("resframe-{tag}-{}", std::process::id()));
            std::fs::create_dir_all(&dir).expect("could not create scratch dir");
            for (name, content) in files {
                std::fs::write(dir.join(name), content).expect("could not write scratch file");
            }
            Self(dir)
        }
    }

    impl Drop for Scratch {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn test_base_names() {
        let files = ResdataFiles::new("/data/DROGON.DATA", FakeOpener::default());
        assert_eq!(files.base(), "/data/DROGON");
        assert_eq!(files.file_name(FileKind::Summary), PathBuf::from("/data/DROGON.UNSMRY"));
        assert_eq!(files.prt_filename(), PathBuf::from("/data/DROGON.PRT"));
        assert_eq!(files.rst_filename(), PathBuf::from("/data/DROGON.UNRST"));
        assert_eq!(files.path(), PathBuf::from("/data"));

        assert_eq!(ResdataFiles::new("/data/DROGON.", FakeOpener::default()).base(), "/data/DROGON");
        assert_eq!(ResdataFiles::new("/data/DROGON", FakeOpener::default()).base(), "/data/DROGON");
    }

    #[test]
    fn test_deck_is_cached() -> SessionResult<()> {
        let scratch = Scratch::new("deck", &[("CASE.DATA", "RUNSPEC\nOIL\nWATER\nEQUIL\n 2000 200 2050 /\n")]);
        let mut files = ResdataFiles::new(scratch.0.join("CASE.DATA"), FakeOpener::default());
        assert!(files.deck()?.contains("EQUIL"));
        std::fs::remove_file(scratch.0.join("CASE.DATA")).expect("could not remove deck");
        assert!(files.deck()?.contains("OIL"), "Second request is served from the cache");
        assert!(matches!(files.source()?, Source::Text(t) if t.contains("EQUIL")));
        Ok(())
    }

    #[test]
    fn test_missing_deck() {
        let mut files = ResdataFiles::new("/nonexistent/resframe/CASE", FakeOpener::default());
        let err = files.deck().err().expect("deck should be missing");
        assert!(matches!(err.current_context(), SessionError::ReadDeck));
    }

    #[test]
    fn test_one_handle_per_kind() -> SessionResult<()> {
        let scratch = Scratch::new("handles", &[("CASE.EGRID", ""), ("CASE.UNSMRY", ""), ("CASE.RFT", "")]);
        let opener = FakeOpener::default();
        let opened = Rc::clone(&opener.opened);
        let restart = Rc::clone(&opener.restart_flags);
        let mut files = ResdataFiles::new(scratch.0.join("CASE"), opener).include_restart(false);

        assert_eq!(files.handle(FileKind::Egrid)?.active_count(), 3);
        files.handle(FileKind::Egrid)?;
        assert_eq!(opened.get(), 1);

        files.handle(FileKind::Summary)?;
        assert_eq!(restart.get(), Some(false));

        let missing = files.handle(FileKind::Init).err().expect("no INIT file");
        assert!(matches!(missing.current_context(), SessionError::NotFound(FileKind::Init)));
        let unreadable = files.handle(FileKind::Rft).err().expect("RFT open fails");
        assert!(matches!(unreadable.current_context(), SessionError::Open(FileKind::Rft)));

        files.close();
        assert!(!files.is_open(FileKind::Egrid));
        files.close();
        files.handle(FileKind::Egrid)?;
        assert_eq!(opened.get(), 4, "Reopened after close");
        Ok(())
    }

    #[test]
    fn test_parse_zonemap() -> SessionResult<()> {
        let zones = parse_zonemap("-- zones\n'Upper Reek' 1-2\nLowerReek 3-4 #FF0000\n\n'Single' 5\n")?;
        assert_eq!(zones.len(), 5);
        assert_eq!(zones.get(&1).map(String::as_str), Some("Upper Reek"));
        assert_eq!(zones.get(&4).map(String::as_str), Some("LowerReek"));
        assert_eq!(zones.get(&5).map(String::as_str), Some("Single"));

        assert!(parse_zonemap("'Broken 1-2\n").is_err());
        assert!(parse_zonemap("Zone 4-2\n").is_err());
        Ok(())
    }

    #[test]
    fn test_zonemap_files() -> SessionResult<()> {
        let scratch = Scratch::new("zones", &[("other.lyr", "'A' 1-2\n")]);
        let files = ResdataFiles::new(scratch.0.join("CASE"), FakeOpener::default());
        assert!(files.zonemap(None)?.is_empty(), "Missing default file gives no zones");
        assert!(files.zonemap(Some(Path::new("missing.lyr")))?.is_empty());
        assert_eq!(files.zonemap(Some(Path::new("other.lyr")))?.len(), 2);
        Ok(())
    }

    #[test]
    fn test_init_rows() -> SessionResult<()> {
        let scratch = Scratch::new("init", &[("CASE.EGRID", ""), ("CASE.INIT", "")]);
        let mut files = ResdataFiles::new(scratch.0.join("CASE"), FakeOpener::default());

        let rows = files.init_rows(None, None)?;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows.columns(), &["I", "J", "K", "PORO", "PERMX"], "TABDIMS is not per cell");
        assert_eq!(rows.int(2, "K"), Some(2));
        assert_eq!(rows.real(1, "PERMX"), Some(200.0));

        let zones = parse_zonemap("A 1-1\nB 2-2\n")?;
        let rows = files.init_rows(Some(&["PORO"][..]), Some(&zones))?;
        assert_eq!(rows.columns(), &["I", "J", "K", "PORO", "ZONE"]);
        assert_eq!(rows.text(2, "ZONE").as_deref(), Some("B"));

        let err = files.init_rows(Some(&["SWATINIT"][..]), None).err().expect("unknown vector");
        assert!(matches!(err.current_context(), SessionError::Table));
        assert_eq!(files.init_table(None, None)?.height(), 3);
        Ok(())
    }
}
