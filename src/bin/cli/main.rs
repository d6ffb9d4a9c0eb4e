//! CLI tool for building archive slip payloads.

mod commands;
mod exit_codes;
mod output;

use clap::{ArgAction, Args, CommandFactory, Parser, ValueEnum};
use clap_complete::{Shell, generate};
use std::path::PathBuf;

use exit_codes::ExitCode;

/// Build path-traversal and symlink payload archives
#[derive(Parser)]
#[command(name = "archslip")]
#[command(author, version, about = "Build path-traversal and symlink payload archives", long_about = None)]
pub struct Cli {
    /// Name of the archive to create (the extension is added unless --force-name)
    #[arg(required_unless_present = "completions")]
    archive: Option<PathBuf>,

    #[command(flatten)]
    build: BuildArgs,

    /// Increase log verbosity and print the member listing (-vv for debug)
    #[arg(short = 'v', long, action = ArgAction::Count)]
    verbose: u8,

    /// Generate shell completions and exit
    #[arg(long, value_enum, value_name = "SHELL")]
    completions: Option<Shell>,
}

/// Options describing the payload archive.
#[derive(Args)]
pub struct BuildArgs {
    /// Type of the archive
    #[arg(short = 'a', long, value_enum, default_value = "zip")]
    archive_type: ArchiveTypeArg,

    /// Compression algorithm (defaults to the archive type's default)
    #[arg(short = 'c', long, value_enum)]
    compression: Option<CompressionArg>,

    /// Comma separated paths to include in the archive
    #[arg(short = 'p', long)]
    paths: Option<String>,

    /// Comma separated symlinks to include; name one with `target;name`
    #[arg(short = 's', long)]
    symlinks: Option<String>,

    /// Content of the files in the archive, required with --paths
    #[arg(long)]
    file_content: Option<String>,

    /// Use the archive name exactly as given
    #[arg(long)]
    force_name: bool,

    /// Generate traversal variants of every path and symlink up to DEPTH
    #[arg(long, value_name = "DEPTH", num_args = 0..=1, default_missing_value = "5")]
    search: Option<usize>,

    /// Traversal sequence used by --search
    #[arg(long, default_value = archslip::payload::DEFAULT_TRAVERSAL_TOKEN)]
    dotdotslash: String,

    /// File name to look for with every dictionary payload (produces many entries)
    #[arg(long, value_name = "FILENAME")]
    mass_find: Option<String>,

    /// Whether mass-find payloads become paths or symlinks
    #[arg(long, value_enum, default_value = "symlinks")]
    mass_find_mode: MassFindModeArg,

    /// Mass-find payload dictionary
    #[arg(long, default_value = archslip::plan::DEFAULT_DICTIONARY)]
    mass_find_dict: PathBuf,

    /// Placeholder for the file name in dictionary lines
    #[arg(long, default_value = archslip::plan::DEFAULT_PLACEHOLDER)]
    mass_find_placeholder: String,

    /// Existing archive to copy and append the payloads to
    #[arg(long, value_name = "ARCHIVE")]
    clone: Option<PathBuf>,

    /// Modification time of every entry, in unix seconds
    #[arg(long, value_name = "SECS", allow_negative_numbers = true)]
    mtime: Option<i64>,

    /// Permission bits of every entry, in octal (e.g. 4755)
    #[arg(long, value_name = "OCTAL", value_parser = parse_octal_mode)]
    mode: Option<u32>,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum ArchiveTypeArg {
    Zip,
    Tar,
    #[value(name = "7z")]
    SevenZip,
    Jar,
    War,
    Apk,
    Ipa,
}

impl From<ArchiveTypeArg> for archslip::ArchiveType {
    fn from(kind: ArchiveTypeArg) -> Self {
        match kind {
            ArchiveTypeArg::Zip => archslip::ArchiveType::Zip,
            ArchiveTypeArg::Tar => archslip::ArchiveType::Tar,
            ArchiveTypeArg::SevenZip => archslip::ArchiveType::SevenZip,
            ArchiveTypeArg::Jar => archslip::ArchiveType::Jar,
            ArchiveTypeArg::War => archslip::ArchiveType::War,
            ArchiveTypeArg::Apk => archslip::ArchiveType::Apk,
            ArchiveTypeArg::Ipa => archslip::ArchiveType::Ipa,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum CompressionArg {
    None,
    Deflate,
    Bzip2,
    Lzma,
    Lzma2,
    Ppmd,
    #[value(alias = "zstd")]
    Zstandard,
    Brotli,
    Copy,
}

impl From<CompressionArg> for archslip::CompressionMethod {
    fn from(method: CompressionArg) -> Self {
        match method {
            CompressionArg::None => archslip::CompressionMethod::None,
            CompressionArg::Deflate => archslip::CompressionMethod::Deflate,
            CompressionArg::Bzip2 => archslip::CompressionMethod::Bzip2,
            CompressionArg::Lzma => archslip::CompressionMethod::Lzma,
            CompressionArg::Lzma2 => archslip::CompressionMethod::Lzma2,
            CompressionArg::Ppmd => archslip::CompressionMethod::Ppmd,
            CompressionArg::Zstandard => archslip::CompressionMethod::Zstandard,
            CompressionArg::Brotli => archslip::CompressionMethod::Brotli,
            CompressionArg::Copy => archslip::CompressionMethod::Copy,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum MassFindModeArg {
    Paths,
    Symlinks,
}

fn parse_octal_mode(value: &str) -> Result<u32, String> {
    let digits = value.trim_start_matches("0o");
    match u32::from_str_radix(digits, 8) {
        Ok(mode) if mode <= 0o7777 => Ok(mode),
        Ok(_) => Err(format!("mode {value} has bits outside 7777")),
        Err(err) => Err(format!("invalid octal mode {value}: {err}")),
    }
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let exit_code = match (&cli.completions, &cli.archive) {
        (Some(shell), _) => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(*shell, &mut cmd, name, &mut std::io::stdout());
            ExitCode::Success
        }
        (None, Some(archive)) => commands::build(archive, &cli.build, cli.verbose),
        (None, None) => ExitCode::Usage,
    };

    std::process::exit(exit_code.code());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_search_without_value_defaults_to_five() {
        let cli = Cli::try_parse_from(["archslip", "out", "-p", "x", "--search"]).unwrap();
        assert_eq!(cli.build.search, Some(5));
    }

    #[test]
    fn test_parse_octal_mode() {
        assert_eq!(parse_octal_mode("4755"), Ok(0o4755));
        assert_eq!(parse_octal_mode("0o644"), Ok(0o644));
        assert!(parse_octal_mode("9").is_err());
        assert!(parse_octal_mode("17777").is_err());
    }

    #[test]
    fn test_build_plan_requires_content_for_paths() {
        let cli = Cli::try_parse_from(["archslip", "out", "-p", "a,b"]).unwrap();
        let plan = commands::build_plan(cli.archive.as_deref().unwrap(), &cli.build).unwrap();
        assert!(plan.validate().unwrap_err().is_validation());
    }

    #[test]
    fn test_archive_type_names() {
        let cli = Cli::try_parse_from(["archslip", "out", "-a", "7z", "-c", "zstd", "-s", "/x"])
            .unwrap();
        let plan = commands::build_plan(cli.archive.as_deref().unwrap(), &cli.build).unwrap();
        assert_eq!(plan.output_path(), PathBuf::from("out.7z"));
        assert_eq!(
            plan.effective_compression(),
            archslip::CompressionMethod::Zstandard
        );
    }
}
