//! Turns parsed arguments into a payload plan and runs it.

use std::path::Path;

use archslip::plan::{load_dictionary, split_list};
use archslip::{Error, PayloadPlan, Result, Timestamp};

use crate::exit_codes::{ExitCode, error_to_exit_code};
use crate::output::format_summary;
use crate::{BuildArgs, MassFindModeArg};

/// Builds the plan described by `args`.
///
/// The dictionary is only read when mass-find is requested.
pub fn build_plan(archive: &Path, args: &BuildArgs) -> Result<PayloadPlan> {
    let mut plan = PayloadPlan::new(archive, args.archive_type.into())
        .traversal_token(args.dotdotslash.clone())
        .placeholder(args.mass_find_placeholder.clone())
        .force_name(args.force_name);

    if let Some(method) = args.compression {
        plan = plan.compression(method.into());
    }
    if let Some(paths) = &args.paths {
        plan = plan.paths(split_list(paths));
    }
    if let Some(symlinks) = &args.symlinks {
        plan = plan.symlinks(split_list(symlinks));
    }
    if let Some(content) = &args.file_content {
        plan = plan.file_content(content.as_bytes());
    }
    if let Some(depth) = args.search.filter(|&d| d > 0) {
        plan = plan.search(depth);
    }
    if let Some(filename) = &args.mass_find {
        let dictionary = load_dictionary(&args.mass_find_dict)?;
        let mode = match args.mass_find_mode {
            MassFindModeArg::Paths => archslip::MassFindMode::Paths,
            MassFindModeArg::Symlinks => archslip::MassFindMode::Symlinks,
        };
        plan = plan.mass_find(filename.clone(), mode, dictionary);
    }
    if let Some(source) = &args.clone {
        plan = plan.clone_from(source);
    }
    if let Some(secs) = args.mtime {
        let timestamp = Timestamp::from_unix_secs(secs)
            .ok_or_else(|| Error::Validation(format!("mtime {secs} is out of range")))?;
        plan = plan.timestamp(timestamp);
    }
    if let Some(mode) = args.mode {
        plan = plan.mode(mode);
    }
    Ok(plan)
}

/// Builds and executes the plan, reporting the outcome.
pub fn build(archive: &Path, args: &BuildArgs, verbose: u8) -> ExitCode {
    let result = build_plan(archive, args).and_then(|plan| {
        let path = plan.output_path();
        plan.execute().map(|summary| (path, summary))
    });
    match result {
        Ok((path, summary)) => {
            if verbose > 0 {
                print!("{}", format_summary(&path, &summary));
            }
            ExitCode::Success
        }
        Err(err) => {
            eprintln!("Error: {err}");
            error_to_exit_code(&err)
        }
    }
}
