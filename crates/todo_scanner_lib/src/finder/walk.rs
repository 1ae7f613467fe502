//! Walking directories with the `ignore` crate.
use ignore::{overrides::OverrideBuilder, WalkBuilder};
use snafu::ResultExt;
use std::path::{Path, PathBuf};

use crate::{parser::ScanOptions, IoSnafu, Result, WalkSnafu};

#[derive(Clone, Debug, Default)]
pub(crate) struct WalkConfig {
    pub hidden: bool,
    pub respect_ignore: bool,
    pub excludes: Vec<String>,
}

impl From<&ScanOptions> for WalkConfig {
    fn from(options: &ScanOptions) -> Self {
        WalkConfig {
            hidden: options.hidden,
            respect_ignore: options.respect_ignore,
            excludes: options.excludes.clone(),
        }
    }
}

/// Walk the given paths and collect every file, sorted and deduplicated.
///
/// Exclude globs are matched relative to the first path. Unreadable entries
/// are logged and skipped, but a path that doesn't exist is an error.
pub(crate) fn walk(paths: &[PathBuf], config: &WalkConfig) -> Result<Vec<PathBuf>> {
    let Some((first, rest)) = paths.split_first() else {
        return Ok(vec![]);
    };
    for path in paths.iter() {
        std::fs::metadata(path).context(IoSnafu { path })?;
    }

    let mut builder = WalkBuilder::new(first);
    for path in rest.iter() {
        builder.add(path);
    }
    let respect = config.respect_ignore;
    builder
        .hidden(!config.hidden)
        .ignore(respect)
        .parents(respect)
        .git_ignore(respect)
        .git_global(respect)
        .git_exclude(respect)
        .require_git(false);
    if !config.excludes.is_empty() {
        builder.overrides(overrides(first, &config.excludes)?);
    }
    log::debug!("Walking {paths:?} with {config:?}");

    let mut files = vec![];
    for entry in builder.build() {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_some_and(|t| t.is_file()) {
                    files.push(entry.into_path());
                }
            }
            Err(err) => log::warn!("Skipping an entry: {err}"),
        }
    }
    files.sort();
    files.dedup();
    Ok(files)
}

fn overrides(root: &Path, excludes: &[String]) -> Result<ignore::overrides::Override> {
    let mut builder = OverrideBuilder::new(root);
    for exclude in excludes.iter() {
        builder.add(&format!("!{exclude}")).context(WalkSnafu)?;
    }
    builder.build().context(WalkSnafu)
}
