//! Finding the files to scan.
mod walk;

use snafu::ResultExt;
use std::path::PathBuf;

use crate::{parser::ScanOptions, JoinSnafu, Result};

pub struct FileSearcher;

impl FileSearcher {
    /// Find the files under the given paths that should be scanned, sorted.
    pub async fn find(paths: &[PathBuf], options: &ScanOptions) -> Result<Vec<PathBuf>> {
        let paths = paths.to_vec();
        let config = walk::WalkConfig::from(options);
        tokio::task::spawn_blocking(move || walk::walk(&paths, &config))
            .await
            .context(JoinSnafu)?
    }
}
