// ABOUTME: Hidden archive subcommand run inside helper containers.
// ABOUTME: Wraps the volume archive codec; exit codes distinguish an existing archive from I/O faults.

use ferry::archive::{self, ArchiveError};
use ferry::error::Result;
use std::path::Path;

/// Archive every path listed (null-delimited) in `files_from` into `output`.
pub fn export(files_from: &Path, output: &Path) -> Result<()> {
    let list = std::fs::read(files_from).map_err(|source| ArchiveError::Io {
        path: files_from.to_path_buf(),
        source,
    })?;
    let paths = archive::parse_file_list(&list)?;
    let summary = archive::export(&paths, output)?;
    eprintln!(
        "archived {} entries ({} sparse) to {}",
        summary.entries,
        summary.sparse_files,
        output.display()
    );
    Ok(())
}

/// Extract `input` beneath `root`.
pub fn import(input: &Path, root: &Path) -> Result<()> {
    let summary = archive::import(input, root)?;
    eprintln!("restored {} entries under {}", summary.entries, root.display());
    Ok(())
}
