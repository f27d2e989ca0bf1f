// ABOUTME: Volume archive codec: gzip-compressed tar with GNU sparse entries.
// ABOUTME: Exports a null-delimited path list exclusively and imports with overwrite.

mod sparse;

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use std::ffi::OsStr;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Cursor, Read};
use std::os::unix::ffi::OsStrExt;
use std::path::{Component, Path, PathBuf};
use tar::{Archive, Builder, EntryType, Header, HeaderMode};
use thiserror::Error;
use tracing::debug;

/// Exit status of an archive run whose destination already exists.
pub const EXIT_EXISTS: i32 = 3;
/// Exit status of an archive run that failed for any other reason.
pub const EXIT_IO: i32 = 4;

/// Errors from archive export and import.
#[derive(Debug, Error)]
pub enum ArchiveError {
    /// The destination archive is already present; it is left untouched.
    #[error("archive already exists: {}", .0.display())]
    Exists(PathBuf),

    /// Filesystem fault while reading sources or writing the archive.
    #[error("archive I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A path in the export list was not absolute.
    #[error("path in file list must be absolute: {}", .0.display())]
    RelativePath(PathBuf),
}

impl ArchiveError {
    /// Process exit status reporting this error to the caller.
    pub fn exit_code(&self) -> i32 {
        match self {
            ArchiveError::Exists(_) => EXIT_EXISTS,
            _ => EXIT_IO,
        }
    }
}

pub type Result<T> = std::result::Result<T, ArchiveError>;

fn io_error(path: &Path) -> impl FnOnce(io::Error) -> ArchiveError + '_ {
    move |source| ArchiveError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Counts reported after an export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportSummary {
    /// Entries written (directories, files, links).
    pub entries: u64,
    /// Regular files written with a sparse map.
    pub sparse_files: u64,
}

/// Counts reported after an import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Entries extracted.
    pub entries: u64,
}

/// Encode paths as a null-delimited list.
pub fn encode_file_list<'a, I>(paths: I) -> Vec<u8>
where
    I: IntoIterator<Item = &'a Path>,
{
    let mut out = Vec::new();
    for path in paths {
        out.extend_from_slice(path.as_os_str().as_bytes());
        out.push(0);
    }
    out
}

/// Decode a null-delimited list. Empty segments are skipped; every path
/// must be absolute.
pub fn parse_file_list(bytes: &[u8]) -> Result<Vec<PathBuf>> {
    bytes
        .split(|b| *b == 0)
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let path = PathBuf::from(OsStr::from_bytes(segment));
            if path.is_absolute() {
                Ok(path)
            } else {
                Err(ArchiveError::RelativePath(path))
            }
        })
        .collect()
}

/// Archive `paths` into a new gzip-compressed tar at `dest`.
///
/// The destination is created exclusively: an existing file yields
/// [`ArchiveError::Exists`] and is neither truncated nor rewritten. Entry
/// names are the absolute paths with the leading `/` removed.
pub fn export(paths: &[PathBuf], dest: &Path) -> Result<ExportSummary> {
    for path in paths {
        if !path.is_absolute() {
            return Err(ArchiveError::RelativePath(path.clone()));
        }
    }

    let file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dest)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => ArchiveError::Exists(dest.to_path_buf()),
            _ => io_error(dest)(e),
        })?;

    debug!(archive = %dest.display(), paths = paths.len(), "exporting volume archive");

    let mut builder = Builder::new(GzEncoder::new(file, Compression::default()));
    builder.mode(HeaderMode::Complete);
    builder.follow_symlinks(false);

    let mut summary = ExportSummary::default();
    for path in paths {
        append_tree(&mut builder, path, &mut summary)?;
    }

    let encoder = builder.into_inner().map_err(io_error(dest))?;
    let file = encoder.finish().map_err(io_error(dest))?;
    file.sync_all().map_err(io_error(dest))?;

    debug!(
        archive = %dest.display(),
        entries = summary.entries,
        sparse_files = summary.sparse_files,
        "volume archive written"
    );
    Ok(summary)
}

fn archive_name(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect()
}

fn append_tree<W: io::Write>(
    builder: &mut Builder<W>,
    path: &Path,
    summary: &mut ExportSummary,
) -> Result<()> {
    let meta = fs::symlink_metadata(path).map_err(io_error(path))?;
    let name = archive_name(path);

    if meta.is_file() && sparse::is_sparse(&meta) {
        append_sparse(builder, path, &name, &meta)?;
        summary.sparse_files += 1;
        summary.entries += 1;
        return Ok(());
    }

    // The root itself has no name; only its children are archived.
    if !name.as_os_str().is_empty() {
        builder
            .append_path_with_name(path, &name)
            .map_err(io_error(path))?;
        summary.entries += 1;
    }

    if meta.is_dir() {
        let mut children = fs::read_dir(path)
            .map_err(io_error(path))?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<io::Result<Vec<_>>>()
            .map_err(io_error(path))?;
        children.sort();
        for child in children {
            append_tree(builder, &child, summary)?;
        }
    }

    Ok(())
}

fn append_sparse<W: io::Write>(
    builder: &mut Builder<W>,
    path: &Path,
    name: &Path,
    meta: &fs::Metadata,
) -> Result<()> {
    let file = File::open(path).map_err(io_error(path))?;
    let regions = sparse::data_regions(&file, meta.len()).map_err(io_error(path))?;
    let stored = sparse::stored_size(&regions);

    let mut header = Header::new_gnu();
    header.set_metadata_in_mode(meta, HeaderMode::Complete);
    header.set_entry_type(EntryType::GNUSparse);
    header.set_size(stored);
    let extensions = sparse::encode_map(&mut header, &regions, meta.len()).map_err(io_error(path))?;

    debug!(
        path = %path.display(),
        apparent = meta.len(),
        stored,
        regions = regions.len(),
        "archiving sparse file"
    );

    let data = Cursor::new(extensions).chain(sparse::RegionReader::new(file, regions));
    builder
        .append_data(&mut header, name, data)
        .map_err(io_error(path))
}

/// Extract the archive at `archive` beneath `root`, replacing whatever
/// already exists at each entry's path.
pub fn import(archive: &Path, root: &Path) -> Result<ImportSummary> {
    let file = File::open(archive).map_err(io_error(archive))?;

    debug!(archive = %archive.display(), root = %root.display(), "importing volume archive");

    let mut tar = Archive::new(GzDecoder::new(file));
    tar.set_overwrite(true);
    tar.set_preserve_permissions(true);
    tar.set_preserve_mtime(true);
    tar.set_preserve_ownerships(running_as_root());

    let mut summary = ImportSummary::default();
    for entry in tar.entries().map_err(io_error(archive))? {
        let mut entry = entry.map_err(io_error(archive))?;
        if entry.unpack_in(root).map_err(io_error(root))? {
            summary.entries += 1;
        } else {
            debug!(path = ?entry.path().ok(), "skipped entry outside target root");
        }
    }

    debug!(archive = %archive.display(), entries = summary.entries, "volume archive extracted");
    Ok(summary)
}

fn running_as_root() -> bool {
    // SAFETY: geteuid has no preconditions and cannot fail.
    unsafe { libc::geteuid() == 0 }
}
