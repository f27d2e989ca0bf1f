// ABOUTME: Integration tests for the volume archive codec.
// ABOUTME: Covers empty archives, sparse round trips and the exclusive-create rule.

mod support;

use ferry::archive::{self, ArchiveError};
use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

const SPARSE_LEN: u64 = 8 * 1024 * 1024;

/// Where `path` lands when an archive of it is imported under `root`.
fn restored(root: &Path, path: &Path) -> PathBuf {
    root.join(path.strip_prefix("/").unwrap())
}

fn write_sparse(path: &Path) {
    let mut file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
        .unwrap();
    file.set_len(SPARSE_LEN).unwrap();
    file.seek(SeekFrom::Start(4 * 1024 * 1024)).unwrap();
    file.write_all(b"middle of nowhere").unwrap();
    file.seek(SeekFrom::Start(SPARSE_LEN - 5)).unwrap();
    file.write_all(b"tail!").unwrap();
}

fn allocated(path: &Path) -> u64 {
    fs::metadata(path).unwrap().blocks() * 512
}

#[test]
fn empty_list_writes_a_valid_empty_archive() {
    support::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("web-volumes.tar.gz");

    let summary = archive::export(&[], &dest).unwrap();
    assert_eq!(summary.entries, 0);
    assert!(dest.is_file());

    let root = dir.path().join("root");
    fs::create_dir(&root).unwrap();
    let imported = archive::import(&dest, &root).unwrap();
    assert_eq!(imported.entries, 0);
    assert_eq!(fs::read_dir(&root).unwrap().count(), 0);
}

#[test]
fn sparse_and_normal_files_round_trip() {
    support::init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let volume = dir.path().join("data");
    fs::create_dir_all(volume.join("nested")).unwrap();
    fs::write(volume.join("nested/notes.txt"), "plain contents\n").unwrap();
    write_sparse(&volume.join("disk.img"));

    let dest = dir.path().join("web-volumes.tar.gz");
    archive::export(&[volume.clone()], &dest).unwrap();

    let root = dir.path().join("restore");
    fs::create_dir(&root).unwrap();
    archive::import(&dest, &root).unwrap();

    let out = restored(&root, &volume);
    assert_eq!(
        fs::read_to_string(out.join("nested/notes.txt")).unwrap(),
        "plain contents\n"
    );
    assert_eq!(
        fs::read(out.join("disk.img")).unwrap(),
        fs::read(volume.join("disk.img")).unwrap()
    );

    // Only meaningful where the filesystem kept the source sparse.
    if allocated(&volume.join("disk.img")) < SPARSE_LEN {
        assert!(allocated(&out.join("disk.img")) < SPARSE_LEN);
    } else {
        eprintln!("Skipping allocation check: filesystem does not support holes");
    }
}

#[test]
fn import_overwrites_existing_files() {
    let dir = tempfile::tempdir().unwrap();
    let volume = dir.path().join("data");
    fs::create_dir(&volume).unwrap();
    fs::write(volume.join("config"), "new").unwrap();

    let dest = dir.path().join("a.tar.gz");
    archive::export(&[volume.clone()], &dest).unwrap();

    let root = dir.path().join("restore");
    let out = restored(&root, &volume);
    fs::create_dir_all(&out).unwrap();
    fs::write(out.join("config"), "old and longer").unwrap();

    archive::import(&dest, &root).unwrap();
    assert_eq!(fs::read_to_string(out.join("config")).unwrap(), "new");
}

#[test]
fn existing_archive_is_left_byte_identical() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("web-volumes.tar.gz");
    fs::write(&dest, b"do not touch").unwrap();

    let err = archive::export(&[], &dest).unwrap_err();
    assert!(matches!(err, ArchiveError::Exists(ref p) if p == &dest));
    assert_eq!(fs::read(&dest).unwrap(), b"do not touch");
}

#[test]
fn relative_paths_are_rejected_before_writing() {
    let dir = tempfile::tempdir().unwrap();
    let dest = dir.path().join("a.tar.gz");

    let err = archive::export(&[PathBuf::from("data")], &dest).unwrap_err();
    assert!(matches!(err, ArchiveError::RelativePath(_)));
    assert!(!dest.exists());
}

#[test]
fn missing_archive_is_an_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = archive::import(&dir.path().join("absent.tar.gz"), dir.path()).unwrap_err();
    assert!(matches!(err, ArchiveError::Io { .. }));
}
