// ABOUTME: Sparse file support for the volume archive.
// ABOUTME: Maps data regions with SEEK_DATA/SEEK_HOLE and encodes them as GNU sparse entries.

use std::fs::{File, Metadata};
use std::io::{self, Read, Seek, SeekFrom};
use std::os::unix::fs::MetadataExt;
use tar::{GnuExtSparseHeader, GnuSparseHeader, Header};

/// Tar block size. Every data region except the last must be a multiple of it.
const BLOCK: u64 = 512;

/// Sparse map slots in the main GNU header.
const HEADER_SLOTS: usize = 4;

/// Sparse map slots in each extension block.
const EXT_SLOTS: usize = 21;

/// A run of allocated bytes inside a sparse file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Region {
    pub offset: u64,
    pub length: u64,
}

/// True when the file occupies fewer bytes on disk than its apparent size.
pub(crate) fn is_sparse(meta: &Metadata) -> bool {
    meta.blocks().saturating_mul(BLOCK) < meta.len()
}

/// Data regions of `file`, aligned to tar blocks and terminated so that the
/// map always ends at `len`.
///
/// Filesystems without hole reporting yield one region covering the file.
pub(crate) fn data_regions(file: &File, len: u64) -> io::Result<Vec<Region>> {
    let raw = match seek_regions(file, len) {
        Ok(regions) => regions,
        Err(e) if e.raw_os_error() == Some(libc::EINVAL) => vec![Region {
            offset: 0,
            length: len,
        }],
        Err(e) => return Err(e),
    };
    Ok(normalize(raw, len))
}

#[cfg(any(target_os = "linux", target_os = "android"))]
fn seek_regions(file: &File, len: u64) -> io::Result<Vec<Region>> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    let end = len as libc::off_t;
    let mut regions = Vec::new();
    let mut pos: libc::off_t = 0;

    while pos < end {
        // SAFETY: fd is a valid open descriptor borrowed from `file`.
        let data = unsafe { libc::lseek(fd, pos, libc::SEEK_DATA) };
        if data < 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::ENXIO) {
                // Only holes remain.
                break;
            }
            return Err(err);
        }

        // SAFETY: as above.
        let hole = unsafe { libc::lseek(fd, data, libc::SEEK_HOLE) };
        if hole < 0 {
            return Err(io::Error::last_os_error());
        }

        let hole = hole.min(end);
        regions.push(Region {
            offset: data as u64,
            length: (hole - data) as u64,
        });
        pos = hole;
    }

    Ok(regions)
}

#[cfg(not(any(target_os = "linux", target_os = "android")))]
fn seek_regions(_file: &File, len: u64) -> io::Result<Vec<Region>> {
    Ok(vec![Region {
        offset: 0,
        length: len,
    }])
}

/// Widen regions to block boundaries, merge overlaps, and append the
/// zero-length terminator when the file ends in a hole.
pub(crate) fn normalize(raw: Vec<Region>, len: u64) -> Vec<Region> {
    let mut merged: Vec<Region> = Vec::with_capacity(raw.len() + 1);

    for region in raw.into_iter().filter(|r| r.length > 0) {
        let start = region.offset / BLOCK * BLOCK;
        let end = region
            .offset
            .saturating_add(region.length)
            .div_ceil(BLOCK)
            .saturating_mul(BLOCK)
            .min(len);
        if start >= end {
            continue;
        }

        match merged.last_mut() {
            Some(last) if start <= last.offset + last.length => {
                let last_end = last.offset + last.length;
                last.length = end.max(last_end) - last.offset;
            }
            _ => merged.push(Region {
                offset: start,
                length: end - start,
            }),
        }
    }

    let covered = merged.last().map(|r| r.offset + r.length).unwrap_or(0);
    if covered < len || merged.is_empty() {
        merged.push(Region {
            offset: len,
            length: 0,
        });
    }

    merged
}

/// Bytes stored in the archive for this map.
pub(crate) fn stored_size(regions: &[Region]) -> u64 {
    regions.iter().map(|r| r.length).sum()
}

/// Fill the GNU sparse fields of `header` and return the extension blocks
/// that must directly follow it.
pub(crate) fn encode_map(header: &mut Header, regions: &[Region], real_size: u64) -> io::Result<Vec<u8>> {
    let gnu = header
        .as_gnu_mut()
        .ok_or_else(|| io::Error::other("sparse entries require a GNU header"))?;

    write_number(&mut gnu.realsize, real_size);
    let (head, rest) = regions.split_at(regions.len().min(HEADER_SLOTS));
    for (slot, region) in gnu.sparse.iter_mut().zip(head) {
        write_slot(slot, region);
    }
    gnu.isextended[0] = u8::from(!rest.is_empty());

    let mut blocks = Vec::new();
    let chunks: Vec<&[Region]> = rest.chunks(EXT_SLOTS).collect();
    for (i, chunk) in chunks.iter().enumerate() {
        let mut ext = GnuExtSparseHeader::new();
        for (slot, region) in ext.sparse.iter_mut().zip(chunk.iter()) {
            write_slot(slot, region);
        }
        ext.isextended[0] = u8::from(i + 1 < chunks.len());
        blocks.extend_from_slice(ext.as_bytes());
    }

    Ok(blocks)
}

fn write_slot(slot: &mut GnuSparseHeader, region: &Region) {
    write_number(&mut slot.offset, region.offset);
    write_number(&mut slot.numbytes, region.length);
}

/// Write a tar numeric field: zero-padded octal with a NUL terminator, or
/// GNU base-256 when the value does not fit.
fn write_number(dst: &mut [u8; 12], value: u64) {
    let digits = dst.len() - 1;
    let octal = format!("{:0width$o}", value, width = digits);
    if octal.len() == digits {
        dst[..digits].copy_from_slice(octal.as_bytes());
        dst[digits] = 0;
    } else {
        dst.fill(0);
        dst[4..].copy_from_slice(&value.to_be_bytes());
        dst[0] = 0x80;
    }
}

/// Reads only the mapped regions of a file, in order.
pub(crate) struct RegionReader {
    file: File,
    regions: std::vec::IntoIter<Region>,
    remaining: u64,
}

impl RegionReader {
    pub(crate) fn new(file: File, regions: Vec<Region>) -> Self {
        Self {
            file,
            regions: regions.into_iter(),
            remaining: 0,
        }
    }
}

impl Read for RegionReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        while self.remaining == 0 {
            match self.regions.next() {
                Some(region) => {
                    self.file.seek(SeekFrom::Start(region.offset))?;
                    self.remaining = region.length;
                }
                None => return Ok(0),
            }
        }

        let want = usize::try_from(self.remaining)
            .unwrap_or(usize::MAX)
            .min(buf.len());
        let n = self.file.read(&mut buf[..want])?;
        if n == 0 && want > 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "file shrank while it was being archived",
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}
