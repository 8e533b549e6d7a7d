//! Try to guess the types of files on disk.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use crate::errors::{Error, Result};
use crate::mpeg2::ps::PACK_START_CODE;

/// Internal helper function which looks for "magic" bytes at the start of
/// a file.  Files too short to hold the magic bytes don't match.
fn has_magic(path: &Path, magic: &[u8]) -> Result<bool> {
    let mkerr = |err| Error::io(path, err);
    let mut f = fs::File::open(path).map_err(mkerr)?;
    let mut bytes = vec![0; magic.len()];
    match f.read_exact(&mut bytes) {
        Ok(()) => Ok(magic == &bytes[..]),
        Err(ref err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(err) => Err(mkerr(err)),
    }
}

/// Does the specified path appear to point to an `*.idx` file?
pub fn is_idx_file<P: AsRef<Path>>(path: P) -> Result<bool> {
    has_magic(path.as_ref(), b"# VobSub index file")
}

/// Does the specified path appear to point to a `*.sub` file?
///
/// Note that this may (or may not) return false positives for certain
/// MPEG-2 related formats.
pub fn is_sub_file<P: AsRef<Path>>(path: P) -> Result<bool> {
    has_magic(path.as_ref(), &PACK_START_CODE)
}

#[cfg(test)]
fn scratch_file(name: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = std::env::temp_dir()
        .join(format!("vobsub_cues_probe_{}_{}", std::process::id(), name));
    fs::write(&path, contents).unwrap();
    path
}

#[test]
fn probe_idx_files() {
    let idx = scratch_file("a.idx", b"# VobSub index file, v7 (do not modify this line!)\n");
    let sub = scratch_file("a.sub", &[0x00, 0x00, 0x01, 0xba, 0x44]);
    assert!(is_idx_file(&idx).unwrap());
    assert!(!is_idx_file(&sub).unwrap());
    fs::remove_file(idx).unwrap();
    fs::remove_file(sub).unwrap();
}

#[test]
fn probe_sub_files() {
    let idx = scratch_file("b.idx", b"# VobSub index file, v7 (do not modify this line!)\n");
    let sub = scratch_file("b.sub", &[0x00, 0x00, 0x01, 0xba, 0x44]);
    assert!(is_sub_file(&sub).unwrap());
    assert!(!is_sub_file(&idx).unwrap());
    fs::remove_file(idx).unwrap();
    fs::remove_file(sub).unwrap();
}

#[test]
fn probe_short_and_missing_files() {
    let short = scratch_file("short", &[0x00, 0x00]);
    assert!(!is_sub_file(&short).unwrap());
    assert!(!is_idx_file(&short).unwrap());
    fs::remove_file(&short).unwrap();
    assert!(matches!(is_sub_file(&short), Err(Error::Io { .. })));
}
