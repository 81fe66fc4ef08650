//! Content-addressed file store under `<root>/objects`.

use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use dstrack_core::errors::{ErrorInfo, TrackError};
use dstrack_core::hash::is_sha256_hex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, trace};
use walkdir::WalkDir;

const CHUNK: usize = 64 * 1024;

/// Address and length of a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobRef {
    pub sha256: String,
    pub size: u64,
}

#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    /// Opens (and creates) the object directory.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, TrackError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|err| TrackError::io("store.objects_dir", &root, err))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/<sha[0..2]>/<sha[2..]>`.
    pub fn path_for(&self, sha256: &str) -> Result<PathBuf, TrackError> {
        if !is_sha256_hex(sha256) {
            return Err(TrackError::Store(
                ErrorInfo::new("store.blob_address", "not a sha256 hex digest")
                    .with_context("sha256", sha256),
            ));
        }
        Ok(self.root.join(&sha256[..2]).join(&sha256[2..]))
    }

    pub fn contains(&self, sha256: &str) -> bool {
        self.path_for(sha256)
            .map(|path| path.is_file())
            .unwrap_or(false)
    }

    /// Streams `src` into the store, returning its address.
    ///
    /// Storing bytes that are already present leaves the existing object
    /// untouched.
    pub fn put_file(&self, src: &Path) -> Result<BlobRef, TrackError> {
        let file = File::open(src).map_err(|err| TrackError::io("store.blob_source", src, err))?;
        self.put_reader(file)
            .map_err(|err| match err {
                TrackError::Io(info) if !info.context.contains_key("path") => {
                    TrackError::Io(info.with_path(src))
                }
                other => other,
            })
    }

    pub fn put_bytes(&self, bytes: &[u8]) -> Result<BlobRef, TrackError> {
        self.put_reader(bytes)
    }

    fn put_reader<R: Read>(&self, mut reader: R) -> Result<BlobRef, TrackError> {
        let mut tmp = NamedTempFile::new_in(&self.root)
            .map_err(|err| TrackError::io("store.blob_tmp", &self.root, err))?;
        let (sha256, size) = copy_hashing(&mut reader, tmp.as_file_mut())
            .map_err(|err| TrackError::Io(ErrorInfo::new("store.blob_write", err.to_string())))?;
        tmp.as_file_mut()
            .sync_all()
            .map_err(|err| TrackError::io("store.blob_write", tmp.path(), err))?;
        let dest = self.path_for(&sha256)?;
        if dest.is_file() {
            trace!(%sha256, "blob already present");
            return Ok(BlobRef { sha256, size });
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| TrackError::io("store.blob_dir", parent, err))?;
        }
        tmp.persist(&dest)
            .map_err(|err| TrackError::io("store.blob_persist", &dest, err.error))?;
        debug!(%sha256, size, "stored blob");
        Ok(BlobRef { sha256, size })
    }

    /// Re-hashes a blob and returns its size.
    pub fn verify(&self, sha256: &str) -> Result<u64, TrackError> {
        let path = self.path_for(sha256)?;
        let mut file = File::open(&path).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                TrackError::Store(
                    ErrorInfo::new("store.blob_missing", "blob not found")
                        .with_context("sha256", sha256),
                )
            } else {
                TrackError::io("store.blob_read", &path, err)
            }
        })?;
        let (actual, size) = copy_hashing(&mut file, &mut io::sink())
            .map_err(|err| TrackError::io("store.blob_read", &path, err))?;
        if actual != sha256 {
            return Err(corrupt(sha256, &actual));
        }
        Ok(size)
    }

    /// Verified read of a whole blob.
    pub fn read(&self, sha256: &str) -> Result<Vec<u8>, TrackError> {
        let path = self.path_for(sha256)?;
        let bytes = fs::read(&path).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                TrackError::Store(
                    ErrorInfo::new("store.blob_missing", "blob not found")
                        .with_context("sha256", sha256),
                )
            } else {
                TrackError::io("store.blob_read", &path, err)
            }
        })?;
        let actual = hex::encode(Sha256::digest(&bytes));
        if actual != sha256 {
            return Err(corrupt(sha256, &actual));
        }
        Ok(bytes)
    }

    /// Copies a verified blob to `dest`, creating parent directories.
    pub fn copy_out(&self, sha256: &str, dest: &Path) -> Result<u64, TrackError> {
        self.verify(sha256)?;
        if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|err| TrackError::io("store.fetch_dir", parent, err))?;
        }
        let src = self.path_for(sha256)?;
        fs::copy(&src, dest).map_err(|err| TrackError::io("store.fetch_copy", dest, err))
    }

    /// Addresses of every object on disk, sorted.
    pub fn list(&self) -> Result<Vec<String>, TrackError> {
        let mut out = Vec::new();
        for entry in WalkDir::new(&self.root).min_depth(2).max_depth(2) {
            let entry = entry.map_err(|err| {
                TrackError::Io(
                    ErrorInfo::new("store.blob_walk", err.to_string()).with_path(&self.root),
                )
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let prefix = entry
                .path()
                .parent()
                .and_then(|p| p.file_name())
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            let rest = entry.file_name().to_string_lossy();
            let candidate = format!("{prefix}{rest}");
            if is_sha256_hex(&candidate) {
                out.push(candidate);
            }
        }
        out.sort();
        Ok(out)
    }

    /// Deletes a blob; missing blobs are not an error.
    pub fn remove(&self, sha256: &str) -> Result<bool, TrackError> {
        let path = self.path_for(sha256)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(TrackError::io("store.blob_remove", &path, err)),
        }
    }
}

fn corrupt(expected: &str, actual: &str) -> TrackError {
    TrackError::Store(
        ErrorInfo::new("store.blob_corrupt", "blob content does not match its address")
            .with_context("expected", expected)
            .with_context("actual", actual),
    )
}

fn copy_hashing<R: Read + ?Sized, W: Write + ?Sized>(
    reader: &mut R,
    writer: &mut W,
) -> io::Result<(String, u64)> {
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK];
    let mut total = 0u64;
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        };
        hasher.update(&buf[..n]);
        writer.write_all(&buf[..n])?;
        total += n as u64;
    }
    writer.flush()?;
    Ok((hex::encode(hasher.finalize()), total))
}
