//! Append-only registry of created sandboxes.
//!
//! One descriptor per line, appended on create and scanned top-to-bottom on
//! enter. There is no locking and no deduplication: concurrent writers may
//! interleave lines, and `delete` never prunes. The management surface reads
//! (and may rewrite) this file; the engine only appends.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::config::SandboxDescriptor;
use crate::utils::errors::SandboxResult;

pub struct Registry {
    path: PathBuf,
}

impl Registry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one record. The file is opened in append mode per write so
    /// that interleaving with other writers stays line-granular.
    pub fn append(&self, descriptor: &SandboxDescriptor) -> SandboxResult<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", descriptor.to_line())?;
        Ok(())
    }

    /// First entry whose name matches, scanning top to bottom; later
    /// duplicates are ignored. A missing registry file is an empty registry.
    pub fn find(&self, name: &str) -> SandboxResult<Option<SandboxDescriptor>> {
        for descriptor in self.scan()? {
            if descriptor.name == name {
                return Ok(Some(descriptor));
            }
        }
        Ok(None)
    }

    /// Every parseable entry, in file order.
    pub fn entries(&self) -> SandboxResult<Vec<SandboxDescriptor>> {
        self.scan()
    }

    fn scan(&self) -> SandboxResult<Vec<SandboxDescriptor>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut entries = Vec::new();
        for line in contents.lines() {
            if line.trim().is_empty() {
                continue;
            }
            match SandboxDescriptor::from_line(line) {
                Ok(descriptor) => entries.push(descriptor),
                Err(e) => warn!("skipping registry line: {e}"),
            }
        }
        Ok(entries)
    }
}
