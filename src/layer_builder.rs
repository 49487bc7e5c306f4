// Copyright (c) 2019, 2020 Codethink Ltd.
//
// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included in all
// copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! Layer model and the reproducible tar writer.
//!
//! Every entry is written with uid/gid 0, a fixed modification time and explicit
//! permissions, in lexicographic order of its container path. Parent directories
//! missing from the entry list are synthesized so extraction never depends on
//! implicit directory creation.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

use crate::timestamp::{unix_seconds, ModificationTimeProvider};

pub const DEFAULT_FILE_PERMISSIONS: u32 = 0o644;
pub const DEFAULT_DIRECTORY_PERMISSIONS: u32 = 0o755;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerRole {
    Dependencies,
    SnapshotDependencies,
    ProjectDependencies,
    Resources,
    Classes,
    JvmArgFiles,
    ExtraFiles,
}

impl LayerRole {
    pub fn name(&self) -> &'static str {
        match self {
            LayerRole::Dependencies => "dependencies",
            LayerRole::SnapshotDependencies => "snapshot dependencies",
            LayerRole::ProjectDependencies => "project dependencies",
            LayerRole::Resources => "resources",
            LayerRole::Classes => "classes",
            LayerRole::JvmArgFiles => "jvm arg files",
            LayerRole::ExtraFiles => "extra files",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerEntry {
    pub source: PathBuf,
    /// Absolute, `/`-separated.
    pub container_path: String,
    pub permissions: Option<u32>,
    pub modification_time: DateTime<Utc>,
}

impl LayerEntry {
    pub fn new(
        source: impl Into<PathBuf>,
        container_path: impl Into<String>,
        modification_time: DateTime<Utc>,
    ) -> Self {
        LayerEntry {
            source: source.into(),
            container_path: container_path.into(),
            permissions: None,
            modification_time,
        }
    }

    pub fn with_permissions(mut self, permissions: Option<u32>) -> Self {
        self.permissions = permissions;
        self
    }
}

#[derive(Debug, Clone)]
pub struct FileEntriesLayer {
    role: LayerRole,
    entries: Vec<LayerEntry>,
}

impl FileEntriesLayer {
    pub fn new(role: LayerRole) -> Self {
        FileEntriesLayer {
            role,
            entries: Vec::new(),
        }
    }

    pub fn role(&self) -> LayerRole {
        self.role
    }

    pub fn name(&self) -> &'static str {
        self.role.name()
    }

    pub fn add_entry(&mut self, entry: LayerEntry) {
        self.entries.push(entry);
    }

    /// Adds `source` and everything below it under `container_dir`.
    /// `source` itself maps to `container_dir`.
    pub fn add_directory(
        &mut self,
        source: &Path,
        container_dir: &str,
        times: &ModificationTimeProvider,
    ) -> Result<()> {
        for entry in jwalk::WalkDir::new(source).sort(true).skip_hidden(false) {
            let entry = entry.with_context(|| format!("walking {}", source.display()))?;
            let path = entry.path();
            let relative = path.strip_prefix(source).unwrap_or(&path);
            self.add_entry(LayerEntry::new(
                path.clone(),
                join_container_path(container_dir, relative),
                times.get(),
            ));
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries in canonical order. A container path listed twice keeps its last entry.
    pub fn entries(&self) -> Vec<&LayerEntry> {
        let mut by_path: BTreeMap<&str, &LayerEntry> = BTreeMap::new();
        for entry in &self.entries {
            by_path.insert(entry.container_path.as_str(), entry);
        }
        by_path.into_values().collect()
    }

    /// Fingerprint of everything that determines the layer tar: container paths,
    /// permissions, times and the size and mtime of each source.
    pub fn selector(&self) -> Result<String> {
        let mut hasher = Sha256::new();
        for entry in self.entries() {
            let meta = fs::symlink_metadata(&entry.source)
                .with_context(|| format!("stat {}", entry.source.display()))?;
            let source_mtime = meta
                .modified()
                .ok()
                .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                .map(|d| d.as_nanos())
                .unwrap_or(0);
            let line = format!(
                "{}\0{}\0{:?}\0{}\0{}\0{}\0{}\n",
                entry.container_path,
                entry.source.display(),
                entry.permissions,
                entry.modification_time.timestamp(),
                meta.is_dir(),
                meta.len(),
                source_mtime,
            );
            hasher.update(line.as_bytes());
        }
        Ok(format!("{:x}", hasher.finalize()))
    }
}

/// `container_dir` joined with a host-relative path, `/`-separated.
pub fn join_container_path(container_dir: &str, relative: &Path) -> String {
    let mut path = container_dir.trim_end_matches('/').to_string();
    for component in relative.components() {
        if let std::path::Component::Normal(part) = component {
            path.push('/');
            path.push_str(&part.to_string_lossy());
        }
    }
    if path.is_empty() {
        "/".to_string()
    } else {
        path
    }
}

/// Writes the layer as a reproducible tar stream.
pub fn write_layer<W: Write>(output: &mut tar::Builder<W>, layer: &FileEntriesLayer) -> Result<()> {
    let parent_time = unix_seconds(&ModificationTimeProvider::default().get());
    let entries = layer.entries();
    let explicit: BTreeMap<&str, &LayerEntry> = entries
        .iter()
        .map(|e| (e.container_path.trim_end_matches('/'), *e))
        .collect();

    // Every path to emit, parents included, in canonical order.
    let mut paths: BTreeMap<String, Option<&LayerEntry>> = BTreeMap::new();
    for (path, entry) in &explicit {
        let mut parent = Path::new(path).parent();
        while let Some(dir) = parent {
            let dir_str = dir.to_string_lossy();
            if dir_str == "/" || dir_str.is_empty() {
                break;
            }
            paths.entry(dir_str.to_string()).or_insert(None);
            parent = dir.parent();
        }
        paths.insert(path.to_string(), Some(*entry));
    }

    for (path, entry) in paths {
        let name = path.trim_start_matches('/');
        if name.is_empty() {
            continue;
        }
        match entry {
            None => append_directory(output, name, DEFAULT_DIRECTORY_PERMISSIONS, parent_time)?,
            Some(entry) => append_entry(output, name, entry)?,
        }
    }
    Ok(())
}

fn new_header(entry_type: tar::EntryType, mode: u32, mtime: u64, size: u64) -> tar::Header {
    let mut header = tar::Header::new_gnu();
    header.set_entry_type(entry_type);
    header.set_mode(mode);
    header.set_uid(0);
    header.set_gid(0);
    header.set_mtime(mtime);
    header.set_size(size);
    header
}

fn append_directory<W: Write>(
    output: &mut tar::Builder<W>,
    name: &str,
    mode: u32,
    mtime: u64,
) -> Result<()> {
    let mut header = new_header(tar::EntryType::Directory, mode, mtime, 0);
    output.append_data(&mut header, format!("{}/", name), std::io::empty())?;
    Ok(())
}

fn append_entry<W: Write>(output: &mut tar::Builder<W>, name: &str, entry: &LayerEntry) -> Result<()> {
    let meta = fs::metadata(&entry.source)
        .with_context(|| format!("stat {}", entry.source.display()))?;
    let mtime = unix_seconds(&entry.modification_time);

    if meta.is_dir() {
        let mode = entry.permissions.unwrap_or(DEFAULT_DIRECTORY_PERMISSIONS);
        return append_directory(output, name, mode, mtime);
    }
    if !meta.is_file() {
        tracing::debug!(path = %entry.source.display(), "skipping special file");
        return Ok(());
    }

    let mode = entry.permissions.unwrap_or(DEFAULT_FILE_PERMISSIONS);
    let mut header = new_header(tar::EntryType::Regular, mode, mtime, meta.len());
    let file = fs::File::open(&entry.source)
        .with_context(|| format!("opening {}", entry.source.display()))?;
    crate::util::advise_sequential(&file);
    output.append_data(&mut header, name, file)?;
    Ok(())
}
