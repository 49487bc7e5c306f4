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

//! Layers built from arbitrary host directories.

use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::layer_builder::{join_container_path, FileEntriesLayer, LayerEntry, LayerRole};
use crate::timestamp::ModificationTimeProvider;

/// `*` and `?` stay within one path component, `**` spans directories.
/// `**/` also matches no directory at all, so `/app/**/*.sh` covers `/app/run.sh`.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern)
        .map_err(|e| Error::config(format!("invalid glob '{}': {}", pattern, e)))
}

/// Parses `"755"` or `"0755"`.
pub fn parse_permissions(octal: &str) -> Result<u32> {
    let valid = (octal.len() == 3 || octal.len() == 4) && octal.chars().all(|c| ('0'..='7').contains(&c));
    if !valid {
        return Err(Error::config(format!(
            "invalid permissions '{}': expected 3 or 4 octal digits",
            octal
        )));
    }
    u32::from_str_radix(octal, 8)
        .map_err(|e| Error::config(format!("invalid permissions '{}': {}", octal, e)))
}

/// Container path or glob → permission bits. An exact path wins over any glob;
/// among globs the first declared one wins.
#[derive(Debug, Clone, Default)]
pub struct PermissionRules {
    exact: FxHashMap<String, u32>,
    globs: Vec<(Pattern, u32)>,
}

impl PermissionRules {
    pub fn parse(rules: &[(String, String)]) -> Result<Self> {
        let mut parsed = PermissionRules::default();
        for (path, octal) in rules {
            let mode = parse_permissions(octal)?;
            parsed.exact.entry(path.clone()).or_insert(mode);
            parsed.globs.push((compile(path)?, mode));
        }
        Ok(parsed)
    }

    pub fn permissions_for(&self, container_path: &str) -> Option<u32> {
        if let Some(mode) = self.exact.get(container_path) {
            return Some(*mode);
        }
        self.globs
            .iter()
            .find(|(pattern, _)| pattern.matches_with(container_path, MATCH_OPTIONS))
            .map(|(_, mode)| *mode)
    }
}

/// One host directory copied into the image, with its filters compiled.
#[derive(Debug, Clone)]
pub struct ExtraDirectory {
    from: PathBuf,
    into: String,
    includes: Vec<Pattern>,
    excludes: Vec<Pattern>,
}

impl ExtraDirectory {
    pub fn new(from: PathBuf, into: &str, includes: &[String], excludes: &[String]) -> Result<Self> {
        if !into.starts_with('/') {
            return Err(Error::config(format!(
                "extra directory target '{}' must be an absolute path",
                into
            )));
        }
        Ok(ExtraDirectory {
            from,
            into: into.to_string(),
            includes: includes.iter().map(|p| compile(p)).collect::<Result<_>>()?,
            excludes: excludes.iter().map(|p| compile(p)).collect::<Result<_>>()?,
        })
    }

    /// Excludes are applied first; a path matching any exclude never passes.
    fn accepts(&self, relative: &str) -> bool {
        if self
            .excludes
            .iter()
            .any(|p| p.matches_with(relative, MATCH_OPTIONS))
        {
            return false;
        }
        self.includes.is_empty()
            || self
                .includes
                .iter()
                .any(|p| p.matches_with(relative, MATCH_OPTIONS))
    }

    /// `None` when the source directory does not exist.
    pub fn build_layer(
        &self,
        permissions: &PermissionRules,
        times: &ModificationTimeProvider,
    ) -> Result<Option<FileEntriesLayer>> {
        if !self.from.exists() {
            tracing::debug!(path = %self.from.display(), "skipping missing extra directory");
            return Ok(None);
        }

        let mut layer = FileEntriesLayer::new(LayerRole::ExtraFiles);
        for entry in jwalk::WalkDir::new(&self.from).sort(true).skip_hidden(false) {
            let entry =
                entry.map_err(|e| Error::io(self.from.clone(), std::io::Error::other(e)))?;
            if entry.depth == 0 {
                continue;
            }
            let path = entry.path();
            let relative = relative_unix(&path, &self.from);
            if !self.accepts(&relative) {
                continue;
            }
            let container_path = join_container_path(&self.into, Path::new(&relative));
            let mode = permissions.permissions_for(&container_path);
            layer.add_entry(
                LayerEntry::new(path, container_path, times.get()).with_permissions(mode),
            );
        }
        Ok(Some(layer))
    }
}

fn relative_unix(path: &Path, base: &Path) -> String {
    let relative = path.strip_prefix(base).unwrap_or(path);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
