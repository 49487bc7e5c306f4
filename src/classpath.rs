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

//! Splits the runtime classpath into layer categories.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use rustc_hash::FxHashMap;

use crate::error::{Error, Result};

const SNAPSHOT_MARKER: &str = "SNAPSHOT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    /// Output of a sibling module of the same build.
    Project,
    /// Mutable artifact, changes without a version bump.
    Snapshot,
    Stable,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyFile {
    pub path: PathBuf,
    pub kind: DependencyKind,
}

#[derive(Debug, Clone, Default)]
pub struct ClasspathInputs {
    /// The resolved runtime closure, in classpath order.
    pub runtime_classpath: Vec<PathBuf>,
    pub project_dependencies: Vec<PathBuf>,
    pub classes_dirs: Vec<PathBuf>,
    pub resources_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClasspathPartition {
    pub classes: Vec<PathBuf>,
    pub resources: Option<PathBuf>,
    pub project_dependencies: Vec<PathBuf>,
    pub snapshot_dependencies: Vec<PathBuf>,
    pub dependencies: Vec<PathBuf>,
}

impl ClasspathPartition {
    /// All dependency files: project, snapshot, then stable.
    pub fn dependency_files(&self) -> Vec<DependencyFile> {
        let tagged = |paths: &[PathBuf], kind: DependencyKind| {
            paths
                .iter()
                .map(|p| DependencyFile {
                    path: p.clone(),
                    kind,
                })
                .collect::<Vec<_>>()
        };
        let mut files = tagged(&self.project_dependencies, DependencyKind::Project);
        files.extend(tagged(&self.snapshot_dependencies, DependencyKind::Snapshot));
        files.extend(tagged(&self.dependencies, DependencyKind::Stable));
        files
    }

    /// Library jars in runtime classpath order. Only regular `.jar` files that
    /// landed in one of the dependency sets are kept, each once.
    pub fn classpath_jars<'a>(&self, runtime_classpath: &'a [PathBuf]) -> Vec<&'a Path> {
        let libraries: BTreeSet<&Path> = self
            .project_dependencies
            .iter()
            .chain(&self.snapshot_dependencies)
            .chain(&self.dependencies)
            .map(PathBuf::as_path)
            .collect();
        let mut seen = BTreeSet::new();
        runtime_classpath
            .iter()
            .map(PathBuf::as_path)
            .filter(|p| {
                libraries.contains(*p)
                    && p.is_file()
                    && p.extension().is_some_and(|e| e == "jar")
            })
            .filter(|p| seen.insert(*p))
            .collect()
    }

    pub fn all_paths(&self) -> Vec<&Path> {
        self.classes
            .iter()
            .chain(self.resources.iter())
            .chain(self.project_dependencies.iter())
            .chain(self.snapshot_dependencies.iter())
            .chain(self.dependencies.iter())
            .map(PathBuf::as_path)
            .collect()
    }
}

fn keep_existing(paths: &[PathBuf]) -> Vec<PathBuf> {
    let mut seen = BTreeSet::new();
    paths
        .iter()
        .filter(|p| {
            if !p.exists() {
                tracing::debug!(path = %p.display(), "skipping missing classpath entry");
                return false;
            }
            seen.insert(p.to_path_buf())
        })
        .cloned()
        .collect()
}

/// Partitions by elimination, so the five sets are disjoint and cover every
/// existing input path.
pub fn partition(inputs: &ClasspathInputs) -> ClasspathPartition {
    let classes = keep_existing(&inputs.classes_dirs);
    let resources = inputs.resources_dir.as_ref().filter(|r| {
        let exists = r.exists();
        if !exists {
            tracing::debug!(path = %r.display(), "skipping missing resources directory");
        }
        exists
    });

    let classes_set: BTreeSet<&PathBuf> = classes.iter().collect();
    let project_dependencies: Vec<PathBuf> = keep_existing(&inputs.project_dependencies)
        .into_iter()
        .filter(|p| !classes_set.contains(p) && Some(p) != resources)
        .collect();
    let project_set: BTreeSet<&PathBuf> = project_dependencies.iter().collect();

    let non_project: Vec<PathBuf> = keep_existing(&inputs.runtime_classpath)
        .into_iter()
        .filter(|p| !classes_set.contains(p) && !project_set.contains(p) && Some(p) != resources)
        .collect();

    let (snapshot_dependencies, dependencies): (Vec<PathBuf>, Vec<PathBuf>) = non_project
        .into_iter()
        .partition(|p| file_name(p).contains(SNAPSHOT_MARKER));

    ClasspathPartition {
        classes,
        resources: resources.cloned(),
        project_dependencies,
        snapshot_dependencies,
        dependencies,
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// Name of each file under `libs/`. Basenames occurring more than once get their
/// byte size appended to the stem: `<stem>-<size>.<ext>`.
pub fn container_file_names(files: &[&Path]) -> Result<Vec<String>> {
    let mut counts: FxHashMap<String, usize> = FxHashMap::default();
    for file in files {
        *counts.entry(file_name(file)).or_default() += 1;
    }

    files
        .iter()
        .map(|file| {
            let name = file_name(file);
            if counts.get(&name).copied().unwrap_or(0) < 2 {
                return Ok(name);
            }
            let size = std::fs::metadata(file)
                .map_err(|e| Error::io(file.to_path_buf(), e))?
                .len();
            Ok(match name.rsplit_once('.') {
                Some((stem, extension)) => format!("{}-{}.{}", stem, size, extension),
                None => format!("{}-{}.", name, size),
            })
        })
        .collect()
}
