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

//! Deduplicates base image downloads across concurrent builds.
//!
//! One slot per (image, cache directory). The first caller populates the slot
//! while holding its lock; concurrent callers block on the same lock and reuse
//! the outcome. A failed population stays failed for the lifetime of the cache.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;

use crate::error::{Error, Result};

type DownloadKey = (String, PathBuf);

#[derive(Debug, Default)]
enum DownloadSlot {
    #[default]
    Empty,
    Ready(PathBuf),
    Failed(String),
}

#[derive(Debug, Default)]
pub struct DownloadCache {
    slots: DashMap<DownloadKey, Arc<Mutex<DownloadSlot>>>,
}

impl DownloadCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the path for `(image, cache_dir)`, running `populate` at most once
    /// per key.
    pub fn get_or_populate<F>(&self, image: &str, cache_dir: &Path, populate: F) -> Result<PathBuf>
    where
        F: FnOnce() -> Result<PathBuf>,
    {
        let key = (image.to_string(), cache_dir.to_path_buf());
        let slot = self.slots.entry(key).or_default().clone();

        let mut guard = slot.lock().map_err(|_| {
            Error::Containerization(anyhow::anyhow!(
                "download of {} panicked in another build",
                image
            ))
        })?;
        match &*guard {
            DownloadSlot::Ready(path) => {
                tracing::debug!(image, path = %path.display(), "reusing downloaded base image");
                return Ok(path.clone());
            }
            DownloadSlot::Failed(message) => {
                return Err(Error::Containerization(anyhow::anyhow!(
                    "download of {} failed earlier in this process: {}",
                    image,
                    message
                )));
            }
            DownloadSlot::Empty => {}
        }

        match populate() {
            Ok(path) => {
                *guard = DownloadSlot::Ready(path.clone());
                Ok(path)
            }
            Err(err) => {
                *guard = DownloadSlot::Failed(err.to_string());
                Err(err)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Readable directory name for an image in the base cache: `_` and `-` are
/// doubled, then `:` becomes `_` and `/` becomes `-`. Separators next to a
/// literal `-` or `_` can still collide: `a/-b` and `a-/b` both give `a---b`.
pub fn derive_key(image: &str) -> String {
    let mut key = String::with_capacity(image.len() * 2);
    for c in image.chars() {
        match c {
            '_' => key.push_str("__"),
            '-' => key.push_str("--"),
            ':' => key.push('_'),
            '/' => key.push('-'),
            other => key.push(other),
        }
    }
    key
}
