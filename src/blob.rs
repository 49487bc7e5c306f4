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

//! Content-addressed blob storage in the OCI layout shape (`blobs/sha256/<hex>`).

use std::fs;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::util::{advise_sequential, link_or_copy, split_digest, IO_BUF_SIZE};

pub const INDEX_FILE: &str = "index.json";
pub const OCI_LAYOUT_FILE: &str = "oci-layout";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    pub size: u64,
    pub digest: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<serde_json::Value>,
}

impl BlobDescriptor {
    pub fn to_json(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        if let Some(ref mt) = self.media_type {
            map.insert("mediaType".to_string(), serde_json::Value::String(mt.clone()));
        }
        map.insert("size".to_string(), serde_json::Value::Number(self.size.into()));
        map.insert("digest".to_string(), serde_json::Value::String(self.digest.clone()));
        if let Some(ref p) = self.platform {
            map.insert("platform".to_string(), p.clone());
        }
        if let Some(ref a) = self.annotations {
            map.insert("annotations".to_string(), a.clone());
        }
        serde_json::Value::Object(map)
    }

    pub fn with_media_type(mut self, media_type: &str) -> Self {
        self.media_type = Some(media_type.to_string());
        self
    }

    pub fn hex(&self) -> &str {
        split_digest(&self.digest)
            .map(|(_, hex)| hex)
            .unwrap_or(&self.digest)
    }
}

/// A directory holding `blobs/sha256`. Used both for the on-disk layer caches and
/// for the OCI layouts assembled from them.
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let store = BlobStore { root: root.into() };
        fs::create_dir_all(store.blob_dir())
            .with_context(|| format!("creating blob directory in {}", store.root.display()))?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn blob_dir(&self) -> PathBuf {
        self.root.join("blobs").join("sha256")
    }

    pub fn path_for(&self, digest: &str) -> Result<PathBuf> {
        let (algorithm, hex) =
            split_digest(digest).with_context(|| format!("invalid digest '{}'", digest))?;
        Ok(self.root.join("blobs").join(algorithm).join(hex))
    }

    pub fn contains(&self, digest: &str) -> bool {
        self.path_for(digest).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Temp file on the same filesystem as the blobs, for later `persist_temp`.
    pub fn temp_file(&self) -> Result<NamedTempFile> {
        let tmp_dir = self.root.join(".tmp");
        fs::create_dir_all(&tmp_dir)?;
        Ok(NamedTempFile::new_in(&tmp_dir)?)
    }

    pub fn write_bytes(&self, media_type: &str, data: &[u8]) -> Result<BlobDescriptor> {
        let hexdigest = format!("{:x}", Sha256::digest(data));
        let dest = self.blob_dir().join(&hexdigest);
        if !dest.is_file() {
            let mut tmp = self.temp_file()?;
            tmp.write_all(data)?;
            tmp.flush()?;
            tmp.persist(&dest)
                .map_err(|e| anyhow::anyhow!("persist blob: {}", e))?;
        }
        Ok(BlobDescriptor {
            media_type: Some(media_type.to_string()),
            size: data.len() as u64,
            digest: format!("sha256:{}", hexdigest),
            platform: None,
            annotations: None,
        })
    }

    pub fn write_json(&self, media_type: &str, value: &serde_json::Value) -> Result<BlobDescriptor> {
        self.write_bytes(media_type, &serde_json::to_vec(value)?)
    }

    /// Hash and copy an existing file into the store in a single pass.
    pub fn import_file(&self, media_type: Option<&str>, source_path: &Path) -> Result<BlobDescriptor> {
        let mut file = fs::File::open(source_path)
            .with_context(|| format!("opening {}", source_path.display()))?;
        advise_sequential(&file);
        let size = file.metadata()?.len();

        let dest_tmp = self.temp_file()?;
        let mut hasher = Sha256::new();
        {
            let mut dest_writer = BufWriter::new(dest_tmp.reopen()?);
            let mut buf = vec![0u8; IO_BUF_SIZE];
            loop {
                let n = file.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
                dest_writer.write_all(&buf[..n])?;
            }
            dest_writer.flush()?;
        }
        let hexdigest = format!("{:x}", hasher.finalize());
        self.persist_temp(media_type, dest_tmp, size, &hexdigest)
    }

    /// Move a temp file whose digest was computed while writing it into place.
    pub fn persist_temp(
        &self,
        media_type: Option<&str>,
        temp_file: NamedTempFile,
        size: u64,
        hexdigest: &str,
    ) -> Result<BlobDescriptor> {
        let dest = self.blob_dir().join(hexdigest);
        temp_file
            .persist(&dest)
            .map_err(|e| anyhow::anyhow!("persist blob: {}", e))?;
        Ok(BlobDescriptor {
            media_type: media_type.map(str::to_string),
            size,
            digest: format!("sha256:{}", hexdigest),
            platform: None,
            annotations: None,
        })
    }

    /// Make a blob of another store available here without rewriting it.
    pub fn link_from(&self, other: &BlobStore, digest: &str) -> Result<()> {
        let source = other.path_for(digest)?;
        if !source.is_file() {
            anyhow::bail!("blob {} missing from {}", digest, other.root.display());
        }
        link_or_copy(&source, &self.path_for(digest)?)
            .with_context(|| format!("linking blob {}", digest))
    }

    /// Writes `index.json` and `oci-layout`, making the root a complete layout.
    pub fn write_index(&self, manifests: &[serde_json::Value]) -> Result<()> {
        let index = serde_json::json!({
            "schemaVersion": 2,
            "manifests": manifests,
        });
        fs::write(self.root.join(INDEX_FILE), serde_json::to_vec(&index)?)?;
        fs::write(
            self.root.join(OCI_LAYOUT_FILE),
            serde_json::to_vec(&serde_json::json!({ "imageLayoutVersion": "1.0.0" }))?,
        )?;
        Ok(())
    }

    pub fn read_json(&self, digest: &str) -> Result<serde_json::Value> {
        let path = self.path_for(digest)?;
        let file = fs::File::open(&path)
            .with_context(|| format!("opening blob {}", path.display()))?;
        serde_json::from_reader(std::io::BufReader::new(file))
            .with_context(|| format!("parsing blob {}", digest))
    }
}
