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

//! Build outputs next to the image: digest, image ID and a JSON summary.

use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::entrypoint::write_file_conservatively;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageMetadataOutput {
    pub image: String,
    pub image_id: String,
    pub image_digest: String,
    pub tags: Vec<String>,
    pub image_pushed: bool,
}

/// Locations of the per-image output files, `<directory>/<name>.<ext>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    directory: PathBuf,
    name: String,
}

impl OutputPaths {
    pub fn new(directory: impl Into<PathBuf>, name: impl Into<String>) -> Self {
        OutputPaths {
            directory: directory.into(),
            name: name.into(),
        }
    }

    fn with_extension(&self, extension: &str) -> PathBuf {
        self.directory.join(format!("{}.{}", self.name, extension))
    }

    pub fn digest(&self) -> PathBuf {
        self.with_extension("digest")
    }

    pub fn image_id(&self) -> PathBuf {
        self.with_extension("id")
    }

    pub fn metadata(&self) -> PathBuf {
        self.with_extension("json")
    }

    pub fn tar(&self) -> PathBuf {
        self.with_extension("tar")
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

/// Writes the three metadata files. Files whose content is unchanged are left alone.
pub fn write_metadata(paths: &OutputPaths, output: &ImageMetadataOutput) -> Result<()> {
    write_file_conservatively(&paths.digest(), &output.image_digest)?;
    write_file_conservatively(&paths.image_id(), &output.image_id)?;
    let json = serde_json::to_string(output)?;
    write_file_conservatively(&paths.metadata(), &json)?;
    tracing::info!(
        image = %output.image,
        digest = %output.image_digest,
        pushed = output.image_pushed,
        "wrote image metadata"
    );
    Ok(())
}
