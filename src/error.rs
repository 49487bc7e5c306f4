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

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Pipeline states of a single image build, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum BuildStage {
    Configured,
    BaseResolved,
    DependenciesPartitioned,
    LayersComposed,
    Containerized,
    MetadataWritten,
}

impl fmt::Display for BuildStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildStage::Configured => "reading configuration",
            BuildStage::BaseResolved => "resolving base image",
            BuildStage::DependenciesPartitioned => "partitioning dependencies",
            BuildStage::LayersComposed => "composing layers",
            BuildStage::Containerized => "containerizing",
            BuildStage::MetadataWritten => "writing image metadata",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed user input. Always fatal, raised before any I/O.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A credential source exists but could not be used.
    #[error("credential source {source_name} failed: {message}")]
    CredentialSource { source_name: String, message: String },

    #[error("containerization failed: {0:#}")]
    Containerization(#[from] anyhow::Error),

    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{stage} failed: {source}")]
    Stage {
        stage: BuildStage,
        source: Box<Error>,
    },
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Error::Configuration(message.into())
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Attribute this error to a pipeline stage. Already attributed errors are kept as is.
    pub fn at(self, stage: BuildStage) -> Self {
        match self {
            Error::Stage { .. } => self,
            other => Error::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage a build failed in, if attributed.
    pub fn stage(&self) -> Option<BuildStage> {
        match self {
            Error::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        match self {
            Error::Configuration(_) => true,
            Error::Stage { source, .. } => source.is_configuration(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stage_is_named_in_message() {
        let err = Error::config("bad port 'x'").at(BuildStage::LayersComposed);
        assert_eq!(err.stage(), Some(BuildStage::LayersComposed));
        assert!(err.is_configuration());
        assert_eq!(
            err.to_string(),
            "composing layers failed: invalid configuration: bad port 'x'"
        );
    }

    #[test]
    fn first_stage_attribution_wins() {
        let err = Error::config("x")
            .at(BuildStage::BaseResolved)
            .at(BuildStage::Containerized);
        assert_eq!(err.stage(), Some(BuildStage::BaseResolved));
    }
}
