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

//! Image reference parsing.
//!
//! A reference has the shape `[registry/]repository[:tag][@digest]`. Docker Hub
//! short names expand the way the docker CLI expands them, so `eclipse-temurin:21`
//! becomes `registry-1.docker.io/library/eclipse-temurin:21`.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub const DOCKER_HUB_REGISTRY: &str = "registry-1.docker.io";
pub const DEFAULT_TAG: &str = "latest";

pub const REGISTRY_IMAGE_PREFIX: &str = "registry://";
pub const DOCKER_DAEMON_IMAGE_PREFIX: &str = "docker://";
pub const TAR_IMAGE_PREFIX: &str = "tar://";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ImageReference {
    registry: String,
    repository: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageReference {
    pub fn parse(reference: &str) -> Result<Self> {
        let invalid = |why: &str| Error::config(format!("invalid image reference '{}': {}", reference, why));

        if reference.is_empty() {
            return Err(invalid("empty"));
        }

        let (name, digest) = match reference.split_once('@') {
            Some((name, digest)) => {
                validate_digest(digest).map_err(|why| invalid(&why))?;
                (name, Some(digest.to_string()))
            }
            None => (reference, None),
        };

        let (registry, remainder) = match name.split_once('/') {
            Some((first, rest))
                if first.contains('.') || first.contains(':') || first == "localhost" =>
            {
                (first, rest)
            }
            _ => (DOCKER_HUB_REGISTRY, name),
        };

        let (repository, tag) = match remainder.rsplit_once(':') {
            Some((repo, tag)) if !tag.contains('/') => (repo, Some(tag.to_string())),
            _ => (remainder, None),
        };

        validate_registry(registry).map_err(|why| invalid(&why))?;
        validate_repository(repository).map_err(|why| invalid(&why))?;
        if let Some(ref tag) = tag {
            validate_tag(tag).map_err(|why| invalid(&why))?;
        }

        let registry = match registry {
            "docker.io" | "index.docker.io" => DOCKER_HUB_REGISTRY,
            other => other,
        };
        let repository = if registry == DOCKER_HUB_REGISTRY && !repository.contains('/') {
            format!("library/{}", repository)
        } else {
            repository.to_string()
        };
        let tag = match (tag, &digest) {
            (None, None) => Some(DEFAULT_TAG.to_string()),
            (tag, _) => tag,
        };

        Ok(ImageReference {
            registry: registry.to_string(),
            repository,
            tag,
            digest,
        })
    }

    pub fn registry(&self) -> &str {
        &self.registry
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    pub fn with_tag(&self, tag: &str) -> Result<Self> {
        validate_tag(tag)
            .map_err(|why| Error::config(format!("invalid tag '{}': {}", tag, why)))?;
        Ok(ImageReference {
            registry: self.registry.clone(),
            repository: self.repository.clone(),
            tag: Some(tag.to_string()),
            digest: None,
        })
    }
}

impl FromStr for ImageReference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        ImageReference::parse(s)
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.registry, self.repository)?;
        if let Some(ref tag) = self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(ref digest) = self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

/// Where an image lives, selected by the reference prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageScheme {
    Registry,
    DockerDaemon,
    Tar,
}

/// Splits a `scheme://rest` image string. Strings without a scheme are registry images.
pub fn split_scheme(image: &str) -> Result<(ImageScheme, &str)> {
    if let Some(rest) = image.strip_prefix(REGISTRY_IMAGE_PREFIX) {
        return Ok((ImageScheme::Registry, rest));
    }
    if let Some(rest) = image.strip_prefix(DOCKER_DAEMON_IMAGE_PREFIX) {
        return Ok((ImageScheme::DockerDaemon, rest));
    }
    if let Some(rest) = image.strip_prefix(TAR_IMAGE_PREFIX) {
        return Ok((ImageScheme::Tar, rest));
    }
    if let Some((scheme, _)) = image.split_once("://") {
        return Err(Error::config(format!(
            "unsupported image scheme '{}://' in '{}'",
            scheme, image
        )));
    }
    Ok((ImageScheme::Registry, image))
}

fn validate_registry(registry: &str) -> std::result::Result<(), String> {
    let (host, port) = match registry.rsplit_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (registry, None),
    };
    if host.is_empty()
        || host.starts_with(['.', '-'])
        || host.ends_with(['.', '-'])
        || !host
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '-')
    {
        return Err(format!("bad registry host '{}'", host));
    }
    if let Some(port) = port {
        if port.parse::<u16>().is_err() {
            return Err(format!("bad registry port '{}'", port));
        }
    }
    Ok(())
}

fn validate_repository(repository: &str) -> std::result::Result<(), String> {
    if repository.is_empty() {
        return Err("missing repository".to_string());
    }
    for component in repository.split('/') {
        let valid = !component.is_empty()
            && component
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || "._-".contains(c))
            && component.starts_with(|c: char| c.is_ascii_alphanumeric())
            && component.ends_with(|c: char| c.is_ascii_alphanumeric());
        if !valid {
            return Err(format!("bad repository component '{}'", component));
        }
    }
    Ok(())
}

fn validate_tag(tag: &str) -> std::result::Result<(), String> {
    let valid = !tag.is_empty()
        && tag.len() <= 128
        && tag.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_')
        && tag
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "_.-".contains(c));
    if valid {
        Ok(())
    } else {
        Err(format!("bad tag '{}'", tag))
    }
}

fn validate_digest(digest: &str) -> std::result::Result<(), String> {
    match digest.split_once(':') {
        Some(("sha256", hex)) if hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit()) => {
            Ok(())
        }
        Some(("sha512", hex)) if hex.len() == 128 && hex.chars().all(|c| c.is_ascii_hexdigit()) => {
            Ok(())
        }
        _ => Err(format!("bad digest '{}'", digest)),
    }
}
