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

//! Container runtime configuration and its merge with the base image config.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::config::Compression;
use crate::entrypoint::Entrypoint;
use crate::error::{Error, Result};
use crate::timestamp::format_created;

pub const OCI_MANIFEST: &str = "application/vnd.oci.image.manifest.v1+json";
pub const OCI_INDEX: &str = "application/vnd.oci.image.index.v1+json";
pub const OCI_CONFIG: &str = "application/vnd.oci.image.config.v1+json";
pub const OCI_LAYER: &str = "application/vnd.oci.image.layer.v1.tar";
pub const OCI_LAYER_GZIP: &str = "application/vnd.oci.image.layer.v1.tar+gzip";
pub const OCI_LAYER_ZSTD: &str = "application/vnd.oci.image.layer.v1.tar+zstd";

pub const DOCKER_MANIFEST: &str = "application/vnd.docker.distribution.manifest.v2+json";
pub const DOCKER_MANIFEST_LIST: &str = "application/vnd.docker.distribution.manifest.list.v2+json";
pub const DOCKER_CONFIG: &str = "application/vnd.docker.container.image.v1+json";
pub const DOCKER_LAYER: &str = "application/vnd.docker.image.rootfs.diff.tar";
pub const DOCKER_LAYER_GZIP: &str = "application/vnd.docker.image.rootfs.diff.tar.gzip";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Platform {
    pub architecture: String,
    pub os: String,
}

impl Platform {
    pub fn new(architecture: impl Into<String>, os: impl Into<String>) -> Self {
        Platform {
            architecture: architecture.into(),
            os: os.into(),
        }
    }

    /// Keeps entries with both fields set. No usable entry means the default platform.
    pub fn from_pairs(pairs: &[(Option<String>, Option<String>)]) -> Vec<Platform> {
        let mut platforms: Vec<Platform> = Vec::new();
        for (architecture, os) in pairs {
            match (architecture.as_deref(), os.as_deref()) {
                (Some(a), Some(o)) if !a.is_empty() && !o.is_empty() => {
                    let platform = Platform::new(a, o);
                    if !platforms.contains(&platform) {
                        platforms.push(platform);
                    }
                }
                _ => tracing::debug!(?architecture, ?os, "dropping incomplete platform"),
            }
        }
        if platforms.is_empty() {
            platforms.push(Platform::default());
        }
        platforms
    }

    pub fn to_json(&self) -> Value {
        json!({ "architecture": self.architecture, "os": self.os })
    }
}

impl Default for Platform {
    fn default() -> Self {
        Platform::new("amd64", "linux")
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.os, self.architecture)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImageFormat {
    #[default]
    Oci,
    Docker,
}

impl ImageFormat {
    pub fn manifest_media_type(&self) -> &'static str {
        match self {
            ImageFormat::Oci => OCI_MANIFEST,
            ImageFormat::Docker => DOCKER_MANIFEST,
        }
    }

    pub fn index_media_type(&self) -> &'static str {
        match self {
            ImageFormat::Oci => OCI_INDEX,
            ImageFormat::Docker => DOCKER_MANIFEST_LIST,
        }
    }

    pub fn config_media_type(&self) -> &'static str {
        match self {
            ImageFormat::Oci => OCI_CONFIG,
            ImageFormat::Docker => DOCKER_CONFIG,
        }
    }

    pub fn layer_media_type(&self, compression: Compression) -> Result<&'static str> {
        match (self, compression) {
            (ImageFormat::Oci, Compression::Gzip) => Ok(OCI_LAYER_GZIP),
            (ImageFormat::Oci, Compression::Zstd) => Ok(OCI_LAYER_ZSTD),
            (ImageFormat::Oci, Compression::Disabled) => Ok(OCI_LAYER),
            (ImageFormat::Docker, Compression::Gzip) => Ok(DOCKER_LAYER_GZIP),
            (ImageFormat::Docker, Compression::Disabled) => Ok(DOCKER_LAYER),
            (ImageFormat::Docker, Compression::Zstd) => Err(Error::config(
                "zstd layers cannot be stored in the Docker image format",
            )),
        }
    }
}

/// Compression of a layer blob, from its media type.
pub fn layer_compression(media_type: &str) -> Option<Compression> {
    if media_type.ends_with("+gzip") || media_type.ends_with(".gzip") {
        Some(Compression::Gzip)
    } else if media_type.ends_with("+zstd") || media_type.ends_with(".zstd") {
        Some(Compression::Zstd)
    } else if media_type == OCI_LAYER || media_type == DOCKER_LAYER {
        Some(Compression::Disabled)
    } else {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Port {
    pub number: u16,
    pub protocol: String,
}

impl fmt::Display for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.number, self.protocol)
    }
}

/// Parses `8080`, `8080/udp` and `9000-9002/tcp`.
pub fn parse_ports(specs: &[String]) -> Result<BTreeSet<Port>> {
    let mut ports = BTreeSet::new();
    for spec in specs {
        let invalid = || {
            Error::config(format!(
                "invalid port '{}': expected <port>, <port>/<protocol> or <start>-<end>/<protocol>",
                spec
            ))
        };
        let (range, protocol) = match spec.split_once('/') {
            Some((range, protocol)) => (range, protocol),
            None => (spec.as_str(), "tcp"),
        };
        let protocol = protocol.to_ascii_lowercase();
        if protocol != "tcp" && protocol != "udp" {
            return Err(invalid());
        }
        let (start, end) = match range.split_once('-') {
            Some((start, end)) => (start, end),
            None => (range, range),
        };
        let start: u16 = start.trim().parse().map_err(|_| invalid())?;
        let end: u16 = end.trim().parse().map_err(|_| invalid())?;
        if start == 0 || end < start {
            return Err(invalid());
        }
        for number in start..=end {
            ports.insert(Port {
                number,
                protocol: protocol.clone(),
            });
        }
    }
    Ok(ports)
}

pub fn check_absolute(kind: &str, path: &str) -> Result<()> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(Error::config(format!(
            "{} '{}' must be an absolute unix path",
            kind, path
        )))
    }
}

/// What the application image declares on top of its base.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerConfig {
    pub environment: BTreeMap<String, String>,
    pub ports: BTreeSet<Port>,
    pub volumes: BTreeSet<String>,
    pub labels: BTreeMap<String, String>,
    pub user: Option<String>,
    pub working_directory: Option<String>,
    pub entrypoint: Entrypoint,
    pub args: Option<Vec<String>>,
    pub creation_time: DateTime<Utc>,
    pub format: ImageFormat,
}

impl ContainerConfig {
    /// Builds the `config` object of the image configuration. Maps and sets are
    /// merged with the base; scalars override it when set.
    pub fn merge_runtime_config(&self, base: Option<&Value>) -> Value {
        let empty = Map::new();
        let base = base.and_then(Value::as_object).unwrap_or(&empty);
        let mut merged = Map::new();

        let mut env: BTreeMap<String, String> = BTreeMap::new();
        let mut env_order: Vec<String> = Vec::new();
        for item in base.get("Env").and_then(Value::as_array).into_iter().flatten() {
            if let Some((key, value)) = item.as_str().and_then(|s| s.split_once('=')) {
                if env.insert(key.to_string(), value.to_string()).is_none() {
                    env_order.push(key.to_string());
                }
            }
        }
        for (key, value) in &self.environment {
            if env.insert(key.clone(), value.clone()).is_none() {
                env_order.push(key.clone());
            }
        }
        if !env_order.is_empty() {
            let list: Vec<String> = env_order
                .iter()
                .map(|key| format!("{}={}", key, env[key]))
                .collect();
            merged.insert("Env".to_string(), json!(list));
        }

        let mut exposed = object_field(base, "ExposedPorts");
        for port in &self.ports {
            exposed.insert(port.to_string(), json!({}));
        }
        if !exposed.is_empty() {
            merged.insert("ExposedPorts".to_string(), Value::Object(exposed));
        }

        let mut volumes = object_field(base, "Volumes");
        for volume in &self.volumes {
            volumes.insert(volume.clone(), json!({}));
        }
        if !volumes.is_empty() {
            merged.insert("Volumes".to_string(), Value::Object(volumes));
        }

        let mut labels = object_field(base, "Labels");
        for (key, value) in &self.labels {
            labels.insert(key.clone(), json!(value));
        }
        if !labels.is_empty() {
            merged.insert("Labels".to_string(), Value::Object(labels));
        }

        let user = self.user.clone().map(Value::String).or_else(|| base.get("User").cloned());
        if let Some(user) = user.filter(|u| u.as_str() != Some("")) {
            merged.insert("User".to_string(), user);
        }
        let working_dir = self
            .working_directory
            .clone()
            .map(Value::String)
            .or_else(|| base.get("WorkingDir").cloned());
        if let Some(dir) = working_dir.filter(|d| d.as_str() != Some("")) {
            merged.insert("WorkingDir".to_string(), dir);
        }

        let (entrypoint, cmd) = match &self.entrypoint {
            Entrypoint::Inherit => (
                base.get("Entrypoint").cloned(),
                match &self.args {
                    Some(args) => Some(json!(args)),
                    None => base.get("Cmd").cloned(),
                },
            ),
            Entrypoint::Command(command) => (Some(json!(command)), self.args.as_ref().map(|a| json!(a))),
        };
        if let Some(entrypoint) = entrypoint.filter(|v| !v.is_null()) {
            merged.insert("Entrypoint".to_string(), entrypoint);
        }
        if let Some(cmd) = cmd.filter(|v| !v.is_null()) {
            merged.insert("Cmd".to_string(), cmd);
        }

        for key in ["Healthcheck", "StopSignal", "Shell", "OnBuild"] {
            if let Some(value) = base.get(key) {
                merged.insert(key.to_string(), value.clone());
            }
        }

        Value::Object(merged)
    }

    pub fn created(&self) -> String {
        format_created(&self.creation_time)
    }
}

fn object_field(base: &Map<String, Value>, key: &str) -> Map<String, Value> {
    base.get(key)
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}
