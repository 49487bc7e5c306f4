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

//! Docker `config.json` / podman `auth.json` parsing.
//!
//! The standard format carries `auths`, `credHelpers` and `credsStore`. The legacy
//! `.dockercfg` format is just the `auths` map at top level.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use base64::Engine;
use serde::{Deserialize, Serialize};

use super::{registry_aliases, Credential};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DockerConfig {
    #[serde(default)]
    auths: BTreeMap<String, AuthEntry>,
    #[serde(default, rename = "credHelpers", skip_serializing_if = "BTreeMap::is_empty")]
    cred_helpers: BTreeMap<String, String>,
    #[serde(default, rename = "credsStore", skip_serializing_if = "Option::is_none")]
    creds_store: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct AuthEntry {
    /// Base64 of `username:password`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    password: Option<String>,
}

/// Where a config file says the credentials for a registry are.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Credential(Credential),
    /// Suffix of a `docker-credential-<name>` helper.
    Helper(String),
}

impl DockerConfig {
    /// Loads a config file. A missing file is `Ok(None)`, a present but unreadable or
    /// malformed one is an error.
    pub fn load(path: &Path, legacy: bool) -> Result<Option<Self>> {
        if !path.is_file() {
            return Ok(None);
        }
        let contents = fs::read_to_string(path).map_err(|e| Error::CredentialSource {
            source_name: path.display().to_string(),
            message: format!("cannot read: {}", e),
        })?;
        Self::parse(&contents, legacy)
            .map(Some)
            .map_err(|e| Error::CredentialSource {
                source_name: path.display().to_string(),
                message: format!("cannot parse: {}", e),
            })
    }

    pub fn parse(contents: &str, legacy: bool) -> serde_json::Result<Self> {
        if legacy {
            let auths: BTreeMap<String, AuthEntry> = serde_json::from_str(contents)?;
            Ok(DockerConfig {
                auths,
                ..Default::default()
            })
        } else {
            serde_json::from_str(contents)
        }
    }

    /// Config holding a single `auths` entry, as consumed by `--authfile` flags.
    pub fn single(registry: &str, credential: &Credential) -> Self {
        let auth = base64::engine::general_purpose::STANDARD.encode(format!(
            "{}:{}",
            credential.username(),
            credential.secret()
        ));
        let mut auths = BTreeMap::new();
        auths.insert(
            registry.to_string(),
            AuthEntry {
                auth: Some(auth),
                ..Default::default()
            },
        );
        DockerConfig {
            auths,
            ..Default::default()
        }
    }

    /// Candidate sources for a registry, in the order the docker CLI consults them:
    /// per-registry helper, global store, inline `auths` entry.
    pub fn sources_for(&self, registry: &str) -> Vec<ConfigSource> {
        let aliases = registry_aliases(registry);
        let mut sources = Vec::new();

        if let Some(helper) = aliases.iter().find_map(|a| self.cred_helpers.get(a)) {
            sources.push(ConfigSource::Helper(helper.clone()));
        }
        if let Some(ref store) = self.creds_store {
            if !store.is_empty() {
                sources.push(ConfigSource::Helper(store.clone()));
            }
        }

        let entry = self
            .auths
            .iter()
            .find(|(key, _)| aliases.iter().any(|a| normalize_key(key) == normalize_key(a)))
            .map(|(_, entry)| entry);
        if let Some(credential) = entry.and_then(extract_credential) {
            sources.push(ConfigSource::Credential(credential));
        }
        sources
    }
}

fn extract_credential(entry: &AuthEntry) -> Option<Credential> {
    if let (Some(username), Some(password)) = (&entry.username, &entry.password) {
        if !username.is_empty() && !password.is_empty() {
            return Some(Credential::new(username.clone(), password.clone()));
        }
    }
    entry.auth.as_deref().and_then(decode_auth)
}

fn decode_auth(auth: &str) -> Option<Credential> {
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(auth.trim())
        .ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    if username.is_empty() || password.is_empty() {
        return None;
    }
    Some(Credential::new(username, password))
}

/// `https://ghcr.io/v2/` and `ghcr.io` name the same registry.
fn normalize_key(key: &str) -> &str {
    let key = key
        .strip_prefix("https://")
        .or_else(|| key.strip_prefix("http://"))
        .unwrap_or(key);
    key.split('/').next().unwrap_or(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_docker_config() {
        let config = DockerConfig::parse(
            r#"{
                "auths": {
                    "ghcr.io": { "auth": "dXNlcm5hbWU6cGFzc3dvcmQ=" },
                    "quay.io": { "username": "myuser", "password": "mypass" }
                }
            }"#,
            false,
        )
        .unwrap();

        assert_eq!(
            config.sources_for("ghcr.io"),
            vec![ConfigSource::Credential(Credential::new("username", "password"))]
        );
        assert_eq!(
            config.sources_for("quay.io"),
            vec![ConfigSource::Credential(Credential::new("myuser", "mypass"))]
        );
        assert!(config.sources_for("example.com").is_empty());
    }

    #[test]
    fn registry_key_normalization() {
        let config = DockerConfig::parse(
            r#"{
                "auths": {
                    "https://ghcr.io/v2/": { "auth": "dXNlcm5hbWU6cGFzc3dvcmQ=" },
                    "https://index.docker.io/v1/": { "auth": "ZG9ja2VyOnBhc3M=" }
                }
            }"#,
            false,
        )
        .unwrap();

        assert_eq!(config.sources_for("ghcr.io").len(), 1);
        assert_eq!(
            config.sources_for("registry-1.docker.io"),
            vec![ConfigSource::Credential(Credential::new("docker", "pass"))]
        );
    }

    #[test]
    fn helpers_come_before_inline_auths() {
        let config = DockerConfig::parse(
            r#"{
                "auths": { "gcr.io": { "auth": "dXNlcm5hbWU6cGFzc3dvcmQ=" } },
                "credHelpers": { "gcr.io": "gcloud" },
                "credsStore": "desktop"
            }"#,
            false,
        )
        .unwrap();

        assert_eq!(
            config.sources_for("gcr.io"),
            vec![
                ConfigSource::Helper("gcloud".into()),
                ConfigSource::Helper("desktop".into()),
                ConfigSource::Credential(Credential::new("username", "password")),
            ]
        );
        assert_eq!(
            config.sources_for("quay.io"),
            vec![ConfigSource::Helper("desktop".into())]
        );
    }

    #[test]
    fn legacy_format() {
        let config = DockerConfig::parse(
            r#"{ "https://quay.io": { "auth": "dXNlcm5hbWU6cGFzc3dvcmQ=", "email": "x@y" } }"#,
            true,
        )
        .unwrap();
        assert!(config.auths.contains_key("https://quay.io"));
        assert_eq!(config.sources_for("quay.io").len(), 1);
    }

    #[test]
    fn undecodable_auth_is_ignored() {
        let config = DockerConfig::parse(
            r#"{ "auths": { "ghcr.io": { "auth": "not base64!" } } }"#,
            false,
        )
        .unwrap();
        assert!(config.sources_for("ghcr.io").is_empty());
    }

    #[test]
    fn missing_file_is_absent_and_garbage_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(DockerConfig::load(&dir.path().join("config.json"), false)
            .unwrap()
            .is_none());

        let path = dir.path().join("config.json");
        fs::write(&path, "{ not json").unwrap();
        let err = DockerConfig::load(&path, false).unwrap_err();
        assert!(matches!(err, Error::CredentialSource { .. }));
    }

    #[test]
    fn single_entry_round_trips() {
        let credential = Credential::new("robot", "s3cret");
        let json = serde_json::to_string(&DockerConfig::single("example.com", &credential)).unwrap();
        let parsed = DockerConfig::parse(&json, false).unwrap();
        assert_eq!(
            parsed.sources_for("example.com"),
            vec![ConfigSource::Credential(credential)]
        );
    }
}
