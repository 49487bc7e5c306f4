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

//! Registry credential resolution.
//!
//! Credentials come from an ordered chain of providers. The chain is walked lazily and
//! the first provider that yields a credential wins. Providers that are not configured
//! simply yield nothing; providers that are configured but broken are reported and skipped.

pub mod docker_config;
pub mod helper;
pub mod resolver;

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;

use crate::error::Error;

pub use docker_config::DockerConfig;
pub use helper::CredentialHelper;
pub use resolver::{resolve_credentials, CredentialEnvironment};

/// Docker Hub's canonical name in config files and credential helpers.
pub const DOCKER_HUB_SERVER_URL: &str = "https://index.docker.io/v1/";

const DOCKER_HUB_ALIASES: &[&str] = &[
    "registry-1.docker.io",
    "index.docker.io",
    "docker.io",
    "registry.hub.docker.com",
];

#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    username: String,
    secret: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Credential {
            username: username.into(),
            secret: secret.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Explicit username/password from the build configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AuthParameters {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl AuthParameters {
    /// Both fields present and non-blank, or nothing.
    pub fn credential(&self) -> Option<Credential> {
        let username = self.username.as_deref().filter(|u| !u.trim().is_empty())?;
        let password = self.password.as_deref().filter(|p| !p.trim().is_empty())?;
        Some(Credential::new(username, password))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CredHelperParameters {
    /// Helper executable path, or a suffix for `docker-credential-<helper>`.
    pub helper: Option<String>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

/// One source of credentials in the chain.
pub trait CredentialProvider: Send + Sync {
    /// Human readable source name, used in logs. Never contains secrets.
    fn describe(&self) -> String;

    /// `Ok(None)` when the source has nothing for this registry.
    fn retrieve(&self) -> Result<Option<Credential>, Error>;
}

/// Ordered providers for one image reference.
pub struct CredentialChain {
    image: String,
    providers: Vec<Box<dyn CredentialProvider>>,
}

impl CredentialChain {
    pub fn new(image: impl Into<String>) -> Self {
        CredentialChain {
            image: image.into(),
            providers: Vec::new(),
        }
    }

    pub fn push(&mut self, provider: Box<dyn CredentialProvider>) {
        self.providers.push(provider);
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    pub fn descriptions(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.describe()).collect()
    }

    /// Walk the providers in order and return the first credential found.
    /// `None` means anonymous access.
    pub fn resolve(&self) -> Option<Credential> {
        for provider in &self.providers {
            match provider.retrieve() {
                Ok(Some(credential)) => {
                    tracing::info!(
                        image = %self.image,
                        source = %provider.describe(),
                        "using registry credentials"
                    );
                    return Some(credential);
                }
                Ok(None) => {
                    tracing::debug!(image = %self.image, source = %provider.describe(), "no credentials");
                }
                Err(err) => {
                    tracing::warn!(image = %self.image, "skipping credential source: {}", err);
                }
            }
        }
        tracing::debug!(image = %self.image, "no credentials found, using anonymous access");
        None
    }
}

impl fmt::Debug for CredentialChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialChain")
            .field("image", &self.image)
            .field("providers", &self.descriptions())
            .finish()
    }
}

/// Names a registry may appear under in config files and helper requests.
pub fn registry_aliases(registry: &str) -> Vec<String> {
    if DOCKER_HUB_ALIASES.contains(&registry) {
        let mut aliases = vec![DOCKER_HUB_SERVER_URL.to_string()];
        aliases.extend(DOCKER_HUB_ALIASES.iter().map(|a| a.to_string()));
        aliases
    } else {
        vec![registry.to_string()]
    }
}

/// The server URL handed to credential helpers.
pub fn helper_server_url(registry: &str) -> String {
    if DOCKER_HUB_ALIASES.contains(&registry) {
        DOCKER_HUB_SERVER_URL.to_string()
    } else {
        registry.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct Counting {
        name: &'static str,
        result: Option<Credential>,
        fail: bool,
        calls: Arc<AtomicUsize>,
    }

    impl CredentialProvider for Counting {
        fn describe(&self) -> String {
            self.name.to_string()
        }

        fn retrieve(&self) -> Result<Option<Credential>, Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(Error::CredentialSource {
                    source_name: self.name.to_string(),
                    message: "broken".to_string(),
                });
            }
            Ok(self.result.clone())
        }
    }

    fn counting(
        name: &'static str,
        result: Option<Credential>,
        fail: bool,
    ) -> (Box<dyn CredentialProvider>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (
            Box::new(Counting {
                name,
                result,
                fail,
                calls: calls.clone(),
            }),
            calls,
        )
    }

    #[test]
    fn chain_stops_at_first_credential() {
        let mut chain = CredentialChain::new("example.com/app");
        let (broken, broken_calls) = counting("broken", None, true);
        let (empty, empty_calls) = counting("empty", None, false);
        let (hit, hit_calls) = counting("hit", Some(Credential::new("u", "p")), false);
        let (never, never_calls) = counting("never", Some(Credential::new("x", "y")), false);
        chain.push(broken);
        chain.push(empty);
        chain.push(hit);
        chain.push(never);

        assert_eq!(chain.resolve(), Some(Credential::new("u", "p")));
        assert_eq!(broken_calls.load(Ordering::SeqCst), 1);
        assert_eq!(empty_calls.load(Ordering::SeqCst), 1);
        assert_eq!(hit_calls.load(Ordering::SeqCst), 1);
        assert_eq!(never_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn empty_chain_is_anonymous() {
        assert_eq!(CredentialChain::new("x").resolve(), None);
    }

    #[test]
    fn blank_explicit_auth_is_absent() {
        let blank = AuthParameters {
            username: Some("user".into()),
            password: Some("  ".into()),
        };
        assert!(blank.credential().is_none());

        let missing = AuthParameters {
            username: None,
            password: Some("pw".into()),
        };
        assert!(missing.credential().is_none());

        let full = AuthParameters {
            username: Some("user".into()),
            password: Some("pw".into()),
        };
        assert_eq!(full.credential(), Some(Credential::new("user", "pw")));
    }

    #[test]
    fn debug_redacts_secret() {
        let rendered = format!("{:?}", Credential::new("user", "hunter2"));
        assert!(rendered.contains("user"));
        assert!(!rendered.contains("hunter2"));
    }

    #[test]
    fn docker_hub_aliases() {
        assert_eq!(helper_server_url("registry-1.docker.io"), DOCKER_HUB_SERVER_URL);
        assert_eq!(helper_server_url("ghcr.io"), "ghcr.io");
        assert!(registry_aliases("docker.io").contains(&"index.docker.io".to_string()));
        assert_eq!(registry_aliases("ghcr.io"), vec!["ghcr.io".to_string()]);
    }
}
