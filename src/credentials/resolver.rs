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

//! Builds the credential chain for an image reference.

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use super::docker_config::{ConfigSource, DockerConfig};
use super::helper::{is_executable, HelperCredentialProvider, HelperLookup, HELPER_PREFIX};
use super::{AuthParameters, CredHelperParameters, Credential, CredentialChain, CredentialProvider};
use crate::error::Result;
use crate::reference::ImageReference;

const DOCKER_CONFIG_FILE: &str = "config.json";
// Kubernetes secrets mounted as files
const KUBERNETES_DOCKER_CONFIG_FILE: &str = ".dockerconfigjson";
const LEGACY_DOCKER_CONFIG_FILE: &str = ".dockercfg";
// Podman / skopeo
const XDG_AUTH_FILE: &str = "containers/auth.json";

const GOOGLE_ACCESS_TOKEN_USERNAME: &str = "oauth2accesstoken";
const GOOGLE_ACCESS_TOKEN_VARS: &[&str] = &["GOOGLE_OAUTH_ACCESS_TOKEN", "CLOUDSDK_AUTH_ACCESS_TOKEN"];

/// Registry host suffix -> helper suffix, for registries whose vendors ship a helper.
const WELL_KNOWN_HELPERS: &[(&str, &str)] = &[
    ("gcr.io", "gcr"),
    ("pkg.dev", "gcr"),
    ("amazonaws.com", "ecr-login"),
    ("azurecr.io", "acr-env"),
];

#[cfg(target_os = "macos")]
const KEYCHAIN_HELPERS: &[&str] = &["osxkeychain", "desktop"];
#[cfg(target_os = "windows")]
const KEYCHAIN_HELPERS: &[&str] = &["wincred", "desktop"];
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const KEYCHAIN_HELPERS: &[&str] = &["secretservice", "pass"];

/// Process environment relevant to credential lookup, captured once per build.
#[derive(Debug, Clone, Default)]
pub struct CredentialEnvironment {
    pub xdg_runtime_dir: Option<PathBuf>,
    pub xdg_config_home: Option<PathBuf>,
    /// Home directories to search, in order, without duplicates.
    pub homes: Vec<PathBuf>,
    pub docker_config: Option<PathBuf>,
    /// Search path for helper binaries.
    pub path: Option<OsString>,
    pub google_access_token: Option<String>,
}

impl CredentialEnvironment {
    pub fn from_process() -> Self {
        fn env_path(name: &str) -> Option<PathBuf> {
            std::env::var_os(name)
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
        }

        let mut homes = Vec::new();
        for home in [dirs::home_dir(), env_path("HOME")].into_iter().flatten() {
            if !homes.contains(&home) {
                homes.push(home);
            }
        }

        CredentialEnvironment {
            xdg_runtime_dir: env_path("XDG_RUNTIME_DIR"),
            xdg_config_home: env_path("XDG_CONFIG_HOME"),
            homes,
            docker_config: env_path("DOCKER_CONFIG"),
            path: std::env::var_os("PATH"),
            google_access_token: GOOGLE_ACCESS_TOKEN_VARS
                .iter()
                .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty())),
        }
    }

    /// Config files in probing order. The flag marks the legacy `.dockercfg` format.
    pub fn config_files(&self) -> Vec<(PathBuf, bool)> {
        fn docker_files(dir: &Path) -> Vec<(PathBuf, bool)> {
            vec![
                (dir.join(DOCKER_CONFIG_FILE), false),
                (dir.join(KUBERNETES_DOCKER_CONFIG_FILE), false),
                (dir.join(LEGACY_DOCKER_CONFIG_FILE), true),
            ]
        }

        let mut files = Vec::new();
        if let Some(ref dir) = self.xdg_runtime_dir {
            files.push((dir.join(XDG_AUTH_FILE), false));
        }
        if let Some(ref dir) = self.xdg_config_home {
            files.push((dir.join(XDG_AUTH_FILE), false));
        }
        for home in &self.homes {
            files.push((home.join(".config").join(XDG_AUTH_FILE), false));
            files.extend(docker_files(&home.join(".docker")));
        }
        if let Some(ref dir) = self.docker_config {
            files.extend(docker_files(dir));
        }
        files
    }

    /// Find `binary` on the captured search path.
    pub fn find_executable(&self, binary: &str) -> Option<PathBuf> {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        which::which_in(binary, self.path.as_ref(), cwd).ok()
    }
}

/// Builds the ordered provider chain for `image`:
/// explicit auth, configured helper, config files, well-known helpers, ambient tokens.
pub fn resolve_credentials(
    image: &ImageReference,
    auth: Option<&AuthParameters>,
    cred_helper: Option<&CredHelperParameters>,
    env: &CredentialEnvironment,
) -> CredentialChain {
    let registry = image.registry().to_string();
    let helper_env = cred_helper
        .map(|c| c.environment.clone())
        .unwrap_or_default();
    let mut chain = CredentialChain::new(image.to_string());

    if let Some(credential) = auth.and_then(AuthParameters::credential) {
        chain.push(Box::new(KnownCredentialProvider {
            credential,
            description: "explicit username/password".to_string(),
        }));
    }

    if let Some(helper) = cred_helper.and_then(|c| c.helper.as_deref()) {
        chain.push(Box::new(configured_helper(helper, &registry, &helper_env, env)));
    }

    for (path, legacy) in env.config_files() {
        chain.push(Box::new(ConfigFileProvider {
            path,
            legacy,
            registry: registry.clone(),
            helper_env: helper_env.clone(),
            env: env.clone(),
        }));
    }

    for suffix in well_known_helpers(&registry) {
        let binary = format!("{}{}", HELPER_PREFIX, suffix);
        let lookup = HelperLookup::Resolved(env.find_executable(&binary));
        chain.push(Box::new(HelperCredentialProvider::new(
            binary,
            registry.clone(),
            lookup,
            helper_env.clone(),
        )));
    }

    if is_google_registry(&registry) {
        chain.push(Box::new(AmbientTokenProvider {
            token: env.google_access_token.clone(),
        }));
    }

    chain
}

/// An executable path is used directly; anything else names `docker-credential-<name>`.
fn configured_helper(
    helper: &str,
    registry: &str,
    helper_env: &BTreeMap<String, String>,
    env: &CredentialEnvironment,
) -> HelperCredentialProvider {
    let direct = Path::new(helper);
    let lookup = if is_executable(direct) {
        HelperLookup::Resolved(Some(direct.to_path_buf()))
    } else if direct.is_file() {
        HelperLookup::Broken(format!("{} is not executable", direct.display()))
    } else {
        let binary = format!("{}{}", HELPER_PREFIX, helper);
        match env.find_executable(&binary) {
            Some(path) => HelperLookup::Resolved(Some(path)),
            None => HelperLookup::Broken(format!("{} not found on the search path", binary)),
        }
    };
    HelperCredentialProvider::new(helper, registry, lookup, helper_env.clone())
}

fn well_known_helpers(registry: &str) -> Vec<&'static str> {
    let mut helpers: Vec<&'static str> = WELL_KNOWN_HELPERS
        .iter()
        .filter(|(suffix, _)| registry == *suffix || registry.ends_with(&format!(".{}", suffix)))
        .map(|(_, helper)| *helper)
        .collect();
    for helper in KEYCHAIN_HELPERS {
        if !helpers.contains(helper) {
            helpers.push(helper);
        }
    }
    helpers
}

fn is_google_registry(registry: &str) -> bool {
    registry == "gcr.io"
        || registry.ends_with(".gcr.io")
        || registry.ends_with("-docker.pkg.dev")
}

struct KnownCredentialProvider {
    credential: Credential,
    description: String,
}

impl CredentialProvider for KnownCredentialProvider {
    fn describe(&self) -> String {
        self.description.clone()
    }

    fn retrieve(&self) -> Result<Option<Credential>> {
        Ok(Some(self.credential.clone()))
    }
}

struct ConfigFileProvider {
    path: PathBuf,
    legacy: bool,
    registry: String,
    helper_env: BTreeMap<String, String>,
    env: CredentialEnvironment,
}

impl CredentialProvider for ConfigFileProvider {
    fn describe(&self) -> String {
        format!("config file {}", self.path.display())
    }

    fn retrieve(&self) -> Result<Option<Credential>> {
        let config = match DockerConfig::load(&self.path, self.legacy)? {
            Some(config) => config,
            None => return Ok(None),
        };

        for source in config.sources_for(&self.registry) {
            match source {
                ConfigSource::Credential(credential) => return Ok(Some(credential)),
                ConfigSource::Helper(name) => {
                    let binary = format!("{}{}", HELPER_PREFIX, name);
                    let lookup = match self.env.find_executable(&binary) {
                        Some(path) => HelperLookup::Resolved(Some(path)),
                        None => HelperLookup::Broken(format!(
                            "{} referenced by {} not found",
                            binary,
                            self.path.display()
                        )),
                    };
                    let provider = HelperCredentialProvider::new(
                        binary,
                        self.registry.clone(),
                        lookup,
                        self.helper_env.clone(),
                    );
                    match provider.retrieve() {
                        Ok(Some(credential)) => return Ok(Some(credential)),
                        Ok(None) => {}
                        Err(err) => tracing::warn!("skipping credential source: {}", err),
                    }
                }
            }
        }
        Ok(None)
    }
}

/// OAuth access token from the ambient cloud SDK environment.
struct AmbientTokenProvider {
    token: Option<String>,
}

impl CredentialProvider for AmbientTokenProvider {
    fn describe(&self) -> String {
        "application default credentials".to_string()
    }

    fn retrieve(&self) -> Result<Option<Credential>> {
        Ok(self
            .token
            .as_ref()
            .map(|token| Credential::new(GOOGLE_ACCESS_TOKEN_USERNAME, token.clone())))
    }
}
