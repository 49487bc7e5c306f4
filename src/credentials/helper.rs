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

//! docker-credential-helpers protocol: `<helper> get`, server URL on stdin,
//! `{"ServerURL", "Username", "Secret"}` on stdout.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use serde::Deserialize;

use super::{helper_server_url, Credential, CredentialProvider};
use crate::error::{Error, Result};

pub const HELPER_PREFIX: &str = "docker-credential-";

/// Helpers answer with this (or a variant of it) when they hold nothing for a server.
const NOT_FOUND_MARKER: &str = "credentials not found";

#[derive(Debug, Deserialize)]
struct HelperResponse {
    #[serde(rename = "Username")]
    username: String,
    #[serde(rename = "Secret")]
    secret: String,
}

#[derive(Debug, Clone)]
pub struct CredentialHelper {
    program: PathBuf,
    environment: BTreeMap<String, String>,
}

impl CredentialHelper {
    pub fn new(program: impl Into<PathBuf>, environment: BTreeMap<String, String>) -> Self {
        CredentialHelper {
            program: program.into(),
            environment,
        }
    }

    pub fn get(&self, registry: &str) -> Result<Option<Credential>> {
        let server_url = helper_server_url(registry);
        let source_error = |message: String| Error::CredentialSource {
            source_name: self.program.display().to_string(),
            message,
        };

        let mut child = Command::new(&self.program)
            .arg("get")
            .envs(&self.environment)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| source_error(format!("cannot run: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            // A helper may answer without reading its request.
            if let Err(e) = stdin.write_all(server_url.as_bytes()) {
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(source_error(format!("cannot write request: {}", e)));
                }
            }
        }

        let output = child
            .wait_with_output()
            .map_err(|e| source_error(format!("cannot read response: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            if is_not_found(&stdout) || is_not_found(&stderr) {
                return Ok(None);
            }
            // Helper output may echo secrets, only the exit status is reported.
            return Err(source_error(format!("exited with {}", output.status)));
        }

        let response: HelperResponse = serde_json::from_str(stdout.trim())
            .map_err(|e| source_error(format!("malformed response: {}", e)))?;
        if response.username.is_empty() || response.secret.is_empty() {
            return Ok(None);
        }
        Ok(Some(Credential::new(response.username, response.secret)))
    }
}

fn is_not_found(message: &str) -> bool {
    message.to_ascii_lowercase().contains(NOT_FOUND_MARKER)
}

/// How a helper binary is located.
#[derive(Debug, Clone)]
pub enum HelperLookup {
    /// Resolved once to an executable, or unavailable.
    Resolved(Option<PathBuf>),
    /// Explicitly configured but broken. Reported when the provider is tried.
    Broken(String),
}

/// Chain entry that asks a credential helper.
#[derive(Debug)]
pub struct HelperCredentialProvider {
    name: String,
    registry: String,
    lookup: HelperLookup,
    environment: BTreeMap<String, String>,
}

impl HelperCredentialProvider {
    pub fn new(
        name: impl Into<String>,
        registry: impl Into<String>,
        lookup: HelperLookup,
        environment: BTreeMap<String, String>,
    ) -> Self {
        HelperCredentialProvider {
            name: name.into(),
            registry: registry.into(),
            lookup,
            environment,
        }
    }
}

impl CredentialProvider for HelperCredentialProvider {
    fn describe(&self) -> String {
        format!("credential helper {}", self.name)
    }

    fn retrieve(&self) -> Result<Option<Credential>> {
        match &self.lookup {
            HelperLookup::Resolved(Some(program)) => {
                CredentialHelper::new(program.clone(), self.environment.clone()).get(&self.registry)
            }
            HelperLookup::Resolved(None) => Ok(None),
            HelperLookup::Broken(message) => Err(Error::CredentialSource {
                source_name: self.describe(),
                message: message.clone(),
            }),
        }
    }
}

#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}
