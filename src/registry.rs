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

//! Registry transport. Pull and push move whole OCI layouts; the wire protocol is
//! left to `skopeo`.

use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};

use crate::container::Platform;
use crate::credentials::{Credential, DockerConfig};
use crate::reference::ImageReference;

pub struct PullRequest<'a> {
    pub reference: &'a ImageReference,
    pub credential: Option<&'a Credential>,
    /// Empty directory that receives the OCI layout.
    pub destination: &'a Path,
    pub platforms: &'a [Platform],
    pub allow_insecure: bool,
}

pub struct PushRequest<'a> {
    /// OCI layout whose `index.json` holds exactly one descriptor.
    pub layout: &'a Path,
    pub reference: &'a ImageReference,
    pub credential: Option<&'a Credential>,
    pub allow_insecure: bool,
}

pub trait RegistryClient: Send + Sync {
    fn pull(&self, request: &PullRequest<'_>) -> Result<()>;

    fn push(&self, request: &PushRequest<'_>) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SkopeoRegistry {
    executable: PathBuf,
}

impl Default for SkopeoRegistry {
    fn default() -> Self {
        SkopeoRegistry {
            executable: PathBuf::from("skopeo"),
        }
    }
}

impl SkopeoRegistry {
    pub fn new(executable: impl Into<PathBuf>) -> Self {
        SkopeoRegistry {
            executable: executable.into(),
        }
    }

    fn run(&self, args: Vec<OsString>, what: &str) -> Result<()> {
        tracing::debug!(executable = %self.executable.display(), ?args, "running");
        let output = Command::new(&self.executable)
            .args(&args)
            .output()
            .with_context(|| format!("running {}", self.executable.display()))?;
        if !output.status.success() {
            bail!(
                "{} failed ({}): {}",
                what,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }
}

/// Short-lived auth file for `--authfile` style flags. Removed on drop.
fn auth_file(registry: &str, credential: &Credential) -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::NamedTempFile::new()?;
    serde_json::to_writer(&mut file, &DockerConfig::single(registry, credential))?;
    file.flush()?;
    Ok(file)
}

impl RegistryClient for SkopeoRegistry {
    fn pull(&self, request: &PullRequest<'_>) -> Result<()> {
        let mut args: Vec<OsString> = Vec::new();
        // Platform overrides are global options and precede the subcommand.
        if let [single] = request.platforms {
            args.push("--override-arch".into());
            args.push(single.architecture.clone().into());
            args.push("--override-os".into());
            args.push(single.os.clone().into());
        }
        args.push("copy".into());
        args.push("--quiet".into());
        let _auth = match request.credential {
            Some(credential) => {
                let file = auth_file(request.reference.registry(), credential)?;
                args.push("--src-authfile".into());
                args.push(file.path().into());
                Some(file)
            }
            None => {
                args.push("--src-no-creds".into());
                None
            }
        };
        if request.allow_insecure {
            args.push("--src-tls-verify=false".into());
        }
        if request.platforms.len() != 1 {
            args.push("--all".into());
        }
        args.push(format!("docker://{}", request.reference).into());
        let mut destination = OsString::from("oci:");
        destination.push(request.destination);
        args.push(destination);

        self.run(args, &format!("pulling {}", request.reference))
    }

    fn push(&self, request: &PushRequest<'_>) -> Result<()> {
        let mut args: Vec<OsString> = vec![
            "copy".into(),
            "--quiet".into(),
            "--all".into(),
            "--preserve-digests".into(),
        ];
        let _auth = match request.credential {
            Some(credential) => {
                let file = auth_file(request.reference.registry(), credential)?;
                args.push("--dest-authfile".into());
                args.push(file.path().into());
                Some(file)
            }
            None => None,
        };
        if request.allow_insecure {
            args.push("--dest-tls-verify=false".into());
        }
        let mut source = OsString::from("oci:");
        source.push(request.layout);
        args.push(source);
        args.push(format!("docker://{}", request.reference).into());

        self.run(args, &format!("pushing {}", request.reference))
    }
}
