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

//! The `docker` CLI, used for daemon base images and the daemon target.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{bail, Context, Result};

pub const DEFAULT_DOCKER_EXECUTABLE: &str = "docker";

#[derive(Debug, Clone)]
pub struct DockerClient {
    executable: PathBuf,
    environment: BTreeMap<String, String>,
}

impl Default for DockerClient {
    fn default() -> Self {
        DockerClient {
            executable: PathBuf::from(DEFAULT_DOCKER_EXECUTABLE),
            environment: BTreeMap::new(),
        }
    }
}

impl DockerClient {
    pub fn new(executable: Option<PathBuf>, environment: BTreeMap<String, String>) -> Self {
        DockerClient {
            executable: executable.unwrap_or_else(|| PathBuf::from(DEFAULT_DOCKER_EXECUTABLE)),
            environment,
        }
    }

    pub fn executable(&self) -> &Path {
        &self.executable
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.executable);
        command.envs(&self.environment);
        command
    }

    /// `docker save` of a daemon image into a tarball.
    pub fn save(&self, image: &str, destination: &Path) -> Result<()> {
        tracing::info!(image, "saving image from docker daemon");
        let output = self
            .command()
            .arg("save")
            .arg("-o")
            .arg(destination)
            .arg(image)
            .output()
            .with_context(|| format!("running {}", self.executable.display()))?;
        if !output.status.success() {
            bail!(
                "docker save {} failed ({}): {}",
                image,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(())
    }

    /// Streams a docker-loadable tarball into `docker load`. Returns its output.
    pub fn load(&self, tarball: &Path) -> Result<String> {
        let input = File::open(tarball).with_context(|| format!("opening {}", tarball.display()))?;
        let output = self
            .command()
            .arg("load")
            .stdin(Stdio::from(input))
            .output()
            .with_context(|| format!("running {}", self.executable.display()))?;
        if !output.status.success() {
            bail!(
                "docker load failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::credentials::helper::tests::write_script;
    use std::fs;

    #[test]
    fn load_pipes_tarball_and_passes_environment() {
        let dir = tempfile::tempdir().unwrap();
        let received = dir.path().join("received");
        let fake = write_script(
            dir.path(),
            "docker",
            &format!(
                "cat > {}\necho \"Loaded image: out:1 via $DOCKER_HOST\"",
                received.display()
            ),
        );
        let tarball = dir.path().join("image.tar");
        fs::write(&tarball, "tar bytes").unwrap();

        let client = DockerClient::new(
            Some(fake),
            BTreeMap::from([("DOCKER_HOST".to_string(), "unix:///custom.sock".to_string())]),
        );
        let output = client.load(&tarball).unwrap();
        assert_eq!(output, "Loaded image: out:1 via unix:///custom.sock");
        assert_eq!(fs::read_to_string(&received).unwrap(), "tar bytes");
    }

    #[test]
    fn save_failure_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let fake = write_script(dir.path(), "docker", "echo 'Cannot connect to the Docker daemon' >&2\nexit 1");
        let client = DockerClient::new(Some(fake), BTreeMap::new());
        let err = client.save("base:1", &dir.path().join("out.tar")).unwrap_err();
        assert!(err.to_string().contains("Cannot connect"));
    }
}
