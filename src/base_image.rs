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

//! Base image kinds and their materialization as OCI layouts in the base cache.

use std::fs;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use serde_json::Value;

use crate::blob::{BlobDescriptor, BlobStore, INDEX_FILE};
use crate::config::{BaseImageConfig, Compression};
use crate::container::{layer_compression, Platform, DOCKER_LAYER, DOCKER_LAYER_GZIP, OCI_CONFIG, OCI_MANIFEST};
use crate::credentials::{resolve_credentials, CredentialChain, CredentialEnvironment};
use crate::docker::DockerClient;
use crate::download_cache::{derive_key, DownloadCache};
use crate::error::{Error, Result};
use crate::reference::{split_scheme, ImageReference, ImageScheme};
use crate::registry::{PullRequest, RegistryClient};
use crate::util::{advise_sequential, file_sha256, IO_BUF_SIZE};

const DOCKER_ARCHIVE_MANIFEST: &str = "manifest.json";

#[derive(Debug)]
pub enum BaseImage {
    Tar {
        path: PathBuf,
    },
    Daemon {
        reference: String,
        docker: DockerClient,
    },
    Registry {
        reference: ImageReference,
        /// Consulted only when the image has to be pulled.
        credentials: CredentialChain,
    },
}

/// Shared state used to turn a base image into a local layout.
pub struct MaterializeContext<'a> {
    pub cache_dir: &'a Path,
    pub downloads: &'a DownloadCache,
    pub registry: &'a dyn RegistryClient,
    pub platforms: &'a [Platform],
    pub offline: bool,
    pub allow_insecure: bool,
}

impl BaseImage {
    pub fn from_config(
        config: &BaseImageConfig,
        docker: &DockerClient,
        env: &CredentialEnvironment,
    ) -> Result<Self> {
        let (scheme, rest) = split_scheme(&config.image)?;
        Ok(match scheme {
            ImageScheme::Tar => {
                if rest.is_empty() {
                    return Err(Error::config("tar base image needs a path"));
                }
                BaseImage::Tar {
                    path: PathBuf::from(rest),
                }
            }
            ImageScheme::DockerDaemon => {
                // Validated here, passed to the daemon verbatim.
                ImageReference::parse(rest)?;
                BaseImage::Daemon {
                    reference: rest.to_string(),
                    docker: docker.clone(),
                }
            }
            ImageScheme::Registry => {
                let reference = ImageReference::parse(rest)?;
                let credentials = resolve_credentials(
                    &reference,
                    config.auth.as_ref(),
                    config.cred_helper.as_ref(),
                    env,
                );
                BaseImage::Registry {
                    reference,
                    credentials,
                }
            }
        })
    }

    /// The image as written in the build description.
    pub fn describe(&self) -> String {
        match self {
            BaseImage::Tar { path } => format!("tar://{}", path.display()),
            BaseImage::Daemon { reference, .. } => format!("docker://{}", reference),
            BaseImage::Registry { reference, .. } => format!("registry://{}", reference),
        }
    }

    /// Returns the OCI layout directory holding this image.
    pub fn materialize(&self, ctx: &MaterializeContext<'_>) -> Result<PathBuf> {
        fs::create_dir_all(ctx.cache_dir).map_err(|e| Error::io(ctx.cache_dir, e))?;
        let key = self.describe();
        match self {
            BaseImage::Tar { path } => ctx
                .downloads
                .get_or_populate(&key, ctx.cache_dir, || Ok(extract_tarball(path, ctx.cache_dir)?)),
            BaseImage::Daemon { reference, docker } => {
                if ctx.offline {
                    tracing::debug!(image = %reference, "docker daemon is local, allowed offline");
                }
                ctx.downloads.get_or_populate(&key, ctx.cache_dir, || {
                    let saved = tempfile::Builder::new()
                        .prefix(".docker-save-")
                        .suffix(".tar")
                        .tempfile_in(ctx.cache_dir)
                        .map_err(|e| Error::io(ctx.cache_dir, e))?;
                    docker.save(reference, saved.path())?;
                    Ok(extract_tarball(saved.path(), ctx.cache_dir)?)
                })
            }
            BaseImage::Registry {
                reference,
                credentials,
            } => ctx.downloads.get_or_populate(&key, ctx.cache_dir, || {
                pull_into_cache(reference, credentials, ctx)
            }),
        }
    }
}

fn pull_into_cache(
    reference: &ImageReference,
    credentials: &CredentialChain,
    ctx: &MaterializeContext<'_>,
) -> Result<PathBuf> {
    let dest = ctx.cache_dir.join(derive_key(&reference.to_string()));
    if dest.join(INDEX_FILE).is_file() {
        tracing::info!(image = %reference, path = %dest.display(), "base image already cached");
        return Ok(dest);
    }
    if ctx.offline {
        return Err(Error::Containerization(anyhow::anyhow!(
            "cannot pull {} in offline mode: not present in {}",
            reference,
            ctx.cache_dir.display()
        )));
    }

    let credential = credentials.resolve();
    if credential.is_none() {
        tracing::debug!(image = %reference, "pulling anonymously");
    }
    let staging = tempfile::Builder::new()
        .prefix(".pull-")
        .tempdir_in(ctx.cache_dir)
        .map_err(|e| Error::io(ctx.cache_dir, e))?;
    let layout = staging.path().join("layout");
    tracing::info!(image = %reference, platforms = ?ctx.platforms, "pulling base image");
    ctx.registry.pull(&PullRequest {
        reference,
        credential: credential.as_ref(),
        destination: &layout,
        platforms: ctx.platforms,
        allow_insecure: ctx.allow_insecure,
    })?;
    if !layout.join(INDEX_FILE).is_file() {
        return Err(Error::Containerization(anyhow::anyhow!(
            "pull of {} produced no OCI layout",
            reference
        )));
    }
    publish_dir(&layout, &dest)?;
    Ok(dest)
}

/// Renames a staged directory into place. Losing the race against another
/// process that published the same content is fine.
fn publish_dir(staged: &Path, dest: &Path) -> anyhow::Result<()> {
    match fs::rename(staged, dest) {
        Ok(()) => Ok(()),
        Err(_) if dest.join(INDEX_FILE).is_file() => Ok(()),
        Err(e) => Err(e).with_context(|| format!("publishing {}", dest.display())),
    }
}

/// Unpacks an image tarball (OCI layout or docker archive) into
/// `cache_dir/tar-<sha256>`, converting docker archives to a layout.
pub fn extract_tarball(tarball: &Path, cache_dir: &Path) -> anyhow::Result<PathBuf> {
    let hex = file_sha256(tarball).with_context(|| format!("reading {}", tarball.display()))?;
    let dest = cache_dir.join(format!("tar-{}", hex));
    if dest.join(INDEX_FILE).is_file() {
        return Ok(dest);
    }

    let staging = tempfile::Builder::new()
        .prefix(".extract-")
        .tempdir_in(cache_dir)?;
    let file = fs::File::open(tarball)?;
    advise_sequential(&file);
    let mut archive = tar::Archive::new(BufReader::with_capacity(IO_BUF_SIZE, file));
    archive.set_preserve_permissions(false);
    archive
        .unpack(staging.path())
        .with_context(|| format!("extracting {}", tarball.display()))?;

    if !staging.path().join(INDEX_FILE).is_file() {
        if staging.path().join(DOCKER_ARCHIVE_MANIFEST).is_file() {
            convert_docker_archive(staging.path())?;
        } else {
            bail!(
                "{} is neither an OCI layout nor a docker archive",
                tarball.display()
            );
        }
    }
    publish_dir(staging.path(), &dest)?;
    tracing::debug!(tarball = %tarball.display(), path = %dest.display(), "extracted base image");
    Ok(dest)
}

/// Adds blobs, a manifest and `index.json` to an extracted `docker save`
/// archive that only has `manifest.json` and loose files.
fn convert_docker_archive(root: &Path) -> anyhow::Result<()> {
    let manifest: Value = serde_json::from_reader(fs::File::open(root.join(DOCKER_ARCHIVE_MANIFEST))?)
        .context("parsing docker archive manifest.json")?;
    let image = manifest
        .as_array()
        .and_then(|images| images.first())
        .context("docker archive manifest.json lists no image")?;
    let config_path = image["Config"]
        .as_str()
        .context("missing 'Config' in docker archive manifest")?;
    let layer_paths = image["Layers"]
        .as_array()
        .context("missing 'Layers' in docker archive manifest")?;

    let store = BlobStore::open(root)?;
    let config = store
        .import_file(Some(OCI_CONFIG), &root.join(config_path))?;
    let mut layers = Vec::with_capacity(layer_paths.len());
    for (i, path) in layer_paths.iter().enumerate() {
        let path = root.join(
            path.as_str()
                .with_context(|| format!("invalid layer path at index {}", i))?,
        );
        let media_type = if is_gzip(&path)? {
            DOCKER_LAYER_GZIP
        } else {
            DOCKER_LAYER
        };
        layers.push(store.import_file(Some(media_type), &path)?.to_json());
    }

    let manifest = store.write_json(
        OCI_MANIFEST,
        &serde_json::json!({
            "schemaVersion": 2,
            "mediaType": OCI_MANIFEST,
            "config": config.to_json(),
            "layers": layers,
        }),
    )?;
    store.write_index(&[manifest.to_json()])
}

fn is_gzip(path: &Path) -> anyhow::Result<bool> {
    let mut magic = [0u8; 2];
    let mut file = fs::File::open(path)?;
    Ok(file.read(&mut magic)? == 2 && magic == [0x1f, 0x8b])
}

#[derive(Debug, Clone)]
pub struct BaseLayer {
    pub descriptor: BlobDescriptor,
    pub diff_id: String,
    /// `None` for media types this tool does not rewrite.
    pub compression: Option<Compression>,
}

/// One platform image of the base.
#[derive(Debug, Clone)]
pub struct BaseManifest {
    pub platform: Platform,
    pub layers: Vec<BaseLayer>,
    /// The complete image configuration.
    pub config: Value,
    pub history: Vec<Value>,
}

impl BaseManifest {
    pub fn runtime_config(&self) -> Option<&Value> {
        self.config.get("config")
    }
}

struct Candidate {
    platform: Option<Platform>,
    digest: String,
}

fn is_index(media_type: Option<&str>) -> bool {
    matches!(
        media_type,
        Some(crate::container::OCI_INDEX) | Some(crate::container::DOCKER_MANIFEST_LIST)
    )
}

fn collect_candidates(store: &BlobStore, index: &Value, out: &mut Vec<Candidate>) -> anyhow::Result<()> {
    let manifests = index["manifests"]
        .as_array()
        .context("missing 'manifests' in image index")?;
    for desc in manifests {
        let digest = desc["digest"]
            .as_str()
            .context("missing 'digest' in manifest descriptor")?;
        if is_index(desc["mediaType"].as_str()) {
            let nested = store.read_json(digest)?;
            collect_candidates(store, &nested, out)?;
            continue;
        }
        let platform = match (desc["platform"]["architecture"].as_str(), desc["platform"]["os"].as_str()) {
            (Some(architecture), Some(os)) => Some(Platform::new(architecture, os)),
            _ => None,
        };
        // Attestation manifests carry an "unknown" platform.
        if platform.as_ref().is_some_and(|p| p.os == "unknown") {
            continue;
        }
        out.push(Candidate {
            platform,
            digest: digest.to_string(),
        });
    }
    Ok(())
}

/// Reads the images matching `platforms` from an OCI layout.
pub fn read_layout(layout: &Path, platforms: &[Platform]) -> anyhow::Result<Vec<BaseManifest>> {
    let store = BlobStore::open(layout)?;
    let index: Value = serde_json::from_reader(
        fs::File::open(layout.join(INDEX_FILE)).context("opening index.json")?,
    )?;
    let mut candidates = Vec::new();
    collect_candidates(&store, &index, &mut candidates)?;

    let mut manifests = Vec::with_capacity(platforms.len());
    for platform in platforms {
        let chosen = candidates
            .iter()
            .find(|c| c.platform.as_ref() == Some(platform))
            .or_else(|| match candidates.as_slice() {
                [only] if only.platform.is_none() => Some(only),
                _ => None,
            });
        let Some(candidate) = chosen else {
            bail!("base image has no manifest for platform {}", platform);
        };
        manifests.push(read_manifest(&store, &candidate.digest, platform)?);
    }
    Ok(manifests)
}

fn read_manifest(store: &BlobStore, digest: &str, platform: &Platform) -> anyhow::Result<BaseManifest> {
    let manifest = store.read_json(digest)?;
    let config_digest = manifest["config"]["digest"]
        .as_str()
        .context("missing 'config.digest' in image manifest")?;
    let config = store.read_json(config_digest)?;

    let diff_ids = config["rootfs"]["diff_ids"]
        .as_array()
        .context("missing 'rootfs.diff_ids' array in image config")?;
    let layers = manifest["layers"]
        .as_array()
        .context("missing 'layers' array in image manifest")?;
    if diff_ids.len() != layers.len() {
        bail!(
            "malformed image: diff_ids count ({}) does not match layers count ({})",
            diff_ids.len(),
            layers.len()
        );
    }

    let layers = layers
        .iter()
        .zip(diff_ids)
        .enumerate()
        .map(|(i, (layer, diff_id))| {
            let descriptor: BlobDescriptor = serde_json::from_value(layer.clone())
                .with_context(|| format!("invalid layer descriptor at index {}", i))?;
            if !store.contains(&descriptor.digest) {
                bail!("layer {} missing from {}", descriptor.digest, store.root().display());
            }
            let diff_id = diff_id
                .as_str()
                .with_context(|| format!("invalid diff_id at index {}", i))?
                .to_string();
            let compression = descriptor.media_type.as_deref().and_then(layer_compression);
            Ok(BaseLayer {
                descriptor,
                diff_id,
                compression,
            })
        })
        .collect::<anyhow::Result<Vec<_>>>()?;

    let history = config
        .get("history")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();
    if let (Some(architecture), Some(os)) = (config["architecture"].as_str(), config["os"].as_str()) {
        let actual = Platform::new(architecture, os);
        if actual != *platform {
            tracing::warn!(requested = %platform, %actual, "base image platform differs");
        }
    }
    Ok(BaseManifest {
        platform: platform.clone(),
        layers,
        config,
        history,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::registry::PushRequest;
    use crate::util::sha256_hex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Writes a one-layer image for `platform` into `root` and returns its manifest descriptor.
    pub(crate) fn write_test_image(root: &Path, platform: &Platform) -> Value {
        let store = BlobStore::open(root).unwrap();
        let mut tar = tar::Builder::new(Vec::new());
        let mut header = tar::Header::new_gnu();
        header.set_size(3);
        header.set_mode(0o644);
        header.set_cksum();
        tar.append_data(&mut header, "etc/base", &b"abc"[..]).unwrap();
        let layer_bytes = tar.into_inner().unwrap();
        let layer = store
            .write_bytes(crate::container::OCI_LAYER, &layer_bytes)
            .unwrap();
        let config = store
            .write_json(
                OCI_CONFIG,
                &serde_json::json!({
                    "architecture": platform.architecture,
                    "os": platform.os,
                    "config": { "Env": ["PATH=/usr/bin"], "Entrypoint": ["/base"] },
                    "rootfs": { "type": "layers", "diff_ids": [format!("sha256:{}", sha256_hex(&layer_bytes))] },
                    "history": [{ "created_by": "base" }]
                }),
            )
            .unwrap();
        let manifest = store
            .write_json(
                OCI_MANIFEST,
                &serde_json::json!({
                    "schemaVersion": 2,
                    "mediaType": OCI_MANIFEST,
                    "config": config.to_json(),
                    "layers": [layer.to_json()],
                }),
            )
            .unwrap();
        let mut desc = manifest.to_json();
        desc["platform"] = platform.to_json();
        desc
    }

    /// Serves every pull from [`write_test_image`]. Pushes are not expected.
    #[derive(Default)]
    pub(crate) struct CountingPull {
        pulls: AtomicUsize,
    }

    impl CountingPull {
        pub(crate) fn pulls(&self) -> usize {
            self.pulls.load(Ordering::SeqCst)
        }
    }

    impl RegistryClient for CountingPull {
        fn pull(&self, request: &PullRequest<'_>) -> anyhow::Result<()> {
            self.pulls.fetch_add(1, Ordering::SeqCst);
            let desc = write_test_image(request.destination, &request.platforms[0]);
            BlobStore::open(request.destination)?.write_index(&[desc])
        }

        fn push(&self, _request: &PushRequest<'_>) -> anyhow::Result<()> {
            unreachable!()
        }
    }

    fn registry_base(image: &str) -> BaseImage {
        BaseImage::Registry {
            reference: ImageReference::parse(image).unwrap(),
            credentials: CredentialChain::new(image),
        }
    }

    #[test]
    fn registry_pull_is_cached_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let client = CountingPull {
            pulls: AtomicUsize::new(0),
        };
        let platforms = [Platform::default()];
        let base = registry_base("example.com/base:latest");

        let layout = {
            let downloads = DownloadCache::new();
            let ctx = MaterializeContext {
                cache_dir: dir.path(),
                downloads: &downloads,
                registry: &client,
                platforms: &platforms,
                offline: false,
                allow_insecure: false,
            };
            base.materialize(&ctx).unwrap()
        };
        assert_eq!(layout, dir.path().join("example.com-base_latest"));

        // A fresh process finds the layout and stays offline.
        let downloads = DownloadCache::new();
        let ctx = MaterializeContext {
            cache_dir: dir.path(),
            downloads: &downloads,
            registry: &client,
            platforms: &platforms,
            offline: true,
            allow_insecure: false,
        };
        assert_eq!(base.materialize(&ctx).unwrap(), layout);
        assert_eq!(client.pulls.load(Ordering::SeqCst), 1);

        let manifests = read_layout(&layout, &platforms).unwrap();
        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0].layers.len(), 1);
        assert_eq!(manifests[0].layers[0].compression, Some(Compression::Disabled));
        assert_eq!(manifests[0].runtime_config().unwrap()["Entrypoint"], serde_json::json!(["/base"]));
    }

    #[test]
    fn offline_pull_of_missing_image_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let client = CountingPull {
            pulls: AtomicUsize::new(0),
        };
        let downloads = DownloadCache::new();
        let ctx = MaterializeContext {
            cache_dir: dir.path(),
            downloads: &downloads,
            registry: &client,
            platforms: &[Platform::default()],
            offline: true,
            allow_insecure: false,
        };
        let err = registry_base("example.com/base:latest")
            .materialize(&ctx)
            .unwrap_err();
        assert!(err.to_string().contains("offline"));
        assert_eq!(client.pulls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn tar_base_and_platform_selection() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        let arm = Platform::new("arm64", "linux");
        let descs = vec![
            write_test_image(&src, &Platform::default()),
            write_test_image(&src, &arm),
        ];
        BlobStore::open(&src).unwrap().write_index(&descs).unwrap();

        let tarball = dir.path().join("base.tar");
        let mut builder = tar::Builder::new(fs::File::create(&tarball).unwrap());
        builder.append_dir_all(".", &src).unwrap();
        builder.finish().unwrap();
        drop(builder);

        let cache = dir.path().join("cache");
        let client = CountingPull {
            pulls: AtomicUsize::new(0),
        };
        let downloads = DownloadCache::new();
        let ctx = MaterializeContext {
            cache_dir: &cache,
            downloads: &downloads,
            registry: &client,
            platforms: &[arm.clone()],
            offline: true,
            allow_insecure: false,
        };
        let layout = BaseImage::Tar { path: tarball }.materialize(&ctx).unwrap();
        assert!(layout.file_name().unwrap().to_string_lossy().starts_with("tar-"));

        let manifests = read_layout(&layout, &[arm.clone()]).unwrap();
        assert_eq!(manifests[0].platform, arm);
        assert_eq!(manifests[0].config["architecture"], "arm64");

        let err = read_layout(&layout, &[Platform::new("s390x", "linux")]).unwrap_err();
        assert!(err.to_string().contains("linux/s390x"));
    }

    #[test]
    fn schemes_select_kind() {
        let env = CredentialEnvironment::default();
        let docker = DockerClient::default();
        let config = |image: &str| BaseImageConfig {
            image: image.to_string(),
            ..Default::default()
        };
        assert!(matches!(
            BaseImage::from_config(&config("tar://base.tar"), &docker, &env).unwrap(),
            BaseImage::Tar { .. }
        ));
        assert!(matches!(
            BaseImage::from_config(&config("docker://base:1"), &docker, &env).unwrap(),
            BaseImage::Daemon { .. }
        ));
        let base = BaseImage::from_config(&config("eclipse-temurin:21"), &docker, &env).unwrap();
        assert_eq!(
            base.describe(),
            "registry://registry-1.docker.io/library/eclipse-temurin:21"
        );
        assert!(BaseImage::from_config(&config("s3://bucket/base"), &docker, &env)
            .unwrap_err()
            .is_configuration());
    }
}
