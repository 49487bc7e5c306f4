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

//! Drives one image build through its stages, and all images of a build description.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use rayon::prelude::*;
use rustc_hash::FxHashMap;

use crate::base_image::{read_layout, BaseImage, BaseManifest, MaterializeContext};
use crate::blob::BlobStore;
use crate::classpath::{container_file_names, partition, ClasspathInputs, ClasspathPartition};
use crate::config::{BuildConfig, ImageConfig, LayerSettings};
use crate::container::{check_absolute, parse_ports, ContainerConfig, ImageFormat, Platform};
use crate::credentials::{resolve_credentials, CredentialChain, CredentialEnvironment};
use crate::docker::DockerClient;
use crate::download_cache::{derive_key, DownloadCache};
use crate::entrypoint::{configure_entrypoint, Entrypoint, EntrypointInputs};
use crate::error::{BuildStage, Error, Result};
use crate::extra_dirs::{ExtraDirectory, PermissionRules};
use crate::image_builder::{build_layer, write_layout, write_tarball, AppLayer, BuiltImage, ImagePlan};
use crate::layer_builder::{FileEntriesLayer, LayerEntry, LayerRole};
use crate::metadata::{write_metadata, ImageMetadataOutput, OutputPaths};
use crate::reference::{split_scheme, ImageReference, ImageScheme};
use crate::registry::{PushRequest, RegistryClient};
use crate::timestamp::{
    resolve_timestamp, ModificationTimeProvider, DEFAULT_CREATION_TIME,
    DEFAULT_FILES_MODIFICATION_TIME,
};

const JVM_ARG_FILES_DIR: &str = "jvm-arg-files";

/// Process-wide collaborators shared by every build.
pub struct BuildContext<'a> {
    pub config: &'a BuildConfig,
    pub downloads: &'a DownloadCache,
    pub registry: &'a dyn RegistryClient,
    pub env: &'a CredentialEnvironment,
}

/// Where the finished image goes.
pub enum Target {
    Registry {
        reference: ImageReference,
        credentials: CredentialChain,
    },
    Docker {
        reference: ImageReference,
        docker: DockerClient,
    },
    Tar {
        reference: ImageReference,
    },
}

impl Target {
    pub fn reference(&self) -> &ImageReference {
        match self {
            Target::Registry { reference, .. }
            | Target::Docker { reference, .. }
            | Target::Tar { reference } => reference,
        }
    }
}

/// A validated image build. Holds everything derived from the description so
/// later stages only do I/O.
pub struct Build {
    stage: BuildStage,
    base: BaseImage,
    target: Target,
    additional_tags: Vec<ImageReference>,
    platforms: Vec<Platform>,
    main_class: String,
    app_root: String,
    classpath: ClasspathInputs,
    extra_directories: Vec<ExtraDirectory>,
    permissions: PermissionRules,
    file_times: ModificationTimeProvider,
    container: ContainerConfig,
    jvm_arg_files_dir: PathBuf,
    output: OutputPaths,
    image: ImageConfig,
}

/// The application layers of an image, in stacking order.
struct ComposedLayers {
    layers: Vec<FileEntriesLayer>,
}

impl Build {
    /// Validates `image` without touching the network or the base image.
    pub fn configure(image: &ImageConfig, ctx: &BuildContext<'_>) -> Result<Self> {
        Self::configure_inner(image, ctx).map_err(|e| e.at(BuildStage::Configured))
    }

    fn configure_inner(image: &ImageConfig, ctx: &BuildContext<'_>) -> Result<Self> {
        let docker = DockerClient::new(
            image.docker_client.executable.clone(),
            image.docker_client.environment.clone(),
        );
        let base = BaseImage::from_config(&image.from, &docker, ctx.env)?;

        let (scheme, rest) = split_scheme(&image.to.image)?;
        let reference = ImageReference::parse(rest)?;
        let additional_tags = image
            .to
            .tags
            .iter()
            .map(|tag| reference.with_tag(tag))
            .collect::<Result<Vec<_>>>()?;
        let target = match scheme {
            ImageScheme::Registry => {
                if ctx.config.offline_mode {
                    return Err(Error::config(format!(
                        "cannot push {} in offline mode",
                        reference
                    )));
                }
                let credentials = resolve_credentials(
                    &reference,
                    image.to.auth.as_ref(),
                    image.to.cred_helper.as_ref(),
                    ctx.env,
                );
                Target::Registry {
                    reference,
                    credentials,
                }
            }
            ImageScheme::DockerDaemon => Target::Docker { reference, docker },
            ImageScheme::Tar => Target::Tar { reference },
        };

        let container = &image.container;
        let main_class = container
            .main_class
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .ok_or_else(|| Error::config("main class is required"))?
            .to_string();
        let app_root = container.app_root().to_string();
        check_absolute("app root", &app_root)?;
        for volume in &container.volumes {
            check_absolute("volume", volume)?;
        }
        if let Some(dir) = &container.working_directory {
            check_absolute("working directory", dir)?;
        }
        let ports = parse_ports(&container.ports)?;

        let format = match (&target, container.format.as_deref()) {
            (Target::Docker { .. }, _) => ImageFormat::Docker,
            (_, None) | (_, Some("oci")) | (_, Some("OCI")) => ImageFormat::Oci,
            (_, Some("docker")) | (_, Some("Docker")) => ImageFormat::Docker,
            (_, Some(other)) => {
                return Err(Error::config(format!(
                    "unknown image format '{}': expected oci or docker",
                    other
                )))
            }
        };
        format.layer_media_type(ctx.config.compression)?;

        let creation_time = resolve_timestamp(
            container
                .creation_time
                .as_deref()
                .unwrap_or(DEFAULT_CREATION_TIME),
        )?;
        let file_times = ModificationTimeProvider::from_policy(
            container
                .files_modification_time
                .as_deref()
                .unwrap_or(DEFAULT_FILES_MODIFICATION_TIME),
        )?;

        let extra_directories = image
            .extra_directories
            .paths
            .iter()
            .map(|dir| ExtraDirectory::new(dir.from.clone(), &dir.into, &dir.includes, &dir.excludes))
            .collect::<Result<Vec<_>>>()?;
        let permissions = PermissionRules::parse(&image.extra_directories.permissions)?;

        let pairs: Vec<(Option<String>, Option<String>)> = image
            .from
            .platforms
            .iter()
            .map(|p| (p.architecture.clone(), p.os.clone()))
            .collect();
        let platforms = Platform::from_pairs(&pairs);

        let classpath = ClasspathInputs {
            runtime_classpath: image.dependencies.runtime_classpath.clone(),
            project_dependencies: image.dependencies.project_dependencies.clone(),
            classes_dirs: image.dependencies.classes_dirs.clone(),
            resources_dir: image.dependencies.resources_dir.clone(),
        };

        let jvm_arg_files_dir = ctx
            .config
            .application_cache_dir()
            .join(JVM_ARG_FILES_DIR)
            .join(derive_key(&image.to.image));
        let output = OutputPaths::new(
            image.output_paths.directory(),
            image.output_paths.name(),
        );

        let container_config = ContainerConfig {
            environment: container.environment.clone(),
            ports,
            volumes: container.volumes.iter().cloned().collect(),
            labels: container.labels.clone(),
            user: container.user.clone(),
            working_directory: container.working_directory.clone(),
            // Replaced once the launcher files are written.
            entrypoint: Entrypoint::Inherit,
            args: container.args.clone(),
            creation_time,
            format,
        };

        tracing::debug!(
            base = %base.describe(),
            image = %image.to.image,
            ?format,
            "build configured"
        );
        Ok(Build {
            stage: BuildStage::Configured,
            base,
            target,
            additional_tags,
            platforms,
            main_class,
            app_root,
            classpath,
            extra_directories,
            permissions,
            file_times,
            container: container_config,
            jvm_arg_files_dir,
            output,
            image: image.clone(),
        })
    }

    pub fn stage(&self) -> BuildStage {
        self.stage
    }

    pub fn target(&self) -> &Target {
        &self.target
    }

    fn advance(&mut self, stage: BuildStage) {
        tracing::debug!(image = %self.image.to.image, from = ?self.stage, to = ?stage, "build stage");
        self.stage = stage;
    }

    /// Runs the remaining stages. Errors carry the stage they happened in.
    pub fn run(mut self, ctx: &BuildContext<'_>) -> Result<ImageMetadataOutput> {
        let (base_layout, base) = self
            .resolve_base(ctx)
            .map_err(|e| e.at(BuildStage::BaseResolved))?;
        self.advance(BuildStage::BaseResolved);

        let partition = partition(&self.classpath);
        self.advance(BuildStage::DependenciesPartitioned);

        let composed = self
            .compose_layers(&partition)
            .map_err(|e| e.at(BuildStage::LayersComposed))?;
        self.advance(BuildStage::LayersComposed);

        let (built, pushed) = self
            .containerize(ctx, &base_layout, &base, &composed)
            .map_err(|e| e.at(BuildStage::Containerized))?;
        self.advance(BuildStage::Containerized);

        let output = ImageMetadataOutput {
            image: self.target.reference().to_string(),
            image_id: built.image_id().to_string(),
            image_digest: built.digest().to_string(),
            tags: self.tags(),
            image_pushed: pushed,
        };
        write_metadata(&self.output, &output).map_err(|e| e.at(BuildStage::MetadataWritten))?;
        self.advance(BuildStage::MetadataWritten);
        Ok(output)
    }

    /// Main tag followed by the additional tags, without repeats.
    fn tags(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.target
            .reference()
            .tag()
            .into_iter()
            .chain(self.additional_tags.iter().filter_map(ImageReference::tag))
            .filter(|tag| seen.insert(tag.to_string()))
            .map(str::to_string)
            .collect()
    }

    fn resolve_base(&self, ctx: &BuildContext<'_>) -> Result<(PathBuf, Vec<BaseManifest>)> {
        let cache_dir = ctx.config.base_cache_dir();
        let layout = self.base.materialize(&MaterializeContext {
            cache_dir: &cache_dir,
            downloads: ctx.downloads,
            registry: ctx.registry,
            platforms: &self.platforms,
            offline: ctx.config.offline_mode,
            allow_insecure: ctx.config.allow_insecure_registries,
        })?;
        let manifests = read_layout(&layout, &self.platforms)?;
        tracing::info!(
            base = %self.base.describe(),
            platforms = manifests.len(),
            "base image resolved"
        );
        Ok((layout, manifests))
    }

    fn compose_layers(&mut self, partition: &ClasspathPartition) -> Result<ComposedLayers> {
        let app_root = self.app_root.trim_end_matches('/').to_string();
        let libs = format!("{}/libs", app_root);
        let mut layers = Vec::new();

        // Names are assigned over all libraries at once so that duplicates are
        // renamed the same way here and on the classpath.
        let libraries: Vec<&Path> = partition
            .project_dependencies
            .iter()
            .chain(&partition.snapshot_dependencies)
            .chain(&partition.dependencies)
            .map(PathBuf::as_path)
            .collect();
        let names: FxHashMap<&Path, String> = libraries
            .iter()
            .copied()
            .zip(container_file_names(&libraries)?)
            .collect();
        let classpath_libraries: Vec<String> = partition
            .classpath_jars(&self.classpath.runtime_classpath)
            .into_iter()
            .map(|path| names[path].clone())
            .collect();

        for (role, paths) in [
            (LayerRole::Dependencies, &partition.dependencies),
            (LayerRole::SnapshotDependencies, &partition.snapshot_dependencies),
            (LayerRole::ProjectDependencies, &partition.project_dependencies),
        ] {
            let mut layer = FileEntriesLayer::new(role);
            for path in paths {
                let container_path = format!("{}/{}", libs, names[path.as_path()]);
                if path.is_dir() {
                    layer.add_directory(path, &container_path, &self.file_times)?;
                } else {
                    layer.add_entry(LayerEntry::new(path, container_path, self.file_times.get()));
                }
            }
            layers.push(layer);
        }

        let mut resources = FileEntriesLayer::new(LayerRole::Resources);
        if let Some(dir) = &partition.resources {
            resources.add_directory(dir, &format!("{}/resources", app_root), &self.file_times)?;
        }
        layers.push(resources);

        let mut classes = FileEntriesLayer::new(LayerRole::Classes);
        for dir in &partition.classes {
            classes.add_directory(dir, &format!("{}/classes", app_root), &self.file_times)?;
        }
        layers.push(classes);

        let (entrypoint, jvm_arg_files) = configure_entrypoint(
            &EntrypointInputs {
                cache_dir: &self.jvm_arg_files_dir,
                app_root: &app_root,
                entrypoint: self.image.container.entrypoint.as_deref(),
                main_class: &self.main_class,
                jvm_flags: &self.image.container.jvm_flags,
                libraries: &classpath_libraries,
                extra_classpath: &self.image.container.extra_classpath,
            },
            &self.file_times,
        )?;
        self.container.entrypoint = entrypoint;
        layers.push(jvm_arg_files);

        for dir in &self.extra_directories {
            if let Some(layer) = dir.build_layer(&self.permissions, &self.file_times)? {
                layers.push(layer);
            }
        }

        layers.retain(|layer| !layer.is_empty());
        tracing::debug!(
            layers = ?layers.iter().map(|l| (l.name(), l.len())).collect::<Vec<_>>(),
            "layers composed"
        );
        Ok(ComposedLayers { layers })
    }

    fn containerize(
        &self,
        ctx: &BuildContext<'_>,
        base_layout: &Path,
        base: &[BaseManifest],
        composed: &ComposedLayers,
    ) -> Result<(BuiltImage, bool)> {
        let app_cache = ctx.config.application_cache_dir();
        let app_store = BlobStore::open(&app_cache)?;
        let base_store = BlobStore::open(base_layout)?;
        let settings: LayerSettings = ctx.config.layer_settings();

        let app_layers = composed
            .layers
            .par_iter()
            .map(|layer| -> Result<AppLayer> {
                Ok(AppLayer {
                    name: layer.name(),
                    blob: build_layer(layer, &app_store, &settings)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let staging = tempfile::Builder::new()
            .prefix(".layout-")
            .tempdir_in(&app_cache)
            .map_err(|e| Error::io(&app_cache, e))?;
        let reference = self.target.reference().to_string();
        let plan = ImagePlan {
            base,
            base_store: &base_store,
            app_layers: &app_layers,
            app_store: &app_store,
            container: &self.container,
        };
        let built = write_layout(&plan, staging.path(), Some(&reference))?;
        let layout = BlobStore::open(staging.path())?;

        let pushed = match &self.target {
            Target::Registry {
                reference,
                credentials,
            } => {
                let credential = credentials.resolve();
                for destination in self.destinations() {
                    tracing::info!(image = %destination, "pushing image");
                    ctx.registry.push(&PushRequest {
                        layout: staging.path(),
                        reference: destination,
                        credential: credential.as_ref(),
                        allow_insecure: ctx.config.allow_insecure_registries,
                    })?;
                }
                true
            }
            Target::Docker { reference, docker } => {
                let tarball = tempfile::Builder::new()
                    .prefix(".docker-load-")
                    .suffix(".tar")
                    .tempfile_in(&app_cache)
                    .map_err(|e| Error::io(&app_cache, e))?;
                write_tarball(&layout, &built, &self.repo_tags(), tarball.path())?;
                let loaded = docker.load(tarball.path())?;
                tracing::info!(image = %reference, output = %loaded, "loaded image into docker");
                false
            }
            Target::Tar { reference } => {
                let dest = self.output.tar();
                write_tarball(&layout, &built, &self.repo_tags(), &dest)?;
                tracing::info!(image = %reference, path = %dest.display(), "wrote image tarball");
                false
            }
        };
        Ok((built, pushed))
    }

    /// The target reference and its additional tags, each once.
    fn destinations(&self) -> Vec<&ImageReference> {
        let mut seen = BTreeSet::new();
        std::iter::once(self.target.reference())
            .chain(&self.additional_tags)
            .filter(|reference| seen.insert(reference.to_string()))
            .collect()
    }

    fn repo_tags(&self) -> Vec<String> {
        self.destinations()
            .into_iter()
            .map(ToString::to_string)
            .collect()
    }
}

/// Builds every image of `config`. All descriptions are validated before any
/// build starts; builds then run in parallel and share base image downloads.
pub fn build_all(
    config: &BuildConfig,
    registry: &dyn RegistryClient,
    env: &CredentialEnvironment,
) -> Result<Vec<ImageMetadataOutput>> {
    let downloads = DownloadCache::new();
    let ctx = BuildContext {
        config,
        downloads: &downloads,
        registry,
        env,
    };
    let builds = config
        .images
        .iter()
        .map(|image| Build::configure(image, &ctx))
        .collect::<Result<Vec<_>>>()?;
    if !builds.is_empty() {
        fs::create_dir_all(config.application_cache_dir())
            .map_err(|e| Error::io(config.application_cache_dir(), e))?;
    }

    builds
        .into_par_iter()
        .map(|build| {
            let target = build.target().reference().to_string();
            build.run(&ctx).inspect_err(|err| {
                tracing::error!(image = %target, error = %err, "image build failed");
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_image::tests::{write_test_image, CountingPull};

    fn description(cache: &Path, to: &str, extra: &str) -> String {
        format!(
            r#"
cache-dir: {cache}
images:
  - from:
      image: tar://{cache}/base.tar
    to:
      image: {to}
    container:
      main-class: com.example.Main
{extra}
"#,
            cache = cache.display(),
            to = to,
            extra = extra
        )
    }

    fn context<'a>(
        config: &'a BuildConfig,
        downloads: &'a DownloadCache,
        registry: &'a CountingPull,
        env: &'a CredentialEnvironment,
    ) -> BuildContext<'a> {
        BuildContext {
            config,
            downloads,
            registry,
            env,
        }
    }

    #[test]
    fn missing_main_class_fails_while_configuring() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = description(dir.path(), "tar://out:1", "").replace("main-class: com.example.Main", "jvm-flags: []");
        let config = BuildConfig::from_yaml(&yaml).unwrap();
        let (downloads, registry, env) =
            (DownloadCache::new(), CountingPull::default(), CredentialEnvironment::default());
        let ctx = context(&config, &downloads, &registry, &env);

        let err = Build::configure(&config.images[0], &ctx).err().unwrap();
        assert_eq!(err.stage(), Some(BuildStage::Configured));
        assert!(err.is_configuration());
    }

    #[test]
    fn configuring_does_not_touch_the_base_image() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = description(dir.path(), "tar://example.com/out:1", "      ports: ['8080/udp']");
        let config = BuildConfig::from_yaml(&yaml).unwrap();
        let (downloads, registry, env) =
            (DownloadCache::new(), CountingPull::default(), CredentialEnvironment::default());
        let ctx = context(&config, &downloads, &registry, &env);

        let build = Build::configure(&config.images[0], &ctx).unwrap();
        assert_eq!(build.stage(), BuildStage::Configured);
        assert_eq!(build.target().reference().to_string(), "example.com/out:1");
        assert!(downloads.is_empty());
        assert!(!dir.path().join("base").exists());
    }

    #[test]
    fn relative_volume_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = description(dir.path(), "tar://out:1", "      volumes: [data]");
        let config = BuildConfig::from_yaml(&yaml).unwrap();
        let (downloads, registry, env) =
            (DownloadCache::new(), CountingPull::default(), CredentialEnvironment::default());
        let ctx = context(&config, &downloads, &registry, &env);

        let err = Build::configure(&config.images[0], &ctx).err().unwrap();
        assert!(err.to_string().contains("volume 'data'"));
    }

    #[test]
    fn offline_push_fails_before_any_work() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = format!(
            "offline-mode: true\n{}",
            description(dir.path(), "registry://example.com/out:1", "")
        );
        let config = BuildConfig::from_yaml(&yaml).unwrap();
        let registry = CountingPull::default();

        let err = build_all(&config, &registry, &CredentialEnvironment::default()).unwrap_err();
        assert_eq!(err.stage(), Some(BuildStage::Configured));
        assert!(err.to_string().contains("offline mode"));
        assert!(!config.application_cache_dir().exists());
    }

    #[test]
    fn zstd_with_docker_format_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = format!(
            "compression: zstd\n{}",
            description(dir.path(), "docker://out:1", "")
        );
        let config = BuildConfig::from_yaml(&yaml).unwrap();
        let registry = CountingPull::default();

        let err = build_all(&config, &registry, &CredentialEnvironment::default()).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("zstd"));
    }

    #[test]
    fn missing_base_is_attributed_to_base_resolution() {
        let dir = tempfile::tempdir().unwrap();
        let config = BuildConfig::from_yaml(&description(dir.path(), "tar://out:1", "")).unwrap();
        let registry = CountingPull::default();

        let err = build_all(&config, &registry, &CredentialEnvironment::default()).unwrap_err();
        assert_eq!(err.stage(), Some(BuildStage::BaseResolved));
    }

    #[test]
    fn tar_target_writes_tarball_and_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let base_root = dir.path().join("base-layout");
        fs::create_dir_all(&base_root).unwrap();
        let manifest = write_test_image(&base_root, &Platform::default());
        BlobStore::open(&base_root)
            .unwrap()
            .write_index(&[manifest])
            .unwrap();
        let base_tar = dir.path().join("base.tar");
        let mut builder = tar::Builder::new(fs::File::create(&base_tar).unwrap());
        builder.append_dir_all(".", &base_root).unwrap();
        builder.finish().unwrap();
        drop(builder);

        let classes = dir.path().join("classes/com/example");
        fs::create_dir_all(&classes).unwrap();
        fs::write(classes.join("Main.class"), "cafebabe").unwrap();
        let extra = format!(
            "      ports: ['8080']\n    dependencies:\n      classes-dirs: [{}]\n    output-paths:\n      directory: {}\n      name: app",
            dir.path().join("classes").display(),
            dir.path().join("out").display()
        );
        let yaml = description(dir.path(), "tar://example.com/app:1.0", &extra)
            .replace("    to:\n      image: tar://example.com/app:1.0", "    to:\n      image: tar://example.com/app:1.0\n      tags: [latest, '1.0']");
        let config = BuildConfig::from_yaml(&yaml).unwrap();
        let registry = CountingPull::default();

        let outputs = build_all(&config, &registry, &CredentialEnvironment::default()).unwrap();
        assert_eq!(outputs.len(), 1);
        let output = &outputs[0];
        assert_eq!(output.image, "example.com/app:1.0");
        assert_eq!(output.tags, vec!["1.0".to_string(), "latest".to_string()]);
        assert!(!output.image_pushed);
        assert!(output.image_digest.starts_with("sha256:"));

        let paths = OutputPaths::new(dir.path().join("out"), "app");
        assert!(paths.tar().is_file());
        assert_eq!(fs::read_to_string(paths.digest()).unwrap(), output.image_digest);
        assert_eq!(registry.pulls(), 0);
    }
}
