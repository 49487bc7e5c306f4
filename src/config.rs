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

//! The build description read from YAML.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer};

use crate::credentials::{AuthParameters, CredHelperParameters};
use crate::error::{Error, Result};

pub const DEFAULT_CACHE_DIR: &str = "build/jvm-oci-cache";
pub const DEFAULT_APP_ROOT: &str = "/app";
pub const DEFAULT_OUTPUT_NAME: &str = "jvm-oci-image";
pub const DEFAULT_OUTPUT_DIR: &str = "build";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Gzip,
    Zstd,
    Disabled,
}

impl Compression {
    pub fn default_level(&self) -> Option<u32> {
        match self {
            Compression::Gzip => Some(5),
            Compression::Zstd => Some(3),
            Compression::Disabled => None,
        }
    }

    /// Levels the encoder accepts; `None` when nothing is compressed.
    pub fn level_range(&self) -> Option<RangeInclusive<u32>> {
        match self {
            Compression::Gzip => Some(0..=9),
            Compression::Zstd => Some(1..=22),
            Compression::Disabled => None,
        }
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Compression::Gzip => "gzip",
            Compression::Zstd => "zstd",
            Compression::Disabled => "disabled",
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildConfig {
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    pub base_image_cache: Option<PathBuf>,
    pub application_cache: Option<PathBuf>,
    #[serde(default)]
    pub offline_mode: bool,
    #[serde(default)]
    pub allow_insecure_registries: bool,
    #[serde(default)]
    pub compression: Compression,
    pub compression_level: Option<u32>,
    pub compression_threads: Option<usize>,
    #[serde(default)]
    pub images: Vec<ImageConfig>,
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(DEFAULT_CACHE_DIR)
}

impl Default for BuildConfig {
    fn default() -> Self {
        BuildConfig {
            cache_dir: default_cache_dir(),
            base_image_cache: None,
            application_cache: None,
            offline_mode: false,
            allow_insecure_registries: false,
            compression: Compression::default(),
            compression_level: None,
            compression_threads: None,
            images: Vec::new(),
        }
    }
}

/// Resolved compression settings for layer blobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerSettings {
    pub compression: Compression,
    pub level: Option<u32>,
    pub threads: usize,
}

impl BuildConfig {
    pub fn from_yaml(input: &str) -> Result<Self> {
        let config: BuildConfig = serde_yaml::from_str(input)
            .map_err(|e| Error::config(format!("cannot read build description: {}", e)))?;
        if let Some(level) = config.compression_level {
            match config.compression.level_range() {
                None => {
                    return Err(Error::config(
                        "compression-level cannot be set when compression is disabled",
                    ))
                }
                Some(range) if !range.contains(&level) => {
                    return Err(Error::config(format!(
                        "compression-level {} is out of range {}..={} for {}",
                        level,
                        range.start(),
                        range.end(),
                        config.compression
                    )))
                }
                Some(_) => {}
            }
        }
        if config.compression_threads == Some(0) {
            return Err(Error::config("compression-threads must be at least 1"));
        }
        Ok(config)
    }

    pub fn base_cache_dir(&self) -> PathBuf {
        self.base_image_cache
            .clone()
            .unwrap_or_else(|| self.cache_dir.join("base"))
    }

    pub fn application_cache_dir(&self) -> PathBuf {
        self.application_cache
            .clone()
            .unwrap_or_else(|| self.cache_dir.join("app"))
    }

    pub fn layer_settings(&self) -> LayerSettings {
        LayerSettings {
            compression: self.compression,
            level: self
                .compression_level
                .or_else(|| self.compression.default_level()),
            threads: self.compression_threads.unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(1)
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ImageConfig {
    pub from: BaseImageConfig,
    pub to: TargetImageConfig,
    pub container: ContainerSettings,
    #[serde(default)]
    pub dependencies: DependencySettings,
    #[serde(default)]
    pub extra_directories: ExtraDirectoriesSettings,
    #[serde(default)]
    pub docker_client: DockerClientSettings,
    #[serde(default)]
    pub output_paths: OutputPathSettings,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BaseImageConfig {
    pub image: String,
    pub auth: Option<AuthParameters>,
    pub cred_helper: Option<CredHelperParameters>,
    #[serde(default)]
    pub platforms: Vec<PlatformSettings>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlatformSettings {
    pub architecture: Option<String>,
    pub os: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TargetImageConfig {
    pub image: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub auth: Option<AuthParameters>,
    pub cred_helper: Option<CredHelperParameters>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ContainerSettings {
    pub main_class: Option<String>,
    #[serde(default)]
    pub jvm_flags: Vec<String>,
    pub entrypoint: Option<Vec<String>>,
    #[serde(default)]
    pub extra_classpath: Vec<String>,
    pub args: Option<Vec<String>>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
    #[serde(default)]
    pub ports: Vec<String>,
    #[serde(default)]
    pub volumes: Vec<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    pub app_root: Option<String>,
    pub user: Option<String>,
    pub working_directory: Option<String>,
    pub files_modification_time: Option<String>,
    pub creation_time: Option<String>,
    /// `oci` or `docker`. The docker daemon target always uses `docker`.
    pub format: Option<String>,
}

impl ContainerSettings {
    pub fn app_root(&self) -> &str {
        self.app_root
            .as_deref()
            .filter(|root| !root.is_empty())
            .unwrap_or(DEFAULT_APP_ROOT)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DependencySettings {
    #[serde(default)]
    pub runtime_classpath: Vec<PathBuf>,
    #[serde(default)]
    pub project_dependencies: Vec<PathBuf>,
    #[serde(default)]
    pub classes_dirs: Vec<PathBuf>,
    pub resources_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtraDirectoriesSettings {
    #[serde(default)]
    pub paths: Vec<ExtraDirectorySettings>,
    /// Container path or glob to octal permissions, in declaration order.
    #[serde(default, deserialize_with = "ordered_pairs")]
    pub permissions: Vec<(String, String)>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtraDirectorySettings {
    pub from: PathBuf,
    pub into: String,
    #[serde(default)]
    pub includes: Vec<String>,
    #[serde(default)]
    pub excludes: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DockerClientSettings {
    pub executable: Option<PathBuf>,
    #[serde(default)]
    pub environment: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputPathSettings {
    pub directory: Option<PathBuf>,
    pub name: Option<String>,
}

impl OutputPathSettings {
    pub fn directory(&self) -> &Path {
        self.directory
            .as_deref()
            .unwrap_or(Path::new(DEFAULT_OUTPUT_DIR))
    }

    pub fn name(&self) -> &str {
        self.name
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_OUTPUT_NAME)
    }
}

/// A YAML mapping read as a list of pairs so declaration order survives.
fn ordered_pairs<'de, D>(deserializer: D) -> std::result::Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct PairsVisitor;

    impl<'de> Visitor<'de> for PairsVisitor {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a mapping of paths to octal permission strings")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Self::Value, A::Error> {
            let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((key, value)) = map.next_entry::<String, String>()? {
                pairs.push((key, value));
            }
            Ok(pairs)
        }
    }

    deserializer.deserialize_map(PairsVisitor)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL: &str = r#"
cache-dir: /tmp/cache
offline-mode: true
compression: zstd
images:
  - from:
      image: registry://eclipse-temurin:21-jre
      platforms:
        - { architecture: arm64, os: linux }
    to:
      image: registry://example.com/app:1.0
      tags: [latest]
      auth: { username: ci, password: s3cret }
    container:
      main-class: com.example.Main
      jvm-flags: [-Xmx256m]
      ports: ["8080"]
    dependencies:
      runtime-classpath: [/libs/a.jar]
    extra-directories:
      paths:
        - { from: src/main/jib, into: /opt }
      permissions:
        "/opt/**/*.sh": "755"
        "/opt/bin/run.sh": "700"
        "/opt/*": "750"
"#;

    #[test]
    fn parses_full_description() {
        let config = BuildConfig::from_yaml(FULL).unwrap();
        assert!(config.offline_mode);
        assert_eq!(config.base_cache_dir(), PathBuf::from("/tmp/cache/base"));
        assert_eq!(config.application_cache_dir(), PathBuf::from("/tmp/cache/app"));

        let settings = config.layer_settings();
        assert_eq!(settings.compression, Compression::Zstd);
        assert_eq!(settings.level, Some(3));
        assert!(settings.threads >= 1);

        let image = &config.images[0];
        assert_eq!(image.container.app_root(), DEFAULT_APP_ROOT);
        assert_eq!(image.to.tags, vec!["latest"]);
        assert_eq!(
            image.to.auth.as_ref().and_then(AuthParameters::credential).unwrap().username(),
            "ci"
        );
        assert_eq!(image.from.platforms[0].architecture.as_deref(), Some("arm64"));
        assert_eq!(image.output_paths.name(), DEFAULT_OUTPUT_NAME);
        assert_eq!(image.output_paths.directory(), Path::new(DEFAULT_OUTPUT_DIR));
    }

    #[test]
    fn permissions_keep_declaration_order() {
        let config = BuildConfig::from_yaml(FULL).unwrap();
        let keys: Vec<&str> = config.images[0]
            .extra_directories
            .permissions
            .iter()
            .map(|(k, _)| k.as_str())
            .collect();
        assert_eq!(keys, vec!["/opt/**/*.sh", "/opt/bin/run.sh", "/opt/*"]);
    }

    #[test]
    fn invalid_descriptions_are_configuration_errors() {
        assert!(BuildConfig::from_yaml("compression: brotli")
            .unwrap_err()
            .is_configuration());
        assert!(BuildConfig::from_yaml("compression: disabled\ncompression-level: 3")
            .unwrap_err()
            .is_configuration());
        for out_of_range in [
            "compression-level: 10",
            "compression: zstd\ncompression-level: 0",
            "compression: zstd\ncompression-level: 23",
        ] {
            let err = BuildConfig::from_yaml(out_of_range).unwrap_err();
            assert!(err.is_configuration(), "{out_of_range}");
            assert!(err.to_string().contains("out of range"), "{out_of_range}");
        }
        assert!(BuildConfig::from_yaml("compression-level: 9").is_ok());
        assert!(BuildConfig::from_yaml("compression: zstd\ncompression-level: 22").is_ok());
        assert!(BuildConfig::from_yaml("images: [{ to: { image: x } }]")
            .unwrap_err()
            .is_configuration());
    }

    #[test]
    fn defaults() {
        let config = BuildConfig::from_yaml("{}").unwrap();
        assert_eq!(config.cache_dir, PathBuf::from(DEFAULT_CACHE_DIR));
        assert_eq!(config.compression, Compression::Gzip);
        assert_eq!(config.layer_settings().level, Some(5));
        assert!(config.images.is_empty());
    }
}
