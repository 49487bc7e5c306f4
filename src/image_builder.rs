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

use std::fs;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use flate2::write::GzEncoder;
use gzp::deflate::Gzip;
use gzp::par::compress::ParCompress;
use gzp::ZWriter;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sha2::{Digest, Sha256};
use zstd::stream::write::Encoder as ZstdEncoder;

use crate::base_image::BaseManifest;
use crate::blob::{BlobDescriptor, BlobStore, INDEX_FILE, OCI_LAYOUT_FILE};
use crate::config::{Compression, LayerSettings};
use crate::container::{ContainerConfig, Platform};
use crate::layer_builder::{write_layer, FileEntriesLayer};
use crate::util::{advise_sequential, sha256_hex, HashingWriter, SharedHashWriter, IO_BUF_SIZE};

pub const CREATED_BY: &str = "build-jvm-oci";
const REF_NAME_ANNOTATION: &str = "org.opencontainers.image.ref.name";

/// A layer tar stored in the application layer cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerBlob {
    pub digest: String,
    pub size: u64,
    /// Digest of the uncompressed tar.
    pub diff_id: String,
    pub compression: Compression,
}

/// Cache record for a layer, stored under `selectors/`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SelectorRecord {
    digest: String,
    size: u64,
    diff_id: String,
}

fn selector_path(cache: &BlobStore, layer: &FileEntriesLayer, settings: &LayerSettings) -> Result<PathBuf> {
    let key = format!(
        "{}\0{}\0{:?}",
        layer.selector()?,
        settings.compression,
        settings.level
    );
    Ok(cache.root().join("selectors").join(sha256_hex(key.as_bytes())))
}

fn cached_layer(cache: &BlobStore, selector: &Path, compression: Compression) -> Option<LayerBlob> {
    let record: SelectorRecord = serde_json::from_slice(&fs::read(selector).ok()?).ok()?;
    if !cache.contains(&record.digest) {
        return None;
    }
    Some(LayerBlob {
        digest: record.digest,
        size: record.size,
        diff_id: record.diff_id,
        compression,
    })
}

/// Writes `layer` into the application layer cache unless an identical layer is
/// already there.
pub fn build_layer(layer: &FileEntriesLayer, cache: &BlobStore, settings: &LayerSettings) -> Result<LayerBlob> {
    let selector = selector_path(cache, layer, settings)?;
    if let Some(blob) = cached_layer(cache, &selector, settings.compression) {
        tracing::debug!(layer = layer.name(), digest = %blob.digest, "reusing cached layer");
        return Ok(blob);
    }

    let (descriptor, diff_digest) = match settings.compression {
        Compression::Gzip if settings.threads <= 1 => {
            let compressed_tmp = cache.temp_file()?;
            let level = flate2::Compression::new(settings.level.unwrap_or(5));

            // tar -> BufWriter -> HashingWriter(diff_id) -> gzip -> HashingWriter(blob) -> file
            let blob_hasher = HashingWriter::new(BufWriter::new(compressed_tmp.reopen()?));
            let diff_hasher = HashingWriter::new(GzEncoder::new(blob_hasher, level));
            let mut tar_builder = tar::Builder::new(BufWriter::new(diff_hasher));
            tar_builder.follow_symlinks(false);
            write_layer(&mut tar_builder, layer)?;

            let buf_writer = tar_builder.into_inner()?;
            let hashing_writer = buf_writer
                .into_inner()
                .map_err(|e| anyhow::anyhow!("bufwriter: {}", e))?;
            let (encoder, diff_digest) = hashing_writer.finish()?;
            let (mut buf_writer, blob_digest) = encoder.finish()?.finish()?;
            buf_writer.flush()?;

            let size = compressed_tmp.as_file().metadata()?.len();
            (
                cache.persist_temp(None, compressed_tmp, size, &blob_digest)?,
                diff_digest,
            )
        }
        Compression::Gzip => {
            let compressed_tmp = cache.temp_file()?;
            let level = settings.level.unwrap_or(5);

            // ParCompress consumes the writer, so the blob hasher is shared.
            let blob_hasher = Arc::new(Mutex::new(Sha256::new()));
            let shared_writer =
                SharedHashWriter::new(BufWriter::new(compressed_tmp.reopen()?), blob_hasher.clone());

            let parz: ParCompress<Gzip> = ParCompress::<Gzip>::builder()
                .num_threads(settings.threads)
                .map_err(|e| anyhow::anyhow!("gzp thread config: {}", e))?
                .compression_level(gzp::Compression::new(level))
                .from_writer(shared_writer);

            // tar -> BufWriter -> HashingWriter(diff_id) -> gzp -> SharedHashWriter(blob) -> file
            let diff_hasher = HashingWriter::new(parz);
            let mut tar_builder = tar::Builder::new(BufWriter::new(diff_hasher));
            tar_builder.follow_symlinks(false);
            write_layer(&mut tar_builder, layer)?;

            let buf_writer = tar_builder.into_inner()?;
            let hashing_writer = buf_writer
                .into_inner()
                .map_err(|e| anyhow::anyhow!("bufwriter: {}", e))?;
            let (mut parz_writer, diff_digest) = hashing_writer.finish()?;
            parz_writer
                .finish()
                .map_err(|e| anyhow::anyhow!("parallel gzip: {}", e))?;

            let blob_digest = format!(
                "{:x}",
                blob_hasher
                    .lock()
                    .map_err(|e| anyhow::anyhow!("blob hasher lock poisoned: {}", e))?
                    .clone()
                    .finalize()
            );
            let size = compressed_tmp.as_file().metadata()?.len();
            (
                cache.persist_temp(None, compressed_tmp, size, &blob_digest)?,
                diff_digest,
            )
        }
        Compression::Zstd => {
            let compressed_tmp = cache.temp_file()?;
            let level = settings.level.unwrap_or(3) as i32;

            let blob_hasher = HashingWriter::new(BufWriter::new(compressed_tmp.reopen()?));
            let mut zstd_encoder = ZstdEncoder::new(blob_hasher, level)?;
            zstd_encoder.multithread(settings.threads as u32)?;

            // tar -> BufWriter -> HashingWriter(diff_id) -> zstd -> HashingWriter(blob) -> file
            let diff_hasher = HashingWriter::new(zstd_encoder);
            let mut tar_builder = tar::Builder::new(BufWriter::new(diff_hasher));
            tar_builder.follow_symlinks(false);
            write_layer(&mut tar_builder, layer)?;

            let buf_writer = tar_builder.into_inner()?;
            let hashing_writer = buf_writer
                .into_inner()
                .map_err(|e| anyhow::anyhow!("bufwriter: {}", e))?;
            let (zstd_writer, diff_digest) = hashing_writer.finish()?;
            let blob_hasher = zstd_writer.finish()?;
            let (mut buf_writer, blob_digest) = blob_hasher.finish()?;
            buf_writer.flush()?;

            let size = compressed_tmp.as_file().metadata()?.len();
            (
                cache.persist_temp(None, compressed_tmp, size, &blob_digest)?,
                diff_digest,
            )
        }
        Compression::Disabled => {
            // diff_id == blob digest
            let tar_tmp = cache.temp_file()?;
            let hashing_writer = HashingWriter::new(BufWriter::new(tar_tmp.reopen()?));
            let mut tar_builder = tar::Builder::new(BufWriter::new(hashing_writer));
            tar_builder.follow_symlinks(false);
            write_layer(&mut tar_builder, layer)?;

            let buf_writer = tar_builder.into_inner()?;
            let hashing_writer = buf_writer
                .into_inner()
                .map_err(|e| anyhow::anyhow!("bufwriter: {}", e))?;
            let (mut buf_writer_file, digest) = hashing_writer.finish()?;
            buf_writer_file.flush()?;

            let size = tar_tmp.as_file().metadata()?.len();
            (cache.persist_temp(None, tar_tmp, size, &digest)?, digest)
        }
    };

    let blob = LayerBlob {
        digest: descriptor.digest,
        size: descriptor.size,
        diff_id: format!("sha256:{}", diff_digest),
        compression: settings.compression,
    };
    let record = SelectorRecord {
        digest: blob.digest.clone(),
        size: blob.size,
        diff_id: blob.diff_id.clone(),
    };
    if let Some(parent) = selector.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = cache.temp_file()?;
    serde_json::to_writer(&mut tmp, &record)?;
    tmp.persist(&selector)
        .map_err(|e| anyhow::anyhow!("persist selector: {}", e))?;

    tracing::info!(
        layer = layer.name(),
        entries = layer.len(),
        digest = %blob.digest,
        size = blob.size,
        "built layer"
    );
    Ok(blob)
}

/// An application layer together with the role it was built for.
#[derive(Debug, Clone)]
pub struct AppLayer {
    pub name: &'static str,
    pub blob: LayerBlob,
}

/// Everything needed to assemble the image for each base platform.
pub struct ImagePlan<'a> {
    pub base: &'a [BaseManifest],
    pub base_store: &'a BlobStore,
    pub app_layers: &'a [AppLayer],
    pub app_store: &'a BlobStore,
    pub container: &'a ContainerConfig,
}

#[derive(Debug, Clone)]
pub struct PlatformImage {
    pub platform: Platform,
    pub manifest: BlobDescriptor,
    pub config: BlobDescriptor,
    pub layers: Vec<BlobDescriptor>,
}

#[derive(Debug, Clone)]
pub struct BuiltImage {
    /// Manifest, or image index when several platforms were built.
    pub descriptor: BlobDescriptor,
    pub images: Vec<PlatformImage>,
}

impl BuiltImage {
    pub fn digest(&self) -> &str {
        &self.descriptor.digest
    }

    /// Config digest of the first platform image.
    pub fn image_id(&self) -> &str {
        self.images
            .first()
            .map(|image| image.config.digest.as_str())
            .unwrap_or_default()
    }
}

/// Builds the config and manifest of one platform image in `layout`.
pub fn build_image(plan: &ImagePlan<'_>, layout: &BlobStore, base: &BaseManifest) -> Result<PlatformImage> {
    let format = plan.container.format;
    let mut layers = Vec::with_capacity(base.layers.len() + plan.app_layers.len());
    let mut diff_ids = Vec::with_capacity(layers.capacity());

    for layer in &base.layers {
        layout.link_from(plan.base_store, &layer.descriptor.digest)?;
        let descriptor = match layer.compression {
            Some(compression) => layer
                .descriptor
                .clone()
                .with_media_type(format.layer_media_type(compression)?),
            None => layer.descriptor.clone(),
        };
        layers.push(descriptor);
        diff_ids.push(layer.diff_id.clone());
    }

    let created = plan.container.created();
    let mut history = base.history.clone();
    for layer in plan.app_layers {
        layout.link_from(plan.app_store, &layer.blob.digest)?;
        layers.push(BlobDescriptor {
            media_type: Some(format.layer_media_type(layer.blob.compression)?.to_string()),
            size: layer.blob.size,
            digest: layer.blob.digest.clone(),
            platform: None,
            annotations: None,
        });
        diff_ids.push(layer.blob.diff_id.clone());
        history.push(json!({
            "created": created,
            "created_by": CREATED_BY,
            "comment": layer.name,
        }));
    }

    let mut config = json!({
        "created": created,
        "architecture": base.platform.architecture,
        "os": base.platform.os,
        "config": plan.container.merge_runtime_config(base.runtime_config()),
        "rootfs": {
            "type": "layers",
            "diff_ids": diff_ids,
        },
        "history": history,
    });
    for key in ["variant", "os.version", "os.features"] {
        if let Some(value) = base.config.get(key) {
            config[key] = value.clone();
        }
    }
    let config = layout.write_json(format.config_media_type(), &config)?;

    let manifest = json!({
        "schemaVersion": 2,
        "mediaType": format.manifest_media_type(),
        "config": config.to_json(),
        "layers": layers.iter().map(BlobDescriptor::to_json).collect::<Vec<_>>(),
    });
    let mut manifest = layout.write_json(format.manifest_media_type(), &manifest)?;
    manifest.platform = Some(base.platform.to_json());

    Ok(PlatformImage {
        platform: base.platform.clone(),
        manifest,
        config,
        layers,
    })
}

/// Assembles a complete OCI layout in `root`: one image per base platform, an
/// index when there is more than one, `index.json` and `oci-layout`.
pub fn write_layout(plan: &ImagePlan<'_>, root: &Path, ref_name: Option<&str>) -> Result<BuiltImage> {
    let layout = BlobStore::open(root)?;
    let images = plan
        .base
        .par_iter()
        .map(|base| build_image(plan, &layout, base))
        .collect::<Result<Vec<_>>>()?;

    let mut descriptor = match images.as_slice() {
        [single] => single.manifest.clone(),
        _ => {
            let format = plan.container.format;
            let index = json!({
                "schemaVersion": 2,
                "mediaType": format.index_media_type(),
                "manifests": images.iter().map(|i| i.manifest.to_json()).collect::<Vec<_>>(),
            });
            layout.write_json(format.index_media_type(), &index)?
        }
    };
    descriptor.platform = None;
    if let Some(name) = ref_name {
        descriptor.annotations = Some(json!({ REF_NAME_ANNOTATION: name }));
    }
    layout.write_index(&[descriptor.to_json()])?;
    descriptor.annotations = None;

    Ok(BuiltImage { descriptor, images })
}

fn append_bytes<W: Write>(builder: &mut tar::Builder<W>, name: &str, data: &[u8]) -> Result<()> {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(0);
    header.set_uid(0);
    header.set_gid(0);
    builder.append_data(&mut header, name, data)?;
    Ok(())
}

/// Writes a tarball that is both an OCI layout and loadable by `docker load`.
pub fn write_tarball(layout: &BlobStore, image: &BuiltImage, repo_tags: &[String], dest: &Path) -> Result<()> {
    let parent = dest.parent().unwrap_or(Path::new("."));
    fs::create_dir_all(parent)?;
    let tmp = tempfile::NamedTempFile::new_in(parent)?;
    let mut builder = tar::Builder::new(BufWriter::new(tmp.reopen()?));
    builder.mode(tar::HeaderMode::Deterministic);

    let first = image
        .images
        .first()
        .context("image has no platform manifests")?;
    let blob_path = |descriptor: &BlobDescriptor| format!("blobs/sha256/{}", descriptor.hex());
    let docker_manifest = json!([{
        "Config": blob_path(&first.config),
        "RepoTags": repo_tags,
        "Layers": first.layers.iter().map(blob_path).collect::<Vec<_>>(),
    }]);
    append_bytes(&mut builder, "manifest.json", &serde_json::to_vec(&docker_manifest)?)?;
    append_bytes(
        &mut builder,
        OCI_LAYOUT_FILE,
        &fs::read(layout.root().join(OCI_LAYOUT_FILE))?,
    )?;
    append_bytes(&mut builder, INDEX_FILE, &fs::read(layout.root().join(INDEX_FILE))?)?;

    let mut blobs: Vec<String> = fs::read_dir(layout.blob_dir())?
        .map(|entry| entry.map(|e| e.file_name().to_string_lossy().to_string()))
        .collect::<std::io::Result<_>>()?;
    blobs.sort();
    for hex in blobs {
        let path = layout.blob_dir().join(&hex);
        let file = fs::File::open(&path)?;
        advise_sequential(&file);
        let mut header = tar::Header::new_gnu();
        header.set_size(file.metadata()?.len());
        header.set_mode(0o644);
        header.set_mtime(0);
        header.set_uid(0);
        header.set_gid(0);
        builder.append_data(
            &mut header,
            format!("blobs/sha256/{}", hex),
            BufReader::with_capacity(IO_BUF_SIZE, file),
        )?;
    }

    let mut writer = builder.into_inner()?;
    writer.flush()?;
    drop(writer);
    tmp.persist(dest)
        .map_err(|e| anyhow::anyhow!("persist {}: {}", dest.display(), e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base_image::read_layout;
    use crate::base_image::tests::write_test_image;
    use crate::container::{ImageFormat, DOCKER_LAYER, DOCKER_MANIFEST, DOCKER_MANIFEST_LIST, OCI_LAYER_GZIP, OCI_MANIFEST};
    use crate::entrypoint::Entrypoint;
    use crate::layer_builder::{LayerEntry, LayerRole};
    use crate::timestamp::{resolve_timestamp, ModificationTimeProvider};
    use std::collections::{BTreeMap, BTreeSet};
    use serde_json::Value;
    use std::io::Read;

    fn settings(compression: Compression) -> LayerSettings {
        LayerSettings {
            compression,
            level: compression.default_level(),
            threads: 2,
        }
    }

    fn sample_layer(dir: &Path) -> FileEntriesLayer {
        fs::write(dir.join("lib-1.0.jar"), b"jar bytes").unwrap();
        let mut layer = FileEntriesLayer::new(LayerRole::Dependencies);
        layer.add_entry(LayerEntry::new(
            dir.join("lib-1.0.jar"),
            "/app/libs/lib-1.0.jar",
            ModificationTimeProvider::default().get(),
        ));
        layer
    }

    fn container(format: ImageFormat) -> ContainerConfig {
        ContainerConfig {
            environment: BTreeMap::new(),
            ports: BTreeSet::new(),
            volumes: BTreeSet::new(),
            labels: BTreeMap::new(),
            user: None,
            working_directory: None,
            entrypoint: Entrypoint::Command(vec!["java".into(), "Main".into()]),
            args: None,
            creation_time: resolve_timestamp("EPOCH").unwrap(),
            format,
        }
    }

    #[test]
    fn gzip_layer_hashes_both_streams() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BlobStore::open(dir.path().join("cache")).unwrap();
        let blob = build_layer(&sample_layer(dir.path()), &cache, &settings(Compression::Gzip)).unwrap();

        let compressed = fs::read(cache.path_for(&blob.digest).unwrap()).unwrap();
        assert_eq!(blob.digest, format!("sha256:{}", sha256_hex(&compressed)));
        assert_eq!(blob.size, compressed.len() as u64);

        let mut tar_bytes = Vec::new();
        flate2::read::MultiGzDecoder::new(&compressed[..])
            .read_to_end(&mut tar_bytes)
            .unwrap();
        assert_eq!(blob.diff_id, format!("sha256:{}", sha256_hex(&tar_bytes)));
    }

    #[test]
    fn unchanged_layer_is_reused() {
        let dir = tempfile::tempdir().unwrap();
        let cache = BlobStore::open(dir.path().join("cache")).unwrap();
        let layer = sample_layer(dir.path());
        let first = build_layer(&layer, &cache, &settings(Compression::Disabled)).unwrap();
        assert_eq!(first.digest, first.diff_id);

        let blob_path = cache.path_for(&first.digest).unwrap();
        let before = fs::metadata(&blob_path).unwrap().modified().unwrap();
        let second = build_layer(&layer, &cache, &settings(Compression::Disabled)).unwrap();
        assert_eq!(first, second);
        assert_eq!(fs::metadata(&blob_path).unwrap().modified().unwrap(), before);

        // A different compression is a different layer blob.
        let zstd = build_layer(&layer, &cache, &settings(Compression::Zstd)).unwrap();
        assert_ne!(zstd.digest, first.digest);
        assert_eq!(zstd.diff_id, first.diff_id);
    }

    #[test]
    fn layout_stacks_app_layers_on_base() {
        let dir = tempfile::tempdir().unwrap();
        let base_root = dir.path().join("base");
        let desc = write_test_image(&base_root, &Platform::default());
        let base_store = BlobStore::open(&base_root).unwrap();
        base_store.write_index(&[desc]).unwrap();
        let base = read_layout(&base_root, &[Platform::default()]).unwrap();

        let app_store = BlobStore::open(dir.path().join("app")).unwrap();
        let blob = build_layer(&sample_layer(dir.path()), &app_store, &settings(Compression::Gzip)).unwrap();
        let app_layers = [AppLayer {
            name: "dependencies",
            blob: blob.clone(),
        }];
        let container = container(ImageFormat::Oci);
        let plan = ImagePlan {
            base: &base,
            base_store: &base_store,
            app_layers: &app_layers,
            app_store: &app_store,
            container: &container,
        };

        let out = dir.path().join("out");
        let built = write_layout(&plan, &out, Some("example.com/out:latest")).unwrap();
        let layout = BlobStore::open(&out).unwrap();
        assert_eq!(built.descriptor.media_type.as_deref(), Some(OCI_MANIFEST));
        assert_eq!(built.image_id(), built.images[0].config.digest);

        let manifest = layout.read_json(built.digest()).unwrap();
        let layers = manifest["layers"].as_array().unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[1]["digest"], blob.digest);
        assert_eq!(layers[1]["mediaType"], OCI_LAYER_GZIP);

        let config = layout.read_json(built.image_id()).unwrap();
        assert_eq!(config["rootfs"]["diff_ids"][1], blob.diff_id);
        assert_eq!(config["config"]["Entrypoint"], json!(["java", "Main"]));
        assert_eq!(config["config"]["Env"], json!(["PATH=/usr/bin"]));
        assert_eq!(config["history"][1]["comment"], "dependencies");
        assert_eq!(config["created"], "1970-01-01T00:00:00Z");

        let index: Value = serde_json::from_slice(&fs::read(out.join(INDEX_FILE)).unwrap()).unwrap();
        assert_eq!(index["manifests"][0]["digest"], built.digest());
        assert_eq!(
            index["manifests"][0]["annotations"][REF_NAME_ANNOTATION],
            "example.com/out:latest"
        );
    }

    #[test]
    fn multi_platform_builds_index_and_docker_format_rewrites_media_types() {
        let dir = tempfile::tempdir().unwrap();
        let base_root = dir.path().join("base");
        let arm = Platform::new("arm64", "linux");
        let descs = vec![
            write_test_image(&base_root, &Platform::default()),
            write_test_image(&base_root, &arm),
        ];
        let base_store = BlobStore::open(&base_root).unwrap();
        base_store.write_index(&descs).unwrap();
        let base = read_layout(&base_root, &[Platform::default(), arm]).unwrap();

        let app_store = BlobStore::open(dir.path().join("app")).unwrap();
        let container = container(ImageFormat::Docker);
        let plan = ImagePlan {
            base: &base,
            base_store: &base_store,
            app_layers: &[],
            app_store: &app_store,
            container: &container,
        };
        let built = write_layout(&plan, &dir.path().join("out"), None).unwrap();
        assert_eq!(built.images.len(), 2);
        assert_eq!(
            built.descriptor.media_type.as_deref(),
            Some(DOCKER_MANIFEST_LIST)
        );
        assert_ne!(built.digest(), built.images[0].manifest.digest);
        assert_eq!(built.images[0].manifest.media_type.as_deref(), Some(DOCKER_MANIFEST));
        assert_eq!(built.images[1].layers[0].media_type.as_deref(), Some(DOCKER_LAYER));
    }

    #[test]
    fn tarball_is_docker_loadable_layout() {
        let dir = tempfile::tempdir().unwrap();
        let base_root = dir.path().join("base");
        let desc = write_test_image(&base_root, &Platform::default());
        let base_store = BlobStore::open(&base_root).unwrap();
        base_store.write_index(&[desc]).unwrap();
        let base = read_layout(&base_root, &[Platform::default()]).unwrap();
        let app_store = BlobStore::open(dir.path().join("app")).unwrap();
        let container = container(ImageFormat::Oci);
        let plan = ImagePlan {
            base: &base,
            base_store: &base_store,
            app_layers: &[],
            app_store: &app_store,
            container: &container,
        };
        let out = dir.path().join("out");
        let built = write_layout(&plan, &out, None).unwrap();

        let tarball = dir.path().join("image.tar");
        write_tarball(
            &BlobStore::open(&out).unwrap(),
            &built,
            &["example.com/out:1".to_string()],
            &tarball,
        )
        .unwrap();

        let mut archive = tar::Archive::new(fs::File::open(&tarball).unwrap());
        let mut names = Vec::new();
        let mut manifest = Value::Null;
        for entry in archive.entries().unwrap() {
            let mut entry = entry.unwrap();
            let name = entry.path().unwrap().to_string_lossy().to_string();
            if name == "manifest.json" {
                let mut data = Vec::new();
                entry.read_to_end(&mut data).unwrap();
                manifest = serde_json::from_slice(&data).unwrap();
            }
            names.push(name);
        }
        assert_eq!(&names[..3], &["manifest.json", OCI_LAYOUT_FILE, INDEX_FILE]);
        assert!(names.contains(&format!("blobs/sha256/{}", built.images[0].config.hex())));
        assert_eq!(manifest[0]["RepoTags"], json!(["example.com/out:1"]));
        assert_eq!(
            manifest[0]["Config"],
            format!("blobs/sha256/{}", built.images[0].config.hex())
        );
    }
}
