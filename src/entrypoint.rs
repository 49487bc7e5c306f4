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

//! Classpath/main-class files and the container entrypoint.

use std::fs;
use std::path::Path;

use crate::error::{Error, Result};
use crate::layer_builder::{FileEntriesLayer, LayerEntry, LayerRole};
use crate::timestamp::ModificationTimeProvider;

pub const CLASSPATH_FILE: &str = "jib-classpath-file";
pub const MAIN_CLASS_FILE: &str = "jib-main-class-file";
pub const INHERIT: &str = "INHERIT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entrypoint {
    /// Keep whatever the base image declares.
    Inherit,
    Command(Vec<String>),
}

/// Rewrites `path` only when its content differs, so an unchanged file keeps
/// its modification time. Returns whether the file was written.
pub fn write_file_conservatively(path: &Path, content: &str) -> Result<bool> {
    if let Ok(existing) = fs::read(path) {
        if existing == content.as_bytes() {
            return Ok(false);
        }
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
    }
    fs::write(path, content).map_err(|e| Error::io(path, e))?;
    Ok(true)
}

pub struct EntrypointInputs<'a> {
    pub cache_dir: &'a Path,
    pub app_root: &'a str,
    pub entrypoint: Option<&'a [String]>,
    pub main_class: &'a str,
    pub jvm_flags: &'a [String],
    /// Names under `libs/` in classpath order, as assigned by
    /// [`crate::classpath::container_file_names`].
    pub libraries: &'a [String],
    pub extra_classpath: &'a [String],
}

/// Extra entries first, then resources, classes and the libraries in order.
pub fn classpath_string(
    app_root: &str,
    libraries: &[String],
    extra_classpath: &[String],
) -> String {
    let app_root = app_root.trim_end_matches('/');
    let mut classpath: Vec<String> = extra_classpath.to_vec();
    classpath.push(format!("{}/resources", app_root));
    classpath.push(format!("{}/classes", app_root));
    classpath.extend(libraries.iter().map(|name| format!("{}/libs/{}", app_root, name)));
    classpath.join(":")
}

/// Writes the two launcher files into the cache dir and returns the entrypoint
/// together with the `jvm arg files` layer that places them under the app root.
pub fn configure_entrypoint(
    inputs: &EntrypointInputs<'_>,
    times: &ModificationTimeProvider,
) -> Result<(Entrypoint, FileEntriesLayer)> {
    if inputs.main_class.trim().is_empty() {
        return Err(Error::config("main class is required"));
    }
    let app_root = inputs.app_root.trim_end_matches('/');

    let classpath = classpath_string(app_root, inputs.libraries, inputs.extra_classpath);
    let classpath_file = inputs.cache_dir.join(CLASSPATH_FILE);
    let main_class_file = inputs.cache_dir.join(MAIN_CLASS_FILE);
    if write_file_conservatively(&classpath_file, &classpath)? {
        tracing::debug!(path = %classpath_file.display(), "classpath file updated");
    }
    write_file_conservatively(&main_class_file, inputs.main_class)?;

    let mut layer = FileEntriesLayer::new(LayerRole::JvmArgFiles);
    layer.add_entry(LayerEntry::new(
        classpath_file,
        format!("{}/{}", app_root, CLASSPATH_FILE),
        times.get(),
    ));
    layer.add_entry(LayerEntry::new(
        main_class_file,
        format!("{}/{}", app_root, MAIN_CLASS_FILE),
        times.get(),
    ));

    let entrypoint = match inputs.entrypoint {
        Some([single]) if single == INHERIT => Entrypoint::Inherit,
        Some(explicit) if !explicit.is_empty() => Entrypoint::Command(explicit.to_vec()),
        _ => {
            let mut command = vec!["java".to_string()];
            command.extend(inputs.jvm_flags.iter().cloned());
            command.push("-cp".to_string());
            command.push(format!("@{}/{}", app_root, CLASSPATH_FILE));
            command.push(inputs.main_class.to_string());
            Entrypoint::Command(command)
        }
    };
    Ok((entrypoint, layer))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classpath::container_file_names;
    use std::time::{Duration, SystemTime};

    fn mtime(path: &Path) -> SystemTime {
        fs::metadata(path).unwrap().modified().unwrap()
    }

    #[test]
    fn conservative_write_keeps_mtime() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/file");

        assert!(write_file_conservatively(&path, "a:b").unwrap());
        let old = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        fs::File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(old)
            .unwrap();

        assert!(!write_file_conservatively(&path, "a:b").unwrap());
        assert_eq!(mtime(&path), old);

        assert!(write_file_conservatively(&path, "a:b:c").unwrap());
        assert_eq!(fs::read_to_string(&path).unwrap(), "a:b:c");
        assert_ne!(mtime(&path), old);
    }

    fn inputs<'a>(
        cache: &'a Path,
        entrypoint: Option<&'a [String]>,
        libraries: &'a [String],
        flags: &'a [String],
    ) -> EntrypointInputs<'a> {
        EntrypointInputs {
            cache_dir: cache,
            app_root: "/app",
            entrypoint,
            main_class: "com.example.Main",
            jvm_flags: flags,
            libraries,
            extra_classpath: &[],
        }
    }

    #[test]
    fn default_entrypoint_reads_classpath_file() {
        let dir = tempfile::tempdir().unwrap();
        let deps = vec!["lib-1.0.jar".to_string()];
        let flags = vec!["-Xmx512m".to_string()];

        let (entrypoint, layer) = configure_entrypoint(
            &inputs(&dir.path().join("cache"), None, &deps, &flags),
            &ModificationTimeProvider::default(),
        )
        .unwrap();

        assert_eq!(
            entrypoint,
            Entrypoint::Command(vec![
                "java".into(),
                "-Xmx512m".into(),
                "-cp".into(),
                "@/app/jib-classpath-file".into(),
                "com.example.Main".into(),
            ])
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("cache").join(CLASSPATH_FILE)).unwrap(),
            "/app/resources:/app/classes:/app/libs/lib-1.0.jar"
        );
        assert_eq!(
            fs::read_to_string(dir.path().join("cache").join(MAIN_CLASS_FILE)).unwrap(),
            "com.example.Main"
        );
        let paths: Vec<&str> = layer
            .entries()
            .iter()
            .map(|e| e.container_path.as_str())
            .collect();
        assert_eq!(paths, vec!["/app/jib-classpath-file", "/app/jib-main-class-file"]);
        assert_eq!(layer.role(), LayerRole::JvmArgFiles);
    }

    #[test]
    fn inherit_and_explicit_entrypoints() {
        let dir = tempfile::tempdir().unwrap();
        let inherit = vec![INHERIT.to_string()];
        let (entrypoint, _) = configure_entrypoint(
            &inputs(dir.path(), Some(inherit.as_slice()), &[], &[]),
            &ModificationTimeProvider::default(),
        )
        .unwrap();
        assert_eq!(entrypoint, Entrypoint::Inherit);

        let explicit = vec!["/bin/sh".to_string(), "-c".to_string(), "run".to_string()];
        let (entrypoint, _) = configure_entrypoint(
            &inputs(dir.path(), Some(explicit.as_slice()), &[], &[]),
            &ModificationTimeProvider::default(),
        )
        .unwrap();
        assert_eq!(entrypoint, Entrypoint::Command(explicit));

        let empty: Vec<String> = Vec::new();
        let (entrypoint, _) = configure_entrypoint(
            &inputs(dir.path(), Some(empty.as_slice()), &[], &[]),
            &ModificationTimeProvider::default(),
        )
        .unwrap();
        assert!(matches!(entrypoint, Entrypoint::Command(c) if c[0] == "java"));
    }

    #[test]
    fn duplicate_jars_renamed_in_classpath() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a/guava.jar");
        let b = dir.path().join("b/guava.jar");
        fs::create_dir_all(a.parent().unwrap()).unwrap();
        fs::create_dir_all(b.parent().unwrap()).unwrap();
        fs::write(&a, "1").unwrap();
        fs::write(&b, "22").unwrap();

        let names = container_file_names(&[a.as_path(), b.as_path()]).unwrap();
        let classpath = classpath_string("/app/", &names, &["/opt/agent.jar".to_string()]);
        assert_eq!(
            classpath,
            "/opt/agent.jar:/app/resources:/app/classes:/app/libs/guava-1.jar:/app/libs/guava-2.jar"
        );
    }

    #[test]
    fn blank_main_class_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut bad = inputs(dir.path(), None, &[], &[]);
        bad.main_class = " ";
        let err = configure_entrypoint(&bad, &ModificationTimeProvider::default()).unwrap_err();
        assert!(err.is_configuration());
    }
}
