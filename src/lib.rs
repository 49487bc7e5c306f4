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

//! Builds OCI images for JVM applications without a container daemon.
//!
//! A build description (YAML) names a base image, the application's classpath
//! and a target. Each image goes through [`orchestrator::Build`], which layers
//! the application on top of the base and writes the result to a registry, the
//! local docker daemon or a tarball.

pub mod base_image;
pub mod blob;
pub mod classpath;
pub mod config;
pub mod container;
pub mod credentials;
pub mod docker;
pub mod download_cache;
pub mod entrypoint;
pub mod error;
pub mod extra_dirs;
pub mod image_builder;
pub mod layer_builder;
pub mod metadata;
pub mod orchestrator;
pub mod reference;
pub mod registry;
pub mod timestamp;
pub mod util;

pub use error::{BuildStage, Error, Result};
pub use orchestrator::build_all;
