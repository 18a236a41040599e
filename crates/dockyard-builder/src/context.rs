//! Build context archives.

use dockyard_core::image::{BuildOperation, Image};
use flate2::Compression;
use flate2::write::GzEncoder;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use tar::Builder;
use tracing::{debug, warn};
use url::Url;

const MAX_CONTEXT_SIZE: usize = 500 * 1024 * 1024;

/// Produces the build context archive of an image.
///
/// Called on the blocking thread pool, so implementations may do
/// synchronous I/O.
pub trait ContextCompiler: Send + Sync {
    fn compile(&self, image: &Image) -> io::Result<Vec<u8>>;
}

/// Gzip-compressed tar with every `COPY` source, every local `ADD` source and
/// the rendered `Dockerfile`. Sources are resolved against `root`.
pub struct TarballCompiler {
    root: PathBuf,
}

impl TarballCompiler {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn append_source<W: Write>(&self, tar: &mut Builder<W>, src: &str) -> io::Result<()> {
        let path = self.root.join(src);
        let name = archive_name(src);
        debug!(src = %src, "Adding to build context");
        if path.is_dir() {
            tar.append_dir_all(&name, &path)
        } else {
            tar.append_path_with_name(&path, &name)
        }
    }
}

impl ContextCompiler for TarballCompiler {
    fn compile(&self, image: &Image) -> io::Result<Vec<u8>> {
        let mut archive_data = Vec::new();
        {
            let encoder = GzEncoder::new(&mut archive_data, Compression::default());
            let mut tar = Builder::new(encoder);

            for op in &image.operations {
                match op {
                    BuildOperation::Copy { src, .. } => self.append_source(&mut tar, src)?,
                    BuildOperation::Add { src, .. } => {
                        if is_remote_source(src) {
                            warn!(src = %src, "Skipping ADD: source is a URL or Git repo reference");
                        } else if !self.root.join(src).exists() {
                            warn!(src = %src, "Skipping ADD: source does not exist");
                        } else if is_inside_git_dir(src) {
                            warn!(src = %src, "Skipping ADD: source is inside a .git directory");
                        } else {
                            self.append_source(&mut tar, src)?;
                        }
                    }
                    _ => {}
                }
            }

            let dockerfile = image.dockerfile();
            let mut header = tar::Header::new_gnu();
            header.set_path("Dockerfile")?;
            header.set_size(dockerfile.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            tar.append(&header, dockerfile.as_bytes())?;

            tar.into_inner()?.finish()?;
        }

        debug!(image = %image.name, bytes = archive_data.len(), "Build context created");
        if archive_data.len() > MAX_CONTEXT_SIZE {
            warn!(
                image = %image.name,
                size_mb = archive_data.len() / 1024 / 1024,
                "Build context is very large; consider trimming COPY and ADD sources"
            );
        }

        Ok(archive_data)
    }
}

/// Relative path of a source inside the archive.
fn archive_name(src: &str) -> PathBuf {
    let name: PathBuf = Path::new(src)
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .collect();
    if name.as_os_str().is_empty() {
        PathBuf::from(".")
    } else {
        name
    }
}

fn is_remote_source(src: &str) -> bool {
    match Url::parse(src) {
        Ok(url) => {
            matches!(url.scheme(), "http" | "https" | "git")
                || url
                    .host_str()
                    .is_some_and(|host| host == "github.com" || host.ends_with(".github.com"))
        }
        Err(_) => false,
    }
}

fn is_inside_git_dir(src: &str) -> bool {
    Path::new(src)
        .components()
        .any(|c| c.as_os_str() == ".git")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Read;
    use tempfile::tempdir;

    fn entries(archive: &[u8]) -> Vec<(String, Vec<u8>)> {
        let decoder = flate2::read::GzDecoder::new(archive);
        let mut tar = tar::Archive::new(decoder);
        let mut out = Vec::new();
        for entry in tar.entries().unwrap() {
            let mut entry = entry.unwrap();
            let path = entry.path().unwrap().to_string_lossy().to_string();
            let mut data = Vec::new();
            entry.read_to_end(&mut data).unwrap();
            out.push((path, data));
        }
        out
    }

    #[test]
    fn test_context_contains_sources_and_dockerfile() {
        let temp_dir = tempdir().unwrap();
        let src = temp_dir.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("main.py"), "print('hi')").unwrap();
        fs::write(temp_dir.path().join("requirements.txt"), "requests").unwrap();

        let image = Image::new("worker")
            .copy("src", "/app/src")
            .add("requirements.txt", "/app/requirements.txt")
            .run("pip install -r /app/requirements.txt");

        let compiler = TarballCompiler::new(temp_dir.path());
        let archive = compiler.compile(&image).unwrap();
        let entries = entries(&archive);
        let names: Vec<&str> = entries.iter().map(|(n, _)| n.as_str()).collect();

        assert!(names.contains(&"src/main.py"));
        assert!(names.contains(&"requirements.txt"));

        let (_, dockerfile) = entries.iter().find(|(n, _)| n == "Dockerfile").unwrap();
        assert_eq!(
            String::from_utf8_lossy(dockerfile),
            image.dockerfile()
        );
    }

    #[test]
    fn test_add_skips_remote_missing_and_git_sources() {
        let temp_dir = tempdir().unwrap();
        fs::create_dir_all(temp_dir.path().join(".git")).unwrap();
        fs::write(temp_dir.path().join(".git/config"), "[core]").unwrap();

        let image = Image::new("worker")
            .add("https://example.com/archive.tar.gz", "/tmp/archive.tar.gz")
            .add("git://example.com/repo.git", "/repo")
            .add("missing.txt", "/app/missing.txt")
            .add(".git/config", "/app/config");

        let compiler = TarballCompiler::new(temp_dir.path());
        let archive = compiler.compile(&image).unwrap();
        let names: Vec<String> = entries(&archive).into_iter().map(|(n, _)| n).collect();

        assert_eq!(names, vec!["Dockerfile"]);
    }

    #[test]
    fn test_missing_copy_source_is_an_error() {
        let temp_dir = tempdir().unwrap();
        let image = Image::new("worker").copy("nope", "/app/nope");

        let compiler = TarballCompiler::new(temp_dir.path());
        assert!(compiler.compile(&image).is_err());
    }

    #[test]
    fn test_archive_name() {
        assert_eq!(archive_name("./src/app"), PathBuf::from("src/app"));
        assert_eq!(archive_name("/abs/file"), PathBuf::from("abs/file"));
        assert_eq!(archive_name("."), PathBuf::from("."));
    }

    #[test]
    fn test_remote_sources() {
        assert!(is_remote_source("https://example.com/x"));
        assert!(is_remote_source("git://host/repo"));
        assert!(is_remote_source("ssh://github.com/org/repo"));
        assert!(!is_remote_source("requirements.txt"));
        assert!(!is_remote_source("/abs/path"));
    }
}
