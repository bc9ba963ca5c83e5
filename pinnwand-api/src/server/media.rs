//! Storage of uploaded files below the media root.

use rand::{Rng, distr::Alphanumeric};
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::{fs, io::AsyncWriteExt};
use tracing::debug;

const RANDOM_SUFFIX_LEN: usize = 7;
const MAX_NAME_ATTEMPTS: usize = 16;
const FALLBACK_FILE_NAME: &str = "upload";

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct MediaStorage {
    root: PathBuf,
}

impl MediaStorage {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Absolute location of a stored file given its media-relative path.
    #[must_use]
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.join(relative)
    }

    /// Writes `contents` to `dir/<file name>` and returns the media-relative path.
    ///
    /// Existing files are never overwritten: a taken name gets a random suffix before its
    /// extension.
    pub async fn save(
        &self,
        dir: &str,
        file_name: &str,
        contents: &[u8],
    ) -> std::io::Result<String> {
        fs::create_dir_all(self.root.join(dir)).await?;

        let file_name = sanitize_file_name(file_name);
        let mut candidate = file_name.clone();
        for _ in 0..MAX_NAME_ATTEMPTS {
            let relative = format!("{dir}/{candidate}");
            let created = fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(self.path(&relative))
                .await;

            match created {
                Ok(mut file) => {
                    file.write_all(contents).await?;
                    file.flush().await?;
                    debug!(path = %relative, bytes = contents.len(), "Stored upload");
                    return Ok(relative);
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    candidate = with_random_suffix(&file_name);
                }
                Err(err) => return Err(err),
            }
        }

        Err(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free name for upload {file_name:?}"),
        ))
    }

    /// Deletes a stored file. A file that is already gone is not an error.
    pub async fn remove(&self, relative: &str) -> std::io::Result<()> {
        match fs::remove_file(self.path(relative)).await {
            Ok(()) => {
                debug!(path = %relative, "Removed upload");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// Keeps only the final path component so uploads cannot escape their directory.
fn sanitize_file_name(file_name: &str) -> String {
    Path::new(file_name)
        .file_name()
        .map(|name| name.to_string_lossy().replace(['/', '\\'], "_"))
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| FALLBACK_FILE_NAME.to_owned())
}

fn with_random_suffix(file_name: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(RANDOM_SUFFIX_LEN)
        .map(char::from)
        .collect();

    match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => format!("{stem}_{suffix}.{extension}"),
        _ => format!("{file_name}_{suffix}"),
    }
}

#[cfg(test)]
mod tests {
    use super::{MediaStorage, sanitize_file_name, with_random_suffix};

    #[test]
    fn file_names_lose_their_directories() {
        assert_eq!(sanitize_file_name("small.gif"), "small.gif");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name(".."), "upload");
        assert_eq!(sanitize_file_name(""), "upload");
    }

    #[test]
    fn suffix_goes_before_extension() {
        let name = with_random_suffix("small.gif");
        assert!(name.starts_with("small_"));
        assert!(name.ends_with(".gif"));
        assert_eq!(name.len(), "small_.gif".len() + 7);

        assert!(with_random_suffix("README").starts_with("README_"));
    }

    #[tokio::test]
    async fn taken_names_are_not_overwritten() {
        let root = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(root.path());

        let first = storage.save("posts", "small.gif", b"one").await.unwrap();
        let second = storage.save("posts", "small.gif", b"two").await.unwrap();

        assert_eq!(first, "posts/small.gif");
        assert_ne!(first, second);
        assert_eq!(std::fs::read(storage.path(&first)).unwrap(), b"one");
        assert_eq!(std::fs::read(storage.path(&second)).unwrap(), b"two");
    }

    #[tokio::test]
    async fn removed_files_are_gone() {
        let root = tempfile::tempdir().unwrap();
        let storage = MediaStorage::new(root.path());

        let stored = storage.save("posts", "small.gif", b"one").await.unwrap();
        storage.remove(&stored).await.unwrap();
        assert!(!storage.path(&stored).exists());

        storage.remove(&stored).await.unwrap();
    }
}
