//! Locate a stored file on disk from its provider-supplied location hints.
//!
//! Storage backends disagree about where the serving URL points: some record
//! an absolute path, some a path relative to a configured public root, and
//! some rewrite the URL entirely so that only the content hash still matches
//! the on-disk name. The resolver probes a prioritized candidate list and
//! returns the first path that exists.

use std::path::{Path, PathBuf};

use crate::config::StorageConfig;
use crate::error::EnrichError;
use crate::pipeline::StoredFileDescriptor;

/// Resolve the on-disk path for a stored file.
///
/// Returns [`EnrichError::FileNotFound`] when no candidate exists; the
/// coordinator treats that as a skip, not an error.
pub async fn resolve(
    descriptor: &StoredFileDescriptor,
    storage: &StorageConfig,
) -> Result<PathBuf, EnrichError> {
    for candidate in candidates(descriptor, storage) {
        if exists(&candidate).await {
            log::debug!("Resolved {} to {}", descriptor.name, candidate.display());
            return Ok(candidate);
        }
    }
    Err(EnrichError::FileNotFound)
}

/// Build the ordered candidate list for a descriptor.
fn candidates(descriptor: &StoredFileDescriptor, storage: &StorageConfig) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    let hint = descriptor.url.as_str();

    // The hint may already be an absolute path.
    if Path::new(hint).is_absolute() {
        paths.push(PathBuf::from(hint));
    }

    if let Some(public) = &storage.public_dir {
        paths.push(join_hint(public, hint));
    }
    if let Some(alt) = &storage.alt_public_dir {
        paths.push(join_hint(alt, hint));
    }

    let default_public = std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("public");
    paths.push(join_hint(&default_public, hint));

    // Last resort: some backends rewrite the serving URL so it no longer
    // matches the on-disk layout, but hash + extension still do.
    paths.push(
        default_public
            .join(&storage.uploads_subdir)
            .join(format!("{}{}", descriptor.hash, descriptor.ext)),
    );

    paths
}

/// Join a URL-style hint onto a root. A leading slash would otherwise
/// replace the root entirely.
fn join_hint(root: &Path, hint: &str) -> PathBuf {
    root.join(hint.trim_start_matches('/'))
}

async fn exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::MetadataMap;
    use std::fs;
    use tempfile::TempDir;

    fn descriptor(url: &str, hash: &str, ext: &str) -> StoredFileDescriptor {
        StoredFileDescriptor {
            id: 1,
            name: "photo.jpg".into(),
            url: url.into(),
            hash: hash.into(),
            ext: ext.into(),
            mime: "image/jpeg".into(),
            provider: "local".into(),
            provider_metadata: MetadataMap::new(),
        }
    }

    fn storage(public: Option<&Path>) -> StorageConfig {
        StorageConfig {
            public_dir: public.map(Path::to_path_buf),
            alt_public_dir: None,
            uploads_subdir: "uploads".into(),
        }
    }

    #[test]
    fn join_hint_strips_leading_slash() {
        let joined = join_hint(Path::new("/srv/public"), "/uploads/a.jpg");
        assert_eq!(joined, Path::new("/srv/public/uploads/a.jpg"));
    }

    #[tokio::test]
    async fn resolves_absolute_hint_first() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("direct.jpg");
        fs::write(&file, b"fake").unwrap();

        let desc = descriptor(file.to_str().unwrap(), "abc", ".jpg");
        let found = resolve(&desc, &storage(None)).await.unwrap();
        assert_eq!(found, file);
    }

    #[tokio::test]
    async fn resolves_against_configured_public_root() {
        let dir = TempDir::new().unwrap();
        let uploads = dir.path().join("uploads");
        fs::create_dir(&uploads).unwrap();
        fs::write(uploads.join("a.jpg"), b"fake").unwrap();

        let desc = descriptor("/uploads/a.jpg", "abc", ".jpg");
        let found = resolve(&desc, &storage(Some(dir.path()))).await.unwrap();
        assert_eq!(found, dir.path().join("uploads/a.jpg"));
    }

    #[tokio::test]
    async fn alt_root_probed_after_primary() {
        let primary = TempDir::new().unwrap();
        let alt = TempDir::new().unwrap();
        let uploads = alt.path().join("uploads");
        fs::create_dir(&uploads).unwrap();
        fs::write(uploads.join("b.jpg"), b"fake").unwrap();

        let config = StorageConfig {
            public_dir: Some(primary.path().to_path_buf()),
            alt_public_dir: Some(alt.path().to_path_buf()),
            uploads_subdir: "uploads".into(),
        };
        let desc = descriptor("/uploads/b.jpg", "abc", ".jpg");
        let found = resolve(&desc, &config).await.unwrap();
        assert_eq!(found, alt.path().join("uploads/b.jpg"));
    }

    #[tokio::test]
    async fn missing_everywhere_is_not_found() {
        let dir = TempDir::new().unwrap();
        let desc = descriptor("/uploads/ghost.jpg", "ghost_hash", ".jpg");
        let err = resolve(&desc, &storage(Some(dir.path()))).await.unwrap_err();
        assert!(matches!(err, EnrichError::FileNotFound));
    }

    #[test]
    fn candidate_order_ends_with_hash_reconstruction() {
        let desc = descriptor("/uploads/renamed.jpg", "deadbeef", ".jpg");
        let paths = candidates(&desc, &storage(Some(Path::new("/srv/public"))));

        // absolute hint first, configured root second
        assert_eq!(paths[0], Path::new("/uploads/renamed.jpg"));
        assert_eq!(paths[1], Path::new("/srv/public/uploads/renamed.jpg"));
        let last = paths.last().unwrap();
        assert!(last.ends_with("public/uploads/deadbeef.jpg"), "{last:?}");
    }
}
