//! Photo resolution: map caller-supplied references to accessible local
//! files.
//!
//! Fallback chain, first success wins:
//! 1. the reference resolves to an existing local path
//! 2. remote fetch from the blob store into job scratch space
//! 3. filename-similarity search across locally known uploads
//!
//! When nothing resolves for any reference but other photos exist locally,
//! a random subset substitutes for the requested set; only a completely
//! empty local storage fails the job.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rand::seq::SliceRandom;
use tracing::{info, warn};
use walkdir::WalkDir;

use reel_models::{PhotoOrigin, PhotoRef, ResolvedPhoto};
use reel_storage::ObjectStore;

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::scope::TempScope;

/// Upper bound on the random substitute set.
const MAX_FALLBACK_PHOTOS: usize = 10;

/// Image file extensions considered during similarity search.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Resolves photo references against local storage and the blob store.
pub struct PhotoResolver {
    store: Arc<dyn ObjectStore>,
    storage_dir: PathBuf,
    uploads_dir: PathBuf,
}

impl PhotoResolver {
    pub fn new(store: Arc<dyn ObjectStore>, config: &EngineConfig) -> Self {
        Self {
            store,
            storage_dir: config.storage_dir.clone(),
            uploads_dir: config.uploads_dir(),
        }
    }

    /// Resolve every reference, applying the per-photo fallback chain and
    /// the last-resort substitute set.
    pub async fn resolve_all(
        &self,
        refs: &[PhotoRef],
        scope: &TempScope,
    ) -> EngineResult<Vec<ResolvedPhoto>> {
        let mut resolved = Vec::with_capacity(refs.len());

        for photo_ref in refs {
            match self.resolve_one(photo_ref, scope).await {
                Ok(photo) => resolved.push(photo),
                Err(e) => {
                    warn!(
                        key = %photo_ref.key,
                        "Photo unavailable after all fallbacks: {}", e
                    );
                }
            }
        }

        if !resolved.is_empty() {
            return Ok(resolved);
        }

        // Last resort: substitute a random subset of whatever exists locally.
        let mut available = self.available_photos();
        if available.is_empty() {
            return Err(EngineError::NoPhotosAvailable);
        }

        available.shuffle(&mut rand::rng());
        let take = refs.len().clamp(1, MAX_FALLBACK_PHOTOS).min(available.len());
        warn!(
            requested = refs.len(),
            substituted = take,
            "No requested photo resolved; proceeding with random substitute set"
        );

        Ok(available
            .into_iter()
            .take(take)
            .map(|path| {
                let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
                ResolvedPhoto::new(path, PhotoOrigin::Substituted, size)
            })
            .collect())
    }

    /// Resolve a single reference through the fallback chain.
    async fn resolve_one(
        &self,
        photo_ref: &PhotoRef,
        scope: &TempScope,
    ) -> EngineResult<ResolvedPhoto> {
        // Step 1: direct local path (relative to storage root, or absolute).
        let local = self.storage_dir.join(&photo_ref.key);
        if local.is_file() {
            return Ok(resolved(local, PhotoOrigin::Local));
        }
        let absolute = Path::new(&photo_ref.key);
        if absolute.is_absolute() && absolute.is_file() {
            return Ok(resolved(absolute.to_path_buf(), PhotoOrigin::Local));
        }

        // Step 2: remote fetch into job scratch space. Failures here are
        // non-fatal and fall through to similarity search.
        if self.store.exists(&photo_ref.key).await {
            let file_name = photo_ref
                .file_name()
                .map(|n| n.to_string())
                .unwrap_or_else(|| format!("photo_{}.jpg", photo_ref.order));
            let target = scope.dir().join("fetched").join(format!(
                "{}_{}",
                photo_ref.order, file_name
            ));

            match self.store.fetch(&photo_ref.key, &target).await {
                Ok(()) => {
                    scope.register(&target);
                    info!(key = %photo_ref.key, "Fetched photo from blob store");
                    return Ok(resolved(target, PhotoOrigin::Fetched));
                }
                Err(e) => {
                    warn!(key = %photo_ref.key, "Blob store fetch failed: {}", e);
                }
            }
        }

        // Step 3: similarity search across local uploads.
        if let Some(file_name) = photo_ref.file_name() {
            if let Some(path) = self.find_by_name(file_name) {
                info!(
                    key = %photo_ref.key,
                    substitute = %path.display(),
                    "Substituted similarly named photo"
                );
                return Ok(resolved(path, PhotoOrigin::Substituted));
            }
        }

        Err(EngineError::photo_unavailable(photo_ref.key.clone()))
    }

    /// Exact file-name match first, then stem substring match.
    fn find_by_name(&self, file_name: &str) -> Option<PathBuf> {
        let candidates = self.scan_uploads();

        if let Some(exact) = candidates
            .iter()
            .find(|p| p.file_name().map(|n| n == file_name).unwrap_or(false))
        {
            return Some(exact.clone());
        }

        let stem = Path::new(file_name).file_stem()?.to_string_lossy();
        candidates
            .into_iter()
            .find(|p| {
                p.file_stem()
                    .map(|s| {
                        let s = s.to_string_lossy();
                        s.contains(stem.as_ref()) || stem.contains(s.as_ref())
                    })
                    .unwrap_or(false)
            })
    }

    /// All image files under the uploads tree.
    fn scan_uploads(&self) -> Vec<PathBuf> {
        if !self.uploads_dir.is_dir() {
            return Vec::new();
        }

        WalkDir::new(&self.uploads_dir)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .filter(|entry| {
                entry
                    .path()
                    .extension()
                    .map(|ext| {
                        let ext = ext.to_string_lossy().to_lowercase();
                        IMAGE_EXTENSIONS.contains(&ext.as_str())
                    })
                    .unwrap_or(false)
            })
            .map(|entry| entry.into_path())
            .collect()
    }

    /// Photos available anywhere locally, for the substitute set.
    fn available_photos(&self) -> Vec<PathBuf> {
        let mut photos = self.scan_uploads();
        if photos.is_empty() {
            let test_image = self.storage_dir.join("test_image.jpg");
            if test_image.is_file() {
                photos.push(test_image);
            }
        }
        photos
    }
}

fn resolved(path: PathBuf, origin: PhotoOrigin) -> ResolvedPhoto {
    let size = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
    ResolvedPhoto::new(path, origin, size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_storage::FsStore;
    use tempfile::TempDir;

    struct Fixture {
        _root: TempDir,
        config: EngineConfig,
        store: Arc<dyn ObjectStore>,
    }

    fn fixture() -> Fixture {
        let root = TempDir::new().unwrap();
        let storage_dir = root.path().join("storage");
        let blob_dir = root.path().join("blobs");
        std::fs::create_dir_all(storage_dir.join("uploads")).unwrap();

        let config = EngineConfig {
            storage_dir,
            work_dir: root.path().join("work"),
            ..Default::default()
        };
        let store: Arc<dyn ObjectStore> = Arc::new(FsStore::new(&blob_dir).unwrap());

        Fixture {
            _root: root,
            config,
            store,
        }
    }

    async fn scope_for(fx: &Fixture) -> TempScope {
        TempScope::create(&fx.config.work_dir, "TESTJOB").await.unwrap()
    }

    #[tokio::test]
    async fn test_local_photo_resolves_directly() {
        let fx = fixture();
        let path = fx.config.uploads_dir().join("a.jpg");
        std::fs::write(&path, b"img").unwrap();
        let scope = scope_for(&fx).await;

        let resolver = PhotoResolver::new(Arc::clone(&fx.store), &fx.config);
        let photos = resolver
            .resolve_all(&[PhotoRef::new("uploads/a.jpg", 0)], &scope)
            .await
            .unwrap();

        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].origin, PhotoOrigin::Local);
        scope.cleanup().await;
    }

    #[tokio::test]
    async fn test_remote_photo_fetched_when_missing_locally() {
        let fx = fixture();
        fx.store
            .store_bytes(b"remote".to_vec(), "uploads/remote.jpg", "image/jpeg")
            .await
            .unwrap();
        let scope = scope_for(&fx).await;

        let resolver = PhotoResolver::new(Arc::clone(&fx.store), &fx.config);
        let photos = resolver
            .resolve_all(&[PhotoRef::new("uploads/remote.jpg", 0)], &scope)
            .await
            .unwrap();

        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].origin, PhotoOrigin::Fetched);
        assert!(photos[0].path.exists());
        scope.cleanup().await;
    }

    #[tokio::test]
    async fn test_similarity_match_substitutes() {
        let fx = fixture();
        let path = fx.config.uploads_dir().join("sub").join("IMG_0042_edit.jpg");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"img").unwrap();
        let scope = scope_for(&fx).await;

        let resolver = PhotoResolver::new(Arc::clone(&fx.store), &fx.config);
        let photos = resolver
            .resolve_all(&[PhotoRef::new("uploads/other/IMG_0042.jpg", 0)], &scope)
            .await
            .unwrap();

        assert_eq!(photos.len(), 1);
        assert_eq!(photos[0].origin, PhotoOrigin::Substituted);
        scope.cleanup().await;
    }

    #[tokio::test]
    async fn test_random_fallback_set_when_nothing_matches() {
        let fx = fixture();
        for i in 0..3 {
            std::fs::write(fx.config.uploads_dir().join(format!("p{i}.png")), b"img").unwrap();
        }
        let scope = scope_for(&fx).await;

        let resolver = PhotoResolver::new(Arc::clone(&fx.store), &fx.config);
        let photos = resolver
            .resolve_all(&[PhotoRef::new("configs/unrelated.bin", 0)], &scope)
            .await
            .unwrap();

        assert!(!photos.is_empty());
        assert!(photos.iter().all(|p| p.origin == PhotoOrigin::Substituted));
        scope.cleanup().await;
    }

    #[tokio::test]
    async fn test_no_photos_anywhere_fails_job() {
        let fx = fixture();
        let scope = scope_for(&fx).await;

        let resolver = PhotoResolver::new(Arc::clone(&fx.store), &fx.config);
        let err = resolver
            .resolve_all(&[PhotoRef::new("uploads/gone.jpg", 0)], &scope)
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::NoPhotosAvailable));
        scope.cleanup().await;
    }
}
