//! Fetch stage for local sources: file paths, asset handles, bundled
//! resources.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, trace};

use crate::domain::entities::{ImageData, Request};
use crate::domain::errors::{LoadError, LoadResult};
use crate::domain::ports::{Fetched, Loader};

/// Loads non-network sources.
///
/// Absolute paths and bundled resources come back as raw bytes; asset
/// handles resolve to a rendered image at the target size.
#[derive(Debug, Default)]
pub struct LocalLoader {
    resource_dir: Option<PathBuf>,
}

impl LocalLoader {
    /// Creates a loader without a bundled-resource directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a loader that resolves bare resource names against `dir`.
    #[must_use]
    pub fn with_resource_dir(dir: PathBuf) -> Self {
        Self {
            resource_dir: Some(dir),
        }
    }

    /// Target height for an asset render, preserving aspect when the
    /// request does not pin one.
    fn asset_target(request: &Request, pixel_width: u32, pixel_height: u32) -> (u32, u32) {
        let width = request.resolved_width();
        if pixel_height > pixel_width && pixel_width > 0 {
            let height = (u64::from(pixel_height) * u64::from(width) / u64::from(pixel_width))
                .try_into()
                .unwrap_or(u32::MAX);
            return (width, height);
        }
        let height = match request.size().height() {
            Some(height) => height,
            None if pixel_width > 0 => {
                (u64::from(pixel_height) * u64::from(width) / u64::from(pixel_width))
                    .try_into()
                    .unwrap_or(u32::MAX)
            }
            None => width,
        };
        (width, height)
    }
}

#[async_trait::async_trait]
impl Loader for LocalLoader {
    fn is_valid(&self, request: &Request) -> bool {
        !request.source().starts_with("http")
    }

    async fn load(&self, request: &Request) -> LoadResult<Option<Fetched>> {
        let source = request.source();

        if Path::new(source).is_absolute() {
            let data = fs::read(source)
                .await
                .map_err(|e| LoadError::io(format!("failed to read {source}: {e}")))?;
            debug!(key = %request.key(), size = data.len(), "read local file");
            return Ok(Some(Fetched::Bytes(data.into())));
        }

        if let Some(asset) = request.asset() {
            let (pw, ph) = asset.pixel_size();
            let (tw, th) = Self::asset_target(request, pw, ph);
            trace!(key = %request.key(), width = tw, height = th, "rendering asset");
            return Ok(asset
                .render(tw, th)
                .map(|img| Fetched::Image(ImageData::Static(img))));
        }

        if let Some(dir) = &self.resource_dir {
            let path = dir.join(source);
            if fs::try_exists(&path).await.unwrap_or(false) {
                let data = fs::read(&path)
                    .await
                    .map_err(|e| LoadError::io(format!("failed to read resource: {e}")))?;
                debug!(key = %request.key(), path = %path.display(), "read bundled resource");
                return Ok(Some(Fetched::Bytes(data.into())));
            }
        }

        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::application::{Context, ContextConfig};
    use crate::domain::entities::TargetSize;
    use crate::domain::ports::AssetHandle;
    use image::DynamicImage;

    fn test_context() -> (Arc<Context>, tempfile::TempDir) {
        let dir = tempfile::TempDir::new().unwrap();
        let context = Context::builder()
            .config(ContextConfig {
                cache_dir: Some(dir.path().to_path_buf()),
                ..ContextConfig::default()
            })
            .build()
            .unwrap();
        (context, dir)
    }

    struct FixedAsset {
        width: u32,
        height: u32,
    }

    impl AssetHandle for FixedAsset {
        fn pixel_size(&self) -> (u32, u32) {
            (self.width, self.height)
        }

        fn render(&self, target_width: u32, target_height: u32) -> Option<DynamicImage> {
            Some(DynamicImage::new_rgba8(target_width, target_height))
        }
    }

    #[tokio::test]
    async fn rejects_network_sources() {
        let (context, _dir) = test_context();
        let loader = LocalLoader::new();
        let remote = Request::new(
            "https://example.com/a.jpg",
            TargetSize::by_width(10),
            context.clone(),
        );
        assert!(!loader.is_valid(&remote));
        let local = Request::new("/tmp/a.jpg", TargetSize::by_width(10), context);
        assert!(loader.is_valid(&local));
    }

    #[tokio::test]
    async fn reads_absolute_paths_as_bytes() {
        let (context, _dir) = test_context();
        let file_dir = tempfile::TempDir::new().unwrap();
        let path = file_dir.path().join("pic.bin");
        std::fs::write(&path, b"payload").unwrap();

        let request = Request::new(
            path.to_string_lossy().to_string(),
            TargetSize::by_width(10),
            context,
        );
        match LocalLoader::new().load(&request).await.unwrap() {
            Some(Fetched::Bytes(bytes)) => assert_eq!(&bytes[..], b"payload"),
            other => panic!("expected bytes, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn missing_absolute_path_propagates_io_error() {
        let (context, _dir) = test_context();
        let request = Request::new(
            "/definitely/not/here.png",
            TargetSize::by_width(10),
            context,
        );
        let err = LocalLoader::new().load(&request).await.unwrap_err();
        assert!(matches!(err, LoadError::Io(_)));
    }

    #[tokio::test]
    async fn renders_portrait_asset_with_aspect_height() {
        let (context, _dir) = test_context();
        let request = Request::new("asset-1", TargetSize::by_width(100), context)
            .with_asset(Arc::new(FixedAsset {
                width: 200,
                height: 400,
            }));
        match LocalLoader::new().load(&request).await.unwrap() {
            Some(Fetched::Image(image)) => {
                assert_eq!(image.pixel_width(), 100);
                assert_eq!(image.pixel_height(), 200);
            }
            other => panic!("expected image, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn landscape_asset_uses_explicit_height() {
        let (context, _dir) = test_context();
        let request = Request::new(
            "asset-2",
            TargetSize::Absolute {
                width: 100,
                height: 60,
            },
            context,
        )
        .with_asset(Arc::new(FixedAsset {
            width: 400,
            height: 200,
        }));
        match LocalLoader::new().load(&request).await.unwrap() {
            Some(Fetched::Image(image)) => {
                assert_eq!(image.pixel_width(), 100);
                assert_eq!(image.pixel_height(), 60);
            }
            other => panic!("expected image, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn resolves_resource_names_against_resource_dir() {
        let (context, _dir) = test_context();
        let res_dir = tempfile::TempDir::new().unwrap();
        std::fs::write(res_dir.path().join("spinner.gif"), b"gif bytes").unwrap();

        let loader = LocalLoader::with_resource_dir(res_dir.path().to_path_buf());
        let request = Request::new("spinner.gif", TargetSize::by_width(10), context);
        match loader.load(&request).await.unwrap() {
            Some(Fetched::Bytes(bytes)) => assert_eq!(&bytes[..], b"gif bytes"),
            other => panic!("expected bytes, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_source_falls_through() {
        let (context, _dir) = test_context();
        let request = Request::new("no-such-resource", TargetSize::by_width(10), context);
        assert!(LocalLoader::new().load(&request).await.unwrap().is_none());
    }
}
