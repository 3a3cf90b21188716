//! Observable handle for a single in-flight load.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::trace;

use crate::application::Context;
use crate::domain::entities::{ImageData, Request};
use crate::domain::errors::{LoadError, LoadResult};

/// Externally observable lifecycle of one load.
#[derive(Debug, Clone)]
pub enum LoadState {
    /// The pipeline has not settled yet.
    Pending,
    /// The pipeline produced an image.
    Succeeded(Arc<ImageData>),
    /// The pipeline failed; retry means issuing a new request.
    Failed(LoadError),
}

impl LoadState {
    /// Whether the load has not settled.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }

    /// Whether the load produced an image.
    #[must_use]
    pub fn is_succeeded(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    /// Whether the load failed.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// The image, when succeeded.
    #[must_use]
    pub fn image(&self) -> Option<&Arc<ImageData>> {
        match self {
            Self::Succeeded(image) => Some(image),
            _ => None,
        }
    }
}

/// A spawned load whose progress can be watched or awaited.
///
/// Detaching or cancelling the task abandons this observer only; the
/// underlying load keeps running for any coalesced peers and still
/// populates the caches.
#[derive(Debug)]
pub struct LoadTask {
    state: watch::Receiver<LoadState>,
    waiter: tokio::task::JoinHandle<()>,
}

impl LoadTask {
    /// Starts a load for `request` and returns the observing handle.
    #[must_use]
    pub fn spawn(context: Arc<Context>, request: Request) -> Self {
        let (tx, rx) = watch::channel(LoadState::Pending);
        let key = request.key().to_string();
        let waiter = tokio::spawn(async move {
            let state = match context.load(request).await {
                Ok(image) => LoadState::Succeeded(image),
                Err(e) => LoadState::Failed(e),
            };
            trace!(key = %key, pending = tx.receiver_count(), "load settled");
            // Receivers may all be gone; the result is already cached.
            let _ = tx.send(state);
        });
        Self { state: rx, waiter }
    }

    /// Snapshot of the current state.
    #[must_use]
    pub fn state(&self) -> LoadState {
        self.state.borrow().clone()
    }

    /// A watch receiver for callers that want to observe transitions.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LoadState> {
        self.state.clone()
    }

    /// Waits for the load to settle.
    ///
    /// # Errors
    /// Returns the pipeline error the load settled with, or a task error
    /// when the observer was cancelled.
    pub async fn wait(&mut self) -> LoadResult<Arc<ImageData>> {
        loop {
            match self.state.borrow_and_update().clone() {
                LoadState::Succeeded(image) => return Ok(image),
                LoadState::Failed(e) => return Err(e),
                LoadState::Pending => {}
            }
            if self.state.changed().await.is_err() {
                return Err(LoadError::task("load observer cancelled"));
            }
        }
    }

    /// Stops observing. The underlying load continues and still fills the
    /// caches.
    pub fn cancel(&self) {
        self.waiter.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ContextConfig;
    use crate::domain::entities::TargetSize;
    use crate::domain::ports::{Fetched, Loader, MockLoader};
    use image::DynamicImage;

    fn build_context(loader: MockLoader) -> (Arc<Context>, tempfile::TempDir) {
        let dir = tempfile::TempDir::new().unwrap();
        let context = Context::builder()
            .config(ContextConfig {
                cache_dir: Some(dir.path().to_path_buf()),
                ..ContextConfig::default()
            })
            .loaders(vec![Arc::new(loader) as Arc<dyn Loader>])
            .build()
            .unwrap();
        (context, dir)
    }

    fn ok_loader() -> MockLoader {
        let mut loader = MockLoader::new();
        loader.expect_is_valid().return_const(true);
        loader.expect_load().returning(|_| {
            Ok(Some(Fetched::Image(ImageData::Static(
                DynamicImage::new_rgba8(5, 5),
            ))))
        });
        loader
    }

    #[tokio::test]
    async fn settles_to_succeeded() {
        let (context, _dir) = build_context(ok_loader());
        let request = Request::new("x", TargetSize::by_width(10), Arc::clone(&context));

        let mut task = LoadTask::spawn(context, request);
        let image = task.wait().await.unwrap();
        assert_eq!(image.pixel_width(), 5);
        assert!(task.state().is_succeeded());
    }

    #[tokio::test]
    async fn settles_to_failed() {
        let mut loader = MockLoader::new();
        loader.expect_is_valid().return_const(false);
        let (context, _dir) = build_context(loader);
        let request = Request::new("x", TargetSize::by_width(10), Arc::clone(&context));

        let mut task = LoadTask::spawn(context, request);
        let err = task.wait().await.unwrap_err();
        assert_eq!(err, LoadError::LoaderIsEmpty);
        assert!(task.state().is_failed());
    }

    #[tokio::test]
    async fn subscribers_observe_the_transition() {
        let (context, _dir) = build_context(ok_loader());
        let request = Request::new("x", TargetSize::by_width(10), Arc::clone(&context));

        let mut task = LoadTask::spawn(context, request);
        let mut rx = task.subscribe();
        task.wait().await.unwrap();
        // The subscriber sees the settled state without further changes.
        assert!(rx.borrow_and_update().is_succeeded());
    }

    #[tokio::test]
    async fn cancel_abandons_the_observer_but_fills_the_cache() {
        let (context, _dir) = build_context(ok_loader());
        let request = Request::new("x", TargetSize::by_width(10), Arc::clone(&context));

        let task = LoadTask::spawn(Arc::clone(&context), request.clone());
        task.cancel();

        // The coalesced load itself is unaffected by the cancelled observer.
        let image = Arc::clone(&context).load(request).await.unwrap();
        assert_eq!(image.pixel_width(), 5);
    }
}
