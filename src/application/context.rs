//! Pipeline context: stage chains, shared tiers, and request coalescing.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::domain::entities::{ImageData, Request};
use crate::domain::errors::{LoadError, LoadResult};
use crate::domain::ports::{CacheStore, Decoder, Fetched, Loader, Processor};
use crate::infrastructure::cache::{DEFAULT_CAPACITY, DiskCache, MemoryCache};
use crate::infrastructure::decoder::FrameDecoder;
use crate::infrastructure::loader::{LocalLoader, NetworkLoader};
use crate::infrastructure::processor::{GrayProcessor, ResizeProcessor};

type SharedLoad = Shared<BoxFuture<'static, LoadResult<Arc<ImageData>>>>;

/// Removes an in-flight entry when the owning load settles, even by panic.
struct Unpublish {
    context: Arc<Context>,
    variant: u64,
}

impl Drop for Unpublish {
    fn drop(&mut self) {
        self.context.inflight.lock().remove(&self.variant);
    }
}

/// Tunables for the default stage wiring.
#[derive(Debug, Clone)]
pub struct ContextConfig {
    /// Disk cache root. `None` selects the platform cache directory.
    pub cache_dir: Option<PathBuf>,
    /// Shard disk entries one level deep by key prefix.
    pub use_subdir: bool,
    /// Bound on (source, width) entries in the memory tier.
    pub memory_capacity: usize,
    /// Per-request HTTP timeout in seconds.
    pub timeout_secs: u64,
    /// Directory for bundled resources resolved by bare name.
    pub resource_dir: Option<PathBuf>,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            use_subdir: true,
            memory_capacity: DEFAULT_CAPACITY,
            timeout_secs: 30,
            resource_dir: None,
        }
    }
}

/// Shared pipeline state behind every request.
///
/// Holds the four stage chains and the in-flight table that coalesces
/// identical concurrent requests onto one underlying load. Cheap to share;
/// one context per cache namespace is the expected shape.
pub struct Context {
    disk: Arc<DiskCache>,
    loaders: Vec<Arc<dyn Loader>>,
    decoders: Vec<Arc<dyn Decoder>>,
    cachers: Vec<Arc<dyn CacheStore>>,
    processors: Vec<Arc<dyn Processor>>,
    inflight: Mutex<HashMap<u64, SharedLoad>>,
}

impl Context {
    /// Starts building a context with the default stage wiring.
    #[must_use]
    pub fn builder() -> ContextBuilder {
        ContextBuilder::default()
    }

    /// The disk tier shared with the network fetch stage.
    #[must_use]
    pub fn disk(&self) -> &Arc<DiskCache> {
        &self.disk
    }

    /// First hit across the cache chain, or `None`.
    #[must_use]
    pub fn cached_image(&self, request: &Request) -> Option<Arc<ImageData>> {
        self.cachers
            .iter()
            .filter(|cacher| cacher.is_valid(request))
            .find_map(|cacher| cacher.get(request))
    }

    /// Resolves a request to a decoded, processed image.
    ///
    /// Synchronous cache hits return immediately. Otherwise the request
    /// joins the in-flight load for the same variant key when one exists,
    /// or starts a new one. The underlying load runs on a spawned task, so
    /// dropping a waiter never cancels work other waiters depend on.
    ///
    /// # Errors
    /// Returns the first stage error; every coalesced waiter observes the
    /// same result.
    pub async fn load(self: Arc<Self>, request: Request) -> LoadResult<Arc<ImageData>> {
        if let Some(hit) = self.cached_image(&request) {
            trace!(key = %request.key(), "serving cached image");
            return Ok(hit);
        }

        let variant = request.variant_key();
        let shared = {
            let mut inflight = self.inflight.lock();
            if let Some(existing) = inflight.get(&variant) {
                trace!(key = %request.key(), "joining in-flight load");
                existing.clone()
            } else {
                let context = Arc::clone(&self);
                let handle = tokio::spawn(async move {
                    // Unpublish on any exit, including an unwinding stage:
                    // a wedged entry would replay its error to every later
                    // request for this variant.
                    let _unpublish = Unpublish {
                        context: Arc::clone(&context),
                        variant,
                    };
                    context.execute(&request).await
                });
                let future: BoxFuture<'static, LoadResult<Arc<ImageData>>> =
                    Box::pin(async move {
                        match handle.await {
                            Ok(result) => result,
                            Err(e) => Err(LoadError::task(e)),
                        }
                    });
                let shared = future.shared();
                inflight.insert(variant, shared.clone());
                shared
            }
        };

        shared.await
    }

    /// Runs the full pipeline once: fetch, decode, process, publish.
    async fn execute(&self, request: &Request) -> LoadResult<Arc<ImageData>> {
        let mut fetched = None;
        for loader in &self.loaders {
            if !loader.is_valid(request) {
                continue;
            }
            if let Some(found) = loader.load(request).await? {
                fetched = Some(found);
                break;
            }
        }
        let Some(fetched) = fetched else {
            return Err(LoadError::LoaderIsEmpty);
        };

        // Decoding and pixel transforms are CPU-bound; keep them off the
        // async workers.
        let decoders = self.decoders.clone();
        let processors = self.processors.clone();
        let req = request.clone();
        let image = tokio::task::spawn_blocking(move || -> LoadResult<ImageData> {
            let mut image = match fetched {
                Fetched::Image(image) => image,
                Fetched::Bytes(bytes) => decoders
                    .iter()
                    .find(|decoder| decoder.is_valid(&req))
                    .ok_or(LoadError::DecoderIsEmpty)?
                    .decode(&req, &bytes)?,
            };
            for processor in &processors {
                if processor.is_valid(&req) {
                    image = processor.process(&req, image);
                }
            }
            Ok(image)
        })
        .await
        .map_err(LoadError::task)??;

        let image = Arc::new(image);
        for cacher in &self.cachers {
            if cacher.is_valid(request) {
                cacher.put(request, Arc::clone(&image));
            }
        }
        debug!(key = %request.key(), width = image.pixel_width(), "load complete");
        Ok(image)
    }

    /// Empties every cache tier in the chain.
    pub fn clear_caches(&self) {
        for cacher in &self.cachers {
            cacher.clear();
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("disk", &self.disk.dir())
            .field("loaders", &self.loaders.len())
            .field("decoders", &self.decoders.len())
            .field("cachers", &self.cachers.len())
            .field("processors", &self.processors.len())
            .field("inflight", &self.inflight.lock().len())
            .finish()
    }
}

/// Builder for [`Context`]; unset chains get the default wiring.
#[derive(Default)]
pub struct ContextBuilder {
    config: ContextConfig,
    loaders: Option<Vec<Arc<dyn Loader>>>,
    decoders: Option<Vec<Arc<dyn Decoder>>>,
    cachers: Option<Vec<Arc<dyn CacheStore>>>,
    processors: Option<Vec<Arc<dyn Processor>>>,
}

impl ContextBuilder {
    /// Replaces the config.
    #[must_use]
    pub fn config(mut self, config: ContextConfig) -> Self {
        self.config = config;
        self
    }

    /// Replaces the fetch chain. Order matters: the first claiming stage
    /// that yields a payload wins.
    #[must_use]
    pub fn loaders(mut self, loaders: Vec<Arc<dyn Loader>>) -> Self {
        self.loaders = Some(loaders);
        self
    }

    /// Replaces the decode chain. The first claiming stage decodes.
    #[must_use]
    pub fn decoders(mut self, decoders: Vec<Arc<dyn Decoder>>) -> Self {
        self.decoders = Some(decoders);
        self
    }

    /// Replaces the cache chain. Lookups take the first hit; stores go to
    /// every claiming tier.
    #[must_use]
    pub fn cachers(mut self, cachers: Vec<Arc<dyn CacheStore>>) -> Self {
        self.cachers = Some(cachers);
        self
    }

    /// Replaces the transform chain. Every claiming stage applies, in order.
    #[must_use]
    pub fn processors(mut self, processors: Vec<Arc<dyn Processor>>) -> Self {
        self.processors = Some(processors);
        self
    }

    /// Wires the context.
    ///
    /// # Errors
    /// Returns an error when the disk cache directory cannot be created or
    /// the HTTP client cannot be constructed.
    pub fn build(self) -> LoadResult<Arc<Context>> {
        let disk = Arc::new(match self.config.cache_dir {
            Some(dir) => DiskCache::new(dir, self.config.use_subdir)?,
            None => DiskCache::default_location(self.config.use_subdir)?,
        });

        let loaders = match self.loaders {
            Some(loaders) => loaders,
            None => {
                let client = reqwest::Client::builder()
                    .timeout(Duration::from_secs(self.config.timeout_secs))
                    .build()
                    .map_err(|e| LoadError::network(format!("failed to build client: {e}")))?;
                let local = match self.config.resource_dir {
                    Some(dir) => LocalLoader::with_resource_dir(dir),
                    None => LocalLoader::new(),
                };
                vec![
                    Arc::new(local) as Arc<dyn Loader>,
                    Arc::new(NetworkLoader::new(client, Arc::clone(&disk))),
                ]
            }
        };

        let decoders = self
            .decoders
            .unwrap_or_else(|| vec![Arc::new(FrameDecoder::new()) as Arc<dyn Decoder>]);
        let cachers = self.cachers.unwrap_or_else(|| {
            vec![Arc::new(MemoryCache::new(self.config.memory_capacity)) as Arc<dyn CacheStore>]
        });
        let processors = self.processors.unwrap_or_else(|| {
            vec![
                Arc::new(GrayProcessor::new()) as Arc<dyn Processor>,
                Arc::new(ResizeProcessor::new()),
            ]
        });

        Ok(Arc::new(Context {
            disk,
            loaders,
            decoders,
            cachers,
            processors,
            inflight: Mutex::new(HashMap::new()),
        }))
    }
}

impl std::fmt::Debug for ContextBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextBuilder")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
