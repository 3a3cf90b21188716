//! End-to-end pipeline tests: coalescing, cache tiers, error fan-out.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::future::join_all;
use image::{DynamicImage, ImageFormat};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_test::assert_ok;

use pixfetch::{
    Context, ContextConfig, Fetched, ImageData, LoadError, LoadResult, Loader, Request, TargetSize,
};

fn init_tracing() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

fn build_context(
    dir: &tempfile::TempDir,
    loaders: Option<Vec<Arc<dyn Loader>>>,
) -> Arc<Context> {
    init_tracing();
    let builder = Context::builder().config(ContextConfig {
        cache_dir: Some(dir.path().to_path_buf()),
        ..ContextConfig::default()
    });
    match loaders {
        Some(loaders) => builder.loaders(loaders),
        None => builder,
    }
    .build()
    .unwrap()
}

fn png_bytes(side: u32) -> Vec<u8> {
    let img = DynamicImage::new_rgba8(side, side);
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Minimal HTTP stub: one response per connection, counting connections.
async fn serve(listener: TcpListener, hits: Arc<AtomicUsize>, body: Vec<u8>) {
    while let Ok((mut stream, _)) = listener.accept().await {
        hits.fetch_add(1, Ordering::SeqCst);
        let body = body.clone();
        tokio::spawn(async move {
            let mut seen = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                match stream.read(&mut buf).await {
                    Ok(0) | Err(_) => return,
                    Ok(n) => {
                        seen.extend_from_slice(&buf[..n]);
                        if seen.windows(4).any(|w| w == b"\r\n\r\n") {
                            break;
                        }
                    }
                }
            }
            let header = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nContent-Type: image/png\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(header.as_bytes()).await;
            let _ = stream.write_all(&body).await;
            let _ = stream.shutdown().await;
        });
    }
}

struct CountingLoader {
    calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Loader for CountingLoader {
    fn is_valid(&self, _request: &Request) -> bool {
        true
    }

    async fn load(&self, _request: &Request) -> LoadResult<Option<Fetched>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(Some(Fetched::Image(ImageData::Static(
            DynamicImage::new_rgba8(8, 8),
        ))))
    }
}

struct FailingLoader {
    calls: Arc<AtomicUsize>,
}

#[async_trait::async_trait]
impl Loader for FailingLoader {
    fn is_valid(&self, _request: &Request) -> bool {
        true
    }

    async fn load(&self, _request: &Request) -> LoadResult<Option<Fetched>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        Err(LoadError::network("boom"))
    }
}

#[tokio::test]
async fn concurrent_identical_requests_coalesce_to_one_load() {
    let calls = Arc::new(AtomicUsize::new(0));
    let dir = tempfile::TempDir::new().unwrap();
    let context = build_context(
        &dir,
        Some(vec![Arc::new(CountingLoader {
            calls: Arc::clone(&calls),
        }) as Arc<dyn Loader>]),
    );

    let request = Request::new("pic://one", TargetSize::by_width(32), context);
    let results = join_all((0..8).map(|_| request.send())).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let first = results[0].as_ref().unwrap();
    for result in &results {
        assert!(Arc::ptr_eq(first, result.as_ref().unwrap()));
    }
}

#[tokio::test]
async fn different_widths_do_not_coalesce() {
    let calls = Arc::new(AtomicUsize::new(0));
    let dir = tempfile::TempDir::new().unwrap();
    let context = build_context(
        &dir,
        Some(vec![Arc::new(CountingLoader {
            calls: Arc::clone(&calls),
        }) as Arc<dyn Loader>]),
    );

    let narrow = Request::new("pic://two", TargetSize::by_width(32), Arc::clone(&context));
    let wide = narrow.make_request(TargetSize::by_width(64));
    let (a, b) = tokio::join!(narrow.send(), wide.send());
    a.unwrap();
    b.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn failure_fans_out_to_every_waiter_and_is_not_sticky() {
    let calls = Arc::new(AtomicUsize::new(0));
    let dir = tempfile::TempDir::new().unwrap();
    let context = build_context(
        &dir,
        Some(vec![Arc::new(FailingLoader {
            calls: Arc::clone(&calls),
        }) as Arc<dyn Loader>]),
    );

    let request = Request::new("pic://bad", TargetSize::by_width(32), context);
    let results = join_all((0..4).map(|_| request.send())).await;

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    for result in results {
        assert_eq!(result.unwrap_err(), LoadError::Network("boom".into()));
    }

    // A failed group is forgotten: the next request tries again.
    let retry = request.send().await;
    assert!(retry.is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn network_load_fills_both_tiers_and_serves_from_them() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    tokio::spawn(serve(listener, Arc::clone(&hits), png_bytes(64)));

    let dir = tempfile::TempDir::new().unwrap();
    let context = build_context(&dir, None);
    let request = Request::new(
        format!("http://{addr}/pic.png"),
        TargetSize::Absolute {
            width: 16,
            height: 16,
        },
        Arc::clone(&context),
    );

    // First load fetches, resizes to the target, and persists to disk.
    let image = assert_ok!(request.send().await);
    assert_eq!(image.pixel_width(), 16);
    assert_eq!(image.pixel_height(), 16);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(context.disk().contains(&request).await);

    // Second load is a memory hit: same Arc, no new connection.
    let again = assert_ok!(request.send().await);
    assert!(Arc::ptr_eq(&image, &again));
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    // With memory cleared the disk tier still avoids the network.
    context.clear_caches();
    let from_disk = request.send().await.unwrap();
    assert_eq!(from_disk.pixel_width(), 16);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn concurrent_network_requests_share_one_fetch() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    tokio::spawn(serve(listener, Arc::clone(&hits), png_bytes(64)));

    let dir = tempfile::TempDir::new().unwrap();
    let context = build_context(&dir, None);
    let request = Request::new(
        format!("http://{addr}/shared.png"),
        TargetSize::by_width(16),
        context,
    );

    let results = join_all((0..6).map(|_| request.send())).await;
    for result in results {
        result.unwrap();
    }
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
