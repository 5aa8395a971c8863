use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    task::{Context, Poll},
    time::Duration,
};

use futures::future::BoxFuture;
use http::StatusCode;
use tower::Service;

use crate::{
    generator::{Completion, CompletionHook},
    template::Invocation,
    transport::http::HttpError,
};

static NEXT_FILE: AtomicUsize = AtomicUsize::new(0);

/// File in the system temp dir, removed on drop.
pub struct TempFile {
    path: PathBuf,
}

impl TempFile {
    pub fn with_contents(contents: &str) -> Self {
        let path = std::env::temp_dir().join(format!(
            "http_pressure_{}_{}.tmp",
            std::process::id(),
            NEXT_FILE.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&path, contents).unwrap();
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempFile {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Hook that keeps every completion it sees.
#[derive(Default)]
pub struct RecordingHook {
    completions: Mutex<Vec<Completion>>,
}

impl RecordingHook {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn completions(&self) -> Vec<Completion> {
        self.completions.lock().unwrap().clone()
    }

    pub async fn wait_for(&self, n: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.completions.lock().unwrap().len() < n {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("completions did not arrive in time");
    }
}

impl CompletionHook for RecordingHook {
    fn on_complete(&self, completion: &Completion) {
        self.completions.lock().unwrap().push(completion.clone());
    }
}

/// Transport that answers every invocation with a fixed status after an
/// optional delay, tracking how many sends are in flight.
#[derive(Clone)]
pub struct StubTransport {
    status: StatusCode,
    delay: Duration,
    stats: Arc<StubStats>,
}

#[derive(Default)]
struct StubStats {
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubTransport {
    pub fn ok() -> Self {
        Self::with_delay(Duration::ZERO)
    }

    pub fn with_delay(delay: Duration) -> Self {
        Self {
            status: StatusCode::OK,
            delay,
            stats: Default::default(),
        }
    }

    pub fn calls(&self) -> usize {
        self.stats.calls.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.stats.max_in_flight.load(Ordering::SeqCst)
    }
}

impl Service<Invocation> for StubTransport {
    type Response = StatusCode;
    type Error = HttpError;
    type Future = BoxFuture<'static, Result<StatusCode, HttpError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _invocation: Invocation) -> Self::Future {
        let stats = self.stats.clone();
        let status = self.status;
        let delay = self.delay;
        stats.calls.fetch_add(1, Ordering::SeqCst);
        let now = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        stats.max_in_flight.fetch_max(now, Ordering::SeqCst);

        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            stats.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(status)
        })
    }
}
