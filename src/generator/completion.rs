use std::{
    fmt,
    future::Future,
    panic::{AssertUnwindSafe, catch_unwind},
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::{Duration, Instant},
};

use http::StatusCode;
use pin_project::pin_project;

use crate::transport::http::HttpError;

/// Failure classification of a send that produced no response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// The invocation could not be turned into a request (e.g. no url).
    InvalidRequest,
    Connect,
    Timeout,
    /// A file backing the body could not be opened.
    Io,
    Other,
}

impl FailureKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            FailureKind::InvalidRequest => "invalid_request",
            FailureKind::Connect => "connect",
            FailureKind::Timeout => "timeout",
            FailureKind::Io => "io",
            FailureKind::Other => "other",
        }
    }

    /// Classifies a transport error. Errors that are not [`HttpError`]s are `Other`.
    pub fn classify(error: &(dyn std::error::Error + 'static)) -> Self {
        match error.downcast_ref::<HttpError>() {
            Some(error) => error.kind(),
            None => FailureKind::Other,
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of one invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// A response arrived; any status, including 4xx and 5xx.
    Response { status: StatusCode },
    Failed { kind: FailureKind, message: String },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Response { status } if status.is_success())
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Outcome::Response { status } => Some(*status),
            Outcome::Failed { .. } => None,
        }
    }

    /// Metric label: `success`, `http_error` or the failure kind.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Response { status } if status.is_success() => "success",
            Outcome::Response { .. } => "http_error",
            Outcome::Failed { kind, .. } => kind.as_str(),
        }
    }
}

/// What the completion hook receives for every finished invocation.
#[derive(Clone, Debug)]
pub struct Completion {
    pub correlation_id: String,
    pub latency: Duration,
    pub outcome: Outcome,
}

/// Observes finished invocations.
///
/// Called exactly once per task, after the send finished. Panics are caught
/// and logged; they never reach the worker running the task.
pub trait CompletionHook: Send + Sync + 'static {
    fn on_complete(&self, completion: &Completion);
}

impl<F> CompletionHook for F
where
    F: Fn(&Completion) + Send + Sync + 'static,
{
    fn on_complete(&self, completion: &Completion) {
        self(completion)
    }
}

pub(crate) fn notify(hook: &Arc<dyn CompletionHook>, completion: &Completion) {
    if catch_unwind(AssertUnwindSafe(|| hook.on_complete(completion))).is_err() {
        error!(
            target: "http_pressure::completion",
            correlation_id = %completion.correlation_id,
            "Completion hook panicked; outcome dropped"
        );
    }
}

/// Measures wall-clock time from the first poll of the inner future to its
/// completion.
#[pin_project]
pub struct Timed<F> {
    #[pin]
    inner: F,
    started: Option<Instant>,
}

impl<F> Timed<F> {
    pub fn new(inner: F) -> Self {
        Self {
            inner,
            started: None,
        }
    }
}

impl<F: Future> Future for Timed<F> {
    type Output = (F::Output, Duration);

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.project();
        let started = *this.started.get_or_insert_with(Instant::now);
        let output = std::task::ready!(this.inner.poll(cx));
        Poll::Ready((output, started.elapsed()))
    }
}
