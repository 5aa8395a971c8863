//! Task generation.
//!
//! The pacing engine calls [`TaskGenerator::generate`] with the load level it
//! currently wants and runs the returned [`Task`]s. Each task materializes one
//! invocation, sends it once through the transport and reports the outcome to
//! the [`CompletionHook`]. The [`Discipline`] chosen at construction decides
//! whether running a task waits for the response.
//!
//! The transport is any `tower::Service<Invocation, Response = StatusCode>`
//! that can be cloned per task.

pub mod completion;
pub mod discipline;

use std::{fmt, sync::Arc};

use http::StatusCode;
use tower::{Service, ServiceExt};

pub use completion::{Completion, CompletionHook, FailureKind, Outcome, Timed};
pub use discipline::Discipline;

use crate::{
    internal_event::RequestCompleted,
    template::{Invocation, RequestTemplate},
};

pub struct TaskGenerator<S> {
    template: Arc<RequestTemplate>,
    transport: S,
    discipline: Discipline,
    hook: Arc<dyn CompletionHook>,
}

impl<S: Clone> TaskGenerator<S> {
    /// Completions are reported through [`RequestCompleted`] unless another
    /// hook is installed with [`TaskGenerator::with_hook`].
    pub fn new(template: Arc<RequestTemplate>, transport: S, discipline: Discipline) -> Self {
        Self {
            template,
            transport,
            discipline,
            hook: Arc::new(RequestCompleted),
        }
    }

    pub fn with_hook(mut self, hook: Arc<dyn CompletionHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn discipline(&self) -> Discipline {
        self.discipline
    }

    pub fn template(&self) -> &Arc<RequestTemplate> {
        &self.template
    }

    /// Produces exactly `n` independent tasks. `n == 0` yields none.
    ///
    /// Takes `&self` only and mutates nothing, so it may be called from any
    /// number of threads at once.
    pub fn generate(&self, n: usize) -> Vec<Task<S>> {
        trace!(target: "http_pressure::generator", n, discipline = %self.discipline, "Generating tasks");
        (0..n)
            .map(|_| Task {
                template: self.template.clone(),
                transport: self.transport.clone(),
                discipline: self.discipline,
                hook: self.hook.clone(),
            })
            .collect()
    }
}

impl<S> fmt::Debug for TaskGenerator<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskGenerator")
            .field("template", &self.template)
            .field("discipline", &self.discipline)
            .finish_non_exhaustive()
    }
}

/// One unit of work: one materialization, one send, one completion.
#[must_use = "a task does nothing until run"]
pub struct Task<S> {
    template: Arc<RequestTemplate>,
    transport: S,
    discipline: Discipline,
    hook: Arc<dyn CompletionHook>,
}

impl<S> Task<S>
where
    S: Service<Invocation, Response = StatusCode> + Send + 'static,
    S::Error: Into<crate::Error>,
    S::Future: Send + 'static,
{
    pub fn discipline(&self) -> Discipline {
        self.discipline
    }

    /// Runs the task.
    ///
    /// Under [`Discipline::Concurrency`] this resolves after the completion
    /// hook has seen the outcome. Under [`Discipline::Throughput`] the send is
    /// spawned onto the current tokio runtime and this resolves immediately.
    /// Never fails: send errors become [`Outcome::Failed`].
    ///
    /// # Panics
    ///
    /// A throughput task panics when run outside a tokio runtime, since the
    /// send is handed to `tokio::spawn`. Concurrency tasks only need an
    /// executor for the transport's own future.
    pub async fn run(self) {
        let Task {
            template,
            transport,
            discipline,
            hook,
        } = self;

        let invocation = template.materialize();
        let send = send_and_record(transport, invocation, hook);

        match discipline {
            Discipline::Concurrency => send.await,
            Discipline::Throughput => {
                tokio::spawn(send);
            }
        }
    }
}

async fn send_and_record<S>(transport: S, invocation: Invocation, hook: Arc<dyn CompletionHook>)
where
    S: Service<Invocation, Response = StatusCode>,
    S::Error: Into<crate::Error>,
{
    let correlation_id = invocation.correlation_id().to_string();
    trace!(target: "http_pressure::generator", %correlation_id, "Sending invocation");

    let (result, latency) = Timed::new(transport.oneshot(invocation)).await;

    let outcome = match result {
        Ok(status) => Outcome::Response { status },
        Err(error) => {
            let error: crate::Error = error.into();
            Outcome::Failed {
                kind: FailureKind::classify(error.as_ref()),
                message: error.to_string(),
            }
        }
    };

    completion::notify(
        &hook,
        &Completion {
            correlation_id,
            latency,
            outcome,
        },
    );
}

#[cfg(test)]
mod tests {
    use std::{
        sync::{
            Arc,
            atomic::{AtomicUsize, Ordering},
        },
        time::Duration,
    };

    use serde_json::json;
    use tokio_test::{assert_pending, task};
    use tower::service_fn;
    use tower_test::mock;

    use super::*;
    use crate::{
        test_utils::{RecordingHook, StubTransport},
        transport::http::HttpError,
    };

    fn template() -> Arc<RequestTemplate> {
        Arc::new(
            RequestTemplate::parse(
                &json!({
                    "method": "GET",
                    "url": "http://h/x",
                    "headers": [{ "name": "A", "value": "1" }]
                })
                .to_string(),
            )
            .unwrap(),
        )
    }

    #[test]
    fn generate_zero_yields_no_tasks() {
        let generator = TaskGenerator::new(
            template(),
            StubTransport::ok(),
            Discipline::Concurrency,
        );
        assert!(generator.generate(0).is_empty());
    }

    #[test]
    fn generate_yields_exactly_n_tasks() {
        let generator = TaskGenerator::new(
            template(),
            StubTransport::ok(),
            Discipline::Throughput,
        );
        for n in [1, 7, 250] {
            let tasks = generator.generate(n);
            assert_eq!(tasks.len(), n);
            assert!(tasks.iter().all(|task| task.discipline() == Discipline::Throughput));
        }
    }

    #[tokio::test]
    async fn concurrency_task_returns_after_completion_is_recorded() {
        let (transport, mut handle) = mock::pair::<Invocation, StatusCode>();
        let hook = RecordingHook::new();
        let generator = TaskGenerator::new(template(), transport, Discipline::Concurrency)
            .with_hook(hook.clone());

        let mut run = task::spawn(generator.generate(1).remove(0).run());
        assert_pending!(run.poll());

        let (invocation, response) = handle.next_request().await.unwrap();
        assert_pending!(run.poll());
        assert!(hook.completions().is_empty());

        response.send_response(StatusCode::CREATED);
        run.await;

        let completions = hook.completions();
        assert_eq!(completions.len(), 1);
        assert_eq!(completions[0].correlation_id, invocation.correlation_id());
        assert_eq!(
            completions[0].outcome,
            Outcome::Response { status: StatusCode::CREATED }
        );
    }

    #[tokio::test]
    async fn throughput_task_returns_before_completion() {
        let (transport, mut handle) = mock::pair::<Invocation, StatusCode>();
        let hook = RecordingHook::new();
        let generator = TaskGenerator::new(template(), transport, Discipline::Throughput)
            .with_hook(hook.clone());

        generator.generate(1).remove(0).run().await;
        assert!(hook.completions().is_empty());

        let (invocation, response) = handle.next_request().await.unwrap();
        assert!(hook.completions().is_empty());
        response.send_response(StatusCode::ACCEPTED);

        hook.wait_for(1).await;
        let completions = hook.completions();
        assert_eq!(completions[0].correlation_id, invocation.correlation_id());
        assert_eq!(completions[0].outcome.status(), Some(StatusCode::ACCEPTED));
    }

    #[tokio::test]
    async fn each_task_sends_its_own_invocation() {
        let (transport, mut handle) = mock::pair::<Invocation, StatusCode>();
        let hook = RecordingHook::new();
        let generator = TaskGenerator::new(template(), transport, Discipline::Throughput)
            .with_hook(hook.clone());

        for task in generator.generate(3) {
            task.run().await;
        }

        let mut ids = Vec::new();
        for _ in 0..3 {
            let (invocation, response) = handle.next_request().await.unwrap();
            assert_eq!(invocation.header_values("A").collect::<Vec<_>>(), ["1"]);
            ids.push(invocation.correlation_id().to_string());
            response.send_response(StatusCode::OK);
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 3);

        hook.wait_for(3).await;
    }

    #[tokio::test]
    async fn transport_failures_are_recorded_and_generation_continues() {
        let calls = Arc::new(AtomicUsize::new(0));
        let transport = {
            let calls = calls.clone();
            service_fn(move |_invocation: Invocation| {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call == 0 {
                        Err(HttpError::Timeout)
                    } else {
                        Ok(StatusCode::INTERNAL_SERVER_ERROR)
                    }
                }
            })
        };
        let hook = RecordingHook::new();
        let generator = TaskGenerator::new(template(), transport, Discipline::Concurrency)
            .with_hook(hook.clone());

        generator.generate(1).remove(0).run().await;
        for task in generator.generate(2) {
            task.run().await;
        }

        let outcomes: Vec<_> = hook.completions().into_iter().map(|c| c.outcome).collect();
        assert_eq!(outcomes.len(), 3);
        assert!(matches!(
            &outcomes[0],
            Outcome::Failed { kind: FailureKind::Timeout, .. }
        ));
        assert_eq!(outcomes[1].label(), "http_error");
        assert_eq!(outcomes[2].status(), Some(StatusCode::INTERNAL_SERVER_ERROR));
    }

    #[tokio::test]
    async fn foreign_transport_errors_are_classified_as_other() {
        let transport = service_fn(|_invocation: Invocation| async {
            Err::<StatusCode, crate::Error>("socket closed".into())
        });
        let hook = RecordingHook::new();
        let generator = TaskGenerator::new(template(), transport, Discipline::Concurrency)
            .with_hook(hook.clone());

        generator.generate(1).remove(0).run().await;

        let completions = hook.completions();
        assert_eq!(
            completions[0].outcome,
            Outcome::Failed {
                kind: FailureKind::Other,
                message: "socket closed".into(),
            }
        );
    }

    #[test]
    fn concurrency_task_runs_on_any_executor() {
        let transport = StubTransport::ok();
        let hook = RecordingHook::new();
        let generator = TaskGenerator::new(template(), transport.clone(), Discipline::Concurrency)
            .with_hook(hook.clone());

        futures::executor::block_on(generator.generate(1).remove(0).run());

        assert_eq!(transport.calls(), 1);
        assert_eq!(hook.completions().len(), 1);
    }

    #[test]
    #[should_panic(expected = "Tokio")]
    fn throughput_task_needs_a_tokio_runtime() {
        let generator = TaskGenerator::new(template(), StubTransport::ok(), Discipline::Throughput);
        futures::executor::block_on(generator.generate(1).remove(0).run());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn generate_is_callable_concurrently() {
        let transport = StubTransport::ok();
        let hook = RecordingHook::new();
        let generator = Arc::new(
            TaskGenerator::new(template(), transport.clone(), Discipline::Concurrency)
                .with_hook(hook.clone()),
        );

        let pacers: Vec<_> = (0..4)
            .map(|_| {
                let generator = generator.clone();
                tokio::spawn(async move {
                    for task in generator.generate(25) {
                        task.run().await;
                    }
                })
            })
            .collect();
        for pacer in pacers {
            pacer.await.unwrap();
        }

        assert_eq!(transport.calls(), 100);
        assert_eq!(hook.completions().len(), 100);
        assert!(
            hook.completions()
                .iter()
                .all(|c| c.latency < Duration::from_secs(5))
        );
    }
}
