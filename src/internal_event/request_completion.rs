use metrics::{Counter, Histogram, counter, histogram};

use super::registered_event;
use crate::generator::{Completion, CompletionHook, Outcome};

registered_event! {
    RequestOutcome { outcome: &'static str } => {
        latency: Histogram = histogram!("http_pressure_request_latency_seconds", "outcome" => outcome),
        requests: Counter = counter!("http_pressure_requests_total", "outcome" => outcome),
    }

    fn emit(&self, completion: &Completion) {
        self.latency.record(completion.latency);
        self.requests.increment(1);

        match &completion.outcome {
            Outcome::Response { status } => debug!(
                target: "http_pressure::completion",
                correlation_id = %completion.correlation_id,
                latency_ms = completion.latency.as_millis(),
                status = status.as_u16(),
                "Request completed"
            ),
            Outcome::Failed { kind, message } => warn!(
                target: "http_pressure::completion",
                correlation_id = %completion.correlation_id,
                latency_ms = completion.latency.as_millis(),
                %kind,
                error = %message,
                "Request failed"
            ),
        }
    }
}

/// The default [`CompletionHook`]: records latency and outcome counts and
/// logs each completion.
#[derive(Clone, Copy, Debug, Default)]
pub struct RequestCompleted;

impl CompletionHook for RequestCompleted {
    fn on_complete(&self, completion: &Completion) {
        RequestOutcome::register(completion.outcome.label()).emit(completion);
    }
}
