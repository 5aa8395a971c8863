use std::time::Duration;

use metrics::{Counter, Gauge, counter, gauge};

use super::registered_event;

registered_event! {
    PressureApplied => {
        target: Gauge = gauge!("http_pressure_target_quantity"),
        ticks: Counter = counter!("http_pressure_ticks_total"),
    }

    fn emit(&self, quantity: usize) {
        self.target.set(quantity as f64);
        self.ticks.increment(1);
        trace!(target: "http_pressure::executor", quantity, "Pressure applied");
    }
}

registered_event! {
    PressureFinished => {
        target: Gauge = gauge!("http_pressure_target_quantity"),
    }

    fn emit(&self, elapsed: Duration) {
        self.target.set(0.0);
        info!(
            target: "http_pressure::executor",
            elapsed_ms = elapsed.as_millis(),
            "Pressure finished"
        );
    }
}
