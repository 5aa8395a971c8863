//! Pacing engine.
//!
//! [`PressureExecutor`] samples a [`Pressure`] once per tick and turns the
//! wanted quantity into load through a [`TaskGenerator`]:
//!
//! * [`Discipline::Concurrency`]: exactly `quantity` workers are kept alive,
//!   each running one task after another. Workers beyond the current quantity
//!   retire once their in-flight task has completed.
//! * [`Discipline::Throughput`]: every tick generates `quantity` tasks and runs
//!   them. Running only dispatches the send, so the tick loop never waits on
//!   responses.
//!
//! The loop ends on its own once the pressure's total duration has elapsed,
//! or earlier through [`PressureExecutor::stop`].

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use http::StatusCode;
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{Instant, MissedTickBehavior},
};
use tower::Service;

use crate::{
    generator::{Discipline, TaskGenerator},
    internal_event::{PressureApplied, PressureFinished},
    pressure::Pressure,
    template::Invocation,
};

pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

pub struct PressureExecutor<S> {
    generator: Arc<TaskGenerator<S>>,
    pressure: Arc<Pressure>,
    tick: Duration,
    shutdown: watch::Sender<bool>,
    driver: Option<JoinHandle<()>>,
}

impl<S> PressureExecutor<S>
where
    S: Service<Invocation, Response = StatusCode> + Clone + Send + Sync + 'static,
    S::Error: Into<crate::Error>,
    S::Future: Send + 'static,
{
    pub fn new(generator: TaskGenerator<S>, pressure: Pressure) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            generator: Arc::new(generator),
            pressure: Arc::new(pressure),
            tick: DEFAULT_TICK,
            shutdown,
            driver: None,
        }
    }

    /// Overrides the sampling period. A zero tick is ignored.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        if !tick.is_zero() {
            self.tick = tick;
        }
        self
    }

    pub fn pressure(&self) -> &Pressure {
        &self.pressure
    }

    pub fn discipline(&self) -> Discipline {
        self.generator.discipline()
    }

    pub fn is_running(&self) -> bool {
        self.driver
            .as_ref()
            .is_some_and(|driver| !driver.is_finished())
    }

    /// Spawns the pacing loop onto the current runtime; load begins after
    /// `initial_delay`. Calling it again while started has no effect.
    pub fn start(&mut self, initial_delay: Duration) {
        if self.driver.is_some() {
            warn!(target: "http_pressure::executor", "Executor already started");
            return;
        }

        info!(
            target: "http_pressure::executor",
            discipline = %self.generator.discipline(),
            initial_delay_ms = initial_delay.as_millis(),
            total_duration_ms = self.pressure.total_duration().as_millis(),
            "Starting pressure"
        );

        let driver = Driver {
            generator: self.generator.clone(),
            pressure: self.pressure.clone(),
            tick: self.tick,
            shutdown: self.shutdown.subscribe(),
        };
        self.driver = Some(tokio::spawn(driver.run(initial_delay)));
    }

    /// Signals shutdown and waits until the loop and every worker are done.
    /// Tasks already in flight run to completion.
    pub async fn stop(&mut self) {
        self.shutdown.send_replace(true);
        self.wait().await;
    }

    /// Waits for the loop to end by itself.
    ///
    /// Cancel safe: if this future is dropped early the loop keeps running
    /// and a later `wait` or `stop` still waits for it.
    pub async fn wait(&mut self) {
        let Some(driver) = self.driver.as_mut() else {
            return;
        };
        let result = driver.await;
        self.driver = None;
        if let Err(error) = result {
            error!(target: "http_pressure::executor", %error, "Pacing loop failed");
        }
    }
}

impl<S> Drop for PressureExecutor<S> {
    fn drop(&mut self) {
        self.shutdown.send_replace(true);
    }
}

struct Driver<S> {
    generator: Arc<TaskGenerator<S>>,
    pressure: Arc<Pressure>,
    tick: Duration,
    shutdown: watch::Receiver<bool>,
}

impl<S> Driver<S>
where
    S: Service<Invocation, Response = StatusCode> + Clone + Send + Sync + 'static,
    S::Error: Into<crate::Error>,
    S::Future: Send + 'static,
{
    async fn run(mut self, initial_delay: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(initial_delay) => {}
            _ = wait_for_shutdown(&mut self.shutdown) => {
                debug!(target: "http_pressure::executor", "Stopped before start");
                return;
            }
        }

        let applied = PressureApplied::register();
        let total = self.pressure.total_duration();
        let started = Instant::now();
        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut workers = Workers::default();

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = wait_for_shutdown(&mut self.shutdown) => break,
            }

            let elapsed = started.elapsed();
            if elapsed >= total {
                break;
            }
            let quantity = self.pressure.current_quantity(elapsed);
            applied.emit(quantity);

            match self.generator.discipline() {
                Discipline::Concurrency => workers.resize(quantity, &self.generator),
                Discipline::Throughput => {
                    for task in self.generator.generate(quantity) {
                        task.run().await;
                    }
                }
            }
        }

        workers.shutdown().await;
        PressureFinished::register().emit(started.elapsed());
    }
}

async fn wait_for_shutdown(shutdown: &mut watch::Receiver<bool>) {
    // a dropped sender also means shutdown
    let _ = shutdown.wait_for(|stop| *stop).await;
}

struct Worker {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct Workers {
    active: Vec<Worker>,
    retired: Vec<JoinHandle<()>>,
}

impl Workers {
    fn resize<S>(&mut self, quantity: usize, generator: &Arc<TaskGenerator<S>>)
    where
        S: Service<Invocation, Response = StatusCode> + Clone + Send + Sync + 'static,
        S::Error: Into<crate::Error>,
        S::Future: Send + 'static,
    {
        // a worker whose task panicked is gone and gets replaced below
        self.active.retain(|worker| !worker.handle.is_finished());
        self.retired.retain(|handle| !handle.is_finished());

        while self.active.len() > quantity {
            if let Some(worker) = self.active.pop() {
                worker.stop.store(true, Ordering::Release);
                self.retired.push(worker.handle);
            }
        }

        while self.active.len() < quantity {
            let stop = Arc::new(AtomicBool::new(false));
            let handle = tokio::spawn(work(generator.clone(), stop.clone()));
            self.active.push(Worker { stop, handle });
        }
    }

    async fn shutdown(self) {
        let handles = self.active.into_iter().map(|worker| {
            worker.stop.store(true, Ordering::Release);
            worker.handle
        });
        let handles: Vec<_> = handles.chain(self.retired).collect();
        for result in futures::future::join_all(handles).await {
            if let Err(error) = result {
                error!(target: "http_pressure::executor", %error, "Worker failed");
            }
        }
    }
}

async fn work<S>(generator: Arc<TaskGenerator<S>>, stop: Arc<AtomicBool>)
where
    S: Service<Invocation, Response = StatusCode> + Clone + Send + Sync + 'static,
    S::Error: Into<crate::Error>,
    S::Future: Send + 'static,
{
    while !stop.load(Ordering::Acquire) {
        for task in generator.generate(1) {
            task.run().await;
        }
        tokio::task::yield_now().await;
    }
}
