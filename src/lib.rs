//! HTTP load generation.
//!
//! A request descriptor (JSON) is compiled once into an immutable
//! [`RequestTemplate`]. A [`TaskGenerator`] turns that template into runnable
//! [`Task`](generator::Task)s on demand, each sending one fresh
//! [`Invocation`](template::Invocation) through a `tower::Service` transport
//! and reporting its [`Completion`](generator::Completion). A
//! [`PressureExecutor`] paces the generator along a [`Pressure`] curve.
//!
//! ```rust,no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use http_pressure::{
//!     Discipline, Pressure, PressureExecutor, RequestTemplate, TaskGenerator,
//!     transport::TransportSettings,
//! };
//!
//! # async fn run() -> Result<(), http_pressure::Error> {
//! let template = RequestTemplate::parse(r#"{"method":"GET","url":"http://localhost:8080/"}"#)?;
//! let transport = TransportSettings::default().build_transport()?;
//! let generator = TaskGenerator::new(Arc::new(template), transport, Discipline::Throughput);
//!
//! let mut executor = PressureExecutor::new(generator, Pressure::fixed(100, Duration::from_secs(30))?);
//! executor.start(Duration::from_secs(1));
//! executor.wait().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod correlation;
pub mod executor;
pub mod generator;
pub mod internal_event;
pub mod pressure;
pub mod template;
pub mod transport;

#[cfg(test)]
mod test_utils;

#[macro_use]
extern crate tracing;

pub use config::ConfigError;
pub use executor::PressureExecutor;
pub use generator::{Discipline, TaskGenerator};
pub use pressure::Pressure;
pub use template::{DescriptorError, RequestTemplate};

pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;
