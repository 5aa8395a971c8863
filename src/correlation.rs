//! Correlation identifiers stamped on every outbound invocation.
//!
//! An identifier is a short scheme tag followed by a value that is unique per
//! invocation. Sources are injected into the template, so tests can swap in a
//! deterministic one.

use std::{
    borrow::Cow,
    sync::atomic::{AtomicU64, Ordering},
};

/// Header carrying the correlation identifier.
pub const CORRELATION_HEADER: &str = "_RPC_TRACE_ID_";

/// Scheme tag prefixed to every identifier.
pub const DEFAULT_TAG: &str = "ab";

/// Thread-safe source of unique identifiers.
pub trait CorrelationIds: Send + Sync + 'static {
    fn next_id(&self) -> String;
}

/// Tag followed by 128 random bits rendered as 32 lowercase hex digits.
#[derive(Clone, Debug)]
pub struct RandomIds {
    tag: Cow<'static, str>,
}

impl RandomIds {
    pub fn new(tag: impl Into<Cow<'static, str>>) -> Self {
        Self { tag: tag.into() }
    }
}

impl Default for RandomIds {
    fn default() -> Self {
        Self::new(DEFAULT_TAG)
    }
}

impl CorrelationIds for RandomIds {
    fn next_id(&self) -> String {
        format!("{}{:032x}", self.tag, rand::random::<u128>())
    }
}

/// Tag, a per-source random prefix, then a counter. Unique for the lifetime
/// of the source and cheap to produce.
#[derive(Debug)]
pub struct SequentialIds {
    tag: Cow<'static, str>,
    prefix: u64,
    counter: AtomicU64,
}

impl SequentialIds {
    pub fn new(tag: impl Into<Cow<'static, str>>) -> Self {
        Self {
            tag: tag.into(),
            prefix: rand::random(),
            counter: AtomicU64::new(0),
        }
    }
}

impl Default for SequentialIds {
    fn default() -> Self {
        Self::new(DEFAULT_TAG)
    }
}

impl CorrelationIds for SequentialIds {
    fn next_id(&self) -> String {
        let n = self.counter.fetch_add(1, Ordering::Relaxed);
        format!("{}{:016x}{:016x}", self.tag, self.prefix, n)
    }
}
