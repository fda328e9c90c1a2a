//! Observability and Metrics
//!
//! Per-server counters for connections, streams, and call outcomes.
//!
//! Uses atomic counters for thread-safe metrics collection. Each [`Server`]
//! owns one [`Metrics`]; there is no process-wide instance.
//!
//! [`Server`]: crate::service::server::Server

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

/// Metrics collector for RPC operations
#[derive(Debug)]
pub struct Metrics {
    /// Total connections accepted
    pub connections_total: AtomicU64,
    /// Currently active sessions
    pub connections_active: AtomicU64,
    /// Handshakes that failed before a session started
    pub handshakes_failed: AtomicU64,
    /// Total streams accepted
    pub streams_total: AtomicU64,
    /// Calls answered with a success response
    pub calls_succeeded: AtomicU64,
    /// Calls answered with an error response
    pub calls_failed: AtomicU64,
    /// Streams cancelled because the request did not decode
    pub decode_failures: AtomicU64,
    /// Streams cancelled because the response did not encode or send
    pub encode_failures: AtomicU64,
    /// Methods that panicked during dispatch
    pub dispatch_faults: AtomicU64,
    /// Start time for uptime calculation
    start_time: Instant,
}

impl Metrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            connections_total: AtomicU64::new(0),
            connections_active: AtomicU64::new(0),
            handshakes_failed: AtomicU64::new(0),
            streams_total: AtomicU64::new(0),
            calls_succeeded: AtomicU64::new(0),
            calls_failed: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            encode_failures: AtomicU64::new(0),
            dispatch_faults: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    /// Record a new session
    pub fn connection_established(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a session ending
    pub fn connection_closed(&self) {
        self.connections_active.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn handshake_failed(&self) {
        self.handshakes_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn stream_accepted(&self) {
        self.streams_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn call_succeeded(&self) {
        self.calls_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn call_failed(&self) {
        self.calls_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn encode_failure(&self) {
        self.encode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dispatch_fault(&self) {
        self.dispatch_faults.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current metrics snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            handshakes_failed: self.handshakes_failed.load(Ordering::Relaxed),
            streams_total: self.streams_total.load(Ordering::Relaxed),
            calls_succeeded: self.calls_succeeded.load(Ordering::Relaxed),
            calls_failed: self.calls_failed.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            encode_failures: self.encode_failures.load(Ordering::Relaxed),
            dispatch_faults: self.dispatch_faults.load(Ordering::Relaxed),
            uptime_seconds: self.start_time.elapsed().as_secs(),
        }
    }

    /// Log current metrics
    pub fn log_metrics(&self) {
        let snapshot = self.snapshot();
        info!(
            connections_total = snapshot.connections_total,
            connections_active = snapshot.connections_active,
            handshakes_failed = snapshot.handshakes_failed,
            streams_total = snapshot.streams_total,
            calls_succeeded = snapshot.calls_succeeded,
            calls_failed = snapshot.calls_failed,
            decode_failures = snapshot.decode_failures,
            encode_failures = snapshot.encode_failures,
            dispatch_faults = snapshot.dispatch_faults,
            uptime_seconds = snapshot.uptime_seconds,
            "RPC metrics snapshot"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub connections_active: u64,
    pub handshakes_failed: u64,
    pub streams_total: u64,
    pub calls_succeeded: u64,
    pub calls_failed: u64,
    pub decode_failures: u64,
    pub encode_failures: u64,
    pub dispatch_faults: u64,
    pub uptime_seconds: u64,
}

/// Timer for measuring operation duration
pub struct Timer {
    start: Instant,
    operation: &'static str,
}

impl Timer {
    /// Start timing an operation
    pub fn start(operation: &'static str) -> Self {
        Self {
            start: Instant::now(),
            operation,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        debug!(
            operation = self.operation,
            duration_us = duration.as_micros() as u64,
            "Operation completed"
        );
    }
}
