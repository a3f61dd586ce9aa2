//! Client Metrics
//!
//! Counters for one [`Client`](crate::service::client::Client), bumped
//! with relaxed atomics from the session tasks and read through
//! [`Metrics::snapshot`].

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy)]
enum Counter {
    Connections,
    HandshakesOk,
    HandshakesFailed,
    FramesOut,
    FramesIn,
    BytesOut,
    BytesIn,
    Multis,
    Heartbeats,
    DecodeErrors,
    FatalErrors,
}

const COUNTERS: usize = Counter::FatalErrors as usize + 1;

#[derive(Debug)]
pub struct Metrics {
    counters: [AtomicU64; COUNTERS],
    created: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            counters: std::array::from_fn(|_| AtomicU64::new(0)),
            created: Instant::now(),
        }
    }

    #[inline]
    fn add(&self, counter: Counter, n: u64) {
        self.counters[counter as usize].fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    fn get(&self, counter: Counter) -> u64 {
        self.counters[counter as usize].load(Ordering::Relaxed)
    }

    /// A TCP connection was opened.
    pub fn connection_established(&self) {
        self.add(Counter::Connections, 1);
    }

    /// The channel handshake reached `Ready`.
    pub fn handshake_success(&self) {
        self.add(Counter::HandshakesOk, 1);
    }

    pub fn handshake_failed(&self) {
        self.add(Counter::HandshakesFailed, 1);
    }

    /// A frame was written; `wire_len` is the payload after encryption.
    pub fn message_sent(&self, wire_len: u64) {
        self.add(Counter::FramesOut, 1);
        self.add(Counter::BytesOut, wire_len);
    }

    /// A frame was read; `wire_len` is the payload before decryption.
    pub fn message_received(&self, wire_len: u64) {
        self.add(Counter::FramesIn, 1);
        self.add(Counter::BytesIn, wire_len);
    }

    pub fn multi_unpacked(&self) {
        self.add(Counter::Multis, 1);
    }

    pub fn heartbeat_sent(&self) {
        self.add(Counter::Heartbeats, 1);
    }

    pub fn decode_error(&self) {
        self.add(Counter::DecodeErrors, 1);
    }

    /// An error ended the session.
    pub fn fatal_error(&self) {
        self.add(Counter::FatalErrors, 1);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            connections_total: self.get(Counter::Connections),
            handshakes_success: self.get(Counter::HandshakesOk),
            handshakes_failed: self.get(Counter::HandshakesFailed),
            messages_sent: self.get(Counter::FramesOut),
            messages_received: self.get(Counter::FramesIn),
            bytes_sent: self.get(Counter::BytesOut),
            bytes_received: self.get(Counter::BytesIn),
            multis_unpacked: self.get(Counter::Multis),
            heartbeats_sent: self.get(Counter::Heartbeats),
            decode_errors: self.get(Counter::DecodeErrors),
            fatal_errors: self.get(Counter::FatalErrors),
            uptime_seconds: self.created.elapsed().as_secs(),
        }
    }

    /// Emits the current snapshot as one structured `info` event.
    pub fn log_metrics(&self) {
        let s = self.snapshot();
        info!(
            connections = s.connections_total,
            handshakes_ok = s.handshakes_success,
            handshakes_failed = s.handshakes_failed,
            sent = s.messages_sent,
            received = s.messages_received,
            bytes_out = s.bytes_sent,
            bytes_in = s.bytes_received,
            multis = s.multis_unpacked,
            heartbeats = s.heartbeats_sent,
            decode_errors = s.decode_errors,
            fatal_errors = s.fatal_errors,
            uptime_s = s.uptime_seconds,
            "client metrics"
        );
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of [`Metrics`], serializable for export
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub connections_total: u64,
    pub handshakes_success: u64,
    pub handshakes_failed: u64,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub multis_unpacked: u64,
    pub heartbeats_sent: u64,
    pub decode_errors: u64,
    pub fatal_errors: u64,
    pub uptime_seconds: u64,
}

/// Logs at `debug` how long the enclosing scope took
pub struct Timer {
    started: Instant,
    label: &'static str,
}

impl Timer {
    pub fn start(label: &'static str) -> Self {
        Self {
            started: Instant::now(),
            label,
        }
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        let elapsed_us = u64::try_from(self.started.elapsed().as_micros()).unwrap_or(u64::MAX);
        debug!(operation = self.label, elapsed_us, "timed");
    }
}
