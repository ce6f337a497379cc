//! Scripted transport for testing without hardware.
//!
//! Provides a simulated controller for exercising the driver:
//! - scripted command/reply exchanges with exact-command verification
//! - controllable failure injection
//! - call logging for test assertions
//! - optional simulated latency

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::Transport;
use crate::error::{Error, Result};

/// Scripted stand-in for a controller.
///
/// Exchanges are queued with [`expect`](MockTransport::expect); each
/// `send_command` pops the next exchange, verifies the command matches,
/// and returns the canned reply (already framed, as a real transport
/// would return it). Clones share state, so tests can keep one handle for
/// assertions while the driver owns another.
///
/// # Example
///
/// ```
/// use newport_tlb6700::transport::MockTransport;
///
/// let mock = MockTransport::connected();
/// mock.expect("*IDN?", "New Focus 6700 v1.0");
/// ```
#[derive(Clone, Default)]
pub struct MockTransport {
    connected: Arc<AtomicBool>,
    latency_ms: Arc<Mutex<u64>>,
    should_fail_next: Arc<AtomicBool>,
    exchanges: Arc<Mutex<VecDeque<(String, String)>>>,
    call_log: Arc<Mutex<Vec<String>>>,
}

impl MockTransport {
    /// Create a disconnected mock with no scripted exchanges.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock that already reports itself connected.
    pub fn connected() -> Self {
        let mock = Self::new();
        mock.set_connected(true);
        mock
    }

    /// Set simulated latency per operation, in milliseconds.
    pub fn with_latency(self, ms: u64) -> Self {
        *self.latency_ms.lock().unwrap() = ms;
        self
    }

    /// Queue one expected command and the reply it should produce.
    pub fn expect(&self, command: &str, reply: &str) {
        self.exchanges
            .lock()
            .unwrap()
            .push_back((command.to_string(), reply.to_string()));
    }

    /// Inject a failure for the next operation.
    pub fn inject_next_failure(&self) {
        self.should_fail_next.store(true, Ordering::SeqCst);
    }

    fn check_failure(&self) -> bool {
        self.should_fail_next.swap(false, Ordering::SeqCst)
    }

    /// Set the connection state manually.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Commands received so far.
    pub fn call_log(&self) -> Vec<String> {
        self.call_log.lock().unwrap().clone()
    }

    /// Clear the call log.
    pub fn clear_log(&self) {
        self.call_log.lock().unwrap().clear();
    }

    /// Number of scripted exchanges not yet consumed.
    pub fn remaining(&self) -> usize {
        self.exchanges.lock().unwrap().len()
    }

    fn log_call(&self, call: &str) {
        self.call_log.lock().unwrap().push(call.to_string());
    }

    async fn simulate_latency(&self) {
        let latency = *self.latency_ms.lock().unwrap();
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&mut self) -> Result<()> {
        self.simulate_latency().await;
        self.log_call("connect");

        if self.check_failure() {
            return Err(Error::Io(std::io::Error::other("injected failure")));
        }

        self.set_connected(true);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.simulate_latency().await;
        self.log_call("disconnect");

        if self.check_failure() {
            return Err(Error::Io(std::io::Error::other("injected failure")));
        }

        self.set_connected(false);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn send_command(&mut self, command: &str) -> Result<String> {
        self.simulate_latency().await;
        self.log_call(command);

        if self.check_failure() {
            return Err(Error::Io(std::io::Error::other("injected failure")));
        }

        if !self.is_connected() {
            return Err(Error::NotConnected);
        }

        let next = self.exchanges.lock().unwrap().pop_front();
        match next {
            Some((expected, reply)) if expected == command => Ok(reply),
            Some((expected, _)) => Err(Error::Device(format!(
                "mock expected {expected:?}, driver sent {command:?}"
            ))),
            None => Err(Error::Device(format!(
                "mock exchange queue empty, driver sent {command:?}"
            ))),
        }
    }
}
