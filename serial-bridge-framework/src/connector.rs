//! Transport connection establishment with paced retries.
//!
//! A [`Connector`] drives one connection through
//! `Disconnected → Connecting → Connected → (Closed | Failed)`.
//! Two timers feed the state machine:
//!
//! - the retry timer fires every `retry_interval`; each firing makes exactly
//!   one connection attempt, the first one after the first interval;
//! - the overall timer fires once after `timeout`. Under [`OnTimeout::Warn`]
//!   it is only reported and retries continue; under [`OnTimeout::Fail`] the
//!   connector moves to `Failed` and gives up, cutting short any attempt
//!   still in flight.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::error::ConnectError;

/// Lifecycle of a single transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Closed => "closed",
            ConnectionState::Failed => "failed",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What to do when the overall connect timeout elapses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnTimeout {
    /// Log the timeout and keep retrying until connected.
    #[default]
    Warn,
    /// Stop retrying and report [`ConnectError::TimedOut`].
    Fail,
}

/// Timing policy for a [`Connector`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Spacing between connection attempts.
    pub retry_interval: Duration,
    /// Overall timeout, see [`OnTimeout`].
    pub timeout: Duration,
    /// Upper bound for a single attempt.
    pub attempt_timeout: Duration,
    pub on_timeout: OnTimeout,
}

impl RetryPolicy {
    /// Defaults for remote peers (gRPC, Zenoh, serial devices): retry every
    /// 5s, report a timeout after 60s.
    pub const fn remote() -> Self {
        Self {
            retry_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(60),
            attempt_timeout: Duration::from_secs(5),
            on_timeout: OnTimeout::Warn,
        }
    }

    /// Defaults for local stream sockets: retry every second, report a
    /// timeout after 5s.
    pub const fn local() -> Self {
        Self {
            retry_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(5),
            attempt_timeout: Duration::from_secs(1),
            on_timeout: OnTimeout::Warn,
        }
    }

    /// Set the retry interval. A single attempt is bounded by the same value.
    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self.attempt_timeout = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_on_timeout(mut self, on_timeout: OnTimeout) -> Self {
        self.on_timeout = on_timeout;
        self
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::remote()
    }
}

/// Establishes a connection to one target under a [`RetryPolicy`].
#[derive(Debug)]
pub struct Connector {
    target: String,
    policy: RetryPolicy,
    state: ConnectionState,
    attempts: u32,
    failures: u32,
    timed_out: bool,
}

impl Connector {
    /// Create a connector for `target` (used in logs and errors).
    pub fn new(target: impl Into<String>, policy: RetryPolicy) -> Self {
        Self {
            target: target.into(),
            policy,
            state: ConnectionState::Disconnected,
            attempts: 0,
            failures: 0,
            timed_out: false,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Attempts made by the last [`establish`](Self::establish) call.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Failed attempts made by the last [`establish`](Self::establish) call.
    ///
    /// Each one was logged as a single warning.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Whether the overall timeout elapsed during the last call.
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }

    /// Run the retry loop until `connect` yields a handle.
    ///
    /// Each failed attempt is logged as a warning and retried on the next
    /// retry tick. Returns an error only under [`OnTimeout::Fail`].
    pub async fn establish<T, E, F, Fut>(&mut self, mut connect: F) -> Result<T, ConnectError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        self.state = ConnectionState::Connecting;
        self.attempts = 0;
        self.failures = 0;
        self.timed_out = false;

        let started = Instant::now();
        let mut retry = tokio::time::interval_at(
            started + self.policy.retry_interval,
            self.policy.retry_interval,
        );
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let deadline = tokio::time::sleep(self.policy.timeout);
        tokio::pin!(deadline);

        info!(
            peer = %self.target,
            retry_interval = ?self.policy.retry_interval,
            timeout = ?self.policy.timeout,
            "Establishing connection"
        );

        loop {
            tokio::select! {
                biased;

                _ = &mut deadline, if !self.timed_out => {
                    self.expire();
                    if self.policy.on_timeout == OnTimeout::Fail {
                        return Err(self.give_up(started));
                    }
                }

                _ = retry.tick() => {
                    self.attempts += 1;
                    debug!(peer = %self.target, attempt = self.attempts, "Connecting");

                    let attempt = tokio::time::timeout(self.policy.attempt_timeout, connect());
                    let outcome = if self.policy.on_timeout == OnTimeout::Fail {
                        tokio::select! {
                            biased;

                            _ = &mut deadline => {
                                self.expire();
                                return Err(self.give_up(started));
                            }
                            outcome = attempt => outcome,
                        }
                    } else {
                        attempt.await
                    };

                    match outcome {
                        Ok(Ok(handle)) => {
                            self.state = ConnectionState::Connected;
                            info!(
                                peer = %self.target,
                                attempts = self.attempts,
                                "Connected"
                            );
                            return Ok(handle);
                        }
                        Ok(Err(e)) => {
                            self.failures += 1;
                            warn!(
                                peer = %self.target,
                                attempt = self.attempts,
                                error = %e,
                                "Could not connect... retrying"
                            );
                        }
                        Err(_) => {
                            self.failures += 1;
                            warn!(
                                peer = %self.target,
                                attempt = self.attempts,
                                limit = ?self.policy.attempt_timeout,
                                "Connection attempt timed out... retrying"
                            );
                        }
                    }
                }
            }
        }
    }

    fn expire(&mut self) {
        self.timed_out = true;
        error!(
            peer = %self.target,
            attempts = self.attempts,
            "Connection timeout"
        );
    }

    fn give_up(&mut self, started: Instant) -> ConnectError {
        self.state = ConnectionState::Failed;
        ConnectError::TimedOut {
            target: self.target.clone(),
            attempts: self.attempts,
            elapsed: started.elapsed(),
        }
    }

    /// Mark an established connection as closed.
    pub fn close(&mut self) {
        if self.state == ConnectionState::Connected {
            self.state = ConnectionState::Closed;
            info!(peer = %self.target, "Connection closed");
        }
    }
}
