// =============================================================================
// Connection state machine — bounded-retry reconnection
// =============================================================================
//
// The live-feed connection lifecycle as an explicit tagged-variant machine.
// The async supervisor in `feed.rs` drives transitions; everything here is
// synchronous and deterministic so the full transition table is unit-testable
// without a socket.
//
// Transition table:
//   Disconnected    --connect-------------> Connecting
//   Connecting      --success-------------> Connected        (retry := 0)
//   Connecting      --failure-------------> Reconnecting | FailedPermanent
//   Connected       --remote close/error--> Reconnecting | Disconnected | FailedPermanent
//   Reconnecting    --timer elapses-------> Connecting
//   any state       --manual_reconnect----> Connecting       (retry := 0)
//
// The retry counter counts consecutive failed attempts; a failure recorded
// with the counter already at `max_attempts - 1` is terminal. The retry
// delay is a fixed interval, not exponential.

use serde::Serialize;
use tracing::{info, warn};

/// Connection lifecycle states, observed read-only by the dashboard layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    FailedPermanent,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "DISCONNECTED"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Connected => write!(f, "CONNECTED"),
            Self::Reconnecting => write!(f, "RECONNECTING"),
            Self::FailedPermanent => write!(f, "FAILED_PERMANENT"),
        }
    }
}

/// The connection state machine. Owned by the feed supervisor; mutated only
/// through the transition methods below.
pub struct ConnectionMachine {
    state: ConnectionState,
    retry_count: u32,
    max_attempts: u32,
    auto_reconnect: bool,
}

impl ConnectionMachine {
    pub fn new(max_attempts: u32, auto_reconnect: bool) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            retry_count: 0,
            max_attempts,
            auto_reconnect,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Begin a connection attempt from `Disconnected`.
    pub fn connect(&mut self) {
        if self.state == ConnectionState::Disconnected {
            self.state = ConnectionState::Connecting;
        }
    }

    /// A connection attempt succeeded.
    pub fn on_connected(&mut self) {
        info!(retries = self.retry_count, "feed connected");
        self.retry_count = 0;
        self.state = ConnectionState::Connected;
    }

    /// A connection attempt failed before being established.
    pub fn on_connect_failed(&mut self) {
        self.record_failure();
    }

    /// An established connection was closed or errored remotely.
    ///
    /// With auto-reconnect disabled this parks the machine in
    /// `Disconnected`; otherwise the failure counts against the retry
    /// budget like any other.
    pub fn on_connection_lost(&mut self) {
        if !self.auto_reconnect {
            warn!("feed connection lost, auto-reconnect disabled");
            self.state = ConnectionState::Disconnected;
            return;
        }
        self.record_failure();
    }

    /// The fixed reconnect delay elapsed; try again.
    pub fn on_retry_timer(&mut self) {
        if self.state == ConnectionState::Reconnecting {
            self.state = ConnectionState::Connecting;
        }
    }

    /// Operator-initiated reconnect. Callable from any state; resets the
    /// retry budget and supersedes any pending scheduled retry.
    pub fn manual_reconnect(&mut self) {
        info!(from = %self.state, "manual reconnect requested");
        self.retry_count = 0;
        self.state = ConnectionState::Connecting;
    }

    /// Subscription teardown: stop the machine whatever it is doing.
    pub fn teardown(&mut self) {
        self.state = ConnectionState::Disconnected;
    }

    fn record_failure(&mut self) {
        self.retry_count += 1;
        if self.retry_count >= self.max_attempts {
            warn!(
                attempts = self.retry_count,
                max = self.max_attempts,
                "reconnect budget exhausted, giving up until manual reconnect"
            );
            self.state = ConnectionState::FailedPermanent;
        } else {
            info!(
                attempt = self.retry_count,
                max = self.max_attempts,
                "feed connection failed, retry scheduled"
            );
            self.state = ConnectionState::Reconnecting;
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn machine(max: u32) -> ConnectionMachine {
        let mut m = ConnectionMachine::new(max, true);
        m.connect();
        m
    }

    #[test]
    fn connect_moves_to_connecting() {
        let m = machine(5);
        assert_eq!(m.state(), ConnectionState::Connecting);
    }

    #[test]
    fn success_resets_retry_counter() {
        let mut m = machine(5);
        m.on_connect_failed();
        m.on_retry_timer();
        assert_eq!(m.retry_count(), 1);

        m.on_connected();
        assert_eq!(m.state(), ConnectionState::Connected);
        assert_eq!(m.retry_count(), 0);
    }

    #[test]
    fn three_failures_with_max_three_is_terminal() {
        let mut m = machine(3);

        m.on_connect_failed();
        assert_eq!(m.state(), ConnectionState::Reconnecting);
        m.on_retry_timer();

        m.on_connect_failed();
        assert_eq!(m.state(), ConnectionState::Reconnecting);
        m.on_retry_timer();

        m.on_connect_failed();
        assert_eq!(m.state(), ConnectionState::FailedPermanent);

        // No timer is pending in the terminal state; a stray tick is inert.
        m.on_retry_timer();
        assert_eq!(m.state(), ConnectionState::FailedPermanent);
    }

    #[test]
    fn manual_reconnect_recovers_from_terminal_state() {
        let mut m = machine(1);
        m.on_connect_failed();
        assert_eq!(m.state(), ConnectionState::FailedPermanent);

        m.manual_reconnect();
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert_eq!(m.retry_count(), 0);
    }

    #[test]
    fn manual_reconnect_supersedes_pending_retry() {
        let mut m = machine(5);
        m.on_connect_failed();
        assert_eq!(m.state(), ConnectionState::Reconnecting);

        m.manual_reconnect();
        assert_eq!(m.state(), ConnectionState::Connecting);
        assert_eq!(m.retry_count(), 0);
    }

    #[test]
    fn remote_loss_without_auto_reconnect_parks_disconnected() {
        let mut m = ConnectionMachine::new(5, false);
        m.connect();
        m.on_connected();

        m.on_connection_lost();
        assert_eq!(m.state(), ConnectionState::Disconnected);
        assert_eq!(m.retry_count(), 0);
    }

    #[test]
    fn remote_loss_with_auto_reconnect_counts_against_budget() {
        let mut m = machine(2);
        m.on_connected();

        m.on_connection_lost();
        assert_eq!(m.state(), ConnectionState::Reconnecting);
        m.on_retry_timer();
        m.on_connect_failed();
        assert_eq!(m.state(), ConnectionState::FailedPermanent);
    }

    #[test]
    fn teardown_stops_the_machine() {
        let mut m = machine(5);
        m.on_connected();
        m.teardown();
        assert_eq!(m.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn display_matches_dashboard_labels() {
        assert_eq!(ConnectionState::FailedPermanent.to_string(), "FAILED_PERMANENT");
        assert_eq!(ConnectionState::Connecting.to_string(), "CONNECTING");
    }
}
