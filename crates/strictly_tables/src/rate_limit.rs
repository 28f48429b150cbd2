//! Per-connection fixed-window operation budget.

use crate::config::RateLimitConfig;
use crate::connection::ConnectionId;
use crate::error::{ErrorKind, SessionError};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Instant;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window limiter keyed by connection.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<ConnectionId, Window>>,
}

impl RateLimiter {
    /// Creates a limiter.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Spends one operation from the connection's budget.
    pub fn check(&self, connection_id: ConnectionId) -> Result<(), SessionError> {
        self.check_at(connection_id, Instant::now())
    }

    /// Same as [`RateLimiter::check`] with an explicit clock reading.
    ///
    /// # Errors
    ///
    /// `RateLimited` once `max_ops` operations were admitted in the current
    /// window. A rejected call does not count against the budget.
    pub fn check_at(&self, connection_id: ConnectionId, now: Instant) -> Result<(), SessionError> {
        let mut windows = self.windows.lock().map_err(|_| {
            error!("Rate limiter lock poisoned");
            SessionError::internal("Rate limiter unavailable")
        })?;

        let window = windows.entry(connection_id).or_insert(Window { started: now, count: 0 });
        if now.saturating_duration_since(window.started) >= self.config.window() {
            *window = Window { started: now, count: 0 };
        }

        if window.count >= *self.config.max_ops() {
            warn!(conn_id = connection_id, max_ops = self.config.max_ops(), "Rate limit exceeded");
            return Err(SessionError::new(
                ErrorKind::RateLimited,
                format!(
                    "More than {} operations within {} ms",
                    self.config.max_ops(),
                    self.config.window_ms()
                ),
            ));
        }
        window.count += 1;
        Ok(())
    }

    /// Forgets a closed connection's window.
    pub fn forget(&self, connection_id: ConnectionId) {
        if let Ok(mut windows) = self.windows.lock() {
            windows.remove(&connection_id);
        }
    }
}
