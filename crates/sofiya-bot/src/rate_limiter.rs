// =============================================================================
// Sofiya - Rate Limiter Module
// =============================================================================
//
// Author: Sofiya Bot Team
// Date: 2026-10-02
// Version: 0.1.0
// License: Apache 2.0 / MIT
//
// Description:
//   Fixed-window limit on outbound messages per chat.
//
//   Windows are fixed, not sliding: a chat that sends its full quota at the
//   end of one window and again at the start of the next gets up to twice
//   the nominal rate across the boundary.
//
// =============================================================================

use std::{
    collections::HashMap,
    sync::{Mutex, PoisonError},
};

use chrono::{DateTime, Duration, Utc};
use sofiya_core::{RateLimitConfig, SharedClock};
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: DateTime<Utc>,
}

/// Per-chat fixed-window rate limiter
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimitConfig,
    clock: SharedClock,
    windows: Mutex<HashMap<String, Window>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig, clock: SharedClock) -> Self {
        Self {
            config,
            clock,
            windows: Mutex::new(HashMap::new()),
        }
    }

    fn window_length(&self) -> Duration {
        i64::try_from(self.config.window_ms)
            .ok()
            .and_then(Duration::try_milliseconds)
            .unwrap_or(Duration::MAX)
    }

    /// Count one message for `chat_id`; `false` when its window is full
    #[instrument(level = "debug", skip(self))]
    pub fn allow(&self, chat_id: &str) -> bool {
        if !self.config.enabled {
            return true;
        }

        let now = self.clock.now();
        let fresh = Window {
            count: 0,
            reset_at: now
                .checked_add_signed(self.window_length())
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        };

        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let window = windows.entry(chat_id.to_string()).or_insert(fresh);
        if now > window.reset_at {
            *window = fresh;
        }

        if window.count >= self.config.messages_per_window {
            debug!("🚦 Rate limit reached for {}", chat_id);
            return false;
        }
        window.count += 1;
        true
    }

    /// Drop every window, reclaiming memory for idle chats
    pub fn clear(&self) {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let dropped = windows.len();
        windows.clear();
        debug!("🧹 Cleared {} rate limit windows", dropped);
    }

    /// Number of chats with a live window
    pub fn tracked_chats(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
