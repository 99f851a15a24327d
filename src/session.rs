//! Connection policies and the per-consumer subscription.
//!
//! Nothing here touches a socket or a clock. Policies consume socket lifecycle
//! notifications and answer with `Action`s; `transport::client` executes them.
//! Each consumer holds at most one socket and at most one pending timer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::state::StreamHandler;
use crate::transport::parse_stream_message;

/// Fixed alternate port tried once when the primary stream connection fails.
pub const FALLBACK_PORT: u16 = 8000;
/// Delay before the fallback connection attempt.
pub const FALLBACK_DELAY: Duration = Duration::from_millis(500);
/// Delay between reconnect attempts on the dashboard stream.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    /// Open a socket to `url`, replacing any current one.
    Connect { url: String },
    /// Close the current socket, if any.
    Close,
    /// Arm the single timer, replacing a pending one. Firing calls `on_timer`.
    Schedule { delay: Duration },
    /// Disarm the pending timer, if any.
    CancelTimer,
}

pub trait ConnectionPolicy: Send {
    fn name(&self) -> &'static str;
    fn start(&mut self) -> Vec<Action>;
    fn on_open(&mut self) -> Vec<Action>;
    fn on_error(&mut self) -> Vec<Action>;
    fn on_close(&mut self) -> Vec<Action>;
    fn on_timer(&mut self) -> Vec<Action>;
}

/// Detection-stream policy: one fallback to a fixed alternate port, no
/// reconnect on close.
#[derive(Clone, Debug)]
pub struct FallbackPolicy {
    primary_url: String,
    fallback_url: String,
    delay: Duration,
    retry_count: u32,
    on_fallback: bool,
    pending: bool,
}

impl FallbackPolicy {
    pub fn new(primary_url: String, fallback_url: String) -> Self {
        Self::with_delay(primary_url, fallback_url, FALLBACK_DELAY)
    }

    pub fn with_delay(primary_url: String, fallback_url: String, delay: Duration) -> Self {
        Self {
            primary_url,
            fallback_url,
            delay,
            retry_count: 0,
            on_fallback: false,
            pending: false,
        }
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn on_fallback(&self) -> bool {
        self.on_fallback
    }
}

impl ConnectionPolicy for FallbackPolicy {
    fn name(&self) -> &'static str {
        "detections"
    }

    fn start(&mut self) -> Vec<Action> {
        self.on_fallback = false;
        vec![Action::Connect {
            url: self.primary_url.clone(),
        }]
    }

    fn on_open(&mut self) -> Vec<Action> {
        log::info!("Detection stream connected");
        self.retry_count = 0;
        Vec::new()
    }

    fn on_error(&mut self) -> Vec<Action> {
        if self.on_fallback || self.retry_count >= 1 {
            return Vec::new();
        }
        log::info!("Retrying direct connection to {}", self.fallback_url);
        self.retry_count += 1;
        self.pending = true;
        vec![Action::Close, Action::Schedule { delay: self.delay }]
    }

    fn on_close(&mut self) -> Vec<Action> {
        log::info!("Detection stream disconnected");
        Vec::new()
    }

    fn on_timer(&mut self) -> Vec<Action> {
        if !self.pending {
            return Vec::new();
        }
        self.pending = false;
        self.on_fallback = true;
        vec![Action::Connect {
            url: self.fallback_url.clone(),
        }]
    }
}

/// Dashboard-stream policy: reconnect after a fixed delay on every close,
/// without limit.
#[derive(Clone, Debug)]
pub struct ReconnectPolicy {
    url: String,
    delay: Duration,
    pending: bool,
    attempts: u64,
}

impl ReconnectPolicy {
    pub fn new(url: String) -> Self {
        Self::with_delay(url, RECONNECT_DELAY)
    }

    pub fn with_delay(url: String, delay: Duration) -> Self {
        Self {
            url,
            delay,
            pending: false,
            attempts: 0,
        }
    }

    /// Connection attempts made so far, the first one included.
    pub fn attempts(&self) -> u64 {
        self.attempts
    }
}

impl ConnectionPolicy for ReconnectPolicy {
    fn name(&self) -> &'static str {
        "dashboard"
    }

    fn start(&mut self) -> Vec<Action> {
        log::info!("Connecting to Zentinel Core...");
        self.attempts += 1;
        vec![Action::Connect {
            url: self.url.clone(),
        }]
    }

    fn on_open(&mut self) -> Vec<Action> {
        log::info!("Connected to Zentinel Core");
        if self.pending {
            self.pending = false;
            return vec![Action::CancelTimer];
        }
        Vec::new()
    }

    fn on_error(&mut self) -> Vec<Action> {
        vec![Action::Close]
    }

    fn on_close(&mut self) -> Vec<Action> {
        log::info!(
            "Disconnected from Zentinel Core. Retrying in {}ms...",
            self.delay.as_millis()
        );
        self.pending = true;
        vec![Action::Schedule { delay: self.delay }]
    }

    fn on_timer(&mut self) -> Vec<Action> {
        if !self.pending {
            return Vec::new();
        }
        self.pending = false;
        self.start()
    }
}

/// One consumer: a policy, the view it feeds, and a teardown guard.
///
/// After `teardown` every lifecycle notification yields no actions and every
/// delivered frame is dropped without touching the view.
pub struct Subscription<P, H> {
    policy: P,
    view: Arc<Mutex<H>>,
    torn_down: bool,
}

impl<P: ConnectionPolicy, H: StreamHandler> Subscription<P, H> {
    pub fn new(policy: P, handler: H) -> Self {
        Self {
            policy,
            view: Arc::new(Mutex::new(handler)),
            torn_down: false,
        }
    }

    /// Shared handle on the view for readers.
    pub fn view(&self) -> Arc<Mutex<H>> {
        Arc::clone(&self.view)
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn start(&mut self) -> Vec<Action> {
        self.guarded(|p| p.start())
    }

    pub fn opened(&mut self) -> Vec<Action> {
        self.guarded(|p| p.on_open())
    }

    pub fn errored(&mut self) -> Vec<Action> {
        self.guarded(|p| p.on_error())
    }

    pub fn closed(&mut self) -> Vec<Action> {
        self.guarded(|p| p.on_close())
    }

    pub fn timer_fired(&mut self) -> Vec<Action> {
        self.guarded(|p| p.on_timer())
    }

    /// Decode and apply one text frame. Returns whether the view changed.
    /// Malformed frames are logged and dropped.
    pub fn deliver(&mut self, text: &str, received_at_ms: u64) -> bool {
        if self.torn_down {
            log::debug!("{}: dropping frame after teardown", self.policy.name());
            return false;
        }
        let message = match parse_stream_message(text) {
            Ok(message) => message,
            Err(e) => {
                log::warn!("{}: stream parse error: {}", self.policy.name(), e);
                return false;
            }
        };
        log::debug!("{}: {} message", self.policy.name(), message.kind());
        let mut view = self.view.lock().unwrap_or_else(|p| p.into_inner());
        view.apply(message, received_at_ms)
    }

    /// Release the socket and the timer. Idempotent.
    pub fn teardown(&mut self) -> Vec<Action> {
        if self.torn_down {
            return Vec::new();
        }
        self.torn_down = true;
        vec![Action::Close, Action::CancelTimer]
    }

    fn guarded(&mut self, f: impl FnOnce(&mut P) -> Vec<Action>) -> Vec<Action> {
        if self.torn_down {
            return Vec::new();
        }
        f(&mut self.policy)
    }
}
