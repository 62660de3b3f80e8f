//! In-process control surface for a running loop
//!
//! A ControlHandle is a cheap clone shared with whoever needs to steer the
//! loop (signal handlers, CLI threads). The controller only honors requests
//! at iteration boundaries, so every request here is cooperative.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
struct Inner {
    stop: AtomicBool,
    pause: AtomicBool,
    stop_reason: std::sync::Mutex<Option<String>>,
}

/// Cloneable handle for pausing, resuming, and stopping a loop
#[derive(Debug, Clone, Default)]
pub struct ControlHandle {
    inner: Arc<Inner>,
}

impl ControlHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the loop to stop at the next iteration boundary
    pub fn request_stop(&self, reason: impl Into<String>) {
        if let Ok(mut slot) = self.inner.stop_reason.lock() {
            slot.get_or_insert(reason.into());
        }
        self.inner.stop.store(true, Ordering::SeqCst);
    }

    /// Ask the loop to pause at the next iteration boundary
    pub fn request_pause(&self) {
        self.inner.pause.store(true, Ordering::SeqCst);
    }

    /// Clear a pending pause so the loop resumes
    pub fn request_resume(&self) {
        self.inner.pause.store(false, Ordering::SeqCst);
    }

    /// Pending stop reason, if a stop was requested
    pub fn stop_requested(&self) -> Option<String> {
        if !self.inner.stop.load(Ordering::SeqCst) {
            return None;
        }
        let reason = self
            .inner
            .stop_reason
            .lock()
            .ok()
            .and_then(|slot| slot.clone());
        Some(reason.unwrap_or_else(|| "stop requested".to_string()))
    }

    pub fn pause_requested(&self) -> bool {
        self.inner.pause.load(Ordering::SeqCst)
    }
}
