/// Forced re-authentication hook
///
/// The gateway never navigates anywhere itself. When a session becomes
/// unrecoverable it fires an injected [`AuthExpiredHandler`]; hosts decide what
/// "go to the login page" means for them.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub trait AuthExpiredHandler: Send + Sync {
    fn on_auth_expired(&self);
}

impl<F> AuthExpiredHandler for F
where
    F: Fn() + Send + Sync,
{
    fn on_auth_expired(&self) {
        self()
    }
}

/// Handler that does nothing, for hosts that only care about the returned error
pub struct IgnoreExpiry;

impl AuthExpiredHandler for IgnoreExpiry {
    fn on_auth_expired(&self) {}
}

/// Fires the handler at most once per authenticated session.
///
/// Armed on construction and whenever fresh credentials are stored; disarmed by
/// the first `fire`. Concurrent failure paths therefore produce a single
/// notification.
pub struct ExpiryLatch {
    armed: AtomicBool,
    handler: Arc<dyn AuthExpiredHandler>,
}

impl ExpiryLatch {
    pub fn new(handler: Arc<dyn AuthExpiredHandler>) -> Self {
        Self {
            armed: AtomicBool::new(true),
            handler,
        }
    }

    /// Returns true if this call invoked the handler
    pub fn fire(&self) -> bool {
        if self.armed.swap(false, Ordering::AcqRel) {
            self.handler.on_auth_expired();
            true
        } else {
            false
        }
    }

    pub fn rearm(&self) {
        self.armed.store(true, Ordering::Release);
    }

    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }
}
