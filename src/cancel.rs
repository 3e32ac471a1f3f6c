// ABOUTME: Run-level cancellation shared by all workers
// ABOUTME: Combines an explicit abort flag with an optional deadline

use crate::{Error, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        CancelToken {
            flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Cancel on Ctrl-C so workers stop before their next request and the
    /// finished pages are kept. A second Ctrl-C exits immediately.
    pub fn cancel_on_interrupt(&self) {
        let token = self.clone();
        if let Err(e) = ctrlc::set_handler(move || {
            if token.interrupt() {
                eprintln!("interrupted; finishing in-flight requests (Ctrl-C again to quit now)");
            } else {
                std::process::exit(Error::Cancelled.exit_code());
            }
        }) {
            warn!("could not install Ctrl-C handler: {}", e);
        }
    }

    /// Returns false when the token was already cancelled by an earlier interrupt.
    fn interrupt(&self) -> bool {
        !self.flag.swap(true, Ordering::SeqCst)
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Called before issuing any new request.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_is_shared_between_clones() {
        let token = CancelToken::new();
        let worker = token.clone();
        assert!(worker.check().is_ok());
        token.cancel();
        assert!(matches!(worker.check(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_first_interrupt_cancels_second_escalates() {
        let token = CancelToken::with_timeout(Duration::from_secs(3600));
        let worker = token.clone();
        assert!(token.interrupt());
        assert!(matches!(worker.check(), Err(Error::Cancelled)));
        assert!(!token.interrupt());
    }

    #[test]
    fn test_deadline_expires() {
        let token = CancelToken::with_timeout(Duration::ZERO);
        assert!(token.is_cancelled());
        let later = CancelToken::with_timeout(Duration::from_secs(3600));
        assert!(!later.is_cancelled());
    }
}
