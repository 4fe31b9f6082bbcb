//! Cooperative cancellation for the capture loops.
//!
//! The interrupt signal is latched into an atomic flag which every suspension point
//! polls. Nothing is torn down from the signal handler itself; the session notices the
//! flag, asks ffmpeg to stop, and lets in-flight transcription finish.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A shared "please stop" flag.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag {
    inner: Arc<AtomicBool>,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch the flag. Idempotent.
    pub fn cancel(&self) {
        self.inner.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.load(Ordering::SeqCst)
    }

    /// Arrange for SIGINT/SIGTERM to latch this flag.
    ///
    /// The first signal only sets the flag; signal-hook re-raises default behavior on a
    /// repeated signal, so a second Ctrl-C still kills a wedged process.
    #[cfg(unix)]
    pub fn register_signals(&self) -> std::io::Result<()> {
        use signal_hook::consts::{SIGINT, SIGTERM};

        signal_hook::flag::register_conditional_default(SIGINT, Arc::clone(&self.inner))?;
        signal_hook::flag::register(SIGINT, Arc::clone(&self.inner))?;
        signal_hook::flag::register(SIGTERM, Arc::clone(&self.inner))?;
        Ok(())
    }
}
