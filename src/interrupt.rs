//! Operator interrupts
//!
//! An [`Interrupt`] is a shared flag. The engine polls it while a child is
//! running; the batch driver checks it between cases. The binary wires it
//! to SIGINT with [`Interrupt::install_sigint`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

static SIGINT_FLAG: OnceLock<Arc<AtomicBool>> = OnceLock::new();

/// Cloneable interrupt flag. All clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    /// A flag nobody triggers except through [`Interrupt::trigger`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the process-wide flag, installing a SIGINT handler that sets
    /// it on first call. Later calls return the same flag.
    pub fn install_sigint() -> Self {
        let mut installed = false;
        let flag = SIGINT_FLAG
            .get_or_init(|| {
                installed = true;
                Arc::new(AtomicBool::new(false))
            })
            .clone();

        if installed {
            // SAFETY: the handler only performs an atomic store on a flag
            // that is initialized before the handler is registered.
            unsafe {
                libc::signal(libc::SIGINT, on_sigint as extern "C" fn(libc::c_int) as libc::sighandler_t);
            }
            tracing::debug!("SIGINT handler installed");
        }

        Self { flag }
    }

    /// Request an interrupt
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Consume a pending interrupt. Returns whether one was pending.
    pub fn take(&self) -> bool {
        self.flag.swap(false, Ordering::SeqCst)
    }
}

extern "C" fn on_sigint(_signum: libc::c_int) {
    if let Some(flag) = SIGINT_FLAG.get() {
        flag.store(true, Ordering::SeqCst);
    }
}
