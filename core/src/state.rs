use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, OnceLock, PoisonError};

/// Process-wide "does the first administrator still need to be created?" flag.
///
/// The underlying existence check runs at most once successfully, even when
/// many requests race on first use: readers take the fast path through the
/// `OnceLock`, and the init mutex is only held while the check runs.
/// Once cleared by [`mark_satisfied`](Self::mark_satisfied) the flag never
/// becomes true again.
#[derive(Debug, Default)]
pub struct BootstrapState {
    needed: OnceLock<AtomicBool>,
    init: Mutex<()>,
}

impl BootstrapState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            needed: OnceLock::new(),
            init: Mutex::new(()),
        }
    }

    /// Return the cached flag, running `admin_exists` on first use.
    ///
    /// A failed check caches nothing; the next caller retries it.
    pub fn needs_bootstrap<E>(
        &self,
        admin_exists: impl FnOnce() -> Result<bool, E>,
    ) -> Result<bool, E> {
        if let Some(flag) = self.needed.get() {
            return Ok(flag.load(Ordering::Acquire));
        }

        let _guard = self.init.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(flag) = self.needed.get() {
            return Ok(flag.load(Ordering::Acquire));
        }

        let needed = !admin_exists()?;
        let flag = self.needed.get_or_init(|| AtomicBool::new(needed));
        Ok(flag.load(Ordering::Acquire))
    }

    pub fn mark_satisfied(&self) {
        self.needed
            .get_or_init(|| AtomicBool::new(false))
            .store(false, Ordering::Release);
    }

    #[cfg(test)]
    fn is_initialized(&self) -> bool {
        self.needed.get().is_some()
    }
}
