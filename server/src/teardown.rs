//! Ordered teardown of session resources.
//!
//! Resources register a callback as they are acquired; disposal runs the
//! callbacks exactly once, in reverse-acquisition order. This keeps release
//! deterministic even when the session died half-initialized.

type Teardown = Box<dyn FnOnce() + Send>;

/// Collects teardown callbacks for one session.
#[derive(Default)]
pub struct Disposer {
    callbacks: Vec<(&'static str, Teardown)>,
    disposed: bool,
}

impl Disposer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resource acquired after everything already registered.
    /// Registering on an already-disposed collection releases immediately.
    pub fn push(&mut self, label: &'static str, callback: impl FnOnce() + Send + 'static) {
        if self.disposed {
            tracing::debug!("disposer already ran; releasing {label} immediately");
            callback();
            return;
        }
        self.callbacks.push((label, Box::new(callback)));
    }

    /// Run all callbacks, newest first. Safe to call more than once; later
    /// calls do nothing.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        while let Some((label, callback)) = self.callbacks.pop() {
            tracing::debug!("releasing {label}");
            callback();
        }
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl Drop for Disposer {
    fn drop(&mut self) {
        self.dispose();
    }
}
