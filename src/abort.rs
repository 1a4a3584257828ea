use std::sync::{
	atomic::{AtomicBool, Ordering},
	Arc,
};

use crate::error::LuksError;

/// A cancellation token for long-running volume operations.
///
/// Clones share the same flag, so a clone can be handed to another thread (or
/// a Ctrl-C handler) while the volume is busy deriving keys. The engine polls
/// the flag between PBKDF2 rounds, between anti-forensic stripes and between
/// sector batches, and unwinds with [`LuksError::Cancelled`].
#[derive(Debug, Clone, Default)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
	pub fn new() -> Self {
		Self::default()
	}

	/// Requests that the current operation stops as soon as possible.
	pub fn signal(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	pub fn is_signaled(&self) -> bool {
		self.0.load(Ordering::Relaxed)
	}

	pub(crate) fn reset(&self) {
		self.0.store(false, Ordering::SeqCst);
	}

	/// Returns `Err(LuksError::Cancelled)` if the signal was raised.
	#[inline]
	pub fn check(&self) -> Result<(), LuksError> {
		if self.is_signaled() {
			Err(LuksError::Cancelled)
		} else {
			Ok(())
		}
	}
}
