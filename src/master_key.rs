use secrecy::{ExposeSecret, Secret};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

use crate::{abort::AbortSignal, error::LuksError, header::KeyDigest, kdf::pbkdf2_hmac};

/// The volume master key, recovered from a key slot or supplied by the caller.
///
/// The bytes are zeroized on drop and never printed.
pub struct MasterKey(Secret<Vec<u8>>);

impl MasterKey {
	pub fn new(key: Vec<u8>) -> Self {
		Self(Secret::new(key))
	}

	pub fn len(&self) -> usize {
		self.0.expose_secret().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub(crate) fn expose(&self) -> &[u8] {
		self.0.expose_secret()
	}

	/// Accepts `candidate` as the master key if it has `key_size` bytes and
	/// its PBKDF2 digest equals the one stored in the header.
	pub fn verify(
		candidate: Zeroizing<Vec<u8>>,
		digest: &KeyDigest,
		key_size: usize,
		abort: &AbortSignal,
	) -> Result<Option<Self>, LuksError> {
		if candidate.len() != key_size {
			return Ok(None);
		}
		if matches_digest(&candidate, digest, abort)? {
			Ok(Some(Self::new(candidate.to_vec())))
		} else {
			Ok(None)
		}
	}
}

impl std::fmt::Debug for MasterKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "MasterKey([REDACTED; {}])", self.len())
	}
}

/// Computes the PBKDF2 digest of `candidate` and compares it in constant time.
pub fn matches_digest(
	candidate: &[u8],
	digest: &KeyDigest,
	abort: &AbortSignal,
) -> Result<bool, LuksError> {
	let mut computed = Zeroizing::new(vec![0; digest.digest.len()]);
	pbkdf2_hmac(
		&digest.hash,
		candidate,
		&digest.salt,
		digest.iterations,
		&mut computed,
		abort,
	)?;
	Ok(bool::from(computed.ct_eq(&digest.digest)))
}
