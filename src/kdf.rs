//! Password-based key derivation.
//!
//! PBKDF2 is implemented on top of [`hmac`] instead of calling into the
//! `pbkdf2` crate so the abort signal can be polled between HMAC rounds: with
//! iteration counts in the hundreds of thousands, cancellation latency is one
//! round instead of the whole derivation.

use hmac::{
	digest::{KeyInit, Mac, OutputSizeUser},
	Hmac,
};
use zeroize::Zeroize;

use crate::{
	abort::AbortSignal,
	error::LuksError,
	hash::{with_hash, Hash},
};

/// The key derivation function of a key slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Kdf {
	Pbkdf2 {
		/// The hash algorithm for the HMAC.
		hash: Hash,
		/// The PBKDF2 iterations count.
		iterations: u32,
	},
	Argon2 {
		variant: Argon2Variant,
		/// The time cost (in fact the iterations).
		time: u32,
		/// The memory cost in kilobytes.
		memory: u32,
		/// The number of lanes.
		cpus: u32,
	},
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Argon2Variant {
	Argon2i,
	Argon2id,
}

impl Kdf {
	/// Fills `out` with key material derived from `password` and `salt`.
	pub fn derive(
		&self,
		password: &[u8],
		salt: &[u8],
		out: &mut [u8],
		abort: &AbortSignal,
	) -> Result<(), LuksError> {
		match self {
			Kdf::Pbkdf2 { hash, iterations } => {
				pbkdf2_hmac(hash, password, salt, *iterations, out, abort)
			}
			Kdf::Argon2 {
				variant,
				time,
				memory,
				cpus,
			} => {
				abort.check()?;
				let params = argon2::Params::new(*memory, *time, *cpus, Some(out.len()))?;
				let algorithm = match variant {
					Argon2Variant::Argon2i => argon2::Algorithm::Argon2i,
					Argon2Variant::Argon2id => argon2::Algorithm::Argon2id,
				};
				let argon = argon2::Argon2::new(algorithm, argon2::Version::V0x13, params);
				argon.hash_password_into(password, salt, out)?;
				abort.check()
			}
		}
	}
}

/// PBKDF2 with HMAC over the hash named by `hash`.
pub fn pbkdf2_hmac(
	hash: &Hash,
	password: &[u8],
	salt: &[u8],
	iterations: u32,
	out: &mut [u8],
	abort: &AbortSignal,
) -> Result<(), LuksError> {
	with_hash!(hash, H => pbkdf2::<Hmac<H>>(password, salt, iterations, out, abort))
}

/// PBKDF2 (RFC 8018, section 5.2) over an arbitrary pseudo-random function.
pub fn pbkdf2<P>(
	password: &[u8],
	salt: &[u8],
	iterations: u32,
	out: &mut [u8],
	abort: &AbortSignal,
) -> Result<(), LuksError>
where
	P: Mac + KeyInit + Clone,
{
	if iterations == 0 {
		return Err(LuksError::InvalidArgument("PBKDF2 iteration count must not be zero"));
	}
	let prf = <P as KeyInit>::new_from_slice(password)
		.map_err(|_| LuksError::InvalidArgument("password length rejected by the PRF"))?;
	let block_len = <P as OutputSizeUser>::output_size();

	for (i, chunk) in out.chunks_mut(block_len).enumerate() {
		let block_index = u32::try_from(i + 1)
			.map_err(|_| LuksError::InvalidArgument("PBKDF2 output too long"))?;

		let mut mac = prf.clone();
		mac.update(salt);
		mac.update(&block_index.to_be_bytes());
		let mut u = mac.finalize().into_bytes();
		let mut t = u.clone();

		for _ in 1..iterations {
			abort.check()?;
			let mut mac = prf.clone();
			mac.update(&u);
			u = mac.finalize().into_bytes();
			t.iter_mut().zip(u.iter()).for_each(|(t, u)| *t ^= u);
		}

		chunk.copy_from_slice(&t[..chunk.len()]);
		u.as_mut_slice().zeroize();
		t.as_mut_slice().zeroize();
	}

	Ok(())
}
