//! Recovering the master key from password-protected key slots.

use std::io;

use log::{debug, warn};
use zeroize::Zeroizing;

use crate::{
	abort::AbortSignal,
	af,
	cipher::SectorCipher,
	error::{ErrorKind, LuksError},
	header::{Header, KeySlot, LUKS_SECTOR_SIZE},
	kdf::Kdf,
	master_key::MasterKey,
	source::ByteSource,
};

fn invalid(slot: &KeySlot, reason: &'static str) -> LuksError {
	LuksError::InvalidKeySlot {
		index: slot.index,
		reason,
	}
}

/// Decrypts the key material of `slot` with `password` and merges it into a
/// candidate master key.
///
/// A wrong password is not an error here: it yields a candidate that fails
/// verification.
pub fn decrypt_key_slot<S: ByteSource + ?Sized>(
	source: &mut S,
	slot: &KeySlot,
	password: &[u8],
	abort: &AbortSignal,
) -> Result<Zeroizing<Vec<u8>>, LuksError> {
	if !slot.is_enabled() {
		return Err(invalid(slot, "key slot is disabled"));
	}
	if let Kdf::Pbkdf2 { iterations: 0, .. } = slot.kdf {
		return Err(invalid(slot, "zero PBKDF2 iterations"));
	}
	if slot.salt.is_empty() {
		return Err(invalid(slot, "empty salt"));
	}
	if slot.stripes == 0 {
		return Err(invalid(slot, "zero stripes"));
	}
	if slot.key_size == 0 || slot.area_key_size == 0 {
		return Err(invalid(slot, "zero key size"));
	}
	slot.af_hash.ensure_supported()?;

	let material_len = slot
		.split_key_len()
		.ok_or_else(|| invalid(slot, "key material size overflows"))?;
	if material_len > slot.key_material_size {
		return Err(invalid(slot, "key material exceeds its area"));
	}

	let mut split_key = Zeroizing::new(vec![0; slot.area_key_size]);
	slot.kdf.derive(password, &slot.salt, &mut split_key, abort)?;
	let cipher = SectorCipher::new(&slot.encryption, &split_key)?;

	let mut material = Zeroizing::new(vec![0; material_len as usize]);
	match source.read_exact_at(slot.key_material_offset, &mut material) {
		Ok(()) => {}
		Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
			return Err(invalid(slot, "key material is truncated"))
		}
		Err(e) => return Err(e.into()),
	}
	cipher.decrypt_area(&mut material, LUKS_SECTOR_SIZE as usize, 0);

	let key = af::merge_with_hash(
		&slot.af_hash,
		&material,
		slot.key_size,
		slot.stripes as usize,
		abort,
	)?;
	Ok(Zeroizing::new(key))
}

/// Tries every usable key slot of `header` with `password` until one yields
/// the master key.
///
/// Slots using an unsupported algorithm are skipped; any other error stops
/// the search. Fails with [`LuksError::UnlockFailed`] once all slots were
/// tried.
pub fn unlock_with_password<S: ByteSource + ?Sized>(
	source: &mut S,
	header: &Header,
	password: &[u8],
	abort: &AbortSignal,
) -> Result<MasterKey, LuksError> {
	for slot in header.unlock_order() {
		abort.check()?;
		debug!("trying key slot {}", slot.index);
		let candidate = match decrypt_key_slot(source, slot, password, abort) {
			Ok(candidate) => candidate,
			Err(e) if e.kind() == ErrorKind::Unsupported => {
				warn!("skipping key slot {}: {}", slot.index, e);
				continue;
			}
			Err(e) => return Err(e),
		};
		if let Some(key) = MasterKey::verify(candidate, &header.digest, header.key_size, abort)? {
			debug!("key slot {} unlocked the volume", slot.index);
			return Ok(key);
		}
		debug!("key slot {} did not match", slot.index);
	}
	Err(LuksError::UnlockFailed)
}
