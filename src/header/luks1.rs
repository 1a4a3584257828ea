//! The fixed 592-byte LUKS1 header.

use bincode::Decode;
use log::{debug, warn};

use super::{
	ascii_cstr_to_string, check_digest, check_key_size, check_range, read_header_bytes, Format,
	Header, HeaderFormat, KeyDigest, KeySlot, PayloadSize, Priority, SlotState, LUKS_SECTOR_SIZE,
};
use crate::{
	cipher::CipherSpec,
	error::{LuksError, ParseError},
	hash::Hash,
	kdf::Kdf,
	source::ByteSource,
};

/// Size of the binary LUKS1 header in bytes.
pub const LUKS1_HEADER_SIZE: usize = 592;
/// Number of key slots in a LUKS1 header.
pub const LUKS1_NUM_KEYS: usize = 8;
/// Size of the master key digest.
pub const LUKS1_DIGEST_SIZE: usize = 20;

/// `active` value of an enabled key slot.
pub const LUKS_KEY_ENABLED: u32 = 0x00AC_71F3;
/// `active` value of a disabled key slot.
pub const LUKS_KEY_DISABLED: u32 = 0x0000_DEAD;

/// A LUKS1 key slot as stored on disk.
#[derive(Debug, Clone, Copy, Decode, PartialEq, Eq)]
pub struct Luks1KeySlotRaw {
	/// [`LUKS_KEY_ENABLED`] or [`LUKS_KEY_DISABLED`]
	pub active: u32,
	pub iterations: u32,
	pub salt: [u8; 32],
	/// start of the key material, in 512-byte sectors
	pub key_material_offset: u32,
	pub stripes: u32,
}

/// A LUKS1 header as stored on disk, all integers big-endian.
#[derive(Debug, Clone, Decode, PartialEq, Eq)]
pub struct Luks1HeaderRaw {
	/// must be "LUKS\xba\xbe"
	pub magic: [u8; 6],
	/// Version 1
	pub version: u16,
	pub cipher_name: [u8; 32],
	pub cipher_mode: [u8; 32],
	pub hash_spec: [u8; 32],
	/// start of the payload, in 512-byte sectors
	pub payload_offset: u32,
	/// master key length in bytes
	pub key_bytes: u32,
	pub mk_digest: [u8; LUKS1_DIGEST_SIZE],
	pub mk_digest_salt: [u8; 32],
	pub mk_digest_iterations: u32,
	pub uuid: [u8; 40],
	pub key_slots: [Luks1KeySlotRaw; LUKS1_NUM_KEYS],
}

impl Luks1HeaderRaw {
	pub fn from_slice(bytes: &[u8]) -> Result<Self, ParseError> {
		let config = bincode::config::legacy()
			.with_big_endian()
			.with_fixed_int_encoding();
		let (h, _): (Self, usize) = bincode::decode_from_slice(bytes, config)?;
		Ok(h)
	}
}

/// Parser for LUKS1 headers.
pub struct Luks1;

impl HeaderFormat for Luks1 {
	const VERSION: u16 = 1;

	fn parse<S: ByteSource + ?Sized>(
		source: &mut S,
		device_size: u64,
	) -> Result<Header, LuksError> {
		let mut buf = [0; LUKS1_HEADER_SIZE];
		read_header_bytes(source, 0, &mut buf, "LUKS1 header")?;
		let raw = Luks1HeaderRaw::from_slice(&buf)?;
		Ok(convert(&raw, device_size)?)
	}
}

fn convert(raw: &Luks1HeaderRaw, device_size: u64) -> Result<Header, ParseError> {
	if &raw.magic != super::LUKS_MAGIC {
		return Err(ParseError::InvalidHeaderMagic);
	}
	if raw.version != Luks1::VERSION {
		return Err(ParseError::InvalidHeaderVersion(raw.version));
	}

	let cipher_name = ascii_cstr_to_string("cipher name", &raw.cipher_name)?
		.ok_or(ParseError::InvalidString { field: "cipher name" })?;
	let cipher_mode = ascii_cstr_to_string("cipher mode", &raw.cipher_mode)?
		.ok_or(ParseError::InvalidString { field: "cipher mode" })?;
	let hash: Hash = ascii_cstr_to_string("hash spec", &raw.hash_spec)?
		.ok_or(ParseError::InvalidString { field: "hash spec" })?
		.parse()
		.unwrap_or_else(|never| match never {});
	let uuid = ascii_cstr_to_string("uuid", &raw.uuid)?.unwrap_or_default();

	let key_size = raw.key_bytes as usize;
	check_key_size(key_size)?;

	let payload_offset = raw.payload_offset as u64 * LUKS_SECTOR_SIZE;
	check_range("payload offset", payload_offset, 0, device_size)?;

	let cipher = CipherSpec::from_name_and_mode(&cipher_name, &cipher_mode);

	let mut key_slots = Vec::with_capacity(LUKS1_NUM_KEYS);
	for (index, slot) in raw.key_slots.iter().enumerate() {
		let state = match slot.active {
			LUKS_KEY_ENABLED => SlotState::Enabled,
			LUKS_KEY_DISABLED => SlotState::Disabled,
			state => return Err(ParseError::InvalidKeySlotState { index, state }),
		};
		let mut ks = KeySlot {
			index,
			state,
			priority: Priority::Normal,
			kdf: Kdf::Pbkdf2 {
				hash: hash.clone(),
				iterations: slot.iterations,
			},
			salt: slot.salt.to_vec(),
			key_material_offset: slot.key_material_offset as u64 * LUKS_SECTOR_SIZE,
			key_material_size: 0,
			stripes: slot.stripes,
			af_hash: hash.clone(),
			encryption: cipher.clone(),
			area_key_size: key_size,
			key_size,
		};
		ks.key_material_size = ks
			.split_key_len()
			.ok_or(ParseError::Overflow("key material size"))?;
		if ks.is_enabled() {
			check_range(
				"key material",
				ks.key_material_offset,
				ks.key_material_size,
				device_size,
			)?;
			if ks.key_material_offset < LUKS1_HEADER_SIZE as u64 {
				warn!("key slot {} overlaps the LUKS1 header", index);
			}
		}
		key_slots.push(ks);
	}

	debug!(
		"LUKS1 header: {}-{} with {} byte key, payload at {}",
		cipher_name, cipher_mode, key_size, payload_offset
	);

	let digest = KeyDigest {
		hash: hash.clone(),
		salt: raw.mk_digest_salt.to_vec(),
		iterations: raw.mk_digest_iterations,
		digest: raw.mk_digest.to_vec(),
	};
	check_digest(&digest)?;

	Ok(Header {
		format: Format::Luks1,
		cipher,
		hash,
		payload_offset,
		payload_size: PayloadSize::Dynamic,
		sector_size: LUKS_SECTOR_SIZE,
		iv_tweak: 0,
		key_size,
		digest,
		uuid,
		key_slots,
	})
}
