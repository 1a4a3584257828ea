//! The parsed LUKS header.
//!
//! LUKS1 stores everything in a fixed binary layout, LUKS2 in a small binary
//! header followed by JSON metadata. Both are parsed into the same [`Header`]
//! by a [`HeaderFormat`] implementation; the version-specific leftovers are
//! kept in [`Format`].

pub mod luks1;
pub mod luks2;

use std::{fmt::Display, io::ErrorKind};

use log::debug;

use crate::{
	cipher::CipherSpec,
	error::{LuksError, ParseError},
	hash::Hash,
	kdf::Kdf,
	source::ByteSource,
};

/// The magic value at the start of every LUKS1 and (primary) LUKS2 header.
pub const LUKS_MAGIC: &[u8; 6] = b"LUKS\xba\xbe";
/// LUKS1 offsets and key material are counted in sectors of this size.
pub const LUKS_SECTOR_SIZE: u64 = 512;
/// The largest master key any registered cipher accepts.
pub const MAX_KEY_SIZE: usize = 64;

/// A way of decoding a LUKS header of one version into a [`Header`].
pub trait HeaderFormat {
	/// The version number stored right after the magic value.
	const VERSION: u16;

	/// Parses the header at the start of `source`. `device_size` bounds every
	/// offset found in the header.
	fn parse<S: ByteSource + ?Sized>(source: &mut S, device_size: u64)
		-> Result<Header, LuksError>;
}

/// Version-specific header data that has no place in the common model.
#[derive(Debug, Clone)]
pub enum Format {
	Luks1,
	Luks2(Box<luks2::Luks2Metadata>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
	Enabled,
	Disabled,
}

/// The priority of a [`KeySlot`]. LUKS1 slots are all `Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
	/// The slot should be used only if explicitly stated.
	Ignore,
	/// Normal priority keyslot.
	Normal,
	/// Tried before normal priority keyslots.
	High,
}

/// The size of the encrypted payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSize {
	/// The rest of the device after the payload offset.
	Dynamic,
	/// The size in bytes.
	Fixed(u64),
}

/// PBKDF2 digest of the master key, used to recognize the right key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDigest {
	pub hash: Hash,
	pub salt: Vec<u8>,
	pub iterations: u32,
	pub digest: Vec<u8>,
}

/// One independently password-protected copy of the master key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySlot {
	pub index: usize,
	pub state: SlotState,
	pub priority: Priority,
	pub kdf: Kdf,
	pub salt: Vec<u8>,
	/// Offset of the key material from the start of the header, in bytes.
	pub key_material_offset: u64,
	/// Size of the area reserved for the key material, in bytes.
	pub key_material_size: u64,
	/// Anti-forensic split factor.
	pub stripes: u32,
	pub af_hash: Hash,
	/// The cipher the key material is encrypted with.
	pub encryption: CipherSpec,
	/// Length of the key derived from the password.
	pub area_key_size: usize,
	/// Length of the key stored in the slot.
	pub key_size: usize,
}

impl KeySlot {
	pub fn is_enabled(&self) -> bool {
		self.state == SlotState::Enabled
	}

	/// Length of the anti-forensically split key, rounded up to whole sectors.
	pub fn split_key_len(&self) -> Option<u64> {
		let len = (self.key_size as u64).checked_mul(self.stripes as u64)?;
		let sectors = len.checked_add(LUKS_SECTOR_SIZE - 1)? / LUKS_SECTOR_SIZE;
		sectors.checked_mul(LUKS_SECTOR_SIZE)
	}
}

/// A parsed LUKS header of either version.
#[derive(Debug, Clone)]
pub struct Header {
	pub format: Format,
	pub cipher: CipherSpec,
	/// The hash algorithm of the master key digest.
	pub hash: Hash,
	/// Offset of the encrypted payload from the start of the header, in bytes.
	pub payload_offset: u64,
	pub payload_size: PayloadSize,
	/// The encryption sector size of the payload.
	pub sector_size: u64,
	/// Added to every payload IV sector number.
	pub iv_tweak: u64,
	/// The master key size in bytes.
	pub key_size: usize,
	pub digest: KeyDigest,
	pub uuid: String,
	pub key_slots: Vec<KeySlot>,
}

impl Header {
	/// Reads the header at the start of `source`, choosing the parser by the
	/// version number after the magic value.
	pub fn read_from<S: ByteSource + ?Sized>(source: &mut S) -> Result<Self, LuksError> {
		let device_size = source.size()?;
		let mut prefix = [0; 8];
		read_header_bytes(source, 0, &mut prefix, "header magic")?;
		if &prefix[..6] != LUKS_MAGIC {
			return Err(ParseError::InvalidHeaderMagic.into());
		}
		let version = u16::from_be_bytes([prefix[6], prefix[7]]);
		debug!("found LUKS{} header, device size {}", version, device_size);

		match version {
			luks1::Luks1::VERSION => luks1::Luks1::parse(source, device_size),
			luks2::Luks2::VERSION => luks2::Luks2::parse(source, device_size),
			v => Err(ParseError::InvalidHeaderVersion(v).into()),
		}
	}

	pub fn version(&self) -> u16 {
		match self.format {
			Format::Luks1 => luks1::Luks1::VERSION,
			Format::Luks2(_) => luks2::Luks2::VERSION,
		}
	}

	pub fn enabled_key_slots(&self) -> impl Iterator<Item = &KeySlot> {
		self.key_slots.iter().filter(|ks| ks.is_enabled())
	}

	/// The enabled slots in the order they are tried: high priority first,
	/// then normal, each in index order. Slots marked `Ignore` are left out.
	pub fn unlock_order(&self) -> Vec<&KeySlot> {
		let mut slots: Vec<&KeySlot> = self
			.enabled_key_slots()
			.filter(|ks| ks.priority != Priority::Ignore)
			.collect();
		// stable, so equal priorities keep their index order
		slots.sort_by(|a, b| b.priority.cmp(&a.priority));
		slots
	}

	/// The size of the decrypted payload on a device of `device_size` bytes,
	/// rounded down to whole encryption sectors.
	pub fn payload_len(&self, device_size: u64) -> u64 {
		let len = match self.payload_size {
			PayloadSize::Fixed(size) => size,
			PayloadSize::Dynamic => device_size.saturating_sub(self.payload_offset),
		};
		len - len % self.sector_size
	}
}

impl Display for Header {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		writeln!(f, "LUKS header {{")?;
		writeln!(f, "\tversion: {}", self.version())?;
		writeln!(f, "\tcipher: {}", self.cipher.cipher_name)?;
		writeln!(f, "\tcipher mode: {}", self.cipher.cipher_mode)?;
		writeln!(f, "\thash: {}", self.hash)?;
		writeln!(f, "\tpayload offset: {}", self.payload_offset)?;
		if let PayloadSize::Fixed(size) = self.payload_size {
			writeln!(f, "\tpayload size: {}", size)?;
		}
		writeln!(f, "\tsector size: {}", self.sector_size)?;
		writeln!(f, "\tkey size: {} bits", self.key_size * 8)?;
		writeln!(f, "\tuuid: {}", self.uuid)?;
		if let Format::Luks2(meta) = &self.format {
			writeln!(f, "\tlabel: {}", meta.label.as_deref().unwrap_or("<no label>"))?;
			writeln!(
				f,
				"\tsubsystem: {}",
				meta.subsystem.as_deref().unwrap_or("<no subsystem label>")
			)?;
			writeln!(f, "\tsequence id: {}", meta.seqid)?;
		}
		writeln!(
			f,
			"\tkey slots: {} of {} enabled",
			self.enabled_key_slots().count(),
			self.key_slots.len()
		)?;
		for ks in self.enabled_key_slots() {
			write!(f, "\t\tslot {}: ", ks.index)?;
			match &ks.kdf {
				Kdf::Pbkdf2 { hash, iterations } => {
					write!(f, "pbkdf2 {} with {} iterations", hash, iterations)?
				}
				Kdf::Argon2 {
					variant,
					time,
					memory,
					cpus,
				} => write!(
					f,
					"{:?} with time {}, memory {} KiB, {} cpus",
					variant, time, memory, cpus
				)?,
			}
			writeln!(f, ", {} stripes", ks.stripes)?;
		}
		write!(f, "}}")
	}
}

/// Reads part of a header, reporting a source that ends early as truncated.
pub(crate) fn read_header_bytes<S: ByteSource + ?Sized>(
	source: &mut S,
	offset: u64,
	buf: &mut [u8],
	what: &'static str,
) -> Result<(), LuksError> {
	match source.read_exact_at(offset, buf) {
		Ok(()) => Ok(()),
		Err(e) if e.kind() == ErrorKind::UnexpectedEof => Err(ParseError::Truncated(what).into()),
		Err(e) => Err(e.into()),
	}
}

/// Converts a NUL-padded ASCII field into a string, `None` if it is empty.
pub(crate) fn ascii_cstr_to_string(
	field: &'static str,
	bytes: &[u8],
) -> Result<Option<String>, ParseError> {
	let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
	let s = &bytes[..end];
	if !s.is_ascii() {
		return Err(ParseError::InvalidString { field });
	}
	if s.is_empty() {
		Ok(None)
	} else {
		Ok(Some(String::from_utf8_lossy(s).into_owned()))
	}
}

/// Checks that `length` bytes at `offset` lie within the device.
pub(crate) fn check_range(
	what: &'static str,
	offset: u64,
	length: u64,
	device_size: u64,
) -> Result<(), ParseError> {
	let end = offset.checked_add(length).ok_or(ParseError::Overflow(what))?;
	if end > device_size {
		return Err(ParseError::OutOfBounds {
			what,
			offset,
			length,
			device_size,
		});
	}
	Ok(())
}

pub(crate) fn check_digest(digest: &KeyDigest) -> Result<(), ParseError> {
	if digest.digest.is_empty() {
		return Err(ParseError::InvalidDigest("empty digest"));
	}
	if digest.salt.is_empty() {
		return Err(ParseError::InvalidDigest("empty salt"));
	}
	if digest.iterations == 0 {
		return Err(ParseError::InvalidDigest("zero iterations"));
	}
	Ok(())
}

pub(crate) fn check_key_size(key_size: usize) -> Result<(), ParseError> {
	if key_size == 0 || key_size > MAX_KEY_SIZE {
		return Err(ParseError::InvalidKeySize(key_size));
	}
	Ok(())
}
