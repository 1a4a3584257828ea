//! The LUKS2 header: a 4096-byte binary header followed by JSON metadata.
//!
//! The layout is described
//! [here](https://gitlab.com/cryptsetup/LUKS2-docs/blob/master/luks2_doc_wip.pdf).
//! A second copy of the header follows the first one; it is used when the
//! primary header is damaged.

use std::{collections::BTreeMap, fmt::Display, str::FromStr};

use bincode::Decode;
use log::{debug, warn};
use serde::{
	de::{self, Deserializer},
	Deserialize,
};
use sha2::Digest;

use super::{
	ascii_cstr_to_string, check_digest, check_key_size, check_range, read_header_bytes, Format,
	Header, HeaderFormat, KeyDigest, KeySlot, PayloadSize, Priority, SlotState, LUKS_MAGIC,
};
use crate::{
	cipher::CipherSpec,
	error::{ErrorKind, LuksError, ParseError},
	hash::{with_hash, Hash},
	kdf::{Argon2Variant, Kdf},
	source::ByteSource,
};

/// Magic value of the secondary header.
pub const LUKS2_MAGIC_2ND: &[u8; 6] = b"SKUL\xba\xbe";
/// Size of the binary part of a LUKS2 header.
pub const LUKS2_BIN_HEADER_SIZE: usize = 4096;
/// Byte range of the checksum in the binary header.
const CSUM_RANGE: std::ops::Range<usize> = 448..512;

/// The header sizes (binary plus JSON area) cryptsetup writes. The secondary
/// header starts right after the primary one, so these are also the offsets
/// at which a secondary header is searched.
pub const LUKS2_HEADER_SIZES: &[u64] = &[
	0x4000, 0x8000, 0x10000, 0x20000, 0x40000, 0x80000, 0x100000, 0x200000, 0x400000,
];

/// Anti-forensic stripes, the only value LUKS2 allows.
pub const LUKS2_STRIPES: u32 = 4000;

/// A LUKS2 binary header as stored on disk, all integers big-endian.
#[derive(Clone, Decode, PartialEq, Eq)]
pub struct Luks2BinHeaderRaw {
	/// must be "LUKS\xba\xbe" or "SKUL\xba\xbe"
	pub magic: [u8; 6],
	/// Version 2
	pub version: u16,
	/// header size plus JSON area in bytes
	pub hdr_size: u64,
	/// sequence ID, increased on update
	pub seqid: u64,
	/// ASCII label or empty
	pub label: [u8; 48],
	/// checksum algorithm, "sha256"
	pub csum_alg: [u8; 32],
	/// salt, unique for every header
	pub salt: [u8; 64],
	/// UUID of device
	pub uuid: [u8; 40],
	/// owner subsystem label or empty
	pub subsystem: [u8; 48],
	/// offset from device start in bytes
	pub hdr_offset: u64,
	// must be zeroed
	_padding: [u8; 184],
	/// header checksum
	pub csum: [u8; 64],
	// Padding, must be zeroed
	_padding4096: [u8; 7 * 512],
}

impl Luks2BinHeaderRaw {
	pub fn from_slice(bytes: &[u8]) -> Result<Self, ParseError> {
		let config = bincode::config::legacy()
			.with_big_endian()
			.with_fixed_int_encoding();
		let (h, _): (Self, usize) = bincode::decode_from_slice(bytes, config)?;
		Ok(h)
	}
}

// implement manually to omit always-zero padding sections
impl std::fmt::Debug for Luks2BinHeaderRaw {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Luks2BinHeaderRaw")
			.field("magic", &self.magic)
			.field("version", &self.version)
			.field("hdr_size", &self.hdr_size)
			.field("seqid", &self.seqid)
			.field("label", &self.label)
			.field("csum_alg", &self.csum_alg)
			.field("salt", &hex::encode(self.salt))
			.field("uuid", &self.uuid)
			.field("subsystem", &self.subsystem)
			.field("hdr_offset", &self.hdr_offset)
			.field("csum", &hex::encode(self.csum))
			.finish()
	}
}

/// Information on the allocated area in the binary keyslots area of a [`LuksKeyslot`].
///
/// Only the `raw` type is currently used.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LuksArea {
	Raw {
		/// The area encryption algorithm, in dm-crypt notation (e. g. "aes-xts-plain64").
		encryption: String,
		/// The area encryption key size.
		key_size: usize,
		/// The offset from the device start to the beginning of the binary area in bytes.
		#[serde(deserialize_with = "from_str")]
		offset: u64,
		/// The area size in bytes.
		#[serde(deserialize_with = "from_str")]
		size: u64,
	},
}

/// An anti-forensic splitter of a [`LuksKeyslot`].
///
/// Only the `luks1` type compatible with LUKS1 is currently used.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LuksAf {
	Luks1 {
		/// The number of stripes, for historical reasons only the 4000 value is supported.
		stripes: u32,
		/// The hash algorithm used.
		hash: Hash,
	},
}

/// Stores information on the PBKDF type and parameters of a [`LuksKeyslot`].
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LuksKdf {
	Pbkdf2 {
		/// The salt for PBKDF in base64 (binary data).
		salt: String,
		/// The hash algorithm for the PKBDF2.
		hash: Hash,
		/// The PBKDF2 iterations count.
		iterations: u32,
	},
	Argon2i {
		/// The salt for PBKDF in base64 (binary data).
		salt: String,
		/// The time cost (in fact the iterations).
		time: u32,
		/// The memory cost in kilobytes. If not available, the keyslot cannot be unlocked.
		memory: u32,
		/// The required number of threads (CPU cores number cost).
		cpus: u32,
	},
	Argon2id {
		/// The salt for PBKDF in base64 (binary data).
		salt: String,
		/// The time cost (in fact the iterations).
		time: u32,
		/// The memory cost in kilobytes. If not available, the keyslot cannot be unlocked.
		memory: u32,
		/// The required number of threads (CPU cores number cost).
		cpus: u32,
	},
}

/// The priority of a [`LuksKeyslot`], stored as a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LuksPriority {
	Ignore,
	Normal,
	High,
}

/// A keyslot contains information about stored keys: the area where the binary
/// keyslot data is located, the encryption and anti-forensic function used and
/// the password-based key derivation function with its parameters.
///
/// Only the `luks2` type is currently used.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LuksKeyslot {
	Luks2 {
		/// The size of the key stored in the slot, in bytes.
		key_size: usize,
		/// The allocated area in the binary keyslots area.
		area: LuksArea,
		/// The PBKDF type and parameters used.
		kdf: LuksKdf,
		/// The anti-forensic splitter.
		af: LuksAf,
		/// The keyslot priority (optional).
		#[serde(deserialize_with = "deserialize_priority")]
		#[serde(default)]
		priority: Option<LuksPriority>,
	},
}

/// The LUKS2 user data integrity protection type. Devices using it are
/// rejected; it is only parsed to be recognized.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LuksIntegrity {
	#[serde(rename(deserialize = "type"))]
	pub integrity_type: String,
	#[serde(default)]
	pub journal_encryption: Option<String>,
	#[serde(default)]
	pub journal_integrity: Option<String>,
}

/// The size of a [`LuksSegment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LuksSegmentSize {
	/// Signals that the size of the underlying device should be used (dynamic resize).
	Dynamic,
	/// The size in bytes.
	Fixed(u64),
}

/// A segment contains a definition of encrypted areas on the disk containing user data
/// (in LUKS1 mentioned as the user data payload). For a normal LUKS device, there is only
/// one data segment present.
///
/// Only the `crypt` type is currently used.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LuksSegment {
	Crypt {
		/// The offset from the device start to the beginning of the segment in bytes.
		#[serde(deserialize_with = "from_str")]
		offset: u64,
		/// The segment size, see [`LuksSegmentSize`].
		#[serde(deserialize_with = "deserialize_segment_size")]
		size: LuksSegmentSize,
		/// The starting offset for the Initialization Vector.
		#[serde(deserialize_with = "from_str")]
		iv_tweak: u64,
		/// The segment encryption algorithm in dm-crypt notation (e. g. "aes-xts-plain64").
		encryption: String,
		/// The sector size for the segment (512, 1024, 2048, or 4096 bytes).
		sector_size: u64,
		/// The LUKS2 user data integrity protection type (optional).
		#[serde(default)]
		integrity: Option<LuksIntegrity>,
		/// An array of strings marking the segment with additional information (optional).
		#[serde(default)]
		flags: Option<Vec<String>>,
	},
}

/// A digest is used to verify that a key decrypted from a keyslot is correct. Digests are assigned
/// to keyslots and segments. If it is not assigned to a segment, then it is a digest for an unbound
/// key. Every keyslot must have one assigned digest.
///
/// Only the `pbkdf2` type compatible with LUKS1 is used.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LuksDigest {
	Pbkdf2 {
		/// A list of keyslot numbers that are assigned to the digest.
		#[serde(deserialize_with = "vec_from_str")]
		keyslots: Vec<u8>,
		/// A list of segment numbers that are assigned to the digest.
		#[serde(deserialize_with = "vec_from_str")]
		segments: Vec<u8>,
		/// The binary salt for the digest, in base64.
		salt: String,
		/// The binary digest data, in base64.
		digest: String,
		/// The hash algorithm for PBKDF2.
		hash: Hash,
		/// The PBKDF2 iterations count.
		iterations: u32,
	},
}

/// Features a device needs from the implementation opening it.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct LuksRequirements {
	#[serde(default)]
	pub mandatory: Vec<String>,
}

/// Global attributes for the LUKS device.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LuksConfig {
	/// The JSON area size in bytes. Must match the binary header.
	#[serde(deserialize_with = "from_str")]
	pub json_size: u64,
	/// The binary keyslot area size in bytes. Must be aligned to 4096 bytes.
	#[serde(deserialize_with = "from_str")]
	pub keyslots_size: u64,
	/// An optional list of persistent flags for the device.
	#[serde(default)]
	pub flags: Option<Vec<String>>,
	/// Additional required features for the LUKS device.
	#[serde(default)]
	pub requirements: Option<LuksRequirements>,
}

/// A token is an object that can describe how to get a passphrase to unlock a particular keyslot.
/// No token types are implemented; this is only included for parsing compatibility.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LuksToken {
	#[serde(rename(deserialize = "type"))]
	pub token_type: String,
}

/// JSON metadata for the device.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct LuksJson {
	/// Objects describing encrypted keys storage areas.
	pub keyslots: BTreeMap<u8, LuksKeyslot>,
	/// Tokens can optionally include additional metadata.
	#[serde(default)]
	pub tokens: BTreeMap<u8, LuksToken>,
	/// Segments describe areas on disk that contain user encrypted data.
	pub segments: BTreeMap<u8, LuksSegment>,
	/// Digests are used to verify that keys decrypted from keyslots are correct. Uses the keys
	/// of keyslots and segments to reference them.
	pub digests: BTreeMap<u8, LuksDigest>,
	/// Persistent header configuration attributes.
	pub config: LuksConfig,
}

impl LuksJson {
	/// Parses the JSON area, which is padded with NUL bytes.
	pub fn from_slice(area: &[u8]) -> Result<Self, ParseError> {
		let end = area.iter().position(|b| *b == 0).unwrap_or(area.len());
		let j: Self = serde_json::from_slice(&area[..end])?;
		j.validate(area.len() as u64)?;
		Ok(j)
	}

	fn validate(&self, area_size: u64) -> Result<(), ParseError> {
		// check that the stripes value of all afs are 4000
		for LuksKeyslot::Luks2 { af, .. } in self.keyslots.values() {
			let LuksAf::Luks1 { stripes, .. } = af;
			if *stripes != LUKS2_STRIPES {
				return Err(ParseError::InvalidStripes(*stripes));
			}
		}
		// check that sector sizes of all segments are valid
		for LuksSegment::Crypt {
			sector_size,
			integrity,
			..
		} in self.segments.values()
		{
			if ![512, 1024, 2048, 4096].contains(sector_size) {
				return Err(ParseError::InvalidSectorSize(*sector_size));
			}
			if integrity.is_some() {
				return Err(ParseError::UnsupportedIntegrity);
			}
		}
		// check that keyslots size is aligned to 4096
		if (self.config.keyslots_size % 4096) != 0 {
			return Err(ParseError::KeyslotNotAligned);
		}
		if self.config.json_size != area_size {
			return Err(ParseError::JsonSizeMismatch {
				json_size: self.config.json_size,
				area_size,
			});
		}
		if let Some(requirement) = self
			.config
			.requirements
			.as_ref()
			.and_then(|r| r.mandatory.first())
		{
			return Err(ParseError::UnsupportedRequirement(requirement.clone()));
		}
		// check that all segments/keyslots references are valid
		for LuksDigest::Pbkdf2 {
			keyslots, segments, ..
		} in self.digests.values()
		{
			if let Some(k) = keyslots.iter().find(|k| !self.keyslots.contains_key(k)) {
				return Err(ParseError::InvalidKeyslotReference(*k));
			}
			if let Some(s) = segments.iter().find(|s| !self.segments.contains_key(s)) {
				return Err(ParseError::InvalidSegmentReference(*s));
			}
		}
		Ok(())
	}
}

/// Everything of a LUKS2 header that has no place in the common [`Header`].
#[derive(Debug, Clone)]
pub struct Luks2Metadata {
	pub label: Option<String>,
	pub subsystem: Option<String>,
	pub seqid: u64,
	pub hdr_size: u64,
	/// Where the header that was used was found; non-zero for a secondary header.
	pub header_offset: u64,
	pub checksum_algorithm: String,
	pub json: LuksJson,
}

/// Parser for LUKS2 headers.
pub struct Luks2;

impl HeaderFormat for Luks2 {
	const VERSION: u16 = 2;

	fn parse<S: ByteSource + ?Sized>(
		source: &mut S,
		device_size: u64,
	) -> Result<Header, LuksError> {
		let (bin, json) = match read_header_at(source, 0, LUKS_MAGIC) {
			Ok(h) => h,
			Err(e) if e.kind() == ErrorKind::Format => {
				warn!("primary LUKS2 header is unusable: {}", e);
				match find_secondary(source) {
					Some(h) => h,
					None => return Err(e),
				}
			}
			Err(e) => return Err(e),
		};
		convert(&bin, json, device_size)
	}
}

fn find_secondary<S: ByteSource + ?Sized>(
	source: &mut S,
) -> Option<(Luks2BinHeaderRaw, LuksJson)> {
	for &offset in LUKS2_HEADER_SIZES {
		match read_header_at(source, offset, LUKS2_MAGIC_2ND) {
			Ok(h) => {
				warn!("using secondary LUKS2 header at offset {:#x}", offset);
				return Some(h);
			}
			Err(e) => debug!("no secondary header at {:#x}: {}", offset, e),
		}
	}
	None
}

/// Reads and verifies the binary header and JSON area at `offset`.
fn read_header_at<S: ByteSource + ?Sized>(
	source: &mut S,
	offset: u64,
	magic: &[u8; 6],
) -> Result<(Luks2BinHeaderRaw, LuksJson), LuksError> {
	let mut bin = vec![0; LUKS2_BIN_HEADER_SIZE];
	read_header_bytes(source, offset, &mut bin, "LUKS2 binary header")?;
	let h = Luks2BinHeaderRaw::from_slice(&bin)?;

	if &h.magic != magic {
		return Err(ParseError::InvalidHeaderMagic.into());
	}
	if h.version != Luks2::VERSION {
		return Err(ParseError::InvalidHeaderVersion(h.version).into());
	}
	if !LUKS2_HEADER_SIZES.contains(&h.hdr_size) {
		return Err(ParseError::InvalidHeaderSize(h.hdr_size).into());
	}
	if h.hdr_offset != offset {
		return Err(ParseError::HeaderOffsetMismatch {
			expected: offset,
			found: h.hdr_offset,
		}
		.into());
	}

	let json_offset = offset + LUKS2_BIN_HEADER_SIZE as u64;
	let mut json_area = vec![0; (h.hdr_size - LUKS2_BIN_HEADER_SIZE as u64) as usize];
	read_header_bytes(source, json_offset, &mut json_area, "LUKS2 JSON area")?;

	verify_checksum(&h, &mut bin, &json_area)?;
	let json = LuksJson::from_slice(&json_area)?;
	Ok((h, json))
}

/// The checksum covers the binary header with the checksum field zeroed,
/// followed by the JSON area.
fn verify_checksum(
	h: &Luks2BinHeaderRaw,
	bin: &mut [u8],
	json_area: &[u8],
) -> Result<(), LuksError> {
	let alg = ascii_cstr_to_string("checksum algorithm", &h.csum_alg)?.unwrap_or_default();
	let hash = Hash::from_str(&alg).unwrap_or_else(|never| match never {});
	let size = hash
		.output_size()
		.ok_or_else(|| ParseError::UnsupportedChecksumAlgorithm(alg.clone()))?;

	bin[CSUM_RANGE].fill(0);
	let calculated = with_hash!(&hash, H => {
		let mut hasher = H::new();
		hasher.update(&*bin);
		hasher.update(json_area);
		hasher.finalize().to_vec()
	});

	if calculated[..] != h.csum[..size] {
		return Err(ParseError::InvalidChecksum {
			calculated: hex::encode(&calculated),
			found: hex::encode(&h.csum[..size]),
		}
		.into());
	}
	Ok(())
}

fn convert(
	bin: &Luks2BinHeaderRaw,
	json: LuksJson,
	device_size: u64,
) -> Result<Header, LuksError> {
	let LuksSegment::Crypt {
		offset,
		size,
		iv_tweak,
		encryption,
		sector_size,
		..
	} = json.segments.get(&0).ok_or(ParseError::NoSegments)?;

	let LuksDigest::Pbkdf2 {
		keyslots: bound_slots,
		salt,
		digest,
		hash,
		iterations,
		..
	} = json
		.digests
		.values()
		.find(|LuksDigest::Pbkdf2 { segments, .. }| segments.contains(&0))
		.ok_or(ParseError::NoDigestForSegment)?;
	let digest = KeyDigest {
		hash: hash.clone(),
		salt: base64::decode(salt)?,
		iterations: *iterations,
		digest: base64::decode(digest)?,
	};
	check_digest(&digest)?;

	// the segment key is the one the bound keyslots store
	let key_size = bound_slots
		.iter()
		.filter_map(|k| json.keyslots.get(k))
		.map(|LuksKeyslot::Luks2 { key_size, .. }| *key_size)
		.next()
		.unwrap_or(0);
	check_key_size(key_size)?;

	let payload_size = match size {
		LuksSegmentSize::Dynamic => {
			check_range("segment offset", *offset, 0, device_size)?;
			PayloadSize::Dynamic
		}
		LuksSegmentSize::Fixed(len) => {
			check_range("segment", *offset, *len, device_size)?;
			PayloadSize::Fixed(*len)
		}
	};

	let mut key_slots = Vec::with_capacity(json.keyslots.len());
	for (index, ks) in &json.keyslots {
		let state = if bound_slots.contains(index) {
			SlotState::Enabled
		} else {
			SlotState::Disabled
		};
		let slot = convert_keyslot(*index as usize, state, ks)?;
		if slot.is_enabled() {
			check_key_size(slot.key_size)?;
			check_key_size(slot.area_key_size)?;
			check_kdf_cost(&slot)?;
			check_range(
				"keyslot area",
				slot.key_material_offset,
				slot.key_material_size,
				device_size,
			)?;
		}
		key_slots.push(slot);
	}

	let uuid = ascii_cstr_to_string("uuid", &bin.uuid)?.unwrap_or_default();
	let meta = Luks2Metadata {
		label: ascii_cstr_to_string("label", &bin.label)?,
		subsystem: ascii_cstr_to_string("subsystem", &bin.subsystem)?,
		seqid: bin.seqid,
		hdr_size: bin.hdr_size,
		header_offset: bin.hdr_offset,
		checksum_algorithm: ascii_cstr_to_string("checksum algorithm", &bin.csum_alg)?
			.unwrap_or_default(),
		json: json.clone(),
	};

	debug!(
		"LUKS2 header: {} with {} byte key, segment at {}",
		encryption, key_size, offset
	);

	Ok(Header {
		format: Format::Luks2(Box::new(meta)),
		cipher: CipherSpec::from_dm_crypt(encryption),
		hash: digest.hash.clone(),
		payload_offset: *offset,
		payload_size,
		sector_size: *sector_size,
		iv_tweak: *iv_tweak,
		key_size,
		digest,
		uuid,
		key_slots,
	})
}

/// Largest Argon2 memory cost in KiB that `cryptsetup` accepts (4 GiB).
pub const MAX_ARGON2_MEMORY: u32 = 4 * 1024 * 1024;
/// Largest Argon2 lane count that `cryptsetup` accepts.
pub const MAX_ARGON2_CPUS: u32 = 4;

fn check_kdf_cost(slot: &KeySlot) -> Result<(), ParseError> {
	if let Kdf::Argon2 { memory, cpus, .. } = slot.kdf {
		for (what, value, max) in [
			("argon2 memory", memory, MAX_ARGON2_MEMORY),
			("argon2 cpus", cpus, MAX_ARGON2_CPUS),
		] {
			if value > max {
				return Err(ParseError::KdfCostTooHigh {
					index: slot.index,
					what,
					value,
					max,
				});
			}
		}
	}
	Ok(())
}

fn convert_keyslot(index: usize, state: SlotState, ks: &LuksKeyslot) -> Result<KeySlot, LuksError> {
	let LuksKeyslot::Luks2 {
		key_size,
		area: LuksArea::Raw {
			encryption,
			key_size: area_key_size,
			offset,
			size,
		},
		kdf,
		af: LuksAf::Luks1 { stripes, hash },
		priority,
	} = ks;

	let (kdf, salt) = match kdf {
		LuksKdf::Pbkdf2 {
			salt,
			hash,
			iterations,
		} => (
			Kdf::Pbkdf2 {
				hash: hash.clone(),
				iterations: *iterations,
			},
			salt,
		),
		LuksKdf::Argon2i {
			salt,
			time,
			memory,
			cpus,
		} => (
			Kdf::Argon2 {
				variant: Argon2Variant::Argon2i,
				time: *time,
				memory: *memory,
				cpus: *cpus,
			},
			salt,
		),
		LuksKdf::Argon2id {
			salt,
			time,
			memory,
			cpus,
		} => (
			Kdf::Argon2 {
				variant: Argon2Variant::Argon2id,
				time: *time,
				memory: *memory,
				cpus: *cpus,
			},
			salt,
		),
	};

	let priority = match priority {
		Some(LuksPriority::Ignore) => Priority::Ignore,
		Some(LuksPriority::High) => Priority::High,
		Some(LuksPriority::Normal) | None => Priority::Normal,
	};

	Ok(KeySlot {
		index,
		state,
		priority,
		kdf,
		salt: base64::decode(salt)?,
		key_material_offset: *offset,
		key_material_size: *size,
		stripes: *stripes,
		af_hash: hash.clone(),
		encryption: CipherSpec::from_dm_crypt(encryption),
		area_key_size: *area_key_size,
		key_size: *key_size,
	})
}

// taken from https://github.com/serde-rs/json/issues/317#issuecomment-300251188
fn from_str<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
	T: FromStr,
	T::Err: Display,
	D: Deserializer<'de>,
{
	let s = String::deserialize(deserializer)?;
	T::from_str(&s).map_err(de::Error::custom)
}

// helper function to deserialize a Vec<T> where all elements are serialized as strings
fn vec_from_str<'de, T, D>(deserializer: D) -> Result<Vec<T>, D::Error>
where
	T: FromStr,
	T::Err: Display,
	D: Deserializer<'de>,
{
	Vec::<String>::deserialize(deserializer)?
		.iter()
		.map(|s| T::from_str(s).map_err(de::Error::custom))
		.collect()
}

// helper function to deserialize an Option<LuksPriority>
fn deserialize_priority<'de, D>(deserializer: D) -> Result<Option<LuksPriority>, D::Error>
where
	D: Deserializer<'de>,
{
	let p = match Option::<i32>::deserialize(deserializer)? {
		Some(pr) => pr,
		None => return Ok(None),
	};
	match p {
		0 => Ok(Some(LuksPriority::Ignore)),
		1 => Ok(Some(LuksPriority::Normal)),
		2 => Ok(Some(LuksPriority::High)),
		_ => Err(de::Error::custom(format!("invalid priority {}", p))),
	}
}

// helper function to deserialize a LuksSegmentSize
fn deserialize_segment_size<'de, D>(deserializer: D) -> Result<LuksSegmentSize, D::Error>
where
	D: Deserializer<'de>,
{
	let s = String::deserialize(deserializer)?;
	match s.as_str() {
		"dynamic" => Ok(LuksSegmentSize::Dynamic),
		x => Ok(LuksSegmentSize::Fixed(
			u64::from_str(x).map_err(de::Error::custom)?,
		)),
	}
}
