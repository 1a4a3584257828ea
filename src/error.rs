use thiserror::Error;

/// Enum for errors arising during header parsing.
#[derive(Debug, Error)]
pub enum ParseError {
	#[error("Deserialization error: {0}")]
	BincodeError(#[from] bincode::error::DecodeError),

	#[error("Invalid magic value in header: must be \"LUKS\\xba\\xbe\" or \"SKUL\\xba\\xbe\"")]
	InvalidHeaderMagic,

	#[error("Invalid header version: only versions 1 and 2 are supported, found {0}")]
	InvalidHeaderVersion(u16),

	#[error("Header is truncated: the source ends before the {0} is complete")]
	Truncated(&'static str),

	#[error("JSON deserialization error: {0}")]
	SerdeError(#[from] serde_json::Error),

	#[error("Invalid {field} in header: not a NUL-terminated ASCII string")]
	InvalidString { field: &'static str },

	#[error("Invalid key slot state 0x{state:08x} in key slot {index}")]
	InvalidKeySlotState { index: usize, state: u32 },

	#[error("Invalid key size: {0} bytes")]
	InvalidKeySize(usize),

	#[error("Invalid {what}: offset {offset} with length {length} exceeds the device size {device_size}")]
	OutOfBounds {
		what: &'static str,
		offset: u64,
		length: u64,
		device_size: u64,
	},

	#[error("Invalid {0}: arithmetic overflow")]
	Overflow(&'static str),

	#[error("Invalid header size {0}: not one of the standard LUKS2 header sizes")]
	InvalidHeaderSize(u64),

	#[error("Invalid header checksum: calculated {calculated}, found {found}")]
	InvalidChecksum { calculated: String, found: String },

	#[error("Invalid header offset: header found at {expected} claims to be at {found}")]
	HeaderOffsetMismatch { expected: u64, found: u64 },

	#[error("Unsupported header checksum algorithm: {0}")]
	UnsupportedChecksumAlgorithm(String),

	#[error(
		"Invalid stripes value in JSON: stripes value of the antiforensic splitter must be \
	4000, found {0}"
	)]
	InvalidStripes(u32),

	#[error("Invalid sector size in JSON: must be 512, 1024, 2048 or 4096, found {0}")]
	InvalidSectorSize(u64),

	#[error("Invalid keyslot size in JSON: must be aligned to 4096 bytes")]
	KeyslotNotAligned,

	#[error("Invalid JSON size in config: {json_size} does not match the JSON area size {area_size}")]
	JsonSizeMismatch { json_size: u64, area_size: u64 },

	#[error("Invalid keyslot reference in JSON: keyslot {0} does not exist")]
	InvalidKeyslotReference(u8),

	#[error("Invalid segment reference in JSON: segment {0} does not exist")]
	InvalidSegmentReference(u8),

	#[error("Invalid JSON: no segment 0")]
	NoSegments,

	#[error("Invalid JSON: no digest is assigned to segment 0")]
	NoDigestForSegment,

	#[error("Invalid master key digest: {0}")]
	InvalidDigest(&'static str),

	#[error("Unsupported LUKS2 requirement: {0}")]
	UnsupportedRequirement(String),

	#[error("Unsupported LUKS2 segment integrity protection")]
	UnsupportedIntegrity,

	#[error("Invalid {what} in key slot {index}: {value} exceeds the limit of {max}")]
	KdfCostTooHigh {
		index: usize,
		what: &'static str,
		value: u32,
		max: u32,
	},
}

/// The category an error belongs to, independent of its details.
///
/// Front ends map these onto their own error types; see [`LuksError::kind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
	/// Malformed or truncated header or key slot data.
	Format,
	/// No key slot or supplied key matched the master key digest.
	UnlockFailed,
	/// The underlying byte source failed.
	Io,
	/// A caller-supplied argument is invalid.
	InvalidArgument,
	/// The abort signal was raised during a long-running operation.
	Cancelled,
	/// The volume uses an algorithm that is not registered.
	Unsupported,
	/// The operation is not valid in the volume's current state.
	InvalidState,
}

/// Enum for errors arising during interaction with a [`Volume`](crate::Volume).
#[derive(Debug, Error)]
pub enum LuksError {
	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),

	#[error("Parsing error: {0}")]
	ParseError(#[from] self::ParseError),

	#[error("Invalid key slot {index}: {reason}")]
	InvalidKeySlot { index: usize, reason: &'static str },

	#[error("Could not deserialize base64: {0}")]
	Base64Error(#[from] base64::DecodeError),

	#[error("Unable to unlock volume: no key slot matched the master key digest")]
	UnlockFailed,

	#[error("Invalid argument: {0}")]
	InvalidArgument(&'static str),

	#[error("Operation cancelled")]
	Cancelled,

	#[error("Unsupported hash algorithm: {0}")]
	UnsupportedHash(String),

	#[error("Unsupported cipher: {0}")]
	UnsupportedCipher(String),

	#[error("Unsupported key size for {0}: {1}")]
	UnsupportedKeySize(String, usize),

	#[error("Could not apply hash function: {0}")]
	HashError(#[from] argon2::Error),

	#[error("Invalid state: {0}")]
	InvalidState(&'static str),
}

impl LuksError {
	/// Returns the category of this error.
	pub fn kind(&self) -> ErrorKind {
		match self {
			Self::IoError(_) => ErrorKind::Io,
			Self::ParseError(_) | Self::InvalidKeySlot { .. } | Self::Base64Error(_) => {
				ErrorKind::Format
			}
			Self::UnlockFailed => ErrorKind::UnlockFailed,
			Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
			Self::Cancelled => ErrorKind::Cancelled,
			Self::UnsupportedHash(_)
			| Self::UnsupportedCipher(_)
			| Self::UnsupportedKeySize(..) => ErrorKind::Unsupported,
			// argon2 only fails on parameters taken from the header
			Self::HashError(_) => ErrorKind::Format,
			Self::InvalidState(_) => ErrorKind::InvalidState,
		}
	}
}

impl From<bincode::error::DecodeError> for LuksError {
	fn from(e: bincode::error::DecodeError) -> Self {
		LuksError::ParseError(ParseError::BincodeError(e))
	}
}

impl From<serde_json::Error> for LuksError {
	fn from(e: serde_json::Error) -> Self {
		LuksError::ParseError(ParseError::SerdeError(e))
	}
}

impl From<LuksError> for std::io::Error {
	fn from(e: LuksError) -> Self {
		use std::io::ErrorKind as IoKind;
		if let LuksError::IoError(inner) = e {
			return inner;
		}
		let kind = match e.kind() {
			ErrorKind::Format => IoKind::InvalidData,
			ErrorKind::InvalidArgument => IoKind::InvalidInput,
			ErrorKind::Unsupported => IoKind::Unsupported,
			ErrorKind::UnlockFailed | ErrorKind::InvalidState => IoKind::PermissionDenied,
			// not Interrupted: std's read loops retry on that kind
			ErrorKind::Cancelled | ErrorKind::Io => IoKind::Other,
		};
		std::io::Error::new(kind, e)
	}
}
