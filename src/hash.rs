use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::LuksError;

/// A hash algorithm named in a LUKS header.
///
/// Names are matched case-insensitively; unknown names are kept so the header
/// can still be parsed and displayed, and only fail once the hash is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Hash {
	Sha1,
	Sha224,
	Sha256,
	Sha384,
	Sha512,
	Unknown(String),
}

/// name, hash, digest size
const HASH_TABLE: &[(&str, Hash, usize)] = &[
	("sha1", Hash::Sha1, 20),
	("sha224", Hash::Sha224, 28),
	("sha256", Hash::Sha256, 32),
	("sha384", Hash::Sha384, 48),
	("sha512", Hash::Sha512, 64),
];

impl Hash {
	pub fn as_str(&self) -> &str {
		match self {
			Self::Unknown(s) => s.as_str(),
			known => HASH_TABLE
				.iter()
				.find(|(_, h, _)| h == known)
				.map(|(name, _, _)| *name)
				.unwrap_or("unknown"),
		}
	}

	/// The digest size in bytes, or `None` for unknown hashes.
	pub fn output_size(&self) -> Option<usize> {
		HASH_TABLE
			.iter()
			.find(|(_, h, _)| h == self)
			.map(|(_, _, size)| *size)
	}

	/// Fails with [`LuksError::UnsupportedHash`] for hashes not in the registry.
	pub fn ensure_supported(&self) -> Result<(), LuksError> {
		match self {
			Self::Unknown(h) => Err(LuksError::UnsupportedHash(h.clone())),
			_ => Ok(()),
		}
	}
}

impl FromStr for Hash {
	type Err = std::convert::Infallible;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let lower = s.to_ascii_lowercase();
		Ok(HASH_TABLE
			.iter()
			.find(|(name, _, _)| *name == lower)
			.map(|(_, h, _)| h.clone())
			.unwrap_or_else(|| Self::Unknown(s.to_string())))
	}
}

impl Display for Hash {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl Serialize for Hash {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.serialize_str(self.as_str())
	}
}

impl<'de> Deserialize<'de> for Hash {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Hash, D::Error> {
		let s = String::deserialize(deserializer)?;
		Ok(Hash::from_str(&s).unwrap_or_else(|never| match never {}))
	}
}

/// Runs `$body` with `$h` bound to the digest type of `$hash`, or returns
/// [`LuksError::UnsupportedHash`] from the enclosing function.
macro_rules! with_hash {
	($hash:expr, $h:ident => $body:expr) => {
		match $hash {
			$crate::hash::Hash::Sha1 => {
				type $h = sha1::Sha1;
				$body
			}
			$crate::hash::Hash::Sha224 => {
				type $h = sha2::Sha224;
				$body
			}
			$crate::hash::Hash::Sha256 => {
				type $h = sha2::Sha256;
				$body
			}
			$crate::hash::Hash::Sha384 => {
				type $h = sha2::Sha384;
				$body
			}
			$crate::hash::Hash::Sha512 => {
				type $h = sha2::Sha512;
				$body
			}
			$crate::hash::Hash::Unknown(h) => {
				return Err($crate::error::LuksError::UnsupportedHash(h.clone()))
			}
		}
	};
}

pub(crate) use with_hash;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_names_case_insensitively() {
		assert_eq!("SHA256".parse::<Hash>().unwrap(), Hash::Sha256);
		assert_eq!("sha1".parse::<Hash>().unwrap(), Hash::Sha1);
		assert_eq!(
			"ripemd160".parse::<Hash>().unwrap(),
			Hash::Unknown("ripemd160".to_string())
		);
	}

	#[test]
	fn output_sizes_match_digests() {
		use sha2::Digest;
		assert_eq!(Hash::Sha1.output_size(), Some(sha1::Sha1::output_size()));
		assert_eq!(Hash::Sha512.output_size(), Some(sha2::Sha512::output_size()));
		assert_eq!(Hash::Unknown("whirlpool".into()).output_size(), None);
	}
}
