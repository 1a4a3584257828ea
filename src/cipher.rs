//! Cipher specifications in dm-crypt notation and per-sector decryption.
//!
//! A specification such as `aes-cbc-essiv:sha256` is split into a cipher
//! algorithm (`aes`), a chaining mode (`cbc`) and an IV scheme
//! (`essiv:sha256`), each looked up in its own table. Anything not in the
//! tables parses as `Unknown` so the header can still be inspected; building a
//! [`SectorCipher`] for it fails with an unsupported error.

use std::fmt::Display;

use aes::{
	cipher::{
		consts::U16, generic_array::GenericArray, BlockCipher, BlockDecrypt, BlockDecryptMut,
		BlockEncrypt, InnerIvInit, KeyInit,
	},
	Aes128, Aes192, Aes256,
};
use sha2::Digest;
use xts_mode::Xts128;
use zeroize::Zeroizing;

use crate::{
	error::LuksError,
	hash::{with_hash, Hash},
};

const BLOCK_SIZE: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CipherAlgorithm {
	Aes,
	Unknown(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainingMode {
	Ecb,
	Cbc,
	Xts,
	Unknown(String),
}

/// How the per-sector IV (or XTS tweak) is derived from the sector number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IvScheme {
	/// No IV, only valid for ECB.
	None,
	/// All-zero IV.
	Null,
	/// Little-endian 32-bit sector number.
	Plain,
	/// Little-endian 64-bit sector number.
	Plain64,
	/// Big-endian 64-bit sector number in the last 8 bytes.
	Plain64Be,
	/// Sector number encrypted with the hash of the key.
	Essiv(Hash),
	Unknown(String),
}

const CIPHER_TABLE: &[(&str, CipherAlgorithm)] = &[("aes", CipherAlgorithm::Aes)];

const MODE_TABLE: &[(&str, ChainingMode)] = &[
	("ecb", ChainingMode::Ecb),
	("cbc", ChainingMode::Cbc),
	("xts", ChainingMode::Xts),
];

const IV_TABLE: &[(&str, IvScheme)] = &[
	("null", IvScheme::Null),
	("plain", IvScheme::Plain),
	("plain64", IvScheme::Plain64),
	("plain64be", IvScheme::Plain64Be),
];

fn lookup<T: Clone>(table: &[(&str, T)], name: &str) -> Option<T> {
	table
		.iter()
		.find(|(n, _)| n.eq_ignore_ascii_case(name))
		.map(|(_, v)| v.clone())
}

impl CipherAlgorithm {
	fn from_name(name: &str) -> Self {
		lookup(CIPHER_TABLE, name).unwrap_or_else(|| Self::Unknown(name.to_string()))
	}
}

impl Display for CipherAlgorithm {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Aes => f.write_str("AES"),
			Self::Unknown(s) => f.write_str(s),
		}
	}
}

impl Display for ChainingMode {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::Ecb => f.write_str("ECB"),
			Self::Cbc => f.write_str("CBC"),
			Self::Xts => f.write_str("XTS"),
			Self::Unknown(s) => f.write_str(s),
		}
	}
}

impl Display for IvScheme {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::None => f.write_str("none"),
			Self::Null => f.write_str("null"),
			Self::Plain => f.write_str("plain"),
			Self::Plain64 => f.write_str("plain64"),
			Self::Plain64Be => f.write_str("plain64be"),
			Self::Essiv(h) => write!(f, "essiv:{}", h),
			Self::Unknown(s) => f.write_str(s),
		}
	}
}

/// A parsed cipher specification, e.g. `aes` + `xts-plain64`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherSpec {
	pub algorithm: CipherAlgorithm,
	pub mode: ChainingMode,
	pub iv: IvScheme,
	/// The cipher name as stored in the header.
	pub cipher_name: String,
	/// The cipher mode as stored in the header.
	pub cipher_mode: String,
}

impl CipherSpec {
	/// Parses a LUKS1-style pair of cipher name and mode (`"aes"`, `"cbc-essiv:sha256"`).
	pub fn from_name_and_mode(cipher_name: &str, cipher_mode: &str) -> Self {
		let (chain, iv) = match cipher_mode.split_once('-') {
			Some((chain, iv)) => (chain, Some(iv)),
			None => (cipher_mode, None),
		};
		let mode = lookup(MODE_TABLE, chain)
			.unwrap_or_else(|| ChainingMode::Unknown(chain.to_string()));
		let iv = match iv {
			None => IvScheme::None,
			Some(iv) => match iv.split_once(':') {
				Some((generator, hash)) if generator.eq_ignore_ascii_case("essiv") => {
					IvScheme::Essiv(hash.parse().unwrap_or_else(|never| match never {}))
				}
				_ => lookup(IV_TABLE, iv).unwrap_or_else(|| IvScheme::Unknown(iv.to_string())),
			},
		};
		Self {
			algorithm: CipherAlgorithm::from_name(cipher_name),
			mode,
			iv,
			cipher_name: cipher_name.to_string(),
			cipher_mode: cipher_mode.to_string(),
		}
	}

	/// Parses a LUKS2-style combined specification (`"aes-xts-plain64"`).
	pub fn from_dm_crypt(spec: &str) -> Self {
		match spec.split_once('-') {
			Some((name, mode)) => Self::from_name_and_mode(name, mode),
			None => Self::from_name_and_mode(spec, ""),
		}
	}
}

impl Display for CipherSpec {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}-{}", self.cipher_name, self.cipher_mode)
	}
}

enum AesCipher {
	Aes128(Aes128),
	Aes192(Aes192),
	Aes256(Aes256),
}

impl AesCipher {
	fn new(spec: &CipherSpec, key: &[u8]) -> Result<Self, LuksError> {
		let unsupported = || LuksError::UnsupportedKeySize(spec.to_string(), key.len());
		Ok(match key.len() {
			16 => Self::Aes128(Aes128::new_from_slice(key).map_err(|_| unsupported())?),
			24 => Self::Aes192(Aes192::new_from_slice(key).map_err(|_| unsupported())?),
			32 => Self::Aes256(Aes256::new_from_slice(key).map_err(|_| unsupported())?),
			_ => return Err(unsupported()),
		})
	}

	fn encrypt_block(&self, block: &mut [u8; BLOCK_SIZE]) {
		let block = GenericArray::from_mut_slice(block);
		match self {
			Self::Aes128(c) => c.encrypt_block(block),
			Self::Aes192(c) => c.encrypt_block(block),
			Self::Aes256(c) => c.encrypt_block(block),
		}
	}

	fn decrypt_ecb(&self, data: &mut [u8]) {
		for block in data.chunks_exact_mut(BLOCK_SIZE) {
			let block = GenericArray::from_mut_slice(block);
			match self {
				Self::Aes128(c) => c.decrypt_block(block),
				Self::Aes192(c) => c.decrypt_block(block),
				Self::Aes256(c) => c.decrypt_block(block),
			}
		}
	}

	fn decrypt_cbc(&self, iv: &[u8; BLOCK_SIZE], data: &mut [u8]) {
		match self {
			Self::Aes128(c) => cbc_decrypt(c, iv, data),
			Self::Aes192(c) => cbc_decrypt(c, iv, data),
			Self::Aes256(c) => cbc_decrypt(c, iv, data),
		}
	}
}

fn cbc_decrypt<C>(cipher: &C, iv: &[u8; BLOCK_SIZE], data: &mut [u8])
where
	C: BlockCipher<BlockSize = U16> + BlockDecryptMut + Clone,
{
	let mut decryptor =
		cbc::Decryptor::<C>::inner_iv_init(cipher.clone(), GenericArray::from_slice(iv));
	for block in data.chunks_exact_mut(BLOCK_SIZE) {
		decryptor.decrypt_block_mut(GenericArray::from_mut_slice(block));
	}
}

enum XtsCipher {
	Aes128(Xts128<Aes128>),
	Aes192(Xts128<Aes192>),
	Aes256(Xts128<Aes256>),
}

impl XtsCipher {
	fn new(spec: &CipherSpec, key: &[u8]) -> Result<Self, LuksError> {
		let unsupported = || LuksError::UnsupportedKeySize(spec.to_string(), key.len());
		let (key1, key2) = key.split_at(key.len() / 2);
		Ok(match key.len() {
			32 => Self::Aes128(Xts128::new(
				Aes128::new_from_slice(key1).map_err(|_| unsupported())?,
				Aes128::new_from_slice(key2).map_err(|_| unsupported())?,
			)),
			48 => Self::Aes192(Xts128::new(
				Aes192::new_from_slice(key1).map_err(|_| unsupported())?,
				Aes192::new_from_slice(key2).map_err(|_| unsupported())?,
			)),
			64 => Self::Aes256(Xts128::new(
				Aes256::new_from_slice(key1).map_err(|_| unsupported())?,
				Aes256::new_from_slice(key2).map_err(|_| unsupported())?,
			)),
			_ => return Err(unsupported()),
		})
	}

	fn decrypt_sector(&self, data: &mut [u8], tweak: [u8; BLOCK_SIZE]) {
		match self {
			Self::Aes128(x) => x.decrypt_sector(data, tweak),
			Self::Aes192(x) => x.decrypt_sector(data, tweak),
			Self::Aes256(x) => x.decrypt_sector(data, tweak),
		}
	}
}

enum Engine {
	Ecb(AesCipher),
	Cbc(AesCipher),
	Xts(XtsCipher),
}

enum IvGenerator {
	Zero,
	Plain,
	Plain64,
	Plain64Be,
	Essiv(AesCipher),
}

impl IvGenerator {
	fn new(spec: &CipherSpec, key: &[u8]) -> Result<Self, LuksError> {
		Ok(match &spec.iv {
			IvScheme::None | IvScheme::Null => Self::Zero,
			IvScheme::Plain => Self::Plain,
			IvScheme::Plain64 => Self::Plain64,
			IvScheme::Plain64Be => Self::Plain64Be,
			IvScheme::Essiv(hash) => {
				let salt = Zeroizing::new(essiv_salt(hash, key)?);
				Self::Essiv(AesCipher::new(spec, &salt)?)
			}
			IvScheme::Unknown(iv) => return Err(LuksError::UnsupportedCipher(iv.clone())),
		})
	}

	fn iv(&self, sector: u64) -> [u8; BLOCK_SIZE] {
		let mut iv = [0; BLOCK_SIZE];
		match self {
			Self::Zero => {}
			Self::Plain => iv[..4].copy_from_slice(&(sector as u32).to_le_bytes()),
			Self::Plain64 => iv[..8].copy_from_slice(&sector.to_le_bytes()),
			Self::Plain64Be => iv[8..].copy_from_slice(&sector.to_be_bytes()),
			Self::Essiv(cipher) => {
				iv[..8].copy_from_slice(&sector.to_le_bytes());
				cipher.encrypt_block(&mut iv);
			}
		}
		iv
	}
}

fn essiv_salt(hash: &Hash, key: &[u8]) -> Result<Vec<u8>, LuksError> {
	with_hash!(hash, H => Ok(H::digest(key).to_vec()))
}

/// Decrypts independent sectors of a volume or key slot area with one key.
///
/// Every sector is decrypted on its own from its IV sector number, so any
/// sector can be read without touching its neighbours.
pub struct SectorCipher {
	engine: Engine,
	iv: IvGenerator,
}

impl SectorCipher {
	pub fn new(spec: &CipherSpec, key: &[u8]) -> Result<Self, LuksError> {
		if spec.algorithm != CipherAlgorithm::Aes {
			return Err(LuksError::UnsupportedCipher(spec.to_string()));
		}
		let engine = match (&spec.mode, &spec.iv) {
			(ChainingMode::Ecb, IvScheme::None) => Engine::Ecb(AesCipher::new(spec, key)?),
			(ChainingMode::Cbc, iv) if *iv != IvScheme::None => {
				Engine::Cbc(AesCipher::new(spec, key)?)
			}
			(ChainingMode::Xts, iv) if *iv != IvScheme::None => {
				Engine::Xts(XtsCipher::new(spec, key)?)
			}
			_ => return Err(LuksError::UnsupportedCipher(spec.to_string())),
		};
		let iv = IvGenerator::new(spec, key)?;
		Ok(Self { engine, iv })
	}

	/// Decrypts one sector in place. `data` must be a whole number of cipher
	/// blocks; `iv_sector` is the sector number fed to the IV scheme.
	pub fn decrypt_sector(&self, data: &mut [u8], iv_sector: u64) {
		debug_assert_eq!(data.len() % BLOCK_SIZE, 0);
		match &self.engine {
			Engine::Ecb(cipher) => cipher.decrypt_ecb(data),
			Engine::Cbc(cipher) => cipher.decrypt_cbc(&self.iv.iv(iv_sector), data),
			Engine::Xts(cipher) => cipher.decrypt_sector(data, self.iv.iv(iv_sector)),
		}
	}

	/// Decrypts consecutive sectors of `sector_size` bytes, the first of which
	/// has IV sector number `first_iv_sector`.
	pub fn decrypt_area(&self, data: &mut [u8], sector_size: usize, first_iv_sector: u64) {
		for (i, sector) in data.chunks_mut(sector_size).enumerate() {
			self.decrypt_sector(sector, first_iv_sector + i as u64);
		}
	}
}

impl std::fmt::Debug for SectorCipher {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str("SectorCipher { .. }")
	}
}
