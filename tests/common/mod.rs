//! In-memory LUKS1 and LUKS2 images for the integration tests.
//!
//! Key derivation and encryption use the `pbkdf2`, `argon2`, `xts-mode` and
//! `cbc` crates directly, and the anti-forensic split is written out here
//! against the `sha1`/`sha2` digests, so the images do not depend on the
//! decryption code under test.
#![allow(dead_code)]

use aes::{
	cipher::{
		consts::U16, generic_array::GenericArray, BlockCipher, BlockEncrypt, BlockEncryptMut,
		InnerIvInit, KeyInit,
	},
	Aes128, Aes256,
};
use hmac::Hmac;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use xts_mode::{get_tweak_default, Xts128};


pub const PASSWORD: &str = "correct horse battery staple";
pub const OTHER_PASSWORD: &str = "Tr0ub4dor&3";
pub const LUKS_MAGIC: &[u8; 6] = b"LUKS\xba\xbe";

/// A synthesized volume together with the values it was built from.
pub struct Fixture {
	pub image: Vec<u8>,
	pub master_key: Vec<u8>,
	pub plaintext: Vec<u8>,
	pub payload_offset: usize,
}

/// Deterministic filler for salts, keys and stripes.
pub fn pattern(seed: u8, len: usize) -> Vec<u8> {
	(0..len)
		.map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed) ^ (i >> 8) as u8)
		.collect()
}

pub fn plaintext(len: usize) -> Vec<u8> {
	(0..len)
		.map(|i| (i as u8).wrapping_mul(7).wrapping_add((i / 512) as u8))
		.collect()
}

fn align(value: usize, to: usize) -> usize {
	(value + to - 1) / to * to
}

pub fn pbkdf2(hash: &str, password: &[u8], salt: &[u8], iterations: u32, out: &mut [u8]) {
	match hash {
		"sha1" => pbkdf2::pbkdf2::<Hmac<sha1::Sha1>>(password, salt, iterations, out),
		"sha256" => pbkdf2::pbkdf2::<Hmac<Sha256>>(password, salt, iterations, out),
		"sha512" => pbkdf2::pbkdf2::<Hmac<sha2::Sha512>>(password, salt, iterations, out),
		other => panic!("no test PBKDF2 for {}", other),
	}
}

fn diffuse_with<D: Digest>(block: &mut [u8]) {
	let size = <D as Digest>::output_size();
	let mut out = Vec::with_capacity(block.len());
	for (i, chunk) in block.chunks(size).enumerate() {
		let mut input = (i as u32).to_be_bytes().to_vec();
		input.extend_from_slice(chunk);
		let digest = D::digest(&input);
		out.extend_from_slice(&digest[..chunk.len()]);
	}
	block.copy_from_slice(&out);
}

/// Anti-forensic split as `cryptsetup` writes it: the leading stripes are
/// `random`, the last one is the key xor the diffused fold of the others.
pub fn af_split(hash: &str, key: &[u8], stripes: usize, random: &[u8]) -> Vec<u8> {
	assert_eq!(random.len(), key.len() * (stripes - 1));
	let mut acc = vec![0u8; key.len()];
	for stripe in random.chunks_exact(key.len()) {
		for (a, s) in acc.iter_mut().zip(stripe) {
			*a ^= s;
		}
		match hash {
			"sha1" => diffuse_with::<sha1::Sha1>(&mut acc),
			"sha256" => diffuse_with::<Sha256>(&mut acc),
			"sha512" => diffuse_with::<sha2::Sha512>(&mut acc),
			other => panic!("no test AF split for {}", other),
		}
	}
	let mut out = random.to_vec();
	out.extend(key.iter().zip(&acc).map(|(k, a)| k ^ a));
	out
}

fn cbc_encrypt_sector<C>(cipher: C, iv: [u8; 16], data: &mut [u8])
where
	C: BlockEncryptMut + BlockCipher<BlockSize = U16>,
{
	let mut encryptor = cbc::Encryptor::<C>::inner_iv_init(cipher, &iv.into());
	for block in data.chunks_exact_mut(16) {
		encryptor.encrypt_block_mut(GenericArray::from_mut_slice(block));
	}
}

fn plain64_iv(sector: u64) -> [u8; 16] {
	let mut iv = [0; 16];
	iv[..8].copy_from_slice(&sector.to_le_bytes());
	iv
}

fn essiv_sha256_iv(key: &[u8], sector: u64) -> [u8; 16] {
	let salt = Sha256::digest(key);
	let essiv = Aes256::new(&salt);
	let mut block = GenericArray::from(plain64_iv(sector));
	essiv.encrypt_block(&mut block);
	let mut iv = [0; 16];
	iv.copy_from_slice(&block);
	iv
}

fn cbc_encrypt(key: &[u8], iv: [u8; 16], data: &mut [u8]) {
	match key.len() {
		16 => cbc_encrypt_sector(Aes128::new_from_slice(key).unwrap(), iv, data),
		32 => cbc_encrypt_sector(Aes256::new_from_slice(key).unwrap(), iv, data),
		n => panic!("no test CBC cipher for {} byte keys", n),
	}
}

/// Encrypts consecutive sectors; sector `i` of `data` gets IV sector number
/// `first_iv + i * iv_step`.
pub fn encrypt_sectors(
	cipher_mode: &str,
	key: &[u8],
	data: &mut [u8],
	sector_size: usize,
	first_iv: u64,
	iv_step: u64,
) {
	for (i, sector) in data.chunks_mut(sector_size).enumerate() {
		let iv_sector = first_iv + i as u64 * iv_step;
		match cipher_mode {
			"xts-plain64" => {
				let half = key.len() / 2;
				let tweak = get_tweak_default(iv_sector as u128);
				match half {
					16 => Xts128::new(
						Aes128::new_from_slice(&key[..half]).unwrap(),
						Aes128::new_from_slice(&key[half..]).unwrap(),
					)
					.encrypt_sector(sector, tweak),
					32 => Xts128::new(
						Aes256::new_from_slice(&key[..half]).unwrap(),
						Aes256::new_from_slice(&key[half..]).unwrap(),
					)
					.encrypt_sector(sector, tweak),
					n => panic!("no test XTS cipher for {} byte halves", n),
				}
			}
			"cbc-plain64" => cbc_encrypt(key, plain64_iv(iv_sector), sector),
			"cbc-essiv:sha256" => cbc_encrypt(key, essiv_sha256_iv(key, iv_sector), sector),
			other => panic!("no test encryption for {}", other),
		}
	}
}

pub struct Luks1Params {
	pub cipher_mode: &'static str,
	pub hash: &'static str,
	pub key_size: usize,
	pub stripes: u32,
	pub iterations: u32,
	/// Password of each enabled slot by index; missing entries are disabled.
	pub slots: Vec<Option<&'static str>>,
	pub payload_sectors: usize,
}

impl Default for Luks1Params {
	fn default() -> Self {
		Self {
			cipher_mode: "xts-plain64",
			hash: "sha256",
			key_size: 64,
			stripes: 4000,
			iterations: 10,
			slots: vec![Some(PASSWORD)],
			payload_sectors: 64,
		}
	}
}

pub fn luks1_image(params: &Luks1Params) -> Fixture {
	let key_size = params.key_size;
	let master_key = pattern(0xa5, key_size);
	let area_sectors = align(key_size * params.stripes as usize, 512) / 512;

	let mut slot_offsets = Vec::with_capacity(8);
	let mut next = 8;
	for _ in 0..8 {
		slot_offsets.push(next);
		next = align(next + area_sectors, 8);
	}
	let payload_sector = next;
	let payload_offset = payload_sector * 512;
	let payload_len = params.payload_sectors * 512;

	let mut image = vec![0; payload_offset + payload_len];
	let h = &mut image[..592];
	h[..6].copy_from_slice(LUKS_MAGIC);
	h[6..8].copy_from_slice(&1u16.to_be_bytes());
	h[8..11].copy_from_slice(b"aes");
	h[40..40 + params.cipher_mode.len()].copy_from_slice(params.cipher_mode.as_bytes());
	h[72..72 + params.hash.len()].copy_from_slice(params.hash.as_bytes());
	h[104..108].copy_from_slice(&(payload_sector as u32).to_be_bytes());
	h[108..112].copy_from_slice(&(key_size as u32).to_be_bytes());

	let digest_salt = pattern(0x11, 32);
	let mut digest = [0; 20];
	pbkdf2(params.hash, &master_key, &digest_salt, params.iterations, &mut digest);
	h[112..132].copy_from_slice(&digest);
	h[132..164].copy_from_slice(&digest_salt);
	h[164..168].copy_from_slice(&params.iterations.to_be_bytes());
	let uuid = b"0b3f6c1a-2d4e-4f60-8a7b-9c0d1e2f3a4b";
	h[168..168 + uuid.len()].copy_from_slice(uuid);

	for (index, &offset) in slot_offsets.iter().enumerate() {
		let base = 208 + index * 48;
		let salt = pattern(0x40 + index as u8, 32);
		let password = params.slots.get(index).copied().flatten();
		let active: u32 = if password.is_some() { 0x00AC_71F3 } else { 0x0000_DEAD };
		image[base..base + 4].copy_from_slice(&active.to_be_bytes());
		image[base + 4..base + 8].copy_from_slice(&params.iterations.to_be_bytes());
		image[base + 8..base + 40].copy_from_slice(&salt);
		image[base + 40..base + 44].copy_from_slice(&(offset as u32).to_be_bytes());
		image[base + 44..base + 48].copy_from_slice(&params.stripes.to_be_bytes());

		if let Some(password) = password {
			let mut split_key = vec![0; key_size];
			pbkdf2(params.hash, password.as_bytes(), &salt, params.iterations, &mut split_key);
			let random = pattern(index as u8, key_size * (params.stripes as usize - 1));
			let mut material = af_split(params.hash, &master_key, params.stripes as usize, &random);
			material.resize(area_sectors * 512, 0);
			encrypt_sectors(params.cipher_mode, &split_key, &mut material, 512, 0, 1);
			image[offset * 512..offset * 512 + material.len()].copy_from_slice(&material);
		}
	}

	let plaintext = plaintext(payload_len);
	let mut payload = plaintext.clone();
	encrypt_sectors(params.cipher_mode, &master_key, &mut payload, 512, 0, 1);
	image[payload_offset..].copy_from_slice(&payload);

	Fixture {
		image,
		master_key,
		plaintext,
		payload_offset,
	}
}

#[derive(Clone, Copy)]
pub enum SlotKdf {
	Pbkdf2,
	Argon2id,
}

pub struct Luks2Slot {
	pub password: &'static str,
	pub kdf: SlotKdf,
	pub priority: Option<i32>,
}

pub struct Luks2Params {
	pub sector_size: usize,
	pub iv_tweak: u64,
	pub slots: Vec<Luks2Slot>,
	pub payload_len: usize,
	pub fixed_size: bool,
	pub corrupt_primary: bool,
	/// Edits the JSON metadata before the checksums are computed.
	pub patch_json: Option<fn(&mut Value)>,
}

impl Default for Luks2Params {
	fn default() -> Self {
		Self {
			sector_size: 512,
			iv_tweak: 0,
			slots: vec![Luks2Slot {
				password: PASSWORD,
				kdf: SlotKdf::Pbkdf2,
				priority: None,
			}],
			payload_len: 64 * 1024,
			fixed_size: false,
			corrupt_primary: false,
			patch_json: None,
		}
	}
}

const LUKS2_HDR_SIZE: usize = 0x4000;
const LUKS2_KEYSLOTS_START: usize = 0x8000;
const KEY_SIZE: usize = 64;
const STRIPES: usize = 4000;

fn luks2_bin_header(magic: &[u8; 6], hdr_offset: u64, json_area: &[u8]) -> Vec<u8> {
	let mut bin = vec![0; 4096];
	bin[..6].copy_from_slice(magic);
	bin[6..8].copy_from_slice(&2u16.to_be_bytes());
	bin[8..16].copy_from_slice(&(LUKS2_HDR_SIZE as u64).to_be_bytes());
	bin[16..24].copy_from_slice(&7u64.to_be_bytes());
	bin[24..28].copy_from_slice(b"test");
	bin[72..78].copy_from_slice(b"sha256");
	bin[104..168].copy_from_slice(&pattern(0x77, 64));
	let uuid = b"6e2a1f4c-9b8d-4e3f-a1c2-3d4e5f607182";
	bin[168..168 + uuid.len()].copy_from_slice(uuid);
	bin[256..264].copy_from_slice(&hdr_offset.to_be_bytes());

	let mut hasher = Sha256::new();
	hasher.update(&bin);
	hasher.update(json_area);
	bin[448..480].copy_from_slice(&hasher.finalize());
	bin
}

pub fn luks2_image(params: &Luks2Params) -> Fixture {
	let master_key = pattern(0x5a, KEY_SIZE);
	let area_size = align(KEY_SIZE * STRIPES, 4096);
	let segment_offset = align(LUKS2_KEYSLOTS_START + params.slots.len() * area_size, 0x100000);

	let mut image = vec![0; segment_offset + params.payload_len];
	let mut keyslots = Map::new();
	for (index, slot) in params.slots.iter().enumerate() {
		let salt = pattern(0x30 + index as u8, 32);
		let mut split_key = vec![0; KEY_SIZE];
		let kdf = match slot.kdf {
			SlotKdf::Pbkdf2 => {
				pbkdf2("sha256", slot.password.as_bytes(), &salt, 10, &mut split_key);
				json!({"type": "pbkdf2", "hash": "sha256", "iterations": 10,
					   "salt": base64::encode(&salt)})
			}
			SlotKdf::Argon2id => {
				let cost = argon2::Params::new(32, 1, 1, Some(KEY_SIZE)).unwrap();
				argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, cost)
					.hash_password_into(slot.password.as_bytes(), &salt, &mut split_key)
					.unwrap();
				json!({"type": "argon2id", "time": 1, "memory": 32, "cpus": 1,
					   "salt": base64::encode(&salt)})
			}
		};

		let random = pattern(0x90 + index as u8, KEY_SIZE * (STRIPES - 1));
		let mut material = af_split("sha256", &master_key, STRIPES, &random);
		material.resize(align(material.len(), 512), 0);
		encrypt_sectors("xts-plain64", &split_key, &mut material, 512, 0, 1);
		let offset = LUKS2_KEYSLOTS_START + index * area_size;
		image[offset..offset + material.len()].copy_from_slice(&material);

		let mut keyslot = json!({
			"type": "luks2",
			"key_size": KEY_SIZE,
			"af": {"type": "luks1", "stripes": STRIPES, "hash": "sha256"},
			"area": {"type": "raw", "offset": offset.to_string(), "size": area_size.to_string(),
					 "encryption": "aes-xts-plain64", "key_size": KEY_SIZE},
			"kdf": kdf,
		});
		if let Some(priority) = slot.priority {
			keyslot["priority"] = json!(priority);
		}
		keyslots.insert(index.to_string(), keyslot);
	}

	let digest_salt = pattern(0x22, 32);
	let mut digest = [0; 32];
	pbkdf2("sha256", &master_key, &digest_salt, 10, &mut digest);
	let size = if params.fixed_size {
		params.payload_len.to_string()
	} else {
		"dynamic".to_string()
	};
	let slot_ids: Vec<String> = (0..params.slots.len()).map(|i| i.to_string()).collect();
	let mut metadata = json!({
		"keyslots": Value::Object(keyslots),
		"tokens": {},
		"segments": {"0": {"type": "crypt", "offset": segment_offset.to_string(),
						   "size": size, "iv_tweak": params.iv_tweak.to_string(),
						   "encryption": "aes-xts-plain64", "sector_size": params.sector_size}},
		"digests": {"0": {"type": "pbkdf2", "keyslots": slot_ids, "segments": ["0"],
						  "hash": "sha256", "iterations": 10,
						  "salt": base64::encode(&digest_salt),
						  "digest": base64::encode(digest)}},
		"config": {"json_size": (LUKS2_HDR_SIZE - 4096).to_string(),
				   "keyslots_size": (segment_offset - LUKS2_KEYSLOTS_START).to_string()},
	});
	if let Some(patch) = params.patch_json {
		patch(&mut metadata);
	}
	let mut json_area = serde_json::to_vec(&metadata).unwrap();
	json_area.resize(LUKS2_HDR_SIZE - 4096, 0);

	let primary = luks2_bin_header(LUKS_MAGIC, 0, &json_area);
	let secondary = luks2_bin_header(b"SKUL\xba\xbe", LUKS2_HDR_SIZE as u64, &json_area);
	image[..4096].copy_from_slice(&primary);
	image[4096..LUKS2_HDR_SIZE].copy_from_slice(&json_area);
	image[LUKS2_HDR_SIZE..LUKS2_HDR_SIZE + 4096].copy_from_slice(&secondary);
	image[LUKS2_HDR_SIZE + 4096..2 * LUKS2_HDR_SIZE].copy_from_slice(&json_area);
	if params.corrupt_primary {
		image[4096] ^= 0xff;
	}

	let plaintext = plaintext(params.payload_len);
	let mut payload = plaintext.clone();
	encrypt_sectors(
		"xts-plain64",
		&master_key,
		&mut payload,
		params.sector_size,
		params.iv_tweak,
		params.sector_size as u64 / 512,
	);
	image[segment_offset..].copy_from_slice(&payload);

	Fixture {
		image,
		master_key,
		plaintext,
		payload_offset: segment_offset,
	}
}
