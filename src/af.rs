//! Anti-forensic information splitting as done by `cryptsetup`'s `afsplitter`.
//!
//! A key of `blocksize` bytes is stored as `blocknumbers` stripes of the same
//! size. All stripes but the last are random; the last one is chosen so that
//! folding every stripe into an accumulator (xor, then diffuse) yields the key.

use sha2::Digest;
use zeroize::Zeroizing;

use crate::{
	abort::AbortSignal,
	error::LuksError,
	hash::{with_hash, Hash},
};

fn xor_block(src1: &[u8], src2: &[u8], dst: &mut [u8]) {
	for ((d, a), b) in dst.iter_mut().zip(src1).zip(src2) {
		*d = a ^ b;
	}
}

fn xor_in_place(dst: &mut [u8], src: &[u8]) {
	for (d, s) in dst.iter_mut().zip(src) {
		*d ^= s;
	}
}

// every digest-sized block j becomes H(be32(j) || block), the last block is truncated
fn diffuse<H: Digest>(buf: &mut [u8]) {
	let digest_size = <H as Digest>::output_size();

	for (i, block) in buf.chunks_mut(digest_size).enumerate() {
		let mut hasher = H::new();
		hasher.update((i as u32).to_be_bytes()); // i is the iv
		hasher.update(&*block);
		let digest = hasher.finalize();
		block.copy_from_slice(&digest[..block.len()]);
	}
}

/// Recovers information from data that was split with `cryptsetup`'s `afsplitter` implementation.
///
/// The blocksize and blocknumber values must be the same as when splitting the information.
/// The abort signal is polled once per stripe.
pub fn merge<H: Digest>(
	src: &[u8],
	blocksize: usize,
	blocknumbers: usize,
	abort: &AbortSignal,
) -> Result<Vec<u8>, LuksError> {
	if blocksize == 0 || blocknumbers == 0 {
		return Err(LuksError::InvalidArgument("anti-forensic split with no stripes"));
	}
	let needed = blocksize
		.checked_mul(blocknumbers)
		.ok_or(LuksError::InvalidArgument("anti-forensic split too large"))?;
	if src.len() < needed {
		return Err(LuksError::InvalidArgument("anti-forensic material shorter than its stripes"));
	}

	let mut bufblock = Zeroizing::new(vec![0; blocksize]);
	let (stripes, last) = src[..needed].split_at(needed - blocksize);

	for stripe in stripes.chunks_exact(blocksize) {
		abort.check()?;
		xor_in_place(&mut bufblock, stripe);
		diffuse::<H>(&mut bufblock);
	}

	let mut key = vec![0; blocksize];
	xor_block(last, &bufblock, &mut key);
	Ok(key)
}

/// Splits `key` into `blocknumbers` stripes, the inverse of [`merge`].
///
/// `random` must hold `(blocknumbers - 1) * key.len()` bytes that become the
/// leading stripes; the caller is responsible for them being random.
pub fn split<H: Digest>(
	key: &[u8],
	blocknumbers: usize,
	random: &[u8],
) -> Result<Vec<u8>, LuksError> {
	let blocksize = key.len();
	if blocksize == 0 || blocknumbers == 0 {
		return Err(LuksError::InvalidArgument("anti-forensic split with no stripes"));
	}
	let random_len = blocksize
		.checked_mul(blocknumbers - 1)
		.ok_or(LuksError::InvalidArgument("anti-forensic split too large"))?;
	if random.len() != random_len {
		return Err(LuksError::InvalidArgument("wrong amount of random stripe data"));
	}

	let mut bufblock = Zeroizing::new(vec![0; blocksize]);
	let mut dst = Vec::with_capacity(random_len + blocksize);

	for stripe in random.chunks_exact(blocksize) {
		dst.extend_from_slice(stripe);
		xor_in_place(&mut bufblock, stripe);
		diffuse::<H>(&mut bufblock);
	}

	let mut last = vec![0; blocksize];
	xor_block(key, &bufblock, &mut last);
	dst.extend_from_slice(&last);
	Ok(dst)
}

/// [`merge`] with the digest chosen at runtime.
pub fn merge_with_hash(
	hash: &Hash,
	src: &[u8],
	blocksize: usize,
	blocknumbers: usize,
	abort: &AbortSignal,
) -> Result<Vec<u8>, LuksError> {
	with_hash!(hash, H => merge::<H>(src, blocksize, blocknumbers, abort))
}

/// [`split`] with the digest chosen at runtime.
pub fn split_with_hash(
	hash: &Hash,
	key: &[u8],
	blocknumbers: usize,
	random: &[u8],
) -> Result<Vec<u8>, LuksError> {
	with_hash!(hash, H => split::<H>(key, blocknumbers, random))
}
