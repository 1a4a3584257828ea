//! Translating reads of the decrypted payload into sector decryption.

use log::trace;
use zeroize::Zeroizing;

use crate::{
	abort::AbortSignal,
	cipher::SectorCipher,
	error::LuksError,
	header::{Header, LUKS_SECTOR_SIZE},
	master_key::MasterKey,
	source::ByteSource,
};

/// Upper bound for the bytes read and decrypted in one batch.
pub const MAX_BATCH_SIZE: usize = 1024 * 1024;

/// Reads plaintext from the payload of an unlocked volume.
///
/// Whole aligned sectors are decrypted straight into the caller's buffer;
/// partial sectors at the start or end of a read go through a one-sector
/// cache.
#[derive(Debug)]
pub struct SectorReader {
	cipher: SectorCipher,
	payload_offset: u64,
	size: u64,
	sector_size: usize,
	iv_tweak: u64,
	cache: Option<(u64, Zeroizing<Vec<u8>>)>,
}

impl SectorReader {
	pub fn new(header: &Header, key: &MasterKey, device_size: u64) -> Result<Self, LuksError> {
		let cipher = SectorCipher::new(&header.cipher, key.expose())?;
		debug_assert!(header.sector_size >= LUKS_SECTOR_SIZE);
		Ok(Self {
			cipher,
			payload_offset: header.payload_offset,
			size: header.payload_len(device_size),
			sector_size: header.sector_size as usize,
			iv_tweak: header.iv_tweak,
			cache: None,
		})
	}

	/// The size of the decrypted payload.
	pub fn size(&self) -> u64 {
		self.size
	}

	// IVs count 512-byte units whatever the encryption sector size
	fn iv_sector(&self, sector: u64) -> u64 {
		(sector * (self.sector_size as u64 / LUKS_SECTOR_SIZE)).wrapping_add(self.iv_tweak)
	}

	/// Reads and decrypts the whole sectors starting at `first` into `buf`.
	fn read_sectors<S: ByteSource + ?Sized>(
		&self,
		source: &mut S,
		first: u64,
		buf: &mut [u8],
	) -> Result<(), LuksError> {
		let offset = self.payload_offset + first * self.sector_size as u64;
		trace!("reading {} bytes of ciphertext at {}", buf.len(), offset);
		source.read_exact_at(offset, buf)?;
		for (i, sector) in buf.chunks_mut(self.sector_size).enumerate() {
			self.cipher
				.decrypt_sector(sector, self.iv_sector(first + i as u64));
		}
		Ok(())
	}

	fn copy_from_sector<S: ByteSource + ?Sized>(
		&mut self,
		source: &mut S,
		sector: u64,
		within: usize,
		out: &mut [u8],
	) -> Result<(), LuksError> {
		if self.cache.as_ref().map(|(cached, _)| *cached) != Some(sector) {
			let mut data = Zeroizing::new(vec![0; self.sector_size]);
			self.read_sectors(source, sector, &mut data)?;
			self.cache = Some((sector, data));
		}
		if let Some((_, data)) = &self.cache {
			out.copy_from_slice(&data[within..within + out.len()]);
		}
		Ok(())
	}

	/// Fills `buf` with plaintext starting at `offset` within the payload and
	/// returns the number of bytes read, which is short at the end of the
	/// payload and zero at or past it.
	pub fn read_at<S: ByteSource + ?Sized>(
		&mut self,
		source: &mut S,
		offset: u64,
		buf: &mut [u8],
		abort: &AbortSignal,
	) -> Result<usize, LuksError> {
		if offset >= self.size || buf.is_empty() {
			return Ok(0);
		}
		let len = (buf.len() as u64).min(self.size - offset) as usize;
		let buf = &mut buf[..len];
		let sector_size = self.sector_size;
		let batch_sectors = (MAX_BATCH_SIZE / sector_size).max(1);

		let mut pos = 0;
		while pos < len {
			let at = offset + pos as u64;
			let sector = at / sector_size as u64;
			let within = (at % sector_size as u64) as usize;
			let remaining = len - pos;

			if within == 0 && remaining >= sector_size {
				abort.check()?;
				let count = (remaining / sector_size).min(batch_sectors);
				let chunk = &mut buf[pos..pos + count * sector_size];
				self.read_sectors(source, sector, chunk)?;
				pos += chunk.len();
			} else {
				let n = (sector_size - within).min(remaining);
				self.copy_from_sector(source, sector, within, &mut buf[pos..pos + n])?;
				pos += n;
			}
		}
		Ok(len)
	}
}
