//! The volume handle.

use std::{
	io::{self, Read, Seek, SeekFrom},
	path::Path,
};

use log::debug;
use secrecy::{ExposeSecret, SecretString, SecretVec};
use zeroize::Zeroizing;

use crate::{
	abort::AbortSignal,
	cipher::{ChainingMode, CipherAlgorithm},
	error::{ErrorKind, LuksError},
	header::{Header, MAX_KEY_SIZE},
	keyslot,
	master_key::MasterKey,
	sector::SectorReader,
	source::{ByteSource, FileSource, OffsetSource, StreamSource},
};

/// How a raw master key supplied with [`Volume::set_keys`] is checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeyVerification {
	/// Compare the key against the master key digest in the header.
	#[default]
	Verify,
	/// Accept any key of the right length.
	Trust,
}

/// Settings applied when a volume is opened.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeOptions {
	/// Byte offset of the LUKS header within the source.
	pub volume_offset: u64,
	pub key_verification: KeyVerification,
}

impl VolumeOptions {
	pub fn with_volume_offset(mut self, volume_offset: u64) -> Self {
		self.volume_offset = volume_offset;
		self
	}

	pub fn with_key_verification(mut self, key_verification: KeyVerification) -> Self {
		self.key_verification = key_verification;
		self
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeState {
	Closed,
	/// The header is parsed but the master key is unknown.
	OpenLocked,
	OpenUnlocked,
}

/// Reference point of [`Volume::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
	Start,
	Current,
	End,
}

#[derive(Default)]
struct Credentials {
	password: Option<SecretString>,
	keys: Option<SecretVec<u8>>,
}

impl Credentials {
	fn is_empty(&self) -> bool {
		self.password.is_none() && self.keys.is_none()
	}
}

struct Unlocked {
	key: MasterKey,
	reader: SectorReader,
}

struct OpenVolume {
	source: Box<dyn ByteSource + Send>,
	header: Header,
	device_size: u64,
	unlocked: Option<Unlocked>,
}

/// A LUKS volume opened read-only.
///
/// The volume goes from closed to open (locked) when its header is parsed and
/// to unlocked once the master key is recovered from a password or supplied
/// directly. Credentials set before opening are tried while opening; a volume
/// that stays locked can be unlocked later with [`Volume::unlock`].
///
/// ```no_run
/// use luksde::{Volume, Whence};
///
/// let mut volume = Volume::new();
/// volume.set_password("hunter2");
/// volume.open("/dev/sdb1")?;
/// volume.seek(1024, Whence::Start)?;
/// let data = volume.read(Some(512))?;
/// # Ok::<(), luksde::LuksError>(())
/// ```
pub struct Volume {
	options: VolumeOptions,
	credentials: Credentials,
	abort: AbortSignal,
	open: Option<OpenVolume>,
	cursor: u64,
}

impl Default for Volume {
	fn default() -> Self {
		Self::new()
	}
}

impl Volume {
	pub fn new() -> Self {
		Self::with_options(VolumeOptions::default())
	}

	pub fn with_options(options: VolumeOptions) -> Self {
		Self {
			options,
			credentials: Credentials::default(),
			abort: AbortSignal::new(),
			open: None,
			cursor: 0,
		}
	}

	pub fn options(&self) -> &VolumeOptions {
		&self.options
	}

	/// Sets the password tried against the key slots.
	pub fn set_password(&mut self, password: &str) {
		self.credentials.password = Some(SecretString::new(password.to_string()));
	}

	/// Sets the master key, base16 encoded.
	pub fn set_keys(&mut self, keys: &str) -> Result<(), LuksError> {
		let key = Zeroizing::new(
			hex::decode(keys.trim())
				.map_err(|_| LuksError::InvalidArgument("key is not valid base16"))?,
		);
		if key.is_empty() || key.len() > MAX_KEY_SIZE {
			return Err(LuksError::InvalidArgument("unsupported key length"));
		}
		self.credentials.keys = Some(SecretVec::new(key.to_vec()));
		Ok(())
	}

	/// Opens the file or block device at `path`.
	pub fn open<P: AsRef<Path>>(&mut self, path: P) -> Result<(), LuksError> {
		if self.open.is_some() {
			return Err(LuksError::InvalidState("volume is already open"));
		}
		let source = FileSource::open(path)?;
		self.open_source(Box::new(source))
	}

	/// Opens a volume from a caller-supplied stream.
	pub fn open_with_stream<T>(&mut self, stream: T) -> Result<(), LuksError>
	where
		T: Read + Seek + Send + 'static,
	{
		self.open_source(Box::new(StreamSource::new(stream)))
	}

	/// Parses the header of `source` and, if credentials are set, tries to
	/// unlock the volume.
	///
	/// Credentials that do not match leave the volume open and locked. Any
	/// other failure leaves it closed.
	pub fn open_source(&mut self, source: Box<dyn ByteSource + Send>) -> Result<(), LuksError> {
		if self.open.is_some() {
			return Err(LuksError::InvalidState("volume is already open"));
		}
		self.abort.reset();

		let mut source: Box<dyn ByteSource + Send> = match self.options.volume_offset {
			0 => source,
			offset => Box::new(OffsetSource::new(source, offset)),
		};
		let device_size = source.size()?;
		let header = Header::read_from(&mut *source)?;
		debug!(
			"opened LUKS{} volume {} ({})",
			header.version(),
			header.uuid,
			header.cipher
		);

		self.open = Some(OpenVolume {
			source,
			header,
			device_size,
			unlocked: None,
		});
		self.cursor = 0;

		if self.credentials.is_empty() {
			return Ok(());
		}
		match self.try_unlock() {
			Ok(()) => Ok(()),
			Err(LuksError::UnlockFailed) => {
				debug!("volume stays locked");
				Ok(())
			}
			Err(e) => {
				self.open = None;
				Err(e)
			}
		}
	}

	/// Closes the volume, dropping the master key.
	pub fn close(&mut self) -> Result<(), LuksError> {
		if self.open.take().is_none() {
			return Err(LuksError::InvalidState("volume is not open"));
		}
		self.cursor = 0;
		Ok(())
	}

	/// Retries unlocking an open, locked volume with the current credentials.
	///
	/// Fails with [`LuksError::UnlockFailed`] if neither the key nor the
	/// password matches; the volume then stays locked.
	pub fn unlock(&mut self) -> Result<(), LuksError> {
		match &self.open {
			None => return Err(LuksError::InvalidState("volume is not open")),
			Some(open) if open.unlocked.is_some() => return Ok(()),
			Some(_) => {}
		}
		if self.credentials.is_empty() {
			return Err(LuksError::InvalidArgument("no password or key set"));
		}
		self.abort.reset();
		let result = self.try_unlock();
		if matches!(result, Err(LuksError::Cancelled)) {
			self.abort.reset();
		}
		result
	}

	fn try_unlock(&mut self) -> Result<(), LuksError> {
		let open = self
			.open
			.as_mut()
			.ok_or(LuksError::InvalidState("volume is not open"))?;
		let key = recover_master_key(open, &self.credentials, &self.options, &self.abort)?;
		let reader = SectorReader::new(&open.header, &key, open.device_size)?;
		open.unlocked = Some(Unlocked { key, reader });
		debug!("volume unlocked");
		Ok(())
	}

	pub fn state(&self) -> VolumeState {
		match &self.open {
			None => VolumeState::Closed,
			Some(OpenVolume { unlocked: None, .. }) => VolumeState::OpenLocked,
			Some(_) => VolumeState::OpenUnlocked,
		}
	}

	pub fn is_locked(&self) -> bool {
		self.state() != VolumeState::OpenUnlocked
	}

	/// The parsed header of an open volume.
	pub fn header(&self) -> Option<&Header> {
		self.open.as_ref().map(|open| &open.header)
	}

	pub fn master_key(&self) -> Option<&MasterKey> {
		self.open
			.as_ref()
			.and_then(|open| open.unlocked.as_ref())
			.map(|unlocked| &unlocked.key)
	}

	fn open_volume(&self) -> Result<&OpenVolume, LuksError> {
		self.open
			.as_ref()
			.ok_or(LuksError::InvalidState("volume is not open"))
	}

	/// The size of the decrypted payload in bytes.
	pub fn size(&self) -> Result<u64, LuksError> {
		let open = self.open_volume()?;
		Ok(open.header.payload_len(open.device_size))
	}

	/// The cipher and chaining mode of the payload; no key is needed.
	pub fn encryption_method(&self) -> Result<(CipherAlgorithm, ChainingMode), LuksError> {
		let cipher = &self.open_volume()?.header.cipher;
		Ok((cipher.algorithm.clone(), cipher.mode.clone()))
	}

	/// Reads `size` bytes at the cursor, or everything up to the end for
	/// `None`, and advances the cursor.
	pub fn read(&mut self, size: Option<usize>) -> Result<Vec<u8>, LuksError> {
		let mut buf = self.read_buffer_for(self.cursor, size)?;
		let n = self.read_buffer(&mut buf)?;
		buf.truncate(n);
		Ok(buf)
	}

	/// Reads into `buf` at the cursor and advances the cursor.
	pub fn read_buffer(&mut self, buf: &mut [u8]) -> Result<usize, LuksError> {
		let n = self.read_buffer_at_offset(buf, self.cursor)?;
		self.cursor += n as u64;
		Ok(n)
	}

	/// Reads `size` bytes at `offset` without moving the cursor.
	pub fn read_at(&mut self, size: usize, offset: u64) -> Result<Vec<u8>, LuksError> {
		let mut buf = self.read_buffer_for(offset, Some(size))?;
		let n = self.read_buffer_at_offset(&mut buf, offset)?;
		buf.truncate(n);
		Ok(buf)
	}

	// only an unlocked volume gets a buffer, sized to what is left of the payload
	fn read_buffer_for(&self, offset: u64, size: Option<usize>) -> Result<Vec<u8>, LuksError> {
		let open = self.open_volume()?;
		if open.unlocked.is_none() {
			return Err(LuksError::InvalidState("volume is locked"));
		}
		let remaining = open.header.payload_len(open.device_size).saturating_sub(offset);
		let len = match size {
			Some(size) => (size as u64).min(remaining),
			None => remaining,
		};
		let len = usize::try_from(len)
			.map_err(|_| LuksError::InvalidArgument("read size exceeds the address space"))?;
		let mut buf = Vec::new();
		buf.try_reserve_exact(len)
			.map_err(|_| LuksError::InvalidArgument("read size exceeds available memory"))?;
		buf.resize(len, 0);
		Ok(buf)
	}

	/// Reads into `buf` at `offset` without moving the cursor.
	///
	/// A read stopped by [`Volume::signal_abort`] consumes the signal, so the
	/// next read proceeds normally.
	pub fn read_buffer_at_offset(
		&mut self,
		buf: &mut [u8],
		offset: u64,
	) -> Result<usize, LuksError> {
		let open = self
			.open
			.as_mut()
			.ok_or(LuksError::InvalidState("volume is not open"))?;
		let unlocked = open
			.unlocked
			.as_mut()
			.ok_or(LuksError::InvalidState("volume is locked"))?;
		let result = unlocked
			.reader
			.read_at(&mut *open.source, offset, buf, &self.abort);
		if matches!(result, Err(LuksError::Cancelled)) {
			self.abort.reset();
		}
		result
	}

	/// Moves the cursor and returns its new position. Positions past the end
	/// are allowed; reads there return nothing.
	pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64, LuksError> {
		let base = match whence {
			Whence::Start => 0,
			Whence::Current => self.cursor,
			Whence::End => self.size()?,
		};
		if self.open.is_none() {
			return Err(LuksError::InvalidState("volume is not open"));
		}
		let target = base as i128 + offset as i128;
		if target < 0 {
			return Err(LuksError::InvalidArgument("seek to a negative offset"));
		}
		self.cursor = u64::try_from(target)
			.map_err(|_| LuksError::InvalidArgument("seek offset overflows"))?;
		Ok(self.cursor)
	}

	/// The current cursor position.
	pub fn tell(&self) -> u64 {
		self.cursor
	}

	/// Asks a running open, unlock or read to stop with [`LuksError::Cancelled`].
	///
	/// A signal sent while nothing runs stops the next read.
	pub fn signal_abort(&self) {
		self.abort.signal();
	}

	/// A handle to the abort signal that can be moved to another thread.
	pub fn abort_signal(&self) -> AbortSignal {
		self.abort.clone()
	}
}

fn recover_master_key(
	open: &mut OpenVolume,
	credentials: &Credentials,
	options: &VolumeOptions,
	abort: &AbortSignal,
) -> Result<MasterKey, LuksError> {
	let header = &open.header;

	if let Some(keys) = &credentials.keys {
		let candidate = Zeroizing::new(keys.expose_secret().clone());
		match options.key_verification {
			KeyVerification::Trust if candidate.len() == header.key_size => {
				debug!("using the supplied master key unverified");
				return Ok(MasterKey::new(candidate.to_vec()));
			}
			KeyVerification::Trust => {}
			KeyVerification::Verify => {
				if let Some(key) =
					MasterKey::verify(candidate, &header.digest, header.key_size, abort)?
				{
					debug!("the supplied master key matches the digest");
					return Ok(key);
				}
			}
		}
		debug!("the supplied master key does not match the volume");
	}

	if let Some(password) = &credentials.password {
		match keyslot::unlock_with_password(
			&mut *open.source,
			header,
			password.expose_secret().as_bytes(),
			abort,
		) {
			Err(e) if e.kind() == ErrorKind::UnlockFailed => {}
			result => return result,
		}
	}

	Err(LuksError::UnlockFailed)
}

impl Read for Volume {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		Ok(self.read_buffer(buf)?)
	}
}

impl Seek for Volume {
	fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
		let (offset, whence) = match pos {
			SeekFrom::Start(n) => (
				i64::try_from(n).map_err(|_| LuksError::InvalidArgument("seek offset overflows"))?,
				Whence::Start,
			),
			SeekFrom::Current(n) => (n, Whence::Current),
			SeekFrom::End(n) => (n, Whence::End),
		};
		Ok(Volume::seek(self, offset, whence)?)
	}
}
