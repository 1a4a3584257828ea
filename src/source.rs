use std::{
	fs::File,
	io::{self, ErrorKind, Read, Seek, SeekFrom},
	path::Path,
};

/// The capability the engine needs from a backing store: bounded reads at an
/// absolute offset and the total size.
///
/// All calls are blocking. A single source is never used by two volume
/// operations at the same time, so implementations need no internal locking.
pub trait ByteSource {
	/// Reads up to `buf.len()` bytes starting at `offset`, returning the number
	/// of bytes read. Zero means `offset` is at or past the end.
	fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize>;

	/// The size of the source in bytes.
	fn size(&mut self) -> io::Result<u64>;

	/// Fills `buf` completely from `offset`, failing with
	/// [`ErrorKind::UnexpectedEof`] if the source ends first.
	fn read_exact_at(&mut self, mut offset: u64, mut buf: &mut [u8]) -> io::Result<()> {
		while !buf.is_empty() {
			match self.read_at(offset, buf) {
				Ok(0) => {
					return Err(io::Error::new(
						ErrorKind::UnexpectedEof,
						"source ended before the requested range",
					))
				}
				Ok(n) => {
					offset += n as u64;
					buf = &mut buf[n..];
				}
				Err(e) if e.kind() == ErrorKind::Interrupted => {}
				Err(e) => return Err(e),
			}
		}
		Ok(())
	}
}

impl<S: ByteSource + ?Sized> ByteSource for Box<S> {
	fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
		(**self).read_at(offset, buf)
	}

	fn size(&mut self) -> io::Result<u64> {
		(**self).size()
	}
}

/// Adapter for any caller-supplied stream implementing [`Read`] and [`Seek`],
/// e.g. an in-memory [`std::io::Cursor`].
#[derive(Debug)]
pub struct StreamSource<T: Read + Seek> {
	inner: T,
}

impl<T: Read + Seek> StreamSource<T> {
	pub fn new(inner: T) -> Self {
		Self { inner }
	}

	pub fn into_inner(self) -> T {
		self.inner
	}
}

impl<T: Read + Seek> ByteSource for StreamSource<T> {
	fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
		self.inner.seek(SeekFrom::Start(offset))?;
		let mut total = 0;
		// a stream may return short reads before its end
		while total < buf.len() {
			match self.inner.read(&mut buf[total..]) {
				Ok(0) => break,
				Ok(n) => total += n,
				Err(e) if e.kind() == ErrorKind::Interrupted => {}
				Err(e) => return Err(e),
			}
		}
		Ok(total)
	}

	fn size(&mut self) -> io::Result<u64> {
		self.inner.seek(SeekFrom::End(0))
	}
}

/// A local file or block device opened read-only by path.
///
/// Block devices report a length of zero through their metadata, so the size
/// is determined by seeking to the end.
#[derive(Debug)]
pub struct FileSource(StreamSource<File>);

impl FileSource {
	pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
		let file = File::open(path)?;
		Ok(Self(StreamSource::new(file)))
	}
}

impl ByteSource for FileSource {
	fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
		self.0.read_at(offset, buf)
	}

	fn size(&mut self) -> io::Result<u64> {
		self.0.size()
	}
}

/// A view of another source that starts `offset` bytes into it. Used when the
/// LUKS header does not sit at the start of the file or device.
#[derive(Debug)]
pub struct OffsetSource<S: ByteSource> {
	inner: S,
	offset: u64,
}

impl<S: ByteSource> OffsetSource<S> {
	pub fn new(inner: S, offset: u64) -> Self {
		Self { inner, offset }
	}
}

impl<S: ByteSource> ByteSource for OffsetSource<S> {
	fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<usize> {
		let offset = offset.checked_add(self.offset).ok_or_else(|| {
			io::Error::new(ErrorKind::InvalidInput, "read offset overflows the source")
		})?;
		self.inner.read_at(offset, buf)
	}

	fn size(&mut self) -> io::Result<u64> {
		Ok(self.inner.size()?.saturating_sub(self.offset))
	}
}
