//! Read-only access to LUKS1 and LUKS2 encrypted volumes.
//!
//! A [`Volume`] parses the LUKS header of a file, block device or any other
//! [`ByteSource`], recovers the master key from a password (or takes it
//! directly) and then serves the decrypted payload through `read`/`seek`
//! calls or the [`std::io::Read`] and [`std::io::Seek`] traits.
//!
//! ```no_run
//! use std::io::Read;
//!
//! use luksde::{Volume, VolumeState};
//!
//! let mut volume = Volume::new();
//! volume.set_password("password");
//! volume.open("disk.img")?;
//! assert_eq!(volume.state(), VolumeState::OpenUnlocked);
//!
//! let mut superblock = [0; 4096];
//! volume.read_exact(&mut superblock)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Long-running operations (key derivation in particular) can be cancelled
//! from another thread through the volume's [`AbortSignal`].

pub mod abort;
pub mod af;
pub mod cipher;
pub mod error;
pub mod hash;
pub mod header;
pub mod kdf;
pub mod keyslot;
pub mod master_key;
pub mod sector;
pub mod source;
pub mod volume;

pub use abort::AbortSignal;
pub use cipher::{ChainingMode, CipherAlgorithm, CipherSpec, IvScheme};
pub use error::{ErrorKind, LuksError, ParseError};
pub use hash::Hash;
pub use header::{Format, Header, KeySlot, PayloadSize, Priority, SlotState};
pub use master_key::MasterKey;
pub use source::{ByteSource, FileSource, OffsetSource, StreamSource};
pub use volume::{KeyVerification, Volume, VolumeOptions, VolumeState, Whence};
