#[macro_use]
pub mod error;

pub mod dex_file;
pub(crate) mod leb;
pub mod refs;

pub use dex_file::{ClassDefItem, DexFile, FieldItem, Header, MethodItem, PrototypeItem, TypeItem};
pub use error::{DexError, DexErrorKind};
pub use refs::{ClassRef, FieldRef, MethodRef, Reference};

use crate::dex::leb::read_uleb128_with;
use serde::Serialize;
use std::io::{Read, Seek, SeekFrom};

/// Byte order of every multi-byte field after the endian tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum Endian
{
    #[default]
    Little,
    Big,
}

/// A seekable byte stream with the byte order of the DEX image it holds.
///
/// Tracks its own position so that repositioning to where the stream already
/// is costs nothing; strings are located one entry at a time through this.
pub struct DexSource<R>
{
    inner: R,
    endian: Endian,
    pos: Option<u64>,
}

impl<R: Read + Seek> DexSource<R>
{
    pub fn new(inner: R) -> Self
    {
        DexSource { inner, endian: Endian::Little, pos: None }
    }

    pub fn endian(&self) -> Endian
    {
        self.endian
    }

    pub(crate) fn set_endian(&mut self, endian: Endian)
    {
        self.endian = endian;
    }

    pub fn into_inner(self) -> R
    {
        self.inner
    }

    pub(crate) fn seek_to(&mut self, offset: u64) -> Result<(), DexError>
    {
        if self.pos == Some(offset)
        {
            return Ok(());
        }
        self.pos = None;
        self.inner
            .seek(SeekFrom::Start(offset))
            .map_err(|e| err!(IoFailure, "seek to 0x{:x} failed: {}", offset, e))?;
        self.pos = Some(offset);
        Ok(())
    }

    pub(crate) fn read_x(&mut self, buf: &mut [u8]) -> Result<(), DexError>
    {
        let start = self.pos.take();
        let mut filled = 0;
        while filled < buf.len()
        {
            match self.inner.read(&mut buf[filled..])
            {
                Ok(0) => fail!(
                    TruncatedRead,
                    "expected to read {} bytes, but only read {}",
                    buf.len(),
                    filled
                ),
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        self.pos = start.map(|p| p + buf.len() as u64);
        Ok(())
    }

    pub(crate) fn read_u1(&mut self) -> Result<u8, DexError>
    {
        let mut buf = [0u8; 1];
        self.read_x(&mut buf)?;
        Ok(buf[0])
    }

    pub(crate) fn read_u2(&mut self) -> Result<u16, DexError>
    {
        let mut buf = [0u8; 2];
        self.read_x(&mut buf)?;
        Ok(match self.endian
        {
            Endian::Little => u16::from_le_bytes(buf),
            Endian::Big => u16::from_be_bytes(buf),
        })
    }

    pub(crate) fn read_u4(&mut self) -> Result<u32, DexError>
    {
        let mut buf = [0u8; 4];
        self.read_x(&mut buf)?;
        Ok(match self.endian
        {
            Endian::Little => u32::from_le_bytes(buf),
            Endian::Big => u32::from_be_bytes(buf),
        })
    }

    pub(crate) fn read_uleb128(&mut self) -> Result<u32, DexError>
    {
        read_uleb128_with(|| self.read_u1())
    }
}
