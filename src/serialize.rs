//! Basic serializer / deserializer.
//!
//! The `FromBytes`/`ToBytes` traits and the `def_from_to_bytes!` macro
//! give every box body a uniform big-endian read/write path, with our
//! own [`crate::error::Result`] as the error type rather than a bare
//! `io::Result`.
use std::convert::TryInto;

use auto_impl::auto_impl;

use crate::error::{HeifError, Result};
use crate::io::DataRef;
use crate::types::FourCC;

/// Byte reader in a stream.
#[auto_impl(&mut)]
pub trait ReadBytes: BoxBytes {
    /// Read an exact number of bytes, return a reference to the buffer.
    fn read(&mut self, amount: u64) -> Result<&[u8]>;
    /// Read an exact number of bytes, but don't advance position.
    fn peek(&mut self, amount: u64) -> Result<&[u8]>;
    /// Skip some bytes in the input.
    fn skip(&mut self, amount: u64) -> Result<()>;
    /// How much data is left?
    fn left(&mut self) -> u64;
}

/// Byte writer in a stream.
#[auto_impl(&mut)]
pub trait WriteBytes: BoxBytes {
    /// Write an exact number of bytes.
    fn write(&mut self, data: &[u8]) -> Result<()>;
    /// Zero-fill some bytes in the output.
    fn skip(&mut self, amount: u64) -> Result<()>;
}

/// A bunch of optional methods for reading/writing boxes rather than
/// simple structs. All methods have defaults.
#[auto_impl(&mut)]
pub trait BoxBytes {
    /// Get current position in the stream.
    fn pos(&mut self) -> u64 {
        unimplemented!()
    }
    /// Seek to a position in the output stream.
    fn seek(&mut self, _pos: u64) -> Result<()> {
        unimplemented!()
    }
    /// Size of the file.
    fn size(&self) -> u64 {
        unimplemented!()
    }
    /// Get version metadata of the full box currently being read/written.
    fn version(&self) -> u8 {
        0
    }
    /// Get flags metadata of the full box currently being read/written.
    fn flags(&self) -> u32 {
        0
    }
    /// Get last FourCC we read.
    fn fourcc(&self) -> FourCC {
        unimplemented!()
    }
    /// Get a reference to the mdat source data (used by item/sample
    /// payload resolution under `PreloadMode::LoadOnDemand`).
    fn data_ref(&self, _size: u64) -> Result<DataRef> {
        panic!("data reference unavailable");
    }
}

/// Implementation of ReadBytes on a byte slice.
impl ReadBytes for &[u8] {
    fn read(&mut self, amount: u64) -> Result<&[u8]> {
        let mut amount = amount as usize;
        if amount > (*self).len() {
            return Err(HeifError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        if amount == 0 {
            amount = self.len();
        }
        let res = &self[0..amount];
        (*self) = &self[amount..];
        Ok(res)
    }

    fn peek(&mut self, amount: u64) -> Result<&[u8]> {
        let mut amount = amount as usize;
        if amount > (*self).len() {
            return Err(HeifError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        if amount == 0 {
            amount = self.len();
        }
        Ok(&self[0..amount])
    }

    fn skip(&mut self, amount: u64) -> Result<()> {
        let mut amount = amount;
        if amount > (*self).len() as u64 {
            amount = self.len() as u64;
        }
        (*self) = &self[amount as usize..];
        Ok(())
    }

    #[inline]
    fn left(&mut self) -> u64 {
        (*self).len() as u64
    }
}

impl BoxBytes for &[u8] {
    fn pos(&mut self) -> u64 {
        0
    }
    fn size(&self) -> u64 {
        self.len() as u64
    }
}

/// Implementation of WriteBytes on a growable byte buffer.
impl WriteBytes for Vec<u8> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.extend_from_slice(data);
        Ok(())
    }
    fn skip(&mut self, amount: u64) -> Result<()> {
        self.resize(self.len() + amount as usize, 0);
        Ok(())
    }
}

impl BoxBytes for Vec<u8> {
    fn pos(&mut self) -> u64 {
        self.len() as u64
    }
    fn size(&self) -> u64 {
        self.len() as u64
    }
}

/// Trait to deserialize a type.
pub trait FromBytes {
    fn from_bytes<R: ReadBytes>(bytes: &mut R) -> Result<Self>
    where
        Self: Sized;
    fn min_size() -> usize;
}

/// Trait to serialize a type.
pub trait ToBytes {
    fn to_bytes<W: WriteBytes>(&self, bytes: &mut W) -> Result<()>;
}

// Convenience macro to implement FromBytes/ToBytes for u*/i* types.
macro_rules! def_from_to_bytes {
    ($type:ident) => {
        impl FromBytes for $type {
            #[inline]
            fn from_bytes<R: ReadBytes>(bytes: &mut R) -> Result<Self> {
                let sz = std::mem::size_of::<$type>();
                let data = bytes.read(sz as u64)?;
                let data = data
                    .try_into()
                    .map_err(|_| HeifError::Io(std::io::ErrorKind::UnexpectedEof.into()))?;
                Ok($type::from_be_bytes(data))
            }
            #[inline]
            fn min_size() -> usize {
                std::mem::size_of::<$type>()
            }
        }
        impl ToBytes for $type {
            #[inline]
            fn to_bytes<W: WriteBytes>(&self, bytes: &mut W) -> Result<()> {
                bytes.write(&self.to_be_bytes()[..])
            }
        }
    };
}

def_from_to_bytes!(u8);
def_from_to_bytes!(i16);
def_from_to_bytes!(u16);
def_from_to_bytes!(i32);
def_from_to_bytes!(u32);
def_from_to_bytes!(i64);
def_from_to_bytes!(u64);
def_from_to_bytes!(u128);

/// Generic implementation for Vec<T>: reads until the stream is empty.
///
/// Used for unsized trailing arrays (`compatible_brands`, `ipco` entries,
/// and so on); sized arrays read an explicit count first and call
/// `T::from_bytes` that many times instead of going through this impl.
impl<T> FromBytes for Vec<T>
where
    T: FromBytes,
{
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut v = Vec::new();
        let min_size = T::min_size() as u64;
        while stream.left() >= min_size.max(1) {
            v.push(T::from_bytes(stream)?);
        }
        Ok(v)
    }
    fn min_size() -> usize {
        0
    }
}

impl<T> ToBytes for Vec<T>
where
    T: ToBytes,
{
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        for elem in self {
            elem.to_bytes(stream)?;
        }
        Ok(())
    }
}

/// Read a `u32`-prefixed count followed by that many `T`s.
pub fn read_sized_array<R: ReadBytes, T: FromBytes>(stream: &mut R) -> Result<Vec<T>> {
    let count = u32::from_bytes(stream)?;
    let mut v = Vec::with_capacity(count as usize);
    for _ in 0..count {
        v.push(T::from_bytes(stream)?);
    }
    Ok(v)
}

/// Write a `u32` count followed by each `T`.
pub fn write_sized_array<W: WriteBytes, T: ToBytes>(stream: &mut W, items: &[T]) -> Result<()> {
    (items.len() as u32).to_bytes(stream)?;
    for item in items {
        item.to_bytes(stream)?;
    }
    Ok(())
}
