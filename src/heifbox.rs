//! Box header codec: size/fourcc framing, `BoxReader`/`BoxWriter`
//! size-accounting wrappers, and the `GenericBox` fallback used for any
//! box kind this crate doesn't interpret.
use std::fmt::Debug;

use crate::error::{HeifError, Result};
use crate::serialize::{BoxBytes, FromBytes, ReadBytes, ToBytes, WriteBytes};
use crate::types::FourCC;

/// Implemented by every box body type.
pub trait BoxInfo {
    fn fourcc(&self) -> FourCC;
}

/// Reads a box header (and, for full boxes, the version/flags byte),
/// then hands back a size-limited reader for the box body.
pub struct BoxReader<'a> {
    maxsize: u64,
    inner: Box<dyn ReadBytes + 'a>,
    pub fourcc: FourCC,
    version: u8,
    flags: u32,
}

impl<'a> BoxReader<'a> {
    /// Read a plain box header (`size` + `fourcc`).
    pub fn new(stream: &'a mut impl ReadBytes) -> Result<BoxReader<'a>> {
        Self::open(stream, false)
    }

    /// Read a `FullBox` header (`size` + `fourcc` + `version` + `flags`).
    pub fn new_full(stream: &'a mut impl ReadBytes) -> Result<BoxReader<'a>> {
        Self::open(stream, true)
    }

    fn open(mut stream: &'a mut impl ReadBytes, full: bool) -> Result<BoxReader<'a>> {
        let size1 = u32::from_bytes(&mut stream)?;
        let fourcc = FourCC::from_bytes(&mut stream)?;
        let size = match size1 {
            0 => stream.size() - stream.pos(),
            1 => u64::from_bytes(&mut stream)?.saturating_sub(16),
            x => (x as u64).saturating_sub(8),
        };
        let maxsize = std::cmp::min(stream.size(), stream.pos() + size);

        let (version, flags) = if full {
            let vf = u32::from_bytes(&mut stream)?;
            ((vf >> 24) as u8, vf & 0x00ff_ffff)
        } else {
            (0, 0)
        };

        log::debug!("box {} size={} maxsize={}", fourcc, size, maxsize);
        Ok(BoxReader {
            maxsize,
            inner: Box::new(stream),
            fourcc,
            version,
            flags,
        })
    }
}

impl<'a> Drop for BoxReader<'a> {
    fn drop(&mut self) {
        if self.inner.pos() < self.maxsize {
            let _ = self.inner.skip(self.maxsize - self.inner.pos());
        }
    }
}

impl<'a> ReadBytes for BoxReader<'a> {
    fn read(&mut self, amount: u64) -> Result<&[u8]> {
        let amount = if amount == 0 { self.left() } else { amount };
        if amount == 0 {
            return Ok(b"");
        }
        if self.inner.pos() + amount > self.maxsize {
            return Err(HeifError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        self.inner.read(amount)
    }
    fn peek(&mut self, amount: u64) -> Result<&[u8]> {
        if self.inner.pos() + amount > self.maxsize {
            return Err(HeifError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        self.inner.peek(amount)
    }
    fn skip(&mut self, amount: u64) -> Result<()> {
        if self.inner.pos() + amount > self.maxsize {
            return Err(HeifError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        self.inner.skip(amount)
    }
    fn left(&mut self) -> u64 {
        let pos = self.inner.pos();
        if pos > self.maxsize {
            0
        } else {
            self.maxsize - pos
        }
    }
}

impl<'a> BoxBytes for BoxReader<'a> {
    fn pos(&mut self) -> u64 {
        self.inner.pos()
    }
    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.maxsize {
            return Err(HeifError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        self.inner.seek(pos)
    }
    fn size(&self) -> u64 {
        self.maxsize
    }
    fn version(&self) -> u8 {
        self.version
    }
    fn flags(&self) -> u32 {
        self.flags
    }
    fn fourcc(&self) -> FourCC {
        self.fourcc
    }
    fn data_ref(&self, size: u64) -> Result<crate::io::DataRef> {
        self.inner.data_ref(size)
    }
}

/// Writes a provisional box header, then patches the size in on drop.
pub struct BoxWriter<W: WriteBytes> {
    offset: u64,
    inner: W,
    finalized: bool,
    version: u8,
    flags: u32,
}

impl<W> BoxWriter<W>
where
    W: WriteBytes,
{
    pub fn new(mut stream: W, fourcc: FourCC) -> Result<BoxWriter<W>> {
        let offset = stream.pos();
        0u32.to_bytes(&mut stream)?;
        fourcc.to_bytes(&mut stream)?;
        Ok(BoxWriter {
            offset,
            inner: stream,
            finalized: false,
            version: 0,
            flags: 0,
        })
    }

    pub fn new_full(mut stream: W, fourcc: FourCC, version: u8, flags: u32) -> Result<BoxWriter<W>> {
        let offset = stream.pos();
        0u32.to_bytes(&mut stream)?;
        fourcc.to_bytes(&mut stream)?;
        let vf = ((version as u32) << 24) | (flags & 0x00ff_ffff);
        vf.to_bytes(&mut stream)?;
        Ok(BoxWriter {
            offset,
            inner: stream,
            finalized: false,
            version,
            flags,
        })
    }

    /// Seek back and patch in the real size. Called automatically on drop.
    pub fn finalize(&mut self) -> Result<()> {
        if self.finalized {
            return Ok(());
        }
        self.finalized = true;
        let pos = self.inner.pos();
        self.inner.seek(self.offset)?;
        let sz = pos - self.offset;
        (sz as u32).to_bytes(&mut self.inner)?;
        self.inner.seek(pos)?;
        Ok(())
    }
}

impl<W> Drop for BoxWriter<W>
where
    W: WriteBytes,
{
    fn drop(&mut self) {
        let _ = self.finalize();
    }
}

impl<W> WriteBytes for BoxWriter<W>
where
    W: WriteBytes,
{
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write(data)
    }
    fn skip(&mut self, amount: u64) -> Result<()> {
        self.inner.skip(amount)
    }
}

impl<W> BoxBytes for BoxWriter<W>
where
    W: WriteBytes,
{
    fn pos(&mut self) -> u64 {
        self.inner.pos()
    }
    fn seek(&mut self, pos: u64) -> Result<()> {
        self.inner.seek(pos)
    }
    fn size(&self) -> u64 {
        self.inner.size()
    }
    fn version(&self) -> u8 {
        self.version
    }
    fn flags(&self) -> u32 {
        self.flags
    }
    fn fourcc(&self) -> FourCC {
        self.inner.fourcc()
    }
    fn data_ref(&self, size: u64) -> Result<crate::io::DataRef> {
        self.inner.data_ref(size)
    }
}

/// Read a sequence of top-level boxes until the stream is exhausted.
pub fn read_boxes<R: ReadBytes, B: FromBytes>(mut stream: R) -> Result<Vec<B>> {
    let mut boxes = Vec::new();
    while stream.left() >= 8 {
        boxes.push(B::from_bytes(&mut stream)?);
    }
    Ok(boxes)
}

/// Any box kind we don't interpret is kept as an opaque blob so that
/// round-tripping an unrecognized file doesn't lose data.
pub struct GenericBox {
    fourcc: FourCC,
    data: Vec<u8>,
}

impl GenericBox {
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

impl FromBytes for GenericBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<GenericBox> {
        let size = stream.left();
        let data = if size == 0 { Vec::new() } else { stream.read(size)?.to_vec() };
        Ok(GenericBox {
            fourcc: stream.fourcc(),
            data,
        })
    }
    fn min_size() -> usize {
        0
    }
}

impl ToBytes for GenericBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new(stream, self.fourcc)?;
        w.write(&self.data)
    }
}

impl BoxInfo for GenericBox {
    fn fourcc(&self) -> FourCC {
        self.fourcc
    }
}

impl Debug for GenericBox {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("GenericBox")
            .field("fourcc", &self.fourcc)
            .field("size", &self.data.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_header_roundtrip() {
        let mut buf: Vec<u8> = Vec::new();
        {
            let mut w = BoxWriter::new(&mut buf, FourCC::new("test")).unwrap();
            w.write(b"hello").unwrap();
        }
        assert_eq!(buf.len(), 8 + 5);
        assert_eq!(u32::from_be_bytes(buf[0..4].try_into().unwrap()), 13);
        assert_eq!(&buf[4..8], b"test");

        let mut slice: &[u8] = &buf;
        let mut r = BoxReader::new(&mut slice).unwrap();
        assert_eq!(r.fourcc, FourCC::new("test"));
        let body = r.read(5).unwrap();
        assert_eq!(body, b"hello");
    }

    #[test]
    fn full_box_header_carries_version_and_flags() {
        let mut buf: Vec<u8> = Vec::new();
        {
            let mut w = BoxWriter::new_full(&mut buf, FourCC::new("meta"), 1, 0x00_00_07).unwrap();
            w.write(b"x").unwrap();
        }
        let mut slice: &[u8] = &buf;
        let r = BoxReader::new_full(&mut slice).unwrap();
        assert_eq!(r.version(), 1);
        assert_eq!(r.flags(), 0x07);
    }

    #[test]
    fn unknown_box_is_preserved_as_generic() {
        let mut buf: Vec<u8> = Vec::new();
        {
            let mut w = BoxWriter::new(&mut buf, FourCC::new("xyzq")).unwrap();
            w.write(b"abc").unwrap();
        }
        let mut slice: &[u8] = &buf;
        let mut r = BoxReader::new(&mut slice).unwrap();
        let generic = GenericBox::from_bytes(&mut r).unwrap();
        assert_eq!(generic.data(), b"abc");
        assert_eq!(generic.fourcc(), FourCC::new("xyzq"));
    }
}
