//! File read/write and the on-demand data reference used by
//! `PreloadMode::LoadOnDemand` / `LoadMetadata`.
use std::fs;
use std::io::{Seek, SeekFrom, Write};
use std::os::unix::fs::FileExt;
use std::sync::Arc;

use crate::error::{HeifError, Result};
use crate::serialize::{BoxBytes, ReadBytes, ToBytes, WriteBytes};

/// Reads a HEIF file from disk.
///
/// Implements [`ReadBytes`], so it can be passed to [`crate::model::File::load`].
pub struct HeifFile {
    file: Arc<fs::File>,
    pos: u64,
    size: u64,
    buf: Vec<u8>,
    input_filename: Option<String>,
}

impl HeifFile {
    /// Open a file for reading.
    pub fn open(path: impl AsRef<str>) -> Result<HeifFile> {
        let path = path.as_ref();
        let file = fs::File::open(path).map_err(HeifError::FileOpenError)?;
        let size = file.metadata().map_err(HeifError::FileOpenError)?.len();
        Ok(HeifFile {
            file: Arc::new(file),
            pos: 0,
            size,
            buf: Vec::new(),
            input_filename: Some(path.to_string()),
        })
    }

    /// Name of the file this reader was opened from, if any.
    pub fn input_filename(&self) -> Option<&str> {
        self.input_filename.as_deref()
    }
}

impl ReadBytes for HeifFile {
    fn read(&mut self, amount: u64) -> Result<&[u8]> {
        let mut amount = amount as usize;
        if amount == 0 {
            amount = std::cmp::min(1024, self.left() as usize);
        }
        if self.buf.len() < amount {
            self.buf.resize(amount, 0);
        }
        self.file.read_exact_at(&mut self.buf[..amount], self.pos)?;
        self.pos += amount as u64;
        Ok(&self.buf[..amount])
    }

    fn peek(&mut self, amount: u64) -> Result<&[u8]> {
        let amount = amount as usize;
        if self.buf.len() < amount {
            self.buf.resize(amount, 0);
        }
        self.file.read_exact_at(&mut self.buf[..amount], self.pos)?;
        Ok(&self.buf[..amount])
    }

    fn skip(&mut self, amount: u64) -> Result<()> {
        if self.pos + amount > self.size {
            return Err(HeifError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        self.pos += amount;
        Ok(())
    }

    fn left(&mut self) -> u64 {
        if self.pos > self.size {
            0
        } else {
            self.size - self.pos
        }
    }
}

impl BoxBytes for HeifFile {
    fn pos(&mut self) -> u64 {
        self.pos
    }
    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos > self.size {
            return Err(HeifError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        self.pos = pos;
        Ok(())
    }
    fn size(&self) -> u64 {
        self.size
    }
    fn data_ref(&self, size: u64) -> Result<DataRef> {
        if self.pos + size > self.size {
            return Err(HeifError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        Ok(DataRef {
            file: Some(self.file.clone()),
            start: self.pos as usize,
            end: (self.pos + size) as usize,
            owned: None,
        })
    }
}

/// A reference to a span of bytes that either lives in memory already
/// (eager-loaded items/samples, and every EXIF/MIME metadata-item payload
/// regardless of preload mode -- see §5) or is fetched from the backing
/// file on demand.
#[derive(Clone, Default)]
pub struct DataRef {
    file: Option<Arc<fs::File>>,
    start: usize,
    end: usize,
    owned: Option<Arc<Vec<u8>>>,
}

impl DataRef {
    /// Wrap an in-memory buffer (used under `PreloadMode::LoadAllData`
    /// and for item kinds that must always be eager).
    pub fn from_owned(data: Vec<u8>) -> DataRef {
        DataRef {
            file: None,
            start: 0,
            end: data.len(),
            owned: Some(Arc::new(data)),
        }
    }

    pub(crate) fn from_stream<R: ReadBytes>(stream: &mut R, data_size: u64) -> Result<DataRef> {
        let data_ref = stream.data_ref(data_size)?;
        stream.skip(data_size)?;
        Ok(data_ref)
    }

    /// Number of bytes referenced.
    pub fn len(&self) -> u64 {
        (self.end - self.start) as u64
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Materialize the referenced bytes, reading from disk if needed.
    pub fn resolve(&self) -> Result<Vec<u8>> {
        if let Some(owned) = &self.owned {
            return Ok(owned[self.start..self.end].to_vec());
        }
        let file = self
            .file
            .as_ref()
            .ok_or_else(|| HeifError::MediaParsingError("data reference has no backing store".into()))?;
        let mut buf = vec![0u8; self.end - self.start];
        file.read_exact_at(&mut buf, self.start as u64)?;
        Ok(buf)
    }
}

impl ToBytes for DataRef {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        if self.start == self.end {
            return Ok(());
        }
        if let Some(owned) = &self.owned {
            return stream.write(&owned[self.start..self.end]);
        }
        let file = self
            .file
            .as_ref()
            .ok_or_else(|| HeifError::MediaParsingError("data reference has no backing store".into()))?;
        let mut buf = vec![0u8; std::cmp::min(self.end - self.start, 128 * 1024)];
        let mut pos = self.start;
        while pos < self.end {
            let to_read = std::cmp::min(buf.len(), self.end - pos);
            let nread = file.read_at(&mut buf[..to_read], pos as u64)?;
            if nread == 0 {
                return Err(HeifError::Io(std::io::ErrorKind::UnexpectedEof.into()));
            }
            stream.write(&buf[..nread])?;
            pos += nread;
        }
        Ok(())
    }
}

impl std::fmt::Debug for DataRef {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "DataRef{{ len: {} }}", self.len())
    }
}

/// A growable in-memory output sink, used as the target for `File::save`
/// before the final `stco` patch pass (§4.6 "chunk offset patching"),
/// and for any caller who wants to serialize to a `Vec<u8>` instead of a
/// file directly.
#[derive(Debug, Default)]
pub struct MemWriter {
    data: Vec<u8>,
    pos: usize,
}

impl MemWriter {
    pub fn new() -> MemWriter {
        MemWriter { data: Vec::new(), pos: 0 }
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}

impl WriteBytes for MemWriter {
    fn write(&mut self, newdata: &[u8]) -> Result<()> {
        let end = self.pos + newdata.len();
        if end > self.data.len() {
            self.data.resize(end, 0);
        }
        self.data[self.pos..end].copy_from_slice(newdata);
        self.pos = end;
        Ok(())
    }

    fn skip(&mut self, amount: u64) -> Result<()> {
        self.pos += amount as usize;
        if self.pos > self.data.len() {
            self.data.resize(self.pos, 0);
        }
        Ok(())
    }
}

impl BoxBytes for MemWriter {
    fn pos(&mut self) -> u64 {
        self.pos as u64
    }
    fn seek(&mut self, pos: u64) -> Result<()> {
        self.pos = pos as usize;
        if self.pos > self.data.len() {
            self.data.resize(self.pos, 0);
        }
        Ok(())
    }
    fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Write bytes straight to an `fs::File`, for `File::save_to_path`.
pub struct FileWriter {
    file: fs::File,
}

impl FileWriter {
    pub fn create(path: impl AsRef<str>) -> Result<FileWriter> {
        let file = fs::File::create(path.as_ref()).map_err(HeifError::FileOpenError)?;
        Ok(FileWriter { file })
    }
}

impl WriteBytes for FileWriter {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.file.write_all(data)?;
        Ok(())
    }
    fn skip(&mut self, amount: u64) -> Result<()> {
        self.file.seek(SeekFrom::Current(amount as i64))?;
        Ok(())
    }
}

impl BoxBytes for FileWriter {
    fn pos(&mut self) -> u64 {
        self.file.seek(SeekFrom::Current(0)).unwrap()
    }
    fn seek(&mut self, pos: u64) -> Result<()> {
        self.file.seek(SeekFrom::Start(pos))?;
        Ok(())
    }
    fn size(&self) -> u64 {
        self.file.metadata().map(|m| m.len()).unwrap_or(0)
    }
}

/// Count bytes without writing them; used to size descriptors (`esds`)
/// before allocating the real buffer.
#[derive(Debug, Default)]
pub(crate) struct CountBytes {
    pos: usize,
    max: usize,
}

impl CountBytes {
    pub fn new() -> CountBytes {
        CountBytes { pos: 0, max: 0 }
    }

    pub fn size(&self) -> usize {
        self.max
    }
}

impl WriteBytes for CountBytes {
    fn write(&mut self, newdata: &[u8]) -> Result<()> {
        self.pos += newdata.len();
        if self.max < self.pos {
            self.max = self.pos;
        }
        Ok(())
    }
    fn skip(&mut self, amount: u64) -> Result<()> {
        self.pos += amount as usize;
        if self.max < self.pos {
            self.max = self.pos;
        }
        Ok(())
    }
}

impl BoxBytes for CountBytes {
    fn pos(&mut self) -> u64 {
        self.pos as u64
    }
    fn seek(&mut self, pos: u64) -> Result<()> {
        self.pos = pos as usize;
        Ok(())
    }
    fn size(&self) -> u64 {
        self.max as u64
    }
}
