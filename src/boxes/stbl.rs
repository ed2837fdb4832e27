//! The `stbl` subtree: sample description, sizes, chunking, timing, sync
//! samples, and sample grouping -- §4.2/§4.6.
use crate::error::{HeifError, Result};
use crate::heifbox::{BoxInfo, BoxReader, BoxWriter, GenericBox};
use crate::serialize::{FromBytes, ReadBytes, ToBytes, WriteBytes};
use crate::types::FourCC;

use super::sampleentry::{AvcSampleEntry, HevcSampleEntry, Mp4aSampleEntry};

trait PeekFourCC {
    fn peek_fourcc(&mut self) -> Result<FourCC>;
}

impl<R: ReadBytes> PeekFourCC for R {
    fn peek_fourcc(&mut self) -> Result<FourCC> {
        let bytes = self.peek(8)?;
        Ok(FourCC::from(&bytes[4..8]))
    }
}

/// One `stsd` entry, dispatched by coding name.
#[derive(Clone, Debug)]
pub enum SampleEntry {
    Hevc(HevcSampleEntry),
    Avc(AvcSampleEntry),
    Mp4a(Mp4aSampleEntry),
    Generic(GenericBox),
}

impl BoxInfo for SampleEntry {
    fn fourcc(&self) -> FourCC {
        match self {
            SampleEntry::Hevc(b) => b.fourcc(),
            SampleEntry::Avc(b) => b.fourcc(),
            SampleEntry::Mp4a(b) => b.fourcc(),
            SampleEntry::Generic(b) => b.fourcc(),
        }
    }
}

impl FromBytes for SampleEntry {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let fourcc = stream.peek_fourcc()?;
        let entry = match fourcc.to_be_bytes().as_ref() {
            b"hvc1" | b"hev1" => SampleEntry::Hevc(HevcSampleEntry::from_bytes(stream)?),
            b"avc1" | b"avc3" => SampleEntry::Avc(AvcSampleEntry::from_bytes(stream)?),
            b"mp4a" => SampleEntry::Mp4a(Mp4aSampleEntry::from_bytes(stream)?),
            _ => {
                let mut r = BoxReader::new(stream)?;
                SampleEntry::Generic(GenericBox::from_bytes(&mut r)?)
            }
        };
        Ok(entry)
    }
    fn min_size() -> usize {
        8
    }
}

impl ToBytes for SampleEntry {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        match self {
            SampleEntry::Hevc(b) => b.to_bytes(stream),
            SampleEntry::Avc(b) => b.to_bytes(stream),
            SampleEntry::Mp4a(b) => b.to_bytes(stream),
            SampleEntry::Generic(b) => b.to_bytes(stream),
        }
    }
}

/// Sample description box (`stsd`): one entry per distinct coding
/// format used by the track (almost always a single entry for HEIF
/// image sequences).
#[derive(Clone, Debug, Default)]
pub struct SampleDescriptionBox {
    pub entries: Vec<SampleEntry>,
}

impl BoxInfo for SampleDescriptionBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("stsd")
    }
}

impl FromBytes for SampleDescriptionBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new_full(stream)?;
        let count = u32::from_bytes(&mut r)?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            entries.push(SampleEntry::from_bytes(&mut r)?);
        }
        Ok(SampleDescriptionBox { entries })
    }
    fn min_size() -> usize {
        4
    }
}

impl ToBytes for SampleDescriptionBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new_full(stream, self.fourcc(), 0, 0)?;
        (self.entries.len() as u32).to_bytes(&mut w)?;
        for e in &self.entries {
            e.to_bytes(&mut w)?;
        }
        Ok(())
    }
}

/// Sample size box (`stsz`): one global size, or a per-sample table.
#[derive(Clone, Debug, Default)]
pub struct SampleSizeBox {
    pub sample_size: u32,
    pub sample_count: u32,
    pub entry_sizes: Vec<u32>,
}

impl BoxInfo for SampleSizeBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("stsz")
    }
}

impl SampleSizeBox {
    pub fn size_of(&self, sample_index: usize) -> Option<u32> {
        if self.sample_size != 0 {
            Some(self.sample_size)
        } else {
            self.entry_sizes.get(sample_index).copied()
        }
    }
}

impl FromBytes for SampleSizeBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new_full(stream)?;
        let sample_size = u32::from_bytes(&mut r)?;
        let sample_count = u32::from_bytes(&mut r)?;
        let mut entry_sizes = Vec::new();
        if sample_size == 0 {
            entry_sizes.reserve(sample_count as usize);
            for _ in 0..sample_count {
                entry_sizes.push(u32::from_bytes(&mut r)?);
            }
        }
        Ok(SampleSizeBox {
            sample_size,
            sample_count,
            entry_sizes,
        })
    }
    fn min_size() -> usize {
        8
    }
}

impl ToBytes for SampleSizeBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new_full(stream, self.fourcc(), 0, 0)?;
        self.sample_size.to_bytes(&mut w)?;
        self.sample_count.to_bytes(&mut w)?;
        if self.sample_size == 0 {
            for s in &self.entry_sizes {
                s.to_bytes(&mut w)?;
            }
        }
        Ok(())
    }
}

/// `stsc` entry: a run of chunks sharing a sample count and sample
/// description index.
#[derive(Clone, Copy, Debug)]
pub struct SampleToChunkEntry {
    pub first_chunk: u32,
    pub samples_per_chunk: u32,
    pub sample_description_index: u32,
}

/// Sample-to-chunk box (`stsc`). HEIF image sequences almost always
/// have one sample per chunk, i.e. a single entry `(1, 1, 1)`.
#[derive(Clone, Debug, Default)]
pub struct SampleToChunkBox {
    pub entries: Vec<SampleToChunkEntry>,
}

impl BoxInfo for SampleToChunkBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("stsc")
    }
}

impl FromBytes for SampleToChunkBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new_full(stream)?;
        let count = u32::from_bytes(&mut r)?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            entries.push(SampleToChunkEntry {
                first_chunk: u32::from_bytes(&mut r)?,
                samples_per_chunk: u32::from_bytes(&mut r)?,
                sample_description_index: u32::from_bytes(&mut r)?,
            });
        }
        Ok(SampleToChunkBox { entries })
    }
    fn min_size() -> usize {
        4
    }
}

impl ToBytes for SampleToChunkBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new_full(stream, self.fourcc(), 0, 0)?;
        (self.entries.len() as u32).to_bytes(&mut w)?;
        for e in &self.entries {
            e.first_chunk.to_bytes(&mut w)?;
            e.samples_per_chunk.to_bytes(&mut w)?;
            e.sample_description_index.to_bytes(&mut w)?;
        }
        Ok(())
    }
}

/// Chunk offset box: `stco` (32-bit) or `co64` (64-bit), distinguished
/// by `large`. Patched in place once `mdat`'s file offset is known.
#[derive(Clone, Debug, Default)]
pub struct ChunkOffsetBox {
    pub large: bool,
    pub offsets: Vec<u64>,
}

impl ChunkOffsetBox {
    /// Promote to `co64` if any offset no longer fits in 32 bits.
    pub fn check_size(&mut self) {
        if self.offsets.iter().any(|o| *o > u32::MAX as u64) {
            self.large = true;
        }
    }
}

impl BoxInfo for ChunkOffsetBox {
    fn fourcc(&self) -> FourCC {
        if self.large {
            FourCC::new("co64")
        } else {
            FourCC::new("stco")
        }
    }
}

impl FromBytes for ChunkOffsetBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new_full(stream)?;
        let large = r.fourcc == FourCC::new("co64");
        let count = u32::from_bytes(&mut r)?;
        let mut offsets = Vec::with_capacity(count as usize);
        for _ in 0..count {
            if large {
                offsets.push(u64::from_bytes(&mut r)?);
            } else {
                offsets.push(u32::from_bytes(&mut r)? as u64);
            }
        }
        Ok(ChunkOffsetBox { large, offsets })
    }
    fn min_size() -> usize {
        4
    }
}

impl ToBytes for ChunkOffsetBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new_full(stream, self.fourcc(), 0, 0)?;
        (self.offsets.len() as u32).to_bytes(&mut w)?;
        for o in &self.offsets {
            if self.large {
                o.to_bytes(&mut w)?;
            } else {
                (*o as u32).to_bytes(&mut w)?;
            }
        }
        Ok(())
    }
}

/// Sync sample box (`stss`): 1-based sample numbers of sync samples.
#[derive(Clone, Debug, Default)]
pub struct SyncSampleBox {
    pub sample_numbers: Vec<u32>,
}

impl BoxInfo for SyncSampleBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("stss")
    }
}

impl FromBytes for SyncSampleBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new_full(stream)?;
        let count = u32::from_bytes(&mut r)?;
        let mut sample_numbers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            sample_numbers.push(u32::from_bytes(&mut r)?);
        }
        Ok(SyncSampleBox { sample_numbers })
    }
    fn min_size() -> usize {
        4
    }
}

impl ToBytes for SyncSampleBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new_full(stream, self.fourcc(), 0, 0)?;
        (self.sample_numbers.len() as u32).to_bytes(&mut w)?;
        for s in &self.sample_numbers {
            s.to_bytes(&mut w)?;
        }
        Ok(())
    }
}

/// `stts` entry: `count` consecutive samples each `delta` ticks long.
#[derive(Clone, Copy, Debug, Default)]
pub struct TimeToSampleEntry {
    pub count: u32,
    pub delta: u32,
}

/// Time-to-sample box (`stts`): run-length-encoded decode deltas.
#[derive(Clone, Debug, Default)]
pub struct TimeToSampleBox {
    pub entries: Vec<TimeToSampleEntry>,
}

impl BoxInfo for TimeToSampleBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("stts")
    }
}

impl FromBytes for TimeToSampleBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new_full(stream)?;
        let count = u32::from_bytes(&mut r)?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            entries.push(TimeToSampleEntry {
                count: u32::from_bytes(&mut r)?,
                delta: u32::from_bytes(&mut r)?,
            });
        }
        Ok(TimeToSampleBox { entries })
    }
    fn min_size() -> usize {
        4
    }
}

impl ToBytes for TimeToSampleBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new_full(stream, self.fourcc(), 0, 0)?;
        (self.entries.len() as u32).to_bytes(&mut w)?;
        for e in &self.entries {
            e.count.to_bytes(&mut w)?;
            e.delta.to_bytes(&mut w)?;
        }
        Ok(())
    }
}

/// `ctts` entry: `count` consecutive samples each offset by `offset`
/// (version 1 allows negative offsets).
#[derive(Clone, Copy, Debug, Default)]
pub struct CompositionOffsetEntry {
    pub count: u32,
    pub offset: i32,
}

/// Composition offset box (`ctts`). Version is chosen automatically:
/// version 1 (signed offsets) iff any offset is negative.
#[derive(Clone, Debug, Default)]
pub struct CompositionOffsetBox {
    pub entries: Vec<CompositionOffsetEntry>,
}

impl BoxInfo for CompositionOffsetBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("ctts")
    }
}

impl FromBytes for CompositionOffsetBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new_full(stream)?;
        let version = r.version();
        let count = u32::from_bytes(&mut r)?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let count_field = u32::from_bytes(&mut r)?;
            let offset = if version == 0 {
                u32::from_bytes(&mut r)? as i32
            } else {
                i32::from_bytes(&mut r)?
            };
            entries.push(CompositionOffsetEntry {
                count: count_field,
                offset,
            });
        }
        Ok(CompositionOffsetBox { entries })
    }
    fn min_size() -> usize {
        4
    }
}

impl ToBytes for CompositionOffsetBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let version = if self.entries.iter().any(|e| e.offset < 0) { 1 } else { 0 };
        let mut w = BoxWriter::new_full(stream, self.fourcc(), version, 0)?;
        (self.entries.len() as u32).to_bytes(&mut w)?;
        for e in &self.entries {
            e.count.to_bytes(&mut w)?;
            if version == 0 {
                (e.offset as u32).to_bytes(&mut w)?;
            } else {
                e.offset.to_bytes(&mut w)?;
            }
        }
        Ok(())
    }
}

/// Composition-to-decode box (`cslg`): shifts composition times onto a
/// non-negative decode timeline. `composition_end_time` is part of the
/// box layout but this crate leaves it at 0 (see design notes).
#[derive(Clone, Copy, Debug, Default)]
pub struct CompositionToDecodeBox {
    pub composition_to_dts_shift: i32,
    pub least_decode_to_display_delta: i32,
    pub greatest_decode_to_display_delta: i32,
    pub composition_start_time: i32,
    pub composition_end_time: i32,
}

impl BoxInfo for CompositionToDecodeBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("cslg")
    }
}

impl FromBytes for CompositionToDecodeBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new_full(stream)?;
        Ok(CompositionToDecodeBox {
            composition_to_dts_shift: i32::from_bytes(&mut r)?,
            least_decode_to_display_delta: i32::from_bytes(&mut r)?,
            greatest_decode_to_display_delta: i32::from_bytes(&mut r)?,
            composition_start_time: i32::from_bytes(&mut r)?,
            composition_end_time: i32::from_bytes(&mut r)?,
        })
    }
    fn min_size() -> usize {
        20
    }
}

impl ToBytes for CompositionToDecodeBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new_full(stream, self.fourcc(), 0, 0)?;
        self.composition_to_dts_shift.to_bytes(&mut w)?;
        self.least_decode_to_display_delta.to_bytes(&mut w)?;
        self.greatest_decode_to_display_delta.to_bytes(&mut w)?;
        self.composition_start_time.to_bytes(&mut w)?;
        self.composition_end_time.to_bytes(&mut w)
    }
}

/// `sbgp` entry: a run of samples sharing a sample group description.
#[derive(Clone, Copy, Debug)]
pub struct SampleToGroupEntry {
    pub sample_count: u32,
    pub group_description_index: u32,
}

/// Sample-to-group box (`sbgp`): maps sample runs to `sgpd` entries for
/// a given `grouping_type` (e.g. `"refs"` decode-dependency grouping).
#[derive(Clone, Debug)]
pub struct SampleToGroupBox {
    pub grouping_type: FourCC,
    pub grouping_type_parameter: Option<u32>,
    pub entries: Vec<SampleToGroupEntry>,
}

impl BoxInfo for SampleToGroupBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("sbgp")
    }
}

impl FromBytes for SampleToGroupBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new_full(stream)?;
        let version = r.version();
        let grouping_type = FourCC::from_bytes(&mut r)?;
        let grouping_type_parameter = if version == 1 {
            Some(u32::from_bytes(&mut r)?)
        } else {
            None
        };
        let count = u32::from_bytes(&mut r)?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            entries.push(SampleToGroupEntry {
                sample_count: u32::from_bytes(&mut r)?,
                group_description_index: u32::from_bytes(&mut r)?,
            });
        }
        Ok(SampleToGroupBox {
            grouping_type,
            grouping_type_parameter,
            entries,
        })
    }
    fn min_size() -> usize {
        8
    }
}

impl ToBytes for SampleToGroupBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let version = if self.grouping_type_parameter.is_some() { 1 } else { 0 };
        let mut w = BoxWriter::new_full(stream, self.fourcc(), version, 0)?;
        self.grouping_type.to_bytes(&mut w)?;
        if let Some(p) = self.grouping_type_parameter {
            p.to_bytes(&mut w)?;
        }
        (self.entries.len() as u32).to_bytes(&mut w)?;
        for e in &self.entries {
            e.sample_count.to_bytes(&mut w)?;
            e.group_description_index.to_bytes(&mut w)?;
        }
        Ok(())
    }
}

/// Sample group description box (`sgpd`): kept minimal (raw per-entry
/// payloads), since this crate only needs `"refs"` grouping for decode
/// dependencies and doesn't interpret other grouping types.
#[derive(Clone, Debug)]
pub struct SampleGroupDescriptionBox {
    pub grouping_type: FourCC,
    pub default_length: Option<u32>,
    pub entries: Vec<Vec<u8>>,
}

impl BoxInfo for SampleGroupDescriptionBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("sgpd")
    }
}

impl FromBytes for SampleGroupDescriptionBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new_full(stream)?;
        let version = r.version();
        if version == 0 {
            return Err(HeifError::MediaParsingError("sgpd version 0 is not supported".into()));
        }
        let grouping_type = FourCC::from_bytes(&mut r)?;
        let default_length = u32::from_bytes(&mut r)?;
        let count = u32::from_bytes(&mut r)?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let len = if default_length == 0 {
                u32::from_bytes(&mut r)? as u64
            } else {
                default_length as u64
            };
            entries.push(r.read(len)?.to_vec());
        }
        Ok(SampleGroupDescriptionBox {
            grouping_type,
            default_length: Some(default_length),
            entries,
        })
    }
    fn min_size() -> usize {
        12
    }
}

impl ToBytes for SampleGroupDescriptionBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new_full(stream, self.fourcc(), 1, 0)?;
        self.grouping_type.to_bytes(&mut w)?;
        let default_length = self.default_length.unwrap_or(0);
        default_length.to_bytes(&mut w)?;
        (self.entries.len() as u32).to_bytes(&mut w)?;
        for e in &self.entries {
            if default_length == 0 {
                (e.len() as u32).to_bytes(&mut w)?;
            }
            w.write(e)?;
        }
        Ok(())
    }
}

/// Sample table box (`stbl`): the complete sample-level index for a
/// track's media. `stsd`/`stsz`/`stsc`/`stco`/`stts` are mandatory;
/// everything else is optional per §4.2's box-invariant list.
#[derive(Clone, Debug, Default)]
pub struct SampleTableBox {
    pub sample_description: SampleDescriptionBox,
    pub sample_size: SampleSizeBox,
    pub sample_to_chunk: SampleToChunkBox,
    pub chunk_offset: ChunkOffsetBox,
    pub time_to_sample: TimeToSampleBox,
    pub composition_offset: Option<CompositionOffsetBox>,
    pub composition_to_decode: Option<CompositionToDecodeBox>,
    pub sync_samples: Option<SyncSampleBox>,
    pub sample_to_group: Vec<SampleToGroupBox>,
    pub sample_group_description: Vec<SampleGroupDescriptionBox>,
    pub other_boxes: Vec<GenericBox>,
}

impl BoxInfo for SampleTableBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("stbl")
    }
}

impl FromBytes for SampleTableBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new(stream)?;
        let mut stbl = SampleTableBox::default();
        while r.left() >= 8 {
            match r.peek_fourcc()?.to_be_bytes().as_ref() {
                b"stsd" => stbl.sample_description = SampleDescriptionBox::from_bytes(&mut r)?,
                b"stsz" => stbl.sample_size = SampleSizeBox::from_bytes(&mut r)?,
                b"stsc" => stbl.sample_to_chunk = SampleToChunkBox::from_bytes(&mut r)?,
                b"stco" | b"co64" => stbl.chunk_offset = ChunkOffsetBox::from_bytes(&mut r)?,
                b"stts" => stbl.time_to_sample = TimeToSampleBox::from_bytes(&mut r)?,
                b"ctts" => stbl.composition_offset = Some(CompositionOffsetBox::from_bytes(&mut r)?),
                b"cslg" => stbl.composition_to_decode = Some(CompositionToDecodeBox::from_bytes(&mut r)?),
                b"stss" => stbl.sync_samples = Some(SyncSampleBox::from_bytes(&mut r)?),
                b"sbgp" => stbl.sample_to_group.push(SampleToGroupBox::from_bytes(&mut r)?),
                b"sgpd" => stbl
                    .sample_group_description
                    .push(SampleGroupDescriptionBox::from_bytes(&mut r)?),
                _ => {
                    let mut inner = BoxReader::new(&mut r)?;
                    stbl.other_boxes.push(GenericBox::from_bytes(&mut inner)?);
                }
            }
        }
        Ok(stbl)
    }
    fn min_size() -> usize {
        0
    }
}

impl ToBytes for SampleTableBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new(stream, self.fourcc())?;
        self.sample_description.to_bytes(&mut w)?;
        self.time_to_sample.to_bytes(&mut w)?;
        if let Some(ctts) = &self.composition_offset {
            ctts.to_bytes(&mut w)?;
        }
        if let Some(cslg) = &self.composition_to_decode {
            cslg.to_bytes(&mut w)?;
        }
        self.sample_to_chunk.to_bytes(&mut w)?;
        self.sample_size.to_bytes(&mut w)?;
        self.chunk_offset.to_bytes(&mut w)?;
        if let Some(stss) = &self.sync_samples {
            stss.to_bytes(&mut w)?;
        }
        for sbgp in &self.sample_to_group {
            sbgp.to_bytes(&mut w)?;
        }
        for sgpd in &self.sample_group_description {
            sgpd.to_bytes(&mut w)?;
        }
        for b in &self.other_boxes {
            b.to_bytes(&mut w)?;
        }
        Ok(())
    }
}

impl SampleTableBox {
    pub fn is_valid(&self) -> bool {
        !self.sample_description.entries.is_empty() && !self.sample_to_chunk.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stsz_constant_size_roundtrip() {
        let stsz = SampleSizeBox {
            sample_size: 4096,
            sample_count: 10,
            entry_sizes: Vec::new(),
        };
        let mut buf = Vec::new();
        stsz.to_bytes(&mut buf).unwrap();
        let mut slice: &[u8] = &buf;
        let back = SampleSizeBox::from_bytes(&mut slice).unwrap();
        assert_eq!(back.size_of(3), Some(4096));
    }

    #[test]
    fn stco_promotes_to_co64() {
        let mut stco = ChunkOffsetBox {
            large: false,
            offsets: vec![0x1_0000_0001],
        };
        stco.check_size();
        assert!(stco.large);
        let mut buf = Vec::new();
        stco.to_bytes(&mut buf).unwrap();
        let mut slice: &[u8] = &buf;
        let back = ChunkOffsetBox::from_bytes(&mut slice).unwrap();
        assert!(back.large);
        assert_eq!(back.offsets, vec![0x1_0000_0001]);
    }

    #[test]
    fn ctts_version1_for_negative_offset() {
        let ctts = CompositionOffsetBox {
            entries: vec![CompositionOffsetEntry { count: 3, offset: -2 }],
        };
        let mut buf = Vec::new();
        ctts.to_bytes(&mut buf).unwrap();
        let mut slice: &[u8] = &buf;
        let back = CompositionOffsetBox::from_bytes(&mut slice).unwrap();
        assert_eq!(back.entries[0].offset, -2);
    }

    #[test]
    fn sbgp_sgpd_refs_roundtrip() {
        let sbgp = SampleToGroupBox {
            grouping_type: FourCC::new("refs"),
            grouping_type_parameter: None,
            entries: vec![SampleToGroupEntry {
                sample_count: 1,
                group_description_index: 1,
            }],
        };
        let sgpd = SampleGroupDescriptionBox {
            grouping_type: FourCC::new("refs"),
            default_length: Some(4),
            entries: vec![vec![0, 0, 0, 2]],
        };
        let mut buf = Vec::new();
        sbgp.to_bytes(&mut buf).unwrap();
        let mut slice: &[u8] = &buf;
        let back = SampleToGroupBox::from_bytes(&mut slice).unwrap();
        assert_eq!(back.entries[0].group_description_index, 1);

        let mut buf2 = Vec::new();
        sgpd.to_bytes(&mut buf2).unwrap();
        let mut slice2: &[u8] = &buf2;
        let back2 = SampleGroupDescriptionBox::from_bytes(&mut slice2).unwrap();
        assert_eq!(back2.entries[0], vec![0, 0, 0, 2]);
    }
}
