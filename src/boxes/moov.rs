//! The `moov` subtree: movie/track/media headers, edit lists, and track
//! references -- §4.2/§6.1.
use crate::error::{HeifError, Result};
use crate::heifbox::{BoxInfo, BoxReader, BoxWriter, GenericBox};
use crate::serialize::{FromBytes, ReadBytes, ToBytes, WriteBytes};
use crate::types::{FixedFloat16_16, FixedFloat8_8, FourCC, IsoLanguageCode, Matrix, SequenceId, Time};

use super::meta::HandlerBox;
use super::stbl::SampleTableBox;

// Helper used by several container boxes here to dispatch on the next
// box's fourcc without consuming it (mirrors `meta.rs`/`iprp.rs`).
trait PeekFourCC {
    fn peek_fourcc(&mut self) -> Result<FourCC>;
}

impl<R: ReadBytes> PeekFourCC for R {
    fn peek_fourcc(&mut self) -> Result<FourCC> {
        let bytes = self.peek(8)?;
        Ok(FourCC::from(&bytes[4..8]))
    }
}

/// Movie header (`mvhd`): aggregated timescale/duration across tracks.
#[derive(Clone, Debug)]
pub struct MovieHeaderBox {
    pub creation_time: Time,
    pub modification_time: Time,
    pub timescale: u32,
    pub duration: u64,
    pub rate: FixedFloat16_16,
    pub volume: FixedFloat8_8,
    pub matrix: Matrix,
    pub next_track_id: u32,
}

impl BoxInfo for MovieHeaderBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("mvhd")
    }
}

impl FromBytes for MovieHeaderBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new_full(stream)?;
        let version = r.version();
        let (creation_time, modification_time, timescale, duration) = if version == 1 {
            (
                Time::from_bytes(&mut r)?,
                Time::from_bytes(&mut r)?,
                u32::from_bytes(&mut r)?,
                u64::from_bytes(&mut r)?,
            )
        } else {
            (
                Time::from_bytes(&mut r)?,
                Time::from_bytes(&mut r)?,
                u32::from_bytes(&mut r)?,
                u32::from_bytes(&mut r)? as u64,
            )
        };
        let rate = FixedFloat16_16::from_bytes(&mut r)?;
        let volume = FixedFloat8_8::from_bytes(&mut r)?;
        r.skip(2 + 8)?; // reserved + reserved[2]
        let matrix = Matrix::from_bytes(&mut r)?;
        r.skip(24)?; // pre_defined[6]
        let next_track_id = u32::from_bytes(&mut r)?;
        Ok(MovieHeaderBox {
            creation_time,
            modification_time,
            timescale,
            duration,
            rate,
            volume,
            matrix,
            next_track_id,
        })
    }
    fn min_size() -> usize {
        100
    }
}

impl ToBytes for MovieHeaderBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let version = if self.duration > u32::MAX as u64 { 1 } else { 0 };
        let mut w = BoxWriter::new_full(stream, self.fourcc(), version, 0)?;
        if version == 1 {
            self.creation_time.to_bytes(&mut w)?;
            self.modification_time.to_bytes(&mut w)?;
            self.timescale.to_bytes(&mut w)?;
            self.duration.to_bytes(&mut w)?;
        } else {
            self.creation_time.to_bytes(&mut w)?;
            self.modification_time.to_bytes(&mut w)?;
            self.timescale.to_bytes(&mut w)?;
            (self.duration as u32).to_bytes(&mut w)?;
        }
        self.rate.to_bytes(&mut w)?;
        self.volume.to_bytes(&mut w)?;
        w.skip(2 + 8)?;
        self.matrix.to_bytes(&mut w)?;
        w.skip(24)?;
        self.next_track_id.to_bytes(&mut w)
    }
}

/// Track header flag bits (enabled / in-movie / in-preview).
#[derive(Clone, Copy, Debug, Default)]
pub struct TrackFlags(pub u32);

impl TrackFlags {
    pub fn enabled(&self) -> bool {
        self.0 & 0x1 != 0
    }
    pub fn in_movie(&self) -> bool {
        self.0 & 0x2 != 0
    }
    pub fn in_preview(&self) -> bool {
        self.0 & 0x4 != 0
    }
    pub fn new(enabled: bool, in_movie: bool, in_preview: bool) -> TrackFlags {
        TrackFlags((enabled as u32) | ((in_movie as u32) << 1) | ((in_preview as u32) << 2))
    }
}

/// Track header (`tkhd`).
#[derive(Clone, Debug)]
pub struct TrackHeaderBox {
    pub flags: TrackFlags,
    pub creation_time: Time,
    pub modification_time: Time,
    pub track_id: u32,
    pub duration: u64,
    pub layer: i16,
    pub alternate_group: i16,
    pub volume: FixedFloat8_8,
    pub matrix: Matrix,
    pub width: FixedFloat16_16,
    pub height: FixedFloat16_16,
}

impl BoxInfo for TrackHeaderBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("tkhd")
    }
}

impl FromBytes for TrackHeaderBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new_full(stream)?;
        let version = r.version();
        let flags = TrackFlags(r.flags());
        let (creation_time, modification_time, track_id, duration) = if version == 1 {
            let ct = Time::from_bytes(&mut r)?;
            let mt = Time::from_bytes(&mut r)?;
            let tid = u32::from_bytes(&mut r)?;
            r.skip(4)?;
            let dur = u64::from_bytes(&mut r)?;
            (ct, mt, tid, dur)
        } else {
            let ct = Time::from_bytes(&mut r)?;
            let mt = Time::from_bytes(&mut r)?;
            let tid = u32::from_bytes(&mut r)?;
            r.skip(4)?;
            let dur = u32::from_bytes(&mut r)? as u64;
            (ct, mt, tid, dur)
        };
        r.skip(8)?; // reserved[2]
        let layer = i16::from_bytes(&mut r)?;
        let alternate_group = i16::from_bytes(&mut r)?;
        let volume = FixedFloat8_8::from_bytes(&mut r)?;
        r.skip(2)?;
        let matrix = Matrix::from_bytes(&mut r)?;
        let width = FixedFloat16_16::from_bytes(&mut r)?;
        let height = FixedFloat16_16::from_bytes(&mut r)?;
        Ok(TrackHeaderBox {
            flags,
            creation_time,
            modification_time,
            track_id,
            duration,
            layer,
            alternate_group,
            volume,
            matrix,
            width,
            height,
        })
    }
    fn min_size() -> usize {
        84
    }
}

impl ToBytes for TrackHeaderBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let version = if self.duration > u32::MAX as u64 { 1 } else { 0 };
        let mut w = BoxWriter::new_full(stream, self.fourcc(), version, self.flags.0)?;
        if version == 1 {
            self.creation_time.to_bytes(&mut w)?;
            self.modification_time.to_bytes(&mut w)?;
            self.track_id.to_bytes(&mut w)?;
            w.skip(4)?;
            self.duration.to_bytes(&mut w)?;
        } else {
            self.creation_time.to_bytes(&mut w)?;
            self.modification_time.to_bytes(&mut w)?;
            self.track_id.to_bytes(&mut w)?;
            w.skip(4)?;
            (self.duration as u32).to_bytes(&mut w)?;
        }
        w.skip(8)?;
        self.layer.to_bytes(&mut w)?;
        self.alternate_group.to_bytes(&mut w)?;
        self.volume.to_bytes(&mut w)?;
        w.skip(2)?;
        self.matrix.to_bytes(&mut w)?;
        self.width.to_bytes(&mut w)?;
        self.height.to_bytes(&mut w)
    }
}

/// One `elst` entry.
#[derive(Clone, Copy, Debug)]
pub struct EditListEntry {
    pub segment_duration: u64,
    pub media_time: i64,
    pub media_rate: FixedFloat16_16,
}

impl EditListEntry {
    fn from_bytes_versioned<R: ReadBytes>(stream: &mut R, version: u8) -> Result<Self> {
        if version == 1 {
            Ok(EditListEntry {
                segment_duration: u64::from_bytes(stream)?,
                media_time: i64::from_bytes(stream)?,
                media_rate: FixedFloat16_16::from_bytes(stream)?,
            })
        } else {
            Ok(EditListEntry {
                segment_duration: u32::from_bytes(stream)? as u64,
                media_time: i32::from_bytes(stream)? as i64,
                media_rate: FixedFloat16_16::from_bytes(stream)?,
            })
        }
    }

    fn to_bytes_versioned<W: WriteBytes>(&self, stream: &mut W, version: u8) -> Result<()> {
        if version == 1 {
            self.segment_duration.to_bytes(stream)?;
            self.media_time.to_bytes(stream)?;
        } else {
            (self.segment_duration as u32).to_bytes(stream)?;
            (self.media_time as i32).to_bytes(stream)?;
        }
        self.media_rate.to_bytes(stream)
    }
}

/// Edit list box (`elst`).
#[derive(Clone, Debug, Default)]
pub struct EditListBox {
    pub entries: Vec<EditListEntry>,
}

impl BoxInfo for EditListBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("elst")
    }
}

impl FromBytes for EditListBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new_full(stream)?;
        let version = r.version();
        let count = u32::from_bytes(&mut r)?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            entries.push(EditListEntry::from_bytes_versioned(&mut r, version)?);
        }
        Ok(EditListBox { entries })
    }
    fn min_size() -> usize {
        4
    }
}

impl ToBytes for EditListBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let version = if self
            .entries
            .iter()
            .any(|e| e.segment_duration > u32::MAX as u64 || e.media_time.unsigned_abs() > i32::MAX as u64)
        {
            1
        } else {
            0
        };
        let mut w = BoxWriter::new_full(stream, self.fourcc(), version, 0)?;
        (self.entries.len() as u32).to_bytes(&mut w)?;
        for e in &self.entries {
            e.to_bytes_versioned(&mut w, version)?;
        }
        Ok(())
    }
}

/// Edit box (`edts`): wraps a single `elst`.
#[derive(Clone, Debug, Default)]
pub struct EditBox {
    pub edit_list: Option<EditListBox>,
}

impl BoxInfo for EditBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("edts")
    }
}

impl FromBytes for EditBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new(stream)?;
        let mut edit_list = None;
        while r.left() >= 8 {
            if r.peek_fourcc()? == FourCC::new("elst") {
                edit_list = Some(EditListBox::from_bytes(&mut r)?);
            } else {
                let mut inner = BoxReader::new(&mut r)?;
                GenericBox::from_bytes(&mut inner)?;
            }
        }
        Ok(EditBox { edit_list })
    }
    fn min_size() -> usize {
        0
    }
}

impl ToBytes for EditBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new(stream, self.fourcc())?;
        if let Some(elst) = &self.edit_list {
            elst.to_bytes(&mut w)?;
        }
        Ok(())
    }
}

/// Media header (`mdhd`): per-track timescale/duration/language.
#[derive(Clone, Debug)]
pub struct MediaHeaderBox {
    pub creation_time: Time,
    pub modification_time: Time,
    pub timescale: u32,
    pub duration: u64,
    pub language: IsoLanguageCode,
}

impl BoxInfo for MediaHeaderBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("mdhd")
    }
}

impl FromBytes for MediaHeaderBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new_full(stream)?;
        let (creation_time, modification_time, timescale, duration) = if r.version() == 1 {
            (
                Time::from_bytes(&mut r)?,
                Time::from_bytes(&mut r)?,
                u32::from_bytes(&mut r)?,
                u64::from_bytes(&mut r)?,
            )
        } else {
            (
                Time::from_bytes(&mut r)?,
                Time::from_bytes(&mut r)?,
                u32::from_bytes(&mut r)?,
                u32::from_bytes(&mut r)? as u64,
            )
        };
        let language = IsoLanguageCode::from_bytes(&mut r)?;
        r.skip(2)?; // pre_defined
        Ok(MediaHeaderBox {
            creation_time,
            modification_time,
            timescale,
            duration,
            language,
        })
    }
    fn min_size() -> usize {
        24
    }
}

impl ToBytes for MediaHeaderBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let version = if self.duration > u32::MAX as u64 { 1 } else { 0 };
        let mut w = BoxWriter::new_full(stream, self.fourcc(), version, 0)?;
        if version == 1 {
            self.creation_time.to_bytes(&mut w)?;
            self.modification_time.to_bytes(&mut w)?;
            self.timescale.to_bytes(&mut w)?;
            self.duration.to_bytes(&mut w)?;
        } else {
            self.creation_time.to_bytes(&mut w)?;
            self.modification_time.to_bytes(&mut w)?;
            self.timescale.to_bytes(&mut w)?;
            (self.duration as u32).to_bytes(&mut w)?;
        }
        self.language.to_bytes(&mut w)?;
        w.skip(2)
    }
}

/// Media information box (`minf`): wraps `stbl` (and, for this profile,
/// nothing else we interpret -- `vmhd`/`smhd`/`dinf` round-trip as
/// opaque children).
#[derive(Clone, Debug, Default)]
pub struct MediaInformationBox {
    pub sample_table: Option<SampleTableBox>,
    pub other_boxes: Vec<GenericBox>,
}

impl BoxInfo for MediaInformationBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("minf")
    }
}

impl FromBytes for MediaInformationBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new(stream)?;
        let mut sample_table = None;
        let mut other_boxes = Vec::new();
        while r.left() >= 8 {
            if r.peek_fourcc()? == FourCC::new("stbl") {
                sample_table = Some(SampleTableBox::from_bytes(&mut r)?);
            } else {
                let mut inner = BoxReader::new(&mut r)?;
                other_boxes.push(GenericBox::from_bytes(&mut inner)?);
            }
        }
        Ok(MediaInformationBox {
            sample_table,
            other_boxes,
        })
    }
    fn min_size() -> usize {
        0
    }
}

impl ToBytes for MediaInformationBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new(stream, self.fourcc())?;
        for b in &self.other_boxes {
            b.to_bytes(&mut w)?;
        }
        if let Some(stbl) = &self.sample_table {
            stbl.to_bytes(&mut w)?;
        }
        Ok(())
    }
}

/// Media box (`mdia`): `mdhd` + `hdlr` + `minf`.
#[derive(Clone, Debug)]
pub struct MediaBox {
    pub header: MediaHeaderBox,
    pub handler: HandlerBox,
    pub information: MediaInformationBox,
}

impl BoxInfo for MediaBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("mdia")
    }
}

impl FromBytes for MediaBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new(stream)?;
        let mut header = None;
        let mut handler = None;
        let mut information = None;
        while r.left() >= 8 {
            match r.peek_fourcc()?.to_be_bytes().as_ref() {
                b"mdhd" => header = Some(MediaHeaderBox::from_bytes(&mut r)?),
                b"hdlr" => handler = Some(HandlerBox::from_bytes(&mut r)?),
                b"minf" => information = Some(MediaInformationBox::from_bytes(&mut r)?),
                _ => {
                    let mut inner = BoxReader::new(&mut r)?;
                    GenericBox::from_bytes(&mut inner)?;
                }
            }
        }
        Ok(MediaBox {
            header: header.ok_or_else(|| HeifError::FileHeaderError("mdia missing mdhd".into()))?,
            handler: handler.ok_or_else(|| HeifError::FileHeaderError("mdia missing hdlr".into()))?,
            information: information.ok_or_else(|| HeifError::FileHeaderError("mdia missing minf".into()))?,
        })
    }
    fn min_size() -> usize {
        0
    }
}

impl ToBytes for MediaBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new(stream, self.fourcc())?;
        self.header.to_bytes(&mut w)?;
        self.handler.to_bytes(&mut w)?;
        self.information.to_bytes(&mut w)
    }
}

/// Track reference box (`tref`): typed references from one track to
/// another (`thmb`, `auxl`, `cdsc`).
#[derive(Clone, Debug, Default)]
pub struct TrackReferenceBox {
    pub references: Vec<(FourCC, Vec<SequenceId>)>,
}

impl BoxInfo for TrackReferenceBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("tref")
    }
}

impl FromBytes for TrackReferenceBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new(stream)?;
        let mut references = Vec::new();
        while r.left() >= 8 {
            let mut inner = BoxReader::new(&mut r)?;
            let reference_type = inner.fourcc;
            let mut ids = Vec::new();
            while inner.left() >= 4 {
                ids.push(SequenceId(u32::from_bytes(&mut inner)?));
            }
            references.push((reference_type, ids));
        }
        Ok(TrackReferenceBox { references })
    }
    fn min_size() -> usize {
        0
    }
}

impl ToBytes for TrackReferenceBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new(stream, self.fourcc())?;
        for (reference_type, ids) in &self.references {
            let mut inner = BoxWriter::new(&mut w, *reference_type)?;
            for id in ids {
                id.0.to_bytes(&mut inner)?;
            }
        }
        Ok(())
    }
}

/// Track box (`trak`): `tkhd` + optional `edts` + `mdia` + optional `tref`.
#[derive(Clone, Debug)]
pub struct TrackBox {
    pub header: TrackHeaderBox,
    pub edit: Option<EditBox>,
    pub media: MediaBox,
    pub track_reference: Option<TrackReferenceBox>,
}

impl BoxInfo for TrackBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("trak")
    }
}

impl FromBytes for TrackBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new(stream)?;
        let mut header = None;
        let mut edit = None;
        let mut media = None;
        let mut track_reference = None;
        while r.left() >= 8 {
            match r.peek_fourcc()?.to_be_bytes().as_ref() {
                b"tkhd" => header = Some(TrackHeaderBox::from_bytes(&mut r)?),
                b"edts" => edit = Some(EditBox::from_bytes(&mut r)?),
                b"mdia" => media = Some(MediaBox::from_bytes(&mut r)?),
                b"tref" => track_reference = Some(TrackReferenceBox::from_bytes(&mut r)?),
                _ => {
                    let mut inner = BoxReader::new(&mut r)?;
                    GenericBox::from_bytes(&mut inner)?;
                }
            }
        }
        Ok(TrackBox {
            header: header.ok_or_else(|| HeifError::FileHeaderError("trak missing tkhd".into()))?,
            edit,
            media: media.ok_or_else(|| HeifError::FileHeaderError("trak missing mdia".into()))?,
            track_reference,
        })
    }
    fn min_size() -> usize {
        0
    }
}

impl ToBytes for TrackBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new(stream, self.fourcc())?;
        self.header.to_bytes(&mut w)?;
        if let Some(edts) = &self.edit {
            edts.to_bytes(&mut w)?;
        }
        self.media.to_bytes(&mut w)?;
        if let Some(tref) = &self.track_reference {
            tref.to_bytes(&mut w)?;
        }
        Ok(())
    }
}

/// Movie box (`moov`): `mvhd` + one or more `trak`.
#[derive(Clone, Debug, Default)]
pub struct MovieBox {
    pub header: Option<MovieHeaderBox>,
    pub tracks: Vec<TrackBox>,
}

impl BoxInfo for MovieBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("moov")
    }
}

impl FromBytes for MovieBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new(stream)?;
        let mut header = None;
        let mut tracks = Vec::new();
        while r.left() >= 8 {
            match r.peek_fourcc()?.to_be_bytes().as_ref() {
                b"mvhd" => header = Some(MovieHeaderBox::from_bytes(&mut r)?),
                b"trak" => tracks.push(TrackBox::from_bytes(&mut r)?),
                _ => {
                    let mut inner = BoxReader::new(&mut r)?;
                    GenericBox::from_bytes(&mut inner)?;
                }
            }
        }
        Ok(MovieBox { header, tracks })
    }
    fn min_size() -> usize {
        0
    }
}

impl ToBytes for MovieBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new(stream, self.fourcc())?;
        if let Some(h) = &self.header {
            h.to_bytes(&mut w)?;
        }
        for t in &self.tracks {
            t.to_bytes(&mut w)?;
        }
        Ok(())
    }
}

impl MovieBox {
    pub fn track_idx_by_id(&self, track_id: u32) -> Option<usize> {
        self.tracks.iter().position(|t| t.header.track_id == track_id)
    }

    pub fn track_idx_by_handler(&self, handler: FourCC) -> Option<usize> {
        self.tracks
            .iter()
            .position(|t| t.media.handler.handler_type == handler)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tkhd_roundtrip_picks_version0_for_small_duration() {
        let tkhd = TrackHeaderBox {
            flags: TrackFlags::new(true, true, false),
            creation_time: Time::from_unix_secs(0),
            modification_time: Time::from_unix_secs(0),
            track_id: 1,
            duration: 9000,
            layer: 0,
            alternate_group: 0,
            volume: FixedFloat8_8::from(1.0),
            matrix: Matrix::default(),
            width: FixedFloat16_16::from(1920.0),
            height: FixedFloat16_16::from(1080.0),
        };
        let mut buf = Vec::new();
        tkhd.to_bytes(&mut buf).unwrap();
        let mut slice: &[u8] = &buf;
        let back = TrackHeaderBox::from_bytes(&mut slice).unwrap();
        assert_eq!(back.track_id, 1);
        assert!(back.flags.enabled());
        assert!(back.flags.in_movie());
    }

    #[test]
    fn elst_version1_for_negative_media_time() {
        let elst = EditListBox {
            entries: vec![EditListEntry {
                segment_duration: 1000,
                media_time: -1,
                media_rate: FixedFloat16_16::from(1.0),
            }],
        };
        let mut buf = Vec::new();
        elst.to_bytes(&mut buf).unwrap();
        let mut slice: &[u8] = &buf;
        let back = EditListBox::from_bytes(&mut slice).unwrap();
        assert_eq!(back.entries[0].media_time, -1);
    }

    #[test]
    fn tref_roundtrip() {
        let tref = TrackReferenceBox {
            references: vec![(FourCC::new("thmb"), vec![SequenceId(1)])],
        };
        let mut buf = Vec::new();
        tref.to_bytes(&mut buf).unwrap();
        let mut slice: &[u8] = &buf;
        let back = TrackReferenceBox::from_bytes(&mut slice).unwrap();
        assert_eq!(back.references[0].0, FourCC::new("thmb"));
        assert_eq!(back.references[0].1, vec![SequenceId(1)]);
    }
}
