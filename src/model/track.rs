//! `Track`, `Sample`, and `DecoderConfig` (§3).
use crate::decoderconfig::{AudioSpecificConfig, AvcSpsInfo, HevcSpsInfo};
use crate::error::{HeifError, Result};
use crate::types::{DecoderConfigId, FourCC, ItemId, Matrix, SampleId, SequenceId};

/// A decoder-configuration record, keyed by its coding fourcc (§3,
/// §6.3). `raw` is the on-wire parameter-set blob (Annex-B NAL units
/// for video, the `AudioSpecificConfig` bytes for audio); `parsed` is
/// the normalized form recovered by `crate::decoderconfig`, absent
/// until something actually asks for it or parses it from `raw`.
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    pub media_type: FourCC,
    pub raw: Vec<u8>,
    pub parsed: Option<ParsedConfig>,
}

impl DecoderConfig {
    pub fn new(media_type: FourCC, raw: Vec<u8>) -> DecoderConfig {
        DecoderConfig { media_type, raw, parsed: None }
    }

    /// `convert_from_raw_data` (§6.3): the media type of a config must
    /// agree with the item/sample type that references it.
    pub fn check_media_format(&self, item_type: FourCC) -> Result<()> {
        if self.media_type != item_type {
            return Err(HeifError::InvalidMediaFormat { config: self.media_type, item: item_type });
        }
        Ok(())
    }
}

/// The normalized decoder-specific info recovered from `raw` (§4.4,
/// §6.3's `DecoderSpecificInfo` tag set collapsed to the parsed struct
/// shapes `crate::decoderconfig` already produces).
#[derive(Debug, Clone)]
pub enum ParsedConfig {
    Hevc(HevcSpsInfo),
    Avc(AvcSpsInfo),
    Aac(AudioSpecificConfig),
}

/// Handler type for a `trak` (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackHandler {
    Picture,
    Video,
    Sound,
}

impl TrackHandler {
    pub fn fourcc(&self) -> FourCC {
        match self {
            TrackHandler::Picture => FourCC::new("pict"),
            TrackHandler::Video => FourCC::new("vide"),
            TrackHandler::Sound => FourCC::new("soun"),
        }
    }
}

/// Typed track-reference kinds carried by `tref` (§3, §6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackReferenceKind {
    Thumbnail,
    Auxiliary,
    Description,
}

impl TrackReferenceKind {
    pub fn fourcc(&self) -> FourCC {
        match self {
            TrackReferenceKind::Thumbnail => FourCC::new("thmb"),
            TrackReferenceKind::Auxiliary => FourCC::new("auxl"),
            TrackReferenceKind::Description => FourCC::new("cdsc"),
        }
    }
}

/// An image sequence / timed-media track (§3).
#[derive(Debug, Clone)]
pub struct Track {
    pub handler: TrackHandler,
    pub timescale: u32,
    /// Feature bitmask mirroring `tkhd` flags: enabled / in-movie / in-preview.
    pub enabled: bool,
    pub in_movie: bool,
    pub in_preview: bool,
    pub matrix: Matrix,
    pub samples: Vec<Sample>,
    pub references: Vec<(TrackReferenceKind, Vec<SequenceId>)>,
    /// `edts/elst` entries, in the unrolled `(kind, time_span_ms,
    /// mdia_time_ms, numb_rept)` shape §4.6 describes, rather than the
    /// raw box fields -- sample-table synthesis turns this into an
    /// `EditListBox` at save time.
    pub edit_list: Vec<EditUnit>,
}

impl Track {
    pub fn new(handler: TrackHandler, timescale: u32) -> Track {
        Track {
            handler,
            timescale,
            enabled: true,
            in_movie: true,
            in_preview: true,
            matrix: Matrix::default(),
            samples: Vec::new(),
            references: Vec::new(),
            edit_list: Vec::new(),
        }
    }

    pub fn add_reference(&mut self, kind: TrackReferenceKind, target: SequenceId) {
        match self.references.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, targets)) => {
                if !targets.contains(&target) {
                    targets.push(target);
                }
            }
            None => self.references.push((kind, vec![target])),
        }
    }
}

/// One `elst` entry's semantics (§4.6): `empty`/`dwell`/`shift` map to
/// distinct `(media_time, rate)` pairs at synthesis time.
#[derive(Debug, Clone, Copy)]
pub enum EditUnit {
    Empty { time_span_ms: u32 },
    Dwell { time_span_ms: u32, mdia_time_ms: u32 },
    Shift { time_span_ms: u32, mdia_time_ms: u32, numb_rept: i32 },
}

/// A sample's role in the presentation graph (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleType {
    OutputReference,
    OutputNonReference,
    NonOutputReference,
}

/// One timed sample within a `Track` (§3).
#[derive(Debug, Clone)]
pub struct Sample {
    pub id: SampleId,
    pub media_type: FourCC,
    pub duration: u32,
    pub composition_offset: i32,
    pub sample_type: SampleType,
    pub decode_dependencies: Vec<SampleId>,
    pub data: Vec<u8>,
    pub decoder_config: Option<DecoderConfigId>,
    pub metadata_items: Vec<ItemId>,
}

impl Sample {
    pub fn new(id: SampleId, media_type: FourCC, duration: u32) -> Sample {
        Sample {
            id,
            media_type,
            duration,
            composition_offset: 0,
            sample_type: SampleType::OutputReference,
            decode_dependencies: Vec::new(),
            data: Vec::new(),
            decoder_config: None,
            metadata_items: Vec::new(),
        }
    }

    /// Rejects self-references and de-duplicates (§4.5). Ordering
    /// (decode dependencies must refer only to earlier samples, §3
    /// invariant 8) is checked at sample-table synthesis time, where
    /// the full decode order is known.
    pub fn add_decode_dependency(&mut self, other: SampleId) -> Result<()> {
        if other == self.id {
            return Err(HeifError::InvalidFunctionParameter("sample cannot depend on itself".into()));
        }
        if !self.decode_dependencies.contains(&other) {
            self.decode_dependencies.push(other);
        }
        Ok(())
    }

    pub fn is_sync(&self) -> bool {
        matches!(self.sample_type, SampleType::OutputReference | SampleType::OutputNonReference) && self.decode_dependencies.is_empty()
    }

    /// §9 open question: left unimplemented rather than inventing
    /// semantics for what the source stubbed out.
    pub fn get_samples(_kind: SampleType, _index: usize) -> Result<Vec<SampleId>> {
        Err(HeifError::Todo("getSamples(TrackSampleType, index)"))
    }
}
