//! Sample entries (`hvc1`/`avc1`/`mp4a`) and their decoder configuration
//! record boxes (`hvcC`/`avcC`/`esds`), calling into
//! [`crate::decoderconfig`] for the SPS/AudioSpecificConfig fields §4.4
//! needs.
use crate::decoderconfig::{avc, hevc};
use crate::error::Result;
use crate::heifbox::{BoxInfo, BoxReader, BoxWriter, GenericBox};
use crate::nal::{length_prefixed_to_nal_units, nal_units_to_length_prefixed};
use crate::serialize::{FromBytes, ReadBytes, ToBytes, WriteBytes};
use crate::types::{FixedFloat16_16, FourCC};

/// One NAL array entry inside `hvcC`/`avcC` (`array_completeness`, NAL
/// unit type, and the raw NAL units of that type).
#[derive(Clone, Debug)]
pub struct NalArray {
    pub array_completeness: bool,
    pub nal_unit_type: u8,
    pub nal_units: Vec<Vec<u8>>,
}

/// HEVC Decoder Configuration Record (`hvcC`), ISO/IEC 14496-15 §8.3.3.
#[derive(Clone, Debug)]
pub struct HevcConfigurationBox {
    pub general_profile_space: u8,
    pub general_tier_flag: bool,
    pub general_profile_idc: u8,
    pub general_profile_compatibility_flags: u32,
    pub general_constraint_indicator_flags: u64,
    pub general_level_idc: u8,
    pub min_spatial_segmentation_idc: u16,
    pub parallelism_type: u8,
    pub chroma_format: u8,
    pub bit_depth_luma_minus8: u8,
    pub bit_depth_chroma_minus8: u8,
    pub avg_frame_rate: u16,
    pub constant_frame_rate: u8,
    pub num_temporal_layers: u8,
    pub temporal_id_nested: bool,
    pub length_size_minus_one: u8,
    pub arrays: Vec<NalArray>,
}

impl HevcConfigurationBox {
    /// Concatenate all VPS/SPS/PPS NAL units, in array order.
    pub fn parameter_set_nal_units(&self) -> Vec<&[u8]> {
        self.arrays.iter().flat_map(|a| a.nal_units.iter().map(|n| n.as_slice())).collect()
    }

    /// Width/height/chroma/bit-depth recovered from the first SPS NAL.
    pub fn decoder_info(&self) -> Result<hevc::HevcSpsInfo> {
        let sps = self
            .arrays
            .iter()
            .find(|a| a.nal_unit_type == 33)
            .and_then(|a| a.nal_units.first())
            .ok_or_else(|| crate::error::HeifError::MediaParsingError("hvcC has no SPS".into()))?;
        hevc::parse_sps(sps)
    }
}

impl BoxInfo for HevcConfigurationBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("hvcC")
    }
}

impl FromBytes for HevcConfigurationBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new(stream)?;
        let _configuration_version = u8::from_bytes(&mut r)?;
        let b1 = u8::from_bytes(&mut r)?;
        let general_profile_space = (b1 >> 6) & 0x3;
        let general_tier_flag = (b1 & 0x20) != 0;
        let general_profile_idc = b1 & 0x1f;
        let general_profile_compatibility_flags = u32::from_bytes(&mut r)?;
        let hi = u32::from_bytes(&mut r)? as u64;
        let lo = u16::from_bytes(&mut r)? as u64;
        let general_constraint_indicator_flags = (hi << 16) | lo;
        let general_level_idc = u8::from_bytes(&mut r)?;
        let min_spatial_segmentation_idc = u16::from_bytes(&mut r)? & 0x0fff;
        let parallelism_type = u8::from_bytes(&mut r)? & 0x3;
        let chroma_format = u8::from_bytes(&mut r)? & 0x3;
        let bit_depth_luma_minus8 = u8::from_bytes(&mut r)? & 0x7;
        let bit_depth_chroma_minus8 = u8::from_bytes(&mut r)? & 0x7;
        let avg_frame_rate = u16::from_bytes(&mut r)?;
        let b2 = u8::from_bytes(&mut r)?;
        let constant_frame_rate = (b2 >> 6) & 0x3;
        let num_temporal_layers = (b2 >> 3) & 0x7;
        let temporal_id_nested = (b2 & 0x4) != 0;
        let length_size_minus_one = b2 & 0x3;

        let num_arrays = u8::from_bytes(&mut r)?;
        let mut arrays = Vec::with_capacity(num_arrays as usize);
        for _ in 0..num_arrays {
            let hdr = u8::from_bytes(&mut r)?;
            let array_completeness = (hdr & 0x80) != 0;
            let nal_unit_type = hdr & 0x3f;
            let num_nalus = u16::from_bytes(&mut r)?;
            let mut nal_units = Vec::with_capacity(num_nalus as usize);
            for _ in 0..num_nalus {
                let len = u16::from_bytes(&mut r)? as u64;
                nal_units.push(r.read(len)?.to_vec());
            }
            arrays.push(NalArray {
                array_completeness,
                nal_unit_type,
                nal_units,
            });
        }

        Ok(HevcConfigurationBox {
            general_profile_space,
            general_tier_flag,
            general_profile_idc,
            general_profile_compatibility_flags,
            general_constraint_indicator_flags,
            general_level_idc,
            min_spatial_segmentation_idc,
            parallelism_type,
            chroma_format,
            bit_depth_luma_minus8,
            bit_depth_chroma_minus8,
            avg_frame_rate,
            constant_frame_rate,
            num_temporal_layers,
            temporal_id_nested,
            length_size_minus_one,
            arrays,
        })
    }
    fn min_size() -> usize {
        23
    }
}

impl ToBytes for HevcConfigurationBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new(stream, self.fourcc())?;
        1u8.to_bytes(&mut w)?; // configurationVersion
        let b1 = (self.general_profile_space << 6)
            | (if self.general_tier_flag { 0x20 } else { 0 })
            | (self.general_profile_idc & 0x1f);
        b1.to_bytes(&mut w)?;
        self.general_profile_compatibility_flags.to_bytes(&mut w)?;
        ((self.general_constraint_indicator_flags >> 16) as u32).to_bytes(&mut w)?;
        ((self.general_constraint_indicator_flags & 0xffff) as u16).to_bytes(&mut w)?;
        self.general_level_idc.to_bytes(&mut w)?;
        (self.min_spatial_segmentation_idc | 0xf000).to_bytes(&mut w)?;
        (self.parallelism_type | 0xfc).to_bytes(&mut w)?;
        (self.chroma_format | 0xfc).to_bytes(&mut w)?;
        (self.bit_depth_luma_minus8 | 0xf8).to_bytes(&mut w)?;
        (self.bit_depth_chroma_minus8 | 0xf8).to_bytes(&mut w)?;
        self.avg_frame_rate.to_bytes(&mut w)?;
        let b2 = (self.constant_frame_rate << 6)
            | (self.num_temporal_layers << 3)
            | (if self.temporal_id_nested { 0x4 } else { 0 })
            | (self.length_size_minus_one & 0x3);
        b2.to_bytes(&mut w)?;
        (self.arrays.len() as u8).to_bytes(&mut w)?;
        for array in &self.arrays {
            let hdr = (if array.array_completeness { 0x80 } else { 0 }) | (array.nal_unit_type & 0x3f);
            hdr.to_bytes(&mut w)?;
            (array.nal_units.len() as u16).to_bytes(&mut w)?;
            for nal in &array.nal_units {
                (nal.len() as u16).to_bytes(&mut w)?;
                w.write(nal)?;
            }
        }
        Ok(())
    }
}

/// AVC Decoder Configuration Record (`avcC`), ISO/IEC 14496-15 §5.2.4.1.
#[derive(Clone, Debug)]
pub struct AvcConfigurationBox {
    pub profile_idc: u8,
    pub constraint_set_flags: u8,
    pub level_idc: u8,
    pub length_size_minus_one: u8,
    pub sps: Vec<Vec<u8>>,
    pub pps: Vec<Vec<u8>>,
}

impl AvcConfigurationBox {
    pub fn decoder_info(&self) -> Result<avc::AvcSpsInfo> {
        let sps = self
            .sps
            .first()
            .ok_or_else(|| crate::error::HeifError::MediaParsingError("avcC has no SPS".into()))?;
        avc::parse_sps(sps)
    }

    pub fn codec_id(&self) -> String {
        format!("avc1.{:02x}{:02x}{:02x}", self.profile_idc, self.constraint_set_flags, self.level_idc)
    }
}

impl BoxInfo for AvcConfigurationBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("avcC")
    }
}

impl FromBytes for AvcConfigurationBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new(stream)?;
        let _configuration_version = u8::from_bytes(&mut r)?;
        let profile_idc = u8::from_bytes(&mut r)?;
        let constraint_set_flags = u8::from_bytes(&mut r)?;
        let level_idc = u8::from_bytes(&mut r)?;
        let length_size_minus_one = u8::from_bytes(&mut r)? & 0x3;
        let num_sps = u8::from_bytes(&mut r)? & 0x1f;
        let mut sps = Vec::with_capacity(num_sps as usize);
        for _ in 0..num_sps {
            let len = u16::from_bytes(&mut r)? as u64;
            sps.push(r.read(len)?.to_vec());
        }
        let num_pps = u8::from_bytes(&mut r)?;
        let mut pps = Vec::with_capacity(num_pps as usize);
        for _ in 0..num_pps {
            let len = u16::from_bytes(&mut r)? as u64;
            pps.push(r.read(len)?.to_vec());
        }
        Ok(AvcConfigurationBox {
            profile_idc,
            constraint_set_flags,
            level_idc,
            length_size_minus_one,
            sps,
            pps,
        })
    }
    fn min_size() -> usize {
        7
    }
}

impl ToBytes for AvcConfigurationBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new(stream, self.fourcc())?;
        1u8.to_bytes(&mut w)?;
        self.profile_idc.to_bytes(&mut w)?;
        self.constraint_set_flags.to_bytes(&mut w)?;
        self.level_idc.to_bytes(&mut w)?;
        (self.length_size_minus_one | 0xfc).to_bytes(&mut w)?;
        ((self.sps.len() as u8) | 0xe0).to_bytes(&mut w)?;
        for sps in &self.sps {
            (sps.len() as u16).to_bytes(&mut w)?;
            w.write(sps)?;
        }
        (self.pps.len() as u8).to_bytes(&mut w)?;
        for pps in &self.pps {
            (pps.len() as u16).to_bytes(&mut w)?;
            w.write(pps)?;
        }
        Ok(())
    }
}

/// Elementary Stream Descriptor box (`esds`), carrying the
/// `AudioSpecificConfig` for `mp4a` samples -- simplified to the single
/// `AAC-LC` descriptor chain this crate writes, while still parsing the
/// full MPEG-4 descriptor-tag framing on read.
#[derive(Clone, Debug)]
pub struct EsdsBox {
    pub object_type: u8,
    pub stream_type: u8,
    pub max_bitrate: u32,
    pub avg_bitrate: u32,
    pub decoder_specific_info: Vec<u8>,
}

impl EsdsBox {
    pub fn audio_config(&self) -> Result<crate::decoderconfig::AudioSpecificConfig> {
        crate::decoderconfig::aac::parse_audio_specific_config(&self.decoder_specific_info)
    }
}

const ESDESCRIPTOR_TAG: u8 = 0x03;
const DECODER_CONFIG_DESCRIPTOR_TAG: u8 = 0x04;
const DECODER_SPECIFIC_INFO_TAG: u8 = 0x05;
const SLCONFIG_DESCRIPTOR_TAG: u8 = 0x06;

fn read_descriptor_header<R: ReadBytes>(stream: &mut R) -> Result<(u8, u32)> {
    let tag = u8::from_bytes(stream)?;
    let mut size = 0u32;
    for i in 1..=4 {
        let b = u8::from_bytes(stream)?;
        size = (size << 7) | ((b & 0x7f) as u32);
        if b & 0x80 == 0 {
            break;
        }
        if i == 4 {
            return Err(crate::error::HeifError::MediaParsingError("descriptor length field too long".into()));
        }
    }
    Ok((tag, size))
}

fn write_descriptor_header<W: WriteBytes>(stream: &mut W, tag: u8, size: u32) -> Result<()> {
    tag.to_bytes(stream)?;
    let mut buf = [0u8; 4];
    let mut s = size;
    for idx in (0..=3).rev() {
        let mut b = (s & 0x7f) as u8;
        s >>= 7;
        if idx != 3 {
            b |= 0x80;
        }
        buf[idx] = b;
    }
    stream.write(&buf[..])
}

impl BoxInfo for EsdsBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("esds")
    }
}

impl FromBytes for EsdsBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new_full(stream)?;
        let (tag, _size) = read_descriptor_header(&mut r)?;
        if tag != ESDESCRIPTOR_TAG {
            return Err(crate::error::HeifError::MediaParsingError("esds missing ES_Descriptor".into()));
        }
        let _es_id = u16::from_bytes(&mut r)?;
        let flags = u8::from_bytes(&mut r)?;
        if flags & 0x80 != 0 {
            let _depends_on_es_id = u16::from_bytes(&mut r)?;
        }
        if flags & 0x40 != 0 {
            let len = u8::from_bytes(&mut r)? as u64;
            r.read(len)?;
        }
        if flags & 0x20 != 0 {
            let _ocr_es_id = u16::from_bytes(&mut r)?;
        }

        let (dc_tag, _dc_size) = read_descriptor_header(&mut r)?;
        if dc_tag != DECODER_CONFIG_DESCRIPTOR_TAG {
            return Err(crate::error::HeifError::MediaParsingError("esds missing DecoderConfigDescriptor".into()));
        }
        let object_type = u8::from_bytes(&mut r)?;
        let b = u32::from_bytes(&mut r)?;
        let stream_type = ((b >> 26) & 0x3f) as u8;
        let max_bitrate = u32::from_bytes(&mut r)?;
        let avg_bitrate = u32::from_bytes(&mut r)?;

        let (si_tag, si_size) = read_descriptor_header(&mut r)?;
        let decoder_specific_info = if si_tag == DECODER_SPECIFIC_INFO_TAG {
            r.read(si_size as u64)?.to_vec()
        } else {
            Vec::new()
        };

        // SLConfigDescriptor, ignored beyond consuming its bytes.
        if r.left() >= 2 {
            let (sl_tag, sl_size) = read_descriptor_header(&mut r)?;
            if sl_tag == SLCONFIG_DESCRIPTOR_TAG && sl_size > 0 {
                r.skip(sl_size as u64)?;
            }
        }

        Ok(EsdsBox {
            object_type,
            stream_type,
            max_bitrate,
            avg_bitrate,
            decoder_specific_info,
        })
    }
    fn min_size() -> usize {
        0
    }
}

impl ToBytes for EsdsBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new_full(stream, self.fourcc(), 0, 0)?;

        let dsi_size = self.decoder_specific_info.len() as u32;
        let sl_size = 1u32;
        let dc_size = 1 + 3 + 4 + 4 + (1 + 4 + dsi_size);
        let es_size = 2 + 1 + (1 + 4 + dc_size) + (1 + 4 + sl_size);

        write_descriptor_header(&mut w, ESDESCRIPTOR_TAG, es_size)?;
        0u16.to_bytes(&mut w)?; // es_id
        0u8.to_bytes(&mut w)?; // flags

        write_descriptor_header(&mut w, DECODER_CONFIG_DESCRIPTOR_TAG, dc_size)?;
        self.object_type.to_bytes(&mut w)?;
        let b: u32 = ((self.stream_type as u32) << 26) | (1 << 25);
        b.to_bytes(&mut w)?;
        self.max_bitrate.to_bytes(&mut w)?;
        self.avg_bitrate.to_bytes(&mut w)?;

        write_descriptor_header(&mut w, DECODER_SPECIFIC_INFO_TAG, dsi_size)?;
        w.write(&self.decoder_specific_info)?;

        write_descriptor_header(&mut w, SLCONFIG_DESCRIPTOR_TAG, sl_size)?;
        2u8.to_bytes(&mut w)?; // configType = MP4

        Ok(())
    }
}

/// HEVC video sample entry (`hvc1`).
#[derive(Clone, Debug)]
pub struct HevcSampleEntry {
    pub data_reference_index: u16,
    pub width: u16,
    pub height: u16,
    pub horizresolution: FixedFloat16_16,
    pub vertresolution: FixedFloat16_16,
    pub frame_count: u16,
    pub depth: u16,
    pub config: HevcConfigurationBox,
    pub other_boxes: Vec<GenericBox>,
}

impl BoxInfo for HevcSampleEntry {
    fn fourcc(&self) -> FourCC {
        FourCC::new("hvc1")
    }
}

impl FromBytes for HevcSampleEntry {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new(stream)?;
        r.skip(6)?;
        let data_reference_index = u16::from_bytes(&mut r)?;
        r.skip(16)?;
        let width = u16::from_bytes(&mut r)?;
        let height = u16::from_bytes(&mut r)?;
        let horizresolution = FixedFloat16_16::from_bytes(&mut r)?;
        let vertresolution = FixedFloat16_16::from_bytes(&mut r)?;
        r.skip(4)?;
        let frame_count = u16::from_bytes(&mut r)?;
        r.skip(32)?;
        let depth = u16::from_bytes(&mut r)?;
        r.skip(2)?; // pre_defined = -1

        let mut config = None;
        let mut other_boxes = Vec::new();
        while r.left() >= 8 {
            let fourcc = {
                let bytes = r.peek(8)?;
                FourCC::from(&bytes[4..8])
            };
            if fourcc == FourCC::new("hvcC") {
                config = Some(HevcConfigurationBox::from_bytes(&mut r)?);
            } else {
                let mut inner = BoxReader::new(&mut r)?;
                other_boxes.push(GenericBox::from_bytes(&mut inner)?);
            }
        }

        Ok(HevcSampleEntry {
            data_reference_index,
            width,
            height,
            horizresolution,
            vertresolution,
            frame_count,
            depth,
            config: config
                .ok_or_else(|| crate::error::HeifError::MediaParsingError("hvc1 missing hvcC".into()))?,
            other_boxes,
        })
    }
    fn min_size() -> usize {
        78
    }
}

impl ToBytes for HevcSampleEntry {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new(stream, self.fourcc())?;
        w.skip(6)?;
        self.data_reference_index.to_bytes(&mut w)?;
        w.skip(16)?;
        self.width.to_bytes(&mut w)?;
        self.height.to_bytes(&mut w)?;
        self.horizresolution.to_bytes(&mut w)?;
        self.vertresolution.to_bytes(&mut w)?;
        w.skip(4)?;
        self.frame_count.to_bytes(&mut w)?;
        w.skip(32)?;
        self.depth.to_bytes(&mut w)?;
        0xffffu16.to_bytes(&mut w)?;
        self.config.to_bytes(&mut w)?;
        for b in &self.other_boxes {
            b.to_bytes(&mut w)?;
        }
        Ok(())
    }
}

/// AVC video sample entry (`avc1`).
#[derive(Clone, Debug)]
pub struct AvcSampleEntry {
    pub data_reference_index: u16,
    pub width: u16,
    pub height: u16,
    pub horizresolution: FixedFloat16_16,
    pub vertresolution: FixedFloat16_16,
    pub frame_count: u16,
    pub depth: u16,
    pub config: AvcConfigurationBox,
    pub other_boxes: Vec<GenericBox>,
}

impl BoxInfo for AvcSampleEntry {
    fn fourcc(&self) -> FourCC {
        FourCC::new("avc1")
    }
}

impl FromBytes for AvcSampleEntry {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new(stream)?;
        r.skip(6)?;
        let data_reference_index = u16::from_bytes(&mut r)?;
        r.skip(16)?;
        let width = u16::from_bytes(&mut r)?;
        let height = u16::from_bytes(&mut r)?;
        let horizresolution = FixedFloat16_16::from_bytes(&mut r)?;
        let vertresolution = FixedFloat16_16::from_bytes(&mut r)?;
        r.skip(4)?;
        let frame_count = u16::from_bytes(&mut r)?;
        r.skip(32)?;
        let depth = u16::from_bytes(&mut r)?;
        r.skip(2)?;

        let mut config = None;
        let mut other_boxes = Vec::new();
        while r.left() >= 8 {
            let fourcc = {
                let bytes = r.peek(8)?;
                FourCC::from(&bytes[4..8])
            };
            if fourcc == FourCC::new("avcC") {
                config = Some(AvcConfigurationBox::from_bytes(&mut r)?);
            } else {
                let mut inner = BoxReader::new(&mut r)?;
                other_boxes.push(GenericBox::from_bytes(&mut inner)?);
            }
        }

        Ok(AvcSampleEntry {
            data_reference_index,
            width,
            height,
            horizresolution,
            vertresolution,
            frame_count,
            depth,
            config: config
                .ok_or_else(|| crate::error::HeifError::MediaParsingError("avc1 missing avcC".into()))?,
            other_boxes,
        })
    }
    fn min_size() -> usize {
        78
    }
}

impl ToBytes for AvcSampleEntry {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new(stream, self.fourcc())?;
        w.skip(6)?;
        self.data_reference_index.to_bytes(&mut w)?;
        w.skip(16)?;
        self.width.to_bytes(&mut w)?;
        self.height.to_bytes(&mut w)?;
        self.horizresolution.to_bytes(&mut w)?;
        self.vertresolution.to_bytes(&mut w)?;
        w.skip(4)?;
        self.frame_count.to_bytes(&mut w)?;
        w.skip(32)?;
        self.depth.to_bytes(&mut w)?;
        0xffffu16.to_bytes(&mut w)?;
        self.config.to_bytes(&mut w)?;
        for b in &self.other_boxes {
            b.to_bytes(&mut w)?;
        }
        Ok(())
    }
}

/// AAC audio sample entry (`mp4a`).
#[derive(Clone, Debug)]
pub struct Mp4aSampleEntry {
    pub data_reference_index: u16,
    pub channel_count: u16,
    pub sample_size: u16,
    pub sample_rate: u32,
    pub esds: EsdsBox,
}

impl BoxInfo for Mp4aSampleEntry {
    fn fourcc(&self) -> FourCC {
        FourCC::new("mp4a")
    }
}

impl FromBytes for Mp4aSampleEntry {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new(stream)?;
        r.skip(6)?;
        let data_reference_index = u16::from_bytes(&mut r)?;
        r.skip(8)?;
        let channel_count = u16::from_bytes(&mut r)?;
        let sample_size = u16::from_bytes(&mut r)?;
        r.skip(4)?;
        let sample_rate_hi = u16::from_bytes(&mut r)?;
        let _sample_rate_lo = u16::from_bytes(&mut r)?;

        let esds = EsdsBox::from_bytes(&mut r)?;

        Ok(Mp4aSampleEntry {
            data_reference_index,
            channel_count,
            sample_size,
            sample_rate: sample_rate_hi as u32,
            esds,
        })
    }
    fn min_size() -> usize {
        28
    }
}

impl ToBytes for Mp4aSampleEntry {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new(stream, self.fourcc())?;
        w.skip(6)?;
        self.data_reference_index.to_bytes(&mut w)?;
        w.skip(8)?;
        self.channel_count.to_bytes(&mut w)?;
        self.sample_size.to_bytes(&mut w)?;
        w.skip(4)?;
        (self.sample_rate as u16).to_bytes(&mut w)?;
        0u16.to_bytes(&mut w)?;
        self.esds.to_bytes(&mut w)
    }
}

/// Convert a sample's length-prefixed NAL payload (as stored in `mdat`)
/// into Annex-B for callers that expect start codes, and back.
pub fn sample_to_annex_b(data: &[u8], length_size: u8) -> Result<Vec<u8>> {
    let units = length_prefixed_to_nal_units(data, length_size)?;
    Ok(crate::nal::nal_units_to_annex_b(&units))
}

pub fn annex_b_to_sample(data: &[u8], length_size: u8) -> Result<Vec<u8>> {
    let units = crate::nal::annex_b_to_nal_units(data)?;
    nal_units_to_length_prefixed(&units, length_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_hvcc() -> HevcConfigurationBox {
        HevcConfigurationBox {
            general_profile_space: 0,
            general_tier_flag: false,
            general_profile_idc: 1,
            general_profile_compatibility_flags: 0x6000_0000,
            general_constraint_indicator_flags: 0,
            general_level_idc: 93,
            min_spatial_segmentation_idc: 0,
            parallelism_type: 0,
            chroma_format: 1,
            bit_depth_luma_minus8: 0,
            bit_depth_chroma_minus8: 0,
            avg_frame_rate: 0,
            constant_frame_rate: 0,
            num_temporal_layers: 1,
            temporal_id_nested: true,
            length_size_minus_one: 3,
            arrays: vec![NalArray {
                array_completeness: true,
                nal_unit_type: 33,
                nal_units: vec![vec![0x42, 0x01, 0x02, 0x03]],
            }],
        }
    }

    #[test]
    fn hvcc_roundtrip() {
        let hvcc = sample_hvcc();
        let mut buf = Vec::new();
        hvcc.to_bytes(&mut buf).unwrap();
        let mut slice: &[u8] = &buf;
        let back = HevcConfigurationBox::from_bytes(&mut slice).unwrap();
        assert_eq!(back.general_profile_idc, 1);
        assert_eq!(back.length_size_minus_one, 3);
        assert_eq!(back.arrays[0].nal_units[0], vec![0x42, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn avcc_roundtrip() {
        let avcc = AvcConfigurationBox {
            profile_idc: 0x64,
            constraint_set_flags: 0,
            level_idc: 30,
            length_size_minus_one: 3,
            sps: vec![vec![1, 2, 3]],
            pps: vec![vec![4, 5]],
        };
        let mut buf = Vec::new();
        avcc.to_bytes(&mut buf).unwrap();
        let mut slice: &[u8] = &buf;
        let back = AvcConfigurationBox::from_bytes(&mut slice).unwrap();
        assert_eq!(back.codec_id(), "avc1.64001e");
        assert_eq!(back.sps, vec![vec![1, 2, 3]]);
    }

    #[test]
    fn esds_roundtrip() {
        let esds = EsdsBox {
            object_type: 0x40,
            stream_type: 5,
            max_bitrate: 128000,
            avg_bitrate: 128000,
            decoder_specific_info: vec![0x12, 0x10],
        };
        let mut buf = Vec::new();
        esds.to_bytes(&mut buf).unwrap();
        let mut slice: &[u8] = &buf;
        let back = EsdsBox::from_bytes(&mut slice).unwrap();
        assert_eq!(back.object_type, 0x40);
        assert_eq!(back.decoder_specific_info, vec![0x12, 0x10]);
    }
}
