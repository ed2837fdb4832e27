//! HEVC (H.265) SPS parsing, enough to recover width/height/chroma
//! format/bit depth for an `hvcC` decoder configuration record -- §4.4.
use crate::bitreader::BitReader;
use crate::error::{HeifError, Result};

use super::{ChromaFormat, DecoderSpecificInfo};

/// Fields recovered from an HEVC Sequence Parameter Set NAL unit.
#[derive(Clone, Debug)]
pub struct HevcSpsInfo {
    pub sps_id: u32,
    pub chroma_format: ChromaFormat,
    pub width: u32,
    pub height: u32,
    pub bit_depth_luma: u8,
    pub bit_depth_chroma: u8,
    pub general_profile_idc: u8,
    pub general_level_idc: u8,
}

impl From<HevcSpsInfo> for DecoderSpecificInfo {
    fn from(sps: HevcSpsInfo) -> DecoderSpecificInfo {
        DecoderSpecificInfo {
            width: sps.width,
            height: sps.height,
            chroma_format: sps.chroma_format,
            bit_depth_luma: sps.bit_depth_luma,
            bit_depth_chroma: sps.bit_depth_chroma,
        }
    }
}

/// Parse the raw SPS NAL unit body (NAL header included).
pub fn parse_sps(nal: &[u8]) -> Result<HevcSpsInfo> {
    if nal.len() < 2 {
        return Err(HeifError::MediaParsingError("HEVC SPS NAL too short".into()));
    }
    let nal_unit_type = (nal[0] >> 1) & 0x3f;
    if nal_unit_type != 33 {
        return Err(HeifError::MediaParsingError(format!(
            "expected HEVC SPS (nal_unit_type 33), got {}",
            nal_unit_type
        )));
    }
    // Skip the 2-byte NAL header.
    let mut r = BitReader::new(&nal[2..]);

    let _sps_video_parameter_set_id = r.get(4)?;
    let sps_max_sub_layers_minus1 = r.get(3)?;
    let _sps_temporal_id_nesting_flag = r.get_bit()?;

    let (general_profile_idc, general_level_idc) = parse_profile_tier_level(&mut r, sps_max_sub_layers_minus1 as u8)?;

    let sps_id = r.get_ue()?;
    let chroma_format_idc = r.get_ue()?;
    if chroma_format_idc == 3 {
        let _separate_colour_plane_flag = r.get_bit()?;
    }
    let width = r.get_ue()?;
    let height = r.get_ue()?;
    let conformance_window_flag = r.get_bit()?;
    if conformance_window_flag {
        let _left = r.get_ue()?;
        let _right = r.get_ue()?;
        let _top = r.get_ue()?;
        let _bottom = r.get_ue()?;
    }
    let bit_depth_luma = (r.get_ue()? + 8) as u8;
    let bit_depth_chroma = (r.get_ue()? + 8) as u8;

    Ok(HevcSpsInfo {
        sps_id,
        chroma_format: ChromaFormat::from_idc(chroma_format_idc),
        width,
        height,
        bit_depth_luma,
        bit_depth_chroma,
        general_profile_idc: general_profile_idc as u8,
        general_level_idc: general_level_idc as u8,
    })
}

/// `profile_tier_level()`, §7.3.3 of ITU-T H.265. Returns
/// `(general_profile_idc, general_level_idc)`.
fn parse_profile_tier_level(r: &mut BitReader, max_sub_layers_minus1: u8) -> Result<(u32, u32)> {
    let _general_profile_space = r.get(2)?;
    let _general_tier_flag = r.get_bit()?;
    let general_profile_idc = r.get(5)?;
    let _general_profile_compatibility_flags = r.get(32)?;
    // progressive/interlaced/non_packed/frame_only (4 bits) + 43 reserved + 1 inbld = 48 bits total.
    r.get(16)?;
    r.get(16)?;
    r.get(16)?;
    let general_level_idc = r.get(8)?;

    let mut sub_layer_profile_present = [false; 8];
    let mut sub_layer_level_present = [false; 8];
    for i in 0..max_sub_layers_minus1 as usize {
        sub_layer_profile_present[i] = r.get_bit()?;
        sub_layer_level_present[i] = r.get_bit()?;
    }
    if max_sub_layers_minus1 > 0 {
        for _ in max_sub_layers_minus1 as usize..8 {
            let _reserved_zero_2bits = r.get(2)?;
        }
    }
    for i in 0..max_sub_layers_minus1 as usize {
        if sub_layer_profile_present[i] {
            r.get(2)?; // profile_space
            r.get_bit()?; // tier_flag
            r.get(5)?; // profile_idc
            r.get(32)?; // compatibility flags
            r.get(16)?;
            r.get(16)?;
            r.get(16)?; // 48 bits of constraint/reserved flags
        }
        if sub_layer_level_present[i] {
            r.get(8)?; // sub_layer_level_idc
        }
    }
    Ok((general_profile_idc, general_level_idc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitreader::BitWriter;

    fn build_minimal_sps(width: u32, height: u32) -> Vec<u8> {
        // NAL header: forbidden_zero_bit=0, nal_unit_type=33 (SPS), layer_id=0, tid+1=1
        let header = [(33u8 << 1), 1u8];
        let mut w = BitWriter::new();
        w.put_bits(0, 4); // sps_video_parameter_set_id
        w.put_bits(0, 3); // sps_max_sub_layers_minus1 = 0
        w.put_bit(false); // sps_temporal_id_nesting_flag

        // profile_tier_level, max_sub_layers_minus1 == 0 so no sub-layer loop.
        w.put_bits(0, 2); // general_profile_space
        w.put_bit(false); // general_tier_flag
        w.put_bits(1, 5); // general_profile_idc
        w.put_bits(0, 32); // compatibility flags
        w.put_bits(0, 16);
        w.put_bits(0, 16);
        w.put_bits(0, 16);
        w.put_bits(120, 8); // general_level_idc

        w.put_ue(0); // sps_seq_parameter_set_id
        w.put_ue(1); // chroma_format_idc = 4:2:0
        w.put_ue(width);
        w.put_ue(height);
        w.put_bit(false); // conformance_window_flag
        w.put_ue(0); // bit_depth_luma_minus8
        w.put_ue(0); // bit_depth_chroma_minus8
        w.put_bit(true); // rbsp_stop_one_bit
        w.byte_align();

        let mut nal = header.to_vec();
        nal.extend(w.into_bytes());
        nal
    }

    #[test]
    fn parses_width_height_and_chroma() {
        let nal = build_minimal_sps(1920, 1080);
        let sps = parse_sps(&nal).unwrap();
        assert_eq!(sps.width, 1920);
        assert_eq!(sps.height, 1080);
        assert_eq!(sps.chroma_format, ChromaFormat::Yuv420);
        assert_eq!(sps.bit_depth_luma, 8);
        assert_eq!(sps.bit_depth_chroma, 8);
        assert_eq!(sps.general_level_idc, 120);
    }

    #[test]
    fn rejects_non_sps_nal() {
        let nal = [(1u8 << 1), 1u8, 0, 0];
        assert!(parse_sps(&nal).is_err());
    }
}
