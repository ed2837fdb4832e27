//! AAC `AudioSpecificConfig` parsing, including the escape forms for
//! Audio Object Type and sampling-frequency-index, and the
//! `program_config_element` channel-count fallback -- §4.4.
use crate::bitreader::{BitReader, BitWriter};
use crate::error::{HeifError, Result};

/// Standard sampling-frequency table (ISO/IEC 14496-3 Table 1.16).
pub const SAMPLE_RATE_TABLE: [u32; 13] = [
    96000, 88200, 64000, 48000, 44100, 32000, 24000, 22050, 16000, 12000, 11025, 8000, 7350,
];

/// Parsed `AudioSpecificConfig`.
#[derive(Clone, Debug)]
pub struct AudioSpecificConfig {
    pub audio_object_type: u8,
    pub sampling_frequency: u32,
    pub channel_count: u8,
    /// Present for SBR/PS extension configs (AOT 5/29): the actual core
    /// decoder object type and sample rate live here instead.
    pub extension_audio_object_type: Option<u8>,
    pub extension_sampling_frequency: Option<u32>,
}

fn get_sample_rate<R: FnMut(u8) -> Result<u32>>(mut get_bits: R) -> Result<(u32, u8)> {
    let idx = get_bits(4)? as usize;
    if idx == 0x0f {
        let explicit = get_bits(24)?;
        Ok((explicit, 0x0f))
    } else {
        Ok((*SAMPLE_RATE_TABLE.get(idx).unwrap_or(&0), idx as u8))
    }
}

fn get_audio_object_type(r: &mut BitReader) -> Result<u8> {
    let aot = r.get(5)? as u8;
    if aot == 31 {
        Ok(32 + r.get(6)? as u8)
    } else {
        Ok(aot)
    }
}

/// Channel counts implied by `channelConfiguration` (Table 1.19), used
/// when `program_config_element()` is absent (the common case).
fn channel_count_for_config(channel_config: u8) -> u8 {
    match channel_config {
        0 => 0, // defined by program_config_element, handled by caller
        1 => 1,
        2 => 2,
        3 => 3,
        4 => 4,
        5 => 5,
        6 => 6,
        7 => 8,
        _ => 0,
    }
}

/// Parse the program_config_element channel fallback (§1.1.6.3.2): sum
/// every declared element's channel contribution. Used only when
/// `channelConfiguration == 0`.
fn parse_program_config_element(r: &mut BitReader) -> Result<u8> {
    let _element_instance_tag = r.get(4)?;
    let _object_type = r.get(2)?;
    let _sampling_frequency_index = r.get(4)?;
    let num_front_channel_elements = r.get(4)?;
    let num_side_channel_elements = r.get(4)?;
    let num_back_channel_elements = r.get(4)?;
    let num_lfe_channel_elements = r.get(2)?;
    let num_assoc_data_elements = r.get(3)?;
    let num_valid_cc_elements = r.get(4)?;

    let mut channels = 0u32;
    let mut cpe_flags = Vec::new();
    for _ in 0..num_front_channel_elements {
        let is_cpe = r.get_bit()?;
        cpe_flags.push(is_cpe);
        let _tag = r.get(4)?;
        channels += if is_cpe { 2 } else { 1 };
    }
    for _ in 0..num_side_channel_elements {
        let is_cpe = r.get_bit()?;
        let _tag = r.get(4)?;
        channels += if is_cpe { 2 } else { 1 };
    }
    for _ in 0..num_back_channel_elements {
        let is_cpe = r.get_bit()?;
        let _tag = r.get(4)?;
        channels += if is_cpe { 2 } else { 1 };
    }
    for _ in 0..num_lfe_channel_elements {
        let _tag = r.get(4)?;
        channels += 1;
    }
    for _ in 0..num_assoc_data_elements {
        let _tag = r.get(4)?;
    }
    for _ in 0..num_valid_cc_elements {
        let _is_ind_sw = r.get_bit()?;
        let _tag = r.get(4)?;
    }
    r.byte_align();
    let comment_field_bytes = r.get(8)?;
    for _ in 0..comment_field_bytes {
        r.get(8)?;
    }
    Ok(channels.min(u8::MAX as u32) as u8)
}

/// `GASpecificConfig()` (§4.4.1, ISO/IEC 14496-3) -- only the
/// `program_config_element` fallback matters to us; the remaining
/// fields (frameLengthFlag, extensions) don't affect channel/sample
/// rate recovery and are consumed without interpretation by the caller
/// stopping once the needed fields are read.
fn ga_specific_config_channels(r: &mut BitReader, channel_config: u8) -> Result<u8> {
    let _frame_length_flag = r.get_bit()?;
    let depends_on_core_coder = r.get_bit()?;
    if depends_on_core_coder {
        let _core_coder_delay = r.get(14)?;
    }
    let extension_flag = r.get_bit()?;
    let channels = if channel_config == 0 {
        parse_program_config_element(r)?
    } else {
        channel_count_for_config(channel_config)
    };
    if extension_flag {
        // object-type-specific extension bits follow; we don't need them.
    }
    Ok(channels)
}

/// Parse a raw `AudioSpecificConfig` byte blob (as stored in `esds`'s
/// `DecoderSpecificInfo`).
pub fn parse_audio_specific_config(data: &[u8]) -> Result<AudioSpecificConfig> {
    if data.is_empty() {
        return Err(HeifError::MediaParsingError("AudioSpecificConfig is empty".into()));
    }
    let mut r = BitReader::new(data);
    let audio_object_type = get_audio_object_type(&mut r)?;
    let (sampling_frequency, _sfi) = get_sample_rate(|n| r.get(n))?;
    let channel_config = r.get(4)? as u8;

    let mut extension_audio_object_type = None;
    let mut extension_sampling_frequency = None;

    let mut core_object_type = audio_object_type;
    if audio_object_type == 5 || audio_object_type == 29 {
        extension_audio_object_type = Some(5);
        let (ext_rate, _) = get_sample_rate(|n| r.get(n))?;
        extension_sampling_frequency = Some(ext_rate);
        core_object_type = get_audio_object_type(&mut r)?;
        if core_object_type == 22 {
            let _ext_channel_config = r.get(4)?;
        }
    }

    let channel_count = match core_object_type {
        1 | 2 | 3 | 4 | 6 | 7 | 17 | 19 | 20 | 21 | 22 | 23 => {
            ga_specific_config_channels(&mut r, channel_config)?
        }
        _ => channel_count_for_config(channel_config),
    };

    Ok(AudioSpecificConfig {
        audio_object_type,
        sampling_frequency,
        channel_count,
        extension_audio_object_type,
        extension_sampling_frequency,
    })
}

/// Serialize a minimal (no SBR/PS, no program_config_element)
/// `AudioSpecificConfig` for AAC-LC, the profile this crate writes.
pub fn write_aac_lc_config(sampling_frequency: u32, channel_config: u8) -> Vec<u8> {
    let mut w = BitWriter::new();
    w.put_bits(2, 5); // audioObjectType == 2 (AAC LC)
    match SAMPLE_RATE_TABLE.iter().position(|&r| r == sampling_frequency) {
        Some(idx) => w.put_bits(idx as u32, 4),
        None => {
            w.put_bits(0x0f, 4);
            w.put_bits(sampling_frequency, 24);
        }
    }
    w.put_bits(channel_config as u32, 4);
    // GASpecificConfig: frameLengthFlag=0, dependsOnCoreCoder=0, extensionFlag=0
    w.put_bit(false);
    w.put_bit(false);
    w.put_bit(false);
    w.byte_align();
    w.into_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_aac_lc_stereo_44100() {
        let data = write_aac_lc_config(44100, 2);
        let config = parse_audio_specific_config(&data).unwrap();
        assert_eq!(config.audio_object_type, 2);
        assert_eq!(config.sampling_frequency, 44100);
        assert_eq!(config.channel_count, 2);
    }

    #[test]
    fn parses_explicit_sample_rate_escape() {
        let data = write_aac_lc_config(12345, 1);
        let config = parse_audio_specific_config(&data).unwrap();
        assert_eq!(config.sampling_frequency, 12345);
        assert_eq!(config.channel_count, 1);
    }

    #[test]
    fn rejects_empty_config() {
        assert!(parse_audio_specific_config(&[]).is_err());
    }
}
