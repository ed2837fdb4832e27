//! Decoder-configuration parsers: HEVC/AVC SPS and AAC
//! `AudioSpecificConfig`, normalized into the shapes the object model
//! (§4.5) attaches to `DecoderConfig` entries -- §4.4.
pub mod aac;
pub mod avc;
pub mod hevc;

pub use aac::AudioSpecificConfig;
pub use avc::AvcSpsInfo;
pub use hevc::HevcSpsInfo;

/// Chroma sampling format, as signaled by HEVC/AVC SPS `chroma_format_idc`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChromaFormat {
    Monochrome,
    Yuv420,
    Yuv422,
    Yuv444,
}

impl ChromaFormat {
    pub fn from_idc(idc: u32) -> ChromaFormat {
        match idc {
            0 => ChromaFormat::Monochrome,
            1 => ChromaFormat::Yuv420,
            2 => ChromaFormat::Yuv422,
            _ => ChromaFormat::Yuv444,
        }
    }
}

/// Normalized geometry/format fields recovered from a video SPS,
/// independent of whether the source was HEVC or AVC.
#[derive(Clone, Debug)]
pub struct DecoderSpecificInfo {
    pub width: u32,
    pub height: u32,
    pub chroma_format: ChromaFormat,
    pub bit_depth_luma: u8,
    pub bit_depth_chroma: u8,
}
