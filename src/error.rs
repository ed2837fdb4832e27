//! The closed set of error kinds the crate can return.
//!
//! Every fallible public operation returns [`Result<T>`], a type alias
//! around [`HeifError`]. This mirrors the approach of the other ISOBMFF
//! crates in the ecosystem (`mp4`, `re_mp4`), which both wrap their
//! error sum with `thiserror` rather than threading raw `std::io::Error`
//! through the public API the way the original box-reader plumbing does
//! internally.

use crate::types::FourCC;

/// Crate-wide result type.
pub type Result<T> = std::result::Result<T, HeifError>;

/// All ways a read or write operation can fail.
#[derive(Debug, thiserror::Error)]
pub enum HeifError {
    #[error("failed to open file: {0}")]
    FileOpenError(#[source] std::io::Error),

    #[error("failed to read file: {0}")]
    FileReadError(#[source] std::io::Error),

    #[error("top-level box tree is malformed: {0}")]
    FileHeaderError(String),

    #[error("operation invoked before initialize")]
    Uninitialized,

    #[error("load invoked on a non-empty container")]
    AlreadyInitialized,

    #[error("ftyp brands have not been set")]
    BrandsNotSet,

    #[error("ftyp has already been written")]
    FtypAlreadyWritten,

    #[error("primary item has not been set")]
    PrimaryItemNotSet,

    #[error("primary item is hidden")]
    HiddenPrimaryItem,

    #[error("invalid item id: {0}")]
    InvalidItemId(u32),

    #[error("invalid sequence (track) id: {0}")]
    InvalidSequenceId(u32),

    #[error("invalid sequence-image (sample) id: {0}")]
    InvalidSequenceImageId(u32),

    #[error("invalid property index: {0}")]
    InvalidPropertyIndex(u32),

    #[error("invalid group id: {0}")]
    InvalidGroupId(u32),

    #[error("invalid decoder config id: {0}")]
    InvalidDecoderConfigId(u32),

    #[error("invalid media data id: {0}")]
    InvalidMediaDataId(u32),

    #[error("invalid function parameter: {0}")]
    InvalidFunctionParameter(String),

    #[error("reference count mismatch (grid/overlay source count)")]
    InvalidReferenceCount,

    #[error("decoder config media format {config} does not match item type {item}")]
    InvalidMediaFormat { config: FourCC, item: FourCC },

    #[error("unsupported code type: {0}")]
    UnsupportedCodeType(FourCC),

    #[error("media parsing error: {0}")]
    MediaParsingError(String),

    #[error("decoder configuration error: {0}")]
    DecoderConfigurationError(String),

    #[error("item is protected and was accessed via the non-raw path")]
    ProtectedItem,

    #[error("item is unprotected but was accessed via the protected path")]
    UnprotectedItem,

    #[error("buffer too small: need {needed}, have {have}")]
    BufferSizeTooSmall { needed: usize, have: usize },

    #[error("entity is already a member of this group")]
    AlreadyInGroup,

    #[error("value has already been set")]
    AlreadySet,

    #[error("index out of bounds: {index} (len {len})")]
    IndexOutOfBounds { index: usize, len: usize },

    #[error("handle does not refer to a live entity")]
    InvalidHandle,

    #[error("global allocator override already installed")]
    AllocatorAlreadySet,

    #[error("operation is not yet implemented: {0}")]
    Todo(&'static str),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HeifError {
    /// True for the two conditions §7 requires the *caller* (not us) to
    /// coerce to `Ok`: a load that found no primary item, and a reader
    /// delegate that had nothing to say about the transform matrix.
    ///
    /// `File::load` and the matrix getter call this internally; it is not
    /// meant to be used by downstream callers, who should never observe
    /// these variants escape at all.
    pub(crate) fn is_load_time_warning(&self) -> bool {
        matches!(self, HeifError::PrimaryItemNotSet)
    }
}
