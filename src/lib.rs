#[macro_use]
extern crate log;

#[macro_use]
pub mod serialize;
mod bitreader;
pub mod error;
pub mod heifbox;
pub mod io;
pub mod boxes;
pub mod decoderconfig;
pub mod model;
pub mod nal;
pub mod sampletable;
pub mod types;

mod allocator;
pub mod dump;
pub mod readwrite;

pub use error::{HeifError, Result};
pub use model::File;
