//! Box body types, one module per box family -- §4.2/§6.1.
//!
//! Every box here implements [`crate::heifbox::BoxInfo`] plus
//! [`crate::serialize::FromBytes`]/[`crate::serialize::ToBytes`]
//! directly (no macro DSL): each box's layout is small and distinct
//! enough in this format that a hand-written impl reads more clearly
//! than a generated one.
pub mod ftyp;
pub mod grpl;
pub mod iprp;
pub mod mdat;
pub mod meta;
pub mod moov;
pub mod sampleentry;
pub mod stbl;

pub use ftyp::FileTypeBox;
pub use grpl::{EntityToGroupBox, EquivalenceTiming, GroupListBox};
pub use iprp::{
    ColourInformationBox, ImageMirrorProperty, ImageRotationProperty, ImageSpatialExtentsProperty,
    ItemPropertiesBox, ItemPropertyAssociation, ItemPropertyAssociationBox, ItemPropertyContainerBox,
    PixelInformationProperty, Property,
};
pub use mdat::MediaDataBox;
pub use meta::{
    ConstructionMethod, HandlerBox, ItemDataBox, ItemInfoBox, ItemInfoEntry, ItemLocationBox, ItemLocationEntry,
    ItemLocationExtent, ItemReference, ItemReferenceBox, MetaBox, PrimaryItemBox,
};
pub use moov::{
    EditBox, EditListBox, EditListEntry, MediaBox, MediaHeaderBox, MediaInformationBox, MovieBox, MovieHeaderBox,
    TrackBox, TrackFlags, TrackHeaderBox, TrackReferenceBox,
};
pub use sampleentry::{
    AvcConfigurationBox, AvcSampleEntry, EsdsBox, HevcConfigurationBox, HevcSampleEntry, Mp4aSampleEntry, NalArray,
};
pub use stbl::{
    ChunkOffsetBox, CompositionOffsetBox, CompositionOffsetEntry, CompositionToDecodeBox, SampleDescriptionBox,
    SampleEntry, SampleGroupDescriptionBox, SampleSizeBox, SampleTableBox, SampleToChunkBox, SampleToChunkEntry,
    SampleToGroupBox, SampleToGroupEntry, SyncSampleBox, TimeToSampleBox, TimeToSampleEntry,
};
