//! `Item` and its image-kind variants (§3 "Item", "ImageItem facet").
use crate::types::{DecoderConfigId, ItemId};

/// One entry in the metabox's item graph (`iinf`/`iloc`/`iref`).
#[derive(Debug, Clone)]
pub struct Item {
    pub id: ItemId,
    pub kind: ItemKind,
    pub hidden: bool,
    pub name: String,
    pub content_type: String,
    pub content_encoding: String,
    /// Ordered `(property-table index, essential)` pairs -- descriptives
    /// precede transformatives (§3 invariant 1), enforced by
    /// `File::associate_property` rather than by this type itself.
    pub associated_properties: Vec<(u16, bool)>,
    /// `ImageItem` facet (§3): present only for image-kind items.
    pub image: Option<ImageItemFacet>,
}

impl Item {
    pub fn new(id: ItemId, kind: ItemKind) -> Item {
        let image = kind.is_image_kind().then(ImageItemFacet::default);
        Item {
            id,
            kind,
            hidden: false,
            name: String::new(),
            content_type: String::new(),
            content_encoding: String::new(),
            associated_properties: Vec::new(),
            image,
        }
    }

    /// Severs every outgoing edge this item holds toward `target`:
    /// thumbnail/aux/metadata links on the `ImageItem` facet, and
    /// source-image slots on a derived image. Called by
    /// `File::remove_item` for every *other* live item (§3 lifecycle
    /// rule: deletion must sever back-links transactionally).
    pub fn sever_reference_to(&mut self, target: ItemId) {
        if let Some(image) = &mut self.image {
            image.thumbnails.retain(|id| *id != target);
            image.auxiliary_images.retain(|id| *id != target);
            image.metadata_items.retain(|id| *id != target);
        }
        match &mut self.kind {
            ItemKind::DerivedImage(DerivedImage::Grid { sources, .. }) => {
                for slot in sources.iter_mut() {
                    if *slot == Some(target) {
                        *slot = None;
                    }
                }
            }
            ItemKind::DerivedImage(DerivedImage::Overlay { sources, offsets, .. }) => {
                let kept: Vec<(ItemId, (i32, i32))> = sources
                    .drain(..)
                    .zip(offsets.drain(..))
                    .filter(|(id, _)| *id != target)
                    .collect();
                sources.extend(kept.iter().map(|(id, _)| *id));
                offsets.extend(kept.iter().map(|(_, off)| *off));
            }
            ItemKind::DerivedImage(DerivedImage::Identity { source }) => {
                if *source == Some(target) {
                    *source = None;
                }
            }
            _ => {}
        }
    }
}

/// Mixin fields shared by every image-kind item (§3 "ImageItem facet").
#[derive(Debug, Clone, Default)]
pub struct ImageItemFacet {
    pub width: u32,
    pub height: u32,
    pub thumbnails: Vec<ItemId>,
    pub auxiliary_images: Vec<ItemId>,
    pub metadata_items: Vec<ItemId>,
}

/// The `Item` variant tag (§3): coded image, derived image, or opaque
/// metadata item.
#[derive(Debug, Clone)]
pub enum ItemKind {
    CodedImage(CodedImage),
    DerivedImage(DerivedImage),
    MetaItem(MetaItem),
}

impl ItemKind {
    pub fn is_image_kind(&self) -> bool {
        matches!(self, ItemKind::CodedImage(_) | ItemKind::DerivedImage(_))
    }

    pub fn fourcc(&self) -> crate::types::FourCC {
        match self {
            ItemKind::CodedImage(CodedImage::Hevc { .. }) => crate::types::FourCC::new("hvc1"),
            ItemKind::CodedImage(CodedImage::Avc { .. }) => crate::types::FourCC::new("avc1"),
            ItemKind::CodedImage(CodedImage::Jpeg { .. }) => crate::types::FourCC::new("jpeg"),
            ItemKind::DerivedImage(DerivedImage::Grid { .. }) => crate::types::FourCC::new("grid"),
            ItemKind::DerivedImage(DerivedImage::Overlay { .. }) => crate::types::FourCC::new("iovl"),
            ItemKind::DerivedImage(DerivedImage::Identity { .. }) => crate::types::FourCC::new("iden"),
            ItemKind::MetaItem(MetaItem::Exif { .. }) => crate::types::FourCC::new("Exif"),
            ItemKind::MetaItem(MetaItem::Mime { .. }) => crate::types::FourCC::new("mime"),
        }
    }
}

/// A coded image item: an encoded-data blob plus a reference to its
/// `DecoderConfig` (§3; JPEG may omit the config per §9's open
/// question on the `CodedImage` config-optionality split).
#[derive(Debug, Clone)]
pub enum CodedImage {
    Hevc { data: Vec<u8>, decoder_config: Option<DecoderConfigId> },
    Avc { data: Vec<u8>, decoder_config: Option<DecoderConfigId> },
    Jpeg { data: Vec<u8>, decoder_config: Option<DecoderConfigId> },
}

impl CodedImage {
    /// AVC/HEVC require a non-null config at save time; JPEG does not
    /// (§3 invariant 3, §9 open question).
    pub fn requires_decoder_config(&self) -> bool {
        !matches!(self, CodedImage::Jpeg { .. })
    }

    pub fn decoder_config(&self) -> Option<DecoderConfigId> {
        match self {
            CodedImage::Hevc { decoder_config, .. }
            | CodedImage::Avc { decoder_config, .. }
            | CodedImage::Jpeg { decoder_config, .. } => *decoder_config,
        }
    }
}

// the enum match arm above also serves `File::check_save_invariants`,
// which reads the field through this accessor rather than destructuring
// the variant (kept here alongside the type it inspects).
impl Item {
    pub fn decoder_config_id(&self) -> Option<DecoderConfigId> {
        match &self.kind {
            ItemKind::CodedImage(c) => c.decoder_config(),
            _ => None,
        }
    }
}

/// A derived image item, built from other items rather than its own
/// coded bitstream (§3).
#[derive(Debug, Clone)]
pub enum DerivedImage {
    Grid {
        columns: u32,
        rows: u32,
        output_width: u32,
        output_height: u32,
        /// Row-major, `columns * rows` entries; `None` is an empty cell.
        sources: Vec<Option<ItemId>>,
    },
    Overlay {
        output_width: u32,
        output_height: u32,
        background_rgba: [u16; 4],
        sources: Vec<ItemId>,
        offsets: Vec<(i32, i32)>,
    },
    Identity { source: Option<ItemId> },
}

impl DerivedImage {
    pub fn new_grid(columns: u32, rows: u32, output_width: u32, output_height: u32) -> DerivedImage {
        DerivedImage::Grid {
            columns,
            rows,
            output_width,
            output_height,
            sources: vec![None; (columns * rows) as usize],
        }
    }

    /// `DerivedImage::Grid::resize` (§4.5): preserves overlapping cells
    /// by re-laying the old row-major grid out into the new dimensions,
    /// cell by cell, dropping anything that falls outside the new
    /// bounds and leaving new cells empty.
    pub fn resize_grid(&mut self, new_columns: u32, new_rows: u32) {
        if let DerivedImage::Grid { columns, rows, sources, .. } = self {
            let old_columns = *columns;
            let old_rows = *rows;
            let mut new_sources = vec![None; (new_columns * new_rows) as usize];
            for row in 0..old_rows.min(new_rows) {
                for col in 0..old_columns.min(new_columns) {
                    let old_index = (row * old_columns + col) as usize;
                    let new_index = (row * new_columns + col) as usize;
                    new_sources[new_index] = sources[old_index];
                }
            }
            *columns = new_columns;
            *rows = new_rows;
            *sources = new_sources;
        }
    }

    pub fn set_grid_image(&mut self, col: u32, row: u32, image: ItemId) -> crate::error::Result<()> {
        if let DerivedImage::Grid { columns, rows, sources, .. } = self {
            if col >= *columns || row >= *rows {
                return Err(crate::error::HeifError::IndexOutOfBounds {
                    index: (row * *columns + col) as usize,
                    len: sources.len(),
                });
            }
            sources[(row * *columns + col) as usize] = Some(image);
        }
        Ok(())
    }

    pub fn grid_image(&self, col: u32, row: u32) -> Option<ItemId> {
        if let DerivedImage::Grid { columns, sources, .. } = self {
            sources.get((row * *columns + col) as usize).copied().flatten()
        } else {
            None
        }
    }

    pub fn remove_grid_image(&mut self, image: ItemId) {
        if let DerivedImage::Grid { sources, .. } = self {
            for slot in sources.iter_mut() {
                if *slot == Some(image) {
                    *slot = None;
                }
            }
        }
    }

    pub fn add_overlay_image(&mut self, image: ItemId, offset: (i32, i32)) {
        if let DerivedImage::Overlay { sources, offsets, .. } = self {
            sources.push(image);
            offsets.push(offset);
        }
    }

    pub fn set_overlay_image(&mut self, idx: usize, image: ItemId, offset: (i32, i32)) -> crate::error::Result<()> {
        if let DerivedImage::Overlay { sources, offsets, .. } = self {
            let slot = sources
                .get_mut(idx)
                .ok_or(crate::error::HeifError::IndexOutOfBounds { index: idx, len: sources.len() })?;
            *slot = image;
            offsets[idx] = offset;
        }
        Ok(())
    }

    /// Removal by value removes *all* matching entries and their
    /// offsets in lockstep (§4.5).
    pub fn remove_overlay_image_by_value(&mut self, image: ItemId) {
        if let DerivedImage::Overlay { sources, offsets, .. } = self {
            let kept: Vec<(ItemId, (i32, i32))> = sources
                .drain(..)
                .zip(offsets.drain(..))
                .filter(|(id, _)| *id != image)
                .collect();
            sources.extend(kept.iter().map(|(id, _)| *id));
            offsets.extend(kept.iter().map(|(_, off)| *off));
        }
    }

    pub fn remove_overlay_image_by_index(&mut self, idx: usize) {
        if let DerivedImage::Overlay { sources, offsets, .. } = self {
            if idx < sources.len() {
                sources.remove(idx);
                offsets.remove(idx);
            }
        }
    }
}

/// An opaque metadata item: `Exif` or a `mime`-typed payload, the
/// latter further split by the MIME subtype the writer recognizes
/// (§3). `Mpeg7`/`Other` are carried as an explicit MIME string so a
/// reader can distinguish them without guessing from bytes.
#[derive(Debug, Clone)]
pub enum MetaItem {
    Exif { data: Vec<u8> },
    Mime { subtype: MimeSubtype, mime_type: String, data: Vec<u8> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MimeSubtype {
    Xmp,
    Mpeg7,
    Other,
}
