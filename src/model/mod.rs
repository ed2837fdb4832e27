//! Object model (L3, §3/§4.5): the in-memory entity graph a caller
//! builds up or a `load` populates, before sample-table synthesis (L4)
//! and box serialization (L1) turn it back into bytes.
//!
//! Entities live in flat `Vec<Option<T>>` slots keyed by the opaque ids
//! from [`crate::types`], a full entity graph per §9's "single owner
//! holds indices" note.
//! Slot `None` means "freed"; ids are never reused within a `File`'s
//! lifetime, so a stale id reliably resolves to `None` rather than a
//! different, newer entity.
pub mod group;
pub mod item;
pub mod track;

pub use group::{AlternativeTrackGroup, EntityGroup, EntityRef};
pub use item::{CodedImage, DerivedImage, Item, ItemKind, MetaItem};
pub use track::{DecoderConfig, EditUnit, ParsedConfig, Sample, SampleType, Track, TrackHandler, TrackReferenceKind};

use crate::boxes::Property;
use crate::error::{HeifError, Result};
use crate::types::{DecoderConfigId, FourCC, GroupId, ItemId, SequenceId};

/// `ftyp` brands, set once via [`File::initialize`] before the first
/// `save` (§7 `BrandsNotSet`/`Uninitialized`).
#[derive(Debug, Clone)]
pub struct Brands {
    pub major_brand: FourCC,
    pub minor_version: u32,
    pub compatible_brands: Vec<FourCC>,
}

/// Properties that may be associated with an item at most once (§3
/// invariant 2). `Raw` and decoder-configuration properties are
/// deliberately excluded: a decoder config record is not counted
/// against this limit, and unknown `Raw` properties are never unique
/// by construction (they're told apart only by `fourcc`, and several
/// may legitimately share one).
fn single_instance_kind(prop: &Property) -> Option<&'static str> {
    match prop {
        Property::ImageSpatialExtents(_) => Some("ispe"),
        Property::PixelInformation(_) => Some("pixi"),
        Property::Rotation(_) => Some("irot"),
        Property::Mirror(_) => Some("imir"),
        Property::Colour(_) => Some("colr"),
        _ => None,
    }
}

/// The full entity graph for one HEIF container (§3).
///
/// All mutation happens through methods on `File` and on the handles it
/// hands back (`ItemId`, `GroupId`, ...) rather than through entities
/// mutating each other directly, since cross-entity edges need the
/// owner present to maintain back-links (§9 "cyclic ownership").
#[derive(Debug, Default)]
pub struct File {
    items: Vec<Option<Item>>,
    properties: Vec<Property>,
    decoder_configs: Vec<Option<DecoderConfig>>,
    tracks: Vec<Option<Track>>,
    groups: Vec<Option<EntityGroup>>,
    alt_groups: Vec<AlternativeTrackGroup>,
    primary_item: Option<ItemId>,
    brands: Option<Brands>,
    initialized: bool,
}

impl File {
    pub fn new() -> File {
        crate::allocator::register_file();
        File::default()
    }

    /// Sets the `ftyp` brands this `File` will be written with (§7).
    /// Must be called exactly once, before the first `save` -- a second
    /// call is rejected with [`HeifError::AlreadyInitialized`] rather
    /// than silently overwriting an already-chosen brand set.
    pub fn initialize(&mut self, major_brand: FourCC, minor_version: u32, compatible_brands: Vec<FourCC>) -> Result<()> {
        if self.initialized {
            return Err(HeifError::AlreadyInitialized);
        }
        self.brands = Some(Brands { major_brand, minor_version, compatible_brands });
        self.initialized = true;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn brands(&self) -> Result<&Brands> {
        self.brands.as_ref().ok_or(HeifError::BrandsNotSet)
    }

    // -- items --------------------------------------------------------

    pub fn add_item(&mut self, kind: ItemKind) -> ItemId {
        let id = ItemId((self.items.len() + 1) as u32);
        self.items.push(Some(Item::new(id, kind)));
        id
    }

    pub fn item(&self, id: ItemId) -> Result<&Item> {
        self.items
            .get(id.0.wrapping_sub(1) as usize)
            .and_then(|s| s.as_ref())
            .ok_or(HeifError::InvalidItemId(id.0))
    }

    pub fn item_mut(&mut self, id: ItemId) -> Result<&mut Item> {
        self.items
            .get_mut(id.0.wrapping_sub(1) as usize)
            .and_then(|s| s.as_mut())
            .ok_or(HeifError::InvalidItemId(id.0))
    }

    pub fn items(&self) -> impl Iterator<Item = &Item> {
        self.items.iter().filter_map(|s| s.as_ref())
    }

    /// Removes an item, severing every reference to it from other items
    /// (thumbnail/aux/derived-image source lists) and from any group
    /// that holds it as a member (§3 lifecycle rule).
    pub fn remove_item(&mut self, id: ItemId) -> Result<()> {
        let idx = id.0.wrapping_sub(1) as usize;
        if self.items.get(idx).map(Option::is_none).unwrap_or(true) {
            return Err(HeifError::InvalidItemId(id.0));
        }
        for slot in self.items.iter_mut() {
            if let Some(other) = slot {
                if other.id != id {
                    other.sever_reference_to(id);
                }
            }
        }
        for slot in self.groups.iter_mut().flatten() {
            slot.members.retain(|m| *m != EntityRef::Item(id));
        }
        if self.primary_item == Some(id) {
            self.primary_item = None;
        }
        self.items[idx] = None;
        Ok(())
    }

    pub fn set_primary_item(&mut self, id: ItemId) -> Result<()> {
        let item = self.item(id)?;
        if item.hidden {
            return Err(HeifError::HiddenPrimaryItem);
        }
        self.primary_item = Some(id);
        Ok(())
    }

    pub fn primary_item(&self) -> Option<ItemId> {
        self.primary_item
    }

    // -- properties -----------------------------------------------------

    /// Appends a property to the shared property table and returns its
    /// 1-based index (`ipma` uses 1-based indices, so this mirrors the
    /// on-wire numbering directly rather than translating later).
    pub fn add_property(&mut self, prop: Property) -> u16 {
        self.properties.push(prop);
        self.properties.len() as u16
    }

    pub fn property(&self, index: u16) -> Result<&Property> {
        self.properties
            .get(index.wrapping_sub(1) as usize)
            .ok_or(HeifError::InvalidPropertyIndex(index as u32))
    }

    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.iter()
    }

    /// `Item::associate_property` (§4.5): enforces the single-instance
    /// rule (§3 invariant 2) and keeps descriptives ordered before
    /// transformatives (§3 invariant 1, §8 property 3).
    pub fn associate_property(&mut self, item_id: ItemId, index: u16, essential: bool) -> Result<()> {
        let prop = self
            .properties
            .get(index.wrapping_sub(1) as usize)
            .ok_or(HeifError::InvalidPropertyIndex(index as u32))?;
        let kind = single_instance_kind(prop);
        let transformative = prop.is_transformative();

        let properties = &self.properties;
        let item = self
            .items
            .get_mut(item_id.0.wrapping_sub(1) as usize)
            .and_then(|s| s.as_mut())
            .ok_or(HeifError::InvalidItemId(item_id.0))?;

        if let Some(kind) = kind {
            let clashes = item.associated_properties.iter().any(|(existing, _)| {
                properties
                    .get(existing.wrapping_sub(1) as usize)
                    .and_then(single_instance_kind)
                    == Some(kind)
            });
            if clashes {
                return Err(HeifError::AlreadySet);
            }
        }

        let insert_at = if transformative {
            item.associated_properties.len()
        } else {
            item.associated_properties
                .iter()
                .position(|(idx, _)| {
                    properties
                        .get(idx.wrapping_sub(1) as usize)
                        .map(Property::is_transformative)
                        .unwrap_or(false)
                })
                .unwrap_or(item.associated_properties.len())
        };
        item.associated_properties.insert(insert_at, (index, essential));
        Ok(())
    }

    pub fn remove_property(&mut self, item_id: ItemId, index: u16) -> Result<()> {
        let item = self.item_mut(item_id)?;
        item.associated_properties.retain(|(idx, _)| *idx != index);
        Ok(())
    }

    // -- decoder configs ------------------------------------------------

    pub fn add_decoder_config(&mut self, config: DecoderConfig) -> DecoderConfigId {
        let id = DecoderConfigId((self.decoder_configs.len() + 1) as u32);
        self.decoder_configs.push(Some(config));
        id
    }

    pub fn decoder_config(&self, id: DecoderConfigId) -> Result<&DecoderConfig> {
        self.decoder_configs
            .get(id.0.wrapping_sub(1) as usize)
            .and_then(|s| s.as_ref())
            .ok_or(HeifError::InvalidDecoderConfigId(id.0))
    }

    pub fn decoder_configs(&self) -> impl Iterator<Item = &DecoderConfig> {
        self.decoder_configs.iter().filter_map(|s| s.as_ref())
    }

    // -- tracks -----------------------------------------------------------

    pub fn add_track(&mut self, track: Track) -> SequenceId {
        let id = SequenceId((self.tracks.len() + 1) as u32);
        self.tracks.push(Some(track));
        id
    }

    pub fn track(&self, id: SequenceId) -> Result<&Track> {
        self.tracks
            .get(id.0.wrapping_sub(1) as usize)
            .and_then(|s| s.as_ref())
            .ok_or(HeifError::InvalidSequenceId(id.0))
    }

    pub fn track_mut(&mut self, id: SequenceId) -> Result<&mut Track> {
        self.tracks
            .get_mut(id.0.wrapping_sub(1) as usize)
            .and_then(|s| s.as_mut())
            .ok_or(HeifError::InvalidSequenceId(id.0))
    }

    pub fn tracks(&self) -> impl Iterator<Item = &Track> {
        self.tracks.iter().filter_map(|s| s.as_ref())
    }

    pub fn add_sample(&mut self, track_id: SequenceId, sample: Sample) -> Result<()> {
        self.track_mut(track_id)?.samples.push(sample);
        Ok(())
    }

    /// Co-assigns `thumbnail` to `master`'s alternative-track group
    /// (§3 invariant 7). Idempotent: re-adding an already co-assigned
    /// track is a no-op.
    pub fn link_thumbnail_track(&mut self, master: SequenceId, thumbnail: SequenceId) -> Result<()> {
        self.track(master)?;
        self.track(thumbnail)?;
        if let Some(group) = self.alt_groups.iter_mut().find(|g| g.members.contains(&master)) {
            if !group.members.contains(&thumbnail) {
                group.members.push(thumbnail);
            }
            return Ok(());
        }
        self.alt_groups.push(AlternativeTrackGroup {
            members: vec![master, thumbnail],
        });
        Ok(())
    }

    // -- groups -----------------------------------------------------------

    pub fn add_group(&mut self, group: EntityGroup) -> GroupId {
        let id = GroupId((self.groups.len() + 1) as u32);
        self.groups.push(Some(group));
        id
    }

    pub fn group(&self, id: GroupId) -> Result<&EntityGroup> {
        self.groups
            .get(id.0.wrapping_sub(1) as usize)
            .and_then(|s| s.as_ref())
            .ok_or(HeifError::InvalidGroupId(id.0))
    }

    pub fn group_mut(&mut self, id: GroupId) -> Result<&mut EntityGroup> {
        self.groups
            .get_mut(id.0.wrapping_sub(1) as usize)
            .and_then(|s| s.as_mut())
            .ok_or(HeifError::InvalidGroupId(id.0))
    }

    pub fn groups(&self) -> impl Iterator<Item = &EntityGroup> {
        self.groups.iter().filter_map(|s| s.as_ref())
    }

    /// Co-assignment groups built by [`link_thumbnail_track`](File::link_thumbnail_track),
    /// exposed so the box-serialization layer can assign a shared `tkhd.alternate_group`
    /// number to each group's members.
    pub fn alternative_track_groups(&self) -> impl Iterator<Item = &AlternativeTrackGroup> {
        self.alt_groups.iter()
    }

    /// §3 invariants 3-5: checked at save time, not on every mutation,
    /// since an in-progress grid/overlay is allowed to have null cells
    /// while the caller is still building it up.
    pub fn check_save_invariants(&self) -> Result<()> {
        if !self.initialized {
            return Err(HeifError::Uninitialized);
        }
        if let Some(id) = self.primary_item {
            let item = self.item(id)?;
            if item.hidden {
                return Err(HeifError::HiddenPrimaryItem);
            }
            if !matches!(item.kind, ItemKind::CodedImage(_) | ItemKind::DerivedImage(_)) {
                return Err(HeifError::PrimaryItemNotSet);
            }
        }
        for item in self.items() {
            match &item.kind {
                ItemKind::CodedImage(coded) => {
                    if coded.requires_decoder_config() && coded.decoder_config().is_none() {
                        return Err(HeifError::InvalidFunctionParameter(
                            "coded image is missing a required decoder config".into(),
                        ));
                    }
                }
                ItemKind::DerivedImage(DerivedImage::Grid { columns, rows, sources, .. }) => {
                    if sources.len() != (*columns as usize) * (*rows as usize) || sources.iter().any(Option::is_none) {
                        return Err(HeifError::InvalidReferenceCount);
                    }
                }
                ItemKind::DerivedImage(DerivedImage::Overlay { sources, offsets, .. }) => {
                    if sources.len() != offsets.len() {
                        return Err(HeifError::InvalidReferenceCount);
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

/// Mirrors [`crate::allocator::register_file`] in `File::new` -- every
/// live `File`, however constructed, drops its count on the way out.
impl Drop for File {
    fn drop(&mut self) {
        crate::allocator::unregister_file();
    }
}
