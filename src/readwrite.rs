//! Top-level container codec (§7, §8): `File::load_*`/`save_*`.
//!
//! This module is a sibling of [`crate::model`], not a part of it, so
//! everything below goes through `File`'s public API -- `add_item`,
//! `add_track`, `add_property`, and friends -- the same surface any
//! external caller would use, rather than reaching into its fields.
//! It glues the box codec (`crate::boxes`, `crate::heifbox`) to the
//! object model.
use std::collections::HashMap;

use crate::boxes::{
    AvcConfigurationBox, AvcSampleEntry, ChunkOffsetBox, CompositionOffsetBox, CompositionOffsetEntry,
    ConstructionMethod, EditBox, EditListBox, EditListEntry, EntityToGroupBox, EquivalenceTiming, EsdsBox, FileTypeBox,
    GroupListBox, HandlerBox, HevcConfigurationBox, HevcSampleEntry, ImageSpatialExtentsProperty, ItemDataBox,
    ItemInfoBox, ItemInfoEntry, ItemLocationBox, ItemLocationEntry, ItemLocationExtent, ItemPropertiesBox,
    ItemPropertyAssociation, ItemPropertyAssociationBox, ItemPropertyContainerBox, ItemReference, ItemReferenceBox,
    MediaBox, MediaDataBox, MediaHeaderBox, MediaInformationBox, MetaBox, Mp4aSampleEntry, MovieBox,
    MovieHeaderBox, NalArray, PrimaryItemBox, Property, SampleDescriptionBox, SampleEntry, SampleGroupDescriptionBox,
    SampleSizeBox, SampleTableBox, SampleToChunkBox, SampleToChunkEntry, SampleToGroupBox, SampleToGroupEntry,
    SyncSampleBox, TimeToSampleBox, TimeToSampleEntry, TrackBox, TrackFlags, TrackHeaderBox, TrackReferenceBox,
};
use crate::error::{HeifError, Result};
use crate::heifbox::{BoxInfo, BoxReader};
use crate::io::{CountBytes, DataRef, FileWriter, HeifFile, MemWriter};
use crate::model::{
    AlternativeTrackGroup, CodedImage, DecoderConfig, DerivedImage, EditUnit, EntityGroup, EntityRef, File, ItemKind,
    MetaItem, MimeSubtype, Sample, SampleType, Track, TrackHandler, TrackReferenceKind,
};
use crate::sampletable::{cslg_required, patch_chunk_offsets, synthesize_cslg, synthesize_edit_list, synthesize_refs_grouping, SynthesisOptions};
use crate::serialize::{BoxBytes, FromBytes, ReadBytes, ToBytes, WriteBytes};
use crate::types::{DecoderConfigId, FixedFloat16_16, FixedFloat8_8, FourCC, IsoLanguageCode, ItemId, Matrix, SampleId, SequenceId, Time, ZString};

/// Controls how eagerly sample/item payload bytes are pulled into
/// memory on load (§7). The object model only ever stores owned bytes
/// (there is no lazy-handle representation at the `File` layer), so
/// `LoadOnDemand` behaves identically to `LoadAllData` here: both
/// resolve every sample immediately. `LoadMetadata` is the one mode
/// that actually skips work, leaving `CodedImage`/`Sample` payloads
/// empty so a caller that only wants box structure and dimensions
/// doesn't pay for the bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadMode {
    LoadMetadata,
    LoadOnDemand,
    LoadAllData,
}

/// An in-memory `ReadBytes` source for [`File::load_bytes`].
///
/// The blanket `BoxBytes for &[u8]` impl in `crate::serialize` doesn't
/// override `data_ref` (a bare slice has nowhere to lazily reference
/// back into, so the default panics), so loading from an owned
/// `Vec<u8>` needs its own small reader with a real `data_ref`.
struct MemSliceReader {
    data: Vec<u8>,
    pos: usize,
}

impl ReadBytes for MemSliceReader {
    fn read(&mut self, amount: u64) -> Result<&[u8]> {
        let amount = if amount == 0 { self.left() } else { amount };
        let end = self.pos + amount as usize;
        if end > self.data.len() {
            return Err(HeifError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn peek(&mut self, amount: u64) -> Result<&[u8]> {
        let end = self.pos + amount as usize;
        if end > self.data.len() {
            return Err(HeifError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        Ok(&self.data[self.pos..end])
    }

    fn skip(&mut self, amount: u64) -> Result<()> {
        let end = self.pos + amount as usize;
        if end > self.data.len() {
            return Err(HeifError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        self.pos = end;
        Ok(())
    }

    fn left(&mut self) -> u64 {
        (self.data.len() - self.pos) as u64
    }
}

impl BoxBytes for MemSliceReader {
    fn pos(&mut self) -> u64 {
        self.pos as u64
    }
    fn seek(&mut self, pos: u64) -> Result<()> {
        if pos as usize > self.data.len() {
            return Err(HeifError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        self.pos = pos as usize;
        Ok(())
    }
    fn size(&self) -> u64 {
        self.data.len() as u64
    }
    fn data_ref(&self, size: u64) -> Result<DataRef> {
        let end = self.pos + size as usize;
        if end > self.data.len() {
            return Err(HeifError::Io(std::io::ErrorKind::UnexpectedEof.into()));
        }
        Ok(DataRef::from_owned(self.data[self.pos..end].to_vec()))
    }
}

impl File {
    /// Loads a HEIF file from an in-memory byte buffer (§7).
    pub fn load_bytes(data: Vec<u8>, mode: PreloadMode) -> Result<File> {
        let mut reader = MemSliceReader { data, pos: 0 };
        populate(&mut reader, mode)
    }

    /// Loads a HEIF file from a path on disk (§7).
    pub fn load_from_path(path: impl AsRef<str>, mode: PreloadMode) -> Result<File> {
        let mut reader = HeifFile::open(path)?;
        populate(&mut reader, mode)
    }

    /// Serializes the current object model to a fresh `Vec<u8>` (§8).
    ///
    /// Item payloads are always written via `construction_method=1`
    /// (into `idat`, inside the `meta` box) rather than split across
    /// `mdat` extents -- simpler, and well within what the format
    /// allows for item data. Sample data for tracks still goes to
    /// `mdat`, so chunk offsets are patched in a second pass once the
    /// size of everything ahead of `mdat` is known.
    pub fn save_to_vec(&self) -> Result<Vec<u8>> {
        self.check_save_invariants()?;

        let brands = self.brands()?;
        let ftyp = FileTypeBox {
            major_brand: brands.major_brand,
            minor_version: brands.minor_version,
            compatible_brands: brands.compatible_brands.clone(),
        };
        let meta = build_meta(self)?;
        let (mut moov, mdat_bytes) = match build_moov(self)? {
            Some((movie, bytes)) => (Some(movie), bytes),
            None => (None, Vec::new()),
        };

        let mut counter = CountBytes::new();
        ftyp.to_bytes(&mut counter)?;
        meta.to_bytes(&mut counter)?;
        if let Some(movie) = &moov {
            movie.to_bytes(&mut counter)?;
        }
        let mdat_box_start = counter.size() as u64;

        if let Some(movie) = moov.as_mut() {
            for track_box in movie.tracks.iter_mut() {
                if let Some(stbl) = track_box.media.information.sample_table.as_mut() {
                    patch_chunk_offsets(&mut stbl.chunk_offset, mdat_box_start);
                }
            }
        }

        let mut writer = MemWriter::new();
        ftyp.to_bytes(&mut writer)?;
        meta.to_bytes(&mut writer)?;
        if let Some(movie) = &moov {
            movie.to_bytes(&mut writer)?;
        }
        if !mdat_bytes.is_empty() {
            let mdat = MediaDataBox { data: DataRef::from_owned(mdat_bytes) };
            mdat.to_bytes(&mut writer)?;
        }
        Ok(writer.into_vec())
    }

    /// Serializes and writes the current object model to a path on disk (§8).
    pub fn save_to_path(&self, path: impl AsRef<str>) -> Result<()> {
        let data = self.save_to_vec()?;
        let mut writer = FileWriter::create(path)?;
        writer.write(&data)
    }
}

fn populate<R: ReadBytes>(stream: &mut R, mode: PreloadMode) -> Result<File> {
    let mut file = File::new();
    while stream.left() >= 8 {
        let fourcc = {
            let header = stream.peek(8)?;
            FourCC::from(&header[4..8])
        };
        if fourcc == FourCC::new("ftyp") {
            let ftyp = FileTypeBox::from_bytes(stream)?;
            file.initialize(ftyp.major_brand, ftyp.minor_version, ftyp.compatible_brands)?;
        } else if fourcc == FourCC::new("meta") {
            let meta = MetaBox::from_bytes(stream)?;
            load_meta(&mut file, &meta, mode, stream)?;
        } else if fourcc == FourCC::new("moov") {
            let moov = MovieBox::from_bytes(stream)?;
            load_moov(&mut file, &moov, mode, stream)?;
        } else {
            let r = BoxReader::new(stream)?;
            log::debug!("skipping top-level box {}", r.fourcc);
        }
    }
    Ok(file)
}

// ---- meta / item loading -------------------------------------------------

fn is_coded_image_type(t: &FourCC) -> bool {
    *t == FourCC::new("hvc1") || *t == FourCC::new("avc1") || *t == FourCC::new("jpeg")
}

fn resolve_item_bytes<R: ReadBytes>(stream: &mut R, meta: &MetaBox, loc: &ItemLocationEntry) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for extent in &loc.extents {
        match loc.construction_method {
            ConstructionMethod::IdatOffset => {
                let idat = meta
                    .item_data
                    .as_ref()
                    .ok_or_else(|| HeifError::FileHeaderError("idat missing for construction_method=1 item".into()))?;
                let start = extent.offset as usize;
                let end = start + extent.length as usize;
                if end > idat.data.len() {
                    return Err(HeifError::FileHeaderError("idat extent out of range".into()));
                }
                out.extend_from_slice(&idat.data[start..end]);
            }
            ConstructionMethod::File => {
                let abs = loc.base_offset + extent.offset;
                let saved = stream.pos();
                stream.seek(abs)?;
                let bytes = stream.data_ref(extent.length)?.resolve()?;
                stream.seek(saved)?;
                out.extend_from_slice(&bytes);
            }
        }
    }
    Ok(out)
}

fn build_item_kind(item_type: &FourCC, content_type: Option<&str>, data: Vec<u8>) -> Result<ItemKind> {
    if *item_type == FourCC::new("hvc1") {
        Ok(ItemKind::CodedImage(CodedImage::Hevc { data, decoder_config: None }))
    } else if *item_type == FourCC::new("avc1") {
        Ok(ItemKind::CodedImage(CodedImage::Avc { data, decoder_config: None }))
    } else if *item_type == FourCC::new("jpeg") {
        Ok(ItemKind::CodedImage(CodedImage::Jpeg { data, decoder_config: None }))
    } else if *item_type == FourCC::new("grid") {
        let (columns, rows, output_width, output_height) = decode_grid(&data)?;
        let sources = vec![None; (columns as usize) * (rows as usize)];
        Ok(ItemKind::DerivedImage(DerivedImage::Grid { columns, rows, output_width, output_height, sources }))
    } else if *item_type == FourCC::new("iovl") {
        let (background_rgba, output_width, output_height, offsets) = decode_overlay(&data)?;
        Ok(ItemKind::DerivedImage(DerivedImage::Overlay {
            output_width,
            output_height,
            background_rgba,
            sources: Vec::new(),
            offsets,
        }))
    } else if *item_type == FourCC::new("iden") {
        Ok(ItemKind::DerivedImage(DerivedImage::Identity { source: None }))
    } else if *item_type == FourCC::new("Exif") {
        Ok(ItemKind::MetaItem(MetaItem::Exif { data: decode_exif(&data)? }))
    } else if *item_type == FourCC::new("mime") {
        let mime_type = content_type.unwrap_or_default().to_string();
        let subtype = if mime_type.contains("rdf+xml") {
            MimeSubtype::Xmp
        } else if mime_type.contains("mp7") {
            MimeSubtype::Mpeg7
        } else {
            MimeSubtype::Other
        };
        Ok(ItemKind::MetaItem(MetaItem::Mime { subtype, mime_type, data }))
    } else {
        log::debug!("unrecognized item type {}, storing as an opaque mime item", item_type);
        Ok(ItemKind::MetaItem(MetaItem::Mime { subtype: MimeSubtype::Other, mime_type: item_type.to_string(), data }))
    }
}

fn set_decoder_config(kind: &mut ItemKind, cfg_id: DecoderConfigId) {
    match kind {
        ItemKind::CodedImage(CodedImage::Hevc { decoder_config, .. })
        | ItemKind::CodedImage(CodedImage::Avc { decoder_config, .. })
        | ItemKind::CodedImage(CodedImage::Jpeg { decoder_config, .. }) => *decoder_config = Some(cfg_id),
        _ => {}
    }
}

fn load_meta<R: ReadBytes>(file: &mut File, meta: &MetaBox, mode: PreloadMode, stream: &mut R) -> Result<()> {
    // ipco entries come in two flavors: decoder-configuration records
    // (hvcC/avcC), which become `DecoderConfig`s, and everything else,
    // which becomes a shared `Property` table entry. Both tables are
    // indexed in parallel by the original 1-based ipco slot.
    let mut property_table: Vec<Option<u16>> = Vec::new();
    let mut config_table: Vec<Option<DecoderConfigId>> = Vec::new();
    let mut length_size_by_config: HashMap<u32, u8> = HashMap::new();
    if let Some(iprp) = &meta.item_properties {
        for prop in &iprp.container.properties {
            match prop {
                Property::HevcConfiguration(cfg) => {
                    let raw = hevc_config_to_annex_b(cfg);
                    let id = file.add_decoder_config(DecoderConfig::new(FourCC::new("hvc1"), raw));
                    length_size_by_config.insert(id.0, cfg.length_size_minus_one + 1);
                    property_table.push(None);
                    config_table.push(Some(id));
                }
                Property::AvcConfiguration(cfg) => {
                    let raw = avc_config_to_annex_b(cfg);
                    let id = file.add_decoder_config(DecoderConfig::new(FourCC::new("avc1"), raw));
                    length_size_by_config.insert(id.0, cfg.length_size_minus_one + 1);
                    property_table.push(None);
                    config_table.push(Some(id));
                }
                other => {
                    let idx = file.add_property(other.clone());
                    property_table.push(Some(idx));
                    config_table.push(None);
                }
            }
        }
    }

    let empty_entries: Vec<ItemInfoEntry> = Vec::new();
    let item_info = meta.item_info.as_ref().map(|i| &i.entries).unwrap_or(&empty_entries);
    let item_location = meta.item_location.as_ref();

    let mut id_map: HashMap<u32, ItemId> = HashMap::new();

    for entry in item_info {
        let loc = item_location.and_then(|il| il.entries.iter().find(|e| e.item_id == entry.item_id));
        let skip_payload = mode == PreloadMode::LoadMetadata && is_coded_image_type(&entry.item_type);
        let data = match loc {
            Some(loc) if !skip_payload => resolve_item_bytes(stream, meta, loc)?,
            _ => Vec::new(),
        };

        let kind = build_item_kind(&entry.item_type, entry.content_type.as_deref(), data)?;
        let id = file.add_item(kind);
        id_map.insert(entry.item_id.0, id);

        if let Ok(item) = file.item_mut(id) {
            item.hidden = entry.hidden;
            item.name = entry.item_name.clone();
            if let Some(ct) = &entry.content_type {
                item.content_type = ct.clone();
            }
            if let Some(ce) = &entry.content_encoding {
                item.content_encoding = ce.clone();
            }
        }
    }

    if let Some(iprp) = &meta.item_properties {
        for assoc in &iprp.associations.entries {
            let Some(&item_id) = id_map.get(&assoc.item_id.0) else { continue };
            for &(prop_idx, essential) in &assoc.associations {
                let slot = prop_idx as usize;
                if slot == 0 || slot > config_table.len() {
                    continue;
                }
                if let Some(cfg_id) = config_table[slot - 1] {
                    if let Ok(item) = file.item_mut(item_id) {
                        set_decoder_config(&mut item.kind, cfg_id);
                    }
                } else if let Some(real_idx) = property_table[slot - 1] {
                    let _ = file.associate_property(item_id, real_idx, essential);
                }
            }
        }
    }

    // ispe carries the decoded image's display dimensions; apply it to
    // `ImageItemFacet` now that associations are resolved.
    let item_ids: Vec<ItemId> = file.items().map(|i| i.id).collect();
    for id in item_ids {
        let dims = file.item(id).ok().and_then(|item| {
            item.associated_properties.iter().find_map(|&(idx, _)| match file.property(idx) {
                Ok(Property::ImageSpatialExtents(ispe)) => Some((ispe.width, ispe.height)),
                _ => None,
            })
        });
        if let Some((width, height)) = dims {
            if let Ok(item) = file.item_mut(id) {
                if let Some(img) = item.image.as_mut() {
                    img.width = width;
                    img.height = height;
                }
            }
        }
    }

    // §4.3: coded-image hvc1/avc1 payloads are stored length-prefixed
    // inside idat/mdat; normalize them to Annex-B for the in-memory
    // model. JPEG has no NAL structure and passes through untouched.
    for &id in &item_ids {
        if let Ok(item) = file.item_mut(id) {
            let (data, cfg_id) = match &mut item.kind {
                ItemKind::CodedImage(CodedImage::Hevc { data, decoder_config }) => (data, *decoder_config),
                ItemKind::CodedImage(CodedImage::Avc { data, decoder_config }) => (data, *decoder_config),
                _ => continue,
            };
            if data.is_empty() {
                continue;
            }
            let length_size = cfg_id.and_then(|cfg_id| length_size_by_config.get(&cfg_id.0).copied()).unwrap_or(4);
            let units = crate::nal::length_prefixed_to_nal_units(data, length_size)?;
            *data = crate::nal::nal_units_to_annex_b(&units);
        }
    }

    if let Some(iref) = &meta.item_reference {
        for r in &iref.references {
            let Some(&from_id) = id_map.get(&r.from_item_id.0) else { continue };
            let to_ids: Vec<ItemId> = r.to_item_ids.iter().filter_map(|t| id_map.get(&t.0).copied()).collect();

            if r.reference_type == FourCC::new("thmb") {
                if let Some(&master) = to_ids.first() {
                    if let Ok(m) = file.item_mut(master) {
                        if let Some(img) = m.image.as_mut() {
                            img.thumbnails.push(from_id);
                        }
                    }
                }
            } else if r.reference_type == FourCC::new("auxl") {
                if let Some(&master) = to_ids.first() {
                    if let Ok(m) = file.item_mut(master) {
                        if let Some(img) = m.image.as_mut() {
                            img.auxiliary_images.push(from_id);
                        }
                    }
                }
            } else if r.reference_type == FourCC::new("cdsc") {
                if let Some(&master) = to_ids.first() {
                    if let Ok(m) = file.item_mut(master) {
                        if let Some(img) = m.image.as_mut() {
                            img.metadata_items.push(from_id);
                        }
                    }
                }
            } else if r.reference_type == FourCC::new("dimg") {
                if let Ok(derived) = file.item_mut(from_id) {
                    match &mut derived.kind {
                        ItemKind::DerivedImage(DerivedImage::Grid { sources, .. }) => {
                            for (slot, src) in sources.iter_mut().enumerate() {
                                if let Some(&id) = to_ids.get(slot) {
                                    *src = Some(id);
                                }
                            }
                        }
                        ItemKind::DerivedImage(DerivedImage::Overlay { sources, .. }) => {
                            *sources = to_ids.clone();
                        }
                        ItemKind::DerivedImage(DerivedImage::Identity { source }) => {
                            *source = to_ids.first().copied();
                        }
                        _ => {}
                    }
                }
            }
        }
    }

    if let Some(pitm) = &meta.primary_item {
        if let Some(&id) = id_map.get(&pitm.item_id.0) {
            let _ = file.set_primary_item(id);
        }
    }

    if let Some(grpl) = &meta.groups {
        for g in &grpl.groups {
            let mut group = EntityGroup::new(g.grouping_type);
            let is_eqiv = g.grouping_type == FourCC::new("eqiv");
            for (i, eid) in g.entity_ids.iter().enumerate() {
                let Some(&id) = id_map.get(eid) else { continue };
                if is_eqiv {
                    let (offset, mult) = g
                        .equivalence_timing
                        .get(i)
                        .map(|t| (t.time_offset, t.timescale_multiplier_8_8))
                        .unwrap_or((0, 0));
                    let _ = group.add_equivalence_sample(id, offset, mult);
                } else {
                    group.add_member(EntityRef::Item(id));
                }
            }
            file.add_group(group);
        }
    }

    Ok(())
}

// ---- moov / sample loading ------------------------------------------------

fn sample_entry_fourcc(entry: &SampleEntry) -> FourCC {
    match entry {
        SampleEntry::Hevc(_) => FourCC::new("hvc1"),
        SampleEntry::Avc(_) => FourCC::new("avc1"),
        SampleEntry::Mp4a(_) => FourCC::new("mp4a"),
        SampleEntry::Generic(g) => g.fourcc(),
    }
}

fn decoder_config_for_entry(file: &mut File, entry: Option<&SampleEntry>) -> Option<DecoderConfigId> {
    match entry {
        Some(SampleEntry::Hevc(h)) => {
            let raw = hevc_config_to_annex_b(&h.config);
            Some(file.add_decoder_config(DecoderConfig::new(FourCC::new("hvc1"), raw)))
        }
        Some(SampleEntry::Avc(a)) => {
            let raw = avc_config_to_annex_b(&a.config);
            Some(file.add_decoder_config(DecoderConfig::new(FourCC::new("avc1"), raw)))
        }
        Some(SampleEntry::Mp4a(m)) => {
            Some(file.add_decoder_config(DecoderConfig::new(FourCC::new("mp4a"), m.esds.decoder_specific_info.clone())))
        }
        _ => None,
    }
}

fn expand_time_to_sample(entries: &[TimeToSampleEntry], total: usize) -> Vec<u32> {
    let mut out = Vec::with_capacity(total);
    for e in entries {
        for _ in 0..e.count {
            out.push(e.delta);
            if out.len() == total {
                return out;
            }
        }
    }
    let last = out.last().copied().unwrap_or(0);
    out.resize(total, last);
    out
}

fn expand_composition_offset(entries: &[CompositionOffsetEntry], total: usize) -> Vec<i32> {
    let mut out = Vec::with_capacity(total);
    for e in entries {
        for _ in 0..e.count {
            out.push(e.offset);
            if out.len() == total {
                return out;
            }
        }
    }
    out.resize(total, 0);
    out
}

fn samples_per_chunk_table(entries: &[SampleToChunkEntry], chunk_count: usize) -> Vec<u32> {
    let mut table = vec![0u32; chunk_count];
    for (i, entry) in entries.iter().enumerate() {
        let start = entry.first_chunk.saturating_sub(1) as usize;
        let end = if i + 1 < entries.len() {
            entries[i + 1].first_chunk.saturating_sub(1) as usize
        } else {
            chunk_count
        };
        let end = end.min(chunk_count);
        for slot in table.iter_mut().take(end).skip(start) {
            *slot = entry.samples_per_chunk;
        }
    }
    table
}

/// RLE-expands an `sbgp`'s run-length entries into one
/// `group_description_index` per sample (0 for samples outside any run).
fn expand_sample_to_group(entries: &[SampleToGroupEntry], sample_count: usize) -> Vec<u32> {
    let mut table = vec![0u32; sample_count];
    let mut pos = 0usize;
    for entry in entries {
        let end = (pos + entry.sample_count as usize).min(sample_count);
        for slot in table.iter_mut().take(end).skip(pos) {
            *slot = entry.group_description_index;
        }
        pos = end;
    }
    table
}

/// Inverse of `sampletable::synthesize_refs_grouping` (§4.6): recovers
/// each sample's `decode_dependencies` from the `refs`-typed
/// `sbgp`/`sgpd` pair, if present.
fn load_decode_dependencies(stbl: &SampleTableBox, sample_count: usize) -> Vec<Vec<SampleId>> {
    let sbgp = stbl.sample_to_group.iter().find(|b| b.grouping_type == FourCC::new("refs"));
    let sgpd = stbl.sample_group_description.iter().find(|b| b.grouping_type == FourCC::new("refs"));
    let (Some(sbgp), Some(sgpd)) = (sbgp, sgpd) else {
        return vec![Vec::new(); sample_count];
    };
    let group_index = expand_sample_to_group(&sbgp.entries, sample_count);
    group_index
        .iter()
        .map(|&idx| {
            if idx == 0 {
                return Vec::new();
            }
            let Some(bytes) = sgpd.entries.get(idx as usize - 1) else { return Vec::new() };
            if bytes.len() < 4 {
                return Vec::new();
            }
            bytes[4..]
                .chunks_exact(4)
                .map(|c| SampleId::from(u32::from_be_bytes(c.try_into().unwrap())))
                .collect()
        })
        .collect()
}

fn load_samples<R: ReadBytes>(
    file: &mut File,
    sequence_id: SequenceId,
    stbl: &SampleTableBox,
    mode: PreloadMode,
    stream: &mut R,
) -> Result<()> {
    let sample_count = stbl.sample_size.sample_count as usize;
    if sample_count == 0 {
        return Ok(());
    }

    let media_type = stbl
        .sample_description
        .entries
        .first()
        .map(sample_entry_fourcc)
        .unwrap_or_else(|| FourCC::new("unkn"));
    let decoder_config = decoder_config_for_entry(file, stbl.sample_description.entries.first());

    let durations = expand_time_to_sample(&stbl.time_to_sample.entries, sample_count);
    let comp_offsets = stbl
        .composition_offset
        .as_ref()
        .map(|c| expand_composition_offset(&c.entries, sample_count))
        .unwrap_or_else(|| vec![0i32; sample_count]);
    let sync_flags: Vec<bool> = match &stbl.sync_samples {
        Some(stss) => {
            let set: std::collections::HashSet<u32> = stss.sample_numbers.iter().copied().collect();
            (1..=sample_count as u32).map(|n| set.contains(&n)).collect()
        }
        None => vec![true; sample_count],
    };

    let decode_dependencies = load_decode_dependencies(stbl, sample_count);

    let per_chunk = samples_per_chunk_table(&stbl.sample_to_chunk.entries, stbl.chunk_offset.offsets.len());
    let mut chunk_idx = 0usize;
    let mut sample_in_chunk = 0u32;
    let mut current_offset = stbl.chunk_offset.offsets.first().copied().unwrap_or(0);

    let eager = mode != PreloadMode::LoadMetadata;

    for i in 0..sample_count {
        if sample_in_chunk >= per_chunk.get(chunk_idx).copied().unwrap_or(0) {
            chunk_idx += 1;
            sample_in_chunk = 0;
            if let Some(&off) = stbl.chunk_offset.offsets.get(chunk_idx) {
                current_offset = off;
            }
        }
        let size = stbl.sample_size.size_of(i).unwrap_or(0) as u64;

        let mut sample = Sample::new(SampleId::from((i as u32) + 1), media_type, durations[i]);
        sample.composition_offset = comp_offsets[i];
        sample.sample_type = if sync_flags[i] { SampleType::OutputReference } else { SampleType::OutputNonReference };
        sample.decoder_config = decoder_config;
        sample.decode_dependencies = decode_dependencies[i].clone();

        if eager && size > 0 {
            let saved = stream.pos();
            stream.seek(current_offset)?;
            sample.data = stream.data_ref(size)?.resolve()?;
            stream.seek(saved)?;
        }

        file.add_sample(sequence_id, sample)?;
        current_offset += size;
        sample_in_chunk += 1;
    }
    Ok(())
}

/// Inverse of `sampletable::synthesize_edit_list` (§4.6). `numb_rept` for
/// a `Shift` entry can't be recovered from `segment_duration` alone (it
/// never multiplies the stored ticks); the only observable trace is the
/// track's own infinite-loop sentinel, so the last entry gets `-1` when
/// `tkhd_duration` is `0xFFFF_FFFF` and `0` otherwise.
fn load_edit_list(entries: &[EditListEntry], movie_timescale: u32, tkhd_duration: u64) -> Vec<EditUnit> {
    let infinite = tkhd_duration == 0xFFFF_FFFF;
    let last = entries.len().saturating_sub(1);
    entries
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let time_span_ms = ticks_to_ms(entry.segment_duration, movie_timescale);
            if entry.media_time < 0 {
                EditUnit::Empty { time_span_ms }
            } else {
                let mdia_time_ms = ticks_to_ms(entry.media_time as u64, movie_timescale);
                let media_rate: f64 = entry.media_rate.into();
                if media_rate == 0.0 {
                    EditUnit::Dwell { time_span_ms, mdia_time_ms }
                } else {
                    let numb_rept = if infinite && i == last { -1 } else { 0 };
                    EditUnit::Shift { time_span_ms, mdia_time_ms, numb_rept }
                }
            }
        })
        .collect()
}

fn ticks_to_ms(ticks: u64, timescale: u32) -> u32 {
    if timescale == 0 {
        0
    } else {
        (ticks * 1000 / timescale as u64) as u32
    }
}

fn load_moov<R: ReadBytes>(file: &mut File, moov: &MovieBox, mode: PreloadMode, stream: &mut R) -> Result<()> {
    let mut seq_ids: Vec<SequenceId> = Vec::with_capacity(moov.tracks.len());
    let mut wire_track_id_to_seq: HashMap<u32, SequenceId> = HashMap::new();
    let mut alt_groups: HashMap<i16, Vec<SequenceId>> = HashMap::new();

    for trak in &moov.tracks {
        let handler_type = trak.media.handler.handler_type;
        let handler = if handler_type == FourCC::new("pict") {
            TrackHandler::Picture
        } else if handler_type == FourCC::new("vide") {
            TrackHandler::Video
        } else if handler_type == FourCC::new("soun") {
            TrackHandler::Sound
        } else {
            return Err(HeifError::UnsupportedCodeType(handler_type));
        };

        let mut track = Track::new(handler, trak.media.header.timescale);
        track.enabled = trak.header.flags.enabled();
        track.in_movie = trak.header.flags.in_movie();
        track.in_preview = trak.header.flags.in_preview();
        track.matrix = trak.header.matrix.clone();
        if let Some(edit) = &trak.edit {
            if let Some(edit_list) = &edit.edit_list {
                let movie_timescale = moov.header.as_ref().map(|h| h.timescale).unwrap_or(1000);
                track.edit_list = load_edit_list(&edit_list.entries, movie_timescale, trak.header.duration);
            }
        }

        let sequence_id = file.add_track(track);
        wire_track_id_to_seq.insert(trak.header.track_id, sequence_id);
        if trak.header.alternate_group != 0 {
            alt_groups.entry(trak.header.alternate_group).or_default().push(sequence_id);
        }
        seq_ids.push(sequence_id);
    }

    for (trak, &sequence_id) in moov.tracks.iter().zip(seq_ids.iter()) {
        if let Some(stbl) = &trak.media.information.sample_table {
            load_samples(file, sequence_id, stbl, mode, stream)?;
        }
        if let Some(tref) = &trak.track_reference {
            for (fourcc, targets) in &tref.references {
                let kind = if *fourcc == FourCC::new("thmb") {
                    Some(TrackReferenceKind::Thumbnail)
                } else if *fourcc == FourCC::new("auxl") {
                    Some(TrackReferenceKind::Auxiliary)
                } else if *fourcc == FourCC::new("cdsc") {
                    Some(TrackReferenceKind::Description)
                } else {
                    None
                };
                let Some(kind) = kind else { continue };
                for target in targets {
                    let Some(&resolved) = wire_track_id_to_seq.get(&target.0) else { continue };
                    if let Ok(t) = file.track_mut(sequence_id) {
                        t.add_reference(kind, resolved);
                    }
                }
            }
        }
    }

    for members in alt_groups.values() {
        if let Some((&master, rest)) = members.split_first() {
            for &thumb in rest {
                let _ = file.link_thumbnail_track(master, thumb);
            }
        }
    }

    Ok(())
}

// ---- ImageGrid / ImageOverlay / Exif payload codecs (ISO/IEC 23008-12) ----

fn decode_grid(data: &[u8]) -> Result<(u32, u32, u32, u32)> {
    if data.len() < 7 {
        return Err(HeifError::MediaParsingError("ImageGrid payload too short".into()));
    }
    let large = data[0] & 0x01 != 0;
    let rows = data[1] as u32 + 1;
    let columns = data[2] as u32 + 1;
    let rest = &data[3..];
    let (output_width, output_height) = if large {
        if rest.len() < 8 {
            return Err(HeifError::MediaParsingError("ImageGrid payload truncated".into()));
        }
        (
            u32::from_be_bytes(rest[0..4].try_into().unwrap()),
            u32::from_be_bytes(rest[4..8].try_into().unwrap()),
        )
    } else {
        if rest.len() < 4 {
            return Err(HeifError::MediaParsingError("ImageGrid payload truncated".into()));
        }
        (
            u16::from_be_bytes(rest[0..2].try_into().unwrap()) as u32,
            u16::from_be_bytes(rest[2..4].try_into().unwrap()) as u32,
        )
    };
    Ok((columns, rows, output_width, output_height))
}

fn encode_grid(columns: u32, rows: u32, output_width: u32, output_height: u32) -> Vec<u8> {
    let large = output_width > 0xffff || output_height > 0xffff;
    let mut out = vec![if large { 0x01 } else { 0x00 }, rows.saturating_sub(1) as u8, columns.saturating_sub(1) as u8];
    if large {
        out.extend_from_slice(&output_width.to_be_bytes());
        out.extend_from_slice(&output_height.to_be_bytes());
    } else {
        out.extend_from_slice(&(output_width as u16).to_be_bytes());
        out.extend_from_slice(&(output_height as u16).to_be_bytes());
    }
    out
}

fn decode_overlay(data: &[u8]) -> Result<([u16; 4], u32, u32, Vec<(i32, i32)>)> {
    if data.len() < 9 {
        return Err(HeifError::MediaParsingError("ImageOverlay payload too short".into()));
    }
    let large = data[0] & 0x01 != 0;
    let min_len = if large { 17 } else { 13 };
    if data.len() < min_len {
        return Err(HeifError::MediaParsingError("ImageOverlay payload truncated".into()));
    }
    let mut pos = 1usize;
    let mut background = [0u16; 4];
    for slot in background.iter_mut() {
        *slot = u16::from_be_bytes(data[pos..pos + 2].try_into().unwrap());
        pos += 2;
    }
    let (output_width, output_height, offset_size) = if large {
        let w = u32::from_be_bytes(data[pos..pos + 4].try_into().unwrap());
        pos += 4;
        let h = u32::from_be_bytes(data[pos..pos + 4].try_into().unwrap());
        pos += 4;
        (w, h, 4usize)
    } else {
        let w = u16::from_be_bytes(data[pos..pos + 2].try_into().unwrap()) as u32;
        pos += 2;
        let h = u16::from_be_bytes(data[pos..pos + 2].try_into().unwrap()) as u32;
        pos += 2;
        (w, h, 2usize)
    };
    let mut offsets = Vec::new();
    while pos + offset_size * 2 <= data.len() {
        let (x, y) = if large {
            (
                i32::from_be_bytes(data[pos..pos + 4].try_into().unwrap()),
                i32::from_be_bytes(data[pos + 4..pos + 8].try_into().unwrap()),
            )
        } else {
            (
                i16::from_be_bytes(data[pos..pos + 2].try_into().unwrap()) as i32,
                i16::from_be_bytes(data[pos + 2..pos + 4].try_into().unwrap()) as i32,
            )
        };
        offsets.push((x, y));
        pos += offset_size * 2;
    }
    Ok((background, output_width, output_height, offsets))
}

fn encode_overlay(background: [u16; 4], output_width: u32, output_height: u32, offsets: &[(i32, i32)]) -> Vec<u8> {
    let large = output_width > 0xffff
        || output_height > 0xffff
        || offsets.iter().any(|&(x, y)| !(i16::MIN as i32..=i16::MAX as i32).contains(&x) || !(i16::MIN as i32..=i16::MAX as i32).contains(&y));
    let mut out = vec![if large { 0x01 } else { 0x00 }];
    for v in &background {
        out.extend_from_slice(&v.to_be_bytes());
    }
    if large {
        out.extend_from_slice(&output_width.to_be_bytes());
        out.extend_from_slice(&output_height.to_be_bytes());
    } else {
        out.extend_from_slice(&(output_width as u16).to_be_bytes());
        out.extend_from_slice(&(output_height as u16).to_be_bytes());
    }
    for &(x, y) in offsets {
        if large {
            out.extend_from_slice(&x.to_be_bytes());
            out.extend_from_slice(&y.to_be_bytes());
        } else {
            out.extend_from_slice(&(x as i16).to_be_bytes());
            out.extend_from_slice(&(y as i16).to_be_bytes());
        }
    }
    out
}

fn decode_exif(data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < 4 {
        return Err(HeifError::MediaParsingError("Exif item payload too short".into()));
    }
    let offset = u32::from_be_bytes(data[0..4].try_into().unwrap()) as usize;
    let start = 4 + offset;
    if start > data.len() {
        return Err(HeifError::MediaParsingError("Exif tiff header offset out of range".into()));
    }
    Ok(data[start..].to_vec())
}

fn encode_exif(tiff: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(4 + tiff.len());
    out.extend_from_slice(&0u32.to_be_bytes());
    out.extend_from_slice(tiff);
    out
}

// ---- decoder configuration <-> Annex-B conversion --------------------------

fn hevc_config_to_annex_b(cfg: &HevcConfigurationBox) -> Vec<u8> {
    let mut units: Vec<&[u8]> = Vec::new();
    for array in &cfg.arrays {
        for nal in &array.nal_units {
            units.push(nal.as_slice());
        }
    }
    crate::nal::nal_units_to_annex_b(&units)
}

fn avc_config_to_annex_b(cfg: &AvcConfigurationBox) -> Vec<u8> {
    let mut units: Vec<&[u8]> = Vec::new();
    for sps in &cfg.sps {
        units.push(sps.as_slice());
    }
    for pps in &cfg.pps {
        units.push(pps.as_slice());
    }
    crate::nal::nal_units_to_annex_b(&units)
}

fn hevc_config_from_raw(raw: &[u8]) -> Result<HevcConfigurationBox> {
    let units = crate::nal::annex_b_to_nal_units(raw)?;
    let mut vps = Vec::new();
    let mut sps = Vec::new();
    let mut pps = Vec::new();
    for unit in &units {
        if unit.is_empty() {
            continue;
        }
        match (unit[0] >> 1) & 0x3f {
            32 => vps.push(unit.to_vec()),
            33 => sps.push(unit.to_vec()),
            34 => pps.push(unit.to_vec()),
            _ => {}
        }
    }
    let (general_profile_idc, general_level_idc) = sps
        .first()
        .and_then(|nal| crate::decoderconfig::hevc::parse_sps(nal).ok())
        .map(|info| (info.general_profile_idc, info.general_level_idc))
        .unwrap_or((1, 120));

    let mut arrays = Vec::new();
    if !vps.is_empty() {
        arrays.push(NalArray { array_completeness: true, nal_unit_type: 32, nal_units: vps });
    }
    if !sps.is_empty() {
        arrays.push(NalArray { array_completeness: true, nal_unit_type: 33, nal_units: sps });
    }
    if !pps.is_empty() {
        arrays.push(NalArray { array_completeness: true, nal_unit_type: 34, nal_units: pps });
    }

    Ok(HevcConfigurationBox {
        general_profile_space: 0,
        general_tier_flag: false,
        general_profile_idc,
        general_profile_compatibility_flags: 1u32 << (31 - general_profile_idc.min(31) as u32),
        general_constraint_indicator_flags: 0,
        general_level_idc,
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
        arrays,
    })
}

fn avc_config_from_raw(raw: &[u8]) -> Result<AvcConfigurationBox> {
    let units = crate::nal::annex_b_to_nal_units(raw)?;
    let mut sps = Vec::new();
    let mut pps = Vec::new();
    for unit in &units {
        if unit.is_empty() {
            continue;
        }
        match unit[0] & 0x1f {
            7 => sps.push(unit.to_vec()),
            8 => pps.push(unit.to_vec()),
            _ => {}
        }
    }
    let (profile_idc, constraint_set_flags, level_idc) = sps
        .first()
        .and_then(|nal| crate::decoderconfig::avc::parse_sps(nal).ok())
        .map(|info| (info.profile_idc, info.constraint_set_flags, info.level_idc))
        .unwrap_or((66, 0, 30));

    Ok(AvcConfigurationBox { profile_idc, constraint_set_flags, level_idc, length_size_minus_one: 3, sps, pps })
}

fn sps_dimensions(media_type: &FourCC, raw: &[u8]) -> (u16, u16) {
    let units = match crate::nal::annex_b_to_nal_units(raw) {
        Ok(u) => u,
        Err(_) => return (0, 0),
    };
    if *media_type == FourCC::new("hvc1") {
        for unit in &units {
            if unit.len() >= 2 && (unit[0] >> 1) & 0x3f == 33 {
                if let Ok(sps) = crate::decoderconfig::hevc::parse_sps(unit) {
                    return (sps.width.min(u16::MAX as u32) as u16, sps.height.min(u16::MAX as u32) as u16);
                }
            }
        }
    } else if *media_type == FourCC::new("avc1") {
        for unit in &units {
            if !unit.is_empty() && unit[0] & 0x1f == 7 {
                if let Ok(sps) = crate::decoderconfig::avc::parse_sps(unit) {
                    return (sps.width.min(u16::MAX as u32) as u16, sps.height.min(u16::MAX as u32) as u16);
                }
            }
        }
    }
    (0, 0)
}

fn decoder_config_property(media_type: FourCC, raw: &[u8]) -> Result<Property> {
    if media_type == FourCC::new("hvc1") {
        Ok(Property::HevcConfiguration(hevc_config_from_raw(raw)?))
    } else if media_type == FourCC::new("avc1") {
        Ok(Property::AvcConfiguration(avc_config_from_raw(raw)?))
    } else {
        Err(HeifError::UnsupportedCodeType(media_type))
    }
}

// ---- save-side box construction --------------------------------------------

/// NAL length-field width this crate's writer always uses inside
/// `idat`/`mdat` (matches `length_size_minus_one: 3` in
/// `hevc_config_from_raw`/`avc_config_from_raw`).
const NAL_LENGTH_SIZE: u8 = 4;

fn payload_bytes(kind: &ItemKind) -> Result<Vec<u8>> {
    Ok(match kind {
        ItemKind::CodedImage(CodedImage::Hevc { data, .. }) | ItemKind::CodedImage(CodedImage::Avc { data, .. }) => {
            // §4.3: the in-memory model holds Annex-B; mdat/idat storage
            // is length-prefixed.
            let units = crate::nal::annex_b_to_nal_units(data)?;
            crate::nal::nal_units_to_length_prefixed(&units, NAL_LENGTH_SIZE)?
        }
        ItemKind::CodedImage(CodedImage::Jpeg { data, .. }) => data.clone(),
        ItemKind::DerivedImage(DerivedImage::Grid { columns, rows, output_width, output_height, .. }) => {
            encode_grid(*columns, *rows, *output_width, *output_height)
        }
        ItemKind::DerivedImage(DerivedImage::Overlay { output_width, output_height, background_rgba, offsets, .. }) => {
            encode_overlay(*background_rgba, *output_width, *output_height, offsets)
        }
        ItemKind::DerivedImage(DerivedImage::Identity { .. }) => Vec::new(),
        ItemKind::MetaItem(MetaItem::Exif { data }) => encode_exif(data),
        ItemKind::MetaItem(MetaItem::Mime { data, .. }) => data.clone(),
    })
}

fn build_groups_box(file: &File) -> Option<GroupListBox> {
    let groups: Vec<EntityToGroupBox> = file
        .groups()
        .enumerate()
        .map(|(idx, g)| {
            let entity_ids: Vec<u32> = g
                .members
                .iter()
                .map(|m| match m {
                    EntityRef::Item(id) => id.0,
                    EntityRef::Track(id) => id.0,
                })
                .collect();
            let equivalence_timing = if g.grouping_type == FourCC::new("eqiv") {
                g.equivalence_timing
                    .iter()
                    .map(|t| {
                        let (time_offset, timescale_multiplier_8_8) = t.unwrap_or((0, 0));
                        EquivalenceTiming { time_offset, timescale_multiplier_8_8 }
                    })
                    .collect()
            } else {
                Vec::new()
            };
            EntityToGroupBox { grouping_type: g.grouping_type, group_id: (idx as u32) + 1, entity_ids, equivalence_timing }
        })
        .collect();
    if groups.is_empty() {
        None
    } else {
        Some(GroupListBox { groups })
    }
}

fn build_meta(file: &File) -> Result<MetaBox> {
    let mut idat = Vec::new();
    let mut item_info = Vec::new();
    let mut item_location = Vec::new();
    let mut ref_map: HashMap<(FourCC, u32), Vec<ItemId>> = HashMap::new();

    for item in file.items() {
        let item_type = item.kind.fourcc();
        let payload = payload_bytes(&item.kind)?;
        let offset = idat.len() as u64;
        let length = payload.len() as u64;
        idat.extend_from_slice(&payload);
        item_location.push(ItemLocationEntry {
            item_id: item.id,
            construction_method: ConstructionMethod::IdatOffset,
            data_reference_index: 0,
            base_offset: 0,
            extents: vec![ItemLocationExtent { offset, length }],
        });

        let content_type = match &item.kind {
            ItemKind::MetaItem(MetaItem::Mime { mime_type, .. }) => Some(mime_type.clone()),
            _ if !item.content_type.is_empty() => Some(item.content_type.clone()),
            _ => None,
        };
        let content_encoding = if item.content_encoding.is_empty() { None } else { Some(item.content_encoding.clone()) };

        item_info.push(ItemInfoEntry {
            item_id: item.id,
            protection_index: 0,
            item_type,
            item_name: item.name.clone(),
            content_type,
            content_encoding,
            hidden: item.hidden,
        });

        if let Some(img) = &item.image {
            for &thumb in &img.thumbnails {
                ref_map.entry((FourCC::new("thmb"), thumb.0)).or_default().push(item.id);
            }
            for &aux in &img.auxiliary_images {
                ref_map.entry((FourCC::new("auxl"), aux.0)).or_default().push(item.id);
            }
            for &metadata in &img.metadata_items {
                ref_map.entry((FourCC::new("cdsc"), metadata.0)).or_default().push(item.id);
            }
        }
        match &item.kind {
            ItemKind::DerivedImage(DerivedImage::Grid { sources, .. }) => {
                let ids: Vec<ItemId> = sources.iter().map(|s| s.unwrap_or_default()).collect();
                ref_map.entry((FourCC::new("dimg"), item.id.0)).or_default().extend(ids);
            }
            ItemKind::DerivedImage(DerivedImage::Overlay { sources, .. }) => {
                ref_map.entry((FourCC::new("dimg"), item.id.0)).or_default().extend(sources.clone());
            }
            ItemKind::DerivedImage(DerivedImage::Identity { source: Some(src) }) => {
                ref_map.entry((FourCC::new("dimg"), item.id.0)).or_default().push(*src);
            }
            _ => {}
        }
    }

    let references: Vec<ItemReference> = ref_map
        .into_iter()
        .filter(|(_, to)| !to.is_empty())
        .map(|((reference_type, from), to_item_ids)| ItemReference {
            reference_type,
            from_item_id: ItemId::from(from),
            to_item_ids,
        })
        .collect();

    let mut properties: Vec<Property> = file.properties().cloned().collect();
    let mut config_prop_index: HashMap<u32, u16> = HashMap::new();
    let mut associations: Vec<ItemPropertyAssociation> = Vec::new();

    for item in file.items() {
        let mut entries: Vec<(u16, bool)> = item.associated_properties.clone();

        if let Some(img) = &item.image {
            let ispe = ImageSpatialExtentsProperty { width: img.width, height: img.height };
            let existing_ispe_slot = entries
                .iter()
                .find(|&&(idx, _)| matches!(properties.get(idx as usize - 1), Some(Property::ImageSpatialExtents(_))))
                .map(|&(idx, _)| idx);
            match existing_ispe_slot {
                Some(idx) => properties[idx as usize - 1] = Property::ImageSpatialExtents(ispe),
                None => {
                    properties.push(Property::ImageSpatialExtents(ispe));
                    entries.push((properties.len() as u16, true));
                }
            }
        }

        if let Some(cfg_id) = item.decoder_config_id() {
            let idx = match config_prop_index.get(&cfg_id.0) {
                Some(&idx) => idx,
                None => {
                    let config = file.decoder_config(cfg_id)?;
                    let prop = decoder_config_property(config.media_type, &config.raw)?;
                    properties.push(prop);
                    let idx = properties.len() as u16;
                    config_prop_index.insert(cfg_id.0, idx);
                    idx
                }
            };
            entries.push((idx, true));
        }
        if !entries.is_empty() {
            associations.push(ItemPropertyAssociation { item_id: item.id, associations: entries });
        }
    }

    let item_properties = if properties.is_empty() && associations.is_empty() {
        None
    } else {
        Some(ItemPropertiesBox {
            container: ItemPropertyContainerBox { properties },
            associations: ItemPropertyAssociationBox { entries: associations },
        })
    };

    Ok(MetaBox {
        handler: Some(HandlerBox { pre_defined: 0, handler_type: FourCC::new("pict"), name: ZString(String::new()) }),
        primary_item: file.primary_item().map(|item_id| PrimaryItemBox { item_id }),
        item_info: if item_info.is_empty() { None } else { Some(ItemInfoBox { entries: item_info }) },
        item_location: if item_location.is_empty() { None } else { Some(ItemLocationBox { entries: item_location }) },
        item_reference: if references.is_empty() { None } else { Some(ItemReferenceBox { references }) },
        item_properties,
        item_data: if idat.is_empty() { None } else { Some(ItemDataBox { data: idat }) },
        groups: build_groups_box(file),
        other_boxes: Vec::new(),
    })
}

fn build_time_to_sample(track: &Track) -> TimeToSampleBox {
    let mut entries: Vec<TimeToSampleEntry> = Vec::new();
    for sample in &track.samples {
        match entries.last_mut() {
            Some(last) if last.delta == sample.duration => last.count += 1,
            _ => entries.push(TimeToSampleEntry { count: 1, delta: sample.duration }),
        }
    }
    TimeToSampleBox { entries }
}

fn build_composition_offset(track: &Track) -> Option<CompositionOffsetBox> {
    if track.samples.iter().all(|s| s.composition_offset == 0) {
        return None;
    }
    let mut entries: Vec<CompositionOffsetEntry> = Vec::new();
    for sample in &track.samples {
        match entries.last_mut() {
            Some(last) if last.offset == sample.composition_offset => last.count += 1,
            _ => entries.push(CompositionOffsetEntry { count: 1, offset: sample.composition_offset }),
        }
    }
    Some(CompositionOffsetBox { entries })
}

fn build_sync_samples(track: &Track) -> Option<SyncSampleBox> {
    if track.samples.iter().all(|s| s.is_sync()) {
        return None;
    }
    let sample_numbers: Vec<u32> =
        track.samples.iter().enumerate().filter(|(_, s)| s.is_sync()).map(|(i, _)| (i as u32) + 1).collect();
    Some(SyncSampleBox { sample_numbers })
}

fn build_sample_entry(file: &File, track: &Track) -> Result<SampleEntry> {
    let sample = track.samples.first();
    let media_type = sample.map(|s| s.media_type).unwrap_or_else(|| track.handler.fourcc());
    let decoder_config = sample.and_then(|s| s.decoder_config).and_then(|id| file.decoder_config(id).ok());

    if media_type == FourCC::new("hvc1") {
        let dc = decoder_config
            .ok_or_else(|| HeifError::InvalidFunctionParameter("hvc1 track is missing a decoder config".into()))?;
        let config = hevc_config_from_raw(&dc.raw)?;
        let (width, height) = sps_dimensions(&media_type, &dc.raw);
        Ok(SampleEntry::Hevc(HevcSampleEntry {
            data_reference_index: 1,
            width,
            height,
            horizresolution: FixedFloat16_16::from(72.0),
            vertresolution: FixedFloat16_16::from(72.0),
            frame_count: 1,
            depth: 0x0018,
            config,
            other_boxes: Vec::new(),
        }))
    } else if media_type == FourCC::new("avc1") {
        let dc = decoder_config
            .ok_or_else(|| HeifError::InvalidFunctionParameter("avc1 track is missing a decoder config".into()))?;
        let config = avc_config_from_raw(&dc.raw)?;
        let (width, height) = sps_dimensions(&media_type, &dc.raw);
        Ok(SampleEntry::Avc(AvcSampleEntry {
            data_reference_index: 1,
            width,
            height,
            horizresolution: FixedFloat16_16::from(72.0),
            vertresolution: FixedFloat16_16::from(72.0),
            frame_count: 1,
            depth: 0x0018,
            config,
            other_boxes: Vec::new(),
        }))
    } else if media_type == FourCC::new("mp4a") {
        let raw = decoder_config.map(|dc| dc.raw.clone()).unwrap_or_default();
        let parsed = crate::decoderconfig::aac::parse_audio_specific_config(&raw).ok();
        let sample_rate = parsed.as_ref().map(|p| p.sampling_frequency).unwrap_or(44100);
        let channel_count = parsed.as_ref().map(|p| p.channel_count as u16).unwrap_or(2);
        Ok(SampleEntry::Mp4a(Mp4aSampleEntry {
            data_reference_index: 1,
            channel_count,
            sample_size: 16,
            sample_rate,
            esds: EsdsBox { object_type: 0x40, stream_type: 0x15, max_bitrate: 0, avg_bitrate: 0, decoder_specific_info: raw },
        }))
    } else {
        Err(HeifError::UnsupportedCodeType(media_type))
    }
}

/// Builds one track's `stbl` plus its sample bytes, with chunk offsets
/// 0-based and relative to the start of those bytes -- the caller is
/// responsible for shifting them into the shared `mdat` coordinate
/// space once every track's bytes have been collected.
fn build_sample_table(file: &File, track: &Track) -> Result<(SampleTableBox, Vec<u8>)> {
    let mut mdat = Vec::new();
    let mut entry_sizes = Vec::with_capacity(track.samples.len());
    for sample in &track.samples {
        entry_sizes.push(sample.data.len() as u32);
        mdat.extend_from_slice(&sample.data);
    }

    let sample_description = SampleDescriptionBox { entries: vec![build_sample_entry(file, track)?] };
    let sample_size = SampleSizeBox { sample_size: 0, sample_count: track.samples.len() as u32, entry_sizes };
    // §4.6/glossary: one chunk per track, so a single `stsc` run
    // covering every sample and a single `stco` offset.
    let sample_to_chunk = SampleToChunkBox {
        entries: vec![SampleToChunkEntry {
            first_chunk: 1,
            samples_per_chunk: track.samples.len() as u32,
            sample_description_index: 1,
        }],
    };
    let mut chunk_offset = ChunkOffsetBox { large: false, offsets: vec![0u64] };
    chunk_offset.check_size();

    let display_offsets: Vec<i64> = track.samples.iter().map(|s| s.composition_offset as i64).collect();
    let composition_to_decode =
        if cslg_required(&display_offsets) { Some(synthesize_cslg(&display_offsets, 0, &SynthesisOptions::default())) } else { None };

    let id_to_index: HashMap<SampleId, usize> = track.samples.iter().enumerate().map(|(i, s)| (s.id, i)).collect();
    let ref_pic_indices: Vec<Vec<u32>> = track
        .samples
        .iter()
        .map(|s| s.decode_dependencies.iter().filter_map(|dep| id_to_index.get(dep).map(|&idx| idx as u32)).collect())
        .collect();
    let (sample_to_group, sample_group_description) = if ref_pic_indices.iter().any(|refs| !refs.is_empty()) {
        let grouping = synthesize_refs_grouping(&ref_pic_indices);
        (vec![grouping.sbgp], vec![grouping.sgpd])
    } else {
        (Vec::new(), Vec::new())
    };

    Ok((
        SampleTableBox {
            sample_description,
            sample_size,
            sample_to_chunk,
            chunk_offset,
            time_to_sample: build_time_to_sample(track),
            composition_offset: build_composition_offset(track),
            composition_to_decode,
            sync_samples: build_sync_samples(track),
            sample_to_group,
            sample_group_description,
            other_boxes: Vec::new(),
        },
        mdat,
    ))
}

fn build_moov(file: &File) -> Result<Option<(MovieBox, Vec<u8>)>> {
    let tracks_src: Vec<&Track> = file.tracks().collect();
    if tracks_src.is_empty() {
        return Ok(None);
    }
    let movie_timescale = 1000u32;

    // `AlternativeTrackGroup` co-assignment has no box of its own -- it
    // only drives each member track's `tkhd.alternate_group` tag. Item
    // groups (`file.groups()`) are a separate mechanism and go into the
    // meta box's `grpl` instead, in `build_groups_box`.
    let mut alt_group_of: HashMap<u32, i16> = HashMap::new();
    for (tag, group) in file.alternative_track_groups().enumerate() {
        for member in &group.members {
            alt_group_of.insert(member.0, (tag as i16) + 1);
        }
    }

    let mut mdat = Vec::new();
    let mut track_boxes = Vec::new();
    let mut movie_duration = 0u64;
    let mut next_track_id = 1u32;

    for (idx, track) in tracks_src.iter().enumerate() {
        let sequence_id = (idx as u32) + 1;
        next_track_id = sequence_id + 1;

        let (mut stbl, bytes) = build_sample_table(file, track)?;
        let base = mdat.len() as u64;
        for off in stbl.chunk_offset.offsets.iter_mut() {
            *off += base;
        }
        stbl.chunk_offset.check_size();
        mdat.extend_from_slice(&bytes);

        let track_duration_units: u64 = track.samples.iter().map(|s| s.duration as u64).sum();
        let track_duration_movie = if track.timescale == 0 {
            0
        } else {
            track_duration_units * movie_timescale as u64 / track.timescale as u64
        };

        // §4.6 edit-list unroll: when present, the edit list's own
        // duration (including infinite-loop's 0xFFFFFFFF sentinel)
        // overrides the plain sample-sum duration.
        let edit = if track.edit_list.is_empty() {
            None
        } else {
            let (entries, duration) = synthesize_edit_list(&track.edit_list, movie_timescale);
            Some((EditBox { edit_list: Some(EditListBox { entries }) }, duration as u64))
        };
        let tkhd_duration = edit.as_ref().map(|&(_, duration)| duration).unwrap_or(track_duration_movie);
        movie_duration = movie_duration.max(tkhd_duration);

        let header = TrackHeaderBox {
            flags: TrackFlags::new(track.enabled, track.in_movie, track.in_preview),
            creation_time: Time::now(),
            modification_time: Time::now(),
            track_id: sequence_id,
            duration: tkhd_duration,
            layer: 0,
            alternate_group: alt_group_of.get(&sequence_id).copied().unwrap_or(0),
            volume: if track.handler == TrackHandler::Sound { FixedFloat8_8::from(1.0) } else { FixedFloat8_8::from(0.0) },
            matrix: track.matrix.clone(),
            width: FixedFloat16_16::from(0.0),
            height: FixedFloat16_16::from(0.0),
        };
        let media_header = MediaHeaderBox {
            creation_time: Time::now(),
            modification_time: Time::now(),
            timescale: track.timescale,
            duration: track_duration_units,
            language: IsoLanguageCode::default(),
        };
        let handler = HandlerBox { pre_defined: 0, handler_type: track.handler.fourcc(), name: ZString(String::new()) };
        let information = MediaInformationBox { sample_table: Some(stbl), other_boxes: Vec::new() };
        let media = MediaBox { header: media_header, handler, information };

        let track_reference = if track.references.is_empty() {
            None
        } else {
            Some(TrackReferenceBox {
                references: track.references.iter().map(|(kind, targets)| (kind.fourcc(), targets.clone())).collect(),
            })
        };

        track_boxes.push(TrackBox { header, edit: edit.map(|(edit_box, _)| edit_box), media, track_reference });
    }

    let movie_header = MovieHeaderBox {
        creation_time: Time::now(),
        modification_time: Time::now(),
        timescale: movie_timescale,
        duration: movie_duration,
        rate: FixedFloat16_16::from(1.0),
        volume: FixedFloat8_8::from(1.0),
        matrix: Matrix::default(),
        next_track_id,
    };

    Ok(Some((MovieBox { header: Some(movie_header), tracks: track_boxes }, mdat)))
}
