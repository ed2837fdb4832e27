//! The `meta` box and its item-graph children: `hdlr`, `pitm`, `iinf`/
//! `infe`, `iloc`, `iref`, `idat` -- §3/§4.2.
use crate::error::{HeifError, Result};
use crate::heifbox::{BoxInfo, BoxReader, BoxWriter, GenericBox};
use crate::serialize::{FromBytes, ReadBytes, ToBytes, WriteBytes};
use crate::types::{FourCC, ItemId, ZString};

use super::iprp::ItemPropertiesBox;

/// Handler box (`hdlr`): declares the "track type" of the containing
/// container -- `pict` for the HEIF metabox.
#[derive(Clone, Debug)]
pub struct HandlerBox {
    pub pre_defined: u32,
    pub handler_type: FourCC,
    pub name: ZString,
}

impl BoxInfo for HandlerBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("hdlr")
    }
}

impl FromBytes for HandlerBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new_full(stream)?;
        let pre_defined = u32::from_bytes(&mut r)?;
        let handler_type = FourCC::from_bytes(&mut r)?;
        r.skip(12)?; // reserved
        let name = ZString::from_bytes(&mut r)?;
        Ok(HandlerBox {
            pre_defined,
            handler_type,
            name,
        })
    }
    fn min_size() -> usize {
        20
    }
}

impl ToBytes for HandlerBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new_full(stream, self.fourcc(), 0, 0)?;
        self.pre_defined.to_bytes(&mut w)?;
        self.handler_type.to_bytes(&mut w)?;
        w.skip(12)?;
        self.name.to_bytes(&mut w)
    }
}

/// Primary item box (`pitm`).
#[derive(Clone, Copy, Debug)]
pub struct PrimaryItemBox {
    pub item_id: ItemId,
}

impl BoxInfo for PrimaryItemBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("pitm")
    }
}

impl FromBytes for PrimaryItemBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new_full(stream)?;
        let item_id = if r.version() == 0 {
            u16::from_bytes(&mut r)? as u32
        } else {
            u32::from_bytes(&mut r)?
        };
        Ok(PrimaryItemBox { item_id: item_id.into() })
    }
    fn min_size() -> usize {
        2
    }
}

impl ToBytes for PrimaryItemBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let version = if self.item_id.0 > u16::MAX as u32 { 1 } else { 0 };
        let mut w = BoxWriter::new_full(stream, self.fourcc(), version, 0)?;
        if version == 0 {
            (self.item_id.0 as u16).to_bytes(&mut w)
        } else {
            self.item_id.0.to_bytes(&mut w)
        }
    }
}

/// One `infe` entry (`ItemInfoEntry`). Only the version 2/3 fields this
/// crate writes/needs are kept; legacy version 0/1 entries are accepted
/// on read but their extra fields are unused.
#[derive(Clone, Debug)]
pub struct ItemInfoEntry {
    pub item_id: ItemId,
    pub protection_index: u16,
    pub item_type: FourCC,
    pub item_name: String,
    pub content_type: Option<String>,
    pub content_encoding: Option<String>,
    pub hidden: bool,
}

impl BoxInfo for ItemInfoEntry {
    fn fourcc(&self) -> FourCC {
        FourCC::new("infe")
    }
}

fn read_cstring<R: ReadBytes>(r: &mut R) -> Result<String> {
    let mut s = Vec::new();
    loop {
        let b = r.read(1)?[0];
        if b == 0 {
            break;
        }
        s.push(b);
    }
    Ok(String::from_utf8_lossy(&s).into_owned())
}

fn write_cstring<W: WriteBytes>(w: &mut W, s: &str) -> Result<()> {
    w.write(s.as_bytes())?;
    w.write(&[0])
}

impl FromBytes for ItemInfoEntry {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new_full(stream)?;
        let version = r.version();
        let item_id = if version < 3 {
            u16::from_bytes(&mut r)? as u32
        } else {
            u32::from_bytes(&mut r)?
        };
        let protection_index = u16::from_bytes(&mut r)?;
        let item_type = if version >= 2 {
            FourCC::from_bytes(&mut r)?
        } else {
            FourCC::default()
        };
        let item_name = read_cstring(&mut r)?;
        let mut content_type = None;
        let mut content_encoding = None;
        if item_type == FourCC::new("mime") {
            content_type = Some(read_cstring(&mut r)?);
            if r.left() > 0 {
                content_encoding = Some(read_cstring(&mut r)?);
            }
        } else if item_type == FourCC::new("uri ") {
            content_type = Some(read_cstring(&mut r)?);
        }
        let hidden = (r.flags() & 0x1) != 0;
        Ok(ItemInfoEntry {
            item_id: item_id.into(),
            protection_index,
            item_type,
            item_name,
            content_type,
            content_encoding,
            hidden,
        })
    }
    fn min_size() -> usize {
        8
    }
}

impl ToBytes for ItemInfoEntry {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let flags = if self.hidden { 0x1 } else { 0 };
        let mut w = BoxWriter::new_full(stream, self.fourcc(), 2, flags)?;
        (self.item_id.0 as u16).to_bytes(&mut w)?;
        self.protection_index.to_bytes(&mut w)?;
        self.item_type.to_bytes(&mut w)?;
        write_cstring(&mut w, &self.item_name)?;
        if self.item_type == FourCC::new("mime") {
            write_cstring(&mut w, self.content_type.as_deref().unwrap_or(""))?;
            if let Some(enc) = &self.content_encoding {
                write_cstring(&mut w, enc)?;
            }
        } else if self.item_type == FourCC::new("uri ") {
            write_cstring(&mut w, self.content_type.as_deref().unwrap_or(""))?;
        }
        Ok(())
    }
}

/// Item information box (`iinf`): a `FullBox` wrapping a count-prefixed
/// list of `infe` entries.
#[derive(Clone, Debug, Default)]
pub struct ItemInfoBox {
    pub entries: Vec<ItemInfoEntry>,
}

impl BoxInfo for ItemInfoBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("iinf")
    }
}

impl FromBytes for ItemInfoBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new_full(stream)?;
        let count = if r.version() == 0 {
            u16::from_bytes(&mut r)? as u32
        } else {
            u32::from_bytes(&mut r)?
        };
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            entries.push(ItemInfoEntry::from_bytes(&mut r)?);
        }
        Ok(ItemInfoBox { entries })
    }
    fn min_size() -> usize {
        2
    }
}

impl ToBytes for ItemInfoBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let version = if self.entries.len() > u16::MAX as usize { 1 } else { 0 };
        let mut w = BoxWriter::new_full(stream, self.fourcc(), version, 0)?;
        if version == 0 {
            (self.entries.len() as u16).to_bytes(&mut w)?;
        } else {
            (self.entries.len() as u32).to_bytes(&mut w)?;
        }
        for entry in &self.entries {
            entry.to_bytes(&mut w)?;
        }
        Ok(())
    }
}

/// How an `iloc` extent resolves to bytes. Construction method 2
/// (`IdatOffset`) is the one this crate writes; method 0 (`File`) is
/// still fully supported on read for interop with other encoders.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConstructionMethod {
    File,
    IdatOffset,
}

#[derive(Clone, Debug)]
pub struct ItemLocationExtent {
    pub offset: u64,
    pub length: u64,
}

#[derive(Clone, Debug)]
pub struct ItemLocationEntry {
    pub item_id: ItemId,
    pub construction_method: ConstructionMethod,
    pub data_reference_index: u16,
    pub base_offset: u64,
    pub extents: Vec<ItemLocationExtent>,
}

/// Item location box (`iloc`): maps each item to one or more byte
/// ranges, either in the file directly or inside the metabox's `idat`.
#[derive(Clone, Debug, Default)]
pub struct ItemLocationBox {
    pub entries: Vec<ItemLocationEntry>,
}

impl BoxInfo for ItemLocationBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("iloc")
    }
}

fn read_sized_uint<R: ReadBytes>(r: &mut R, nbytes: u8) -> Result<u64> {
    Ok(match nbytes {
        0 => 0,
        4 => u32::from_bytes(r)? as u64,
        8 => u64::from_bytes(r)?,
        n => return Err(HeifError::MediaParsingError(format!("unsupported iloc field width {}", n))),
    })
}

fn write_sized_uint<W: WriteBytes>(w: &mut W, value: u64, nbytes: u8) -> Result<()> {
    match nbytes {
        0 => Ok(()),
        4 => (value as u32).to_bytes(w),
        8 => value.to_bytes(w),
        n => Err(HeifError::InvalidFunctionParameter(format!("unsupported iloc field width {}", n))),
    }
}

impl FromBytes for ItemLocationBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new_full(stream)?;
        let version = r.version();
        let sizes = u16::from_bytes(&mut r)?;
        let offset_size = ((sizes >> 12) & 0xf) as u8 * 4;
        let length_size = ((sizes >> 8) & 0xf) as u8 * 4;
        let base_offset_size = ((sizes >> 4) & 0xf) as u8 * 4;
        let index_size = (sizes & 0xf) as u8 * 4;

        let item_count = if version < 2 {
            u16::from_bytes(&mut r)? as u32
        } else {
            u32::from_bytes(&mut r)?
        };

        let mut entries = Vec::with_capacity(item_count as usize);
        for _ in 0..item_count {
            let item_id = if version < 2 {
                u16::from_bytes(&mut r)? as u32
            } else {
                u32::from_bytes(&mut r)?
            };
            let construction_method = if version == 1 || version == 2 {
                let cm = u16::from_bytes(&mut r)? & 0xf;
                match cm {
                    0 => ConstructionMethod::File,
                    2 => ConstructionMethod::IdatOffset,
                    other => {
                        return Err(HeifError::MediaParsingError(format!(
                            "unsupported iloc construction method {}",
                            other
                        )))
                    }
                }
            } else {
                ConstructionMethod::File
            };
            let data_reference_index = u16::from_bytes(&mut r)?;
            let base_offset = read_sized_uint(&mut r, base_offset_size)?;
            let extent_count = u16::from_bytes(&mut r)?;
            let mut extents = Vec::with_capacity(extent_count as usize);
            for _ in 0..extent_count {
                if index_size > 0 && (version == 1 || version == 2) {
                    let _extent_index = read_sized_uint(&mut r, index_size)?;
                }
                let offset = read_sized_uint(&mut r, offset_size)?;
                let length = read_sized_uint(&mut r, length_size)?;
                extents.push(ItemLocationExtent { offset, length });
            }
            entries.push(ItemLocationEntry {
                item_id: item_id.into(),
                construction_method,
                data_reference_index,
                base_offset,
                extents,
            });
        }
        Ok(ItemLocationBox { entries })
    }
    fn min_size() -> usize {
        4
    }
}

impl ToBytes for ItemLocationBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        // Fixed field widths: 4 bytes for offsets/lengths/base offsets,
        // enough for any file this crate writes; no index field (we
        // never need more than one extent per entry for method 2, and
        // multi-extent method-0 entries use implicit sequential index).
        let offset_size = 4u8;
        let length_size = 4u8;
        let base_offset_size = 4u8;
        let index_size = 0u8;
        let version = if self.entries.iter().any(|e| e.construction_method == ConstructionMethod::IdatOffset) {
            1
        } else {
            0
        };
        let mut w = BoxWriter::new_full(stream, self.fourcc(), version, 0)?;
        let sizes: u16 = ((offset_size / 4) as u16) << 12
            | ((length_size / 4) as u16) << 8
            | ((base_offset_size / 4) as u16) << 4
            | (index_size / 4) as u16;
        sizes.to_bytes(&mut w)?;
        (self.entries.len() as u16).to_bytes(&mut w)?;
        for entry in &self.entries {
            (entry.item_id.0 as u16).to_bytes(&mut w)?;
            if version == 1 {
                let cm: u16 = match entry.construction_method {
                    ConstructionMethod::File => 0,
                    ConstructionMethod::IdatOffset => 2,
                };
                cm.to_bytes(&mut w)?;
            }
            entry.data_reference_index.to_bytes(&mut w)?;
            write_sized_uint(&mut w, entry.base_offset, base_offset_size)?;
            (entry.extents.len() as u16).to_bytes(&mut w)?;
            for extent in &entry.extents {
                write_sized_uint(&mut w, extent.offset, offset_size)?;
                write_sized_uint(&mut w, extent.length, length_size)?;
            }
        }
        Ok(())
    }
}

/// Item reference box (`iref`): one `SingleItemTypeReferenceBox` per
/// reference type (`thmb`, `auxl`, `dimg`, `base`, `cdsc`, ...).
#[derive(Clone, Debug)]
pub struct ItemReference {
    pub reference_type: FourCC,
    pub from_item_id: ItemId,
    pub to_item_ids: Vec<ItemId>,
}

#[derive(Clone, Debug, Default)]
pub struct ItemReferenceBox {
    pub references: Vec<ItemReference>,
}

impl BoxInfo for ItemReferenceBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("iref")
    }
}

impl FromBytes for ItemReferenceBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut outer = BoxReader::new_full(stream)?;
        let large_ids = outer.version() != 0;
        let mut references = Vec::new();
        while outer.left() >= 8 {
            let mut r = BoxReader::new(&mut outer)?;
            let reference_type = r.fourcc;
            let from_item_id = if large_ids {
                u32::from_bytes(&mut r)?
            } else {
                u16::from_bytes(&mut r)? as u32
            };
            let count = u16::from_bytes(&mut r)?;
            let mut to_item_ids = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let id = if large_ids {
                    u32::from_bytes(&mut r)?
                } else {
                    u16::from_bytes(&mut r)? as u32
                };
                to_item_ids.push(id.into());
            }
            references.push(ItemReference {
                reference_type,
                from_item_id: from_item_id.into(),
                to_item_ids,
            });
        }
        Ok(ItemReferenceBox { references })
    }
    fn min_size() -> usize {
        0
    }
}

impl ToBytes for ItemReferenceBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let large_ids = self
            .references
            .iter()
            .any(|r| r.from_item_id.0 > u16::MAX as u32 || r.to_item_ids.iter().any(|t| t.0 > u16::MAX as u32));
        let version = if large_ids { 1 } else { 0 };
        let mut outer = BoxWriter::new_full(stream, self.fourcc(), version, 0)?;
        for reference in &self.references {
            let mut w = BoxWriter::new(&mut outer, reference.reference_type)?;
            if large_ids {
                reference.from_item_id.0.to_bytes(&mut w)?;
            } else {
                (reference.from_item_id.0 as u16).to_bytes(&mut w)?;
            }
            (reference.to_item_ids.len() as u16).to_bytes(&mut w)?;
            for id in &reference.to_item_ids {
                if large_ids {
                    id.0.to_bytes(&mut w)?;
                } else {
                    (id.0 as u16).to_bytes(&mut w)?;
                }
            }
        }
        Ok(())
    }
}

/// Item data box (`idat`): inline storage for construction-method-2 item
/// extents.
#[derive(Clone, Debug, Default)]
pub struct ItemDataBox {
    pub data: Vec<u8>,
}

impl BoxInfo for ItemDataBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("idat")
    }
}

impl FromBytes for ItemDataBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new(stream)?;
        let left = r.left();
        let data = r.read(left)?.to_vec();
        Ok(ItemDataBox { data })
    }
    fn min_size() -> usize {
        0
    }
}

impl ToBytes for ItemDataBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new(stream, self.fourcc())?;
        w.write(&self.data)
    }
}

/// The `meta` box: a `FullBox` container holding `hdlr`, `pitm`, `iinf`,
/// `iloc`, `iref`, `iprp`, `idat`, and anything else we don't interpret.
#[derive(Clone, Debug, Default)]
pub struct MetaBox {
    pub handler: Option<HandlerBox>,
    pub primary_item: Option<PrimaryItemBox>,
    pub item_info: Option<ItemInfoBox>,
    pub item_location: Option<ItemLocationBox>,
    pub item_reference: Option<ItemReferenceBox>,
    pub item_properties: Option<ItemPropertiesBox>,
    pub item_data: Option<ItemDataBox>,
    pub groups: Option<super::grpl::GroupListBox>,
    pub other_boxes: Vec<GenericBox>,
}

impl BoxInfo for MetaBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("meta")
    }
}

impl FromBytes for MetaBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new_full(stream)?;
        let mut meta = MetaBox::default();
        while r.left() >= 8 {
            let fourcc = r.peek_fourcc()?;
            match fourcc.to_be_bytes().as_ref() {
                b"hdlr" => meta.handler = Some(HandlerBox::from_bytes(&mut r)?),
                b"pitm" => meta.primary_item = Some(PrimaryItemBox::from_bytes(&mut r)?),
                b"iinf" => meta.item_info = Some(ItemInfoBox::from_bytes(&mut r)?),
                b"iloc" => meta.item_location = Some(ItemLocationBox::from_bytes(&mut r)?),
                b"iref" => meta.item_reference = Some(ItemReferenceBox::from_bytes(&mut r)?),
                b"iprp" => meta.item_properties = Some(ItemPropertiesBox::from_bytes(&mut r)?),
                b"idat" => meta.item_data = Some(ItemDataBox::from_bytes(&mut r)?),
                b"grpl" => meta.groups = Some(super::grpl::GroupListBox::from_bytes(&mut r)?),
                _ => {
                    let mut inner = BoxReader::new(&mut r)?;
                    meta.other_boxes.push(GenericBox::from_bytes(&mut inner)?);
                }
            }
        }
        Ok(meta)
    }
    fn min_size() -> usize {
        0
    }
}

impl ToBytes for MetaBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new_full(stream, self.fourcc(), 0, 0)?;
        if let Some(b) = &self.handler {
            b.to_bytes(&mut w)?;
        }
        if let Some(b) = &self.primary_item {
            b.to_bytes(&mut w)?;
        }
        if let Some(b) = &self.item_properties {
            b.to_bytes(&mut w)?;
        }
        if let Some(b) = &self.item_info {
            b.to_bytes(&mut w)?;
        }
        if let Some(b) = &self.item_reference {
            b.to_bytes(&mut w)?;
        }
        if let Some(b) = &self.item_location {
            b.to_bytes(&mut w)?;
        }
        if let Some(b) = &self.item_data {
            b.to_bytes(&mut w)?;
        }
        if let Some(b) = &self.groups {
            b.to_bytes(&mut w)?;
        }
        for b in &self.other_boxes {
            b.to_bytes(&mut w)?;
        }
        Ok(())
    }
}

// Helper used by MetaBox::from_bytes to dispatch on the next box's
// fourcc without consuming it.
trait PeekFourCC {
    fn peek_fourcc(&mut self) -> Result<FourCC>;
}

impl<R: ReadBytes> PeekFourCC for R {
    fn peek_fourcc(&mut self) -> Result<FourCC> {
        let bytes = self.peek(8)?;
        Ok(FourCC::from(&bytes[4..8]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handler_box_roundtrip() {
        let hdlr = HandlerBox {
            pre_defined: 0,
            handler_type: FourCC::new("pict"),
            name: ZString("heif".to_string()),
        };
        let mut buf = Vec::new();
        hdlr.to_bytes(&mut buf).unwrap();
        let mut slice: &[u8] = &buf;
        let back = HandlerBox::from_bytes(&mut slice).unwrap();
        assert_eq!(back.handler_type, FourCC::new("pict"));
    }

    #[test]
    fn primary_item_box_roundtrip() {
        let pitm = PrimaryItemBox { item_id: ItemId(42) };
        let mut buf = Vec::new();
        pitm.to_bytes(&mut buf).unwrap();
        let mut slice: &[u8] = &buf;
        let back = PrimaryItemBox::from_bytes(&mut slice).unwrap();
        assert_eq!(back.item_id, ItemId(42));
    }

    #[test]
    fn iloc_file_entry_roundtrip() {
        let iloc = ItemLocationBox {
            entries: vec![ItemLocationEntry {
                item_id: ItemId(1),
                construction_method: ConstructionMethod::File,
                data_reference_index: 0,
                base_offset: 0,
                extents: vec![ItemLocationExtent { offset: 100, length: 50 }],
            }],
        };
        let mut buf = Vec::new();
        iloc.to_bytes(&mut buf).unwrap();
        let mut slice: &[u8] = &buf;
        let back = ItemLocationBox::from_bytes(&mut slice).unwrap();
        assert_eq!(back.entries[0].extents[0].length, 50);
    }

    #[test]
    fn iref_roundtrip() {
        let iref = ItemReferenceBox {
            references: vec![ItemReference {
                reference_type: FourCC::new("thmb"),
                from_item_id: ItemId(2),
                to_item_ids: vec![ItemId(1)],
            }],
        };
        let mut buf = Vec::new();
        iref.to_bytes(&mut buf).unwrap();
        let mut slice: &[u8] = &buf;
        let back = ItemReferenceBox::from_bytes(&mut slice).unwrap();
        assert_eq!(back.references[0].reference_type, FourCC::new("thmb"));
        assert_eq!(back.references[0].to_item_ids[0], ItemId(1));
    }

    #[test]
    fn infe_mime_item_roundtrip() {
        let infe = ItemInfoEntry {
            item_id: ItemId(3),
            protection_index: 0,
            item_type: FourCC::new("mime"),
            item_name: "".to_string(),
            content_type: Some("application/rdf+xml".to_string()),
            content_encoding: None,
            hidden: true,
        };
        let mut buf = Vec::new();
        infe.to_bytes(&mut buf).unwrap();
        let mut slice: &[u8] = &buf;
        let back = ItemInfoEntry::from_bytes(&mut slice).unwrap();
        assert_eq!(back.content_type.as_deref(), Some("application/rdf+xml"));
        assert!(back.hidden);
    }
}
