//! Item properties: `iprp`/`ipco`/`ipma`, and the common property boxes
//! HEIF images actually carry (`ispe`, `irot`, `imir`, `pixi`, `colr`,
//! and the HEVC/AVC decoder configuration records) -- §3/§4.2.
use crate::error::Result;
use crate::heifbox::{BoxInfo, BoxReader, BoxWriter, GenericBox};
use crate::serialize::{FromBytes, ReadBytes, ToBytes, WriteBytes};
use crate::types::{Data, FourCC, ItemId};

use super::sampleentry::{AvcConfigurationBox, HevcConfigurationBox};

/// Image spatial extents (`ispe`): the decoded image's display dimensions.
#[derive(Clone, Copy, Debug)]
pub struct ImageSpatialExtentsProperty {
    pub width: u32,
    pub height: u32,
}

impl BoxInfo for ImageSpatialExtentsProperty {
    fn fourcc(&self) -> FourCC {
        FourCC::new("ispe")
    }
}

impl FromBytes for ImageSpatialExtentsProperty {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new_full(stream)?;
        let width = u32::from_bytes(&mut r)?;
        let height = u32::from_bytes(&mut r)?;
        Ok(ImageSpatialExtentsProperty { width, height })
    }
    fn min_size() -> usize {
        8
    }
}

impl ToBytes for ImageSpatialExtentsProperty {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new_full(stream, self.fourcc(), 0, 0)?;
        self.width.to_bytes(&mut w)?;
        self.height.to_bytes(&mut w)
    }
}

/// Pixel information (`pixi`): bit depth per channel.
#[derive(Clone, Debug)]
pub struct PixelInformationProperty {
    pub bits_per_channel: Vec<u8>,
}

impl BoxInfo for PixelInformationProperty {
    fn fourcc(&self) -> FourCC {
        FourCC::new("pixi")
    }
}

impl FromBytes for PixelInformationProperty {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new_full(stream)?;
        let count = u8::from_bytes(&mut r)?;
        let mut bits_per_channel = Vec::with_capacity(count as usize);
        for _ in 0..count {
            bits_per_channel.push(u8::from_bytes(&mut r)?);
        }
        Ok(PixelInformationProperty { bits_per_channel })
    }
    fn min_size() -> usize {
        1
    }
}

impl ToBytes for PixelInformationProperty {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new_full(stream, self.fourcc(), 0, 0)?;
        (self.bits_per_channel.len() as u8).to_bytes(&mut w)?;
        for b in &self.bits_per_channel {
            b.to_bytes(&mut w)?;
        }
        Ok(())
    }
}

/// Image rotation (`irot`): clockwise rotation in 90-degree steps (0-3).
#[derive(Clone, Copy, Debug)]
pub struct ImageRotationProperty {
    pub angle: u8,
}

impl BoxInfo for ImageRotationProperty {
    fn fourcc(&self) -> FourCC {
        FourCC::new("irot")
    }
}

impl FromBytes for ImageRotationProperty {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new(stream)?;
        let byte = u8::from_bytes(&mut r)?;
        Ok(ImageRotationProperty { angle: byte & 0x3 })
    }
    fn min_size() -> usize {
        1
    }
}

impl ToBytes for ImageRotationProperty {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new(stream, self.fourcc())?;
        (self.angle & 0x3).to_bytes(&mut w)
    }
}

/// Image mirroring (`imir`): axis of reflection.
#[derive(Clone, Copy, Debug)]
pub struct ImageMirrorProperty {
    pub axis_is_vertical: bool,
}

impl BoxInfo for ImageMirrorProperty {
    fn fourcc(&self) -> FourCC {
        FourCC::new("imir")
    }
}

impl FromBytes for ImageMirrorProperty {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new(stream)?;
        let byte = u8::from_bytes(&mut r)?;
        Ok(ImageMirrorProperty {
            axis_is_vertical: (byte & 0x1) == 0,
        })
    }
    fn min_size() -> usize {
        1
    }
}

impl ToBytes for ImageMirrorProperty {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new(stream, self.fourcc())?;
        let byte: u8 = if self.axis_is_vertical { 0 } else { 1 };
        byte.to_bytes(&mut w)
    }
}

/// Colour information (`colr`): passed through uninterpreted, since
/// interpreting ICC profiles/CICP triples is outside this crate's scope.
#[derive(Clone, Debug)]
pub struct ColourInformationBox {
    pub colour_type: FourCC,
    pub data: Data,
}

impl BoxInfo for ColourInformationBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("colr")
    }
}

impl FromBytes for ColourInformationBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new(stream)?;
        let colour_type = FourCC::from_bytes(&mut r)?;
        let data = Data::from_bytes(&mut r)?;
        Ok(ColourInformationBox { colour_type, data })
    }
    fn min_size() -> usize {
        4
    }
}

impl ToBytes for ColourInformationBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new(stream, self.fourcc())?;
        self.colour_type.to_bytes(&mut w)?;
        self.data.to_bytes(&mut w)
    }
}

/// Any item property. `Raw` is the passthrough for property kinds this
/// crate doesn't otherwise interpret.
#[derive(Clone, Debug)]
pub enum Property {
    ImageSpatialExtents(ImageSpatialExtentsProperty),
    PixelInformation(PixelInformationProperty),
    Rotation(ImageRotationProperty),
    Mirror(ImageMirrorProperty),
    Colour(ColourInformationBox),
    HevcConfiguration(HevcConfigurationBox),
    AvcConfiguration(AvcConfigurationBox),
    Raw { fourcc: FourCC, bytes: Vec<u8> },
}

impl Property {
    pub fn fourcc(&self) -> FourCC {
        match self {
            Property::ImageSpatialExtents(b) => b.fourcc(),
            Property::PixelInformation(b) => b.fourcc(),
            Property::Rotation(b) => b.fourcc(),
            Property::Mirror(b) => b.fourcc(),
            Property::Colour(b) => b.fourcc(),
            Property::HevcConfiguration(b) => b.fourcc(),
            Property::AvcConfiguration(b) => b.fourcc(),
            Property::Raw { fourcc, .. } => *fourcc,
        }
    }

    /// Properties that must be associated with every image item are
    /// "essential"; unknown/`Raw` properties are conservatively treated
    /// as non-essential so a reader that ignores them still decodes.
    pub fn is_transformative(&self) -> bool {
        matches!(self, Property::Rotation(_) | Property::Mirror(_))
    }
}

impl FromBytes for Property {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let fourcc = stream.peek_fourcc()?;
        Ok(match fourcc.to_be_bytes().as_ref() {
            b"ispe" => Property::ImageSpatialExtents(ImageSpatialExtentsProperty::from_bytes(stream)?),
            b"pixi" => Property::PixelInformation(PixelInformationProperty::from_bytes(stream)?),
            b"irot" => Property::Rotation(ImageRotationProperty::from_bytes(stream)?),
            b"imir" => Property::Mirror(ImageMirrorProperty::from_bytes(stream)?),
            b"colr" => Property::Colour(ColourInformationBox::from_bytes(stream)?),
            b"hvcC" => Property::HevcConfiguration(HevcConfigurationBox::from_bytes(stream)?),
            b"avcC" => Property::AvcConfiguration(AvcConfigurationBox::from_bytes(stream)?),
            _ => {
                let mut r = BoxReader::new(stream)?;
                let generic = GenericBox::from_bytes(&mut r)?;
                Property::Raw {
                    fourcc,
                    bytes: generic.data().to_vec(),
                }
            }
        })
    }
    fn min_size() -> usize {
        0
    }
}

impl ToBytes for Property {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        match self {
            Property::ImageSpatialExtents(b) => b.to_bytes(stream),
            Property::PixelInformation(b) => b.to_bytes(stream),
            Property::Rotation(b) => b.to_bytes(stream),
            Property::Mirror(b) => b.to_bytes(stream),
            Property::Colour(b) => b.to_bytes(stream),
            Property::HevcConfiguration(b) => b.to_bytes(stream),
            Property::AvcConfiguration(b) => b.to_bytes(stream),
            Property::Raw { fourcc, bytes } => {
                let mut w = BoxWriter::new(stream, *fourcc)?;
                w.write(bytes)
            }
        }
    }
}

/// Property container (`ipco`): the flat, 1-indexed list of property
/// boxes that `ipma` entries point into.
#[derive(Clone, Debug, Default)]
pub struct ItemPropertyContainerBox {
    pub properties: Vec<Property>,
}

impl BoxInfo for ItemPropertyContainerBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("ipco")
    }
}

impl FromBytes for ItemPropertyContainerBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new(stream)?;
        let mut properties = Vec::new();
        while r.left() >= 8 {
            properties.push(Property::from_bytes(&mut r)?);
        }
        Ok(ItemPropertyContainerBox { properties })
    }
    fn min_size() -> usize {
        0
    }
}

impl ToBytes for ItemPropertyContainerBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new(stream, self.fourcc())?;
        for p in &self.properties {
            p.to_bytes(&mut w)?;
        }
        Ok(())
    }
}

/// One item's association list: a set of (1-based property index,
/// essential) pairs.
#[derive(Clone, Debug)]
pub struct ItemPropertyAssociation {
    pub item_id: ItemId,
    pub associations: Vec<(u16, bool)>,
}

/// Property association box (`ipma`).
#[derive(Clone, Debug, Default)]
pub struct ItemPropertyAssociationBox {
    pub entries: Vec<ItemPropertyAssociation>,
}

impl BoxInfo for ItemPropertyAssociationBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("ipma")
    }
}

impl FromBytes for ItemPropertyAssociationBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new_full(stream)?;
        let version = r.version();
        let large_index = (r.flags() & 1) != 0;
        let count = u32::from_bytes(&mut r)?;
        let mut entries = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let item_id = if version == 0 {
                u16::from_bytes(&mut r)? as u32
            } else {
                u32::from_bytes(&mut r)?
            };
            let assoc_count = u8::from_bytes(&mut r)?;
            let mut associations = Vec::with_capacity(assoc_count as usize);
            for _ in 0..assoc_count {
                if large_index {
                    let v = u16::from_bytes(&mut r)?;
                    associations.push((v & 0x7fff, (v & 0x8000) != 0));
                } else {
                    let v = u8::from_bytes(&mut r)?;
                    associations.push(((v & 0x7f) as u16, (v & 0x80) != 0));
                }
            }
            entries.push(ItemPropertyAssociation {
                item_id: item_id.into(),
                associations,
            });
        }
        Ok(ItemPropertyAssociationBox { entries })
    }
    fn min_size() -> usize {
        4
    }
}

impl ToBytes for ItemPropertyAssociationBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let large_index = self
            .entries
            .iter()
            .any(|e| e.associations.iter().any(|(idx, _)| *idx > 0x7f));
        let version = if self.entries.iter().any(|e| e.item_id.0 > u16::MAX as u32) { 1 } else { 0 };
        let flags = if large_index { 1 } else { 0 };
        let mut w = BoxWriter::new_full(stream, self.fourcc(), version, flags)?;
        (self.entries.len() as u32).to_bytes(&mut w)?;
        for entry in &self.entries {
            if version == 0 {
                (entry.item_id.0 as u16).to_bytes(&mut w)?;
            } else {
                entry.item_id.0.to_bytes(&mut w)?;
            }
            (entry.associations.len() as u8).to_bytes(&mut w)?;
            for (idx, essential) in &entry.associations {
                if large_index {
                    let v = (*idx & 0x7fff) | if *essential { 0x8000 } else { 0 };
                    v.to_bytes(&mut w)?;
                } else {
                    let v = (*idx as u8 & 0x7f) | if *essential { 0x80 } else { 0 };
                    v.to_bytes(&mut w)?;
                }
            }
        }
        Ok(())
    }
}

/// Item properties box (`iprp`): wraps `ipco` and `ipma`.
#[derive(Clone, Debug, Default)]
pub struct ItemPropertiesBox {
    pub container: ItemPropertyContainerBox,
    pub associations: ItemPropertyAssociationBox,
}

impl BoxInfo for ItemPropertiesBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("iprp")
    }
}

impl FromBytes for ItemPropertiesBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new(stream)?;
        let container = ItemPropertyContainerBox::from_bytes(&mut r)?;
        let associations = ItemPropertyAssociationBox::from_bytes(&mut r)?;
        Ok(ItemPropertiesBox { container, associations })
    }
    fn min_size() -> usize {
        0
    }
}

impl ToBytes for ItemPropertiesBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new(stream, self.fourcc())?;
        self.container.to_bytes(&mut w)?;
        self.associations.to_bytes(&mut w)
    }
}

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
    fn ispe_roundtrip() {
        let ispe = ImageSpatialExtentsProperty { width: 4032, height: 3024 };
        let mut buf = Vec::new();
        ispe.to_bytes(&mut buf).unwrap();
        let mut slice: &[u8] = &buf;
        let back = ImageSpatialExtentsProperty::from_bytes(&mut slice).unwrap();
        assert_eq!(back.width, 4032);
        assert_eq!(back.height, 3024);
    }

    #[test]
    fn raw_property_passthrough() {
        let mut inner = Vec::new();
        inner.extend_from_slice(b"deadbeef");
        let raw = Property::Raw {
            fourcc: FourCC::new("zzzz"),
            bytes: inner.clone(),
        };
        let mut buf = Vec::new();
        raw.to_bytes(&mut buf).unwrap();
        let mut slice: &[u8] = &buf;
        let back = Property::from_bytes(&mut slice).unwrap();
        match back {
            Property::Raw { fourcc, bytes } => {
                assert_eq!(fourcc, FourCC::new("zzzz"));
                assert_eq!(bytes, inner);
            }
            _ => panic!("expected raw property"),
        }
    }

    #[test]
    fn ipma_roundtrip_with_essential_flag() {
        let ipma = ItemPropertyAssociationBox {
            entries: vec![ItemPropertyAssociation {
                item_id: ItemId(1),
                associations: vec![(1, true), (2, false)],
            }],
        };
        let mut buf = Vec::new();
        ipma.to_bytes(&mut buf).unwrap();
        let mut slice: &[u8] = &buf;
        let back = ItemPropertyAssociationBox::from_bytes(&mut slice).unwrap();
        assert_eq!(back.entries[0].associations, vec![(1, true), (2, false)]);
    }
}
