//! File-type box (`ftyp`) -- brand and compatible-brands list.
use crate::error::Result;
use crate::heifbox::{BoxInfo, BoxReader, BoxWriter};
use crate::serialize::{FromBytes, ReadBytes, ToBytes, WriteBytes};
use crate::types::FourCC;

#[derive(Clone, Debug)]
pub struct FileTypeBox {
    pub major_brand: FourCC,
    pub minor_version: u32,
    pub compatible_brands: Vec<FourCC>,
}

impl BoxInfo for FileTypeBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("ftyp")
    }
}

impl FromBytes for FileTypeBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new(stream)?;
        let major_brand = FourCC::from_bytes(&mut r)?;
        let minor_version = u32::from_bytes(&mut r)?;
        let mut compatible_brands = Vec::new();
        while r.left() >= 4 {
            compatible_brands.push(FourCC::from_bytes(&mut r)?);
        }
        Ok(FileTypeBox {
            major_brand,
            minor_version,
            compatible_brands,
        })
    }
    fn min_size() -> usize {
        8
    }
}

impl ToBytes for FileTypeBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new(stream, self.fourcc())?;
        self.major_brand.to_bytes(&mut w)?;
        self.minor_version.to_bytes(&mut w)?;
        for brand in &self.compatible_brands {
            brand.to_bytes(&mut w)?;
        }
        Ok(())
    }
}

impl FileTypeBox {
    /// True if `brand` is either the major brand or listed as compatible.
    pub fn is_compatible(&self, brand: &str) -> bool {
        let fourcc = FourCC::new(brand);
        self.major_brand == fourcc || self.compatible_brands.iter().any(|b| *b == fourcc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let ftyp = FileTypeBox {
            major_brand: FourCC::new("heic"),
            minor_version: 0,
            compatible_brands: vec![FourCC::new("mif1"), FourCC::new("heic")],
        };
        let mut buf = Vec::new();
        ftyp.to_bytes(&mut buf).unwrap();
        let mut slice: &[u8] = &buf;
        let back = FileTypeBox::from_bytes(&mut slice).unwrap();
        assert_eq!(back.major_brand, FourCC::new("heic"));
        assert!(back.is_compatible("mif1"));
        assert!(!back.is_compatible("avif"));
    }
}
