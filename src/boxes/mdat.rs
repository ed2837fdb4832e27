//! Media data box (`mdat`): the raw byte pool that `iloc`/sample-table
//! offsets point into. This crate's own writer always emits a single
//! `mdat` holding every item/sample payload back to back -- §4.2/§5.
use crate::error::Result;
use crate::heifbox::{BoxInfo, BoxReader, BoxWriter};
use crate::io::DataRef;
use crate::serialize::{FromBytes, ReadBytes, ToBytes, WriteBytes};
use crate::types::FourCC;

#[derive(Clone, Debug, Default)]
pub struct MediaDataBox {
    pub data: DataRef,
}

impl BoxInfo for MediaDataBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("mdat")
    }
}

impl FromBytes for MediaDataBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new(stream)?;
        let size = r.left();
        let data = DataRef::from_stream(&mut r, size)?;
        Ok(MediaDataBox { data })
    }
    fn min_size() -> usize {
        8
    }
}

impl ToBytes for MediaDataBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new(stream, self.fourcc())?;
        self.data.to_bytes(&mut w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_owned_payload() {
        let mdat = MediaDataBox {
            data: DataRef::from_owned(vec![1, 2, 3, 4, 5]),
        };
        let mut buf = Vec::new();
        mdat.to_bytes(&mut buf).unwrap();
        assert_eq!(&buf[8..], &[1, 2, 3, 4, 5]);
        assert_eq!(buf.len(), 13);
    }
}
