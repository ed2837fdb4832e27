//! Fundamental value types shared by every box and by the object model
//! (`FourCC`, `Time`, string/matrix/fixed-float wire types, and the
//! opaque entity-id newtypes used throughout §3/§6.2).
use std::convert::TryInto;
use std::fmt::{Debug, Display};
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::offset::{TimeZone, Utc};
use serde::Serialize;

use crate::error::Result;
use crate::serialize::{FromBytes, ReadBytes, ToBytes, WriteBytes};

// Convenience macro to implement FromBytes/ToBytes for newtypes.
macro_rules! def_from_to_bytes_newtype {
    ($newtype:ident, $type:ty) => {
        impl FromBytes for $newtype {
            fn from_bytes<R: ReadBytes>(bytes: &mut R) -> Result<Self> {
                let res = <$type>::from_bytes(bytes)?;
                Ok($newtype(res))
            }
            fn min_size() -> usize {
                <$type>::min_size()
            }
        }
        impl ToBytes for $newtype {
            fn to_bytes<W: WriteBytes>(&self, bytes: &mut W) -> Result<()> {
                self.0.to_bytes(bytes)
            }
        }
    };
}

/// 32 bits in boxes with version 0, and 64 bits in boxes with version >= 1.
#[derive(Clone, Copy, Default)]
pub struct VersionSizedUint(pub u64);

impl FromBytes for VersionSizedUint {
    fn from_bytes<R: ReadBytes>(bytes: &mut R) -> Result<Self> {
        Ok(match bytes.version() {
            1 => VersionSizedUint(u64::from_bytes(bytes)?),
            _ => VersionSizedUint(u32::from_bytes(bytes)? as u64),
        })
    }
    fn min_size() -> usize {
        4
    }
}

impl ToBytes for VersionSizedUint {
    fn to_bytes<W: WriteBytes>(&self, bytes: &mut W) -> Result<()> {
        match bytes.version() {
            1 => self.0.to_bytes(bytes)?,
            _ => (std::cmp::min(self.0, u32::MAX as u64) as u32).to_bytes(bytes)?,
        }
        Ok(())
    }
}

impl Debug for VersionSizedUint {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

/// The optional "usertype" is a uuid, used by `uuid`-type boxes.
#[derive(Clone, Default)]
pub struct Uuid(pub [u8; 16]);

impl FromBytes for Uuid {
    fn from_bytes<R: ReadBytes>(bytes: &mut R) -> Result<Self> {
        let data = bytes.read(16)?;
        let mut u = [0u8; 16];
        u.copy_from_slice(data);
        Ok(Uuid(u))
    }
    fn min_size() -> usize {
        16
    }
}

impl ToBytes for Uuid {
    fn to_bytes<W: WriteBytes>(&self, bytes: &mut W) -> Result<()> {
        bytes.write(&self.0[..])
    }
}

impl Display for Uuid {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let p1 = u32::from_be_bytes((self.0)[0..4].try_into().unwrap());
        let p2 = u16::from_be_bytes((self.0)[4..6].try_into().unwrap());
        let p3 = u16::from_be_bytes((self.0)[6..8].try_into().unwrap());
        let p4 = u16::from_be_bytes((self.0)[8..10].try_into().unwrap());
        let p5 = u16::from_be_bytes((self.0)[10..12].try_into().unwrap());
        let p6 = u32::from_be_bytes((self.0)[12..16].try_into().unwrap());
        write!(f, "{:08x}-{:04x}-{:04x}-{:04x}-{:04x}{:08x}", p1, p2, p3, p4, p5, p6)
    }
}

impl Debug for Uuid {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

/// A blob of bytes with no further interpretation (raw property payloads,
/// `sinf`/DRM passthrough, unknown box bodies read to the end).
#[derive(Clone, Default)]
pub struct Data(pub Vec<u8>);

impl Data {
    pub fn read<R: ReadBytes>(stream: &mut R, count: usize) -> Result<Self> {
        let mut v = Vec::new();
        if count > 0 {
            let data = stream.read(count as u64)?;
            v.extend_from_slice(data);
        }
        Ok(Data(v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromBytes for Data {
    fn from_bytes<R: ReadBytes>(bytes: &mut R) -> Result<Self> {
        let left = bytes.left();
        let data = bytes.read(left)?;
        let mut v = Vec::new();
        v.extend_from_slice(data);
        Ok(Data(v))
    }
    fn min_size() -> usize {
        0
    }
}

impl ToBytes for Data {
    fn to_bytes<W: WriteBytes>(&self, bytes: &mut W) -> Result<()> {
        bytes.write(&self.0[..])
    }
}

impl Debug for Data {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.0.len() <= 16 {
            let mut s = String::from("[");
            let mut first = true;
            for d in &self.0 {
                if !first {
                    s.push(' ');
                }
                first = false;
                let _ = write!(s, "{:02x}", d);
            }
            s.push(']');
            write!(f, "{}", s)
        } else {
            write!(f, "[u8; {}]", self.0.len())
        }
    }
}

/// Seconds since 1904-01-01 00:00:00 UTC, as stored in `mvhd`/`tkhd`/`mdhd`.
///
/// 32 bits in version-0 boxes, 64 bits in version >= 1.
#[derive(Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Time(u64);

// TZ=UTC date +%s -d "1904-01-01 00:00:00"
const OFFSET_TO_UNIX: i64 = 2082844800;

static FAKE_NOW: AtomicI64 = AtomicI64::new(i64::MIN);

impl Time {
    /// The current time, in ISOBMFF epoch seconds.
    ///
    /// Tests can pin this with [`Time::set_fake_now`] so that newly
    /// created `mvhd`/`tkhd`/`mdhd` timestamps are reproducible.
    pub fn now() -> Time {
        let fake = FAKE_NOW.load(Ordering::SeqCst);
        if fake != i64::MIN {
            return Time((fake + OFFSET_TO_UNIX) as u64);
        }
        Time((Utc::now().timestamp() + OFFSET_TO_UNIX) as u64)
    }

    /// Pin [`Time::now`] to a fixed unix timestamp for the duration of a test.
    pub fn set_fake_now(unix_secs: i64) {
        FAKE_NOW.store(unix_secs, Ordering::SeqCst);
    }

    /// Undo [`Time::set_fake_now`].
    pub fn clear_fake_now() {
        FAKE_NOW.store(i64::MIN, Ordering::SeqCst);
    }

    pub fn from_unix_secs(unix_secs: i64) -> Time {
        Time((unix_secs + OFFSET_TO_UNIX) as u64)
    }

    pub fn to_unix_secs(&self) -> i64 {
        self.0 as i64 - OFFSET_TO_UNIX
    }

    fn to_rfc3339(&self) -> String {
        Utc.timestamp(self.to_unix_secs(), 0).to_rfc3339()
    }
}

impl FromBytes for Time {
    fn from_bytes<R: ReadBytes>(bytes: &mut R) -> Result<Self> {
        Ok(match bytes.version() {
            1 => Time(u64::from_bytes(bytes)?),
            _ => Time(u32::from_bytes(bytes)? as u64),
        })
    }
    fn min_size() -> usize {
        4
    }
}

impl ToBytes for Time {
    fn to_bytes<W: WriteBytes>(&self, bytes: &mut W) -> Result<()> {
        match bytes.version() {
            1 => self.0.to_bytes(bytes)?,
            _ => (std::cmp::min(self.0, u32::MAX as u64) as u32).to_bytes(bytes)?,
        }
        Ok(())
    }
}

impl Debug for Time {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self.to_rfc3339())
    }
}

/// FourCC is the 4-byte name of any box, item type, or brand.
#[derive(Clone, Copy, Default, Serialize)]
pub struct FourCC(pub u32);
def_from_to_bytes_newtype!(FourCC, u32);

impl FourCC {
    pub fn new(s: &str) -> FourCC {
        s.as_bytes().into()
    }

    fn fmt_fourcc(&self, dbg: bool) -> String {
        let c = self.to_be_bytes();
        for byte in c.iter() {
            if *byte < 32 || *byte > 126 {
                return format!("0x{:x}", self.0);
            }
        }
        let mut s = String::new();
        if dbg {
            s.push('"');
        }
        for byte in c.iter() {
            s.push(*byte as char);
        }
        if dbg {
            s.push('"');
        }
        s
    }

    #[inline]
    pub fn to_be_bytes(&self) -> [u8; 4] {
        self.0.to_be_bytes()
    }
}

impl std::cmp::PartialEq<&[u8]> for FourCC {
    fn eq(&self, other: &&[u8]) -> bool {
        &(self.to_be_bytes())[..] == *other
    }
}

impl std::cmp::PartialEq<&[u8; 4]> for FourCC {
    fn eq(&self, other: &&[u8; 4]) -> bool {
        &self.to_be_bytes() == *other
    }
}

impl std::cmp::PartialEq<FourCC> for FourCC {
    fn eq(&self, other: &FourCC) -> bool {
        self.0 == other.0
    }
}
impl Eq for FourCC {}

impl Debug for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.fmt_fourcc(true))
    }
}

impl Display for FourCC {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.fmt_fourcc(false))
    }
}

impl From<&[u8]> for FourCC {
    fn from(b: &[u8]) -> FourCC {
        FourCC(u32::from_be_bytes(b.try_into().unwrap()))
    }
}

impl From<[u8; 4]> for FourCC {
    fn from(b: [u8; 4]) -> FourCC {
        FourCC(u32::from_be_bytes(b))
    }
}

/// Language code ('eng', 'dut', 'fra', etc).
///
/// A 16-bit value containing 3 5-bit values interpreted as letters so we
/// get a 3-character country code.
#[derive(Clone, Copy, Serialize)]
pub struct IsoLanguageCode(u16);
def_from_to_bytes_newtype!(IsoLanguageCode, u16);

impl Display for IsoLanguageCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let mut s = String::new();
        s.push((((self.0 >> 10) & 0x1f) + 0x60) as u8 as char);
        s.push((((self.0 >> 5) & 0x1f) + 0x60) as u8 as char);
        s.push((((self.0 >> 0) & 0x1f) + 0x60) as u8 as char);
        write!(f, "{}", s)
    }
}

impl Debug for IsoLanguageCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self)
    }
}

impl Default for IsoLanguageCode {
    fn default() -> IsoLanguageCode {
        // "und"
        IsoLanguageCode(0x55c4)
    }
}

/// Zero-terminated ASCII string (`hdlr` name field and similar).
#[derive(Clone, Default)]
pub struct ZString(pub String);

impl ZString {
    fn as_str(&self) -> &str {
        let len = if self.0.ends_with('\0') { self.0.len() - 1 } else { self.0.len() };
        &(self.0)[..len]
    }
}

impl std::ops::Deref for ZString {
    type Target = str;
    fn deref(&self) -> &str {
        self.as_str()
    }
}

impl FromBytes for ZString {
    fn from_bytes<R: ReadBytes>(bytes: &mut R) -> Result<Self> {
        let left = bytes.left();
        let data = bytes.read(left)?;
        let mut s = String::new();
        for &b in data {
            s.push(b as char);
            if b == 0 {
                break;
            }
        }
        Ok(ZString(s))
    }
    fn min_size() -> usize {
        0
    }
}

impl ToBytes for ZString {
    fn to_bytes<W: WriteBytes>(&self, bytes: &mut W) -> Result<()> {
        let mut v = Vec::new();
        for c in self.0.chars() {
            v.push(if (c as u32) < 256 { c as u8 } else { 0xff });
        }
        if !v.ends_with(&[0]) {
            v.push(0);
        }
        bytes.write(&v)
    }
}

impl Display for ZString {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Debug for ZString {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "\"{}\"", self.as_str())
    }
}

/// Pascal string: one length byte followed by that many bytes (item names
/// in some legacy property boxes).
#[derive(Clone, Debug, Default)]
pub struct PString(String);

impl PString {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl std::ops::Deref for PString {
    type Target = str;
    fn deref(&self) -> &Self::Target {
        self.0.as_str()
    }
}

impl FromBytes for PString {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<PString> {
        let len = u8::from_bytes(stream)? as u64;
        let data = if len > 0 { stream.read(len)? } else { b"" };
        if let Ok(s) = std::str::from_utf8(data) {
            return Ok(PString(s.to_string()));
        }
        let mut s = String::new();
        for d in data {
            s.push(std::cmp::min(*d, 127) as char);
        }
        Ok(PString(s))
    }
    fn min_size() -> usize {
        0
    }
}

impl ToBytes for PString {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let len = std::cmp::min(self.0.len(), 254);
        (len as u8).to_bytes(stream)?;
        stream.write(self.0[..len].as_bytes())
    }
}

/// 2.30 / 16.16 / 8.8 fixed-point values used by `tkhd`/`mvhd` (matrix,
/// width/height, volume).
macro_rules! fixed_float {
    ($(#[$outer:meta])* $name:ident, $type:tt, $frac_bits:expr) => {
        #[derive(Clone, Copy, Default)]
        $(#[$outer])*
        pub struct $name($type);
        def_from_to_bytes_newtype!($name, $type);

        impl $name {
            fn get(&self) -> f64 {
                (self.0 as f64) / ((1u64 << $frac_bits) as f64)
            }

            pub fn set(&mut self, value: f64) {
                let v = (value * ((1u64 << $frac_bits) as f64)).round();
                self.0 = if v > ($type::MAX as f64) {
                    $type::MAX
                } else if v < ($type::MIN as f64) {
                    $type::MIN
                } else {
                    v as $type
                };
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}", self.get())
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}", self.get())
            }
        }

        impl From<f64> for $name {
            fn from(t: f64) -> $name {
                let mut x = $name(0);
                x.set(t);
                x
            }
        }

        impl From<$name> for f64 {
            fn from(t: $name) -> f64 {
                t.get()
            }
        }
    };
}

fixed_float!(
    /// 32 bits 2.30 fixed float.
    FixedFloat2_30,
    u32,
    30
);
fixed_float!(
    /// 32 bits 16.16 fixed float.
    FixedFloat16_16,
    u32,
    16
);
fixed_float!(
    /// 16 bits 8.8 fixed float.
    FixedFloat8_8,
    u16,
    8
);

/// 3x3 transform matrix stored in `tkhd`.
#[derive(Clone)]
pub struct Matrix([(FixedFloat16_16, FixedFloat16_16, FixedFloat2_30); 3]);

impl Default for Matrix {
    /// The identity matrix, per the ISOBMFF default.
    fn default() -> Matrix {
        let mut m = Matrix([
            (FixedFloat16_16(0), FixedFloat16_16(0), FixedFloat2_30(0)),
            (FixedFloat16_16(0), FixedFloat16_16(0), FixedFloat2_30(0)),
            (FixedFloat16_16(0), FixedFloat16_16(0), FixedFloat2_30(0)),
        ]);
        m.0[0].0.set(1.0);
        m.0[1].1.set(1.0);
        m.0[2].2.set(1.0);
        m
    }
}

impl FromBytes for Matrix {
    fn from_bytes<R: ReadBytes>(bytes: &mut R) -> Result<Self> {
        let mut m = [(FixedFloat16_16(0), FixedFloat16_16(0), FixedFloat2_30(0)); 3];
        for row in m.iter_mut() {
            *row = (
                FixedFloat16_16::from_bytes(bytes)?,
                FixedFloat16_16::from_bytes(bytes)?,
                FixedFloat2_30::from_bytes(bytes)?,
            );
        }
        Ok(Matrix(m))
    }
    fn min_size() -> usize {
        36
    }
}

impl ToBytes for Matrix {
    fn to_bytes<W: WriteBytes>(&self, bytes: &mut W) -> Result<()> {
        for row in self.0.iter() {
            row.0.to_bytes(bytes)?;
            row.1.to_bytes(bytes)?;
            row.2.to_bytes(bytes)?;
        }
        Ok(())
    }
}

impl Debug for Matrix {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "Matrix([{}][{}][{}] [{}][{}][{}] [{}][{}][{}])",
            (self.0)[0].0,
            (self.0)[0].1,
            (self.0)[0].2,
            (self.0)[1].0,
            (self.0)[1].1,
            (self.0)[1].2,
            (self.0)[2].0,
            (self.0)[2].1,
            (self.0)[2].2,
        )
    }
}

// Opaque entity ids (§6.2). 0 is the "invalid" sentinel for handles that
// are allocated sequentially starting at 1; sequence/sample ids instead
// use u32::MAX as their sentinel, since valid sample numbering starts at
// 0 and item/group/property/config ids never do.
macro_rules! def_entity_id {
    ($(#[$outer:meta])* $name:ident, $invalid:expr) => {
        $(#[$outer])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub struct $name(pub u32);

        impl $name {
            pub const INVALID: $name = $name($invalid);

            pub fn is_valid(&self) -> bool {
                self.0 != $invalid
            }
        }

        impl Default for $name {
            fn default() -> $name {
                $name::INVALID
            }
        }

        impl Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl From<u32> for $name {
            fn from(v: u32) -> $name {
                $name(v)
            }
        }

        impl From<$name> for u32 {
            fn from(v: $name) -> u32 {
                v.0
            }
        }
    };
}

def_entity_id!(
    /// Identifies an item in the `meta` box's item graph (`iinf`/`iloc`/`iref`/`ipma`).
    ItemId,
    0
);
def_entity_id!(
    /// Identifies a decoder configuration record shared by one or more items/tracks.
    DecoderConfigId,
    0
);
def_entity_id!(
    /// Identifies an entity group (`grpl`/`altr`/`eqiv`).
    GroupId,
    0
);
def_entity_id!(
    /// Identifies a track (`trak`), called "sequence" in the image-sequence sense.
    SequenceId,
    0
);
def_entity_id!(
    /// Identifies a sample within a track.
    SampleId,
    0xffff_ffff
);

/// Index into an item's associated property list (1-based, as stored in `ipma`).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize)]
pub struct PropertyIndex(pub u16);

impl PropertyIndex {
    pub const INVALID: PropertyIndex = PropertyIndex(0);

    pub fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl Default for PropertyIndex {
    fn default() -> PropertyIndex {
        PropertyIndex::INVALID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fourcc_roundtrip() {
        let fourcc = FourCC::new("meta");
        assert_eq!(format!("{}", fourcc), "meta");
        assert_eq!(fourcc, b"meta");
    }

    #[test]
    fn iso_language_code_und() {
        let code = IsoLanguageCode::default();
        assert_eq!(format!("{}", code), "und");
    }

    #[test]
    fn time_fake_clock_is_deterministic() {
        Time::set_fake_now(1_600_000_000);
        let t1 = Time::now();
        let t2 = Time::now();
        Time::clear_fake_now();
        assert_eq!(t1.to_unix_secs(), t2.to_unix_secs());
        assert_eq!(t1.to_unix_secs(), 1_600_000_000);
    }

    #[test]
    fn fixed_float_roundtrip() {
        let f: FixedFloat16_16 = 1.5.into();
        let back: f64 = f.into();
        assert!((back - 1.5).abs() < 1e-6);
    }

    #[test]
    fn entity_id_sentinel() {
        assert!(!ItemId::INVALID.is_valid());
        assert!(ItemId(1).is_valid());
        assert!(!SampleId::INVALID.is_valid());
        assert!(SampleId(0).is_valid());
    }

    #[test]
    fn matrix_default_is_identity() {
        let m = Matrix::default();
        assert_eq!(format!("{:?}", m), "Matrix([1][0][0] [0][1][0] [0][0][1])");
    }
}
