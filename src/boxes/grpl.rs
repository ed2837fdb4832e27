//! Entity-to-group boxes (`grpl` container plus `altr`/`eqiv` and any
//! other four-character grouping type) -- §4.5's `EntityGroup`/
//! `AlternativeTrackGroup` co-assignment behavior.
use crate::error::Result;
use crate::heifbox::{BoxInfo, BoxReader, BoxWriter};
use crate::serialize::{FromBytes, ReadBytes, ToBytes, WriteBytes};
use crate::types::FourCC;

/// One `eqiv` member's time alignment: `(time_offset, timescale_multiplier)`
/// in 8.8 fixed point, per §3's `EntityGroup` description.
#[derive(Clone, Copy, Debug, Default)]
pub struct EquivalenceTiming {
    pub time_offset: i16,
    pub timescale_multiplier_8_8: u16,
}

/// An entity-to-group box: `altr`, `eqiv`, or any other grouping type
/// this crate doesn't specifically interpret beyond its member list.
#[derive(Clone, Debug)]
pub struct EntityToGroupBox {
    pub grouping_type: FourCC,
    pub group_id: u32,
    pub entity_ids: Vec<u32>,
    /// Present only for `eqiv` groups, one entry per `entity_ids` member.
    pub equivalence_timing: Vec<EquivalenceTiming>,
}

impl EntityToGroupBox {
    pub fn is_alternative(&self) -> bool {
        self.grouping_type == FourCC::new("altr")
    }

    pub fn is_equivalence(&self) -> bool {
        self.grouping_type == FourCC::new("eqiv")
    }
}

impl BoxInfo for EntityToGroupBox {
    fn fourcc(&self) -> FourCC {
        self.grouping_type
    }
}

impl FromBytes for EntityToGroupBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new_full(stream)?;
        let grouping_type = r.fourcc;
        let group_id = u32::from_bytes(&mut r)?;
        let num_entities = u32::from_bytes(&mut r)?;
        let mut entity_ids = Vec::with_capacity(num_entities as usize);
        for _ in 0..num_entities {
            entity_ids.push(u32::from_bytes(&mut r)?);
        }
        let is_eqiv = grouping_type == FourCC::new("eqiv");
        let mut equivalence_timing = Vec::new();
        if is_eqiv {
            for _ in 0..num_entities {
                let time_offset = i16::from_bytes(&mut r)?;
                let timescale_multiplier_8_8 = u16::from_bytes(&mut r)?;
                equivalence_timing.push(EquivalenceTiming {
                    time_offset,
                    timescale_multiplier_8_8,
                });
            }
        }
        Ok(EntityToGroupBox {
            grouping_type,
            group_id,
            entity_ids,
            equivalence_timing,
        })
    }
    fn min_size() -> usize {
        8
    }
}

impl ToBytes for EntityToGroupBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new_full(stream, self.grouping_type, 0, 0)?;
        self.group_id.to_bytes(&mut w)?;
        (self.entity_ids.len() as u32).to_bytes(&mut w)?;
        for id in &self.entity_ids {
            id.to_bytes(&mut w)?;
        }
        if self.is_equivalence() {
            for t in &self.equivalence_timing {
                t.time_offset.to_bytes(&mut w)?;
                t.timescale_multiplier_8_8.to_bytes(&mut w)?;
            }
        }
        Ok(())
    }
}

/// Group list box (`grpl`): an unsized list of `EntityToGroupBox`
/// children, one per entity group in the file.
#[derive(Clone, Debug, Default)]
pub struct GroupListBox {
    pub groups: Vec<EntityToGroupBox>,
}

impl BoxInfo for GroupListBox {
    fn fourcc(&self) -> FourCC {
        FourCC::new("grpl")
    }
}

impl FromBytes for GroupListBox {
    fn from_bytes<R: ReadBytes>(stream: &mut R) -> Result<Self> {
        let mut r = BoxReader::new(stream)?;
        let mut groups = Vec::new();
        while r.left() >= 8 {
            groups.push(EntityToGroupBox::from_bytes(&mut r)?);
        }
        Ok(GroupListBox { groups })
    }
    fn min_size() -> usize {
        0
    }
}

impl ToBytes for GroupListBox {
    fn to_bytes<W: WriteBytes>(&self, stream: &mut W) -> Result<()> {
        let mut w = BoxWriter::new(stream, self.fourcc())?;
        for g in &self.groups {
            g.to_bytes(&mut w)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn altr_roundtrip() {
        let altr = EntityToGroupBox {
            grouping_type: FourCC::new("altr"),
            group_id: 1,
            entity_ids: vec![2, 3],
            equivalence_timing: Vec::new(),
        };
        let mut buf = Vec::new();
        altr.to_bytes(&mut buf).unwrap();
        let mut slice: &[u8] = &buf;
        let back = EntityToGroupBox::from_bytes(&mut slice).unwrap();
        assert!(back.is_alternative());
        assert_eq!(back.entity_ids, vec![2, 3]);
    }

    #[test]
    fn eqiv_roundtrip_with_timing() {
        let eqiv = EntityToGroupBox {
            grouping_type: FourCC::new("eqiv"),
            group_id: 5,
            entity_ids: vec![10],
            equivalence_timing: vec![EquivalenceTiming {
                time_offset: -3,
                timescale_multiplier_8_8: 0x0100,
            }],
        };
        let mut buf = Vec::new();
        eqiv.to_bytes(&mut buf).unwrap();
        let mut slice: &[u8] = &buf;
        let back = EntityToGroupBox::from_bytes(&mut slice).unwrap();
        assert!(back.is_equivalence());
        assert_eq!(back.equivalence_timing[0].time_offset, -3);
    }

    #[test]
    fn grpl_holds_multiple_group_kinds() {
        let grpl = GroupListBox {
            groups: vec![
                EntityToGroupBox {
                    grouping_type: FourCC::new("altr"),
                    group_id: 1,
                    entity_ids: vec![2, 3],
                    equivalence_timing: Vec::new(),
                },
                EntityToGroupBox {
                    grouping_type: FourCC::new("eqiv"),
                    group_id: 2,
                    entity_ids: vec![4],
                    equivalence_timing: vec![EquivalenceTiming::default()],
                },
            ],
        };
        let mut buf = Vec::new();
        grpl.to_bytes(&mut buf).unwrap();
        let mut slice: &[u8] = &buf;
        let back = GroupListBox::from_bytes(&mut slice).unwrap();
        assert_eq!(back.groups.len(), 2);
    }
}
