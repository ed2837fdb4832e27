//! `EntityGroup` and `AlternativeTrackGroup` (§3).
use crate::error::{HeifError, Result};
use crate::types::{FourCC, ItemId, SequenceId};

/// A heterogeneous member of an `EntityGroup`: either an item or a
/// track (`grpl` entity references may point at either kind, §6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityRef {
    Item(ItemId),
    Track(SequenceId),
}

/// `grpl`/`altr`/`eqiv` grouping (§3). `eqiv` additionally maps each
/// member to `(time_offset, timescale_multiplier)`; other grouping
/// types (including arbitrary, non-`altr`/`eqiv` four-char codes) carry
/// membership only.
#[derive(Debug, Clone)]
pub struct EntityGroup {
    pub grouping_type: FourCC,
    pub members: Vec<EntityRef>,
    pub equivalence_timing: Vec<Option<(i16, u16)>>,
}

impl EntityGroup {
    pub fn new(grouping_type: FourCC) -> EntityGroup {
        EntityGroup {
            grouping_type,
            members: Vec::new(),
            equivalence_timing: Vec::new(),
        }
    }

    fn is_eqiv(&self) -> bool {
        self.grouping_type == FourCC::new("eqiv")
    }

    pub fn add_member(&mut self, member: EntityRef) {
        if !self.members.contains(&member) {
            self.members.push(member);
            if self.is_eqiv() {
                self.equivalence_timing.push(None);
            }
        }
    }

    /// `EquivalenceGroup::add_sample` (§4.5): a no-op (not an overwrite)
    /// if the sample is already present.
    pub fn add_equivalence_sample(&mut self, item: ItemId, offset: i16, multiplier_8_8: u16) -> Result<()> {
        if !self.is_eqiv() {
            return Err(HeifError::InvalidFunctionParameter("add_equivalence_sample on a non-eqiv group".into()));
        }
        let member = EntityRef::Item(item);
        if self.members.contains(&member) {
            return Ok(());
        }
        self.members.push(member);
        self.equivalence_timing.push(Some((offset, multiplier_8_8)));
        Ok(())
    }
}

/// Membership-only set of tracks sharing an `alternate_group` id (§3):
/// disjoint from other alt groups by construction, since
/// `File::link_thumbnail_track` is the only way to populate one and it
/// always looks for an existing group containing the master first.
#[derive(Debug, Clone, Default)]
pub struct AlternativeTrackGroup {
    pub members: Vec<SequenceId>,
}
