//! JSON introspection (`File::dump_json`), a debugging convenience for
//! inspecting a loaded file's object model without a dedicated viewer.
//!
//! These are debugging views, not the core round-trip contract: plain
//! `serde`-derived structs kept separate from the object model types in
//! [`crate::model`] rather than deriving `Serialize` on them directly.
use serde::Serialize;

use crate::error::Result;
use crate::model::{CodedImage, DerivedImage, File, ItemKind, MetaItem};

#[derive(Debug, Default, Serialize)]
pub struct FileDump {
    pub primary_item: Option<u32>,
    pub items: Vec<ItemDump>,
    pub tracks: Vec<TrackDump>,
    pub groups: Vec<GroupDump>,
}

#[derive(Debug, Serialize)]
pub struct ItemDump {
    pub id: u32,
    pub fourcc: String,
    pub hidden: bool,
    pub name: String,
    pub kind: ItemKindDump,
    pub property_count: usize,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type")]
pub enum ItemKindDump {
    CodedImage { width: u32, height: u32, has_decoder_config: bool },
    Grid { columns: u32, rows: u32, output_width: u32, output_height: u32 },
    Overlay { source_count: usize },
    Meta { byte_len: usize },
}

#[derive(Debug, Serialize)]
pub struct TrackDump {
    pub id: u32,
    pub handler: String,
    pub timescale: u32,
    pub sample_count: usize,
}

#[derive(Debug, Serialize)]
pub struct GroupDump {
    pub id: u32,
    pub grouping_type: String,
    pub member_count: usize,
}

impl File {
    /// Serializes a debugging snapshot of the current object model to a
    /// pretty-printed JSON string.
    pub fn dump_json(&self) -> Result<String> {
        let dump = self.dump();
        serde_json::to_string_pretty(&dump)
            .map_err(|e| crate::error::HeifError::MediaParsingError(format!("json serialization failed: {e}")))
    }

    fn dump(&self) -> FileDump {
        let mut out = FileDump {
            primary_item: self.primary_item().map(|id| id.0),
            ..FileDump::default()
        };
        for item in self.items() {
            let kind = match &item.kind {
                ItemKind::CodedImage(coded) => {
                    let (width, height) = item.image.as_ref().map(|f| (f.width, f.height)).unwrap_or((0, 0));
                    ItemKindDump::CodedImage {
                        width,
                        height,
                        has_decoder_config: coded.decoder_config().is_some(),
                    }
                }
                ItemKind::DerivedImage(DerivedImage::Grid { columns, rows, output_width, output_height, .. }) => {
                    ItemKindDump::Grid {
                        columns: *columns,
                        rows: *rows,
                        output_width: *output_width,
                        output_height: *output_height,
                    }
                }
                ItemKind::DerivedImage(DerivedImage::Overlay { sources, .. }) => {
                    ItemKindDump::Overlay { source_count: sources.len() }
                }
                ItemKind::DerivedImage(DerivedImage::Identity { .. }) => {
                    ItemKindDump::Overlay { source_count: 1 }
                }
                ItemKind::MetaItem(MetaItem::Exif { data }) => ItemKindDump::Meta { byte_len: data.len() },
                ItemKind::MetaItem(MetaItem::Mime { data, .. }) => ItemKindDump::Meta { byte_len: data.len() },
            };
            out.items.push(ItemDump {
                id: item.id.0,
                fourcc: item.kind.fourcc().to_string(),
                hidden: item.hidden,
                name: item.name.clone(),
                kind,
                property_count: item.associated_properties.len(),
            });
        }
        for (idx, track) in self.tracks().enumerate() {
            out.tracks.push(TrackDump {
                id: (idx + 1) as u32,
                handler: format!("{:?}", track.handler).to_lowercase(),
                timescale: track.timescale,
                sample_count: track.samples.len(),
            });
        }
        for (idx, group) in self.groups().enumerate() {
            out.groups.push(GroupDump {
                id: (idx + 1) as u32,
                grouping_type: group.grouping_type.to_string(),
                member_count: group.members.len(),
            });
        }
        out
    }
}
