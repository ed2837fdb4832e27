//! End-to-end `File` round-trip scenarios -- §8 "Concrete end-to-end
//! scenarios".
use heif::boxes::{ImageSpatialExtentsProperty, Property};
use heif::error::HeifError;
use heif::model::{CodedImage, DecoderConfig, DerivedImage, File, ItemKind};
use heif::readwrite::PreloadMode;
use heif::types::FourCC;

fn fake_hevc_sps() -> Vec<u8> {
    // One start code plus a minimal HEVC SPS NAL header (type 33); the
    // parser tolerates a body too short to decode and falls back to
    // default profile/level rather than erroring.
    vec![0x00, 0x00, 0x00, 0x01, 0x42, 0x01, 0x00, 0x00, 0x00]
}

fn add_hevc_item(file: &mut File, data: Vec<u8>) -> heif::types::ItemId {
    let config_id = file.add_decoder_config(DecoderConfig::new(FourCC::new("hvc1"), fake_hevc_sps()));
    let mut annex_b = vec![0x00, 0x00, 0x00, 0x01];
    annex_b.extend_from_slice(&data);
    let id = file.add_item(ItemKind::CodedImage(CodedImage::Hevc { data: annex_b, decoder_config: Some(config_id) }));
    let ispe = file.add_property(Property::ImageSpatialExtents(ImageSpatialExtentsProperty { width: 0, height: 0 }));
    file.associate_property(id, ispe, true).unwrap();
    id
}

#[test]
fn jpeg_item_without_decoder_config_round_trips_with_exif() {
    let mut file = File::new();
    file.initialize(FourCC::new("heic"), 0, vec![FourCC::new("mif1")]).unwrap();

    let image = file.add_item(ItemKind::CodedImage(CodedImage::Jpeg { data: vec![0xff, 0xd8, 0xff, 0xd9], decoder_config: None }));
    file.set_primary_item(image).unwrap();

    let exif = file.add_item(ItemKind::MetaItem(heif::model::MetaItem::Exif { data: vec![1, 2, 3, 4] }));
    file.item_mut(image).unwrap().image.as_mut().unwrap().metadata_items.push(exif);

    let bytes = file.save_to_vec().unwrap();
    let loaded = File::load_bytes(bytes, PreloadMode::LoadAllData).unwrap();

    assert_eq!(loaded.primary_item(), Some(image));
    let reloaded_image = loaded.item(image).unwrap();
    assert_eq!(reloaded_image.kind.fourcc(), FourCC::new("jpeg"));
    match &reloaded_image.kind {
        ItemKind::CodedImage(CodedImage::Jpeg { data, decoder_config }) => {
            assert_eq!(data, &[0xff, 0xd8, 0xff, 0xd9]);
            assert!(decoder_config.is_none());
        }
        other => panic!("expected a jpeg coded image, got {other:?}"),
    }
    assert_eq!(reloaded_image.image.as_ref().unwrap().metadata_items, vec![exif]);
    match &loaded.item(exif).unwrap().kind {
        ItemKind::MetaItem(heif::model::MetaItem::Exif { data }) => assert_eq!(data, &[1, 2, 3, 4]),
        other => panic!("expected an Exif meta item, got {other:?}"),
    }
}

/// S2 -- thumbnail chain: a `thmb` reference from a small item to a
/// larger one survives a save/load round trip on both sides.
#[test]
fn thumbnail_reference_round_trips_both_ways() {
    let mut file = File::new();
    file.initialize(FourCC::new("heic"), 0, vec![FourCC::new("mif1")]).unwrap();

    let master = add_hevc_item(&mut file, vec![0xaa; 16]);
    let thumb = add_hevc_item(&mut file, vec![0xbb; 4]);
    file.item_mut(master).unwrap().image.as_mut().unwrap().width = 4096;
    file.item_mut(master).unwrap().image.as_mut().unwrap().height = 3072;
    file.item_mut(thumb).unwrap().image.as_mut().unwrap().width = 256;
    file.item_mut(thumb).unwrap().image.as_mut().unwrap().height = 192;
    file.item_mut(thumb).unwrap().image.as_mut().unwrap().thumbnails.push(master);
    file.set_primary_item(master).unwrap();

    let bytes = file.save_to_vec().unwrap();
    let loaded = File::load_bytes(bytes, PreloadMode::LoadAllData).unwrap();

    let reloaded_thumb = loaded.item(thumb).unwrap();
    assert_eq!(reloaded_thumb.image.as_ref().unwrap().thumbnails, vec![master]);
}

/// S3 -- 2x2 grid: construct a grid derived image over four source
/// items, save, re-load, and verify the grid geometry plus that
/// removing a source leaves a dangling cell that fails
/// `check_save_invariants`.
#[test]
fn grid_round_trips_and_rejects_dangling_cell_on_save() {
    let mut file = File::new();
    file.initialize(FourCC::new("heic"), 0, vec![FourCC::new("mif1")]).unwrap();

    let sources: Vec<_> = (0..4).map(|_| add_hevc_item(&mut file, vec![0xcc; 8])).collect();
    for &src in &sources {
        let img = file.item_mut(src).unwrap().image.as_mut().unwrap();
        img.width = 512;
        img.height = 512;
    }

    let mut grid = DerivedImage::new_grid(2, 2, 1024, 1024);
    for (i, &src) in sources.iter().enumerate() {
        grid.set_grid_image((i as u32) % 2, (i as u32) / 2, src).unwrap();
    }
    let grid_id = file.add_item(ItemKind::DerivedImage(grid));
    file.set_primary_item(grid_id).unwrap();

    let bytes = file.save_to_vec().unwrap();
    let loaded = File::load_bytes(bytes, PreloadMode::LoadAllData).unwrap();

    match &loaded.item(grid_id).unwrap().kind {
        ItemKind::DerivedImage(DerivedImage::Grid { columns, rows, output_width, output_height, sources: loaded_sources }) => {
            assert_eq!((*columns, *rows), (2, 2));
            assert_eq!((*output_width, *output_height), (1024, 1024));
            assert_eq!(loaded_sources.iter().filter(|s| s.is_some()).count(), 4);
        }
        other => panic!("expected a grid derived image, got {other:?}"),
    }

    file.item_mut(grid_id).unwrap().sever_reference_to(sources[0]);
    let err = file.save_to_vec().unwrap_err();
    assert!(matches!(err, HeifError::InvalidReferenceCount));
}
