use anyhow::Result;
use data_model::{
    config::LoaderConfig,
    registry,
    types::{AnnotatedObject, BoundingBox, Image, Label},
    DataModelError, DefaultLoader, FieldSpec, FieldType, FieldValue, Record, RecordSchema,
};
use image::DynamicImage;
use itertools::Itertools;
use once_cell::sync::Lazy;

/// A titled collection of page images.
static ALBUM: Lazy<&'static RecordSchema> = Lazy::new(|| {
    let raw = RecordSchema::raw("test.album", "Album")
        .counterpart("test.album.TensorAlbum")
        .field(FieldSpec::new("title", FieldType::Str))
        .field(FieldSpec::new("pages", FieldType::ListRecord("generic.image.Image")))
        .build_static()
        .unwrap();
    let tensor = RecordSchema::tensor("test.album", "TensorAlbum")
        .counterpart("test.album.Album")
        .field(FieldSpec::new("title", FieldType::Str))
        .field(FieldSpec::new(
            "pages",
            FieldType::ListRecord("generic.image.TensorImage"),
        ))
        .build_static()
        .unwrap();
    registry::register_pair(raw, tensor).unwrap();
    raw
});

fn album(title: &str, pages: Vec<Record>) -> Result<Record> {
    Record::new(
        *ALBUM,
        [
            ("title", FieldValue::from(title)),
            ("pages", FieldValue::from(pages)),
        ],
    )
}

fn page(width: u32, height: u32) -> Result<Record> {
    Image::from_content(DynamicImage::new_rgb8(width, height))
}

fn kind(err: &anyhow::Error) -> Option<&DataModelError> {
    DataModelError::find(err)
}

#[test]
fn record_lists_batch_by_position() -> Result<()> {
    let albums = [
        album("first", vec![page(1, 5)?, page(2, 6)?])?,
        album("second", vec![page(3, 7)?, page(4, 8)?])?,
    ];
    let batched = Record::batched(&albums)?;
    assert_eq!(batched.batch_size()?, 2);

    let pages = batched.get_record("pages")?;
    assert_eq!(pages.batch_depth(), 2);
    assert_eq!(pages.batch_size()?, 2);
    assert_eq!(
        pages.get("width")?,
        &FieldValue::from(vec![vec![1i64, 3], vec![2, 4]])
    );
    assert_eq!(
        pages.get("height")?,
        &FieldValue::from(vec![vec![5i64, 7], vec![6, 8]])
    );
    assert!(pages.get("file_path")?.is_none());
    Ok(())
}

#[test]
fn record_lists_of_different_lengths_fail() -> Result<()> {
    let albums = [
        album("long", vec![page(1, 1)?, page(2, 2)?])?,
        album("short", vec![page(3, 3)?])?,
    ];
    let err = Record::batched(&albums).unwrap_err();
    assert!(matches!(kind(&err), Some(DataModelError::Validation { .. })));
    assert!(format!("{:#}", err).contains("same length"));
    Ok(())
}

#[test]
fn record_lists_are_not_repeated() -> Result<()> {
    let albums = [
        album("first", vec![page(1, 1)?])?,
        album("second", vec![page(2, 2)?])?,
    ];
    let mut batched = Record::batched(&albums)?;

    let err = batched.repeat(&[1, 2], &[]).unwrap_err();
    assert!(matches!(kind(&err), Some(DataModelError::Unsupported { .. })));
    assert!(!batched.is_repeated());

    batched.repeat(&[1, 2], &["pages"])?;
    assert_eq!(
        batched.get("title")?,
        &FieldValue::from(vec!["first", "second", "second"])
    );
    Ok(())
}

#[test]
fn record_lists_are_not_converted_to_tensors() -> Result<()> {
    let album = album("first", vec![page(1, 1)?])?;
    let err = album.to_tensor().unwrap_err();
    assert!(matches!(kind(&err), Some(DataModelError::Unsupported { .. })));
    Ok(())
}

#[test]
fn load_cascades_into_record_lists() -> Result<()> {
    let dir = tempfile::tempdir()?;
    DynamicImage::new_rgb8(3, 2).save(dir.path().join("cover.png"))?;
    DynamicImage::new_rgb8(5, 4).save(dir.path().join("back.png"))?;
    let loader = DefaultLoader::new(LoaderConfig {
        data_dir: Some(dir.path().to_owned()),
        allow_remote: false,
        ..Default::default()
    });

    let mut album = album(
        "scans",
        vec![
            Image::from_file_path("cover.png")?,
            Image::from_file_path("back.png")?,
        ],
    )?;
    album.load_with(&loader)?;
    assert!(album.is_loaded());

    let sizes = pages(&album)?
        .iter()
        .map(|page| -> Result<_> { Ok((page.get_int("width")?, page.get_int("height")?)) })
        .try_collect::<_, Vec<_>, _>()?;
    assert_eq!(sizes, vec![(3, 2), (5, 4)]);

    album.unload()?;
    assert!(!album.is_loaded());
    for page in pages(&album)? {
        assert!(!page.is_loaded());
        assert!(page.get("content")?.is_none());
    }
    Ok(())
}

fn pages(album: &Record) -> Result<Vec<&Record>> {
    let pages = album.get("pages")?.as_list().unwrap_or_default();
    Ok(pages.iter().filter_map(|page| page.as_record()).collect())
}

#[test]
fn stack_skip_keeps_equal_shapes_in_lists() -> Result<()> {
    let objects = [1, 2]
        .iter()
        .map(|&value| -> Result<_> {
            AnnotatedObject::new(
                Label::new(value, format!("class-{}", value))?,
                BoundingBox::new([0.0, 0.0, 2.0, 2.0], "xyxy")?,
                Some(vec![vec![0.0, 0.0, 1.0, 0.0, 1.0, 1.0]]),
                false,
            )?
            .to_tensor()
        })
        .try_collect::<_, Vec<_>, _>()?;

    let batched = Record::batched(&objects)?;
    let segmentation = batched.get("segmentation")?.as_list().unwrap();
    assert_eq!(segmentation.len(), 2);
    assert!(segmentation
        .iter()
        .all(|item| item.as_tensor().map(|tensor| tensor.size()) == Some(vec![1, 6])));

    // plain tensor fields of the same shape are stacked
    assert_eq!(batched.get_tensor("iscrowd")?.size(), vec![2]);
    Ok(())
}
