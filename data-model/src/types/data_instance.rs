//! Samples fed to models: document pages and plain images.

use super::{ground_truth::GroundTruth, insert_all};
use crate::{
    common::*,
    field::{FieldSpec, FieldType, TensorSpec},
    record::Record,
    registry::Registry,
    schema::RecordSchema,
    value::FieldValue,
};
use uuid::Uuid;

pub const DOCUMENT_MODULE: &str = "data_instance.document";
pub const IMAGE_MODULE: &str = "data_instance.image";

fn new_sample_id() -> Result<FieldValue> {
    Ok(Uuid::new_v4().to_string().into())
}

fn first_page() -> Result<FieldValue> {
    Ok(0i64.into())
}

fn single_page() -> Result<FieldValue> {
    Ok(1i64.into())
}

fn empty_ground_truth() -> Result<FieldValue> {
    Ok(GroundTruth::empty()?.into())
}

static DOCUMENT_INSTANCE: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::raw(DOCUMENT_MODULE, "DocumentInstance")
        .counterpart("data_instance.document.TensorDocumentInstance")
        .field(FieldSpec::new("index", FieldType::Int).optional())
        .field(FieldSpec::new("sample_id", FieldType::Str).default_with(new_sample_id))
        .field(FieldSpec::new("page_id", FieldType::Int).default_with(first_page))
        .field(FieldSpec::new("total_num_pages", FieldType::Int).default_with(single_page))
        .field(FieldSpec::new("image", FieldType::Record("generic.image.Image")).optional())
        .field(FieldSpec::new("ocr", FieldType::Record("generic.ocr.Ocr")).optional())
        .field(
            FieldSpec::new("gt", FieldType::Record("generic.ground_truth.GroundTruth"))
                .default_with(empty_ground_truth),
        )
        .validator(check_document_source)
        .build()
        .expect("the built-in DocumentInstance schema is well-formed")
});

static TENSOR_DOCUMENT_INSTANCE: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::tensor(DOCUMENT_MODULE, "TensorDocumentInstance")
        .counterpart("data_instance.document.DocumentInstance")
        .field(FieldSpec::new("index", FieldType::Tensor(TensorSpec::int(0))).optional())
        .field(FieldSpec::new("sample_id", FieldType::Str))
        .field(FieldSpec::new("page_id", FieldType::Tensor(TensorSpec::int(0))))
        .field(FieldSpec::new(
            "total_num_pages",
            FieldType::Tensor(TensorSpec::int(0)),
        ))
        .field(
            FieldSpec::new("image", FieldType::Record("generic.image.TensorImage")).optional(),
        )
        .field(FieldSpec::new("ocr", FieldType::Record("generic.ocr.TensorOcr")).optional())
        .field(FieldSpec::new(
            "gt",
            FieldType::Record("generic.ground_truth.TensorGroundTruth"),
        ))
        .build()
        .expect("the built-in TensorDocumentInstance schema is well-formed")
});

static IMAGE_INSTANCE: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::raw(IMAGE_MODULE, "ImageInstance")
        .counterpart("data_instance.image.TensorImageInstance")
        .field(FieldSpec::new("index", FieldType::Int).optional())
        .field(FieldSpec::new("sample_id", FieldType::Str).default_with(new_sample_id))
        .field(FieldSpec::new("image", FieldType::Record("generic.image.Image")))
        .field(
            FieldSpec::new("gt", FieldType::Record("generic.ground_truth.GroundTruth"))
                .default_with(empty_ground_truth),
        )
        .build()
        .expect("the built-in ImageInstance schema is well-formed")
});

static TENSOR_IMAGE_INSTANCE: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::tensor(IMAGE_MODULE, "TensorImageInstance")
        .counterpart("data_instance.image.ImageInstance")
        .field(FieldSpec::new("index", FieldType::Tensor(TensorSpec::int(0))).optional())
        .field(FieldSpec::new("sample_id", FieldType::Str))
        .field(FieldSpec::new(
            "image",
            FieldType::Record("generic.image.TensorImage"),
        ))
        .field(FieldSpec::new(
            "gt",
            FieldType::Record("generic.ground_truth.TensorGroundTruth"),
        ))
        .build()
        .expect("the built-in TensorImageInstance schema is well-formed")
});

pub(super) fn register(registry: &mut Registry) {
    insert_all(
        registry,
        &[
            &DOCUMENT_INSTANCE,
            &TENSOR_DOCUMENT_INSTANCE,
            &IMAGE_INSTANCE,
            &TENSOR_IMAGE_INSTANCE,
        ],
    );
}

/// One page of a document, with its rendered image and/or OCR output.
pub struct DocumentInstance;

impl DocumentInstance {
    pub fn schema() -> &'static RecordSchema {
        &DOCUMENT_INSTANCE
    }

    pub fn tensor_schema() -> &'static RecordSchema {
        &TENSOR_DOCUMENT_INSTANCE
    }

    pub fn new(image: Option<Record>, ocr: Option<Record>, gt: Option<Record>) -> Result<Record> {
        Record::new(
            Self::schema(),
            [
                ("image", FieldValue::from(image)),
                ("ocr", ocr.into()),
                ("gt", gt.into()),
            ],
        )
    }

    /// The sample id with dots replaced, usable as a storage key.
    pub fn key(record: &Record) -> Result<String> {
        sample_key(record)
    }
}

pub struct ImageInstance;

impl ImageInstance {
    pub fn schema() -> &'static RecordSchema {
        &IMAGE_INSTANCE
    }

    pub fn tensor_schema() -> &'static RecordSchema {
        &TENSOR_IMAGE_INSTANCE
    }

    pub fn new(image: Record, gt: Option<Record>) -> Result<Record> {
        Record::new(
            Self::schema(),
            [("image", FieldValue::from(image)), ("gt", gt.into())],
        )
    }

    pub fn key(record: &Record) -> Result<String> {
        sample_key(record)
    }
}

fn sample_key(record: &Record) -> Result<String> {
    ensure!(
        !record.is_batched(),
        DataModelError::illegal_state(format!(
            "a batched '{}' has no single key",
            record.name()
        ))
    );
    Ok(record.get_str("sample_id")?.replace('.', "_"))
}

fn check_document_source(record: &Record) -> Result<()> {
    if record.is_batched() {
        return Ok(());
    }
    ensure!(
        !record.get("image")?.is_none() || !record.get("ocr")?.is_none(),
        DataModelError::validation("image", "a document needs an image or an OCR output")
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        bounding_box::BoundingBoxList,
        ground_truth::OcrGT,
        image::Image,
        ocr::{Ocr, OcrType},
    };

    fn solid_image(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            width,
            height,
            image::Rgb([10, 20, 30]),
        ))
    }

    #[test]
    fn documents_need_a_source() {
        assert!(DocumentInstance::new(None, None, None).is_err());

        let ocr = Ocr::from_content("hello", OcrType::Tesseract).unwrap();
        let document = DocumentInstance::new(None, Some(ocr), None).unwrap();
        assert_eq!(document.get_int("page_id").unwrap(), 0);
        assert_eq!(document.get_int("total_num_pages").unwrap(), 1);
        assert!(document.get_record("gt").unwrap().get("ocr").unwrap().is_none());
    }

    #[test]
    fn sample_ids_are_unique_keys() {
        let first = ImageInstance::new(Image::from_content(solid_image(2, 2)).unwrap(), None).unwrap();
        let second = ImageInstance::new(Image::from_content(solid_image(2, 2)).unwrap(), None).unwrap();
        assert_ne!(
            first.get_str("sample_id").unwrap(),
            second.get_str("sample_id").unwrap()
        );

        let named = Record::new(
            ImageInstance::schema(),
            [
                ("sample_id", FieldValue::from("scan.0001.png")),
                ("image", Image::from_content(solid_image(2, 2)).unwrap().into()),
            ],
        )
        .unwrap();
        assert_eq!(ImageInstance::key(&named).unwrap(), "scan_0001_png");
    }

    #[test]
    fn batch_documents() {
        let documents = (0..3)
            .map(|index| {
                let gt = Record::new(
                    GroundTruth::schema(),
                    [(
                        "ocr",
                        OcrGT::new(
                            vec!["word".into()],
                            BoundingBoxList::new(vec![[0.0, 0.0, 1.0, 1.0]], "xyxy").unwrap(),
                        )
                        .unwrap(),
                    )],
                )
                .unwrap();
                let document = Record::new(
                    DocumentInstance::schema(),
                    [
                        ("index", FieldValue::from(index as i64)),
                        ("image", Image::from_content(solid_image(4, 3)).unwrap().into()),
                        ("gt", gt.into()),
                    ],
                )
                .unwrap();
                document.to_tensor().unwrap()
            })
            .collect_vec();

        let batched = Record::batched(&documents).unwrap();
        assert_eq!(batched.batch_size().unwrap(), 3);
        assert_eq!(batched.get_tensor("index").unwrap().size(), vec![3]);
        let image = batched.get_record("image").unwrap();
        assert_eq!(image.get_tensor("content").unwrap().size(), vec![3, 3, 3, 4]);
        assert!(DocumentInstance::key(&batched).is_err());
    }
}
