//! OCR engine output referenced by file path or URL.

use super::insert_all;
use crate::{
    common::*,
    field::{BatchPolicy, ColumnType, FieldSpec, FieldType, RowCodec},
    load::{ContentLoader, ResourceHooks},
    record::Record,
    registry::Registry,
    schema::RecordSchema,
    value::FieldValue,
};
use strum::{Display, EnumString, EnumVariantNames, VariantNames};

pub const MODULE: &str = "generic.ocr";

/// The engine that produced the OCR output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumVariantNames)]
#[strum(serialize_all = "snake_case")]
pub enum OcrType {
    Tesseract,
    EasyOcr,
    GoogleVision,
    AwsRekognition,
    AzureOcr,
    Custom,
    Other,
}

static OCR_HOOKS: OcrHooks = OcrHooks;

fn ocr_fields() -> [FieldSpec; 3] {
    [
        FieldSpec::new("file_path", FieldType::Str)
            .optional()
            .batch(BatchPolicy::Skip),
        FieldSpec::new("type", FieldType::Enum(OcrType::VARIANTS))
            .optional()
            .batch(BatchPolicy::Merge),
        FieldSpec::new("content", FieldType::Str)
            .optional()
            .column(ColumnType::Binary)
            .codec(RowCodec::Gzip),
    ]
}

static OCR: Lazy<RecordSchema> = Lazy::new(|| {
    let [file_path, ty, content] = ocr_fields();
    RecordSchema::raw(MODULE, "Ocr")
        .counterpart("generic.ocr.TensorOcr")
        .field(file_path)
        .field(ty)
        .field(content)
        .hooks(&OCR_HOOKS)
        .build()
        .expect("the built-in Ocr schema is well-formed")
});

static TENSOR_OCR: Lazy<RecordSchema> = Lazy::new(|| {
    let [file_path, ty, content] = ocr_fields();
    RecordSchema::tensor(MODULE, "TensorOcr")
        .counterpart("generic.ocr.Ocr")
        .field(file_path)
        .field(ty)
        .field(content)
        .build()
        .expect("the built-in TensorOcr schema is well-formed")
});

pub(super) fn register(registry: &mut Registry) {
    insert_all(registry, &[&OCR, &TENSOR_OCR]);
}

pub struct Ocr;

impl Ocr {
    pub fn schema() -> &'static RecordSchema {
        &OCR
    }

    pub fn tensor_schema() -> &'static RecordSchema {
        &TENSOR_OCR
    }

    /// Creates an unloaded OCR record referring to a local path or an http(s) URL.
    pub fn from_file_path(file_path: impl Into<String>, ty: OcrType) -> Result<Record> {
        Record::new(
            Self::schema(),
            [
                ("file_path", FieldValue::from(file_path.into())),
                ("type", FieldValue::from(ty.to_string())),
            ],
        )
    }

    pub fn from_content(content: impl Into<String>, ty: OcrType) -> Result<Record> {
        Record::new(
            Self::schema(),
            [
                ("content", FieldValue::from(content.into())),
                ("type", FieldValue::from(ty.to_string())),
            ],
        )
    }
}

struct OcrHooks;

impl ResourceHooks for OcrHooks {
    fn load(&self, record: &mut Record, loader: &dyn ContentLoader) -> Result<()> {
        if !record.get("content")?.is_none() {
            return Ok(());
        }
        let file_path = record.get("file_path")?.as_str().ok_or_else(|| {
            DataModelError::validation("file_path", "either file_path or content must be set")
        })?;
        let content = loader.read_text(file_path)?;
        let content = strip_bytes_literal(&content);
        ensure!(
            !content.is_empty(),
            DataModelError::validation("content", format!("'{}' is empty", file_path))
        );
        let content = content.to_owned();
        record.set("content", content)
    }

    fn unload(&self, record: &mut Record) -> Result<()> {
        record.set("content", FieldValue::None)
    }
}

/// Some exporters write the text as a quoted bytes literal, `b'...'`.
fn strip_bytes_literal(text: &str) -> &str {
    text.strip_prefix("b'")
        .and_then(|rest| rest.trim_end().strip_suffix('\''))
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{field::ColumnType, table::Row};

    #[test]
    fn ocr_type_names() {
        assert_eq!(OcrType::EasyOcr.to_string(), "easy_ocr");
        assert_eq!("aws_rekognition".parse::<OcrType>().unwrap(), OcrType::AwsRekognition);
        assert!(Record::new(Ocr::schema(), [("type", "abbyy")]).is_err());
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.hocr");
        std::fs::write(&path, "<div class='ocr_page'>hello</div>").unwrap();

        let mut ocr = Ocr::from_file_path(path.to_str().unwrap(), OcrType::Tesseract).unwrap();
        ocr.load().unwrap();
        assert_eq!(
            ocr.get_str("content").unwrap(),
            "<div class='ocr_page'>hello</div>"
        );
        ocr.unload().unwrap();
        assert!(ocr.get("content").unwrap().is_none());

        let empty = dir.path().join("empty.hocr");
        std::fs::write(&empty, "").unwrap();
        let mut ocr = Ocr::from_file_path(empty.to_str().unwrap(), OcrType::Tesseract).unwrap();
        assert!(ocr.load().is_err());
    }

    #[test]
    fn content_is_compressed_in_rows() {
        let columns = Ocr::schema().table_schema_flattened().unwrap();
        assert_eq!(columns["content"], ColumnType::Binary);

        let ocr = Ocr::from_content("word ".repeat(100), OcrType::Custom).unwrap();
        let row: Row = ocr.to_row(true).unwrap();
        let compressed = row["content"].as_bytes().unwrap();
        assert!(compressed.len() < 500);

        let restored = Record::from_row(Ocr::schema(), &row).unwrap();
        assert_eq!(restored, ocr);
    }

    #[test]
    fn bytes_literal_is_stripped() {
        assert_eq!(strip_bytes_literal("b'<html/>'\n"), "<html/>");
        assert_eq!(strip_bytes_literal("<html/>"), "<html/>");
    }
}
