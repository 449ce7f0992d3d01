use anyhow::Result;
use data_model::{
    types::{
        AnnotatedObject, AnnotatedObjectList, BoundingBox, BoundingBoxList, DocumentInstance,
        GroundTruth, Image, Label, LabelList, Ocr, OcrType, QuestionAnswerPair, SerGT,
    },
    ColumnType, FieldValue, Record,
};
use image::DynamicImage;

fn ser_gt() -> Result<Record> {
    Record::new(
        SerGT::schema(),
        [
            (
                "words",
                FieldValue::from(vec!["Invoice".to_owned(), "42".to_owned()]),
            ),
            (
                "word_bboxes",
                BoundingBoxList::new(vec![[0.0, 0.0, 10.0, 4.0], [12.0, 0.0, 16.0, 4.0]], "xyxy")?
                    .into(),
            ),
            (
                "word_labels",
                LabelList::new(vec![1, 2], vec!["header".into(), "total".into()])?.into(),
            ),
        ],
    )
}

fn document() -> Result<Record> {
    let layout_objects = AnnotatedObjectList::from_list(&[
        AnnotatedObject::new(
            Label::new(0, "title")?,
            BoundingBox::new([0.0, 0.0, 16.0, 4.0], "xyxy")?,
            None,
            false,
        )?,
    ])?;
    let gt = Record::new(
        GroundTruth::schema(),
        [
            ("ser", ser_gt()?),
            (
                "layout",
                Record::new(
                    data_model::types::LayoutAnalysisGT::schema(),
                    [("annotated_objects", layout_objects)],
                )?,
            ),
        ],
    )?;

    Record::new(
        DocumentInstance::schema(),
        [
            ("index", FieldValue::from(3i64)),
            ("sample_id", "invoice.2023.pdf".into()),
            ("page_id", 1i64.into()),
            ("total_num_pages", 2i64.into()),
            (
                "image",
                Image::from_content(DynamicImage::new_rgb8(8, 5))?.into(),
            ),
            (
                "ocr",
                Ocr::from_content("Invoice 42", OcrType::Tesseract)?.into(),
            ),
            ("gt", gt.into()),
        ],
    )
}

#[test]
fn document_columns() -> Result<()> {
    let columns = DocumentInstance::schema().table_schema_flattened()?;
    assert_eq!(columns["index"], ColumnType::Int64);
    assert_eq!(columns["sample_id"], ColumnType::String);
    assert_eq!(columns["image_content"], ColumnType::Binary);
    assert_eq!(columns["image_width"], ColumnType::Int64);
    assert_eq!(columns["ocr_content"], ColumnType::Binary);
    assert_eq!(columns["gt_ser"], ColumnType::String);
    assert_eq!(columns["gt_layout"], ColumnType::String);
    assert_eq!("list<float64>".parse::<ColumnType>()?, ColumnType::List(Box::new(ColumnType::Float64)));
    Ok(())
}

#[test]
fn document_row_round_trip() -> Result<()> {
    let document = document()?;
    assert_eq!(DocumentInstance::key(&document)?, "invoice_2023_pdf");

    let row = document.to_row(true)?;
    let restored = Record::from_row(DocumentInstance::schema(), &row)?;
    assert_eq!(restored.to_row(true)?, row);
    assert_eq!(restored.get_str("sample_id")?, "invoice.2023.pdf");
    assert_eq!(
        restored
            .get_record("gt")?
            .get_record("ser")?
            .get("words")?
            .to_str_vec()
            .unwrap(),
        vec!["Invoice", "42"]
    );
    assert_eq!(
        restored.get_record("ocr")?.get_str("content")?,
        "Invoice 42"
    );
    Ok(())
}

#[test]
fn absent_nested_records_stay_absent() -> Result<()> {
    let document = DocumentInstance::new(
        None,
        Some(Ocr::from_content("only text", OcrType::Other)?),
        None,
    )?;
    let row = document.to_row(true)?;
    assert!(row["image_content"].is_none());
    assert!(row["gt_qa"].is_none());

    let restored = Record::from_row(DocumentInstance::schema(), &row)?;
    assert!(restored.get("image")?.is_none());
    assert!(restored.get_record("gt")?.get("qa")?.is_none());

    let sparse = document.to_row(false)?;
    assert!(!sparse.contains_key("image_content"));
    Ok(())
}

#[test]
fn tensor_rows_use_raw_columns() -> Result<()> {
    let pair = QuestionAnswerPair::new(9, "how much?", &[(8, 10, "42")])?;
    let tensor = pair.to_tensor()?;
    let row = tensor.to_row(true)?;
    assert_eq!(row, pair.to_row(true)?);

    let restored = Record::from_row(QuestionAnswerPair::tensor_schema(), &row)?;
    assert!(restored.is_tensor());
    assert_eq!(restored.to_raw()?, pair);
    Ok(())
}

#[test]
fn json_dump_and_validate() -> Result<()> {
    let document = document()?;
    let json = document.model_dump()?;
    assert_eq!(json["page_id"], 1);
    assert!(json["image"]["content"].is_string());

    let restored = Record::model_validate(DocumentInstance::schema(), &json)?;
    assert_eq!(restored.to_row(true)?, document.to_row(true)?);
    Ok(())
}
