//! Task specific ground truth annotations of a sample.

use super::insert_all;
use crate::{
    common::*,
    field::{BatchPolicy, ColumnType, FieldSpec, FieldType, RowCodec, TensorSpec},
    record::Record,
    registry::Registry,
    schema::RecordSchema,
    value::FieldValue,
};

pub const MODULE: &str = "generic.ground_truth";

const BOXES: &str = "generic.bounding_box.BoundingBoxList";
const TENSOR_BOXES: &str = "generic.bounding_box.TensorBoundingBoxList";

static CLASSIFICATION_GT: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::raw(MODULE, "ClassificationGT")
        .counterpart("generic.ground_truth.TensorClassificationGT")
        .field(FieldSpec::new("label", FieldType::Record("generic.label.Label")))
        .build()
        .expect("the built-in ClassificationGT schema is well-formed")
});

static TENSOR_CLASSIFICATION_GT: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::tensor(MODULE, "TensorClassificationGT")
        .counterpart("generic.ground_truth.ClassificationGT")
        .field(FieldSpec::new(
            "label",
            FieldType::Record("generic.label.TensorLabel"),
        ))
        .build()
        .expect("the built-in TensorClassificationGT schema is well-formed")
});

static OCR_GT: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::raw(MODULE, "OCRGT")
        .counterpart("generic.ground_truth.TensorOCRGT")
        .field(FieldSpec::new("words", FieldType::ListStr).optional())
        .field(FieldSpec::new("word_bboxes", FieldType::Record(BOXES)).optional())
        .field(
            FieldSpec::new("word_confs", FieldType::ListFloat)
                .optional()
                .batch(BatchPolicy::Skip),
        )
        .field(
            FieldSpec::new("word_angles", FieldType::ListFloat)
                .optional()
                .batch(BatchPolicy::Skip),
        )
        .build()
        .expect("the built-in OCRGT schema is well-formed")
});

static TENSOR_OCR_GT: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::tensor(MODULE, "TensorOCRGT")
        .counterpart("generic.ground_truth.OCRGT")
        .field(FieldSpec::new("words", FieldType::ListStr).optional())
        .field(FieldSpec::new("word_bboxes", FieldType::Record(TENSOR_BOXES)).optional())
        .field(
            FieldSpec::new("word_confs", FieldType::Tensor(TensorSpec::float(1)))
                .optional()
                .batch(BatchPolicy::Skip),
        )
        .field(
            FieldSpec::new("word_angles", FieldType::Tensor(TensorSpec::float(1)))
                .optional()
                .batch(BatchPolicy::Skip),
        )
        .build()
        .expect("the built-in TensorOCRGT schema is well-formed")
});

static SER_GT: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::raw(MODULE, "SERGT")
        .counterpart("generic.ground_truth.TensorSERGT")
        .field(FieldSpec::new("words", FieldType::ListStr).optional())
        .field(FieldSpec::new("word_bboxes", FieldType::Record(BOXES)).optional())
        .field(
            FieldSpec::new("word_labels", FieldType::Record("generic.label.LabelList"))
                .optional(),
        )
        .field(FieldSpec::new("segment_level_bboxes", FieldType::Record(BOXES)).optional())
        .build()
        .expect("the built-in SERGT schema is well-formed")
});

static TENSOR_SER_GT: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::tensor(MODULE, "TensorSERGT")
        .counterpart("generic.ground_truth.SERGT")
        .field(FieldSpec::new("words", FieldType::ListStr).optional())
        .field(FieldSpec::new("word_bboxes", FieldType::Record(TENSOR_BOXES)).optional())
        .field(
            FieldSpec::new(
                "word_labels",
                FieldType::Record("generic.label.TensorLabelList"),
            )
            .optional(),
        )
        .field(
            FieldSpec::new("segment_level_bboxes", FieldType::Record(TENSOR_BOXES)).optional(),
        )
        .build()
        .expect("the built-in TensorSERGT schema is well-formed")
});

static QUESTION_ANSWER_GT: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::raw(MODULE, "QuestionAnswerGT")
        .counterpart("generic.ground_truth.TensorQuestionAnswerGT")
        .field(FieldSpec::new(
            "qa_pair",
            FieldType::Record("generic.question_answer_pair.QuestionAnswerPair"),
        ))
        .field(FieldSpec::new("words", FieldType::ListStr))
        .build()
        .expect("the built-in QuestionAnswerGT schema is well-formed")
});

static TENSOR_QUESTION_ANSWER_GT: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::tensor(MODULE, "TensorQuestionAnswerGT")
        .counterpart("generic.ground_truth.QuestionAnswerGT")
        .field(FieldSpec::new(
            "qa_pair",
            FieldType::Record("generic.question_answer_pair.TensorQuestionAnswerPair"),
        ))
        .field(FieldSpec::new("words", FieldType::ListStr))
        .build()
        .expect("the built-in TensorQuestionAnswerGT schema is well-formed")
});

static VISUAL_QUESTION_ANSWER_GT: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::raw(MODULE, "VisualQuestionAnswerGT")
        .counterpart("generic.ground_truth.TensorVisualQuestionAnswerGT")
        .field(FieldSpec::new(
            "qa_pair",
            FieldType::Record("generic.question_answer_pair.QuestionAnswerPair"),
        ))
        .field(FieldSpec::new("words", FieldType::ListStr))
        .field(FieldSpec::new("word_bboxes", FieldType::Record(BOXES)))
        .field(FieldSpec::new("segment_level_bboxes", FieldType::Record(BOXES)))
        .build()
        .expect("the built-in VisualQuestionAnswerGT schema is well-formed")
});

static TENSOR_VISUAL_QUESTION_ANSWER_GT: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::tensor(MODULE, "TensorVisualQuestionAnswerGT")
        .counterpart("generic.ground_truth.VisualQuestionAnswerGT")
        .field(FieldSpec::new(
            "qa_pair",
            FieldType::Record("generic.question_answer_pair.TensorQuestionAnswerPair"),
        ))
        .field(FieldSpec::new("words", FieldType::ListStr))
        .field(FieldSpec::new("word_bboxes", FieldType::Record(TENSOR_BOXES)))
        .field(FieldSpec::new("segment_level_bboxes", FieldType::Record(TENSOR_BOXES)))
        .build()
        .expect("the built-in TensorVisualQuestionAnswerGT schema is well-formed")
});

static LAYOUT_ANALYSIS_GT: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::raw(MODULE, "LayoutAnalysisGT")
        .counterpart("generic.ground_truth.TensorLayoutAnalysisGT")
        .field(
            FieldSpec::new(
                "annotated_objects",
                FieldType::Record("generic.annotated_object.AnnotatedObjectList"),
            )
            .optional(),
        )
        .field(FieldSpec::new("words", FieldType::ListStr).optional())
        .field(FieldSpec::new("word_bboxes", FieldType::Record(BOXES)).optional())
        .build()
        .expect("the built-in LayoutAnalysisGT schema is well-formed")
});

static TENSOR_LAYOUT_ANALYSIS_GT: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::tensor(MODULE, "TensorLayoutAnalysisGT")
        .counterpart("generic.ground_truth.LayoutAnalysisGT")
        .field(
            FieldSpec::new(
                "annotated_objects",
                FieldType::Record("generic.annotated_object.TensorAnnotatedObjectList"),
            )
            .optional(),
        )
        .field(FieldSpec::new("words", FieldType::ListStr).optional())
        .field(FieldSpec::new("word_bboxes", FieldType::Record(TENSOR_BOXES)).optional())
        .build()
        .expect("the built-in TensorLayoutAnalysisGT schema is well-formed")
});

/// Sub ground truths are stored as JSON strings in one column each.
fn json_column(name: &'static str, path: &'static str) -> FieldSpec {
    FieldSpec::new(name, FieldType::Record(path))
        .optional()
        .column(ColumnType::String)
        .codec(RowCodec::Json)
}

static GROUND_TRUTH: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::raw(MODULE, "GroundTruth")
        .counterpart("generic.ground_truth.TensorGroundTruth")
        .field(json_column(
            "classification",
            "generic.ground_truth.ClassificationGT",
        ))
        .field(json_column("ser", "generic.ground_truth.SERGT"))
        .field(json_column("ocr", "generic.ground_truth.OCRGT"))
        .field(json_column("qa", "generic.ground_truth.QuestionAnswerGT"))
        .field(json_column("vqa", "generic.ground_truth.VisualQuestionAnswerGT"))
        .field(json_column("layout", "generic.ground_truth.LayoutAnalysisGT"))
        .build()
        .expect("the built-in GroundTruth schema is well-formed")
});

static TENSOR_GROUND_TRUTH: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::tensor(MODULE, "TensorGroundTruth")
        .counterpart("generic.ground_truth.GroundTruth")
        .field(json_column(
            "classification",
            "generic.ground_truth.TensorClassificationGT",
        ))
        .field(json_column("ser", "generic.ground_truth.TensorSERGT"))
        .field(json_column("ocr", "generic.ground_truth.TensorOCRGT"))
        .field(json_column("qa", "generic.ground_truth.TensorQuestionAnswerGT"))
        .field(json_column(
            "vqa",
            "generic.ground_truth.TensorVisualQuestionAnswerGT",
        ))
        .field(json_column("layout", "generic.ground_truth.TensorLayoutAnalysisGT"))
        .build()
        .expect("the built-in TensorGroundTruth schema is well-formed")
});

pub(super) fn register(registry: &mut Registry) {
    insert_all(
        registry,
        &[
            &CLASSIFICATION_GT,
            &TENSOR_CLASSIFICATION_GT,
            &OCR_GT,
            &TENSOR_OCR_GT,
            &SER_GT,
            &TENSOR_SER_GT,
            &QUESTION_ANSWER_GT,
            &TENSOR_QUESTION_ANSWER_GT,
            &VISUAL_QUESTION_ANSWER_GT,
            &TENSOR_VISUAL_QUESTION_ANSWER_GT,
            &LAYOUT_ANALYSIS_GT,
            &TENSOR_LAYOUT_ANALYSIS_GT,
            &GROUND_TRUTH,
            &TENSOR_GROUND_TRUTH,
        ],
    );
}

pub struct ClassificationGT;

impl ClassificationGT {
    pub fn schema() -> &'static RecordSchema {
        &CLASSIFICATION_GT
    }

    pub fn tensor_schema() -> &'static RecordSchema {
        &TENSOR_CLASSIFICATION_GT
    }

    pub fn new(label: Record) -> Result<Record> {
        Record::new(Self::schema(), [("label", label)])
    }
}

pub struct OcrGT;

impl OcrGT {
    pub fn schema() -> &'static RecordSchema {
        &OCR_GT
    }

    pub fn tensor_schema() -> &'static RecordSchema {
        &TENSOR_OCR_GT
    }

    pub fn new(words: Vec<String>, word_bboxes: Record) -> Result<Record> {
        Record::new(
            Self::schema(),
            [
                ("words", FieldValue::from(words)),
                ("word_bboxes", word_bboxes.into()),
            ],
        )
    }
}

pub struct SerGT;

impl SerGT {
    pub fn schema() -> &'static RecordSchema {
        &SER_GT
    }

    pub fn tensor_schema() -> &'static RecordSchema {
        &TENSOR_SER_GT
    }
}

pub struct QuestionAnswerGT;

impl QuestionAnswerGT {
    pub fn schema() -> &'static RecordSchema {
        &QUESTION_ANSWER_GT
    }

    pub fn tensor_schema() -> &'static RecordSchema {
        &TENSOR_QUESTION_ANSWER_GT
    }
}

pub struct VisualQuestionAnswerGT;

impl VisualQuestionAnswerGT {
    pub fn schema() -> &'static RecordSchema {
        &VISUAL_QUESTION_ANSWER_GT
    }

    pub fn tensor_schema() -> &'static RecordSchema {
        &TENSOR_VISUAL_QUESTION_ANSWER_GT
    }
}

pub struct LayoutAnalysisGT;

impl LayoutAnalysisGT {
    pub fn schema() -> &'static RecordSchema {
        &LAYOUT_ANALYSIS_GT
    }

    pub fn tensor_schema() -> &'static RecordSchema {
        &TENSOR_LAYOUT_ANALYSIS_GT
    }
}

/// Ground truths of one sample, one optional entry per task.
pub struct GroundTruth;

impl GroundTruth {
    pub fn schema() -> &'static RecordSchema {
        &GROUND_TRUTH
    }

    pub fn tensor_schema() -> &'static RecordSchema {
        &TENSOR_GROUND_TRUTH
    }

    /// A ground truth without any task entry.
    pub fn empty() -> Result<Record> {
        Record::empty(Self::schema())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{bounding_box::BoundingBoxList, label::Label};

    fn ocr_gt() -> Record {
        OcrGT::new(
            vec!["hello".into(), "world".into()],
            BoundingBoxList::new(vec![[0.0, 0.0, 5.0, 2.0], [6.0, 0.0, 11.0, 2.0]], "xyxy")
                .unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn sub_ground_truths_are_json_columns() {
        let columns = GroundTruth::schema().table_schema_flattened().unwrap();
        assert_eq!(
            columns.keys().map(|key| key.as_str()).collect_vec(),
            vec!["classification", "ser", "ocr", "qa", "vqa", "layout"]
        );
        assert!(columns.values().all(|column| *column == ColumnType::String));

        let gt = Record::new(
            GroundTruth::schema(),
            [
                (
                    "classification",
                    FieldValue::from(ClassificationGT::new(Label::new(4, "invoice").unwrap()).unwrap()),
                ),
                ("ocr", ocr_gt().into()),
            ],
        )
        .unwrap();

        let row = gt.to_row(true).unwrap();
        let text = row["classification"].as_str().unwrap();
        let json: serde_json::Value = serde_json::from_str(text).unwrap();
        assert_eq!(json["label"]["name"], "invoice");
        assert!(row["ser"].is_none());

        let restored = Record::from_row(GroundTruth::schema(), &row).unwrap();
        assert_eq!(restored, gt);
    }

    #[test]
    fn ground_truth_to_tensor() {
        let gt = Record::new(GroundTruth::schema(), [("ocr", ocr_gt())]).unwrap();
        let tensor = gt.to_tensor().unwrap();
        let ocr = tensor.get_record("ocr").unwrap();
        assert_eq!(
            ocr.get_record("word_bboxes").unwrap().get_tensor("value").unwrap().size(),
            vec![2, 4]
        );
        assert_eq!(ocr.get("words").unwrap().to_str_vec().unwrap(), vec!["hello", "world"]);
        assert!(tensor.get("classification").unwrap().is_none());
        assert_eq!(tensor.to_raw().unwrap(), gt);

        let empty = GroundTruth::empty().unwrap();
        assert!(empty.to_row(false).unwrap().is_empty());
    }
}
