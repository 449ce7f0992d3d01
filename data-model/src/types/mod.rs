//! Built-in record types.
//!
//! Every type is declared twice, as a raw schema and as its tensor
//! counterpart, and both are registered when the registry is first used.

use crate::{common::*, registry::Registry, schema::RecordSchema};

pub mod annotated_object;
pub mod bounding_box;
pub mod data_instance;
pub mod ground_truth;
pub mod image;
pub mod label;
pub mod ocr;
pub mod question_answer_pair;

pub use annotated_object::{AnnotatedObject, AnnotatedObjectList};
pub use bounding_box::{BoundingBox, BoundingBoxExt, BoundingBoxList, BoundingBoxMode};
pub use data_instance::{DocumentInstance, ImageInstance};
pub use ground_truth::{
    ClassificationGT, GroundTruth, LayoutAnalysisGT, OcrGT, QuestionAnswerGT, SerGT,
    VisualQuestionAnswerGT,
};
pub use self::image::{Image, ImageExt};
pub use label::{Label, LabelList};
pub use ocr::{Ocr, OcrType};
pub use question_answer_pair::QuestionAnswerPair;

pub(crate) fn register_builtins(registry: &mut Registry) {
    label::register(registry);
    bounding_box::register(registry);
    self::image::register(registry);
    ocr::register(registry);
    annotated_object::register(registry);
    question_answer_pair::register(registry);
    ground_truth::register(registry);
    data_instance::register(registry);
}

fn insert_all(registry: &mut Registry, schemas: &[&'static Lazy<RecordSchema>]) {
    schemas
        .iter()
        .for_each(|schema| registry.insert(Lazy::force(schema)));
}
