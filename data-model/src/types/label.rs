//! Class labels.

use super::insert_all;
use crate::{
    common::*,
    field::{FieldSpec, FieldType, TensorSpec},
    record::Record,
    registry::Registry,
    schema::RecordSchema,
    value::FieldValue,
};

pub const MODULE: &str = "generic.label";

static LABEL: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::raw(MODULE, "Label")
        .counterpart("generic.label.TensorLabel")
        .field(FieldSpec::new("value", FieldType::Int))
        .field(FieldSpec::new("name", FieldType::Str))
        .build()
        .expect("the built-in Label schema is well-formed")
});

static TENSOR_LABEL: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::tensor(MODULE, "TensorLabel")
        .counterpart("generic.label.Label")
        .field(FieldSpec::new("value", FieldType::Tensor(TensorSpec::int(0))))
        .field(FieldSpec::new("name", FieldType::Str))
        .build()
        .expect("the built-in TensorLabel schema is well-formed")
});

static LABEL_LIST: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::raw(MODULE, "LabelList")
        .counterpart("generic.label.TensorLabelList")
        .field(FieldSpec::new("value", FieldType::ListInt))
        .field(FieldSpec::new("name", FieldType::ListStr))
        .validator(check_label_list)
        .build()
        .expect("the built-in LabelList schema is well-formed")
});

static TENSOR_LABEL_LIST: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::tensor(MODULE, "TensorLabelList")
        .counterpart("generic.label.LabelList")
        .field(FieldSpec::new("value", FieldType::Tensor(TensorSpec::int(1))))
        .field(FieldSpec::new("name", FieldType::ListStr))
        .build()
        .expect("the built-in TensorLabelList schema is well-formed")
});

pub(super) fn register(registry: &mut Registry) {
    insert_all(
        registry,
        &[&LABEL, &TENSOR_LABEL, &LABEL_LIST, &TENSOR_LABEL_LIST],
    );
}

/// A class index with its name.
pub struct Label;

impl Label {
    pub fn schema() -> &'static RecordSchema {
        &LABEL
    }

    pub fn tensor_schema() -> &'static RecordSchema {
        &TENSOR_LABEL
    }

    pub fn new(value: i64, name: impl Into<String>) -> Result<Record> {
        Record::new(
            Self::schema(),
            [
                ("value", FieldValue::from(value)),
                ("name", FieldValue::from(name.into())),
            ],
        )
    }
}

/// Class indices with their names, e.g. one per word.
pub struct LabelList;

impl LabelList {
    pub fn schema() -> &'static RecordSchema {
        &LABEL_LIST
    }

    pub fn tensor_schema() -> &'static RecordSchema {
        &TENSOR_LABEL_LIST
    }

    pub fn new(values: Vec<i64>, names: Vec<String>) -> Result<Record> {
        Record::new(
            Self::schema(),
            [
                ("value", FieldValue::from(values)),
                ("name", FieldValue::from(names)),
            ],
        )
    }

    /// Gathers raw labels into one label list.
    pub fn from_list<R: Borrow<Record>>(labels: &[R]) -> Result<Record> {
        let (values, names): (Vec<i64>, Vec<String>) = labels
            .iter()
            .map(|label| -> Result<_> {
                let label = label.borrow();
                ensure!(
                    label.schema().same_as(Label::schema()),
                    DataModelError::validation(
                        "labels",
                        format!("expect raw labels, but get '{}'", label.schema().path())
                    )
                );
                Ok((label.get_int("value")?, label.get_str("name")?.to_owned()))
            })
            .process_results(|iter| iter.unzip())?;
        Self::new(values, names)
    }
}

fn check_label_list(record: &Record) -> Result<()> {
    if record.is_batched() {
        return Ok(());
    }
    let values = record.get("value")?.as_list().map_or(0, |list| list.len());
    let names = record.get("name")?.as_list().map_or(0, |list| list.len());
    ensure!(
        values == names,
        DataModelError::validation(
            "name",
            format!("expect {} names, but get {}", values, names)
        )
    );
    Ok(())
}
