//! Labelled objects with a box and an optional polygon segmentation.

use super::{bounding_box::BoundingBoxList, insert_all, label::LabelList};
use crate::{
    common::*,
    field::{BatchPolicy, FieldSpec, FieldType, KindClass, TensorSpec},
    record::Record,
    registry::Registry,
    schema::RecordSchema,
    value::FieldValue,
};

pub const MODULE: &str = "generic.annotated_object";

fn not_crowd() -> Result<FieldValue> {
    Ok(false.into())
}

static ANNOTATED_OBJECT: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::raw(MODULE, "AnnotatedObject")
        .counterpart("generic.annotated_object.TensorAnnotatedObject")
        .field(FieldSpec::new("label", FieldType::Record("generic.label.Label")))
        .field(FieldSpec::new(
            "bbox",
            FieldType::Record("generic.bounding_box.BoundingBox"),
        ))
        .field(FieldSpec::new("segmentation", FieldType::NestedListFloat).optional())
        .field(FieldSpec::new("iscrowd", FieldType::Bool).default_with(not_crowd))
        .validator(check_polygons)
        .build()
        .expect("the built-in AnnotatedObject schema is well-formed")
});

static TENSOR_ANNOTATED_OBJECT: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::tensor(MODULE, "TensorAnnotatedObject")
        .counterpart("generic.annotated_object.AnnotatedObject")
        .field(FieldSpec::new(
            "label",
            FieldType::Record("generic.label.TensorLabel"),
        ))
        .field(FieldSpec::new(
            "bbox",
            FieldType::Record("generic.bounding_box.TensorBoundingBox"),
        ))
        .field(
            FieldSpec::new(
                "segmentation",
                FieldType::Tensor(TensorSpec::new(KindClass::Float, None)),
            )
            .optional()
            .batch(BatchPolicy::StackSkip),
        )
        .field(FieldSpec::new("iscrowd", FieldType::Tensor(TensorSpec::bool(0))))
        .build()
        .expect("the built-in TensorAnnotatedObject schema is well-formed")
});

static ANNOTATED_OBJECT_LIST: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::raw(MODULE, "AnnotatedObjectList")
        .counterpart("generic.annotated_object.TensorAnnotatedObjectList")
        .field(FieldSpec::new(
            "label",
            FieldType::Record("generic.label.LabelList"),
        ))
        .field(FieldSpec::new(
            "bbox",
            FieldType::Record("generic.bounding_box.BoundingBoxList"),
        ))
        .field(FieldSpec::new("iscrowd", FieldType::ListBool))
        .validator(check_object_counts)
        .build()
        .expect("the built-in AnnotatedObjectList schema is well-formed")
});

static TENSOR_ANNOTATED_OBJECT_LIST: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::tensor(MODULE, "TensorAnnotatedObjectList")
        .counterpart("generic.annotated_object.AnnotatedObjectList")
        .field(FieldSpec::new(
            "label",
            FieldType::Record("generic.label.TensorLabelList"),
        ))
        .field(FieldSpec::new(
            "bbox",
            FieldType::Record("generic.bounding_box.TensorBoundingBoxList"),
        ))
        .field(FieldSpec::new("iscrowd", FieldType::Tensor(TensorSpec::bool(1))))
        .build()
        .expect("the built-in TensorAnnotatedObjectList schema is well-formed")
});

pub(super) fn register(registry: &mut Registry) {
    insert_all(
        registry,
        &[
            &ANNOTATED_OBJECT,
            &TENSOR_ANNOTATED_OBJECT,
            &ANNOTATED_OBJECT_LIST,
            &TENSOR_ANNOTATED_OBJECT_LIST,
        ],
    );
}

pub struct AnnotatedObject;

impl AnnotatedObject {
    pub fn schema() -> &'static RecordSchema {
        &ANNOTATED_OBJECT
    }

    pub fn tensor_schema() -> &'static RecordSchema {
        &TENSOR_ANNOTATED_OBJECT
    }

    pub fn new(
        label: Record,
        bbox: Record,
        segmentation: Option<Vec<Vec<f64>>>,
        iscrowd: bool,
    ) -> Result<Record> {
        Record::new(
            Self::schema(),
            [
                ("label", FieldValue::from(label)),
                ("bbox", bbox.into()),
                ("segmentation", segmentation.into()),
                ("iscrowd", iscrowd.into()),
            ],
        )
    }
}

/// The objects of one sample in columnar layout.
pub struct AnnotatedObjectList;

impl AnnotatedObjectList {
    pub fn schema() -> &'static RecordSchema {
        &ANNOTATED_OBJECT_LIST
    }

    pub fn tensor_schema() -> &'static RecordSchema {
        &TENSOR_ANNOTATED_OBJECT_LIST
    }

    /// Gathers raw annotated objects into one list record.
    ///
    /// The boxes must share one mode. Segmentations are not kept.
    pub fn from_list<R: Borrow<Record>>(objects: &[R]) -> Result<Record> {
        let objects = objects.iter().map(|object| object.borrow()).collect_vec();
        for object in &objects {
            ensure!(
                object.schema().same_as(AnnotatedObject::schema()),
                DataModelError::validation(
                    "objects",
                    format!(
                        "expect raw annotated objects, but get '{}'",
                        object.schema().path()
                    )
                )
            );
        }

        let labels: Vec<&Record> = objects
            .iter()
            .map(|object| object.get_record("label"))
            .try_collect()?;
        let boxes: Vec<&Record> = objects
            .iter()
            .map(|object| object.get_record("bbox"))
            .try_collect()?;
        let iscrowd: Vec<FieldValue> = objects
            .iter()
            .map(|object| object.get("iscrowd").map(Clone::clone))
            .try_collect()?;

        let modes: HashSet<&str> = boxes
            .iter()
            .map(|bbox| bbox.get_str("mode"))
            .try_collect()?;
        ensure!(
            modes.len() <= 1,
            DataModelError::validation("bbox", format!("boxes of mixed modes {:?}", modes))
        );
        let mode = modes.into_iter().next().unwrap_or("xyxy");
        let coords: Vec<FieldValue> = boxes
            .iter()
            .map(|bbox| bbox.get("value").map(Clone::clone))
            .try_collect()?;

        let bbox = Record::new(
            BoundingBoxList::schema(),
            [("value", FieldValue::List(coords)), ("mode", mode.into())],
        )?;
        Record::new(
            Self::schema(),
            [
                ("label", FieldValue::from(LabelList::from_list(&labels)?)),
                ("bbox", bbox.into()),
                ("iscrowd", FieldValue::List(iscrowd)),
            ],
        )
    }
}

fn check_polygons(record: &Record) -> Result<()> {
    if record.is_batched() {
        return Ok(());
    }
    let polygons = match record.get("segmentation")? {
        FieldValue::List(polygons) => polygons,
        _ => return Ok(()),
    };
    polygons.iter().enumerate().try_for_each(|(index, polygon)| {
        let len = polygon.as_list().map_or(0, |polygon| polygon.len());
        ensure!(
            len % 2 == 0,
            DataModelError::validation(
                "segmentation",
                format!(
                    "polygon {} has {} coordinates, expect x and y pairs",
                    index, len
                )
            )
        );
        Ok(())
    })
}

fn check_object_counts(record: &Record) -> Result<()> {
    if record.is_batched() {
        return Ok(());
    }
    let labels = record.get_record("label")?.get("value")?.as_list().map_or(0, |list| list.len());
    let boxes = record.get_record("bbox")?.get("value")?.as_list().map_or(0, |list| list.len());
    let crowds = record.get("iscrowd")?.as_list().map_or(0, |list| list.len());
    ensure!(
        labels == boxes && boxes == crowds,
        DataModelError::validation(
            "label",
            format!(
                "got {} labels, {} boxes and {} crowd flags",
                labels, boxes, crowds
            )
        )
    );
    Ok(())
}
