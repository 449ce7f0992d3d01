//! Bounding boxes in corner or origin-size coordinates.

use super::insert_all;
use crate::{
    common::*,
    convert::tensor_to_raw,
    field::{BatchPolicy, FieldSpec, FieldType, TensorSpec},
    record::Record,
    registry::Registry,
    schema::RecordSchema,
    value::FieldValue,
};
use bbox::{prelude::*, XYWH, XYXY};
use strum::{Display, EnumString, EnumVariantNames, VariantNames};

pub const MODULE: &str = "generic.bounding_box";

/// The layout of the four box coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumVariantNames)]
#[strum(serialize_all = "lowercase")]
pub enum BoundingBoxMode {
    /// `(x1, y1, x2, y2)`
    Xyxy,
    /// `(x1, y1, width, height)`
    Xywh,
}

impl Default for BoundingBoxMode {
    fn default() -> Self {
        Self::Xyxy
    }
}

fn default_mode() -> Result<FieldValue> {
    Ok(BoundingBoxMode::default().to_string().into())
}

fn mode_field() -> FieldSpec {
    FieldSpec::new("mode", FieldType::Enum(BoundingBoxMode::VARIANTS))
        .default_with(default_mode)
        .batch(BatchPolicy::Merge)
}

static BOUNDING_BOX: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::raw(MODULE, "BoundingBox")
        .counterpart("generic.bounding_box.TensorBoundingBox")
        .field(FieldSpec::new("value", FieldType::ListFloat))
        .field(mode_field())
        .validator(check_raw_box)
        .build()
        .expect("the built-in BoundingBox schema is well-formed")
});

static TENSOR_BOUNDING_BOX: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::tensor(MODULE, "TensorBoundingBox")
        .counterpart("generic.bounding_box.BoundingBox")
        .field(FieldSpec::new("value", FieldType::Tensor(TensorSpec::float(1))))
        .field(mode_field())
        .validator(check_tensor_boxes)
        .build()
        .expect("the built-in TensorBoundingBox schema is well-formed")
});

static BOUNDING_BOX_LIST: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::raw(MODULE, "BoundingBoxList")
        .counterpart("generic.bounding_box.TensorBoundingBoxList")
        .field(FieldSpec::new("value", FieldType::NestedListFloat))
        .field(mode_field())
        .validator(check_raw_box_list)
        .build()
        .expect("the built-in BoundingBoxList schema is well-formed")
});

static TENSOR_BOUNDING_BOX_LIST: Lazy<RecordSchema> = Lazy::new(|| {
    RecordSchema::tensor(MODULE, "TensorBoundingBoxList")
        .counterpart("generic.bounding_box.BoundingBoxList")
        .field(FieldSpec::new("value", FieldType::Tensor(TensorSpec::float(2))))
        .field(mode_field())
        .normalizer(shape_empty_box_list)
        .validator(check_tensor_boxes)
        .build()
        .expect("the built-in TensorBoundingBoxList schema is well-formed")
});

pub(super) fn register(registry: &mut Registry) {
    insert_all(
        registry,
        &[
            &BOUNDING_BOX,
            &TENSOR_BOUNDING_BOX,
            &BOUNDING_BOX_LIST,
            &TENSOR_BOUNDING_BOX_LIST,
        ],
    );
}

/// A single box.
pub struct BoundingBox;

impl BoundingBox {
    pub fn schema() -> &'static RecordSchema {
        &BOUNDING_BOX
    }

    pub fn tensor_schema() -> &'static RecordSchema {
        &TENSOR_BOUNDING_BOX
    }

    pub fn new(value: [f64; 4], mode: &str) -> Result<Record> {
        Record::new(
            Self::schema(),
            [
                ("value", FieldValue::from(value.to_vec())),
                ("mode", FieldValue::from(mode)),
            ],
        )
    }

    /// Creates a box in corner mode.
    pub fn from_rect<R>(rect: &R) -> Result<Record>
    where
        R: Rect<Type = f64>,
    {
        Self::new(
            [rect.x1(), rect.y1(), rect.x2(), rect.y2()],
            &BoundingBoxMode::Xyxy.to_string(),
        )
    }
}

/// The boxes of one sample, e.g. one per word.
pub struct BoundingBoxList;

impl BoundingBoxList {
    pub fn schema() -> &'static RecordSchema {
        &BOUNDING_BOX_LIST
    }

    pub fn tensor_schema() -> &'static RecordSchema {
        &TENSOR_BOUNDING_BOX_LIST
    }

    pub fn new(values: Vec<[f64; 4]>, mode: &str) -> Result<Record> {
        let values = values.into_iter().map(|value| value.to_vec()).collect_vec();
        Record::new(
            Self::schema(),
            [
                ("value", FieldValue::from(values)),
                ("mode", FieldValue::from(mode)),
            ],
        )
    }
}

/// Coordinate helpers on bounding box records of either form.
///
/// Coordinates are returned as tensors whose shape is the box shape without
/// the last dimension, so they work on single boxes, box lists and batches
/// alike. Raw records must be unbatched.
pub trait BoundingBoxExt {
    fn box_mode(&self) -> Result<BoundingBoxMode>;

    /// The box values as a floating point tensor with 4 in the last dimension.
    fn coordinates(&self) -> Result<Tensor>;

    fn x1(&self) -> Result<Tensor>;
    fn y1(&self) -> Result<Tensor>;
    fn x2(&self) -> Result<Tensor>;
    fn y2(&self) -> Result<Tensor>;
    fn width(&self) -> Result<Tensor>;
    fn height(&self) -> Result<Tensor>;
    fn area(&self) -> Result<Tensor>;

    /// Returns true if every box lies in the positive quadrant and has a
    /// positive extent.
    fn is_valid(&self) -> Result<bool>;

    /// The single unbatched box in corner coordinates.
    fn rect(&self) -> Result<XYXY<f64>>;

    /// Toggles between corner and origin-size coordinates.
    fn switch_mode(&mut self) -> Result<&mut Self>;

    /// Divides the coordinates by the image size.
    ///
    /// Every box must lie within the image.
    fn normalize(&mut self, width: f64, height: f64) -> Result<&mut Self>;
}

impl BoundingBoxExt for Record {
    fn box_mode(&self) -> Result<BoundingBoxMode> {
        check_is_box(self)?;
        let mode = match self.get("mode")? {
            FieldValue::Str(mode) => mode.as_str(),
            other => bail!(DataModelError::unsupported(
                "mode",
                format!(
                    "the boxes of '{}' do not share one mode, get {}",
                    self.name(),
                    other.type_name()
                )
            )),
        };
        let mode = mode
            .parse()
            .map_err(|_| DataModelError::validation("mode", format!("unknown mode '{}'", mode)))?;
        Ok(mode)
    }

    fn coordinates(&self) -> Result<Tensor> {
        check_is_box(self)?;
        let value = self.get("value")?;

        if self.is_tensor() {
            let tensor = value.as_tensor().ok_or_else(|| {
                DataModelError::unsupported(
                    "value",
                    format!("expect a tensor, but get {}", value.type_name()),
                )
            })?;
            let tensor = match tensor.kind() {
                Kind::Float | Kind::Double | Kind::Half => tensor.shallow_clone(),
                _ => tensor.f_to_kind(Kind::Float)?,
            };
            return Ok(tensor);
        }

        ensure!(
            !self.is_batched(),
            DataModelError::illegal_state(format!(
                "coordinates of batched raw '{}' are not available, convert it to tensor first",
                self.name()
            ))
        );
        let items = value.as_list().unwrap_or_default();
        let floats: Vec<f64> = match self.schema().field("value").map(|field| field.ty()) {
            Some(FieldType::NestedListFloat) => items
                .iter()
                .map(|row| row.to_float_vec())
                .collect::<Option<Vec<_>>>()
                .map(|rows| rows.concat()),
            _ => value.to_float_vec(),
        }
        .ok_or_else(|| DataModelError::validation("value", "expect numbers"))?;
        let shape: &[i64] = if self.schema().same_as(BoundingBox::schema()) {
            &[4]
        } else {
            &[-1, 4]
        };
        Ok(Tensor::of_slice(&floats).f_reshape(shape)?)
    }

    fn x1(&self) -> Result<Tensor> {
        Ok(self.coordinates()?.f_select(-1, 0)?)
    }

    fn y1(&self) -> Result<Tensor> {
        Ok(self.coordinates()?.f_select(-1, 1)?)
    }

    fn x2(&self) -> Result<Tensor> {
        let coords = self.coordinates()?;
        let x2 = match self.box_mode()? {
            BoundingBoxMode::Xyxy => coords.f_select(-1, 2)?,
            BoundingBoxMode::Xywh => coords.f_select(-1, 0)? + coords.f_select(-1, 2)?,
        };
        Ok(x2)
    }

    fn y2(&self) -> Result<Tensor> {
        let coords = self.coordinates()?;
        let y2 = match self.box_mode()? {
            BoundingBoxMode::Xyxy => coords.f_select(-1, 3)?,
            BoundingBoxMode::Xywh => coords.f_select(-1, 1)? + coords.f_select(-1, 3)?,
        };
        Ok(y2)
    }

    fn width(&self) -> Result<Tensor> {
        let coords = self.coordinates()?;
        let width = match self.box_mode()? {
            BoundingBoxMode::Xyxy => coords.f_select(-1, 2)? - coords.f_select(-1, 0)?,
            BoundingBoxMode::Xywh => coords.f_select(-1, 2)?,
        };
        Ok(width)
    }

    fn height(&self) -> Result<Tensor> {
        let coords = self.coordinates()?;
        let height = match self.box_mode()? {
            BoundingBoxMode::Xyxy => coords.f_select(-1, 3)? - coords.f_select(-1, 1)?,
            BoundingBoxMode::Xywh => coords.f_select(-1, 3)?,
        };
        Ok(height)
    }

    fn area(&self) -> Result<Tensor> {
        Ok(self.width()? * self.height()?)
    }

    fn is_valid(&self) -> Result<bool> {
        let x1 = self.x1()?;
        let y1 = self.y1()?;
        let width = self.width()?;
        let height = self.height()?;
        let valid = x1
            .f_ge(0.0)?
            .f_logical_and(&y1.f_ge(0.0)?)?
            .f_logical_and(&width.f_gt(0.0)?)?
            .f_logical_and(&height.f_gt(0.0)?)?;
        Ok(valid.f_all()?.f_int64_value(&[])? != 0)
    }

    fn rect(&self) -> Result<XYXY<f64>> {
        ensure!(
            self.schema().same_as(BoundingBox::schema())
                || self.schema().same_as(BoundingBox::tensor_schema()),
            DataModelError::unsupported(self.name(), "expect a single bounding box")
        );
        ensure!(
            !self.is_batched(),
            DataModelError::illegal_state(format!("'{}' holds a batch of boxes", self.name()))
        );
        let values: Vec<f64> = self.coordinates()?.f_flat_values()?;
        let coords = [values[0], values[1], values[2], values[3]];
        let rect = match self.box_mode()? {
            BoundingBoxMode::Xyxy => XYXY::try_from_xyxy(coords)?,
            BoundingBoxMode::Xywh => XYWH::try_from_xywh(coords)?.to_xyxy(),
        };
        Ok(rect)
    }

    fn switch_mode(&mut self) -> Result<&mut Self> {
        ensure!(
            !self.is_batched(),
            DataModelError::illegal_state(format!(
                "cannot switch the mode of batched '{}'",
                self.name()
            ))
        );
        let (mode, coords) = match self.box_mode()? {
            BoundingBoxMode::Xyxy => (
                BoundingBoxMode::Xywh,
                [self.x1()?, self.y1()?, self.width()?, self.height()?],
            ),
            BoundingBoxMode::Xywh => (
                BoundingBoxMode::Xyxy,
                [self.x1()?, self.y1()?, self.x2()?, self.y2()?],
            ),
        };
        let coords = Tensor::f_stack(&coords, -1)?;
        write_coordinates(self, coords)?;
        self.set("mode", mode.to_string())?;
        Ok(self)
    }

    fn normalize(&mut self, width: f64, height: f64) -> Result<&mut Self> {
        let invalid = |reason: &str| DataModelError::validation("value", reason);
        ensure!(width > 0.0, invalid("width must be greater than 0"));
        ensure!(height > 0.0, invalid("height must be greater than 0"));

        let within = |coord: Tensor, bound: f64| -> Result<bool> {
            Ok(coord.f_le(bound)?.f_all()?.f_int64_value(&[])? != 0)
        };
        ensure!(
            within(self.x1()?, width)? && within(self.x2()?, width)?,
            invalid("x coordinates must not exceed the width")
        );
        ensure!(
            within(self.y1()?, height)? && within(self.y2()?, height)?,
            invalid("y coordinates must not exceed the height")
        );

        let coords = self.coordinates()?;
        let scale = Tensor::of_slice(&[width, height, width, height])
            .f_to_kind(coords.kind())?
            .f_to_device(coords.device())?;
        write_coordinates(self, coords / scale)?;
        Ok(self)
    }
}

fn check_is_box(record: &Record) -> Result<()> {
    let raw = record.raw_data_model()?;
    ensure!(
        raw.same_as(BoundingBox::schema()) || raw.same_as(BoundingBoxList::schema()),
        DataModelError::unsupported(record.name(), "the record is not a bounding box")
    );
    Ok(())
}

fn write_coordinates(record: &mut Record, coords: Tensor) -> Result<()> {
    let value = if record.is_tensor() {
        FieldValue::Tensor(coords)
    } else {
        tensor_to_raw(&coords.f_to_kind(Kind::Double)?)?
    };
    record.set("value", value)
}

fn check_raw_box(record: &Record) -> Result<()> {
    if record.is_batched() {
        return Ok(());
    }
    let len = record.get("value")?.as_list().map_or(0, |list| list.len());
    ensure!(
        len == 4,
        DataModelError::validation("value", format!("expect 4 coordinates, but get {}", len))
    );
    Ok(())
}

fn check_raw_box_list(record: &Record) -> Result<()> {
    if record.is_batched() {
        return Ok(());
    }
    let rows = record.get("value")?.as_list().unwrap_or_default();
    rows.iter().enumerate().try_for_each(|(index, row)| {
        let len = row.as_list().map_or(0, |row| row.len());
        ensure!(
            len == 4,
            DataModelError::validation(
                "value",
                format!("expect 4 coordinates in box {}, but get {}", index, len)
            )
        );
        Ok(())
    })
}

fn check_tensor_boxes(record: &Record) -> Result<()> {
    if let FieldValue::Tensor(tensor) = record.get("value")? {
        let last = tensor.size().last().copied();
        ensure!(
            last == Some(4),
            DataModelError::validation(
                "value",
                format!("expect 4 in the last dimension, but get shape {:?}", tensor.size())
            )
        );
    }
    Ok(())
}

fn shape_empty_box_list(record: &mut Record) -> Result<()> {
    if record.is_batched() {
        return Ok(());
    }
    if let FieldValue::Tensor(tensor) = record.get_mut("value")? {
        if tensor.numel() == 0 && tensor.dim() < 2 {
            *tensor = tensor.f_reshape(&[0, 4])?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn mode_round_trip() {
        assert_eq!(BoundingBoxMode::VARIANTS, &["xyxy", "xywh"]);
        assert_eq!("xywh".parse::<BoundingBoxMode>().unwrap(), BoundingBoxMode::Xywh);
        assert_eq!(BoundingBoxMode::Xyxy.to_string(), "xyxy");
    }

    #[test]
    fn construct_and_validate() {
        let bbox = BoundingBox::new([0.0, 0.0, 10.0, 20.0], "xyxy").unwrap();
        assert_eq!(bbox.box_mode().unwrap(), BoundingBoxMode::Xyxy);

        let default_mode = Record::new(
            BoundingBox::schema(),
            [("value", FieldValue::from(vec![0.0, 0.0, 1.0, 1.0]))],
        )
        .unwrap();
        assert_eq!(default_mode.get_str("mode").unwrap(), "xyxy");

        assert!(BoundingBox::new([0.0, 0.0, 1.0, 1.0], "cxcywh").is_err());
        assert!(Record::new(
            BoundingBox::schema(),
            [("value", FieldValue::from(vec![0.0, 1.0]))]
        )
        .is_err());
    }

    #[test]
    fn coordinate_helpers() {
        let bbox = BoundingBox::new([10.0, 20.0, 30.0, 40.0], "xywh").unwrap();
        assert_abs_diff_eq!(bbox.x2().unwrap().double_value(&[]), 40.0);
        assert_abs_diff_eq!(bbox.y2().unwrap().double_value(&[]), 60.0);
        assert_abs_diff_eq!(bbox.area().unwrap().double_value(&[]), 1200.0);
        assert!(bbox.is_valid().unwrap());

        let rect = bbox.rect().unwrap();
        assert_eq!(rect.xyxy(), [10.0, 20.0, 40.0, 60.0]);
        let from_rect = BoundingBox::from_rect(&rect).unwrap();
        assert_eq!(from_rect.get_str("mode").unwrap(), "xyxy");

        let tensor = bbox.to_tensor().unwrap();
        assert_abs_diff_eq!(tensor.width().unwrap().double_value(&[]), 30.0);

        let flipped = BoundingBox::new([5.0, 5.0, 1.0, 1.0], "xyxy").unwrap();
        assert!(!flipped.is_valid().unwrap());
    }

    #[test]
    fn switch_and_normalize() {
        let mut bbox = BoundingBox::new([10.0, 20.0, 30.0, 60.0], "xyxy").unwrap();
        bbox.switch_mode().unwrap();
        assert_eq!(bbox.get_str("mode").unwrap(), "xywh");
        assert_eq!(
            bbox.get("value").unwrap().to_float_vec().unwrap(),
            vec![10.0, 20.0, 20.0, 40.0]
        );

        bbox.normalize(100.0, 200.0).unwrap();
        assert_eq!(
            bbox.get("value").unwrap().to_float_vec().unwrap(),
            vec![0.1, 0.1, 0.2, 0.2]
        );

        let mut outside = BoundingBox::new([10.0, 20.0, 300.0, 60.0], "xyxy").unwrap();
        assert!(outside.normalize(100.0, 100.0).is_err());

        let label = crate::types::label::Label::new(1, "a").unwrap();
        assert!(label.coordinates().is_err());
    }

    #[test]
    fn batched_boxes() {
        let boxes = vec![
            BoundingBox::new([0.0, 0.0, 1.0, 1.0], "xyxy").unwrap().to_tensor().unwrap(),
            BoundingBox::new([1.0, 1.0, 3.0, 2.0], "xyxy").unwrap().to_tensor().unwrap(),
        ];
        let batched = Record::batched(&boxes).unwrap();
        assert_eq!(batched.get_tensor("value").unwrap().size(), vec![2, 4]);
        assert_eq!(batched.get_str("mode").unwrap(), "xyxy");
        assert_eq!(batched.width().unwrap().size(), vec![2]);

        let mut batched = batched;
        assert!(batched.switch_mode().is_err());
    }

    #[test]
    fn empty_box_list() {
        let boxes = BoundingBoxList::new(vec![], "xyxy").unwrap();
        let tensor = boxes.to_tensor().unwrap();
        assert_eq!(tensor.get_tensor("value").unwrap().size(), vec![0, 4]);
        assert_eq!(tensor.to_raw().unwrap(), boxes);

        let boxes =
            BoundingBoxList::new(vec![[0.0, 0.0, 2.0, 2.0], [1.0, 1.0, 4.0, 3.0]], "xyxy").unwrap();
        assert_eq!(boxes.area().unwrap().size(), vec![2]);
        assert!(BoundingBoxList::new(vec![[0.0, 0.0, 1.0, 1.0]], "xyxy").is_ok());
        assert!(Record::new(
            BoundingBoxList::schema(),
            [("value", FieldValue::from(vec![vec![0.0, 1.0]]))]
        )
        .is_err());
    }
}
