//! Conversion between the raw and the tensor form of a record.

use crate::{
    common::*,
    field::{FieldSpec, FieldType, KindClass},
    record::Record,
    schema::RecordSchema,
    value::FieldValue,
};
use tch_goodies::{f_image_to_unit_tensor, f_tensor_to_image};

impl Record {
    /// The raw schema paired with this record.
    pub fn raw_data_model(&self) -> Result<&'static RecordSchema> {
        if self.is_raw() {
            Ok(self.schema())
        } else {
            self.schema().counterpart_schema()
        }
    }

    /// The tensor schema paired with this record.
    pub fn tensor_data_model(&self) -> Result<&'static RecordSchema> {
        if self.is_tensor() {
            Ok(self.schema())
        } else {
            self.schema().counterpart_schema()
        }
    }

    /// Converts a raw record to its tensor counterpart.
    ///
    /// Numbers become scalar tensors, number lists become tensors and images
    /// become `[channels, height, width]` float tensors in `[0, 1]`. Nested
    /// lists are converted item-wise and stacked if their shapes agree.
    /// Strings and `None` pass through, so do fields the tensor schema
    /// declares with a plain type.
    pub fn to_tensor(&self) -> Result<Record> {
        if self.is_tensor() {
            return Err(DataModelError::illegal_state(format!(
                "'{}' is already in tensor form",
                self.name()
            ))
            .into());
        }
        let target = self.schema().counterpart_schema()?;
        let values: Vec<FieldValue> = izip!(target.fields(), self.iter())
            .map(|(target_field, (field, value))| {
                field_to_tensor(target_field, value).with_context(|| {
                    format!(
                        "failed to convert field '{}' of '{}' to tensor",
                        field.name(),
                        self.name()
                    )
                })
            })
            .try_collect()?;

        finish_conversion(self, target, values)
    }

    /// Converts a tensor record back to its raw counterpart.
    ///
    /// Tensors become nested lists of numbers shaped like the tensor, or
    /// images if the raw field is an image.
    pub fn to_raw(&self) -> Result<Record> {
        if self.is_raw() {
            return Err(DataModelError::illegal_state(format!(
                "'{}' is already in raw form",
                self.name()
            ))
            .into());
        }
        let target = self.schema().counterpart_schema()?;
        let values: Vec<FieldValue> = izip!(target.fields(), self.iter())
            .map(|(target_field, (field, value))| {
                field_to_raw(target_field, value).with_context(|| {
                    format!(
                        "failed to convert field '{}' of '{}' to raw",
                        field.name(),
                        self.name()
                    )
                })
            })
            .try_collect()?;

        finish_conversion(self, target, values)
    }
}

fn finish_conversion(
    source: &Record,
    target: &'static RecordSchema,
    values: Vec<FieldValue>,
) -> Result<Record> {
    let mut record = Record::from_parts(target, values, source.batch_state().clone());
    record.inherit_state(source);
    if let Some(normalizer) = target.normalizer() {
        normalizer(&mut record)
            .with_context(|| format!("failed to normalize '{}'", target.name()))?;
    }
    record.validate()?;
    Ok(record)
}

fn field_to_tensor(target: &FieldSpec, value: &FieldValue) -> Result<FieldValue> {
    match value {
        FieldValue::Record(child) => Ok(child.to_tensor()?.into()),
        value if value.is_record_list() => Err(DataModelError::unsupported(
            target.name(),
            "lists of records are not converted to tensors",
        )
        .into()),
        // plain fields of the tensor schema, e.g. names and modes
        value if target.ty().column_type().is_some() => Ok(value.clone()),
        value => value_to_tensor(value, target.ty().kind_class()),
    }
}

pub(crate) fn value_to_tensor(value: &FieldValue, class: KindClass) -> Result<FieldValue> {
    use FieldValue as V;

    let converted = match value {
        V::None | V::Str(_) | V::Bytes(_) => value.clone(),
        V::Bool(value) => V::Tensor(Tensor::scalar(*value)),
        V::Int(value) => match class {
            KindClass::Float => V::Tensor(Tensor::scalar(*value as f32)),
            _ => V::Tensor(Tensor::scalar(*value)),
        },
        V::Float(value) => V::Tensor(Tensor::scalar(*value as f32)),
        V::Image(image) => V::Tensor(f_image_to_unit_tensor(image)?),
        V::Tensor(tensor) => V::Tensor(tensor.shallow_clone()),
        V::List(list) => list_to_tensor(list, class)?,
        V::Map(map) => V::Map(
            map.iter()
                .map(|(key, value)| -> Result<_> {
                    Ok((key.clone(), value_to_tensor(value, class)?))
                })
                .try_collect()?,
        ),
        V::Record(record) => {
            return Err(DataModelError::unsupported(
                record.name(),
                "records nested in plain values are not converted to tensors",
            )
            .into())
        }
    };
    Ok(converted)
}

fn list_to_tensor(list: &[FieldValue], class: KindClass) -> Result<FieldValue> {
    use FieldValue as V;

    if list.is_empty() {
        let empty = Tensor::f_zeros(&[0], (class.default_kind(), Device::Cpu))?;
        return Ok(V::Tensor(empty));
    }

    if list.iter().all(|item| item.is_number()) {
        let tensor = if let Some(bools) = list.iter().map(|item| item.as_bool()).collect::<Option<Vec<_>>>() {
            Tensor::of_slice(&bools)
        } else {
            let ints: Option<Vec<i64>> = list.iter().map(|item| item.as_int()).collect();
            match ints {
                Some(ints) if class != KindClass::Float => Tensor::of_slice(&ints),
                _ => {
                    let floats: Vec<f32> = list
                        .iter()
                        .map(|item| match *item {
                            V::Bool(value) => value as u8 as f32,
                            V::Int(value) => value as f32,
                            V::Float(value) => value as f32,
                            _ => f32::NAN,
                        })
                        .collect();
                    Tensor::of_slice(&floats)
                }
            }
        };
        return Ok(V::Tensor(tensor));
    }

    if list
        .iter()
        .all(|item| matches!(item, V::List(_) | V::Tensor(_) | V::Image(_)))
    {
        let items: Vec<FieldValue> = list
            .iter()
            .map(|item| value_to_tensor(item, class))
            .try_collect()?;
        let tensors: Option<Vec<&Tensor>> = items.iter().map(|item| item.as_tensor()).collect();
        if let Some(tensors) = tensors {
            if let Some(stacked) = Tensor::f_stack_if_same_shape(&tensors)? {
                return Ok(V::Tensor(stacked));
            }
        }
        warn!(
            "{} nested items of different shapes are kept as a list of tensors",
            items.len()
        );
        return Ok(V::List(items));
    }

    if list
        .iter()
        .any(|item| matches!(item, V::Record(_)))
    {
        bail!(DataModelError::unsupported(
            "list",
            "records mixed into a plain list are not converted to tensors"
        ));
    }
    if !list.iter().all(|item| matches!(item, V::Str(_) | V::None)) {
        warn!("a list of mixed values is kept as it is");
    }
    Ok(V::List(list.to_vec()))
}

fn field_to_raw(target: &FieldSpec, value: &FieldValue) -> Result<FieldValue> {
    match value {
        FieldValue::Record(child) => Ok(child.to_raw()?.into()),
        FieldValue::List(list) if value.is_record_list() => {
            let records: Option<Vec<&Record>> = list.iter().map(|item| item.as_record()).collect();
            let records = records.ok_or_else(|| {
                DataModelError::unsupported(target.name(), "a list mixing records and plain values")
            })?;
            let first = records[0].schema();
            ensure!(
                records.iter().all(|record| record.schema().same_as(first)),
                DataModelError::unsupported(
                    target.name(),
                    "a list of records of different types"
                )
            );
            let items: Vec<FieldValue> = records
                .into_iter()
                .map(|record| -> Result<_> { Ok(record.to_raw()?.into()) })
                .try_collect()?;
            Ok(FieldValue::List(items))
        }
        value => value_to_raw(value, target.ty()),
    }
}

pub(crate) fn value_to_raw(value: &FieldValue, ty: FieldType) -> Result<FieldValue> {
    use FieldValue as V;

    let converted = match value {
        V::Tensor(tensor) if ty == FieldType::Image => image_tensor_to_raw(tensor)?,
        V::Tensor(tensor) => tensor_to_raw(tensor)?,
        V::List(list) => V::List(
            list.iter()
                .map(|item| value_to_raw(item, ty))
                .try_collect()?,
        ),
        V::Map(map) => V::Map(
            map.iter()
                .map(|(key, value)| -> Result<_> { Ok((key.clone(), value_to_raw(value, ty)?)) })
                .try_collect()?,
        ),
        other => other.clone(),
    };
    Ok(converted)
}

fn image_tensor_to_raw(tensor: &Tensor) -> Result<FieldValue> {
    match tensor.dim() {
        2 | 3 => Ok(FieldValue::Image(f_tensor_to_image(tensor)?)),
        4 => {
            let images: Vec<FieldValue> = tensor
                .unzip_first()
                .unwrap_or_default()
                .iter()
                .map(|image| -> Result<_> { Ok(FieldValue::Image(f_tensor_to_image(image)?)) })
                .try_collect()?;
            Ok(FieldValue::List(images))
        }
        dim => bail!(
            "expect a 2D, 3D or 4D image tensor, but get a {}D tensor",
            dim
        ),
    }
}

/// Converts a tensor to a number or nested number lists of the same shape.
pub(crate) fn tensor_to_raw(tensor: &Tensor) -> Result<FieldValue> {
    let values: Vec<FieldValue> = match KindClass::of(tensor.kind()) {
        KindClass::Bool => tensor
            .f_flat_values::<bool>()?
            .into_iter()
            .map(FieldValue::Bool)
            .collect(),
        KindClass::Int => tensor
            .f_flat_values::<i64>()?
            .into_iter()
            .map(FieldValue::Int)
            .collect(),
        KindClass::Float => tensor
            .f_flat_values::<f64>()?
            .into_iter()
            .map(FieldValue::Float)
            .collect(),
        KindClass::Any => bail!("unsupported tensor dtype {:?}", tensor.kind()),
    };

    let shape = tensor.size();
    if shape.is_empty() {
        return values
            .into_iter()
            .next()
            .ok_or_else(|| format_err!("a zero-dimensional tensor without a value"));
    }
    Ok(nest_values(&values, &shape))
}

fn nest_values(values: &[FieldValue], shape: &[i64]) -> FieldValue {
    match shape {
        [] | [_] => FieldValue::List(values.to_vec()),
        [len, rest @ ..] => {
            let chunk = rest.iter().product::<i64>() as usize;
            let items = (0..*len as usize)
                .map(|index| nest_values(&values[index * chunk..(index + 1) * chunk], rest))
                .collect();
            FieldValue::List(items)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_lists_to_tensor() {
        let ints = FieldValue::from(vec![1i64, 2, 3]);
        let tensor = value_to_tensor(&ints, KindClass::Int).unwrap();
        let tensor = tensor.as_tensor().unwrap();
        assert_eq!(tensor.kind(), Kind::Int64);
        assert_eq!(tensor.size(), vec![3]);

        let floats = value_to_tensor(&ints, KindClass::Float).unwrap();
        assert_eq!(floats.as_tensor().unwrap().kind(), Kind::Float);

        let empty = value_to_tensor(&FieldValue::List(vec![]), KindClass::Int).unwrap();
        let empty = empty.as_tensor().unwrap();
        assert_eq!(empty.size(), vec![0]);
        assert_eq!(empty.kind(), Kind::Int64);
    }

    #[test]
    fn ragged_nested_lists_degrade_to_tensor_lists() {
        let ragged = FieldValue::from(vec![vec![1.0, 2.0], vec![3.0]]);
        let converted = value_to_tensor(&ragged, KindClass::Float).unwrap();
        let items = converted.as_list().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_tensor().unwrap().size(), vec![2]);
        assert_eq!(items[1].as_tensor().unwrap().size(), vec![1]);

        let square = FieldValue::from(vec![vec![1.0, 2.0], vec![3.0, 4.0]]);
        let converted = value_to_tensor(&square, KindClass::Float).unwrap();
        assert_eq!(converted.as_tensor().unwrap().size(), vec![2, 2]);
    }

    #[test]
    fn tensor_to_nested_values() {
        let tensor = Tensor::of_slice(&[1i64, 2, 3, 4, 5, 6]).view([2, 3]);
        let value = tensor_to_raw(&tensor).unwrap();
        assert_eq!(
            value,
            FieldValue::from(vec![vec![1i64, 2, 3], vec![4, 5, 6]])
        );

        let scalar = tensor_to_raw(&Tensor::scalar(true)).unwrap();
        assert_eq!(scalar, FieldValue::Bool(true));

        let empty = Tensor::zeros(&[0, 4], (Kind::Float, Device::Cpu));
        assert_eq!(tensor_to_raw(&empty).unwrap(), FieldValue::List(vec![]));
    }
}
