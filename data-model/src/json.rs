//! JSON dumps of records.

use crate::{
    common::*,
    convert::tensor_to_raw,
    encoding,
    field::{FieldSpec, FieldType, RowCodec},
    record::Record,
    schema::RecordSchema,
    value::FieldValue,
};
use serde_json::{Map, Number, Value};

impl Record {
    /// Dumps the fields into a JSON object.
    ///
    /// Images are embedded as base64 PNG, bytes as base64 and tensors as
    /// nested number lists. Unbatched tensor records are dumped in raw form,
    /// so the output can be read back with [Record::model_validate].
    pub fn model_dump(&self) -> Result<Value> {
        if self.is_tensor() && !self.is_batched() {
            return self.to_raw()?.model_dump();
        }
        let object: Map<String, Value> = self
            .iter()
            .map(|(field, value)| -> Result<_> {
                let json = value_to_json(value).with_context(|| {
                    format!("failed to dump field '{}' of '{}'", field.name(), self.name())
                })?;
                Ok((field.name().to_owned(), json))
            })
            .try_collect()?;
        Ok(Value::Object(object))
    }

    /// Builds a record from a JSON object produced by [Record::model_dump].
    ///
    /// Tensor schemas are built in raw form first and then converted.
    pub fn model_validate(schema: &'static RecordSchema, json: &Value) -> Result<Record> {
        if schema.is_tensor() {
            let raw = Self::model_validate(schema.counterpart_schema()?, json)?;
            return raw.to_tensor();
        }

        let object = json.as_object().ok_or_else(|| {
            DataModelError::validation(
                schema.name(),
                format!("expect a JSON object, but get {}", json_type_name(json)),
            )
        })?;
        let fields: Vec<(&str, FieldValue)> = object
            .iter()
            .map(|(key, json)| -> Result<_> {
                let field = schema.field(key).ok_or_else(|| {
                    DataModelError::validation(
                        key.as_str(),
                        format!("'{}' has no such field", schema.name()),
                    )
                })?;
                let value = json_to_field(field, json).with_context(|| {
                    format!("failed to read field '{}' of '{}'", key, schema.name())
                })?;
                Ok((key.as_str(), value))
            })
            .try_collect()?;
        Record::new(schema, fields)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.model_dump()?)?)
    }

    pub fn from_json_str(schema: &'static RecordSchema, text: &str) -> Result<Record> {
        let json: Value = serde_json::from_str(text)
            .with_context(|| format!("invalid JSON for '{}'", schema.name()))?;
        Self::model_validate(schema, &json)
    }
}

impl Serialize for Record {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let json = self
            .model_dump()
            .map_err(|err| serde::ser::Error::custom(format!("{:#}", err)))?;
        json.serialize(serializer)
    }
}

pub(crate) fn value_to_json(value: &FieldValue) -> Result<Value> {
    use FieldValue as V;

    let json = match value {
        V::None => Value::Null,
        V::Bool(value) => Value::Bool(*value),
        V::Int(value) => Value::from(*value),
        V::Float(value) => Value::Number(Number::from_f64(*value).ok_or_else(|| {
            DataModelError::unsupported("json", format!("{} has no JSON representation", value))
        })?),
        V::Str(text) => Value::String(text.clone()),
        V::Bytes(bytes) => Value::String(encoding::bytes_to_base64(bytes)),
        V::Image(image) => Value::String(encoding::image_to_base64(image)?),
        V::Tensor(tensor) => value_to_json(&tensor_to_raw(tensor)?)?,
        V::List(list) => Value::Array(list.iter().map(value_to_json).try_collect()?),
        V::Map(map) => Value::Object(
            map.iter()
                .map(|(key, value)| -> Result<_> { Ok((key.clone(), value_to_json(value)?)) })
                .try_collect()?,
        ),
        V::Record(record) => record.model_dump()?,
    };
    Ok(json)
}

fn json_to_field(field: &FieldSpec, json: &Value) -> Result<FieldValue> {
    if let (FieldType::Record(_), Some(RowCodec::Json), Value::String(text)) =
        (field.ty(), field.codec(), json)
    {
        let schema = RecordSchema::nested_schema(field)?
            .ok_or_else(|| format_err!("field '{}' is not a record", field.name()))?;
        return Ok(Record::from_json_str(schema, text)?.into());
    }
    json_to_value(field.ty(), json)
}

fn json_to_value(ty: FieldType, json: &Value) -> Result<FieldValue> {
    let mismatch = |expect: &str| -> Error {
        DataModelError::validation(
            "json",
            format!("expect {}, but get {}", expect, json_type_name(json)),
        )
        .into()
    };
    let list = |item_ty: FieldType| -> Result<FieldValue> {
        let items = json.as_array().ok_or_else(|| mismatch("an array"))?;
        let items: Vec<FieldValue> = items
            .iter()
            .map(|item| json_to_value(item_ty, item))
            .try_collect()?;
        Ok(FieldValue::List(items))
    };

    if json.is_null() {
        return Ok(FieldValue::None);
    }

    let value = match ty {
        FieldType::Int => FieldValue::Int(json.as_i64().ok_or_else(|| mismatch("an integer"))?),
        FieldType::Float => FieldValue::Float(json.as_f64().ok_or_else(|| mismatch("a number"))?),
        FieldType::Bool => FieldValue::Bool(json.as_bool().ok_or_else(|| mismatch("a bool"))?),
        FieldType::Str | FieldType::Enum(_) => {
            FieldValue::Str(json.as_str().ok_or_else(|| mismatch("a string"))?.to_owned())
        }
        FieldType::Bytes => {
            let text = json.as_str().ok_or_else(|| mismatch("a base64 string"))?;
            FieldValue::Bytes(encoding::base64_to_bytes(text)?)
        }
        FieldType::Image => {
            let text = json.as_str().ok_or_else(|| mismatch("a base64 string"))?;
            FieldValue::Image(encoding::base64_to_image(text)?)
        }
        FieldType::ListInt => list(FieldType::Int)?,
        FieldType::ListFloat => list(FieldType::Float)?,
        FieldType::ListBool => list(FieldType::Bool)?,
        FieldType::ListStr => list(FieldType::Str)?,
        FieldType::NestedListFloat => list(FieldType::ListFloat)?,
        FieldType::Record(path) => {
            let schema = resolve(path)?;
            Record::model_validate(schema, json)?.into()
        }
        FieldType::ListRecord(path) => {
            let schema = resolve(path)?;
            let items = json.as_array().ok_or_else(|| mismatch("an array"))?;
            let records: Vec<FieldValue> = items
                .iter()
                .map(|item| -> Result<_> { Ok(Record::model_validate(schema, item)?.into()) })
                .try_collect()?;
            FieldValue::List(records)
        }
        FieldType::Tensor(_) => {
            bail!(DataModelError::unsupported(
                "json",
                "tensor fields are read through the raw counterpart"
            ))
        }
    };
    Ok(value)
}

fn resolve(path: &str) -> Result<&'static RecordSchema> {
    Ok(crate::registry::resolve(path).map_err(DataModelError::from)?)
}

fn json_type_name(json: &Value) -> &'static str {
    match json {
        Value::Null => "null",
        Value::Bool(_) => "a bool",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{
        bounding_box::BoundingBox,
        data_instance::DocumentInstance,
        image::Image,
        label::Label,
        ocr::{Ocr, OcrType},
    };
    use serde_json::json;

    fn solid_image() -> DynamicImage {
        DynamicImage::ImageRgb8(image::RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30])))
    }

    #[test]
    fn dump_and_validate() {
        let label = Label::new(7, "seven").unwrap();
        let json = label.model_dump().unwrap();
        assert_eq!(json, json!({ "value": 7, "name": "seven" }));
        assert_eq!(Record::model_validate(Label::schema(), &json).unwrap(), label);

        let tensor = Record::model_validate(Label::tensor_schema(), &json).unwrap();
        assert!(tensor.is_tensor());
        assert_eq!(tensor.model_dump().unwrap(), json);
    }

    #[test]
    fn validate_rejects_bad_json() {
        assert!(Record::model_validate(Label::schema(), &json!([1, 2])).is_err());
        assert!(Record::model_validate(Label::schema(), &json!({ "value": "x", "name": "a" })).is_err());
        assert!(
            Record::model_validate(Label::schema(), &json!({ "value": 1, "name": "a", "x": 0 }))
                .is_err()
        );
    }

    #[test]
    fn json_string_round_trip() {
        let bbox = BoundingBox::new([1.0, 2.0, 3.0, 4.5], "xyxy").unwrap();
        let text = bbox.to_json_string().unwrap();
        let restored = Record::from_json_str(BoundingBox::schema(), &text).unwrap();
        assert_eq!(restored, bbox);
    }

    #[test]
    fn tensor_images_dump_as_base64() {
        let tensor = Image::from_content(solid_image())
            .unwrap()
            .to_tensor()
            .unwrap();
        let json = tensor.model_dump().unwrap();
        assert!(json["content"].is_string());
        assert_eq!(json["width"], json!(3));

        let restored = Record::model_validate(Image::tensor_schema(), &json).unwrap();
        assert!(restored.is_tensor());
        assert_eq!(restored, tensor);
    }

    #[test]
    fn tensor_documents_validate_back() {
        let image = Image::from_content(solid_image()).unwrap();
        let ocr = Ocr::from_content("total 42", OcrType::Tesseract).unwrap();
        let document = DocumentInstance::new(Some(image), Some(ocr), None)
            .unwrap()
            .to_tensor()
            .unwrap();

        let json = document.model_dump().unwrap();
        let restored = Record::model_validate(DocumentInstance::tensor_schema(), &json).unwrap();
        assert_eq!(restored, document);
        assert_eq!(
            restored.get_str("sample_id").unwrap(),
            document.get_str("sample_id").unwrap()
        );
    }

    #[test]
    fn non_finite_floats_are_rejected() {
        let err = value_to_json(&FieldValue::Float(f64::NAN)).unwrap_err();
        assert!(matches!(
            DataModelError::find(&err),
            Some(DataModelError::Unsupported { .. })
        ));
        assert!(value_to_json(&FieldValue::Float(f64::INFINITY)).is_err());
        assert_eq!(value_to_json(&FieldValue::Float(0.5)).unwrap(), json!(0.5));
    }
}
