//! Dynamically typed field values.

use crate::{common::*, record::Record};

/// The value held by one record field.
pub enum FieldValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Bytes(Vec<u8>),
    Image(DynamicImage),
    Tensor(Tensor),
    List(Vec<FieldValue>),
    Map(IndexMap<String, FieldValue>),
    Record(Box<Record>),
}

impl FieldValue {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Bytes(_) => "bytes",
            Self::Image(_) => "image",
            Self::Tensor(_) => "tensor",
            Self::List(_) => "list",
            Self::Map(_) => "map",
            Self::Record(_) => "record",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Self::Bool(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match *self {
            Self::Int(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the number as a float, widening integers.
    pub fn as_float(&self) -> Option<f64> {
        match *self {
            Self::Float(value) => Some(value),
            Self::Int(value) => Some(value as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Bytes(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_image(&self) -> Option<&DynamicImage> {
        match self {
            Self::Image(image) => Some(image),
            _ => None,
        }
    }

    pub fn as_tensor(&self) -> Option<&Tensor> {
        match self {
            Self::Tensor(tensor) => Some(tensor),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            Self::List(list) => Some(list),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&Record> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn as_record_mut(&mut self) -> Option<&mut Record> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }

    /// Returns true for a list whose first element is a record.
    pub fn is_record_list(&self) -> bool {
        matches!(self, Self::List(list) if matches!(list.first(), Some(Self::Record(_))))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Self::Bool(_) | Self::Int(_) | Self::Float(_))
    }

    /// Collects a list of integers.
    pub fn to_int_vec(&self) -> Option<Vec<i64>> {
        self.as_list()?.iter().map(|item| item.as_int()).collect()
    }

    /// Collects a list of numbers as floats.
    pub fn to_float_vec(&self) -> Option<Vec<f64>> {
        self.as_list()?.iter().map(|item| item.as_float()).collect()
    }

    pub fn to_str_vec(&self) -> Option<Vec<&str>> {
        self.as_list()?.iter().map(|item| item.as_str()).collect()
    }

    /// Deep equality used to merge batched fields.
    ///
    /// Numbers of different variants never compare equal. Tensors are equal if
    /// they share shape, dtype and elements. Images are compared by dimensions,
    /// color type and pixel bytes.
    pub fn deep_eq(&self, other: &Self) -> bool {
        use FieldValue as V;

        match (self, other) {
            (V::None, V::None) => true,
            (V::Bool(lhs), V::Bool(rhs)) => lhs == rhs,
            (V::Int(lhs), V::Int(rhs)) => lhs == rhs,
            (V::Float(lhs), V::Float(rhs)) => lhs == rhs,
            (V::Str(lhs), V::Str(rhs)) => lhs == rhs,
            (V::Bytes(lhs), V::Bytes(rhs)) => lhs == rhs,
            (V::Image(lhs), V::Image(rhs)) => {
                lhs.dimensions() == rhs.dimensions()
                    && lhs.color() == rhs.color()
                    && lhs.as_bytes() == rhs.as_bytes()
            }
            (V::Tensor(lhs), V::Tensor(rhs)) => {
                lhs.size() == rhs.size()
                    && lhs.kind() == rhs.kind()
                    && lhs.equal(&rhs.to_device(lhs.device()))
            }
            (V::List(lhs), V::List(rhs)) => {
                lhs.len() == rhs.len() && izip!(lhs, rhs).all(|(lhs, rhs)| lhs.deep_eq(rhs))
            }
            (V::Map(lhs), V::Map(rhs)) => {
                lhs.len() == rhs.len()
                    && lhs.iter().all(|(key, lhs)| {
                        rhs.get(key).map_or(false, |rhs| lhs.deep_eq(rhs))
                    })
            }
            (V::Record(lhs), V::Record(rhs)) => lhs.deep_eq(rhs),
            _ => false,
        }
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        Self::None
    }
}

impl Clone for FieldValue {
    /// Tensors are shallow-cloned and share their storage with the source.
    fn clone(&self) -> Self {
        match self {
            Self::None => Self::None,
            Self::Bool(value) => Self::Bool(*value),
            Self::Int(value) => Self::Int(*value),
            Self::Float(value) => Self::Float(*value),
            Self::Str(value) => Self::Str(value.clone()),
            Self::Bytes(value) => Self::Bytes(value.clone()),
            Self::Image(image) => Self::Image(image.clone()),
            Self::Tensor(tensor) => Self::Tensor(tensor.shallow_clone()),
            Self::List(list) => Self::List(list.clone()),
            Self::Map(map) => Self::Map(map.clone()),
            Self::Record(record) => Self::Record(record.clone()),
        }
    }
}

impl PartialEq for FieldValue {
    fn eq(&self, other: &Self) -> bool {
        self.deep_eq(other)
    }
}

impl Debug for FieldValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Bool(value) => write!(f, "{:?}", value),
            Self::Int(value) => write!(f, "{:?}", value),
            Self::Float(value) => write!(f, "{:?}", value),
            Self::Str(value) => write!(f, "{:?}", value),
            Self::Bytes(value) => write!(f, "Bytes(len={})", value.len()),
            Self::Image(image) => {
                let (width, height) = image.dimensions();
                write!(f, "Image({}x{}, {:?})", width, height, image.color())
            }
            Self::Tensor(tensor) => write!(
                f,
                "Tensor(shape={:?}, kind={:?}, device={:?})",
                tensor.size(),
                tensor.kind(),
                tensor.device()
            ),
            Self::List(list) => f.debug_list().entries(list).finish(),
            Self::Map(map) => f.debug_map().entries(map).finish(),
            Self::Record(record) => Debug::fmt(record, f),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Int(value as i64)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<f32> for FieldValue {
    fn from(value: f32) -> Self {
        Self::Float(value as f64)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<DynamicImage> for FieldValue {
    fn from(image: DynamicImage) -> Self {
        Self::Image(image)
    }
}

impl From<Tensor> for FieldValue {
    fn from(tensor: Tensor) -> Self {
        Self::Tensor(tensor)
    }
}

impl From<Record> for FieldValue {
    fn from(record: Record) -> Self {
        Self::Record(Box::new(record))
    }
}

impl<T> From<Option<T>> for FieldValue
where
    T: Into<FieldValue>,
{
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::None, Into::into)
    }
}

impl<T> From<Vec<T>> for FieldValue
where
    T: Into<FieldValue>,
{
    fn from(list: Vec<T>) -> Self {
        Self::List(list.into_iter().map(Into::into).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_equality() {
        let lhs = FieldValue::from(vec![vec![1.0, 2.0], vec![3.0]]);
        let rhs = FieldValue::from(vec![vec![1.0, 2.0], vec![3.0]]);
        assert_eq!(lhs, rhs);
        assert_ne!(FieldValue::Int(1), FieldValue::Float(1.0));

        let tensor = FieldValue::Tensor(Tensor::of_slice(&[1i64, 2]));
        assert_eq!(tensor, FieldValue::Tensor(Tensor::of_slice(&[1i64, 2])));
        assert_ne!(tensor, FieldValue::Tensor(Tensor::of_slice(&[1i64, 3])));
        assert_ne!(tensor, FieldValue::Tensor(Tensor::of_slice(&[1f32, 2.])));
        assert_ne!(tensor, FieldValue::Tensor(Tensor::of_slice(&[1i64, 2, 3])));
    }

    #[test]
    fn list_accessors() {
        let value = FieldValue::from(vec![1i64, 2, 3]);
        assert_eq!(value.to_int_vec(), Some(vec![1, 2, 3]));
        assert_eq!(value.to_float_vec(), Some(vec![1.0, 2.0, 3.0]));
        assert!(value.to_str_vec().is_none());
        assert!(!value.is_record_list());
        assert_eq!(FieldValue::from(None::<i64>), FieldValue::None);
    }
}
