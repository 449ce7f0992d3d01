//! Semantic field types and their column metadata.

use crate::{common::*, value::FieldValue};

/// Column type of a flattened table schema.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Int64,
    Float64,
    Bool,
    String,
    Binary,
    List(Box<ColumnType>),
}

impl ColumnType {
    pub fn list_of(inner: ColumnType) -> Self {
        Self::List(Box::new(inner))
    }
}

impl Display for ColumnType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int64 => write!(f, "int64"),
            Self::Float64 => write!(f, "float64"),
            Self::Bool => write!(f, "bool"),
            Self::String => write!(f, "string"),
            Self::Binary => write!(f, "binary"),
            Self::List(inner) => write!(f, "list<{}>", inner),
        }
    }
}

impl FromStr for ColumnType {
    type Err = Error;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        let text = text.trim();
        let column = match text {
            "int64" => Self::Int64,
            "float64" => Self::Float64,
            "bool" => Self::Bool,
            "string" => Self::String,
            "binary" => Self::Binary,
            _ => {
                let inner = text
                    .strip_prefix("list<")
                    .and_then(|rest| rest.strip_suffix('>'))
                    .ok_or_else(|| {
                        DataModelError::validation("column type", format!("unknown column type '{}'", text))
                    })?;
                Self::list_of(inner.parse()?)
            }
        };
        Ok(column)
    }
}

impl Serialize for ColumnType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ColumnType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// The element class a tensor field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindClass {
    Int,
    Float,
    Bool,
    Any,
}

impl KindClass {
    pub fn of(kind: Kind) -> Self {
        match kind {
            Kind::Uint8 | Kind::Int8 | Kind::Int16 | Kind::Int | Kind::Int64 => Self::Int,
            Kind::Half | Kind::Float | Kind::Double | Kind::BFloat16 => Self::Float,
            Kind::Bool => Self::Bool,
            _ => Self::Any,
        }
    }

    pub fn matches(&self, kind: Kind) -> bool {
        *self == Self::Any || Self::of(kind) == *self
    }

    /// The kind used when a tensor has to be created from nothing, e.g. from an empty list.
    pub fn default_kind(&self) -> Kind {
        match self {
            Self::Int => Kind::Int64,
            Self::Bool => Kind::Bool,
            Self::Float | Self::Any => Kind::Float,
        }
    }
}

/// Dtype and rank contract of a tensor field for one unbatched sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorSpec {
    pub class: KindClass,
    pub rank: Option<usize>,
}

impl TensorSpec {
    pub const fn new(class: KindClass, rank: Option<usize>) -> Self {
        Self { class, rank }
    }

    pub const fn int(rank: usize) -> Self {
        Self::new(KindClass::Int, Some(rank))
    }

    pub const fn float(rank: usize) -> Self {
        Self::new(KindClass::Float, Some(rank))
    }

    pub const fn bool(rank: usize) -> Self {
        Self::new(KindClass::Bool, Some(rank))
    }

    /// Checks a tensor of a record batched `depth` times.
    pub fn check(&self, tensor: &Tensor, depth: usize) -> Result<(), String> {
        let kind = tensor.kind();
        if !self.class.matches(kind) {
            return Err(format!(
                "expect a tensor of {:?} dtype, but get {:?}",
                self.class, kind
            ));
        }
        if let Some(rank) = self.rank {
            let expect = rank + depth;
            let actual = tensor.dim();
            let empty_vector = tensor.numel() == 0 && actual <= expect;
            if actual != expect && !empty_vector {
                return Err(format!(
                    "expect a {}D tensor, but get a {}D tensor with shape {:?}",
                    expect,
                    actual,
                    tensor.size()
                ));
            }
        }
        Ok(())
    }
}

/// The semantic type of a record field.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldType {
    Int,
    Float,
    Bool,
    Str,
    /// A string restricted to the listed variants.
    Enum(&'static [&'static str]),
    Bytes,
    ListInt,
    ListFloat,
    ListBool,
    ListStr,
    /// A list of float lists, e.g. polygons.
    NestedListFloat,
    Image,
    Tensor(TensorSpec),
    /// A nested record identified by its record path.
    Record(&'static str),
    /// A list of nested records identified by their record path.
    ListRecord(&'static str),
}

impl FieldType {
    /// The column type derived from the field type alone.
    ///
    /// Nested records are expanded by the table schema instead, tensors and
    /// record lists have no column.
    pub fn column_type(&self) -> Option<ColumnType> {
        let column = match self {
            Self::Int => ColumnType::Int64,
            Self::Float => ColumnType::Float64,
            Self::Bool => ColumnType::Bool,
            Self::Str | Self::Enum(_) => ColumnType::String,
            Self::Bytes | Self::Image => ColumnType::Binary,
            Self::ListInt => ColumnType::list_of(ColumnType::Int64),
            Self::ListFloat => ColumnType::list_of(ColumnType::Float64),
            Self::ListBool => ColumnType::list_of(ColumnType::Bool),
            Self::ListStr => ColumnType::list_of(ColumnType::String),
            Self::NestedListFloat => {
                ColumnType::list_of(ColumnType::list_of(ColumnType::Float64))
            }
            Self::Tensor(_) | Self::Record(_) | Self::ListRecord(_) => return None,
        };
        Some(column)
    }

    pub fn record_path(&self) -> Option<&'static str> {
        match *self {
            Self::Record(path) | Self::ListRecord(path) => Some(path),
            _ => None,
        }
    }

    /// The element class used when a value of this field becomes a tensor.
    pub fn kind_class(&self) -> KindClass {
        match self {
            Self::Int | Self::ListInt => KindClass::Int,
            Self::Float | Self::ListFloat | Self::NestedListFloat | Self::Image => KindClass::Float,
            Self::Bool | Self::ListBool => KindClass::Bool,
            Self::Tensor(spec) => spec.class,
            _ => KindClass::Any,
        }
    }
}

/// How a field is combined when records are batched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchPolicy {
    Normal,
    /// The batched value is always `None`.
    Skip,
    /// Collapse to one value if all values are equal.
    Merge,
    /// Keep tensors as a list instead of stacking them.
    StackSkip,
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self::Normal
    }
}

/// Encoding of a field value inside a table row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCodec {
    /// Image content as PNG bytes.
    Png,
    /// Text content as gzip-compressed bytes.
    Gzip,
    /// A nested record as a JSON string.
    Json,
}

pub type DefaultFn = fn() -> Result<FieldValue>;

/// Declaration of one record field.
#[derive(Debug, Clone, Getters, CopyGetters)]
pub struct FieldSpec {
    #[getset(get_copy = "pub")]
    name: &'static str,
    #[getset(get_copy = "pub")]
    ty: FieldType,
    #[getset(get_copy = "pub")]
    optional: bool,
    #[getset(get_copy = "pub")]
    batch_policy: BatchPolicy,
    #[getset(get_copy = "pub")]
    codec: Option<RowCodec>,
    column: Option<ColumnType>,
    default: Option<DefaultFn>,
}

impl FieldSpec {
    pub fn new(name: &'static str, ty: FieldType) -> Self {
        let codec = match ty {
            FieldType::Image => Some(RowCodec::Png),
            _ => None,
        };
        Self {
            name,
            ty,
            optional: false,
            batch_policy: BatchPolicy::Normal,
            codec,
            column: None,
            default: None,
        }
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn default_with(mut self, default: DefaultFn) -> Self {
        self.default = Some(default);
        self
    }

    pub fn batch(mut self, policy: BatchPolicy) -> Self {
        self.batch_policy = policy;
        self
    }

    pub fn column(mut self, column: ColumnType) -> Self {
        self.column = Some(column);
        self
    }

    pub fn codec(mut self, codec: RowCodec) -> Self {
        self.codec = Some(codec);
        self
    }

    /// The explicitly declared column, which takes precedence over nested expansion.
    pub fn declared_column(&self) -> Option<&ColumnType> {
        self.column.as_ref()
    }

    pub fn default_value(&self) -> Option<Result<FieldValue>> {
        self.default.map(|default| default())
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_type_parse_and_display() {
        let column: ColumnType = "list<list<float64>>".parse().unwrap();
        assert_eq!(
            column,
            ColumnType::list_of(ColumnType::list_of(ColumnType::Float64))
        );
        assert_eq!(column.to_string(), "list<list<float64>>");
        assert_eq!(" binary ".parse::<ColumnType>().unwrap(), ColumnType::Binary);

        assert!("list<int64".parse::<ColumnType>().is_err());
        assert!("decimal".parse::<ColumnType>().is_err());
    }

    #[test]
    fn field_type_columns() {
        assert_eq!(FieldType::Int.column_type(), Some(ColumnType::Int64));
        assert_eq!(
            FieldType::ListStr.column_type(),
            Some(ColumnType::list_of(ColumnType::String))
        );
        assert_eq!(FieldType::Image.column_type(), Some(ColumnType::Binary));
        assert_eq!(FieldType::Tensor(TensorSpec::int(0)).column_type(), None);
        assert_eq!(FieldType::Record("generic.label.Label").column_type(), None);
    }

    #[test]
    fn tensor_spec_checks_rank_with_batch_depth() {
        let spec = TensorSpec::int(0);
        let scalar = Tensor::of_slice(&[1i64]).reshape(&[]);
        let vector = Tensor::of_slice(&[1i64, 2, 3]);

        assert!(spec.check(&scalar, 0).is_ok());
        assert!(spec.check(&vector, 0).is_err());
        assert!(spec.check(&vector, 1).is_ok());

        let floats = Tensor::of_slice(&[1f32]).reshape(&[]);
        let message = spec.check(&floats, 0).unwrap_err();
        assert!(message.contains("Float"));
    }
}
