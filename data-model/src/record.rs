//! Record instances and their state.

use crate::{
    common::*,
    field::{FieldSpec, FieldType, KindClass},
    schema::{RecordForm, RecordSchema},
    value::FieldValue,
};

/// Whether lazily fetched content is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loaded,
}

/// The batching state of a record.
///
/// Legal transitions are `Unbatched -> Batched` by batching,
/// `Batched -> Repeated` by repeat and `Repeated -> Batched` by undoing the
/// repeat. Batching an already batched record increases the depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchState {
    Unbatched,
    Batched {
        size: i64,
        depth: usize,
    },
    Repeated {
        size: i64,
        depth: usize,
        repeat_indices: Vec<i64>,
        exclude_fields: Vec<String>,
    },
}

impl BatchState {
    pub fn depth(&self) -> usize {
        match *self {
            Self::Unbatched => 0,
            Self::Batched { depth, .. } | Self::Repeated { depth, .. } => depth,
        }
    }

    pub fn size(&self) -> Option<i64> {
        match *self {
            Self::Unbatched => None,
            Self::Batched { size, .. } | Self::Repeated { size, .. } => Some(size),
        }
    }
}

/// An instance of a [RecordSchema].
#[derive(Clone)]
pub struct Record {
    schema: &'static RecordSchema,
    values: Vec<FieldValue>,
    load_state: LoadState,
    batch_state: BatchState,
    device: Option<Device>,
}

impl Record {
    /// Creates an unbatched record from named field values.
    ///
    /// Missing fields take their declared default, or `None` if the field is
    /// optional. Unknown and duplicated names are rejected.
    pub fn new<K, V, I>(schema: &'static RecordSchema, fields: I) -> Result<Self>
    where
        K: AsRef<str>,
        V: Into<FieldValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut values: Vec<Option<FieldValue>> = vec![None; schema.fields().len()];

        for (name, value) in fields {
            let name = name.as_ref();
            let index = schema.field_index(name).ok_or_else(|| {
                DataModelError::validation(
                    name,
                    format!("'{}' has no such field", schema.name()),
                )
            })?;
            let slot = &mut values[index];
            if slot.is_some() {
                return Err(DataModelError::validation(name, "the field is given twice").into());
            }
            *slot = Some(value.into());
        }

        let values: Vec<FieldValue> = izip!(schema.fields(), values)
            .map(|(field, value)| -> Result<_> {
                let value = match value {
                    Some(FieldValue::None) | None => fill_missing(field)?,
                    Some(value) => coerce(field.ty(), value),
                };
                Ok(value)
            })
            .try_collect()
            .with_context(|| format!("failed to construct '{}'", schema.name()))?;

        let mut record = Self::from_parts(schema, values, BatchState::Unbatched);
        if let Some(normalizer) = schema.normalizer() {
            normalizer(&mut record)
                .with_context(|| format!("failed to normalize '{}'", schema.name()))?;
        }
        record.validate()?;
        Ok(record)
    }

    /// Creates a record with every field left to its default.
    pub fn empty(schema: &'static RecordSchema) -> Result<Self> {
        Self::new(schema, iter::empty::<(&str, FieldValue)>())
    }

    /// Assembles a record without validation.
    pub(crate) fn from_parts(
        schema: &'static RecordSchema,
        values: Vec<FieldValue>,
        batch_state: BatchState,
    ) -> Self {
        Self {
            schema,
            values,
            load_state: LoadState::Unloaded,
            batch_state,
            device: None,
        }
    }

    pub fn schema(&self) -> &'static RecordSchema {
        self.schema
    }

    pub fn name(&self) -> &'static str {
        self.schema.name()
    }

    pub fn form(&self) -> RecordForm {
        self.schema.form()
    }

    pub fn is_tensor(&self) -> bool {
        self.schema.is_tensor()
    }

    pub fn is_raw(&self) -> bool {
        !self.is_tensor()
    }

    pub fn is_batched(&self) -> bool {
        self.batch_state != BatchState::Unbatched
    }

    pub fn is_repeated(&self) -> bool {
        matches!(self.batch_state, BatchState::Repeated { .. })
    }

    pub fn is_loaded(&self) -> bool {
        self.load_state == LoadState::Loaded
    }

    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    pub fn batch_state(&self) -> &BatchState {
        &self.batch_state
    }

    /// The number of samples of a batched record.
    pub fn batch_size(&self) -> Result<i64> {
        self.batch_state.size().ok_or_else(|| {
            DataModelError::illegal_state(format!(
                "'{}' is not batched and has no batch size",
                self.name()
            ))
            .into()
        })
    }

    /// How many times the record has been batched.
    pub fn batch_depth(&self) -> usize {
        self.batch_state.depth()
    }

    pub fn repeat_indices(&self) -> Option<&[i64]> {
        match &self.batch_state {
            BatchState::Repeated { repeat_indices, .. } => Some(repeat_indices),
            _ => None,
        }
    }

    /// The device the record was last moved to.
    pub fn device(&self) -> Option<Device> {
        self.device
    }

    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    /// Iterates over field declarations paired with their values.
    pub fn iter(&self) -> impl Iterator<Item = (&FieldSpec, &FieldValue)> {
        izip!(self.schema.fields(), &self.values)
    }

    pub fn get(&self, name: &str) -> Result<&FieldValue> {
        let index = self.index_of(name)?;
        Ok(&self.values[index])
    }

    pub fn get_mut(&mut self, name: &str) -> Result<&mut FieldValue> {
        let index = self.index_of(name)?;
        Ok(&mut self.values[index])
    }

    /// Replaces a field value after checking it against the field type.
    pub fn set(&mut self, name: &str, value: impl Into<FieldValue>) -> Result<()> {
        let index = self.index_of(name)?;
        let field = &self.schema.fields()[index];
        let value = coerce(field.ty(), value.into());
        check_value(field, &value, self.batch_depth())
            .with_context(|| format!("failed to set field '{}' of '{}'", name, self.name()))?;
        self.values[index] = value;
        Ok(())
    }

    pub fn get_int(&self, name: &str) -> Result<i64> {
        let value = self.get(name)?;
        value
            .as_int()
            .ok_or_else(|| self.type_error(name, "an integer", value))
    }

    pub fn get_float(&self, name: &str) -> Result<f64> {
        let value = self.get(name)?;
        value
            .as_float()
            .ok_or_else(|| self.type_error(name, "a float", value))
    }

    pub fn get_str(&self, name: &str) -> Result<&str> {
        let value = self.get(name)?;
        value
            .as_str()
            .ok_or_else(|| self.type_error(name, "a string", value))
    }

    pub fn get_tensor(&self, name: &str) -> Result<&Tensor> {
        let value = self.get(name)?;
        value
            .as_tensor()
            .ok_or_else(|| self.type_error(name, "a tensor", value))
    }

    pub fn get_image(&self, name: &str) -> Result<&DynamicImage> {
        let value = self.get(name)?;
        value
            .as_image()
            .ok_or_else(|| self.type_error(name, "an image", value))
    }

    pub fn get_record(&self, name: &str) -> Result<&Record> {
        let value = self.get(name)?;
        value
            .as_record()
            .ok_or_else(|| self.type_error(name, "a record", value))
    }

    /// Returns `None` if the field is unset.
    pub fn get_opt_record(&self, name: &str) -> Result<Option<&Record>> {
        match self.get(name)? {
            FieldValue::None => Ok(None),
            _ => self.get_record(name).map(Some),
        }
    }

    /// Checks every field against its declaration, then runs the custom
    /// validator of the schema.
    pub fn validate(&self) -> Result<()> {
        let depth = self.batch_depth();
        for (field, value) in self.iter() {
            check_value(field, value, depth).with_context(|| {
                format!("invalid field '{}' of '{}'", field.name(), self.name())
            })?;
        }
        if let Some(validator) = self.schema.validator() {
            validator(self).with_context(|| format!("invalid '{}'", self.name()))?;
        }
        Ok(())
    }

    /// Deep equality over schema, batch state and field values.
    pub fn deep_eq(&self, other: &Record) -> bool {
        self.schema.same_as(other.schema)
            && self.batch_state == other.batch_state
            && izip!(&self.values, &other.values).all(|(lhs, rhs)| lhs.deep_eq(rhs))
    }

    pub(crate) fn values_mut(&mut self) -> &mut [FieldValue] {
        &mut self.values
    }

    pub(crate) fn into_values(self) -> Vec<FieldValue> {
        self.values
    }

    pub(crate) fn replace_values(&mut self, values: Vec<FieldValue>) {
        debug_assert_eq!(values.len(), self.values.len());
        self.values = values;
    }

    pub(crate) fn set_batch_state(&mut self, state: BatchState) {
        self.batch_state = state;
    }

    pub(crate) fn set_load_state(&mut self, state: LoadState) {
        self.load_state = state;
    }

    pub(crate) fn set_device(&mut self, device: Device) {
        self.device = Some(device);
    }

    pub(crate) fn inherit_state(&mut self, other: &Record) {
        self.load_state = other.load_state;
        self.device = other.device;
    }

    fn index_of(&self, name: &str) -> Result<usize> {
        self.schema.field_index(name).ok_or_else(|| {
            DataModelError::validation(name, format!("'{}' has no such field", self.name())).into()
        })
    }

    fn type_error(&self, name: &str, expect: &str, value: &FieldValue) -> Error {
        DataModelError::validation(
            name,
            format!(
                "expect {} in '{}', but get {}",
                expect,
                self.name(),
                value.type_name()
            ),
        )
        .into()
    }
}

impl PartialEq for Record {
    fn eq(&self, other: &Self) -> bool {
        self.deep_eq(other)
    }
}

impl Debug for Record {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct(self.name());
        self.iter().for_each(|(field, value)| {
            debug.field(field.name(), value);
        });
        if self.is_batched() {
            debug.field("batch_state", &self.batch_state);
        }
        debug.finish()
    }
}

fn fill_missing(field: &FieldSpec) -> Result<FieldValue> {
    if let Some(default) = field.default_value() {
        return default.with_context(|| format!("failed to build the default of '{}'", field.name()));
    }
    ensure!(
        field.optional(),
        DataModelError::validation(field.name(), "the field is required")
    );
    Ok(FieldValue::None)
}

fn coerce(ty: FieldType, value: FieldValue) -> FieldValue {
    use FieldValue as V;

    match (ty, value) {
        (FieldType::Float, V::Int(value)) => V::Float(value as f64),
        (FieldType::ListFloat, V::List(list)) => V::List(
            list.into_iter()
                .map(|item| coerce(FieldType::Float, item))
                .collect(),
        ),
        (FieldType::NestedListFloat, V::List(list)) => V::List(
            list.into_iter()
                .map(|item| coerce(FieldType::ListFloat, item))
                .collect(),
        ),
        (_, value) => value,
    }
}

fn check_value(field: &FieldSpec, value: &FieldValue, depth: usize) -> Result<()> {
    let invalid = |reason: String| -> Error { DataModelError::validation(field.name(), reason).into() };
    let mismatch = |expect: &str| invalid(format!("expect {}, but get {}", expect, value.type_name()));

    if value.is_none() {
        ensure!(
            field.optional() || depth > 0,
            DataModelError::validation(field.name(), "the field is required")
        );
        return Ok(());
    }

    match field.ty() {
        FieldType::Record(path) => match value {
            FieldValue::Record(record) => check_record_path(record, path).map_err(invalid),
            _ => Err(mismatch("a record")),
        },
        FieldType::ListRecord(path) => match value {
            FieldValue::List(list) => list.iter().try_for_each(|item| match item {
                FieldValue::Record(record) => check_record_path(record, path).map_err(invalid),
                _ => Err(mismatch("a list of records")),
            }),
            FieldValue::Record(record) if depth > 0 => {
                check_record_path(record, path).map_err(invalid)
            }
            _ => Err(mismatch("a list of records")),
        },
        FieldType::Tensor(spec) => match value {
            FieldValue::Tensor(tensor) => spec.check(tensor, depth).map_err(invalid),
            FieldValue::List(list) => check_tensor_leaves(list, spec.class).map_err(invalid),
            _ => Err(mismatch("a tensor")),
        },
        // batched raw values are lists of samples
        _ if depth > 0 => Ok(()),
        ty => check_raw(ty, value).map_err(|expect| mismatch(&expect)),
    }
}

fn check_record_path(record: &Record, path: &str) -> Result<(), String> {
    if record.schema().path() == path {
        Ok(())
    } else {
        Err(format!(
            "expect a '{}' record, but get '{}'",
            path,
            record.schema().path()
        ))
    }
}

fn check_tensor_leaves(list: &[FieldValue], class: KindClass) -> Result<(), String> {
    list.iter().try_for_each(|item| match item {
        FieldValue::Tensor(tensor) if class.matches(tensor.kind()) => Ok(()),
        FieldValue::Tensor(tensor) => Err(format!(
            "expect tensors of {:?} dtype, but get {:?}",
            class,
            tensor.kind()
        )),
        FieldValue::List(inner) => check_tensor_leaves(inner, class),
        FieldValue::None => Ok(()),
        other => Err(format!("expect a list of tensors, but get {}", other.type_name())),
    })
}

/// Returns the expected type on mismatch.
fn check_raw(ty: FieldType, value: &FieldValue) -> Result<(), String> {
    use FieldValue as V;

    let list_of = |check: fn(&FieldValue) -> bool| match value {
        V::List(list) => list.iter().all(check),
        _ => false,
    };
    let (ok, expect) = match ty {
        FieldType::Int => (matches!(value, V::Int(_)), "an integer"),
        FieldType::Float => (matches!(value, V::Float(_)), "a float"),
        FieldType::Bool => (matches!(value, V::Bool(_)), "a bool"),
        FieldType::Str => (matches!(value, V::Str(_)), "a string"),
        FieldType::Enum(variants) => match value {
            V::Str(text) if variants.contains(&text.as_str()) => (true, ""),
            _ => return Err(format!("one of {:?}", variants)),
        },
        FieldType::Bytes => (matches!(value, V::Bytes(_)), "bytes"),
        FieldType::ListInt => (list_of(|item| matches!(item, V::Int(_))), "a list of integers"),
        FieldType::ListFloat => (list_of(|item| matches!(item, V::Float(_))), "a list of floats"),
        FieldType::ListBool => (list_of(|item| matches!(item, V::Bool(_))), "a list of bools"),
        FieldType::ListStr => (list_of(|item| matches!(item, V::Str(_))), "a list of strings"),
        FieldType::NestedListFloat => (
            list_of(|item| {
                matches!(item, V::List(inner) if inner.iter().all(|item| matches!(item, V::Float(_))))
            }),
            "a list of float lists",
        ),
        FieldType::Image => (matches!(value, V::Image(_)), "an image"),
        FieldType::Tensor(_) | FieldType::Record(_) | FieldType::ListRecord(_) => (true, ""),
    };
    if ok {
        Ok(())
    } else {
        Err(expect.to_owned())
    }
}
