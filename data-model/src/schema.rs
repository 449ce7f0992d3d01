//! Record schemas and their raw/tensor pairing.

use crate::{
    common::*,
    field::{FieldSpec, FieldType},
    load::ResourceHooks,
    record::Record,
    registry,
    table::TableSchema,
};

/// The representation a schema describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordForm {
    Raw,
    Tensor,
}

pub type ValidatorFn = fn(&Record) -> Result<()>;
pub type NormalizerFn = fn(&mut Record) -> Result<()>;

/// The declaration of a record type in one form.
///
/// Schemas live for the whole program, either as lazy statics or leaked
/// boxes, and are referred to by their `<module>.<name>` path.
pub struct RecordSchema {
    module: &'static str,
    name: &'static str,
    path: String,
    form: RecordForm,
    counterpart_path: &'static str,
    fields: Vec<FieldSpec>,
    hooks: Option<&'static dyn ResourceHooks>,
    validator: Option<ValidatorFn>,
    normalizer: Option<NormalizerFn>,
    counterpart: OnceCell<&'static RecordSchema>,
    pub(crate) table_schema: OnceCell<TableSchema>,
    pub(crate) table_schema_flattened: OnceCell<IndexMap<String, crate::field::ColumnType>>,
}

impl RecordSchema {
    pub fn raw(module: &'static str, name: &'static str) -> RecordSchemaBuilder {
        RecordSchemaBuilder::new(module, name, RecordForm::Raw)
    }

    pub fn tensor(module: &'static str, name: &'static str) -> RecordSchemaBuilder {
        RecordSchemaBuilder::new(module, name, RecordForm::Tensor)
    }

    pub fn module(&self) -> &'static str {
        self.module
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The `<module>.<name>` path.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn form(&self) -> RecordForm {
        self.form
    }

    pub fn is_tensor(&self) -> bool {
        self.form == RecordForm::Tensor
    }

    pub fn counterpart_path(&self) -> &'static str {
        self.counterpart_path
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name() == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name() == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|field| field.name())
    }

    pub fn hooks(&self) -> Option<&'static dyn ResourceHooks> {
        self.hooks
    }

    pub(crate) fn validator(&self) -> Option<ValidatorFn> {
        self.validator
    }

    pub(crate) fn normalizer(&self) -> Option<NormalizerFn> {
        self.normalizer
    }

    /// Resolves the schema of the other form through the registry.
    ///
    /// The resolved schema is cached after the first call.
    pub fn counterpart_schema(&self) -> Result<&'static RecordSchema> {
        let schema = self.counterpart.get_or_try_init(|| {
            registry::resolve(self.counterpart_path)
                .map_err(DataModelError::from)
                .with_context(|| format!("failed to resolve the counterpart of '{}'", self.path))
        })?;
        Ok(*schema)
    }

    /// Resolves the schema of a nested record field.
    pub(crate) fn nested_schema(field: &FieldSpec) -> Result<Option<&'static RecordSchema>> {
        let path = match field.ty().record_path() {
            Some(path) => path,
            None => return Ok(None),
        };
        let schema = registry::resolve(path)
            .map_err(DataModelError::from)
            .with_context(|| format!("failed to resolve the record type of '{}'", field.name()))?;
        Ok(Some(schema))
    }

    pub fn same_as(&self, other: &RecordSchema) -> bool {
        std::ptr::eq(self, other) || self.path == other.path
    }
}

impl Debug for RecordSchema {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordSchema")
            .field("path", &self.path)
            .field("form", &self.form)
            .field("counterpart", &self.counterpart_path)
            .field("fields", &self.field_names().collect_vec())
            .finish()
    }
}

pub struct RecordSchemaBuilder {
    module: &'static str,
    name: &'static str,
    form: RecordForm,
    counterpart_path: Option<&'static str>,
    fields: Vec<FieldSpec>,
    hooks: Option<&'static dyn ResourceHooks>,
    validator: Option<ValidatorFn>,
    normalizer: Option<NormalizerFn>,
}

impl RecordSchemaBuilder {
    fn new(module: &'static str, name: &'static str, form: RecordForm) -> Self {
        Self {
            module,
            name,
            form,
            counterpart_path: None,
            fields: vec![],
            hooks: None,
            validator: None,
            normalizer: None,
        }
    }

    pub fn counterpart(mut self, path: &'static str) -> Self {
        self.counterpart_path = Some(path);
        self
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    pub fn hooks(mut self, hooks: &'static dyn ResourceHooks) -> Self {
        self.hooks = Some(hooks);
        self
    }

    /// Adds a check run after the field-wise validation.
    pub fn validator(mut self, validator: ValidatorFn) -> Self {
        self.validator = Some(validator);
        self
    }

    /// Adds a fix-up run on construction before validation.
    pub fn normalizer(mut self, normalizer: NormalizerFn) -> Self {
        self.normalizer = Some(normalizer);
        self
    }

    pub fn build(self) -> Result<RecordSchema> {
        let Self {
            module,
            name,
            form,
            counterpart_path,
            fields,
            hooks,
            validator,
            normalizer,
        } = self;
        let path = format!("{}.{}", module, name);

        ensure!(!module.is_empty(), "module of record '{}' must not be empty", name);
        ensure!(
            !name.is_empty() && !name.contains('.'),
            "invalid record name '{}'",
            name
        );
        let counterpart_path = counterpart_path
            .ok_or_else(|| format_err!("record '{}' has no counterpart path", path))?;
        {
            let mut names = HashSet::new();
            for field in &fields {
                ensure!(
                    names.insert(field.name()),
                    "duplicated field '{}' in record '{}'",
                    field.name(),
                    path
                );
                if form == RecordForm::Raw {
                    ensure!(
                        !matches!(field.ty(), FieldType::Tensor(_)),
                        "raw record '{}' cannot declare the tensor field '{}'",
                        path,
                        field.name()
                    );
                }
            }
        }

        Ok(RecordSchema {
            module,
            name,
            path,
            form,
            counterpart_path,
            fields,
            hooks,
            validator,
            normalizer,
            counterpart: OnceCell::new(),
            table_schema: OnceCell::new(),
            table_schema_flattened: OnceCell::new(),
        })
    }

    /// Builds the schema and leaks it to obtain a static reference.
    pub fn build_static(self) -> Result<&'static RecordSchema> {
        Ok(Box::leak(Box::new(self.build()?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::TensorSpec;

    #[test]
    fn builder_rejects_bad_declarations() {
        let duplicated = RecordSchema::raw("test.schema", "Dup")
            .counterpart("test.schema.TensorDup")
            .field(FieldSpec::new("value", FieldType::Int))
            .field(FieldSpec::new("value", FieldType::Str))
            .build();
        assert!(duplicated.is_err());

        let no_counterpart = RecordSchema::raw("test.schema", "Lonely")
            .field(FieldSpec::new("value", FieldType::Int))
            .build();
        assert!(no_counterpart.is_err());

        let raw_tensor = RecordSchema::raw("test.schema", "Bad")
            .counterpart("test.schema.TensorBad")
            .field(FieldSpec::new("value", FieldType::Tensor(TensorSpec::int(0))))
            .build();
        assert!(raw_tensor.is_err());
    }

    #[test]
    fn field_lookup() {
        let schema = RecordSchema::tensor("test.schema", "TensorPoint")
            .counterpart("test.schema.Point")
            .field(FieldSpec::new("x", FieldType::Tensor(TensorSpec::float(0))))
            .field(FieldSpec::new("y", FieldType::Tensor(TensorSpec::float(0))))
            .build()
            .unwrap();
        assert_eq!(schema.path(), "test.schema.TensorPoint");
        assert_eq!(schema.field_index("y"), Some(1));
        assert!(schema.field("z").is_none());
        assert!(schema.is_tensor());
    }
}
