//! The registry resolving record paths to schemas.

use crate::{common::*, field::FieldType, schema::RecordSchema, types};

static REGISTRY: Lazy<RwLock<Registry>> = Lazy::new(|| {
    let mut registry = Registry::default();
    types::register_builtins(&mut registry);
    RwLock::new(registry)
});

/// Resolves a `<module>.<name>` path in the global registry.
pub fn resolve(path: &str) -> Result<&'static RecordSchema, ResolutionError> {
    with_registry(|registry| registry.resolve(path))
}

/// Registers a raw schema and its tensor counterpart in the global registry.
pub fn register_pair(raw: &'static RecordSchema, tensor: &'static RecordSchema) -> Result<()> {
    let mut registry = REGISTRY
        .write()
        .map_err(|_| format_err!("the record registry is poisoned"))?;
    registry.register_pair(raw, tensor)
}

/// Runs a closure on the global registry.
pub fn with_registry<T, F>(f: F) -> T
where
    F: FnOnce(&Registry) -> T,
{
    match REGISTRY.read() {
        Ok(registry) => f(&registry),
        Err(poisoned) => f(&poisoned.into_inner()),
    }
}

/// Record schemas grouped by module.
#[derive(Debug, Default)]
pub struct Registry {
    modules: IndexMap<&'static str, IndexMap<&'static str, &'static RecordSchema>>,
}

impl Registry {
    /// Inserts a schema, replacing a previous schema with the same path.
    pub fn insert(&mut self, schema: &'static RecordSchema) {
        let prev = self
            .modules
            .entry(schema.module())
            .or_default()
            .insert(schema.name(), schema);
        if prev.is_some() {
            warn!("record '{}' is registered twice", schema.path());
        }
    }

    /// Inserts a pair of schemas after checking they point at each other and
    /// declare the same fields in the same order.
    pub fn register_pair(
        &mut self,
        raw: &'static RecordSchema,
        tensor: &'static RecordSchema,
    ) -> Result<()> {
        check_pair(raw, tensor)?;
        self.insert(raw);
        self.insert(tensor);
        Ok(())
    }

    pub fn resolve(&self, path: &str) -> Result<&'static RecordSchema, ResolutionError> {
        let (module, class) = path
            .rsplit_once('.')
            .filter(|(module, class)| !module.is_empty() && !class.is_empty())
            .ok_or_else(|| ResolutionError::MalformedPath(path.to_owned()))?;
        let schemas = self
            .modules
            .get(module)
            .ok_or_else(|| ResolutionError::ModuleNotFound {
                path: path.to_owned(),
                module: module.to_owned(),
            })?;
        let schema = schemas
            .get(class)
            .ok_or_else(|| ResolutionError::ClassNotFound {
                module: module.to_owned(),
                class: class.to_owned(),
            })?;
        Ok(*schema)
    }

    pub fn schemas(&self) -> impl Iterator<Item = &'static RecordSchema> + '_ {
        self.modules
            .values()
            .flat_map(|schemas| schemas.values().copied())
    }

    pub fn len(&self) -> usize {
        self.modules.values().map(|schemas| schemas.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Checks that every schema has a registered counterpart pointing back at
    /// it and that every nested record type resolves.
    pub fn validate(&self) -> Result<()> {
        for schema in self.schemas() {
            let counterpart = self.resolve(schema.counterpart_path())?;
            check_pair_any_order(schema, counterpart)?;

            for field in schema.fields() {
                if let Some(path) = field.ty().record_path() {
                    let nested = self.resolve(path).with_context(|| {
                        format!(
                            "field '{}' of '{}' refers to an unknown record",
                            field.name(),
                            schema.path()
                        )
                    })?;
                    ensure!(
                        nested.form() == schema.form(),
                        "field '{}' of '{}' refers to '{}' in the other form",
                        field.name(),
                        schema.path(),
                        nested.path()
                    );
                }
            }
        }
        Ok(())
    }
}

fn check_pair_any_order(lhs: &RecordSchema, rhs: &RecordSchema) -> Result<()> {
    if lhs.is_tensor() {
        check_pair(rhs, lhs)
    } else {
        check_pair(lhs, rhs)
    }
}

fn check_pair(raw: &RecordSchema, tensor: &RecordSchema) -> Result<()> {
    ensure!(
        !raw.is_tensor() && tensor.is_tensor(),
        "expect a raw and a tensor schema, but get '{}' and '{}'",
        raw.path(),
        tensor.path()
    );
    ensure!(
        raw.counterpart_path() == tensor.path() && tensor.counterpart_path() == raw.path(),
        "records '{}' and '{}' do not point at each other",
        raw.path(),
        tensor.path()
    );
    let raw_names = raw.field_names().collect_vec();
    let tensor_names = tensor.field_names().collect_vec();
    ensure!(
        raw_names == tensor_names,
        "fields of '{}' {:?} differ from fields of '{}' {:?}",
        raw.path(),
        raw_names,
        tensor.path(),
        tensor_names
    );
    for (raw_field, tensor_field) in izip!(raw.fields(), tensor.fields()) {
        if let (FieldType::Record(_), ty) | (FieldType::ListRecord(_), ty) =
            (raw_field.ty(), tensor_field.ty())
        {
            ensure!(
                ty.record_path().is_some(),
                "field '{}' is a record in '{}' but not in '{}'",
                raw_field.name(),
                raw.path(),
                tensor.path()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_builtins() {
        let schema = resolve("generic.label.Label").unwrap();
        assert_eq!(schema.name(), "Label");
        let tensor = schema.counterpart_schema().unwrap();
        assert_eq!(tensor.path(), "generic.label.TensorLabel");
        assert!(std::ptr::eq(
            tensor.counterpart_schema().unwrap(),
            schema
        ));
    }

    #[test]
    fn resolution_errors() {
        assert!(matches!(
            resolve("Label"),
            Err(ResolutionError::MalformedPath(_))
        ));
        assert!(matches!(
            resolve("generic.nothing.Label"),
            Err(ResolutionError::ModuleNotFound { .. })
        ));
        assert!(matches!(
            resolve("generic.label.Nothing"),
            Err(ResolutionError::ClassNotFound { .. })
        ));
    }

    #[test]
    fn builtins_are_consistent() {
        with_registry(|registry| registry.validate()).unwrap();
    }
}
