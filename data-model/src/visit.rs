use crate::{common::*, field::FieldSpec, record::Record, value::FieldValue};

/// Per-field handler of a recursive record walk.
pub(crate) trait FieldVisitor {
    /// The verb used in error contexts, e.g. "load".
    const OPERATION: &'static str;

    fn visit_record(&mut self, record: &mut Record) -> Result<()>;

    /// Called on lists whose first element is a record.
    fn visit_record_list(&mut self, field: &FieldSpec, _list: &mut [FieldValue]) -> Result<()> {
        Err(DataModelError::unsupported(
            field.name(),
            format!("cannot {} a list of records", Self::OPERATION),
        )
        .into())
    }

    fn visit_value(&mut self, field: &FieldSpec, value: &mut FieldValue) -> Result<()>;
}

/// Dispatches every field of a record to the visitor.
///
/// Failures are wrapped with the field and record names.
pub(crate) fn walk_mut<V>(record: &mut Record, visitor: &mut V) -> Result<()>
where
    V: FieldVisitor,
{
    let schema = record.schema();
    for (field, value) in izip!(schema.fields(), record.values_mut()) {
        let result = match value {
            FieldValue::Record(child) => visitor.visit_record(child),
            FieldValue::List(list) if matches!(list.first(), Some(FieldValue::Record(_))) => {
                visitor.visit_record_list(field, list)
            }
            other => visitor.visit_value(field, other),
        };
        result.with_context(|| {
            format!(
                "failed to {} field '{}' of '{}'",
                V::OPERATION,
                field.name(),
                schema.name()
            )
        })?;
    }
    Ok(())
}
