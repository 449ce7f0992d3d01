//! Batching records of the same type.

use crate::{
    common::*,
    field::{BatchPolicy, FieldSpec},
    record::{BatchState, Record},
    value::FieldValue,
};

impl Record {
    /// Combines records of the same type into one batched record.
    ///
    /// Each field is combined by these rules, in order.
    ///
    /// 1. If any value is `None`, the batched value is `None`.
    /// 2. [BatchPolicy::Skip] fields become `None`.
    /// 3. [BatchPolicy::Merge] fields keep the single value if all values
    ///    are equal, otherwise the list of values.
    /// 4. Nested records are batched recursively.
    /// 5. Lists of records are batched position-wise, then the per-position
    ///    batches are batched again.
    /// 6. Tensors are stacked along a new leading dimension if their shapes
    ///    agree, otherwise kept as a list. [BatchPolicy::StackSkip] fields
    ///    are always kept as a list.
    /// 7. Other values are collected into a list.
    pub fn batched<R>(records: &[R]) -> Result<Record>
    where
        R: Borrow<Record>,
    {
        let first = records
            .first()
            .ok_or_else(|| {
                DataModelError::validation("records", "cannot batch an empty list of records")
            })?
            .borrow();
        let schema = first.schema();
        let depth = first.batch_depth();

        for record in records {
            let record = record.borrow();
            ensure!(
                record.schema().same_as(schema),
                DataModelError::validation(
                    "records",
                    format!(
                        "cannot batch '{}' with '{}'",
                        schema.path(),
                        record.schema().path()
                    )
                )
            );
            ensure!(
                !record.is_repeated(),
                DataModelError::illegal_state(format!(
                    "cannot batch repeated '{}' records",
                    schema.name()
                ))
            );
            ensure!(
                record.batch_depth() == depth,
                DataModelError::validation(
                    "records",
                    format!(
                        "cannot batch '{}' records of different batch depths",
                        schema.name()
                    )
                )
            );
        }

        let values: Vec<FieldValue> = schema
            .fields()
            .iter()
            .enumerate()
            .map(|(index, field)| {
                let column: Vec<&FieldValue> = records
                    .iter()
                    .map(|record| &record.borrow().values()[index])
                    .collect();
                batch_field(field, &column).with_context(|| {
                    format!(
                        "failed to batch field '{}' of '{}'",
                        field.name(),
                        schema.name()
                    )
                })
            })
            .try_collect()?;

        let mut batched = Record::from_parts(
            schema,
            values,
            BatchState::Batched {
                size: records.len() as i64,
                depth: depth + 1,
            },
        );
        batched.inherit_state(first);
        batched.validate()?;
        Ok(batched)
    }
}

fn batch_field(field: &FieldSpec, values: &[&FieldValue]) -> Result<FieldValue> {
    use FieldValue as V;

    let to_list = || V::List(values.iter().map(|&value| value.clone()).collect());

    if values.iter().any(|value| value.is_none()) {
        return Ok(V::None);
    }
    match field.batch_policy() {
        BatchPolicy::Skip => return Ok(V::None),
        BatchPolicy::Merge => {
            let first = values[0];
            let merged = if values.iter().all(|value| value.deep_eq(first)) {
                first.clone()
            } else {
                to_list()
            };
            return Ok(merged);
        }
        BatchPolicy::Normal | BatchPolicy::StackSkip => {}
    }

    let batched = match values[0] {
        V::Record(_) => {
            let records: Vec<&Record> = values
                .iter()
                .map(|value| {
                    value.as_record().ok_or_else(|| {
                        DataModelError::validation(field.name(), "a record mixed with plain values")
                    })
                })
                .try_collect()?;
            Record::batched(&records)?.into()
        }
        first if first.is_record_list() => batch_record_lists(field, values)?,
        V::Tensor(_) => {
            let tensors: Vec<&Tensor> = values
                .iter()
                .map(|value| {
                    value.as_tensor().ok_or_else(|| {
                        DataModelError::validation(field.name(), "a tensor mixed with plain values")
                    })
                })
                .try_collect()?;
            let stacked = match field.batch_policy() {
                BatchPolicy::StackSkip => None,
                _ => Tensor::f_stack_if_same_shape(&tensors)?,
            };
            stacked.map(V::Tensor).unwrap_or_else(to_list)
        }
        _ => to_list(),
    };
    Ok(batched)
}

/// Batches `[[a0, a1], [b0, b1]]` into `batched([batched([a0, b0]), batched([a1, b1])])`.
fn batch_record_lists(field: &FieldSpec, values: &[&FieldValue]) -> Result<FieldValue> {
    let lists: Vec<&[FieldValue]> = values
        .iter()
        .map(|value| {
            value.as_list().ok_or_else(|| {
                DataModelError::validation(field.name(), "a list of records mixed with plain values")
            })
        })
        .try_collect()?;

    let len = lists[0].len();
    if !lists.iter().all(|list| list.len() == len) {
        let lens = lists.iter().map(|list| list.len()).collect_vec();
        bail!(DataModelError::validation(
            field.name(),
            format!(
                "lists of records must have the same length to be batched, but get lengths {:?}",
                lens
            )
        ));
    }

    let per_position: Vec<Record> = (0..len)
        .map(|position| {
            let records: Vec<&Record> = lists
                .iter()
                .map(|list| {
                    list[position].as_record().ok_or_else(|| {
                        DataModelError::validation(
                            field.name(),
                            "a list mixing records and plain values",
                        )
                    })
                })
                .try_collect()?;
            Record::batched(&records)
                .with_context(|| format!("failed to batch records at position {}", position))
        })
        .try_collect()?;

    Ok(Record::batched(&per_position)?.into())
}
