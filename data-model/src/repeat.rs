//! Row-wise repetition of batched records and its inverse.

use crate::{
    common::*,
    field::{FieldSpec, FieldType},
    record::{BatchState, Record},
    value::FieldValue,
};

impl Record {
    /// Repeats row `i` of every field `repeat_indices[i]` times.
    ///
    /// The record must be batched with a batch size equal to the number of
    /// counts. Excluded fields are left untouched. Calling it on an already
    /// repeated record does nothing.
    pub fn repeat(&mut self, repeat_indices: &[i64], exclude_fields: &[&str]) -> Result<&mut Self> {
        if self.is_repeated() {
            return Ok(self);
        }
        let batch_size = self.batch_size()?;
        ensure!(
            repeat_indices.len() as i64 == batch_size,
            DataModelError::validation(
                "repeat_indices",
                format!(
                    "expect {} repeat counts for '{}', but get {}",
                    batch_size,
                    self.name(),
                    repeat_indices.len()
                )
            )
        );
        ensure!(
            repeat_indices.iter().all(|&count| count >= 0),
            DataModelError::validation("repeat_indices", "repeat counts must be non-negative")
        );
        if let Some(unknown) = exclude_fields
            .iter()
            .find(|name| self.schema().field_index(name).is_none())
        {
            bail!(DataModelError::validation(
                *unknown,
                format!("cannot exclude an unknown field of '{}'", self.name())
            ));
        }

        let schema = self.schema();
        let mut values = self.values().to_vec();
        for (field, value) in izip!(schema.fields(), &mut values) {
            if exclude_fields.contains(&field.name()) {
                continue;
            }
            *value = repeat_value(field, value, repeat_indices).with_context(|| {
                format!(
                    "failed to repeat field '{}' of '{}'",
                    field.name(),
                    schema.name()
                )
            })?;
        }

        let depth = self.batch_depth();
        self.replace_values(values);
        self.set_batch_state(BatchState::Repeated {
            size: repeat_indices.iter().sum(),
            depth,
            repeat_indices: repeat_indices.to_vec(),
            exclude_fields: exclude_fields.iter().map(|name| name.to_string()).collect(),
        });
        Ok(self)
    }

    /// Keeps the first row of every repeated group, restoring the batch size
    /// before [Record::repeat]. Calling it on a record that is not repeated
    /// does nothing.
    pub fn undo_repeat(&mut self) -> Result<&mut Self> {
        let (depth, repeat_indices, exclude_fields) = match self.batch_state() {
            BatchState::Repeated {
                depth,
                repeat_indices,
                exclude_fields,
                ..
            } => (*depth, repeat_indices.clone(), exclude_fields.clone()),
            _ => return Ok(self),
        };

        let schema = self.schema();
        let mut values = self.values().to_vec();
        for (field, value) in izip!(schema.fields(), &mut values) {
            if exclude_fields.iter().any(|name| name == field.name()) {
                continue;
            }
            *value = undo_repeat_value(value, &repeat_indices).with_context(|| {
                format!(
                    "failed to undo repeat of field '{}' of '{}'",
                    field.name(),
                    schema.name()
                )
            })?;
        }

        self.replace_values(values);
        self.set_batch_state(BatchState::Batched {
            size: repeat_indices.len() as i64,
            depth,
        });
        Ok(self)
    }
}

fn repeat_value(field: &FieldSpec, value: &FieldValue, repeat_indices: &[i64]) -> Result<FieldValue> {
    use FieldValue as V;

    if matches!(field.ty(), FieldType::ListRecord(_)) || value.is_record_list() {
        bail!(DataModelError::unsupported(
            field.name(),
            "lists of records cannot be repeated"
        ));
    }

    let repeated = match value {
        V::Record(child) => {
            let mut child = (**child).clone();
            child.repeat(repeat_indices, &[])?;
            child.into()
        }
        V::List(list) if list.is_empty() => V::List(vec![]),
        V::List(list) => {
            ensure!(
                list.len() == repeat_indices.len(),
                DataModelError::validation(
                    field.name(),
                    format!(
                        "list length ({}) doesn't match the number of repeat counts ({})",
                        list.len(),
                        repeat_indices.len()
                    )
                )
            );
            let items = izip!(list, repeat_indices)
                .flat_map(|(item, &count)| iter::repeat(item).take(count as usize))
                .cloned()
                .collect();
            V::List(items)
        }
        V::Tensor(tensor) => V::Tensor(tensor.f_repeat_rows(repeat_indices)?),
        other => other.clone(),
    };
    Ok(repeated)
}

fn undo_repeat_value(value: &FieldValue, repeat_indices: &[i64]) -> Result<FieldValue> {
    use FieldValue as V;

    let restored = match value {
        V::Record(child) => {
            let mut child = (**child).clone();
            child.undo_repeat()?;
            child.into()
        }
        V::List(list) if list.is_empty() => V::List(vec![]),
        V::List(list) => {
            let total: i64 = repeat_indices.iter().sum();
            ensure!(
                list.len() as i64 == total,
                "list length ({}) doesn't match the sum of repeat counts ({})",
                list.len(),
                total
            );
            let mut offset = 0;
            let items = repeat_indices
                .iter()
                .map(|&count| {
                    let first = if count > 0 {
                        list[offset].clone()
                    } else {
                        V::None
                    };
                    offset += count as usize;
                    first
                })
                .collect();
            V::List(items)
        }
        V::Tensor(tensor) => V::Tensor(tensor.f_first_of_groups(repeat_indices)?),
        other => other.clone(),
    };
    Ok(restored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        field::{BatchPolicy, FieldType},
        schema::RecordSchema,
        types::label::Label,
    };

    #[test]
    fn repeat_requires_matching_counts() {
        let labels = vec![
            Label::new(1, "a").unwrap().to_tensor().unwrap(),
            Label::new(2, "b").unwrap().to_tensor().unwrap(),
        ];
        let mut batched = Record::batched(&labels).unwrap();

        assert!(batched.repeat(&[1], &[]).is_err());
        assert!(batched.repeat(&[1, -1], &[]).is_err());
        assert!(!batched.is_repeated());

        batched.repeat(&[0, 3], &["name"]).unwrap();
        assert_eq!(batched.batch_size().unwrap(), 3);
        let value: Vec<i64> = batched.get_tensor("value").unwrap().f_flat_values().unwrap();
        assert_eq!(value, vec![2, 2, 2]);
        assert_eq!(batched.get("name").unwrap(), &FieldValue::from(vec!["a", "b"]));

        batched.undo_repeat().unwrap();
        assert_eq!(batched.batch_size().unwrap(), 2);
        let value: Vec<i64> = batched.get_tensor("value").unwrap().f_flat_values().unwrap();
        assert_eq!(value, vec![0, 2]);
    }

    #[test]
    fn repeat_unbatched_is_illegal() {
        let mut label = Label::new(1, "a").unwrap().to_tensor().unwrap();
        let err = label.repeat(&[1], &[]).unwrap_err();
        assert!(matches!(
            DataModelError::find(&err),
            Some(DataModelError::IllegalState(_))
        ));
    }

    #[test]
    fn empty_lists_are_kept() {
        let schema = RecordSchema::raw("test.repeat", "Tagged")
            .counterpart("test.repeat.TensorTagged")
            .field(FieldSpec::new("score", FieldType::Float))
            .field(FieldSpec::new("tags", FieldType::ListStr).batch(BatchPolicy::Merge))
            .build_static()
            .unwrap();
        let records: Vec<Record> = [0.5, 1.5]
            .iter()
            .map(|&score| {
                Record::new(
                    schema,
                    [
                        ("score", FieldValue::from(score)),
                        ("tags", FieldValue::List(vec![])),
                    ],
                )
                .unwrap()
            })
            .collect();
        let mut batched = Record::batched(&records).unwrap();
        assert_eq!(batched.get("tags").unwrap(), &FieldValue::List(vec![]));

        batched.repeat(&[1, 2], &[]).unwrap();
        assert_eq!(batched.get("tags").unwrap(), &FieldValue::List(vec![]));
        assert_eq!(batched.get("score").unwrap(), &FieldValue::from(vec![0.5, 1.5, 1.5]));

        batched.undo_repeat().unwrap();
        assert_eq!(batched.get("tags").unwrap(), &FieldValue::List(vec![]));
        assert_eq!(batched.get("score").unwrap(), &FieldValue::from(vec![0.5, 1.5]));
    }
}
