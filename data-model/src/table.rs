//! Flattened columnar rows of records.

use crate::{
    common::*,
    encoding,
    field::{ColumnType, FieldSpec, FieldType, RowCodec},
    record::Record,
    schema::RecordSchema,
    value::FieldValue,
};

/// A flat row keyed by column name.
pub type Row = IndexMap<String, FieldValue>;

const SEPARATOR: &str = "_";

/// A column or a nested table of one field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaNode {
    Column(ColumnType),
    Nested(TableSchema),
}

/// The nested column layout of a record type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableSchema {
    nodes: IndexMap<String, SchemaNode>,
}

impl TableSchema {
    pub fn nodes(&self) -> &IndexMap<String, SchemaNode> {
        &self.nodes
    }

    /// Collapses nested tables into `parent_child` column names.
    pub fn flatten(&self) -> IndexMap<String, ColumnType> {
        let mut columns = IndexMap::new();
        self.flatten_into("", &mut columns);
        columns
    }

    fn flatten_into(&self, prefix: &str, columns: &mut IndexMap<String, ColumnType>) {
        for (key, node) in &self.nodes {
            let name = join_key(prefix, key);
            match node {
                SchemaNode::Column(column) => {
                    if columns.insert(name.clone(), column.clone()).is_some() {
                        warn!("column '{}' appears more than once in a flattened schema", name);
                    }
                }
                SchemaNode::Nested(nested) => nested.flatten_into(&name, columns),
            }
        }
    }

    fn derive(schema: &RecordSchema) -> Result<Self> {
        if schema.is_tensor() {
            return Ok(schema.counterpart_schema()?.table_schema()?.clone());
        }

        let mut nodes = IndexMap::new();
        for field in schema.fields() {
            let node = Self::derive_node(field).with_context(|| {
                format!(
                    "failed to derive the column of field '{}' of '{}'",
                    field.name(),
                    schema.name()
                )
            })?;
            match node {
                Some(node) => {
                    nodes.insert(field.name().to_owned(), node);
                }
                None => debug!(
                    "field '{}' of '{}' has no column and is left out of the table",
                    field.name(),
                    schema.name()
                ),
            }
        }
        Ok(Self { nodes })
    }

    fn derive_node(field: &FieldSpec) -> Result<Option<SchemaNode>> {
        if let Some(column) = field.declared_column() {
            return Ok(Some(SchemaNode::Column(column.clone())));
        }
        if let FieldType::Record(_) = field.ty() {
            if let Some(nested) = RecordSchema::nested_schema(field)? {
                return Ok(Some(SchemaNode::Nested(nested.table_schema()?.clone())));
            }
        }
        Ok(field.ty().column_type().map(SchemaNode::Column))
    }
}

impl RecordSchema {
    /// The nested table layout, derived once per schema.
    ///
    /// Tensor schemas share the layout of their raw counterpart.
    pub fn table_schema(&self) -> Result<&TableSchema> {
        self.table_schema
            .get_or_try_init(|| TableSchema::derive(self))
            .with_context(|| format!("failed to derive the table schema of '{}'", self.name()))
    }

    /// Column names and types of the flattened table layout.
    pub fn table_schema_flattened(&self) -> Result<&IndexMap<String, ColumnType>> {
        self.table_schema_flattened
            .get_or_try_init(|| Ok(self.table_schema()?.flatten()))
    }
}

impl Record {
    pub fn table_schema(&self) -> Result<&TableSchema> {
        self.schema().table_schema()
    }

    pub fn table_schema_flattened(&self) -> Result<&IndexMap<String, ColumnType>> {
        self.schema().table_schema_flattened()
    }

    /// Flattens an unbatched record into a row of table columns.
    ///
    /// Tensor records are converted to raw first. Fields without a column are
    /// dropped, so are `None` values unless `include_none` is set.
    pub fn to_row(&self, include_none: bool) -> Result<Row> {
        ensure!(
            !self.is_batched(),
            DataModelError::illegal_state(format!(
                "cannot convert batched '{}' to a row",
                self.name()
            ))
        );
        let raw;
        let record = if self.is_tensor() {
            raw = self.to_raw()?;
            &raw
        } else {
            self
        };

        let table = record.table_schema()?;
        let mut row = Row::new();
        flatten_record(record, table, "", &mut row)?;
        if !include_none {
            row.retain(|_, value| !value.is_none());
        }
        Ok(row)
    }

    /// Rebuilds a record from a row.
    ///
    /// Missing columns are read as `None`. A nested record whose columns are
    /// all `None` becomes `None`, or the field default if it has one.
    pub fn from_row(schema: &'static RecordSchema, row: &Row) -> Result<Record> {
        let raw_schema = if schema.is_tensor() {
            schema.counterpart_schema()?
        } else {
            schema
        };
        let table = raw_schema.table_schema()?;

        let flattened = raw_schema.table_schema_flattened()?;
        row.keys()
            .filter(|key| !flattened.contains_key(key.as_str()))
            .for_each(|key| debug!("column '{}' is not in '{}'", key, raw_schema.name()));

        let fields = unflatten_fields(raw_schema, table, "", row)?;
        let record = Record::new(raw_schema, fields)
            .with_context(|| format!("failed to rebuild '{}' from a row", raw_schema.name()))?;

        if schema.is_tensor() {
            record.to_tensor()
        } else {
            Ok(record)
        }
    }
}

fn join_key(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_owned()
    } else {
        format!("{}{}{}", prefix, SEPARATOR, key)
    }
}

fn flatten_record(record: &Record, table: &TableSchema, prefix: &str, row: &mut Row) -> Result<()> {
    for (key, node) in table.nodes() {
        let name = join_key(prefix, key);
        let field = record
            .schema()
            .field(key)
            .ok_or_else(|| format_err!("'{}' has no field '{}'", record.name(), key))?;
        let value = record.get(key)?;

        let result = match node {
            SchemaNode::Column(_) => encode_cell(field, value).map(|cell| {
                row.insert(name.clone(), cell);
            }),
            SchemaNode::Nested(nested) => match value {
                FieldValue::Record(child) => flatten_record(child, nested, &name, row),
                FieldValue::None => {
                    let mut columns = IndexMap::new();
                    nested.flatten_into(&name, &mut columns);
                    columns.into_iter().for_each(|(column, _)| {
                        row.insert(column, FieldValue::None);
                    });
                    Ok(())
                }
                other => Err(DataModelError::validation(
                    field.name(),
                    format!("expect a record, but get {}", other.type_name()),
                )
                .into()),
            },
        };
        result.with_context(|| {
            format!(
                "failed to flatten field '{}' of '{}'",
                field.name(),
                record.name()
            )
        })?;
    }
    Ok(())
}

fn unflatten_fields(
    schema: &'static RecordSchema,
    table: &TableSchema,
    prefix: &str,
    row: &Row,
) -> Result<Vec<(&'static str, FieldValue)>> {
    let mut fields = vec![];

    for (key, node) in table.nodes() {
        let name = join_key(prefix, key);
        let field = schema
            .field(key)
            .ok_or_else(|| format_err!("'{}' has no field '{}'", schema.name(), key))?;

        let value = match node {
            SchemaNode::Column(_) => {
                let cell = row.get(&name).cloned().unwrap_or_default();
                decode_cell(field, cell)
            }
            SchemaNode::Nested(nested) => unflatten_nested(field, nested, &name, row),
        }
        .with_context(|| {
            format!(
                "failed to unflatten field '{}' of '{}'",
                field.name(),
                schema.name()
            )
        })?;

        if value.is_none() && field.has_default() {
            continue;
        }
        fields.push((field.name(), value));
    }

    Ok(fields)
}

fn unflatten_nested(
    field: &FieldSpec,
    table: &TableSchema,
    prefix: &str,
    row: &Row,
) -> Result<FieldValue> {
    let schema = RecordSchema::nested_schema(field)?
        .ok_or_else(|| format_err!("field '{}' is not a record", field.name()))?;
    let fields = unflatten_fields(schema, table, prefix, row)?;
    if fields.iter().all(|(_, value)| value.is_none()) {
        return Ok(FieldValue::None);
    }
    Ok(Record::new(schema, fields)?.into())
}

fn encode_cell(field: &FieldSpec, value: &FieldValue) -> Result<FieldValue> {
    let cell = match (field.codec(), value) {
        (_, FieldValue::None) => FieldValue::None,
        (Some(RowCodec::Png), FieldValue::Image(image)) => {
            FieldValue::Bytes(encoding::encode_png(image)?)
        }
        (Some(RowCodec::Gzip), FieldValue::Str(text)) => {
            FieldValue::Bytes(encoding::compress_string(text)?)
        }
        (Some(RowCodec::Json), FieldValue::Record(record)) => {
            FieldValue::Str(record.to_json_string()?)
        }
        (_, value) => value.clone(),
    };
    Ok(cell)
}

fn decode_cell(field: &FieldSpec, cell: FieldValue) -> Result<FieldValue> {
    let value = match (field.codec(), cell) {
        (Some(RowCodec::Png), FieldValue::Bytes(bytes)) => {
            FieldValue::Image(encoding::decode_image(&bytes)?)
        }
        (Some(RowCodec::Gzip), FieldValue::Bytes(bytes)) => {
            FieldValue::Str(encoding::decompress_string(&bytes)?)
        }
        (Some(RowCodec::Json), FieldValue::Str(text)) => {
            let schema = RecordSchema::nested_schema(field)?
                .ok_or_else(|| format_err!("field '{}' is not a record", field.name()))?;
            Record::from_json_str(schema, &text)?.into()
        }
        (_, cell) => cell,
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{bounding_box::BoundingBox, label::Label};

    #[test]
    fn flattened_label_schema() {
        let columns = Label::schema().table_schema_flattened().unwrap();
        let names = columns.keys().map(|key| key.as_str()).collect_vec();
        assert_eq!(names, vec!["value", "name"]);
        assert_eq!(columns["value"], ColumnType::Int64);
        assert_eq!(columns["name"], ColumnType::String);

        let tensor_columns = Label::tensor_schema().table_schema_flattened().unwrap();
        assert_eq!(columns, tensor_columns);
    }

    #[test]
    fn row_round_trip() {
        let bbox = BoundingBox::new([10.0, 20.0, 30.0, 40.0], "xywh").unwrap();
        let row = bbox.to_row(true).unwrap();
        assert_eq!(row["mode"], FieldValue::from("xywh"));

        let restored = Record::from_row(BoundingBox::schema(), &row).unwrap();
        assert_eq!(restored, bbox);
        assert_eq!(restored.to_row(true).unwrap(), row);
    }

    #[test]
    fn batched_record_has_no_row() {
        let label = Label::new(1, "a").unwrap();
        let batched = Record::batched(&[&label, &label]).unwrap();
        assert!(batched.to_row(true).is_err());
    }
}
