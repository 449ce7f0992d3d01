use anyhow::{Context, Result};
use clap::Parser;
use data_model::{
    config::parse_device,
    registry::{self, with_registry},
    Config, Record, RecordSchema,
};
use log::info;
use prettytable::{cell, row, Table};
use std::path::{Path, PathBuf};

const MAX_VALUE_WIDTH: usize = 72;

#[derive(Debug, Clone, Parser)]
/// Inspect record types and records
enum Opts {
    /// list registered record types
    Types,
    /// print the flattened column schema of a record type
    Schema {
        /// record path, e.g. generic.label.Label
        path: String,
    },
    /// convert a JSON record to a table row
    Row {
        /// record path, e.g. data_instance.document.DocumentInstance
        path: String,
        /// JSON file holding the record
        json_file: PathBuf,
        /// configuration file
        #[clap(long)]
        config_file: Option<PathBuf>,
        /// load external content before conversion
        #[clap(long)]
        load: bool,
    },
    /// load a JSON record and print its tensor form
    Tensor {
        /// record path of the raw form
        path: String,
        /// JSON file holding the record
        json_file: PathBuf,
        /// configuration file
        #[clap(long)]
        config_file: Option<PathBuf>,
        /// target device, e.g. cpu or cuda:0
        #[clap(long)]
        device: Option<String>,
    },
}

fn main() -> Result<()> {
    pretty_env_logger::init();

    match Opts::parse() {
        Opts::Types => {
            types()?;
        }
        Opts::Schema { path } => {
            schema(&path)?;
        }
        Opts::Row {
            path,
            json_file,
            config_file,
            load,
        } => {
            let config = open_config(config_file.as_deref())?;
            to_row(&config, &path, json_file, load)?;
        }
        Opts::Tensor {
            path,
            json_file,
            config_file,
            device,
        } => {
            let mut config = open_config(config_file.as_deref())?;
            if let Some(device) = device {
                config.device = parse_device(&device)?;
            }
            to_tensor(&config, &path, json_file)?;
        }
    }

    Ok(())
}

fn open_config(config_file: Option<&Path>) -> Result<Config> {
    let config = match config_file {
        Some(path) => Config::open(path)
            .with_context(|| format!("failed to open config file '{}'", path.display()))?,
        None => Config::default(),
    };
    Ok(config)
}

fn types() -> Result<()> {
    with_registry(|registry| -> Result<_> {
        registry.validate()?;
        info!("{} record types are registered", registry.len());

        let mut table = Table::new();
        table.add_row(row!["path", "form", "counterpart", "fields"]);
        registry.schemas().for_each(|schema| {
            table.add_row(row![
                schema.path(),
                format!("{:?}", schema.form()),
                schema.counterpart_path(),
                schema.field_names().collect::<Vec<_>>().join(", "),
            ]);
        });
        table.printstd();
        Ok(())
    })
}

fn schema(path: &str) -> Result<()> {
    let schema = registry::resolve(path)?;
    let columns = schema.table_schema_flattened()?;

    let mut table = Table::new();
    table.add_row(row!["column", "type"]);
    columns.iter().for_each(|(name, column)| {
        table.add_row(row![name, column]);
    });
    table.printstd();
    Ok(())
}

fn to_row(config: &Config, path: &str, json_file: impl AsRef<Path>, load: bool) -> Result<()> {
    let schema = registry::resolve(path)?;
    let mut record = read_record(schema, json_file)?;
    if load {
        record.load_with(&config.loader())?;
    }
    let row = record.to_row(true)?;
    let columns = schema.table_schema_flattened()?;

    let mut table = Table::new();
    table.add_row(row!["column", "type", "value"]);
    row.iter().for_each(|(name, value)| {
        let column = columns
            .get(name)
            .map(|column| column.to_string())
            .unwrap_or_default();
        table.add_row(row![name, column, summarize(value)]);
    });
    table.printstd();
    Ok(())
}

fn to_tensor(config: &Config, path: &str, json_file: impl AsRef<Path>) -> Result<()> {
    let schema = registry::resolve(path)?;
    let mut record = read_record(schema, json_file)?;
    record.load_with(&config.loader())?;
    let mut tensor = record.to_tensor()?;
    tensor
        .to_device(config.device)
        .with_context(|| format!("cannot move '{}' to {:?}", path, config.device))?;

    let mut table = Table::new();
    table.add_row(row!["field", "value"]);
    tensor.iter().for_each(|(field, value)| {
        table.add_row(row![field.name(), summarize(value)]);
    });
    table.printstd();
    Ok(())
}

fn read_record(schema: &'static RecordSchema, json_file: impl AsRef<Path>) -> Result<Record> {
    let json_file = json_file.as_ref();
    let text = std::fs::read_to_string(json_file)
        .with_context(|| format!("failed to read '{}'", json_file.display()))?;
    let json: serde_json::Value = serde_json::from_str(&text)?;
    Record::model_validate(schema, &json)
}

fn summarize(value: impl std::fmt::Debug) -> String {
    let text = format!("{:?}", value);
    if text.chars().count() <= MAX_VALUE_WIDTH {
        text
    } else {
        let prefix: String = text.chars().take(MAX_VALUE_WIDTH - 3).collect();
        format!("{}...", prefix)
    }
}
