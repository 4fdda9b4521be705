//! `capkit show`: inspect stored module documents.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use tabled::{settings::Style, Table, Tabled};

use capkit_core::{Document, DocumentPath, ModuleData, ModuleName, UserId, UserProfile};
use capkit_store::file::read_document;
use capkit_store::FileStore;
use capkit_sync::ModuleSync;

use super::{open_store, with_module_type};
use crate::{CliEnv, ModuleArg};

/// Arguments for `capkit show`.
#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Workspace (user id) to inspect.
    pub uid: String,

    /// Module to decode; omit for an overview of every module.
    pub module: Option<ModuleArg>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl ShowArgs {
    pub fn run(self, env: &CliEnv) -> Result<()> {
        let store = open_store(env);
        let uid = UserId::from(self.uid.as_str());

        if let Some(ModuleArg(module)) = self.module {
            let stored = load(&store, &DocumentPath::module(&uid, module))?;
            let value = with_module_type!(module, T => decode_value::<T>(stored)?);
            println!("{}", serde_json::to_string_pretty(&value)?);
            return Ok(());
        }

        let rows = overview(&store, &uid)?;
        if self.json {
            println!("{}", serde_json::to_string_pretty(&rows)?);
            return Ok(());
        }

        match load(&store, &DocumentPath::profile(&uid))? {
            Some(document) => {
                let profile: UserProfile = serde_json::from_value(Value::Object(document))
                    .context("stored profile is malformed")?;
                println!("{} {} <{}>", "profile:".bold(), profile.name, profile.email);
            }
            None => println!("{} {}", "profile:".bold(), "none".dimmed()),
        }
        print_table(&rows);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct ModuleRow {
    module: ModuleName,
    stored: bool,
    fields: usize,
}

#[derive(Tabled)]
struct ModuleTableRow {
    #[tabled(rename = "module")]
    module: String,
    #[tabled(rename = "stored")]
    stored: String,
    #[tabled(rename = "fields")]
    fields: usize,
}

fn load(store: &FileStore, path: &DocumentPath) -> Result<Option<Document>> {
    let file = store.file_path(path)?;
    read_document(&file).with_context(|| format!("failed to read {path}"))
}

fn overview(store: &FileStore, uid: &UserId) -> Result<Vec<ModuleRow>> {
    ModuleName::ALL
        .into_iter()
        .map(|module| {
            let stored = load(store, &DocumentPath::module(uid, module))?;
            Ok(ModuleRow {
                module,
                stored: stored.is_some(),
                fields: stored.map_or(0, |doc| doc.len()),
            })
        })
        .collect()
}

/// Decode through the same read path a live session uses; a missing
/// document yields the module's initial value.
fn decode_value<T: ModuleData>(stored: Option<Document>) -> Result<Value> {
    let (sync, _mirror) = ModuleSync::<T>::for_data()?;
    let value = match stored {
        Some(document) => sync
            .decode(document)
            .with_context(|| format!("stored {} document is malformed", T::MODULE))?,
        None => T::initial(),
    };
    Ok(serde_json::to_value(value)?)
}

fn print_table(rows: &[ModuleRow]) {
    let table_rows: Vec<ModuleTableRow> = rows
        .iter()
        .map(|row| ModuleTableRow {
            module: row.module.to_string(),
            stored: if row.stored {
                "yes".green().to_string()
            } else {
                "no".dimmed().to_string()
            },
            fields: row.fields,
        })
        .collect();
    let mut table = Table::new(table_rows);
    table.with(Style::rounded());
    println!("{table}");
}
