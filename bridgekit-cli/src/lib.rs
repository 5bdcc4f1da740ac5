//! Command-line front end for a bridgekit entry store.

use anyhow::{Context, Result};
use bridgekit_model::{Entity, Entry};
use bridgekit_storage::{EntryStore, StoreLocation};
use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};
use std::collections::{BTreeMap, HashMap};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "bridgekit")]
#[command(about = "Inspect and link entries in a bridgekit entry store")]
pub struct Args {
    /// Path to the entry store, or ":memory:"
    #[arg(long, default_value = "bridgekit.db")]
    pub db: StoreLocation,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Link a local entity to a remote entity
    Link {
        #[arg(long)]
        local: String,

        #[arg(long)]
        remote: String,

        /// Entry id; derived from the linked pair when omitted
        #[arg(long)]
        id: Option<String>,

        /// JSON payload stored with the entry
        #[arg(long, default_value = "null", value_parser = parse_json)]
        data: Value,

        /// Property of the local entity, as key=value
        #[arg(long = "local-prop", value_parser = parse_prop)]
        local_props: Vec<(String, Value)>,

        /// Property of the remote entity, as key=value
        #[arg(long = "remote-prop", value_parser = parse_prop)]
        remote_props: Vec<(String, Value)>,
    },

    /// Print the entry with the given id
    Get { id: String },

    /// Print entries grouped by local id
    ByLocal {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Print entries grouped by remote id
    ByRemote {
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// Print the number of stored entries
    Count,
}

fn parse_json(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {e}"))
}

/// Parses `key=value`. The value is read as JSON when it parses, otherwise
/// kept as a plain string.
fn parse_prop(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    if key.is_empty() {
        return Err(format!("empty property name in `{raw}`"));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((key.to_string(), value))
}

fn entity(id: &str, props: &[(String, Value)]) -> Entity {
    let properties: Map<String, Value> = props.iter().cloned().collect();
    Entity::with_properties(id, properties)
}

/// Orders groups by key and entries by id so output is stable.
fn sorted(grouped: HashMap<String, Vec<Entry>>) -> BTreeMap<String, Vec<Entry>> {
    grouped
        .into_iter()
        .map(|(key, mut entries)| {
            entries.sort_by(|a, b| a.id.cmp(&b.id));
            (key, entries)
        })
        .collect()
}

/// Executes `args` and returns the pretty-printed JSON result.
pub fn run(args: &Args) -> Result<String> {
    let store = EntryStore::open_location(&args.db)
        .with_context(|| format!("failed to open entry store at {}", args.db))?;

    let output = match &args.command {
        Command::Link {
            local,
            remote,
            id,
            data,
            local_props,
            remote_props,
        } => {
            let entry = store
                .link(
                    entity(local, local_props),
                    entity(remote, remote_props),
                    data.clone(),
                    id.as_deref(),
                )
                .context("failed to link entities")?;
            info!("Linked {} <-> {} as {}", local, remote, entry.id);
            serde_json::to_value(&entry)?
        }
        Command::Get { id } => {
            let entry = store
                .get_entry_by_id(id)
                .with_context(|| format!("failed to look up entry {id}"))?;
            serde_json::to_value(entry)?
        }
        Command::ByLocal { ids } => {
            let grouped = store
                .get_entries_by_local_ids(ids.as_slice())
                .context("failed to look up entries by local id")?;
            serde_json::to_value(sorted(grouped))?
        }
        Command::ByRemote { ids } => {
            let grouped = store
                .get_entries_by_remote_ids(ids.as_slice())
                .context("failed to look up entries by remote id")?;
            serde_json::to_value(sorted(grouped))?
        }
        Command::Count => json!({ "count": store.count()? }),
    };

    Ok(serde_json::to_string_pretty(&output)?)
}
