//! `todolist check` - compare the store with its Secret mirror.
//!
//! The mirror is expected to equal the store after every successful publish.
//! A difference usually means the last publish failed and no event has
//! arrived since.

use anyhow::{bail, Result};
use serde::Serialize;
use tabled::Tabled;

use todolist_core::model::StoreMap;

use crate::client::TodoClient;
use crate::output::{self, OutputFormat};

#[derive(Debug, PartialEq, Eq, Serialize, Tabled)]
struct DriftRow {
    #[tabled(rename = "Task")]
    task: String,
    #[tabled(rename = "Store")]
    store: String,
    #[tabled(rename = "Mirror")]
    mirror: String,
}

#[derive(Serialize)]
struct CheckReport<'a> {
    in_sync: bool,
    store_items: usize,
    mirror_items: usize,
    drift: &'a [DriftRow],
}

pub async fn execute(client: &TodoClient, format: OutputFormat) -> Result<()> {
    let store = client.read_store().await?;
    let mirror = client.read_mirror().await?;
    let drift = diff(&store, &mirror);

    match format {
        OutputFormat::Json => output::print_json(&CheckReport {
            in_sync: drift.is_empty(),
            store_items: store.len(),
            mirror_items: mirror.len(),
            drift: &drift,
        })?,
        OutputFormat::Table if drift.is_empty() => output::print_success(&format!(
            "Secret {} matches the store ({} items)",
            client.secret_ref(),
            store.len()
        )),
        OutputFormat::Table => {
            output::print_warning(&format!(
                "Secret {} differs from the store",
                client.secret_ref()
            ));
            output::print_list(&drift, format)?;
        }
    }

    if !drift.is_empty() {
        bail!("{} task(s) out of sync", drift.len());
    }
    Ok(())
}

/// Tasks whose status differs between the two maps, ordered by task.
fn diff(store: &StoreMap, mirror: &StoreMap) -> Vec<DriftRow> {
    let mut tasks: Vec<&str> = store.tasks().chain(mirror.tasks()).collect();
    tasks.sort_unstable();
    tasks.dedup();

    tasks
        .into_iter()
        .filter_map(|task| {
            let in_store = store.get(task).map(|item| item.status.as_str());
            let in_mirror = mirror.get(task).map(|item| item.status.as_str());
            if in_store == in_mirror {
                return None;
            }
            Some(DriftRow {
                task: task.to_string(),
                store: in_store.unwrap_or("<absent>").to_string(),
                mirror: in_mirror.unwrap_or("<absent>").to_string(),
            })
        })
        .collect()
}
