//! CLI subcommands.

pub mod check;
pub mod list;
pub mod mirror;

use serde::Serialize;
use tabled::Tabled;

use todolist_core::model::StoreMap;

use crate::output;

/// One todo as shown by `list` and `mirror`.
#[derive(Debug, Serialize, Tabled)]
pub struct TodoRow {
    #[tabled(rename = "Task")]
    task: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Table rows carry colored status; JSON rows the raw value.
pub fn rows(map: &StoreMap, format: output::OutputFormat) -> Vec<TodoRow> {
    map.iter()
        .map(|item| TodoRow {
            task: item.task.clone(),
            status: match format {
                output::OutputFormat::Table => output::status_cell(&item.status),
                output::OutputFormat::Json => item.status.clone(),
            },
        })
        .collect()
}
