//! `todolist list` - show the durable todo map.

use anyhow::Result;

use super::rows;
use crate::client::TodoClient;
use crate::output::{self, OutputFormat};

pub async fn execute(client: &TodoClient, format: OutputFormat) -> Result<()> {
    let map = client.read_store().await?;

    if format == OutputFormat::Table {
        output::print_header(&format!(
            "Store {} ({} items)",
            client.config().reconciler.store_key,
            map.len()
        ));
    }
    output::print_list(&rows(&map, format), format)
}
