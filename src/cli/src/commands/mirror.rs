//! `todolist mirror` - show the todo map mirrored into the Secret.

use anyhow::Result;

use super::rows;
use crate::client::TodoClient;
use crate::output::{self, OutputFormat};

pub async fn execute(client: &TodoClient, format: OutputFormat) -> Result<()> {
    let map = client.read_mirror().await?;

    if format == OutputFormat::Table {
        output::print_header(&format!(
            "Secret {} ({} items)",
            client.secret_ref(),
            map.len()
        ));
    }
    output::print_list(&rows(&map, format), format)
}
