use anyhow::Result;
use tokio::io::{stdin, stdout};
use tower_lsp::{LspService, Server};

use crate::lsp::backend::Backend;
use crate::Config;

/// Start the LSP server over stdio
pub async fn serve(config: Config) -> Result<()> {
    log::info!(
        "Starting mdx-ls (theme {}, debounce {:?}, persistence {})",
        config.theme,
        config.debounce,
        if config.storage_path.is_some() { "on" } else { "off" }
    );
    if let Some(path) = &config.project_config_path {
        log::info!("Project config: {}", path.display());
    }

    let (service, socket) =
        LspService::build(move |client| Backend::new(client, config.clone())).finish();

    Server::new(stdin(), stdout(), socket).serve(service).await;

    Ok(())
}
