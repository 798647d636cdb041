//! Application orchestrator: wires the hub and the server together.

use std::sync::Arc;

use chathub_server::{ChatServer, HtmlRenderer, Hub, JsonRenderer, Renderer};
use tokio_util::sync::CancellationToken;

use crate::config::{Config, RendererKind};

/// Runs the server until Ctrl-C or until the accept loop fails.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();

    let renderer: Arc<dyn Renderer> = match config.renderer {
        RendererKind::Html => Arc::new(HtmlRenderer),
        RendererKind::Json => Arc::new(JsonRenderer),
    };

    // -- Hub --
    let (hub, handle) = Hub::new(config.hub_config(), renderer);
    let hub_task = tokio::spawn(hub.run(cancel.clone()));

    // -- WS server --
    let server = ChatServer::new(config.server_config(), handle, cancel.clone());
    let server_run = Arc::clone(&server);
    let mut server_task = tokio::spawn(async move { server_run.run().await });

    tracing::info!(ws_path = %config.ws_path, "chathub ready");

    let finished = tokio::select! {
        _ = tokio::signal::ctrl_c() => None,
        result = &mut server_task => Some(result),
    };
    let outcome = match finished {
        Some(result) => result,
        None => {
            tracing::info!("SIGINT received, shutting down");
            server.shutdown();
            server_task.await
        }
    };

    // -- Graceful shutdown --
    cancel.cancel();
    hub_task.await?;
    outcome??;
    Ok(())
}
