// modules
mod ai;
mod constants;
pub mod error;
mod logger;
mod panel;
mod settings;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::mpsc;

use ai::interaction::chat_completion::ChatState;
use ai::traits::chat::ChatResponse;
use logger::setup_logger;
use settings::Settings;

/// Capacity of the relay-to-panel notification channel. Streamed fragments are
/// small and the panel drains continuously, so this never fills in practice.
const CHANNEL_CAPACITY: usize = 1000;

/// Loads settings, wires the request relay to the panel and runs the panel
/// until the user quits.
pub async fn run() -> anyhow::Result<()> {
    setup_logger().context("failed to initialize logger")?;

    let settings = Settings::load().context("failed to load settings")?;
    log::info!(
        "starting chatpane with protocol {} against {} (model {})",
        settings.protocol,
        settings.api_url,
        settings.model
    );

    let (tx, rx) = mpsc::channel::<Arc<ChatResponse>>(CHANNEL_CAPACITY);
    let state = ChatState::new(settings.clone(), tx);

    panel::run(state, rx, settings)
        .await
        .context("panel terminated with an error")
}
