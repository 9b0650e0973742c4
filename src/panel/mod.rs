//! Terminal chat panel built on ratatui.

mod app;
mod highlight;
mod markdown;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::ai::interaction::chat_completion::ChatState;
use crate::ai::traits::chat::ChatResponse;
use crate::error::Result;
use crate::settings::Settings;

use app::App;

/// Takes over the terminal and runs the panel until the user quits. The
/// terminal is restored on the way out, including when the panel errors.
pub async fn run(
    state: Arc<ChatState>,
    rx: mpsc::Receiver<Arc<ChatResponse>>,
    settings: Settings,
) -> Result<()> {
    let mut terminal = ratatui::try_init()?;
    let result = App::new(state, &settings).run(&mut terminal, rx).await;
    ratatui::restore();
    result
}
