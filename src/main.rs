/// The entry point of the application.
/// Initializes logging and runs the panel, handling any initialization or runtime errors.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    chatpane::run().await
}
