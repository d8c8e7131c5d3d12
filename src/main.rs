use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    formpilot::cli::run().await
}
