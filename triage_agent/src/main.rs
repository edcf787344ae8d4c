#[tokio::main]
async fn main() -> anyhow::Result<()> {
    triage_agent::cli::run().await
}
