#[tokio::main]
async fn main() -> anyhow::Result<()> {
    venue_display_lib::run().await
}
