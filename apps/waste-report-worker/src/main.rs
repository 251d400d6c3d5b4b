//! Waste Report Worker - Entry Point
//!
//! Answers waste report queries from the Redis stream.

#[tokio::main]
async fn main() -> eyre::Result<()> {
    waste_report_worker::run().await
}
