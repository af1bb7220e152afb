use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> { churn_gateway::run().await }
