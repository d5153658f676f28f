//! Background removal CLI binary

use anyhow::Result;
use nukki::cli;

#[tokio::main]
async fn main() -> Result<()> {
    cli::main().await?;
    Ok(())
}
