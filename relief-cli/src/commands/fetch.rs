use anyhow::{Context, Result};
use relief::ReliefProtocolBuilder;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;

pub fn run(
    encoding: &str,
    url: &str,
    output: PathBuf,
    elevation: i32,
    timeout: u64,
) -> Result<()> {
    let protocol = ReliefProtocolBuilder::from_env()
        .encoding(encoding)
        .threshold(elevation)
        .timeout_secs(timeout)
        .build()
        .context("Failed to create relief protocol")?;

    // Plain tile URLs are routed through the protocol's scheme
    let request_url = if url.starts_with(&format!("{}://", protocol.scheme())) {
        url.to_string()
    } else {
        protocol.tile_url(url, None)
    };

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;

    let tile = runtime.block_on(async {
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                canceller.cancel();
            }
        });

        protocol.load(&request_url, &token).await
    })?;

    match tile {
        Some(bytes) => {
            std::fs::write(&output, bytes).context("Failed to write output file")?;
            println!("Output written to: {}", output.display());
        }
        None => eprintln!("No tile available: {}", url),
    }

    Ok(())
}
