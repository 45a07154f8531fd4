use crate::logi;
use anyhow::{Context, Result};
use std::path::Path;
use tokio::fs;
use tokio::process::Command;

pub async fn ensure_output_dir(dir: &Path) -> Result<()> {
    if fs::metadata(dir).await.is_err() {
        fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create output dir {}", dir.display()))?;
        logi(format!("Created directory: {}", dir.display()));
    }
    Ok(())
}

/// True when `binary -version` runs and exits cleanly.
pub async fn check_encoder(binary: &str) -> bool {
    match Command::new(binary).arg("-version").output().await {
        Ok(output) => output.status.success(),
        Err(_) => false,
    }
}
