use std::path::Path;

use anyhow::{bail, Context};
use scheme_core::SchemeConfig;

pub fn init(path: &str, scheme: &str) -> anyhow::Result<()> {
    let output = write_scaffold(Path::new(path), scheme)?;
    println!("✓ Generated {}", output.display());
    Ok(())
}

fn write_scaffold(dir: &Path, scheme: &str) -> anyhow::Result<std::path::PathBuf> {
    let output = dir.join("scheme.toml");
    if output.exists() {
        bail!("{} already exists", output.display());
    }
    let config = SchemeConfig::scaffold(scheme);
    std::fs::write(&output, config.to_toml_string()?)
        .with_context(|| format!("failed to write {}", output.display()))?;
    Ok(output)
}
