//! Run configuration: YAML file plus command-line overrides

use crate::Cli;
use govstage_classifiers::{ClassifierConfig, DeviceSpec, ModelSourceSpec};
use std::path::Path;

/// Load the classifier configuration and apply CLI overrides.
///
/// Without `--config` the built-in rules and descriptions are used. An
/// explicitly named file that cannot be read is an error.
pub fn load(cli: &Cli) -> anyhow::Result<ClassifierConfig> {
    let mut config = match &cli.config {
        Some(path) => load_file(path)?,
        None => ClassifierConfig::default(),
    };

    // Apply CLI overrides
    if let Some(model) = &cli.model {
        config.model.source = ModelSourceSpec::from_cli_arg(model);
    }

    if let Some(device) = &cli.device {
        config.model.device = device.parse::<DeviceSpec>()?;
    }

    if let Some(chunk_size) = cli.chunk_size {
        config.batch.chunk_size = chunk_size;
    }

    config.validate()?;
    Ok(config)
}

fn load_file(path: &Path) -> anyhow::Result<ClassifierConfig> {
    if !path.exists() {
        anyhow::bail!("config file not found: {}", path.display());
    }

    Ok(ClassifierConfig::from_file(path)?)
}
