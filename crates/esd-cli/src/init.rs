use esd_common::settings::Settings;

use crate::error::{EsdCliError, EsdCliResult};
use crate::Cli;

/// Settings from `--settings` (or `--root`), with the command-line log
/// level taking precedence over the configured one.
pub fn init_config(cli: &Cli) -> EsdCliResult<Settings> {
    let root = cli.settings.clone().or_else(|| cli.root.clone());
    let mut settings =
        Settings::from_root(root).map_err(|e| EsdCliError::InitConfig(e.to_string()))?;

    if let Some(level) = cli.log_level {
        settings.observability.log_level = level.to_string().to_lowercase();
    } else if cli.verbose {
        settings.observability.log_level = "debug".to_string();
    }
    Ok(settings)
}
