use clap::Parser;
use esd_common::settings::Settings;

use crate::error::EsdCliResult;

#[derive(Parser, Debug, Clone)]
pub struct InfoArgs {}

pub async fn run(_args: InfoArgs, _config: &Settings) -> EsdCliResult<()> {
    let sha = option_env!("VERGEN_GIT_SHA").unwrap_or("unknown");
    println!(
        "{} {} ({})",
        env!("CARGO_PKG_VERSION"),
        option_env!("VERGEN_BUILD_DATE").unwrap_or("unknown"),
        &sha[..sha.len().min(8)]
    );
    println!(
        "rustc {}",
        option_env!("VERGEN_RUSTC_SEMVER").unwrap_or("unknown")
    );
    Ok(())
}
