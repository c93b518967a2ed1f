mod app;
mod config;
mod intake;
mod logging;
mod render;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use brief_logging::brief_info;

use crate::config::AppConfig;

fn main() -> anyhow::Result<ExitCode> {
    let config_path = std::env::args_os().nth(1).map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;
    logging::initialize(config.log_destination);

    let pages = intake::read_pages(std::io::stdin().lock()).context("reading pages from stdin")?;
    let summary = app::run(&config, pages)?;
    brief_info!(
        "run finished: {} completed, {} failed",
        summary.stats.completed,
        summary.failed.len()
    );

    Ok(if summary.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
