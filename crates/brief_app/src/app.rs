use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use brief_core::{BriefState, GenerationRequest, ItemId, QueueStats};
use brief_engine::{FileCacheStore, GenerationQueue, HttpBriefCaller};
use brief_logging::{brief_info, brief_warn};

use crate::config::AppConfig;
use crate::render::TerminalRenderer;

/// Final state of one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub stats: QueueStats,
    pub failed: Vec<ItemId>,
}

impl RunSummary {
    pub fn succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

pub fn run(config: &AppConfig, pages: Vec<GenerationRequest>) -> anyhow::Result<RunSummary> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting tokio runtime")?;
    runtime.block_on(generate_all(config, pages))
}

async fn generate_all(
    config: &AppConfig,
    pages: Vec<GenerationRequest>,
) -> anyhow::Result<RunSummary> {
    let caller = HttpBriefCaller::new(&config.client_settings()).context("configuring api client")?;
    let cache = Arc::new(
        FileCacheStore::open(&config.cache_dir)
            .with_context(|| format!("opening cache in {}", config.cache_dir.display()))?,
    );
    let titles: HashMap<ItemId, String> = pages
        .iter()
        .map(|page| (page.item_id.clone(), page.label().to_string()))
        .collect();
    let renderer = Arc::new(TerminalRenderer::stdout(titles));
    let queue = GenerationQueue::new(
        config.queue_settings(),
        Arc::new(caller),
        renderer.clone(),
        cache.clone(),
    )?;

    brief_info!("submitting {} pages to {}", pages.len(), config.api_base_url);
    for page in &pages {
        if !queue.submit(page.clone()) {
            brief_warn!("page {} listed more than once; extra entry ignored", page.item_id);
        }
    }
    queue.wait_idle().await;

    if config.retry_failed_once {
        let retries = renderer.take_retries();
        if !retries.is_empty() {
            brief_info!("retrying {} failed briefs once", retries.len());
            for handle in &retries {
                handle.retry();
            }
            queue.wait_idle().await;
        }
    }

    let mut failed = Vec::new();
    for page in &pages {
        let control = queue.row_control(&page.item_id, cache.get(&page.item_id).is_some());
        let still_failed = queue.brief_state(&page.item_id) == BriefState::Failed;
        if still_failed && !failed.contains(&page.item_id) {
            failed.push(page.item_id.clone());
        }
        renderer.print_row(&page.item_id, control);
    }

    let stats = queue.stats();
    renderer.print_line(&format!(
        "done: {} generated, {} failed",
        stats.completed, stats.failed
    ));
    Ok(RunSummary { stats, failed })
}
