use std::collections::VecDeque;

use engine_logging::{engine_debug, engine_info, engine_warn};
use sitebook_core::{update, CrawlPhase, CrawlState, Effect, Msg, PageFailure};

use crate::checkpoint::Checkpoint;
use crate::config::PageFailurePolicy;
use crate::context::RunContext;
use crate::exporter::PageExporter;
use crate::persist::remove_dir_if_present;
use crate::PageExport;

/// Final traversal state and what the exporter produced along the way.
#[derive(Debug)]
pub struct CrawlOutcome {
    pub state: CrawlState,
    pub exports: Vec<PageExport>,
    /// Failed pages, including the one that stopped an aborted crawl.
    pub failures: Vec<PageFailure>,
    /// Set when the crawl ended before the frontier was exhausted.
    pub stopped: Option<String>,
}

/// Runs the traversal state machine, executing its effects one at a time.
pub async fn crawl(ctx: &RunContext, exporter: &mut dyn PageExporter, state: CrawlState) -> CrawlOutcome {
    let mut state = state;
    let mut exports = Vec::new();
    let mut aborted_on: Option<PageFailure> = None;
    let mut pages_done = 0usize;
    let mut pending = VecDeque::from([Msg::Start]);

    while let Some(msg) = pending.pop_front() {
        let (next, effects) = update(state, msg);
        state = next;

        for effect in effects {
            match effect {
                Effect::ExportPage { index, url } => {
                    let paused = pages_done == 0 || pause(ctx).await;
                    if !paused || ctx.cancel.is_cancelled() {
                        pending.push_back(Msg::Stop {
                            reason: "cancelled".to_string(),
                        });
                        continue;
                    }
                    pages_done += 1;

                    match exporter.export_page(index, &url).await {
                        Ok(export) => {
                            let progress = state.view();
                            engine_debug!(
                                "#{} done, {} visited, {} queued",
                                index,
                                progress.visited,
                                progress.queued
                            );
                            for failure in &export.asset_failures {
                                engine_warn!(
                                    "{}: asset {} not embedded ({})",
                                    url,
                                    failure.source,
                                    failure.reason
                                );
                            }
                            let links = export.links.clone();
                            exports.push(export);
                            pending.push_back(Msg::PageExported { url, links });
                        }
                        Err(err) => {
                            engine_warn!("page #{} {} failed: {}", index, url, err);
                            match ctx.config.on_page_failure {
                                PageFailurePolicy::Skip => pending.push_back(Msg::PageFailed {
                                    url,
                                    reason: err.to_string(),
                                }),
                                PageFailurePolicy::Abort => {
                                    let reason = format!("aborted after {url} failed: {err}");
                                    aborted_on = Some(PageFailure {
                                        index,
                                        url,
                                        reason: err.to_string(),
                                    });
                                    pending.push_back(Msg::Stop { reason });
                                }
                            }
                        }
                    }
                }
                Effect::Drain => {
                    save_checkpoint(ctx, &state, exporter);
                    exporter.shutdown().await;
                    if !ctx.config.keep_content {
                        let dir = ctx.layout.content_dir();
                        if let Err(err) = remove_dir_if_present(&dir) {
                            engine_warn!("cannot remove {}: {}", dir.display(), err);
                        }
                    }
                    pending.push_back(Msg::Drained);
                }
                Effect::Finished => {
                    for url in state.skipped() {
                        engine_info!("{} is in the ignore list, not exported", url);
                    }
                    let summary = state.view();
                    engine_info!(
                        "crawl finished: {} visited, {} failed, {} queued{}",
                        summary.visited,
                        summary.failed,
                        summary.queued,
                        summary
                            .stopped
                            .map(|reason| format!(" (stopped: {reason})"))
                            .unwrap_or_default()
                    );
                }
            }
        }

        if matches!(state.phase(), CrawlPhase::Visiting) {
            save_checkpoint(ctx, &state, exporter);
        }
    }

    let mut failures = state.failures().to_vec();
    failures.extend(aborted_on);
    let stopped = state.stop_reason().map(str::to_string);
    CrawlOutcome {
        state,
        exports,
        failures,
        stopped,
    }
}

/// Wait between pages. Returns false when the run was cancelled meanwhile.
async fn pause(ctx: &RunContext) -> bool {
    let delay = ctx.config.page_delay();
    if delay.is_zero() {
        return !ctx.cancel.is_cancelled();
    }
    tokio::select! {
        _ = ctx.cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

fn save_checkpoint(ctx: &RunContext, state: &CrawlState, exporter: &dyn PageExporter) {
    let exporter_state = exporter.state();
    let checkpoint = Checkpoint {
        seed_url: ctx.config.seed_url.clone(),
        saved_at: ctx.now(),
        crawl: state.snapshot(),
        activated_controls: exporter_state.activated_controls,
        style_rules: exporter_state.style_rules,
    };
    let path = ctx.layout.checkpoint_file();
    match checkpoint.save(&path) {
        Ok(()) => engine_debug!("checkpoint saved to {}", path.display()),
        Err(err) => engine_warn!("cannot save checkpoint {}: {}", path.display(), err),
    }
}
