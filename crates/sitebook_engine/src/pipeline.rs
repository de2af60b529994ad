use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use engine_logging::{engine_info, engine_warn};
use scraper::Selector;
use sitebook_core::{Classifier, CrawlSettings, CrawlState, PageFailure};
use tokio_util::sync::CancellationToken;

use crate::assemble::{assemble, AssemblyError, AssemblySummary, MissingArtifact};
use crate::assets::AssetResolver;
use crate::checkpoint::{Checkpoint, CheckpointError};
use crate::config::{ConfigError, ExporterKind, SiteConfig};
use crate::context::{Clock, RunContext};
use crate::convert::{MarkdownConverter, PageConverter};
use crate::crawler::crawl;
use crate::exporter::{DocumentExporter, ExportSettings};
use crate::fetch::{ReqwestFetcher, ResourceFetcher};
use crate::layout::RunLayout;
use crate::markup::{parse_selector, SelectorError};
use crate::persist::{remove_dir_if_present, PersistError};
use crate::render::{HttpSessionFactory, SessionFactory, SessionSlot};
use crate::styles::StyleCache;
use crate::table::{TableExporter, TableSettings};
use crate::RenderError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("no render session available: {0}")]
    Session(#[source] RenderError),
    #[error("cannot determine site version: {0}")]
    Version(String),
    #[error("cannot prepare output directory: {0}")]
    Output(#[from] PersistError),
    #[error("checkpoint unusable: {0}")]
    Checkpoint(#[from] CheckpointError),
    #[error("invalid url prefix: {0}")]
    Prefix(#[from] url::ParseError),
    #[error(transparent)]
    Selector(#[from] SelectorError),
}

/// External collaborators of a run, replaceable in tests.
#[derive(Clone)]
pub struct Collaborators {
    pub sessions: Arc<dyn SessionFactory>,
    pub asset_fetcher: Arc<dyn ResourceFetcher>,
    pub converter: Arc<dyn PageConverter>,
}

impl Collaborators {
    /// Plain HTTP sessions, `reqwest` asset downloads, markdown artifacts.
    pub fn http(config: &SiteConfig) -> Self {
        Self {
            sessions: Arc::new(HttpSessionFactory::new(config.page_fetch())),
            asset_fetcher: Arc::new(ReqwestFetcher::new(config.asset_fetch())),
            converter: Arc::new(MarkdownConverter::default()),
        }
    }
}

/// A validated run with its output directory and render session ready.
pub struct PreparedRun {
    ctx: RunContext,
    slot: SessionSlot,
    checkpoint: Option<Checkpoint>,
    collaborators: Collaborators,
}

impl PreparedRun {
    pub fn context(&self) -> &RunContext {
        &self.ctx
    }

    pub fn layout(&self) -> &RunLayout {
        &self.ctx.layout
    }

    pub fn is_resumed(&self) -> bool {
        self.checkpoint.is_some()
    }

    /// Stamp checkpoints with `clock` instead of leaving `saved_at` empty.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.ctx = self.ctx.with_clock(clock);
        self
    }
}

/// Validate the configuration, open a session, settle the version and
/// create the output directories.
pub async fn prepare(
    config: SiteConfig,
    collaborators: Collaborators,
    cancel: CancellationToken,
) -> Result<PreparedRun, PipelineError> {
    config.validate()?;
    let mut slot = SessionSlot::open(collaborators.sessions.clone(), config.retry_on_session_loss)
        .await
        .map_err(PipelineError::Session)?;

    let version = match config.version.as_deref().map(str::trim) {
        Some(version) if !version.is_empty() => version.to_string(),
        _ => discover_version(&config, &mut slot).await?,
    };

    let layout = RunLayout::new(
        &config.export_dir,
        &config.replacement_token,
        &version,
        &config.seed_url,
        config.separator_char,
    );
    layout.ensure()?;

    let checkpoint = if config.resume {
        match Checkpoint::load(&layout.checkpoint_file())? {
            Some(cp) if cp.seed_url == config.seed_url => Some(cp),
            Some(cp) => {
                engine_warn!(
                    "checkpoint belongs to {}, not {}; starting fresh",
                    cp.seed_url,
                    config.seed_url
                );
                None
            }
            None => None,
        }
    } else {
        None
    };

    Ok(PreparedRun {
        ctx: RunContext::new(config, layout, cancel),
        slot,
        checkpoint,
        collaborators,
    })
}

/// Text of the first `version_selector` match on the changelog page.
async fn discover_version(config: &SiteConfig, slot: &mut SessionSlot) -> Result<String, PipelineError> {
    let Some(changelog) = config.changelog_url.as_deref() else {
        return Err(PipelineError::Version(
            "neither version nor changelog_url is configured".into(),
        ));
    };
    let selector = parse_selector(&config.version_selector)?;
    slot.navigate(changelog)
        .await
        .map_err(|err| PipelineError::Version(err.to_string()))?;
    let markup = slot
        .session()
        .page_source()
        .await
        .map_err(|err| PipelineError::Version(err.to_string()))?;
    let version = first_text(&markup, &selector).ok_or_else(|| {
        PipelineError::Version(format!("no {} on {}", config.version_selector, changelog))
    })?;
    engine_info!("site version {} (from {})", version, changelog);
    Ok(version)
}

fn first_text(markup: &str, selector: &Selector) -> Option<String> {
    let doc = scraper::Html::parse_document(markup);
    let text = doc
        .select(selector)
        .next()?
        .text()
        .collect::<String>()
        .trim()
        .to_string();
    (!text.is_empty()).then_some(text)
}

#[derive(Debug)]
pub enum Compilation {
    Written(AssemblySummary),
    /// The crawl stopped early; the frontier is in the checkpoint.
    Skipped(String),
    Failed(String),
    /// Table export: one CSV per page, nothing to compile.
    Tables { dir: PathBuf, files: usize },
}

/// What a run did, for the final console summary.
#[derive(Debug)]
pub struct RunReport {
    pub root: PathBuf,
    pub visited: Vec<String>,
    pub exported: usize,
    pub failed: Vec<PageFailure>,
    pub missing: Vec<MissingArtifact>,
    pub session_recoveries: usize,
    pub compilation: Compilation,
}

impl RunReport {
    pub fn compiled(&self) -> Option<&AssemblySummary> {
        match &self.compilation {
            Compilation::Written(summary) => Some(summary),
            _ => None,
        }
    }

    /// Whether the run produced its final output.
    pub fn succeeded(&self) -> bool {
        matches!(
            self.compilation,
            Compilation::Written(_) | Compilation::Tables { .. }
        )
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "output:          {}", self.root.display())?;
        writeln!(f, "pages visited:   {}", self.visited.len())?;
        writeln!(f, "pages exported:  {}", self.exported)?;
        writeln!(f, "failed pages:    {}", self.failed.len())?;
        for failure in &self.failed {
            writeln!(f, "  #{} {}: {}", failure.index, failure.url, failure.reason)?;
        }
        if !self.missing.is_empty() {
            writeln!(f, "missing artifacts: {}", self.missing.len())?;
            for missing in &self.missing {
                writeln!(f, "  {missing}")?;
            }
        }
        if self.session_recoveries > 0 {
            writeln!(f, "session recoveries: {}", self.session_recoveries)?;
        }
        match &self.compilation {
            Compilation::Written(summary) => write!(
                f,
                "compiled:        {} ({} pages)",
                summary.output_path.display(),
                summary.page_count
            ),
            Compilation::Skipped(reason) => write!(f, "compiled:        no, crawl stopped: {reason}"),
            Compilation::Failed(reason) => write!(f, "compiled:        no, {reason}"),
            Compilation::Tables { dir, files } => {
                write!(f, "tables:          {} file(s) in {}", files, dir.display())
            }
        }
    }
}

/// Crawl, export and compile. Per-page problems end up in the report;
/// only setup failures are returned as errors.
pub async fn run(prepared: PreparedRun) -> Result<RunReport, PipelineError> {
    let PreparedRun {
        ctx,
        mut slot,
        checkpoint,
        collaborators,
    } = prepared;
    let config = &ctx.config;
    let prefix = config.effective_prefix();

    if !config.startup_clicks.is_empty() {
        startup_clicks(config, &mut slot).await;
    }

    let (snapshot, activated, rules) = match checkpoint {
        Some(cp) => (Some(cp.crawl), cp.activated_controls, cp.style_rules),
        None => (None, Vec::new(), Default::default()),
    };

    let mut settings = CrawlSettings::new(config.seed_url.clone(), prefix.clone())
        .with_ignore(config.ignore_set().map_err(ConfigError::from)?);
    settings.classifier = Classifier::new(config.external_marker.clone());
    let state = match snapshot {
        Some(snapshot) => CrawlState::resume(settings, snapshot),
        None => CrawlState::new(settings),
    };

    let (outcome, session_recoveries) = match &config.exporter {
        ExporterKind::Document => {
            let styles = StyleCache::new(config.allowed_style_properties.clone())
                .with_overrides(config.style_overrides.clone())
                .with_rules(rules);
            let mut assets = AssetResolver::new(
                collaborators.asset_fetcher.clone(),
                ctx.layout.asset_dir(),
                &prefix,
                config.asset_concurrency,
            )?;
            let mut settings = ExportSettings::from_config(config)?;
            if !config.stylesheets.is_empty() {
                let (texts, failures) = assets.prefetch_text(&config.stylesheets, &ctx.cancel).await;
                for failure in &failures {
                    engine_warn!("stylesheet {} unavailable: {}", failure.source, failure.reason);
                }
                engine_info!("{} of {} site stylesheets loaded", texts.len(), config.stylesheets.len());
                settings.site_styles = texts;
            }
            let mut exporter = DocumentExporter::new(
                slot,
                styles,
                assets,
                collaborators.converter.clone(),
                ctx.layout.clone(),
                settings,
                ctx.cancel.clone(),
            )
            .with_activated(activated);

            let outcome = crawl(&ctx, &mut exporter, state).await;
            engine_info!(
                "{} style rules from {} backend queries, {} asset downloads",
                exporter.styles().len(),
                exporter.styles().backend_queries(),
                exporter.assets().fetches()
            );
            (outcome, exporter.slot().recoveries())
        }
        ExporterKind::Table(table) => {
            let settings = TableSettings::new(table, config)?;
            let mut exporter = TableExporter::new(slot, ctx.layout.clone(), settings);
            let outcome = crawl(&ctx, &mut exporter, state).await;
            (outcome, exporter.slot().recoveries())
        }
    };
    let visited = outcome.state.history().as_slice().to_vec();

    let mut missing = Vec::new();
    let compilation = match (&outcome.stopped, &config.exporter) {
        (Some(reason), _) => Compilation::Skipped(reason.clone()),
        (None, ExporterKind::Table(_)) => Compilation::Tables {
            dir: ctx.layout.table_dir(),
            files: outcome.exports.len(),
        },
        (None, ExporterKind::Document) => {
            let format = collaborators.converter.format();
            let ext = format.extension().to_string();
            let result = assemble(
                &visited,
                |index, url| ctx.layout.artifact_file(index, url, &ext),
                format,
                &ctx.layout.compiled_file(&ext),
                Some(&ctx.layout.manifest_file()),
            );
            match result {
                Ok(summary) => {
                    if !config.keep_artifacts {
                        if let Err(err) = remove_dir_if_present(&ctx.layout.artifact_dir()) {
                            engine_warn!("cannot remove page artifacts: {}", err);
                        }
                    }
                    Compilation::Written(summary)
                }
                Err(AssemblyError::MissingArtifacts(list)) => {
                    let reason = format!("{} page artifact(s) missing", list.len());
                    missing = list;
                    Compilation::Failed(reason)
                }
                Err(err) => Compilation::Failed(err.to_string()),
            }
        }
    };

    Ok(RunReport {
        root: ctx.layout.root().to_path_buf(),
        visited,
        exported: outcome.exports.len(),
        failed: outcome.failures,
        missing,
        session_recoveries,
        compilation,
    })
}

/// One-time clicks on the seed page, e.g. site settings toggles.
async fn startup_clicks(config: &SiteConfig, slot: &mut SessionSlot) {
    if let Err(err) = slot.navigate(&config.seed_url).await {
        engine_warn!("cannot open {} for startup clicks: {}", config.seed_url, err);
        return;
    }
    let delay = config.settle_delay();
    for id in &config.startup_clicks {
        let session = slot.session();
        match session.click(id).await {
            Ok(()) => {
                engine_info!("startup click on #{}", id);
                session.settle(delay).await;
            }
            Err(err) => engine_warn!("startup click on #{} failed: {}", id, err),
        }
    }
}
