//! Sitebook engine: render sessions, page export, assembly and the run
//! pipeline around the core traversal state machine.
mod assemble;
mod assets;
mod checkpoint;
mod config;
mod context;
mod convert;
mod crawler;
mod decode;
mod exporter;
mod fetch;
mod layout;
mod markup;
mod persist;
mod pipeline;
mod render;
mod styles;
mod table;
mod types;

pub use assemble::{assemble, AssembledPage, AssemblyError, AssemblySummary, MissingArtifact};
pub use assets::{AssetResolver, EmbedOutcome, Replacement};
pub use checkpoint::{Checkpoint, CheckpointError};
pub use config::{ConfigError, ExporterKind, PageFailurePolicy, SiteConfig, TableConfig};
pub use context::{Clock, RunContext};
pub use convert::{
    ArtifactFormat, ConversionError, MarkdownConverter, PageConverter, PagedText, PAGE_BREAK,
};
pub use crawler::{crawl, CrawlOutcome};
pub use decode::{decode_markup, DecodeError, DecodedMarkup};
pub use exporter::{DocumentExporter, ExportError, ExportSettings, ExporterState, PageExporter};
pub use fetch::{FetchSettings, ReqwestFetcher, ResourceFetcher};
pub use layout::{short_hash, RunLayout};
pub use markup::{parse_selector, AssetRef, PageDocument, SelectorError};
pub use persist::{ensure_dir, remove_dir_if_present, AtomicFileWriter, PersistError};
pub use pipeline::{prepare, run, Collaborators, Compilation, PipelineError, PreparedRun, RunReport};
pub use render::{
    HttpSession, HttpSessionFactory, RenderSession, SessionFactory, SessionSlot, StyleTarget,
};
pub use styles::StyleCache;
pub use table::{PageTable, TableExporter, TableSettings};
pub use types::{
    AssetFailure, FailureKind, FetchError, FetchMetadata, FetchedResource, PageExport, RenderError,
};
