#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Export the page; `index` is its position in History.
    ExportPage { index: usize, url: String },
    /// Release transient per-run resources.
    Drain,
    /// Traversal is over; History is final.
    Finished,
}
