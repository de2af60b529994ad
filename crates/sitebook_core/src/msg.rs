#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Begin the run: seed a fresh state or continue a resumed one.
    Start,
    /// The exporter finished a page and reports the references it found, in
    /// discovery order.
    PageExported { url: String, links: Vec<String> },
    /// Exporting a page failed; the page stays in History and is not retried.
    PageFailed { url: String, reason: String },
    /// Leave the visiting loop early, keeping the Frontier for a later resume.
    Stop { reason: String },
    /// Transient run resources were released.
    Drained,
}
