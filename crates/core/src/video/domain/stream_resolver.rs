/// Turns a shareable video page URL into a direct media URL.
///
/// Resolved URLs are typically signed and expire, so they are resolved
/// once per run, right before the source is opened.
pub trait StreamResolver: Send {
    fn resolve(&self, page_url: &str) -> Result<String, Box<dyn std::error::Error>>;
}
