/// Opens search result links on behalf of the workflow
pub trait LinkOpener: Send + Sync {
    fn open(&self, url: &str) -> anyhow::Result<()>;
}

/// Opener that only logs the link; suitable for headless hosts.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingOpener;

impl LinkOpener for LoggingOpener {
    fn open(&self, url: &str) -> anyhow::Result<()> {
        tracing::info!(url = %url, "Similar product found");
        Ok(())
    }
}
