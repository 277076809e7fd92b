use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::engine::{run, CrawlOptions};
use crate::error::CrawlError;
use crate::filter::{AllFiles, ExtensionFilter};
use crate::ftp::FtpConnector;
use crate::request::{CrawlRequest, CrawlTarget};
use crate::results::CrawlResults;
use crate::traits::{Connector, Matcher, ProgressSink};

// ---------------------------------------------------------------------------
// CrawlBuilder
// ---------------------------------------------------------------------------

/// Entry point for configuring and running one crawl on the current thread.
///
/// Created via [`ftpgrep::crawl()`](crate::crawl). For background jobs with
/// live progress, use [`JobStore`](crate::JobStore) instead.
///
/// # Example
///
/// ```rust,ignore
/// let results = ftpgrep::crawl()
///     .target(CrawlTarget::new("ftp.example.com", "user", "secret", "/www"))
///     .terms("eval, base64_decode")
///     .extensions([".php", ".js"])
///     .max_depth(8)
///     .run()?;
/// ```
#[derive(Default)]
pub struct CrawlBuilder {
    connector:  Option<Arc<dyn Connector>>,
    target:     Option<CrawlTarget>,
    terms:      Option<String>,
    filter:     Option<Arc<dyn Matcher>>,
    extensions: Option<Vec<String>>,
    max_depth:  Option<usize>,
    sink:       Option<Arc<dyn ProgressSink>>,
    cancel:     Option<CancellationToken>,
}

impl CrawlBuilder {
    // ── Where ─────────────────────────────────────────────────────────────

    /// Set how sessions are opened. Defaults to [`FtpConnector`] on port 21.
    pub fn connector(mut self, c: impl Connector + 'static) -> Self {
        self.connector = Some(Arc::new(c));
        self
    }

    /// Set the host, credentials and root directory.
    pub fn target(mut self, target: CrawlTarget) -> Self {
        self.target = Some(target);
        self
    }

    /// Set target and terms from a request.
    pub fn request(mut self, request: CrawlRequest) -> Self {
        self.target = Some(request.target);
        self.terms = Some(request.terms);
        self
    }

    // ── What ──────────────────────────────────────────────────────────────

    /// Comma-separated search terms. Each is a case-insensitive regex alternative.
    pub fn terms(mut self, raw: impl Into<String>) -> Self {
        self.terms = Some(raw.into());
        self
    }

    /// Only search files with these extensions.
    ///
    /// Shorthand for `.with_filter(ExtensionFilter::new(exts)?)`; an invalid
    /// set is reported by [`run()`](CrawlBuilder::run).
    pub fn extensions<I, S>(mut self, exts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = Some(exts.into_iter().map(Into::into).collect());
        self
    }

    /// Set a custom file filter. Overrides `.extensions()`.
    pub fn with_filter(mut self, m: impl Matcher + 'static) -> Self {
        self.filter = Some(Arc::new(m));
        self
    }

    // ── Options ───────────────────────────────────────────────────────────

    /// Directory levels below the root to descend. `0` means the root's own
    /// files only. Unlimited by default.
    pub fn max_depth(mut self, d: usize) -> Self {
        self.max_depth = Some(d);
        self
    }

    /// Receive a [`CrawlProgress`](crate::CrawlProgress) after every file.
    pub fn progress(mut self, sink: impl ProgressSink + 'static) -> Self {
        self.sink = Some(Arc::new(sink));
        self
    }

    /// Stop between files once `token` is cancelled.
    pub fn cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    // ── Execute ───────────────────────────────────────────────────────────

    /// Run the crawl to completion on the current thread.
    ///
    /// # Errors
    ///
    /// Returns `Err` only for missing configuration (no target, no terms,
    /// empty extension set). Failures during the crawl, including bad
    /// terms, are reported in [`CrawlResults::error`] next to whatever was
    /// matched before the failure.
    pub fn run(self) -> Result<CrawlResults, CrawlError> {
        let target = self.target.ok_or(CrawlError::MissingField("target"))?;
        let terms = self.terms.ok_or(CrawlError::EmptyTerms)?;

        let filter: Arc<dyn Matcher> = match (self.filter, self.extensions) {
            (Some(f), _) => f,
            (None, Some(exts)) => Arc::new(ExtensionFilter::new(exts)?),
            (None, None) => Arc::new(AllFiles),
        };
        let connector: Arc<dyn Connector> = match self.connector {
            Some(c) => c,
            None => Arc::new(FtpConnector::default()),
        };

        let options = CrawlOptions {
            filter,
            max_depth: self.max_depth,
        };
        let request = CrawlRequest { target, terms };
        let sink: Arc<dyn ProgressSink> = self.sink.unwrap_or_else(|| Arc::new(()));
        let cancel = self.cancel.unwrap_or_default();

        Ok(run(connector.as_ref(), &request, &options, sink.as_ref(), &cancel))
    }
}
