mod assets;
mod debug;
mod error;
mod export;
mod fetch;
mod font_size;
mod inline_images;
mod length;
mod metrics;
mod multiline;
mod page_context;
mod sanitize;
mod svg_tree;

pub use assets::{FetchedImage, InlinedImages, sniff_mime_type};
pub use debug::DebugLogger;
pub use error::{FetchError, QuizExportError};
pub use export::{
    AttemptMetadata, AttemptSource, DEFAULT_TITLE_TEMPLATE, HtmlMode, PageMode, PdfRenderer,
    ReviewRequest, flatten_readonly_inputs, render_title, title_block,
};
pub use fetch::{
    DEFAULT_CONNECT_TIMEOUT, DEFAULT_FETCH_TIMEOUT, DEFAULT_MAX_IMAGE_BYTES, DEFAULT_USER_AGENT,
    HttpImageFetcher, ImageFetcher, SessionCookie, SessionHandle, parse_http_url,
};
pub use font_size::{DEFAULT_FONT_SIZE, resolve_font_size, style_font_size};
pub use inline_images::{
    InlineReport, inline_remote_images, inline_remote_images_with_report, remote_image_urls,
};
pub use length::{
    LINE_HEIGHT_FACTOR, Length, LengthUnit, PX_PER_PT, format_number, leading_number,
    parse_length, resolve_length,
};
pub use metrics::{ExportMetrics, PageMetrics};
pub use multiline::{TextLine, expand_all, expand_text, layout_lines, line_segments};
pub use page_context::PageContext;
pub use sanitize::{DEFAULT_FALLBACK_FONT_FAMILY, SanitizeReport, Sanitizer, sanitize};
pub use svg_tree::{Attribute, ElementData, NamespaceDecl, NodeId, NodeKind, ParseError, SvgTree};

use std::path::PathBuf;
use std::time::{Duration, Instant};

/// Turns the review pages of a quiz attempt into HTML a PDF renderer can handle:
/// SVG repaired, read-only answers flattened, remote images embedded.
#[derive(Debug, Clone)]
pub struct QuizExporter {
    stylesheet: Option<String>,
    title_template: String,
    sanitizer: Sanitizer,
    connect_timeout: Duration,
    fetch_timeout: Duration,
    max_image_bytes: u64,
    user_agent: String,
    debug: Option<DebugLogger>,
}

#[derive(Debug, Clone)]
pub struct QuizExporterBuilder {
    stylesheet: Option<String>,
    title_template: String,
    fallback_font_family: String,
    connect_timeout: Duration,
    fetch_timeout: Duration,
    max_image_bytes: u64,
    user_agent: String,
    debug_path: Option<PathBuf>,
}

impl Default for QuizExporterBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl QuizExporterBuilder {
    pub fn new() -> Self {
        Self {
            stylesheet: None,
            title_template: DEFAULT_TITLE_TEMPLATE.to_string(),
            fallback_font_family: DEFAULT_FALLBACK_FONT_FAMILY.to_string(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            debug_path: None,
        }
    }

    /// CSS written ahead of every page in [`HtmlMode::HeaderCss`].
    pub fn stylesheet(mut self, css: impl Into<String>) -> Self {
        self.stylesheet = Some(css.into());
        self
    }

    pub fn title_template(mut self, template: impl Into<String>) -> Self {
        self.title_template = template.into();
        self
    }

    pub fn fallback_font_family(mut self, family: impl Into<String>) -> Self {
        self.fallback_font_family = family.into();
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    pub fn max_image_bytes(mut self, limit: u64) -> Self {
        self.max_image_bytes = limit;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Writes JSON-lines debug records and a per-export counter summary to `path`.
    pub fn debug_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.debug_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<QuizExporter, QuizExportError> {
        if self.fallback_font_family.trim().is_empty() {
            return Err(QuizExportError::InvalidConfiguration(
                "fallback_font_family must not be empty".to_string(),
            ));
        }
        if self.connect_timeout.is_zero() {
            return Err(QuizExportError::InvalidConfiguration(
                "connect_timeout must be > 0".to_string(),
            ));
        }
        if self.fetch_timeout.is_zero() {
            return Err(QuizExportError::InvalidConfiguration(
                "fetch_timeout must be > 0".to_string(),
            ));
        }
        if self.max_image_bytes == 0 {
            return Err(QuizExportError::InvalidConfiguration(
                "max_image_bytes must be > 0".to_string(),
            ));
        }
        let debug = match self.debug_path {
            Some(path) => Some(DebugLogger::new(path)?),
            None => None,
        };
        let sanitizer =
            Sanitizer::new(self.fallback_font_family.trim()).with_debug(debug.clone());
        Ok(QuizExporter {
            stylesheet: self.stylesheet,
            title_template: self.title_template,
            sanitizer,
            connect_timeout: self.connect_timeout,
            fetch_timeout: self.fetch_timeout,
            max_image_bytes: self.max_image_bytes,
            user_agent: self.user_agent,
            debug,
        })
    }
}

impl QuizExporter {
    pub fn builder() -> QuizExporterBuilder {
        QuizExporterBuilder::new()
    }

    /// HTTP fetcher honoring the configured timeouts, size limit, and user agent.
    pub fn http_fetcher(&self) -> HttpImageFetcher {
        HttpImageFetcher::new()
            .with_connect_timeout(self.connect_timeout)
            .with_timeout(self.fetch_timeout)
            .with_max_bytes(self.max_image_bytes)
            .with_user_agent(self.user_agent.clone())
    }

    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    /// Renders every review page of `source` into `renderer`.
    ///
    /// Data source and renderer errors abort the export. Broken SVG and failed image
    /// fetches do not; they only show up in the returned metrics.
    pub fn export(
        &self,
        source: &dyn AttemptSource,
        mode: PageMode,
        renderer: &mut dyn PdfRenderer,
        session: &mut dyn SessionHandle,
        fetcher: &dyn ImageFetcher,
    ) -> Result<ExportMetrics, QuizExportError> {
        let result = self.export_pages(source, mode, renderer, session, fetcher);
        self.emit_debug_summary(&format!("export mode={}", mode.as_str()));
        result
    }

    fn export_pages(
        &self,
        source: &dyn AttemptSource,
        mode: PageMode,
        renderer: &mut dyn PdfRenderer,
        session: &mut dyn SessionHandle,
        fetcher: &dyn ImageFetcher,
    ) -> Result<ExportMetrics, QuizExportError> {
        let started = Instant::now();
        let requests = mode.review_requests(source);
        let page_count = requests.len();
        let mut metrics = ExportMetrics::default();
        tracing::debug!(mode = mode.as_str(), pages = page_count, "quiz export started");

        for (index, request) in requests.iter().enumerate() {
            let ctx = PageContext::new(index, page_count);
            let page_started = Instant::now();

            let raw = source.review_html(request)?;
            let (sanitized, sanitize_report) = self.sanitizer.sanitize_with_report(&raw);
            let flattened = flatten_readonly_inputs(&sanitized);
            let (body, mut inline_report) = inline_remote_images_with_report(
                &flattened,
                session,
                fetcher,
                self.debug.as_ref(),
            );

            let title = if ctx.is_first() {
                let block = title_block(&self.title_template, &source.metadata());
                let (title, title_report) = inline_remote_images_with_report(
                    &block,
                    session,
                    fetcher,
                    self.debug.as_ref(),
                );
                inline_report.inlined += title_report.inlined;
                inline_report.failed += title_report.failed;
                Some(title)
            } else {
                None
            };
            let prepare_ms = page_started.elapsed().as_secs_f64() * 1000.0;

            if let Some(css) = &self.stylesheet {
                renderer.write_html(css, HtmlMode::HeaderCss)?;
            }
            if let Some(title) = &title {
                renderer.write_html(title, HtmlMode::Body)?;
            }
            renderer.write_html(&body, HtmlMode::Default)?;
            if !ctx.is_last() {
                renderer.add_page()?;
            }

            if let Some(debug) = &self.debug {
                debug.increment("pages.rendered", 1);
            }
            tracing::debug!(
                page = ctx.page_number,
                slots = ?request.slots,
                bytes = body.len(),
                "review page rendered"
            );
            metrics.push(PageMetrics {
                page_number: ctx.page_number,
                prepare_ms,
                fragments_rewritten: sanitize_report.fragments_rewritten,
                text_expanded: sanitize_report.text_expanded,
                images_inlined: inline_report.inlined,
                images_failed: inline_report.failed,
                html_bytes: body.len() + title.as_ref().map_or(0, String::len),
            });
        }

        metrics.total_ms = started.elapsed().as_secs_f64() * 1000.0;
        tracing::debug!(
            pages = metrics.pages.len(),
            bytes = metrics.total_bytes,
            images_failed = metrics.images_failed(),
            "quiz export finished"
        );
        Ok(metrics)
    }

    fn emit_debug_summary(&self, context: &str) {
        if let Some(logger) = &self.debug {
            logger.emit_summary(context);
            logger.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::time::{SystemTime, UNIX_EPOCH};

    const PNG: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];

    struct FakeAttempt {
        pages: Vec<Vec<usize>>,
        body: String,
        fail_on_page: Option<usize>,
        requests: RefCell<Vec<ReviewRequest>>,
    }

    impl FakeAttempt {
        fn new(pages: Vec<Vec<usize>>) -> Self {
            Self {
                pages,
                body: String::new(),
                fail_on_page: None,
                requests: RefCell::new(Vec::new()),
            }
        }

        fn with_body(mut self, body: &str) -> Self {
            self.body = body.to_string();
            self
        }
    }

    impl AttemptSource for FakeAttempt {
        fn num_pages(&self) -> usize {
            self.pages.len()
        }

        fn slots(&self, page: usize) -> Vec<usize> {
            self.pages.get(page).cloned().unwrap_or_default()
        }

        fn all_slots(&self) -> Vec<usize> {
            self.pages.iter().flatten().copied().collect()
        }

        fn is_last_page(&self, page: usize) -> bool {
            page + 1 >= self.pages.len()
        }

        fn review_html(&self, request: &ReviewRequest) -> Result<String, QuizExportError> {
            if self.fail_on_page == Some(request.page) {
                return Err(QuizExportError::Source(format!(
                    "page {} unavailable",
                    request.page
                )));
            }
            self.requests.borrow_mut().push(request.clone());
            Ok(format!("<p>slots {:?}</p>{}", request.slots, self.body))
        }

        fn metadata(&self) -> AttemptMetadata {
            AttemptMetadata {
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                course_name: "Algebra".to_string(),
                quiz_name: "Week 1".to_string(),
            }
        }
    }

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Write(HtmlMode, String),
        AddPage,
    }

    #[derive(Default)]
    struct RecordingRenderer {
        calls: Vec<Call>,
        fail_writes: bool,
    }

    impl RecordingRenderer {
        fn bodies(&self) -> Vec<&str> {
            self.calls
                .iter()
                .filter_map(|call| match call {
                    Call::Write(HtmlMode::Default, html) => Some(html.as_str()),
                    _ => None,
                })
                .collect()
        }

        fn count(&self, wanted: &Call) -> usize {
            self.calls.iter().filter(|call| *call == wanted).count()
        }
    }

    impl PdfRenderer for RecordingRenderer {
        fn write_html(&mut self, html: &str, mode: HtmlMode) -> Result<(), QuizExportError> {
            if self.fail_writes {
                return Err(QuizExportError::Render("renderer closed".to_string()));
            }
            self.calls.push(Call::Write(mode, html.to_string()));
            Ok(())
        }

        fn add_page(&mut self) -> Result<(), QuizExportError> {
            self.calls.push(Call::AddPage);
            Ok(())
        }
    }

    #[derive(Default)]
    struct MapFetcher {
        responses: HashMap<String, Vec<u8>>,
        calls: RefCell<usize>,
    }

    impl ImageFetcher for MapFetcher {
        fn fetch(&self, url: &str, _cookie: &SessionCookie) -> Result<FetchedImage, FetchError> {
            *self.calls.borrow_mut() += 1;
            self.responses
                .get(url)
                .map(|bytes| FetchedImage::new(url, bytes.clone(), None))
                .ok_or_else(|| FetchError::Status {
                    url: url.to_string(),
                    status: 404,
                })
        }
    }

    #[derive(Default)]
    struct CountingSession {
        releases: usize,
    }

    impl SessionHandle for CountingSession {
        fn cookie(&self) -> SessionCookie {
            SessionCookie::new("MoodleSession", "abc")
        }

        fn release(&mut self) {
            self.releases += 1;
        }
    }

    fn temp_log_path(tag: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        std::env::temp_dir().join(format!(
            "quiz_export_{tag}_{}_{}.jsonl",
            std::process::id(),
            nanos
        ))
    }

    fn run(
        exporter: &QuizExporter,
        source: &FakeAttempt,
        mode: PageMode,
    ) -> (RecordingRenderer, ExportMetrics) {
        let mut renderer = RecordingRenderer::default();
        let metrics = exporter
            .export(
                source,
                mode,
                &mut renderer,
                &mut CountingSession::default(),
                &MapFetcher::default(),
            )
            .expect("export");
        (renderer, metrics)
    }

    #[test]
    fn builder_rejects_invalid_limits() {
        let cases = [
            (
                QuizExporter::builder().fallback_font_family("  "),
                "fallback_font_family",
            ),
            (
                QuizExporter::builder().connect_timeout(Duration::ZERO),
                "connect_timeout",
            ),
            (
                QuizExporter::builder().fetch_timeout(Duration::ZERO),
                "fetch_timeout",
            ),
            (QuizExporter::builder().max_image_bytes(0), "max_image_bytes"),
        ];
        for (builder, field) in cases {
            let err = match builder.build() {
                Ok(_) => panic!("{field} should be rejected"),
                Err(err) => err,
            };
            assert!(matches!(err, QuizExportError::InvalidConfiguration(_)));
            assert!(err.to_string().contains(field));
        }
    }

    #[test]
    fn unwritable_debug_log_fails_build() {
        let path = std::env::temp_dir()
            .join("quiz_export_missing_dir")
            .join("nested")
            .join("debug.jsonl");
        let err = match QuizExporter::builder().debug_log(path).build() {
            Ok(_) => panic!("debug log in a missing directory should fail"),
            Err(err) => err,
        };
        assert!(matches!(err, QuizExportError::Io(_)));
    }

    #[test]
    fn true_page_mode_renders_one_page_per_quiz_page() {
        let exporter = QuizExporter::builder()
            .stylesheet("h3 { color: black; }")
            .build()
            .expect("exporter");
        let source = FakeAttempt::new(vec![vec![1, 2], vec![3], vec![4]]);
        let (renderer, metrics) = run(&exporter, &source, PageMode::TruePage);

        assert_eq!(
            renderer.bodies(),
            vec!["<p>slots [1, 2]</p>", "<p>slots [3]</p>", "<p>slots [4]</p>"]
        );
        assert_eq!(renderer.count(&Call::AddPage), 2);
        assert_eq!(renderer.calls.last(), Some(&Call::Write(HtmlMode::Default, "<p>slots [4]</p>".to_string())));
        assert_eq!(
            renderer.count(&Call::Write(
                HtmlMode::HeaderCss,
                "h3 { color: black; }".to_string()
            )),
            3
        );
        assert_eq!(metrics.pages.len(), 3);
        assert_eq!(metrics.pages[2].page_number, 2);
    }

    #[test]
    fn title_is_written_once_before_the_first_body() {
        let exporter = QuizExporter::builder().build().expect("exporter");
        let source = FakeAttempt::new(vec![vec![1], vec![2]]);
        let (renderer, _) = run(&exporter, &source, PageMode::TruePage);

        let title = "<h3 class=\"text-center\" style=\"margin-bottom: -20px;\">Ada Lovelace - Algebra - Week 1</h3>";
        assert_eq!(
            renderer.calls[0],
            Call::Write(HtmlMode::Body, title.to_string())
        );
        assert_eq!(
            renderer
                .calls
                .iter()
                .filter(|call| matches!(call, Call::Write(HtmlMode::Body, _)))
                .count(),
            1
        );
    }

    #[test]
    fn question_per_page_mode_renders_one_page_per_slot() {
        let exporter = QuizExporter::builder()
            .title_template("{quizname}")
            .build()
            .expect("exporter");
        let source = FakeAttempt::new(vec![vec![1, 2], vec![3]]);
        let (renderer, metrics) = run(&exporter, &source, PageMode::QuestionPerPage);

        assert_eq!(
            renderer.bodies(),
            vec!["<p>slots [1]</p>", "<p>slots [2]</p>", "<p>slots [3]</p>"]
        );
        assert_eq!(renderer.count(&Call::AddPage), 2);
        assert_eq!(metrics.pages.len(), 3);
        let pages: Vec<usize> = source.requests.borrow().iter().map(|r| r.page).collect();
        assert_eq!(pages, vec![0, 0, 1]);
    }

    #[test]
    fn single_page_mode_renders_everything_once() {
        let exporter = QuizExporter::builder().build().expect("exporter");
        let source = FakeAttempt::new(vec![vec![1, 2], vec![3]]);
        let (renderer, metrics) = run(&exporter, &source, PageMode::SinglePage);

        assert_eq!(renderer.bodies(), vec!["<p>slots [1, 2, 3]</p>"]);
        assert_eq!(renderer.count(&Call::AddPage), 0);
        assert_eq!(metrics.pages.len(), 1);
        let requests = source.requests.borrow();
        assert!(requests[0].show_all && requests[0].last_page);
    }

    #[test]
    fn page_bodies_are_repaired_flattened_and_inlined() {
        let body = concat!(
            r#"<svg><text y="10"><tspan>a</tspan><tspan>b</tspan></text></svg>"#,
            r#"<input type="text" value="42" id="q1:1_answer" readonly="readonly">"#,
            r#"<img src="https://lms.test/a.png"><img src="https://lms.test/gone.png">"#
        );
        let exporter = QuizExporter::builder().build().expect("exporter");
        let source = FakeAttempt::new(vec![vec![1]]).with_body(body);
        let mut fetcher = MapFetcher::default();
        fetcher
            .responses
            .insert("https://lms.test/a.png".to_string(), PNG.to_vec());
        let mut session = CountingSession::default();
        let mut renderer = RecordingRenderer::default();

        let metrics = exporter
            .export(
                &source,
                PageMode::TruePage,
                &mut renderer,
                &mut session,
                &fetcher,
            )
            .expect("export");

        let out = renderer.bodies()[0];
        assert!(out.contains(r#"<text y="10" x="0">a</text><text y="27.6" x="0">b</text>"#));
        assert!(out.contains(" - 42 - "));
        assert!(out.contains("src=\"data:image/png;base64,"));
        assert!(out.contains(r#"src="https://lms.test/gone.png""#));
        assert_eq!(session.releases, 1);
        assert_eq!(*fetcher.calls.borrow(), 2);

        let page = &metrics.pages[0];
        assert_eq!(page.fragments_rewritten, 1);
        assert_eq!(page.text_expanded, 1);
        assert_eq!(page.images_inlined, 1);
        assert_eq!(page.images_failed, 1);
        assert_eq!(metrics.images_failed(), 1);
        assert_eq!(metrics.total_bytes, page.html_bytes);
    }

    #[test]
    fn source_errors_abort_the_export() {
        let exporter = QuizExporter::builder().build().expect("exporter");
        let mut source = FakeAttempt::new(vec![vec![1], vec![2], vec![3]]);
        source.fail_on_page = Some(1);
        let mut renderer = RecordingRenderer::default();
        let err = exporter
            .export(
                &source,
                PageMode::TruePage,
                &mut renderer,
                &mut CountingSession::default(),
                &MapFetcher::default(),
            )
            .expect_err("source failure");
        assert!(matches!(err, QuizExportError::Source(_)));
        assert_eq!(renderer.bodies().len(), 1);
    }

    #[test]
    fn renderer_errors_abort_the_export() {
        let exporter = QuizExporter::builder().build().expect("exporter");
        let source = FakeAttempt::new(vec![vec![1]]);
        let mut renderer = RecordingRenderer {
            fail_writes: true,
            ..RecordingRenderer::default()
        };
        let err = exporter
            .export(
                &source,
                PageMode::TruePage,
                &mut renderer,
                &mut CountingSession::default(),
                &MapFetcher::default(),
            )
            .expect_err("render failure");
        assert!(matches!(err, QuizExportError::Render(_)));
    }

    #[test]
    fn empty_attempt_renders_nothing() {
        let exporter = QuizExporter::builder().build().expect("exporter");
        let source = FakeAttempt::new(Vec::new());
        let (renderer, metrics) = run(&exporter, &source, PageMode::TruePage);
        assert!(renderer.calls.is_empty());
        assert!(metrics.pages.is_empty());
    }

    #[test]
    fn debug_log_gets_one_summary_per_export() {
        let path = temp_log_path("export_summary");
        let exporter = QuizExporter::builder()
            .debug_log(&path)
            .build()
            .expect("exporter");
        let source = FakeAttempt::new(vec![vec![1], vec![2]])
            .with_body(r#"<svg><text><tspan>a</tspan><tspan>b</tspan></text></svg>"#);
        run(&exporter, &source, PageMode::TruePage);

        let contents = std::fs::read_to_string(&path).expect("read log");
        let summaries: Vec<&str> = contents
            .lines()
            .filter(|line| line.contains("\"debug.summary\""))
            .collect();
        assert_eq!(summaries.len(), 1);
        assert!(summaries[0].contains("\"context\":\"export mode=true_page\""));
        assert!(summaries[0].contains("\"pages.rendered\":2"));
        assert!(summaries[0].contains("\"svg.text.expanded\":2"));
        let _ = std::fs::remove_file(path);
    }

    #[test]
    fn http_fetcher_uses_configured_limits() {
        let exporter = QuizExporter::builder()
            .fetch_timeout(Duration::from_millis(50))
            .build()
            .expect("exporter");
        let err = exporter
            .http_fetcher()
            .fetch("ftp://lms.test/a.png", &SessionCookie::new("s", "v"))
            .expect_err("ftp rejected");
        assert!(matches!(err, FetchError::InvalidUrl(_)));
    }
}
