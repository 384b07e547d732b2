#[derive(Debug, Clone, Default)]
pub struct PageMetrics {
    pub page_number: usize,
    /// Time spent fetching the review HTML and preparing it for the renderer.
    pub prepare_ms: f64,
    pub fragments_rewritten: usize,
    pub text_expanded: usize,
    pub images_inlined: usize,
    pub images_failed: usize,
    pub html_bytes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ExportMetrics {
    pub pages: Vec<PageMetrics>,
    pub total_ms: f64,
    pub total_bytes: usize,
}

impl ExportMetrics {
    pub fn push(&mut self, page: PageMetrics) {
        self.total_bytes += page.html_bytes;
        self.pages.push(page);
    }

    pub fn images_inlined(&self) -> usize {
        self.pages.iter().map(|page| page.images_inlined).sum()
    }

    pub fn images_failed(&self) -> usize {
        self.pages.iter().map(|page| page.images_failed).sum()
    }
}
