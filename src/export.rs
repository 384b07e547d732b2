use std::sync::LazyLock;

use regex::{NoExpand, Regex};

use crate::error::QuizExportError;

pub const DEFAULT_TITLE_TEMPLATE: &str = "{firstname} {lastname} - {coursename} - {quizname}";

static READONLY_INPUT_OPEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<input type="text".+?value=""#).expect("readonly input open pattern")
});
static READONLY_INPUT_CLOSE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"" id="q.+?readonly"(?:>| />)"#).expect("readonly input close pattern")
});

/// How review pages map onto PDF pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageMode {
    /// One PDF page per quiz page.
    #[default]
    TruePage,
    /// One PDF page per question slot.
    QuestionPerPage,
    /// Every question on one review page.
    SinglePage,
}

impl PageMode {
    /// Unknown codes fall back to [`PageMode::TruePage`].
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => PageMode::QuestionPerPage,
            2 => PageMode::SinglePage,
            _ => PageMode::TruePage,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            PageMode::TruePage => 0,
            PageMode::QuestionPerPage => 1,
            PageMode::SinglePage => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PageMode::TruePage => "true_page",
            PageMode::QuestionPerPage => "question_per_page",
            PageMode::SinglePage => "single_page",
        }
    }

    /// Review requests in rendering order, one per PDF page.
    pub fn review_requests(self, source: &dyn AttemptSource) -> Vec<ReviewRequest> {
        match self {
            PageMode::TruePage => true_page_requests(source),
            PageMode::QuestionPerPage => question_per_page_requests(source),
            PageMode::SinglePage => single_page_requests(source),
        }
    }
}

fn true_page_requests(source: &dyn AttemptSource) -> Vec<ReviewRequest> {
    (0..source.num_pages())
        .map(|page| ReviewRequest {
            slots: source.slots(page),
            page,
            show_all: false,
            last_page: source.is_last_page(page),
        })
        .collect()
}

fn question_per_page_requests(source: &dyn AttemptSource) -> Vec<ReviewRequest> {
    let mut requests = Vec::new();
    for page in 0..source.num_pages() {
        let last_page = source.is_last_page(page);
        for slot in source.slots(page) {
            requests.push(ReviewRequest {
                slots: vec![slot],
                page,
                show_all: false,
                last_page,
            });
        }
    }
    requests
}

fn single_page_requests(source: &dyn AttemptSource) -> Vec<ReviewRequest> {
    vec![ReviewRequest {
        slots: source.all_slots(),
        page: 0,
        show_all: true,
        last_page: true,
    }]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRequest {
    pub slots: Vec<usize>,
    pub page: usize,
    pub show_all: bool,
    pub last_page: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttemptMetadata {
    pub first_name: String,
    pub last_name: String,
    pub course_name: String,
    pub quiz_name: String,
}

/// A finished quiz attempt that can render its own review pages.
pub trait AttemptSource {
    fn num_pages(&self) -> usize;

    fn slots(&self, page: usize) -> Vec<usize>;

    fn all_slots(&self) -> Vec<usize>;

    fn is_last_page(&self, page: usize) -> bool;

    fn review_html(&self, request: &ReviewRequest) -> Result<String, QuizExportError>;

    fn metadata(&self) -> AttemptMetadata;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HtmlMode {
    HeaderCss,
    Body,
    Default,
}

/// HTML-to-PDF backend the prepared pages are written to.
pub trait PdfRenderer {
    fn write_html(&mut self, html: &str, mode: HtmlMode) -> Result<(), QuizExportError>;

    fn add_page(&mut self) -> Result<(), QuizExportError>;
}

/// Replaces read-only text inputs with their answer between two dashes, so the answer is
/// printed as text instead of as a form control.
pub fn flatten_readonly_inputs(html: &str) -> String {
    let opened = READONLY_INPUT_OPEN.replace_all(html, NoExpand(" - "));
    READONLY_INPUT_CLOSE
        .replace_all(&opened, NoExpand(" - "))
        .into_owned()
}

pub fn render_title(template: &str, meta: &AttemptMetadata) -> String {
    template
        .replace("{firstname}", &escape_html(&meta.first_name))
        .replace("{lastname}", &escape_html(&meta.last_name))
        .replace("{coursename}", &escape_html(&meta.course_name))
        .replace("{quizname}", &escape_html(&meta.quiz_name))
}

pub fn title_block(template: &str, meta: &AttemptMetadata) -> String {
    format!(
        "<h3 class=\"text-center\" style=\"margin-bottom: -20px;\">{}</h3>",
        render_title(template, meta)
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Layout {
        pages: Vec<Vec<usize>>,
    }

    impl AttemptSource for Layout {
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
            page + 1 == self.pages.len()
        }

        fn review_html(&self, _request: &ReviewRequest) -> Result<String, QuizExportError> {
            Ok(String::new())
        }

        fn metadata(&self) -> AttemptMetadata {
            AttemptMetadata::default()
        }
    }

    fn layout() -> Layout {
        Layout {
            pages: vec![vec![1, 2], vec![3]],
        }
    }

    #[test]
    fn page_mode_codes() {
        assert_eq!(PageMode::from_code(0), PageMode::TruePage);
        assert_eq!(PageMode::from_code(1), PageMode::QuestionPerPage);
        assert_eq!(PageMode::from_code(2), PageMode::SinglePage);
        assert_eq!(PageMode::from_code(7), PageMode::TruePage);
        assert_eq!(PageMode::from_code(-1), PageMode::TruePage);
        assert_eq!(PageMode::from_code(PageMode::SinglePage.code()), PageMode::SinglePage);
    }

    #[test]
    fn true_page_requests_follow_quiz_pages() {
        let requests = PageMode::TruePage.review_requests(&layout());
        assert_eq!(
            requests,
            vec![
                ReviewRequest {
                    slots: vec![1, 2],
                    page: 0,
                    show_all: false,
                    last_page: false
                },
                ReviewRequest {
                    slots: vec![3],
                    page: 1,
                    show_all: false,
                    last_page: true
                },
            ]
        );
    }

    #[test]
    fn question_per_page_requests_one_slot_each() {
        let requests = PageMode::QuestionPerPage.review_requests(&layout());
        let summary: Vec<(Vec<usize>, usize, bool)> = requests
            .into_iter()
            .map(|r| (r.slots, r.page, r.last_page))
            .collect();
        assert_eq!(
            summary,
            vec![
                (vec![1], 0, false),
                (vec![2], 0, false),
                (vec![3], 1, true)
            ]
        );
    }

    #[test]
    fn single_page_request_shows_everything() {
        let requests = PageMode::SinglePage.review_requests(&layout());
        assert_eq!(
            requests,
            vec![ReviewRequest {
                slots: vec![1, 2, 3],
                page: 0,
                show_all: true,
                last_page: true
            }]
        );
    }

    #[test]
    fn readonly_inputs_become_dashed_answers() {
        let html = concat!(
            r#"<p>Answer: <input type="text" name="q5:1_answer" value="42" id="q5:1_answer" readonly="readonly"></p>"#,
            r#"<span><input type="text" size="3" value="Paris" id="q5:2_answer" readonly="readonly" /></span>"#
        );
        assert_eq!(
            flatten_readonly_inputs(html),
            "<p>Answer:  - 42 - </p><span> - Paris - </span>"
        );
    }

    #[test]
    fn other_inputs_are_left_alone() {
        let html = r#"<input type="checkbox" checked="checked" id="q1:1_choice0" />"#;
        assert_eq!(flatten_readonly_inputs(html), html);
    }

    #[test]
    fn title_block_escapes_metadata() {
        let meta = AttemptMetadata {
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            course_name: "Maths & <Logic>".to_string(),
            quiz_name: "Final".to_string(),
        };
        assert_eq!(
            title_block(DEFAULT_TITLE_TEMPLATE, &meta),
            "<h3 class=\"text-center\" style=\"margin-bottom: -20px;\">Ada Lovelace - Maths &amp; &lt;Logic&gt; - Final</h3>"
        );
        assert_eq!(render_title("{quizname} ({lastname})", &meta), "Final (Lovelace)");
    }
}
