use regex::Regex;
use std::sync::OnceLock;

use crate::models::{JobDraft, UNKNOWN_COMPANY};
use crate::page::{element_text, Page};

/// One way of recovering a field from a page.
pub trait FieldSource {
    fn extract(&self, page: &Page) -> Option<String>;
    fn describe(&self) -> String;
}

/// Text of the first element matching a CSS selector, if non-empty.
pub struct SelectorText(pub &'static str);

impl FieldSource for SelectorText {
    fn extract(&self, page: &Page) -> Option<String> {
        let el = page.query(self.0)?;
        let text = element_text(&el);
        (!text.is_empty()).then_some(text)
    }

    fn describe(&self) -> String {
        format!("selector {}", self.0)
    }
}

/// First segment of the page title, split on " - " and then on "|".
pub struct TitleRole;

impl FieldSource for TitleRole {
    fn extract(&self, page: &Page) -> Option<String> {
        let by_dash = page.title.split(" - ").next().unwrap_or("").trim();
        if !by_dash.is_empty() {
            return Some(by_dash.to_string());
        }
        let by_bar = page.title.split('|').next().unwrap_or("").trim();
        (!by_bar.is_empty()).then(|| by_bar.to_string())
    }

    fn describe(&self) -> String {
        "page title (first segment)".to_string()
    }
}

/// `aria-label="Acme logo"` on a logo link, with the suffix stripped.
pub struct LogoAriaLabel;

fn logo_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i) logo$").expect("static regex"))
}

impl FieldSource for LogoAriaLabel {
    fn extract(&self, page: &Page) -> Option<String> {
        let link = page.query(r#"a[aria-label*="logo"]"#)?;
        let aria = link.value().attr("aria-label").unwrap_or("");
        let company = logo_suffix().replace(aria, "").trim().to_string();
        (!company.is_empty() && company != "logo").then_some(company)
    }

    fn describe(&self) -> String {
        "logo aria-label".to_string()
    }
}

/// Second " - " segment of the title, minus a trailing " | Site".
/// Rejected when it is too short or names the LinkedIn brand.
pub struct TitleCompany;

impl FieldSource for TitleCompany {
    fn extract(&self, page: &Page) -> Option<String> {
        if !page.title.contains(" - ") {
            return None;
        }
        let second = page.title.split(" - ").nth(1)?;
        let candidate = second.split(" | ").next().unwrap_or("").trim();
        (candidate.chars().count() > 2 && !candidate.contains("LinkedIn"))
            .then(|| candidate.to_string())
    }

    fn describe(&self) -> String {
        "page title (second segment)".to_string()
    }
}

/// Ordered sources for one field; the first non-empty result wins.
pub struct Cascade {
    field: &'static str,
    sources: Vec<Box<dyn FieldSource>>,
}

impl Cascade {
    pub fn new(field: &'static str) -> Self {
        Self {
            field,
            sources: Vec::new(),
        }
    }

    pub fn then(mut self, source: impl FieldSource + 'static) -> Self {
        self.sources.push(Box::new(source));
        self
    }

    pub fn selectors(self, selectors: &[&'static str]) -> Self {
        selectors
            .iter()
            .fold(self, |cascade, sel| cascade.then(SelectorText(*sel)))
    }

    pub fn run(&self, page: &Page) -> Option<String> {
        for source in &self.sources {
            if let Some(value) = source.extract(page) {
                tracing::debug!(field = self.field, source = %source.describe(), %value, "field matched");
                return Some(value);
            }
        }
        tracing::debug!(field = self.field, "no source matched");
        None
    }
}

// Most specific first.
const ROLE_SELECTORS: &[&str] = &[
    "h1.jobs-unified-top-card__job-title",
    "h1.top-card-layout__title",
    r#"[data-test-id="job-title"]"#,
    ".job-details-jobs-unified-top-card__job-title h1",
    "h1.t-24.t-bold",
    "h1",
];

const COMPANY_SELECTORS: &[&str] = &[
    ".job-details-jobs-unified-top-card__company-name a",
    ".jobs-unified-top-card__company-name a",
    "div.job-details-jobs-unified-top-card__company-name a",
    r#"a[aria-label*="logo"]"#,
    r#"a[data-tracking-control-name*="topcard-org-name"]"#,
    r#"a[data-tracking-control-name*="public_jobs_topcard-org-name"]"#,
    ".jobs-unified-top-card__company-name span",
    ".topcard__org-name-link",
];

pub fn role_cascade() -> Cascade {
    Cascade::new("role").selectors(ROLE_SELECTORS).then(TitleRole)
}

pub fn company_cascade() -> Cascade {
    Cascade::new("company")
        .selectors(COMPANY_SELECTORS)
        .then(LogoAriaLabel)
        .then(TitleCompany)
}

pub struct Extractor {
    role: Cascade,
    company: Cascade,
}

impl Default for Extractor {
    fn default() -> Self {
        Self {
            role: role_cascade(),
            company: company_cascade(),
        }
    }
}

impl Extractor {
    /// Never fails: fields nothing recovers keep their sentinel values.
    pub fn extract(&self, page: &Page) -> JobDraft {
        let mut draft = JobDraft::new(&page.url);

        if let Some(role) = self.role.run(page) {
            draft.role = role;
        }
        if let Some(company) = self.company.run(page) {
            draft.company = company;
        }

        if draft.company == UNKNOWN_COMPANY {
            tracing::info!(url = %page.url, "company not found on page");
        }
        tracing::debug!(?draft, "extraction complete");
        draft
    }
}
