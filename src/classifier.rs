use regex::Regex;
use std::sync::OnceLock;

use crate::page::Page;

// Matched against the lowercased URL and title.
const JOB_PATTERNS: &[&str] = &[
    r"/jobs/",
    r"/viewjob",
    r"/careers/",
    r"/jobs",
    r"/apply",
    r"/job/",
    r"software engineer",
    r"developer",
    r"intern",
    r"sde",
    r"engineer",
];

const JOB_ELEMENTS: &str =
    r#"h1, [class*="title" i], [class*="job" i], [data-test-id*="job"], .jobs-unified-top-card"#;

fn job_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        JOB_PATTERNS
            .iter()
            .filter_map(|p| Regex::new(&format!("(?i){}", p)).ok())
            .collect()
    })
}

pub fn has_job_keyword(url: &str, title: &str) -> bool {
    let url = url.to_lowercase();
    let title = title.to_lowercase();
    job_patterns()
        .iter()
        .any(|re| re.is_match(&url) || re.is_match(&title))
}

pub fn has_job_elements(page: &Page) -> bool {
    page.query(JOB_ELEMENTS).is_some()
}

/// Whether the page looks like a job posting. Purely disjunctive: any keyword
/// hit in the URL or title, or any job-ish element in the tree, is enough.
pub fn is_job_page(page: &Page) -> bool {
    let keyword = has_job_keyword(&page.url, &page.title);
    let elements = has_job_elements(page);
    tracing::debug!(url = %page.url, keyword, elements, "classified page");
    keyword || elements
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_fragments_match() {
        assert!(has_job_keyword("https://www.linkedin.com/jobs/view/123", ""));
        assert!(has_job_keyword("https://www.indeed.com/viewjob?jk=abc", ""));
        assert!(has_job_keyword("https://acme.com/careers/42", ""));
        assert!(has_job_keyword("https://acme.com/apply/now", ""));
    }

    #[test]
    fn test_title_keywords_match_case_insensitively() {
        assert!(has_job_keyword("https://acme.com/posting/1", "Senior Software Engineer"));
        assert!(has_job_keyword("https://acme.com/p", "SDE Intern, Summer"));
        assert!(has_job_keyword("https://acme.com/p", "Frontend DEVELOPER"));
    }

    #[test]
    fn test_no_keyword() {
        assert!(!has_job_keyword("https://example.com/about", "About us"));
    }

    #[test]
    fn test_dom_check_alone_is_enough() {
        let page = Page::parse(
            "https://example.com/about",
            r#"<html><head><title>About us</title></head>
               <body><div class="Hero-Title">Welcome</div></body></html>"#,
        );
        assert!(!has_job_keyword(&page.url, &page.title));
        assert!(has_job_elements(&page));
        assert!(is_job_page(&page));
    }

    #[test]
    fn test_data_test_id_and_card_class() {
        let page = Page::parse(
            "https://example.com/x",
            r#"<section data-test-id="job-card">x</section>"#,
        );
        assert!(has_job_elements(&page));
        let page = Page::parse(
            "https://example.com/x",
            r#"<div class="jobs-unified-top-card">x</div>"#,
        );
        assert!(has_job_elements(&page));
    }

    #[test]
    fn test_plain_page_is_not_job_page() {
        let page = Page::parse(
            "https://example.com/about",
            "<html><head><title>About us</title></head><body><p>We make tea.</p></body></html>",
        );
        assert!(!is_job_page(&page));
    }
}
