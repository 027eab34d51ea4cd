use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

pub const UNKNOWN_COMPANY: &str = "Unknown Company";
pub const UNKNOWN_ROLE: &str = "Unknown Role";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Status {
    #[default]
    Applied,
    Interview,
    Offer,
    Rejected,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Applied,
        Status::Interview,
        Status::Offer,
        Status::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Applied => "Applied",
            Status::Interview => "Interview",
            Status::Offer => "Offer",
            Status::Rejected => "Rejected",
        }
    }

    /// Case-insensitive match against the four status names.
    pub fn parse_lenient(text: &str) -> Option<Status> {
        let text = text.trim();
        Status::ALL
            .into_iter()
            .find(|s| s.as_str().eq_ignore_ascii_case(text))
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::parse_lenient(s).ok_or_else(|| {
            format!(
                "unknown status '{}' (expected Applied, Interview, Offer or Rejected)",
                s
            )
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Platform {
    LinkedIn,
    Indeed,
    #[default]
    Other,
}

impl Platform {
    pub fn detect(url: &str) -> Self {
        if url.contains("linkedin.com") {
            Platform::LinkedIn
        } else if url.contains("indeed.com") {
            Platform::Indeed
        } else {
            Platform::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::LinkedIn => "LinkedIn",
            Platform::Indeed => "Indeed",
            Platform::Other => "Other",
        }
    }

    fn parse_lenient(text: &str) -> Option<Platform> {
        [Platform::LinkedIn, Platform::Indeed, Platform::Other]
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(text.trim()))
    }
}

/// A tracked job application. Serialized form is the stored JSON contract.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Application {
    pub id: i64,
    pub company: String,
    pub role: String,
    pub link: String,
    pub date: DateTime<Utc>,
    pub platform: Platform,
    pub status: Status,
    pub notes: String,
}

impl Application {
    pub fn local_date(&self) -> String {
        self.date
            .with_timezone(&Local)
            .format("%-d %b %Y, %H:%M")
            .to_string()
    }

    pub fn short_date(&self) -> String {
        self.date.with_timezone(&Local).format("%-d %b %Y").to_string()
    }
}

/// Fields recovered from a job page before it becomes an [`Application`].
#[derive(Debug, Clone, PartialEq)]
pub struct JobDraft {
    pub company: String,
    pub role: String,
    pub link: String,
    pub platform: Platform,
}

impl JobDraft {
    pub fn new(link: &str) -> Self {
        Self {
            company: UNKNOWN_COMPANY.to_string(),
            role: UNKNOWN_ROLE.to_string(),
            link: link.to_string(),
            platform: Platform::detect(link),
        }
    }

    pub fn into_application(self, id: i64, date: DateTime<Utc>, status: Status) -> Application {
        Application {
            id,
            company: self.company,
            role: self.role,
            link: self.link,
            date,
            platform: self.platform,
            status,
            notes: String::new(),
        }
    }
}

/// Record as found in storage. Older writers omitted `id`, wrote free-text
/// dates and accepted any status string, so every field is optional here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StoredApplication {
    pub id: Option<i64>,
    pub company: Option<String>,
    pub role: Option<String>,
    pub link: Option<String>,
    pub date: Option<String>,
    pub platform: Option<String>,
    pub status: Option<String>,
    pub notes: Option<String>,
}

/// Coerce stored records into canonical applications: unique ids, UTC dates,
/// known statuses. Order is preserved.
pub fn normalize(records: Vec<StoredApplication>, now: DateTime<Utc>) -> Vec<Application> {
    let explicit: HashSet<i64> = records.iter().filter_map(|r| r.id).collect();
    let mut assigned: HashSet<i64> = HashSet::with_capacity(records.len());

    records
        .into_iter()
        .map(|record| {
            let parsed_date = record.date.as_deref().and_then(parse_date);

            let id = match record.id {
                Some(id) if assigned.insert(id) => id,
                _ => {
                    let base = parsed_date.unwrap_or(now).timestamp_millis();
                    let id = unique_id(base, |c| explicit.contains(&c) || assigned.contains(&c));
                    assigned.insert(id);
                    id
                }
            };

            let date = match parsed_date {
                Some(date) => date,
                None => {
                    if let Some(text) = &record.date {
                        tracing::warn!(id, date = %text, "unrecognized date, using id timestamp");
                    }
                    DateTime::from_timestamp_millis(id).unwrap_or(DateTime::UNIX_EPOCH)
                }
            };

            let status = match record.status.as_deref() {
                None => Status::Applied,
                Some(text) => Status::parse_lenient(text).unwrap_or_else(|| {
                    tracing::warn!(id, status = %text, "unknown status, treating as Applied");
                    Status::Applied
                }),
            };

            let link = record.link.unwrap_or_default();
            let platform = record
                .platform
                .as_deref()
                .and_then(Platform::parse_lenient)
                .unwrap_or_else(|| Platform::detect(&link));

            Application {
                id,
                company: non_empty_or(record.company, UNKNOWN_COMPANY),
                role: non_empty_or(record.role, UNKNOWN_ROLE),
                link,
                date,
                platform,
                status,
                notes: record.notes.unwrap_or_default(),
            }
        })
        .collect()
}

fn non_empty_or(value: Option<String>, fallback: &str) -> String {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => fallback.to_string(),
    }
}

/// Smallest id >= `base` for which `taken` is false.
pub fn unique_id(base: i64, taken: impl Fn(i64) -> bool) -> i64 {
    let mut id = base;
    while taken(id) {
        id += 1;
    }
    id
}

pub fn next_id(existing: &[Application], now: DateTime<Utc>) -> i64 {
    unique_id(now.timestamp_millis(), |c| existing.iter().any(|a| a.id == c))
}

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%d %b %Y",
    "%d %B %Y",
    "%b %d, %Y",
    "%B %d, %Y",
    "%b %d %Y",
    "%B %d %Y",
    "%m/%d/%Y",
];

/// Parse an RFC 3339 instant or one of the common hand-typed date forms.
/// Date-only input maps to midnight UTC.
pub fn parse_date(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    DATE_FORMATS.iter().find_map(|fmt| {
        NaiveDate::parse_from_str(text, fmt)
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(Status),
}

impl StatusFilter {
    pub fn matches(&self, status: Status) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(s) => *s == status,
        }
    }

    /// All -> Applied -> Interview -> Offer -> Rejected -> All
    pub fn cycle(self) -> Self {
        match self {
            StatusFilter::All => StatusFilter::Only(Status::Applied),
            StatusFilter::Only(Status::Applied) => StatusFilter::Only(Status::Interview),
            StatusFilter::Only(Status::Interview) => StatusFilter::Only(Status::Offer),
            StatusFilter::Only(Status::Offer) => StatusFilter::Only(Status::Rejected),
            StatusFilter::Only(Status::Rejected) => StatusFilter::All,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusFilter::All => "All",
            StatusFilter::Only(s) => s.as_str(),
        }
    }
}

impl FromStr for StatusFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        s.parse::<Status>().map(StatusFilter::Only)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub total: usize,
    pub applied: usize,
    pub interview: usize,
    pub offer: usize,
    pub rejected: usize,
}

impl StatusCounts {
    pub fn from_applications(apps: &[Application]) -> Self {
        let mut counts = StatusCounts {
            total: apps.len(),
            ..Default::default()
        };
        for app in apps {
            match app.status {
                Status::Applied => counts.applied += 1,
                Status::Interview => counts.interview += 1,
                Status::Offer => counts.offer += 1,
                Status::Rejected => counts.rejected += 1,
            }
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn stored(json: &str) -> Vec<StoredApplication> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_platform_detect() {
        assert_eq!(Platform::detect("https://www.linkedin.com/jobs/view/1"), Platform::LinkedIn);
        assert_eq!(Platform::detect("https://www.indeed.com/viewjob?jk=abc"), Platform::Indeed);
        assert_eq!(Platform::detect("https://careers.example.com/job/7"), Platform::Other);
    }

    #[test]
    fn test_status_parse_lenient() {
        assert_eq!(Status::parse_lenient(" interview "), Some(Status::Interview));
        assert_eq!(Status::parse_lenient("OFFER"), Some(Status::Offer));
        assert_eq!(Status::parse_lenient("ghosted"), None);
        assert!("nope".parse::<Status>().is_err());
    }

    #[test]
    fn test_parse_date_forms() {
        let midnight = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_date("2026-02-01"), Some(midnight));
        assert_eq!(parse_date("1 Feb 2026"), Some(midnight));
        assert_eq!(parse_date("1 February 2026"), Some(midnight));
        assert_eq!(parse_date("Feb 1, 2026"), Some(midnight));
        assert_eq!(parse_date("02/01/2026"), Some(midnight));
        assert_eq!(
            parse_date("2026-02-01T04:35:00.000Z"),
            Some(Utc.with_ymd_and_hms(2026, 2, 1, 4, 35, 0).unwrap())
        );
        assert_eq!(parse_date("last tuesday"), None);
        assert_eq!(parse_date("  "), None);
    }

    #[test]
    fn test_normalize_keeps_canonical_records() {
        let records = stored(
            r#"[{"id": 1738384500000, "company": "Wipro", "role": "Full Stack Developer",
                 "link": "https://www.linkedin.com/jobs/view/1", "date": "2025-02-01T04:35:00Z",
                 "platform": "LinkedIn", "status": "Interview", "notes": "call back"}]"#,
        );
        let apps = normalize(records, Utc::now());
        assert_eq!(apps.len(), 1);
        let app = &apps[0];
        assert_eq!(app.id, 1738384500000);
        assert_eq!(app.status, Status::Interview);
        assert_eq!(app.platform, Platform::LinkedIn);
        assert_eq!(app.notes, "call back");
    }

    #[test]
    fn test_normalize_assigns_ids_to_legacy_records() {
        let records = stored(
            r#"[{"company": "Acme", "role": "Engineer", "link": "https://x.com/jobs/1",
                 "date": "2026-02-01T00:00:00.000Z", "status": "Applied"},
                {"company": "Beta", "role": "Intern", "link": "https://x.com/jobs/2",
                 "date": "2026-02-01T00:00:00.000Z", "status": "Applied"}]"#,
        );
        let apps = normalize(records, Utc::now());
        let base = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap().timestamp_millis();
        assert_eq!(apps[0].id, base);
        assert_eq!(apps[1].id, base + 1);
        assert_eq!(apps[0].company, "Acme");
        assert_eq!(apps[1].company, "Beta");
    }

    #[test]
    fn test_normalize_reassigns_duplicate_ids() {
        let records = stored(
            r#"[{"id": 5, "company": "A", "role": "R", "date": "2026-01-01"},
                {"id": 5, "company": "B", "role": "R", "date": "2026-01-01"}]"#,
        );
        let apps = normalize(records, Utc::now());
        assert_eq!(apps[0].id, 5);
        assert_ne!(apps[1].id, 5);
    }

    #[test]
    fn test_normalize_unknown_date_and_status() {
        let records = stored(
            r#"[{"id": 86400000, "company": "", "role": "Dev", "date": "sometime", "status": "Ghosted"}]"#,
        );
        let app = &normalize(records, Utc::now())[0];
        assert_eq!(app.date, Utc.with_ymd_and_hms(1970, 1, 2, 0, 0, 0).unwrap());
        assert_eq!(app.status, Status::Applied);
        assert_eq!(app.company, UNKNOWN_COMPANY);
        assert_eq!(app.platform, Platform::Other);
    }

    #[test]
    fn test_next_id_skips_taken() {
        let now = Utc.timestamp_millis_opt(1000).unwrap();
        let existing = vec![JobDraft::new("a").into_application(1000, now, Status::Applied)];
        assert_eq!(next_id(&existing, now), 1001);
        assert_eq!(next_id(&[], now), 1000);
    }

    #[test]
    fn test_status_filter_cycle_and_matches() {
        let mut filter = StatusFilter::All;
        let mut seen = vec![filter.label()];
        for _ in 0..5 {
            filter = filter.cycle();
            seen.push(filter.label());
        }
        assert_eq!(seen, vec!["All", "Applied", "Interview", "Offer", "Rejected", "All"]);
        assert!(StatusFilter::All.matches(Status::Offer));
        assert!(!StatusFilter::Only(Status::Offer).matches(Status::Applied));
        assert_eq!("all".parse::<StatusFilter>(), Ok(StatusFilter::All));
    }

    #[test]
    fn test_status_counts() {
        let now = Utc::now();
        let apps: Vec<Application> = [Status::Applied, Status::Offer, Status::Rejected, Status::Offer]
            .into_iter()
            .enumerate()
            .map(|(i, s)| JobDraft::new("l").into_application(i as i64, now, s))
            .collect();
        let counts = StatusCounts::from_applications(&apps);
        assert_eq!(counts.total, 4);
        assert_eq!(counts.applied, 1);
        assert_eq!(counts.interview, 0);
        assert_eq!(counts.offer, 2);
        assert_eq!(counts.rejected, 1);
    }
}
