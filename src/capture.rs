use chrono::Utc;
use std::io::{self, BufRead, Write};

use crate::classifier::is_job_page;
use crate::error::CaptureError;
use crate::extractor::Extractor;
use crate::models::{next_id, Application, Status};
use crate::page::Page;
use crate::store::{ApplicationStore, Store};

/// The live identity of the environment a page was loaded in.
/// `None` means that environment is gone and the page must be reloaded.
pub trait RuntimeContext {
    fn runtime_id(&self) -> Option<String>;
}

/// Ties a loaded page to the store instance that existed at load time.
/// Re-initializing the store with `--force` invalidates it.
pub struct StoreContext<'a> {
    store: &'a Store,
    loaded_id: Option<String>,
}

impl<'a> StoreContext<'a> {
    pub fn attach(store: &'a Store) -> Self {
        let loaded_id = store.instance_id().ok().flatten();
        Self { store, loaded_id }
    }
}

impl RuntimeContext for StoreContext<'_> {
    fn runtime_id(&self) -> Option<String> {
        let current = self.store.instance_id().ok().flatten()?;
        (self.loaded_id.as_deref() == Some(current.as_str())).then_some(current)
    }
}

/// Asks the user for the initial status. `None` means the prompt was dismissed.
pub trait StatusPrompt {
    fn ask(&mut self, default: Status) -> Option<String>;
}

pub struct StdinPrompt;

impl StatusPrompt for StdinPrompt {
    fn ask(&mut self, default: Status) -> Option<String> {
        print!("Set initial status [{}]: ", default);
        io::stdout().flush().ok()?;
        let mut line = String::new();
        match io::stdin().lock().read_line(&mut line) {
            Ok(0) | Err(_) => None,
            Ok(_) => Some(line),
        }
    }
}

/// Answers every prompt with the same status (`--status` on the command line).
pub struct FixedStatus(pub Status);

impl StatusPrompt for FixedStatus {
    fn ask(&mut self, _default: Status) -> Option<String> {
        Some(self.0.to_string())
    }
}

/// Empty or dismissed answers take the default; unrecognized text too.
pub fn resolve_status(answer: Option<String>, default: Status) -> Status {
    let Some(answer) = answer else { return default };
    if answer.trim().is_empty() {
        return default;
    }
    Status::parse_lenient(&answer).unwrap_or_else(|| {
        tracing::warn!(answer = answer.trim(), %default, "unrecognized status, using default");
        default
    })
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(Application),
    AlreadySaved { link: String },
}

impl SaveOutcome {
    pub fn message(&self) -> String {
        match self {
            SaveOutcome::Saved(app) => format!(
                "Saved!\n{} at {}\nStatus: {}",
                app.role, app.company, app.status
            ),
            SaveOutcome::AlreadySaved { .. } => "This application is already saved!".to_string(),
        }
    }
}

/// The save action offered on a job page. Only exists for pages the
/// classifier accepts.
pub struct ActionControl<'p> {
    page: &'p Page,
}

impl<'p> ActionControl<'p> {
    pub const LABEL: &'static str = "Save Application";

    pub fn inject(page: &'p Page) -> Option<Self> {
        if is_job_page(page) {
            tracing::info!(url = %page.url, "job page detected, save action offered");
            Some(Self { page })
        } else {
            tracing::info!(url = %page.url, "not a job page, no save action");
            None
        }
    }

    /// Extract, check for a saved duplicate, prompt for a status, append and
    /// write the whole list back. A failed step aborts; nothing is retried.
    pub fn click(
        &self,
        context: &dyn RuntimeContext,
        store: &dyn ApplicationStore,
        extractor: &Extractor,
        prompt: &mut dyn StatusPrompt,
        default_status: Status,
    ) -> Result<SaveOutcome, CaptureError> {
        if context.runtime_id().is_none() {
            tracing::error!(url = %self.page.url, "runtime context invalidated, page reload needed");
            return Err(CaptureError::ContextInvalidated);
        }

        let draft = extractor.extract(self.page);

        let apps = store.get_all().map_err(|e| {
            tracing::error!(error = %e, "storage read failed");
            CaptureError::Read(e)
        })?;

        if apps.iter().any(|a| a.link == draft.link) {
            tracing::info!(link = %draft.link, "duplicate found");
            return Ok(SaveOutcome::AlreadySaved { link: draft.link });
        }

        let status = resolve_status(prompt.ask(default_status), default_status);

        let now = Utc::now();
        let app = draft.into_application(next_id(&apps, now), now, status);
        let mut updated = apps;
        updated.push(app.clone());

        store.replace_all(&updated).map_err(|e| {
            tracing::error!(error = %e, "storage write failed");
            CaptureError::Write(e)
        })?;

        tracing::info!(count = updated.len(), company = %app.company, role = %app.role, "application saved");
        Ok(SaveOutcome::Saved(app))
    }
}
