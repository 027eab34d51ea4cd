use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::HashSet;

use crate::error::{DashboardError, StoreError};
use crate::models::{
    next_id, parse_date, unique_id, Application, Platform, Status, StatusCounts, StatusFilter,
};
use crate::store::{ApplicationStore, StorageArea, Store};

pub const FILTER_KEY: &str = "dashboardFilter";

/// Records matching the filter, in stored order.
pub fn filtered(apps: &[Application], filter: StatusFilter) -> Vec<&Application> {
    apps.iter().filter(|a| filter.matches(a.status)).collect()
}

pub fn with_status(
    apps: &[Application],
    id: i64,
    status: Status,
) -> Result<Vec<Application>, DashboardError> {
    if !apps.iter().any(|a| a.id == id) {
        return Err(DashboardError::NotFound(id));
    }
    Ok(apps
        .iter()
        .map(|a| {
            if a.id == id {
                Application {
                    status,
                    ..a.clone()
                }
            } else {
                a.clone()
            }
        })
        .collect())
}

pub fn without(apps: &[Application], id: i64) -> Result<Vec<Application>, DashboardError> {
    if !apps.iter().any(|a| a.id == id) {
        return Err(DashboardError::NotFound(id));
    }
    Ok(apps.iter().filter(|a| a.id != id).cloned().collect())
}

/// The manual-entry form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewApplication {
    pub company: String,
    pub role: String,
    pub status: Status,
    pub date: String,
    pub link: String,
}

impl NewApplication {
    pub fn build(
        &self,
        existing: &[Application],
        now: DateTime<Utc>,
    ) -> Result<Application, DashboardError> {
        let company = self.company.trim();
        let role = self.role.trim();
        let link = self.link.trim();

        if company.is_empty() {
            return Err(DashboardError::MissingField("Company"));
        }
        if role.is_empty() {
            return Err(DashboardError::MissingField("Role"));
        }
        if self.date.trim().is_empty() {
            return Err(DashboardError::MissingField("Date"));
        }
        let date =
            parse_date(&self.date).ok_or_else(|| DashboardError::InvalidDate(self.date.clone()))?;

        if !link.is_empty() && existing.iter().any(|a| a.link == link) {
            return Err(DashboardError::DuplicateLink(link.to_string()));
        }

        Ok(Application {
            id: next_id(existing, now),
            company: company.to_string(),
            role: role.to_string(),
            link: link.to_string(),
            date,
            platform: Platform::detect(link),
            status: self.status,
            notes: String::new(),
        })
    }
}

/// Append `incoming` records whose link is empty or not yet present.
/// Colliding ids are moved to the next free one. Returns how many were added.
pub fn merge(existing: &mut Vec<Application>, incoming: Vec<Application>) -> usize {
    let mut links: HashSet<String> = existing
        .iter()
        .filter(|a| !a.link.is_empty())
        .map(|a| a.link.clone())
        .collect();
    let mut ids: HashSet<i64> = existing.iter().map(|a| a.id).collect();
    let mut added = 0;

    for mut app in incoming {
        if !app.link.is_empty() && !links.insert(app.link.clone()) {
            tracing::debug!(link = %app.link, "skipping already saved link");
            continue;
        }
        app.id = unique_id(app.id, |c| ids.contains(&c));
        ids.insert(app.id);
        existing.push(app);
        added += 1;
    }
    added
}

/// The dashboard's in-memory copy of the list and the store it writes to.
/// Every mutation computes a new list, writes it whole, then adopts it.
pub struct Dashboard<'a> {
    store: &'a dyn ApplicationStore,
    applications: Vec<Application>,
}

impl<'a> Dashboard<'a> {
    pub fn load(store: &'a dyn ApplicationStore) -> Result<Self, DashboardError> {
        let applications = store.get_all()?;
        Ok(Self {
            store,
            applications,
        })
    }

    pub fn reload(&mut self) -> Result<(), DashboardError> {
        self.applications = self.store.get_all()?;
        Ok(())
    }

    pub fn applications(&self) -> &[Application] {
        &self.applications
    }

    pub fn get(&self, id: i64) -> Option<&Application> {
        self.applications.iter().find(|a| a.id == id)
    }

    pub fn counts(&self) -> StatusCounts {
        StatusCounts::from_applications(&self.applications)
    }

    pub fn visible(&self, filter: StatusFilter) -> Vec<&Application> {
        filtered(&self.applications, filter)
    }

    pub fn set_status(&mut self, id: i64, status: Status) -> Result<(), DashboardError> {
        let updated = with_status(&self.applications, id, status)?;
        self.commit(updated)?;
        tracing::info!(id, %status, "status changed");
        Ok(())
    }

    pub fn delete(&mut self, id: i64) -> Result<Application, DashboardError> {
        let removed = self.get(id).cloned().ok_or(DashboardError::NotFound(id))?;
        let updated = without(&self.applications, id)?;
        self.commit(updated)?;
        tracing::info!(id, "application deleted");
        Ok(removed)
    }

    pub fn add(&mut self, form: &NewApplication) -> Result<Application, DashboardError> {
        let app = form.build(&self.applications, Utc::now())?;
        let mut updated = self.applications.clone();
        updated.push(app.clone());
        self.commit(updated)?;
        tracing::info!(id = app.id, company = %app.company, "application added");
        Ok(app)
    }

    pub fn import(&mut self, incoming: Vec<Application>) -> Result<usize, DashboardError> {
        let mut updated = self.applications.clone();
        let added = merge(&mut updated, incoming);
        if added > 0 {
            self.commit(updated)?;
        }
        Ok(added)
    }

    fn commit(&mut self, updated: Vec<Application>) -> Result<(), DashboardError> {
        self.store.replace_all(&updated)?;
        self.applications = updated;
        Ok(())
    }
}

pub fn load_filter(store: &Store) -> StatusFilter {
    match store.get(StorageArea::Local, FILTER_KEY) {
        Ok(Some(Value::String(label))) => label.parse().unwrap_or_default(),
        Ok(_) => StatusFilter::All,
        Err(e) => {
            tracing::warn!(error = %e, "could not read saved filter");
            StatusFilter::All
        }
    }
}

pub fn save_filter(store: &Store, filter: StatusFilter) -> Result<(), StoreError> {
    store.set(
        StorageArea::Local,
        FILTER_KEY,
        &Value::String(filter.label().to_string()),
    )
}
