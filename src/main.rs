mod capture;
mod classifier;
mod config;
mod dashboard;
mod error;
mod extractor;
mod models;
mod page;
mod store;
mod tui;
mod watcher;

use anyhow::{Context, Result};
use capture::{ActionControl, FixedStatus, StatusPrompt, StdinPrompt, StoreContext};
use clap::{Parser, Subcommand};
use config::Config;
use dashboard::{Dashboard, NewApplication};
use extractor::Extractor;
use models::{Status, StatusCounts, StatusFilter};
use page::Page;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use store::{decode_applications, ApplicationRepository, Store};

#[derive(Parser)]
#[command(name = "jobsync")]
#[command(about = "Save job postings as you browse and track your applications")]
struct Cli {
    /// Store file (overrides the config file)
    #[arg(long, global = true, env = "JOBSYNC_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the store
    Init {
        /// Wipe all saved data and start a new store instance
        #[arg(long)]
        force: bool,
    },

    /// Save the job posting at URL
    Capture {
        /// Page URL
        url: String,

        /// Read the page from a saved HTML file instead of fetching it
        #[arg(long)]
        html: Option<PathBuf>,

        /// Initial status (skips the prompt)
        #[arg(short, long)]
        status: Option<Status>,
    },

    /// Show what capture would detect on a page, without saving
    Check {
        /// Page URL
        url: String,

        /// Read the page from a saved HTML file instead of fetching it
        #[arg(long)]
        html: Option<PathBuf>,
    },

    /// List saved applications
    List {
        /// Only show this status (applied, interview, offer, rejected)
        #[arg(short, long)]
        status: Option<Status>,
    },

    /// Show application counts by status
    Stats,

    /// Add an application manually
    Add {
        #[arg(long)]
        company: String,

        #[arg(long)]
        role: String,

        /// Date applied (e.g. 2026-02-03 or "3 Feb 2026")
        #[arg(long)]
        date: String,

        #[arg(long, default_value = "")]
        link: String,

        #[arg(short, long, default_value = "Applied")]
        status: Status,
    },

    /// Change an application's status
    Status {
        /// Application ID
        id: i64,

        /// New status
        status: Status,
    },

    /// Delete an application
    Delete {
        /// Application ID
        id: i64,

        /// Don't ask for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Print all applications as JSON
    Export,

    /// Merge applications from a JSON file
    Import {
        /// JSON array of application records
        file: PathBuf,
    },

    /// Open the interactive dashboard
    Dashboard,
}

fn load_page(url: &str, html: Option<&Path>, config: &Config) -> Result<Page> {
    match html {
        Some(path) => Page::from_file(path, url)
            .with_context(|| format!("Failed to load page snapshot: {}", path.display())),
        None => Page::fetch(url, &config.user_agent, config.fetch_timeout())
            .with_context(|| format!("Failed to fetch {}", url)),
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

fn print_counts(counts: &StatusCounts) {
    println!("Total:      {}", counts.total);
    println!("Applied:    {}", counts.applied);
    println!("Interviews: {}", counts.interview);
    println!("Offers:     {}", counts.offer);
    println!("Rejected:   {}", counts.rejected);
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load()?;
    let db_path = cli.db.clone().unwrap_or_else(|| config.db_path());
    let store = Store::open(&db_path)
        .with_context(|| format!("Failed to open store: {}", db_path.display()))?;

    if !matches!(cli.command, Commands::Init { .. }) {
        store.ensure_initialized()?;
    }
    let repo = ApplicationRepository::new(&store);

    match cli.command {
        Commands::Init { force } => {
            store.init(force)?;
            if force {
                println!("Store reset at {}", store.path().display());
            } else {
                println!("Store initialized at {}", store.path().display());
            }
        }

        Commands::Capture { url, html, status } => {
            let page = load_page(&url, html.as_deref(), &config)?;
            let context = StoreContext::attach(&store);

            let Some(control) = ActionControl::inject(&page) else {
                println!("Not a job page - no save action offered");
                return Ok(());
            };

            let mut prompt: Box<dyn StatusPrompt> = match status {
                Some(status) => Box::new(FixedStatus(status)),
                None => Box::new(StdinPrompt),
            };
            let outcome = control.click(
                &context,
                &repo,
                &Extractor::default(),
                prompt.as_mut(),
                config.default_status,
            )?;
            println!("{}", outcome.message());
        }

        Commands::Check { url, html } => {
            let page = load_page(&url, html.as_deref(), &config)?;
            let draft = Extractor::default().extract(&page);

            println!("URL:          {}", page.url);
            println!("Title:        {}", page.title);
            println!("Job keywords: {}", classifier::has_job_keyword(&page.url, &page.title));
            println!("Job elements: {}", classifier::has_job_elements(&page));
            if classifier::is_job_page(&page) {
                println!("\nSave action would be offered for:");
                println!("  Company:  {}", draft.company);
                println!("  Role:     {}", draft.role);
                println!("  Platform: {}", draft.platform.as_str());
            } else {
                println!("\nNot a job page - no save action offered");
            }
        }

        Commands::List { status } => {
            let filter = status.map(StatusFilter::Only).unwrap_or_default();
            let dash = Dashboard::load(&repo)?;
            let apps = dash.visible(filter);
            if apps.is_empty() {
                println!("No applications found.");
            } else {
                println!(
                    "{:<15} {:<20} {:<28} {:<10} {:<20}",
                    "ID", "COMPANY", "ROLE", "STATUS", "DATE"
                );
                println!("{}", "-".repeat(96));
                for app in apps {
                    println!(
                        "{:<15} {:<20} {:<28} {:<10} {:<20}",
                        app.id,
                        truncate(&app.company, 18),
                        truncate(&app.role, 26),
                        app.status,
                        app.local_date()
                    );
                }
            }
        }

        Commands::Stats => {
            let dash = Dashboard::load(&repo)?;
            print_counts(&dash.counts());
        }

        Commands::Add {
            company,
            role,
            date,
            link,
            status,
        } => {
            let mut dash = Dashboard::load(&repo)?;
            let app = dash.add(&NewApplication {
                company,
                role,
                status,
                date,
                link,
            })?;
            println!("Added application #{}: {} at {}", app.id, app.role, app.company);
        }

        Commands::Status { id, status } => {
            let mut dash = Dashboard::load(&repo)?;
            dash.set_status(id, status)?;
            println!("Application #{} marked {}.", id, status);
        }

        Commands::Delete { id, yes } => {
            let mut dash = Dashboard::load(&repo)?;
            let Some(app) = dash.get(id) else {
                println!("Application #{} not found.", id);
                return Ok(());
            };
            let question = format!("Delete {} at {}?", app.role, app.company);
            if !yes && !confirm(&question)? {
                println!("Cancelled.");
                return Ok(());
            }
            let removed = dash.delete(id)?;
            println!("Deleted {} at {}.", removed.role, removed.company);
        }

        Commands::Export => {
            let dash = Dashboard::load(&repo)?;
            println!("{}", serde_json::to_string_pretty(dash.applications())?);
        }

        Commands::Import { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let value: serde_json::Value = serde_json::from_str(&content)
                .with_context(|| format!("Invalid JSON in {}", file.display()))?;
            let incoming = decode_applications(value)
                .with_context(|| format!("{} is not a list of applications", file.display()))?;
            let total = incoming.len();

            let mut dash = Dashboard::load(&repo)?;
            let added = dash.import(incoming)?;
            println!("Imported {} of {} application(s).", added, total);
            if added < total {
                println!("Skipped {} already saved.", total - added);
            }
        }

        Commands::Dashboard => {
            let mut dash = Dashboard::load(&repo)?;
            tui::run_dashboard(&store, &mut dash, config.poll_interval())?;
        }
    }

    Ok(())
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
