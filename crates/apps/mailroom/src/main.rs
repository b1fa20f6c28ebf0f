//! Mailroom - a mail client front-end
//!
//! Boots the application against the configured backend, follows the
//! requested fragment, waits for every request to complete and prints the
//! resulting page.

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info, warn};
use mail::{Attributes, BackendConfig, HttpTransport, InMemoryTransport, Transport};
use serde_json::{Value, json};
use std::path::PathBuf;
use std::rc::Rc;

mod app;
mod assets;
mod dom;
mod router;
mod templates;
mod views;

use app::App;

#[derive(Parser, Debug)]
#[command(name = "mailroom", author, version, about)]
struct Cli {
    /// Fragment to open, for example `config-mailboxes`
    #[arg(value_name = "FRAGMENT", default_value = "")]
    fragment: String,

    /// Use built-in demo data instead of a backend
    #[arg(long)]
    offline: bool,

    /// Override the configured backend base URL
    #[arg(long, value_name = "URL", conflicts_with = "offline")]
    backend: Option<String>,

    /// Remember the `--backend` URL for later runs
    #[arg(long, requires = "backend")]
    save: bool,

    /// Write the page to a file instead of standard output
    #[arg(long, short, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Fail on unknown fragments instead of showing the mail layout
    #[arg(long)]
    strict: bool,
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // Bootstrap config directory
    if let Err(e) = config::init() {
        error!("Failed to initialize config directory: {}", e);
    }

    let cli = Cli::parse();
    let app = App::new(transport(&cli)?);

    if cli.strict {
        app.start_strict(&cli.fragment)?;
    } else {
        app.start(&cli.fragment);
    }
    let completed = app.run_until_idle();
    info!("{} requests completed", completed);

    let page = assets::page_html("Mailroom", &app.html());
    match &cli.output {
        Some(path) => {
            std::fs::write(path, page)
                .with_context(|| format!("Failed to write page to {}", path.display()))?;
            info!("Page written to {}", path.display());
        }
        None => print!("{page}"),
    }
    Ok(())
}

fn transport(cli: &Cli) -> Result<Rc<dyn Transport>> {
    if cli.offline {
        info!("Using built-in demo data");
        return Ok(Rc::new(demo_transport()));
    }

    let config = match &cli.backend {
        Some(url) => {
            let config = BackendConfig {
                base_url: url.clone(),
            };
            if cli.save {
                config.save().context("Failed to save backend config")?;
                if let Some(path) = BackendConfig::default_config_path() {
                    info!("Backend saved to {}", path.display());
                }
            }
            config
        }
        None => BackendConfig::load().unwrap_or_else(|e| {
            warn!("Failed to load backend config, using defaults: {}", e);
            if let Some(path) = BackendConfig::default_config_path() {
                warn!("To configure the backend, edit {}", path.display());
            }
            BackendConfig::default()
        }),
    };

    let transport = HttpTransport::from_config(&config).context("Invalid backend configuration")?;
    info!("Using backend at {}", transport.base_url());
    Ok(Rc::new(transport))
}

fn records(values: Vec<Value>) -> Vec<Attributes> {
    values
        .into_iter()
        .filter_map(|value| match value {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

/// In-memory transport seeded with a couple of mailboxes and mails
fn demo_transport() -> InMemoryTransport {
    let transport = InMemoryTransport::new();
    transport.seed(
        "mailboxes/",
        records(vec![
            json!({
                "name": "Work",
                "login": "ada",
                "IMAP_server": "imap.example.com",
                "SMTP_send_as": "Ada Lovelace",
                "checked": true,
                "new_messages": 2
            }),
            json!({
                "name": "Personal",
                "login": "ada.l",
                "IMAP_server": "imap.gmail.com",
                "SMTP_send_as": "Ada",
                "checked": false
            }),
        ]),
    );
    transport.seed(
        "mails/",
        records(vec![
            json!({
                "from": "Charles Babbage",
                "subject": "Notes on the engine",
                "date": "2012-06-01T09:30:00Z",
                "html": "The translation is wonderful."
            }),
            json!({
                "from": "Mary Somerville",
                "subject": "Lunch on Thursday?",
                "date": "2012-06-02T12:15:00Z",
                "html": "Shall we meet at noon?"
            }),
        ]),
    );
    transport
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_save_needs_backend() {
        assert!(Cli::try_parse_from(["mailroom", "--save"]).is_err());
        let cli = Cli::try_parse_from(["mailroom", "--backend", "http://mail.local/", "--save"]).unwrap();
        assert!(cli.save);
        assert_eq!(cli.backend.as_deref(), Some("http://mail.local/"));
    }

    #[test]
    fn test_offline_conflicts_with_backend() {
        assert!(Cli::try_parse_from(["mailroom", "--offline", "--backend", "http://x/"]).is_err());
        let cli = Cli::try_parse_from(["mailroom", "--offline", "#config-mailboxes"]).unwrap();
        assert_eq!(cli.fragment, "#config-mailboxes");
    }

    #[test]
    fn test_demo_data_renders_offline() {
        let app = App::new(Rc::new(demo_transport()));
        app.start("");
        assert!(app.run_until_idle() >= 2);
        let page = assets::page_html("Mailroom", &app.html());
        assert!(page.contains("Notes on the engine"));
        assert!(page.contains("</head>\n<body><div"));
    }
}
