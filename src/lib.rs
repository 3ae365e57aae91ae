pub mod error;
pub mod milestones;
pub mod models;
pub mod operator;
pub mod orchestrator;
pub mod rotation;
pub mod settings;
pub mod source;
pub mod trends;
mod utils;

use std::{path::PathBuf, sync::Arc};

use anyhow::Context;
use log::{info, warn};
use tokio::io::{AsyncBufReadExt, BufReader};

pub use error::{DisplayError, SourceError};
pub use milestones::MilestoneDedupPoller;
pub use orchestrator::{DisplayOrchestrator, DisplaySnapshot};
pub use rotation::SceneScheduler;
pub use trends::{aggregate, TrendEvent, TrendPoint};
pub use utils::logging::init_logging;

use operator::OperatorCommand;
use settings::SettingsStore;
use source::HttpEventSource;

const DEFAULT_SETTINGS_FILE: &str = "venue-display.json";

/// Headless runner: drives the display from the configured backend and
/// logs what a rendering surface would show.
pub async fn run() -> anyhow::Result<()> {
    init_logging();
    info!("venue display starting up...");

    let settings_path = std::env::var("VENUE_DISPLAY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_SETTINGS_FILE));
    let store = SettingsStore::new(settings_path)?;
    let settings = store.settings();

    let source = HttpEventSource::new(settings.source_config())
        .with_context(|| format!("failed to set up backend client for {}", settings.api_base_url))?;
    let display = DisplayOrchestrator::new(Arc::new(source), settings);
    display.start().await;

    let mut updates = display.subscribe();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut shown = ShownState::default();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = updates.borrow_and_update().clone();
                shown.render(&snapshot);
            }
            line = lines.next_line(), if stdin_open => {
                match line.context("failed to read operator input")? {
                    Some(line) => match OperatorCommand::parse(&line) {
                        Some(OperatorCommand::Skip) => display.skip().await,
                        Some(OperatorCommand::Dismiss) => display.dismiss().await,
                        Some(OperatorCommand::ReducedMotion(reduced)) => {
                            display.set_reduced_motion(reduced);
                            if let Err(err) = store.update_reduced_motion(reduced) {
                                warn!("could not save motion preference: {err:#}");
                            }
                        }
                        Some(OperatorCommand::Status) => {
                            let status = serde_json::json!({
                                "display": display.snapshot().await,
                                "dashboard": display.dashboard().await,
                            });
                            println!("{}", serde_json::to_string_pretty(&status)?);
                        }
                        Some(OperatorCommand::Quit) => break,
                        None => warn!("unknown command '{}'", line.trim()),
                    },
                    None => stdin_open = false,
                }
            }
            _ = &mut ctrl_c => break,
        }
    }

    display.shutdown().await;
    Ok(())
}

/// Remembers what was last announced so only transitions are logged.
#[derive(Default)]
struct ShownState {
    scene_id: Option<String>,
    celebration_id: Option<i64>,
}

impl ShownState {
    fn render(&mut self, snapshot: &DisplaySnapshot) {
        if self.scene_id.as_deref() != Some(snapshot.scene_id.as_str()) {
            if snapshot.scene_id.is_empty() {
                info!("no scenes configured; showing placeholder");
            } else {
                info!("showing scene '{}'", snapshot.scene_id);
            }
            self.scene_id = Some(snapshot.scene_id.clone());
        }

        let celebration_id = snapshot.celebration.as_ref().map(|c| c.event.id);
        if celebration_id != self.celebration_id {
            if let Some(celebration) = &snapshot.celebration {
                info!(
                    "celebrating '{}' ({:?}, {} transactions, {} sats)",
                    celebration.event.name,
                    celebration.effect,
                    celebration.event.total_transactions,
                    celebration.event.total_volume
                );
            }
            self.celebration_id = celebration_id;
        }
    }
}
