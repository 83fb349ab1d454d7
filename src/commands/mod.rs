//! Command dispatch (EMBP gateway).
//!
//! Each subcommand lives in its own file and only sees what this module
//! hands it: the loaded [`Config`], the selected device and a [`Painter`].
//! Device-facing commands load and validate the config file before anything
//! else happens, so a bad threshold never costs a network round trip.
//! `config show|set` works on the raw file, so an invalid file can still be
//! inspected and repaired.

use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context as _, Result};

use crate::cli::{Cli, Command};
use crate::device::{DeviceClient, Snapshot};
use crate::render::Painter;
use crate::{Config, DeviceConfig, HistoricalRecord, HistoryStore};

mod alerts;
mod edit_config;
mod history;
mod readings;
mod status;
mod store;

// ---

/// What every device-facing command works with.
pub(crate) struct Context {
    pub config: Config,
    pub device: DeviceConfig,
    pub painter: Painter,
}

/// Run one parsed invocation and return the process exit status.
pub async fn run(cli: Cli) -> Result<ExitCode> {
    // ---
    let path = crate::config::resolve_path(cli.config.as_deref());
    let painter = Painter::from_env();
    let hint = cli.device.as_deref();

    match cli.command {
        Command::Config(args) => edit_config::run(&path, &painter, &args),
        Command::Status => status::run(&Context::load(&path, hint, painter)?).await,
        Command::Readings(args) => readings::run(&Context::load(&path, hint, painter)?, &args).await,
        Command::History(args) => history::run(&Context::load(&path, hint, painter)?, &args).await,
        Command::Alerts => alerts::run(&Context::load(&path, hint, painter)?).await,
        Command::Store => store::run(&Context::load(&path, hint, painter)?).await,
    }
}

impl Context {
    /// Load and validate the config at `path`, then select the device.
    fn load(path: &Path, hint: Option<&str>, painter: Painter) -> Result<Context> {
        // ---
        let config = Config::load(path)?;
        config.log_config();

        let device = config.select_device(hint)?.clone();
        tracing::debug!(device = device.display_name(), "device selected");

        Ok(Context {
            config,
            device,
            painter,
        })
    }

    /// Fetch the current reading; append it to the history when `persist`.
    pub(crate) async fn fetch_and_maybe_store(&self, persist: bool) -> Result<Snapshot> {
        // ---
        let endpoint = self.device.endpoint()?;
        let client = DeviceClient::new(self.config.network.timeout)?;

        let snapshot = client
            .fetch(&endpoint, self.device.storage_label())
            .await
            .with_context(|| format!("could not read device '{}'", self.device.display_name()))?;

        if persist {
            let db_path = &self.config.storage.db_path;
            let store = HistoryStore::open(db_path)
                .await
                .with_context(|| format!("could not open history at {}", db_path.display()))?;
            store
                .append(&HistoricalRecord::new(snapshot.reading.clone()))
                .await
                .context("could not store reading")?;
            store.close().await;
        }

        Ok(snapshot)
    }
}
