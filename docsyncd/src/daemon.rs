use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use docsync_core::{DEFAULT_BASE_URL, DocumentClient};
use tokio_util::sync::CancellationToken;

use crate::intent::{COMMANDS_HELP, Command, parse_command};
use crate::sink::{NotifyLevel, PresentationSink};
use crate::sync::controller::ActionController;
use crate::sync::engine::SyncEngine;
use crate::sync::scheduler::{DEFAULT_POLL_INTERVAL, Scheduler};
use crate::terminal::{InputLines, TerminalSink, stdin_lines};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DaemonConfig {
    pub base_url: String,
    pub poll_interval: Duration,
    pub download_dir: PathBuf,
    pub assume_yes: bool,
}

impl DaemonConfig {
    pub fn from_env() -> Self {
        Self::from_vars(|name| std::env::var(name).ok(), dirs::home_dir().as_deref())
    }

    fn from_vars(vars: impl Fn(&str) -> Option<String>, home: Option<&Path>) -> Self {
        let base_url = vars("DOCSYNC_BASE_URL")
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let poll_interval = Duration::from_secs(parse_u64(
            vars("DOCSYNC_POLL_SECS"),
            DEFAULT_POLL_INTERVAL.as_secs(),
        ));
        let download_dir = vars("DOCSYNC_DOWNLOAD_DIR")
            .filter(|value| !value.trim().is_empty())
            .map(|value| expand_with_home(value.trim(), home))
            .unwrap_or_else(default_download_dir);
        let assume_yes = parse_bool(vars("DOCSYNC_ASSUME_YES"), false);

        Self {
            base_url,
            poll_interval,
            download_dir,
            assume_yes,
        }
    }

    fn client(&self) -> anyhow::Result<DocumentClient> {
        DocumentClient::with_base_url(&self.base_url)
            .with_context(|| format!("invalid document service url {:?}", self.base_url))
    }
}

/// One interactive session: the engine, its refresh timer and the command loop.
pub struct DaemonRuntime {
    config: DaemonConfig,
    sink: Arc<TerminalSink>,
    input: InputLines,
    engine: Arc<SyncEngine>,
    controller: ActionController,
}

impl DaemonRuntime {
    pub fn bootstrap(config: DaemonConfig) -> anyhow::Result<Self> {
        let input = stdin_lines();
        let sink = TerminalSink::stdout(
            Arc::clone(&input),
            config.download_dir.clone(),
            config.assume_yes,
        );
        Self::with_terminal(config, Arc::new(sink), input)
    }

    pub fn with_terminal(
        config: DaemonConfig,
        sink: Arc<TerminalSink>,
        input: InputLines,
    ) -> anyhow::Result<Self> {
        let client = config.client()?;
        let presentation: Arc<dyn PresentationSink> = sink.clone();
        let engine = Arc::new(SyncEngine::new(client, presentation));
        let controller = ActionController::new(Arc::clone(&engine));
        Ok(Self {
            config,
            sink,
            input,
            engine,
            controller,
        })
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let interrupt = CancellationToken::new();
        let watcher = {
            let interrupt = interrupt.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::info!("interrupted");
                    interrupt.cancel();
                }
            })
        };
        let result = self.run_until(interrupt).await;
        watcher.abort();
        result
    }

    /// Runs the session until the input ends, `quit` is entered or
    /// `interrupt` fires. An interrupted action is abandoned mid-flight.
    pub async fn run_until(self, interrupt: CancellationToken) -> anyhow::Result<()> {
        let mut scheduler = Scheduler::new(Arc::clone(&self.engine), self.config.poll_interval);
        tracing::info!(
            base_url = %self.config.base_url,
            poll_secs = scheduler.interval().as_secs(),
            download_dir = %self.config.download_dir.display(),
            "session started"
        );
        scheduler.start();
        self.sink.print("Type `help` for a list of commands.");

        let result = self.command_loop(&interrupt).await;

        if let Some(handle) = scheduler.stop() {
            if let Err(err) = handle.await {
                tracing::warn!("refresh timer ended abnormally: {err}");
            }
        }
        tracing::info!("session ended");
        result
    }

    async fn command_loop(&self, interrupt: &CancellationToken) -> anyhow::Result<()> {
        loop {
            let line = tokio::select! {
                _ = interrupt.cancelled() => return Ok(()),
                line = next_line(&self.input) => line.context("failed to read command")?,
            };
            let Some(line) = line else {
                return Ok(());
            };
            match parse_command(&line) {
                Ok(None) => {}
                Ok(Some(Command::Help)) => self.sink.print(COMMANDS_HELP),
                Ok(Some(Command::Quit)) => return Ok(()),
                Ok(Some(Command::Intent(intent))) => {
                    tracing::debug!(?intent, "dispatching");
                    // Explicit requests always show the table, even when unchanged.
                    self.sink.forget_rendered();
                    tokio::select! {
                        _ = interrupt.cancelled() => {
                            tracing::info!("action abandoned");
                            return Ok(());
                        }
                        () = self.controller.dispatch(intent) => {}
                    }
                }
                Err(err) => self.sink.notify(&err.to_string(), NotifyLevel::Error),
            }
        }
    }
}

/// Fetches the full listing once and returns it as pretty JSON.
pub async fn list_documents(config: &DaemonConfig) -> anyhow::Result<String> {
    let documents = config
        .client()?
        .list()
        .await
        .context("failed to load documents")?;
    serde_json::to_string_pretty(&documents).context("failed to encode document list")
}

include!("daemon_helpers.rs");

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
