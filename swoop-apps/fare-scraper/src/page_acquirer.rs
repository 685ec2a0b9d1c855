//!  Swoop Fare Scraper
//!
//!  Copyright (C) 2026  Mamy Ratsimbazafy
//!
//!  This program is free software: you can redistribute it and/or modify
//!  it under the terms of the GNU Affero General Public License as published by
//!  the Free Software Foundation, either version 3 of the License, or
//!  (at your option) any later version.
//!
//!  This program is distributed in the hope that it will be useful,
//!  but WITHOUT ANY WARRANTY; without even the implied warranty of
//!  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//!  GNU Affero General Public License for more details.
//!
//!  You should have received a copy of the GNU Affero General Public License
//!  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! # Page Acquirer
//!
//! Effectful (browser, time) half of a search: launch a disguised browser
//! session, load the search URL, get past the confirmation interstitial when
//! the site redirects to it, and capture the rendered markup.
//!
//! ```text
//! Init -> Navigating -> [Confirming] -> Extracted -> Closed
//! ```
//!
//! Every suspension point is bounded by a timeout and the session is closed
//! on every exit path, including when the caller drops the future.

use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use swoop_browser_disguise::Disguise;

use crate::error::SearchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AcquisitionState {
    Init,
    Navigating,
    Confirming,
    Extracted,
    Closed,
}

impl fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self {
            AcquisitionState::Init => "launching the browser",
            AcquisitionState::Navigating => "loading the search page",
            AcquisitionState::Confirming => "confirming the search form",
            AcquisitionState::Extracted => "extracting the rendered page",
            AcquisitionState::Closed => "closing the browser",
        };
        f.write_str(what)
    }
}

/// One exclusively owned browser page.
///
/// Implementations may block for as long as they like: the acquirer wraps
/// every call in a timeout and drops the future when it fires.
pub trait BrowserSession: Send {
    fn navigate(&mut self, url: &str) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Resolve once the document is loaded and no new network requests have
    /// started for `quiet_window`.
    fn wait_network_idle(
        &mut self,
        quiet_window: Duration,
        poll_interval: Duration,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn current_url(&mut self) -> impl Future<Output = anyhow::Result<String>> + Send;

    fn wait_visible(
        &mut self,
        css: &str,
        poll_interval: Duration,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn click(&mut self, css: &str) -> impl Future<Output = anyhow::Result<()>> + Send;

    /// Resolve once the navigation triggered by the last `click` has loaded
    /// a new document.
    fn wait_for_navigation(
        &mut self,
        poll_interval: Duration,
    ) -> impl Future<Output = anyhow::Result<()>> + Send;

    fn page_source(&mut self) -> impl Future<Output = anyhow::Result<String>> + Send;

    /// Release the browser. Called exactly once per session.
    fn close(&mut self) -> impl Future<Output = anyhow::Result<()>> + Send;
}

/// Starts a fresh, isolated session wearing the given disguise.
/// Launches run on their own task, so a launcher is cloned into it.
pub trait BrowserLauncher: Clone + Send + Sync + 'static {
    type Session: BrowserSession + 'static;

    fn launch(
        &self,
        disguise: &Disguise,
    ) -> impl Future<Output = anyhow::Result<Self::Session>> + Send;
}

/// Receives the raw rendered page for offline inspection.
pub trait DebugSink: Send + Sync {
    fn persist(&self, artifact_name: &str, html: &str) -> anyhow::Result<()>;
}

/// Writes debug pages into a directory.
#[derive(Debug, Clone)]
pub struct FileDebugSink {
    dir: PathBuf,
}

impl FileDebugSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DebugSink for FileDebugSink {
    fn persist(&self, artifact_name: &str, html: &str) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {:?}", self.dir))?;
        let path = self.dir.join(artifact_name);
        std::fs::write(&path, html).with_context(|| format!("Failed to write {:?}", path))?;
        tracing::info!("Saved HTML to {}", path.display());
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AcquirerConfig {
    pub launch_timeout: Duration,
    pub navigation_timeout: Duration,
    pub idle_timeout: Duration,
    pub element_timeout: Duration,
    pub close_timeout: Duration,
    pub network_quiet_window: Duration,
    pub poll_interval: Duration,
    pub confirm_button_selector: String,
}

impl Default for AcquirerConfig {
    fn default() -> Self {
        Self {
            launch_timeout: Duration::from_secs(30),
            navigation_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(20),
            element_timeout: Duration::from_secs(15),
            close_timeout: Duration::from_secs(10),
            network_quiet_window: Duration::from_millis(500),
            poll_interval: Duration::from_millis(100),
            confirm_button_selector: r#"button[id="form-mixin--submit-button"]"#.to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AcquiredPage {
    pub requested_url: String,
    pub final_url: String,
    /// Whether the confirmation interstitial had to be submitted.
    pub confirmed: bool,
    pub html: String,
}

pub struct PageAcquirer<L> {
    launcher: L,
    config: AcquirerConfig,
    debug_sink: Option<Arc<dyn DebugSink>>,
}

impl<L: BrowserLauncher> PageAcquirer<L> {
    pub fn new(launcher: L, config: AcquirerConfig) -> Self {
        Self {
            launcher,
            config,
            debug_sink: None,
        }
    }

    pub fn with_debug_sink(mut self, sink: Arc<dyn DebugSink>) -> Self {
        self.debug_sink = Some(sink);
        self
    }

    pub fn config(&self) -> &AcquirerConfig {
        &self.config
    }

    /// Fetch the fully rendered document behind `url` with a brand new
    /// browser session. `artifact_name` names the debug copy of the page.
    pub async fn acquire(
        &self,
        url: &str,
        artifact_name: &str,
    ) -> Result<AcquiredPage, SearchError> {
        let disguise = Disguise::random();
        tracing::debug!(
            "Launching browser as {} on {}",
            disguise.user_agent,
            disguise.platform
        );

        let launch_start = Instant::now();
        let session = self.launch(disguise).await?;
        tracing::debug!("Browser session ready in {:?}", launch_start.elapsed());

        let mut guard = SessionGuard::new(session);
        let outcome = match guard.get() {
            Ok(session) => self.drive(session, url).await,
            Err(err) => Err(err),
        };
        guard.close(self.config.close_timeout).await;

        let page = outcome?;
        if let Some(sink) = &self.debug_sink {
            if let Err(e) = sink.persist(artifact_name, &page.html) {
                tracing::warn!("Could not persist debug page {}: {:#}", artifact_name, e);
            }
        }
        Ok(page)
    }

    /// A launch that outlives `launch_timeout` keeps running in the
    /// background and its session is closed as soon as it shows up.
    async fn launch(&self, disguise: Disguise) -> Result<L::Session, SearchError> {
        let state = AcquisitionState::Init;
        let timeout = self.config.launch_timeout;
        let launcher = self.launcher.clone();
        let mut pending = PendingLaunch {
            task: Some(tokio::spawn(async move { launcher.launch(&disguise).await })),
            late_window: timeout,
        };

        match pending.join(timeout).await {
            Some(Ok(Ok(session))) => Ok(session),
            Some(Ok(Err(source))) => {
                tracing::error!("Browser step failed while {}: {:#}", state, source);
                Err(SearchError::Browser { state, source })
            }
            Some(Err(join_error)) => Err(SearchError::Browser {
                state,
                source: anyhow::anyhow!("browser launch task failed: {}", join_error),
            }),
            None => {
                tracing::error!("Browser step timed out after {:?} while {}", timeout, state);
                Err(SearchError::AcquisitionTimeout { state, timeout })
            }
        }
    }

    async fn drive(
        &self,
        session: &mut L::Session,
        url: &str,
    ) -> Result<AcquiredPage, SearchError> {
        let cfg = &self.config;

        let nav_start = Instant::now();
        tracing::debug!("Navigating to {}", url);
        bounded(
            AcquisitionState::Navigating,
            cfg.navigation_timeout,
            session.navigate(url),
        )
        .await?;
        bounded(
            AcquisitionState::Navigating,
            cfg.idle_timeout,
            session.wait_network_idle(cfg.network_quiet_window, cfg.poll_interval),
        )
        .await?;
        let resolved_url = bounded(
            AcquisitionState::Navigating,
            cfg.element_timeout,
            session.current_url(),
        )
        .await?;
        tracing::info!("Search page settled in {:?}", nav_start.elapsed());

        let confirmed = resolved_url != url;
        let final_url = if confirmed {
            tracing::info!("Redirected to {}...", resolved_url);
            self.confirm(session).await?;
            bounded(
                AcquisitionState::Confirming,
                cfg.element_timeout,
                session.current_url(),
            )
            .await?
        } else {
            resolved_url
        };

        let html = bounded(
            AcquisitionState::Extracted,
            cfg.element_timeout,
            session.page_source(),
        )
        .await?;
        tracing::debug!("Captured {} KB of rendered HTML", html.len() / 1024);

        Ok(AcquiredPage {
            requested_url: url.to_string(),
            final_url,
            confirmed,
            html,
        })
    }

    /// Submit the interstitial search form and wait for the results page.
    async fn confirm(&self, session: &mut L::Session) -> Result<(), SearchError> {
        let cfg = &self.config;
        let confirm_start = Instant::now();
        bounded(
            AcquisitionState::Confirming,
            cfg.element_timeout,
            session.wait_visible(&cfg.confirm_button_selector, cfg.poll_interval),
        )
        .await?;
        bounded(
            AcquisitionState::Confirming,
            cfg.element_timeout,
            session.click(&cfg.confirm_button_selector),
        )
        .await?;
        bounded(
            AcquisitionState::Confirming,
            cfg.navigation_timeout,
            session.wait_for_navigation(cfg.poll_interval),
        )
        .await?;
        bounded(
            AcquisitionState::Confirming,
            cfg.idle_timeout,
            session.wait_network_idle(cfg.network_quiet_window, cfg.poll_interval),
        )
        .await?;
        tracing::info!("Confirmation step done in {:?}", confirm_start.elapsed());
        Ok(())
    }
}

async fn bounded<T>(
    state: AcquisitionState,
    timeout: Duration,
    step: impl Future<Output = anyhow::Result<T>>,
) -> Result<T, SearchError> {
    match tokio::time::timeout(timeout, step).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(source)) => {
            tracing::error!("Browser step failed while {}: {:#}", state, source);
            Err(SearchError::Browser { state, source })
        }
        Err(_) => {
            tracing::error!("Browser step timed out after {:?} while {}", timeout, state);
            Err(SearchError::AcquisitionTimeout { state, timeout })
        }
    }
}

type LaunchTask<S> = tokio::task::JoinHandle<anyhow::Result<S>>;

/// A browser launch running on its own task. Dropped before the session was
/// joined, it leaves a background task that closes the late session.
struct PendingLaunch<S: BrowserSession + 'static> {
    task: Option<LaunchTask<S>>,
    late_window: Duration,
}

impl<S: BrowserSession + 'static> PendingLaunch<S> {
    /// `None` when the launch did not finish within `timeout`.
    async fn join(
        &mut self,
        timeout: Duration,
    ) -> Option<Result<anyhow::Result<S>, tokio::task::JoinError>> {
        let task = self.task.as_mut()?;
        let joined = tokio::time::timeout(timeout, task).await.ok()?;
        self.task = None;
        Some(joined)
    }
}

impl<S: BrowserSession + 'static> Drop for PendingLaunch<S> {
    fn drop(&mut self) {
        let Some(mut task) = self.task.take() else {
            return;
        };
        let late_window = self.late_window;
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            task.abort();
            return;
        };
        handle.spawn(async move {
            match tokio::time::timeout(late_window, &mut task).await {
                Ok(Ok(Ok(mut session))) => {
                    tracing::warn!("Browser session arrived after the launch timeout, closing it");
                    if let Err(e) = session.close().await {
                        tracing::warn!("Late browser session did not close cleanly: {:#}", e);
                    }
                }
                Ok(_) => {}
                Err(_) => {
                    tracing::warn!("Browser launch still pending after {:?} more, aborting it", late_window);
                    task.abort();
                }
            }
        });
    }
}

/// Owns the session for the duration of one acquisition. A guard dropped
/// without `close` (the search future was cancelled) closes the session on
/// the runtime in the background.
struct SessionGuard<S: BrowserSession + 'static> {
    session: Option<S>,
}

impl<S: BrowserSession + 'static> SessionGuard<S> {
    fn new(session: S) -> Self {
        Self {
            session: Some(session),
        }
    }

    fn get(&mut self) -> Result<&mut S, SearchError> {
        self.session.as_mut().ok_or_else(|| SearchError::Browser {
            state: AcquisitionState::Closed,
            source: anyhow::anyhow!("browser session already closed"),
        })
    }

    async fn close(mut self, timeout: Duration) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        match tokio::time::timeout(timeout, session.close()).await {
            Ok(Ok(())) => tracing::debug!("Browser session closed"),
            Ok(Err(e)) => tracing::warn!("Browser session did not close cleanly: {:#}", e),
            Err(_) => tracing::warn!("Browser session close timed out after {:?}", timeout),
        }
    }
}

impl<S: BrowserSession + 'static> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };
        tracing::warn!("Search abandoned with an open browser session, closing it");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = session.close().await {
                        tracing::warn!("Abandoned browser session did not close cleanly: {:#}", e);
                    }
                });
            }
            Err(_) => tracing::error!("No async runtime left to close the abandoned browser session"),
        }
    }
}
