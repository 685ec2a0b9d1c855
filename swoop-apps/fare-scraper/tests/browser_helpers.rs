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

//! Shared scripted browser for tests: records every call and plays back a
//! canned page, optionally stalling or failing at a chosen step.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::bail;
use swoop_browser_disguise::Disguise;
use swoop_fare_scraper::{BrowserLauncher, BrowserSession, DebugSink};

pub fn load_fixture(name: &str) -> String {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures-flights-parsing")
        .join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("read fixture {:?}: {}", path, e))
}

/// How the scripted browser behaves.
#[derive(Clone, Default)]
pub struct Script {
    /// URL reported after navigation. `None` reports the requested URL.
    pub redirect_to: Option<String>,
    pub html: String,
    /// Step that never completes.
    pub stall_on: Option<&'static str>,
    /// Step that returns an error.
    pub fail_on: Option<&'static str>,
    /// How long a launch takes before the session exists.
    pub launch_delay: Option<Duration>,
}

impl Script {
    pub fn serving(html: impl Into<String>) -> Self {
        Self {
            html: html.into(),
            ..Self::default()
        }
    }
}

#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<&'static str>>>);

impl CallLog {
    fn push(&self, call: &'static str) {
        self.0.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| **c == call).count()
    }
}

#[derive(Clone)]
pub struct ScriptedLauncher {
    pub script: Script,
    pub log: CallLog,
    launches: Arc<AtomicUsize>,
}

impl ScriptedLauncher {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            log: CallLog::default(),
            launches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn launches(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }
}

impl BrowserLauncher for ScriptedLauncher {
    type Session = ScriptedSession;

    async fn launch(&self, disguise: &Disguise) -> anyhow::Result<ScriptedSession> {
        assert!(!disguise.user_agent.is_empty());
        self.launches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.script.launch_delay {
            tokio::time::sleep(delay).await;
        }
        let mut session = ScriptedSession {
            script: self.script.clone(),
            log: self.log.clone(),
            requested_url: None,
        };
        session.step("launch").await?;
        Ok(session)
    }
}

pub struct ScriptedSession {
    script: Script,
    log: CallLog,
    requested_url: Option<String>,
}

impl ScriptedSession {
    async fn step(&mut self, call: &'static str) -> anyhow::Result<()> {
        self.log.push(call);
        if self.script.stall_on == Some(call) {
            std::future::pending::<()>().await;
        }
        if self.script.fail_on == Some(call) {
            bail!("scripted failure in {}", call);
        }
        Ok(())
    }
}

impl BrowserSession for ScriptedSession {
    async fn navigate(&mut self, url: &str) -> anyhow::Result<()> {
        self.requested_url = Some(url.to_string());
        self.step("navigate").await
    }

    async fn wait_network_idle(
        &mut self,
        _quiet_window: Duration,
        _poll_interval: Duration,
    ) -> anyhow::Result<()> {
        self.step("wait_network_idle").await
    }

    async fn current_url(&mut self) -> anyhow::Result<String> {
        self.step("current_url").await?;
        Ok(self
            .script
            .redirect_to
            .clone()
            .or_else(|| self.requested_url.clone())
            .unwrap_or_default())
    }

    async fn wait_visible(&mut self, css: &str, _poll_interval: Duration) -> anyhow::Result<()> {
        assert_eq!(css, r#"button[id="form-mixin--submit-button"]"#);
        self.step("wait_visible").await
    }

    async fn click(&mut self, _css: &str) -> anyhow::Result<()> {
        self.step("click").await
    }

    async fn wait_for_navigation(&mut self, _poll_interval: Duration) -> anyhow::Result<()> {
        self.step("wait_for_navigation").await
    }

    async fn page_source(&mut self) -> anyhow::Result<String> {
        self.step("page_source").await?;
        Ok(self.script.html.clone())
    }

    async fn close(&mut self) -> anyhow::Result<()> {
        self.step("close").await
    }
}

/// Keeps debug pages in memory.
#[derive(Default)]
pub struct MemorySink {
    pub pages: Mutex<Vec<(String, String)>>,
    pub fail: bool,
}

impl DebugSink for MemorySink {
    fn persist(&self, artifact_name: &str, html: &str) -> anyhow::Result<()> {
        if self.fail {
            bail!("disk full");
        }
        self.pages
            .lock()
            .unwrap()
            .push((artifact_name.to_string(), html.to_string()));
        Ok(())
    }
}
