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

//! MCP server for Southwest fare search.
//!
//! Supports stdio and HTTP transports via subcommand. The HTTP transport also
//! serves the plain JSON `POST /` search endpoint.

use anyhow::{Context, Error, Result};
use clap::{Parser, Subcommand};
use rmcp::handler::server::{ServerHandler, tool::ToolRouter, wrapper::Parameters};
use rmcp::service::serve_server;
use rmcp::tool;
use rmcp::tool_router;
use rmcp::transport::streamable_http_server::{
    StreamableHttpServerConfig, StreamableHttpService, session::local::LocalSessionManager,
};
use std::net::SocketAddr;
use std::sync::Arc;
use swoop_fare_scraper::api::{self, ApiState};
use swoop_fare_scraper::{
    DEFAULT_WEBDRIVER_URL, SearchInput, SouthwestFlightsClient, WebDriverLauncher,
};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "swoop-fares-server")]
#[command(author, version, about = "MCP server for Southwest fare search")]
struct Args {
    /// WebDriver (chromedriver) endpoint
    #[arg(long, env = "SWOOP_WEBDRIVER_URL", default_value = DEFAULT_WEBDRIVER_URL, global = true)]
    webdriver_url: String,

    /// Browser sessions allowed to run at the same time
    #[arg(long, default_value = "2", global = true)]
    max_concurrent: usize,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run MCP server over stdio (for Claude Desktop, etc.)
    Stdio,

    /// Run MCP server over HTTP
    Http {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        #[arg(long, default_value = "8080")]
        port: u16,
    },
}

#[derive(Clone)]
pub struct FareSearchServer {
    flights_client: Arc<SouthwestFlightsClient>,
    browser_permits: Arc<Semaphore>,
    tool_router: ToolRouter<Self>,
}

impl FareSearchServer {
    pub fn new(flights_client: Arc<SouthwestFlightsClient>, browser_permits: Arc<Semaphore>) -> Self {
        Self {
            flights_client,
            browser_permits,
            tool_router: Self::tool_router(),
        }
    }
}

#[tool_router]
impl FareSearchServer {
    #[tool(
        name = "search_flights",
        description = "Search one-way Southwest flights and their fares. Parameters: origination (IATA), destination (IATA), departure_date (YYYY-MM-DD), passenger_count (1+), adult_count (1+, at most passenger_count)."
    )]
    async fn search_flights(&self, params: Parameters<SearchInput>) -> Result<String, String> {
        let request = params.0.into_request().map_err(|e| e.to_string())?;

        let _permit = self
            .browser_permits
            .acquire()
            .await
            .map_err(|_| "Server is shutting down".to_string())?;

        let result = self
            .flights_client
            .search_flights(&request)
            .await
            .map_err(|e| format!("Flight search failed: {e}"))?;

        serde_json::to_string(&result.to_api_response()).map_err(|e| e.to_string())
    }

    #[tool(
        name = "flights_search_url",
        description = "Build the Southwest booking page URL for a one-way search without running it. Same parameters as search_flights."
    )]
    async fn flights_search_url(&self, params: Parameters<SearchInput>) -> Result<String, String> {
        let request = params.0.into_request().map_err(|e| e.to_string())?;
        request.get_search_url().map_err(|e| e.to_string())
    }

    #[tool(
        name = "current_date",
        description = "Today's date (YYYY-MM-DD), server local time."
    )]
    async fn current_date(&self) -> Result<String, String> {
        Ok(chrono::Local::now().format("%Y-%m-%d").to_string())
    }
}

impl ServerHandler for FareSearchServer {
    fn list_tools(
        &self,
        _request: Option<rmcp::model::PaginatedRequestParam>,
        _context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl Future<Output = Result<rmcp::model::ListToolsResult, rmcp::ErrorData>> + Send + '_
    {
        Box::pin(async move {
            let tools = self.tool_router.list_all();
            tracing::debug!("Returning {} tools", tools.len());
            Ok(rmcp::model::ListToolsResult::with_all_items(tools))
        })
    }

    fn call_tool(
        &self,
        request: rmcp::model::CallToolRequestParam,
        context: rmcp::service::RequestContext<rmcp::RoleServer>,
    ) -> impl Future<Output = Result<rmcp::model::CallToolResult, rmcp::ErrorData>> + Send + '_
    {
        let router = self.tool_router.clone();
        let self_clone = self.clone();
        Box::pin(async move {
            tracing::info!("Tool call: {}", request.name);
            let context =
                rmcp::handler::server::tool::ToolCallContext::new(&self_clone, request, context);
            router.call(context).await
        })
    }

    fn get_info(&self) -> rmcp::model::ServerInfo {
        rmcp::model::ServerInfo {
            protocol_version: rmcp::model::ProtocolVersion::V_2025_03_26,
            capabilities: rmcp::model::ServerCapabilities {
                tools: Some(rmcp::model::ToolsCapability::default()),
                ..Default::default()
            },
            server_info: rmcp::model::Implementation::from_build_env(),
            instructions: Some(
                "Call current_date first when the user gives a relative date.".to_string(),
            ),
        }
    }
}

/// Cancelled on Ctrl-C.
fn shutdown_token(browser_permits: Arc<Semaphore>) -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("Ctrl-C received, shutting down"),
            Err(e) => tracing::error!("Failed to listen for Ctrl-C: {}", e),
        }
        // Queued searches fail fast instead of launching new browsers
        browser_permits.close();
        trigger.cancel();
    });
    token
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".to_string().into()))
        .with(
            tracing_subscriber::fmt::layer()
                .with_timer(tracing_subscriber::fmt::time::ChronoUtc::rfc_3339())
                .with_writer(std::io::stderr),
        )
        .init();

    tracing::debug!("Parsing arguments...");
    let args = Args::parse();
    tracing::debug!("Parsed args: {:?}", args);
    anyhow::ensure!(args.max_concurrent > 0, "--max-concurrent must be at least 1");

    let flights_client = Arc::new(SouthwestFlightsClient::new(WebDriverLauncher::new(
        args.webdriver_url.clone(),
    )));
    let browser_permits = Arc::new(Semaphore::new(args.max_concurrent));
    let shutdown = shutdown_token(Arc::clone(&browser_permits));
    tracing::debug!(
        "Client ready, {} concurrent browser sessions against {}",
        args.max_concurrent,
        args.webdriver_url
    );

    match args.command {
        Command::Stdio => {
            eprintln!("Starting MCP server over stdio...");
            let server = FareSearchServer::new(flights_client, browser_permits);
            let (stdin, stdout) = rmcp::transport::io::stdio();
            let running = serve_server(Arc::new(server), (stdin, stdout))
                .await
                .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;
            tokio::select! {
                quit = running.waiting() => tracing::info!("MCP session ended: {:?}", quit),
                _ = shutdown.cancelled() => {}
            }
        }
        Command::Http { host, port } => {
            let addr: SocketAddr = format!("{}:{}", host, port)
                .parse()
                .context("Invalid host:port")?;
            tracing::info!("Starting MCP server over HTTP on {}", addr);
            let server = FareSearchServer::new(
                Arc::clone(&flights_client),
                Arc::clone(&browser_permits),
            );
            let session_manager = Arc::new(LocalSessionManager::default());
            let config = StreamableHttpServerConfig {
                stateful_mode: true,
                ..Default::default()
            };
            let service =
                StreamableHttpService::new(move || Ok(server.clone()), session_manager, config);
            let app = axum::Router::new()
                .nest_service("/mcp", service)
                .merge(api::router(ApiState::new(flights_client, browser_permits)));
            let listener = tokio::net::TcpListener::bind(addr)
                .await
                .context("Failed to bind to address")?;
            tracing::debug!("Listening on {}", addr);
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await
                .context("HTTP server error")?;
        }
    }

    Ok(())
}
