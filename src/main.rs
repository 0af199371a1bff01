//! Demo server for the envelope HTTP library.
//!
//! Serves a small passport/project API:
//!
//! ```text
//! POST /passport/login       {"username", "passport"}
//! ANY  /passport/validate    ?uid=  {"token"}
//! POST /project/list         ?uid=  {"project_id", "limit"}
//! GET  /ping                 (when ping_uri is configured)
//! ```

use std::path::PathBuf;

use clap::Parser;
use serde::{Deserialize, Serialize};

use envelope_http::config::{load_config, ServerConfig};
use envelope_http::observability::{logging, metrics};
use envelope_http::{route, BizError, Handler, Method, RequestContext, RouteList, RouteMap, Server};

const ERR_LOGIN_FAILED: i64 = 1001;
const ERR_NOT_FOUND: i64 = 1002;

#[derive(Parser)]
#[command(name = "envelope-server")]
#[command(about = "Demo server for typed envelope handlers", long_about = None)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listen address.
    #[arg(short, long)]
    addr: Option<String>,

    /// Enable debug logging and HTTP traces.
    #[arg(short, long)]
    debug: bool,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct LoginRequest {
    username: String,
    passport: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ValidateRequest {
    uid: i64,
    token: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct ProjectListRequest {
    uid: i64,
    project_id: i64,
    limit: i32,
}

#[derive(Debug, Serialize)]
struct Session {
    uid: i64,
    token: String,
}

#[derive(Debug, Serialize)]
struct ProjectList {
    projects: Vec<Project>,
}

#[derive(Debug, Serialize)]
struct Project {
    id: i64,
    name: String,
}

async fn login(ctx: RequestContext, req: LoginRequest) -> Result<Session, BizError> {
    ctx.record("user", &req.username);
    if req.username.is_empty() || req.passport.is_empty() {
        return Err(BizError::new(ERR_LOGIN_FAILED, "username and passport are required"));
    }

    Ok(Session {
        uid: 906,
        token: format!("token-{}", ctx.trace_id()),
    })
}

async fn validate(ctx: RequestContext, req: Box<ValidateRequest>) -> Result<Session, BizError> {
    ctx.record("uid", req.uid);
    if req.uid == 0 || req.token.is_empty() {
        return Err(BizError::new(ERR_LOGIN_FAILED, "invalid session"));
    }

    Ok(Session {
        uid: req.uid,
        token: req.token,
    })
}

async fn project_list(ctx: RequestContext, req: ProjectListRequest) -> Result<ProjectList, BizError> {
    ctx.record("limit", req.limit);
    if req.uid == 0 {
        return Err(BizError::new(ERR_NOT_FOUND, "unknown user"));
    }

    let limit = req.limit.clamp(0, 100) as i64;
    let projects = (0..limit)
        .map(|i| Project {
            id: req.project_id + i,
            name: format!("project-{}", req.project_id + i),
        })
        .collect();
    Ok(ProjectList { projects })
}

fn routes() -> RouteMap {
    RouteMap::new()
        .with(
            "/passport",
            RouteList::new(vec![
                route("login", Method::Post, vec![Handler::business(login)]),
                route("validate", Method::Any, vec![Handler::business(validate)]),
            ]),
        )
        .with(
            "/project",
            RouteList::new(vec![route("list", Method::Post, vec![Handler::business(project_list)])]),
        )
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig {
            ping_uri: Some("ping".to_string()),
            ..Default::default()
        },
    };
    if let Some(addr) = cli.addr {
        config.addr = addr;
    }
    config.debug |= cli.debug;

    logging::init(config.debug, &config.observability.log_level);
    tracing::info!("envelope-server v{} starting", env!("CARGO_PKG_VERSION"));

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_exporter(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "failed to parse metrics address"
            ),
        }
    }

    let mut server = Server::new(config);
    server.on_start(|s| {
        s.add_routes(&routes())?;
        Ok(())
    });
    server.serve().await?;

    tracing::info!("shutdown complete");
    Ok(())
}
