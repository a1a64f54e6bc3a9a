use serde::Deserialize;
use server::{ServerConfig, ServerState};
use std::{
    net::{IpAddr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
};
use thiserror::Error;
use time::{Duration, UtcDateTime};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use warble_common::util::{NonPositiveDurationError, PositiveDuration};
use warble_db::client::{DbClient, DbError};

mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Invalid session lifetime: {0}")]
    SessionLifetime(#[from] NonPositiveDurationError),
    #[error("Session lifetime of {0} seconds reaches past the representable time range")]
    SessionLifetimeRange(i64),
    #[error("Error setting up the database: {0}")]
    Database(#[from] DbError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    database_url: String,
    #[serde(default = "default_posts_per_page")]
    posts_per_page: NonZeroU32,
    session_lifetime_seconds: Option<i64>,
}

const DEFAULT_POSTS_PER_PAGE: NonZeroU32 = NonZeroU32::new(25).unwrap();

fn default_posts_per_page() -> NonZeroU32 {
    DEFAULT_POSTS_PER_PAGE
}

impl Env {
    fn server_config(&self) -> Result<ServerConfig, InitError> {
        let session_lifetime = self
            .session_lifetime_seconds
            .map(|seconds| {
                let lifetime = PositiveDuration::try_from(Duration::seconds(seconds))?;
                UtcDateTime::now()
                    .checked_add(lifetime.get())
                    .ok_or(InitError::SessionLifetimeRange(seconds))?;
                Ok::<_, InitError>(lifetime)
            })
            .transpose()?;

        Ok(ServerConfig {
            posts_per_page: self.posts_per_page,
            session_lifetime,
        })
    }
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "warble_api=debug,\
                warble_db=debug,\
                tower_http=debug,axum::rejection=trace,sqlx=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .env file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

async fn shutdown_on_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("Received ctrl-c, shutting down");
            shutdown.cancel();
        }
        Err(err) => error!(%err, "Could not listen for ctrl-c"),
    }
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;
    let config = env.server_config()?;

    let db_client = DbClient::connect(&env.database_url).await?;
    db_client.migrate().await?;

    let state = ServerState {
        db_client: Arc::new(db_client),
        config: Arc::new(config),
    };

    let app = server::routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_on_ctrl_c(shutdown.clone()));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
