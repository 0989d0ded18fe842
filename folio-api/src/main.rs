use folio_cms::{
    client::{CmsError, PrismicClient},
    record::Normalizer,
};
use folio_common::date::{DateFormat, DateFormatError};
use serde::Deserialize;
use server::{ServerState, Source};
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::Duration,
};
use thiserror::Error;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod server;

#[derive(Debug, Error)]
enum InitError {
    #[error("Error parsing .env file: {0}")]
    Dotenv(#[from] dotenvy::Error),
    #[error("Error parsing environment: {0}")]
    Envy(#[from] envy::Error),
    #[error("Invalid date format configuration: {0}")]
    DateFormat(#[from] DateFormatError),
    #[error("Error creating content API client: {0}")]
    Cms(#[from] CmsError),
    #[error("Error binding tcp listener: {0}")]
    TcpBind(std::io::Error),
    #[error("Error serving server: {0}")]
    TcpServe(std::io::Error),
}

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize)]
struct Env {
    server_address: IpAddr,
    server_port: u16,
    cms_endpoint: String,
    cms_access_token: Option<String>,
    #[serde(default = "default_document_type")]
    cms_document_type: String,
    cms_page_size: Option<u32>,
    #[serde(default = "default_missing_ttl_secs")]
    cms_missing_ttl_secs: u64,
    #[serde(default = "default_date_locale")]
    date_locale: String,
    #[serde(default = "default_list_date_pattern")]
    list_date_pattern: String,
    #[serde(default = "default_detail_date_pattern")]
    detail_date_pattern: String,
}

fn default_document_type() -> String {
    "posts".to_owned()
}

fn default_missing_ttl_secs() -> u64 {
    folio_cms::detail::MISSING_TTL.as_secs()
}

fn default_date_locale() -> String {
    "pt_BR".to_owned()
}

fn default_list_date_pattern() -> String {
    "dd MMM yyyy".to_owned()
}

fn default_detail_date_pattern() -> String {
    "d 'de' MMMM 'de' yyyy".to_owned()
}

fn install_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "folio_api=debug,\
                folio_cms=debug,\
                folio_common=debug,\
                tower_http=debug,axum::rejection=trace"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn get_env() -> Result<Env, InitError> {
    if let Err(e) = dotenvy::dotenv() {
        if e.not_found() {
            debug!("No .dotenv file found");
        } else {
            return Err(e.into());
        }
    }

    envy::from_env().map_err(InitError::from)
}

fn normalizer(env: &Env) -> Result<Normalizer, InitError> {
    Ok(Normalizer::new(
        DateFormat::new(&env.list_date_pattern, &env.date_locale)?,
        DateFormat::new(&env.detail_date_pattern, &env.date_locale)?,
    ))
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!(%error, "Could not listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> Result<(), InitError> {
    install_tracing();
    let env = get_env()?;

    let source: Source = Arc::new(
        PrismicClient::new(&env.cms_endpoint, env.cms_access_token.clone())?
            .with_page_size(env.cms_page_size),
    );
    let state = ServerState::new(
        source,
        normalizer(&env)?,
        &env.cms_document_type,
        Duration::from_secs(env.cms_missing_ttl_secs),
    );

    match state.details.prerender().await {
        Ok(generated) => info!(generated, "Pre-rendered post pages"),
        Err(error) => warn!(%error, "Pre-rendering failed, posts will be generated on request"),
    }

    let app = server::app(state);

    let server_address = SocketAddr::new(env.server_address, env.server_port);
    let listener = tokio::net::TcpListener::bind(server_address)
        .await
        .map_err(InitError::TcpBind)?;
    info!(%server_address, "Listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(InitError::TcpServe)?;

    Ok(())
}
