use anyhow::Context;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use clap::Args;
use std::path::Path;
use std::sync::Arc;

use scrapbook_core::gateway::{self, ApiRequest, ApiResponse};
use scrapbook_core::{
    service, Collaborators, FsVault, LogNotices, ServiceHandle, Session, SettingsStore,
    TomlSettingsStore, WebhookNotifier,
};

#[derive(Args)]
pub struct ServeArgs {
    /// Port to listen on (defaults to the apiPort setting)
    #[arg(long)]
    port: Option<u16>,
}

pub fn run(vault: &Path, args: ServeArgs) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("failed to start tokio runtime")?;
    runtime.block_on(serve(vault, args))
}

async fn serve(vault: &Path, args: ServeArgs) -> anyhow::Result<()> {
    let store = TomlSettingsStore::default_location()?;
    let settings = store.load()?;
    let port = args.port.unwrap_or(settings.api_port);

    let vault = Arc::new(FsVault::new(vault));
    let notifier = WebhookNotifier::spawn(settings.frontend_url.clone())?;
    tracing::info!(
        vault = %vault.root().display(),
        settings = %store.path().display(),
        "starting session"
    );
    let (handle, actor) = service::spawn(move |scheduler| {
        Session::new(Collaborators {
            documents: vault.clone(),
            attachments: vault,
            settings_store: Box::new(store),
            scheduler: Box::new(scheduler),
            notifier: Box::new(notifier),
            notices: Box::new(LogNotices),
        })
    })?;

    let app = Router::new().fallback(forward).with_state(handle.clone());

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("control API listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutting down");
        })
        .await?;

    handle.shutdown().await?;
    actor.await.context("session task failed")?;
    Ok(())
}

async fn forward(
    State(handle): State<ServiceHandle>,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> Response {
    let request = ApiRequest {
        method: gateway::Method::parse(method.as_str()),
        path: uri.path().to_string(),
        body: body.to_vec(),
    };
    tracing::debug!(method = %method, path = %uri.path(), "api request");
    into_response(handle.call(request).await)
}

fn into_response(api: ApiResponse) -> Response {
    let status = StatusCode::from_u16(api.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = match api.body {
        Some(body) => (status, Json(body)).into_response(),
        None => status.into_response(),
    };
    let headers = response.headers_mut();
    headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET, POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}
