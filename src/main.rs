mod body;
mod config;
mod dispatcher;
mod endpoint;
mod error;
mod hooks;
mod logging;
mod reform;
mod vendor;

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;
use axum::routing::get;
use axum::{Router, body::Body};
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use config::Cli;
use dispatcher::Dispatcher;
use endpoint::EndpointDirectory;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let conf = config::load(&cli.conf_file)?;

    let _log_guards = logging::init(&conf.log);
    tracing::info!("starting keyproxy v{VERSION}");

    let endpoints = Arc::new(EndpointDirectory::new(conf.endpoints)?);
    let dispatcher = Arc::new(Dispatcher::new(endpoints, conf.forbidden, VERSION.to_string()));

    let app = Router::new()
        .route("/ping", get(ping))
        .fallback(forward)
        .layer(TraceLayer::new_for_http())
        .with_state(dispatcher);

    if conf.http.tls.enabled {
        serve_tls(&conf.http.tls, app).await
    } else {
        tracing::info!("listening on http://{}", conf.http.address);
        let listener = TcpListener::bind(&conf.http.address).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }
}

async fn serve_tls(tls: &config::Tls, app: Router) -> anyhow::Result<()> {
    use axum_server::tls_rustls::RustlsConfig;

    let rustls_config = RustlsConfig::from_pem_file(&tls.cert_file, &tls.key_file).await?;
    let address = if tls.address.is_empty() { "0.0.0.0:443" } else { &tls.address };
    tracing::info!("listening on https://{address}");
    let addr = address.parse()?;
    axum_server::bind_rustls(addr, rustls_config)
        .serve(app.into_make_service())
        .await?;
    Ok(())
}

async fn ping() -> &'static str {
    "Greeting"
}

async fn forward(
    State(dispatcher): State<Arc<Dispatcher>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Body,
) -> Response {
    dispatcher.handle(method, uri, headers, body).await
}
