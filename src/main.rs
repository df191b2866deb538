use std::process;

use tenant_edge::{
    application::error::AppError,
    config,
    infra::{
        context::{ApplicationContext, Collaborators},
        error::InfraError,
        http, telemetry,
    },
};
use tokio::{sync::watch, try_join};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

mod invalidate_tool;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Invalidate(args) => invalidate_tool::run(&settings, &args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let collaborators = Collaborators::from_settings(&settings).await?;
    let app = ApplicationContext::build(&settings, collaborators);

    info!(
        target = "tenant_edge::serve",
        root_domain = %settings.routing.root_domain,
        pages = %settings.origin.pages_url,
        assets = %settings.origin.assets_url,
        "Starting edge"
    );

    let retry_handle = settings
        .invalidation
        .retry_interval
        .map(|interval| app.spawn_invalidation_retry(interval));

    let result = serve_http(&settings, &app).await;

    if let Some(handle) = retry_handle {
        handle.abort();
        let _ = handle.await;
    }

    let pending = app.invalidation.ledger().len();
    if pending > 0 {
        warn!(pending, "Shutting down with invalidations still pending");
    }

    result
}

async fn serve_http(settings: &config::Settings, app: &ApplicationContext) -> Result<(), AppError> {
    let edge_router = http::build_edge_router(app.edge.clone());
    let internal_router = http::build_internal_router(app.internal.clone());

    let public_listener = tokio::net::TcpListener::bind(settings.server.public_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    let internal_listener = tokio::net::TcpListener::bind(settings.server.internal_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        public = %settings.server.public_addr,
        internal = %settings.server.internal_addr,
        "Listening"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let public_server = axum::serve(public_listener, edge_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx.clone()));
    let internal_server = axum::serve(internal_listener, internal_router.into_make_service())
        .with_graceful_shutdown(wait_for_shutdown(shutdown_rx));

    let servers = async { try_join!(public_server, internal_server).map(|_| ()) };
    tokio::pin!(servers);

    tokio::select! {
        result = &mut servers => {
            return result.map_err(|err| AppError::unexpected(format!("server error: {err}")));
        }
        _ = shutdown_signal() => {}
    }

    let grace = settings.server.graceful_shutdown;
    info!(timeout_secs = grace.as_secs(), "Shutdown requested; draining connections");
    let _ = shutdown_tx.send(true);

    match tokio::time::timeout(grace, servers).await {
        Ok(result) => result.map_err(|err| AppError::unexpected(format!("server error: {err}"))),
        Err(_) => {
            warn!("Graceful shutdown timed out");
            Ok(())
        }
    }
}

async fn wait_for_shutdown(mut receiver: watch::Receiver<bool>) {
    let _ = receiver.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
