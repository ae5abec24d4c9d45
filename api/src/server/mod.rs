use std::{future::Future, net::TcpListener, sync::Arc};

use axum::{
    extract::Extension,
    routing::{get, post},
    Router,
};
use color_eyre::Result;
use http::Method;

#[cfg(test)]
mod test;

mod_use::mod_use![config, form, handler, ui_settings, blobs, jwt, context, ext];

/// Build the application router from a prepared context.
pub fn router(ctx: Context) -> Router {
    Router::new()
        .route("/settings/:user_id", get(get_settings).post(set_settings))
        .route("/settings/:user_id/init", post(init_settings))
        .route(
            "/saved-settings/:user_id",
            get(list_saved_settings).post(create_saved_setting),
        )
        .route(
            "/saved-settings/:user_id/:setting_id",
            get(get_saved_setting).delete(delete_saved_setting),
        )
        .route("/upload-logo/:user_id", post(upload_logo))
        .route("/blobs/*path", get(get_blob))
        .nest("/ui_settings", ui_settings_routes())
        .layer(Extension(ctx))
}

fn log_startup(config: &Config) {
    match &config.project_id {
        Some(project_id) => tracing::info!(project_id = project_id.as_str(), "Project configured"),
        None => tracing::warn!("No project id configured"),
    }
    tracing::info!(
        app_id = config.app_id.as_str(),
        mongo_db = config.mongo_db.as_str(),
        blob_dir = %config.blob_dir.display(),
        public_url = %config.public_url,
        "Backends configured"
    );
    if config.has_insecure_secret() {
        tracing::warn!("Using the default JWT secret, tokens can be forged by anyone");
    }
}

/// Serve on an already bound listener until `signal` resolves.
///
/// # Errors
/// Fails if the listener can't be used or the server crashes.
pub async fn serve_with_listener(
    listener: TcpListener,
    ctx: Context,
    signal: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let cors_layer = tower_http::cors::CorsLayer::new()
        .allow_methods(vec![Method::GET, Method::POST, Method::DELETE])
        .allow_headers(tower_http::cors::Any)
        // Credentials are passed in the `Authorization` header
        .allow_credentials(false)
        // Allow requests from any origin
        .allow_origin(tower_http::cors::Any);

    let trace_layer = tower_http::trace::TraceLayer::new_for_http();

    let app = router(ctx)
        .layer(cors_layer)
        .layer(trace_layer)
        .into_make_service();

    let addr = listener.local_addr()?;
    tracing::info!(%addr, "Server starting");

    axum::Server::from_tcp(listener)?
        .serve(app)
        .with_graceful_shutdown(signal)
        .await?;

    tracing::info!("Server stopped");

    Ok(())
}

pub async fn serve_with_config(config: Config) -> Result<()> {
    let config = Arc::new(config);
    log_startup(&config);

    let listener = TcpListener::bind(config.bind)?;
    let ctx = Context::new(config).await?;

    serve_with_listener(listener, ctx, shutdown_signal()).await
}

pub async fn serve() -> Result<()> {
    serve_with_config(Config::from_env()?).await
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
