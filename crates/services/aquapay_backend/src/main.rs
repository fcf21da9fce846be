// File: services/aquapay_backend/src/main.rs
mod app_state;

use axum::{routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use aquapay_checkout::routes as checkout_routes;
use aquapay_common::logging;
use aquapay_config::load_config;

use app_state::{build_state, spawn_stale_sweeper};

#[tokio::main]
async fn main() {
    logging::init();

    let config = Arc::new(load_config().expect("Failed to load config"));
    let state = build_state(Arc::clone(&config)).expect("Failed to build checkout state");
    spawn_stale_sweeper(Arc::clone(&state));

    let api_router = Router::new()
        .route("/", get(|| async { "Welcome to the AquaPay API!" }))
        .merge(checkout_routes(state));

    #[allow(unused_mut)] // reassigned when the openapi feature is on
    let mut app = Router::new()
        .nest("/api", api_router)
        .layer(TraceLayer::new_for_http());

    // Conditionally add Swagger UI and JSON endpoint if openapi feature enabled
    #[cfg(feature = "openapi")]
    {
        use aquapay_checkout::doc::CheckoutApiDoc;
        use utoipa::OpenApi;
        use utoipa_swagger_ui::SwaggerUi;

        #[derive(OpenApi)]
        #[openapi(
            info(
                title = "AquaPay API",
                version = "0.1.0",
                description = "Payment orchestration service API docs"
            ),
            components(),
            tags((name = "AquaPay", description = "Core service endpoints")),
            servers((url = "/api", description = "Main API Prefix")),
        )]
        struct ApiDoc;

        let mut openapi_doc = ApiDoc::openapi();
        openapi_doc.merge(CheckoutApiDoc::openapi());
        info!("Adding Swagger UI at /api/docs");

        let swagger_ui =
            SwaggerUi::new("/api/docs").url("/api/docs/openapi.json", openapi_doc.clone());
        app = app.merge(swagger_ui);
    }

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = TcpListener::bind(&addr).await.expect("Failed to bind");
    info!("Starting server at http://{addr}");
    info!("API endpoints available at http://{addr}/api");

    axum::serve(listener, app.into_make_service())
        .await
        .expect("Server error");
}
