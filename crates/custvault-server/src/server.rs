use axum::{
    Form, Json, Router,
    extract::{Query, State},
    routing::get,
};
use serde::Deserialize;
use std::sync::Arc;

use custvault_core::{CustomerForm, CustomerRecord, parse_customer_number};
use custvault_storage::{CustomerRepository, DEFAULT_LIMIT};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::error::ApiError;

#[derive(Deserialize)]
struct ListParams {
    #[serde(default)]
    limit: Option<u32>,
    #[serde(default)]
    raw: bool,
}

#[derive(Deserialize)]
struct CustomerParams {
    #[serde(default)]
    cust_no: Option<String>,
}

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppContext {
    pub repository: Arc<CustomerRepository>,
}

impl AppContext {
    pub fn new(repository: CustomerRepository) -> Self {
        Self {
            repository: Arc::new(repository),
        }
    }
}

pub fn router(context: AppContext) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/customers", get(list_customers).post(create_customer).put(update_customer))
        .route("/customer", get(get_customer))
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

pub struct CustomerServer;

impl CustomerServer {
    /// Serve until ctrl-c, then close the database pool.
    pub async fn serve(context: AppContext, host: &str, port: u16) -> anyhow::Result<()> {
        let database = context.repository.database().clone();
        let app = router(context);

        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&addr).await?;

        info!("Customer service listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Shutting down, closing database pool");
        database.close().await;
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

/// GET /health
async fn handle_health(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "custvault",
        "version": env!("CARGO_PKG_VERSION"),
        "protected": ctx.repository.codec().is_protected(),
    }))
}

/// GET /customers
async fn list_customers(
    State(ctx): State<AppContext>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<CustomerRecord>>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT);
    let records = ctx.repository.read_all(limit, params.raw).await?;
    Ok(Json(records))
}

/// GET /customer?cust_no=N
async fn get_customer(
    State(ctx): State<AppContext>,
    Query(params): Query<CustomerParams>,
) -> Result<Json<CustomerRecord>, ApiError> {
    let id = parse_customer_number(params.cust_no.as_deref())?;
    debug!(customer_number = id, "Reading customer");
    let record = ctx.repository.read(id).await?;
    Ok(Json(record))
}

/// POST /customers
async fn create_customer(
    State(ctx): State<AppContext>,
    Form(form): Form<CustomerForm>,
) -> Result<Json<Vec<CustomerRecord>>, ApiError> {
    let new = form.into_new_customer()?;
    ctx.repository.create(new).await?;
    let records = ctx.repository.read_all(DEFAULT_LIMIT, false).await?;
    Ok(Json(records))
}

/// PUT /customers
async fn update_customer(
    State(ctx): State<AppContext>,
    Form(form): Form<CustomerForm>,
) -> Result<Json<Vec<CustomerRecord>>, ApiError> {
    let update = form.into_update()?;
    ctx.repository.update(update).await?;
    let records = ctx.repository.read_all(DEFAULT_LIMIT, false).await?;
    Ok(Json(records))
}
