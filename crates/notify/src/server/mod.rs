mod routes;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::{
    config::Config,
    metrics,
    sinks::NotificationSink,
    store::Store,
    tickets::{TicketFiler, TicketTracker},
    trigger::Dispatcher,
    Result,
};

/// Header an upstream auth layer sets to the requesting user's id.
pub const USER_HEADER: &str = "Api-User";

pub struct Server {
    dispatcher: Dispatcher,
    filer: TicketFiler,
    sink: Arc<dyn NotificationSink>,
}

impl Server {
    pub fn new(
        config: &Config,
        store: Arc<dyn Store>,
        tracker: Arc<dyn TicketTracker>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        metrics::register_metrics();

        Self {
            dispatcher: Dispatcher::new(store.clone(), config.notify.clone()),
            filer: TicketFiler::new(
                store,
                tracker,
                config.tickets.clone(),
                config.notify.ui_root.clone(),
            ),
            sink,
        }
    }

    pub fn build_router(self) -> Router {
        let state = Arc::new(self);

        Router::new()
            .route("/health", get(routes::health))
            .route("/metrics", get(routes::metrics))
            .route("/events", post(routes::dispatch_event))
            .route("/tickets", post(routes::file_ticket))
            .layer(TraceLayer::new_for_http())
            .with_state(state)
    }

    pub async fn start(self, addr: &str) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!("Listening on {}", listener.local_addr()?);
        axum::serve(listener, self.build_router()).await?;
        Ok(())
    }
}
