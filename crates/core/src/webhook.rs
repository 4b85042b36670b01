// Webhook sink
//
// The signing service answers 202 when it queues a message and later calls
// back `GET /webhook?signedMessage=...`. The sink receives those callbacks,
// counts them under `webhook_notifications`, and echoes the signed message.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::{LoadTestError, Result};
use crate::metrics::CounterMetric;

#[derive(Debug, Deserialize)]
struct WebhookQuery {
    #[serde(rename = "signedMessage")]
    signed_message: Option<String>,
}

async fn notify(
    State(counter): State<Arc<CounterMetric>>,
    Query(query): Query<WebhookQuery>,
) -> String {
    counter.increment();

    let signed_message = query.signed_message.unwrap_or_default();
    tracing::info!(signed_message = %signed_message, "Webhook notification received");
    signed_message
}

/// Router serving `GET /webhook`
pub fn router(counter: Arc<CounterMetric>) -> Router {
    Router::new()
        .route("/webhook", get(notify))
        .with_state(counter)
}

/// Running webhook listener
pub struct WebhookSink {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl WebhookSink {
    /// Bind `addr` and start serving callbacks in the background
    pub async fn bind(addr: SocketAddr, counter: Arc<CounterMetric>) -> Result<Self> {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| LoadTestError::Webhook(format!("failed to bind {addr}: {e}")))?;
        let local_addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let app = router(counter);

        let handle = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await;
            if let Err(e) = result {
                tracing::error!(error = %e, "Webhook sink stopped with error");
            }
        });

        tracing::info!(addr = %local_addr, "Webhook sink listening");

        Ok(Self {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            handle,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// URL to hand to the signing service as `webhookUrl`
    pub fn webhook_url(&self) -> String {
        format!("http://{}/webhook", self.local_addr)
    }

    /// Stop accepting callbacks and wait for the server task
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        (&mut self.handle)
            .await
            .map_err(|e| LoadTestError::Webhook(format!("server task failed: {e}")))
    }
}

impl Drop for WebhookSink {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
