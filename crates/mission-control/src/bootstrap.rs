//! # Bootstrap
//!
//! Assembles the process: system context, HTTP server, queue consumer, and
//! telemetry ticker, all sharing one cancellation token. The returned
//! handle owns the task join handles and drives graceful shutdown.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use mission_shared::config::MissionControlConfig;
use mission_shared::messaging::BrokerClient;
use mission_shared::{MissionControlError, MissionResult};

use crate::auth::CompositeVerifier;
use crate::context::SystemContext;
use crate::dispatch::Dispatcher;
use crate::queue::QueueConsumer;
use crate::reflection::ReflectionCoordinator;
use crate::telemetry::TelemetryAggregator;
use crate::web::{self, AppState};

pub struct MissionControlBootstrap;

impl MissionControlBootstrap {
    /// Bootstrap from the layered configuration sources
    pub async fn bootstrap() -> MissionResult<MissionControlHandle> {
        let config = MissionControlConfig::load()?;
        Self::bootstrap_with_config(config).await
    }

    pub async fn bootstrap_with_config(
        config: MissionControlConfig,
    ) -> MissionResult<MissionControlHandle> {
        let context = SystemContext::new(config)?;
        let shutdown = context.shutdown.clone();

        let dispatcher = Arc::new(Dispatcher::new(context.clone()));
        let verifier = Arc::new(CompositeVerifier::from_config(
            &context.config,
            context.service_client.clone(),
        ));
        let reflection = ReflectionCoordinator::new(context.clone());
        let aggregator = TelemetryAggregator::new(context.clone(), reflection);

        // HTTP ingress
        let state = AppState {
            context: context.clone(),
            dispatcher: dispatcher.clone(),
            verifier,
            aggregator: aggregator.clone(),
        };
        let router = web::router(state);
        let bind_address = context.config.server.bind_address();
        let listener = tokio::net::TcpListener::bind(&bind_address)
            .await
            .map_err(|e| {
                MissionControlError::Configuration(format!("cannot bind {bind_address}: {e}"))
            })?;
        info!(address = %bind_address, "HTTP API listening");

        let server_shutdown = shutdown.clone();
        let server_handle = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(server_shutdown.cancelled_owned())
                .await
            {
                warn!(error = %e, "HTTP server exited with error");
            }
        });

        // Telemetry ticker
        let ticker_handle = tokio::spawn(aggregator.run(shutdown.clone()));

        // Queue ingress; an empty broker URL disables it
        let queue_handle = if context.config.messaging.broker_url.is_empty() {
            warn!("Broker URL empty; queue ingress disabled");
            None
        } else {
            let broker = BrokerClient::connect(
                &context.config.messaging.broker_url,
                &context.config.messaging.queue_name,
                context.config.messaging.prefetch_count,
            )
            .await?;
            let consumer = QueueConsumer::new(broker, dispatcher);
            let consumer_shutdown = shutdown.clone();
            Some(tokio::spawn(async move {
                if let Err(e) = consumer.run(consumer_shutdown).await {
                    warn!(error = %e, "Queue consumer exited with error");
                }
            }))
        };

        Ok(MissionControlHandle {
            context,
            shutdown,
            server_handle,
            ticker_handle,
            queue_handle,
        })
    }
}

/// Handle to the running process components
pub struct MissionControlHandle {
    pub context: Arc<SystemContext>,
    shutdown: CancellationToken,
    server_handle: JoinHandle<()>,
    ticker_handle: JoinHandle<()>,
    queue_handle: Option<JoinHandle<()>>,
}

impl MissionControlHandle {
    /// Cancel every component and wait for the tasks to drain. In-flight
    /// handlers observe cancellation; no new reflections are initiated.
    pub async fn stop(self) -> MissionResult<()> {
        self.shutdown.cancel();
        let _ = self.server_handle.await;
        let _ = self.ticker_handle.await;
        if let Some(queue) = self.queue_handle {
            let _ = queue.await;
        }
        Ok(())
    }
}

/// Block until the process receives an interrupt or termination signal.
///
/// Lives next to the rest of the shutdown wiring so the binary only decides
/// what to do once a signal has arrived.
pub async fn wait_for_shutdown_signal() -> MissionResult<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())
            .map_err(|e| MissionControlError::Internal(format!("SIGTERM handler: {e}")))?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result.map_err(|e| {
                    MissionControlError::Internal(format!("interrupt handler: {e}"))
                })?;
                info!(signal = "SIGINT", "Shutdown requested");
            }
            _ = sigterm.recv() => {
                info!(signal = "SIGTERM", "Shutdown requested");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .map_err(|e| MissionControlError::Internal(format!("interrupt handler: {e}")))?;
        info!(signal = "SIGINT", "Shutdown requested");
    }

    Ok(())
}
