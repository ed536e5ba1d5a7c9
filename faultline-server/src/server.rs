//! Process lifecycle: wiring, serving, draining and the exit status.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::application::reporting::ErrorReporter;
use crate::infrastructure::fatal::{FatalMonitor, ShutdownHandle, ShutdownReason};
use crate::infrastructure::jwt::JwtService;
use crate::infrastructure::logging::LogHandle;
use crate::infrastructure::settings::Settings;
use crate::presentation::AppState;
use crate::presentation::http::middleware::layers::apply_layers;
use crate::presentation::http::routes::router;

pub(crate) struct Supervisor {
    settings: Settings,
    logging: LogHandle,
    shutdown: ShutdownHandle,
    monitor: FatalMonitor,
}

impl Supervisor {
    pub(crate) fn new(settings: Settings, logging: LogHandle) -> Self {
        let shutdown = ShutdownHandle::new();
        let monitor = FatalMonitor::new(shutdown.clone());
        Self {
            settings,
            logging,
            shutdown,
            monitor,
        }
    }

    /// Serves until a signal or a fatal failure, then drains in-flight
    /// requests for at most the configured window. Returns the exit code.
    pub(crate) async fn run(self) -> Result<i32> {
        self.monitor.install_panic_hook();

        if self.settings.jwt_secret_is_default {
            warn!("JWT_SECRET is not set; using the development-only secret");
        }

        let state = AppState::new(
            Arc::new(ErrorReporter::new(self.settings.environment)),
            Arc::new(JwtService::new(&self.settings.jwt_secret, self.settings.jwt_ttl_seconds)),
            self.monitor.clone(),
        );
        let app = apply_layers(router(state), &self.settings)?;

        let listener = TcpListener::bind(&self.settings.http_addr).await?;
        info!(
            addr = %self.settings.http_addr,
            environment = ?self.settings.environment,
            log_format = ?self.logging.format(),
            "HTTP server listening"
        );

        tokio::spawn(watch_signals(self.shutdown.clone()));

        let token = self.shutdown.token();
        let serve = async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .with_graceful_shutdown(token.cancelled_owned())
            .await
        };

        let drain = self.settings.shutdown_drain;
        let shutdown = self.shutdown.clone();
        let deadline = async move {
            shutdown.cancelled().await;
            tokio::time::sleep(drain).await;
        };

        tokio::select! {
            served = serve => match served {
                Err(err) => {
                    error!(error = %err, "HTTP server failed");
                    self.shutdown.begin(ShutdownReason::Fatal);
                }
                Ok(()) if !self.shutdown.is_shutting_down() => {
                    error!("HTTP server stopped without a shutdown request");
                    self.shutdown.begin(ShutdownReason::Fatal);
                }
                Ok(()) => {}
            },
            () = deadline => {
                warn!(drain_secs = drain.as_secs(), "drain window elapsed, abandoning in-flight requests");
            }
        }

        let code = self.shutdown.exit_code();
        info!(exit_code = code, "server stopped");
        self.logging.flush();
        Ok(code)
    }
}

/// Waits for `SIGINT` or `SIGTERM` and asks for a clean shutdown.
async fn watch_signals(shutdown: ShutdownHandle) {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for SIGINT");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("SIGINT received. Shutting down gracefully..."),
        () = terminate => info!("SIGTERM received. Shutting down gracefully..."),
        () = shutdown.cancelled() => return,
    }

    shutdown.begin(ShutdownReason::Signal);
}
