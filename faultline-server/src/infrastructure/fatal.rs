//! Last-resort handling for failures that escape every guarded operation.
//!
//! Anything reaching this module means the process is in a state the
//! reporting policy could not classify, so it is logged at maximum severity
//! and the process is asked to drain and exit with a failure status.

use std::backtrace::Backtrace;
use std::future::Future;
use std::panic::PanicHookInfo;
use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::application::guard::{panic_message, record_panic_site};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ShutdownReason {
    Signal,
    Fatal,
}

impl ShutdownReason {
    pub(crate) fn exit_code(self) -> i32 {
        match self {
            ShutdownReason::Signal => 0,
            ShutdownReason::Fatal => 1,
        }
    }
}

/// Process-wide shutdown request shared by the supervisor, the signal
/// watcher and the fatal monitor.
///
/// The highest exit code requested wins, so a fatal failure during a
/// signal-initiated drain still ends the process with status 1.
#[derive(Debug, Clone, Default)]
pub(crate) struct ShutdownHandle {
    token: CancellationToken,
    exit_code: Arc<AtomicI32>,
}

impl ShutdownHandle {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn begin(&self, reason: ShutdownReason) {
        self.exit_code.fetch_max(reason.exit_code(), Ordering::SeqCst);
        self.token.cancel();
    }

    pub(crate) fn is_shutting_down(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn exit_code(&self) -> i32 {
        self.exit_code.load(Ordering::SeqCst)
    }

    pub(crate) async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    pub(crate) fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

#[derive(Debug, Clone)]
pub(crate) struct FatalMonitor {
    shutdown: ShutdownHandle,
}

impl FatalMonitor {
    pub(crate) fn new(shutdown: ShutdownHandle) -> Self {
        Self { shutdown }
    }

    /// Registers the synchronous entry point. Called once by the supervisor.
    ///
    /// The previously installed hook still runs for unguarded panics, so the
    /// default panic report keeps reaching stderr.
    pub(crate) fn install_panic_hook(&self) {
        let monitor = self.clone();
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
            let location = info
                .location()
                .map(ToString::to_string)
                .unwrap_or_else(|| "<unknown>".to_string());
            // guarded operations turn their own panics into failure responses
            if record_panic_site(&location) {
                return;
            }
            monitor.uncaught_panic(&panic_message(info.payload()), &location);
            previous(info);
        }));
    }

    pub(crate) fn uncaught_panic(&self, message: &str, location: &str) {
        let trace = Backtrace::force_capture();
        self.fatal(
            "uncaught_panic",
            &format!("{message} at {location}"),
            &trace.to_string(),
        );
    }

    pub(crate) fn unhandled_rejection(&self, task: &str, err: &anyhow::Error) {
        self.fatal(
            "unhandled_rejection",
            &format!("task `{task}` failed: {err:#}"),
            &format!("{err:?}"),
        );
    }

    /// Fire-and-forget spawn whose failure is never silently dropped.
    ///
    /// Work that is not part of a request cannot go through the operation
    /// guard; an error it returns is treated as an unhandled rejection.
    /// Panics are picked up by the panic hook.
    pub(crate) fn spawn_detached<F, E>(&self, task: &'static str, work: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<anyhow::Error> + Send + 'static,
    {
        let monitor = self.clone();
        tokio::spawn(async move {
            if let Err(err) = work.await {
                monitor.unhandled_rejection(task, &err.into());
            }
        })
    }

    fn fatal(&self, entry: &'static str, detail: &str, trace: &str) {
        error!(
            entry,
            detail,
            trace,
            "fatal failure outside any guarded operation, shutting down"
        );
        self.shutdown.begin(ShutdownReason::Fatal);
    }
}

/// Serializes tests that replace the process-wide panic hook.
#[cfg(test)]
pub(crate) static PANIC_HOOK_LOCK: tokio::sync::Mutex<()> = tokio::sync::Mutex::const_new(());
