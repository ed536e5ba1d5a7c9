use std::any::Any;
use std::cell::RefCell;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;

use crate::application::failure::{Failure, PanicFailure, PanicSite};

tokio::task_local! {
    static GUARD_SCOPE: RefCell<Option<PanicSite>>;
}

/// Runs a unit of asynchronous work so that every failure it raises, whether
/// returned or panicked, comes back as a [`Failure`].
///
/// Successful output is passed through untouched. Nothing is retried and
/// nothing is swallowed: the caller receives the failure exactly once.
pub(crate) async fn guarded<F, T>(work: F) -> Result<T, Failure>
where
    F: Future<Output = Result<T, Failure>>,
{
    GUARD_SCOPE
        .scope(RefCell::new(None), async move {
            match AssertUnwindSafe(work).catch_unwind().await {
                Ok(result) => result,
                Err(payload) => {
                    let site = GUARD_SCOPE.with(|site| site.borrow_mut().take());
                    Err(Failure::from(PanicFailure {
                        message: panic_message(payload.as_ref()),
                        site,
                    }))
                }
            }
        })
        .await
}

/// Called from the panic hook. Stores the panic site for the enclosing
/// [`guarded`] call and returns `false` when the current task is not guarded.
pub(crate) fn record_panic_site(location: &str) -> bool {
    GUARD_SCOPE
        .try_with(|site| {
            *site.borrow_mut() = Some(PanicSite::capture(location.to_string()));
        })
        .is_ok()
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
