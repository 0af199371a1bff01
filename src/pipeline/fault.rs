//! Per-request fault boundary.
//!
//! A process-wide panic hook stores the backtrace of a panic raised inside a
//! guarded request in a task-local slot. Panics outside a guarded request go
//! to the previously installed hook unchanged.

use std::any::Any;
use std::backtrace::Backtrace;
use std::cell::RefCell;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Once;

use futures_util::FutureExt;

tokio::task_local! {
    static PANIC_BACKTRACE: RefCell<Option<String>>;
}

static HOOK: Once = Once::new();

/// A panic caught at the boundary.
#[derive(Debug)]
pub struct Fault {
    pub message: String,
    pub backtrace: Option<String>,
}

pub(crate) fn install_panic_hook() {
    HOOK.call_once(|| {
        let previous = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            let captured = PANIC_BACKTRACE.try_with(|slot| {
                *slot.borrow_mut() = Some(Backtrace::force_capture().to_string());
            });
            if captured.is_err() {
                previous(info);
            }
        }));
    });
}

/// Poll `fut` to completion, turning a panic into a [`Fault`].
pub(crate) async fn guard<F>(fut: F) -> Result<F::Output, Fault>
where
    F: Future,
{
    install_panic_hook();

    PANIC_BACKTRACE
        .scope(RefCell::new(None), async move {
            match AssertUnwindSafe(fut).catch_unwind().await {
                Ok(output) => Ok(output),
                Err(payload) => Err(Fault {
                    message: panic_message(payload),
                    backtrace: PANIC_BACKTRACE.with(|slot| slot.borrow_mut().take()),
                }),
            }
        })
        .await
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_panic_carries_backtrace() {
        let fault = guard(async {
            if true {
                panic!("boom");
            }
            1
        })
        .await
        .unwrap_err();

        assert_eq!(fault.message, "boom");
        assert!(fault.backtrace.is_some_and(|trace| !trace.is_empty()));
    }

    #[tokio::test]
    async fn test_completed_future_passes_through() {
        assert_eq!(guard(async { 7 }).await.unwrap(), 7);
    }

    #[test]
    fn test_panic_message_variants() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(42u8)), "non-string panic payload");
    }
}
