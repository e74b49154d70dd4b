//! Pending-request correlation.
//!
//! Asynchronous calls park their callback triple here keyed by request id;
//! completions are routed back through [`PendingTable::dispatch`] using the
//! id the response carries, so out-of-order completion still reaches the
//! right caller.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Mutex;

use torrentd_wire::Value;

use crate::error::RpcError;

/// Callback triple for an asynchronous call. All three are optional.
///
/// `on_exception` returns whether it handled the error; unhandled errors are
/// aggregated and surfaced by [`PendingTable::dispatch`]. It can run more
/// than once for a single response — once for the server fault and again if
/// a later callback fails.
#[derive(Default)]
pub struct CallHandlers {
    on_success: Option<Box<dyn FnOnce(Value) + Send>>,
    on_exception: Option<Box<dyn FnMut(&RpcError) -> bool + Send>>,
    on_complete: Option<Box<dyn FnOnce() + Send>>,
}

impl CallHandlers {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_success(mut self, callback: impl FnOnce(Value) + Send + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn on_exception(
        mut self,
        callback: impl FnMut(&RpcError) -> bool + Send + 'static,
    ) -> Self {
        self.on_exception = Some(Box::new(callback));
        self
    }

    #[must_use]
    pub fn on_complete(mut self, callback: impl FnOnce() + Send + 'static) -> Self {
        self.on_complete = Some(Box::new(callback));
        self
    }
}

impl std::fmt::Debug for CallHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallHandlers")
            .field("on_success", &self.on_success.is_some())
            .field("on_exception", &self.on_exception.is_some())
            .field("on_complete", &self.on_complete.is_some())
            .finish()
    }
}

/// Id-keyed table of in-flight asynchronous calls.
#[derive(Debug, Default)]
pub struct PendingTable {
    entries: Mutex<HashMap<u64, CallHandlers>>,
}

impl PendingTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Park the handlers for request `id`.
    pub fn register(&self, id: u64, handlers: CallHandlers) {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(id, handlers);
    }

    /// Whether a request with `id` is in flight.
    #[must_use]
    pub fn contains(&self, id: u64) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .contains_key(&id)
    }

    /// Number of in-flight requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Route a completed call to its parked handlers.
    ///
    /// The entry is removed before any callback runs, so a panicking
    /// callback cannot leave it behind. Failure routing follows the
    /// callback protocol: faults go to `on_exception`; a panic in
    /// `on_success` is converted to an error and routed the same way;
    /// `on_complete` always runs last.
    ///
    /// # Errors
    /// - [`RpcError::UnknownRequestId`] when no request with this id is
    ///   in flight.
    /// - [`RpcError::Uncaught`] aggregating every error no exception
    ///   handler claimed.
    pub fn dispatch(&self, id: u64, outcome: Result<Value, RpcError>) -> Result<(), RpcError> {
        let handlers = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&id);
        let Some(mut handlers) = handlers else {
            return Err(RpcError::UnknownRequestId(id));
        };

        let mut uncaught: Vec<String> = Vec::new();
        let mut code: Option<i64> = None;

        match outcome {
            Err(error) => {
                route_exception(&mut handlers, &error, &mut uncaught, &mut code);
            }
            Ok(value) => {
                if let Some(on_success) = handlers.on_success.take() {
                    if let Err(panic) = catch_unwind(AssertUnwindSafe(|| on_success(value))) {
                        let error = RpcError::Callback(panic_message(&panic));
                        route_exception(&mut handlers, &error, &mut uncaught, &mut code);
                    }
                }
            }
        }

        if let Some(on_complete) = handlers.on_complete.take() {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(on_complete)) {
                let error = RpcError::Callback(panic_message(&panic));
                route_exception(&mut handlers, &error, &mut uncaught, &mut code);
            }
        }

        if uncaught.is_empty() {
            Ok(())
        } else {
            Err(RpcError::Uncaught {
                messages: uncaught,
                code,
            })
        }
    }
}

fn route_exception(
    handlers: &mut CallHandlers,
    error: &RpcError,
    uncaught: &mut Vec<String>,
    code: &mut Option<i64>,
) {
    if let Some(fault_code) = error.fault_code() {
        *code = Some(fault_code);
    }
    let Some(on_exception) = handlers.on_exception.as_mut() else {
        uncaught.push(error.to_string());
        return;
    };
    match catch_unwind(AssertUnwindSafe(|| on_exception(error))) {
        Ok(true) => {}
        Ok(false) => uncaught.push(error.to_string()),
        Err(panic) => {
            // The exception handler itself failed; keep both errors.
            uncaught.push(error.to_string());
            uncaught.push(panic_message(&panic));
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
