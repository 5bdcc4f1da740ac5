//! Request lifecycle dispatcher: default callbacks shared by every request
//! a dispatcher creates.

use crate::error::{CallbackKind, RequestError, RequestResult};
use crate::request::{Request, RequestOptions, Settlement};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, warn};

pub type ResolveCallback = Arc<dyn Fn(&Request, &Value) -> anyhow::Result<()> + Send + Sync>;
pub type RejectCallback =
    Arc<dyn Fn(&Request, &anyhow::Error) -> anyhow::Result<()> + Send + Sync>;
pub type TimeoutCallback = Arc<dyn Fn(&Request) -> anyhow::Result<()> + Send + Sync>;

/// Timeout faults kept for [`RequestDispatcher::take_faults`]. Older faults
/// are dropped once the queue is full.
pub const MAX_QUEUED_FAULTS: usize = 1024;

#[derive(Clone)]
struct TimeoutHook {
    callback: TimeoutCallback,
    duration: Duration,
}

/// The three append-only registries. Shared with the settlement listener of
/// every request so that settlement reads them live.
#[derive(Default)]
struct Registry {
    resolve: RwLock<Vec<ResolveCallback>>,
    reject: RwLock<Vec<RejectCallback>>,
    timeouts: RwLock<Vec<TimeoutHook>>,
}

impl Registry {
    fn dispatch(&self, request: &Request, settlement: &Settlement) -> RequestResult<()> {
        match settlement {
            Settlement::Resolved(value) => {
                for (index, callback) in snapshot(&self.resolve).iter().enumerate() {
                    callback(request, value)
                        .map_err(|e| callback_fault(request, CallbackKind::Resolve, index, e))?;
                }
            }
            Settlement::Rejected(err) => {
                for (index, callback) in snapshot(&self.reject).iter().enumerate() {
                    callback(request, &**err)
                        .map_err(|e| callback_fault(request, CallbackKind::Reject, index, e))?;
                }
            }
        }
        Ok(())
    }
}

/// Copies a registry so callbacks run without the lock held and may register
/// further callbacks.
fn snapshot<T: Clone>(registry: &RwLock<Vec<T>>) -> Vec<T> {
    registry
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

fn append<T>(registry: &RwLock<Vec<T>>, item: T) {
    registry
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .push(item);
}

fn callback_fault(
    request: &Request,
    kind: CallbackKind,
    index: usize,
    source: anyhow::Error,
) -> RequestError {
    error!(
        "{} callback #{} failed for request {}: {:#}",
        kind,
        index,
        request.id(),
        source
    );
    RequestError::CallbackFault {
        id: request.id().to_string(),
        kind,
        index,
        source,
    }
}

struct Timer {
    request_id: String,
    handle: JoinHandle<()>,
}

/// Creates [`Request`]s and notifies default callbacks of their lifecycle.
///
/// - Resolve and reject callbacks are read when a request settles, so a
///   callback added after [`new_request`](Self::new_request) still fires for
///   requests that are pending at that point. They run in registration order
///   on the settling call; the first failure stops the rest and is returned
///   from [`Request::resolve`] / [`Request::reject`].
/// - Timeout callbacks are fixed when a request is created. Each gets its own
///   timer; on expiry the callback runs only if the request is still pending.
///   Timeouts never change the request's state.
///
/// Dropping the dispatcher aborts its outstanding timers.
#[derive(Default)]
pub struct RequestDispatcher {
    registry: Arc<Registry>,
    timers: Mutex<Vec<Timer>>,
    faults: Arc<Mutex<VecDeque<RequestError>>>,
}

impl RequestDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a request wired to this dispatcher's callbacks.
    ///
    /// # Panics
    ///
    /// Panics if timeout callbacks are registered and this is called outside
    /// a Tokio runtime.
    pub fn new_request(&self, options: RequestOptions) -> Request {
        let request = Request::new(options);
        let registry = Arc::clone(&self.registry);
        // A fresh request is pending, so this only queues the listener.
        let _ = request.on_settled(move |request, settlement| {
            registry.dispatch(request, settlement)
        });
        self.schedule_timeouts(&request);
        debug!("Created request {}", request.id());
        request
    }

    pub fn add_default_resolve_callback<F>(&self, callback: F)
    where
        F: Fn(&Request, &Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        append(&self.registry.resolve, Arc::new(callback) as ResolveCallback);
    }

    pub fn add_default_reject_callback<F>(&self, callback: F)
    where
        F: Fn(&Request, &anyhow::Error) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        append(&self.registry.reject, Arc::new(callback) as RejectCallback);
    }

    /// Registers a timeout callback for requests created from now on.
    pub fn add_default_timeout_callback<F>(&self, callback: F, duration: Duration)
    where
        F: Fn(&Request) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        append(
            &self.registry.timeouts,
            TimeoutHook {
                callback: Arc::new(callback),
                duration,
            },
        );
    }

    /// Number of timers that have not fired or been aborted yet.
    pub fn pending_timers(&self) -> usize {
        self.lock_timers()
            .iter()
            .filter(|timer| !timer.handle.is_finished())
            .count()
    }

    /// Drains the faults raised by timeout callbacks, oldest first.
    ///
    /// Timeout callbacks run on their own tasks, so their failures cannot
    /// reach a caller directly. They are logged and kept here instead, up to
    /// [`MAX_QUEUED_FAULTS`]; past that the oldest are discarded.
    pub fn take_faults(&self) -> Vec<RequestError> {
        self.faults
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect()
    }

    /// Aborts every outstanding timer.
    pub fn shutdown(&self) {
        let timers = std::mem::take(&mut *self.lock_timers());
        let mut aborted = 0;
        for timer in timers {
            if !timer.handle.is_finished() {
                debug!("Aborting timeout timer for request {}", timer.request_id);
                timer.handle.abort();
                aborted += 1;
            }
        }
        debug!("Dispatcher shut down, {} timers aborted", aborted);
    }

    fn schedule_timeouts(&self, request: &Request) {
        let hooks = snapshot(&self.registry.timeouts);
        if hooks.is_empty() {
            return;
        }

        let mut timers = self.lock_timers();
        timers.retain(|timer| !timer.handle.is_finished());
        for (index, hook) in hooks.into_iter().enumerate() {
            let request = request.clone();
            let faults = Arc::clone(&self.faults);
            let request_id = request.id().to_string();
            let Some(deadline) = Instant::now().checked_add(hook.duration) else {
                debug!(
                    "Timeout #{} for request {} is beyond the clock range, not scheduled",
                    index, request_id
                );
                continue;
            };
            let handle = tokio::spawn(async move {
                tokio::time::sleep_until(deadline).await;
                if !request.is_pending() {
                    debug!(
                        "Skipping timeout #{} for request {} (already {})",
                        index,
                        request.id(),
                        request.status()
                    );
                    return;
                }
                if let Err(e) = (hook.callback)(&request) {
                    let fault = callback_fault(&request, CallbackKind::Timeout, index, e);
                    let mut faults = faults.lock().unwrap_or_else(PoisonError::into_inner);
                    if faults.len() == MAX_QUEUED_FAULTS {
                        warn!("Fault queue full, dropping oldest timeout fault");
                        faults.pop_front();
                    }
                    faults.push_back(fault);
                }
            });
            timers.push(Timer { request_id, handle });
        }
    }

    fn lock_timers(&self) -> MutexGuard<'_, Vec<Timer>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for RequestDispatcher {
    fn drop(&mut self) {
        let timers = self.timers.get_mut().unwrap_or_else(PoisonError::into_inner);
        for timer in timers.drain(..) {
            timer.handle.abort();
        }
    }
}
