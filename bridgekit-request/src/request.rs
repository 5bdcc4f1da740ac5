//! A single trackable unit of asynchronous work.

use crate::error::{RequestError, RequestResult};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

/// Coarse lifecycle state of a [`Request`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestStatus {
    Pending,
    Resolved,
    Rejected,
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::Resolved => f.write_str("resolved"),
            Self::Rejected => f.write_str("rejected"),
        }
    }
}

/// The terminal outcome of a request.
#[derive(Debug, Clone)]
pub enum Settlement {
    Resolved(Value),
    Rejected(Arc<anyhow::Error>),
}

impl Settlement {
    pub fn status(&self) -> RequestStatus {
        match self {
            Self::Resolved(_) => RequestStatus::Resolved,
            Self::Rejected(_) => RequestStatus::Rejected,
        }
    }
}

/// Describes a request to create.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Explicit request id. A UUID v7 is generated when absent.
    pub id: Option<String>,
    /// Opaque descriptor carried by the request.
    pub data: Value,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = data.into();
        self
    }
}

/// Runs once when the request settles. An error stops later listeners and
/// is returned from the settling call.
pub type SettlementListener =
    Box<dyn FnOnce(&Request, &Settlement) -> RequestResult<()> + Send + 'static>;

struct Inner {
    id: String,
    data: Value,
    started_at: Instant,
    state: watch::Sender<Option<Settlement>>,
    listeners: Mutex<Vec<SettlementListener>>,
}

/// A trackable request. Cloning yields another handle to the same request.
///
/// A request starts pending and settles exactly once, by [`resolve`] or
/// [`reject`]. The state lives in a watch cell, so [`is_pending`] is a single
/// atomic read that timers can consult at fire time.
///
/// [`resolve`]: Request::resolve
/// [`reject`]: Request::reject
/// [`is_pending`]: Request::is_pending
#[derive(Clone)]
pub struct Request {
    inner: Arc<Inner>,
}

impl Request {
    pub fn new(options: RequestOptions) -> Self {
        let id = options.id.unwrap_or_else(|| Uuid::now_v7().to_string());
        Self {
            inner: Arc::new(Inner {
                id,
                data: options.data,
                started_at: Instant::now(),
                state: watch::Sender::new(None),
                listeners: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.inner.id
    }

    pub fn data(&self) -> &Value {
        &self.inner.data
    }

    /// Time elapsed since the request was created.
    pub fn duration(&self) -> Duration {
        self.inner.started_at.elapsed()
    }

    pub fn status(&self) -> RequestStatus {
        self.inner
            .state
            .borrow()
            .as_ref()
            .map_or(RequestStatus::Pending, Settlement::status)
    }

    pub fn is_pending(&self) -> bool {
        self.inner.state.borrow().is_none()
    }

    /// The settlement, once there is one.
    pub fn outcome(&self) -> Option<Settlement> {
        self.inner.state.borrow().clone()
    }

    /// Waits until the request settles.
    pub async fn settled(&self) -> Settlement {
        let mut rx = self.inner.state.subscribe();
        loop {
            if let Some(settlement) = rx.borrow_and_update().as_ref() {
                return settlement.clone();
            }
            // The sender is owned by `self`, so this only wakes on a change.
            let _ = rx.changed().await;
        }
    }

    /// Subscribes to settlement.
    ///
    /// Listeners run in subscription order on the settling call. Subscribing
    /// to a request that already settled runs the listener immediately.
    pub fn on_settled<F>(&self, listener: F) -> RequestResult<()>
    where
        F: FnOnce(&Request, &Settlement) -> RequestResult<()> + Send + 'static,
    {
        {
            let mut listeners = self.lock_listeners();
            if self.is_pending() {
                listeners.push(Box::new(listener));
                return Ok(());
            }
        }
        match self.outcome() {
            Some(settlement) => listener(self, &settlement),
            None => Ok(()),
        }
    }

    /// Settles the request successfully.
    pub fn resolve(&self, value: impl Into<Value>) -> RequestResult<()> {
        self.settle(Settlement::Resolved(value.into()))
    }

    /// Settles the request as failed.
    pub fn reject(&self, error: impl Into<anyhow::Error>) -> RequestResult<()> {
        self.settle(Settlement::Rejected(Arc::new(error.into())))
    }

    /// Awaits `work` and settles the request with its result.
    pub async fn outcome_from<F>(&self, work: F) -> RequestResult<()>
    where
        F: Future<Output = anyhow::Result<Value>>,
    {
        match work.await {
            Ok(value) => self.resolve(value),
            Err(err) => self.reject(err),
        }
    }

    fn settle(&self, settlement: Settlement) -> RequestResult<()> {
        let delivered = settlement.clone();
        let mut slot = Some(settlement);
        let changed = self.inner.state.send_if_modified(|state| {
            if state.is_some() {
                return false;
            }
            *state = slot.take();
            true
        });
        if !changed {
            let status = self.status();
            warn!("Ignoring second settlement of request {} (already {})", self.id(), status);
            return Err(RequestError::AlreadySettled {
                id: self.id().to_string(),
                status,
            });
        }

        debug!(
            "Request {} {} after {:?}",
            self.id(),
            delivered.status(),
            self.duration()
        );
        let listeners = std::mem::take(&mut *self.lock_listeners());
        for listener in listeners {
            listener(self, &delivered)?;
        }
        Ok(())
    }

    fn lock_listeners(&self) -> std::sync::MutexGuard<'_, Vec<SettlementListener>> {
        self.inner
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Request")
            .field("id", &self.inner.id)
            .field("data", &self.inner.data)
            .field("status", &self.status())
            .finish()
    }
}
