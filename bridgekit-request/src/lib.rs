//! Request tracking for bridgekit.
//!
//! A [`Request`] wraps one fallible asynchronous unit of work and settles
//! exactly once. A [`RequestDispatcher`] creates requests and fans their
//! lifecycle out to default callbacks:
//!
//! - resolve / reject callbacks, read live at settlement time
//! - timeout callbacks, scheduled per request at creation and skipped if
//!   the request settled first
//!
//! # Example
//!
//! ```
//! use bridgekit_request::{RequestDispatcher, RequestOptions};
//! use serde_json::json;
//!
//! let dispatcher = RequestDispatcher::new();
//! dispatcher.add_default_resolve_callback(|req, value| {
//!     println!("{} resolved with {value}", req.id());
//!     Ok(())
//! });
//!
//! let req = dispatcher.new_request(RequestOptions::new().with_data(json!({"op": "send"})));
//! req.resolve(json!("ok")).unwrap();
//! ```

mod dispatcher;
mod error;
mod request;

pub use dispatcher::{
    RejectCallback, RequestDispatcher, ResolveCallback, TimeoutCallback, MAX_QUEUED_FAULTS,
};
pub use error::{CallbackKind, RequestError, RequestResult};
pub use request::{Request, RequestOptions, RequestStatus, Settlement, SettlementListener};
