//! # Request Tracker Module
//!
//! Owns the set of in-flight, cancelable requests and a secondary index that
//! groups them by caller-defined context (for example "every request issued
//! by view X").
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`RequestManager`] | Registration, completion and cancellation bookkeeping |
//! | [`Cancel`] | Anything the tracker can cancel with a reason |
//! | [`cancel_pair`] | Linked [`CancelHandle`] / [`CancelSignal`] for one request |
//!
//! ## Example
//!
//! ```rust
//! use http_lifecycle::tracker::{cancel_pair, RequestManager};
//!
//! let tracker = RequestManager::new(false);
//! let (handle, signal) = cancel_pair();
//! tracker.add_request("user-42", Some("profile-view"), handle);
//!
//! // Tearing the view down cancels everything it started.
//! tracker.cancel_context_requests("profile-view");
//! assert!(signal.is_cancelled());
//! assert_eq!(signal.reason().as_deref(), Some("profile-view"));
//! ```
//!
//! Cancellation is fire-and-forget: the callback is invoked and bookkeeping
//! removed before the call returns. Whether the underlying I/O stops
//! immediately is up to whoever awaits the [`CancelSignal`].

mod cancel;
mod manager;

pub use cancel::{cancel_pair, Cancel, CancelHandle, CancelSignal};
pub use manager::RequestManager;
