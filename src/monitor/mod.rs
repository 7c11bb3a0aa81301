//! Subscriptions and change notification.
//!
//! Producers call `update`; the store merges under its locks, then the
//! [`NotificationDispatcher`] walks a registry snapshot on the caller's thread
//! and invokes every matching subscriber through the [`ErrorBoundary`]. A
//! subscriber can be a callback or a bounded [`StateWatch`] stream.

/// Failure isolation for callbacks.
pub mod boundary;
/// Matching and fan-out.
pub mod dispatcher;
/// Subscriber records, filters and handles.
pub mod registry;
/// Channel-backed subscriptions.
pub mod stream;

pub use boundary::ErrorBoundary;
pub use dispatcher::{DispatchReport, NotificationDispatcher};
pub use registry::{
    subscriber_fn, RepoFilter, Subscriber, SubscriberRecord, Subscription, SubscriptionId,
    SubscriptionRegistry, WILDCARD,
};
pub use stream::{StateChange, StateWatch, WatchError};
