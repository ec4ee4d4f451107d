//! Anime browser library.
//!
//! Browses the Jikan v4 anime database and an anime quotes API from the
//! terminal. Requests go through a retrying, timeout-bounded fetcher and a
//! two-tier TTL cache; a fragment router dispatches views that render into
//! a shared document.

pub mod api;
pub mod app;
pub mod cache;
pub mod cli;
pub mod document;
pub mod fetch;
pub mod router;
pub mod views;

pub use api::{JikanClient, QuotesClient};
pub use app::{App, AppParts};
pub use cache::{with_cache, Cached, Clock, ManualClock, SystemClock, TtlCache};
pub use document::{Document, RenderTicket, WriteOutcome};
pub use fetch::{FetchError, FetchErrorKind, HttpTransport, ResilientFetcher, RetryPolicy};
pub use router::{Dispatch, HistoryLocation, Location, ParsedRoute, Route, RouteHandler, Router};
pub use views::{View, ViewContext};
