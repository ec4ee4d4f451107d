//! Fragment router.
//!
//! Maps a location fragment such as `#/detail/42` to a route, issues a new
//! render ticket and hands the route's view the parsed parameter. Views
//! render on their own task; the router never waits for them.

use crate::document::Document;
use crate::views::{View, ViewContext};
use anyhow::{bail, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Static renderer for a route without a live view
pub type FallbackRenderer = fn(&ViewContext, Option<&str>);

/// What a route dispatches to
#[derive(Clone)]
pub enum RouteHandler {
    Registered(Arc<dyn View>),
    Unregistered(FallbackRenderer),
}

#[derive(Clone)]
pub struct Route {
    pub pattern: String,
    pub handler: RouteHandler,
}

impl Route {
    pub fn view(pattern: impl Into<String>, view: Arc<dyn View>) -> Self {
        Self {
            pattern: pattern.into(),
            handler: RouteHandler::Registered(view),
        }
    }

    pub fn fallback(pattern: impl Into<String>, renderer: FallbackRenderer) -> Self {
        Self {
            pattern: pattern.into(),
            handler: RouteHandler::Unregistered(renderer),
        }
    }

    /// Fragment prefix for a pattern ending in a `:param` segment
    fn param_prefix(&self) -> Option<&str> {
        let (prefix, last) = self.pattern.rsplit_once('/')?;
        last.starts_with(':').then(|| &self.pattern[..prefix.len() + 1])
    }
}

/// Route key and parameter extracted from a fragment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRoute {
    pub route: String,
    pub param: Option<String>,
}

/// Record of one dispatch
#[derive(Debug)]
pub struct Dispatch {
    pub route: String,
    pub param: Option<String>,
    pub generation: u64,
    /// Task rendering a registered view; `None` for fallback renderers
    pub handle: Option<JoinHandle<()>>,
}

impl Dispatch {
    /// Wait for the view's render task, if any
    pub async fn settle(self) {
        if let Some(handle) = self.handle {
            if let Err(e) = handle.await {
                error!(route = %self.route, error = %e, "View render task failed");
            }
        }
    }
}

/// Readable, writable location fragment with change notifications
pub trait Location: Send + Sync {
    fn current(&self) -> String;

    /// Set the fragment. Subscribers are notified only when it changes.
    fn assign(&self, fragment: &str);

    /// Step back in history; false when there is nowhere to go
    fn back(&self) -> bool;

    fn forward(&self) -> bool;
}

#[derive(Debug)]
struct History {
    current: String,
    back: Vec<String>,
    forward: Vec<String>,
}

/// In-process location with browser-style back/forward stacks
pub struct HistoryLocation {
    history: Mutex<History>,
    changes: UnboundedSender<String>,
}

impl HistoryLocation {
    /// Create a location and the receiver for its change notifications
    pub fn new(initial: &str) -> (Arc<Self>, UnboundedReceiver<String>) {
        let (changes, receiver) = unbounded_channel();
        let location = Self {
            history: Mutex::new(History {
                current: initial.to_string(),
                back: Vec::new(),
                forward: Vec::new(),
            }),
            changes,
        };
        (Arc::new(location), receiver)
    }

    fn history(&self) -> MutexGuard<'_, History> {
        self.history.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn notify(&self, fragment: String) {
        if self.changes.send(fragment).is_err() {
            debug!("No listener for location changes");
        }
    }
}

impl Location for HistoryLocation {
    fn current(&self) -> String {
        self.history().current.clone()
    }

    fn assign(&self, fragment: &str) {
        {
            let mut history = self.history();
            if history.current == fragment {
                return;
            }
            let previous = std::mem::replace(&mut history.current, fragment.to_string());
            history.back.push(previous);
            history.forward.clear();
        }
        self.notify(fragment.to_string());
    }

    fn back(&self) -> bool {
        let fragment = {
            let mut history = self.history();
            let Some(previous) = history.back.pop() else {
                return false;
            };
            let current = std::mem::replace(&mut history.current, previous.clone());
            history.forward.push(current);
            previous
        };
        self.notify(fragment);
        true
    }

    fn forward(&self) -> bool {
        let fragment = {
            let mut history = self.history();
            let Some(next) = history.forward.pop() else {
                return false;
            };
            let current = std::mem::replace(&mut history.current, next.clone());
            history.back.push(current);
            next
        };
        self.notify(fragment);
        true
    }
}

pub struct Router {
    routes: Vec<Route>,
    default_index: usize,
    location: Arc<dyn Location>,
    document: Arc<Document>,
}

impl Router {
    /// Build a router over `routes`. `default_route` must be one of them.
    pub fn new(
        routes: Vec<Route>,
        default_route: &str,
        location: Arc<dyn Location>,
        document: Arc<Document>,
    ) -> Result<Self> {
        let Some(default_index) = routes.iter().position(|r| r.pattern == default_route) else {
            bail!("Default route {} is not in the route table", default_route);
        };

        Ok(Self {
            routes,
            default_index,
            location,
            document,
        })
    }

    pub fn default_route(&self) -> &str {
        &self.routes[self.default_index].pattern
    }

    pub fn document(&self) -> &Arc<Document> {
        &self.document
    }

    pub fn location(&self) -> &Arc<dyn Location> {
        &self.location
    }

    /// Context for work on the navigation currently shown
    pub fn context(&self) -> ViewContext {
        ViewContext::new(self.document.clone(), self.document.current_ticket())
    }

    /// Split a fragment into its route key and parameter
    pub fn parse_route(&self, fragment: &str) -> ParsedRoute {
        if fragment.is_empty() || fragment == "#" {
            return ParsedRoute {
                route: self.default_route().to_string(),
                param: None,
            };
        }

        for route in &self.routes {
            let Some(prefix) = route.param_prefix() else {
                continue;
            };
            if let Some(rest) = fragment.strip_prefix(prefix) {
                let param = rest.split('/').next().filter(|p| !p.is_empty());
                return ParsedRoute {
                    route: route.pattern.clone(),
                    param: param.map(str::to_string),
                };
            }
        }

        ParsedRoute {
            route: fragment.to_string(),
            param: None,
        }
    }

    /// Render the route for the current location.
    ///
    /// Must be called inside a tokio runtime; registered views are spawned.
    pub fn dispatch(&self) -> Dispatch {
        let fragment = self.location.current();
        let parsed = self.parse_route(&fragment);

        let (route, param) = match self.routes.iter().find(|r| r.pattern == parsed.route) {
            Some(route) => (route, parsed.param),
            None => {
                debug!(fragment = %fragment, "Unknown route, using default");
                (&self.routes[self.default_index], None)
            }
        };

        let ticket = self.document.issue_ticket();
        let generation = ticket.generation();
        let ctx = ViewContext::new(self.document.clone(), ticket);

        info!(
            route = %route.pattern,
            param = param.as_deref().unwrap_or(""),
            generation = generation,
            "Dispatching route"
        );

        let handle = match &route.handler {
            RouteHandler::Registered(view) => {
                let view = view.clone();
                let view_param = param.clone();
                Some(tokio::spawn(async move { view.render(ctx, view_param).await }))
            }
            RouteHandler::Unregistered(render) => {
                render(&ctx, param.as_deref());
                None
            }
        };

        Dispatch {
            route: route.pattern.clone(),
            param,
            generation,
            handle,
        }
    }

    /// Go to `fragment`.
    ///
    /// A new fragment is dispatched when its change notification arrives.
    /// The current fragment produces no notification, so it is dispatched
    /// here and the record returned.
    pub fn navigate(&self, fragment: &str) -> Option<Dispatch> {
        if self.location.current() == fragment {
            return Some(self.dispatch());
        }

        self.location.assign(fragment);
        None
    }

    pub fn back(&self) -> bool {
        self.location.back()
    }

    pub fn forward(&self) -> bool {
        self.location.forward()
    }

    /// Wait for the next location change and dispatch it.
    ///
    /// Returns `None` once the location is gone.
    pub async fn next(&self, changes: &mut UnboundedReceiver<String>) -> Option<Dispatch> {
        let fragment = changes.recv().await?;
        debug!(fragment = %fragment, "Location changed");
        Some(self.dispatch())
    }

    /// Dispatch every location change until the location is dropped
    pub async fn run(&self, mut changes: UnboundedReceiver<String>) {
        while self.next(&mut changes).await.is_some() {}
        debug!("Location closed, router stopping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingView {
        renders: AtomicUsize,
        params: Mutex<Vec<Option<String>>>,
    }

    #[async_trait]
    impl View for CountingView {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn render(&self, ctx: ViewContext, param: Option<String>) {
            self.renders.fetch_add(1, Ordering::SeqCst);
            self.params.lock().unwrap().push(param);
            ctx.document.mount(&ctx.ticket, self.name(), "Counting", &[("body", "rendered")]);
        }
    }

    fn static_page(ctx: &ViewContext, _param: Option<&str>) {
        ctx.document.mount(&ctx.ticket, "static", "Static", &[("body", "static")]);
    }

    fn router(initial: &str) -> (Router, Arc<CountingView>, UnboundedReceiver<String>) {
        let view = Arc::new(CountingView::default());
        let (location, changes) = HistoryLocation::new(initial);
        let routes = vec![
            Route::view("#/home", view.clone()),
            Route::view("#/detail/:id", view.clone()),
            Route::fallback("#/settings", static_page),
        ];
        let router = Router::new(routes, "#/home", location, Arc::new(Document::new())).unwrap();
        (router, view, changes)
    }

    #[test]
    fn test_parse_route() {
        let (router, _, _) = router("");

        assert_eq!(
            router.parse_route("#/detail/42"),
            ParsedRoute {
                route: "#/detail/:id".to_string(),
                param: Some("42".to_string())
            }
        );
        assert_eq!(router.parse_route("#/detail/42/reviews").param.as_deref(), Some("42"));
        assert_eq!(router.parse_route("#/detail/").param, None);

        for empty in ["", "#"] {
            let parsed = router.parse_route(empty);
            assert_eq!(parsed.route, "#/home");
            assert_eq!(parsed.param, None);
        }

        let unknown = router.parse_route("#/unknown");
        assert_eq!(unknown.route, "#/unknown");
        assert!(!router.routes.iter().any(|r| r.pattern == unknown.route));
    }

    #[test]
    fn test_default_route_must_exist() {
        let (location, _changes) = HistoryLocation::new("");
        let result = Router::new(
            vec![Route::fallback("#/settings", static_page)],
            "#/home",
            location,
            Arc::new(Document::new()),
        );
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_unknown_route_dispatches_default() {
        let (router, view, _changes) = router("#/nowhere");

        let dispatch = router.dispatch();
        assert_eq!(dispatch.route, "#/home");
        assert_eq!(dispatch.param, None);
        dispatch.settle().await;
        assert_eq!(view.renders.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_fallback_renders_synchronously() {
        let (router, view, _changes) = router("#/settings");

        let dispatch = router.dispatch();
        assert!(dispatch.handle.is_none());
        assert_eq!(router.document().section().as_deref(), Some("static"));
        assert_eq!(view.renders.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_same_fragment_redispatches() {
        let (router, view, mut changes) = router("#/detail/7");

        router.dispatch().settle().await;
        let again = router.navigate("#/detail/7").expect("same fragment dispatches");
        again.settle().await;

        assert_eq!(view.renders.load(Ordering::SeqCst), 2);
        assert!(changes.try_recv().is_err());
        assert_eq!(
            *view.params.lock().unwrap(),
            vec![Some("7".to_string()), Some("7".to_string())]
        );
    }

    #[tokio::test]
    async fn test_new_fragment_dispatches_on_notification() {
        let (router, view, mut changes) = router("#/home");

        assert!(router.navigate("#/detail/42").is_none());
        assert_eq!(view.renders.load(Ordering::SeqCst), 0);

        let dispatch = router.next(&mut changes).await.unwrap();
        assert_eq!(dispatch.param.as_deref(), Some("42"));
        dispatch.settle().await;
        assert_eq!(view.renders.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_generations_increase() {
        let (router, _, _changes) = router("#/home");

        let first = router.dispatch();
        let second = router.dispatch();
        assert!(second.generation > first.generation);
        assert_eq!(router.context().ticket.generation(), second.generation);
    }

    #[test]
    fn test_history_back_forward() {
        let (location, mut changes) = HistoryLocation::new("#/home");

        location.assign("#/search");
        location.assign("#/detail/1");
        location.assign("#/detail/1");
        assert!(location.back());
        assert_eq!(location.current(), "#/search");
        assert!(location.back());
        assert!(!location.back());
        assert!(location.forward());
        assert_eq!(location.current(), "#/search");

        location.assign("#/quotes");
        assert!(!location.forward());

        let mut seen = Vec::new();
        while let Ok(fragment) = changes.try_recv() {
            seen.push(fragment);
        }
        assert_eq!(
            seen,
            vec!["#/search", "#/detail/1", "#/search", "#/home", "#/search", "#/quotes"]
        );
    }

    #[tokio::test]
    async fn test_run_dispatches_until_closed() {
        let (router, view, _changes) = router("#/home");
        let (tx, rx) = unbounded_channel();
        tx.send("#/home".to_string()).unwrap();
        tx.send("#/detail/3".to_string()).unwrap();
        drop(tx);

        router.run(rx).await;
        for _ in 0..10 {
            if view.renders.load(Ordering::SeqCst) == 2 {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(view.renders.load(Ordering::SeqCst), 2);
    }
}
