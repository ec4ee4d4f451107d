//! Shared render target for views.
//!
//! The document holds one mounted section (the "app" root) made of named
//! containers. Every navigation issues a new [`RenderTicket`]; writes made
//! with an older ticket are discarded, so a superseded view's late response
//! can never overwrite the view that replaced it.

use futures::future::BoxFuture;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

/// Re-runs a load sequence
pub type RetryAction = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Build a [`RetryAction`] from a closure
pub fn retry_action<F>(f: F) -> RetryAction
where
    F: Fn() -> BoxFuture<'static, ()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Proof of which navigation a render belongs to
#[derive(Debug, Clone)]
pub struct RenderTicket {
    generation: u64,
    current: Arc<AtomicU64>,
}

impl RenderTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Whether no navigation has happened since this ticket was issued
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }
}

/// Result of a container write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// No container with that id is mounted
    Missing,
    /// The ticket was superseded by a later navigation
    Stale,
}

impl WriteOutcome {
    pub fn is_written(&self) -> bool {
        matches!(self, WriteOutcome::Written)
    }
}

struct Container {
    id: String,
    content: String,
    retry: Option<RetryAction>,
}

struct Section {
    name: String,
    title: String,
    containers: Vec<Container>,
}

/// The shared root every view renders into
pub struct Document {
    root: Mutex<Option<Section>>,
    generation: Arc<AtomicU64>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        Self {
            root: Mutex::new(None),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    fn root(&self) -> MutexGuard<'_, Option<Section>> {
        self.root.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start a new navigation, invalidating every earlier ticket
    pub fn issue_ticket(&self) -> RenderTicket {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        RenderTicket {
            generation,
            current: self.generation.clone(),
        }
    }

    /// Ticket for the navigation currently on screen
    pub fn current_ticket(&self) -> RenderTicket {
        RenderTicket {
            generation: self.generation.load(Ordering::SeqCst),
            current: self.generation.clone(),
        }
    }

    /// Replace the root with a section built from `(id, initial content)` pairs
    pub fn mount(&self, ticket: &RenderTicket, name: &str, title: &str, containers: &[(&str, &str)]) -> WriteOutcome {
        let mut root = self.root();
        if !ticket.is_current() {
            debug!(section = name, generation = ticket.generation, "Discarding stale mount");
            return WriteOutcome::Stale;
        }

        *root = Some(Section {
            name: name.to_string(),
            title: title.to_string(),
            containers: containers
                .iter()
                .map(|(id, content)| Container {
                    id: id.to_string(),
                    content: content.to_string(),
                    retry: None,
                })
                .collect(),
        });
        WriteOutcome::Written
    }

    /// Name of the mounted section
    pub fn section(&self) -> Option<String> {
        self.root().as_ref().map(|section| section.name.clone())
    }

    pub fn has_container(&self, id: &str) -> bool {
        self.root()
            .as_ref()
            .is_some_and(|section| section.containers.iter().any(|c| c.id == id))
    }

    pub fn content(&self, id: &str) -> Option<String> {
        self.root()
            .as_ref()?
            .containers
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.content.clone())
    }

    fn update(&self, ticket: &RenderTicket, id: &str, content: String, retry: Option<RetryAction>) -> WriteOutcome {
        let mut root = self.root();
        if !ticket.is_current() {
            debug!(container = id, generation = ticket.generation, "Discarding stale write");
            return WriteOutcome::Stale;
        }

        let Some(container) = root
            .as_mut()
            .and_then(|section| section.containers.iter_mut().find(|c| c.id == id))
        else {
            return WriteOutcome::Missing;
        };

        container.content = content;
        container.retry = retry;
        WriteOutcome::Written
    }

    /// Replace a container's content, dropping any retry action it had
    pub fn write(&self, ticket: &RenderTicket, id: &str, content: impl Into<String>) -> WriteOutcome {
        self.update(ticket, id, content.into(), None)
    }

    /// Show an error in a container together with its retry control
    pub fn write_error(
        &self,
        ticket: &RenderTicket,
        id: &str,
        message: &str,
        retry: RetryAction,
    ) -> WriteOutcome {
        let content = format!("{}\n[retry {}]", message, id);
        self.update(ticket, id, content, Some(retry))
    }

    /// Ids of containers currently offering a retry
    pub fn retryable(&self) -> Vec<String> {
        self.root()
            .as_ref()
            .map(|section| {
                section
                    .containers
                    .iter()
                    .filter(|c| c.retry.is_some())
                    .map(|c| c.id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The load sequence behind a container's retry control, if it has one
    pub fn retry(&self, id: &str) -> Option<BoxFuture<'static, ()>> {
        let action = self
            .root()
            .as_ref()?
            .containers
            .iter()
            .find(|c| c.id == id)?
            .retry
            .clone()?;
        Some(action())
    }

    /// Plain-text rendering of the mounted section
    pub fn render(&self) -> String {
        let root = self.root();
        let Some(section) = root.as_ref() else {
            return String::new();
        };

        let mut out = String::new();
        let _ = writeln!(out, "== {} ==", section.title);
        for container in &section.containers {
            if container.content.is_empty() {
                continue;
            }
            let _ = writeln!(out);
            let _ = writeln!(out, "{}", container.content);
        }
        out
    }
}

/// Container contents keyed by id, for assertions and debugging
pub fn snapshot(document: &Document) -> HashMap<String, String> {
    document
        .root()
        .as_ref()
        .map(|section| {
            section
                .containers
                .iter()
                .map(|c| (c.id.clone(), c.content.clone()))
                .collect()
        })
        .unwrap_or_default()
}
