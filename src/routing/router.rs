//! Route lookup.
//!
//! # Responsibilities
//! - Store compiled routes
//! - Look up the backend group for a request path
//! - Rotate through a group's static instances
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Highest priority first, then longest prefix
//! - Explicit `None` rather than a silent default route

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::config::{BackendGroupConfig, RouteConfig};
use crate::http::fallback::BackendService;
use crate::routing::matcher::PathPrefixMatcher;

/// A compiled route.
#[derive(Debug, Clone)]
pub struct Route {
    pub name: String,
    pub matcher: PathPrefixMatcher,
    pub backend_group: String,
    pub priority: u32,
}

/// A logical backend: instances rotated round-robin plus an optional
/// canned response for when its circuit is open.
#[derive(Debug)]
pub struct BackendGroup {
    name: String,
    instances: Vec<String>,
    fallback: Option<BackendService>,
    next: AtomicUsize,
}

impl BackendGroup {
    pub fn new(name: impl Into<String>, instances: Vec<String>, fallback: Option<BackendService>) -> Self {
        Self {
            name: name.into(),
            instances,
            fallback,
            next: AtomicUsize::new(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fallback(&self) -> Option<BackendService> {
        self.fallback
    }

    /// Next instance in rotation, `None` for an empty group.
    pub fn next_instance(&self) -> Option<&str> {
        if self.instances.is_empty() {
            return None;
        }
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % self.instances.len();
        self.instances.get(idx).map(String::as_str)
    }
}

/// Static route table built once at startup.
#[derive(Debug, Default)]
pub struct RouteTable {
    routes: Vec<Route>,
    groups: HashMap<String, Arc<BackendGroup>>,
}

impl RouteTable {
    pub fn from_config(routes: &[RouteConfig], groups: &[BackendGroupConfig]) -> Self {
        let mut compiled: Vec<Route> = routes
            .iter()
            .map(|r| Route {
                name: r.name.clone(),
                matcher: PathPrefixMatcher::new(r.path_prefix.clone()),
                backend_group: r.backend_group.clone(),
                priority: r.priority,
            })
            .collect();
        compiled.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.matcher.len().cmp(&a.matcher.len()))
        });

        let groups = groups
            .iter()
            .map(|g| {
                (
                    g.name.clone(),
                    Arc::new(BackendGroup::new(g.name.clone(), g.instances.clone(), g.fallback)),
                )
            })
            .collect();

        Self {
            routes: compiled,
            groups,
        }
    }

    /// First route whose prefix matches `path`.
    pub fn match_path(&self, path: &str) -> Option<&Route> {
        self.routes.iter().find(|r| r.matcher.matches(path))
    }

    pub fn group(&self, name: &str) -> Option<Arc<BackendGroup>> {
        self.groups.get(name).cloned()
    }

    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
