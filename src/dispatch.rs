/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/. */

//! The scheme dispatch table and the chain builder that assembles it.
//!
//! Lookup precedence, first match wins: interceptors (outermost = last
//! supplied), then runtime/construction-registered entries, then the built-in
//! fallback table, then the terminal "unhandled scheme" dispatcher.
//!
//! This type is confined to the worker thread. It is built exactly once at
//! core construction and mutated in place by registry tasks running on that
//! same thread; it is never shared by reference across threads.

use std::collections::HashMap;

use log::{debug, warn};

use crate::error::RegistryError;
use crate::handler::{
    FetchJob, InlineJob, Interceptor, RequestDispatcher, ResourceRequest, SchemeHandler,
};

/// How a live entry came to occupy its slot. An `Intercepted` entry has the
/// displaced original parked on the shelf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryOrigin {
    Registered,
    Intercepted,
}

/// One live handler slot. Exclusively owned by the table; replacing a slot
/// moves the old entry onto the one-deep shelf for its scheme.
struct HandlerEntry {
    handler: Box<dyn SchemeHandler>,
    origin: EntryOrigin,
}

/// Scheme → handler table with intercept shelf, built-in fallbacks, and the
/// interceptor chain wrapped around the whole lookup.
pub struct SchemeDispatchTable {
    entries: HashMap<String, HandlerEntry>,
    /// At most one shelved original per scheme, held while intercepted.
    shelf: HashMap<String, HandlerEntry>,
    builtins: HashMap<String, Box<dyn SchemeHandler>>,
    /// Stored outermost-first (reverse of supplied order).
    interceptors: Vec<Box<dyn Interceptor>>,
}

impl SchemeDispatchTable {
    pub(crate) fn register(
        &mut self,
        scheme: &str,
        handler: Box<dyn SchemeHandler>,
    ) -> Result<(), RegistryError> {
        let scheme = scheme.to_ascii_lowercase();
        if self.entries.contains_key(&scheme) {
            warn!("register rejected for {scheme}: entry already live");
            return Err(RegistryError::AlreadyRegistered);
        }
        debug!("registered handler for {scheme}");
        self.entries.insert(
            scheme,
            HandlerEntry {
                handler,
                origin: EntryOrigin::Registered,
            },
        );
        Ok(())
    }

    pub(crate) fn unregister(&mut self, scheme: &str) -> Result<(), RegistryError> {
        let scheme = scheme.to_ascii_lowercase();
        match self.entries.get(&scheme) {
            None => {
                warn!("unregister rejected for {scheme}: no entry");
                Err(RegistryError::NotRegistered)
            }
            Some(entry) if entry.origin == EntryOrigin::Intercepted => {
                // No Intercepted -> Unregistered transition; unintercept first.
                warn!("unregister rejected for {scheme}: scheme is intercepted");
                Err(RegistryError::OperationFailed)
            }
            Some(_) => {
                self.entries.remove(&scheme);
                debug!("unregistered handler for {scheme}");
                Ok(())
            }
        }
    }

    pub(crate) fn intercept(
        &mut self,
        scheme: &str,
        handler: Box<dyn SchemeHandler>,
    ) -> Result<(), RegistryError> {
        let scheme = scheme.to_ascii_lowercase();
        if !self.entries.contains_key(&scheme) {
            if self.builtins.contains_key(&scheme) {
                // Handled, but only by a built-in: not replaceable.
                warn!("intercept rejected for {scheme}: built-in handlers are not replaceable");
                return Err(RegistryError::InterceptFailed);
            }
            warn!("intercept rejected for {scheme}: no entry");
            return Err(RegistryError::NotRegistered);
        }
        if self.shelf.contains_key(&scheme) {
            // The shelf is one-deep; a second intercept has nowhere to park
            // the current replacement.
            warn!("intercept rejected for {scheme}: shelf already occupied");
            return Err(RegistryError::InterceptFailed);
        }

        let original = match self.entries.remove(&scheme) {
            Some(entry) => entry,
            None => return Err(RegistryError::OperationFailed),
        };
        self.shelf.insert(scheme.clone(), original);
        self.entries.insert(
            scheme.clone(),
            HandlerEntry {
                handler,
                origin: EntryOrigin::Intercepted,
            },
        );
        debug!("intercepted {scheme}; original shelved");
        Ok(())
    }

    pub(crate) fn unintercept(&mut self, scheme: &str) -> Result<(), RegistryError> {
        let scheme = scheme.to_ascii_lowercase();
        let Some(original) = self.shelf.remove(&scheme) else {
            warn!("unintercept rejected for {scheme}: nothing shelved");
            return Err(RegistryError::NotIntercepted);
        };
        self.entries.insert(scheme.clone(), original);
        debug!("unintercepted {scheme}; original restored");
        Ok(())
    }

    /// Whether any entry (registered, intercepted, or built-in) services the
    /// scheme right now.
    pub(crate) fn is_handled(&self, scheme: &str) -> bool {
        let scheme = scheme.to_ascii_lowercase();
        self.entries.contains_key(&scheme) || self.builtins.contains_key(&scheme)
    }

    /// Every scheme currently serviced, sorted for deterministic diagnostics.
    pub(crate) fn scheme_ids(&self) -> Vec<String> {
        let mut schemes: Vec<String> = self
            .entries
            .keys()
            .chain(self.builtins.keys())
            .cloned()
            .collect();
        schemes.sort();
        schemes.dedup();
        schemes
    }

    pub(crate) fn scheme_count(&self) -> usize {
        self.scheme_ids().len()
    }

    /// Route a request through the interceptor chain down to the tables.
    /// Always yields a job; the terminal dispatcher services anything left.
    pub fn dispatch(&self, request: &ResourceRequest) -> Box<dyn FetchJob> {
        ChainLink {
            table: self,
            depth: 0,
        }
        .dispatch(request)
    }

    fn lookup(&self, request: &ResourceRequest) -> Box<dyn FetchJob> {
        let scheme = request.scheme();
        if let Some(entry) = self.entries.get(scheme) {
            if let Some(job) = entry.handler.create_job(request) {
                return job;
            }
        }
        if let Some(handler) = self.builtins.get(scheme) {
            if let Some(job) = handler.create_job(request) {
                return job;
            }
        }
        InlineJob::failed(format!("no handler for scheme: {scheme}"))
    }
}

/// One position in the interceptor chain. Depth `n` hands the request to the
/// `n`-th interceptor with depth `n + 1` as its fallback; past the end, the
/// tables take over.
struct ChainLink<'a> {
    table: &'a SchemeDispatchTable,
    depth: usize,
}

impl RequestDispatcher for ChainLink<'_> {
    fn dispatch(&self, request: &ResourceRequest) -> Box<dyn FetchJob> {
        match self.table.interceptors.get(self.depth) {
            Some(interceptor) => interceptor.intercept(
                request,
                &ChainLink {
                    table: self.table,
                    depth: self.depth + 1,
                },
            ),
            None => self.table.lookup(request),
        }
    }
}

/// Assembles the dispatch table at core-construction time.
///
/// Caller-supplied handlers land in the primary map and shadow built-ins for
/// the same scheme. Interceptors wrap the assembled table in reverse supplied
/// order, so the last-supplied interceptor is outermost and sees every
/// request first.
#[derive(Default)]
pub struct HandlerChainBuilder {
    handlers: Vec<(String, Box<dyn SchemeHandler>)>,
    interceptors: Vec<Box<dyn Interceptor>>,
}

impl HandlerChainBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, scheme: &str, handler: impl SchemeHandler + 'static) -> Self {
        self.handlers
            .push((scheme.to_ascii_lowercase(), Box::new(handler)));
        self
    }

    pub fn with_interceptor(mut self, interceptor: impl Interceptor + 'static) -> Self {
        self.interceptors.push(Box::new(interceptor));
        self
    }

    pub(crate) fn build(
        self,
        builtins: HashMap<String, Box<dyn SchemeHandler>>,
    ) -> SchemeDispatchTable {
        let mut entries = HashMap::new();
        for (scheme, handler) in self.handlers {
            entries.insert(
                scheme,
                HandlerEntry {
                    handler,
                    origin: EntryOrigin::Registered,
                },
            );
        }
        let mut interceptors = self.interceptors;
        interceptors.reverse();
        debug!(
            "dispatch table assembled: {} construction handlers, {} built-ins, {} interceptors",
            entries.len(),
            builtins.len(),
            interceptors.len()
        );
        SchemeDispatchTable {
            entries,
            shelf: HashMap::new(),
            builtins,
            interceptors,
        }
    }
}
