//! Ambient request context and its injected accessors.
//!
//! Resolution never fails: a provider returns an empty context when no
//! request is active, so background workers and scripts emit records with
//! the context columns simply unset.

use std::cell::RefCell;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Ambient fields describing the request being handled, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestContext {
    /// Route pattern of the request.
    pub route: Option<String>,
    /// HTTP method of the request.
    pub http_method: Option<String>,
    /// Correlation id (e.g. from an X-Request-ID header).
    pub request_id: Option<String>,
    /// Session identifier.
    pub session_id: Option<String>,
}

impl RequestContext {
    /// Context with no fields set.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Set the route.
    #[must_use]
    pub fn with_route(mut self, route: impl Into<String>) -> Self {
        self.route = Some(route.into());
        self
    }

    /// Set the HTTP method.
    #[must_use]
    pub fn with_http_method(mut self, http_method: impl Into<String>) -> Self {
        self.http_method = Some(http_method.into());
        self
    }

    /// Set the request id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Set the session id.
    #[must_use]
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// True when no field is set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.route.is_none()
            && self.http_method.is_none()
            && self.request_id.is_none()
            && self.session_id.is_none()
    }
}

/// Accessor for the current request context.
///
/// Injected into the emitter at construction. Implementations must not fail
/// or block; [`EmptyContext`] is the default for processes with no request
/// scope.
pub trait ContextProvider: Send + Sync {
    /// The context of the current logical request, empty when none is active.
    fn current(&self) -> RequestContext;
}

/// Provider that always reports no active request.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyContext;

impl ContextProvider for EmptyContext {
    fn current(&self) -> RequestContext {
        RequestContext::empty()
    }
}

/// Provider returning one fixed context, for tests and single-request tools.
#[derive(Debug, Clone)]
pub struct FixedContext(pub RequestContext);

impl ContextProvider for FixedContext {
    fn current(&self) -> RequestContext {
        self.0.clone()
    }
}

thread_local! {
    static CURRENT: RefCell<Option<RequestContext>> = const { RefCell::new(None) };
}

/// Provider backed by a thread-local slot, set for the duration of a scope.
///
/// Each thread sees only its own context. Web integrations enter a scope at
/// the top of request handling and let the guard restore the previous value
/// on exit.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadLocalContext;

impl ThreadLocalContext {
    /// Install `context` as the current one until the returned guard drops.
    ///
    /// Scopes nest: dropping the guard restores whatever was current when
    /// the scope was entered.
    pub fn enter(context: RequestContext) -> ContextScope {
        let previous = CURRENT.with(|slot| slot.borrow_mut().replace(context));
        ContextScope { previous }
    }
}

impl ContextProvider for ThreadLocalContext {
    fn current(&self) -> RequestContext {
        CURRENT.with(|slot| slot.borrow().clone().unwrap_or_default())
    }
}

/// Restores the previous thread-local context on drop.
#[must_use = "dropping the scope immediately clears the context again"]
pub struct ContextScope {
    previous: Option<RequestContext>,
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Generate a fresh 16-character hex request id.
#[must_use]
pub fn new_request_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(16);
    id
}
