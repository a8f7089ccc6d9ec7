//! Fetch strategy selection.
//!
//! Rules are evaluated in order and the first match wins. Each rule and the
//! caching decision are pure functions of the request (and response), so
//! every branch can be tested without a cache or a network.

use http::Method;
use swkit_net::{is_cross_origin, Request, Response};
use url::Url;

/// How a request is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Not intercepted; the request goes to the network untouched.
    Passthrough,
    /// Network first, cached app shell on network failure.
    NetworkFirst,
    /// Cache first, network with opportunistic caching on a miss.
    CacheFirst,
}

/// A named strategy rule.
#[derive(Clone, Copy)]
pub struct StrategyRule {
    pub name: &'static str,
    pub matches: fn(&Request) -> bool,
    pub strategy: Strategy,
}

impl std::fmt::Debug for StrategyRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRule")
            .field("name", &self.name)
            .field("strategy", &self.strategy)
            .finish()
    }
}

fn is_not_get(request: &Request) -> bool {
    request.method != Method::GET
}

fn is_navigation(request: &Request) -> bool {
    request.is_navigation()
}

fn any_request(_: &Request) -> bool {
    true
}

/// Rules in priority order.
pub static RULES: [StrategyRule; 3] = [
    StrategyRule {
        name: "non-get-passthrough",
        matches: is_not_get,
        strategy: Strategy::Passthrough,
    },
    StrategyRule {
        name: "navigation-network-first",
        matches: is_navigation,
        strategy: Strategy::NetworkFirst,
    },
    StrategyRule {
        name: "cache-first",
        matches: any_request,
        strategy: Strategy::CacheFirst,
    },
];

/// Pick the first rule matching `request`.
pub fn select(request: &Request) -> &'static StrategyRule {
    RULES
        .iter()
        .find(|rule| (rule.matches)(request))
        .unwrap_or(&RULES[0])
}

/// Why a network response was not written to the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Network-error response.
    ErrorResponse,
    /// Inspectable response with a status other than 200.
    Status(u16),
    /// Same-origin 200; the manifest already covers these.
    SameOrigin,
}

/// What to do with a response fetched after a cache miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheDecision {
    Store,
    Skip(SkipReason),
}

/// Decide whether a cache-miss response is stored.
///
/// Opaque responses report status 0 and are exempt from the status check.
pub fn cache_decision(request: &Request, response: &Response, app_origin: &Url) -> CacheDecision {
    if response.is_error() {
        return CacheDecision::Skip(SkipReason::ErrorResponse);
    }
    if !response.is_opaque() && response.status != 200 {
        return CacheDecision::Skip(SkipReason::Status(response.status));
    }
    if response.is_opaque() || is_cross_origin(&request.url, app_origin) {
        return CacheDecision::Store;
    }
    CacheDecision::Skip(SkipReason::SameOrigin)
}
