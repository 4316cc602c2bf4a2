//! Per-request input of a handler action

use crate::core::auth::AuthContext;

/// Everything an action needs from the incoming request besides the payload
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Who is asking
    pub principal: AuthContext,

    /// Decoded query string pairs, in request order
    pub query: Vec<(String, String)>,

    /// Request path without query string, used for pagination links
    pub path: String,
}

impl RequestContext {
    pub fn new(principal: AuthContext) -> Self {
        Self {
            principal,
            query: Vec::new(),
            path: String::new(),
        }
    }

    /// Anonymous request, mostly useful in tests
    pub fn anonymous() -> Self {
        Self::new(AuthContext::Anonymous)
    }

    pub fn with_query<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.query = pairs
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::anonymous()
    }
}
