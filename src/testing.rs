//! Reusable conformance checks for an exposed resource
//!
//! [`ResourceTestSuite`] drives a built [`Router`] through index, store, show,
//! update and destroy, and checks status codes plus the `_model` envelope.
//! Every check returns an error instead of panicking, so it fits any test
//! harness:
//!
//! ```ignore
//! #[tokio::test]
//! async fn project_resource_conforms() {
//!     let suite = ResourceTestSuite::new(app, "projects");
//!     suite
//!         .run(&json!({"title": "A", "description": "B"}), &json!({"title": "C"}))
//!         .await
//!         .unwrap();
//! }
//! ```

use crate::core::entity::EntityId;
use anyhow::{Context, Result, bail, ensure};
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{HeaderName, HeaderValue, Method, Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

const MAX_BODY: usize = 16 * 1024 * 1024;

/// Drives the CRUD routes of one resource
#[derive(Clone)]
pub struct ResourceTestSuite {
    router: Router,
    endpoint: String,
    prefix: String,
    headers: Vec<(HeaderName, HeaderValue)>,
}

impl ResourceTestSuite {
    pub fn new(router: Router, endpoint: impl Into<String>) -> Self {
        Self {
            router,
            endpoint: endpoint.into(),
            prefix: String::new(),
            headers: Vec::new(),
        }
    }

    /// Path prefix the routes are nested under, e.g. `/api`
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into().trim_end_matches('/').to_string();
        self
    }

    /// Send a header with every request (e.g. an identity header)
    pub fn with_header(mut self, name: &str, value: &str) -> Result<Self> {
        self.headers.push((
            HeaderName::try_from(name).context("invalid header name")?,
            HeaderValue::try_from(value).context("invalid header value")?,
        ));
        Ok(self)
    }

    pub fn collection_path(&self) -> String {
        format!("{}/{}", self.prefix, self.endpoint)
    }

    pub fn member_path(&self, id: EntityId) -> String {
        format!("{}/{}/{}", self.prefix, self.endpoint, id)
    }

    /// Send one request; the body is `null` when the response has none
    pub async fn call(
        &self,
        method: Method,
        uri: &str,
        payload: Option<&Value>,
    ) -> Result<(StatusCode, Value)> {
        let mut request = Request::builder().method(method).uri(uri);
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }

        let request = match payload {
            Some(payload) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(payload)?))?,
            None => request.body(Body::empty())?,
        };

        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), MAX_BODY).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).context("response body is not JSON")?
        };

        Ok((status, body))
    }

    fn check_envelope(&self, body: &Value) -> Result<()> {
        let endpoint = body
            .pointer("/_model/endpoint")
            .and_then(Value::as_str)
            .with_context(|| format!("missing _model.endpoint in {}", body))?;
        ensure!(
            endpoint == self.endpoint,
            "expected _model.endpoint '{}', got '{}'",
            self.endpoint,
            endpoint
        );
        Ok(())
    }

    fn expect_status(action: &str, expected: StatusCode, status: StatusCode, body: &Value) -> Result<()> {
        ensure!(
            status == expected,
            "{} answered {} instead of {}: {}",
            action,
            status,
            expected,
            body
        );
        Ok(())
    }

    /// `GET /{endpoint}` answers 200 with `data`, `links` and `meta`
    pub async fn assert_index(&self) -> Result<Value> {
        let (status, body) = self.call(Method::GET, &self.collection_path(), None).await?;
        Self::expect_status("index", StatusCode::OK, status, &body)?;

        for key in ["data", "links", "meta"] {
            ensure!(body.get(key).is_some(), "index body lacks '{}': {}", key, body);
        }
        let Some(items) = body["data"].as_array() else {
            bail!("index 'data' is not an array: {}", body);
        };
        for item in items {
            self.check_envelope(item)?;
        }
        Ok(body)
    }

    /// `POST /{endpoint}` answers 201 with an `id` and the envelope; returns the id
    pub async fn assert_store(&self, payload: &Value) -> Result<EntityId> {
        let (status, body) = self
            .call(Method::POST, &self.collection_path(), Some(payload))
            .await?;
        Self::expect_status("store", StatusCode::CREATED, status, &body)?;
        self.check_envelope(&body)?;

        body.get("id")
            .and_then(Value::as_u64)
            .with_context(|| format!("store body lacks a numeric id: {}", body))
    }

    /// `GET /{endpoint}/{id}` answers 200 with the envelope
    pub async fn assert_show(&self, id: EntityId) -> Result<Value> {
        let (status, body) = self.call(Method::GET, &self.member_path(id), None).await?;
        Self::expect_status("show", StatusCode::OK, status, &body)?;
        self.check_envelope(&body)?;
        Ok(body)
    }

    /// `PUT /{endpoint}/{id}` answers 200 with the envelope and the new values
    pub async fn assert_update(&self, id: EntityId, payload: &Value) -> Result<Value> {
        let (status, body) = self
            .call(Method::PUT, &self.member_path(id), Some(payload))
            .await?;
        Self::expect_status("update", StatusCode::OK, status, &body)?;
        self.check_envelope(&body)?;

        if let Some(fields) = payload.as_object() {
            for (key, value) in fields {
                ensure!(
                    body.get(key) == Some(value),
                    "update did not apply '{}': {}",
                    key,
                    body
                );
            }
        }
        Ok(body)
    }

    /// `DELETE /{endpoint}/{id}` answers 200, after which the entity is gone
    pub async fn assert_destroy(&self, id: EntityId) -> Result<()> {
        let (status, body) = self.call(Method::DELETE, &self.member_path(id), None).await?;
        Self::expect_status("destroy", StatusCode::OK, status, &body)?;

        let (status, body) = self.call(Method::GET, &self.member_path(id), None).await?;
        ensure!(
            !status.is_success(),
            "entity {} still readable after destroy: {}",
            id,
            body
        );
        Ok(())
    }

    /// Full cycle: store, index, show, update, destroy
    pub async fn run(&self, store_payload: &Value, update_payload: &Value) -> Result<()> {
        let id = self.assert_store(store_payload).await?;
        self.assert_index().await?;
        self.assert_show(id).await?;
        self.assert_update(id, update_payload).await?;
        self.assert_destroy(id).await
    }
}
