//! HTTP routes of one resource
//!
//! - GET    /{endpoint}       list
//! - POST   /{endpoint}       create
//! - GET    /{endpoint}/{id}  get
//! - PUT    /{endpoint}/{id}  update
//! - PATCH  /{endpoint}/{id}  update
//! - DELETE /{endpoint}/{id}  delete

use super::principal::PrincipalResolver;
use crate::core::entity::EntityId;
use crate::core::error::ResourceError;
use crate::core::query::QueryError;
use crate::core::validation::FieldErrors;
use crate::handler::{ActionResponse, RequestContext, ResourceHandler};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, Uri};
use axum::routing::get;
use axum::Router;
use serde_json::Value;
use std::sync::Arc;

/// Shared state of a resource's routes
#[derive(Clone)]
pub struct ResourceState {
    pub handler: Arc<ResourceHandler>,
    pub principals: Arc<dyn PrincipalResolver>,
}

type QueryPairs = Query<Vec<(String, String)>>;

/// Build the CRUD routes of `handler`
pub fn resource_routes(
    handler: Arc<ResourceHandler>,
    principals: Arc<dyn PrincipalResolver>,
) -> Router {
    let collection = format!("/{}", handler.endpoint());
    let member = format!("/{}/{{id}}", handler.endpoint());

    Router::new()
        .route(&collection, get(list).post(create))
        .route(
            &member,
            get(show).put(update).patch(update).delete(destroy),
        )
        .with_state(ResourceState {
            handler,
            principals,
        })
}

impl ResourceState {
    async fn context(
        &self,
        headers: &HeaderMap,
        uri: &Uri,
        query: Vec<(String, String)>,
    ) -> Result<RequestContext, ActionResponse> {
        let principal = self
            .principals
            .resolve(headers)
            .await
            .map_err(|e| self.handler.reject(ResourceError::Store(e)))?;

        Ok(RequestContext::new(principal)
            .with_query(query)
            .with_path(uri.path()))
    }

    fn id(&self, raw: &str) -> Result<EntityId, ActionResponse> {
        raw.parse::<EntityId>().map_err(|_| {
            self.handler
                .reject(ResourceError::InvalidQuery(QueryError::InvalidParameter {
                    parameter: "id".to_string(),
                    value: raw.to_string(),
                }))
        })
    }

    /// An empty body is an empty payload; anything else must be JSON
    fn payload(&self, body: &Bytes) -> Result<Value, ActionResponse> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        serde_json::from_slice(body).map_err(|_| {
            let mut errors = FieldErrors::new();
            errors.add("payload", "The payload must be valid JSON.");
            self.handler.reject(ResourceError::ValidationFailed(errors))
        })
    }
}

async fn list(
    State(state): State<ResourceState>,
    headers: HeaderMap,
    uri: Uri,
    Query(query): QueryPairs,
) -> ActionResponse {
    match state.context(&headers, &uri, query).await {
        Ok(ctx) => state.handler.list(&ctx).await,
        Err(rejection) => rejection,
    }
}

async fn create(
    State(state): State<ResourceState>,
    headers: HeaderMap,
    uri: Uri,
    Query(query): QueryPairs,
    body: Bytes,
) -> ActionResponse {
    let ctx = match state.context(&headers, &uri, query).await {
        Ok(ctx) => ctx,
        Err(rejection) => return rejection,
    };
    match state.payload(&body) {
        Ok(payload) => state.handler.create(&ctx, payload).await,
        Err(rejection) => rejection,
    }
}

async fn show(
    State(state): State<ResourceState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    uri: Uri,
    Query(query): QueryPairs,
) -> ActionResponse {
    let ctx = match state.context(&headers, &uri, query).await {
        Ok(ctx) => ctx,
        Err(rejection) => return rejection,
    };
    match state.id(&id) {
        Ok(id) => state.handler.get(&ctx, id).await,
        Err(rejection) => rejection,
    }
}

async fn update(
    State(state): State<ResourceState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    uri: Uri,
    Query(query): QueryPairs,
    body: Bytes,
) -> ActionResponse {
    let ctx = match state.context(&headers, &uri, query).await {
        Ok(ctx) => ctx,
        Err(rejection) => return rejection,
    };
    let id = match state.id(&id) {
        Ok(id) => id,
        Err(rejection) => return rejection,
    };
    match state.payload(&body) {
        Ok(payload) => state.handler.update(&ctx, id, payload).await,
        Err(rejection) => rejection,
    }
}

async fn destroy(
    State(state): State<ResourceState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    uri: Uri,
    Query(query): QueryPairs,
) -> ActionResponse {
    let ctx = match state.context(&headers, &uri, query).await {
        Ok(ctx) => ctx,
        Err(rejection) => return rejection,
    };
    match state.id(&id) {
        Ok(id) => state.handler.delete(&ctx, id).await,
        Err(rejection) => rejection,
    }
}
