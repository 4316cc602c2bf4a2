//! The generic resource handler
//!
//! A [`ResourceHandler`] serves the five CRUD actions of one entity type:
//!
//! | action | ability  | subject  | success |
//! |--------|----------|----------|---------|
//! | list   | viewAny  | type     | 200 `{data, links, meta}` |
//! | create | store    | type     | 201 entity |
//! | get    | view     | instance | 200 entity |
//! | update | update   | instance | 200 entity |
//! | delete | destroy  | instance | 200 empty  |
//!
//! Persistence, authorization, validation and serialization are injected.
//! Each action catches every collaborator failure and answers with the
//! `{"error": true, "message": ...}` envelope, so callers always get an
//! [`ActionResponse`].

pub mod builder;
pub mod context;
pub mod response;

pub use builder::{DEFAULT_MAX_PER_PAGE, ResourceHandlerBuilder};
pub use context::RequestContext;
pub use response::ActionResponse;

use crate::core::ability::{Ability, AbilitySet};
use crate::core::auth::{AuthContext, Authorizer, Subject};
use crate::core::entity::{Entity, EntityId, EntityType};
use crate::core::error::{ErrorPolicy, ResourceError, ResourceResult};
use crate::core::hooks::ResourceHooks;
use crate::core::naming::ResourceName;
use crate::core::query::{
    PageRequest, PaginatedResponse, QueryParameterNames, QueryParams, QuerySpec, Selection,
};
use crate::core::serializer::{Envelope, Serializer};
use crate::core::store::EntityStore;
use crate::core::validation::{RuleAction, ValidationRules, Validator};
use axum::http::StatusCode;
use serde_json::Value;
use std::sync::Arc;

/// CRUD actions for one entity type
///
/// Immutable once built; share it behind an `Arc` across requests.
pub struct ResourceHandler {
    pub(crate) entity_type: EntityType,
    pub(crate) envelope: Envelope,
    pub(crate) serializer: Arc<dyn Serializer>,
    pub(crate) store: Arc<dyn EntityStore>,
    pub(crate) authorizer: Arc<dyn Authorizer>,
    pub(crate) validator: Arc<dyn Validator>,
    pub(crate) hooks: Arc<dyn ResourceHooks>,
    pub(crate) query: QuerySpec,
    pub(crate) rules: ValidationRules,
    pub(crate) abilities: AbilitySet,
    pub(crate) per_page: Option<usize>,
    pub(crate) default_per_page: usize,
    pub(crate) max_per_page: usize,
    pub(crate) parameter_names: QueryParameterNames,
    pub(crate) error_policy: ErrorPolicy,
}

impl ResourceHandler {
    /// Start building a handler named `handler_name`
    ///
    /// The name drives the entity type and serializer guesses, see
    /// [`HandlerConventions`](crate::core::naming::HandlerConventions).
    pub fn builder(handler_name: impl Into<String>) -> ResourceHandlerBuilder {
        ResourceHandlerBuilder::new(handler_name)
    }

    /// Start building a handler named after the Rust type `H`
    pub fn builder_for<H: ?Sized>() -> ResourceHandlerBuilder {
        ResourceHandlerBuilder::new(std::any::type_name::<H>())
    }

    pub fn entity_type(&self) -> &EntityType {
        &self.entity_type
    }

    pub fn resource(&self) -> &ResourceName {
        self.envelope.resource()
    }

    /// Collection path segment, e.g. `projects`
    pub fn endpoint(&self) -> &str {
        &self.envelope.resource().endpoint
    }

    pub fn abilities(&self) -> &AbilitySet {
        &self.abilities
    }

    pub fn error_policy(&self) -> ErrorPolicy {
        self.error_policy
    }

    /// Render an error raised outside of an action (e.g. a malformed id)
    pub fn reject(&self, error: ResourceError) -> ActionResponse {
        ActionResponse::error(&error, self.error_policy)
    }

    // ------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------

    /// Paginated collection of entities
    pub async fn list(&self, ctx: &RequestContext) -> ActionResponse {
        self.finish("list", self.try_list(ctx).await)
    }

    /// Validate and persist a new entity
    pub async fn create(&self, ctx: &RequestContext, payload: Value) -> ActionResponse {
        self.finish("create", self.try_create(ctx, payload).await)
    }

    /// One entity by id
    pub async fn get(&self, ctx: &RequestContext, id: EntityId) -> ActionResponse {
        self.finish("get", self.try_get(ctx, id).await)
    }

    /// Validate and apply a partial update
    pub async fn update(&self, ctx: &RequestContext, id: EntityId, payload: Value) -> ActionResponse {
        self.finish("update", self.try_update(ctx, id, payload).await)
    }

    /// Remove an entity
    pub async fn delete(&self, ctx: &RequestContext, id: EntityId) -> ActionResponse {
        self.finish("delete", self.try_delete(ctx, id).await)
    }

    pub async fn try_list(&self, ctx: &RequestContext) -> ResourceResult<ActionResponse> {
        self.authorize(
            Ability::ViewAny,
            Subject::Type(&self.entity_type),
            &ctx.principal,
        )
        .await?;

        let params = QueryParams::parse(&ctx.query, &self.parameter_names)?;
        let query = self.query.resolve(&params, self.endpoint())?;
        let request = PageRequest::new(params.page(), self.page_size(params.per_page));

        tracing::debug!(
            resource = %self.endpoint(),
            filters = query.filters.len(),
            sorts = query.sorts.len(),
            page = request.page,
            per_page = request.per_page,
            "Resolved list query"
        );

        let page = self.store.query(&self.entity_type, &query, request).await?;
        let page = page.map(|entity| self.render(&entity));

        let path = if ctx.path.is_empty() {
            format!("/{}", self.endpoint())
        } else {
            ctx.path.clone()
        };
        let body = PaginatedResponse::new(page, &path, &params.preserved_pairs());

        Ok(ActionResponse::ok(serde_json::to_value(body).map_err(anyhow::Error::from)?))
    }

    pub async fn try_create(
        &self,
        ctx: &RequestContext,
        payload: Value,
    ) -> ResourceResult<ActionResponse> {
        let rules = self.rules.for_action(RuleAction::Store);
        let validated = self
            .validator
            .validate(&payload, &rules)
            .map_err(ResourceError::ValidationFailed)?;

        self.authorize(Ability::Store, Subject::Type(&self.entity_type), &ctx.principal)
            .await?;

        // no data left to persist, e.g. nothing passed the rules
        let data = self
            .hooks
            .before_create(&ctx.principal, validated.clone())
            .await?
            .filter(|data| !data.is_empty());
        let Some(data) = data else {
            tracing::info!(resource = %self.endpoint(), "Create skipped by hook");
            return Ok(ActionResponse::empty(StatusCode::CREATED));
        };

        let entity = self.store.create(&self.entity_type, data).await?;
        let entity = self
            .hooks
            .after_save(&ctx.principal, entity, &validated)
            .await?;

        tracing::info!(resource = %self.endpoint(), id = entity.id, "Entity created");
        Ok(ActionResponse::created(self.render(&entity)))
    }

    pub async fn try_get(&self, ctx: &RequestContext, id: EntityId) -> ResourceResult<ActionResponse> {
        let params = QueryParams::parse(&ctx.query, &self.parameter_names)?;
        let selection = self.query.resolve_selection(&params, self.endpoint())?;

        let entity = self.find(id, &selection).await?;
        self.authorize(
            Ability::View,
            Subject::Instance(&self.entity_type, &entity),
            &ctx.principal,
        )
        .await?;

        Ok(ActionResponse::ok(self.render(&entity)))
    }

    pub async fn try_update(
        &self,
        ctx: &RequestContext,
        id: EntityId,
        payload: Value,
    ) -> ResourceResult<ActionResponse> {
        let rules = self.rules.for_action(RuleAction::Update);
        let validated = self
            .validator
            .validate(&payload, &rules)
            .map_err(ResourceError::ValidationFailed)?;

        let existing = self.find(id, &Selection::default()).await?;
        self.authorize(
            Ability::Update,
            Subject::Instance(&self.entity_type, &existing),
            &ctx.principal,
        )
        .await?;

        let changes = self
            .hooks
            .before_update(&ctx.principal, &existing, validated.clone())
            .await?
            .filter(|changes| !changes.is_empty());
        let Some(changes) = changes else {
            tracing::info!(resource = %self.endpoint(), id, "Update skipped by hook");
            return Ok(ActionResponse::ok(self.render(&existing)));
        };

        let entity = self
            .store
            .update(&self.entity_type, &existing, changes)
            .await?;
        let entity = self
            .hooks
            .after_save(&ctx.principal, entity, &validated)
            .await?;

        tracing::info!(resource = %self.endpoint(), id, "Entity updated");
        Ok(ActionResponse::ok(self.render(&entity)))
    }

    pub async fn try_delete(&self, ctx: &RequestContext, id: EntityId) -> ResourceResult<ActionResponse> {
        let existing = self.find(id, &Selection::default()).await?;
        self.authorize(
            Ability::Destroy,
            Subject::Instance(&self.entity_type, &existing),
            &ctx.principal,
        )
        .await?;

        self.store.delete(&self.entity_type, &existing).await?;

        tracing::info!(resource = %self.endpoint(), id, "Entity deleted");
        Ok(ActionResponse::empty(StatusCode::OK))
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn render(&self, entity: &Entity) -> Value {
        self.envelope.render(self.serializer.as_ref(), entity)
    }

    /// Request page size, else handler page size, else the configured default
    fn page_size(&self, requested: Option<usize>) -> usize {
        requested
            .filter(|n| *n > 0)
            .or(self.per_page)
            .unwrap_or(self.default_per_page)
            .clamp(1, self.max_per_page)
    }

    async fn find(&self, id: EntityId, selection: &Selection) -> ResourceResult<Entity> {
        self.store
            .find_by_id(&self.entity_type, id, selection)
            .await?
            .ok_or_else(|| ResourceError::not_found(self.entity_type.qualified(), id))
    }

    async fn authorize(
        &self,
        ability: Ability,
        subject: Subject<'_>,
        principal: &AuthContext,
    ) -> ResourceResult<()> {
        if !self.abilities.enforces(ability) {
            return Ok(());
        }

        if self.authorizer.can(ability, subject, principal).await? {
            Ok(())
        } else {
            tracing::warn!(
                ability = %ability,
                subject = %subject.describe(),
                "Authorization denied"
            );
            Err(ResourceError::forbidden(ability, subject.describe()))
        }
    }

    fn finish(&self, action: &str, result: ResourceResult<ActionResponse>) -> ActionResponse {
        match result {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(
                    resource = %self.endpoint(),
                    action,
                    kind = error.kind(),
                    error = %error,
                    "Resource action failed"
                );
                self.reject(error)
            }
        }
    }
}
