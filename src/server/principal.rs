//! Resolution of the requesting principal from HTTP headers

use crate::core::auth::AuthContext;
use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::http::HeaderMap;
use uuid::Uuid;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLES_HEADER: &str = "x-user-roles";
pub const TENANT_ID_HEADER: &str = "x-tenant-id";
pub const SERVICE_NAME_HEADER: &str = "x-service-name";
pub const ADMIN_ID_HEADER: &str = "x-admin-id";

/// Turns request headers into an [`AuthContext`]
#[async_trait]
pub trait PrincipalResolver: Send + Sync {
    async fn resolve(&self, headers: &HeaderMap) -> Result<AuthContext>;
}

/// Every request is anonymous (for development)
#[derive(Debug, Clone, Copy, Default)]
pub struct AnonymousResolver;

#[async_trait]
impl PrincipalResolver for AnonymousResolver {
    async fn resolve(&self, _headers: &HeaderMap) -> Result<AuthContext> {
        Ok(AuthContext::Anonymous)
    }
}

/// Trusts identity headers set by an upstream gateway
///
/// Checked in order: `X-Admin-Id`, `X-Service-Name`, `X-User-Id` (with
/// optional `X-User-Roles` and `X-Tenant-ID`). Without any of them the request
/// is anonymous. A malformed id is an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeaderPrincipalResolver;

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Result<Option<&'a str>> {
    headers
        .get(name)
        .map(|value| {
            value
                .to_str()
                .with_context(|| format!("Header {} is not valid ASCII", name))
        })
        .transpose()
}

fn uuid_header(headers: &HeaderMap, name: &str) -> Result<Option<Uuid>> {
    header(headers, name)?
        .map(|raw| {
            Uuid::parse_str(raw.trim()).with_context(|| format!("Invalid UUID in header {}", name))
        })
        .transpose()
}

#[async_trait]
impl PrincipalResolver for HeaderPrincipalResolver {
    async fn resolve(&self, headers: &HeaderMap) -> Result<AuthContext> {
        if let Some(admin_id) = uuid_header(headers, ADMIN_ID_HEADER)? {
            return Ok(AuthContext::Admin { admin_id });
        }

        let tenant_id = uuid_header(headers, TENANT_ID_HEADER)?;

        if let Some(service_name) = header(headers, SERVICE_NAME_HEADER)? {
            return Ok(AuthContext::Service {
                service_name: service_name.trim().to_string(),
                tenant_id,
            });
        }

        let Some(user_id) = uuid_header(headers, USER_ID_HEADER)? else {
            return Ok(AuthContext::Anonymous);
        };

        let roles = header(headers, USER_ROLES_HEADER)?
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(AuthContext::User {
            user_id,
            tenant_id,
            roles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[tokio::test]
    async fn test_anonymous_resolver() {
        let ctx = AnonymousResolver
            .resolve(&headers(&[(USER_ID_HEADER, &Uuid::new_v4().to_string())]))
            .await
            .unwrap();
        assert!(ctx.is_anonymous());
    }

    #[tokio::test]
    async fn test_user_headers() {
        let user_id = Uuid::new_v4();
        let tenant_id = Uuid::new_v4();
        let ctx = HeaderPrincipalResolver
            .resolve(&headers(&[
                (USER_ID_HEADER, &user_id.to_string()),
                (USER_ROLES_HEADER, "editor, reviewer"),
                (TENANT_ID_HEADER, &tenant_id.to_string()),
            ]))
            .await
            .unwrap();

        assert_eq!(ctx.user_id(), Some(user_id));
        assert_eq!(ctx.tenant_id(), Some(tenant_id));
        assert!(ctx.has_role("reviewer"));
    }

    #[tokio::test]
    async fn test_admin_and_service_headers() {
        let admin = HeaderPrincipalResolver
            .resolve(&headers(&[(ADMIN_ID_HEADER, &Uuid::new_v4().to_string())]))
            .await
            .unwrap();
        assert!(admin.is_admin());

        let service = HeaderPrincipalResolver
            .resolve(&headers(&[(SERVICE_NAME_HEADER, "billing")]))
            .await
            .unwrap();
        assert!(service.is_service());
    }

    #[tokio::test]
    async fn test_missing_and_malformed_headers() {
        let anonymous = HeaderPrincipalResolver.resolve(&HeaderMap::new()).await.unwrap();
        assert!(anonymous.is_anonymous());

        let malformed = HeaderPrincipalResolver
            .resolve(&headers(&[(USER_ID_HEADER, "not-a-uuid")]))
            .await;
        assert!(malformed.is_err());
    }
}
