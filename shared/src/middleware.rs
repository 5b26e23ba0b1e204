// ============================================================================
// MERIDIAN COMMERCE - REQUEST CONTEXT MIDDLEWARE
// ============================================================================
// Module: shared/src/middleware.rs
// Description: Tenant/role context extraction and enforcement
// ============================================================================

use axum::{
    extract::Request,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use tracing::warn;
use uuid::Uuid;

use crate::types::{RequestContext, Role};

/// Populates [`RequestContext`] from the authenticated gateway headers and
/// rejects the request before any handler runs when they are missing.
///
/// The identity provider sits in front of this service and is trusted to set
/// `x-organization-id`, `x-user-id` and `x-role` only after authentication.
pub async fn require_context(
    mut request: Request,
    next: Next,
) -> std::result::Result<Response, StatusCode> {
    let context = match extract_context(request.headers()) {
        Some(context) => context,
        None => {
            warn!("request rejected: missing or malformed identity headers");
            return Err(StatusCode::UNAUTHORIZED);
        }
    };

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

fn extract_context(headers: &HeaderMap) -> Option<RequestContext> {
    let organization_id = header_uuid(headers, "x-organization-id")?;
    let user_id = header_uuid(headers, "x-user-id")?;
    let role: Role = headers
        .get("x-role")
        .and_then(|v| v.to_str().ok())?
        .parse()
        .ok()?;

    Some(RequestContext::new(organization_id, user_id, role))
}

fn header_uuid(headers: &HeaderMap, name: &str) -> Option<Uuid> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| Uuid::parse_str(v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(org: &str, user: &str, role: &str) -> HeaderMap {
        let mut map = HeaderMap::new();
        map.insert("x-organization-id", HeaderValue::from_str(org).unwrap());
        map.insert("x-user-id", HeaderValue::from_str(user).unwrap());
        map.insert("x-role", HeaderValue::from_str(role).unwrap());
        map
    }

    #[test]
    fn extracts_full_context() {
        let org = Uuid::new_v4();
        let user = Uuid::new_v4();
        let map = headers(&org.to_string(), &user.to_string(), "WAREHOUSE_MANAGER");

        let context = extract_context(&map).unwrap();
        assert_eq!(context.organization_id, org);
        assert_eq!(context.user_id, user);
        assert_eq!(context.role, Role::WarehouseManager);
    }

    #[test]
    fn rejects_malformed_ids_and_roles() {
        let user = Uuid::new_v4().to_string();
        assert!(extract_context(&headers("not-a-uuid", &user, "ADMIN")).is_none());

        let org = Uuid::new_v4().to_string();
        assert!(extract_context(&headers(&org, &user, "WIZARD")).is_none());

        let mut partial = HeaderMap::new();
        partial.insert("x-organization-id", HeaderValue::from_str(&org).unwrap());
        assert!(extract_context(&partial).is_none());
    }
}
