use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Caller identity attached to every request before the core sees it.
///
/// Populated by the context middleware; all store queries filter by
/// `organization_id` so a context can never read another tenant's rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestContext {
    pub organization_id: Uuid,
    pub user_id: Uuid,
    pub role: Role,
}

impl RequestContext {
    pub fn new(organization_id: Uuid, user_id: Uuid, role: Role) -> Self {
        Self {
            organization_id,
            user_id,
            role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    WarehouseManager,
    Staff,
    Viewer,
}

impl Role {
    /// Roles allowed to approve or reject transfer requests.
    pub fn can_review_transfers(&self) -> bool {
        matches!(self, Role::Admin | Role::WarehouseManager)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(Role::Admin),
            "WAREHOUSE_MANAGER" => Ok(Role::WarehouseManager),
            "STAFF" => Ok(Role::Staff),
            "VIEWER" => Ok(Role::Viewer),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

// Common pagination types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: i64,
    pub page_size: i64,
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page: page.max(1),
            page_size: page_size.clamp(1, 100),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.page_size
    }

    pub fn limit(&self) -> i64 {
        self.page_size
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 50)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl<T> PageResponse<T> {
    pub fn new(data: Vec<T>, total: i64, page: &PageRequest) -> Self {
        let total_pages = (total + page.page_size - 1) / page.page_size;
        Self {
            data,
            total,
            page: page.page,
            page_size: page.page_size,
            total_pages,
        }
    }
}

// API envelope

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ApiErrorBody>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
    pub field: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            timestamp: Utc::now(),
        }
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiErrorBody {
                code: code.into(),
                message: message.into(),
                field: None,
            }),
            timestamp: Utc::now(),
        }
    }
}

impl From<&crate::Error> for ApiErrorBody {
    fn from(err: &crate::Error) -> Self {
        let field = match err {
            crate::Error::Validation { field, .. } => Some(field.clone()),
            _ => None,
        };
        ApiErrorBody {
            code: err.code().to_string(),
            message: err.to_string(),
            field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_clamps_and_offsets() {
        let page = PageRequest::new(0, 500);
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 100);

        let page = PageRequest::new(3, 20);
        assert_eq!(page.offset(), 40);
        assert_eq!(page.limit(), 20);
    }

    #[test]
    fn roles_gate_transfer_review() {
        assert!(Role::Admin.can_review_transfers());
        assert!(Role::WarehouseManager.can_review_transfers());
        assert!(!Role::Staff.can_review_transfers());
        assert!(!Role::Viewer.can_review_transfers());
    }

    #[test]
    fn role_parses_screaming_snake() {
        assert_eq!("WAREHOUSE_MANAGER".parse::<Role>().unwrap(), Role::WarehouseManager);
        assert!("SUPERVISOR".parse::<Role>().is_err());
    }
}
