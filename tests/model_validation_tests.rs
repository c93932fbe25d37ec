use axum::{http::StatusCode, response::IntoResponse};
use restro_api::{
    ApiError,
    models::{CreateRestaurantRequest, RegisterRequest, Role, RoleTag, UserSummary},
};
use std::str::FromStr;
use uuid::Uuid;

// --- Roles ---

#[test]
fn test_role_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"admin\"");
    assert_eq!(serde_json::to_string(&Role::SubAdmin).unwrap(), "\"subadmin\"");
    assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"user\"");
    assert_eq!(
        serde_json::from_str::<Role>("\"subadmin\"").unwrap(),
        Role::SubAdmin
    );
}

#[test]
fn test_role_parse_is_case_insensitive() {
    assert_eq!(Role::parse("ADMIN"), Some(Role::Admin));
    assert_eq!(Role::parse("SubAdmin"), Some(Role::SubAdmin));
    assert_eq!(Role::parse(" user "), Some(Role::User));
    assert_eq!(Role::parse("sub-admin"), None);
    assert_eq!(Role::parse(""), None);
}

#[test]
fn test_role_from_str_reports_unknown_tag() {
    let err = Role::from_str("owner").unwrap_err();
    assert_eq!(err.0, "owner");
    assert_eq!(Role::from_str("user").unwrap().to_string(), "user");
}

#[test]
fn test_unknown_role_is_a_std_error() {
    let err: Box<dyn std::error::Error> = Box::new(Role::from_str("owner").unwrap_err());
    assert_eq!(err.to_string(), "unknown role \"owner\"");
    assert!(err.source().is_none());
}

#[test]
fn test_role_tag_keeps_unrecognized_text() {
    assert_eq!(RoleTag::from_claim("Admin"), RoleTag::Known(Role::Admin));
    assert_eq!(RoleTag::from_claim("Admin").as_str(), "admin");

    let unknown = RoleTag::from_claim("Chef");
    assert_eq!(unknown.role(), None);
    assert_eq!(unknown.as_str(), "Chef");
}

// --- Errors ---

#[test]
fn test_api_error_status_mapping() {
    let cases = [
        (ApiError::invalid_input("x"), StatusCode::BAD_REQUEST),
        (ApiError::unauthorized("x"), StatusCode::UNAUTHORIZED),
        (ApiError::forbidden("x"), StatusCode::FORBIDDEN),
        (ApiError::not_found("x"), StatusCode::NOT_FOUND),
        (ApiError::conflict("x"), StatusCode::CONFLICT),
        (ApiError::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
    ];
    for (err, status) in cases {
        assert_eq!(err.status(), status);
        assert_eq!(err.into_response().status(), status);
    }
}

#[test]
fn test_api_error_display_is_the_client_message() {
    assert_eq!(
        ApiError::forbidden("forbidden: insufficient role").to_string(),
        "forbidden: insufficient role"
    );
}

// --- Payloads ---

#[test]
fn test_register_request_rejects_missing_fields() {
    let missing_password = serde_json::json!({ "name": "A", "email": "a@example.com" });
    assert!(serde_json::from_value::<RegisterRequest>(missing_password).is_err());
}

#[test]
fn test_restaurant_description_defaults_to_empty() {
    let req: CreateRestaurantRequest = serde_json::from_value(serde_json::json!({
        "name": "Dosa Corner",
        "latitude": 1.5,
        "longitude": 2.5
    }))
    .unwrap();
    assert_eq!(req.description, "");
}

#[test]
fn test_user_summary_exposes_no_credentials() {
    let summary = UserSummary {
        id: Uuid::nil(),
        name: "A".to_string(),
        email: "a@example.com".to_string(),
    };
    let value = serde_json::to_value(&summary).unwrap();
    let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
    assert_eq!(keys.len(), 3);
    assert!(value.get("password_hash").is_none());
}
