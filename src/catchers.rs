//! Generic JSON error bodies for routes that don't return their own
//! `(Status, Json<Value>)` tuple. No 401/403/429 catchers — this service has
//! no authentication or rate-limiting to speak of.

use rocket::catch;
use rocket::serde::json::Json;
use rocket::Request;

#[catch(400)]
pub fn bad_request(_req: &Request) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "error": "Bad request",
        "code": "BAD_REQUEST"
    }))
}

#[catch(404)]
pub fn not_found(_req: &Request) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "error": "Not found",
        "code": "NOT_FOUND"
    }))
}

#[catch(422)]
pub fn unprocessable_entity(_req: &Request) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "error": "Unprocessable entity. Check that your JSON body is valid and matches the expected schema.",
        "code": "UNPROCESSABLE_ENTITY"
    }))
}

#[catch(500)]
pub fn internal_error(_req: &Request) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "error": "Internal server error",
        "code": "INTERNAL_ERROR"
    }))
}

#[catch(503)]
pub fn service_unavailable(_req: &Request) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "error": "Container runtime unavailable",
        "code": "CONTAINER_RUNTIME_ERROR"
    }))
}
