use bananadb_base::BananaResult;
use bananadb_base::pal::http::{HttpRequest, HttpResponse, HttpStatusCode};
use serde::Serialize;
use serde_json::{Map, Value};

/// Body of a lookup miss on an existing collection.
pub const NOT_FOUND_MESSAGE: &str = "Not found";

/// Body of a request that matches no route at all.
pub const ROUTE_NOT_FOUND_MESSAGE: &str = "Route not found. Check your collection names and IDs.";

/// Error payload returned for every failed request: `{"error": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody<'a> {
    pub error: &'a str,
}

/// Serialize `data` as the JSON body of a response with the given status.
pub fn json_response<T: Serialize + ?Sized>(
    status: HttpStatusCode,
    data: &T,
) -> BananaResult<HttpResponse> {
    let body = serde_json::to_string(data)?;
    Ok(HttpResponse::json(status, body))
}

/// A `{"error": message}` response.
pub fn error_response(status: HttpStatusCode, message: &str) -> HttpResponse {
    // Serializing a struct holding one &str cannot fail.
    let body = serde_json::to_string(&ErrorBody { error: message })
        .unwrap_or_else(|_| String::from("{}"));
    HttpResponse::json(status, body)
}

pub fn not_found() -> HttpResponse {
    error_response(HttpStatusCode::NotFound, NOT_FOUND_MESSAGE)
}

pub fn route_not_found() -> HttpResponse {
    error_response(HttpStatusCode::NotFound, ROUTE_NOT_FOUND_MESSAGE)
}

/// Why a request body was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BodyError {
    InvalidJson(String),
    NotAnObject,
}

impl BodyError {
    pub fn into_response(self) -> HttpResponse {
        let message = match self {
            BodyError::InvalidJson(reason) => format!("Invalid JSON body: {reason}"),
            BodyError::NotAnObject => "Request body must be a JSON object".to_string(),
        };
        error_response(HttpStatusCode::BadRequest, &message)
    }
}

fn is_json_content_type(request: &HttpRequest) -> bool {
    request
        .headers()
        .get("Content-Type")
        .is_some_and(|value| value.to_ascii_lowercase().contains("json"))
}

/// Decode the request body as a JSON object.
///
/// Bodies without a JSON content type, and empty JSON bodies, decode to an empty object.
pub fn decode_object_body(request: &HttpRequest) -> Result<Map<String, Value>, BodyError> {
    let body = request.body().as_bytes();
    if !is_json_content_type(request) || body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(BodyError::NotAnObject),
        Err(e) => Err(BodyError::InvalidJson(e.to_string())),
    }
}
