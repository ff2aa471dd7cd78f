/* 📖 # Why a single API service?

The PAL registers exactly one HttpService per server. ApiService is that service: it
answers CORS preflights, looks up the current route table for every request and turns
handler errors into JSON 500 responses. Because it only holds a LiveRoutes pointer it
never needs to be re-registered when the table is rebuilt.
*/

use bananadb_base::BananaResult;
use bananadb_base::pal::http::{HttpMethod, HttpRequest, HttpResponse, HttpService, HttpStatusCode};
use tracing::{debug, error, instrument};

use crate::api::json::error_response;
use crate::routes::LiveRoutes;

pub const ALLOW_ORIGIN: &str = "Access-Control-Allow-Origin";
pub const ALLOW_METHODS: &str = "Access-Control-Allow-Methods";
pub const ALLOW_HEADERS: &str = "Access-Control-Allow-Headers";
pub const REQUEST_HEADERS: &str = "Access-Control-Request-Headers";

/// Methods announced in preflight responses.
pub const ALLOWED_METHODS: &str = "GET,HEAD,PUT,PATCH,POST,DELETE";

/// HTTP entry point dispatching against the live route table.
#[derive(Debug, Clone)]
pub struct ApiService {
    routes: LiveRoutes,
    enable_cors: bool,
}

impl ApiService {
    pub fn new(routes: LiveRoutes, enable_cors: bool) -> Self {
        Self {
            routes,
            enable_cors,
        }
    }

    fn preflight(request: &HttpRequest) -> HttpResponse {
        let mut response = HttpResponse::no_content().with_header(ALLOW_METHODS, ALLOWED_METHODS);
        if let Some(requested) = request.headers().get(REQUEST_HEADERS) {
            response = response
                .with_header(ALLOW_HEADERS, requested.as_str())
                .with_header("Vary", REQUEST_HEADERS);
        }
        response
    }
}

impl HttpService for ApiService {
    #[instrument(skip_all, fields(method = %request.method(), url = request.url()))]
    fn handle_request(&self, request: HttpRequest) -> BananaResult<HttpResponse> {
        let response = if self.enable_cors && request.method() == HttpMethod::Options {
            Self::preflight(&request)
        } else {
            let table = self.routes.current();
            match table.dispatch(&request) {
                Ok(response) => response,
                Err(e) => {
                    error!("Request failed: {e}");
                    debug!("{e:?}");
                    error_response(HttpStatusCode::InternalServerError, &e.to_string())
                }
            }
        };
        debug!(status = response.status().as_u16(), "request handled");

        if self.enable_cors {
            return Ok(response.with_header(ALLOW_ORIGIN, "*"));
        }
        Ok(response)
    }
}
