/* 📖 # Why an API module in bananadb_engine?

The api module is the HTTP face of the engine: ApiService implements the PAL's
HttpService trait, and the json helpers define the response and error body shapes
shared by every route. The service works the same on RealPal and MockPal, so the
whole request path is exercised by plain unit tests.
*/

pub mod json;
mod service;

pub use service::{ALLOWED_METHODS, ApiService};
