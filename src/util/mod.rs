//! Outbound URL checks shared by the feed fetcher and the reachability
//! filter.

mod url_validator;

pub use url_validator::{UrlPolicy, UrlValidationError};
