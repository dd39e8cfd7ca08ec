pub mod embedding;
pub mod error;

pub use error::{Error, Result};

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use serde_json::{Map, Value};

/// Bearer authorization plus the configured extra headers. The bearer value is marked sensitive.
pub fn auth_headers(api_key: &str, default_headers: &Map<String, Value>) -> Result<HeaderMap> {
	let mut bearer = HeaderValue::from_str(&format!("Bearer {api_key}"))?;

	bearer.set_sensitive(true);

	let mut headers = HeaderMap::from_iter([(AUTHORIZATION, bearer)]);

	for (name, value) in default_headers {
		let value = value.as_str().ok_or_else(|| Error::InvalidConfig {
			message: format!("providers.embedding.default_headers.{name} must be a string."),
		})?;

		headers.insert(HeaderName::try_from(name.as_str())?, HeaderValue::from_str(value)?);
	}

	Ok(headers)
}
