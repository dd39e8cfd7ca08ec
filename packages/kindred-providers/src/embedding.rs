use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};
use kindred_config::EmbeddingProviderConfig;

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
	model: &'a str,
	input: &'a [String],
	dimensions: u32,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
	data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
	/// Some servers omit it; position in `data` is used instead.
	index: Option<usize>,
	embedding: Vec<f64>,
}

/// Embeds `texts` with one request to an OpenAI-compatible embeddings endpoint.
///
/// The request is bounded by `timeout_ms`. Vectors come back in input order, one per text.
pub async fn embed(cfg: &EmbeddingProviderConfig, texts: &[String]) -> Result<Vec<Vec<f32>>> {
	if texts.is_empty() {
		return Ok(Vec::new());
	}

	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let request = EmbeddingRequest { model: &cfg.model, input: texts, dimensions: cfg.dimensions };
	let body = client
		.post(format!("{}{}", cfg.api_base, cfg.path))
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&request)
		.send()
		.await?
		.error_for_status()?
		.bytes()
		.await?;
	let vectors = decode_vectors(&body)?;

	if vectors.len() != texts.len() {
		return Err(Error::InvalidResponse {
			message: format!(
				"Embedding response has {} vectors for {} inputs.",
				vectors.len(),
				texts.len()
			),
		});
	}

	Ok(vectors)
}

fn decode_vectors(body: &[u8]) -> Result<Vec<Vec<f32>>> {
	let response: EmbeddingResponse = serde_json::from_slice(body)?;
	let mut ordered = response
		.data
		.into_iter()
		.enumerate()
		.map(|(position, item)| (item.index.unwrap_or(position), item.embedding))
		.collect::<Vec<_>>();

	ordered.sort_by_key(|(index, _)| *index);
	ordered
		.into_iter()
		.map(|(index, values)| {
			values
				.into_iter()
				.map(|value| value as f32)
				.map(|value| {
					value.is_finite().then_some(value).ok_or_else(|| Error::InvalidResponse {
						message: format!("Embedding {index} has a value outside the f32 range."),
					})
				})
				.collect::<Result<Vec<_>>>()
		})
		.collect()
}
