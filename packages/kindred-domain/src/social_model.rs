use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};

use crate::facet::Field;

/// Facet values grouped by field. Used both for a figure's `tags` and for the social model
/// extracted from a user's description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialModel {
	#[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
	pub race: Option<Vec<String>>,
	#[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
	pub ethnicity: Option<Vec<String>>,
	#[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
	pub cultural_background: Option<Vec<String>>,
	#[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
	pub location: Option<Vec<String>>,
	#[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
	pub gender: Option<Vec<String>>,
	#[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
	pub sexuality: Option<Vec<String>>,
	#[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
	pub interests: Option<Vec<String>>,
	#[serde(default, deserialize_with = "one_or_many", skip_serializing_if = "Option::is_none")]
	pub aspirations: Option<Vec<String>>,
}
impl SocialModel {
	pub fn values(&self, field: Field) -> &[String] {
		let slot = match field {
			Field::Race => &self.race,
			Field::Ethnicity => &self.ethnicity,
			Field::CulturalBackground => &self.cultural_background,
			Field::Location => &self.location,
			Field::Gender => &self.gender,
			Field::Sexuality => &self.sexuality,
			Field::Interests => &self.interests,
			Field::Aspirations => &self.aspirations,
		};

		slot.as_deref().unwrap_or(&[])
	}

	pub fn set(&mut self, field: Field, values: Vec<String>) {
		let values = if values.is_empty() { None } else { Some(values) };

		match field {
			Field::Race => self.race = values,
			Field::Ethnicity => self.ethnicity = values,
			Field::CulturalBackground => self.cultural_background = values,
			Field::Location => self.location = values,
			Field::Gender => self.gender = values,
			Field::Sexuality => self.sexuality = values,
			Field::Interests => self.interests = values,
			Field::Aspirations => self.aspirations = values,
		}
	}

	/// Non-empty fields in canonical order.
	pub fn iter(&self) -> impl Iterator<Item = (Field, &[String])> + '_ {
		Field::ALL
			.into_iter()
			.map(|field| (field, self.values(field)))
			.filter(|(_, values)| !values.is_empty())
	}

	/// Every (field, value) pair, deduplicated case-insensitively by value. The first occurrence
	/// in canonical field order wins and keeps its original case.
	pub fn facet_pairs(&self) -> Vec<(Field, String)> {
		dedup_values(self.iter().flat_map(|(field, values)| values.iter().map(move |v| (field, v))))
	}

	/// Flat facet list for this model.
	pub fn facets(&self) -> Vec<String> {
		self.facet_pairs().into_iter().map(|(_, value)| value).collect()
	}

	/// Demographic values, plus interests and aspirations when `include_goals` is set.
	pub fn as_list(&self, include_goals: bool) -> Vec<String> {
		dedup_values(
			self.iter()
				.filter(|(field, _)| include_goals || !field.is_goal())
				.flat_map(|(field, values)| values.iter().map(move |v| (field, v))),
		)
		.into_iter()
		.map(|(_, value)| value)
		.collect()
	}

	pub fn goals(&self) -> Vec<String> {
		dedup_values(
			self.iter()
				.filter(|(field, _)| field.is_goal())
				.flat_map(|(field, values)| values.iter().map(move |v| (field, v))),
		)
		.into_iter()
		.map(|(_, value)| value)
		.collect()
	}

	pub fn is_empty(&self) -> bool {
		self.facet_pairs().is_empty()
	}
}

fn dedup_values<'a>(pairs: impl Iterator<Item = (Field, &'a String)>) -> Vec<(Field, String)> {
	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for (field, value) in pairs {
		let value = value.trim();

		if value.is_empty() {
			continue;
		}
		if seen.insert(value.to_lowercase()) {
			out.push((field, value.to_string()));
		}
	}

	out
}

// Older records store single-valued fields as a bare string.
fn one_or_many<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
	D: Deserializer<'de>,
{
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum OneOrMany {
		One(String),
		Many(Vec<String>),
	}

	Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
		None => None,
		Some(OneOrMany::One(value)) => Some(vec![value]),
		Some(OneOrMany::Many(values)) => Some(values),
	})
}
