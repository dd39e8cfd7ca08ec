use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Raw facet value mapped to its embedding vector.
pub type FacetEmbeddings = HashMap<String, Vec<f32>>;

/// The category a facet value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
	Race,
	Ethnicity,
	CulturalBackground,
	Location,
	Gender,
	Sexuality,
	Interests,
	Aspirations,
}
impl Field {
	/// Canonical iteration order. Facet lists and embeddings are built in this order.
	pub const ALL: [Field; 8] = [
		Field::Race,
		Field::Ethnicity,
		Field::CulturalBackground,
		Field::Location,
		Field::Gender,
		Field::Sexuality,
		Field::Interests,
		Field::Aspirations,
	];

	pub fn as_str(self) -> &'static str {
		match self {
			Self::Race => "race",
			Self::Ethnicity => "ethnicity",
			Self::CulturalBackground => "cultural_background",
			Self::Location => "location",
			Self::Gender => "gender",
			Self::Sexuality => "sexuality",
			Self::Interests => "interests",
			Self::Aspirations => "aspirations",
		}
	}

	pub fn from_name(name: &str) -> Option<Self> {
		Self::ALL.into_iter().find(|field| field.as_str() == name.trim())
	}

	/// Interests and aspirations describe what a person wants rather than who they are.
	pub fn is_goal(self) -> bool {
		matches!(self, Self::Interests | Self::Aspirations)
	}

	/// Formats a value as the sentence that gets embedded for this field.
	pub fn describe(self, value: &str) -> String {
		match self {
			Self::Race => format!("This person's race is {value}."),
			Self::Ethnicity => format!("This person's ethnicity is {value}."),
			Self::CulturalBackground => format!("This person's cultural background is {value}."),
			Self::Location => format!("This person is from {value}."),
			Self::Gender => format!("This person's gender is {value}."),
			Self::Sexuality => format!("This person's sexuality is {value}."),
			Self::Interests => format!("This person is interested in {value}."),
			Self::Aspirations => format!("This person aspires to {value}."),
		}
	}
}

/// Sentence for a facet whose field may be unknown.
pub fn describe_facet(field: Option<Field>, value: &str) -> String {
	match field {
		Some(field) => field.describe(value),
		None => format!("This person is associated with {value}."),
	}
}
