pub mod exact_match;
pub mod facet;
pub mod figure;
pub mod social_model;
pub mod text;

pub use facet::{FacetEmbeddings, Field, describe_facet};
pub use figure::{FigureRecord, figure_key};
pub use social_model::SocialModel;
