pub mod citation;
pub mod config;
pub mod error;
pub mod fuzzy;
pub mod normalize;
pub mod observability;
pub mod snippet;
pub mod stream;
