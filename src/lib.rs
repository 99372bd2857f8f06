//! Compile list-style reference pages into flat, title-keyed records.
//!
//! A run has two phases. Extraction normalizes each page, splits its lists
//! into groups and feeds articles and aliases into a [`corpus::Corpus`].
//! Once every page is in, the corpus is sealed, aliases are resolved into
//! redirects or disambiguations, and [`emit`] turns everything into rows.

pub mod corpus;
pub mod db;
pub mod emit;
pub mod error;
pub mod parser;
pub mod pipeline;
pub mod resolve;
pub mod settings;
pub mod sources;
