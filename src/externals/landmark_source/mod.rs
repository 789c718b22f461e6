//! Hand detector input. The detector runs out of process and writes one JSON
//! frame per line; see [`adapters::JsonLinesLandmarkSource`].

pub mod adapters;
