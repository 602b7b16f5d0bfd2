//! Query-string parameter sets for the public endpoints.
//!
//! Everything arrives as optional text and is validated by hand so a missing
//! or malformed field maps to its own 400 marker instead of a generic
//! rejection.

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct GetParams {
    pub distribution: Option<String>,
    pub field: Option<String>,
    pub rate: Option<String>,
    pub jsonp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct IncrParams {
    pub distribution: Option<String>,
    pub field: Option<String>,
    pub n: Option<String>,
    pub jsonp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DistParams {
    pub distribution: Option<String>,
    pub n: Option<String>,
    pub rate: Option<String>,
    pub prune: Option<String>,
    pub jsonp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusParams {
    pub jsonp: Option<String>,
}
