use serde::Deserialize;

/// A utility-scale site as listed by the sites search endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Site {
    pub resource_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// Body of `GET /utility_scale_sites/search`. Resource-id files passed to the
/// report command use the same shape.
#[derive(Debug, Clone, Deserialize)]
pub struct SitesResponse {
    pub sites: Vec<Site>,
}
