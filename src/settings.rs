//! Configuration of the hierarchy index.

use crate::errors::Result;

/// A structure containing configuration data of the hierarchy. It could be
/// built in code or loaded from the editor's settings file.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub hierarchy: HierarchyParams,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyParams {
    /// Scale components with a magnitude below this value are rejected by the
    /// transform setters, so every transform stays invertible.
    pub min_scale: f32,
    /// Number of entities to reserve space for up front.
    pub capacity: usize,
}

impl Default for HierarchyParams {
    fn default() -> Self {
        HierarchyParams {
            min_scale: 1e-5,
            capacity: 0,
        }
    }
}

impl Settings {
    /// Parses settings from JSON. Missing members fall back to their defaults.
    pub fn from_json<T: AsRef<str>>(json: T) -> Result<Self> {
        Ok(serde_json::from_str(json.as_ref())?)
    }
}
