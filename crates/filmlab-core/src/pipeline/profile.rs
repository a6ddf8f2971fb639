//! LUT profiles — which LUTs exist and which of them enable halation/grain.

use serde::{Deserialize, Serialize};

use crate::transform::params::DEFAULT_LUT;

/// A selectable LUT and its capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LutProfile {
    /// LUT resource name, resolved through the LUT library.
    pub name: String,
    /// Whether halation and grain are offered with this LUT.
    #[serde(default)]
    pub supports_effects: bool,
}

impl LutProfile {
    pub fn new(name: impl Into<String>, supports_effects: bool) -> Self {
        Self {
            name: name.into(),
            supports_effects,
        }
    }
}

/// The set of LUT profiles offered to the user, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProfileCatalog {
    profiles: Vec<LutProfile>,
}

impl Default for ProfileCatalog {
    fn default() -> Self {
        Self {
            profiles: vec![
                LutProfile::new(DEFAULT_LUT, false),
                LutProfile::new("Polaroid 600", true),
            ],
        }
    }
}

impl ProfileCatalog {
    pub fn new(profiles: Vec<LutProfile>) -> Self {
        Self { profiles }
    }

    /// Parse a JSON array of profiles.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn profiles(&self) -> &[LutProfile] {
        &self.profiles
    }

    /// Profile names in display order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.profiles.iter().map(|p| p.name.as_str())
    }

    pub fn get(&self, name: &str) -> Option<&LutProfile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// Whether `name` enables the secondary effects. Unknown names do not.
    pub fn supports_effects(&self, name: &str) -> bool {
        self.get(name).is_some_and(|p| p.supports_effects)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_catalog_gates_effects_by_profile() {
        let catalog = ProfileCatalog::default();
        assert!(catalog.supports_effects("Polaroid 600"));
        assert!(!catalog.supports_effects(DEFAULT_LUT));
        assert!(!catalog.supports_effects("unknown"));
        assert_eq!(catalog.names().collect::<Vec<_>>(), [DEFAULT_LUT, "Polaroid 600"]);
    }

    #[test]
    fn test_from_json_defaults_missing_flag() {
        let catalog = ProfileCatalog::from_json(
            r#"[{"name": "Kodak Gold"}, {"name": "Cinestill", "supports_effects": true}]"#,
        )
        .unwrap();
        assert!(!catalog.supports_effects("Kodak Gold"));
        assert!(catalog.supports_effects("Cinestill"));
    }

    #[test]
    fn test_json_roundtrip() {
        let catalog = ProfileCatalog::default();
        let back = ProfileCatalog::from_json(&catalog.to_json().unwrap()).unwrap();
        assert_eq!(back, catalog);
    }
}
