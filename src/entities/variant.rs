//! Variants - named frame sets addressed by a URL template
//!
//! A template carries a `000` placeholder that is replaced by the
//! zero-padded frame number, e.g. `cherry/frame_000.webp` -> `cherry/frame_042.webp`.

use log::debug;
use serde::{Deserialize, Serialize};

/// Placeholder substituted with the zero-padded frame number
pub const FRAME_PLACEHOLDER: &str = "000";

/// Variant validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VariantError {
    ZeroFrames(String),
    MissingPlaceholder(String),
}

impl std::fmt::Display for VariantError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariantError::ZeroFrames(id) => write!(f, "Variant '{}' has no frames", id),
            VariantError::MissingPlaceholder(t) => {
                write!(f, "URL template '{}' has no '{}' placeholder", t, FRAME_PLACEHOLDER)
            }
        }
    }
}

impl std::error::Error for VariantError {}

/// Raw serialized form, validated into `Variant`
#[derive(Debug, Clone, Serialize, Deserialize)]
struct VariantDef {
    id: String,
    #[serde(default)]
    name: String,
    url_template: String,
    frame_count: usize,
}

/// One asset set: immutable once constructed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "VariantDef", into = "VariantDef")]
pub struct Variant {
    id: String,
    name: String,
    url_template: String,
    frame_count: usize,
}

impl TryFrom<VariantDef> for Variant {
    type Error = VariantError;

    fn try_from(def: VariantDef) -> Result<Self, Self::Error> {
        Variant::new(def.id, def.name, def.url_template, def.frame_count)
    }
}

impl From<Variant> for VariantDef {
    fn from(v: Variant) -> Self {
        Self {
            id: v.id,
            name: v.name,
            url_template: v.url_template,
            frame_count: v.frame_count,
        }
    }
}

impl Variant {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        url_template: impl Into<String>,
        frame_count: usize,
    ) -> Result<Self, VariantError> {
        let id = id.into();
        let url_template = url_template.into();

        if frame_count == 0 {
            return Err(VariantError::ZeroFrames(id));
        }
        if !url_template.contains(FRAME_PLACEHOLDER) {
            return Err(VariantError::MissingPlaceholder(url_template));
        }

        let mut name = name.into();
        if name.is_empty() {
            name = id.clone();
        }

        debug!("Variant '{}': {} frames, template {}", id, frame_count, url_template);
        Ok(Self {
            id,
            name,
            url_template,
            frame_count,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url_template(&self) -> &str {
        &self.url_template
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// URL of frame `index`. Only the first placeholder is replaced.
    pub fn frame_url(&self, index: usize) -> String {
        let padded = format!("{:03}", index);
        self.url_template.replacen(FRAME_PLACEHOLDER, &padded, 1)
    }
}

/// Ordered list of variants with wrap-around navigation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariantCatalog {
    variants: Vec<Variant>,
}

impl VariantCatalog {
    pub fn new(variants: Vec<Variant>) -> Self {
        Self { variants }
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Variant> {
        self.variants.get(index)
    }

    pub fn find(&self, id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.variants.iter().position(|v| v.id == id)
    }

    /// Index after `index`, wrapping to 0
    pub fn next_index(&self, index: usize) -> usize {
        if self.variants.is_empty() {
            return 0;
        }
        (index + 1) % self.variants.len()
    }

    /// Index before `index`, wrapping to the last entry
    pub fn prev_index(&self, index: usize) -> usize {
        let len = self.variants.len();
        if len == 0 {
            return 0;
        }
        (index % len + len - 1) % len
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variant> {
        self.variants.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_url_padding() {
        let v = Variant::new("cherry", "Cherry", "cherry/frame_000_delay-0.04s.webp", 200).unwrap();
        assert_eq!(v.frame_url(0), "cherry/frame_000_delay-0.04s.webp");
        assert_eq!(v.frame_url(7), "cherry/frame_007_delay-0.04s.webp");
        assert_eq!(v.frame_url(199), "cherry/frame_199_delay-0.04s.webp");
    }

    #[test]
    fn test_only_first_placeholder_replaced() {
        let v = Variant::new("a", "", "s000/f_000.png", 5).unwrap();
        assert_eq!(v.frame_url(3), "s003/f_000.png");
        assert_eq!(v.name(), "a");
    }

    #[test]
    fn test_validation() {
        assert_eq!(
            Variant::new("x", "", "f_000.png", 0),
            Err(VariantError::ZeroFrames("x".into()))
        );
        assert!(matches!(
            Variant::new("x", "", "frame.png", 10),
            Err(VariantError::MissingPlaceholder(_))
        ));
    }

    #[test]
    fn test_deserialize_validates() {
        let json = r#"{"id":"lemon","url_template":"l/000.webp","frame_count":3}"#;
        let ok: Variant = serde_json::from_str(json).unwrap();
        assert_eq!(ok.frame_count(), 3);

        let json = r#"{"id":"x","url_template":"l/000.webp","frame_count":0}"#;
        let bad = serde_json::from_str::<Variant>(json);
        assert!(bad.is_err());
    }

    #[test]
    fn test_catalog_wraps() {
        let catalog = VariantCatalog::new(vec![
            Variant::new("a", "", "a/000.png", 1).unwrap(),
            Variant::new("b", "", "b/000.png", 1).unwrap(),
            Variant::new("c", "", "c/000.png", 1).unwrap(),
        ]);
        assert_eq!(catalog.next_index(2), 0);
        assert_eq!(catalog.prev_index(0), 2);
        assert_eq!(catalog.position("b"), Some(1));
        assert!(catalog.find("z").is_none());
    }
}
