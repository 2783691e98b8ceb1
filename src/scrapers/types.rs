use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Tunables for one extraction pass. The defaults are the thresholds the
/// heuristics were calibrated with.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Images a gallery-looking container needs before it counts as a gallery
    pub gallery_min_images: usize,
    /// Images (children or grandchildren) a plain container needs when no gallery was found
    pub container_min_images: usize,
    /// Smallest accepted width and height, in pixels
    pub min_image_size: u32,
    /// Size the scorer considers ideal on both axes
    pub ideal_image_size: u32,
    /// Upper bound on returned images
    pub max_images: usize,
    /// Per-image measurement timeout
    #[serde(with = "millis")]
    pub image_timeout: Duration,
    /// Bonus for images found inside a gallery
    pub gallery_bonus: f64,
    /// Fixed score for images only referenced from JSON-LD
    pub structured_image_score: f64,
    /// Occurrences a currency needs on the page before it is trusted
    pub currency_min_occurrences: usize,
    /// Shortest text accepted as a formatted address
    pub address_min_len: usize,
    /// Images taken by the raw DOM fallback when scoring found none
    pub dom_image_limit: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            gallery_min_images: 3,
            container_min_images: 5,
            min_image_size: 300,
            ideal_image_size: 800,
            max_images: 20,
            image_timeout: Duration::from_secs(3),
            gallery_bonus: 20.0,
            structured_image_score: 50.0,
            currency_min_occurrences: 3,
            address_min_len: 10,
            dom_image_limit: 6,
        }
    }
}

impl ExtractOptions {
    pub fn image_timeout(mut self, timeout: Duration) -> Self {
        self.image_timeout = timeout;
        self
    }

    pub fn max_images(mut self, max: usize) -> Self {
        self.max_images = max;
        self
    }

    pub fn gallery_thresholds(mut self, gallery_min: usize, container_min: usize) -> Self {
        self.gallery_min_images = gallery_min;
        self.container_min_images = container_min;
        self
    }

    pub fn currency_min_occurrences(mut self, min: usize) -> Self {
        self.currency_min_occurrences = min;
        self
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_options_fill_from_defaults() {
        let options: ExtractOptions =
            serde_json::from_str(r#"{"image_timeout": 250, "max_images": 5}"#).unwrap();
        assert_eq!(options.image_timeout, Duration::from_millis(250));
        assert_eq!(options.max_images, 5);
        assert_eq!(options.gallery_min_images, 3);
        assert_eq!(options.currency_min_occurrences, 3);
    }

    #[test]
    fn test_builder_setters() {
        let options = ExtractOptions::default()
            .gallery_thresholds(2, 4)
            .currency_min_occurrences(1);
        assert_eq!(options.gallery_min_images, 2);
        assert_eq!(options.container_min_images, 4);
        assert_eq!(options.currency_min_occurrences, 1);
    }
}
