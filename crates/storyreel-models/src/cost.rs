//! Monetary cost model.
//!
//! Prices are carried in a [`CostTable`] that is injected wherever costs are
//! computed, so tests can substitute a deterministic table.

use serde::{Deserialize, Serialize};

use crate::Preset;

/// Per-unit prices in USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostTable {
    /// One generated image
    pub image_usd: f64,
    /// Speech synthesis per 1000 narrated characters
    pub speech_per_1k_chars_usd: f64,
    /// One background music track
    pub music_track_usd: f64,
    /// Encoding compute per output second
    pub encode_per_second_usd: f64,
    /// Images (slides) generated by the multi-slide preset
    pub slideshow_images: u32,
}

impl Default for CostTable {
    fn default() -> Self {
        Self {
            image_usd: 0.04,
            speech_per_1k_chars_usd: 0.30,
            music_track_usd: 0.0,
            encode_per_second_usd: 0.0005,
            slideshow_images: 3,
        }
    }
}

impl CostTable {
    /// Defaults overridden by `STORYREEL_COST_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            image_usd: env_or("STORYREEL_COST_IMAGE_USD", defaults.image_usd),
            speech_per_1k_chars_usd: env_or(
                "STORYREEL_COST_SPEECH_PER_1K_USD",
                defaults.speech_per_1k_chars_usd,
            ),
            music_track_usd: env_or("STORYREEL_COST_MUSIC_TRACK_USD", defaults.music_track_usd),
            encode_per_second_usd: env_or(
                "STORYREEL_COST_ENCODE_PER_SECOND_USD",
                defaults.encode_per_second_usd,
            ),
            slideshow_images: env_or("STORYREEL_SLIDESHOW_IMAGES", defaults.slideshow_images)
                .max(1),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// One priced line of a [`CostBreakdown`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostLineItem {
    pub label: String,
    pub quantity: f64,
    pub unit_usd: f64,
    pub total_usd: f64,
}

impl CostLineItem {
    pub fn new(label: impl Into<String>, quantity: f64, unit_usd: f64) -> Self {
        Self {
            label: label.into(),
            quantity,
            unit_usd,
            total_usd: round_cents(quantity * unit_usd),
        }
    }
}

/// Itemised cost of one generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub preset: Preset,
    pub items: Vec<CostLineItem>,
    pub total_usd: f64,
}

impl CostBreakdown {
    pub fn new(preset: Preset, items: Vec<CostLineItem>) -> Self {
        let total_usd = round_cents(items.iter().map(|i| i.quantity * i.unit_usd).sum());
        Self {
            preset,
            items,
            total_usd,
        }
    }

    /// Total for one labelled line, 0 when absent.
    pub fn item_total(&self, label: &str) -> f64 {
        self.items
            .iter()
            .filter(|i| i.label == label)
            .map(|i| i.total_usd)
            .sum()
    }

    /// Human-readable summary, e.g. "single_image: images $0.04 + narration $0.09 = $0.13".
    pub fn to_description(&self) -> String {
        let parts: Vec<String> = self
            .items
            .iter()
            .filter(|i| i.total_usd > 0.0)
            .map(|i| format!("{} ${:.2}", i.label, i.total_usd))
            .collect();

        if parts.is_empty() {
            format!("{}: free", self.preset)
        } else {
            format!("{}: {} = ${:.2}", self.preset, parts.join(" + "), self.total_usd)
        }
    }
}

/// Round to 4 decimal places (sub-cent precision is kept for small items).
fn round_cents(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_breakdown_total() {
        let breakdown = CostBreakdown::new(
            Preset::SingleImage,
            vec![
                CostLineItem::new("images", 1.0, 0.04),
                CostLineItem::new("narration", 0.3, 0.30),
            ],
        );
        assert!((breakdown.total_usd - 0.13).abs() < 1e-9);
        assert!((breakdown.item_total("images") - 0.04).abs() < 1e-9);
        assert_eq!(breakdown.item_total("music"), 0.0);
    }

    #[test]
    fn test_description() {
        let breakdown = CostBreakdown::new(
            Preset::MultiSlide,
            vec![
                CostLineItem::new("images", 3.0, 0.04),
                CostLineItem::new("music", 1.0, 0.0),
            ],
        );
        assert_eq!(breakdown.to_description(), "multi_slide: images $0.12 = $0.12");

        let free = CostBreakdown::new(Preset::SingleImage, vec![]);
        assert_eq!(free.to_description(), "single_image: free");
    }
}
