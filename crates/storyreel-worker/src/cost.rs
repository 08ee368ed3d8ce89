//! Cost estimation for generation requests.
//!
//! The single-image preset pays for one image and one encode pass. The
//! multi-slide preset pays for one image per slide and encodes twice (slide
//! segments, then the concatenated mux).

use storyreel_models::{CostBreakdown, CostLineItem, CostTable, GenerationRequest, MusicPreference, Preset};

/// Narration speaking rate used to estimate clip length.
pub const NARRATION_CHARS_PER_SECOND: f64 = 15.0;

pub mod labels {
    pub const IMAGES: &str = "images";
    pub const NARRATION: &str = "narration";
    pub const MUSIC: &str = "music";
    pub const ENCODING: &str = "encoding";
}

/// Usage figures a breakdown is priced from.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostUsage {
    pub preset: Preset,
    pub images: u32,
    pub narration_chars: usize,
    pub music_used: bool,
    pub duration_secs: f64,
}

impl CostUsage {
    pub fn price(&self, table: &CostTable) -> CostBreakdown {
        let encode_passes = match self.preset {
            Preset::SingleImage => 1.0,
            Preset::MultiSlide => 2.0,
        };

        let mut items = vec![
            CostLineItem::new(labels::IMAGES, f64::from(self.images), table.image_usd),
            CostLineItem::new(
                labels::NARRATION,
                self.narration_chars as f64 / 1000.0,
                table.speech_per_1k_chars_usd,
            ),
        ];
        if self.music_used {
            items.push(CostLineItem::new(labels::MUSIC, 1.0, table.music_track_usd));
        }
        items.push(CostLineItem::new(
            labels::ENCODING,
            self.duration_secs.max(0.0) * encode_passes,
            table.encode_per_second_usd,
        ));

        CostBreakdown::new(self.preset, items)
    }
}

/// Images a preset generates.
pub fn image_count(preset: Preset, table: &CostTable) -> u32 {
    match preset {
        Preset::SingleImage => 1,
        Preset::MultiSlide => table.slideshow_images.max(1),
    }
}

/// Upper-bound estimate before any generation: assumes a full-length excerpt.
pub fn estimate_cost(
    request: &GenerationRequest,
    table: &CostTable,
    excerpt_max_chars: usize,
) -> CostBreakdown {
    let hook_chars = request.hook_text().map_or(0, |h| h.chars().count() + 1);
    let narration_chars = hook_chars + excerpt_max_chars;

    CostUsage {
        preset: request.preset,
        images: image_count(request.preset, table),
        narration_chars,
        music_used: request.music != MusicPreference::None,
        duration_secs: narration_chars as f64 / NARRATION_CHARS_PER_SECOND,
    }
    .price(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storyreel_models::StoryRef;

    fn request(preset: Preset) -> GenerationRequest {
        let mut request = GenerationRequest::new(StoryRef {
            text_url: "https://stories.example.com/1.txt".to_string(),
            title: "The Offer".to_string(),
            category: "Billionaire".to_string(),
            intensity: "mild".to_string(),
        });
        request.preset = preset;
        request
    }

    #[test]
    fn test_single_image_estimate() {
        let table = CostTable::default();
        let cost = estimate_cost(&request(Preset::SingleImage), &table, 300);

        assert_eq!(cost.preset, Preset::SingleImage);
        assert!((cost.item_total(labels::IMAGES) - 0.04).abs() < 1e-9);
        assert!((cost.item_total(labels::NARRATION) - 0.09).abs() < 1e-9);
        // 300 chars at 15 chars/s is 20s of video
        assert!((cost.item_total(labels::ENCODING) - 0.01).abs() < 1e-9);
        assert!((cost.total_usd - 0.14).abs() < 1e-9);
    }

    #[test]
    fn test_multi_slide_costs_more() {
        let table = CostTable::default();
        let single = estimate_cost(&request(Preset::SingleImage), &table, 300);
        let multi = estimate_cost(&request(Preset::MultiSlide), &table, 300);

        assert!((multi.item_total(labels::IMAGES) - 0.12).abs() < 1e-9);
        assert!(multi.total_usd > single.total_usd);
    }

    #[test]
    fn test_hook_and_music_are_priced() {
        let table = CostTable {
            music_track_usd: 0.5,
            ..Default::default()
        };
        let mut with_hook = request(Preset::SingleImage);
        with_hook.hook = Some("She said yes.".to_string());
        with_hook.music = MusicPreference::None;
        let cost = estimate_cost(&with_hook, &table, 100);

        assert_eq!(cost.item_total(labels::MUSIC), 0.0);
        assert!(cost.items.iter().all(|i| i.label != labels::MUSIC));
        // "She said yes." is 13 chars plus a separator
        let narration = cost.items.iter().find(|i| i.label == labels::NARRATION).unwrap();
        assert!((narration.quantity - 0.114).abs() < 1e-9);

        with_hook.music = MusicPreference::Auto;
        let cost = estimate_cost(&with_hook, &table, 100);
        assert!((cost.item_total(labels::MUSIC) - 0.5).abs() < 1e-9);
    }
}
