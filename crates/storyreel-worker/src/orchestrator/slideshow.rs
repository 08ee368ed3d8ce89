//! Multi-slide composition.
//!
//! The excerpt is split into sentence-balanced slides, each slide gets its own
//! image and silent segment, and the segments are concatenated under one
//! narration track.

use storyreel_media::{concat_list, FadeEdges};
use storyreel_models::GenerationStage;

use super::{EncodeWindow, GenerationContext, GenerationOrchestrator, Rendered, StageError};
use crate::scene::split_slides;

impl GenerationOrchestrator {
    pub(super) async fn render_multi_slide(
        &self,
        ctx: &GenerationContext<'_>,
    ) -> Result<Rendered, StageError> {
        let slides = split_slides(&ctx.excerpt.text, self.costs.slideshow_images as usize);

        ctx.enter(GenerationStage::Image);
        let mut images = Vec::with_capacity(slides.len());
        for (index, slide) in slides.iter().enumerate() {
            let image = self
                .generate_image(ctx, Some(slide.clone()), &format!("slide-{:02}.png", index))
                .await?;
            images.push(image);
        }

        let audio = self.prepare_audio(ctx).await?;
        let durations = slide_durations(&slides, audio.duration_secs);

        ctx.enter(GenerationStage::Encoding);
        let overlay = ctx.request.overlay_text();
        let last = slides.len().saturating_sub(1);
        let mut segments = Vec::with_capacity(slides.len());
        let mut effects: Vec<String> = Vec::new();
        let mut offset = 0.0;

        for (index, (image, &duration)) in images.iter().zip(&durations).enumerate() {
            let edges = FadeEdges {
                fade_in: index == 0,
                fade_out: index == last,
            };
            // Overlay only on the opening slide
            let overlay_text = if index == 0 { overlay.as_str() } else { "" };
            let segment = ctx.scratch.path(&format!("segment-{:02}.mp4", index));

            let invocation = self.graph.build_segment(
                &image.path,
                &segment,
                duration,
                overlay_text,
                &ctx.request.effects,
                edges,
            );
            let window = EncodeWindow {
                offset_secs: offset,
                length_secs: duration,
                total_secs: audio.duration_secs,
            };
            self.encode(&invocation.command, window, ctx.progress).await?;

            for name in invocation.effect_names() {
                if !effects.contains(&name) {
                    effects.push(name);
                }
            }
            offset += duration;
            segments.push(segment);
        }

        let list = ctx.scratch.path("segments.txt");
        tokio::fs::write(&list, concat_list(&segments))
            .await
            .map_err(|e| {
                StageError::new(GenerationStage::Encoding, format!("could not write segment list: {e}"))
            })?;

        let render = ctx.scratch.path("render.mp4");
        let command = self
            .graph
            .build_concat(&list, &audio.path, &render, audio.duration_secs);
        let window = EncodeWindow {
            offset_secs: audio.duration_secs,
            length_secs: 0.0,
            total_secs: audio.duration_secs,
        };
        self.encode(&command, window, ctx.progress).await?;

        Ok(Rendered {
            path: render,
            duration_secs: audio.duration_secs,
            slide_count: images.len() as u32,
            images,
            audio,
            effects,
        })
    }
}

/// Per-slide durations proportional to slide text length. The last slide
/// takes the remainder so the durations sum to `total_secs`.
pub(crate) fn slide_durations(slides: &[String], total_secs: f64) -> Vec<f64> {
    let lengths: Vec<f64> = slides
        .iter()
        .map(|s| s.chars().count().max(1) as f64)
        .collect();
    let sum: f64 = lengths.iter().sum();

    let mut durations = Vec::with_capacity(slides.len());
    let mut used = 0.0;
    for (index, length) in lengths.iter().enumerate() {
        if index + 1 == lengths.len() {
            durations.push((total_secs - used).max(0.0));
        } else {
            let duration = total_secs * length / sum;
            used += duration;
            durations.push(duration);
        }
    }
    durations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slide_durations_are_proportional() {
        let slides = vec!["a".repeat(10), "b".repeat(30)];
        let durations = slide_durations(&slides, 8.0);
        assert!((durations[0] - 2.0).abs() < 1e-9);
        assert!((durations[1] - 6.0).abs() < 1e-9);
    }

    #[test]
    fn test_slide_durations_sum_to_total() {
        let slides: Vec<String> = ["One.", "Two three.", "Four five six."]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let durations = slide_durations(&slides, 13.7);
        let sum: f64 = durations.iter().sum();
        assert!((sum - 13.7).abs() < 1e-9);
        assert_eq!(durations.len(), 3);
    }
}
