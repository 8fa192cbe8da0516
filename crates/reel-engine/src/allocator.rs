//! Scene allocation: distribute resolved photos across template scenes.
//!
//! Photos are consumed by a circular cursor in template scene order. A
//! scene takes `min(max_photos, remaining)` photos; once the supply is
//! exhausted the cursor wraps and photos repeat from the start, so every
//! scene always renders with at least one photo.

use reel_models::{ResolvedPhoto, Scene, Template};

use crate::error::{EngineError, EngineResult};

/// One scene paired with the photos allocated to it.
#[derive(Debug, Clone)]
pub struct SceneAllocation<'a> {
    pub scene: &'a Scene,
    pub photos: Vec<ResolvedPhoto>,
}

/// Allocate photos to every scene of the template, in scene order.
pub fn allocate<'a>(
    template: &'a Template,
    photos: &[ResolvedPhoto],
) -> EngineResult<Vec<SceneAllocation<'a>>> {
    if photos.is_empty() {
        return Err(EngineError::NoPhotosAvailable);
    }

    let mut cursor = 0usize;
    let mut allocations = Vec::with_capacity(template.scenes.len());

    for scene in template.ordered_scenes() {
        let remaining = photos.len().saturating_sub(cursor);
        let count = if remaining == 0 {
            // Supply exhausted: restart from the first photo rather than
            // skipping the scene.
            cursor = 0;
            1
        } else {
            (scene.max_photos as usize).min(remaining)
        };

        let scene_photos: Vec<ResolvedPhoto> = (0..count)
            .map(|i| photos[(cursor + i) % photos.len()].clone())
            .collect();
        cursor += count;

        allocations.push(SceneAllocation {
            scene,
            photos: scene_photos,
        });
    }

    Ok(allocations)
}
