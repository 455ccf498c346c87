use crate::channel::{EventChannel, Subscription};
use glam::{UVec2, Vec2};
use tracing::debug;

/// Device pixel ratios above this only cost fill rate
pub const MAX_PIXEL_RATIO: f32 = 2.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportEvent {
    pub size: UVec2,
    pub pixel_ratio: f32,
}

impl ViewportEvent {
    pub fn aspect(&self) -> f32 {
        aspect_of(self.size)
    }
}

fn aspect_of(size: UVec2) -> f32 {
    if size.y == 0 {
        1.0
    } else {
        size.x as f32 / size.y as f32
    }
}

/// Canvas size in CSS pixels and the render pixel ratio
pub struct Viewport {
    size: UVec2,
    pixel_ratio: f32,
    events: EventChannel<ViewportEvent>,
}

impl Viewport {
    pub fn new(width: u32, height: u32, device_pixel_ratio: f32) -> Self {
        Self {
            size: UVec2::new(width, height),
            pixel_ratio: clamp_ratio(device_pixel_ratio),
            events: EventChannel::new(),
        }
    }

    pub fn subscribe(&mut self) -> Subscription<ViewportEvent> {
        self.events.subscribe()
    }

    /// Record a window resize; emits only when something changed
    pub fn resize(&mut self, width: u32, height: u32, device_pixel_ratio: f32) -> bool {
        let size = UVec2::new(width, height);
        let pixel_ratio = clamp_ratio(device_pixel_ratio);
        if size == self.size && pixel_ratio == self.pixel_ratio {
            return false;
        }

        self.size = size;
        self.pixel_ratio = pixel_ratio;
        debug!(width, height, pixel_ratio, "viewport resized");
        self.events.emit(ViewportEvent { size, pixel_ratio });
        true
    }

    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    pub fn aspect(&self) -> f32 {
        aspect_of(self.size)
    }

    /// Size of the drawing buffer in device pixels
    pub fn drawing_buffer(&self) -> Vec2 {
        self.size.as_vec2() * self.pixel_ratio
    }
}

fn clamp_ratio(ratio: f32) -> f32 {
    if ratio.is_finite() && ratio > 0.0 {
        ratio.min(MAX_PIXEL_RATIO)
    } else {
        1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pixel_ratio_is_capped() {
        let viewport = Viewport::new(800, 600, 3.0);
        assert_eq!(viewport.pixel_ratio(), 2.0);
        assert_eq!(viewport.drawing_buffer(), Vec2::new(1600.0, 1200.0));
        assert_eq!(Viewport::new(1, 1, f32::NAN).pixel_ratio(), 1.0);
    }

    #[test]
    fn test_resize_emits_on_change_only() {
        let mut viewport = Viewport::new(800, 600, 1.0);
        let events = viewport.subscribe();

        assert!(!viewport.resize(800, 600, 1.0));
        assert!(viewport.resize(1920, 1080, 1.0));

        let event = events.try_next().unwrap();
        assert!((event.aspect() - 16.0 / 9.0).abs() < 1e-6);
        assert_eq!(events.pending(), 0);
    }
}
