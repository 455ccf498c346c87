//! Scene collaborators.
//!
//! Rendering is external: the runtime only needs the narrow [`RenderBackend`] surface. GPU-side
//! resources the scene creates are adopted by a [`DisposeScope`], which runs each disposer exactly
//! once, either on explicit release or when the scope is cleared or dropped.

use crate::time::FrameTick;
use glam::UVec2;
use slotmap::{new_key_type, SlotMap};
use tracing::{debug, trace};

new_key_type! {
    /// Handle to a resource adopted by a [`DisposeScope`]
    pub struct ResourceKey;
}

/// Something holding GPU or other external memory
pub trait Disposable {
    fn dispose(&mut self);

    fn label(&self) -> &str {
        "resource"
    }
}

/// Disposal scope for scene resources
#[derive(Default)]
pub struct DisposeScope {
    resources: SlotMap<ResourceKey, Box<dyn Disposable>>,
    disposed: usize,
}

impl DisposeScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of a resource; it will be disposed exactly once
    pub fn adopt(&mut self, resource: impl Disposable + 'static) -> ResourceKey {
        self.resources.insert(Box::new(resource))
    }

    /// Dispose one resource now. False if it was already released.
    pub fn release(&mut self, key: ResourceKey) -> bool {
        match self.resources.remove(key) {
            Some(mut resource) => {
                trace!(label = resource.label(), "disposing");
                resource.dispose();
                self.disposed += 1;
                true
            }
            None => false,
        }
    }

    /// Dispose everything still owned
    pub fn clear(&mut self) {
        let count = self.resources.len();
        for (_, mut resource) in self.resources.drain() {
            resource.dispose();
        }
        self.disposed += count;
        if count > 0 {
            debug!(count, "scene resources disposed");
        }
    }

    pub fn contains(&self, key: ResourceKey) -> bool {
        self.resources.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Resources disposed over the scope's lifetime
    pub fn disposed_count(&self) -> usize {
        self.disposed
    }
}

impl Drop for DisposeScope {
    fn drop(&mut self) {
        self.clear();
    }
}

/// Render engine capabilities the runtime drives
pub trait RenderBackend {
    /// Add an object to the scene by name
    fn add(&mut self, object: &str);

    /// Update the camera for a new aspect ratio
    fn update_camera_aspect(&mut self, aspect: f32);

    fn resize(&mut self, size: UVec2, pixel_ratio: f32);

    /// Draw the scene from the camera
    fn render(&mut self);

    fn dispose(&mut self) {}
}

/// Per-frame participant: camera rigs, animated world objects
pub trait FrameUpdate {
    fn update(&mut self, tick: &FrameTick);
}

impl<F: FnMut(&FrameTick)> FrameUpdate for F {
    fn update(&mut self, tick: &FrameTick) {
        self(tick)
    }
}
