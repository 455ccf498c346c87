use crate::assets::{LoadedItems, LoadedResources};
use crate::audio::{AudioEngine, ContextSource};
use crate::channel::Subscription;
use crate::config::{AudioSettings, ClockSettings, RuntimeOptions, SceneVariant};
use crate::lifecycle::{LifecycleCoordinator, LifecycleEvent, PageSignal};
use crate::scene::{DisposeScope, FrameUpdate, RenderBackend};
use crate::time::{FrameClock, FrameTick, TimeSource};
use crate::viewport::{Viewport, ViewportEvent};
#[cfg(feature = "profiling")]
use tracing::info_span;
use tracing::info;

/// Startup parameters for an [`Experience`]
#[derive(Clone, Debug, PartialEq)]
pub struct ExperienceConfig {
    pub options: RuntimeOptions,
    pub audio: AudioSettings,
    pub clock: ClockSettings,
    pub width: u32,
    pub height: u32,
    pub device_pixel_ratio: f32,
}

impl Default for ExperienceConfig {
    fn default() -> Self {
        Self {
            options: RuntimeOptions::default(),
            audio: AudioSettings::default(),
            clock: ClockSettings::default(),
            width: 1280,
            height: 720,
            device_pixel_ratio: 1.0,
        }
    }
}

/// Application root, built once loading completes.
///
/// Owns every runtime component and is passed explicitly to whatever needs them.
pub struct Experience {
    options: RuntimeOptions,
    pub viewport: Viewport,
    pub clock: FrameClock,
    pub lifecycle: LifecycleCoordinator,
    pub audio: AudioEngine,
    pub scene: DisposeScope,
    items: LoadedItems,
    renderer: Box<dyn RenderBackend>,
    updaters: Vec<Box<dyn FrameUpdate>>,
    lifecycle_events: Subscription<LifecycleEvent>,
    viewport_events: Subscription<ViewportEvent>,
    destroyed: bool,
}

impl Experience {
    /// Wire up the runtime around loaded resources. The audio engine reuses the loader's context.
    pub fn bootstrap(
        resources: LoadedResources,
        renderer: Box<dyn RenderBackend>,
        config: ExperienceConfig,
    ) -> Self {
        let LoadedResources {
            items,
            audio_context,
        } = resources;
        let source = match audio_context {
            Some(context) => ContextSource::Shared(context),
            None => ContextSource::Unavailable,
        };
        let audio = AudioEngine::new(items.audio_clips(), source, config.audio.clone());

        let mut viewport = Viewport::new(config.width, config.height, config.device_pixel_ratio);
        let mut lifecycle = LifecycleCoordinator::new();
        let viewport_events = viewport.subscribe();
        let lifecycle_events = lifecycle.subscribe();

        let mut experience = Self {
            options: config.options,
            viewport,
            clock: FrameClock::new(&config.clock),
            lifecycle,
            audio,
            scene: DisposeScope::new(),
            items,
            renderer,
            updaters: Vec::new(),
            lifecycle_events,
            viewport_events,
            destroyed: false,
        };
        experience.build_scene();
        experience
    }

    fn build_scene(&mut self) {
        let root = match self.options.scene {
            SceneVariant::World => "world",
            SceneVariant::DevEnvironment => "devEnvironment",
        };
        self.renderer.add(root);
        self.renderer
            .resize(self.viewport.size(), self.viewport.pixel_ratio());
        self.renderer.update_camera_aspect(self.viewport.aspect());
        info!(
            scene = root,
            debug = self.options.debug,
            items = self.items.len(),
            "experience ready"
        );
    }

    /// Swap the frame clock's time source, keeping its settings
    pub fn with_time_source(mut self, source: Box<dyn TimeSource>) -> Self {
        self.clock = FrameClock::with_source(source, self.clock.max_delta());
        self
    }

    pub fn add_updater(&mut self, updater: impl FrameUpdate + 'static) {
        self.updaters.push(Box::new(updater));
    }

    /// Forward a page signal and apply the resulting pause or resume immediately.
    /// A user gesture unlocks a suspended audio context instead.
    pub fn handle_page_signal(&mut self, signal: PageSignal) -> Option<LifecycleEvent> {
        if signal == PageSignal::UserGesture {
            if self.lifecycle.is_listening(signal.kind()) {
                self.audio.notify_user_gesture();
            }
            return None;
        }
        let event = self.lifecycle.handle(signal);
        self.apply_lifecycle();
        event
    }

    pub fn resize(&mut self, width: u32, height: u32, device_pixel_ratio: f32) {
        self.viewport.resize(width, height, device_pixel_ratio);
        self.apply_resizes();
    }

    fn apply_lifecycle(&mut self) {
        for event in self.lifecycle_events.drain() {
            match event {
                LifecycleEvent::Pause => self.clock.pause(),
                LifecycleEvent::Resume => self.clock.resume(),
            }
            self.audio.on_lifecycle(event);
        }
    }

    fn apply_resizes(&mut self) {
        for event in self.viewport_events.drain() {
            self.renderer.resize(event.size, event.pixel_ratio);
            self.renderer.update_camera_aspect(event.aspect());
        }
    }

    /// Run one frame: camera and world updates, audio housekeeping, render
    pub fn frame(&mut self) -> FrameTick {
        #[cfg(feature = "profiling")]
        let span = info_span!("experience.frame", frame = self.clock.frame_count() + 1);
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        self.apply_lifecycle();
        self.apply_resizes();

        let tick = self.clock.tick();
        if !self.destroyed {
            if !tick.paused {
                for updater in &mut self.updaters {
                    updater.update(&tick);
                }
            }
            self.audio.update();
            self.renderer.render();
        }
        tick
    }

    /// Tear down: listeners, scene resources, audio, renderer
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.destroyed = true;
        self.lifecycle.destroy();
        self.updaters.clear();
        self.scene.clear();
        self.audio.destroy();
        self.renderer.dispose();
        info!(
            disposed = self.scene.disposed_count(),
            "experience destroyed"
        );
    }

    pub fn options(&self) -> &RuntimeOptions {
        &self.options
    }

    pub fn items(&self) -> &LoadedItems {
        &self.items
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::ManualTimeSource;
    use glam::UVec2;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Calls {
        log: Vec<String>,
    }

    struct RecordingRenderer(Rc<RefCell<Calls>>);

    impl RenderBackend for RecordingRenderer {
        fn add(&mut self, object: &str) {
            self.0.borrow_mut().log.push(format!("add:{object}"));
        }

        fn update_camera_aspect(&mut self, aspect: f32) {
            self.0.borrow_mut().log.push(format!("aspect:{aspect:.2}"));
        }

        fn resize(&mut self, size: UVec2, _pixel_ratio: f32) {
            self.0.borrow_mut().log.push(format!("resize:{}x{}", size.x, size.y));
        }

        fn render(&mut self) {
            self.0.borrow_mut().log.push("render".to_string());
        }

        fn dispose(&mut self) {
            self.0.borrow_mut().log.push("dispose".to_string());
        }
    }

    fn boot(options: RuntimeOptions) -> (Experience, Rc<RefCell<Calls>>) {
        let calls = Rc::new(RefCell::new(Calls::default()));
        let resources = LoadedResources {
            items: LoadedItems::new(),
            audio_context: None,
        };
        let config = ExperienceConfig {
            options,
            width: 200,
            height: 100,
            ..ExperienceConfig::default()
        };
        let experience =
            Experience::bootstrap(resources, Box::new(RecordingRenderer(calls.clone())), config);
        (experience, calls)
    }

    #[test]
    fn test_bootstrap_builds_selected_scene() {
        let (_experience, calls) = boot(RuntimeOptions::from_query("scene=dev"));
        let calls = calls.borrow();
        let log = &calls.log;
        assert_eq!(log[0], "add:devEnvironment");
        assert_eq!(log[2], "aspect:2.00");
    }

    #[test]
    fn test_resize_reaches_renderer() {
        let (mut experience, calls) = boot(RuntimeOptions::default());
        experience.resize(300, 100, 1.0);
        assert!(calls.borrow().log.ends_with(&[
            "resize:300x100".to_string(),
            "aspect:3.00".to_string()
        ]));
    }

    #[test]
    fn test_destroy_is_ordered_and_once() {
        let (experience, calls) = boot(RuntimeOptions::default());
        let mut experience = experience.with_time_source(Box::new(ManualTimeSource::new()));
        experience.frame();
        experience.destroy();
        experience.destroy();

        let calls = calls.borrow();
        let log = &calls.log;
        assert_eq!(log.iter().filter(|entry| *entry == "dispose").count(), 1);
        assert_eq!(log.last().map(String::as_str), Some("dispose"));
        assert!(experience.is_destroyed());
    }
}
