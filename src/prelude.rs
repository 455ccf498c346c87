//! Convenient re-exports of commonly used types.
//!
//! The prelude can be imported with:
//! ```
//! use stage_runtime::prelude::*;
//! ```

pub use crate::app::{Experience, ExperienceConfig};
pub use crate::assets::{
    AssetCatalog, AssetKind, Fetcher, LoadProgress, LoadedItems, LoadedResources, LoaderEvent,
    ResourceLoader,
};
pub use crate::audio::{
    AudioBackend, AudioCategory, AudioEngine, ContextSource, PlayOptions, TrackHandle,
    VolumeTarget,
};
pub use crate::config::{AudioSettings, RuntimeConfig, RuntimeOptions, SceneVariant};
pub use crate::error::{Result, RuntimeError};
pub use crate::lifecycle::{LifecycleEvent, PageSignal};
pub use crate::scene::{Disposable, FrameUpdate, RenderBackend};
pub use crate::time::{FrameClock, FrameTick};
