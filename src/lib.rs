// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Stage Runtime - runtime core for interactive 3D experiences
//!
//! Catalog-driven asset loading with one aggregate progress signal, a layered audio engine
//! (music, ambience, narration, effects) and a pause-aware frame lifecycle. Rendering is
//! delegated to an external engine behind [`RenderBackend`].

pub mod app;
pub mod assets;
pub mod audio;
pub mod channel;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod prelude;
pub mod profiling;
pub mod scene;
pub mod time;
pub mod viewport;

mod utils;

pub use app::*;
pub use assets::*;
pub use audio::*;
pub use channel::*;
pub use config::*;
pub use error::*;
pub use lifecycle::*;
pub use scene::*;
pub use time::*;
pub use viewport::*;
