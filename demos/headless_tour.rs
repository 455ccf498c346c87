//! Example: headless run of the whole runtime
//!
//! Loads a small in-memory catalog, boots the experience on a console renderer, then walks
//! through playback, a hidden-tab pause, muting and teardown.
//!
//! Run with `cargo run --example headless_tour --features profiling` to see the trace output.

use glam::UVec2;
use stage_runtime::{
    AssetCatalog, AudioCategory, Experience, ExperienceConfig, LoaderEvent, ManualTimeSource,
    MemoryFetcher, PageSignal, PlayOptions, RenderBackend, ResourceLoader, RuntimeOptions,
    SimulatedContext, VolumeTarget,
};
use std::io::Cursor;
use std::time::Duration;

const CATALOG: &str = r#"[
    {"id": "grassColor", "type": "texture", "path": "/textures/grass/color.png"},
    {"id": "environmentMap", "type": "cubeMap", "path": [
        "/env/px.png", "/env/nx.png", "/env/py.png", "/env/ny.png", "/env/pz.png", "/env/nz.png"
    ]},
    {"id": "foxModel", "type": "gltfModel", "path": "/models/fox.gltf"},
    {"id": "bgmBrattEveretAlmond", "type": "audio", "path": "/audio/almond.wav"},
    {"id": "birds", "type": "audio", "path": "/audio/birds.wav"}
]"#;

const PNG: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

struct ConsoleRenderer {
    frames: u32,
}

impl RenderBackend for ConsoleRenderer {
    fn add(&mut self, object: &str) {
        println!("scene: added {object}");
    }

    fn update_camera_aspect(&mut self, aspect: f32) {
        println!("camera: aspect {aspect:.3}");
    }

    fn resize(&mut self, size: UVec2, pixel_ratio: f32) {
        println!("renderer: {}x{} @{pixel_ratio}", size.x, size.y);
    }

    fn render(&mut self) {
        self.frames += 1;
    }

    fn dispose(&mut self) {
        println!("renderer: disposed after {} frames", self.frames);
    }
}

fn tone(seconds: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("wav header");
    for n in 0..(seconds * 8_000.0) as u32 {
        let sample = ((n as f32 * 0.05).sin() * 8_000.0) as i16;
        writer.write_sample(sample).expect("wav sample");
    }
    writer.finalize().expect("wav finalize");
    cursor.into_inner()
}

fn files() -> MemoryFetcher {
    let mut fetcher = MemoryFetcher::new()
        .with_file("/textures/grass/color.png", PNG)
        .with_file("/models/fox.gltf", br#"{"asset": {"version": "2.0"}}"#.to_vec())
        .with_file("/audio/almond.wav", tone(20.0))
        .with_file("/audio/birds.wav", tone(4.0))
        .per_poll(2);
    for face in ["px", "nx", "py", "ny", "pz", "nz"] {
        fetcher.insert(format!("/env/{face}.png"), PNG);
    }
    fetcher
}

fn main() -> stage_runtime::Result<()> {
    #[cfg(feature = "profiling")]
    let _guard = stage_runtime::profiling::init_tracing(&Default::default())?;

    let context = SimulatedContext::suspended();
    let catalog = AssetCatalog::from_json(CATALOG)?;
    let mut loader = ResourceLoader::builder(catalog, files())
        .audio_context(Box::new(context.clone()))
        .start();
    let events = loader.subscribe();

    while !loader.is_complete() {
        loader.poll();
        for event in events.drain() {
            match event {
                LoaderEvent::Progress(progress) => {
                    println!("loading {:>5.1}%  {}", progress.percent, progress.label())
                }
                LoaderEvent::Error(error) => println!("failed {}: {}", error.id, error.reason),
                LoaderEvent::Complete(done) => println!("loaded {}/{}", done.loaded, done.total),
            }
        }
    }

    let time = ManualTimeSource::new();
    let mut experience = Experience::bootstrap(
        loader.into_resources(),
        Box::new(ConsoleRenderer { frames: 0 }),
        ExperienceConfig {
            options: RuntimeOptions::from_query("?mode=debug&scene=world"),
            device_pixel_ratio: 3.0,
            ..ExperienceConfig::default()
        },
    )
    .with_time_source(Box::new(time.clone()));

    // The platform starts audio suspended; the first click resumes it
    experience.handle_page_signal(PageSignal::UserGesture);
    experience.audio.start_default_bgm();
    experience
        .audio
        .play("birds", AudioCategory::Ambient, PlayOptions::looped().fade_in(0.5));

    let run = |experience: &mut Experience, frames: u32| {
        for _ in 0..frames {
            time.advance(Duration::from_millis(16));
            context.advance(0.016);
            experience.frame();
        }
        println!(
            "t={:.2}s frame={} bgm playing: {}",
            experience.clock.elapsed_seconds(),
            experience.clock.frame_count(),
            experience.audio.is_playing(AudioCategory::Bgm)
        );
    };

    run(&mut experience, 120);

    experience.handle_page_signal(PageSignal::VisibilityChanged { hidden: true });
    run(&mut experience, 60);
    experience.handle_page_signal(PageSignal::VisibilityChanged { hidden: false });
    run(&mut experience, 30);

    experience.resize(1920, 1080, 2.0);
    experience.audio.set_volume(VolumeTarget::Master, 0.4);
    println!("muted: {}", experience.audio.toggle_mute());
    run(&mut experience, 10);
    println!("muted: {}", experience.audio.toggle_mute());
    println!("volumes: {:?}", experience.audio.volume_controls());

    experience.handle_page_signal(PageSignal::BeforeUnload);
    experience.destroy();
    Ok(())
}
