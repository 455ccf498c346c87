use stage_runtime::{
    AssetCatalog, AssetKind, AssetRecord, AudioBackend, AudioCategory, AudioEngine, AudioSettings,
    ContextSource, FsFetcher, LoaderEvent, MemoryFetcher, PlayOptions, ReportedUrl,
    ResourceLoader, SimulatedContext, Subscription,
};
use std::io::Cursor;
use std::path::PathBuf;

const PNG: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
const FACES: [&str; 6] = [
    "/env/px.jpg",
    "/env/nx.jpg",
    "/env/py.jpg",
    "/env/ny.jpg",
    "/env/pz.jpg",
    "/env/nz.jpg",
];

fn wav_bytes(seconds: f32, sample_rate: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for _ in 0..(seconds * sample_rate as f32) as usize {
            writer.write_sample(0i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn font_json() -> Vec<u8> {
    br#"{"familyName": "Helvetiker", "glyphs": {"a": {}, "b": {}}}"#.to_vec()
}

fn model_json() -> Vec<u8> {
    br#"{"asset": {"version": "2.0"}, "meshes": []}"#.to_vec()
}

fn scene_catalog() -> AssetCatalog {
    AssetCatalog::new(vec![
        AssetRecord::new("grassColor", AssetKind::Texture, "/textures/grass.png"),
        AssetRecord::with_paths("environment", AssetKind::CubeMap, FACES),
        AssetRecord::new("typeface", AssetKind::Font, "/fonts/helvetiker.json"),
        AssetRecord::new("fox", AssetKind::GltfModel, "/models/fox.gltf"),
    ])
    .unwrap()
}

fn scene_files() -> MemoryFetcher {
    let mut fetcher = MemoryFetcher::new()
        .with_file("/textures/grass.png", PNG)
        .with_file("/fonts/helvetiker.json", font_json())
        .with_file("/models/fox.gltf", model_json());
    for face in FACES {
        fetcher.insert(face, PNG);
    }
    fetcher
}

/// Poll until complete, returning every event in order
fn run_to_completion(
    loader: &mut ResourceLoader,
    events: &Subscription<LoaderEvent>,
) -> Vec<LoaderEvent> {
    let mut seen = Vec::new();
    for _ in 0..64 {
        loader.poll();
        seen.extend(events.drain());
        if loader.is_complete() {
            break;
        }
    }
    seen
}

fn assert_well_formed(events: &[LoaderEvent], total: usize) {
    let mut last_loaded = 0;
    let mut progress = 0;
    for event in events {
        if let LoaderEvent::Progress(event) = event {
            assert!(event.loaded > last_loaded, "loaded must strictly increase");
            assert_eq!(event.total, total);
            last_loaded = event.loaded;
            progress += 1;
        }
    }
    assert_eq!(progress, total);

    let completes: Vec<_> = events
        .iter()
        .filter(|event| matches!(event, LoaderEvent::Complete(_)))
        .collect();
    assert_eq!(completes.len(), 1);
    match events.last() {
        Some(LoaderEvent::Complete(complete)) => {
            assert_eq!(complete.loaded, total);
            assert_eq!(complete.percent, 100.0);
        }
        other => panic!("expected completion last, got {other:?}"),
    }
}

#[test]
fn test_every_completion_order_converges_once() {
    let orders: [fn(MemoryFetcher) -> MemoryFetcher; 4] = [
        |fetcher| fetcher,
        |fetcher| fetcher.reversed(),
        |fetcher| fetcher.per_poll(1),
        |fetcher| fetcher.reversed().per_poll(3),
    ];

    for order in orders {
        let mut loader = ResourceLoader::new(scene_catalog(), order(scene_files()));
        let events = loader.subscribe();
        let seen = run_to_completion(&mut loader, &events);

        assert_well_formed(&seen, 9);
        assert_eq!(loader.items().len(), 4);
        assert_eq!(loader.items().cube_map("environment").unwrap().faces.len(), 6);
        assert_eq!(
            loader.items().font("typeface").unwrap().family.as_deref(),
            Some("Helvetiker")
        );

        // Nothing fires after completion
        loader.poll();
        assert!(events.drain().is_empty());
    }
}

#[test]
fn test_progress_names_owning_record() {
    let mut loader = ResourceLoader::new(scene_catalog(), scene_files().per_poll(1));
    let events = loader.subscribe();
    loader.poll();

    match events.try_next() {
        Some(LoaderEvent::Progress(event)) => {
            assert_eq!(event.id, "grassColor");
            assert_eq!(event.label(), "grassColor - grass.png");
            assert!((event.percent - 100.0 / 9.0).abs() < 1e-9);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[test]
fn test_failures_still_complete() {
    let fetcher = scene_files().fail("/models/fox.gltf", "connection reset");
    let mut loader = ResourceLoader::new(scene_catalog(), fetcher);
    let events = loader.subscribe();
    let seen = run_to_completion(&mut loader, &events);

    assert_well_formed(&seen, 9);
    let errors: Vec<_> = seen
        .iter()
        .filter_map(|event| match event {
            LoaderEvent::Error(error) => Some(error),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].id, "fox");
    assert!(errors[0].reason.contains("connection reset"));
    assert!(!loader.items().contains("fox"));
    assert!(loader.items().texture("grassColor").is_some());
}

#[test]
fn test_one_missing_face_drops_the_cube_map() {
    let mut fetcher = MemoryFetcher::new();
    for face in &FACES[..5] {
        fetcher.insert(*face, PNG);
    }
    let catalog =
        AssetCatalog::new(vec![AssetRecord::with_paths("environment", AssetKind::CubeMap, FACES)])
            .unwrap();
    let mut loader = ResourceLoader::new(catalog, fetcher);
    let events = loader.subscribe();
    let seen = run_to_completion(&mut loader, &events);

    assert_well_formed(&seen, 6);
    assert!(loader.items().cube_map("environment").is_none());
}

#[test]
fn test_shared_url_counts_once() {
    let catalog = AssetCatalog::new(vec![
        AssetRecord::new("floorColor", AssetKind::Texture, "/textures/stone.png"),
        AssetRecord::new("wallColor", AssetKind::Texture, "/textures/stone.png"),
    ])
    .unwrap();
    let fetcher = MemoryFetcher::new().with_file("/textures/stone.png", PNG);
    let mut loader = ResourceLoader::new(catalog, fetcher);
    let events = loader.subscribe();
    let seen = run_to_completion(&mut loader, &events);

    assert_well_formed(&seen, 1);
    assert!(loader.items().contains("floorColor"));
    assert!(loader.items().contains("wallColor"));
}

#[test]
fn test_list_reports_resolve_by_first_url() {
    let fetcher =
        scene_files().report_with(|url| ReportedUrl::List(vec![url.to_string(), "/ignored".into()]));
    let mut loader = ResourceLoader::new(scene_catalog(), fetcher);
    let events = loader.subscribe();
    let seen = run_to_completion(&mut loader, &events);

    assert_well_formed(&seen, 9);
    assert!(seen.iter().all(|event| match event {
        LoaderEvent::Progress(event) => loader.catalog().get(&event.id).is_some(),
        _ => true,
    }));
}

#[test]
fn test_audio_decodes_through_shared_context() {
    let context = SimulatedContext::new();
    let catalog = AssetCatalog::from_json(
        r#"[
            {"id": "bgmBrattEveretAlmond", "type": "audio", "path": "/audio/almond.wav"},
            {"id": "click", "type": "audio", "path": "/audio/click.wav"}
        ]"#,
    )
    .unwrap();
    let fetcher = MemoryFetcher::new()
        .with_file("/audio/almond.wav", wav_bytes(2.0, 8_000))
        .with_file("/audio/click.wav", b"not a wav".to_vec());

    let mut loader = ResourceLoader::builder(catalog, fetcher)
        .audio_context(Box::new(context.clone()))
        .start();
    let events = loader.subscribe();
    let seen = run_to_completion(&mut loader, &events);
    assert_well_formed(&seen, 2);
    assert!(seen
        .iter()
        .any(|event| matches!(event, LoaderEvent::Error(error) if error.id == "click")));

    let clip = loader.items().audio("bgmBrattEveretAlmond").unwrap();
    assert!((clip.duration() - 2.0).abs() < 1e-6);

    let resources = loader.into_resources();
    let context_handle = resources.audio_context.unwrap();
    assert_eq!(context_handle.current_time(), 0.0);

    let mut engine = AudioEngine::new(
        resources.items.audio_clips(),
        ContextSource::Shared(context_handle),
        AudioSettings::default(),
    );
    let handle = engine.start_default_bgm().unwrap();
    assert!(context.is_playing(handle.source));
    assert!(engine
        .play("click", AudioCategory::Sfx, PlayOptions::default())
        .is_none());
}

fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "stage_runtime_loader_{name}_{}",
        std::process::id()
    ));
    std::fs::create_dir_all(dir.join("textures")).unwrap();
    std::fs::create_dir_all(dir.join("fonts")).unwrap();
    dir
}

#[test]
fn test_fs_fetcher_with_manifest_on_disk() {
    let root = scratch_dir("fs");
    std::fs::write(root.join("textures/grass.png"), PNG).unwrap();
    std::fs::write(root.join("fonts/helvetiker.json"), font_json()).unwrap();
    std::fs::write(
        root.join("sources.json"),
        r#"[
            {"id": "grassColor", "type": "texture", "path": "/textures/grass.png"},
            {"id": "typeface", "type": "font", "path": "fonts/helvetiker.json"},
            {"id": "ghost", "type": "texture", "path": "/textures/missing.png"}
        ]"#,
    )
    .unwrap();

    let catalog = AssetCatalog::from_file(root.join("sources.json")).unwrap();
    let mut loader = ResourceLoader::new(catalog, FsFetcher::new(&root));
    let events = loader.subscribe();
    let seen = run_to_completion(&mut loader, &events);

    assert_well_formed(&seen, 3);
    assert!(loader.items().texture("grassColor").is_some());
    assert!(loader.items().font("typeface").is_some());
    assert!(!loader.items().contains("ghost"));

    std::fs::remove_dir_all(&root).ok();
}

#[cfg(feature = "parallel")]
#[test]
fn test_threaded_fetcher_completes() {
    use stage_runtime::ThreadedFetcher;
    use std::time::{Duration, Instant};

    let root = scratch_dir("threaded");
    for index in 0..16 {
        std::fs::write(root.join(format!("textures/{index}.png")), PNG).unwrap();
    }
    let records = (0..16)
        .map(|index| {
            AssetRecord::new(
                format!("texture{index}"),
                AssetKind::Texture,
                format!("/textures/{index}.png").as_str(),
            )
        })
        .collect();
    let catalog = AssetCatalog::new(records).unwrap();

    let mut loader = ResourceLoader::new(catalog, ThreadedFetcher::new(&root));
    let events = loader.subscribe();
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut seen = Vec::new();
    while !loader.is_complete() && Instant::now() < deadline {
        loader.poll();
        seen.extend(events.drain());
        std::thread::sleep(Duration::from_millis(1));
    }

    assert_well_formed(&seen, 16);
    assert_eq!(loader.items().len(), 16);
    std::fs::remove_dir_all(&root).ok();
}
