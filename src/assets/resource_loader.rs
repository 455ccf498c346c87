//! Catalog-driven resource loading with aggregate progress.
//!
//! Every URL declared by the catalog is requested once when the loader starts. Completions are
//! drained by [`ResourceLoader::poll`], which decodes finished records, stores them in
//! [`LoadedItems`] and emits [`LoaderEvent`]s:
//!
//! - one `Progress` per URL, whether it succeeded or failed
//! - an `Error` before the `Progress` of a URL whose fetch or decode failed
//! - exactly one `Complete`, once every URL is accounted for
//!
//! Events are only emitted from `poll`, so subscribing right after construction never misses
//! anything, and an empty catalog completes on the first poll rather than during construction.

use crate::assets::fetch::{FetchCompletion, Fetcher};
use crate::assets::items::{GltfCompression, LoadedAsset, LoadedItems};
use crate::assets::loader::{AssetDecoder, DefaultDecoder, LoadContext};
use crate::assets::{AssetCatalog, AssetKind};
use crate::audio::AudioBackend;
use crate::channel::{EventChannel, Subscription};
use crate::error::{Result, RuntimeError};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
#[cfg(feature = "profiling")]
use tracing::info_span;
use tracing::{debug, info, trace, warn};

/// Loader configuration
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderSettings {
    /// Document URL; relative catalog paths are also registered in their absolute form against it
    pub base_url: Option<String>,
}

impl LoaderSettings {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: Some(base_url.into()),
        }
    }
}

/// Aggregate counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LoadProgress {
    pub loaded: usize,
    pub total: usize,
}

impl LoadProgress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            100.0
        } else {
            self.loaded as f64 / self.total as f64 * 100.0
        }
    }

    pub fn is_done(&self) -> bool {
        self.loaded >= self.total
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ProgressEvent {
    /// Owning asset id, or the raw URL when it maps to nothing
    pub id: String,
    /// File name of the finished URL
    pub file: String,
    pub loaded: usize,
    pub total: usize,
    pub percent: f64,
}

impl ProgressEvent {
    /// `"<id> - <file>"`, as shown on loading screens
    pub fn label(&self) -> String {
        format!("{} - {}", self.id, self.file)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct ErrorEvent {
    pub id: String,
    pub url: String,
    /// Counter value before the failed URL is counted
    pub loaded: usize,
    pub total: usize,
    pub reason: String,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompleteEvent {
    pub loaded: usize,
    pub total: usize,
    pub percent: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum LoaderEvent {
    Progress(ProgressEvent),
    Error(ErrorEvent),
    Complete(CompleteEvent),
}

/// A declared URL and every (record, part) slot it fills
#[derive(Clone, Debug)]
struct TicketUrl {
    url: String,
    owners: SmallVec<[(usize, usize); 1]>,
}

/// URL → owning record map, built once when loading starts
#[derive(Clone, Debug, Default)]
pub struct LoadTicket {
    urls: Vec<TicketUrl>,
    index: AHashMap<String, usize>,
}

impl LoadTicket {
    pub fn build(catalog: &AssetCatalog, settings: &LoaderSettings) -> Self {
        let mut ticket = LoadTicket::default();

        for (record_index, record) in catalog.records().iter().enumerate() {
            for (part, url) in record.path.urls().into_iter().enumerate() {
                let slot = match ticket.index.get(url) {
                    Some(&slot) => {
                        debug!(url, id = %record.id, "URL shared by several records");
                        slot
                    }
                    None => {
                        ticket.urls.push(TicketUrl {
                            url: url.to_string(),
                            owners: SmallVec::new(),
                        });
                        let slot = ticket.urls.len() - 1;
                        ticket.index.insert(url.to_string(), slot);
                        slot
                    }
                };
                ticket.urls[slot].owners.push((record_index, part));

                if let Some(absolute) = settings
                    .base_url
                    .as_deref()
                    .and_then(|base| absolutize(url, base))
                {
                    ticket.index.entry(absolute).or_insert(slot);
                }
            }
        }

        ticket
    }

    /// Distinct declared URLs
    pub fn total(&self) -> usize {
        self.urls.len()
    }

    /// Slot of a reported URL, relative or absolute
    fn resolve(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// Record that names the URL in progress events (the last declaration wins)
    fn primary_owner(&self, slot: usize) -> Option<usize> {
        self.urls[slot].owners.last().map(|(record, _)| *record)
    }

    /// Id of the record owning `url`, if the URL is known
    pub fn owner_id<'c>(&self, catalog: &'c AssetCatalog, url: &str) -> Option<&'c str> {
        let record = self.primary_owner(self.resolve(url)?)?;
        catalog.records().get(record).map(|record| record.id.as_str())
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.urls.iter().map(|entry| entry.url.as_str())
    }
}

/// Absolute form of `url` against the document URL `base`
fn absolutize(url: &str, base: &str) -> Option<String> {
    if url.contains("://") || url.starts_with("data:") || url.starts_with("blob:") {
        return None;
    }
    let scheme_end = base.find("://")? + 3;
    let origin_end = base[scheme_end..]
        .find('/')
        .map(|slash| scheme_end + slash)
        .unwrap_or(base.len());

    if url.starts_with('/') {
        return Some(format!("{}{url}", &base[..origin_end]));
    }

    let relative = url.trim_start_matches("./");
    let directory = base[origin_end..]
        .split(['?', '#'])
        .next()
        .and_then(|path| path.rfind('/'))
        .map(|slash| &base[..origin_end + slash + 1]);
    Some(match directory {
        Some(directory) => format!("{directory}{relative}"),
        None => format!("{}/{relative}", &base[..origin_end]),
    })
}

fn file_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

#[derive(Debug)]
struct RecordState {
    parts: Vec<Option<Vec<u8>>>,
    failed: bool,
}

/// Per-URL start/settle bookkeeping. A URL settles once, by ending or failing.
#[derive(Debug, Default)]
struct LoadTracker {
    started: Vec<bool>,
    settled: Vec<bool>,
}

impl LoadTracker {
    fn new(total: usize) -> Self {
        Self {
            started: vec![false; total],
            settled: vec![false; total],
        }
    }

    fn item_start(&mut self, slot: usize, url: &str) {
        trace!(url, "item start");
        self.started[slot] = true;
    }

    fn item_end(&mut self, slot: usize) -> bool {
        !std::mem::replace(&mut self.settled[slot], true)
    }

    fn item_error(&mut self, slot: usize, url: &str) -> bool {
        warn!(url, "item failed");
        self.item_end(slot)
    }

    fn is_started(&self, slot: usize) -> bool {
        self.started[slot]
    }
}

/// Everything a finished loader hands to the application
pub struct LoadedResources {
    pub items: LoadedItems,
    /// Context used to decode audio, reusable by the audio engine
    pub audio_context: Option<Box<dyn AudioBackend>>,
}

/// Configures and starts a [`ResourceLoader`]
pub struct ResourceLoaderBuilder {
    catalog: AssetCatalog,
    fetcher: Box<dyn Fetcher>,
    decoder: Box<dyn AssetDecoder>,
    audio_context: Option<Box<dyn AudioBackend>>,
    settings: LoaderSettings,
}

impl ResourceLoaderBuilder {
    pub fn decoder(mut self, decoder: impl AssetDecoder + 'static) -> Self {
        self.decoder = Box::new(decoder);
        self
    }

    /// Context used to decode audio records. Without one, audio records are skipped.
    pub fn audio_context(mut self, context: Box<dyn AudioBackend>) -> Self {
        self.audio_context = Some(context);
        self
    }

    pub fn settings(mut self, settings: LoaderSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Build the ticket and request every URL
    pub fn start(self) -> ResourceLoader {
        let ticket = LoadTicket::build(&self.catalog, &self.settings);
        let records = self
            .catalog
            .records()
            .iter()
            .map(|record| RecordState {
                parts: vec![None; record.path.urls().len()],
                failed: false,
            })
            .collect();

        let mut loader = ResourceLoader {
            progress: LoadProgress {
                loaded: 0,
                total: ticket.total(),
            },
            tracker: LoadTracker::new(ticket.total()),
            catalog: self.catalog,
            ticket,
            fetcher: self.fetcher,
            decoder: self.decoder,
            audio_context: self.audio_context,
            records,
            items: LoadedItems::new(),
            events: EventChannel::new(),
            skipped: Vec::new(),
            complete_fired: false,
        };
        loader.request_all();
        loader
    }
}

/// Loads an [`AssetCatalog`] and reports aggregate progress
pub struct ResourceLoader {
    catalog: AssetCatalog,
    ticket: LoadTicket,
    fetcher: Box<dyn Fetcher>,
    decoder: Box<dyn AssetDecoder>,
    audio_context: Option<Box<dyn AudioBackend>>,
    records: Vec<RecordState>,
    tracker: LoadTracker,
    items: LoadedItems,
    progress: LoadProgress,
    events: EventChannel<LoaderEvent>,
    /// Audio URLs ended without a fetch because no context exists
    skipped: Vec<usize>,
    complete_fired: bool,
}

impl ResourceLoader {
    pub fn builder(catalog: AssetCatalog, fetcher: impl Fetcher + 'static) -> ResourceLoaderBuilder {
        ResourceLoaderBuilder {
            catalog,
            fetcher: Box::new(fetcher),
            decoder: Box::new(DefaultDecoder),
            audio_context: None,
            settings: LoaderSettings::default(),
        }
    }

    /// Start loading with the default decoder and no audio context
    pub fn new(catalog: AssetCatalog, fetcher: impl Fetcher + 'static) -> Self {
        Self::builder(catalog, fetcher).start()
    }

    fn request_all(&mut self) {
        info!(
            records = self.catalog.len(),
            urls = self.progress.total,
            "resource loading started"
        );

        for slot in 0..self.ticket.urls.len() {
            let entry = &self.ticket.urls[slot];
            let audio_only = entry
                .owners
                .iter()
                .all(|(record, _)| self.catalog.records()[*record].kind == AssetKind::Audio);

            self.tracker.item_start(slot, &entry.url);
            if audio_only && self.audio_context.is_none() {
                warn!(url = %entry.url, "no audio context, skipping audio asset");
                self.skipped.push(slot);
                continue;
            }
            self.fetcher.request(&entry.url);
        }
    }

    pub fn subscribe(&mut self) -> Subscription<LoaderEvent> {
        self.events.subscribe()
    }

    /// Drain finished requests, decode completed records and emit events
    pub fn poll(&mut self) -> LoadProgress {
        #[cfg(feature = "profiling")]
        let span = info_span!(
            "resource_loader.poll",
            loaded = self.progress.loaded,
            total = self.progress.total
        );
        #[cfg(feature = "profiling")]
        let _span_guard = span.enter();

        for slot in std::mem::take(&mut self.skipped) {
            if self.tracker.item_end(slot) {
                let url = self.ticket.urls[slot].url.clone();
                let id = self.primary_id(slot);
                self.count(id, &url);
            }
        }

        for completion in self.fetcher.poll() {
            self.settle(completion);
        }

        if self.progress.total == 0 {
            self.finish();
        }
        self.progress
    }

    fn primary_id(&self, slot: usize) -> String {
        self.ticket
            .primary_owner(slot)
            .and_then(|record| self.catalog.records().get(record))
            .map(|record| record.id.clone())
            .unwrap_or_else(|| self.ticket.urls[slot].url.clone())
    }

    fn settle(&mut self, completion: FetchCompletion) {
        let key = completion.reported.key();
        let Some(slot) = self.ticket.resolve(&key) else {
            warn!(url = %key, "completion for an undeclared URL");
            self.events.emit(LoaderEvent::Progress(ProgressEvent {
                file: file_name(&key).to_string(),
                id: key,
                loaded: self.progress.loaded,
                total: self.progress.total,
                percent: self.progress.percent(),
            }));
            return;
        };

        if !self.tracker.is_started(slot) || self.tracker.settled[slot] {
            debug!(url = %key, "duplicate completion ignored");
            return;
        }

        let id = self.primary_id(slot);
        let owners = self.ticket.urls[slot].owners.clone();

        match completion.result {
            Ok(bytes) => {
                self.tracker.item_end(slot);
                for (record, part) in owners {
                    self.records[record].parts[part] = Some(bytes.clone());
                    if let Err(err) = self.finish_record(record) {
                        self.records[record].failed = true;
                        let record_id = self.catalog.records()[record].id.clone();
                        warn!(id = %record_id, error = %err, "decode failed");
                        self.emit_error(record_id, &key, err);
                    }
                }
            }
            Err(err) => {
                self.tracker.item_error(slot, &key);
                for (record, _) in owners {
                    self.records[record].failed = true;
                }
                self.emit_error(id.clone(), &key, err);
            }
        }

        self.count(id, &key);
    }

    fn emit_error(&mut self, id: String, url: &str, err: RuntimeError) {
        self.events.emit(LoaderEvent::Error(ErrorEvent {
            id,
            url: url.to_string(),
            loaded: self.progress.loaded,
            total: self.progress.total,
            reason: err.to_string(),
        }));
    }

    fn count(&mut self, id: String, url: &str) {
        self.progress.loaded += 1;
        let event = ProgressEvent {
            id,
            file: file_name(url).to_string(),
            loaded: self.progress.loaded,
            total: self.progress.total,
            percent: self.progress.percent(),
        };
        debug!(label = %event.label(), loaded = event.loaded, total = event.total, "progress");
        self.events.emit(LoaderEvent::Progress(event));

        if self.progress.loaded == self.progress.total {
            self.finish();
        }
    }

    fn finish(&mut self) {
        if self.complete_fired {
            return;
        }
        self.complete_fired = true;
        info!(
            loaded = self.progress.loaded,
            items = self.items.len(),
            "resource loading complete"
        );
        self.events.emit(LoaderEvent::Complete(CompleteEvent {
            loaded: self.progress.loaded,
            total: self.progress.total,
            percent: 100.0,
        }));
    }

    /// Decode a record once all of its parts have arrived
    fn finish_record(&mut self, index: usize) -> Result<()> {
        let state = &mut self.records[index];
        if state.failed || state.parts.iter().any(Option::is_none) {
            return Ok(());
        }
        let parts: Vec<Vec<u8>> = state.parts.iter_mut().filter_map(Option::take).collect();

        let record = &self.catalog.records()[index];
        let urls = record.path.urls();
        let contexts: SmallVec<[LoadContext; 6]> = urls
            .iter()
            .zip(&parts)
            .map(|(url, bytes)| LoadContext::new(&record.id, url, bytes))
            .collect();
        let first = contexts
            .first()
            .copied()
            .ok_or_else(|| RuntimeError::decode(&record.id, "record declares no path"))?;

        let asset = match record.kind {
            AssetKind::Texture => LoadedAsset::Texture(self.decoder.texture(first)?),
            AssetKind::HdriTexture => LoadedAsset::Hdri(self.decoder.hdri(first)?),
            AssetKind::CubeMap => LoadedAsset::CubeMap(self.decoder.cube_map(&contexts)?),
            AssetKind::GltfModel
            | AssetKind::GltfModelDraco
            | AssetKind::GltfModelKtx2
            | AssetKind::GltfModelDracoKtx2 => {
                let compression = record.kind.gltf_compression().unwrap_or(GltfCompression::NONE);
                LoadedAsset::Model(self.decoder.model(first, compression)?)
            }
            AssetKind::Font => LoadedAsset::Font(self.decoder.font(first)?),
            AssetKind::Audio => {
                let context = self
                    .audio_context
                    .as_deref_mut()
                    .ok_or(RuntimeError::AudioContextUnavailable)?;
                let clip = context
                    .decode(first.bytes)
                    .map_err(|err| RuntimeError::decode(&record.id, err.to_string()))?;
                LoadedAsset::Audio(clip)
            }
        };

        trace!(id = %record.id, kind = asset.kind_name(), "asset decoded");
        self.items.insert(record.id.clone(), asset);
        Ok(())
    }

    pub fn progress(&self) -> LoadProgress {
        self.progress
    }

    pub fn is_complete(&self) -> bool {
        self.complete_fired
    }

    pub fn items(&self) -> &LoadedItems {
        &self.items
    }

    pub fn catalog(&self) -> &AssetCatalog {
        &self.catalog
    }

    pub fn ticket(&self) -> &LoadTicket {
        &self.ticket
    }

    /// Hand over the loaded items and the decoding context
    pub fn into_resources(self) -> LoadedResources {
        LoadedResources {
            items: self.items,
            audio_context: self.audio_context,
        }
    }
}
