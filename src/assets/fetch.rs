//! Fetch backends.
//!
//! A [`Fetcher`] turns URLs into bytes. Requests are fire-and-forget; completions are collected by
//! polling, so the loader stays single-threaded regardless of where the IO actually happens.

use crate::error::{Result, RuntimeError};
use ahash::AHashMap;
use serde_json::Value;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// The shape in which a fetch backend reports which URL finished.
///
/// Backends are not uniform: some echo the URL, some the whole list they were given, some a
/// request object.
#[derive(Clone, Debug, PartialEq)]
pub enum ReportedUrl {
    Url(String),
    /// A list of URLs; the first one identifies the request
    List(Vec<String>),
    /// A request object carrying `url` or `src`
    Object(Value),
    /// Anything else, already stringified
    Other(String),
}

impl ReportedUrl {
    /// Lookup key used to resolve the owning record
    pub fn key(&self) -> String {
        match self {
            ReportedUrl::Url(url) | ReportedUrl::Other(url) => url.clone(),
            ReportedUrl::List(urls) => urls.first().cloned().unwrap_or_default(),
            ReportedUrl::Object(value) => value
                .get("url")
                .and_then(Value::as_str)
                .or_else(|| value.get("src").and_then(Value::as_str))
                .map(str::to_string)
                .unwrap_or_else(|| value.to_string()),
        }
    }
}

impl From<&str> for ReportedUrl {
    fn from(url: &str) -> Self {
        ReportedUrl::Url(url.to_string())
    }
}

impl From<String> for ReportedUrl {
    fn from(url: String) -> Self {
        ReportedUrl::Url(url)
    }
}

/// One finished request
#[derive(Debug)]
pub struct FetchCompletion {
    pub reported: ReportedUrl,
    pub result: Result<Vec<u8>>,
}

/// Byte source for the resource loader
pub trait Fetcher {
    /// Begin fetching `url`. Completion may be reported on the very next poll.
    fn request(&mut self, url: &str);

    /// Completions that arrived since the last poll, in arrival order
    fn poll(&mut self) -> Vec<FetchCompletion>;

    /// Requests started but not yet reported
    fn in_flight(&self) -> usize;
}

type ReportFn = Box<dyn Fn(&str) -> ReportedUrl + Send>;

/// In-memory fetcher with controllable delivery.
///
/// Completions can be held back, released a few at a time, or delivered in reverse order, which is
/// how the loader is exercised against arbitrary completion orders.
pub struct MemoryFetcher {
    files: AHashMap<String, Vec<u8>>,
    failures: AHashMap<String, String>,
    queue: VecDeque<String>,
    reverse: bool,
    per_poll: Option<usize>,
    held: bool,
    report: ReportFn,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self {
            files: AHashMap::new(),
            failures: AHashMap::new(),
            queue: VecDeque::new(),
            reverse: false,
            per_poll: None,
            held: false,
            report: Box::new(|url| ReportedUrl::Url(url.to_string())),
        }
    }

    pub fn with_file(mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(url, bytes);
        self
    }

    pub fn insert(&mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(url.into(), bytes.into());
    }

    /// Make every request for `url` fail with `reason`
    pub fn fail(mut self, url: impl Into<String>, reason: impl Into<String>) -> Self {
        self.failures.insert(url.into(), reason.into());
        self
    }

    /// Deliver newest requests first
    pub fn reversed(mut self) -> Self {
        self.reverse = true;
        self
    }

    /// Deliver at most `count` completions per poll
    pub fn per_poll(mut self, count: usize) -> Self {
        self.per_poll = Some(count.max(1));
        self
    }

    /// Control how completions identify their URL
    pub fn report_with(mut self, report: impl Fn(&str) -> ReportedUrl + Send + 'static) -> Self {
        self.report = Box::new(report);
        self
    }

    /// Stop delivering until [`release`](Self::release)
    pub fn hold(&mut self) {
        self.held = true;
    }

    pub fn release(&mut self) {
        self.held = false;
    }

    fn complete(&self, url: &str) -> FetchCompletion {
        let result = if let Some(reason) = self.failures.get(url) {
            Err(RuntimeError::fetch(url, reason.clone()))
        } else {
            self.files
                .get(url)
                .cloned()
                .ok_or_else(|| RuntimeError::fetch(url, "404 not found"))
        };

        FetchCompletion {
            reported: (self.report)(url),
            result,
        }
    }
}

impl Default for MemoryFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Fetcher for MemoryFetcher {
    fn request(&mut self, url: &str) {
        self.queue.push_back(url.to_string());
    }

    fn poll(&mut self) -> Vec<FetchCompletion> {
        if self.held {
            return Vec::new();
        }

        let count = self.per_poll.unwrap_or(self.queue.len()).min(self.queue.len());
        let mut completions = Vec::with_capacity(count);
        for _ in 0..count {
            let next = if self.reverse {
                self.queue.pop_back()
            } else {
                self.queue.pop_front()
            };
            if let Some(url) = next {
                completions.push(self.complete(&url));
            }
        }
        completions
    }

    fn in_flight(&self) -> usize {
        self.queue.len()
    }
}

/// Map a URL onto a path below `root`, dropping any origin and query string
fn local_path(root: &Path, url: &str) -> PathBuf {
    let without_origin = match url.find("://") {
        Some(scheme_end) => {
            let rest = &url[scheme_end + 3..];
            rest.find('/').map(|slash| &rest[slash..]).unwrap_or("")
        }
        None => url,
    };
    let without_query = without_origin
        .split(['?', '#'])
        .next()
        .unwrap_or(without_origin);
    root.join(without_query.trim_start_matches('/'))
}

fn read_asset(root: &Path, url: &str) -> Result<Vec<u8>> {
    let path = local_path(root, url);
    std::fs::read(&path).map_err(|err| RuntimeError::fetch(url, err.to_string()))
}

/// Reads files synchronously at request time
pub struct FsFetcher {
    root: PathBuf,
    completed: VecDeque<FetchCompletion>,
}

impl FsFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            completed: VecDeque::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Fetcher for FsFetcher {
    fn request(&mut self, url: &str) {
        let result = read_asset(&self.root, url);
        tracing::trace!(url, ok = result.is_ok(), "fs fetch");
        self.completed.push_back(FetchCompletion {
            reported: ReportedUrl::from(url),
            result,
        });
    }

    fn poll(&mut self) -> Vec<FetchCompletion> {
        self.completed.drain(..).collect()
    }

    fn in_flight(&self) -> usize {
        self.completed.len()
    }
}

/// Reads files on the rayon pool; completions come back over a channel
#[cfg(feature = "parallel")]
pub struct ThreadedFetcher {
    root: std::sync::Arc<PathBuf>,
    sender: crossbeam::channel::Sender<FetchCompletion>,
    receiver: crossbeam::channel::Receiver<FetchCompletion>,
    in_flight: usize,
}

#[cfg(feature = "parallel")]
impl ThreadedFetcher {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let (sender, receiver) = crossbeam::channel::unbounded();
        Self {
            root: std::sync::Arc::new(root.into()),
            sender,
            receiver,
            in_flight: 0,
        }
    }
}

#[cfg(feature = "parallel")]
impl Fetcher for ThreadedFetcher {
    fn request(&mut self, url: &str) {
        let root = self.root.clone();
        let sender = self.sender.clone();
        let url = url.to_string();
        self.in_flight += 1;

        rayon::spawn(move || {
            let result = read_asset(&root, &url);
            // Receiver only disappears when the fetcher is dropped
            let _ = sender.send(FetchCompletion {
                reported: ReportedUrl::Url(url),
                result,
            });
        });
    }

    fn poll(&mut self) -> Vec<FetchCompletion> {
        let completions: Vec<_> = self.receiver.try_iter().collect();
        self.in_flight = self.in_flight.saturating_sub(completions.len());
        completions
    }

    fn in_flight(&self) -> usize {
        self.in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "stage_runtime_{name}_{}",
            crate::utils::next_id()
        ));
        std::fs::create_dir_all(dir.join("textures")).unwrap();
        dir
    }

    #[test]
    fn test_reported_url_keys() {
        assert_eq!(ReportedUrl::from("/a.png").key(), "/a.png");
        assert_eq!(
            ReportedUrl::List(vec!["/px.png".into(), "/nx.png".into()]).key(),
            "/px.png"
        );
        assert_eq!(ReportedUrl::Object(json!({"src": "/s.mp3"})).key(), "/s.mp3");
        assert_eq!(
            ReportedUrl::Object(json!({"url": "/u.glb", "src": "/s.glb"})).key(),
            "/u.glb"
        );
        assert_eq!(
            ReportedUrl::Object(json!({"name": "x"})).key(),
            r#"{"name":"x"}"#
        );
    }

    #[test]
    fn test_memory_fetcher_order_and_batches() {
        let mut fetcher = MemoryFetcher::new()
            .with_file("/a", vec![1])
            .with_file("/b", vec![2])
            .with_file("/c", vec![3])
            .reversed()
            .per_poll(2);

        for url in ["/a", "/b", "/c"] {
            fetcher.request(url);
        }

        let first: Vec<_> = fetcher.poll().into_iter().map(|c| c.reported.key()).collect();
        assert_eq!(first, vec!["/c", "/b"]);
        assert_eq!(fetcher.in_flight(), 1);
        assert_eq!(fetcher.poll()[0].reported.key(), "/a");
    }

    #[test]
    fn test_memory_fetcher_hold_and_failures() {
        let mut fetcher = MemoryFetcher::new().fail("/broken", "500");
        fetcher.request("/broken");
        fetcher.request("/missing");
        fetcher.hold();
        assert!(fetcher.poll().is_empty());

        fetcher.release();
        let completions = fetcher.poll();
        assert_eq!(completions.len(), 2);
        assert!(completions.iter().all(|c| c.result.is_err()));
    }

    #[test]
    fn test_local_path_strips_origin_and_query() {
        let root = Path::new("/srv/static");
        assert_eq!(
            local_path(root, "http://localhost:5173/textures/a.png?v=2"),
            Path::new("/srv/static/textures/a.png")
        );
        assert_eq!(
            local_path(root, "/models/b.glb"),
            Path::new("/srv/static/models/b.glb")
        );
    }

    #[test]
    fn test_fs_fetcher_reads_files() {
        let dir = scratch_dir("fs");
        std::fs::write(dir.join("textures/floor.jpg"), [0xFF, 0xD8, 0xFF]).unwrap();

        let mut fetcher = FsFetcher::new(&dir);
        fetcher.request("/textures/floor.jpg");
        fetcher.request("/textures/none.jpg");

        let completions = fetcher.poll();
        assert_eq!(completions[0].result.as_ref().unwrap().len(), 3);
        assert!(completions[1].result.is_err());
        std::fs::remove_dir_all(dir).ok();
    }

    #[cfg(feature = "parallel")]
    #[test]
    fn test_threaded_fetcher_delivers_all() {
        let dir = scratch_dir("threaded");
        for i in 0..4 {
            std::fs::write(dir.join(format!("textures/{i}.png")), [i as u8]).unwrap();
        }

        let mut fetcher = ThreadedFetcher::new(&dir);
        for i in 0..4 {
            fetcher.request(&format!("/textures/{i}.png"));
        }

        let mut received = Vec::new();
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
        while received.len() < 4 && std::time::Instant::now() < deadline {
            received.extend(fetcher.poll());
            std::thread::sleep(std::time::Duration::from_millis(1));
        }

        assert_eq!(received.len(), 4);
        assert_eq!(fetcher.in_flight(), 0);
        std::fs::remove_dir_all(dir).ok();
    }
}
