//! Shared fixtures: Safari-shaped plist builders, a scripted HTTP client and
//! a fault-injecting filesystem.
#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use plist::{Dictionary, Value};
use tempfile::TempDir;
use url::Url;

use bmprune::domain::{FailureKind, StoreFormat};
use bmprune::infrastructure::traits::{FileSystem, HttpClient, RealFileSystem};

pub const RUST_URL: &str = "https://www.rust-lang.org/";
pub const DOCS_URL: &str = "https://docs.laravel.com/10.x/routing";
pub const DEAD_URL: &str = "https://gone.example.org/page";
pub const NEWS_URL: &str = "https://news.ycombinator.com/";

/// Seconds since the Unix epoch for the dated fixture records.
pub const RUST_ADDED: u64 = 1_600_000_000;
pub const RUST_MODIFIED: u64 = 1_650_000_000;
pub const NEWS_ADDED: u64 = 1_700_000_000;

fn dict(entries: Vec<(&str, Value)>) -> Dictionary {
    let mut d = Dictionary::new();
    for (key, value) in entries {
        d.insert(key.to_string(), value);
    }
    d
}

/// A bookmark record the way Safari writes it.
pub fn leaf(title: &str, url: &str, uuid: &str) -> Value {
    Value::Dictionary(dict(vec![
        ("URIDictionary", Value::Dictionary(dict(vec![("title", title.into())]))),
        ("URLString", url.into()),
        ("WebBookmarkType", "WebBookmarkTypeLeaf".into()),
        ("WebBookmarkUUID", uuid.into()),
    ]))
}

pub fn plist_date(secs: u64) -> Value {
    Value::Date((SystemTime::UNIX_EPOCH + Duration::from_secs(secs)).into())
}

/// Adds top-level `DateAdded` and `LastModified` to a leaf.
pub fn dated(mut leaf: Value, added: u64, modified: u64) -> Value {
    if let Some(d) = leaf.as_dictionary_mut() {
        d.insert("DateAdded".to_string(), plist_date(added));
        d.insert("LastModified".to_string(), plist_date(modified));
    }
    leaf
}

/// Turns a leaf into a Reading List item dated under `ReadingList.DateAdded`.
pub fn reading_list(mut leaf: Value, added: u64) -> Value {
    if let Some(d) = leaf.as_dictionary_mut() {
        d.insert(
            "ReadingList".to_string(),
            Value::Dictionary(dict(vec![
                ("DateAdded", plist_date(added)),
                ("PreviewText", "Links for the curious".into()),
            ])),
        );
    }
    leaf
}

pub fn folder(title: &str, children: Vec<Value>) -> Value {
    Value::Dictionary(dict(vec![
        ("Children", Value::Array(children)),
        ("Title", title.into()),
        ("WebBookmarkType", "WebBookmarkTypeList".into()),
        ("WebBookmarkUUID", format!("folder-{}", title).into()),
    ]))
}

pub fn root(children: Vec<Value>) -> Value {
    Value::Dictionary(dict(vec![
        ("Children", Value::Array(children)),
        ("Title", "".into()),
        ("WebBookmarkFileVersion", Value::Integer(plist::Integer::from(1i64))),
        ("WebBookmarkType", "WebBookmarkTypeList".into()),
        ("WebBookmarkUUID", "root".into()),
    ]))
}

/// ```text
/// BookmarksBar/
///   Rust                 https://www.rust-lang.org/        (dated)
///   Dev/
///     Laravel Routing    https://docs.laravel.com/10.x/routing
///     Gone               https://gone.example.org/page
/// BookmarksMenu/
///   Hacker News          https://news.ycombinator.com/     (Reading List)
///   (proxy entry without URLString, unknown key "Sync")
/// ```
pub fn sample_store() -> Value {
    let mut proxy = dict(vec![
        ("Title", "History".into()),
        ("WebBookmarkType", "WebBookmarkTypeProxy".into()),
        ("WebBookmarkIdentifier", "History".into()),
    ]);
    proxy.insert(
        "Sync".to_string(),
        Value::Dictionary(dict(vec![("ServerID", "abc-123".into())])),
    );

    root(vec![
        folder(
            "BookmarksBar",
            vec![
                dated(leaf("Rust", RUST_URL, "u-rust"), RUST_ADDED, RUST_MODIFIED),
                folder(
                    "Dev",
                    vec![
                        leaf("Laravel Routing", DOCS_URL, "u-docs"),
                        leaf("Gone", DEAD_URL, "u-gone"),
                    ],
                ),
            ],
        ),
        folder(
            "BookmarksMenu",
            vec![
                reading_list(leaf("Hacker News", NEWS_URL, "u-news"), NEWS_ADDED),
                Value::Dictionary(proxy),
            ],
        ),
    ])
}

pub fn encode(value: &Value, format: StoreFormat) -> Vec<u8> {
    let mut buf = Vec::new();
    match format {
        StoreFormat::Binary => value.to_writer_binary(&mut buf).expect("encode binary"),
        StoreFormat::Xml => value.to_writer_xml(&mut buf).expect("encode xml"),
    }
    buf
}

/// Write `value` as `Bookmarks.plist` inside `dir`.
pub fn write_store(dir: &TempDir, value: &Value, format: StoreFormat) -> PathBuf {
    let path = dir.path().join("Bookmarks.plist");
    std::fs::write(&path, encode(value, format)).expect("write store");
    path
}

pub fn read_value(path: &Path) -> Value {
    Value::from_file(path).expect("read plist")
}

/// Files in `dir` whose name contains `.backup.`.
pub fn backups_in(dir: &Path) -> Vec<PathBuf> {
    let mut found: Vec<PathBuf> = std::fs::read_dir(dir)
        .expect("read dir")
        .filter_map(|e| e.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().contains(".backup."))
                .unwrap_or(false)
        })
        .collect();
    found.sort();
    found
}

// ============================================================
// HTTP
// ============================================================

/// Replays a per-url script of responses; the last entry repeats.
/// Unknown urls answer 200.
#[derive(Default)]
pub struct ScriptedHttp {
    scripts: HashMap<String, Vec<Result<u16, FailureKind>>>,
    calls: Mutex<HashMap<String, u32>>,
}

impl ScriptedHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: &str, responses: Vec<Result<u16, FailureKind>>) -> Self {
        let key = Url::parse(url).expect("fixture url").to_string();
        self.scripts.insert(key, responses);
        self
    }

    pub fn calls(&self, url: &str) -> u32 {
        let key = Url::parse(url).expect("fixture url").to_string();
        self.calls
            .lock()
            .expect("lock")
            .get(&key)
            .copied()
            .unwrap_or(0)
    }

    pub fn total_calls(&self) -> u32 {
        self.calls.lock().expect("lock").values().sum()
    }
}

impl HttpClient for ScriptedHttp {
    fn fetch_status(&self, url: &Url) -> Result<u16, FailureKind> {
        let key = url.to_string();
        let n = {
            let mut calls = self.calls.lock().expect("lock");
            let count = calls.entry(key.clone()).or_insert(0);
            *count += 1;
            *count as usize
        };
        match self.scripts.get(&key) {
            Some(script) if !script.is_empty() => script[(n - 1).min(script.len() - 1)],
            _ => Ok(200),
        }
    }
}

// ============================================================
// Filesystem
// ============================================================

/// Real filesystem with switchable failures.
#[derive(Default)]
pub struct FaultyFs {
    pub deny_read: bool,
    pub fail_copy: bool,
    pub fail_write_atomic: bool,
    pub corrupt_copy: bool,
    pub atomic_writes: AtomicUsize,
}

impl FaultyFs {
    pub fn atomic_writes(&self) -> usize {
        self.atomic_writes.load(Ordering::SeqCst)
    }
}

impl FileSystem for FaultyFs {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        if self.deny_read {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        RealFileSystem.read(path)
    }

    fn write(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        RealFileSystem.write(path, content)
    }

    fn exists(&self, path: &Path) -> bool {
        RealFileSystem.exists(path)
    }

    fn copy(&self, from: &Path, to: &Path) -> io::Result<u64> {
        if self.fail_copy {
            return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
        }
        let n = RealFileSystem.copy(from, to)?;
        if self.corrupt_copy {
            RealFileSystem.write(to, b"truncated")?;
        }
        Ok(n)
    }

    fn remove_file(&self, path: &Path) -> io::Result<()> {
        RealFileSystem.remove_file(path)
    }

    fn ensure_parent(&self, path: &Path) -> io::Result<()> {
        RealFileSystem.ensure_parent(path)
    }

    fn write_atomic(&self, path: &Path, content: &[u8]) -> io::Result<()> {
        self.atomic_writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_write_atomic {
            return Err(io::Error::new(io::ErrorKind::Other, "rename failed"));
        }
        RealFileSystem.write_atomic(path, content)
    }
}

pub fn real_fs() -> Arc<dyn FileSystem> {
    Arc::new(RealFileSystem)
}
