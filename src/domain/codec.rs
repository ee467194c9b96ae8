//! Conversion between Safari's `Bookmarks.plist` schema and [`BookmarkTree`].
//!
//! Decoding keeps every key the model does not interpret in the node's
//! `attributes`, so encoding a decoded tree reproduces the original records.

use std::fmt;
use std::io::Cursor;
use std::time::SystemTime;

use chrono::{DateTime, Utc};
use plist::{Dictionary, Value};

use crate::domain::arena::{BookmarkTree, NodeId, NodeKind};
use crate::domain::entities::{Bookmark, Folder, UNTITLED_FOLDER};
use crate::domain::error::{DomainError, DomainResult};

const CHILDREN: &str = "Children";
const TITLE: &str = "Title";
const URL_STRING: &str = "URLString";
const URI_DICTIONARY: &str = "URIDictionary";
const URI_TITLE: &str = "title";
const UUID: &str = "WebBookmarkUUID";
const BOOKMARK_TYPE: &str = "WebBookmarkType";
const TYPE_LIST: &str = "WebBookmarkTypeList";
const TYPE_LEAF: &str = "WebBookmarkTypeLeaf";
const DATE_ADDED: &str = "DateAdded";
const LAST_MODIFIED: &str = "LastModified";
const READING_LIST: &str = "ReadingList";

const MAX_DEPTH: usize = 256;

/// On-disk plist encoding. Rewrites use the encoding the store was read in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFormat {
    Binary,
    Xml,
}

impl StoreFormat {
    pub fn detect(bytes: &[u8]) -> Self {
        if bytes.starts_with(b"bplist") {
            StoreFormat::Binary
        } else {
            StoreFormat::Xml
        }
    }
}

impl fmt::Display for StoreFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreFormat::Binary => write!(f, "binary plist"),
            StoreFormat::Xml => write!(f, "xml plist"),
        }
    }
}

/// Parse raw store bytes into a tree, reporting which encoding was found.
pub fn decode_bytes(bytes: &[u8]) -> DomainResult<(BookmarkTree, StoreFormat)> {
    let format = StoreFormat::detect(bytes);
    let value = Value::from_reader(Cursor::new(bytes))
        .map_err(|e| DomainError::malformed(format!("{} parse error: {}", format, e)))?;
    Ok((decode(value)?, format))
}

/// Encode a tree into store bytes.
pub fn encode_bytes(tree: &BookmarkTree, format: StoreFormat) -> DomainResult<Vec<u8>> {
    let value = encode(tree);
    let mut buffer = Vec::new();
    let written = match format {
        StoreFormat::Binary => value.to_writer_binary(&mut buffer),
        StoreFormat::Xml => value.to_writer_xml(&mut buffer),
    };
    written.map_err(|e| DomainError::Encode {
        message: e.to_string(),
    })?;
    Ok(buffer)
}

/// Build a tree from a parsed plist value.
pub fn decode(value: Value) -> DomainResult<BookmarkTree> {
    let mut root = value
        .into_dictionary()
        .ok_or_else(|| DomainError::malformed("top-level object is not a dictionary"))?;
    let children = take_children(&mut root, "root")?.unwrap_or_default();

    let mut tree = BookmarkTree::with_root_attributes(root);
    let root_id = tree.root();
    decode_children(&mut tree, root_id, children, 1)?;
    Ok(tree)
}

/// Encode a tree back into a plist value.
pub fn encode(tree: &BookmarkTree) -> Value {
    encode_node(tree, tree.root()).unwrap_or_else(|| Value::Dictionary(Dictionary::new()))
}

fn decode_children(
    tree: &mut BookmarkTree,
    parent: NodeId,
    items: Vec<Value>,
    depth: usize,
) -> DomainResult<()> {
    if depth > MAX_DEPTH {
        return Err(DomainError::malformed(format!(
            "folders nested deeper than {} levels",
            MAX_DEPTH
        )));
    }

    for (position, item) in items.into_iter().enumerate() {
        let mut dict = item.into_dictionary().ok_or_else(|| {
            DomainError::malformed(format!(
                "entry #{} in '{}' is not a dictionary",
                position,
                tree.full_path(parent).join("/")
            ))
        })?;

        if let Some(children) = take_children(&mut dict, "folder")? {
            let name = folder_name(&dict);
            let id = tree.insert_node(parent, NodeKind::Folder(Folder::new(name)), dict)?;
            decode_children(tree, id, children, depth + 1)?;
        } else if let Some(url) = non_empty_string(&dict, URL_STRING) {
            let bookmark = decode_bookmark(url.to_string(), &dict);
            tree.insert_node(parent, NodeKind::Bookmark(bookmark), dict)?;
        } else {
            tree.insert_node(parent, NodeKind::Opaque, dict)?;
        }
    }
    Ok(())
}

/// Take the `Children` array out of a record, leaving an empty placeholder so
/// the key keeps its position for the rewrite.
fn take_children(dict: &mut Dictionary, what: &str) -> DomainResult<Option<Vec<Value>>> {
    let Some(slot) = dict.get_mut(CHILDREN) else {
        return Ok(None);
    };
    match std::mem::replace(slot, Value::Array(Vec::new())) {
        Value::Array(items) => Ok(Some(items)),
        _ => Err(DomainError::malformed(format!(
            "{} `{}` is not an array",
            what, CHILDREN
        ))),
    }
}

fn folder_name(dict: &Dictionary) -> String {
    non_empty_string(dict, TITLE)
        .or_else(|| uri_title(dict))
        .unwrap_or(UNTITLED_FOLDER)
        .to_string()
}

fn decode_bookmark(url: String, dict: &Dictionary) -> Bookmark {
    let title = bookmark_title(dict, &url).to_string();
    let added_at = added_date(dict);
    let modified_at = date_value(dict.get(LAST_MODIFIED));

    let mut bookmark = Bookmark::new(title, url).with_timestamps(added_at, modified_at);
    bookmark.uuid = non_empty_string(dict, UUID).map(str::to_string);
    bookmark
}

fn bookmark_title<'a>(dict: &'a Dictionary, url: &'a str) -> &'a str {
    uri_title(dict)
        .or_else(|| non_empty_string(dict, TITLE))
        .unwrap_or(url)
}

/// Reading List items keep their date under `ReadingList.DateAdded`.
fn added_date(dict: &Dictionary) -> Option<DateTime<Utc>> {
    date_value(dict.get(DATE_ADDED)).or_else(|| {
        dict.get(READING_LIST)
            .and_then(Value::as_dictionary)
            .and_then(|reading| date_value(reading.get(DATE_ADDED)))
    })
}

fn encode_node(tree: &BookmarkTree, id: NodeId) -> Option<Value> {
    let node = tree.get_node(id)?;
    let mut dict = node.attributes.clone();
    // Records read from disk keep whatever type key they had.
    let created = node.attributes.is_empty();

    match &node.kind {
        NodeKind::Folder(folder) => {
            if id != tree.root() {
                write_folder_name(&mut dict, &folder.name);
                if created {
                    ensure_type(&mut dict, TYPE_LIST);
                }
            }
            let children = node
                .children
                .iter()
                .filter_map(|child| encode_node(tree, *child))
                .collect();
            dict.insert(CHILDREN.to_string(), Value::Array(children));
        }
        NodeKind::Bookmark(bookmark) => {
            write_bookmark(&mut dict, bookmark);
            if created {
                ensure_type(&mut dict, TYPE_LEAF);
            }
        }
        NodeKind::Opaque => {}
    }
    Some(Value::Dictionary(dict))
}

// Writers only touch a key when the model no longer matches what decoding
// the record yields, so display fallbacks never leak into the file.
fn write_folder_name(dict: &mut Dictionary, name: &str) {
    if folder_name(dict) == name {
        return;
    }
    if uri_title(dict).is_some() && non_empty_string(dict, TITLE).is_none() {
        set_uri_title(dict, name);
    } else {
        dict.insert(TITLE.to_string(), Value::String(name.to_string()));
    }
}

fn write_bookmark(dict: &mut Dictionary, bookmark: &Bookmark) {
    if dict.get(URL_STRING).and_then(Value::as_string) != Some(bookmark.url.as_str()) {
        dict.insert(URL_STRING.to_string(), Value::String(bookmark.url.clone()));
    }

    if bookmark_title(dict, &bookmark.url) != bookmark.title {
        if dict.get(URI_DICTIONARY).and_then(Value::as_dictionary).is_some() {
            set_uri_title(dict, &bookmark.title);
        } else if dict.contains_key(TITLE) {
            dict.insert(TITLE.to_string(), Value::String(bookmark.title.clone()));
        } else {
            set_uri_title(dict, &bookmark.title);
        }
    }

    if let Some(uuid) = &bookmark.uuid {
        if non_empty_string(dict, UUID) != Some(uuid.as_str()) {
            dict.insert(UUID.to_string(), Value::String(uuid.clone()));
        }
    }

    if let Some(added_at) = bookmark.added_at.filter(|at| added_date(dict) != Some(*at)) {
        let in_reading_list = !dict.contains_key(DATE_ADDED)
            && dict
                .get(READING_LIST)
                .and_then(Value::as_dictionary)
                .is_some_and(|reading| reading.contains_key(DATE_ADDED));
        if in_reading_list {
            if let Some(Value::Dictionary(reading)) = dict.get_mut(READING_LIST) {
                reading.insert(DATE_ADDED.to_string(), to_plist_date(added_at));
            }
        } else {
            dict.insert(DATE_ADDED.to_string(), to_plist_date(added_at));
        }
    }
    if let Some(modified_at) = bookmark
        .modified_at
        .filter(|at| date_value(dict.get(LAST_MODIFIED)) != Some(*at))
    {
        dict.insert(LAST_MODIFIED.to_string(), to_plist_date(modified_at));
    }
}

fn set_uri_title(dict: &mut Dictionary, title: &str) {
    match dict.get_mut(URI_DICTIONARY) {
        Some(Value::Dictionary(uri)) => {
            uri.insert(URI_TITLE.to_string(), Value::String(title.to_string()));
        }
        _ => {
            let mut uri = Dictionary::new();
            uri.insert(URI_TITLE.to_string(), Value::String(title.to_string()));
            dict.insert(URI_DICTIONARY.to_string(), Value::Dictionary(uri));
        }
    }
}

fn ensure_type(dict: &mut Dictionary, kind: &str) {
    if !dict.contains_key(BOOKMARK_TYPE) {
        dict.insert(BOOKMARK_TYPE.to_string(), Value::String(kind.to_string()));
    }
}

fn uri_title(dict: &Dictionary) -> Option<&str> {
    dict.get(URI_DICTIONARY)
        .and_then(Value::as_dictionary)
        .and_then(|uri| non_empty_string(uri, URI_TITLE))
}

fn non_empty_string<'a>(dict: &'a Dictionary, key: &str) -> Option<&'a str> {
    dict.get(key)
        .and_then(Value::as_string)
        .filter(|s| !s.is_empty())
}

fn date_value(value: Option<&Value>) -> Option<DateTime<Utc>> {
    value
        .and_then(Value::as_date)
        .map(|date| DateTime::<Utc>::from(SystemTime::from(date)))
}

fn to_plist_date(at: DateTime<Utc>) -> Value {
    Value::Date(SystemTime::from(at).into())
}
