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

//! Error types

use std::fmt;

/// Runtime error type
#[derive(Debug, Clone)]
pub enum RuntimeError {
    /// Fetching the bytes behind a URL failed (network, missing file)
    AssetFetch { url: String, reason: String },

    /// Bytes arrived but could not be turned into an asset
    AssetDecode { id: String, reason: String },

    /// Asset id not present in the catalog or the loaded items
    AssetNotFound(String),

    /// Two catalog records share the same id
    DuplicateAssetId(String),

    /// Catalog file could not be parsed
    CatalogParse(String),

    /// No platform audio context could be acquired
    AudioContextUnavailable,

    /// Error reported by the audio graph
    AudioGraph(AudioGraphError),

    /// Invalid configuration value
    Config(String),

    /// IO error (file operations, etc.)
    IoError(String),
}

/// Errors reported by an audio backend for a single node operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioGraphError {
    /// The source node was already stopped
    AlreadyStopped,
    /// The node id does not refer to a live node
    UnknownNode(u64),
    /// The context has been closed
    ContextClosed,
    /// Decoding audio data failed
    DecodeFailed,
}

impl fmt::Display for AudioGraphError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioGraphError::AlreadyStopped => write!(f, "source already stopped"),
            AudioGraphError::UnknownNode(id) => write!(f, "unknown audio node {id}"),
            AudioGraphError::ContextClosed => write!(f, "audio context closed"),
            AudioGraphError::DecodeFailed => write!(f, "unable to decode audio data"),
        }
    }
}

impl std::error::Error for AudioGraphError {}

impl RuntimeError {
    /// Creates a fetch error for a URL
    pub fn fetch(url: impl Into<String>, reason: impl Into<String>) -> Self {
        RuntimeError::AssetFetch {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Creates a decode error for an asset id
    pub fn decode(id: impl Into<String>, reason: impl Into<String>) -> Self {
        RuntimeError::AssetDecode {
            id: id.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuntimeError::AssetFetch { url, reason } => {
                write!(f, "Failed to fetch '{url}': {reason}")
            }
            RuntimeError::AssetDecode { id, reason } => {
                write!(f, "Failed to decode asset '{id}': {reason}")
            }
            RuntimeError::AssetNotFound(id) => write!(f, "Asset not found: {id}"),
            RuntimeError::DuplicateAssetId(id) => write!(f, "Duplicate asset id: {id}"),
            RuntimeError::CatalogParse(msg) => write!(f, "Catalog parse error: {msg}"),
            RuntimeError::AudioContextUnavailable => write!(f, "Audio context unavailable"),
            RuntimeError::AudioGraph(err) => write!(f, "Audio graph error: {err}"),
            RuntimeError::Config(msg) => write!(f, "Configuration error: {msg}"),
            RuntimeError::IoError(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for RuntimeError {}

impl From<std::io::Error> for RuntimeError {
    fn from(err: std::io::Error) -> Self {
        RuntimeError::IoError(err.to_string())
    }
}

impl From<serde_json::Error> for RuntimeError {
    fn from(err: serde_json::Error) -> Self {
        RuntimeError::CatalogParse(err.to_string())
    }
}

impl From<AudioGraphError> for RuntimeError {
    fn from(err: AudioGraphError) -> Self {
        RuntimeError::AudioGraph(err)
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, RuntimeError>;
