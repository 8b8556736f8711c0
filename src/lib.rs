#![doc = include_str!("../README.md")]
//! ## Feature flags
#![doc = document_features::document_features!()]
//!

// Public modules
mod common;

pub mod config;
pub mod crawler;
pub mod dht;
mod error;
pub mod reconciler;
pub mod render;
pub mod testnet;

pub use crate::common::{
    AutoLink, ClientEntry, Clients, Config as ReflectorConfig, Document, Family, Id, MrefdConfig,
    MrefdUser, MrefdUsers, PeerEntry, Peers, RecordKind, UrfdConfig, UrfdPort, UrfdUser,
    UrfdUsers, Users, Value, Version, Versioned, Where,
};
pub use bytes::Bytes;
pub use config::Config;
pub use crawler::{ConnectivityGraph, Crawler, CrawlerBuilder};
pub use dht::Dht;
pub use error::Error;
pub use reconciler::{BestValue, Query, QueryError, Reconciler, Rejection, Snapshot, Stats};
pub use testnet::Testnet;

pub use ed25519_dalek::SigningKey;

/// Alias `Result<T, Error>`.
pub type Result<T, E = Error> = std::result::Result<T, E>;
