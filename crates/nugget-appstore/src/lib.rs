//! Clients and pipeline for storefront keyword competition analysis.
//!
//! The ranking endpoint gives the authoritative result order but almost no
//! metadata; the lookup endpoint gives rich metadata but scrambles order.
//! This crate fetches both, reconciles them without losing the authoritative
//! order, and scores the merged results.

pub mod analyze;
pub mod client;
pub mod error;
pub mod merge;
pub mod target;
pub mod types;

pub use analyze::{analyze_keyword, AnalysisOutcome, KeywordAnalysis};
pub use client::{AppStoreClient, LOOKUP_CHUNK_SIZE};
pub use error::FetchError;
pub use merge::{merge_ranked, MergeOutcome};
pub use target::{LookupTarget, SearchAttribute};
pub use types::{AppRecord, RankedApp};
