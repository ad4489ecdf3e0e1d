//! Granular backup & restore engine.
//!
//! This module implements selective export and re-import of the platform's
//! collections as a single portable JSON document.
//!
//! # Architecture Overview
//!
//! ## Core Components
//!
//! - **`policy`**: Value objects describing what to export ([`policy::SelectionPolicy`])
//!   and what to import ([`policy::ImportOptions`]). Pure data, no I/O.
//!
//! - **`collector`**: Turns a selection policy into bounded per-kind record
//!   sets by driving the repository registry, and answers count-only
//!   previews. A failed read for one kind never aborts the others.
//!
//! - **`document`**: The versioned [`document::BackupDocument`] wire format.
//!   Per-kind statistics are derived from the collected data at build time,
//!   so they cannot drift from the payload.
//!
//! - **`validate`**: Structural gate over inbound payloads. Rejects malformed
//!   documents before any store mutation is attempted.
//!
//! - **`hierarchy`**: Flat arena over the self-referencing category table
//!   plus the dependency resolver that orders inbound category snapshots by
//!   parent-chain depth.
//!
//! - **`reconcile`**: The per-record create/update/skip decision against the
//!   target store, matching on natural keys rather than identifiers.
//!
//! - **`orchestrator`**: Walks entity kinds in dependency order, drives the
//!   reconciler per record, isolates per-record failures, and aggregates
//!   `{created, updated, skipped, errors}` counters per kind.
//!
//! ## Data Flow
//!
//! - Export: SelectionPolicy → Collector → BackupDocument
//! - Import: payload → Validation Gate → dependency stages → Reconciler per
//!   record → ImportResult
//!
//! ## Error Model
//!
//! Structural problems ([`BackupError::InvalidDocument`]) fail the whole
//! request before anything is written. Problems local to one record
//! ([`RecordError`]) are counted into that kind's `errors` tally and
//! processing continues; an administrator migrating a thousand records must
//! not have the good ones blocked by one bad row. Every create/update is an
//! independent commit, so re-running an import is always safe.

use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod collector;
pub mod document;
pub mod hierarchy;
pub mod orchestrator;
pub mod policy;
pub mod reconcile;
pub mod validate;

#[cfg(test)]
pub(crate) mod testing;

pub use collector::{Collector, PreviewReport};
pub use document::BackupDocument;
pub use orchestrator::{ImportOrchestrator, ImportResult, KindCounters};
pub use policy::{ImportOptions, SelectionFilter, SelectionPolicy};

/// The backup-eligible collections, in canonical order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    Users,
    Categories,
    Companies,
    Groups,
    Posts,
    JobOffers,
    Announcements,
    Advisories,
    Blogs,
    EmailTemplates,
}

impl EntityKind {
    pub const ALL: [EntityKind; 10] = [
        EntityKind::Users,
        EntityKind::Categories,
        EntityKind::Companies,
        EntityKind::Groups,
        EntityKind::Posts,
        EntityKind::JobOffers,
        EntityKind::Announcements,
        EntityKind::Advisories,
        EntityKind::Blogs,
        EntityKind::EmailTemplates,
    ];

    /// Import stages: a kind in a later stage may hold natural-key references
    /// to kinds in an earlier one, so stages run in order. Kinds within a
    /// stage are independent of each other.
    pub const IMPORT_STAGES: [&'static [EntityKind]; 3] = [
        &[
            EntityKind::Users,
            EntityKind::Categories,
            EntityKind::EmailTemplates,
        ],
        &[EntityKind::Companies, EntityKind::Groups],
        &[
            EntityKind::Posts,
            EntityKind::JobOffers,
            EntityKind::Announcements,
            EntityKind::Advisories,
            EntityKind::Blogs,
        ],
    ];

    /// The camelCase name used in documents, query strings and responses.
    pub fn wire_name(&self) -> &'static str {
        match self {
            EntityKind::Users => "users",
            EntityKind::Categories => "categories",
            EntityKind::Companies => "companies",
            EntityKind::Groups => "groups",
            EntityKind::Posts => "posts",
            EntityKind::JobOffers => "jobOffers",
            EntityKind::Announcements => "announcements",
            EntityKind::Advisories => "advisories",
            EntityKind::Blogs => "blogs",
            EntityKind::EmailTemplates => "emailTemplates",
        }
    }

    pub fn from_wire(name: &str) -> Option<EntityKind> {
        EntityKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.wire_name() == name)
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// Failure of a whole export/import request.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid backup data: {0}")]
    InvalidDocument(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure local to a single inbound record. Counted, never fatal.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("unresolved reference: {0}")]
    UnresolvedReference(String),
    #[error("invalid snapshot: {0}")]
    InvalidSnapshot(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl From<serde_json::Error> for RecordError {
    fn from(err: serde_json::Error) -> Self {
        RecordError::InvalidSnapshot(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for kind in EntityKind::ALL {
            assert_eq!(EntityKind::from_wire(kind.wire_name()), Some(kind));
        }
        assert_eq!(EntityKind::from_wire("widgets"), None);
    }

    #[test]
    fn import_stages_cover_every_kind_once() {
        let staged: Vec<EntityKind> = EntityKind::IMPORT_STAGES
            .iter()
            .flat_map(|stage| stage.iter().copied())
            .collect();
        assert_eq!(staged.len(), EntityKind::ALL.len());
        for kind in EntityKind::ALL {
            assert_eq!(staged.iter().filter(|k| **k == kind).count(), 1);
        }
    }
}
