//! Permafiles Core - Domain model and port definitions
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `FileEntry`, `PendingTransferItem`, `QueueSnapshot`
//! - **Addressing** - archive numbers, folder-link ids, record ids
//! - **Envelope** - validation of the uniform response wrapper
//! - **Endpoint catalogue** - every JSON call the engines make
//! - **Port definitions** - `IRequestDispatcher`, `ILocalFileStorage`,
//!   `IQueueSnapshotStore`, `IEventObserver`
//! - **Configuration** - YAML configuration with validation
//!
//! # Architecture
//!
//! The domain module contains pure types with no I/O. Ports define trait
//! interfaces that adapter crates implement; the engines in
//! `permafiles-sync` drive the domain through those ports.

pub mod config;
pub mod domain;
pub mod endpoint;
pub mod envelope;
pub mod ports;
