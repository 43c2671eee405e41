//! In-memory collaborators for exercising `lwm2m-dm`
//!
//! # Purpose
//! The data model only sees Objects, a payload codec and hooks through
//! traits. This crate provides simple implementations of all three so the
//! dispatcher and the Access Control engine can be driven end to end in
//! tests and benchmarks:
//! - [`MockObject`]: an Object storing its instances in memory, with
//!   snapshot-based transactions and a shared [`MockHandle`] for inspection
//! - [`BincodeCodec`]: payloads as bincode-encoded lists of [`WireEntry`]
//! - [`RecordingHooks`]: records every hook invocation
//!
//! Security (0), Server (1) and Access Control (2) layouts are available
//! from [`standard`].

pub mod codec;
pub mod hooks;
pub mod object;
pub mod standard;

pub use codec::{decode, encode, BincodeCodec, WireEntry, MOCK_FORMAT};
pub use hooks::{HookLog, RecordingHooks};
pub use object::{MockHandle, MockObject, ObjectState, ResourceDef, StoredValue};
