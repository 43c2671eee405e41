//! LwM2M Data Model - object dispatch and Access Control for an LwM2M client
//!
//! # Purpose
//! Maps LwM2M operations (Read, Write, Create, Delete, Execute, Discover,
//! Write-Attributes and the Composite variants) onto a registry of Objects
//! implementing [`DmObject`], enforcing the Access Control Lists of the
//! Access Control Object (OID 2) on every instance touched.
//!
//! # Integration Points
//! - Depends on: a payload [`Codec`] and [`DmHooks`] provided by the
//!   surrounding client (transport, registration, Observe)
//! - Provides to: the request-handling loop of the client
//!
//! # Architecture
//! [`DataModel`] owns the object registry, the transaction state and the
//! notify queues. Every mutating request runs in a transaction spanning the
//! Objects it touches; the resulting changes are flushed through
//! [`DataModel::notify_perform`], which keeps Access Control instances in
//! sync with the rest of the data model before the changes reach Observe.
//!
//! # Testing Strategy
//! - Unit tests: identifiers, ACL resolution, transactions, notify queue
//! - Integration tests: request dispatch and Access Control scenarios
//!   against the in-memory objects of `lwm2m-dm-mock`

pub mod access;
pub mod attributes;
pub mod client;
pub mod config;
pub mod dispatch;
pub mod dm;
pub mod error;
pub mod execute;
pub mod hooks;
pub mod ids;
pub mod io;
pub mod iterate;
pub mod notify;
pub mod object;
pub mod path;
pub mod registry;
pub mod request;
pub mod transaction;

pub use access::{instance_action_allowed, AccessMask, ActionInfo, AclEntry};
pub use attributes::{AttrChange, OiAttributes, RequestAttributes, ResourceAttributes};
pub use client::Lwm2mClient;
pub use config::{ConfigError, DmConfig, LwM2mVersion};
pub use dispatch::WriteMode;
pub use dm::DataModel;
pub use error::{DmError, MsgCode, Result};
pub use execute::ExecuteCtx;
pub use hooks::{DmHooks, NoopHooks};
pub use ids::{Iid, Oid, Rid, Riid, Ssid, UriPath, ID_INVALID, SSID_ANY, SSID_BOOTSTRAP};
pub use io::{Codec, Decoder, Encoder, InputCtx, OutputCtx, PayloadEntry, Value, ValueType};
pub use iterate::{InstanceListCtx, ResourceInstanceListCtx, ResourceListCtx};
pub use notify::NotifyQueue;
pub use object::{DmObject, ResourceKind, ResourcePresence};
pub use registry::DmModule;
pub use request::{Action, Observe, Request, Response};
