//! An async client for the programmable object generation API.
//!
//! The API turns a short name and description into a 3D object. A client
//! submits a generation, long-polls the object until the submitted version is
//! final, downloads the resulting GLB and can register it with the debug rooms
//! endpoint.
//!
//! ## Features
//! - Generation submission with client-side version tokens.
//! - Bounded long-polling with a per-request and an overall timeout.
//! - Pluggable progress reporting while waiting.
//! - Content download and saving to disk.
//! - Typed error handling for every failure mode of the workflow.

mod client;
mod error;
mod progress;
mod types;

pub use client::{make_version, ObjgenClient, DEFAULT_LANGUAGE_MODEL};
pub use error::ObjgenError;
pub use progress::{ConsoleProgress, ProgressReporter, TickerHandle};
pub use types::{
    DebugRoomRegistration, ObjectContent, ObjectMetadata, ObjectProps, ObjectState, TaskStatus,
    VersionTask, WaitOptions,
};
