// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared data model and error kinds for the worker control plane.
//!
//! This crate has no I/O of its own — it is imported by every other crate
//! in the workspace so that worker, session, and error types have one
//! canonical definition.

pub mod audit;
pub mod error;
pub mod session;
pub mod worker;

pub use audit::AuditRecord;
pub use error::{AcError, ErrorEnvelope, ErrorKind};
pub use session::{DeviceFingerprint, GeoHint, Session, SessionId};
pub use worker::{Invocation, WorkerDescriptor, WorkerId, WorkerState};
