// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Framing, buffering, and fan-out for worker stdio streams.
//!
//! Components A (Framer), B (Ring Buffer), C (Event Bus), and J (Stream
//! Handler) of the control plane.

pub mod bus;
pub mod framer;
pub mod handler;
pub mod ring;
pub mod subscription;

pub use bus::{Event, EventBus, HandlerGuard};
pub use framer::{run_framer, Frame, FramerError, MAX_RECORD_SIZE};
pub use handler::{StreamHandler, StreamHandlerError};
pub use ring::RingBuffer;
pub use subscription::{OfferOutcome, SlowPolicy, Subscriber, DEFAULT_QUEUE_CAPACITY};
