// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for the Switchboard workspace: a full-stack harness, a
//! scripted mock agent runtime, and a recording delivery sink.

pub mod harness;
pub mod mock_runtime;
pub mod recording;

pub use harness::{LocalTransport, TestHarness, TestHarnessBuilder};
pub use mock_runtime::MockAgentRuntime;
pub use recording::{RecordedDelivery, RecordingHandler};
