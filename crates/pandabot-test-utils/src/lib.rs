// SPDX-FileCopyrightText: 2026 Pandabot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic test doubles shared across the pandabot workspace.

pub mod memory_store;
pub mod mock_backend;
pub mod mock_messenger;
pub mod recording_tool;

pub use memory_store::MemoryStore;
pub use mock_backend::MockBackend;
pub use mock_messenger::MockMessenger;
pub use recording_tool::RecordingTool;
