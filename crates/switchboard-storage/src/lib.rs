// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistence layer for the Switchboard session manager.
//!
//! One directory per session holds its metadata record and the transport's
//! credential material. Writes go through a temporary file and a rename so a
//! crash never leaves a half-written record behind.

pub mod fs;

pub use fs::FsStore;
