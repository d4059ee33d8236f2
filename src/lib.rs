/*
 * SPDX-License-Identifier: Apache-2.0
 *
 * Copyright The Asahi Linux Contributors
 */

//! I2C over a MCP2221A USB-to-I2C converter, for sampling PAC1720-class
//! power sensors. Noticeably faster than the vendor tooling for single
//! register reads.

mod error;

pub mod mcp2221;
pub mod protocol;
pub mod session;
pub mod transport;

pub use error::{FramerError, SessionError, TransportError};
pub use mcp2221::Device;
pub use session::{Backend, Session};
