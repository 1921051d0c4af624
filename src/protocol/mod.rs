//! CRLF line framing
//!
//! This module handles the byte-level framing of text protocols:
//! * Delimiter scan over a growable receive buffer (`decode`)
//! * CRLF line encoding (`encode`)
//!
//! It never interprets line content.

pub mod constants;
pub mod decode;
pub mod encode;

pub use decode::{find_line, LineBounds, LineMode};
pub use encode::encode_line;
