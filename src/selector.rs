//! Declarative certificate matching in support of certification path discovery and validation

pub mod cert_selector;

pub use crate::selector::cert_selector::*;
