//! Sources of trust anchors and certificates

pub mod cert_pool;
pub mod ta_store;

pub use crate::{source::cert_pool::*, source::ta_store::*};
