#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms)]
#![cfg_attr(not(feature = "std"), no_std)]

pub mod environment;
pub mod selector;
pub mod source;
pub mod util;
pub mod validator;

#[cfg(feature = "revocation")]
pub mod revocation;

extern crate alloc;

pub use crate::environment::*;

#[cfg(feature = "revocation")]
pub use crate::revocation::*;

pub use crate::{selector::*, source::*, util::*, validator::*};
