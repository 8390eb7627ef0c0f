//! Basic utility functionality supporting certification path building and validation

pub mod alg_oids;
pub mod crypto;
pub mod error;
pub mod logging;
pub mod name_utils;

pub use crate::{
    util::alg_oids::*, util::crypto::*, util::error::*, util::logging::*, util::name_utils::*,
};
