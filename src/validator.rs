//! RFC5280-compliant certification path validation

pub mod cert_path;
pub mod name_constraints_set;
pub mod parsed_certificate;
pub mod parsed_extension;
pub mod path_results;
pub mod path_settings;
pub mod path_validator;
pub mod trust_anchor;
mod policy_tree;

pub use crate::{
    validator::cert_path::*, validator::name_constraints_set::*,
    validator::parsed_certificate::*, validator::parsed_extension::*,
    validator::path_results::*, validator::path_settings::*, validator::path_validator::*,
    validator::trust_anchor::*,
};
