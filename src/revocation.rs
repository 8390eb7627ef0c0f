//! Revocation status determination using CRLs
//!
//! The revocation module provides support for determining the revocation status of X.509
//! certificates using stored CRLs. Revocation support is available when the `revocation` feature
//! gate is used. No revocation support is available when `default-features = false` is used
//! without enabling `revocation`.
//!
//! Revocation status determination is performed as a stage of certification path validation when
//! the check revocation status setting is operative. The [`CrlStore`] type serves both as a CRL
//! store and as a revocation checker, as shown below.
//!
//! ```
//! use certpath::environment::PkiEnvironment;
//! use certpath::revocation::crl_check::CrlStore;
//!
//! let crl_store = CrlStore::default();
//! // add DER-encoded CRLs to the store via CrlSource::add_crl
//!
//! let mut pe = PkiEnvironment::default();
//! pe.add_crl_source(&crl_store);
//! pe.add_revocation_checker(&crl_store);
//! ```
//!
//! Revocation processing is influenced by values included in the
//! [`CertificationPathSettings`](../validator/path_settings/struct.CertificationPathSettings.html)
//! object, including:
//!
//! - [`PS_CHECK_REVOCATION_STATUS`](../validator/path_settings/static.PS_CHECK_REVOCATION_STATUS.html)
//! - [`PS_RELAX_REVOCATION_WHEN_UNAVAILABLE`](../validator/path_settings/static.PS_RELAX_REVOCATION_WHEN_UNAVAILABLE.html)
//! - [`PS_TIME_OF_INTEREST`](../validator/path_settings/static.PS_TIME_OF_INTEREST.html)

pub mod crl_check;

pub use crate::revocation::crl_check::*;
