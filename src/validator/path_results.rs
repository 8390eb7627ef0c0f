//! Structures and functions related to results from certification path processing operations

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::{vec, vec::Vec};

use der::asn1::ObjectIdentifier;

use crate::path_settings::*;
use crate::Error;
use crate::PathValidationStatus;

/// `CertificationPathResultsTypes` is used to define a variant map with types associated with
/// results from certification path discovery and validation.
#[derive(Clone)]
pub enum CertificationPathResultsTypes {
    /// Represents u8 values
    U8(u8),
    /// Represents ObjectIdentifierSet values
    ObjectIdentifierSet(ObjectIdentifierSet),
    /// Represents vectors of vectors of buffers
    ListOfBuffers(ListOfBuffers),
    /// Represents FinalValidPolicyTree values
    FinalValidPolicyTree(FinalValidPolicyTree),
    /// Represents validation results
    PathValidationStatus(PathValidationStatus),
    /// Represents errors
    Error(Error),
}

/// `CertificationPathResults` is a map of arbitrary string keys to variant values that receives
/// artifacts produced while validating a certification path, i.e., the outputs defined in
/// [RFC 5280 Section 6.1.6]: <https://datatracker.ietf.org/doc/html/rfc5280#section-6.1.6> along
/// with diagnostic details.
#[derive(Clone, Default)]
pub struct CertificationPathResults(pub BTreeMap<&'static str, CertificationPathResultsTypes>);

impl CertificationPathResults {
    /// Creates a new empty [`CertificationPathResults`]
    pub fn new() -> Self {
        Self(Default::default())
    }
}

/// `PR_PROCESSED_EXTENSIONS` is used to retrieve an ObjectIdentifierSet value, i.e., BTreeSet of
/// ObjectIdentifier, from a [`CertificationPathResults`] object. This set is populated as
/// extensions are processed then used to check for unprocessed critical extensions.
pub static PR_PROCESSED_EXTENSIONS: &str = "cprProcessedExtensions";

/// `PR_FINAL_VALID_POLICY_TREE` is used to retrieve a FinalValidPolicyTree value from a
/// [`CertificationPathResults`] object.
pub static PR_FINAL_VALID_POLICY_TREE: &str = "cprValidPolicyTree";

/// `PR_VALIDATION_STATUS` is used to retrieve a status code indicating validation result.
pub static PR_VALIDATION_STATUS: &str = "cprValidationStatus";

/// `PR_FAILED_CERT_INDEX` is used to retrieve the index of the certificate being processed when
/// validation failed, with zero denoting the certificate closest to the trust anchor and the
/// highest index denoting the target.
pub static PR_FAILED_CERT_INDEX: &str = "cprFailedCertIndex";

/// `PR_CRL` is used to retrieve the CRL(s) used for each item in a certification path.
pub static PR_CRL: &str = "cprCrl";

/// `PR_FAILED_CRLS` is used to retrieve CRLs that did not result in determination of status.
pub static PR_FAILED_CRLS: &str = "cprFailedCrls";

//-----------------------------------------------------------------------------------------------
// Macros that generate getters/setters for results
//-----------------------------------------------------------------------------------------------
/// Generates a getter that returns an Option and a setter for a results key whose absence has no
/// default interpretation.
macro_rules! cpr_gets_and_sets {
    ($name:ident, $getter:ident, $setter:ident, $variant:ident, $t:ty) => {
        impl CertificationPathResults {
            #[doc = concat!("`", stringify!($getter), "` is used to retrieve `", stringify!($name), "` items from a [`CertificationPathResults`] instance")]
            pub fn $getter(&self) -> Option<$t> {
                if self.0.contains_key($name) {
                    return match &self.0[$name] {
                        CertificationPathResultsTypes::$variant(v) => Some(v.clone()),
                        _ => None,
                    };
                }
                None
            }

            #[doc = concat!("`", stringify!($setter), "` is used to set `", stringify!($name), "` items in a [`CertificationPathResults`] instance")]
            pub fn $setter(&mut self, v: $t) {
                self.0
                    .insert($name, CertificationPathResultsTypes::$variant(v));
            }
        }
    };
}

/// Generates a getter that falls back to a default value and a setter for a results key.
macro_rules! cpr_gets_and_sets_with_default {
    ($name:ident, $getter:ident, $setter:ident, $variant:ident, $t:ty, $default:expr) => {
        impl CertificationPathResults {
            #[doc = concat!("`", stringify!($getter), "` is used to retrieve `", stringify!($name), "` items from a [`CertificationPathResults`] instance")]
            pub fn $getter(&self) -> $t {
                if self.0.contains_key($name) {
                    return match &self.0[$name] {
                        CertificationPathResultsTypes::$variant(v) => v.clone(),
                        _ => $default,
                    };
                }
                $default
            }

            #[doc = concat!("`", stringify!($setter), "` is used to set `", stringify!($name), "` items in a [`CertificationPathResults`] instance")]
            pub fn $setter(&mut self, v: $t) {
                self.0
                    .insert($name, CertificationPathResultsTypes::$variant(v));
            }
        }
    };
}

//-----------------------------------------------------------------------------------------------
// Getters/setters for results
//-----------------------------------------------------------------------------------------------
cpr_gets_and_sets_with_default!(
    PR_PROCESSED_EXTENSIONS,
    get_processed_extensions,
    set_processed_extensions,
    ObjectIdentifierSet,
    ObjectIdentifierSet,
    BTreeSet::new()
);
cpr_gets_and_sets!(
    PR_FINAL_VALID_POLICY_TREE,
    get_final_valid_policy_tree,
    set_final_valid_policy_tree,
    FinalValidPolicyTree,
    FinalValidPolicyTree
);
cpr_gets_and_sets!(
    PR_VALIDATION_STATUS,
    get_validation_status,
    set_validation_status,
    PathValidationStatus,
    PathValidationStatus
);
cpr_gets_and_sets!(
    PR_FAILED_CERT_INDEX,
    get_failed_cert_index,
    set_failed_cert_index,
    U8,
    u8
);
cpr_gets_and_sets!(PR_CRL, get_crl, set_crl, ListOfBuffers, ListOfBuffers);
cpr_gets_and_sets!(
    PR_FAILED_CRLS,
    get_failed_crls,
    set_failed_crls,
    ListOfBuffers,
    ListOfBuffers
);

impl CertificationPathResults {
    /// `prepare_revocation_results` takes the number of certificates in a certification path (not
    /// counting the trust anchor) and prepares result variables with appropriate capacity to
    /// receive revocation-related results.
    pub fn prepare_revocation_results(&mut self, num_certs: usize) {
        self.set_crl(vec![vec![]; num_certs]);
        self.set_failed_crls(vec![vec![]; num_certs]);
    }

    /// Adds a CRL that contributed to a revocation status determination for the certificate at the
    /// given position in the path.
    pub fn add_crl(&mut self, crl: &[u8], pos: usize) {
        let mut v: ListOfBuffers = match self.get_crl() {
            Some(v) => v,
            None => return,
        };
        if v.len() > pos {
            v[pos].push(crl.to_vec());
        }
        self.set_crl(v);
    }

    /// Adds a CRL that was considered but did not yield a status determination for the certificate
    /// at the given position in the path.
    pub fn add_failed_crl(&mut self, crl: &[u8], pos: usize) {
        let mut v: ListOfBuffers = match self.get_failed_crls() {
            Some(v) => v,
            None => return,
        };
        if v.len() > pos {
            v[pos].push(crl.to_vec());
        }
        self.set_failed_crls(v);
    }

    /// `add_processed_extension` retrieves (or adds then retrieves) an entry for
    /// [`PR_PROCESSED_EXTENSIONS`] to which the oid is added if not already present.
    pub(crate) fn add_processed_extension(&mut self, oid: ObjectIdentifier) {
        let mut oids = self.get_processed_extensions();
        if !oids.contains(&oid) {
            oids.insert(oid);
            self.set_processed_extensions(oids);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use const_oid::db::rfc5912::ID_CE_BASIC_CONSTRAINTS;

    #[test]
    fn check_prepared_results() {
        let mut cpr = CertificationPathResults::default();
        cpr.prepare_revocation_results(4);
        assert_eq!(4, cpr.get_crl().unwrap().len());
        assert_eq!(4, cpr.get_failed_crls().unwrap().len());

        cpr.add_crl(&[0x30, 0x00], 1);
        assert_eq!(1, cpr.get_crl().unwrap()[1].len());
        cpr.add_failed_crl(&[0x30, 0x00], 5);
        assert!(cpr.get_failed_crls().unwrap().iter().all(|v| v.is_empty()));

        let mut cpr = CertificationPathResults::default();
        cpr.prepare_revocation_results(0);
        assert_eq!(0, cpr.get_crl().unwrap().len());
        assert_eq!(0, cpr.get_failed_crls().unwrap().len());
    }

    #[test]
    fn check_processed_extensions() {
        let mut cpr = CertificationPathResults::default();
        assert!(cpr.get_processed_extensions().is_empty());
        cpr.add_processed_extension(ID_CE_BASIC_CONSTRAINTS);
        cpr.add_processed_extension(ID_CE_BASIC_CONSTRAINTS);
        assert_eq!(1, cpr.get_processed_extensions().len());
    }

    #[test]
    fn check_status_and_index() {
        let mut cpr = CertificationPathResults::default();
        assert_eq!(None, cpr.get_validation_status());
        cpr.set_validation_status(PathValidationStatus::NameChainingFailure);
        assert_eq!(
            Some(PathValidationStatus::NameChainingFailure),
            cpr.get_validation_status()
        );
        cpr.set_failed_cert_index(2);
        assert_eq!(Some(2), cpr.get_failed_cert_index());
    }
}
