//! PkiEnvironment aggregates a set of function pointers and trait objects that supply functionality
//! useful when building and/or validating a certification path or performing other actions that
//! benefit from certification path validation.
//!
//! The sample below illustrates preparation of a PkiEnvironment object for use in
//! building and validating certification paths.
//! ```
//! use certpath::*;
//!
//! let ta_store = TaStore::default();
//! // populate the ta_store.buffers and ta_store.tas fields then index the trust anchors
//! let cert_pool = CertPool::default();
//! // populate the cert_pool.buffers and cert_pool.certs fields then index the certificates
//!
//! // the default PkiEnvironment uses `oid_lookup` to look up friendly names for OIDs
//! let mut pe = PkiEnvironment::default();
//!
//! // add basic hashing, signature verification and path validation capabilities
//! populate_5280_pki_environment(&mut pe);
//!
//! // add ta_store and cert_pool to provide access to trust anchors and intermediate CA
//! // certificates
//! pe.add_trust_anchor_source(&ta_store);
//! pe.add_certificate_source(&cert_pool);
//! pe.add_path_builder(&cert_pool);
//! ```
//!
//! The aggregation of function pointers and trait objects allows for implementations of features to
//! vary. For example, one app may desire path validation without some PKIX features (like
//! certificate policy processing) and another may desire access to trust anchors via a system store
//! (via an FFI implementation) or much smaller sets of trust anchors for selected operations.

use alloc::string::{String, ToString};
use alloc::{vec, vec::Vec};

use der::asn1::ObjectIdentifier;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::crl::CertificateList;
use x509_cert::name::Name;

use crate::PathValidationStatus::RevocationStatusNotDetermined;
use crate::{
    environment::pki_environment_traits::*, util::crypto::*, util::error::*,
    util::name_utils::oid_lookup, validate_path_rfc5280, CertificateSelector, CertificationPath,
    CertificationPathResults, CertificationPathSettings, ObjectIdentifierSet, ParsedCertificate,
    ParsedTrustAnchor,
};

/// [`PkiEnvironment`] provides a switchboard of function pointers and trait objects that allow
/// support to vary on different platforms or to allow support to be tailored for specific use
/// cases.
#[derive(Clone)]
pub struct PkiEnvironment<'a> {
    //--------------------------------------------------------------------------
    //Crypto interfaces
    //--------------------------------------------------------------------------
    /// List of functions that provide a message digest functionality
    calculate_hash_callbacks: Vec<CalculateHash>,

    /// List of functions that provide a signature verification functionality given a digest
    verify_signature_digest_callbacks: Vec<VerifySignatureDigest>,

    /// List of functions that provide a signature verification functionality given a message
    verify_signature_message_callbacks: Vec<VerifySignatureMessage>,

    //--------------------------------------------------------------------------
    //Certification path processing interfaces
    //--------------------------------------------------------------------------
    /// List of functions that provide certification path validation functionality
    validate_path_callbacks: Vec<ValidatePath>,

    /// List of trait objects that provide certification path building functionality
    path_builders: Vec<&'a dyn CertificationPathBuilder>,

    /// List of trait objects that provide supplemental per-certificate checks during validation
    path_checkers: Vec<&'a dyn CertPathChecker>,

    //--------------------------------------------------------------------------
    //Storage and retrieval interfaces
    //--------------------------------------------------------------------------
    /// List of trait objects that provide access to trust anchors
    trust_anchor_sources: Vec<&'a dyn TrustAnchorSource>,

    /// List of trait objects that provide access to certificates
    certificate_sources: Vec<&'a dyn CertificateSource>,

    /// List of trait objects that provide access to CRLs
    crl_sources: Vec<&'a dyn CrlSource>,

    /// List of trait objects that provide revocation status determinations
    revocation_checkers: Vec<&'a dyn RevocationChecker>,

    //--------------------------------------------------------------------------
    //Miscellaneous interfaces
    //--------------------------------------------------------------------------
    /// List of functions that provide OID lookup capabilities
    oid_lookups: Vec<OidLookup>,
}

impl Default for PkiEnvironment<'_> {
    /// PkiEnvironment::default returns a new [`PkiEnvironment`] with empty callback vectors for
    /// each type of callback except `oid_lookups`, which features the [`oid_lookup`] function.
    fn default() -> Self {
        PkiEnvironment {
            calculate_hash_callbacks: vec![],
            verify_signature_digest_callbacks: vec![],
            verify_signature_message_callbacks: vec![],
            validate_path_callbacks: vec![],
            path_builders: vec![],
            path_checkers: vec![],
            trust_anchor_sources: vec![],
            certificate_sources: vec![],
            crl_sources: vec![],
            revocation_checkers: vec![],
            oid_lookups: vec![oid_lookup],
        }
    }
}

impl<'a> PkiEnvironment<'a> {
    /// PkiEnvironment::new returns a new [`PkiEnvironment`] with empty callback vectors for each
    /// type of callback
    pub fn new() -> PkiEnvironment<'a> {
        PkiEnvironment {
            calculate_hash_callbacks: vec![],
            verify_signature_digest_callbacks: vec![],
            verify_signature_message_callbacks: vec![],
            validate_path_callbacks: vec![],
            path_builders: vec![],
            path_checkers: vec![],
            trust_anchor_sources: vec![],
            certificate_sources: vec![],
            crl_sources: vec![],
            revocation_checkers: vec![],
            oid_lookups: vec![],
        }
    }

    /// clear_all_callbacks clears the contents of all function pointer and trait object vectors
    /// associated with an instance of [`PkiEnvironment`].
    pub fn clear_all_callbacks(&mut self) {
        self.clear_calculate_hash_callbacks();
        self.clear_verify_signature_digest_callbacks();
        self.clear_verify_signature_message_callbacks();
        self.clear_validate_path_callbacks();
        self.clear_path_builders();
        self.clear_path_checkers();
        self.clear_trust_anchor_sources();
        self.clear_certificate_sources();
        self.clear_crl_sources();
        self.clear_revocation_checkers();
        self.clear_oid_lookups();
    }

    /// add_validate_path_callback adds a [`ValidatePath`] callback to the list used by
    /// validate_path.
    pub fn add_validate_path_callback(&mut self, c: ValidatePath) {
        self.validate_path_callbacks.push(c);
    }

    /// clear_validate_path_callbacks clears the list of [`ValidatePath`] callbacks used by
    /// validate_path.
    pub fn clear_validate_path_callbacks(&mut self) {
        self.validate_path_callbacks.clear();
    }

    /// validate_path iterates over validate_path_callbacks until an authoritative answer is found
    /// or all options have been exhausted
    pub fn validate_path(
        &self,
        pe: &PkiEnvironment<'_>,
        cps: &CertificationPathSettings,
        cp: &mut CertificationPath,
        cpr: &mut CertificationPathResults,
    ) -> Result<()> {
        let mut err = None;
        for f in &self.validate_path_callbacks {
            match f(pe, cps, cp, cpr) {
                Ok(r) => {
                    return Ok(r);
                }
                Err(e) => {
                    err = Some(e);
                }
            }
        }
        if let Some(e) = err {
            return Err(e);
        }
        Err(Error::Unrecognized)
    }

    /// add_calculate_hash_callback adds a [`CalculateHash`] callback to the list used by
    /// calculate_hash.
    pub fn add_calculate_hash_callback(&mut self, c: CalculateHash) {
        self.calculate_hash_callbacks.push(c);
    }

    /// clear_calculate_hash_callbacks clears the list of [`CalculateHash`] callbacks used by
    /// calculate_hash.
    pub fn clear_calculate_hash_callbacks(&mut self) {
        self.calculate_hash_callbacks.clear();
    }

    /// calculate_hash iterates over calculate_hash_callbacks until an authoritative answer is found
    /// or all options have been exhausted
    pub fn calculate_hash(
        &self,
        pe: &PkiEnvironment<'_>,
        hash_alg: &AlgorithmIdentifierOwned,
        buffer_to_hash: &[u8],
    ) -> Result<Vec<u8>> {
        for f in &self.calculate_hash_callbacks {
            let r = f(pe, hash_alg, buffer_to_hash);
            if let Ok(r) = r {
                return Ok(r);
            }
        }
        Err(Error::Unrecognized)
    }

    /// add_verify_signature_digest_callback adds a [`VerifySignatureDigest`] callback to the list
    /// used by verify_signature_digest.
    pub fn add_verify_signature_digest_callback(&mut self, c: VerifySignatureDigest) {
        self.verify_signature_digest_callbacks.push(c);
    }

    /// clear_verify_signature_digest_callbacks clears the list of [`VerifySignatureDigest`]
    /// callbacks used by verify_signature_digest.
    pub fn clear_verify_signature_digest_callbacks(&mut self) {
        self.verify_signature_digest_callbacks.clear();
    }

    /// verify_signature_digest iterates over verify_signature_digest_callbacks until an
    /// authoritative answer is found or all options have been exhausted
    pub fn verify_signature_digest(
        &self,
        pe: &PkiEnvironment<'_>,
        hash_to_verify: &[u8],                    // buffer to verify
        signature: &[u8],                         // signature
        signature_alg: &AlgorithmIdentifierOwned, // signature algorithm
        spki: &SubjectPublicKeyInfoOwned,         // public key
    ) -> Result<()> {
        for f in &self.verify_signature_digest_callbacks {
            let r = f(pe, hash_to_verify, signature, signature_alg, spki);
            if let Ok(r) = r {
                return Ok(r);
            }
        }
        Err(Error::Unrecognized)
    }

    /// add_verify_signature_message_callback adds a [`VerifySignatureMessage`] callback to the list
    /// used by verify_signature_message.
    pub fn add_verify_signature_message_callback(&mut self, c: VerifySignatureMessage) {
        self.verify_signature_message_callbacks.push(c);
    }

    /// clear_verify_signature_message_callbacks clears the list of [`VerifySignatureMessage`]
    /// callbacks used by verify_signature_message.
    pub fn clear_verify_signature_message_callbacks(&mut self) {
        self.verify_signature_message_callbacks.clear();
    }

    /// verify_signature_message iterates over verify_signature_message_callbacks until an
    /// authoritative answer is found or all options have been exhausted
    pub fn verify_signature_message(
        &self,
        pe: &PkiEnvironment<'_>,
        message_to_verify: &[u8],                 // buffer to verify
        signature: &[u8],                         // signature
        signature_alg: &AlgorithmIdentifierOwned, // signature algorithm
        spki: &SubjectPublicKeyInfoOwned,         // public key
    ) -> Result<()> {
        for f in &self.verify_signature_message_callbacks {
            let r = f(pe, message_to_verify, signature, signature_alg, spki);
            if let Ok(r) = r {
                return Ok(r);
            }
        }
        Err(Error::Unrecognized)
    }

    /// add_trust_anchor_source adds a [`TrustAnchorSource`] object to the list used when searching
    /// for trust anchors.
    pub fn add_trust_anchor_source(&mut self, c: &'a dyn TrustAnchorSource) {
        self.trust_anchor_sources.push(c);
    }

    /// clear_trust_anchor_sources clears the list of [`TrustAnchorSource`] objects used when
    /// searching for trust anchors.
    pub fn clear_trust_anchor_sources(&mut self) {
        self.trust_anchor_sources.clear();
    }

    /// get_trust_anchor iterates over trust_anchor_sources until a trust anchor with the given
    /// SKID is found or all options have been exhausted
    pub fn get_trust_anchor(&self, skid: &[u8]) -> Result<&ParsedTrustAnchor> {
        for f in &self.trust_anchor_sources {
            let r = f.get_trust_anchor_by_skid(skid);
            if let Ok(r) = r {
                return Ok(r);
            }
        }
        Err(Error::Unrecognized)
    }

    /// get_trust_anchors aggregates the trust anchors available from all trust_anchor_sources
    pub fn get_trust_anchors(&self) -> Result<Vec<&ParsedTrustAnchor>> {
        let mut retval = vec![];
        for f in &self.trust_anchor_sources {
            if let Ok(tas) = f.get_trust_anchors() {
                for ta in tas {
                    retval.push(ta);
                }
            }
        }
        Ok(retval)
    }

    /// get_trust_anchor_by_hex_skid returns a reference to a trust anchor corresponding to the
    /// presented hexadecimal SKID.
    pub fn get_trust_anchor_by_hex_skid(&'_ self, hex_skid: &str) -> Result<&ParsedTrustAnchor> {
        for f in &self.trust_anchor_sources {
            let r = f.get_trust_anchor_by_hex_skid(hex_skid);
            if let Ok(r) = r {
                return Ok(r);
            }
        }
        Err(Error::Unrecognized)
    }

    /// get_trust_anchor_by_name returns a reference to a trust anchor corresponding to the
    /// presented name.
    pub fn get_trust_anchor_by_name(&'_ self, name: &'_ Name) -> Result<&ParsedTrustAnchor> {
        for f in &self.trust_anchor_sources {
            let r = f.get_trust_anchor_by_name(name);
            if let Ok(r) = r {
                return Ok(r);
            }
        }
        Err(Error::Unrecognized)
    }

    /// get_trust_anchor_for_target takes a target certificate and returns a trust anchor that may
    /// be useful in verifying the certificate.
    pub fn get_trust_anchor_for_target(
        &'_ self,
        target: &'_ ParsedCertificate,
    ) -> Result<&ParsedTrustAnchor> {
        for f in &self.trust_anchor_sources {
            let r = f.get_trust_anchor_for_target(target);
            if let Ok(r) = r {
                return Ok(r);
            }
        }
        Err(Error::Unrecognized)
    }

    /// is_cert_a_trust_anchor takes a target certificate and returns Ok if any source recognizes
    /// the certificate as a trust anchor.
    pub fn is_cert_a_trust_anchor(&'_ self, target: &'_ ParsedCertificate) -> Result<()> {
        for f in &self.trust_anchor_sources {
            if f.is_cert_a_trust_anchor(target).is_ok() {
                return Ok(());
            }
        }
        Err(Error::NotFound)
    }

    /// is_trust_anchor takes a [`ParsedTrustAnchor`] and returns Ok if any source recognizes the
    /// object as a trust anchor.
    pub fn is_trust_anchor(&'_ self, target: &'_ ParsedTrustAnchor) -> Result<()> {
        for f in &self.trust_anchor_sources {
            if f.is_trust_anchor(target).is_ok() {
                return Ok(());
            }
        }
        Err(Error::NotFound)
    }

    /// add_certificate_source adds a [`CertificateSource`] object to the list.
    pub fn add_certificate_source(&mut self, c: &'a dyn CertificateSource) {
        self.certificate_sources.push(c);
    }

    /// clear_certificate_sources clears the list of [`CertificateSource`] objects.
    pub fn clear_certificate_sources(&mut self) {
        self.certificate_sources.clear();
    }

    /// get_certificates_for_skid aggregates certificates with the given SKID from all
    /// certificate_sources
    pub fn get_certificates_for_skid(&self, skid: &[u8]) -> Result<Vec<&ParsedCertificate>> {
        let mut retval = vec![];
        for f in &self.certificate_sources {
            if let Ok(certs) = f.get_certificates_for_skid(skid) {
                for cert in certs {
                    retval.push(cert);
                }
            }
        }
        if !retval.is_empty() {
            return Ok(retval);
        }
        Err(Error::NotFound)
    }

    /// get_certificates_for_name aggregates certificates with the given subject name from all
    /// certificate_sources
    pub fn get_certificates_for_name(&self, name: &Name) -> Result<Vec<&ParsedCertificate>> {
        let mut retval = vec![];
        for f in &self.certificate_sources {
            if let Ok(certs) = f.get_certificates_for_name(name) {
                for cert in certs {
                    retval.push(cert);
                }
            }
        }
        if !retval.is_empty() {
            return Ok(retval);
        }
        Err(Error::NotFound)
    }

    /// get_certificates_matching aggregates certificates that satisfy the given selector from all
    /// certificate_sources
    pub fn get_certificates_matching(
        &self,
        selector: &CertificateSelector,
    ) -> Result<Vec<&ParsedCertificate>> {
        let mut retval = vec![];
        for f in &self.certificate_sources {
            if let Ok(certs) = f.get_certificates_matching(selector) {
                for cert in certs {
                    retval.push(cert);
                }
            }
        }
        Ok(retval)
    }

    /// add_path_builder adds a [`CertificationPathBuilder`] object to the list used by
    /// get_paths_for_target.
    pub fn add_path_builder(&mut self, c: &'a dyn CertificationPathBuilder) {
        self.path_builders.push(c);
    }

    /// clear_path_builders clears the list of [`CertificationPathBuilder`] objects used by
    /// get_paths_for_target.
    pub fn clear_path_builders(&mut self) {
        self.path_builders.clear();
    }

    /// get_paths_for_target takes a target certificate and returns a vector of
    /// [`CertificationPath`] objects, iterating over path_builders until an authoritative answer is
    /// found or all options have been exhausted.
    pub fn get_paths_for_target(
        &self,
        pe: &PkiEnvironment<'_>,
        target: &ParsedCertificate,
        paths: &mut Vec<CertificationPath>,
        threshold: usize,
        time_of_interest: u64,
    ) -> Result<()> {
        for f in &self.path_builders {
            let r = f.get_paths_for_target(pe, target, paths, threshold, time_of_interest);
            if let Ok(r) = r {
                return Ok(r);
            }
        }
        Err(Error::Unrecognized)
    }

    /// add_path_checker adds a [`CertPathChecker`] object to the list consulted by check_cert.
    pub fn add_path_checker(&mut self, c: &'a dyn CertPathChecker) {
        self.path_checkers.push(c);
    }

    /// clear_path_checkers clears the list of [`CertPathChecker`] objects consulted by check_cert.
    pub fn clear_path_checkers(&mut self) {
        self.path_checkers.clear();
    }

    /// path_checker_supported_extensions returns the union of the extension OIDs supported by the
    /// available [`CertPathChecker`] objects.
    pub fn path_checker_supported_extensions(&self) -> ObjectIdentifierSet {
        let mut retval = ObjectIdentifierSet::new();
        for f in &self.path_checkers {
            for oid in f.supported_extensions() {
                retval.insert(oid);
            }
        }
        retval
    }

    /// check_cert runs all available [`CertPathChecker`] objects against the given certificate,
    /// returning the first failure observed, if any. Checkers remove extension OIDs they process
    /// from unresolved_criticals.
    pub fn check_cert(
        &self,
        pe: &PkiEnvironment<'_>,
        cert: &ParsedCertificate,
        pos: usize,
        unresolved_criticals: &mut ObjectIdentifierSet,
    ) -> Result<()> {
        for f in &self.path_checkers {
            f.check(pe, cert, pos, unresolved_criticals)?;
        }
        Ok(())
    }

    /// add_crl_source adds a [`CrlSource`] object to the list.
    pub fn add_crl_source(&mut self, c: &'a dyn CrlSource) {
        self.crl_sources.push(c);
    }

    /// clear_crl_sources clears the list of [`CrlSource`] objects.
    pub fn clear_crl_sources(&mut self) {
        self.crl_sources.clear();
    }

    /// Retrieves CRLs for given certificate from the available stores
    pub fn get_crls(&self, cert: &ParsedCertificate) -> Result<Vec<Vec<u8>>> {
        let mut retval = vec![];
        for f in &self.crl_sources {
            if let Ok(crls) = f.get_crls(cert) {
                for crl in crls {
                    retval.push(crl);
                }
            }
        }
        if !retval.is_empty() {
            return Ok(retval);
        }
        Err(Error::NotFound)
    }

    /// Adds a CRL to the available stores
    pub fn add_crl(&self, crl_buf: &[u8], crl: &CertificateList) -> Result<()> {
        let mut at_least_one_success = false;
        for f in &self.crl_sources {
            if f.add_crl(crl_buf, crl).is_ok() {
                at_least_one_success = true;
            }
        }
        if at_least_one_success {
            return Ok(());
        }
        Err(Error::NotFound)
    }

    /// add_revocation_checker adds a [`RevocationChecker`] object to the list consulted by
    /// determine_revocation_status.
    pub fn add_revocation_checker(&mut self, c: &'a dyn RevocationChecker) {
        self.revocation_checkers.push(c);
    }

    /// clear_revocation_checkers clears the list of [`RevocationChecker`] objects consulted by
    /// determine_revocation_status.
    pub fn clear_revocation_checkers(&mut self) {
        self.revocation_checkers.clear();
    }

    /// determine_revocation_status iterates over revocation_checkers until a definitive status is
    /// returned, i.e., Valid or Revoked, or all options have been exhausted, in which case
    /// RevocationStatusNotDetermined is returned.
    pub fn determine_revocation_status(
        &self,
        pe: &PkiEnvironment<'_>,
        cps: &CertificationPathSettings,
        cert: &ParsedCertificate,
        issuer_spki: &SubjectPublicKeyInfoOwned,
    ) -> PathValidationStatus {
        for f in &self.revocation_checkers {
            let status = f.determine_revocation_status(pe, cps, cert, issuer_spki);
            if RevocationStatusNotDetermined != status {
                return status;
            }
        }
        RevocationStatusNotDetermined
    }

    /// add_oid_lookup adds an [`OidLookup`] callback to the list used by oid_lookup.
    pub fn add_oid_lookup(&mut self, c: OidLookup) {
        self.oid_lookups.push(c);
    }

    /// clear_oid_lookups clears the list of [`OidLookup`] callbacks used by oid_lookup.
    pub fn clear_oid_lookups(&mut self) {
        self.oid_lookups.clear();
    }

    /// oid_lookup takes an [`ObjectIdentifier`] and returns either a friendly name for the OID or
    /// the OID represented in dot notation.
    pub fn oid_lookup(&self, oid: &ObjectIdentifier) -> String {
        for f in &self.oid_lookups {
            let r = f(oid);
            if let Ok(r) = r {
                return r;
            }
        }
        oid.to_string()
    }
}

/// `populate_5280_pki_environment` populates a [`PkiEnvironment`] instance with a default set of
/// callback functions.
///
/// The following callbacks are added:
/// - [`validate_path_rfc5280`]
/// - [`calculate_hash_rust_crypto`]
/// - [`verify_signature_digest_rust_crypto`]
/// - [`verify_signature_message_rust_crypto`]
///
/// This function assumes that [`oid_lookup`] is either present due to [`PkiEnvironment::default`]
/// creation or that it has been deliberately removed or replaced by the caller but will add
/// oid_lookup if OID lookup support is absent.
pub fn populate_5280_pki_environment(pe: &mut PkiEnvironment<'_>) {
    pe.add_validate_path_callback(validate_path_rfc5280);
    pe.add_calculate_hash_callback(calculate_hash_rust_crypto);
    pe.add_verify_signature_digest_callback(verify_signature_digest_rust_crypto);
    pe.add_verify_signature_message_callback(verify_signature_message_rust_crypto);
    if pe.oid_lookups.is_empty() {
        pe.add_oid_lookup(oid_lookup);
    }
}
