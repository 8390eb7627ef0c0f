//! The pki_environment_traits module features trait definitions and type definitions that are used
//! by [`PkiEnvironment`] to provide functionality that supports building and/or validating X.509
//! certification paths.

use alloc::{string::String, vec::Vec};

use der::asn1::ObjectIdentifier;
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::crl::CertificateList;
use x509_cert::name::Name;

use crate::util::error::*;
use crate::{
    CertificateSelector, CertificationPath, CertificationPathResults, CertificationPathSettings,
    ObjectIdentifierSet, ParsedCertificate, ParsedTrustAnchor, PkiEnvironment,
};

/// `ValidatePath` provides a function signature for implementations that perform certification path
/// validation or that provide functionality in support of certification path validation.
pub type ValidatePath = fn(
    &PkiEnvironment<'_>,
    &CertificationPathSettings,    // path settings to govern validation
    &mut CertificationPath,        // path to verify
    &mut CertificationPathResults, // path validation results
) -> Result<()>;

/// `CalculateHash` provides a function signature for implementations that perform hashing
pub type CalculateHash = fn(
    &PkiEnvironment<'_>,
    &AlgorithmIdentifierOwned, // hash alg
    &[u8],                     // buffer to hash
) -> Result<Vec<u8>>;

/// `VerifySignatureDigest` provides a function signature for implementations that perform signature
/// verification over a message digest.
pub type VerifySignatureDigest = fn(
    &PkiEnvironment<'_>,
    &[u8],                      // buffer to verify
    &[u8],                      // signature
    &AlgorithmIdentifierOwned,  // signature algorithm
    &SubjectPublicKeyInfoOwned, // public key
) -> Result<()>;

/// `VerifySignatureMessage` provides a function signature for implementations that perform signature
/// verification over a message.
pub type VerifySignatureMessage = fn(
    &PkiEnvironment<'_>,
    &[u8],                      // message to hash and verify
    &[u8],                      // signature
    &AlgorithmIdentifierOwned,  // signature algorithm
    &SubjectPublicKeyInfoOwned, // public key
) -> Result<()>;

/// `OidLookup` implementations take an OID and returns either a friendly name for the OID or a
/// NotFound error. Where NotFound is returned by all OidLookup implementations, the
/// [`PkiEnvironment`] returns a dot notation version of the OID.
pub type OidLookup = fn(&ObjectIdentifier) -> Result<String>;

/// The [`TrustAnchorSource`] trait enables trait objects to provide access to trust anchors backed
/// via some means, i.e., hard-coded, byte-buffer-based, system store accessed via FFI, etc.
pub trait TrustAnchorSource {
    /// get_trust_anchors returns a vector with references to available trust anchors.
    fn get_trust_anchors(&'_ self) -> Result<Vec<&ParsedTrustAnchor>>;

    /// get_trust_anchor_by_skid returns a reference to a trust anchor corresponding to the
    /// presented SKID.
    fn get_trust_anchor_by_skid(&self, skid: &[u8]) -> Result<&ParsedTrustAnchor>;

    /// get_trust_anchor_by_hex_skid returns a reference to a trust anchor corresponding to the
    /// presented hexadecimal SKID.
    fn get_trust_anchor_by_hex_skid(&'_ self, hex_skid: &str) -> Result<&ParsedTrustAnchor>;

    /// get_trust_anchor_by_name returns a reference to a trust anchor corresponding to the
    /// presented name.
    fn get_trust_anchor_by_name(&'_ self, target: &'_ Name) -> Result<&ParsedTrustAnchor>;

    /// get_trust_anchor_for_target returns a reference to a trust anchor corresponding to the AKID
    /// or issuer name from the presented target.
    fn get_trust_anchor_for_target(
        &'_ self,
        target: &'_ ParsedCertificate,
    ) -> Result<&ParsedTrustAnchor>;

    /// get_encoded_trust_anchor returns a copy of the encoded buffer for the trust anchor
    /// corresponding to the given SKID.
    fn get_encoded_trust_anchor(&self, skid: &[u8]) -> Result<Vec<u8>>;

    /// get_encoded_trust_anchors returns a vector containing copies of the available encoded trust
    /// anchors.
    fn get_encoded_trust_anchors(&self) -> Result<Vec<Vec<u8>>>;

    /// is_trust_anchor returns Ok if the presented trust anchor object is a recognized trust anchor.
    fn is_trust_anchor(&self, ta: &ParsedTrustAnchor) -> Result<()>;

    /// is_cert_a_trust_anchor returns Ok if the presented certificate object is a recognized trust
    /// anchor.
    fn is_cert_a_trust_anchor(&self, cert: &ParsedCertificate) -> Result<()>;
}

/// The [`CertificateSource`] trait enables trait objects to provide access to certificates backed
/// via some means, i.e., hard-coded, byte-buffer-based, system store accessed via FFI, etc.
pub trait CertificateSource {
    /// get_certificates returns a vector with references to available certificates.
    fn get_certificates(&'_ self) -> Result<Vec<&ParsedCertificate>>;

    /// get_certificates_for_skid returns a vector of references to certificates corresponding to
    /// the presented SKID.
    fn get_certificates_for_skid(&self, skid: &[u8]) -> Result<Vec<&ParsedCertificate>>;

    /// get_certificates_for_name returns a vector of references to certificates corresponding to
    /// the presented subject name.
    fn get_certificates_for_name(&self, name: &Name) -> Result<Vec<&ParsedCertificate>>;

    /// get_certificates_matching returns a vector of references to certificates that satisfy the
    /// presented selector.
    fn get_certificates_matching(
        &self,
        selector: &CertificateSelector,
    ) -> Result<Vec<&ParsedCertificate>>;

    /// get_encoded_certificates returns a vector containing copies of the available encoded
    /// certificates.
    fn get_encoded_certificates(&self) -> Result<Vec<Vec<u8>>>;
}

/// The `CertificationPathBuilderFormats` enum is used to support possible future support for
/// alternative formats when serializing partial certification paths. At present, only CBOR is
/// supported.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum CertificationPathBuilderFormats {
    /// Serialize using CBOR format
    Cbor,
}

/// The [`CertificationPathBuilder`] trait defines the interface for implementations that support
/// building certification paths.
pub trait CertificationPathBuilder {
    /// get_paths_for_target takes a target certificate and returns a vector of
    /// [`CertificationPath`] objects, with no more than threshold paths returned and with
    /// certificates that are not valid at the indicated time of interest omitted from the results.
    /// A time of interest set to zero disables validity period filtering.
    fn get_paths_for_target(
        &self,
        pe: &PkiEnvironment<'_>,
        target: &ParsedCertificate,
        paths: &mut Vec<CertificationPath>,
        threshold: usize,
        time_of_interest: u64,
    ) -> Result<()>;
}

/// The [`CrlSource`] trait defines the interface for storing and retrieving CRLs in support of
/// certification path validation.
pub trait CrlSource {
    /// Retrieves CRLs for given certificate from the store.
    fn get_crls(&self, cert: &ParsedCertificate) -> Result<Vec<Vec<u8>>>;

    /// Adds a CRL to the store.
    fn add_crl(&self, crl_buf: &[u8], crl: &CertificateList) -> Result<()>;
}

/// The [`RevocationChecker`] trait defines the interface for implementations that determine the
/// revocation status of a certificate, i.e., by consulting stored CRLs.
pub trait RevocationChecker {
    /// determine_revocation_status returns Valid if the certificate is known to be not revoked at
    /// the time of interest indicated in the settings, Revoked if the certificate is known to be
    /// revoked and RevocationStatusNotDetermined when no determination can be made. The issuer's
    /// public key is supplied so implementations can verify signatures on revocation artifacts.
    fn determine_revocation_status(
        &self,
        pe: &PkiEnvironment<'_>,
        cps: &CertificationPathSettings,
        cert: &ParsedCertificate,
        issuer_spki: &SubjectPublicKeyInfoOwned,
    ) -> PathValidationStatus;
}

/// The [`CertPathChecker`] trait enables callers to supply additional per-certificate checks that
/// are run as part of certification path validation, i.e., to process custom critical extensions
/// that would otherwise cause validation to fail.
pub trait CertPathChecker {
    /// supported_extensions returns the extension OIDs this checker is able to process.
    fn supported_extensions(&self) -> Vec<ObjectIdentifier>;

    /// check is invoked once per certificate as validation proceeds from the certificate issued by
    /// the trust anchor towards the target, with pos conveying the index of the certificate within
    /// that sequence. Implementations remove OIDs they process from unresolved_criticals. An Err
    /// return causes validation of the path to fail.
    fn check(
        &self,
        pe: &PkiEnvironment<'_>,
        cert: &ParsedCertificate,
        pos: usize,
        unresolved_criticals: &mut ObjectIdentifierSet,
    ) -> Result<()>;
}
