//! Error types

use core::fmt;
use serde::{Deserialize, Serialize};

/// Result type
pub type Result<T> = core::result::Result<T, Error>;

/// Status values describing the outcome of certification path building and validation operations
#[derive(Copy, Clone, Debug, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PathValidationStatus {
    /// No errors were encountered while processing the certification path
    Valid,
    /// NameChainingFailure occurs when the issuer name of a certificate does not match the subject
    /// name of the superior certificate or trust anchor in a certification path.
    NameChainingFailure,
    /// SignatureVerificationFailure occurs when the public key of a superior certificate or trust
    /// anchor does not verify the signature of the immediately subordinate certificate.
    SignatureVerificationFailure,
    /// InvalidNotBeforeDate occurs when a certification path features a certificate that contains a
    /// notBefore date that is after the time of interest used for the operation.
    InvalidNotBeforeDate,
    /// InvalidNotAfterDate occurs when a certification path features a certificate that contains a
    /// notAfter date that is before the time of interest used for the operation.
    InvalidNotAfterDate,
    /// MissingBasicConstraints occurs when an intermediate CA certificate does not contain a
    /// basicConstraints extension.
    MissingBasicConstraints,
    /// InvalidBasicConstraints occurs when an intermediate CA certificate contains a
    /// basicConstraints extension with the cA field set to false.
    InvalidBasicConstraints,
    /// InvalidPathLength occurs when a certification path has more certificates than allowed by
    /// either the maximum path length setting or a pathLenConstraint asserted by an intermediate
    /// CA certificate in the path.
    InvalidPathLength,
    /// InvalidKeyUsage occurs when an intermediate CA certificate features a keyUsage extension
    /// that lacks keyCertSign or when a target certificate does not include the bits required by
    /// the key usage setting.
    InvalidKeyUsage,
    /// InvalidExtendedKeyUsage occurs when the extended key usage setting is not satisfied by the
    /// certificates in the path.
    InvalidExtendedKeyUsage,
    /// NullPolicySet occurs when the valid_policy_tree becomes NULL while requireExplicitPolicy is
    /// operative.
    NullPolicySet,
    /// CertificatePoliciesViolation occurs when a critical certificatePolicies extension carries
    /// policy qualifiers and the reject policy qualifiers setting is operative.
    CertificatePoliciesViolation,
    /// NameConstraintsViolation occurs when a subject name or subject alternative name falls
    /// outside the operative permitted subtrees or inside the operative excluded subtrees.
    NameConstraintsViolation,
    /// UnprocessedCriticalExtension occurs when a certificate features a critical extension that
    /// was not processed during certification path validation.
    UnprocessedCriticalExtension,
    /// MissingTrustAnchor occurs when a certification path has no trust anchor.
    MissingTrustAnchor,
    /// MissingTrustAnchorName occurs when a trust anchor object does not provide a subject name.
    MissingTrustAnchorName,
    /// EncodingError occurs when an object cannot be parsed (though this is more likely to
    /// manifest as an Asn1Error).
    EncodingError,
    /// MissingCertificate occurs when a certification path is missing a target certificate.
    MissingCertificate,
    /// NoPathsFound occurs when the certification path builder fails to find any candidate paths
    /// for a target.
    NoPathsFound,
    /// CertificateNotFound occurs when no certificate matching a selector is available to serve as
    /// the target of a path building operation.
    CertificateNotFound,
    /// PathTooLong occurs when a path building branch exceeds the maximum path length and is
    /// abandoned.
    PathTooLong,
    /// LoopDetected occurs when a path building branch would revisit a public key already present
    /// in the partial path and is abandoned.
    LoopDetected,
    /// CertificateRevoked occurs when a certification path contains a certificate that has been
    /// revoked.
    CertificateRevoked,
    /// RevocationStatusNotDetermined occurs when a certification path contains a certificate for
    /// which revocation status could not be determined.
    RevocationStatusNotDetermined,
    /// A configuration error was detected, i.e., an empty trust anchor set or a malformed selector
    /// value. See textual log output for more details.
    Misconfiguration,
}

/// Error type
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Error {
    /// PathValidation conveys a [`PathValidationStatus`] observed while building or validating a
    /// certification path.
    PathValidation(PathValidationStatus),
    /// NotFound occurs when an action failed because a necessary artifact was not found.
    NotFound,
    /// Unrecognized occurs when input is syntactically well-formed but not supported, i.e., an
    /// unsupported signature algorithm.
    Unrecognized,
    /// An artifact did not conform to length requirements
    LengthError,
    /// An artifact could not be parsed
    ParseError,
    /// SourceUnavailable occurs when a certificate, CRL or revocation status source failed in a
    /// manner that is distinct from a definitive determination, i.e., an I/O failure within a
    /// collaborator.
    SourceUnavailable,
    /// CrlIncompatible occurs when a CRL cannot be used to determine the revocation status of a
    /// given certificate, i.e., due to scope, coverage, distribution point or authority mismatch.
    CrlIncompatible,
    /// Asn1Error is used to propagate error information from the der crate.
    Asn1Error(der::Error),
    /// Error encapsulates an error derived from [std::io::ErrorKind]
    #[cfg(feature = "std")]
    StdIoError(std::io::ErrorKind),
}

impl From<der::Error> for Error {
    fn from(err: der::Error) -> Error {
        Error::Asn1Error(err)
    }
}

impl fmt::Display for PathValidationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathValidationStatus::Valid => write!(f, "Valid"),
            PathValidationStatus::NameChainingFailure => write!(f, "Name chaining failure"),
            PathValidationStatus::SignatureVerificationFailure => {
                write!(f, "Signature verification failure")
            }
            PathValidationStatus::InvalidNotBeforeDate => write!(f, "InvalidNotBeforeDate"),
            PathValidationStatus::InvalidNotAfterDate => write!(f, "InvalidNotAfterDate"),
            PathValidationStatus::MissingBasicConstraints => write!(f, "MissingBasicConstraints"),
            PathValidationStatus::InvalidBasicConstraints => write!(f, "InvalidBasicConstraints"),
            PathValidationStatus::InvalidPathLength => write!(f, "InvalidPathLength"),
            PathValidationStatus::InvalidKeyUsage => write!(f, "InvalidKeyUsage"),
            PathValidationStatus::InvalidExtendedKeyUsage => write!(f, "InvalidExtendedKeyUsage"),
            PathValidationStatus::NullPolicySet => write!(f, "NullPolicySet"),
            PathValidationStatus::CertificatePoliciesViolation => {
                write!(f, "CertificatePoliciesViolation")
            }
            PathValidationStatus::NameConstraintsViolation => write!(f, "NameConstraintsViolation"),
            PathValidationStatus::UnprocessedCriticalExtension => {
                write!(f, "UnprocessedCriticalExtension")
            }
            PathValidationStatus::MissingTrustAnchor => write!(f, "MissingTrustAnchor"),
            PathValidationStatus::MissingTrustAnchorName => write!(f, "MissingTrustAnchorName"),
            PathValidationStatus::EncodingError => write!(f, "EncodingError"),
            PathValidationStatus::MissingCertificate => write!(f, "MissingCertificate"),
            PathValidationStatus::NoPathsFound => write!(f, "NoPathsFound"),
            PathValidationStatus::CertificateNotFound => write!(f, "CertificateNotFound"),
            PathValidationStatus::PathTooLong => write!(f, "PathTooLong"),
            PathValidationStatus::LoopDetected => write!(f, "LoopDetected"),
            PathValidationStatus::CertificateRevoked => write!(f, "CertificateRevoked"),
            PathValidationStatus::RevocationStatusNotDetermined => {
                write!(f, "RevocationStatusNotDetermined")
            }
            PathValidationStatus::Misconfiguration => write!(f, "Misconfiguration"),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::PathValidation(err) => write!(f, "PathValidationError: {}", err),
            Error::NotFound => write!(f, "NotFound"),
            Error::Unrecognized => write!(f, "Unrecognized"),
            Error::LengthError => write!(f, "LengthError"),
            Error::ParseError => write!(f, "ParseError"),
            Error::SourceUnavailable => write!(f, "SourceUnavailable"),
            Error::CrlIncompatible => write!(f, "CrlIncompatible"),
            Error::Asn1Error(err) => write!(f, "Asn1Error: {}", err),
            #[cfg(feature = "std")]
            Error::StdIoError(err) => write!(f, "StdError: {:?}", err),
        }
    }
}

#[test]
fn error_test() {
    use alloc::format;

    let _s = format!("{}", PathValidationStatus::Valid);
    let _s = format!("{}", PathValidationStatus::NameChainingFailure);
    let _s = format!("{}", PathValidationStatus::SignatureVerificationFailure);
    let _s = format!("{}", PathValidationStatus::InvalidNotBeforeDate);
    let _s = format!("{}", PathValidationStatus::InvalidNotAfterDate);
    let _s = format!("{}", PathValidationStatus::MissingBasicConstraints);
    let _s = format!("{}", PathValidationStatus::InvalidBasicConstraints);
    let _s = format!("{}", PathValidationStatus::InvalidPathLength);
    let _s = format!("{}", PathValidationStatus::InvalidKeyUsage);
    let _s = format!("{}", PathValidationStatus::InvalidExtendedKeyUsage);
    let _s = format!("{}", PathValidationStatus::NullPolicySet);
    let _s = format!("{}", PathValidationStatus::CertificatePoliciesViolation);
    let _s = format!("{}", PathValidationStatus::NameConstraintsViolation);
    let _s = format!("{}", PathValidationStatus::UnprocessedCriticalExtension);
    let _s = format!("{}", PathValidationStatus::MissingTrustAnchor);
    let _s = format!("{}", PathValidationStatus::MissingTrustAnchorName);
    let _s = format!("{}", PathValidationStatus::EncodingError);
    let _s = format!("{}", PathValidationStatus::MissingCertificate);
    let _s = format!("{}", PathValidationStatus::NoPathsFound);
    let _s = format!("{}", PathValidationStatus::CertificateNotFound);
    let _s = format!("{}", PathValidationStatus::PathTooLong);
    let _s = format!("{}", PathValidationStatus::LoopDetected);
    let _s = format!("{}", PathValidationStatus::CertificateRevoked);
    let _s = format!("{}", PathValidationStatus::RevocationStatusNotDetermined);
    let _s = format!("{}", PathValidationStatus::Misconfiguration);

    let _s = format!(
        "{}",
        Error::PathValidation(PathValidationStatus::NoPathsFound)
    );
    let _s = format!("{}", Error::NotFound);
    let _s = format!("{}", Error::Unrecognized);
    let _s = format!("{}", Error::LengthError);
    let _s = format!("{}", Error::ParseError);
    let _s = format!("{}", Error::SourceUnavailable);
    let _s = format!("{}", Error::CrlIncompatible);
}
