//! Structure representing a certification path, i.e., a target certificate, zero or more
//! intermediate CA certificates and a trust anchor.

use crate::{CertificateChain, ParsedCertificate, ParsedTrustAnchor};

/// [`CertificationPath`] aggregates the trust anchor, intermediate CA certificates and target
/// certificate that comprise a certification path.
///
/// The fields are read-only once a path has been instantiated.
#[derive(Clone)]
#[readonly::make]
pub struct CertificationPath {
    /// `target` contains the target certificate for the certification path
    #[readonly]
    pub target: ParsedCertificate,
    /// `intermediates` contains zero or more intermediate CA certificates ordered from the
    /// certificate issued by `trust_anchor` towards the certificate that issued `target`, i.e.,
    /// `intermediates\[0\]` can be used to verify `intermediates\[1\]` and so on until
    /// `intermediates[intermediates.len() - 1]` can be used to verify `target`.
    #[readonly]
    pub intermediates: CertificateChain,
    /// `trust_anchor` contains the trust anchor for the certification path
    #[readonly]
    pub trust_anchor: ParsedTrustAnchor,
}

impl CertificationPath {
    /// instantiates a new CertificationPath
    pub fn new(
        trust_anchor: ParsedTrustAnchor,
        intermediates: CertificateChain,
        target: ParsedCertificate,
    ) -> CertificationPath {
        CertificationPath {
            trust_anchor,
            intermediates,
            target,
        }
    }
}
