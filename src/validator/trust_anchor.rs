//! Wrappers around asn.1 encoder/decoder structures to support use of trust anchors during
//! certification path processing

use cfg_if::cfg_if;

cfg_if! {
    if #[cfg(feature = "webpki")] {
        use log::error;
        use sha2::{Digest, Sha256};
        use webpki_roots::TrustAnchor;
        use alloc::vec;
        use alloc::string::ToString;
        use der::{asn1::OctetString, Length};
        use x509_cert::anchor::{CertPathControls, TrustAnchorInfo};
    }
}

use alloc::vec::Vec;

use const_oid::db::rfc5912::{
    ID_CE_BASIC_CONSTRAINTS, ID_CE_CERTIFICATE_POLICIES, ID_CE_INHIBIT_ANY_POLICY,
    ID_CE_NAME_CONSTRAINTS, ID_CE_POLICY_CONSTRAINTS,
};
use der::{asn1::ObjectIdentifier, Decode, Encode};
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::anchor::{CertPolicies, TrustAnchorChoice};
use x509_cert::ext::pkix::constraints::{BasicConstraints, PolicyConstraints};
use x509_cert::ext::pkix::{CertificatePolicies as CertificatePoliciesExt, InhibitAnyPolicy};
use x509_cert::name::Name;
use x509_cert::Certificate;
use x509_cert::TbsCertificate;

use crate::util::error::*;
use crate::util::name_utils::valid_at_time;
use crate::validator::parsed_certificate::*;
use crate::validator::parsed_extension::*;
use crate::validator::path_settings::PS_MAX_PATH_LENGTH_CONSTRAINT;
use crate::EXTS_OF_INTEREST;

/// [`ParsedTrustAnchor`] is used to aggregate a binary TrustAnchorChoice, a parsed
/// TrustAnchorChoice, optional metadata and parsed extensions in support of certification path
/// development and validation operations.
#[derive(Clone, Eq, PartialEq)]
pub struct ParsedTrustAnchor {
    /// Binary, encoded TrustAnchorChoice object
    pub encoded_ta: Vec<u8>,
    /// Decoded TrustAnchorChoice object
    pub decoded_ta: TrustAnchorChoice,
    /// Optional metadata about the trust anchor
    pub metadata: Option<Asn1Metadata>,
    /// Parsed extensions from the TrustAnchorChoice
    pub parsed_extensions: ParsedExtensions,
}

impl TryFrom<&[u8]> for ParsedTrustAnchor {
    type Error = der::Error;

    fn try_from(enc_ta: &[u8]) -> der::Result<Self> {
        let ta = TrustAnchorChoice::from_der(enc_ta)?;
        let mut parsed_ta = ParsedTrustAnchor {
            encoded_ta: enc_ta.to_vec(),
            decoded_ta: ta,
            metadata: None,
            parsed_extensions: Default::default(),
        };
        parsed_ta.parse_extensions(EXTS_OF_INTEREST);
        Ok(parsed_ta)
    }
}

impl TryFrom<TrustAnchorChoice> for ParsedTrustAnchor {
    type Error = der::Error;

    fn try_from(ta: TrustAnchorChoice) -> der::Result<Self> {
        let enc_ta = ta.to_der()?;
        let mut parsed_ta = ParsedTrustAnchor {
            encoded_ta: enc_ta,
            decoded_ta: ta,
            metadata: None,
            parsed_extensions: Default::default(),
        };
        parsed_ta.parse_extensions(EXTS_OF_INTEREST);
        Ok(parsed_ta)
    }
}

impl TryFrom<Certificate> for ParsedTrustAnchor {
    type Error = der::Error;

    fn try_from(cert: Certificate) -> der::Result<Self> {
        let enc_cert = cert.to_der()?;
        let ta = TrustAnchorChoice::from_der(&enc_cert)?;
        let mut parsed_ta = ParsedTrustAnchor {
            encoded_ta: enc_cert,
            decoded_ta: ta,
            metadata: None,
            parsed_extensions: Default::default(),
        };
        parsed_ta.parse_extensions(EXTS_OF_INTEREST);
        Ok(parsed_ta)
    }
}

/// The webpki-roots TrustAnchor structure stores values with the outer SEQUENCE tag and length
/// removed (!). This means approximately nothing can parse it. This function restores the outer
/// SEQUENCE tag for Name values and returns a parsed Name.
#[cfg(feature = "webpki")]
fn partial_name_to_name(partial_name_bytes: &[u8]) -> der::Result<Name> {
    let l = Length::new(partial_name_bytes.len() as u16);
    let mut length_bytes = l.to_der()?;
    let mut enc_name = vec![0x30];
    enc_name.append(&mut length_bytes);
    enc_name.append(&mut partial_name_bytes.to_vec());
    Name::from_der(&enc_name)
}

/// The webpki-roots TrustAnchor structure stores values with the outer SEQUENCE tag and length
/// removed (!). This means approximately nothing can parse it. This function restores the outer
/// SEQUENCE tag for SubjectPublicKeyInfo values and returns a parsed SubjectPublicKeyInfoOwned.
#[cfg(feature = "webpki")]
fn partial_spki_to_spki(partial_spki_bytes: &[u8]) -> der::Result<SubjectPublicKeyInfoOwned> {
    let l = Length::new(partial_spki_bytes.len() as u16);
    let mut length_bytes = l.to_der()?;
    let mut enc_spki = vec![0x30];
    enc_spki.append(&mut length_bytes);
    enc_spki.append(&mut partial_spki_bytes.to_vec());
    SubjectPublicKeyInfoOwned::from_der(&enc_spki)
}

#[cfg(feature = "webpki")]
impl TryFrom<&TrustAnchor<'_>> for ParsedTrustAnchor {
    type Error = crate::Error;

    /// Takes a webpki-roots TrustAnchor and attempts to produce a ParsedTrustAnchor by first
    /// generating an [RFC 5914](https://datatracker.ietf.org/doc/html/rfc5914) TrustAnchorInfo
    /// structure containing the name, public key and, optionally, name constraints from the
    /// TrustAnchor.
    fn try_from(ta: &TrustAnchor<'_>) -> crate::Result<Self> {
        use x509_cert::ext::pkix::NameConstraints;

        let n = partial_name_to_name(ta.subject)?;
        let spki = partial_spki_to_spki(ta.spki)?;
        let nc = match ta.name_constraints {
            Some(nc) => Some(NameConstraints::from_der(nc)?),
            None => None,
        };

        // TrustAnchorInfo requires a key identifier. The webpki-roots structure omits this value,
        // so calculate one over the public key (which may differ from what the root includes in a
        // SKID extension in its certificate).
        let key_id = match spki.subject_public_key.as_bytes() {
            Some(b) => Sha256::digest(b),
            None => {
                error!("Failed to calculate key identifier for {}", n.to_string());
                return Err(Error::Unrecognized);
            }
        };

        // TrustAnchorInfo structures that are used for path validation MUST have a CertPathControls
        // member (because this is where the name is conveyed in that structure).
        let cp = CertPathControls {
            ta_name: n,
            certificate: None,
            policy_set: None,
            policy_flags: None,
            name_constr: nc,
            path_len_constraint: None,
        };
        let tai = TrustAnchorInfo {
            version: Default::default(),
            pub_key: spki,
            key_id: OctetString::new(key_id.to_vec())?,
            ta_title: None,
            cert_path: Some(cp),
            extensions: None,
            ta_title_lang_tag: None,
        };
        let tac = TrustAnchorChoice::TaInfo(tai);
        let enc_ta = tac.to_der()?;
        let mut parsed_ta = ParsedTrustAnchor {
            encoded_ta: enc_ta,
            decoded_ta: tac,
            metadata: None,
            parsed_extensions: Default::default(),
        };
        parsed_ta.parse_extensions(EXTS_OF_INTEREST);
        Ok(parsed_ta)
    }
}

impl ExtensionProcessing for ParsedTrustAnchor {
    fn get_extension(&self, oid: &ObjectIdentifier) -> Result<Option<&ParsedExtension>> {
        Ok(self.parsed_extensions.get(oid))
    }

    fn parse_extensions(&mut self, oids: &[ObjectIdentifier]) {
        for oid in oids {
            let _r = self.parse_extension(oid);
        }
    }

    fn parse_extension(&mut self, oid: &ObjectIdentifier) -> Result<Option<&ParsedExtension>> {
        let pe = &mut self.parsed_extensions;
        if pe.contains_key(oid) {
            return Ok(pe.get(oid));
        }

        let cert = match &self.decoded_ta {
            TrustAnchorChoice::Certificate(c) => c,
            TrustAnchorChoice::TaInfo(tai) => {
                if let Some(cp) = &tai.cert_path {
                    // TrustAnchorInfo may override some extensions per RFC 5914. The nameConstr
                    // and policySet fields take precedence over extensions in any wrapped
                    // certificate.
                    if ID_CE_NAME_CONSTRAINTS == *oid {
                        if let Some(nc) = &cp.name_constr {
                            pe.insert(*oid, ParsedExtension::NameConstraints(nc.clone()));
                            return Ok(pe.get(oid));
                        }
                    } else if ID_CE_CERTIFICATE_POLICIES == *oid {
                        if let Some(ps) = &cp.policy_set {
                            pe.insert(*oid, ParsedExtension::CertificatePolicies(ps.clone()));
                            return Ok(pe.get(oid));
                        }
                    }

                    match &cp.certificate {
                        Some(c) => c,
                        None => return Ok(None),
                    }
                } else {
                    return Ok(None);
                }
            }
            _ => {
                return Err(Error::Unrecognized);
            }
        };

        // hand the wrapped certificate's extension table to the certificate logic
        let mut tmp = ParsedCertificate {
            encoded_cert: Vec::new(),
            decoded_cert: cert.clone(),
            metadata: None,
            parsed_extensions: Default::default(),
        };
        if tmp.parse_extension(oid)?.is_some() {
            if let Some((k, v)) = tmp.parsed_extensions.into_iter().next() {
                pe.insert(k, v);
            }
        }
        Ok(pe.get(oid))
    }
}

/// [`get_trust_anchor_name`] returns the name of the trust anchor.
///
/// The name is as read from either the subject field of a certificate if the Certificate option
/// is used or from the CertPathControls field within a TrustAnchorInfo if that option is used.
/// The TBSCertificate option within TrustAnchorInfo is not consulted, i.e., if one wishes to use
/// TrustAnchorInfo then the Name must be populated within CertPathControls.
pub fn get_trust_anchor_name(ta: &TrustAnchorChoice) -> Result<&Name> {
    match ta {
        TrustAnchorChoice::Certificate(cert) => {
            return Ok(&cert.tbs_certificate.subject);
        }
        TrustAnchorChoice::TaInfo(tai) => {
            if let Some(cert_path) = &tai.cert_path {
                return Ok(&cert_path.ta_name);
            }
        }
        TrustAnchorChoice::TbsCertificate(cert) => {
            return Ok(&cert.subject);
        }
    }
    Err(Error::PathValidation(
        PathValidationStatus::MissingTrustAnchorName,
    ))
}

/// `get_subject_public_key_info_from_trust_anchor` returns a reference to the subject public key
/// contained in a TrustAnchorChoice object:
/// - Certificate.tbs_certificate.subject_public_key_info
/// - TrustAnchorInfo.pub_key field.
pub fn get_subject_public_key_info_from_trust_anchor(
    ta: &TrustAnchorChoice,
) -> &SubjectPublicKeyInfoOwned {
    match ta {
        TrustAnchorChoice::Certificate(cert) => &cert.tbs_certificate.subject_public_key_info,
        TrustAnchorChoice::TaInfo(tai) => &tai.pub_key,
        TrustAnchorChoice::TbsCertificate(tbs) => &tbs.subject_public_key_info,
    }
}

/// `get_certificate_from_trust_anchor` returns the certificate from the TrustAnchorChoice. This
/// will be either the Certificate choice itself or the TrustAnchorInfo.cert_path.certificate field.
pub fn get_certificate_from_trust_anchor(ta: &TrustAnchorChoice) -> Option<&Certificate> {
    match ta {
        TrustAnchorChoice::Certificate(cert) => Some(cert),
        TrustAnchorChoice::TaInfo(tai) => match &tai.cert_path {
            Some(cp) => cp.certificate.as_ref(),
            None => None,
        },
        _ => None,
    }
}

/// `ta_valid_at_time` checks the validity of the given trust anchor relative to the given time of
/// interest, where a trust anchor wraps a certificate that conveys validity information.
pub fn ta_valid_at_time(ta: &TrustAnchorChoice, toi: u64, stifle_log: bool) -> Result<u64> {
    match ta {
        TrustAnchorChoice::Certificate(c) => valid_at_time(&c.tbs_certificate, toi, stifle_log),
        TrustAnchorChoice::TaInfo(tai) => {
            if let Some(cp) = &tai.cert_path {
                if let Some(c) = &cp.certificate {
                    return valid_at_time(&c.tbs_certificate, toi, stifle_log);
                }
            }
            // TrustAnchorInfo without a wrapped certificate asserts no validity period
            Ok(0)
        }
        TrustAnchorChoice::TbsCertificate(tbs) => {
            valid_at_time(tbs as &TbsCertificate, toi, stifle_log)
        }
    }
}

fn find_extension<'a>(
    cert: &'a Certificate,
    oid: &ObjectIdentifier,
) -> Option<&'a x509_cert::ext::Extension> {
    cert.tbs_certificate
        .extensions
        .as_ref()
        .and_then(|exts| exts.iter().find(|ext| ext.extn_id == *oid))
}

/// `get_inhibit_any_policy_from_trust_anchor` returns true if the trust anchor inhibits the use of
/// anyPolicy during certification path processing.
///
/// True is returned if an inhibitAnyPolicy extension is present in a TA certificate for the
/// Certificate CHOICE or if the corresponding flag is set in CertPathControls.PolicyFlags for the
/// TrustAnchorInfo CHOICE. Otherwise, false is returned.
pub(crate) fn get_inhibit_any_policy_from_trust_anchor(ta: &TrustAnchorChoice) -> Result<bool> {
    match ta {
        TrustAnchorChoice::Certificate(cert) => {
            if let Some(ext) = find_extension(cert, &ID_CE_INHIBIT_ANY_POLICY) {
                if InhibitAnyPolicy::from_der(ext.extn_value.as_bytes()).is_ok() {
                    return Ok(true);
                }
            }
        }
        TrustAnchorChoice::TaInfo(tai) => {
            if let Some(cert_path) = &tai.cert_path {
                if let Some(pf) = cert_path.policy_flags {
                    if pf.contains(CertPolicies::InhibitAnyPolicy) {
                        return Ok(true);
                    }
                }
            }
        }
        _ => {
            return Err(Error::Unrecognized);
        }
    }
    Ok(false)
}

/// `get_require_explicit_policy_from_trust_anchor` returns true if the trust anchor requires all
/// paths to be valid under at least one policy during certification path processing.
///
/// True is returned if a policyConstraints extension asserting requireExplicitPolicy is present in
/// a TA certificate for the Certificate CHOICE or if the corresponding flag is set in
/// CertPathControls.PolicyFlags for the TrustAnchorInfo CHOICE. Otherwise, false is returned.
pub(crate) fn get_require_explicit_policy_from_trust_anchor(
    ta: &TrustAnchorChoice,
) -> Result<bool> {
    match ta {
        TrustAnchorChoice::Certificate(cert) => {
            if let Some(ext) = find_extension(cert, &ID_CE_POLICY_CONSTRAINTS) {
                if let Ok(pc) = PolicyConstraints::from_der(ext.extn_value.as_bytes()) {
                    if pc.require_explicit_policy.is_some() {
                        return Ok(true);
                    }
                }
            }
        }
        TrustAnchorChoice::TaInfo(tai) => {
            if let Some(cert_path) = &tai.cert_path {
                if let Some(pf) = cert_path.policy_flags {
                    if pf.contains(CertPolicies::RequireExplicitPolicy) {
                        return Ok(true);
                    }
                }
            }
        }
        _ => {
            return Err(Error::Unrecognized);
        }
    }
    Ok(false)
}

/// `get_inhibit_policy_mapping_from_trust_anchor` returns true if the trust anchor inhibits the
/// use of policy mapping during certification path processing.
///
/// True is returned if a policyConstraints extension asserting inhibitPolicyMapping is present in
/// a TA certificate for the Certificate CHOICE or if the corresponding flag is set in
/// CertPathControls.PolicyFlags for the TrustAnchorInfo CHOICE. Otherwise, false is returned.
pub(crate) fn get_inhibit_policy_mapping_from_trust_anchor(ta: &TrustAnchorChoice) -> Result<bool> {
    match ta {
        TrustAnchorChoice::Certificate(cert) => {
            if let Some(ext) = find_extension(cert, &ID_CE_POLICY_CONSTRAINTS) {
                if let Ok(pc) = PolicyConstraints::from_der(ext.extn_value.as_bytes()) {
                    if pc.inhibit_policy_mapping.is_some() {
                        return Ok(true);
                    }
                }
            }
        }
        TrustAnchorChoice::TaInfo(tai) => {
            if let Some(cert_path) = &tai.cert_path {
                if let Some(pf) = cert_path.policy_flags {
                    if pf.contains(CertPolicies::InhibitPolicyMapping) {
                        return Ok(true);
                    }
                }
            }
        }
        _ => {
            return Err(Error::Unrecognized);
        }
    }
    Ok(false)
}

/// `get_policy_set_from_trust_anchor` returns the policy set asserted by a trust anchor, i.e., a
/// certificatePolicies extension in a TA certificate for the Certificate CHOICE or the
/// CertPathControls.policySet field for the TrustAnchorInfo CHOICE.
pub(crate) fn get_policy_set_from_trust_anchor(
    ta: &TrustAnchorChoice,
) -> Result<Option<CertificatePoliciesExt>> {
    match ta {
        TrustAnchorChoice::Certificate(cert) => {
            if let Some(ext) = find_extension(cert, &ID_CE_CERTIFICATE_POLICIES) {
                return Ok(Some(CertificatePoliciesExt::from_der(
                    ext.extn_value.as_bytes(),
                )?));
            }
        }
        TrustAnchorChoice::TaInfo(tai) => {
            if let Some(cert_path) = &tai.cert_path {
                if let Some(ps) = &cert_path.policy_set {
                    return Ok(Some(ps.clone()));
                }
            }
        }
        _ => {
            return Err(Error::Unrecognized);
        }
    }
    Ok(None)
}

/// `get_path_length_constraint_from_trust_anchor` returns the value from a basicConstraints
/// extension in a TA certificate for the Certificate CHOICE, the value from CertPathControls for
/// the TrustAnchorInfo CHOICE or [`PS_MAX_PATH_LENGTH_CONSTRAINT`] if no constraint is asserted.
pub(crate) fn get_path_length_constraint_from_trust_anchor(ta: &TrustAnchorChoice) -> Result<u8> {
    match ta {
        TrustAnchorChoice::Certificate(cert) => {
            if let Some(ext) = find_extension(cert, &ID_CE_BASIC_CONSTRAINTS) {
                if let Ok(bc) = BasicConstraints::from_der(ext.extn_value.as_bytes()) {
                    if let Some(pl) = bc.path_len_constraint {
                        return Ok(pl);
                    }
                }
            }
        }
        TrustAnchorChoice::TaInfo(tai) => {
            if let Some(cert_path) = &tai.cert_path {
                if let Some(len) = cert_path.path_len_constraint {
                    return Ok(len as u8);
                }
            }
        }
        _ => {
            return Err(Error::Unrecognized);
        }
    }
    Ok(PS_MAX_PATH_LENGTH_CONSTRAINT)
}
