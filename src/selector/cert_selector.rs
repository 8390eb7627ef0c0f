//! Declarative certificate matching. A [`CertificateSelector`] expresses a set of constraints
//! against which candidate certificates can be evaluated, with unset constraints matching any
//! certificate. Selectors are used to identify target certificates when building paths and to
//! prune issuer candidates that could never yield a valid path.

use alloc::vec::Vec;

use const_oid::db::rfc5280::ANY_POLICY;
use const_oid::db::rfc5912::{
    ID_CE_CERTIFICATE_POLICIES, ID_CE_EXT_KEY_USAGE, ID_CE_KEY_USAGE, ID_CE_NAME_CONSTRAINTS,
    ID_CE_PRIVATE_KEY_USAGE_PERIOD, ID_CE_SUBJECT_ALT_NAME, ID_CE_SUBJECT_KEY_IDENTIFIER,
};
use der::Decode;
use flagset::FlagSet;
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::ext::pkix::constraints::NameConstraints;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{KeyUsages, SubjectAltName};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;

use crate::util::name_utils::{compare_names, encode_dn_from_string, valid_at_time};
use crate::validator::name_constraints_set::NameConstraintsSet;
use crate::{
    ExtensionProcessing, ObjectIdentifierSet, ParsedCertificate, ParsedExtension, Result,
};

/// Permitted and excluded subtree state assembled from a DER-encoded NameConstraints value
/// supplied to [`CertificateSelector::set_name_constraints`].
#[derive(Clone, Default)]
struct SelectorNameConstraints {
    permitted: NameConstraintsSet,
    excluded: NameConstraintsSet,
}

impl SelectorNameConstraints {
    fn new(enc_nc: &[u8]) -> Result<Self> {
        let nc = NameConstraints::from_der(enc_nc)?;
        let mut snc = SelectorNameConstraints::default();
        if let Some(perm) = &nc.permitted_subtrees {
            snc.permitted.calculate_intersection(perm);
        }
        if let Some(excl) = &nc.excluded_subtrees {
            snc.excluded.calculate_union(excl);
        }
        Ok(snc)
    }
}

/// [`CertificateSelector`] aggregates the constraints that govern whether a given certificate is
/// of interest to a caller. Each field is optional and unset fields place no restriction on
/// candidates, i.e., a default instance matches every well-formed certificate. When several
/// fields are set a candidate must satisfy all of them.
///
/// Fields that accept pre-parsed values are public. Constraints that originate as DER-encoded
/// values or string representations are set via fallible setters, for example
/// [`set_name_constraints`](Self::set_name_constraints) and
/// [`set_subject_from_string`](Self::set_subject_from_string), so that malformed constraint
/// values surface when a selector is prepared instead of silently failing to match.
#[derive(Clone)]
pub struct CertificateSelector {
    /// Candidates must match this DER-encoded certificate exactly
    pub certificate: Option<Vec<u8>>,
    /// Candidates must bear this serial number
    pub serial_number: Option<SerialNumber>,
    /// Candidate issuer names must match this name per RFC 5280 name comparison rules
    pub issuer: Option<Name>,
    /// Candidate subject names must match this name per RFC 5280 name comparison rules
    pub subject: Option<Name>,
    /// Candidates must feature a SubjectKeyIdentifier extension with this value
    pub subject_key_identifier: Option<Vec<u8>>,
    /// Candidates must carry this subject public key
    pub subject_public_key: Option<SubjectPublicKeyInfoOwned>,
    /// Candidates asserting a KeyUsage extension must assert at least these bits. Candidates
    /// without a KeyUsage extension are unconstrained.
    pub key_usage: Option<FlagSet<KeyUsages>>,
    /// Candidates asserting an ExtendedKeyUsage extension must include every listed OID.
    /// Candidates without an ExtendedKeyUsage extension are unconstrained.
    pub extended_key_usage: Option<ObjectIdentifierSet>,
    /// Candidates must assert at least one listed certificate policy, or anyPolicy. An empty set
    /// imposes no constraint.
    pub policy_set: Option<ObjectIdentifierSet>,
    /// Candidates must be valid at this time, expressed in seconds since the Unix epoch
    pub certificate_valid: Option<u64>,
    /// Candidates asserting a PrivateKeyUsagePeriod extension must include this time, expressed
    /// in seconds since the Unix epoch, within the asserted period
    pub private_key_valid: Option<u64>,
    /// Candidate subject and subject alternative names must satisfy these name constraints
    name_constraints: Option<SelectorNameConstraints>,
    /// Candidates must feature a SubjectAltName extension containing these names, subject to
    /// `match_all_subject_alt_names`
    pub subject_alternative_names: Option<Vec<GeneralName>>,
    /// Governs whether every name in `subject_alternative_names` must be present in a candidate
    /// (true, the default) or at least one (false)
    pub match_all_subject_alt_names: bool,
    /// Names that must not be excluded by a candidate's NameConstraints extension, used when
    /// selecting CA certificates that could appear on a path serving the given names. Candidates
    /// with no NameConstraints extension are unconstrained.
    pub path_to_names: Option<Vec<GeneralName>>,
}

impl Default for CertificateSelector {
    fn default() -> Self {
        CertificateSelector {
            certificate: None,
            serial_number: None,
            issuer: None,
            subject: None,
            subject_key_identifier: None,
            subject_public_key: None,
            key_usage: None,
            extended_key_usage: None,
            policy_set: None,
            certificate_valid: None,
            private_key_valid: None,
            name_constraints: None,
            subject_alternative_names: None,
            match_all_subject_alt_names: true,
            path_to_names: None,
        }
    }
}

/// Compares two GeneralName values for matching purposes. Directory names use RFC 5280 name
/// comparison rules, host and mailbox forms compare case-insensitively and all other forms
/// compare structurally.
fn general_names_match(left: &GeneralName, right: &GeneralName) -> bool {
    match (left, right) {
        (GeneralName::DirectoryName(l), GeneralName::DirectoryName(r)) => compare_names(l, r),
        (GeneralName::DnsName(l), GeneralName::DnsName(r)) => {
            l.as_str().eq_ignore_ascii_case(r.as_str())
        }
        (GeneralName::Rfc822Name(l), GeneralName::Rfc822Name(r)) => {
            l.as_str().eq_ignore_ascii_case(r.as_str())
        }
        _ => left == right,
    }
}

impl CertificateSelector {
    /// `new` returns a selector with no constraints set, which matches every certificate.
    pub fn new() -> Self {
        Default::default()
    }

    /// `set_subject_from_string` parses a string representation of a distinguished name, for
    /// example CN=Joe,O=Org,C=US, and sets the subject constraint to the result.
    pub fn set_subject_from_string(&mut self, subject: &str) -> Result<()> {
        let enc = encode_dn_from_string(subject)?;
        self.subject = Some(Name::from_der(&enc)?);
        Ok(())
    }

    /// `set_issuer_from_string` parses a string representation of a distinguished name and sets
    /// the issuer constraint to the result.
    pub fn set_issuer_from_string(&mut self, issuer: &str) -> Result<()> {
        let enc = encode_dn_from_string(issuer)?;
        self.issuer = Some(Name::from_der(&enc)?);
        Ok(())
    }

    /// `set_name_constraints` takes a DER-encoded NameConstraints value and sets the name
    /// constraints that candidate subject and subject alternative names must satisfy. An error
    /// is returned if the value cannot be decoded.
    pub fn set_name_constraints(&mut self, enc_nc: &[u8]) -> Result<()> {
        self.name_constraints = Some(SelectorNameConstraints::new(enc_nc)?);
        Ok(())
    }

    /// `clear_name_constraints` removes any previously set name constraints.
    pub fn clear_name_constraints(&mut self) {
        self.name_constraints = None;
    }

    /// `match_certificate` returns true if the given certificate satisfies every constraint set
    /// on self. Unset constraints are satisfied by any certificate, so narrowing a selector can
    /// only shrink the set of matching certificates.
    pub fn match_certificate(&self, cert: &ParsedCertificate) -> bool {
        self.match_identity(cert)
            && self.match_usage(cert)
            && self.match_policies(cert)
            && self.match_validity(cert)
            && self.match_names(cert)
    }

    /// Applies the certificate, serial number, issuer, subject, subject key identifier and
    /// subject public key constraints.
    fn match_identity(&self, cert: &ParsedCertificate) -> bool {
        if let Some(enc_cert) = &self.certificate {
            if &cert.encoded_cert != enc_cert {
                return false;
            }
        }

        if let Some(serial) = &self.serial_number {
            if &cert.decoded_cert.tbs_certificate.serial_number != serial {
                return false;
            }
        }

        if let Some(issuer) = &self.issuer {
            if !compare_names(issuer, &cert.decoded_cert.tbs_certificate.issuer) {
                return false;
            }
        }

        if let Some(subject) = &self.subject {
            if !compare_names(subject, &cert.decoded_cert.tbs_certificate.subject) {
                return false;
            }
        }

        if let Some(skid) = &self.subject_key_identifier {
            match cert.get_extension(&ID_CE_SUBJECT_KEY_IDENTIFIER) {
                Ok(Some(ParsedExtension::SubjectKeyIdentifier(cert_skid))) => {
                    if cert_skid.0.as_bytes() != skid.as_slice() {
                        return false;
                    }
                }
                _ => return false,
            }
        }

        if let Some(spki) = &self.subject_public_key {
            if &cert.decoded_cert.tbs_certificate.subject_public_key_info != spki {
                return false;
            }
        }

        true
    }

    /// Applies the key usage and extended key usage constraints. Certificates that omit the
    /// corresponding extension are unconstrained relative to these fields.
    fn match_usage(&self, cert: &ParsedCertificate) -> bool {
        if let Some(required_ku) = &self.key_usage {
            if let Ok(Some(ParsedExtension::KeyUsage(ku))) = cert.get_extension(&ID_CE_KEY_USAGE)
            {
                if (ku.0 & *required_ku) != *required_ku {
                    return false;
                }
            }
        }

        if let Some(required_ekus) = &self.extended_key_usage {
            if let Ok(Some(ParsedExtension::ExtendedKeyUsage(eku))) =
                cert.get_extension(&ID_CE_EXT_KEY_USAGE)
            {
                if !required_ekus.iter().all(|oid| eku.0.contains(oid)) {
                    return false;
                }
            }
        }

        true
    }

    /// Applies the certificate policy constraint. A certificate matches a non-empty policy set
    /// if its certificatePolicies extension asserts any listed policy or anyPolicy.
    fn match_policies(&self, cert: &ParsedCertificate) -> bool {
        let policy_set = match &self.policy_set {
            Some(policy_set) if !policy_set.is_empty() => policy_set,
            _ => return true,
        };

        match cert.get_extension(&ID_CE_CERTIFICATE_POLICIES) {
            Ok(Some(ParsedExtension::CertificatePolicies(cp))) => cp.0.iter().any(|pi| {
                pi.policy_identifier == ANY_POLICY || policy_set.contains(&pi.policy_identifier)
            }),
            _ => false,
        }
    }

    /// Applies the certificate validity and private key usage period constraints.
    fn match_validity(&self, cert: &ParsedCertificate) -> bool {
        if let Some(toi) = self.certificate_valid {
            if valid_at_time(&cert.decoded_cert.tbs_certificate, toi, true).is_err() {
                return false;
            }
        }

        if let Some(toi) = self.private_key_valid {
            if let Ok(Some(ParsedExtension::PrivateKeyUsagePeriod(pkup))) =
                cert.get_extension(&ID_CE_PRIVATE_KEY_USAGE_PERIOD)
            {
                if let Some(not_before) = pkup.not_before {
                    if toi < not_before.to_unix_duration().as_secs() {
                        return false;
                    }
                }
                if let Some(not_after) = pkup.not_after {
                    if toi > not_after.to_unix_duration().as_secs() {
                        return false;
                    }
                }
            }
        }

        true
    }

    /// Applies the name constraints, subject alternative name and path-to-names constraints.
    fn match_names(&self, cert: &ParsedCertificate) -> bool {
        let san = match cert.get_extension(&ID_CE_SUBJECT_ALT_NAME) {
            Ok(Some(ParsedExtension::SubjectAltName(san))) => Some(san),
            _ => None,
        };

        if let Some(snc) = &self.name_constraints {
            let subject = &cert.decoded_cert.tbs_certificate.subject;
            if !snc.permitted.subject_within_permitted_subtrees(subject)
                || snc.excluded.subject_within_excluded_subtrees(subject)
                || !snc.permitted.san_within_permitted_subtrees(&san)
                || snc.excluded.san_within_excluded_subtrees(&san)
            {
                return false;
            }
        }

        if let Some(required_names) = &self.subject_alternative_names {
            if !required_names.is_empty() {
                let san = match san {
                    Some(san) => san,
                    None => return false,
                };
                let matched = required_names
                    .iter()
                    .filter(|name| san.0.iter().any(|gn| general_names_match(gn, name)))
                    .count();
                if self.match_all_subject_alt_names {
                    if matched != required_names.len() {
                        return false;
                    }
                } else if matched == 0 {
                    return false;
                }
            }
        }

        if let Some(path_names) = &self.path_to_names {
            if !path_names.is_empty() {
                if let Ok(Some(ParsedExtension::NameConstraints(nc))) =
                    cert.get_extension(&ID_CE_NAME_CONSTRAINTS)
                {
                    let mut permitted = NameConstraintsSet::default();
                    if let Some(perm) = &nc.permitted_subtrees {
                        permitted.calculate_intersection(perm);
                    }
                    let mut excluded = NameConstraintsSet::default();
                    if let Some(excl) = &nc.excluded_subtrees {
                        excluded.calculate_union(excl);
                    }
                    let probe = SubjectAltName(path_names.clone());
                    let probe_ref = Some(&probe);
                    if !permitted.san_within_permitted_subtrees(&probe_ref)
                        || excluded.san_within_excluded_subtrees(&probe_ref)
                    {
                        return false;
                    }
                }
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;
    use core::str::FromStr;
    use core::time::Duration;

    use der::asn1::{BitString, GeneralizedTime, Ia5String, ObjectIdentifier, OctetString};
    use der::Encode;
    use spki::AlgorithmIdentifierOwned;
    use x509_cert::certificate::{TbsCertificate, Version};
    use x509_cert::ext::pkix::certpolicy::PolicyInformation;
    use x509_cert::ext::pkix::constraints::name::GeneralSubtree;
    use x509_cert::ext::pkix::{
        CertificatePolicies, ExtendedKeyUsage, KeyUsage, PrivateKeyUsagePeriod,
    };
    use x509_cert::ext::Extension;
    use x509_cert::time::{Time, Validity};
    use x509_cert::Certificate;

    use crate::util::alg_oids::PKIXALG_SHA256_WITH_RSA_ENCRYPTION;

    const ID_KP_SERVER_AUTH: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.1");
    const ID_KP_CLIENT_AUTH: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.3.2");
    const TEST_POLICY: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.2.1.48.1");
    const OTHER_POLICY: ObjectIdentifier =
        ObjectIdentifier::new_unwrap("2.16.840.1.101.3.2.1.48.2");

    const NOT_BEFORE: u64 = 1672531200; // 2023-01-01
    const NOT_AFTER: u64 = 1988150400; // 2033-01-01

    fn time_at(secs: u64) -> Time {
        Time::GeneralTime(GeneralizedTime::from_unix_duration(Duration::from_secs(secs)).unwrap())
    }

    fn ext(oid: ObjectIdentifier, value: Vec<u8>) -> Extension {
        Extension {
            extn_id: oid,
            critical: false,
            extn_value: OctetString::new(value).unwrap(),
        }
    }

    fn make_cert(subject: &str, extensions: Vec<Extension>) -> ParsedCertificate {
        let alg = AlgorithmIdentifierOwned {
            oid: PKIXALG_SHA256_WITH_RSA_ENCRYPTION,
            parameters: None,
        };
        let tbs = TbsCertificate {
            version: Version::V3,
            serial_number: SerialNumber::new(&[0x01, 0x02, 0x03]).unwrap(),
            signature: alg.clone(),
            issuer: Name::from_str("CN=CA,O=Org,C=US").unwrap(),
            validity: Validity {
                not_before: time_at(NOT_BEFORE),
                not_after: time_at(NOT_AFTER),
            },
            subject: Name::from_str(subject).unwrap(),
            subject_public_key_info: SubjectPublicKeyInfoOwned {
                algorithm: alg.clone(),
                subject_public_key: BitString::from_bytes(&[0xAA, 0xBB, 0xCC, 0xDD]).unwrap(),
            },
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: if extensions.is_empty() {
                None
            } else {
                Some(extensions)
            },
        };
        let cert = Certificate {
            tbs_certificate: tbs,
            signature_algorithm: alg,
            signature: BitString::from_bytes(&[0x00]).unwrap(),
        };
        ParsedCertificate::try_from(cert).unwrap()
    }

    fn dns_name(value: &str) -> GeneralName {
        GeneralName::DnsName(Ia5String::new(value).unwrap())
    }

    #[test]
    fn selector_identity_tests() {
        let cert = make_cert("CN=Joe,O=Org,C=US", vec![]);

        let mut selector = CertificateSelector::new();
        assert!(selector.match_certificate(&cert));

        selector.set_subject_from_string("CN=Joe,O=Org,C=US").unwrap();
        selector.set_issuer_from_string("CN=CA,O=Org,C=US").unwrap();
        assert!(selector.match_certificate(&cert));

        selector.serial_number = Some(SerialNumber::new(&[0x01, 0x02, 0x03]).unwrap());
        selector.certificate = Some(cert.encoded_cert.clone());
        selector.subject_public_key =
            Some(cert.decoded_cert.tbs_certificate.subject_public_key_info.clone());
        assert!(selector.match_certificate(&cert));

        selector.serial_number = Some(SerialNumber::new(&[0x04]).unwrap());
        assert!(!selector.match_certificate(&cert));

        // clearing the offending constraint restores the match
        selector.serial_number = None;
        assert!(selector.match_certificate(&cert));

        selector.set_subject_from_string("CN=Sue,O=Org,C=US").unwrap();
        assert!(!selector.match_certificate(&cert));
        selector.subject = None;
        assert!(selector.match_certificate(&cert));

        // subject key identifier constraints require the extension to be present
        selector.subject_key_identifier = Some(vec![0x01, 0x02]);
        assert!(!selector.match_certificate(&cert));

        let skid_cert = make_cert(
            "CN=Joe,O=Org,C=US",
            vec![ext(
                ID_CE_SUBJECT_KEY_IDENTIFIER,
                OctetString::new(vec![0x01, 0x02]).unwrap().to_der().unwrap(),
            )],
        );
        let mut skid_selector = CertificateSelector::new();
        skid_selector.subject_key_identifier = Some(vec![0x01, 0x02]);
        assert!(skid_selector.match_certificate(&skid_cert));
        skid_selector.subject_key_identifier = Some(vec![0x03]);
        assert!(!skid_selector.match_certificate(&skid_cert));
    }

    #[test]
    fn selector_usage_and_policy_tests() {
        let ku = KeyUsage(KeyUsages::DigitalSignature | KeyUsages::KeyEncipherment);
        let eku = ExtendedKeyUsage(vec![ID_KP_SERVER_AUTH]);
        let policies = CertificatePolicies(vec![PolicyInformation {
            policy_identifier: TEST_POLICY,
            policy_qualifiers: None,
        }]);
        let cert = make_cert(
            "CN=Joe,O=Org,C=US",
            vec![
                ext(ID_CE_KEY_USAGE, ku.to_der().unwrap()),
                ext(ID_CE_EXT_KEY_USAGE, eku.to_der().unwrap()),
                ext(ID_CE_CERTIFICATE_POLICIES, policies.to_der().unwrap()),
            ],
        );
        let bare_cert = make_cert("CN=Joe,O=Org,C=US", vec![]);

        let mut selector = CertificateSelector::new();
        selector.key_usage = Some(KeyUsages::DigitalSignature.into());
        assert!(selector.match_certificate(&cert));
        // certificates without a key usage extension allow all usages
        assert!(selector.match_certificate(&bare_cert));

        selector.key_usage = Some(KeyUsages::DigitalSignature | KeyUsages::KeyCertSign);
        assert!(!selector.match_certificate(&cert));
        assert!(selector.match_certificate(&bare_cert));
        selector.key_usage = None;

        let mut ekus = ObjectIdentifierSet::new();
        ekus.insert(ID_KP_SERVER_AUTH);
        selector.extended_key_usage = Some(ekus.clone());
        assert!(selector.match_certificate(&cert));
        assert!(selector.match_certificate(&bare_cert));

        ekus.insert(ID_KP_CLIENT_AUTH);
        selector.extended_key_usage = Some(ekus);
        assert!(!selector.match_certificate(&cert));
        selector.extended_key_usage = None;

        let mut policy_set = ObjectIdentifierSet::new();
        policy_set.insert(TEST_POLICY);
        selector.policy_set = Some(policy_set);
        assert!(selector.match_certificate(&cert));
        // a policy constraint cannot be satisfied without a certificatePolicies extension
        assert!(!selector.match_certificate(&bare_cert));

        let mut other_set = ObjectIdentifierSet::new();
        other_set.insert(OTHER_POLICY);
        selector.policy_set = Some(other_set);
        assert!(!selector.match_certificate(&cert));

        // anyPolicy satisfies any policy constraint
        let any_policy_cert = make_cert(
            "CN=Joe,O=Org,C=US",
            vec![ext(
                ID_CE_CERTIFICATE_POLICIES,
                CertificatePolicies(vec![PolicyInformation {
                    policy_identifier: ANY_POLICY,
                    policy_qualifiers: None,
                }])
                .to_der()
                .unwrap(),
            )],
        );
        assert!(selector.match_certificate(&any_policy_cert));

        selector.policy_set = Some(ObjectIdentifierSet::new());
        assert!(selector.match_certificate(&bare_cert));
    }

    #[test]
    fn selector_validity_tests() {
        let pkup = PrivateKeyUsagePeriod {
            not_before: Some(
                GeneralizedTime::from_unix_duration(Duration::from_secs(NOT_BEFORE)).unwrap(),
            ),
            not_after: Some(
                GeneralizedTime::from_unix_duration(Duration::from_secs(NOT_BEFORE + 1000))
                    .unwrap(),
            ),
        };
        let cert = make_cert(
            "CN=Joe,O=Org,C=US",
            vec![ext(ID_CE_PRIVATE_KEY_USAGE_PERIOD, pkup.to_der().unwrap())],
        );

        let mut selector = CertificateSelector::new();
        selector.certificate_valid = Some(NOT_BEFORE + 100);
        assert!(selector.match_certificate(&cert));
        selector.certificate_valid = Some(NOT_AFTER + 100);
        assert!(!selector.match_certificate(&cert));
        selector.certificate_valid = Some(NOT_BEFORE - 100);
        assert!(!selector.match_certificate(&cert));
        selector.certificate_valid = None;

        selector.private_key_valid = Some(NOT_BEFORE + 500);
        assert!(selector.match_certificate(&cert));
        selector.private_key_valid = Some(NOT_BEFORE + 2000);
        assert!(!selector.match_certificate(&cert));
        selector.private_key_valid = Some(NOT_BEFORE - 100);
        assert!(!selector.match_certificate(&cert));

        // certificates without the extension are unconstrained
        let bare_cert = make_cert("CN=Joe,O=Org,C=US", vec![]);
        assert!(selector.match_certificate(&bare_cert));
    }

    #[cfg(feature = "std")]
    #[test]
    fn selector_name_tests() {
        let san = SubjectAltName(vec![dns_name("www.example.com"), dns_name("example.com")]);
        let cert = make_cert(
            "CN=Joe,O=Org,C=US",
            vec![ext(ID_CE_SUBJECT_ALT_NAME, san.to_der().unwrap())],
        );
        let bare_cert = make_cert("CN=Joe,O=Org,C=US", vec![]);

        let mut selector = CertificateSelector::new();
        selector.subject_alternative_names = Some(vec![dns_name("WWW.EXAMPLE.COM")]);
        assert!(selector.match_certificate(&cert));
        assert!(!selector.match_certificate(&bare_cert));

        selector.subject_alternative_names =
            Some(vec![dns_name("www.example.com"), dns_name("mail.example.com")]);
        assert!(!selector.match_certificate(&cert));
        selector.match_all_subject_alt_names = false;
        assert!(selector.match_certificate(&cert));
        selector.subject_alternative_names = None;
        selector.match_all_subject_alt_names = true;

        let nc = NameConstraints {
            permitted_subtrees: Some(vec![GeneralSubtree {
                base: dns_name("example.com"),
                minimum: 0,
                maximum: None,
            }]),
            excluded_subtrees: None,
        };
        selector.set_name_constraints(&nc.to_der().unwrap()).unwrap();
        assert!(selector.match_certificate(&cert));

        let nc = NameConstraints {
            permitted_subtrees: Some(vec![GeneralSubtree {
                base: dns_name("example.org"),
                minimum: 0,
                maximum: None,
            }]),
            excluded_subtrees: None,
        };
        selector.set_name_constraints(&nc.to_der().unwrap()).unwrap();
        assert!(!selector.match_certificate(&cert));

        let nc = NameConstraints {
            permitted_subtrees: None,
            excluded_subtrees: Some(vec![GeneralSubtree {
                base: dns_name("example.com"),
                minimum: 0,
                maximum: None,
            }]),
        };
        selector.set_name_constraints(&nc.to_der().unwrap()).unwrap();
        assert!(!selector.match_certificate(&cert));
        selector.clear_name_constraints();
        assert!(selector.match_certificate(&cert));

        assert!(selector.set_name_constraints(&[0x04, 0x01, 0x00]).is_err());
        assert!(selector.set_subject_from_string("not a name").is_err());

        // path-to-names prunes CA certificates whose constraints exclude the sought names
        let ca_nc = NameConstraints {
            permitted_subtrees: Some(vec![GeneralSubtree {
                base: dns_name("example.com"),
                minimum: 0,
                maximum: None,
            }]),
            excluded_subtrees: None,
        };
        let ca_cert = make_cert(
            "CN=CA2,O=Org,C=US",
            vec![ext(ID_CE_NAME_CONSTRAINTS, ca_nc.to_der().unwrap())],
        );
        let mut ca_selector = CertificateSelector::new();
        ca_selector.path_to_names = Some(vec![dns_name("www.example.com")]);
        assert!(ca_selector.match_certificate(&ca_cert));
        // unconstrained CA certificates serve any name
        assert!(ca_selector.match_certificate(&bare_cert));
        ca_selector.path_to_names = Some(vec![dns_name("www.example.org")]);
        assert!(!ca_selector.match_certificate(&ca_cert));
    }
}
