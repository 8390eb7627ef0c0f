//! Name comparison, validity and related utility functions that support certification path
//! building and validation

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::str::FromStr;

use log::error;

#[cfg(feature = "std")]
use lazy_static::lazy_static;

#[cfg(feature = "std")]
use regex::Regex;

use const_oid::db::rfc2256::STATE_OR_PROVINCE_NAME;
use const_oid::db::rfc3280::{EMAIL_ADDRESS, PSEUDONYM};
use const_oid::db::rfc4519::*;
use der::asn1::{Ia5String, PrintableString, Utf8StringRef};
use der::{asn1::ObjectIdentifier, Decode, Encode, Tagged};
use x509_cert::attr::AttributeTypeAndValue;
use x509_cert::ext::pkix::{
    constraints::name::{GeneralSubtree, GeneralSubtrees},
    name::GeneralName,
};
use x509_cert::name::{Name, RdnSequence};
use x509_cert::{Certificate, TbsCertificate};

use crate::{
    environment::pki_environment::PkiEnvironment,
    util::error::*,
    validator::parsed_certificate::{DeferDecodeSigned, ParsedCertificate},
};

/// uid OBJECT IDENTIFIER ::= { 0 9 2342 19200300 100 1 1 }
pub const UID: ObjectIdentifier = ObjectIdentifier::new_unwrap("0.9.2342.19200300.100.1.1");

/// `is_self_signed_with_buffer` returns true if the public key in the parsed certificate verifies
/// the TBSCertificate field as parsed from the encoded certificate object.
pub fn is_self_signed_with_buffer(
    pe: &PkiEnvironment<'_>,
    cert: &Certificate,
    enc_cert: &[u8],
) -> bool {
    match DeferDecodeSigned::from_der(enc_cert) {
        Ok(defer_cert) => pe
            .verify_signature_message(
                pe,
                &defer_cert.tbs_field,
                cert.signature.raw_bytes(),
                &cert.tbs_certificate.signature,
                &cert.tbs_certificate.subject_public_key_info,
            )
            .is_ok(),
        Err(e) => {
            error!(
                "Failed to defer decode certificate in is_self_signed with: {}",
                e
            );
            false
        }
    }
}

/// `is_self_signed` returns true if the public key in the certificate can be used to verify the
/// signature on the certificate.
pub fn is_self_signed(pe: &PkiEnvironment<'_>, cert: &ParsedCertificate) -> bool {
    is_self_signed_with_buffer(pe, &cert.decoded_cert, cert.encoded_cert.as_slice())
}

/// `is_self_issued` returns true if the subject field in the certificate is the same as the issuer
/// field.
pub fn is_self_issued(cert: &Certificate) -> bool {
    compare_names(&cert.tbs_certificate.issuer, &cert.tbs_certificate.subject)
}

/// `valid_at_time` evaluates the not_before and not_after fields of the given TBSCertificate
/// relative to the presented time of interest, expressed in seconds since the Unix epoch.
///
/// It returns the number of seconds left to live if the certificate is valid at the given time or
/// an error indicating which field failed otherwise. The not_before field is evaluated first.
/// Passing zero for `toi` disables the check. To stifle logging output upon error, pass true for
/// the stifle_log parameter.
pub fn valid_at_time(target: &TbsCertificate, toi: u64, stifle_log: bool) -> Result<u64> {
    if 0 == toi {
        // zero disables the validity check
        return Ok(0);
    }

    let nb = target.validity.not_before.to_unix_duration().as_secs();
    if nb > toi {
        if !stifle_log {
            log_error_for_name(
                &target.subject,
                "certificate is not yet valid, i.e., not_before is after the configured time of interest",
            );
        }
        return Err(Error::PathValidation(
            PathValidationStatus::InvalidNotBeforeDate,
        ));
    }

    let na = target.validity.not_after.to_unix_duration().as_secs();
    if na < toi {
        if !stifle_log {
            log_error_for_name(
                &target.subject,
                format!(
                    "certificate is expired relative to the configured time of interest: {}",
                    target.validity.not_after
                )
                .as_str(),
            );
        }
        Err(Error::PathValidation(
            PathValidationStatus::InvalidNotAfterDate,
        ))
    } else {
        Ok(na - toi)
    }
}

/// `descended_from_host` returns true if cand is equal to or descended from the host name or host
/// name suffix in prev_name and false otherwise.
pub(crate) fn descended_from_host(prev_name: &Ia5String, cand: &str, is_uri: bool) -> bool {
    let base = prev_name.to_string();
    if cand == base {
        return true;
    }
    let stem = match cand.strip_suffix(base.as_str()) {
        Some(stem) => stem,
        None => return false,
    };
    if is_uri {
        // URI constraints match subdomains only when expressed with a leading period
        base.starts_with('.')
    } else {
        stem.ends_with('.')
    }
}

/// `is_email` returns true if addr is structured as a mailbox, i.e., local-part@domain.
#[cfg(feature = "std")]
pub(crate) fn is_email(addr: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(
            "^([a-z0-9_+]([a-z0-9_+.]*[a-z0-9_+])?)@([a-z0-9]+([-.]{1}[a-z0-9]+)*.[a-z]{2,6})"
        )
        .unwrap();
    }
    EMAIL_RE.captures(addr).is_some()
}

// TODO implement to support rfc822 name constraints for no-std
/// `descended_from_rfc822` returns true if new_name is equal to or descended from prev_name and
/// false otherwise.
///
/// A constraint of the form local-part@domain matches a single mailbox, a bare host name matches
/// all mailboxes on that host and a leading period matches mailboxes on any subordinate domain.
#[cfg(feature = "std")]
pub(crate) fn descended_from_rfc822(prev_name: &Ia5String, new_name: &Ia5String) -> bool {
    let cand = new_name.to_string();
    let base = prev_name.to_string();

    if is_email(base.as_str()) && cand == base {
        return true;
    }
    let stem = match cand.strip_suffix(base.as_str()) {
        Some(stem) => stem,
        None => return false,
    };
    if base.starts_with('.') {
        !stem.ends_with('@')
    } else {
        base.starts_with('@') || stem.ends_with('@')
    }
}

/// `descended_from_dn` returns true if name is equal to or descended from subtree, subject to the
/// minimum and maximum values from the enclosing GeneralSubtree, and false otherwise.
pub(crate) fn descended_from_dn(subtree: &Name, name: &Name, min: u32, max: Option<u32>) -> bool {
    // a name with fewer RDNs than the subtree cannot be subordinate to it
    if subtree.0.len() > name.0.len() {
        return false;
    }

    let diff = (name.0.len() - subtree.0.len()) as u32;
    if diff < min {
        return false;
    }
    if let Some(max) = max {
        if diff > max {
            return false;
        }
    }

    for (srdn, nrdn) in subtree.0.iter().zip(name.0.iter()) {
        if srdn == nrdn {
            continue;
        }
        if !compare_rdns_relaxed(srdn, nrdn) {
            return false;
        }
    }
    true
}

/// `has_rfc822` returns true if the given GeneralSubtrees contains at least one RFC822 name and false otherwise
pub(crate) fn has_rfc822(subtrees: &GeneralSubtrees) -> bool {
    subtrees
        .iter()
        .any(|subtree| matches!(&subtree.base, GeneralName::Rfc822Name(_)))
}

/// `has_dns_name` returns true if the given GeneralSubtrees contains at least one DNS name and false otherwise
pub(crate) fn has_dns_name(subtrees: &GeneralSubtrees) -> bool {
    subtrees
        .iter()
        .any(|subtree| matches!(&subtree.base, GeneralName::DnsName(_)))
}

/// `has_dn` returns true if the given GeneralSubtrees contains at least one DN and false otherwise
pub(crate) fn has_dn(subtrees: &GeneralSubtrees) -> bool {
    subtrees
        .iter()
        .any(|subtree| matches!(&subtree.base, GeneralName::DirectoryName(_)))
}

/// `has_uri` returns true if the given GeneralSubtrees contains at least one URI and false otherwise
pub(crate) fn has_uri(subtrees: &GeneralSubtrees) -> bool {
    subtrees
        .iter()
        .any(|subtree| matches!(&subtree.base, GeneralName::UniformResourceIdentifier(_)))
}

/// `has_ip_address` returns true if the given GeneralSubtrees contains at least one IP address and false otherwise
pub(crate) fn has_ip_address(subtrees: &GeneralSubtrees) -> bool {
    subtrees
        .iter()
        .any(|subtree| matches!(&subtree.base, GeneralName::IpAddress(_)))
}

pub(crate) fn log_error_for_name(name: &Name, msg: &str) {
    error!(
        "Encountered error while processing certificate with subject {}: {}",
        name_to_string(name),
        msg
    );
}

pub(crate) fn log_error_for_ca(ca: &ParsedCertificate, msg: &str) {
    log_error_for_name(&ca.decoded_cert.tbs_certificate.subject, msg);
}

/// log a message with subject name of the certificate appended
pub fn log_error_for_subject(cert: &Certificate, msg: &str) {
    log_error_for_name(&cert.tbs_certificate.subject, msg);
}

const OID_NAMES: &[(ObjectIdentifier, &str)] = &[
    (
        crate::util::alg_oids::PKIXALG_SHA224_WITH_RSA_ENCRYPTION,
        "SHA224 with RSA Encryption",
    ),
    (
        crate::util::alg_oids::PKIXALG_SHA256_WITH_RSA_ENCRYPTION,
        "SHA256 with RSA Encryption",
    ),
    (
        crate::util::alg_oids::PKIXALG_SHA384_WITH_RSA_ENCRYPTION,
        "SHA384 with RSA Encryption",
    ),
    (
        crate::util::alg_oids::PKIXALG_SHA512_WITH_RSA_ENCRYPTION,
        "SHA512 with RSA Encryption",
    ),
    (
        crate::util::alg_oids::PKIXALG_RSA_ENCRYPTION,
        "RSA Encryption",
    ),
    (crate::util::alg_oids::PKIXALG_EC_PUBLIC_KEY, "EC Public Key"),
    (NAME, "name"),
    (SURNAME, "sn"),
    (GIVEN_NAME, "givenName"),
    (INITIALS, "initials"),
    (GENERATION_QUALIFIER, "generationQualifier"),
    (COMMON_NAME, "cn"),
    (LOCALITY_NAME, "l"),
    (STATE_OR_PROVINCE_NAME, "st"),
    (STREET, "street"),
    (ORGANIZATIONAL_UNIT_NAME, "ou"),
    (ORGANIZATION_NAME, "o"),
    (TITLE, "title"),
    (DN_QUALIFIER, "dnQualifier"),
    (COUNTRY_NAME, "c"),
    (SERIAL_NUMBER, "serialNumber"),
    (PSEUDONYM, "pseudonym"),
    (DOMAIN_COMPONENT, "dc"),
    (EMAIL_ADDRESS, "emailAddress"),
    (UID, "uid"),
];

/// `oid_lookup` takes an ObjectIdentifier and returns a string with a friendly name for the OID or
/// Error::NotFound.
pub fn oid_lookup(oid: &ObjectIdentifier) -> Result<String> {
    for (o, label) in OID_NAMES {
        if o == oid {
            return Ok(label.to_string());
        }
    }
    Err(Error::NotFound)
}

const RDN_LABELS: &[(&str, ObjectIdentifier)] = &[
    ("name", NAME),
    ("sn", SURNAME),
    ("givenName", GIVEN_NAME),
    ("initials", INITIALS),
    ("generationQualifier", GENERATION_QUALIFIER),
    ("cn", COMMON_NAME),
    ("l", LOCALITY_NAME),
    ("st", STATE_OR_PROVINCE_NAME),
    ("street", STREET),
    ("ou", ORGANIZATIONAL_UNIT_NAME),
    ("o", ORGANIZATION_NAME),
    ("title", TITLE),
    ("dnQualifier", DN_QUALIFIER),
    ("c", COUNTRY_NAME),
    ("serialNumber", SERIAL_NUMBER),
    ("pseudonym", PSEUDONYM),
    ("dc", DOMAIN_COMPONENT),
    ("emailAddress", EMAIL_ADDRESS),
    ("uid", UID),
];

/// `rdn_oid_lookup` takes a string, notionally an attribute label from a distinguished name, and
/// returns either an ObjectIdentifier that corresponds to that string or Error::Unrecognized.
pub fn rdn_oid_lookup(label: &str) -> Result<ObjectIdentifier> {
    for (l, oid) in RDN_LABELS {
        if l.eq_ignore_ascii_case(label) {
            return Ok(*oid);
        }
    }
    if let Ok(oid) = ObjectIdentifier::from_str(label) {
        return Ok(oid);
    }
    Err(Error::Unrecognized)
}

/// `encode_dn_from_string` takes a string representation of a distinguished name and returns the
/// DER encoding of that name.
pub fn encode_dn_from_string(string: &str) -> Result<Vec<u8>> {
    let rdn = RdnSequence::from_str(string)?;
    Ok(rdn.to_der()?)
}

/// `name_to_string` returns a string representation of given Name value.
pub fn name_to_string(name: &Name) -> String {
    name.to_string()
}

/// `atav_to_string` returns the value from an AttributeTypeAndValue as an RFC 4514 style string
/// for use in comparing values where character set or whitespace may vary.
pub fn atav_to_string(atav: &AttributeTypeAndValue) -> Result<String> {
    let val = match atav.value.tag() {
        der::Tag::PrintableString => atav
            .value
            .decode_as()
            .ok()
            .map(|s: PrintableString| s.to_string()),
        der::Tag::Utf8String => atav
            .value
            .decode_as()
            .ok()
            .map(|s: Utf8StringRef<'_>| s.to_string()),
        der::Tag::Ia5String => atav
            .value
            .decode_as()
            .ok()
            .map(|s: Ia5String| s.to_string()),
        _ => None,
    };

    let mut s = String::new();
    match val {
        Some(val) => {
            let mut iter = val.char_indices().peekable();
            while let Some((i, c)) = iter.next() {
                match c {
                    '#' if i == 0 => s.push_str("\\#"),
                    ' ' if i == 0 || iter.peek().is_none() => s.push_str("\\ "),
                    '"' | '+' | ',' | ';' | '<' | '>' | '\\' => {
                        s.push_str(format!("\\{}", c).as_str())
                    }
                    '\x00'..='\x1f' | '\x7f' => s.push_str(format!("\\{:02x}", c as u8).as_str()),
                    _ => s.push(c),
                }
            }
        }
        None => {
            let val = atav.value.to_der()?;
            s.push_str(format!("{}=#", atav.oid).as_str());
            for c in val {
                s.push_str(format!("{:02x}", c).as_str());
            }
        }
    }
    Ok(s)
}

/// Compares attribute values after unescaping, trimming and lowercasing, collapsing interior
/// whitespace runs where the regex support is available.
fn compare_atav_values_relaxed(l: &AttributeTypeAndValue, r: &AttributeTypeAndValue) -> bool {
    let l_str_val = match atav_to_string(l) {
        Ok(val) => val.replace("\\ ", " "),
        Err(_e) => return false,
    };
    let r_str_val = match atav_to_string(r) {
        Ok(val) => val.replace("\\ ", " "),
        Err(_e) => return false,
    };

    let l_val = l_str_val.trim().to_lowercase();
    let r_val = r_str_val.trim().to_lowercase();
    if l_val == r_val {
        return true;
    }

    #[cfg(feature = "std")]
    {
        lazy_static! {
            static ref WS_RE: Regex = Regex::new(r"\s+").unwrap();
        }
        WS_RE.replace_all(l_val.as_str(), " ") == WS_RE.replace_all(r_val.as_str(), " ")
    }
    #[cfg(not(feature = "std"))]
    {
        // TODO implement to support name comparison with whitespace issues for no-std
        false
    }
}

/// Compares two RDNs allowing for character set and case differences between attribute values.
fn compare_rdns_relaxed(
    lrdn: &x509_cert::name::RelativeDistinguishedName,
    rrdn: &x509_cert::name::RelativeDistinguishedName,
) -> bool {
    if lrdn.0.len() != rrdn.0.len() {
        return false;
    }
    for j in 0..lrdn.0.len() {
        let (l, r) = match (lrdn.0.get(j), rrdn.0.get(j)) {
            (Some(l), Some(r)) => (l, r),
            (None, None) => continue,
            _ => return false,
        };
        if l.oid != r.oid {
            // attribute types must line up, i.e., c, cn, o
            return false;
        }
        if l.value.value() == r.value.value() {
            continue;
        }
        if !compare_atav_values_relaxed(l, r) {
            return false;
        }
    }
    true
}

/// `compare_names` compares two Name values as described in RFC 5280 section 7.1, returning true
/// if they match and false otherwise.
///
/// The comparison is order-sensitive across RDNs with attribute values compared without regard to
/// case or redundant interior whitespace.
pub fn compare_names(left: &Name, right: &Name) -> bool {
    // no match if not the same number of RDNs
    if left.0.len() != right.0.len() {
        return false;
    }

    for (lrdn, rrdn) in left.0.iter().zip(right.0.iter()) {
        if lrdn == rrdn {
            continue;
        }
        if !compare_rdns_relaxed(lrdn, rrdn) {
            return false;
        }
    }
    true
}

/// Retrieves a string value from the last RDN element in the presented Name.
pub fn get_leaf_rdn(name: &Name) -> String {
    match name.0.last() {
        Some(rdn) => rdn.to_string(),
        None => String::new(),
    }
}

pub(crate) fn general_subtree_to_string(gs: &GeneralSubtree) -> String {
    match &gs.base {
        GeneralName::DirectoryName(dn) => {
            format!("DirectoryName: {}", dn)
        }
        GeneralName::UniformResourceIdentifier(uri) => {
            format!("UniformResourceIdentifier: {}", uri)
        }
        GeneralName::DnsName(dns) => format!("DnsName: {}", dns),
        GeneralName::Rfc822Name(rfc822) => {
            format!("Rfc822Name: {}", rfc822)
        }
        GeneralName::OtherName(_on) => format!("OtherName: {:?}", gs.base),
        GeneralName::RegisteredId(_rid) => format!("RegisteredId: {:?}", gs.base),
        GeneralName::IpAddress(_ip) => format!("IpAddress: {:?}", gs.base),
        GeneralName::EdiPartyName(_ep) => format!("EdiPartyName: {:?}", gs.base),
    }
}

#[test]
fn compare_names_test() {
    let bob1 = Name::from_str("cn=Bob,o=Example,c=US").unwrap();
    let bob2 = Name::from_str("cn=bob,o=EXAMPLE,c=us").unwrap();
    let alice = Name::from_str("cn=Alice,o=Example,c=US").unwrap();
    let bob_short = Name::from_str("o=Example,c=US").unwrap();
    assert!(compare_names(&bob1, &bob1));
    assert!(compare_names(&bob1, &bob2));
    assert!(!compare_names(&bob1, &alice));
    assert!(!compare_names(&bob1, &bob_short));

    // same attributes in a different RDN order must not match
    let reordered = Name::from_str("o=Example,cn=Bob,c=US").unwrap();
    assert!(!compare_names(&bob1, &reordered));
}

#[test]
fn descended_from_dn_test() {
    let subtree = Name::from_str("o=Example,c=US").unwrap();
    let leaf = Name::from_str("cn=Bob,ou=People,o=Example,c=US").unwrap();
    let outside = Name::from_str("cn=Bob,o=Other,c=US").unwrap();
    assert!(descended_from_dn(&subtree, &leaf, 0, None));
    assert!(descended_from_dn(&subtree, &subtree, 0, None));
    assert!(!descended_from_dn(&subtree, &outside, 0, None));
    assert!(!descended_from_dn(&leaf, &subtree, 0, None));

    // minimum and maximum constrain the number of additional RDNs
    assert!(!descended_from_dn(&subtree, &leaf, 3, None));
    assert!(!descended_from_dn(&subtree, &leaf, 0, Some(1)));
    assert!(descended_from_dn(&subtree, &leaf, 1, Some(2)));
}

#[test]
fn descended_from_host_test() {
    let base = Ia5String::new("example.com").unwrap();
    assert!(descended_from_host(&base, "example.com", false));
    assert!(descended_from_host(&base, "sub.example.com", false));
    assert!(!descended_from_host(&base, "badexample.com", false));
    assert!(!descended_from_host(&base, "example.org", false));

    // URI constraints require a leading period to match subdomains
    assert!(!descended_from_host(&base, "sub.example.com", true));
    let dotted = Ia5String::new(".example.com").unwrap();
    assert!(descended_from_host(&dotted, "sub.example.com", true));
}

#[cfg(feature = "std")]
#[test]
fn descended_from_rfc822_test() {
    let mailbox = Ia5String::new("bob@example.com").unwrap();
    let host = Ia5String::new("example.com").unwrap();
    let domain = Ia5String::new(".example.com").unwrap();

    let bob = Ia5String::new("bob@example.com").unwrap();
    let alice_sub = Ia5String::new("alice@mail.example.com").unwrap();

    assert!(descended_from_rfc822(&mailbox, &bob));
    assert!(descended_from_rfc822(&host, &bob));
    assert!(!descended_from_rfc822(&host, &alice_sub));
    assert!(descended_from_rfc822(&domain, &alice_sub));

    assert!(is_email("bob@example.com"));
    assert!(!is_email("example.com"));
}

#[test]
fn oid_lookup_test() {
    use crate::util::alg_oids::PKIXALG_SHA256_WITH_RSA_ENCRYPTION;
    assert_eq!(
        "SHA256 with RSA Encryption",
        oid_lookup(&PKIXALG_SHA256_WITH_RSA_ENCRYPTION).unwrap()
    );
    assert_eq!("cn", oid_lookup(&COMMON_NAME).unwrap());
    assert_eq!("uid", oid_lookup(&UID).unwrap());
    let unknown = ObjectIdentifier::new_unwrap("1.2.3.4.5");
    assert_eq!(Err(Error::NotFound), oid_lookup(&unknown));
}

#[test]
fn rdn_oid_lookup_test() {
    assert_eq!(COMMON_NAME, rdn_oid_lookup("cn").unwrap());
    assert_eq!(COMMON_NAME, rdn_oid_lookup("CN").unwrap());
    assert_eq!(GIVEN_NAME, rdn_oid_lookup("givenname").unwrap());
    assert_eq!(
        ObjectIdentifier::new_unwrap("1.2.3.4"),
        rdn_oid_lookup("1.2.3.4").unwrap()
    );
    assert_eq!(Err(Error::Unrecognized), rdn_oid_lookup("not a label"));
}

#[test]
fn encode_dn_from_string_test() {
    let der = encode_dn_from_string("cn=Bob,o=Example,c=US").unwrap();
    let name = Name::from_der(der.as_slice()).unwrap();
    assert_eq!(3, name.0.len());
    assert!(encode_dn_from_string("not a name").is_err());
}
