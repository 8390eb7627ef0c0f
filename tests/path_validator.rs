#![cfg(feature = "std")]

//! End-to-end path building and validation tests using a small generated PKI. All certificates
//! are signed with P-256 keys derived from fixed seeds so that signature verification is
//! exercised for real, without any file-based artifacts.

use core::str::FromStr;
use core::time::Duration;

use der::asn1::{BitString, ObjectIdentifier, OctetString, UtcTime};
use der::{Any, Encode};
use p256::ecdsa::{signature::Signer, Signature, SigningKey, VerifyingKey};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::ext::pkix::{
    AuthorityKeyIdentifier, BasicConstraints, KeyUsage, KeyUsages, SubjectKeyIdentifier,
};
use x509_cert::ext::Extension;
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::time::{Time, Validity};
use x509_cert::{Certificate, TbsCertificate, Version};

use const_oid::db::rfc5912::{
    ID_CE_AUTHORITY_KEY_IDENTIFIER, ID_CE_BASIC_CONSTRAINTS, ID_CE_KEY_USAGE,
    ID_CE_SUBJECT_KEY_IDENTIFIER,
};

use certpath::*;

/// Notional time of interest used throughout, i.e., 2023-11-14. Generated certificates are valid
/// from 2017 through 2046 unless a test says otherwise.
const TOI: u64 = 1_700_000_000;
const NOT_BEFORE: u64 = 1_500_000_000;
const NOT_AFTER: u64 = 2_400_000_000;

struct TestKey {
    signing_key: SigningKey,
    spki: SubjectPublicKeyInfoOwned,
    skid: Vec<u8>,
}

fn make_key(seed: u8, skid: u8) -> TestKey {
    let signing_key = SigningKey::from_slice(&[seed; 32]).unwrap();
    let verifying_key = VerifyingKey::from(&signing_key);
    let spki = SubjectPublicKeyInfoOwned {
        algorithm: AlgorithmIdentifierOwned {
            oid: PKIXALG_EC_PUBLIC_KEY,
            parameters: Some(Any::encode_from(&PKIXALG_SECP256R1).unwrap()),
        },
        subject_public_key: BitString::from_bytes(
            verifying_key.to_encoded_point(false).as_bytes(),
        )
        .unwrap(),
    };
    TestKey {
        signing_key,
        spki,
        skid: vec![skid; 20],
    }
}

fn ecdsa_alg() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: PKIXALG_ECDSA_WITH_SHA256,
        parameters: None,
    }
}

fn utc(secs: u64) -> Time {
    Time::UtcTime(UtcTime::from_unix_duration(Duration::from_secs(secs)).unwrap())
}

fn ext(oid: ObjectIdentifier, critical: bool, value: &impl Encode) -> Extension {
    Extension {
        extn_id: oid,
        critical,
        extn_value: OctetString::new(value.to_der().unwrap()).unwrap(),
    }
}

fn issue_cert_with_validity(
    subject: &str,
    serial: &[u8],
    issuer: &str,
    issuer_key: &TestKey,
    subject_key: &TestKey,
    ca: bool,
    not_before: u64,
    not_after: u64,
) -> Vec<u8> {
    let mut exts = vec![
        ext(
            ID_CE_SUBJECT_KEY_IDENTIFIER,
            false,
            &SubjectKeyIdentifier(OctetString::new(subject_key.skid.clone()).unwrap()),
        ),
        ext(
            ID_CE_AUTHORITY_KEY_IDENTIFIER,
            false,
            &AuthorityKeyIdentifier {
                key_identifier: Some(OctetString::new(issuer_key.skid.clone()).unwrap()),
                authority_cert_issuer: None,
                authority_cert_serial_number: None,
            },
        ),
    ];
    if ca {
        exts.push(ext(
            ID_CE_BASIC_CONSTRAINTS,
            true,
            &BasicConstraints {
                ca: true,
                path_len_constraint: None,
            },
        ));
        exts.push(ext(
            ID_CE_KEY_USAGE,
            true,
            &KeyUsage(KeyUsages::KeyCertSign | KeyUsages::CRLSign),
        ));
    }
    let tbs = TbsCertificate {
        version: Version::V3,
        serial_number: SerialNumber::new(serial).unwrap(),
        signature: ecdsa_alg(),
        issuer: Name::from_str(issuer).unwrap(),
        validity: Validity {
            not_before: utc(not_before),
            not_after: utc(not_after),
        },
        subject: Name::from_str(subject).unwrap(),
        subject_public_key_info: subject_key.spki.clone(),
        issuer_unique_id: None,
        subject_unique_id: None,
        extensions: Some(exts),
    };
    let tbs_der = tbs.to_der().unwrap();
    let signature: Signature = issuer_key.signing_key.sign(&tbs_der);
    let cert = Certificate {
        tbs_certificate: tbs,
        signature_algorithm: ecdsa_alg(),
        signature: BitString::from_bytes(signature.to_der().as_bytes()).unwrap(),
    };
    cert.to_der().unwrap()
}

fn issue_cert(
    subject: &str,
    serial: &[u8],
    issuer: &str,
    issuer_key: &TestKey,
    subject_key: &TestKey,
    ca: bool,
) -> Vec<u8> {
    issue_cert_with_validity(
        subject, serial, issuer, issuer_key, subject_key, ca, NOT_BEFORE, NOT_AFTER,
    )
}

fn default_settings() -> CertificationPathSettings {
    let mut cps = CertificationPathSettings::default();
    cps.set_time_of_interest(TOI);
    cps.set_check_revocation_status(false);
    cps
}

#[test]
fn build_and_validate_two_step_path() {
    let ta_key = make_key(1, 0x11);
    let ca_key = make_key(2, 0x22);
    let ee_key = make_key(3, 0x33);

    let ta_der = issue_cert("CN=Example Root", &[1], "CN=Example Root", &ta_key, &ta_key, true);
    let ca_der = issue_cert("CN=Example CA", &[2], "CN=Example Root", &ta_key, &ca_key, true);
    let ee_der = issue_cert("CN=Example EE", &[3], "CN=Example CA", &ca_key, &ee_key, false);

    let cps = default_settings();

    let mut ta_store = TaStore::new();
    ta_store.push(CertBuffer {
        locator: "ta".to_string(),
        bytes: ta_der,
    });
    ta_store.initialize().unwrap();

    let mut pool = CertPool::new();
    pool.push(CertBuffer {
        locator: "ca".to_string(),
        bytes: ca_der,
    });
    pool.initialize(&cps).unwrap();

    let mut pe = PkiEnvironment::default();
    populate_5280_pki_environment(&mut pe);
    pe.add_trust_anchor_source(&ta_store);
    pool.find_all_partial_paths(&pe, &cps);
    pe.add_certificate_source(&pool);
    pe.add_path_builder(&pool);

    let target = ParsedCertificate::try_from(ee_der.as_slice()).unwrap();
    let mut paths = vec![];
    pe.get_paths_for_target(&pe, &target, &mut paths, 0, TOI)
        .unwrap();
    assert_eq!(1, paths.len());
    assert_eq!(1, paths[0].intermediates.len());

    let mut cpr = CertificationPathResults::new();
    assert!(pe.validate_path(&pe, &cps, &mut paths[0], &mut cpr).is_ok());
    assert_eq!(
        Some(PathValidationStatus::Valid),
        cpr.get_validation_status()
    );
}

#[test]
fn trust_anchor_issued_target() {
    let ta_key = make_key(1, 0x11);
    let ee_key = make_key(2, 0x22);

    let ta_der = issue_cert("CN=Example Root", &[1], "CN=Example Root", &ta_key, &ta_key, true);
    let ee_der = issue_cert("CN=Example EE", &[4], "CN=Example Root", &ta_key, &ee_key, false);

    let cps = default_settings();

    let mut ta_store = TaStore::new();
    ta_store.push(CertBuffer {
        locator: "ta".to_string(),
        bytes: ta_der,
    });
    ta_store.initialize().unwrap();

    let mut pool = CertPool::new();
    pool.initialize(&cps).unwrap();

    let mut pe = PkiEnvironment::default();
    populate_5280_pki_environment(&mut pe);
    pe.add_trust_anchor_source(&ta_store);
    pool.find_all_partial_paths(&pe, &cps);
    pe.add_path_builder(&pool);

    let target = ParsedCertificate::try_from(ee_der.as_slice()).unwrap();
    let mut paths = vec![];
    pe.get_paths_for_target(&pe, &target, &mut paths, 0, TOI)
        .unwrap();
    assert_eq!(1, paths.len());
    assert!(paths[0].intermediates.is_empty());

    let mut cpr = CertificationPathResults::new();
    assert!(pe.validate_path(&pe, &cps, &mut paths[0], &mut cpr).is_ok());
    assert_eq!(
        Some(PathValidationStatus::Valid),
        cpr.get_validation_status()
    );
}

#[test]
fn expired_target_yields_no_paths() {
    let ta_key = make_key(1, 0x11);
    let ee_key = make_key(2, 0x22);

    let ta_der = issue_cert("CN=Example Root", &[1], "CN=Example Root", &ta_key, &ta_key, true);
    // expired well before the time of interest
    let ee_der = issue_cert_with_validity(
        "CN=Example EE",
        &[4],
        "CN=Example Root",
        &ta_key,
        &ee_key,
        false,
        NOT_BEFORE,
        1_600_000_000,
    );

    let cps = default_settings();

    let mut ta_store = TaStore::new();
    ta_store.push(CertBuffer {
        locator: "ta".to_string(),
        bytes: ta_der,
    });
    ta_store.initialize().unwrap();

    let mut pool = CertPool::new();
    pool.initialize(&cps).unwrap();

    let mut pe = PkiEnvironment::default();
    populate_5280_pki_environment(&mut pe);
    pe.add_trust_anchor_source(&ta_store);
    pool.find_all_partial_paths(&pe, &cps);
    pe.add_path_builder(&pool);

    let target = ParsedCertificate::try_from(ee_der.as_slice()).unwrap();
    let mut paths = vec![];
    pe.get_paths_for_target(&pe, &target, &mut paths, 0, TOI)
        .unwrap();
    assert!(paths.is_empty());
}

#[test]
fn missing_basic_constraints_fails() {
    let ta_key = make_key(1, 0x11);
    let ca_key = make_key(2, 0x22);
    let ee_key = make_key(3, 0x33);

    let ta_der = issue_cert("CN=Example Root", &[1], "CN=Example Root", &ta_key, &ta_key, true);
    // intermediate issued without basicConstraints or keyUsage
    let ca_der = issue_cert("CN=Example CA", &[2], "CN=Example Root", &ta_key, &ca_key, false);
    let ee_der = issue_cert("CN=Example EE", &[3], "CN=Example CA", &ca_key, &ee_key, false);

    let cps = default_settings();

    let ta = ParsedTrustAnchor::try_from(ta_der.as_slice()).unwrap();
    let ca = ParsedCertificate::try_from(ca_der.as_slice()).unwrap();
    let ee = ParsedCertificate::try_from(ee_der.as_slice()).unwrap();
    let mut path = CertificationPath::new(ta, vec![ca], ee);

    let mut pe = PkiEnvironment::default();
    populate_5280_pki_environment(&mut pe);

    let mut cpr = CertificationPathResults::new();
    assert_eq!(
        Err(Error::PathValidation(
            PathValidationStatus::MissingBasicConstraints
        )),
        pe.validate_path(&pe, &cps, &mut path, &mut cpr)
    );
    assert_eq!(
        Some(PathValidationStatus::MissingBasicConstraints),
        cpr.get_validation_status()
    );
    assert_eq!(Some(0), cpr.get_failed_cert_index());
}

#[test]
fn name_chaining_failure() {
    let ta_key = make_key(1, 0x11);
    let ca_key = make_key(2, 0x22);
    let ee_key = make_key(3, 0x33);

    let ta_der = issue_cert("CN=Example Root", &[1], "CN=Example Root", &ta_key, &ta_key, true);
    let ca_der = issue_cert("CN=Example CA", &[2], "CN=Example Root", &ta_key, &ca_key, true);
    // issuer name does not match the subject of the issuing CA
    let ee_der = issue_cert("CN=Example EE", &[3], "CN=Other CA", &ca_key, &ee_key, false);

    let cps = default_settings();

    let ta = ParsedTrustAnchor::try_from(ta_der.as_slice()).unwrap();
    let ca = ParsedCertificate::try_from(ca_der.as_slice()).unwrap();
    let ee = ParsedCertificate::try_from(ee_der.as_slice()).unwrap();
    let mut path = CertificationPath::new(ta, vec![ca], ee);

    let mut pe = PkiEnvironment::default();
    populate_5280_pki_environment(&mut pe);

    let mut cpr = CertificationPathResults::new();
    assert_eq!(
        Err(Error::PathValidation(
            PathValidationStatus::NameChainingFailure
        )),
        pe.validate_path(&pe, &cps, &mut path, &mut cpr)
    );
}

#[test]
fn signature_verification_failure() {
    let ta_key = make_key(1, 0x11);
    let ca_key = make_key(2, 0x22);
    let ee_key = make_key(3, 0x33);
    // rogue key carries the CA's key identifier but a different signing key
    let rogue_key = make_key(4, 0x22);

    let ta_der = issue_cert("CN=Example Root", &[1], "CN=Example Root", &ta_key, &ta_key, true);
    let ca_der = issue_cert("CN=Example CA", &[2], "CN=Example Root", &ta_key, &ca_key, true);
    let ee_der = issue_cert("CN=Example EE", &[3], "CN=Example CA", &rogue_key, &ee_key, false);

    let cps = default_settings();

    let ta = ParsedTrustAnchor::try_from(ta_der.as_slice()).unwrap();
    let ca = ParsedCertificate::try_from(ca_der.as_slice()).unwrap();
    let ee = ParsedCertificate::try_from(ee_der.as_slice()).unwrap();
    let mut path = CertificationPath::new(ta, vec![ca], ee);

    let mut pe = PkiEnvironment::default();
    populate_5280_pki_environment(&mut pe);

    let mut cpr = CertificationPathResults::new();
    assert_eq!(
        Err(Error::PathValidation(
            PathValidationStatus::SignatureVerificationFailure
        )),
        pe.validate_path(&pe, &cps, &mut path, &mut cpr)
    );
    assert_eq!(Some(1), cpr.get_failed_cert_index());
}

#[test]
fn initial_path_length_constraint_enforced() {
    let ta_key = make_key(1, 0x11);
    let ca_key = make_key(2, 0x22);
    let ee_key = make_key(3, 0x33);

    let ta_der = issue_cert("CN=Example Root", &[1], "CN=Example Root", &ta_key, &ta_key, true);
    let ca_der = issue_cert("CN=Example CA", &[2], "CN=Example Root", &ta_key, &ca_key, true);
    let ee_der = issue_cert("CN=Example EE", &[3], "CN=Example CA", &ca_key, &ee_key, false);

    let mut cps = default_settings();
    cps.set_initial_path_length_constraint(0);

    let ta = ParsedTrustAnchor::try_from(ta_der.as_slice()).unwrap();
    let ca = ParsedCertificate::try_from(ca_der.as_slice()).unwrap();
    let ee = ParsedCertificate::try_from(ee_der.as_slice()).unwrap();
    let mut path = CertificationPath::new(ta, vec![ca], ee);

    let mut pe = PkiEnvironment::default();
    populate_5280_pki_environment(&mut pe);

    let mut cpr = CertificationPathResults::new();
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::InvalidPathLength)),
        pe.validate_path(&pe, &cps, &mut path, &mut cpr)
    );
}

#[test]
fn selector_matches_certificates_in_pool() {
    let ta_key = make_key(1, 0x11);
    let ca_key = make_key(2, 0x22);

    let ca_der = issue_cert("CN=Example CA", &[2], "CN=Example Root", &ta_key, &ca_key, true);

    let cps = default_settings();

    let mut pool = CertPool::new();
    pool.push(CertBuffer {
        locator: "ca".to_string(),
        bytes: ca_der,
    });
    pool.initialize(&cps).unwrap();

    let mut pe = PkiEnvironment::default();
    populate_5280_pki_environment(&mut pe);
    pe.add_certificate_source(&pool);

    let mut sel = CertificateSelector::new();
    sel.set_subject_from_string("CN=Example CA").unwrap();
    assert_eq!(1, pe.get_certificates_matching(&sel).unwrap().len());

    // narrowing by a mismatched serial number excludes the candidate
    sel.serial_number = Some(SerialNumber::new(&[9]).unwrap());
    assert!(pe.get_certificates_matching(&sel).unwrap().is_empty());

    let mut ku_sel = CertificateSelector::new();
    ku_sel.key_usage = Some(KeyUsages::KeyCertSign.into());
    assert_eq!(1, pe.get_certificates_matching(&ku_sel).unwrap().len());

    let mut validity_sel = CertificateSelector::new();
    validity_sel.certificate_valid = Some(TOI);
    assert_eq!(1, pe.get_certificates_matching(&validity_sel).unwrap().len());
    validity_sel.certificate_valid = Some(NOT_BEFORE - 1);
    assert!(pe
        .get_certificates_matching(&validity_sel)
        .unwrap()
        .is_empty());

    let mut skid_sel = CertificateSelector::new();
    skid_sel.subject_key_identifier = Some(vec![0x22; 20]);
    assert_eq!(1, pe.get_certificates_matching(&skid_sel).unwrap().len());
}
