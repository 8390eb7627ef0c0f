#![cfg(all(feature = "std", feature = "revocation"))]

//! CRL-based revocation status tests using a small generated PKI. A CRL store is populated with
//! CRLs signed by the same P-256 keys that sign the certificates, so CRL signature verification
//! is exercised for real.

use core::str::FromStr;
use core::time::Duration;

use der::asn1::{BitString, ObjectIdentifier, OctetString, UtcTime};
use der::{Any, Decode, Encode};
use p256::ecdsa::{signature::Signer, Signature, SigningKey, VerifyingKey};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};
use x509_cert::crl::{CertificateList, RevokedCert, TbsCertList};
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

const TOI: u64 = 1_700_000_000;
const NOT_BEFORE: u64 = 1_500_000_000;
const NOT_AFTER: u64 = 2_400_000_000;
const THIS_UPDATE: u64 = 1_650_000_000;

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

fn issue_cert(
    subject: &str,
    serial: &[u8],
    issuer: &str,
    issuer_key: &TestKey,
    subject_key: &TestKey,
    ca: bool,
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
            not_before: utc(NOT_BEFORE),
            not_after: utc(NOT_AFTER),
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

fn issue_crl(issuer: &str, issuer_key: &TestKey, serials: &[&[u8]]) -> Vec<u8> {
    let revoked: Vec<RevokedCert> = serials
        .iter()
        .map(|s| RevokedCert {
            serial_number: SerialNumber::new(s).unwrap(),
            revocation_date: utc(THIS_UPDATE),
            crl_entry_extensions: None,
        })
        .collect();
    let tbs = TbsCertList {
        version: Version::V2,
        signature: ecdsa_alg(),
        issuer: Name::from_str(issuer).unwrap(),
        this_update: utc(THIS_UPDATE),
        next_update: Some(utc(NOT_AFTER)),
        revoked_certificates: if revoked.is_empty() {
            None
        } else {
            Some(revoked)
        },
        crl_extensions: None,
    };
    let tbs_der = tbs.to_der().unwrap();
    let signature: Signature = issuer_key.signing_key.sign(&tbs_der);
    let crl = CertificateList {
        tbs_cert_list: tbs,
        signature_algorithm: ecdsa_alg(),
        signature: BitString::from_bytes(signature.to_der().as_bytes()).unwrap(),
    };
    crl.to_der().unwrap()
}

fn add_crl_to_store(store: &CrlStore, crl_der: &[u8]) {
    let crl = CertificateList::from_der(crl_der).unwrap();
    store.add_crl(crl_der, &crl).unwrap();
}

struct TestPki {
    ta_key: TestKey,
    ca_key: TestKey,
    ta_der: Vec<u8>,
    ca_der: Vec<u8>,
    ee_der: Vec<u8>,
}

fn build_pki() -> TestPki {
    let ta_key = make_key(1, 0x11);
    let ca_key = make_key(2, 0x22);
    let ee_key = make_key(3, 0x33);

    let ta_der = issue_cert("CN=Example Root", &[1], "CN=Example Root", &ta_key, &ta_key, true);
    let ca_der = issue_cert("CN=Example CA", &[2], "CN=Example Root", &ta_key, &ca_key, true);
    let ee_der = issue_cert("CN=Example EE", &[3], "CN=Example CA", &ca_key, &ee_key, false);

    TestPki {
        ta_key,
        ca_key,
        ta_der,
        ca_der,
        ee_der,
    }
}

fn settings_with_revocation() -> CertificationPathSettings {
    let mut cps = CertificationPathSettings::default();
    cps.set_time_of_interest(TOI);
    cps.set_check_revocation_status(true);
    cps
}

fn validate_with_crls(
    pki: &TestPki,
    cps: &CertificationPathSettings,
    crl_store: &CrlStore,
) -> (Result<()>, CertificationPathResults) {
    let mut ta_store = TaStore::new();
    ta_store.push(CertBuffer {
        locator: "ta".to_string(),
        bytes: pki.ta_der.clone(),
    });
    ta_store.initialize().unwrap();

    let mut pool = CertPool::new();
    pool.push(CertBuffer {
        locator: "ca".to_string(),
        bytes: pki.ca_der.clone(),
    });
    pool.initialize(cps).unwrap();

    let mut pe = PkiEnvironment::default();
    populate_5280_pki_environment(&mut pe);
    pe.add_trust_anchor_source(&ta_store);
    pool.find_all_partial_paths(&pe, cps);
    pe.add_certificate_source(&pool);
    pe.add_path_builder(&pool);
    pe.add_crl_source(crl_store);
    pe.add_revocation_checker(crl_store);

    let target = ParsedCertificate::try_from(pki.ee_der.as_slice()).unwrap();
    let mut paths = vec![];
    pe.get_paths_for_target(&pe, &target, &mut paths, 0, TOI)
        .unwrap();
    assert_eq!(1, paths.len());

    let mut cpr = CertificationPathResults::new();
    let r = pe.validate_path(&pe, cps, &mut paths[0], &mut cpr);
    (r, cpr)
}

#[test]
fn crl_based_status_valid() {
    let pki = build_pki();
    let cps = settings_with_revocation();

    let crl_store = CrlStore::new();
    add_crl_to_store(&crl_store, &issue_crl("CN=Example Root", &pki.ta_key, &[]));
    add_crl_to_store(&crl_store, &issue_crl("CN=Example CA", &pki.ca_key, &[]));

    let (r, cpr) = validate_with_crls(&pki, &cps, &crl_store);
    assert!(r.is_ok());
    assert_eq!(
        Some(PathValidationStatus::Valid),
        cpr.get_validation_status()
    );
}

#[test]
fn revoked_target_detected() {
    let pki = build_pki();
    let cps = settings_with_revocation();

    let crl_store = CrlStore::new();
    add_crl_to_store(&crl_store, &issue_crl("CN=Example Root", &pki.ta_key, &[]));
    add_crl_to_store(
        &crl_store,
        &issue_crl("CN=Example CA", &pki.ca_key, &[&[3]]),
    );

    let (r, cpr) = validate_with_crls(&pki, &cps, &crl_store);
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::CertificateRevoked)),
        r
    );
    assert_eq!(
        Some(PathValidationStatus::CertificateRevoked),
        cpr.get_validation_status()
    );
    assert_eq!(Some(1), cpr.get_failed_cert_index());
}

#[test]
fn revoked_intermediate_detected() {
    let pki = build_pki();
    let cps = settings_with_revocation();

    let crl_store = CrlStore::new();
    add_crl_to_store(
        &crl_store,
        &issue_crl("CN=Example Root", &pki.ta_key, &[&[2]]),
    );
    add_crl_to_store(&crl_store, &issue_crl("CN=Example CA", &pki.ca_key, &[]));

    let (r, cpr) = validate_with_crls(&pki, &cps, &crl_store);
    assert_eq!(
        Err(Error::PathValidation(PathValidationStatus::CertificateRevoked)),
        r
    );
    assert_eq!(Some(0), cpr.get_failed_cert_index());
}

#[test]
fn missing_crl_not_determined() {
    let pki = build_pki();
    let cps = settings_with_revocation();

    // CRL coverage for the intermediate only, nothing for the target
    let crl_store = CrlStore::new();
    add_crl_to_store(&crl_store, &issue_crl("CN=Example Root", &pki.ta_key, &[]));

    let (r, cpr) = validate_with_crls(&pki, &cps, &crl_store);
    assert_eq!(
        Err(Error::PathValidation(
            PathValidationStatus::RevocationStatusNotDetermined
        )),
        r
    );
    assert_eq!(Some(1), cpr.get_failed_cert_index());
}

#[test]
fn relaxed_when_unavailable() {
    let pki = build_pki();
    let mut cps = settings_with_revocation();
    cps.set_relax_revocation_when_unavailable(true);

    let crl_store = CrlStore::new();
    add_crl_to_store(&crl_store, &issue_crl("CN=Example Root", &pki.ta_key, &[]));

    let (r, cpr) = validate_with_crls(&pki, &cps, &crl_store);
    assert!(r.is_ok());
    assert_eq!(
        Some(PathValidationStatus::Valid),
        cpr.get_validation_status()
    );
}

#[test]
fn stale_crl_is_discarded() {
    let pki = build_pki();
    let cps = settings_with_revocation();

    // next_update precedes the time of interest, so the CRL cannot be used
    let stale = {
        let tbs = TbsCertList {
            version: Version::V2,
            signature: ecdsa_alg(),
            issuer: Name::from_str("CN=Example CA").unwrap(),
            this_update: utc(1_550_000_000),
            next_update: Some(utc(1_600_000_000)),
            revoked_certificates: None,
            crl_extensions: None,
        };
        let tbs_der = tbs.to_der().unwrap();
        let signature: Signature = pki.ca_key.signing_key.sign(&tbs_der);
        CertificateList {
            tbs_cert_list: tbs,
            signature_algorithm: ecdsa_alg(),
            signature: BitString::from_bytes(signature.to_der().as_bytes()).unwrap(),
        }
        .to_der()
        .unwrap()
    };

    let crl_store = CrlStore::new();
    add_crl_to_store(&crl_store, &issue_crl("CN=Example Root", &pki.ta_key, &[]));
    add_crl_to_store(&crl_store, &stale);

    let (r, cpr) = validate_with_crls(&pki, &cps, &crl_store);
    assert_eq!(
        Err(Error::PathValidation(
            PathValidationStatus::RevocationStatusNotDetermined
        )),
        r
    );
    assert_eq!(Some(1), cpr.get_failed_cert_index());
}

#[test]
fn crl_signed_by_wrong_key_is_discarded() {
    let pki = build_pki();
    let cps = settings_with_revocation();
    let rogue_key = make_key(4, 0x44);

    let crl_store = CrlStore::new();
    add_crl_to_store(&crl_store, &issue_crl("CN=Example Root", &pki.ta_key, &[]));
    add_crl_to_store(&crl_store, &issue_crl("CN=Example CA", &rogue_key, &[]));

    let (r, _cpr) = validate_with_crls(&pki, &cps, &crl_store);
    assert_eq!(
        Err(Error::PathValidation(
            PathValidationStatus::RevocationStatusNotDetermined
        )),
        r
    );
}
