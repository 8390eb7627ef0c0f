//! Provides implementations of crypto-related [`PkiEnvironment`] interfaces using libraries from the
//! [Rust Crypto](https://github.com/RustCrypto) project for support.

use alloc::{format, vec::Vec};

use der::{asn1::ObjectIdentifier, Encode};
use p256::ecdsa::{
    signature::Verifier as Verifier256, Signature as Signature256, VerifyingKey as VerifyingKey256,
};
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Sign, RsaPublicKey};
use sha2::{Digest, Sha224, Sha256, Sha384, Sha512};
use spki::{AlgorithmIdentifierOwned, SubjectPublicKeyInfoOwned};

use crate::util::error::{Error, PathValidationStatus, Result};
use crate::{
    environment::pki_environment::*, log_message, util::alg_oids::*, util::logging::PkiLogLevel,
};

/// get_padding_scheme takes an AlgorithmIdentifier containing a signature algorithm and returns
/// a corresponding Pkcs1v15Sign instance.
///
/// At present, only the PKCS1v15Sign padding scheme is supported, relative to the
/// [`PKIXALG_SHA224_WITH_RSA_ENCRYPTION`], [`PKIXALG_SHA256_WITH_RSA_ENCRYPTION`],
/// [`PKIXALG_SHA384_WITH_RSA_ENCRYPTION`] and [`PKIXALG_SHA512_WITH_RSA_ENCRYPTION`] algorithm identifiers.
pub fn get_padding_scheme(signature_alg: &AlgorithmIdentifierOwned) -> Result<Pkcs1v15Sign> {
    if PKIXALG_SHA256_WITH_RSA_ENCRYPTION == signature_alg.oid {
        Ok(Pkcs1v15Sign::new::<Sha256>())
    } else if PKIXALG_SHA384_WITH_RSA_ENCRYPTION == signature_alg.oid {
        Ok(Pkcs1v15Sign::new::<Sha384>())
    } else if PKIXALG_SHA224_WITH_RSA_ENCRYPTION == signature_alg.oid {
        Ok(Pkcs1v15Sign::new::<Sha224>())
    } else if PKIXALG_SHA512_WITH_RSA_ENCRYPTION == signature_alg.oid {
        Ok(Pkcs1v15Sign::new::<Sha512>())
    } else {
        Err(Error::Unrecognized)
    }
}

/// is_rsa returns true if the presented OID is one of [`PKIXALG_SHA224_WITH_RSA_ENCRYPTION`],
/// [`PKIXALG_SHA256_WITH_RSA_ENCRYPTION`], [`PKIXALG_SHA384_WITH_RSA_ENCRYPTION`] or
/// [`PKIXALG_SHA512_WITH_RSA_ENCRYPTION`] and false otherwise.
pub(crate) fn is_rsa(oid: &ObjectIdentifier) -> bool {
    *oid == PKIXALG_SHA256_WITH_RSA_ENCRYPTION
        || *oid == PKIXALG_SHA384_WITH_RSA_ENCRYPTION
        || *oid == PKIXALG_SHA224_WITH_RSA_ENCRYPTION
        || *oid == PKIXALG_SHA512_WITH_RSA_ENCRYPTION
}

/// is_ecdsa returns true if the presented OID is one of [`PKIXALG_ECDSA_WITH_SHA224`],
/// [`PKIXALG_ECDSA_WITH_SHA256`], [`PKIXALG_ECDSA_WITH_SHA384`] or [`PKIXALG_ECDSA_WITH_SHA512`] and false otherwise.
pub(crate) fn is_ecdsa(oid: &ObjectIdentifier) -> bool {
    *oid == PKIXALG_ECDSA_WITH_SHA256
        || *oid == PKIXALG_ECDSA_WITH_SHA384
        || *oid == PKIXALG_ECDSA_WITH_SHA224
        || *oid == PKIXALG_ECDSA_WITH_SHA512
}

/// get_hash_alg_from_sig_alg takes an ObjectIdentifier that notionally contains a signature
/// algorithm, i.e., PKIXALG_SHA256_WITH_RSA_ENCRYPTION or PKIXALG_ECDSA_WITH_SHA256, and returns
/// the indicated hash algorithm.
pub fn get_hash_alg_from_sig_alg(sig_alg: &ObjectIdentifier) -> Result<AlgorithmIdentifierOwned> {
    let hash_oid = if PKIXALG_SHA256_WITH_RSA_ENCRYPTION == *sig_alg
        || PKIXALG_ECDSA_WITH_SHA256 == *sig_alg
    {
        PKIXALG_SHA256
    } else if PKIXALG_SHA384_WITH_RSA_ENCRYPTION == *sig_alg || PKIXALG_ECDSA_WITH_SHA384 == *sig_alg
    {
        PKIXALG_SHA384
    } else if PKIXALG_SHA224_WITH_RSA_ENCRYPTION == *sig_alg || PKIXALG_ECDSA_WITH_SHA224 == *sig_alg
    {
        PKIXALG_SHA224
    } else if PKIXALG_SHA512_WITH_RSA_ENCRYPTION == *sig_alg || PKIXALG_ECDSA_WITH_SHA512 == *sig_alg
    {
        PKIXALG_SHA512
    } else {
        return Err(Error::Unrecognized);
    };
    Ok(AlgorithmIdentifierOwned {
        oid: hash_oid,
        parameters: None,
    })
}

/// calculate_hash_rust_crypto implements the [`CalculateHash`](../environment/pki_environment_traits/type.CalculateHash.html)
/// interface for [`PkiEnvironment`] using implementations from the Rust Crypto project.
///
/// It supports [`PKIXALG_SHA224`], [`PKIXALG_SHA256`], [`PKIXALG_SHA384`] and [`PKIXALG_SHA512`].
pub fn calculate_hash_rust_crypto(
    _pe: &PkiEnvironment<'_>,
    hash_alg: &AlgorithmIdentifierOwned,
    buffer_to_hash: &[u8],
) -> Result<Vec<u8>> {
    if PKIXALG_SHA224 == hash_alg.oid {
        Ok(Sha224::digest(buffer_to_hash).to_vec())
    } else if PKIXALG_SHA256 == hash_alg.oid {
        Ok(Sha256::digest(buffer_to_hash).to_vec())
    } else if PKIXALG_SHA384 == hash_alg.oid {
        Ok(Sha384::digest(buffer_to_hash).to_vec())
    } else if PKIXALG_SHA512 == hash_alg.oid {
        Ok(Sha512::digest(buffer_to_hash).to_vec())
    } else {
        Err(Error::Unrecognized)
    }
}

/// verify_signature_digest_rust_crypto implements the [`VerifySignatureDigest`](../environment/pki_environment_traits/type.VerifySignatureDigest.html)
/// interface for [`PkiEnvironment`] using implementations from the [Rust Crypto](https://github.com/RustCrypto) project.
///
/// Only RSA is supported by this function. To verify ECDSA signatures, use [`verify_signature_message_rust_crypto`].
pub fn verify_signature_digest_rust_crypto(
    _pe: &PkiEnvironment<'_>,
    hash_to_verify: &[u8],
    signature: &[u8],
    signature_alg: &AlgorithmIdentifierOwned,
    spki: &SubjectPublicKeyInfoOwned,
) -> Result<()> {
    if !is_rsa(&signature_alg.oid) {
        return Err(Error::Unrecognized);
    }

    let enc_spki = spki.to_der()?;
    let rsa = RsaPublicKey::from_public_key_der(&enc_spki).map_err(|_| Error::Unrecognized)?;
    let ps = get_padding_scheme(signature_alg)?;
    rsa.verify(ps, hash_to_verify, signature).map_err(|_| {
        Error::PathValidation(PathValidationStatus::SignatureVerificationFailure)
    })
}

fn get_named_curve_parameter(alg_id: &AlgorithmIdentifierOwned) -> Result<ObjectIdentifier> {
    if let Some(params) = &alg_id.parameters {
        if let Ok(oid) = params.decode_as::<ObjectIdentifier>() {
            return Ok(oid);
        }
    }
    Err(Error::PathValidation(PathValidationStatus::EncodingError))
}

/// verify_signature_message_rust_crypto implements the [`VerifySignatureMessage`](../environment/pki_environment_traits/type.VerifySignatureMessage.html)
/// interface for [`PkiEnvironment`] using implementations from the [Rust Crypto](https://github.com/RustCrypto) project.
///
/// RSA signatures and P256 signatures are supported at present.
pub fn verify_signature_message_rust_crypto(
    pe: &PkiEnvironment<'_>,
    message_to_verify: &[u8],
    signature: &[u8],
    signature_alg: &AlgorithmIdentifierOwned,
    spki: &SubjectPublicKeyInfoOwned,
) -> Result<()> {
    if is_rsa(&signature_alg.oid) {
        let enc_spki = spki.to_der()?;
        let rsa = RsaPublicKey::from_public_key_der(&enc_spki).map_err(|_| Error::Unrecognized)?;
        let hash_alg = get_hash_alg_from_sig_alg(&signature_alg.oid)?;
        let hash_to_verify = calculate_hash_rust_crypto(pe, &hash_alg, message_to_verify)?;
        let ps = get_padding_scheme(signature_alg)?;
        return rsa
            .verify(ps, hash_to_verify.as_slice(), signature)
            .map_err(|_| Error::PathValidation(PathValidationStatus::SignatureVerificationFailure));
    } else if is_ecdsa(&signature_alg.oid) {
        let named_curve = get_named_curve_parameter(&spki.algorithm)?;
        if PKIXALG_SECP256R1 == named_curve {
            let ecdsa = VerifyingKey256::from_sec1_bytes(spki.subject_public_key.raw_bytes())
                .map_err(|_| Error::PathValidation(PathValidationStatus::EncodingError))?;
            let s = Signature256::from_der(signature)
                .map_err(|_| Error::PathValidation(PathValidationStatus::EncodingError))?;
            return ecdsa.verify(message_to_verify, &s).map_err(|_| {
                Error::PathValidation(PathValidationStatus::SignatureVerificationFailure)
            });
        }
        log_message(
            &PkiLogLevel::Error,
            format!("Unrecognized or unsupported named curve: {}", named_curve).as_str(),
        );
        return Err(Error::Unrecognized);
    }
    log_message(
        &PkiLogLevel::Error,
        format!("Unrecognized signature algorithm: {}", signature_alg.oid).as_str(),
    );
    Err(Error::Unrecognized)
}

#[test]
fn test_calculate_hash() {
    use hex_literal::hex;
    let pe = PkiEnvironment::default();

    let hash_algorithm = AlgorithmIdentifierOwned {
        oid: PKIXALG_SHA256,
        parameters: None,
    };
    let result = calculate_hash_rust_crypto(&pe, &hash_algorithm, "abc".as_bytes()).unwrap();
    assert_eq!(
        result,
        hex!("BA7816BF8F01CFEA414140DE5DAE2223B00361A396177A9CB410FF61F20015AD")
    );

    let unknown = AlgorithmIdentifierOwned {
        oid: PKIXALG_RSA_ENCRYPTION,
        parameters: None,
    };
    assert!(calculate_hash_rust_crypto(&pe, &unknown, "abc".as_bytes()).is_err());
}

#[test]
fn test_verify_signature_message_p256() {
    use der::{asn1::BitString, Any};
    use p256::ecdsa::{signature::Signer, SigningKey};

    let pe = PkiEnvironment::default();

    let seed = [42u8; 32];
    let signing_key = SigningKey::from_slice(&seed).unwrap();
    let verifying_key = VerifyingKey256::from(&signing_key);

    let message = "the quick brown fox".as_bytes();
    let signature: Signature256 = signing_key.sign(message);
    let der_sig = signature.to_der();

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
    let sig_alg = AlgorithmIdentifierOwned {
        oid: PKIXALG_ECDSA_WITH_SHA256,
        parameters: None,
    };

    assert!(verify_signature_message_rust_crypto(
        &pe,
        message,
        der_sig.as_bytes(),
        &sig_alg,
        &spki
    )
    .is_ok());

    // flipping a message bit must fail verification
    let tampered = "the quick brown fix".as_bytes();
    assert_eq!(
        Err(Error::PathValidation(
            PathValidationStatus::SignatureVerificationFailure
        )),
        verify_signature_message_rust_crypto(&pe, tampered, der_sig.as_bytes(), &sig_alg, &spki)
    );
}

#[test]
fn test_get_padding_scheme() {
    let ok = AlgorithmIdentifierOwned {
        oid: PKIXALG_SHA256_WITH_RSA_ENCRYPTION,
        parameters: None,
    };
    assert!(get_padding_scheme(&ok).is_ok());
    let bad = AlgorithmIdentifierOwned {
        oid: PKIXALG_ECDSA_WITH_SHA256,
        parameters: None,
    };
    assert_eq!(Err(Error::Unrecognized), get_padding_scheme(&bad));
}
