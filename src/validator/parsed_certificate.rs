//! Wrappers around asn.1 encoder/decoder structures to support certification path processing

use alloc::collections::BTreeMap;
use alloc::{
    string::{String, ToString},
    vec::Vec,
};

use log::error;

use const_oid::db::rfc5912::{
    ID_CE_AUTHORITY_KEY_IDENTIFIER, ID_CE_BASIC_CONSTRAINTS, ID_CE_CERTIFICATE_POLICIES,
    ID_CE_CRL_DISTRIBUTION_POINTS, ID_CE_EXT_KEY_USAGE, ID_CE_INHIBIT_ANY_POLICY, ID_CE_KEY_USAGE,
    ID_CE_NAME_CONSTRAINTS, ID_CE_POLICY_CONSTRAINTS, ID_CE_POLICY_MAPPINGS,
    ID_CE_PRIVATE_KEY_USAGE_PERIOD, ID_CE_SUBJECT_ALT_NAME, ID_CE_SUBJECT_KEY_IDENTIFIER,
};
use der::asn1::BitString;
use der::{asn1::ObjectIdentifier, Decode, Encode};
use spki::AlgorithmIdentifierOwned;
use x509_cert::ext::{pkix::crl::CrlDistributionPoints, pkix::*};
use x509_cert::Certificate;

use crate::util::error::*;
use crate::validator::parsed_extension::*;
use crate::EXTS_OF_INTEREST;

/// [`Asn1Metadata`] is a typedef of a BTreeMap that associates values represented by the
/// [`Asn1MetadataTypes`] enum with arbitrary string keys. At present this is only used to convey
/// locator information for troubleshooting purposes.
pub type Asn1Metadata = BTreeMap<String, Asn1MetadataTypes>;

/// [`MD_LOCATOR`] is used to set/get a String value to/from an [`Asn1Metadata`] object. The value
/// may represent a file name, URI or other locator for troubleshooting purposes.
pub static MD_LOCATOR: &str = "mdLocator";

/// Small assortment of types that can be used to save metadata collected during certification path
/// processing.
#[derive(PartialEq, Clone, Eq)]
pub enum Asn1MetadataTypes {
    /// Used for metadata represented as a bool
    Bool(bool),
    /// Used for metadata represented as a u32
    Number(u32),
    /// Used for metadata represented as a String
    String(String),
    /// Used for metadata represented as a `Vec<u8>`
    Buffer(Vec<u8>),
}

/// [`ParsedCertificate`] is used to aggregate a binary, DER-encoded Certificate, a parsed
/// Certificate, optional metadata and parsed extensions in support of certification path
/// development and validation operations.
///
/// The parsed extensions are usually those listed in [`EXTS_OF_INTEREST`](../path_validator/static.EXTS_OF_INTEREST.html).
#[derive(Clone, Eq, PartialEq)]
pub struct ParsedCertificate {
    /// Binary, encoded Certificate object
    pub encoded_cert: Vec<u8>,
    /// Decoded Certificate object
    pub decoded_cert: Certificate,
    /// Optional metadata about the certificate
    pub metadata: Option<Asn1Metadata>,
    /// Parsed extensions from the Certificate
    pub parsed_extensions: ParsedExtensions,
}

impl TryFrom<&[u8]> for ParsedCertificate {
    type Error = der::Error;

    fn try_from(enc_cert: &[u8]) -> der::Result<Self> {
        let cert = Certificate::from_der(enc_cert)?;
        let mut parsed_cert = ParsedCertificate {
            encoded_cert: enc_cert.to_vec(),
            decoded_cert: cert,
            metadata: None,
            parsed_extensions: Default::default(),
        };
        parsed_cert.parse_extensions(EXTS_OF_INTEREST);
        Ok(parsed_cert)
    }
}

impl TryFrom<Certificate> for ParsedCertificate {
    type Error = der::Error;

    fn try_from(cert: Certificate) -> der::Result<Self> {
        let enc_cert = cert.to_der()?;
        let mut parsed_cert = ParsedCertificate {
            encoded_cert: enc_cert,
            decoded_cert: cert,
            metadata: None,
            parsed_extensions: Default::default(),
        };
        parsed_cert.parse_extensions(EXTS_OF_INTEREST);
        Ok(parsed_cert)
    }
}

impl ExtensionProcessing for ParsedCertificate {
    fn get_extension(&self, oid: &ObjectIdentifier) -> Result<Option<&ParsedExtension>> {
        Ok(self.parsed_extensions.get(oid))
    }

    fn parse_extensions(&mut self, oids: &[ObjectIdentifier]) {
        for oid in oids {
            let _r = self.parse_extension(oid);
        }
    }

    fn parse_extension(&mut self, oid: &ObjectIdentifier) -> Result<Option<&ParsedExtension>> {
        macro_rules! add_and_return {
            ($pe:ident, $v:ident, $oid:ident, $t:ident) => {
                match $t::from_der($v) {
                    Ok(r) => {
                        let ext = ParsedExtension::$t(r);
                        $pe.insert(*$oid, ext);
                        return Ok($pe.get($oid));
                    }
                    Err(e) => {
                        return Err(Error::Asn1Error(e));
                    }
                }
            };
        }

        let pe = &mut self.parsed_extensions;
        if pe.contains_key(oid) {
            return Ok(pe.get(oid));
        }

        if let Some(exts) = self.decoded_cert.tbs_certificate.extensions.as_ref() {
            if let Some(i) = exts.iter().find(|&ext| ext.extn_id == *oid) {
                let v = i.extn_value.as_bytes();
                if ID_CE_BASIC_CONSTRAINTS == *oid {
                    add_and_return!(pe, v, oid, BasicConstraints);
                } else if ID_CE_SUBJECT_KEY_IDENTIFIER == *oid {
                    add_and_return!(pe, v, oid, SubjectKeyIdentifier);
                } else if ID_CE_EXT_KEY_USAGE == *oid {
                    add_and_return!(pe, v, oid, ExtendedKeyUsage);
                } else if ID_CE_KEY_USAGE == *oid {
                    add_and_return!(pe, v, oid, KeyUsage);
                } else if ID_CE_SUBJECT_ALT_NAME == *oid {
                    add_and_return!(pe, v, oid, SubjectAltName);
                } else if ID_CE_NAME_CONSTRAINTS == *oid {
                    add_and_return!(pe, v, oid, NameConstraints);
                } else if ID_CE_PRIVATE_KEY_USAGE_PERIOD == *oid {
                    add_and_return!(pe, v, oid, PrivateKeyUsagePeriod);
                } else if ID_CE_CRL_DISTRIBUTION_POINTS == *oid {
                    add_and_return!(pe, v, oid, CrlDistributionPoints);
                } else if ID_CE_CERTIFICATE_POLICIES == *oid {
                    add_and_return!(pe, v, oid, CertificatePolicies);
                } else if ID_CE_POLICY_MAPPINGS == *oid {
                    add_and_return!(pe, v, oid, PolicyMappings);
                } else if ID_CE_AUTHORITY_KEY_IDENTIFIER == *oid {
                    add_and_return!(pe, v, oid, AuthorityKeyIdentifier);
                } else if ID_CE_POLICY_CONSTRAINTS == *oid {
                    add_and_return!(pe, v, oid, PolicyConstraints);
                } else if ID_CE_INHIBIT_ANY_POLICY == *oid {
                    add_and_return!(pe, v, oid, InhibitAnyPolicy);
                }
                // unrecognized extension types are left unparsed
            }
        }
        Ok(None)
    }
}

/// [`DeferDecodeSigned`] is used to parse only the top-level Certificate structure, without parsing
/// the details of the TBSCertificate, AlgorithmIdentifier or BIT STRING fields.
///
/// Deferred decoding is useful when verifying certificates to avoid re-encoding the TBSCertificate
/// (and potentially encountering problems with structures that were not DER-encoded prior to
/// signing). This is intended to be used in tandem with a [`ParsedCertificate`] structure that
/// contains a fully-decoded Certificate structure.
pub struct DeferDecodeSigned {
    /// tbsCertificate       TBSCertificate,
    pub tbs_field: Vec<u8>,
    /// signatureAlgorithm   AlgorithmIdentifier,
    pub signature_algorithm: AlgorithmIdentifierOwned,
    /// signature            BIT STRING
    pub signature: BitString,
}

impl ::der::FixedTag for DeferDecodeSigned {
    const TAG: ::der::Tag = ::der::Tag::Sequence;
}

impl<'a> ::der::DecodeValue<'a> for DeferDecodeSigned {
    fn decode_value<R: ::der::Reader<'a>>(
        reader: &mut R,
        header: ::der::Header,
    ) -> ::der::Result<Self> {
        use ::der::Reader as _;
        reader.read_nested(header.length, |reader| {
            let tbs_certificate = reader.tlv_bytes()?;
            let signature_algorithm = reader.decode()?;
            let signature = reader.decode()?;
            Ok(Self {
                tbs_field: tbs_certificate.to_vec(),
                signature_algorithm,
                signature,
            })
        })
    }
}

/// `parse_cert` takes a buffer containing a binary DER encoded certificate and a locator, i.e., a
/// filename or URI, and returns a [`ParsedCertificate`] containing the parsed certificate if
/// parsing was successful.
pub fn parse_cert(buffer: &[u8], locator: &str) -> Result<ParsedCertificate> {
    match Certificate::from_der(buffer) {
        Ok(cert) => {
            let mut md = Asn1Metadata::new();
            md.insert(
                MD_LOCATOR.to_string(),
                Asn1MetadataTypes::String(locator.to_string()),
            );
            let mut parsed_cert = ParsedCertificate {
                encoded_cert: buffer.to_vec(),
                decoded_cert: cert,
                metadata: Some(md),
                parsed_extensions: ParsedExtensions::new(),
            };
            parsed_cert.parse_extensions(EXTS_OF_INTEREST);
            Ok(parsed_cert)
        }
        Err(e) => {
            error!("Failed to parse certificate from {}: {}", locator, e);
            Err(Error::Asn1Error(e))
        }
    }
}
