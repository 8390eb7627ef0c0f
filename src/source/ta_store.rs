//! The ta_store module provides an implementation of a manually populated in-memory trust anchor
//! store. The following snip illustrates preparation and use of a [`TaStore`] object.
//!
//! ```
//! use certpath::PkiEnvironment;
//! use certpath::TaStore;
//!
//! let mut ta_store = TaStore::default();
//! // push CertBuffer objects containing DER-encoded TrustAnchorChoice objects onto the store
//! // then parse and index the trust anchors
//! ta_store.initialize().unwrap();
//!
//! // the default PkiEnvironment uses `oid_lookup` to look up friendly names for OIDs
//! let mut pe = PkiEnvironment::default();
//!
//! // add ta_store to provide access to trust anchors
//! pe.add_trust_anchor_source(&ta_store);
//! ```
//!
//! [`TaStore`] instances are used when discovering partial certification paths (see
//! [`find_all_partial_paths`](../cert_pool/struct.CertPool.html#method.find_all_partial_paths))
//! and when building certification paths (see
//! [`get_paths_for_target`](../cert_pool/struct.CertPool.html#method.get_paths_for_target)).

use alloc::borrow::ToOwned;
use alloc::collections::BTreeMap;
use alloc::string::{String, ToString};
use alloc::{vec, vec::Vec};
use core::cell::RefCell;
use core::str;

#[cfg(feature = "std")]
use alloc::sync::Arc;
#[cfg(feature = "std")]
use std::sync::Mutex;

#[cfg(feature = "webpki")]
use webpki_roots::TLS_SERVER_ROOTS;

#[cfg(feature = "webpki")]
use alloc::format;

use subtle_encoding::hex;

use const_oid::db::rfc5912::{ID_CE_AUTHORITY_KEY_IDENTIFIER, ID_CE_SUBJECT_KEY_IDENTIFIER};
use sha2::{Digest, Sha256};
use x509_cert::anchor::TrustAnchorChoice;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::name::Name;

use crate::{
    environment::pki_environment_traits::TrustAnchorSource,
    source::cert_pool::CertBuffer,
    util::error::*,
    util::logging::*,
    util::name_utils::{get_leaf_rdn, name_to_string},
    validator::trust_anchor::{get_subject_public_key_info_from_trust_anchor, get_trust_anchor_name},
    Asn1Metadata, Asn1MetadataTypes, ExtensionProcessing, ParsedCertificate, ParsedExtension,
    ParsedTrustAnchor, EXTS_OF_INTEREST, MD_LOCATOR,
};

/// `buffer_to_hex` takes a byte array and returns a string featuring upper case ASCII hex characters
/// (without commas, spaces, or brackets).
/// ```
/// use certpath::buffer_to_hex;
/// let buf :[u8; 3] = [1,2,3];
/// let bufhex = buffer_to_hex(&buf);
/// assert_eq!(bufhex, "010203");
/// ```
pub fn buffer_to_hex(buffer: &[u8]) -> String {
    let hex = hex::encode_upper(buffer);
    let r = str::from_utf8(hex.as_slice());
    if let Ok(s) = r {
        s.to_string()
    } else {
        "".to_string()
    }
}

/// `hex_skid_from_ta` takes a trust anchor object and returns a string featuring upper case ASCII
/// hex characters (without commas, spaces, or brackets).
///
/// The value represents one of the following:
/// - the value of the SubjectKeyIdentifier (SKID) extension in a Certificate option
/// - the value of a SHA256 hash of the SubjectPublicKeyInfo from a Certificate option that lacks a SKID extension
/// - the value of the key ID field in a TrustAnchorInfo option.
///
/// The TBSCertificate option within TrustAnchorChoice is not supported.
pub fn hex_skid_from_ta(ta: &ParsedTrustAnchor) -> String {
    match &ta.decoded_ta {
        TrustAnchorChoice::Certificate(_cert) => {
            let skid = ta.get_extension(&ID_CE_SUBJECT_KEY_IDENTIFIER);
            if let Ok(Some(ParsedExtension::SubjectKeyIdentifier(skid))) = skid {
                buffer_to_hex(skid.0.as_bytes())
            } else {
                let working_spki = get_subject_public_key_info_from_trust_anchor(&ta.decoded_ta);
                let digest = Sha256::digest(working_spki.subject_public_key.raw_bytes()).to_vec();
                buffer_to_hex(digest.as_slice())
            }
        }
        TrustAnchorChoice::TaInfo(tai) => buffer_to_hex(tai.key_id.as_bytes()),
        _ => "".to_string(),
    }
}

/// `hex_skid_from_cert` takes a certificate object and returns a string featuring upper case ASCII
/// hex characters (without commas, spaces, or brackets) representing either the value of the SKID
/// extension or a SHA256 hash of the SubjectPublicKeyInfo.
pub fn hex_skid_from_cert(cert: &ParsedCertificate) -> String {
    let skid = cert.get_extension(&ID_CE_SUBJECT_KEY_IDENTIFIER);
    if let Ok(Some(ParsedExtension::SubjectKeyIdentifier(skid))) = skid {
        buffer_to_hex(skid.0.as_bytes())
    } else {
        let working_spki = &cert.decoded_cert.tbs_certificate.subject_public_key_info;
        let digest = Sha256::digest(working_spki.subject_public_key.raw_bytes()).to_vec();
        buffer_to_hex(digest.as_slice())
    }
}

/// `get_locator_from_ta_metadata` returns the string from the `MD_LOCATOR` in the metadata or an
/// empty string.
pub fn get_locator_from_ta_metadata(ta: &ParsedTrustAnchor) -> String {
    if let Some(md) = &ta.metadata {
        if let Some(Asn1MetadataTypes::String(locator)) = md.get(MD_LOCATOR) {
            return locator.to_owned();
        }
    }
    "".to_string()
}

/// `TrustAnchorKeyId` is a String value containing the ASCII hex representation of a key identifier
/// from a trust anchor.
///
/// The value is read from one of the following:
/// * the subjectKeyIdentifier extension in a TrustAnchorChoice::Certificate structure,
/// * the keyId field in a TrustAnchorChoice::TaInfo structure
/// * the SHA256 digest of the SubjectPublicKeyInfo read from TrustAnchorChoice::Certificate
pub type TrustAnchorKeyId = String;

#[derive(Clone)]
/// Structure containing a vector of buffers supplied by the caller and a vector of parsed trust
/// anchors prepared from those buffers. Two internal maps are used to correlate names and key IDs
/// to elements in the parsed trust anchor vector.
pub struct TaStore {
    /// List of parsed trust anchors prepared from the buffers field
    tas: Vec<ParsedTrustAnchor>,

    /// Contains list of buffers referenced by the tas field
    buffers: Vec<CertBuffer>,

    #[cfg(feature = "std")]
    /// Maps TA SKIDs to indices in the tas field
    skid_map: Arc<Mutex<RefCell<BTreeMap<TrustAnchorKeyId, usize>>>>,

    #[cfg(feature = "std")]
    /// Maps TA Names to indices in the tas field
    name_map: Arc<Mutex<RefCell<BTreeMap<String, usize>>>>,

    #[cfg(not(feature = "std"))]
    /// Maps TA SKIDs to indices in the tas field
    skid_map: RefCell<BTreeMap<TrustAnchorKeyId, usize>>,

    #[cfg(not(feature = "std"))]
    /// Maps TA Names to indices in the tas field
    name_map: RefCell<BTreeMap<String, usize>>,
}

impl Default for TaStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TaStore {
    /// Instantiates a new empty TaStore
    pub fn new() -> TaStore {
        TaStore {
            tas: Vec::new(),
            buffers: Vec::new(),
            #[cfg(feature = "std")]
            skid_map: Arc::new(Mutex::new(RefCell::new(BTreeMap::new()))),
            #[cfg(not(feature = "std"))]
            skid_map: RefCell::new(BTreeMap::new()),
            #[cfg(feature = "std")]
            name_map: Arc::new(Mutex::new(RefCell::new(BTreeMap::new()))),
            #[cfg(not(feature = "std"))]
            name_map: RefCell::new(BTreeMap::new()),
        }
    }

    /// Creates a new TaStore instance from the [TLS_SERVER_ROOTS](https://docs.rs/webpki-roots/0.25.2/webpki_roots/constant.TLS_SERVER_ROOTS.html)
    /// variable in the [webpki-roots crate](https://crates.io/crates/webpki-roots). This conversion
    /// is best effort. Any trust anchors that cannot be converted are logged and the process
    /// continues.
    #[cfg(feature = "webpki")]
    pub fn new_from_webpki() -> Result<Self> {
        let mut ta_store = TaStore::new();
        for (i, ta) in TLS_SERVER_ROOTS.iter().enumerate() {
            let parsed_ta = match ParsedTrustAnchor::try_from(ta) {
                Ok(t) => t,
                Err(e) => {
                    log_message(
                        &PkiLogLevel::Error,
                        format!("Failed to convert WebPKI TrustAnchor #{i}: {e:?}").as_str(),
                    );
                    continue;
                }
            };
            ta_store.push(CertBuffer {
                locator: format!("WebPKI TrustAnchor #{i}"),
                bytes: parsed_ta.encoded_ta.clone(),
            });
        }
        ta_store.initialize()?;
        Ok(ta_store)
    }

    /// Adds a buffer containing a DER-encoded TrustAnchorChoice to the store unless a buffer with
    /// the same bytes is already present. [`initialize`](`TaStore::initialize`) must be called
    /// before added buffers are available via the [`TrustAnchorSource`] interface.
    pub fn push(&mut self, buffer: CertBuffer) {
        if !self.buffers.contains(&buffer) {
            self.buffers.push(buffer);
        }
    }

    /// Returns copies of the buffers present in the store
    pub fn get_buffers(&self) -> Vec<CertBuffer> {
        self.buffers.clone()
    }

    /// Parses any buffers passed to the instance via [`push`](`TaStore::push`) then indexes the
    /// parsed trust anchors
    pub fn initialize(&mut self) -> Result<()> {
        populate_parsed_ta_vector(&self.buffers, &mut self.tas);
        self.index_trust_anchors();
        Ok(())
    }

    /// index_trust_anchors builds internally used maps based on key identifiers and names. It must
    /// be called after populating the tas and buffers fields and before use.
    pub fn index_trust_anchors(&self) {
        #[cfg(feature = "std")]
        let skid_map_guard = if let Ok(g) = self.skid_map.lock() {
            g
        } else {
            return;
        };
        #[cfg(feature = "std")]
        let mut skid_map = skid_map_guard.borrow_mut();

        #[cfg(not(feature = "std"))]
        let mut skid_map = self.skid_map.borrow_mut();

        #[cfg(feature = "std")]
        let name_map_guard = if let Ok(g) = self.name_map.lock() {
            g
        } else {
            return;
        };
        #[cfg(feature = "std")]
        let mut name_map = name_map_guard.borrow_mut();

        #[cfg(not(feature = "std"))]
        let mut name_map = self.name_map.borrow_mut();

        for (i, ta) in self.tas.iter().enumerate() {
            let hex_skid = hex_skid_from_ta(ta);
            skid_map.insert(hex_skid, i);

            if let Ok(name) = get_trust_anchor_name(&ta.decoded_ta) {
                let name_str = name_to_string(name);
                name_map.insert(name_str, i);
            };
        }
    }

    /// Logs trust anchor details at info level
    pub fn log_trust_anchors(&self) {
        for (i, ta) in self.tas.iter().enumerate() {
            let hex_skid = hex_skid_from_ta(ta);
            let ta_locator = get_locator_from_ta_metadata(ta);
            if let Ok(name) = get_trust_anchor_name(&ta.decoded_ta) {
                let sub = get_leaf_rdn(name);
                log_message(
                    &PkiLogLevel::Info,
                    alloc::format!(
                        "Index: {:3}; SKID: {}; Subject: {}; Locator: {}",
                        i,
                        hex_skid,
                        sub,
                        ta_locator
                    )
                    .as_str(),
                );
            } else {
                log_message(
                    &PkiLogLevel::Info,
                    alloc::format!(
                        "Index: {:3}; SKID: {}; Subject: No Name; Locator: {}",
                        i,
                        hex_skid,
                        ta_locator
                    )
                    .as_str(),
                );
            }
        }
    }
}

impl TrustAnchorSource for TaStore {
    fn get_trust_anchor_for_target(
        &'_ self,
        target: &'_ ParsedCertificate,
    ) -> Result<&ParsedTrustAnchor> {
        let mut akid_hex = "".to_string();
        let mut name_vec = vec![&target.decoded_cert.tbs_certificate.issuer];
        let akid_ext = target.get_extension(&ID_CE_AUTHORITY_KEY_IDENTIFIER);
        if let Ok(Some(ParsedExtension::AuthorityKeyIdentifier(akid))) = akid_ext {
            if let Some(kid) = &akid.key_identifier {
                akid_hex = buffer_to_hex(kid.as_bytes());
            } else if let Some(names) = &akid.authority_cert_issuer {
                for n in names {
                    if let GeneralName::DirectoryName(dn) = n {
                        name_vec.push(dn);
                    }
                }
            }
        }
        if !akid_hex.is_empty() {
            match self.get_trust_anchor_by_hex_skid(&akid_hex) {
                Ok(s) => return Ok(s),
                Err(_e) => {
                    log_message(
                        &PkiLogLevel::Warn,
                        alloc::format!("Failed to find trust anchor by key identifier {akid_hex}")
                            .as_str(),
                    );
                }
            }
        }
        for n in name_vec {
            let r = self.get_trust_anchor_by_name(n);
            if r.is_ok() {
                return r;
            }
        }
        Err(Error::NotFound)
    }

    fn get_trust_anchor_by_skid(&self, skid: &[u8]) -> Result<&ParsedTrustAnchor> {
        self.get_trust_anchor_by_hex_skid(&buffer_to_hex(skid))
    }

    fn get_trust_anchor_by_hex_skid(&'_ self, hex_skid: &str) -> Result<&ParsedTrustAnchor> {
        #[cfg(feature = "std")]
        let skid_map_guard = if let Ok(g) = self.skid_map.lock() {
            g
        } else {
            return Err(Error::SourceUnavailable);
        };
        #[cfg(feature = "std")]
        let skid_map = skid_map_guard.borrow();

        #[cfg(not(feature = "std"))]
        let skid_map = &self.skid_map.borrow();

        if let Some(i) = skid_map.get(hex_skid) {
            return Ok(&self.tas[*i]);
        }

        Err(Error::NotFound)
    }

    fn get_trust_anchor_by_name(&'_ self, target: &'_ Name) -> Result<&ParsedTrustAnchor> {
        #[cfg(feature = "std")]
        let name_map_guard = if let Ok(g) = self.name_map.lock() {
            g
        } else {
            return Err(Error::SourceUnavailable);
        };
        #[cfg(feature = "std")]
        let name_map = name_map_guard.borrow();

        #[cfg(not(feature = "std"))]
        let name_map = &self.name_map.borrow();

        let name_str = name_to_string(target);
        if let Some(i) = name_map.get(&name_str) {
            return Ok(&self.tas[*i]);
        }

        Err(Error::NotFound)
    }

    fn get_trust_anchors(&'_ self) -> Result<Vec<&ParsedTrustAnchor>> {
        let mut v = vec![];
        for ta in &self.tas {
            v.push(ta);
        }

        Ok(v)
    }

    fn is_cert_a_trust_anchor(&self, cert: &ParsedCertificate) -> Result<()> {
        #[cfg(feature = "std")]
        let skid_map_guard = if let Ok(g) = self.skid_map.lock() {
            g
        } else {
            return Err(Error::SourceUnavailable);
        };
        #[cfg(feature = "std")]
        let skid_map = skid_map_guard.borrow();

        #[cfg(not(feature = "std"))]
        let skid_map = &self.skid_map.borrow();

        let hex_skid = hex_skid_from_cert(cert);
        match skid_map.contains_key(hex_skid.as_str()) {
            true => Ok(()),
            false => Err(Error::NotFound),
        }
    }

    fn is_trust_anchor(&self, ta: &ParsedTrustAnchor) -> Result<()> {
        #[cfg(feature = "std")]
        let skid_map_guard = if let Ok(g) = self.skid_map.lock() {
            g
        } else {
            return Err(Error::SourceUnavailable);
        };
        #[cfg(feature = "std")]
        let skid_map = skid_map_guard.borrow();

        #[cfg(not(feature = "std"))]
        let skid_map = &self.skid_map.borrow();

        let hex_skid = hex_skid_from_ta(ta);
        match skid_map.contains_key(hex_skid.as_str()) {
            true => Ok(()),
            false => Err(Error::NotFound),
        }
    }

    fn get_encoded_trust_anchor(&self, skid: &[u8]) -> Result<Vec<u8>> {
        Ok(self.get_trust_anchor_by_skid(skid)?.encoded_ta.clone())
    }

    fn get_encoded_trust_anchors(&self) -> Result<Vec<Vec<u8>>> {
        let mut v = vec![];
        for ta in &self.tas {
            v.push(ta.encoded_ta.clone());
        }
        Ok(v)
    }
}

/// `populate_parsed_ta_vector` takes a vector of buffers that contain binary DER-encoded
/// TrustAnchorChoice objects and populates a vector with parsed ParsedTrustAnchor structures.
fn populate_parsed_ta_vector(ta_buffer_vec: &[CertBuffer], parsed_ta_vec: &mut Vec<ParsedTrustAnchor>) {
    for cb in ta_buffer_vec {
        match ParsedTrustAnchor::try_from(cb.bytes.as_slice()) {
            Ok(mut ta) => {
                let mut md = Asn1Metadata::new();
                md.insert(
                    MD_LOCATOR.to_string(),
                    Asn1MetadataTypes::String(cb.locator.clone()),
                );
                ta.metadata = Some(md);
                if !parsed_ta_vec.contains(&ta) {
                    ta.parse_extensions(EXTS_OF_INTEREST);
                    parsed_ta_vec.push(ta);
                }
            }
            Err(e) => {
                log_message(
                    &PkiLogLevel::Error,
                    alloc::format!("Failed to parse TrustAnchorChoice: {:?}", e).as_str(),
                );
            }
        }
    }
}
