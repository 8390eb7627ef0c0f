//! The cert_pool module provides an implementation of a manually populated in-memory certificate
//! pool with serialization and certification path building support.
//!
//! The following snip illustrates preparation and use of a [`CertPool`] object.
//!
//! ```
//! use certpath::PkiEnvironment;
//! use certpath::CertPool;
//!
//! // the default PkiEnvironment uses `oid_lookup` to look up friendly names for OIDs
//! let mut pe = PkiEnvironment::default();
//!
//! let cert_pool = CertPool::default();
//! // push CertBuffer objects containing DER-encoded certificates onto the pool, call initialize
//! // to parse and index the certificates, then call find_all_partial_paths to discover partial
//! // certification paths relative to the trust anchors available via the environment.
//!
//! // add cert_pool to provide access to intermediate CA certificates
//! pe.add_certificate_source(&cert_pool);
//!
//! // add same object as a path builder to provide path building capabilities
//! pe.add_path_builder(&cert_pool);
//! ```
//!
//! The general idea is to prepare an as comprehensive as possible set of partial certification
//! paths for the target environment in an offline manner then serialize the result for
//! deserialization later, i.e., via [`serialize_partial_paths`](`CertPool::serialize_partial_paths`)
//! and [`new_from_cbor`](`CertPool::new_from_cbor`). Deserialization of partial paths moves the
//! expensive path discovery aspects offline while enabling simple map lookups to serve the general
//! case at path building time.

use alloc::{
    borrow::ToOwned,
    collections::BTreeMap,
    string::{String, ToString},
};
use alloc::{format, vec, vec::Vec};

use ciborium::{de::from_reader, ser::into_writer};
use serde::{Deserialize, Serialize};

use const_oid::db::rfc5912::{
    ID_CE_AUTHORITY_KEY_IDENTIFIER, ID_CE_BASIC_CONSTRAINTS, ID_CE_NAME_CONSTRAINTS,
    ID_CE_SUBJECT_ALT_NAME,
};
use der::Decode;
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::name::Name;
use x509_cert::Certificate;

use crate::{
    environment::pki_environment_traits::*,
    source::ta_store::{buffer_to_hex, hex_skid_from_cert, TrustAnchorKeyId},
    util::error::*,
    util::logging::*,
    util::name_utils::{compare_names, get_leaf_rdn, is_self_issued, name_to_string, valid_at_time},
    validator::trust_anchor::{get_subject_public_key_info_from_trust_anchor, get_trust_anchor_name},
    Asn1Metadata, Asn1MetadataTypes, CertificateSelector, CertificationPath,
    CertificationPathSettings, DeferDecodeSigned, ExtensionProcessing, NameConstraintsSet,
    ParsedCertificate, ParsedExtension, PkiEnvironment, EXTS_OF_INTEREST, MD_LOCATOR,
    PS_MAX_PATH_LENGTH_CONSTRAINT,
};

/// The CertBuffer struct associates a string, notionally containing a filename or URI, with a
/// vector of bytes. The vector of bytes is assumed to contain a binary DER-encoded certificate.
#[derive(Clone, Debug, Eq, Serialize, Deserialize)]
pub struct CertBuffer {
    /// The locator field enables association of a string value, possibly a filename or URI, with a
    /// binary certificate
    pub locator: String,

    /// The bytes field stores a binary DER-encoded certificate
    pub bytes: Vec<u8>,
}

impl PartialEq for CertBuffer {
    /// Equality only checks that the `bytes` fields are equal, i.e., the `locator` fields are
    /// ignored (so as to not return mismatch for cert from file vs one from URI)
    fn eq(&self, other: &CertBuffer) -> bool {
        self.bytes == other.bytes
    }
}

/// Type used to represent partial certification paths in the [`BuffersAndPaths`] struct.
///
/// The outer vector is indexed by partial path length minus one, i.e., the 0th element features
/// paths that contain one CA certificate. Each map is keyed using an ASCII hex key identifier of
/// the last (leaf-most) CA in each path, with each value containing one or more vectors of indices
/// into the corresponding buffers vector.
pub type PartialPaths = Vec<BTreeMap<TrustAnchorKeyId, Vec<Vec<usize>>>>;

/// BuffersAndPaths is the target of serialization and deserialization. It features a vector of
/// [`CertBuffer`] structures (which contain buffers containing binary DER-encoded certificates)
/// and a vector of maps that feature vectors of indices of items in the buffers vector. Each
/// vector of indices denotes a partial certification path (featuring intermediate CAs only).
///
/// The first index in a vector of indices corresponds to a certificate signed by a trust anchor
/// that was available when partial paths were discovered. The last index is a leaf CA and is what
/// is used when building certification paths, i.e., the authority key identifier from a target
/// certificate is used as a map key to find partial paths, proceeding from shortest to longest.
/// Partial paths are subject to some basic immutable validation checks (name chaining, name
/// constraints and signature verification) as well as a validity check relative to a specified
/// time of interest. Note, if the contents of the set of trust anchors changes, some partial paths
/// may be orphaned.
///
/// Below is the JSON representation of a sample CBOR encoding featuring two intermediate CA
/// certificates, where the CA in the 1st slot was issued by the CA in the 0th slot and each hex
/// string is the key identifier of the last certificate in the adjacent index vectors.
///
/// ```json
/// {"buffers": [
///   {"locator": "root_issued.der", "bytes": [48, 130, 5, 70, ...]},
///   {"locator": "email_ca.der", "bytes": [48, 130, 4, 188, ...]}],
///  "partial_paths": [
///   {"6C8A94A277B180721D817A16AAF2DCCE66EE45C0": [[0]],
///    "771441A65D9526D01DFF953B628CEAB7B55D3B92": [[1]]},
///   {"771441A65D9526D01DFF953B628CEAB7B55D3B92": [[0, 1]]}
///  ]}
/// ```
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct BuffersAndPaths {
    /// List of buffers containing binary DER-encoded certificates
    pub buffers: Vec<CertBuffer>,

    /// Maps skid of leaf CA (i.e., last index in each vector) to a vector of indices into buffers
    pub partial_paths: PartialPaths,
}

/// The [`CertPool`] structure serves two purposes. First, it serves as a source of certificates by
/// maintaining a vector of certificate buffers and a corresponding vector of parsed certificates.
/// Second, it serves as a path builder implementation by maintaining a map of partial
/// certification paths that can be serialized and deserialized.
///
/// Preparation of a [`CertPool`] requires three steps:
///   1. Create an empty [`CertPool`] instance via [`CertPool::new`] or [`CertPool::default`], or a
///      populated instance via [`CertPool::new_from_cbor`]
///   2. Add buffers using desired sources via [`push`](`CertPool::push`), i.e., certificates read
///      from files, downloaded via URIs, harvested from protocol handshakes, etc.
///   3. Call [`initialize`](`CertPool::initialize`) to parse and index the buffers.
///
/// Where partial paths were not deserialized alongside the buffers, call
/// [`find_all_partial_paths`](`CertPool::find_all_partial_paths`) to discover partial paths
/// relative to the trust anchors available via a [`PkiEnvironment`]. The instance can then be
/// passed to a [`PkiEnvironment`] to serve both as a source of certificates and as a path building
/// implementation, as shown below.
///
/// ```ignore
///    pe.add_certificate_source(&cert_pool);
///    pe.add_path_builder(&cert_pool);
/// ```
#[derive(Clone, Default)]
pub struct CertPool {
    /// Contains list of parsed certificates prepared from the buffers field. The order of the
    /// certificates is the same as the order of buffers in the buffers_and_paths.buffers field. If
    /// a buffer cannot be parsed successfully (or is otherwise rejected immediately, i.e.,
    /// expired), the corresponding element in the certs field is set to None.
    certs: Vec<Option<ParsedCertificate>>,

    /// Contains list of buffers referenced by certs field and, optionally, partial path
    /// relationships between certificates corresponding to those buffers. This field is the target
    /// of serialization/deserialization.
    buffers_and_paths: BuffersAndPaths,

    /// Maps certificate SKIDs to indices in the `certs` field. Typically, the SKID value is read
    /// from a SKID extension. If no extension is present, the value is calculated as the SHA256
    /// hash of the SubjectPublicKeyInfo field from the certificate.
    skid_map: BTreeMap<String, Vec<usize>>,

    /// Maps certificate subject names to indices in the `certs` field.
    name_map: BTreeMap<String, Vec<usize>>,
}

impl CertPool {
    /// Instantiates a new empty CertPool
    pub fn new() -> CertPool {
        CertPool {
            certs: Vec::new(),
            buffers_and_paths: BuffersAndPaths::default(),
            skid_map: BTreeMap::new(),
            name_map: BTreeMap::new(),
        }
    }

    /// Instantiates a new CertPool from a buffer containing a CBOR-encoded [`BuffersAndPaths`],
    /// i.e., as produced by [`serialize_partial_paths`](`CertPool::serialize_partial_paths`).
    /// [`initialize`](`CertPool::initialize`) must be called before the instance is used.
    pub fn new_from_cbor(cbor: &[u8]) -> Result<CertPool> {
        match from_reader(cbor) {
            Ok(bap) => Ok(CertPool {
                certs: Vec::new(),
                buffers_and_paths: bap,
                skid_map: BTreeMap::new(),
                name_map: BTreeMap::new(),
            }),
            Err(e) => {
                log_message(
                    &PkiLogLevel::Error,
                    format!("Failed to parse CBOR-encoded buffers and paths: {:?}", e).as_str(),
                );
                Err(Error::ParseError)
            }
        }
    }

    /// Adds a buffer containing a DER-encoded Certificate to the pool unless a buffer with the
    /// same bytes is already present. [`initialize`](`CertPool::initialize`) must be called before
    /// added buffers are available via the [`CertificateSource`] interface.
    pub fn push(&mut self, buffer: CertBuffer) {
        if !self.buffers_and_paths.buffers.contains(&buffer) {
            self.buffers_and_paths.buffers.push(buffer);
        }
    }

    /// Returns copies of the buffers present in the pool
    pub fn get_buffers(&self) -> Vec<CertBuffer> {
        self.buffers_and_paths.buffers.clone()
    }

    /// Parses any buffers passed to the instance via [`push`](`CertPool::push`) or deserialized
    /// via [`new_from_cbor`](`CertPool::new_from_cbor`) then indexes the parsed certificates.
    /// Buffers that cannot be parsed, or that are not valid at the time of interest indicated in
    /// the settings, occupy a None slot so that partial path indices remain stable.
    pub fn initialize(&mut self, cps: &CertificationPathSettings) -> Result<()> {
        self.certs.clear();
        populate_parsed_cert_vector(&self.buffers_and_paths, cps, &mut self.certs)?;
        self.index_certificates();
        Ok(())
    }

    /// index_certificates builds internally used key identifier and name maps. It must be called
    /// after the certs field has been populated and before use.
    fn index_certificates(&mut self) {
        self.skid_map.clear();
        self.name_map.clear();
        for (i, cert) in self.certs.iter().enumerate() {
            if let Some(cert) = cert {
                let hex_skid = hex_skid_from_cert(cert);
                self.skid_map.entry(hex_skid).or_default().push(i);

                let name_str = name_to_string(&cert.decoded_cert.tbs_certificate.subject);
                self.name_map.entry(name_str).or_default().push(i);
            }
        }
    }

    /// Logs certificate details at info level
    pub fn log_certificates(&self) {
        if self.certs.is_empty() {
            log_message(&PkiLogLevel::Info, "No certificates present");
        }

        for (i, c) in self.certs.iter().enumerate() {
            if let Some(cert) = c {
                let skid = hex_skid_from_cert(cert);
                let sub = get_leaf_rdn(&cert.decoded_cert.tbs_certificate.subject);
                let iss = get_leaf_rdn(&cert.decoded_cert.tbs_certificate.issuer);
                log_message(
                    &PkiLogLevel::Info,
                    format!(
                        "Index: {}; SKID: {}; Issuer: {}; Subject: {}",
                        i, skid, iss, sub
                    )
                    .as_str(),
                );
            }
        }
    }

    /// Logs a summary of available partial paths at info level
    pub fn log_partial_paths(&self) {
        let partial_paths = &self.buffers_and_paths.partial_paths;
        if partial_paths.is_empty() {
            log_message(&PkiLogLevel::Info, "No partial paths available");
            return;
        }

        let non_null_certs = self.certs.iter().flatten().count();
        let mut message = format!("{} certificates yielded: ", non_null_certs);
        for (i, outer) in partial_paths.iter().enumerate() {
            let count: usize = outer.values().map(|inner| inner.len()).sum();
            if 0 == i {
                message.push_str(format!("\n - {} paths with 1 certificate", count).as_str());
            } else if count != 0 {
                message.push_str(
                    format!(";\n - {} paths with {} certificates", count, i + 1).as_str(),
                );
            }
        }
        log_message(&PkiLogLevel::Info, message.as_str());
    }

    fn pub_key_in_path(&self, prospective_cert: &ParsedCertificate, path: &[usize]) -> bool {
        for i in path {
            let path_item = &self.certs[*i];
            if let Some(path_item) = path_item {
                if path_item
                    .decoded_cert
                    .tbs_certificate
                    .subject_public_key_info
                    == prospective_cert
                        .decoded_cert
                        .tbs_certificate
                        .subject_public_key_info
                {
                    return true;
                }
            } else {
                // the index references an empty slot where an un-parseable or time invalid buffer was found
                return false;
            }
        }
        false
    }

    fn get_operative_path_len_constraint(&self, path: &[usize]) -> u8 {
        let mut path_len_constraint = PS_MAX_PATH_LENGTH_CONSTRAINT;
        for i in path {
            if let Some(ca_cert) = &self.certs[*i] {
                if !is_self_issued(&ca_cert.decoded_cert) {
                    if path_len_constraint == 0 {
                        return 0;
                    }
                    path_len_constraint -= 1;
                }

                let bc_ext = ca_cert.get_extension(&ID_CE_BASIC_CONSTRAINTS);
                if let Ok(Some(ParsedExtension::BasicConstraints(bc))) = bc_ext {
                    if !bc.ca {
                        return 0;
                    }

                    if let Some(pl) = bc.path_len_constraint {
                        if path_len_constraint > pl {
                            path_len_constraint = pl;
                        }
                    }
                } else {
                    // intermediate CA certificates must feature a basicConstraints extension
                    return 0;
                }
            } else {
                return 0;
            }
        }
        path_len_constraint
    }

    /// check_validity_in_partial_path takes a set of indices and returns true if all are valid at
    /// the time of interest and false otherwise. If there is no time of interest, true is returned.
    pub fn check_validity_in_partial_path(
        &self,
        path: &[usize],
        cps: &CertificationPathSettings,
    ) -> bool {
        let time_of_interest = cps.get_time_of_interest();
        if 0 == time_of_interest {
            return true;
        }
        for i in path.iter() {
            if let Some(ca_cert) = &self.certs[*i] {
                if let Err(_e) = valid_at_time(
                    &ca_cert.decoded_cert.tbs_certificate,
                    time_of_interest,
                    false,
                ) {
                    return false;
                }
            }
        }
        true
    }

    /// check_names_in_partial_path takes a vector of indices that comprise a prospective partial
    /// path and checks for name constraints violations. This only checks for violations within the
    /// partial path itself. Issues when paired with some trust anchors or targets may still exist.
    pub fn check_names_in_partial_path(&self, path: &[usize]) -> bool {
        let mut permitted_subtrees = NameConstraintsSet::default();
        let mut excluded_subtrees = NameConstraintsSet::default();
        let mut perm_names_set = false;

        for (pos, i) in path.iter().enumerate() {
            if let Some(ca_cert) = &self.certs[*i] {
                let self_issued = is_self_issued(&ca_cert.decoded_cert);

                if (pos + 1) == path.len() || !self_issued {
                    if !permitted_subtrees
                        .subject_within_permitted_subtrees(&ca_cert.decoded_cert.tbs_certificate.subject)
                    {
                        return false;
                    }

                    if excluded_subtrees
                        .subject_within_excluded_subtrees(&ca_cert.decoded_cert.tbs_certificate.subject)
                    {
                        return false;
                    }

                    let san = if let Ok(Some(ParsedExtension::SubjectAltName(san))) =
                        ca_cert.get_extension(&ID_CE_SUBJECT_ALT_NAME)
                    {
                        Some(san)
                    } else {
                        None
                    };

                    if !permitted_subtrees.san_within_permitted_subtrees(&san) {
                        return false;
                    }

                    if excluded_subtrees.san_within_excluded_subtrees(&san) {
                        return false;
                    }
                }

                if pos + 1 != path.len() {
                    if let Ok(Some(ParsedExtension::NameConstraints(nc))) =
                        ca_cert.get_extension(&ID_CE_NAME_CONSTRAINTS)
                    {
                        if let Some(excl) = &nc.excluded_subtrees {
                            excluded_subtrees.calculate_union(excl);
                        }
                        if let Some(perm) = &nc.permitted_subtrees {
                            permitted_subtrees.calculate_intersection(perm);
                        }

                        if perm_names_set && permitted_subtrees.are_any_empty() {
                            return false;
                        } else if !perm_names_set && permitted_subtrees.are_any_empty() {
                            perm_names_set = true;
                        }
                    }
                }
            }
        }

        true
    }

    /// find_prospective_issuers returns a list of hex key identifiers for certificates that may
    /// have issued the presented certificate, based on AKID and name lookups.
    fn find_prospective_issuers(&self, target: &ParsedCertificate) -> Vec<String> {
        let mut retval: Vec<String> = vec![];

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
            retval.push(akid_hex);
        }
        for n in name_vec {
            let name_str = name_to_string(n);
            if let Some(indices) = self.name_map.get(&name_str) {
                for i in indices {
                    if let Some(c) = &self.certs[*i] {
                        let skid = hex_skid_from_cert(c);
                        if !retval.contains(&skid) {
                            retval.push(skid);
                        }
                    }
                }
            }
        }

        retval
    }

    /// find_all_partial_paths_internal is a slow recursive builder intended for offline use prior
    /// to serializing a set of partial paths.
    ///
    /// The 0th element in the outer vector features a map that contains paths that feature one CA
    /// certificate, i.e., CAs that are issued by an available trust anchor. The 1st element in the
    /// outer vector features a map that contains paths that feature two CA certificates, i.e., a
    /// copy of an item in the 0th element with one certificate added, and so on.
    ///
    /// To build a path for a given target certificate, one iterates over the outer vector and
    /// saves vectors of indices from the map element corresponding to the desired key identifier.
    /// The resulting set of partial paths will proceed from shortest available path to longest.
    fn find_all_partial_paths_internal(
        &self,
        pe: &PkiEnvironment<'_>,
        cps: &CertificationPathSettings,
        pass: u8,
        partial_paths: &mut PartialPaths,
    ) {
        // Aggregates paths built relative to the 0th or pass-1 row in partial_paths, if any.
        let mut new_additions: BTreeMap<String, Vec<Vec<usize>>> = BTreeMap::new();

        // Iterate over all certs, skipping over elements that don't have a cert (these correspond
        // to buffers that could not be parsed or were not time valid when certs was prepared).
        for (cur_cert_index, cur_cert) in self.certs.iter().enumerate() {
            if let Some(cur_cert) = cur_cert {
                let cur_cert_hex_skid = hex_skid_from_cert(cur_cert);
                if 0 == pass {
                    let ta = pe.get_trust_anchor_for_target(cur_cert);
                    if let Ok(ta) = ta {
                        // RFC 5914 TAs do not necessarily have a name. If this is one of those,
                        // ignore it.
                        let ta_name = get_trust_anchor_name(&ta.decoded_ta);
                        if let Ok(ta_name) = ta_name {
                            if compare_names(&cur_cert.decoded_cert.tbs_certificate.issuer, ta_name)
                            {
                                let defer_cert =
                                    DeferDecodeSigned::from_der(&cur_cert.encoded_cert);
                                if let Ok(defer_cert) = defer_cert {
                                    let spki = get_subject_public_key_info_from_trust_anchor(
                                        &ta.decoded_ta,
                                    );
                                    let r = pe.verify_signature_message(
                                        pe,
                                        &defer_cert.tbs_field,
                                        cur_cert.decoded_cert.signature.raw_bytes(),
                                        &cur_cert.decoded_cert.tbs_certificate.signature,
                                        spki,
                                    );
                                    if r.is_ok() {
                                        let new_path = vec![cur_cert_index];
                                        let entry = new_additions
                                            .entry(cur_cert_hex_skid.clone())
                                            .or_default();
                                        if !entry.contains(&new_path) {
                                            entry.push(new_path);
                                        }
                                    }
                                }
                            }
                        }
                    }
                } else {
                    let defer_cert = DeferDecodeSigned::from_der(&cur_cert.encoded_cert);
                    if let Ok(defer_cert) = defer_cert {
                        // look for matches in map from previous row of partial_paths
                        let last_row = &partial_paths[(pass - 1) as usize];

                        let prospective_issuers = self.find_prospective_issuers(cur_cert);
                        for k in prospective_issuers {
                            let prospective_paths = if let Some(pp) = last_row.get(&k) {
                                pp
                            } else {
                                continue;
                            };
                            for prospective_path in prospective_paths {
                                let prospective_ca_cert =
                                    &self.certs[prospective_path[prospective_path.len() - 1]];
                                if let Some(prospective_ca_cert) = prospective_ca_cert {
                                    if 0 == self.get_operative_path_len_constraint(prospective_path)
                                    {
                                        continue;
                                    }

                                    // Path settings are only consulted for the time of interest at
                                    // this stage. Policy and name constraint settings are more
                                    // variable across validation requests than use of current time
                                    // as the time of interest, so those are left to validation.
                                    if compare_names(
                                        &cur_cert.decoded_cert.tbs_certificate.issuer,
                                        &prospective_ca_cert.decoded_cert.tbs_certificate.subject,
                                    ) && self.check_names_in_partial_path(prospective_path)
                                        && self
                                            .check_validity_in_partial_path(prospective_path, cps)
                                    {
                                        let r = pe.verify_signature_message(
                                            pe,
                                            &defer_cert.tbs_field,
                                            cur_cert.decoded_cert.signature.raw_bytes(),
                                            &cur_cert.decoded_cert.tbs_certificate.signature,
                                            &prospective_ca_cert
                                                .decoded_cert
                                                .tbs_certificate
                                                .subject_public_key_info,
                                        );
                                        if r.is_ok()
                                            && !self.pub_key_in_path(cur_cert, prospective_path)
                                        {
                                            let mut new_path = prospective_path.clone();
                                            new_path.push(cur_cert_index);
                                            let entry = new_additions
                                                .entry(cur_cert_hex_skid.clone())
                                                .or_default();
                                            if !entry.contains(&new_path) {
                                                entry.push(new_path);
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        }
        if !new_additions.is_empty() {
            partial_paths.push(new_additions);
            // the number of passes does not count the trust anchor or the target
            if (PS_MAX_PATH_LENGTH_CONSTRAINT - 2) > pass {
                self.find_all_partial_paths_internal(pe, cps, pass + 1, partial_paths);
            }
        }
    }

    /// find_all_partial_paths is a slow recursive builder intended for offline use prior to
    /// serializing a set of partial paths. Any previously discovered or deserialized partial paths
    /// are discarded and rediscovered relative to the trust anchors available via the presented
    /// environment.
    pub fn find_all_partial_paths(
        &mut self,
        pe: &PkiEnvironment<'_>,
        cps: &CertificationPathSettings,
    ) {
        let mut partial_paths = PartialPaths::new();
        self.find_all_partial_paths_internal(pe, cps, 0, &mut partial_paths);
        self.buffers_and_paths.partial_paths = partial_paths;
    }

    /// serialize_partial_paths returns a buffer containing a CBOR encoding of the buffers and
    /// partial paths maintained by a CertPool instance. This can be deserialized via
    /// [`new_from_cbor`](`CertPool::new_from_cbor`) to prepare a new CertPool instance for use.
    pub fn serialize_partial_paths(
        &self,
        format: CertificationPathBuilderFormats,
    ) -> Result<Vec<u8>> {
        if CertificationPathBuilderFormats::Cbor != format {
            log_message(&PkiLogLevel::Error, "Format other than CBOR requested when serializing partial paths. Only CBOR is accepted presently.");
            return Err(Error::Unrecognized);
        }

        let mut ppcounter = 0;
        for outer in &self.buffers_and_paths.partial_paths {
            for inner in outer.values() {
                ppcounter += inner.len();
            }
        }
        log_message(
            &PkiLogLevel::Info,
            format!(
                "Serializing {} buffers and {} partial paths",
                self.buffers_and_paths.buffers.len(),
                ppcounter
            )
            .as_str(),
        );

        let mut buffer = Vec::new();
        match into_writer(&self.buffers_and_paths, &mut buffer) {
            Ok(_) => Ok(buffer),
            Err(e) => {
                log_message(
                    &PkiLogLevel::Error,
                    format!(
                        "Failed to generate CBOR encoding of partial paths with error: {:?}",
                        e
                    )
                    .as_str(),
                );
                Err(Error::Unrecognized)
            }
        }
    }
}

impl CertificationPathBuilder for CertPool {
    /// get_paths_for_target takes a target certificate and returns a vector of
    /// [`CertificationPath`] objects via the paths parameter, proceeding from shortest available
    /// path to longest.
    fn get_paths_for_target(
        &self,
        pe: &PkiEnvironment<'_>,
        target: &ParsedCertificate,
        paths: &mut Vec<CertificationPath>,
        threshold: usize,
        time_of_interest: u64,
    ) -> Result<()> {
        if let Err(_e) = valid_at_time(&target.decoded_cert.tbs_certificate, time_of_interest, true)
        {
            log_message(
                &PkiLogLevel::Error,
                format!(
                    "No paths found because target is not valid at indicated time of interest ({})",
                    time_of_interest
                )
                .as_str(),
            );
            return Ok(());
        }

        let ta = pe.get_trust_anchor_for_target(target);
        if let Ok(ta) = ta {
            let path = CertificationPath::new(ta.clone(), vec![], target.clone());
            paths.push(path);
        }

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

        let paths_count = paths.len();

        // The second iteration is only reached when the first yielded nothing and a key
        // identifier could be derived from the name map in lieu of an absent or unknown AKID.
        let mut ii = 0;
        while ii < 2 {
            ii += 1;
            if !akid_hex.is_empty() {
                for p in &self.buffers_and_paths.partial_paths {
                    if let Some(indices_vec) = p.get(&akid_hex) {
                        for indices in indices_vec {
                            if !above_threshold(indices, threshold) {
                                continue;
                            }

                            // This block accounts for CAs that use different names for same SKID.
                            let last_index = if let Some(li) = indices.last() {
                                li
                            } else {
                                continue;
                            };
                            let issuer = &self.certs[*last_index];
                            if let Some(ca) = issuer {
                                if !compare_names(
                                    &ca.decoded_cert.tbs_certificate.subject,
                                    &target.decoded_cert.tbs_certificate.issuer,
                                ) {
                                    log_message(&PkiLogLevel::Error, "Encountered CA that is likely using same SKID with different names. Skipping partial path due to name mismatch.");
                                    continue;
                                }
                            }

                            let mut ta = None;
                            let mut intermediates = vec![];
                            let mut found_blank = false;
                            for (i, index) in indices.iter().enumerate() {
                                if let Some(cert) = &self.certs[*index] {
                                    intermediates.push(cert.clone());
                                    if 0 == i {
                                        let mut ta_akid_hex = "".to_string();
                                        let ca_akid_ext =
                                            cert.get_extension(&ID_CE_AUTHORITY_KEY_IDENTIFIER);
                                        if let Ok(Some(ParsedExtension::AuthorityKeyIdentifier(
                                            ca_akid,
                                        ))) = ca_akid_ext
                                        {
                                            if let Some(ca_kid) = &ca_akid.key_identifier {
                                                ta_akid_hex = buffer_to_hex(ca_kid.as_bytes());
                                            }
                                        }

                                        if !ta_akid_hex.is_empty() {
                                            if let Ok(new_ta) =
                                                pe.get_trust_anchor_by_hex_skid(&ta_akid_hex)
                                            {
                                                ta = Some(new_ta);
                                            }
                                        } else {
                                            let locator = get_locator_from_cert_metadata(cert);
                                            log_message(
                                                &PkiLogLevel::Warn,
                                                format!(
                                                    "Missing AKID for trust anchor - {}",
                                                    locator
                                                )
                                                .as_str(),
                                            );
                                            if let Ok(new_ta) = pe.get_trust_anchor_for_target(cert)
                                            {
                                                log_message(
                                                    &PkiLogLevel::Info,
                                                    "Found trust anchor by name",
                                                );
                                                ta = Some(new_ta);
                                            }
                                        }
                                    }
                                } else {
                                    // some cert slots are empty (due to parse or validity error). skip those.
                                    found_blank = true;
                                    break;
                                }
                            }
                            if !found_blank {
                                if let Some(ta) = ta {
                                    let path = CertificationPath::new(
                                        ta.clone(),
                                        intermediates,
                                        target.clone(),
                                    );
                                    if !pub_key_repeats(&path) {
                                        ii = 2;
                                        paths.push(path);
                                    }
                                }
                            }
                        }
                    }
                }
            } else {
                let locator = get_locator_from_cert_metadata(target);
                log_message(
                    &PkiLogLevel::Error,
                    format!(
                        "Missing AKID in target and failed to find by name - {}",
                        locator
                    )
                    .as_str(),
                );
            }

            if akid_hex.is_empty() || paths_count == paths.len() {
                // try to use name map to find AKID
                let mut changed = false;
                for n in &name_vec {
                    let name_str = name_to_string(n);
                    if let Some(indices) = self.name_map.get(&name_str) {
                        for i in indices {
                            if let Some(cert) = &self.certs[*i] {
                                let skid = hex_skid_from_cert(cert);
                                if !skid.is_empty() {
                                    log_message(
                                        &PkiLogLevel::Debug,
                                        format!(
                                            "Using calculated key identifier in lieu of AKID for {}",
                                            name_str
                                        )
                                        .as_str(),
                                    );
                                    akid_hex = skid;
                                    changed = true;
                                    break;
                                }
                            }
                        }
                    }
                }
                if !changed {
                    ii = 2;
                }
            }
        }

        Ok(())
    }
}

impl CertificateSource for CertPool {
    fn get_certificates(&'_ self) -> Result<Vec<&ParsedCertificate>> {
        let mut v = vec![];
        for cert in self.certs.iter().flatten() {
            v.push(cert);
        }

        Ok(v)
    }

    fn get_certificates_for_skid(&self, skid: &[u8]) -> Result<Vec<&ParsedCertificate>> {
        let hex_skid = buffer_to_hex(skid);
        let mut retval = vec![];
        if let Some(indices) = self.skid_map.get(hex_skid.as_str()) {
            for i in indices {
                if let Some(cert) = &self.certs[*i] {
                    retval.push(cert);
                }
            }
        }

        if retval.is_empty() {
            Err(Error::NotFound)
        } else {
            Ok(retval)
        }
    }

    fn get_certificates_for_name(&self, name: &Name) -> Result<Vec<&ParsedCertificate>> {
        let name_str = name_to_string(name);
        let mut retval = vec![];
        if let Some(indices) = self.name_map.get(name_str.as_str()) {
            for i in indices {
                if let Some(cert) = &self.certs[*i] {
                    retval.push(cert);
                }
            }
        }

        if retval.is_empty() {
            Err(Error::NotFound)
        } else {
            Ok(retval)
        }
    }

    fn get_certificates_matching(
        &self,
        selector: &CertificateSelector,
    ) -> Result<Vec<&ParsedCertificate>> {
        let mut retval = vec![];
        for cert in self.certs.iter().flatten() {
            if selector.match_certificate(cert) {
                retval.push(cert);
            }
        }
        Ok(retval)
    }

    fn get_encoded_certificates(&self) -> Result<Vec<Vec<u8>>> {
        let mut v = vec![];
        for cert in self.certs.iter().flatten() {
            v.push(cert.encoded_cert.clone());
        }
        Ok(v)
    }
}

fn above_threshold(v: &[usize], t: usize) -> bool {
    if 0 == t {
        return true;
    }

    for i in v {
        if *i > t - 1 {
            // if at least one item is above the threshold, let it pass
            return true;
        }
    }
    false
}

fn pub_key_repeats(path: &CertificationPath) -> bool {
    let mut spki_array: Vec<&SubjectPublicKeyInfoOwned> =
        vec![get_subject_public_key_info_from_trust_anchor(
            &path.trust_anchor.decoded_ta,
        )];
    for c in path.intermediates.iter() {
        if spki_array.contains(&&c.decoded_cert.tbs_certificate.subject_public_key_info) {
            return true;
        } else {
            spki_array.push(&c.decoded_cert.tbs_certificate.subject_public_key_info);
        }
    }
    false
}

/// populate_parsed_cert_vector takes a [`BuffersAndPaths`] instance and prepares a vector of
/// `Option<ParsedCertificate>` with one element per buffer. Buffers that cannot be parsed, or
/// that are not valid at the time of interest indicated in the settings, yield a None slot so
/// that indices into the vector align with indices into the buffers.
fn populate_parsed_cert_vector(
    bap: &BuffersAndPaths,
    cps: &CertificationPathSettings,
    cert_store: &mut Vec<Option<ParsedCertificate>>,
) -> Result<()> {
    let time_of_interest = cps.get_time_of_interest();
    for cert_buffer in &bap.buffers {
        if let Ok(cert) = Certificate::from_der(cert_buffer.bytes.as_slice()) {
            let valid = if 0 == time_of_interest {
                true
            } else {
                let r = valid_at_time(&cert.tbs_certificate, time_of_interest, false);
                if r.is_err() {
                    log_message(
                        &PkiLogLevel::Error,
                        format!(
                            "Certificate from {} is not valid at indicated time of interest",
                            cert_buffer.locator
                        )
                        .as_str(),
                    );
                }
                r.is_ok()
            };

            if valid {
                let mut md = Asn1Metadata::new();
                md.insert(
                    MD_LOCATOR.to_string(),
                    Asn1MetadataTypes::String(cert_buffer.locator.clone()),
                );

                let mut parsed_cert = ParsedCertificate {
                    encoded_cert: cert_buffer.bytes.clone(),
                    decoded_cert: cert,
                    metadata: Some(md),
                    parsed_extensions: Default::default(),
                };
                parsed_cert.parse_extensions(EXTS_OF_INTEREST);
                cert_store.push(Some(parsed_cert));
            } else {
                cert_store.push(None);
            }
        } else {
            cert_store.push(None);
        }
    }
    Ok(())
}

/// get_locator_from_cert_metadata returns the string from the `MD_LOCATOR` in the metadata or an
/// empty string.
pub fn get_locator_from_cert_metadata(cert: &ParsedCertificate) -> String {
    if let Some(md) = &cert.metadata {
        if let Some(Asn1MetadataTypes::String(locator)) = md.get(MD_LOCATOR) {
            return locator.to_owned();
        }
    }
    "".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn above_threshold_test() {
        assert!(above_threshold(&[0, 1, 2], 0));
        assert!(above_threshold(&[0, 1, 2], 2));
        assert!(!above_threshold(&[0, 1, 2], 3));
        assert!(above_threshold(&[5], 3));
        assert!(!above_threshold(&[], 1));
    }

    #[test]
    fn cert_buffer_equality_ignores_locator() {
        let left = CertBuffer {
            locator: "left.der".to_string(),
            bytes: vec![1, 2, 3],
        };
        let right = CertBuffer {
            locator: "right.der".to_string(),
            bytes: vec![1, 2, 3],
        };
        let other = CertBuffer {
            locator: "left.der".to_string(),
            bytes: vec![4, 5, 6],
        };
        assert_eq!(left, right);
        assert_ne!(left, other);
    }

    #[test]
    fn push_dedupes_buffers() {
        let mut pool = CertPool::new();
        pool.push(CertBuffer {
            locator: "a.der".to_string(),
            bytes: vec![1, 2, 3],
        });
        pool.push(CertBuffer {
            locator: "b.der".to_string(),
            bytes: vec![1, 2, 3],
        });
        pool.push(CertBuffer {
            locator: "c.der".to_string(),
            bytes: vec![4, 5, 6],
        });
        assert_eq!(2, pool.get_buffers().len());
    }

    #[test]
    fn cbor_round_trip() {
        let mut pool = CertPool::new();
        pool.push(CertBuffer {
            locator: "a.der".to_string(),
            bytes: vec![1, 2, 3],
        });
        let mut row = BTreeMap::new();
        row.insert("AABBCC".to_string(), vec![vec![0]]);
        pool.buffers_and_paths.partial_paths = vec![row];

        let cbor = pool
            .serialize_partial_paths(CertificationPathBuilderFormats::Cbor)
            .unwrap();
        let restored = CertPool::new_from_cbor(cbor.as_slice()).unwrap();
        assert_eq!(pool.get_buffers(), restored.get_buffers());
        assert_eq!(
            vec![vec![0usize]],
            restored.buffers_and_paths.partial_paths[0]["AABBCC"]
        );
    }

    #[test]
    fn new_from_cbor_rejects_garbage() {
        assert!(CertPool::new_from_cbor(&[0xff, 0x00, 0x01]).is_err());
    }

    #[test]
    fn initialize_skips_unparseable_buffers() {
        let mut pool = CertPool::new();
        pool.push(CertBuffer {
            locator: "junk.der".to_string(),
            bytes: vec![0x30, 0x03, 0x02, 0x01, 0x01],
        });
        let cps = CertificationPathSettings::default();
        assert!(pool.initialize(&cps).is_ok());
        assert!(pool.get_certificates().unwrap().is_empty());
        assert!(pool.get_certificates_for_skid(&[0x01]).is_err());
    }
}
