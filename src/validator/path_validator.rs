//! Functions related to certification path validation operations

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::format;
use alloc::{vec, vec::Vec};
use core::cell::RefCell;

use flagset::FlagSet;

use const_oid::db::rfc5280::ANY_POLICY;
use const_oid::db::rfc5912::*;
use der::{asn1::ObjectIdentifier, Decode, Encode};
use x509_cert::ext::pkix::KeyUsages;

use crate::util::error::*;
use crate::util::logging::*;
use crate::util::name_utils::*;
use crate::validator::policy_tree::*;
use crate::validator::trust_anchor::{
    get_inhibit_any_policy_from_trust_anchor, get_inhibit_policy_mapping_from_trust_anchor,
    get_path_length_constraint_from_trust_anchor, get_policy_set_from_trust_anchor,
    get_require_explicit_policy_from_trust_anchor,
};
use crate::{
    get_subject_public_key_info_from_trust_anchor, get_trust_anchor_name, ta_valid_at_time,
    CertificationPath, CertificationPathResults, CertificationPathSettings, DeferDecodeSigned,
    ExtensionProcessing, FinalValidPolicyTree, ObjectIdentifierSet, ParsedCertificate,
    ParsedExtension, ParsedTrustAnchor, PkiEnvironment, ValidPolicyTreeNode,
};

/// `EXTS_OF_INTEREST` provides a list of extensions that will be automatically parsed when preparing
/// a [`ParsedCertificate`] or [`ParsedTrustAnchor`] instance. These extensions are used during path
/// development and validation and are subsequently available via get_extension without re-parsing.
pub static EXTS_OF_INTEREST: &[ObjectIdentifier] = &[
    ID_CE_SUBJECT_KEY_IDENTIFIER,
    ID_CE_AUTHORITY_KEY_IDENTIFIER,
    ID_CE_BASIC_CONSTRAINTS,
    ID_CE_NAME_CONSTRAINTS,
    ID_CE_SUBJECT_ALT_NAME,
    ID_CE_EXT_KEY_USAGE,
    ID_CE_KEY_USAGE,
    ID_CE_POLICY_CONSTRAINTS,
    ID_CE_CERTIFICATE_POLICIES,
    ID_CE_POLICY_MAPPINGS,
    ID_CE_INHIBIT_ANY_POLICY,
    ID_CE_PRIVATE_KEY_USAGE_PERIOD,
    ID_CE_CRL_DISTRIBUTION_POINTS,
];

//-----------------------------------------------------------------------------
// Top level functions for use via PkiEnvironment's validate_path member. These
// aggregate lower level checks.
//-----------------------------------------------------------------------------
/// `validate_path_rfc5280` aggregates various checks to perform certification path validation per
/// [RFC 5280 Section 6.1]. It is intended for use in the validate_path field of a [`PkiEnvironment`] structure.
///
/// - The [`PkiEnvironment`] parameter provides a variety of callback functions that support certification
/// path validation, for example, signature verification, digest generation, and revocation status
/// determination.
/// - The [`CertificationPathSettings`] parameter defines values that govern path validation. This consists
/// of a mix of standard path validation inputs from [RFC 5280 Section 6.1.1] and non-standard inputs,
/// i.e., whether or not to validate extendedKeyUsage values across the path.
/// - The [`CertificationPath`] parameter provides the target certificate to validate along with a trust
/// anchor and, if necessary, intermediate CA certificates.
/// - The [`CertificationPathResults`] parameter is used to collect potentially useful information from the
/// certification path validation operation, including the validation status, the index of the
/// certificate that caused a failure and the final valid_policy_tree.
///
/// When the `PS_ENFORCE_TRUST_ANCHOR_CONSTRAINTS` setting is true, constraints conveyed by the
/// trust anchor are folded into the operative settings per RFC 5937 before any checks are run.
///
/// [RFC 5280 Section 6.1]: <https://datatracker.ietf.org/doc/html/rfc5280.html#section-6.1>
/// [RFC 5280 Section 6.1.1]: <https://datatracker.ietf.org/doc/html/rfc5280.html#section-6.1.1>
pub fn validate_path_rfc5280(
    pe: &PkiEnvironment<'_>,
    cps: &CertificationPathSettings,
    cp: &mut CertificationPath,
    cpr: &mut CertificationPathResults,
) -> Result<()> {
    let mut mod_cps = CertificationPathSettings::default();
    let cps = enforce_trust_anchor_constraints(cps, &cp.trust_anchor, &mut mod_cps)?;

    check_validity(pe, cps, cp, cpr)?;
    check_basic_constraints(pe, cps, cp, cpr)?;
    check_names(pe, cps, cp, cpr)?;
    check_certificate_policies(pe, cps, cp, cpr)?;
    check_key_usage(pe, cps, cp, cpr)?;
    check_extended_key_usage(pe, cps, cp, cpr)?;
    check_critical_extensions(pe, cps, cp, cpr)?;
    verify_signatures(pe, cps, cp, cpr)?;
    check_revocation(pe, cps, cp, cpr)?;
    cpr.set_validation_status(PathValidationStatus::Valid);
    log_message(
        &PkiLogLevel::Info,
        format!(
            "Successfully completed path validation checks for certificate issued to {}",
            name_to_string(&cp.target.decoded_cert.tbs_certificate.subject)
        )
        .as_str(),
    );
    Ok(())
}

//-----------------------------------------------------------------------------
// Functions that perform some small aspect of path validation
//-----------------------------------------------------------------------------
/// `check_basic_constraints` ensures all intermediate CA certificates feature a basicConstraints extension
/// with the cA field set to true and that the certificate path length does not violate length constraints.
///
/// It uses values from the `PS_INITIAL_PATH_LENGTH_CONSTRAINT` item in the [`CertificationPathSettings`]
/// and the path_len_constraint field of basicConstraints extensions.
pub fn check_basic_constraints(
    _pe: &PkiEnvironment<'_>,
    cps: &CertificationPathSettings,
    cp: &mut CertificationPath,
    cpr: &mut CertificationPathResults,
) -> Result<()> {
    cpr.add_processed_extension(ID_CE_BASIC_CONSTRAINTS);
    let mut path_len_constraint = cps.get_initial_path_length_constraint();

    for (pos, ca_cert) in cp.intermediates.iter().enumerate() {
        // (l)  If the certificate was not self-issued, verify that
        //       max_path_length is greater than zero and decrement
        //       max_path_length by 1.
        if !is_self_issued(&ca_cert.decoded_cert) {
            if path_len_constraint == 0 {
                log_error_for_ca(ca_cert, "path length constraint violation");
                cpr.set_validation_status(PathValidationStatus::InvalidPathLength);
                cpr.set_failed_cert_index(pos as u8);
                return Err(Error::PathValidation(
                    PathValidationStatus::InvalidPathLength,
                ));
            }
            path_len_constraint -= 1;
        }

        // (k)  If certificate i is a version 3 certificate, verify that the
        //       basicConstraints extension is present and that cA is set to
        //       TRUE.
        let pdv_ext: Option<&ParsedExtension> = ca_cert.get_extension(&ID_CE_BASIC_CONSTRAINTS)?;
        let bc = match pdv_ext {
            Some(ParsedExtension::BasicConstraints(bc)) => bc,
            _ => {
                log_error_for_ca(ca_cert, "missing basic constraints");
                cpr.set_validation_status(PathValidationStatus::MissingBasicConstraints);
                cpr.set_failed_cert_index(pos as u8);
                return Err(Error::PathValidation(
                    PathValidationStatus::MissingBasicConstraints,
                ));
            }
        };

        if !bc.ca {
            log_error_for_ca(ca_cert, "invalid basic constraints");
            cpr.set_validation_status(PathValidationStatus::InvalidBasicConstraints);
            cpr.set_failed_cert_index(pos as u8);
            return Err(Error::PathValidation(
                PathValidationStatus::InvalidBasicConstraints,
            ));
        }

        // (m)  If pathLenConstraint is present in the certificate and is
        //       less than max_path_length, set max_path_length to the value
        //       of pathLenConstraint.
        if let Some(pl) = bc.path_len_constraint {
            path_len_constraint = path_len_constraint.min(pl);
        }
    }

    Ok(())
}

/// `check_validity` evaluates the target certificate and intermediate certificates against the
/// `PS_TIME_OF_INTEREST` value read from the [`CertificationPathSettings`] parameter. A time of
/// interest set to zero disables validity checking, and the `PS_IGNORE_EXPIRED` setting causes
/// notAfter violations (but not notBefore violations) to be tolerated.
pub fn check_validity(
    _pe: &PkiEnvironment<'_>,
    cps: &CertificationPathSettings,
    cp: &mut CertificationPath,
    cpr: &mut CertificationPathResults,
) -> Result<()> {
    // RFC 5280 states: (2)  The certificate validity period includes the current time.
    // get_time_of_interest returns now by default or a caller specified time of interest.
    let toi = cps.get_time_of_interest();
    if 0 == toi {
        log_message(
            &PkiLogLevel::Info,
            "check_validity invoked with no time of interest; validity check disabled",
        );
        return Ok(());
    }
    let ignore_expired = cps.get_ignore_expired();

    if let Err(e) = valid_at_time(&cp.target.decoded_cert.tbs_certificate, toi, false) {
        if !tolerate_expiry(e, ignore_expired) {
            if let Error::PathValidation(pvs) = e {
                cpr.set_validation_status(pvs);
            }
            cpr.set_failed_cert_index(cp.intermediates.len() as u8);
            return Err(e);
        }
    }

    for (pos, ca_cert) in cp.intermediates.iter().enumerate() {
        if let Err(e) = valid_at_time(&ca_cert.decoded_cert.tbs_certificate, toi, false) {
            if !tolerate_expiry(e, ignore_expired) {
                if let Error::PathValidation(pvs) = e {
                    cpr.set_validation_status(pvs);
                }
                cpr.set_failed_cert_index(pos as u8);
                return Err(e);
            }
        }
    }

    if cps.get_enforce_trust_anchor_validity() {
        // Check TA validity if feature is on (it's on by default) but if the TA does not feature a
        // validity, i.e., if it's a TA Info without a certificate, just carry on.
        if let Err(e) = ta_valid_at_time(&cp.trust_anchor.decoded_ta, toi, false) {
            if !tolerate_expiry(e, ignore_expired) {
                if let Error::PathValidation(pvs) = e {
                    cpr.set_validation_status(pvs);
                }
                return Err(e);
            }
        }
    }

    Ok(())
}

fn tolerate_expiry(e: Error, ignore_expired: bool) -> bool {
    ignore_expired
        && matches!(
            e,
            Error::PathValidation(PathValidationStatus::InvalidNotAfterDate)
        )
}

/// `check_names` ensures that subject and issuer names chain appropriately throughout the certification
/// path and that no names violate any operative name constraints.
///
/// At present, the following name forms are supported for name constraints enforcement:
/// - distinguished name
/// - RFC822 names
/// - DNS names
/// - uniform resource identifiers
/// - IP addresses
/// - user principal names
pub fn check_names(
    _pe: &PkiEnvironment<'_>,
    cps: &CertificationPathSettings,
    cp: &mut CertificationPath,
    cpr: &mut CertificationPathResults,
) -> Result<()> {
    cpr.add_processed_extension(ID_CE_NAME_CONSTRAINTS);

    // Read input variables from path settings
    let mut pbufs = BTreeMap::new();
    let mut ebufs = BTreeMap::new();
    let perm_configured = cps.get_initial_permitted_subtrees().is_some();
    let mut permitted_subtrees = cps.get_initial_permitted_subtrees_with_default_as_set(&mut pbufs)?;
    let mut excluded_subtrees = cps.get_initial_excluded_subtrees_with_default_as_set(&mut ebufs)?;
    let mut perm_names_set = perm_configured;

    // for convenience, combine target into array with the intermediate CA certs
    let mut v = cp.intermediates.clone();
    v.push(cp.target.clone());
    let certs_in_cert_path = v.len();

    let mut working_issuer_name = match get_trust_anchor_name(&cp.trust_anchor.decoded_ta) {
        Ok(n) => n,
        Err(e) => {
            if let Error::PathValidation(pvs) = e {
                cpr.set_validation_status(pvs);
            }
            return Err(e);
        }
    };

    // Iterate over the list of intermediate CA certificates plus target to check name chaining
    for (pos, ca_cert) in v.iter().enumerate() {
        if !compare_names(
            &ca_cert.decoded_cert.tbs_certificate.issuer,
            working_issuer_name,
        ) {
            log_error_for_ca(ca_cert, "name chaining violation");
            cpr.set_validation_status(PathValidationStatus::NameChainingFailure);
            cpr.set_failed_cert_index(pos as u8);
            return Err(Error::PathValidation(
                PathValidationStatus::NameChainingFailure,
            ));
        }

        if pos + 1 != certs_in_cert_path {
            working_issuer_name = &ca_cert.decoded_cert.tbs_certificate.subject;
        }
    }

    // Iterate over the list of intermediate CA certificates plus target to check name constraints
    for (pos, ca_cert) in v.iter().enumerate() {
        let self_issued = is_self_issued(&ca_cert.decoded_cert);

        if (pos + 1) == certs_in_cert_path || !self_issued {
            if !permitted_subtrees
                .subject_within_permitted_subtrees(&ca_cert.decoded_cert.tbs_certificate.subject)
            {
                log_error_for_ca(
                    ca_cert,
                    "permitted name constraints violation for subject name",
                );
                cpr.set_validation_status(PathValidationStatus::NameConstraintsViolation);
                cpr.set_failed_cert_index(pos as u8);
                return Err(Error::PathValidation(
                    PathValidationStatus::NameConstraintsViolation,
                ));
            }

            if excluded_subtrees
                .subject_within_excluded_subtrees(&ca_cert.decoded_cert.tbs_certificate.subject)
            {
                log_error_for_ca(
                    ca_cert,
                    "excluded name constraints violation for subject name",
                );
                cpr.set_validation_status(PathValidationStatus::NameConstraintsViolation);
                cpr.set_failed_cert_index(pos as u8);
                return Err(Error::PathValidation(
                    PathValidationStatus::NameConstraintsViolation,
                ));
            }

            let pdv_ext: Option<&ParsedExtension> =
                ca_cert.get_extension(&ID_CE_SUBJECT_ALT_NAME)?;
            let san = if let Some(ParsedExtension::SubjectAltName(san)) = pdv_ext {
                cpr.add_processed_extension(ID_CE_SUBJECT_ALT_NAME);
                Some(san)
            } else {
                None
            };

            if !permitted_subtrees.san_within_permitted_subtrees(&san) {
                log_error_for_ca(ca_cert, "permitted name constraints violation for SAN");
                cpr.set_validation_status(PathValidationStatus::NameConstraintsViolation);
                cpr.set_failed_cert_index(pos as u8);
                return Err(Error::PathValidation(
                    PathValidationStatus::NameConstraintsViolation,
                ));
            }

            if excluded_subtrees.san_within_excluded_subtrees(&san) {
                log_error_for_ca(ca_cert, "excluded name constraints violation for SAN");
                cpr.set_validation_status(PathValidationStatus::NameConstraintsViolation);
                cpr.set_failed_cert_index(pos as u8);
                return Err(Error::PathValidation(
                    PathValidationStatus::NameConstraintsViolation,
                ));
            }
        }

        if pos + 1 != certs_in_cert_path {
            let pdv_ext: Option<&ParsedExtension> =
                ca_cert.get_extension(&ID_CE_NAME_CONSTRAINTS)?;
            if let Some(ParsedExtension::NameConstraints(nc)) = pdv_ext {
                if let Some(excl) = &nc.excluded_subtrees {
                    excluded_subtrees.calculate_union(excl);
                }
                if let Some(perm) = &nc.permitted_subtrees {
                    permitted_subtrees.calculate_intersection(perm);
                }

                if perm_names_set && permitted_subtrees.are_any_empty() {
                    log_error_for_ca(ca_cert, "permitted name constraints intersection is empty");
                    cpr.set_validation_status(PathValidationStatus::NameConstraintsViolation);
                    cpr.set_failed_cert_index(pos as u8);
                    return Err(Error::PathValidation(
                        PathValidationStatus::NameConstraintsViolation,
                    ));
                } else if !perm_names_set && permitted_subtrees.are_any_empty() {
                    perm_names_set = true;
                }
            }
        }
    }

    Ok(())
}

/// `check_key_usage` ensures all intermediate CA certificates assert the keyCertSign bit and that the
/// target certificate asserts the bits from the `PS_KEY_USAGE` item in the [`CertificationPathSettings`],
/// if any.
pub fn check_key_usage(
    _pe: &PkiEnvironment<'_>,
    cps: &CertificationPathSettings,
    cp: &mut CertificationPath,
    cpr: &mut CertificationPathResults,
) -> Result<()> {
    cpr.add_processed_extension(ID_CE_KEY_USAGE);
    for (pos, ca_cert) in cp.intermediates.iter().enumerate() {
        let pdv_ext: Option<&ParsedExtension> = ca_cert.get_extension(&ID_CE_KEY_USAGE)?;
        if let Some(ParsedExtension::KeyUsage(ku)) = pdv_ext {
            // (n)  If a key usage extension is present, verify that the
            //      keyCertSign bit is set.
            if !ku.0.contains(KeyUsages::KeyCertSign) {
                log_error_for_ca(ca_cert, "keyCertSign is not set in key usage extension");
                cpr.set_validation_status(PathValidationStatus::InvalidKeyUsage);
                cpr.set_failed_cert_index(pos as u8);
                return Err(Error::PathValidation(PathValidationStatus::InvalidKeyUsage));
            }
        } else {
            log_error_for_ca(ca_cert, "key usage extension is missing");
            cpr.set_validation_status(PathValidationStatus::InvalidKeyUsage);
            cpr.set_failed_cert_index(pos as u8);
            return Err(Error::PathValidation(PathValidationStatus::InvalidKeyUsage));
        }
    }

    let target_ku = cp.target.get_extension(&ID_CE_KEY_USAGE)?;
    if let Some(ParsedExtension::KeyUsage(target_ku_bits)) = target_ku {
        if let Some(ku) = cps.get_target_key_usage() {
            let nku = match FlagSet::<KeyUsages>::new(ku) {
                Ok(ku) => ku,
                _ => {
                    return Err(Error::Unrecognized);
                }
            };

            for i in nku {
                if !target_ku_bits.0.contains(i) {
                    log_error_for_ca(&cp.target, "key usage violation for target certificate");
                    cpr.set_validation_status(PathValidationStatus::InvalidKeyUsage);
                    cpr.set_failed_cert_index(cp.intermediates.len() as u8);
                    return Err(Error::PathValidation(PathValidationStatus::InvalidKeyUsage));
                }
            }
        }
    }

    Ok(())
}

/// `check_extended_key_usage` implements the (unpublished but popular) intersection of extended key
/// usage values across the certification path, beginning with the trust anchor and proceeding through
/// to the target certificate. It also affirms the target certificate matches at least one EKU expressed
/// in the `PS_EXTENDED_KEY_USAGE` element in the [`CertificationPathSettings`], if any.
pub fn check_extended_key_usage(
    _pe: &PkiEnvironment<'_>,
    cps: &CertificationPathSettings,
    cp: &mut CertificationPath,
    cpr: &mut CertificationPathResults,
) -> Result<()> {
    cpr.add_processed_extension(ID_CE_EXT_KEY_USAGE);

    let target_ekus: Option<ObjectIdentifierSet> = cps.get_extended_key_usage_as_oid_set();
    let process_ekus_across_path = cps.get_extended_key_usage_path();

    // if we are neither checking across path nor vetting target values, just return
    if !process_ekus_across_path && target_ekus.is_none() {
        return Ok(());
    }

    if process_ekus_across_path {
        // check that intersection of all EKU extensions in the path is not empty
        let mut default_eku = vec![ANY_EXTENDED_KEY_USAGE];

        let ta_eku = cp.trust_anchor.get_extension(&ID_CE_EXT_KEY_USAGE)?;
        let ekus_from_ta = if let Some(ParsedExtension::ExtendedKeyUsage(ekus)) = ta_eku {
            &ekus.0
        } else {
            if let Some(target_ekus) = &target_ekus {
                default_eku.clear();
                for eku in target_ekus {
                    default_eku.push(*eku);
                }
            }

            &default_eku
        };

        let mut ekus_from_path = BTreeSet::new();
        for e in ekus_from_ta {
            ekus_from_path.insert(e);
        }

        // for convenience, combine target into array with the intermediate CA certs
        let mut v = cp.intermediates.clone();
        v.push(cp.target.clone());

        for (pos, ca_cert) in v.iter().enumerate() {
            let pdv_ext: Option<&ParsedExtension> = ca_cert.get_extension(&ID_CE_EXT_KEY_USAGE)?;
            if let Some(ParsedExtension::ExtendedKeyUsage(eku_from_ca)) = pdv_ext {
                if ekus_from_path.contains(&ANY_EXTENDED_KEY_USAGE)
                    && !eku_from_ca.0.contains(&ANY_EXTENDED_KEY_USAGE)
                {
                    // replace any with all from cert
                    ekus_from_path.remove(&ANY_EXTENDED_KEY_USAGE);
                    for e in &eku_from_ca.0 {
                        ekus_from_path.insert(e);
                    }
                } else if ekus_from_path.contains(&ANY_EXTENDED_KEY_USAGE)
                    && eku_from_ca.0.contains(&ANY_EXTENDED_KEY_USAGE)
                {
                    // add all from cert
                    for e in &eku_from_ca.0 {
                        ekus_from_path.insert(e);
                    }
                } else {
                    // drop any that are not in the cert
                    let mut attrs_to_delete = vec![];
                    for e in &ekus_from_path {
                        if !eku_from_ca.0.contains(e) {
                            attrs_to_delete.push(<&ObjectIdentifier>::clone(e));
                        }
                    }
                    for e in attrs_to_delete {
                        ekus_from_path.remove(e);
                    }
                }

                if ekus_from_path.is_empty() {
                    log_error_for_ca(ca_cert, "extended key usage violation");
                    cpr.set_validation_status(PathValidationStatus::InvalidExtendedKeyUsage);
                    cpr.set_failed_cert_index(pos as u8);
                    return Err(Error::PathValidation(
                        PathValidationStatus::InvalidExtendedKeyUsage,
                    ));
                }
            }
            // given lack of specification for this approach, absence of an EKU extension is
            // treated as a lack of constraints rather than an error
        }
    }

    if let Some(ekus_from_config) = target_ekus {
        // if the configured EKU list features any EKU, then we're done
        if !ekus_from_config.contains(&ANY_EXTENDED_KEY_USAGE) {
            // if the target cert does not have an EKU, then we're done
            if let Some(ParsedExtension::ExtendedKeyUsage(eku_from_target)) =
                &cp.target.get_extension(&ID_CE_EXT_KEY_USAGE)?
            {
                // else, iterate over EKUs from the cert and make sure at least one matches config
                for eku in &eku_from_target.0 {
                    if ekus_from_config.contains(eku) || *eku == ANY_EXTENDED_KEY_USAGE {
                        return Ok(());
                    }
                }
                // if no match, fail
                log_error_for_ca(
                    &cp.target,
                    "extended key usage violation when processing target certificate",
                );
                cpr.set_validation_status(PathValidationStatus::InvalidExtendedKeyUsage);
                cpr.set_failed_cert_index(cp.intermediates.len() as u8);
                return Err(Error::PathValidation(
                    PathValidationStatus::InvalidExtendedKeyUsage,
                ));
            }
        }
    }
    Ok(())
}

/// `check_critical_extensions` affirms all critical extensions in the certificates that comprise a
/// certification path have been processed.
///
/// Each function supporting path validation contributes to the `PR_PROCESSED_EXTENSIONS` value in a
/// [`CertificationPathResults`] object to facilitate this check. This implementation assumes that
/// if an extension is processed for one certificate then it is processed for all. Critical
/// extensions that were not processed by the standard checks are offered to the
/// [`CertPathChecker`](crate::CertPathChecker) objects available via the [`PkiEnvironment`], which
/// remove the OIDs they handle. Any critical extension left unresolved fails the path.
pub fn check_critical_extensions(
    pe: &PkiEnvironment<'_>,
    _cps: &CertificationPathSettings,
    cp: &mut CertificationPath,
    cpr: &mut CertificationPathResults,
) -> Result<()> {
    let processed_exts: ObjectIdentifierSet = cpr.get_processed_extensions();

    let mut v = cp.intermediates.clone();
    v.push(cp.target.clone());

    for (pos, cert) in v.iter().enumerate() {
        let mut unresolved_criticals = ObjectIdentifierSet::new();
        if let Some(exts) = &cert.decoded_cert.tbs_certificate.extensions {
            for ext in exts {
                if ext.critical && !processed_exts.contains(&ext.extn_id) {
                    unresolved_criticals.insert(ext.extn_id);
                }
            }
        }

        if let Err(e) = pe.check_cert(pe, cert, pos, &mut unresolved_criticals) {
            log_error_for_ca(cert, format!("path checker error: {:?}", e).as_str());
            if let Error::PathValidation(pvs) = e {
                cpr.set_validation_status(pvs);
            }
            cpr.set_failed_cert_index(pos as u8);
            return Err(e);
        }

        if let Some(oid) = unresolved_criticals.iter().next() {
            log_error_for_ca(
                cert,
                format!("unprocessed critical extension: {}", oid).as_str(),
            );
            cpr.set_validation_status(PathValidationStatus::UnprocessedCriticalExtension);
            cpr.set_failed_cert_index(pos as u8);
            return Err(Error::PathValidation(
                PathValidationStatus::UnprocessedCriticalExtension,
            ));
        }
    }

    Ok(())
}

/// `check_revocation` determines the revocation status of each certificate in the certification
/// path, proceeding from the certificate issued by the trust anchor towards the target.
///
/// Revocation processing is governed by the `PS_CHECK_REVOCATION_STATUS` value in the
/// [`CertificationPathSettings`] and is performed by the [`RevocationChecker`](crate::RevocationChecker)
/// objects available via the [`PkiEnvironment`]. Where no checker can determine status for a
/// certificate, the path fails with `RevocationStatusNotDetermined` unless the
/// `PS_RELAX_REVOCATION_WHEN_UNAVAILABLE` value is set.
pub fn check_revocation(
    pe: &PkiEnvironment<'_>,
    cps: &CertificationPathSettings,
    cp: &mut CertificationPath,
    cpr: &mut CertificationPathResults,
) -> Result<()> {
    if !cps.get_check_revocation_status() {
        return Ok(());
    }
    let relax = cps.get_relax_revocation_when_unavailable();

    // for convenience, combine target into array with the intermediate CA certs
    let mut v = cp.intermediates.clone();
    v.push(cp.target.clone());
    cpr.prepare_revocation_results(v.len());

    let mut working_spki =
        get_subject_public_key_info_from_trust_anchor(&cp.trust_anchor.decoded_ta).clone();

    for (pos, cur_cert) in v.iter().enumerate() {
        match pe.determine_revocation_status(pe, cps, cur_cert, &working_spki) {
            PathValidationStatus::Valid => {}
            PathValidationStatus::CertificateRevoked => {
                log_error_for_ca(cur_cert, "certificate is revoked");
                cpr.set_validation_status(PathValidationStatus::CertificateRevoked);
                cpr.set_failed_cert_index(pos as u8);
                return Err(Error::PathValidation(
                    PathValidationStatus::CertificateRevoked,
                ));
            }
            _ => {
                if !relax {
                    log_error_for_ca(cur_cert, "unable to determine revocation status");
                    cpr.set_validation_status(PathValidationStatus::RevocationStatusNotDetermined);
                    cpr.set_failed_cert_index(pos as u8);
                    return Err(Error::PathValidation(
                        PathValidationStatus::RevocationStatusNotDetermined,
                    ));
                }
                log_message(
                    &PkiLogLevel::Warn,
                    format!(
                        "continuing without revocation status for certificate issued to {}",
                        name_to_string(&cur_cert.decoded_cert.tbs_certificate.subject)
                    )
                    .as_str(),
                );
            }
        }

        working_spki = cur_cert
            .decoded_cert
            .tbs_certificate
            .subject_public_key_info
            .clone();
    }

    Ok(())
}

/// `enforce_trust_anchor_constraints` prepares and returns a [`CertificationPathSettings`] object
/// that includes constraints derived from the trust anchor from a given [`CertificationPath`] and the
/// operative [`CertificationPathSettings`], per RFC 5937.
///
/// When the `PS_ENFORCE_TRUST_ANCHOR_CONSTRAINTS` value in the operative [`CertificationPathSettings`]
/// is set to false, this function returns the settings unmodified.
pub fn enforce_trust_anchor_constraints<'a>(
    cps: &'a CertificationPathSettings,
    ta: &ParsedTrustAnchor,
    mod_cps: &'a mut CertificationPathSettings,
) -> Result<&'a CertificationPathSettings> {
    if !cps.get_enforce_trust_anchor_constraints() {
        return Ok(cps);
    }

    *mod_cps = cps.clone();

    let mut pbufs = BTreeMap::new();
    let mut ebufs = BTreeMap::new();

    // o  If no subject distinguished name is associated with the trust
    //    anchor, path validation fails.  The name may appear in the subject
    //    field of a Certificate or TBSCertificate structure or in the
    //    taName field of CertPathControls in a TrustAnchorInfo structure.
    let _name = get_trust_anchor_name(&ta.decoded_ta)?;

    // o  If a basic constraints extension is associated with the trust
    //    anchor and contains a pathLenConstraint value, set the
    //    max_path_length state variable equal to the pathLenConstraint
    //    value from the basic constraints extension.
    let pl = get_path_length_constraint_from_trust_anchor(&ta.decoded_ta)?;
    mod_cps.set_initial_path_length_constraint(pl);

    // o  If name constraints are associated with the trust anchor, set the
    //    initial-permitted-subtrees variable equal to the intersection of
    //    the permitted subtrees from the trust anchor and the user-provided
    //    initial-permitted-subtrees, and set the initial-excluded-subtrees
    //    variable equal to the union of the excluded subtrees from the trust
    //    anchor and the user-provided initial-excluded-subtrees.
    if let Some(ParsedExtension::NameConstraints(nc)) = ta.get_extension(&ID_CE_NAME_CONSTRAINTS)? {
        if let Some(permitted) = &nc.permitted_subtrees {
            let mut initial_perm =
                cps.get_initial_permitted_subtrees_with_default_as_set(&mut pbufs)?;
            initial_perm.calculate_intersection(permitted);
            mod_cps.set_initial_permitted_subtrees_from_set(&initial_perm)?;
        }
        if let Some(excluded) = &nc.excluded_subtrees {
            let mut initial_excl =
                cps.get_initial_excluded_subtrees_with_default_as_set(&mut ebufs)?;
            initial_excl.calculate_union(excluded);
            mod_cps.set_initial_excluded_subtrees_from_set(&initial_excl)?;
        }
    }

    // o  If certificate policies are associated with the trust anchor, set
    //    the user-initial-policy-set variable equal to the intersection of
    //    the certificate policies associated with the trust anchor and the
    //    user-provided user-initial-policy-set.  If one of these two inputs
    //    is not provided, the user-initial-policy-set variable is set to
    //    the value that is available.
    let user_policy_set: ObjectIdentifierSet = cps.get_initial_policy_set_as_oid_set();
    let mut ta_policy_set = ObjectIdentifierSet::new();
    let mut ta_accepts_any_policy = false;
    if let Some(cert_policies) = get_policy_set_from_trust_anchor(&ta.decoded_ta)? {
        for p in &cert_policies.0 {
            ta_policy_set.insert(p.policy_identifier);
            if p.policy_identifier == ANY_POLICY {
                ta_accepts_any_policy = true;
            }
        }
    }

    if !ta_policy_set.is_empty() && !user_policy_set.is_empty() {
        let mut new_policy_set = ObjectIdentifierSet::new();
        if ta_accepts_any_policy {
            // union
            new_policy_set = user_policy_set;
            new_policy_set.append(&mut ta_policy_set);
        } else {
            let user_accepts_any_policy = user_policy_set.contains(&ANY_POLICY);

            // intersect
            for p in ta_policy_set {
                if user_accepts_any_policy || user_policy_set.contains(&p) {
                    new_policy_set.insert(p);
                }
            }
        }
        mod_cps.set_initial_policy_set_from_oid_set(new_policy_set);
    } else if !ta_policy_set.is_empty() && user_policy_set.is_empty() {
        // use policies from TA
        mod_cps.set_initial_policy_set_from_oid_set(ta_policy_set);
    } else {
        // use user policy set (empty or not)
        mod_cps.set_initial_policy_set_from_oid_set(user_policy_set);
    }

    // o  If an inhibit any policy value of true is associated with the
    //    trust anchor (either in a CertPathControls or in an
    //    inhibitAnyPolicy extension) and the initial-any-policy-inhibit
    //    value is false, set the initial-any-policy-inhibit value to true.
    let initial_inhibit_any_policy = cps.get_initial_inhibit_any_policy_indicator();
    let ta_inhibit_any_policy = get_inhibit_any_policy_from_trust_anchor(&ta.decoded_ta)?;
    if ta_inhibit_any_policy && !initial_inhibit_any_policy {
        mod_cps.set_initial_inhibit_any_policy_indicator(ta_inhibit_any_policy);
    }

    // o  If a require explicit policy value of true is associated with the
    //    trust anchor (either in a CertPathControls or in a
    //    PolicyConstraints extension) and the initial-explicit-policy value
    //    is false, set the initial-explicit-policy value to true.
    let initial_require_explicit_policy = cps.get_initial_explicit_policy_indicator();
    let ta_require_explicit_policy = get_require_explicit_policy_from_trust_anchor(&ta.decoded_ta)?;
    if ta_require_explicit_policy && !initial_require_explicit_policy {
        mod_cps.set_initial_explicit_policy_indicator(ta_require_explicit_policy);
    }

    // o  If an inhibit policy mapping value of true is associated with the
    //    trust anchor (either in a CertPathControls or in a
    //    PolicyConstraints extension) and the initial-policy-mapping-
    //    inhibit value is false, set the initial-policy-mapping-inhibit
    //    value to true.
    let initial_inhibit_policy_mapping = cps.get_initial_policy_mapping_inhibit_indicator();
    let ta_inhibit_policy_mapping = get_inhibit_policy_mapping_from_trust_anchor(&ta.decoded_ta)?;
    if ta_inhibit_policy_mapping && !initial_inhibit_policy_mapping {
        mod_cps.set_initial_policy_mapping_inhibit_indicator(ta_inhibit_policy_mapping);
    }

    Ok(mod_cps)
}

/// `verify_signatures` verifies the certificate signatures of certificates found in a certification
/// path, using the trust anchor's public key to verify the first certificate and each certificate's
/// public key to verify its successor.
pub fn verify_signatures(
    pe: &PkiEnvironment<'_>,
    _cps: &CertificationPathSettings,
    cp: &mut CertificationPath,
    cpr: &mut CertificationPathResults,
) -> Result<()> {
    // for convenience, combine target into array with the intermediate CA certs
    let mut v = cp.intermediates.clone();
    v.push(cp.target.clone());

    let mut working_spki =
        get_subject_public_key_info_from_trust_anchor(&cp.trust_anchor.decoded_ta);

    for (pos, cur_cert) in v.iter().enumerate() {
        // Verify the TBS bytes as signed, not a re-encoding of the decoded TBSCertificate.
        let defer_cert = DeferDecodeSigned::from_der(&cur_cert.encoded_cert);
        if let Ok(defer_cert) = defer_cert {
            let r = pe.verify_signature_message(
                pe,
                &defer_cert.tbs_field,
                cur_cert.decoded_cert.signature.raw_bytes(),
                &cur_cert.decoded_cert.tbs_certificate.signature,
                working_spki,
            );
            if let Err(e) = r {
                log_error_for_ca(
                    cur_cert,
                    format!("signature verification error: {:?}", e).as_str(),
                );
                cpr.set_validation_status(PathValidationStatus::SignatureVerificationFailure);
                cpr.set_failed_cert_index(pos as u8);
                return Err(Error::PathValidation(
                    PathValidationStatus::SignatureVerificationFailure,
                ));
            }
        }

        working_spki = &cur_cert
            .decoded_cert
            .tbs_certificate
            .subject_public_key_info;
    }
    Ok(())
}

fn has_critical_extension(cert: &ParsedCertificate, oid: &ObjectIdentifier) -> bool {
    if let Some(exts) = &cert.decoded_cert.tbs_certificate.extensions {
        return exts.iter().any(|e| e.extn_id == *oid && e.critical);
    }
    false
}

/// `check_certificate_policies` implements certificate policy processing per RFC 5280.
///
/// It references the following certificate extensions:
/// - ID_CE_CERTIFICATE_POLICIES,
/// - ID_CE_POLICY_MAPPINGS,
/// - ID_CE_POLICY_CONSTRAINTS,
/// - ID_CE_INHIBIT_ANY_POLICY
///
/// It references the following values in the [`CertificationPathSettings`] parameter:
/// - PS_INITIAL_EXPLICIT_POLICY_INDICATOR,
/// - PS_INITIAL_POLICY_MAPPING_INHIBIT_INDICATOR,
/// - PS_INITIAL_INHIBIT_ANY_POLICY_INDICATOR,
/// - PS_INITIAL_POLICY_SET,
/// - PS_POLICY_QUALIFIERS_REJECTED.
///
/// It contributes to the PR_PROCESSED_EXTENSIONS value and PR_FINAL_VALID_POLICY_TREE value of the
/// [`CertificationPathResults`] instance.
///
/// This function does not process certificate policy information conveyed in a trust anchor and assumes
/// that if such processing is desired the information has already been factored into the [`CertificationPathSettings`]
/// as per RFC 5937 and as provided for in [`enforce_trust_anchor_constraints`].
pub fn check_certificate_policies(
    _pe: &PkiEnvironment<'_>,
    cps: &CertificationPathSettings,
    cp: &mut CertificationPath,
    cpr: &mut CertificationPathResults,
) -> Result<()> {
    cpr.add_processed_extension(ID_CE_CERTIFICATE_POLICIES);
    cpr.add_processed_extension(ID_CE_INHIBIT_ANY_POLICY);
    cpr.add_processed_extension(ID_CE_POLICY_CONSTRAINTS);
    cpr.add_processed_extension(ID_CE_POLICY_MAPPINGS);

    let certs_in_cert_path: u32 = (cp.intermediates.len() + 1) as u32;

    // vector to own nodes that appear in the valid_policy_tree
    let pool = RefCell::new(PolicyPool::new());
    let pm = &mut pool.borrow_mut();

    // Harvest the relevant settings from the path settings object (RFC 5280 6.1.1 c, e, f and g)
    let initial_policy_set: ObjectIdentifierSet = cps.get_initial_policy_set_as_oid_set();
    let initial_policy_mapping_inhibit_indicator: bool =
        cps.get_initial_policy_mapping_inhibit_indicator();
    let initial_explicit_policy_indicator: bool = cps.get_initial_explicit_policy_indicator();
    let initial_inhibit_any_policy_indicator: bool = cps.get_initial_inhibit_any_policy_indicator();
    let reject_qualifiers = cps.get_policy_qualifiers_rejected();

    // Initialize state variables (RFC 5280 6.1.2 a, d, e, and f)
    let mut valid_policy_tree = Vec::<PolicyTreeRow>::new();
    let mut explicit_policy: u32 = if initial_explicit_policy_indicator {
        0
    } else {
        certs_in_cert_path + 1
    };
    let mut inhibit_any_policy: u32 = if initial_inhibit_any_policy_indicator {
        0
    } else {
        certs_in_cert_path + 1
    };
    let mut policy_mapping: u32 = if initial_policy_mapping_inhibit_indicator {
        0
    } else {
        certs_in_cert_path + 1
    };

    // Create first node per 6.1.2.a:
    //      The initial value of the valid_policy_tree is a single node with
    //            valid_policy anyPolicy, an empty qualifier_set, and an
    //            expected_policy_set with the single value anyPolicy.  This node is
    //            considered to be at depth zero.
    let root_index = add_node_to_pool(
        pm,
        PolicyTreeNode::new(ANY_POLICY, None, BTreeSet::from([ANY_POLICY]), 0, None),
    );
    valid_policy_tree.push(PolicyTreeRow::from([root_index]));
    let mut valid_policy_tree_is_null = false;

    // for convenience, combine target into array with the intermediate CA certs
    let mut v = cp.intermediates.clone();
    v.push(cp.target.clone());

    for (pos, ca_cert) in v.iter().enumerate() {
        // save pos in variable named i starting from 1 (to account for root node not being in this
        // loop) to make reading RFC language easier
        let i = pos + 1;

        // has_any_policy is used to signify when anyPolicy appears in a cert. ap_q captures the
        // encoded qualifiers, if present.
        let mut has_any_policy = false;
        let mut ap_q: Option<Vec<u8>> = None;

        valid_policy_tree.push(PolicyTreeRow::new());
        let row = valid_policy_tree.len() - 1;

        let mut policies_present = false;
        if !valid_policy_tree_is_null {
            if let Some(ParsedExtension::CertificatePolicies(policies_ext)) =
                ca_cert.get_extension(&ID_CE_CERTIFICATE_POLICIES)?
            {
                policies_present = true;

                if reject_qualifiers
                    && has_critical_extension(ca_cert, &ID_CE_CERTIFICATE_POLICIES)
                    && policies_ext.0.iter().any(|p| p.policy_qualifiers.is_some())
                {
                    log_error_for_ca(
                        ca_cert,
                        "policy qualifiers present in critical certificate policies extension",
                    );
                    cpr.set_validation_status(PathValidationStatus::CertificatePoliciesViolation);
                    cpr.set_failed_cert_index(pos as u8);
                    return Err(Error::PathValidation(
                        PathValidationStatus::CertificatePoliciesViolation,
                    ));
                }

                //(d)  If the certificate policies extension is present in the
                //	certificate and the valid_policy_tree is not NULL, process
                //	the policy information by performing the following steps in
                //	order:
                for pol_info in &policies_ext.0 {
                    if ANY_POLICY != pol_info.policy_identifier {
                        //(1)  For each policy P not equal to anyPolicy in the
                        //	certificate policies extension, let P-OID denote the OID
                        //	for policy P and P-Q denote the qualifier set for policy
                        //	P.  Perform the following steps in order:
                        let p_oid = &pol_info.policy_identifier;
                        let p_q: Option<Vec<u8>> = match &pol_info.policy_qualifiers {
                            // ignore qualifiers that don't encode
                            Some(q) => q.to_der().ok(),
                            None => None,
                        };

                        //(i)   For each node of depth i-1 in the valid_policy_tree
                        //		where P-OID is in the expected_policy_set, create a
                        //		child node as follows: set the valid_policy to P-OID,
                        //		set the qualifier_set to P-Q, and set the
                        //		expected_policy_set to {P-OID}.
                        let mut prospective_parents = PolicyTreeRow::new();
                        let mut match_found = false;
                        for ps_index in &valid_policy_tree[i - 1] {
                            if pm[*ps_index].expected_policy_set.contains(p_oid) {
                                prospective_parents.push(*ps_index);
                                match_found = true;
                            }
                        }

                        //(ii)  If there was no match in step (i) and the
                        //		valid_policy_tree includes a node of depth i-1 with
                        //		the valid_policy anyPolicy, generate a child node with
                        //		the following values: set the valid_policy to P-OID,
                        //		set the qualifier_set to P-Q, and set the
                        //		expected_policy_set to {P-OID}.
                        if !match_found {
                            if let Some(parent_index) =
                                row_contains_policy(pm, &valid_policy_tree[i - 1], ANY_POLICY)
                            {
                                prospective_parents.push(parent_index);
                            }
                        }

                        // add the items as per i and ii, if there is anything to add
                        for p in prospective_parents {
                            let new_node_index = add_node_to_pool(
                                pm,
                                PolicyTreeNode::new(
                                    *p_oid,
                                    p_q.clone(),
                                    ObjectIdentifierSet::from([*p_oid]),
                                    row as u8,
                                    Some(p),
                                ),
                            );
                            attach_child(pm, &pm[p].children, new_node_index);
                            valid_policy_tree[row].push(new_node_index);
                        }
                    } else {
                        // save indication that anyPolicy was observed along with qualifiers, if
                        // present, for use when processing step (2) below.
                        has_any_policy = true;
                        if let Some(q) = &pol_info.policy_qualifiers {
                            ap_q = q.to_der().ok();
                        }
                    }
                }

                //(2)  If the certificate policies extension includes the policy
                //anyPolicy with the qualifier set AP-Q and either (a)
                //inhibit_anyPolicy is greater than 0 or (b) i<n and the
                //certificate is self-issued, then:
                let mut nodes_to_add = vec![];
                if has_any_policy
                    && (inhibit_any_policy > 0
                        || (i < certs_in_cert_path as usize
                            && is_self_issued(&ca_cert.decoded_cert)))
                {
                    for p_index in &valid_policy_tree[i - 1] {
                        // for each node in the valid_policy_tree of depth i-1, for
                        // each value in the expected_policy_set (including
                        // anyPolicy) that does not appear in a child node, create a
                        // child node with the following values: set the valid_policy
                        // to the value from the expected_policy_set in the parent
                        // node, set the qualifier_set to AP-Q, and set the
                        // expected_policy_set to the value in the valid_policy from
                        // this node.
                        let parent = &pm[*p_index];
                        for ep in &parent.expected_policy_set {
                            if !has_child_with_policy(pm, &parent.children, ep) {
                                nodes_to_add.push(PolicyTreeNode::new(
                                    *ep,
                                    ap_q.clone(),
                                    BTreeSet::from([*ep]),
                                    row as u8,
                                    Some(*p_index),
                                ));
                            }
                        }
                    }
                }

                for node in nodes_to_add {
                    let parent_index = node.parent;
                    let node_index = add_node_to_pool(pm, node);
                    if let Some(parent_index) = parent_index {
                        attach_child(pm, &pm[parent_index].children, node_index);
                    }
                    valid_policy_tree[i].push(node_index);
                }

                // (3)  If there is a node in the valid_policy_tree of depth i-1
                //       or less without any child nodes, delete that node.  Repeat
                //       this step until there are no nodes of depth i-1 or less
                //       without children.
                for r in &mut valid_policy_tree[0..i] {
                    r.retain(|x| !is_childless(pm, *x));
                }
                if valid_policy_tree[i].is_empty() {
                    valid_policy_tree_is_null = true;
                }
            }
        }
        if !policies_present {
            //(e)  If the certificate policies extension is not present, set the valid_policy_tree
            //to NULL.
            valid_policy_tree_is_null = true;
        }

        //(f)  Verify that either explicit_policy is greater than 0 or the valid_policy_tree is
        //not equal to NULL;
        if explicit_policy == 0 && valid_policy_tree_is_null {
            log_error_for_ca(ca_cert, "NULL policy set with explicit policy required");
            cpr.set_validation_status(PathValidationStatus::NullPolicySet);
            cpr.set_failed_cert_index(pos as u8);
            return Err(Error::PathValidation(PathValidationStatus::NullPolicySet));
        }

        if i != certs_in_cert_path as usize {
            // 6.1.4 preparation for certificate i+1
            let pdv_ext: Option<&ParsedExtension> = ca_cert.get_extension(&ID_CE_POLICY_MAPPINGS)?;
            if let Some(ParsedExtension::PolicyMappings(policy_mappings)) = pdv_ext {
                // collect everything that maps to a given issuer domain policy for convenience
                // while looking for anyPolicy in the extension
                let mut mappings: BTreeMap<ObjectIdentifier, ObjectIdentifierSet> = BTreeMap::new();

                //(a)  If a policy mappings extension is present, verify that the
                //special value anyPolicy does not appear as an
                //issuerDomainPolicy or a subjectDomainPolicy.
                for mapping in &policy_mappings.0 {
                    if ANY_POLICY == mapping.issuer_domain_policy
                        || ANY_POLICY == mapping.subject_domain_policy
                    {
                        log_error_for_ca(
                            ca_cert,
                            "anyPolicy appears in the policy mappings extension",
                        );
                        cpr.set_validation_status(PathValidationStatus::NullPolicySet);
                        cpr.set_failed_cert_index(pos as u8);
                        return Err(Error::PathValidation(PathValidationStatus::NullPolicySet));
                    } else {
                        mappings
                            .entry(mapping.issuer_domain_policy)
                            .or_default()
                            .insert(mapping.subject_domain_policy);
                    }
                }

                // (b)  If a policy mappings extension is present, then for each
                //       issuerDomainPolicy ID-P in the policy mappings extension:
                if policy_mapping > 0 {
                    // (1)  If the policy_mapping variable is greater than 0, for each
                    //      node in the valid_policy_tree of depth i where ID-P is the
                    //      valid_policy, set expected_policy_set to the set of
                    //      subjectDomainPolicy values that are specified as
                    //      equivalent to ID-P by the policy mappings extension.
                    let mut ap: Option<usize> = None;
                    for p_index in &valid_policy_tree[i] {
                        let p = &mut pm[*p_index];
                        if mappings.contains_key(&p.valid_policy) {
                            p.expected_policy_set.clear();

                            for s in &mappings[&p.valid_policy] {
                                p.expected_policy_set.insert(*s);
                            }
                            // remove the mappings that are actually processed
                            mappings.remove(&p.valid_policy);
                        }
                        if ANY_POLICY == p.valid_policy {
                            ap = Some(*p_index);
                        }
                    }

                    //  If no node of depth i in the valid_policy_tree has a
                    //  valid_policy of ID-P but there is a node of depth i with a
                    //  valid_policy of anyPolicy, then generate a child node of
                    //  the node of depth i-1 that has a valid_policy of anyPolicy
                    //  as follows:
                    //
                    //  (i)    set the valid_policy to ID-P;
                    //
                    //  (ii)   set the qualifier_set to the qualifier set of the
                    //         policy anyPolicy in the certificate policies
                    //         extension of certificate i; and
                    //
                    //  (iii)  set the expected_policy_set to the set of
                    //         subjectDomainPolicy values that are specified as
                    //         equivalent to ID-P by the policy mappings extension.
                    if !mappings.is_empty() {
                        if let Some(parent_index) = ap {
                            let parent_qualifiers = pm[parent_index].qualifier_set.clone();
                            for m in mappings {
                                let node_index = add_node_to_pool(
                                    pm,
                                    PolicyTreeNode::new(
                                        m.0,
                                        parent_qualifiers.clone(),
                                        m.1,
                                        row as u8,
                                        Some(parent_index),
                                    ),
                                );
                                attach_child(pm, &pm[parent_index].children, node_index);
                                valid_policy_tree[row].push(node_index);
                            }
                        }
                    }
                } else {
                    // (2)  If the policy_mapping variable is equal to 0:
                    //
                    //     (i)    delete each node of depth i in the valid_policy_tree
                    //            where ID-P is the valid_policy.
                    for m in mappings {
                        valid_policy_tree[i].retain(|x| !node_is_policy(pm, *x, m.0));
                    }

                    //     (ii)   If there is a node in the valid_policy_tree of depth
                    //            i-1 or less without any child nodes, delete that
                    //            node.  Repeat this step until there are no nodes of
                    //            depth i-1 or less without children.
                    for r in &mut valid_policy_tree[0..i] {
                        r.retain(|x| !is_childless(pm, *x));
                    }
                }
            }

            //(h)  If certificate i is not self-issued: decrement explicit_policy,
            //policy_mapping and inhibit_anyPolicy where greater than 0.
            if !is_self_issued(&ca_cert.decoded_cert) {
                if explicit_policy > 0 {
                    explicit_policy -= 1;
                }
                if inhibit_any_policy > 0 {
                    inhibit_any_policy -= 1;
                }
                if policy_mapping > 0 {
                    policy_mapping -= 1;
                }
            }

            //(i)  If a policy constraints extension is included in the certificate, modify the
            //explicit_policy and policy_mapping state variables.
            let pdv_ext: Option<&ParsedExtension> =
                ca_cert.get_extension(&ID_CE_POLICY_CONSTRAINTS)?;
            if let Some(ParsedExtension::PolicyConstraints(pc)) = pdv_ext {
                if let Some(rep) = pc.require_explicit_policy {
                    explicit_policy = explicit_policy.min(rep);
                }
                if let Some(ipm) = pc.inhibit_policy_mapping {
                    policy_mapping = policy_mapping.min(ipm);
                }
            }

            //(j)  If the inhibitAnyPolicy extension is included in the certificate and is less
            //than inhibit_anyPolicy, set inhibit_anyPolicy to the value from the extension.
            let pdv_ext: Option<&ParsedExtension> =
                ca_cert.get_extension(&ID_CE_INHIBIT_ANY_POLICY)?;
            if let Some(ParsedExtension::InhibitAnyPolicy(iap)) = pdv_ext {
                inhibit_any_policy = inhibit_any_policy.min(iap.0);
            }
        } else {
            // 6.1.5 wrap-up procedure

            // (a)  If explicit_policy is not 0, decrement explicit_policy by 1.
            if explicit_policy > 0 {
                explicit_policy -= 1;
            }

            // (b)  If a policy constraints extension is included in the
            //      certificate and requireExplicitPolicy is present and has a
            //      value of 0, set the explicit_policy state variable to 0.
            let pdv_ext: Option<&ParsedExtension> =
                ca_cert.get_extension(&ID_CE_POLICY_CONSTRAINTS)?;
            if let Some(ParsedExtension::PolicyConstraints(pc)) = pdv_ext {
                if let Some(rep) = pc.require_explicit_policy {
                    explicit_policy = explicit_policy.min(rep);
                }
            }

            //(g)  Calculate the intersection of the valid_policy_tree and the
            //user-initial-policy-set, as follows. Where the valid_policy_tree is NULL the
            //intersection is NULL, and where the user-initial-policy-set is any-policy the
            //intersection is the entire valid_policy_tree; both are no-ops here.
            if !valid_policy_tree_is_null
                && !initial_policy_set.contains(&ANY_POLICY)
                && valid_policy_tree.len() > 1
            {
                //1.  Determine the set of policy nodes whose parent nodes
                //have a valid_policy of anyPolicy.  This is the
                //valid_policy_node_set.
                let mut valid_policy_node_set: Vec<usize> = Vec::new();
                collect_valid_policy_node_set(pm, &pm[root_index], &mut valid_policy_node_set);

                //2.  If the valid_policy of any node in the
                //valid_policy_node_set is not in the user-initial-
                //policy-set and is not anyPolicy, delete this node and
                //all its children.
                prune_disallowed_policies(
                    pm,
                    &initial_policy_set,
                    &valid_policy_node_set,
                    &mut valid_policy_tree,
                );

                //4.  If there is a node in the valid_policy_tree of depth
                //n-1 or less without any child nodes, delete that node.
                //Repeat this step until there are no nodes of depth n-1
                //or less without children.
                for r in &mut valid_policy_tree[0..i] {
                    r.retain(|x| !is_childless(pm, *x));
                }

                // 3.  If the valid_policy_tree includes a node of depth n
                //     with the valid_policy anyPolicy and the user-initial-
                //     policy-set is not any-policy, perform the following
                //     steps:
                if let Some(any_index) = row_contains_policy(pm, &valid_policy_tree[i], ANY_POLICY)
                {
                    //   a.  Set P-Q to the qualifier_set in the node of depth n
                    //       with valid_policy anyPolicy.
                    //
                    //   b.  For each P-OID in the user-initial-policy-set that is
                    //       not the valid_policy of a node in the
                    //       valid_policy_node_set, create a child node whose
                    //       parent is the node of depth n-1 with the valid_policy
                    //       anyPolicy.  Set the values in the child node as
                    //       follows: set the valid_policy to P-OID, set the
                    //       qualifier_set to P-Q, and set the expected_policy_set
                    //       to {P-OID}.
                    //
                    //   c.  Delete the node of depth n with the valid_policy
                    //       anyPolicy.
                    let p_q = pm[any_index].qualifier_set.clone();
                    let parent_of_any = pm[any_index].parent;

                    let mut nodes_to_add = vec![];
                    for p in &initial_policy_set {
                        if row_contains_policy(pm, &valid_policy_tree[i], *p).is_none() {
                            nodes_to_add.push(PolicyTreeNode::new(
                                *p,
                                p_q.clone(),
                                ObjectIdentifierSet::from([*p]),
                                row as u8,
                                parent_of_any,
                            ));
                        }
                    }
                    valid_policy_tree[row].retain(|x| *x != any_index);

                    for node in nodes_to_add {
                        let parent_index = node.parent;
                        let node_index = add_node_to_pool(pm, node);
                        if let Some(parent_index) = parent_index {
                            attach_child(pm, &pm[parent_index].children, node_index);
                        }
                        valid_policy_tree[row].push(node_index);
                    }
                }

                if valid_policy_tree[row].is_empty() {
                    valid_policy_tree_is_null = true;
                }
            }

            if explicit_policy == 0 && valid_policy_tree_is_null {
                log_error_for_ca(ca_cert, "NULL policy set while processing target certificate");
                cpr.set_validation_status(PathValidationStatus::NullPolicySet);
                cpr.set_failed_cert_index(pos as u8);
                return Err(Error::PathValidation(PathValidationStatus::NullPolicySet));
            }
        }
    }

    let mut final_valid_policy_tree: FinalValidPolicyTree = FinalValidPolicyTree::new();
    for row in valid_policy_tree {
        let mut new_row = Vec::new();
        for node in row {
            let p = &pm[node];
            new_row.push(ValidPolicyTreeNode {
                valid_policy: p.valid_policy,
                qualifier_set: p.qualifier_set.clone(),
                expected_policy_set: p.expected_policy_set.clone(),
            });
        }
        final_valid_policy_tree.push(new_row);
    }
    cpr.set_final_valid_policy_tree(final_valid_policy_tree);

    Ok(())
}
