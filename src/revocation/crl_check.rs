//! In-memory CRL store and CRL-based revocation status determination (minus support for delta
//! CRLs, indirect CRLs, on hold, and nameRelativeToIssuer distribution points)

extern crate alloc;
use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::{format, vec::Vec};
use core::cell::RefCell;
use flagset::{flags, FlagSet};

#[cfg(feature = "std")]
use alloc::sync::Arc;
#[cfg(feature = "std")]
use std::sync::Mutex;

use const_oid::db::rfc5912::{
    ID_CE_AUTHORITY_KEY_IDENTIFIER, ID_CE_BASIC_CONSTRAINTS, ID_CE_CERTIFICATE_ISSUER,
    ID_CE_CRL_DISTRIBUTION_POINTS, ID_CE_CRL_NUMBER, ID_CE_CRL_REASONS, ID_CE_DELTA_CRL_INDICATOR,
    ID_CE_FRESHEST_CRL, ID_CE_HOLD_INSTRUCTION_CODE, ID_CE_INVALIDITY_DATE,
    ID_CE_ISSUING_DISTRIBUTION_POINT,
};
use der::{Decode, Encode};
use spki::SubjectPublicKeyInfoOwned;
use x509_cert::crl::{CertificateList, RevokedCert};
use x509_cert::ext::pkix::crl::dp::{DistributionPoint, ReasonFlags};
use x509_cert::ext::pkix::name::{DistributionPointName, GeneralName, GeneralNames};
use x509_cert::ext::pkix::{CrlDistributionPoints, IssuingDistributionPoint};
use x509_cert::ext::Extensions;
use x509_cert::name::Name;

use crate::{
    environment::pki_environment::PkiEnvironment,
    environment::pki_environment_traits::{CrlSource, RevocationChecker},
    util::error::{Error, PathValidationStatus, Result},
    util::logging::{log_message, PkiLogLevel},
    util::name_utils::{compare_names, name_to_string},
    validator::parsed_certificate::DeferDecodeSigned,
    validator::path_settings::CertificationPathSettings,
    ExtensionProcessing, ParsedCertificate, ParsedExtension,
};

// Certificates are classified based on the values found in the CRLDistributionPoints and
// BasicConstraints extensions, if present, without regard for criticality. CRLs are classified
// based on the values found in the IssuingDistributionPoint and DeltaCRLIndicator extensions, if
// present, without regard for criticality. The classifications determine which CRLs may be used
// to determine the status of which certificates, per the tables in Annex B of X.509.

/// The CertRevType enum is used to identify a certificate with regard to types of CRLs that are applicable.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum CertRevType {
    /// Certificate features a distribution point name and either no basicConstraints or basicConstraints with isCA set to false
    EeDp,
    /// Certificate features no distribution point name and either no basicConstraints or basicConstraints with isCA set to false
    Ee,
    /// Certificate features a distribution point name and basicConstraints with isCA set to true
    CaDp,
    /// Certificate features no distribution point name and basicConstraints with isCA set to true
    Ca,
}

/// The CrlScope enum is used to identify CRL scope, i.e., whether the CRL is full, partitioned,
/// delta or delta partitioned. Partitioning is performed using issuing distribution point extensions.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum CrlScope {
    /// CRL is not limited in scope by issuing distribution point or delta CRL indicator
    Complete,
    /// CRL is limited in scope by issuing distribution point but not by delta CRL indicator
    Dp,
    /// CRL is not limited in scope by issuing distribution point but includes a delta CRL indicator
    Delta,
    /// CRL is limited in scope by issuing distribution point and delta CRL indicator
    DeltaDp,
}

/// The CrlCoverage enum is used to identify CRL coverage, i.e., whether the CRL features entries
/// for all types of entities, only for CA entities or only for end entities.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum CrlCoverage {
    /// CRL coverage is not limited by flags in issuing distribution point
    All,
    /// CRL coverage is limited to end entity certificates only by issuing distribution point
    EeOnly,
    /// CRL coverage is limited to CA certificates only by issuing distribution point
    CaOnly,
}

/// The CrlAuthority enum is used to identify CRL authority, i.e., whether a CRL is direct or indirect.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum CrlAuthority {
    /// CRL only features entries that were issued by the CRL issuer
    Direct,
    /// CRL may feature entries that were issued by other than the CRL issuer
    Indirect,
}

/// The CrlReasons enum is used to identify CRL reasons.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum CrlReasons {
    /// The CRL covers all CRL reasons
    AllReasons,
    /// The CRL covers only some CRL reasons
    SomeReasons,
}

/// CrlType features a set of enum values that determine the type of CRL based on evaluation of extensions.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct CrlType {
    /// Indicates scope of CRL relative to distribution point and delta CRL indicator
    pub scope: CrlScope,
    /// Indicates if CRL is limited by IDP flags, i.e., end entity only, CA only
    pub coverage: CrlCoverage,
    /// Indicates if CRL only contains entries for certs issued by the CRL issuer or may contain entries from other issuers too
    pub authority: CrlAuthority,
    /// Indicates if CRL covers all CRL reasons or only some
    pub reasons: CrlReasons,
}

#[derive(Clone, PartialEq, Eq)]
pub(crate) struct CrlInfo {
    pub type_info: CrlType,
    pub this_update: u64,
    pub next_update: Option<u64>,
    pub issuer_name: String,
    pub issuer_name_blob: Vec<u8>,
    pub idp_blob: Option<Vec<u8>>,
}

/// scope_compatible returns true if a CRL with the given scope may be used to determine the
/// status of a certificate of the given type. Partitioned CRLs require the certificate to
/// feature a distribution point.
fn scope_compatible(cert_type: CertRevType, scope: CrlScope) -> bool {
    match scope {
        CrlScope::Complete | CrlScope::Delta => true,
        CrlScope::Dp | CrlScope::DeltaDp => {
            CertRevType::EeDp == cert_type || CertRevType::CaDp == cert_type
        }
    }
}

/// coverage_compatible returns true if a CRL with the given coverage may be used to determine the
/// status of a certificate of the given type.
fn coverage_compatible(cert_type: CertRevType, coverage: CrlCoverage) -> bool {
    match coverage {
        CrlCoverage::All => true,
        CrlCoverage::EeOnly => CertRevType::Ee == cert_type || CertRevType::EeDp == cert_type,
        CrlCoverage::CaOnly => CertRevType::Ca == cert_type || CertRevType::CaDp == cert_type,
    }
}

/// classify_certificate takes a certificate and returns a CertRevType value.
///  - CaDp is returned if basicConstraints is present and isCA is true AND a CRL DP extension is present.
///  - EeDp is returned if basicConstraints is absent or isCA is false AND a CRL DP extension is present.
///  - Ca is returned if basicConstraints is present and isCA is true AND a CRL DP extension is not present.
///  - Ee is returned if basicConstraints is absent or isCA is false AND a CRL DP extension is not present.
fn classify_certificate(cert: &ParsedCertificate) -> CertRevType {
    let is_ca = if let Ok(Some(ParsedExtension::BasicConstraints(bc))) =
        cert.get_extension(&ID_CE_BASIC_CONSTRAINTS)
    {
        bc.ca
    } else {
        false
    };

    let has_crldp = matches!(
        cert.get_extension(&ID_CE_CRL_DISTRIBUTION_POINTS),
        Ok(Some(ParsedExtension::CrlDistributionPoints(_crldp)))
    );
    if is_ca && has_crldp {
        CertRevType::CaDp
    } else if !is_ca && has_crldp {
        CertRevType::EeDp
    } else if is_ca {
        CertRevType::Ca
    } else {
        CertRevType::Ee
    }
}

// Flag set used in get_crl_info to classify a CRL
flags! {
    enum CrlQuestions: u8 {
        EeOnly,
        CaOnly,
        AaOnly,
        Delta,
        Partitioned,
        Indirect,
        SomeReasons
    }
}
type CrlQuestionairre = FlagSet<CrlQuestions>;

pub(crate) fn get_crl_info(crl: &CertificateList) -> Result<CrlInfo> {
    let this_update = crl.tbs_cert_list.this_update.to_unix_duration().as_secs();
    let next_update = crl
        .tbs_cert_list
        .next_update
        .map(|nu| nu.to_unix_duration().as_secs());
    let issuer_name_blob = match crl.tbs_cert_list.issuer.to_der() {
        Ok(enc) => enc,
        Err(_e) => return Err(Error::Unrecognized),
    };
    let issuer_name = name_to_string(&crl.tbs_cert_list.issuer);
    let mut idp_blob: Option<Vec<u8>> = None;

    let mut questionnaire = CrlQuestionairre::default();

    if let Some(exts) = &crl.tbs_cert_list.crl_extensions {
        for ext in exts.iter() {
            match ext.extn_id {
                ID_CE_ISSUING_DISTRIBUTION_POINT => {
                    idp_blob = Some(ext.extn_value.as_bytes().to_vec());
                    let idp = match IssuingDistributionPoint::from_der(ext.extn_value.as_bytes()) {
                        Ok(idp) => idp,
                        Err(e) => {
                            return Err(Error::Asn1Error(e));
                        }
                    };

                    match &idp.distribution_point {
                        Some(DistributionPointName::FullName(gns)) => {
                            let has_dn = gns
                                .iter()
                                .any(|gn| matches!(gn, GeneralName::DirectoryName(_dn)));
                            if !has_dn {
                                // not supporting non-DN DPs
                                return Err(Error::Unrecognized);
                            }
                        }
                        Some(DistributionPointName::NameRelativeToCRLIssuer(_unsupported)) => {
                            // Not supporting name relative to issuer
                            return Err(Error::Unrecognized);
                        }
                        _ => {}
                    }

                    if idp.distribution_point.is_some() {
                        questionnaire |= CrlQuestions::Partitioned;
                    }

                    if idp.indirect_crl {
                        questionnaire |= CrlQuestions::Indirect;
                    }
                    if let Some(_osr) = &idp.only_some_reasons {
                        questionnaire |= CrlQuestions::SomeReasons;
                    }
                    if idp.only_contains_user_certs {
                        questionnaire |= CrlQuestions::EeOnly;
                    }
                    if idp.only_contains_ca_certs {
                        questionnaire |= CrlQuestions::CaOnly;
                    }
                    if idp.only_contains_attribute_certs {
                        questionnaire |= CrlQuestions::AaOnly;
                    }
                }
                ID_CE_DELTA_CRL_INDICATOR => {
                    questionnaire |= CrlQuestions::Delta;
                }
                _ => {}
            }
        }
    }

    if questionnaire.contains(CrlQuestions::AaOnly) {
        return Err(Error::CrlIncompatible);
    }

    let coverage = if questionnaire.contains(CrlQuestions::EeOnly) {
        CrlCoverage::EeOnly
    } else if questionnaire.contains(CrlQuestions::CaOnly) {
        CrlCoverage::CaOnly
    } else {
        CrlCoverage::All
    };

    let authority = if questionnaire.contains(CrlQuestions::Indirect) {
        CrlAuthority::Indirect
    } else {
        CrlAuthority::Direct
    };

    let scope = if questionnaire.contains(CrlQuestions::Partitioned) {
        if questionnaire.contains(CrlQuestions::Delta) {
            CrlScope::DeltaDp
        } else {
            CrlScope::Dp
        }
    } else if questionnaire.contains(CrlQuestions::Delta) {
        CrlScope::Delta
    } else {
        CrlScope::Complete
    };

    let reasons = if questionnaire.contains(CrlQuestions::SomeReasons) {
        CrlReasons::SomeReasons
    } else {
        CrlReasons::AllReasons
    };

    let type_info = CrlType {
        scope,
        coverage,
        authority,
        reasons,
    };

    Ok(CrlInfo {
        type_info,
        this_update,
        next_update,
        issuer_name,
        issuer_name_blob,
        idp_blob,
    })
}

/// validate_crl_issuer_name requires that either the certificate issuer or one of the names in a
/// CRL DP crlIssuer field match the CRL issuer. When a CRL DP produced the match, the matching
/// distribution point is returned for use as the active CRL DP during distribution point
/// validation.
fn validate_crl_issuer_name(
    cert: &ParsedCertificate,
    crl_info: &CrlInfo,
) -> Result<Option<DistributionPoint>> {
    let crl_dp = match cert.get_extension(&ID_CE_CRL_DISTRIBUTION_POINTS) {
        Ok(Some(ParsedExtension::CrlDistributionPoints(crl_dp))) => crl_dp,
        _ => match Name::from_der(&crl_info.issuer_name_blob) {
            Ok(n) => {
                if compare_names(&cert.decoded_cert.tbs_certificate.issuer, &n) {
                    return Ok(None);
                } else {
                    return Err(Error::CrlIncompatible);
                }
            }
            Err(e) => {
                return Err(Error::Asn1Error(e));
            }
        },
    };

    for dp in &crl_dp.0 {
        if let Some(gns) = &dp.crl_issuer {
            for gn in gns {
                if let GeneralName::DirectoryName(dn) = gn {
                    if let Ok(enc_dn) = dn.to_der() {
                        if enc_dn == crl_info.issuer_name_blob {
                            return Ok(Some(dp.clone()));
                        }
                    }
                }
            }
        }
    }

    match Name::from_der(&crl_info.issuer_name_blob) {
        Ok(n) => {
            if compare_names(&cert.decoded_cert.tbs_certificate.issuer, &n) {
                Ok(None)
            } else {
                Err(Error::CrlIncompatible)
            }
        }
        Err(e) => Err(Error::Asn1Error(e)),
    }
}

fn is_general_name_in_general_names(lhs: &GeneralNames, rhs: &GeneralName) -> bool {
    for gn in lhs {
        if gn == rhs {
            return true;
        }
    }
    false
}

fn at_least_one_general_name_in_common(
    gns_from_crl_dp: &GeneralNames,
    gns_from_idp: &GeneralNames,
) -> bool {
    for gn in gns_from_idp {
        if is_general_name_in_general_names(gns_from_crl_dp, gn) {
            return true;
        }
    }
    false
}

/// validate_distribution_point requires that the distribution point of a partitioned CRL match a
/// distribution point from the target certificate, that the IDP flags are consistent with the
/// certificate type and that the reasons covered by the CRL overlap the reasons asserted in the
/// active CRL DP.
fn validate_distribution_point(
    dps_from_crl_dp: Option<&CrlDistributionPoints>,
    crl_info: &CrlInfo,
    cert_type: CertRevType,
    target_cert: &ParsedCertificate,
    collected_reasons: &mut ReasonFlags,
) -> Result<()> {
    let active_crl_dp = validate_crl_issuer_name(target_cert, crl_info)?;

    if CrlScope::Dp == crl_info.type_info.scope || CrlScope::DeltaDp == crl_info.type_info.scope {
        // a partitioned CRL requires the cert to have a CRL DP
        if dps_from_crl_dp.is_none() || crl_info.idp_blob.is_none() {
            return Err(Error::CrlIncompatible);
        }

        let idp_blob = if let Some(idp_blob) = crl_info.idp_blob.as_ref() {
            idp_blob
        } else {
            return Err(Error::Unrecognized);
        };

        let idp = match IssuingDistributionPoint::from_der(idp_blob.as_slice()) {
            Ok(idp) => idp,
            Err(_e) => return Err(Error::Unrecognized),
        };

        let gns_from_idp = match idp.distribution_point {
            Some(DistributionPointName::FullName(gns)) => gns,
            Some(DistributionPointName::NameRelativeToCRLIssuer(_unsupported)) => {
                return Err(Error::Unrecognized)
            }
            _ => {
                // should not occur given the Dp or DeltaDp scope
                return Err(Error::Unrecognized);
            }
        };

        let mut found_match = false;
        if let Some(ref crl_dp) = active_crl_dp {
            // an active CRL DP was set during CRL issuer validation, require that specific DP to
            // match here
            if let Some(DistributionPointName::FullName(gns_from_crl_dp)) =
                &crl_dp.distribution_point
            {
                found_match = at_least_one_general_name_in_common(gns_from_crl_dp, &gns_from_idp);
            }
        } else {
            // otherwise, any DP can match
            if let Ok(Some(ParsedExtension::CrlDistributionPoints(crl_dp))) =
                target_cert.get_extension(&ID_CE_CRL_DISTRIBUTION_POINTS)
            {
                for dp in &crl_dp.0 {
                    if let Some(DistributionPointName::FullName(gns_from_crl_dp)) =
                        &dp.distribution_point
                    {
                        found_match =
                            at_least_one_general_name_in_common(gns_from_crl_dp, &gns_from_idp);
                        if found_match {
                            break;
                        }
                    }
                }
            }
        }

        if !found_match {
            return Err(Error::CrlIncompatible);
        }
    }

    if let Some(idp_blob) = &crl_info.idp_blob {
        let idp = match IssuingDistributionPoint::from_der(idp_blob) {
            Ok(idp) => idp,
            Err(e) => return Err(Error::Asn1Error(e)),
        };

        if idp.only_contains_attribute_certs {
            return Err(Error::CrlIncompatible);
        }

        if idp.only_contains_ca_certs
            && (CertRevType::Ee == cert_type || CertRevType::EeDp == cert_type)
        {
            return Err(Error::CrlIncompatible);
        }

        if idp.only_contains_user_certs
            && (CertRevType::Ca == cert_type || CertRevType::CaDp == cert_type)
        {
            return Err(Error::CrlIncompatible);
        }

        if CrlReasons::AllReasons != crl_info.type_info.reasons {
            if let Some(idp_reasons) = idp.only_some_reasons {
                *collected_reasons = idp_reasons;

                if let Some(ref crl_dp) = active_crl_dp {
                    if let Some(crldp_reasons) = crl_dp.reasons {
                        if (crldp_reasons & idp_reasons).is_empty() {
                            return Err(Error::CrlIncompatible);
                        } else {
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

/// validate_crl_authority requires the indirectCRL field of the IDP to be present when the CRL
/// issuer name does not match the certificate issuer name.
fn validate_crl_authority(target_cert: &ParsedCertificate, crl_info: &CrlInfo) -> Result<()> {
    let enc_iss = match target_cert.decoded_cert.tbs_certificate.issuer.to_der() {
        Ok(b) => b,
        Err(_e) => return Err(Error::Unrecognized),
    };

    if enc_iss != crl_info.issuer_name_blob
        && CrlAuthority::Indirect != crl_info.type_info.authority
    {
        Err(Error::CrlIncompatible)
    } else {
        Ok(())
    }
}

/// verify_crl verifies the signature on a CRL using the public key of the certificate's issuer.
fn verify_crl(
    pe: &PkiEnvironment<'_>,
    crl_buf: &[u8],
    issuer_spki: &SubjectPublicKeyInfoOwned,
) -> Result<()> {
    let defer_crl = match DeferDecodeSigned::from_der(crl_buf) {
        Ok(crl) => crl,
        Err(_e) => return Err(Error::Unrecognized),
    };

    let r = pe.verify_signature_message(
        pe,
        &defer_crl.tbs_field,
        defer_crl.signature.raw_bytes(),
        &defer_crl.signature_algorithm,
        issuer_spki,
    );
    if let Err(e) = r {
        log_message(
            &PkiLogLevel::Info,
            format!("CRL signature verification error: {:?}", e).as_str(),
        );
        return Err(Error::PathValidation(
            PathValidationStatus::SignatureVerificationFailure,
        ));
    }
    Ok(())
}

/// check_entry_extensions inspects the extensions in a CRL entry. invalidity date and reasons are
/// just informational, so presence is fine. hold instruction is simply ignored with corresponding
/// certificate treated as revoked. Presence of any other critical extension is cause to discard
/// the CRL. The certificate issuer extension is assumed to have been checked already via
/// certificate_issuer_extension_present.
fn check_entry_extensions(rc: &RevokedCert) -> Result<()> {
    let exts_to_ignore = [
        ID_CE_INVALIDITY_DATE,
        ID_CE_CRL_REASONS,
        ID_CE_HOLD_INSTRUCTION_CODE,
    ];
    if let Some(exts) = &rc.crl_entry_extensions {
        for e in exts {
            if e.critical && !exts_to_ignore.contains(&e.extn_id) {
                return Err(Error::CrlIncompatible);
            }
        }
    }
    Ok(())
}

fn check_crl_extensions(exts: &Extensions) -> Result<()> {
    let exts_to_ignore = [
        ID_CE_ISSUING_DISTRIBUTION_POINT,
        ID_CE_DELTA_CRL_INDICATOR,
        ID_CE_FRESHEST_CRL,
        ID_CE_CRL_NUMBER,
        ID_CE_AUTHORITY_KEY_IDENTIFIER,
    ];
    for e in exts {
        if e.critical && !exts_to_ignore.contains(&e.extn_id) {
            return Err(Error::CrlIncompatible);
        }
    }
    Ok(())
}

/// certificate_issuer_extension_present returns true if a certificate issuer extension is found
/// in the presented RevokedCert instance and false otherwise.
fn certificate_issuer_extension_present(rc: &RevokedCert) -> bool {
    if let Some(exts) = &rc.crl_entry_extensions {
        for e in exts {
            if e.extn_id == ID_CE_CERTIFICATE_ISSUER {
                return true;
            }
        }
    }
    false
}

pub(crate) fn check_crl_validity(toi: u64, crl: &CertificateList) -> Result<()> {
    if 0 != toi {
        let tu = crl.tbs_cert_list.this_update.to_unix_duration().as_secs();
        if tu > toi {
            log_message(
                &PkiLogLevel::Info,
                format!("Discarding CRL from {} as having this update time ({}) later than time of interest ({})", name_to_string(&crl.tbs_cert_list.issuer), tu, toi).as_str(),
            );
            return Err(Error::CrlIncompatible);
        }
        if let Some(nu) = crl.tbs_cert_list.next_update {
            if nu.to_unix_duration().as_secs() < toi {
                log_message(
                    &PkiLogLevel::Info,
                    format!("Discarding CRL from {} as having next update time ({}) earlier than time of interest ({})", name_to_string(&crl.tbs_cert_list.issuer), nu.to_unix_duration().as_secs(), toi).as_str(),
                );
                return Err(Error::CrlIncompatible);
            }
        }
    }
    Ok(())
}

/// scan_revoked_certificates searches the revokedCertificates field for an entry matching the
/// serial number of the target certificate, returning a CertificateRevoked error when a match is
/// found. CRLs carrying a certificate issuer CRL entry extension are discarded since entries on
/// such CRLs may pertain to certificates from a different issuer.
pub(crate) fn scan_revoked_certificates(
    crl: &CertificateList,
    target_cert: &ParsedCertificate,
) -> Result<()> {
    if let Some(revoked_certificates) = &crl.tbs_cert_list.revoked_certificates {
        for rc in revoked_certificates {
            if certificate_issuer_extension_present(rc) {
                log_message(
                    &PkiLogLevel::Info,
                    format!("Discarding CRL from {} due to presence of certificate issuer CRL entry extension", name_to_string(&crl.tbs_cert_list.issuer)).as_str(),
                );
                return Err(Error::CrlIncompatible);
            }

            if rc.serial_number == target_cert.decoded_cert.tbs_certificate.serial_number {
                check_entry_extensions(rc)?;
                return Err(Error::PathValidation(
                    PathValidationStatus::CertificateRevoked,
                ));
            }
        }
    }
    Ok(())
}

/// process_crl processes a CRL relative to a given target certificate and the public key of the
/// certificate's issuer. An Ok return indicates the CRL affirmed the certificate as not revoked
/// at the time of interest. A CertificateRevoked error indicates the certificate was found on the
/// CRL. Any other error indicates the CRL could not be used and should be discarded.
pub(crate) fn process_crl(
    pe: &PkiEnvironment<'_>,
    cps: &CertificationPathSettings,
    target_cert: &ParsedCertificate,
    issuer_spki: &SubjectPublicKeyInfoOwned,
    crl_buf: &[u8],
) -> Result<()> {
    verify_crl(pe, crl_buf, issuer_spki)?;

    let crl = match CertificateList::from_der(crl_buf) {
        Ok(crl) => crl,
        Err(e) => {
            log_message(
                &PkiLogLevel::Info,
                format!("Failed to parse CRL with {}", e).as_str(),
            );
            return Err(Error::Asn1Error(e));
        }
    };
    let crl_info = get_crl_info(&crl)?;

    let cert_type = classify_certificate(target_cert);
    let dps_from_crl_dp = match target_cert.get_extension(&ID_CE_CRL_DISTRIBUTION_POINTS) {
        Ok(Some(ParsedExtension::CrlDistributionPoints(crldp))) => Some(crldp),
        _ => None,
    };

    if !scope_compatible(cert_type, crl_info.type_info.scope)
        || !coverage_compatible(cert_type, crl_info.type_info.coverage)
    {
        log_message(
            &PkiLogLevel::Info,
            format!("Discarding CRL from {} as having incompatible scope or coverage for certificate issued to {}", name_to_string(&crl.tbs_cert_list.issuer), name_to_string(&target_cert.decoded_cert.tbs_certificate.subject)).as_str(),
        );
        return Err(Error::CrlIncompatible);
    }

    let mut collected_reasons = match ReasonFlags::new(0) {
        Ok(rf) => rf,
        Err(_e) => return Err(Error::Unrecognized),
    };
    if let Err(_e) = validate_distribution_point(
        dps_from_crl_dp,
        &crl_info,
        cert_type,
        target_cert,
        &mut collected_reasons,
    ) {
        log_message(
            &PkiLogLevel::Info,
            format!("Discarding CRL from {} as having incompatible distribution point for certificate issued to {}", name_to_string(&crl.tbs_cert_list.issuer), name_to_string(&target_cert.decoded_cert.tbs_certificate.subject)).as_str(),
        );
        return Err(Error::CrlIncompatible);
    }

    if let Err(_e) = validate_crl_authority(target_cert, &crl_info) {
        log_message(
            &PkiLogLevel::Info,
            format!("Discarding CRL from {} as having incompatible authority for certificate issued to {}", name_to_string(&crl.tbs_cert_list.issuer), name_to_string(&target_cert.decoded_cert.tbs_certificate.subject)).as_str(),
        );
        return Err(Error::CrlIncompatible);
    }

    let toi = cps.get_time_of_interest();
    check_crl_validity(toi, &crl)?;

    if let Some(exts) = &crl.tbs_cert_list.crl_extensions {
        if let Err(_e) = check_crl_extensions(exts) {
            log_message(
                &PkiLogLevel::Info,
                format!(
                    "Discarding CRL from {} due to unrecognized critical extension",
                    name_to_string(&crl.tbs_cert_list.issuer)
                )
                .as_str(),
            );
            return Err(Error::CrlIncompatible);
        }
    }

    scan_revoked_certificates(&crl, target_cert)
}

/// CrlStore provides an in-memory CRL store that supports manual population via the [`CrlSource`]
/// interface and revocation status determination via the [`RevocationChecker`] interface. CRLs
/// are indexed by issuer name using the same normalized string form used when indexing trust
/// anchors and certificates.
#[derive(Clone)]
pub struct CrlStore {
    #[cfg(feature = "std")]
    /// List of buffers containing DER-encoded CRLs
    crls: Arc<Mutex<RefCell<Vec<Vec<u8>>>>>,

    #[cfg(feature = "std")]
    /// Maps CRL issuer names to indices in the crls field
    issuer_map: Arc<Mutex<RefCell<BTreeMap<String, Vec<usize>>>>>,

    #[cfg(not(feature = "std"))]
    /// List of buffers containing DER-encoded CRLs
    crls: RefCell<Vec<Vec<u8>>>,

    #[cfg(not(feature = "std"))]
    /// Maps CRL issuer names to indices in the crls field
    issuer_map: RefCell<BTreeMap<String, Vec<usize>>>,
}

impl Default for CrlStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CrlStore {
    /// Instantiates a new empty CrlStore
    pub fn new() -> CrlStore {
        CrlStore {
            #[cfg(feature = "std")]
            crls: Arc::new(Mutex::new(RefCell::new(Vec::new()))),
            #[cfg(not(feature = "std"))]
            crls: RefCell::new(Vec::new()),
            #[cfg(feature = "std")]
            issuer_map: Arc::new(Mutex::new(RefCell::new(BTreeMap::new()))),
            #[cfg(not(feature = "std"))]
            issuer_map: RefCell::new(BTreeMap::new()),
        }
    }
}

impl CrlSource for CrlStore {
    fn get_crls(&self, cert: &ParsedCertificate) -> Result<Vec<Vec<u8>>> {
        let issuer = name_to_string(&cert.decoded_cert.tbs_certificate.issuer);

        #[cfg(feature = "std")]
        let crls_guard = if let Ok(g) = self.crls.lock() {
            g
        } else {
            return Err(Error::SourceUnavailable);
        };
        #[cfg(feature = "std")]
        let crls = crls_guard.borrow();
        #[cfg(not(feature = "std"))]
        let crls = self.crls.borrow();

        #[cfg(feature = "std")]
        let issuer_map_guard = if let Ok(g) = self.issuer_map.lock() {
            g
        } else {
            return Err(Error::SourceUnavailable);
        };
        #[cfg(feature = "std")]
        let issuer_map = issuer_map_guard.borrow();
        #[cfg(not(feature = "std"))]
        let issuer_map = self.issuer_map.borrow();

        if let Some(indices) = issuer_map.get(&issuer) {
            let retval: Vec<Vec<u8>> = indices
                .iter()
                .filter_map(|i| crls.get(*i).cloned())
                .collect();
            if !retval.is_empty() {
                return Ok(retval);
            }
        }
        Err(Error::NotFound)
    }

    fn add_crl(&self, crl_buf: &[u8], crl: &CertificateList) -> Result<()> {
        let issuer = name_to_string(&crl.tbs_cert_list.issuer);

        #[cfg(feature = "std")]
        let crls_guard = if let Ok(g) = self.crls.lock() {
            g
        } else {
            return Err(Error::SourceUnavailable);
        };
        #[cfg(feature = "std")]
        let mut crls = crls_guard.borrow_mut();
        #[cfg(not(feature = "std"))]
        let mut crls = self.crls.borrow_mut();

        #[cfg(feature = "std")]
        let issuer_map_guard = if let Ok(g) = self.issuer_map.lock() {
            g
        } else {
            return Err(Error::SourceUnavailable);
        };
        #[cfg(feature = "std")]
        let mut issuer_map = issuer_map_guard.borrow_mut();
        #[cfg(not(feature = "std"))]
        let mut issuer_map = self.issuer_map.borrow_mut();

        if crls.iter().any(|c| c == crl_buf) {
            return Ok(());
        }
        crls.push(crl_buf.to_vec());
        let index = crls.len() - 1;
        issuer_map.entry(issuer).or_default().push(index);
        Ok(())
    }
}

impl RevocationChecker for CrlStore {
    fn determine_revocation_status(
        &self,
        pe: &PkiEnvironment<'_>,
        cps: &CertificationPathSettings,
        cert: &ParsedCertificate,
        issuer_spki: &SubjectPublicKeyInfoOwned,
    ) -> PathValidationStatus {
        let cur_cert_subject = name_to_string(&cert.decoded_cert.tbs_certificate.subject);
        let crls = match self.get_crls(cert) {
            Ok(crls) => crls,
            Err(_e) => {
                log_message(
                    &PkiLogLevel::Info,
                    format!("No CRLs found for certificate issued to {}", cur_cert_subject)
                        .as_str(),
                );
                return PathValidationStatus::RevocationStatusNotDetermined;
            }
        };

        for crl_buf in &crls {
            match process_crl(pe, cps, cert, issuer_spki, crl_buf) {
                Ok(_ok) => {
                    log_message(
                        &PkiLogLevel::Info,
                        format!("Determined revocation status (valid) using CRL for certificate issued to {}", cur_cert_subject).as_str(),
                    );
                    return PathValidationStatus::Valid;
                }
                Err(e) => {
                    if Error::PathValidation(PathValidationStatus::CertificateRevoked) == e {
                        log_message(
                            &PkiLogLevel::Info,
                            format!("Determined revocation status (revoked) using CRL for certificate issued to {}", cur_cert_subject).as_str(),
                        );
                        return PathValidationStatus::CertificateRevoked;
                    }
                    log_message(
                        &PkiLogLevel::Info,
                        format!("Failed to determine revocation status using CRL for certificate issued to {} with {}", cur_cert_subject, e).as_str(),
                    );
                }
            }
        }
        PathValidationStatus::RevocationStatusNotDetermined
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;
    use core::str::FromStr;
    use core::time::Duration;
    use der::asn1::{BitString, UtcTime};
    use spki::AlgorithmIdentifierOwned;
    use x509_cert::crl::TbsCertList;
    use x509_cert::serial_number::SerialNumber;
    use x509_cert::time::{Time, Validity};
    use x509_cert::{Certificate, TbsCertificate, Version};

    use const_oid::db::rfc5912::ECDSA_WITH_SHA_256;

    fn test_alg() -> AlgorithmIdentifierOwned {
        AlgorithmIdentifierOwned {
            oid: ECDSA_WITH_SHA_256,
            parameters: None,
        }
    }

    fn test_time(secs: u64) -> Time {
        Time::UtcTime(UtcTime::from_unix_duration(Duration::from_secs(secs)).unwrap())
    }

    fn test_cert(issuer: &str, serial: &[u8]) -> ParsedCertificate {
        let spki = SubjectPublicKeyInfoOwned {
            algorithm: test_alg(),
            subject_public_key: BitString::from_bytes(&[0u8; 8]).unwrap(),
        };
        let tbs = TbsCertificate {
            version: Version::V3,
            serial_number: SerialNumber::new(serial).unwrap(),
            signature: test_alg(),
            issuer: Name::from_str(issuer).unwrap(),
            validity: Validity {
                not_before: test_time(1000),
                not_after: test_time(100000),
            },
            subject: Name::from_str("CN=Target").unwrap(),
            subject_public_key_info: spki,
            issuer_unique_id: None,
            subject_unique_id: None,
            extensions: None,
        };
        let cert = Certificate {
            tbs_certificate: tbs,
            signature_algorithm: test_alg(),
            signature: BitString::from_bytes(&[0u8; 8]).unwrap(),
        };
        ParsedCertificate::try_from(cert).unwrap()
    }

    fn test_crl(issuer: &str, this_update: u64, next_update: u64, serials: &[&[u8]]) -> CertificateList {
        let revoked: Vec<RevokedCert> = serials
            .iter()
            .map(|s| RevokedCert {
                serial_number: SerialNumber::new(s).unwrap(),
                revocation_date: test_time(this_update),
                crl_entry_extensions: None,
            })
            .collect();
        CertificateList {
            tbs_cert_list: TbsCertList {
                version: Version::V2,
                signature: test_alg(),
                issuer: Name::from_str(issuer).unwrap(),
                this_update: test_time(this_update),
                next_update: Some(test_time(next_update)),
                revoked_certificates: if revoked.is_empty() {
                    None
                } else {
                    Some(revoked)
                },
                crl_extensions: None,
            },
            signature_algorithm: test_alg(),
            signature: BitString::from_bytes(&[0u8; 8]).unwrap(),
        }
    }

    #[test]
    fn compatibility_tables() {
        assert!(scope_compatible(CertRevType::EeDp, CrlScope::Complete));
        assert!(scope_compatible(CertRevType::EeDp, CrlScope::Dp));
        assert!(scope_compatible(CertRevType::Ee, CrlScope::Complete));
        assert!(!scope_compatible(CertRevType::Ee, CrlScope::Dp));
        assert!(!scope_compatible(CertRevType::Ee, CrlScope::DeltaDp));
        assert!(scope_compatible(CertRevType::Ee, CrlScope::Delta));
        assert!(scope_compatible(CertRevType::CaDp, CrlScope::DeltaDp));
        assert!(!scope_compatible(CertRevType::Ca, CrlScope::Dp));

        assert!(coverage_compatible(CertRevType::EeDp, CrlCoverage::All));
        assert!(coverage_compatible(CertRevType::EeDp, CrlCoverage::EeOnly));
        assert!(!coverage_compatible(CertRevType::EeDp, CrlCoverage::CaOnly));
        assert!(coverage_compatible(CertRevType::Ca, CrlCoverage::CaOnly));
        assert!(!coverage_compatible(CertRevType::Ca, CrlCoverage::EeOnly));
    }

    #[test]
    fn crl_info_from_basic_crl() {
        let crl = test_crl("CN=CRL Issuer", 5000, 9000, &[&[1u8]]);
        let info = get_crl_info(&crl).unwrap();
        assert_eq!(5000, info.this_update);
        assert_eq!(Some(9000), info.next_update);
        assert!(info.idp_blob.is_none());
        assert!(matches!(info.type_info.scope, CrlScope::Complete));
        assert!(matches!(info.type_info.coverage, CrlCoverage::All));
        assert!(matches!(info.type_info.authority, CrlAuthority::Direct));
        assert!(matches!(info.type_info.reasons, CrlReasons::AllReasons));
    }

    #[test]
    fn crl_validity_window() {
        let crl = test_crl("CN=CRL Issuer", 5000, 9000, &[]);
        assert!(check_crl_validity(0, &crl).is_ok());
        assert!(check_crl_validity(6000, &crl).is_ok());
        assert_eq!(
            Err(Error::CrlIncompatible),
            check_crl_validity(4000, &crl)
        );
        assert_eq!(
            Err(Error::CrlIncompatible),
            check_crl_validity(10000, &crl)
        );
    }

    #[test]
    fn revoked_serial_scan() {
        let cert = test_cert("CN=CRL Issuer", &[3u8]);
        let hit = test_crl("CN=CRL Issuer", 5000, 9000, &[&[2u8], &[3u8]]);
        assert_eq!(
            Err(Error::PathValidation(
                PathValidationStatus::CertificateRevoked
            )),
            scan_revoked_certificates(&hit, &cert)
        );
        let miss = test_crl("CN=CRL Issuer", 5000, 9000, &[&[2u8]]);
        assert!(scan_revoked_certificates(&miss, &cert).is_ok());
        let empty = test_crl("CN=CRL Issuer", 5000, 9000, &[]);
        assert!(scan_revoked_certificates(&empty, &cert).is_ok());
    }

    #[test]
    fn crl_issuer_and_authority() {
        let cert = test_cert("CN=CRL Issuer", &[3u8]);
        let crl = test_crl("CN=CRL Issuer", 5000, 9000, &[]);
        let info = get_crl_info(&crl).unwrap();
        assert_eq!(Ok(None), validate_crl_issuer_name(&cert, &info));
        assert!(validate_crl_authority(&cert, &info).is_ok());

        let other = test_crl("CN=Some Other CA", 5000, 9000, &[]);
        let other_info = get_crl_info(&other).unwrap();
        assert_eq!(
            Err(Error::CrlIncompatible),
            validate_crl_issuer_name(&cert, &other_info)
        );
        assert_eq!(
            Err(Error::CrlIncompatible),
            validate_crl_authority(&cert, &other_info)
        );
    }

    #[test]
    fn crl_store_round_trip() {
        let store = CrlStore::new();
        let crl = test_crl("CN=CRL Issuer", 5000, 9000, &[&[2u8]]);
        let crl_buf = crl.to_der().unwrap();
        store.add_crl(&crl_buf, &crl).unwrap();
        // duplicate add is a no-op
        store.add_crl(&crl_buf, &crl).unwrap();

        let cert = test_cert("CN=CRL Issuer", &[3u8]);
        let crls = store.get_crls(&cert).unwrap();
        assert_eq!(1, crls.len());
        assert_eq!(crl_buf, crls[0]);

        let stranger = test_cert("CN=Some Other CA", &[3u8]);
        assert_eq!(Err(Error::NotFound), store.get_crls(&stranger));
    }

    #[test]
    fn classify_certificate_without_extensions() {
        let cert = test_cert("CN=CRL Issuer", &[3u8]);
        assert!(matches!(classify_certificate(&cert), CertRevType::Ee));
    }
}
