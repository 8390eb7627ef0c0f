//! Structures and functions related to configuring certification path processing operations

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::string::{String, ToString};
use alloc::{vec, vec::Vec};
use core::str::FromStr;

#[cfg(feature = "std")]
use serde::{Deserialize, Serialize};

use const_oid::db::rfc5280::ANY_POLICY;
use der::asn1::ObjectIdentifier;

use crate::validator::parsed_certificate::ParsedCertificate;
use crate::{
    name_constraints_set_to_name_constraints_settings,
    name_constraints_settings_to_name_constraints_set, NameConstraintsSet, NameConstraintsSettings,
    Result,
};

#[cfg(feature = "std")]
use std::path::Path;
#[cfg(feature = "std")]
use std::time::{SystemTime, UNIX_EPOCH};

#[cfg(feature = "std")]
use crate::Error;

//-----------------------------------------------------------------------------------------------
// Type definitions used in the definition of path settings
//-----------------------------------------------------------------------------------------------
/// `ObjectIdentifierSet` is a typedef for a set of ObjectIdentifier values.
pub type ObjectIdentifierSet = BTreeSet<ObjectIdentifier>;

/// `Strings` is a typedef for a vector of String values.
pub type Strings = Vec<String>;

/// `Buffers` is a typedef for a vector of `Vec<u8>` values.
pub type Buffers = Vec<Vec<u8>>;

/// `ListOfBuffers` is a typedef for a vector of vectors of `Vec<u8>` values.
pub type ListOfBuffers = Vec<Vec<Vec<u8>>>;

/// `CertificationPathSettings` is a map of arbitrary string keys to variant values that governs
/// certification path discovery and validation, i.e., it aggregates the inputs defined in
/// [RFC 5280 Section 6.1.1]: <https://datatracker.ietf.org/doc/html/rfc5280#section-6.1.1> along
/// with implementation-specific controls.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub struct CertificationPathSettings(pub BTreeMap<String, CertificationPathProcessingTypes>);

impl CertificationPathSettings {
    /// Creates a new empty [`CertificationPathSettings`]
    pub fn new() -> Self {
        Self::default()
    }
}

/// `CertificateChain` is a typedef for a vector of `ParsedCertificate`.
pub type CertificateChain = Vec<ParsedCertificate>;

/// The `ValidPolicyTreeNode` is used to represent nodes returned via a `PR_FINAL_VALID_POLICY_TREE`
/// entry in a [`CertificationPathResults`](../path_results/struct.CertificationPathResults.html)
/// instance. Each node aggregates a valid policy, the qualifiers associated with that policy in the
/// corresponding certificate and the set of policies that satisfy this node at the next depth.
#[derive(Clone, Debug)]
pub struct ValidPolicyTreeNode {
    /// valid_policy is a single policy OID representing a valid policy at the node's depth
    pub valid_policy: ObjectIdentifier,
    /// qualifier_set contains encoded policy qualifiers associated with valid_policy, if any
    pub qualifier_set: Option<Vec<u8>>,
    /// expected_policy_set contains the policy OIDs that would satisfy this policy at the next depth
    pub expected_policy_set: ObjectIdentifierSet,
}

/// `FinalValidPolicyTree` serves as the final value of the valid_policy_tree produced during
/// certificate policy processing, organized as one row of nodes per depth.
pub type FinalValidPolicyTree = Vec<Vec<ValidPolicyTreeNode>>;

//-----------------------------------------------------------------------------------------------
// Enum used to define all path settings
//-----------------------------------------------------------------------------------------------
/// `CertificationPathProcessingTypes` is used to define a variant map with types associated with
/// performing certification path discovery and validation.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(Serialize, Deserialize))]
pub enum CertificationPathProcessingTypes {
    /// Represents bool values
    Bool(bool),
    /// Represents u8 values
    U8(u8),
    /// Represents u16 values
    U16(u16),
    /// Represents u64 values
    U64(u64),
    /// Represents NameConstraintsSettings values
    NameConstraintsSettings(NameConstraintsSettings),
    /// Represents vectors of Strings
    Strings(Strings),
}

//-----------------------------------------------------------------------------------------------
// Types of path settings
//-----------------------------------------------------------------------------------------------
/// `PS_INITIAL_EXPLICIT_POLICY_INDICATOR` is used to retrieve a boolean value from a [`CertificationPathSettings`]
/// object. This corresponds to the initial-explicit-policy value described in
/// [RFC 5280 Section 6.1.1]: <https://datatracker.ietf.org/doc/html/rfc5280#section-6.1.1>. By default,
/// this setting is set to false.
pub static PS_INITIAL_EXPLICIT_POLICY_INDICATOR: &str = "psInitialExplicitPolicyIndicator";

/// `PS_INITIAL_POLICY_MAPPING_INHIBIT_INDICATOR` is used to retrieve a boolean value from a [`CertificationPathSettings`]
/// object. This corresponds to the initial-policy-mapping-inhibit value described in
/// [RFC 5280 Section 6.1.1]: <https://datatracker.ietf.org/doc/html/rfc5280#section-6.1.1>. By default,
/// this setting is set to false.
pub static PS_INITIAL_POLICY_MAPPING_INHIBIT_INDICATOR: &str =
    "psInitialPolicyMappingInhibitIndicator";

/// `PS_INITIAL_INHIBIT_ANY_POLICY_INDICATOR` is used to retrieve a boolean value from a [`CertificationPathSettings`]
/// object. This corresponds to the initial-any-policy-inhibit value described in
/// [RFC 5280 Section 6.1.1]: <https://datatracker.ietf.org/doc/html/rfc5280#section-6.1.1>. By default,
/// this setting is set to false.
pub static PS_INITIAL_INHIBIT_ANY_POLICY_INDICATOR: &str = "psInitialInhibitAnyPolicyIndicator";

/// `PS_INITIAL_POLICY_SET` is used to retrieve a Strings value featuring OIDs in dotted notation
/// from a [`CertificationPathSettings`] object. This corresponds to the user-initial-policy-set
/// value described in
/// [RFC 5280 Section 6.1.1]: <https://datatracker.ietf.org/doc/html/rfc5280#section-6.1.1>. By default,
/// a set containing anyPolicy is used.
pub static PS_INITIAL_POLICY_SET: &str = "psInitialPolicySet";

/// `PS_INITIAL_PERMITTED_SUBTREES` is used to retrieve a NameConstraintsSettings value from a [`CertificationPathSettings`]
/// object. This corresponds to the initial-permitted-subtrees value described in
/// [RFC 5280 Section 6.1.1]: <https://datatracker.ietf.org/doc/html/rfc5280#section-6.1.1>.
pub static PS_INITIAL_PERMITTED_SUBTREES: &str = "psInitialPermittedSubtrees";

/// `PS_INITIAL_EXCLUDED_SUBTREES` is used to retrieve a NameConstraintsSettings value from a [`CertificationPathSettings`]
/// object. This corresponds to the initial-excluded-subtrees value described in
/// [RFC 5280 Section 6.1.1]: <https://datatracker.ietf.org/doc/html/rfc5280#section-6.1.1>.
pub static PS_INITIAL_EXCLUDED_SUBTREES: &str = "psInitialExcludedSubtrees";

/// `PS_TIME_OF_INTEREST` is used to retrieve a u64 value from a [`CertificationPathSettings`]
/// object. This corresponds to the current date/time value described in
/// [RFC 5280 Section 6.1.1]: <https://datatracker.ietf.org/doc/html/rfc5280#section-6.1.1>. The
/// value need not be the current time and can be a time in the past to support retrospective
/// validation. The value is expressed as seconds since the Unix epoch, with 0 disabling validity
/// checks. By default, the value is set to current time if std is available, else to 0.
pub static PS_TIME_OF_INTEREST: &str = "psTimeOfInterest";

/// `PS_ENFORCE_TRUST_ANCHOR_CONSTRAINTS` is used to retrieve a boolean value from a [`CertificationPathSettings`]
/// object. This corresponds to the enforceTrustAnchorConstraints value described in
/// [RFC 5937 Section 3.1]: <https://datatracker.ietf.org/doc/html/rfc5937#section-3.1>. By default,
/// this setting is set to false, i.e., constraints encoded in a trust anchor are not enforced.
pub static PS_ENFORCE_TRUST_ANCHOR_CONSTRAINTS: &str = "psEnforceTrustAnchorConstraints";

/// `PS_ENFORCE_TRUST_ANCHOR_VALIDITY` is used to retrieve a boolean value from a [`CertificationPathSettings`]
/// object. By default, this setting is set to true (per industry convention; RFC 5280 does not
/// require checking trust anchor validity). Turn this value off to refrain from checking TA validity.
pub static PS_ENFORCE_TRUST_ANCHOR_VALIDITY: &str = "psEnforceTrustAnchorValidity";

/// `PS_KEY_USAGE` is used to retrieve a u16 value from a [`CertificationPathSettings`] object.
/// The first 9 bits from the value will be considered (all other bits are ignored) when evaluating
/// the target certificate, i.e., the target certificate must have a KeyUsage extension with at
/// least the bits indicated set. When this is absent, KeyUsage values in the target certificate
/// are not considered when validating a certification path.
pub static PS_KEY_USAGE: &str = "psKeyUsage";

/// `PS_EXTENDED_KEY_USAGE` is used to retrieve a Strings value featuring OIDs in dotted notation
/// from a [`CertificationPathSettings`] object. There is no default. Absence of this configuration
/// indicates EKU usage is unconstrained by the caller. EKU processing for the path may still occur
/// per the PS_EXTENDED_KEY_USAGE_PATH configuration value.
pub static PS_EXTENDED_KEY_USAGE: &str = "psExtendedKeyUsage";

/// `PS_EXTENDED_KEY_USAGE_PATH` is used to retrieve a boolean value from a [`CertificationPathSettings`]
/// object. The default value is false. When true, certification path validation should ensure the
/// intersection of extended key usage values that appear in a certification path is not empty,
/// consistent with prevailing practices.
pub static PS_EXTENDED_KEY_USAGE_PATH: &str = "psExtendedKeyUsagePath";

/// `PS_INITIAL_PATH_LENGTH_CONSTRAINT` is used to retrieve a u8 value from a [`CertificationPathSettings`]
/// object. This value is used in concert with BasicConstraints extensions during certification
/// path validation by establishing the maximum path length that will be accepted. By default, the
/// value is set to 15, as defined by `PS_MAX_PATH_LENGTH_CONSTRAINT`.
pub static PS_INITIAL_PATH_LENGTH_CONSTRAINT: &str = "psInitialPathLengthConstraint";

/// `PS_MAX_PATH_LENGTH_CONSTRAINT` sets the maximum length path accepted by validation implementation
pub static PS_MAX_PATH_LENGTH_CONSTRAINT: u8 = 15;

/// `PS_CHECK_REVOCATION_STATUS` is used to retrieve a boolean value from a [`CertificationPathSettings`]
/// object. The default value is true. When true, certification path validation should determine the
/// revocation status of each certificate in the path via the available [`RevocationChecker`](crate::RevocationChecker)
/// objects, i.e., stored CRLs.
pub static PS_CHECK_REVOCATION_STATUS: &str = "psCheckRevocationStatus";

/// `PS_RELAX_REVOCATION_WHEN_UNAVAILABLE` is used to retrieve a boolean value from a [`CertificationPathSettings`]
/// object. The default value is false. When true, certificates for which no revocation status
/// could be determined are tolerated instead of terminating validation with a
/// RevocationStatusNotDetermined status.
pub static PS_RELAX_REVOCATION_WHEN_UNAVAILABLE: &str = "psRelaxRevocationWhenUnavailable";

/// `PS_POLICY_QUALIFIERS_REJECTED` is used to retrieve a boolean value from a [`CertificationPathSettings`]
/// object. The default value is true. When true, certificates featuring a critical certificate
/// policies extension that associates qualifiers with policies are rejected during certificate
/// policy processing.
pub static PS_POLICY_QUALIFIERS_REJECTED: &str = "psPolicyQualifiersRejected";

/// `PS_IGNORE_EXPIRED` is used to retrieve a boolean value from a [`CertificationPathSettings`]
/// object. The default value is false. When true, certification path validation should ignore
/// certificate expiry errors. This is useful only in limited cases, such as retrospective
/// validation of artifacts produced while a now-expired certificate was valid.
pub static PS_IGNORE_EXPIRED: &str = "psIgnoreExpired";

/// `PS_USE_VALIDATOR_FILTER_WHEN_BUILDING` is used to retrieve a boolean value from a [`CertificationPathSettings`]
/// object. The default value is true. When true, certification path building should employ relevant
/// certification path validation practices during path building (see RFC 4158).
pub static PS_USE_VALIDATOR_FILTER_WHEN_BUILDING: &str = "psUseValidatorFilterWhenBuilding";

//-----------------------------------------------------------------------------------------------
// Macros that generate getters/setters for settings
//-----------------------------------------------------------------------------------------------
/// Generates a getter that returns an Option and a setter for a settings key whose absence has no
/// default interpretation.
macro_rules! cps_gets_and_sets {
    ($name:ident, $getter:ident, $setter:ident, $variant:ident, $t:ty) => {
        impl CertificationPathSettings {
            #[doc = concat!("`", stringify!($getter), "` is used to retrieve `", stringify!($name), "` items from a [`CertificationPathSettings`] instance")]
            pub fn $getter(&self) -> Option<$t> {
                if self.0.contains_key($name) {
                    return match &self.0[$name] {
                        CertificationPathProcessingTypes::$variant(v) => Some(v.clone()),
                        _ => None,
                    };
                }
                None
            }

            #[doc = concat!("`", stringify!($setter), "` is used to set `", stringify!($name), "` items in a [`CertificationPathSettings`] instance")]
            pub fn $setter(&mut self, v: $t) {
                self.0.insert(
                    $name.to_string(),
                    CertificationPathProcessingTypes::$variant(v),
                );
            }
        }
    };
}

/// Generates a getter that falls back to a default value and a setter for a settings key.
macro_rules! cps_gets_and_sets_with_default {
    ($name:ident, $getter:ident, $setter:ident, $variant:ident, $t:ty, $default:expr) => {
        impl CertificationPathSettings {
            #[doc = concat!("`", stringify!($getter), "` is used to retrieve `", stringify!($name), "` items from a [`CertificationPathSettings`] instance")]
            pub fn $getter(&self) -> $t {
                if self.0.contains_key($name) {
                    return match &self.0[$name] {
                        CertificationPathProcessingTypes::$variant(v) => v.clone(),
                        _ => $default,
                    };
                }
                $default
            }

            #[doc = concat!("`", stringify!($setter), "` is used to set `", stringify!($name), "` items in a [`CertificationPathSettings`] instance")]
            pub fn $setter(&mut self, v: $t) {
                self.0.insert(
                    $name.to_string(),
                    CertificationPathProcessingTypes::$variant(v),
                );
            }
        }
    };
}

//-----------------------------------------------------------------------------------------------
// Getters/setters for settings
//-----------------------------------------------------------------------------------------------
cps_gets_and_sets_with_default!(
    PS_INITIAL_EXPLICIT_POLICY_INDICATOR,
    get_initial_explicit_policy_indicator,
    set_initial_explicit_policy_indicator,
    Bool,
    bool,
    false
);
cps_gets_and_sets_with_default!(
    PS_INITIAL_POLICY_MAPPING_INHIBIT_INDICATOR,
    get_initial_policy_mapping_inhibit_indicator,
    set_initial_policy_mapping_inhibit_indicator,
    Bool,
    bool,
    false
);
cps_gets_and_sets_with_default!(
    PS_INITIAL_INHIBIT_ANY_POLICY_INDICATOR,
    get_initial_inhibit_any_policy_indicator,
    set_initial_inhibit_any_policy_indicator,
    Bool,
    bool,
    false
);

impl CertificationPathSettings {
    /// `get_initial_policy_set` is used to retrieve `PS_INITIAL_POLICY_SET` items from a
    /// [`CertificationPathSettings`] instance, defaulting to a set containing anyPolicy.
    pub fn get_initial_policy_set(&self) -> Strings {
        if self.0.contains_key(PS_INITIAL_POLICY_SET) {
            return match &self.0[PS_INITIAL_POLICY_SET] {
                CertificationPathProcessingTypes::Strings(v) => v.clone(),
                _ => vec![ANY_POLICY.to_string()],
            };
        }
        vec![ANY_POLICY.to_string()]
    }

    /// `set_initial_policy_set` is used to set `PS_INITIAL_POLICY_SET` items in a
    /// [`CertificationPathSettings`] instance
    pub fn set_initial_policy_set(&mut self, v: Strings) {
        self.0.insert(
            PS_INITIAL_POLICY_SET.to_string(),
            CertificationPathProcessingTypes::Strings(v),
        );
    }

    /// `set_initial_policy_set_from_oid_set` is used to set `PS_INITIAL_POLICY_SET` items in a
    /// [`CertificationPathSettings`] instance given an ObjectIdentifierSet instead of a Strings object.
    pub fn set_initial_policy_set_from_oid_set(&mut self, v: ObjectIdentifierSet) {
        let s: Strings = v.iter().map(|o| o.to_string()).collect();
        self.0.insert(
            PS_INITIAL_POLICY_SET.to_string(),
            CertificationPathProcessingTypes::Strings(s),
        );
    }

    /// `get_initial_policy_set_as_oid_set` is used to retrieve `PS_INITIAL_POLICY_SET` items from a
    /// [`CertificationPathSettings`] instance as an ObjectIdentifierSet instead of a Strings object.
    /// Values that do not parse as OIDs are dropped.
    pub fn get_initial_policy_set_as_oid_set(&self) -> ObjectIdentifierSet {
        let mut bts = BTreeSet::new();
        for s in self.get_initial_policy_set() {
            if let Ok(oid) = ObjectIdentifier::from_str(s.as_str()) {
                bts.insert(oid);
            }
        }
        bts
    }

    /// `get_initial_permitted_subtrees` retrieves the `PS_INITIAL_PERMITTED_SUBTREES` value from a
    /// [`CertificationPathSettings`] map. If present, a [`NameConstraintsSettings`] value is
    /// returned, else None is returned.
    pub fn get_initial_permitted_subtrees(&self) -> Option<NameConstraintsSettings> {
        if self.0.contains_key(PS_INITIAL_PERMITTED_SUBTREES) {
            return match &self.0[PS_INITIAL_PERMITTED_SUBTREES] {
                CertificationPathProcessingTypes::NameConstraintsSettings(ncs) => Some(ncs.clone()),
                _ => None,
            };
        }
        None
    }

    /// `get_initial_permitted_subtrees_with_default_as_set` retrieves the
    /// `PS_INITIAL_PERMITTED_SUBTREES` value from a [`CertificationPathSettings`] map as a
    /// [`NameConstraintsSet`] object instead of a [`NameConstraintsSettings`] object, returning a
    /// default instance when no value is present. The bufs parameter receives encoded name values
    /// that must outlive the returned set.
    pub fn get_initial_permitted_subtrees_with_default_as_set(
        &self,
        bufs: &mut BTreeMap<String, Vec<Vec<u8>>>,
    ) -> Result<NameConstraintsSet> {
        if self.0.contains_key(PS_INITIAL_PERMITTED_SUBTREES) {
            return match &self.0[PS_INITIAL_PERMITTED_SUBTREES] {
                CertificationPathProcessingTypes::NameConstraintsSettings(ncs) => {
                    name_constraints_settings_to_name_constraints_set(ncs, bufs)
                }
                _ => Ok(NameConstraintsSet::default()),
            };
        }
        Ok(NameConstraintsSet::default())
    }

    /// `set_initial_permitted_subtrees` is used to set the `PS_INITIAL_PERMITTED_SUBTREES` value in
    /// a [`CertificationPathSettings`] map.
    pub fn set_initial_permitted_subtrees(&mut self, ncs: NameConstraintsSettings) {
        self.0.insert(
            PS_INITIAL_PERMITTED_SUBTREES.to_string(),
            CertificationPathProcessingTypes::NameConstraintsSettings(ncs),
        );
    }

    /// `set_initial_permitted_subtrees_from_set` is used to set the `PS_INITIAL_PERMITTED_SUBTREES`
    /// value in a [`CertificationPathSettings`] map given a [`NameConstraintsSet`] object instead of
    /// a [`NameConstraintsSettings`] object.
    pub fn set_initial_permitted_subtrees_from_set(
        &mut self,
        ncs: &NameConstraintsSet,
    ) -> Result<()> {
        self.0.insert(
            PS_INITIAL_PERMITTED_SUBTREES.to_string(),
            CertificationPathProcessingTypes::NameConstraintsSettings(
                name_constraints_set_to_name_constraints_settings(ncs)?,
            ),
        );
        Ok(())
    }

    /// `get_initial_excluded_subtrees` retrieves the `PS_INITIAL_EXCLUDED_SUBTREES` value from a
    /// [`CertificationPathSettings`] map. If present, a [`NameConstraintsSettings`] value is
    /// returned, else None is returned.
    pub fn get_initial_excluded_subtrees(&self) -> Option<NameConstraintsSettings> {
        if self.0.contains_key(PS_INITIAL_EXCLUDED_SUBTREES) {
            return match &self.0[PS_INITIAL_EXCLUDED_SUBTREES] {
                CertificationPathProcessingTypes::NameConstraintsSettings(ncs) => Some(ncs.clone()),
                _ => None,
            };
        }
        None
    }

    /// `get_initial_excluded_subtrees_with_default_as_set` retrieves the
    /// `PS_INITIAL_EXCLUDED_SUBTREES` value from a [`CertificationPathSettings`] map as a
    /// [`NameConstraintsSet`] object instead of a [`NameConstraintsSettings`] object, returning a
    /// default instance when no value is present. The bufs parameter receives encoded name values
    /// that must outlive the returned set.
    pub fn get_initial_excluded_subtrees_with_default_as_set(
        &self,
        bufs: &mut BTreeMap<String, Vec<Vec<u8>>>,
    ) -> Result<NameConstraintsSet> {
        if self.0.contains_key(PS_INITIAL_EXCLUDED_SUBTREES) {
            return match &self.0[PS_INITIAL_EXCLUDED_SUBTREES] {
                CertificationPathProcessingTypes::NameConstraintsSettings(ncs) => {
                    name_constraints_settings_to_name_constraints_set(ncs, bufs)
                }
                _ => Ok(NameConstraintsSet::default()),
            };
        }
        Ok(NameConstraintsSet::default())
    }

    /// `set_initial_excluded_subtrees` is used to set the `PS_INITIAL_EXCLUDED_SUBTREES` value in
    /// a [`CertificationPathSettings`] map.
    pub fn set_initial_excluded_subtrees(&mut self, ncs: NameConstraintsSettings) {
        self.0.insert(
            PS_INITIAL_EXCLUDED_SUBTREES.to_string(),
            CertificationPathProcessingTypes::NameConstraintsSettings(ncs),
        );
    }

    /// `set_initial_excluded_subtrees_from_set` is used to set the `PS_INITIAL_EXCLUDED_SUBTREES`
    /// value in a [`CertificationPathSettings`] map given a [`NameConstraintsSet`] object instead of
    /// a [`NameConstraintsSettings`] object.
    pub fn set_initial_excluded_subtrees_from_set(
        &mut self,
        ncs: &NameConstraintsSet,
    ) -> Result<()> {
        self.0.insert(
            PS_INITIAL_EXCLUDED_SUBTREES.to_string(),
            CertificationPathProcessingTypes::NameConstraintsSettings(
                name_constraints_set_to_name_constraints_settings(ncs)?,
            ),
        );
        Ok(())
    }
}

cps_gets_and_sets_with_default!(PS_TIME_OF_INTEREST, get_time_of_interest, set_time_of_interest, U64, u64, {
    #[cfg(feature = "std")]
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(n) => n.as_secs(),
        Err(_) => 0,
    }
    #[cfg(not(feature = "std"))]
    0
});
cps_gets_and_sets_with_default!(
    PS_ENFORCE_TRUST_ANCHOR_CONSTRAINTS,
    get_enforce_trust_anchor_constraints,
    set_enforce_trust_anchor_constraints,
    Bool,
    bool,
    false
);
cps_gets_and_sets_with_default!(
    PS_ENFORCE_TRUST_ANCHOR_VALIDITY,
    get_enforce_trust_anchor_validity,
    set_enforce_trust_anchor_validity,
    Bool,
    bool,
    true
);
cps_gets_and_sets!(PS_KEY_USAGE, get_target_key_usage, set_target_key_usage, U16, u16);

impl CertificationPathSettings {
    /// `get_extended_key_usage` is used to retrieve `PS_EXTENDED_KEY_USAGE` items from a
    /// [`CertificationPathSettings`] instance
    pub fn get_extended_key_usage(&self) -> Option<Strings> {
        if self.0.contains_key(PS_EXTENDED_KEY_USAGE) {
            return match &self.0[PS_EXTENDED_KEY_USAGE] {
                CertificationPathProcessingTypes::Strings(v) => Some(v.clone()),
                _ => None,
            };
        }
        None
    }

    /// `set_extended_key_usage` is used to set `PS_EXTENDED_KEY_USAGE` items in a
    /// [`CertificationPathSettings`] instance
    pub fn set_extended_key_usage(&mut self, v: Strings) {
        self.0.insert(
            PS_EXTENDED_KEY_USAGE.to_string(),
            CertificationPathProcessingTypes::Strings(v),
        );
    }

    /// `set_extended_key_usage_from_oid_set` is used to set `PS_EXTENDED_KEY_USAGE` items in a
    /// [`CertificationPathSettings`] instance given an ObjectIdentifierSet instead of a Strings object.
    pub fn set_extended_key_usage_from_oid_set(&mut self, v: ObjectIdentifierSet) {
        let s: Strings = v.iter().map(|o| o.to_string()).collect();
        self.0.insert(
            PS_EXTENDED_KEY_USAGE.to_string(),
            CertificationPathProcessingTypes::Strings(s),
        );
    }

    /// `get_extended_key_usage_as_oid_set` is used to retrieve `PS_EXTENDED_KEY_USAGE` items from a
    /// [`CertificationPathSettings`] instance as an ObjectIdentifierSet instead of a Strings object.
    pub fn get_extended_key_usage_as_oid_set(&self) -> Option<ObjectIdentifierSet> {
        let strs = self.get_extended_key_usage()?;
        let mut bts = BTreeSet::new();
        for s in strs {
            if let Ok(oid) = ObjectIdentifier::from_str(s.as_str()) {
                bts.insert(oid);
            }
        }
        Some(bts)
    }
}

cps_gets_and_sets_with_default!(
    PS_EXTENDED_KEY_USAGE_PATH,
    get_extended_key_usage_path,
    set_extended_key_usage_path,
    Bool,
    bool,
    false
);
cps_gets_and_sets_with_default!(
    PS_INITIAL_PATH_LENGTH_CONSTRAINT,
    get_initial_path_length_constraint,
    set_initial_path_length_constraint,
    U8,
    u8,
    PS_MAX_PATH_LENGTH_CONSTRAINT
);
cps_gets_and_sets_with_default!(
    PS_CHECK_REVOCATION_STATUS,
    get_check_revocation_status,
    set_check_revocation_status,
    Bool,
    bool,
    true
);
cps_gets_and_sets_with_default!(
    PS_RELAX_REVOCATION_WHEN_UNAVAILABLE,
    get_relax_revocation_when_unavailable,
    set_relax_revocation_when_unavailable,
    Bool,
    bool,
    false
);
cps_gets_and_sets_with_default!(
    PS_POLICY_QUALIFIERS_REJECTED,
    get_policy_qualifiers_rejected,
    set_policy_qualifiers_rejected,
    Bool,
    bool,
    true
);
cps_gets_and_sets_with_default!(PS_IGNORE_EXPIRED, get_ignore_expired, set_ignore_expired, Bool, bool, false);
cps_gets_and_sets_with_default!(
    PS_USE_VALIDATOR_FILTER_WHEN_BUILDING,
    get_use_validator_filter_when_building,
    set_use_validator_filter_when_building,
    Bool,
    bool,
    true
);

/// `read_settings` accepts the name of a file that notionally contains JSON-encoded
/// [`CertificationPathSettings`] data and returns the deserialized settings.
#[cfg(feature = "std")]
pub fn read_settings(fname: &Path) -> Result<CertificationPathSettings> {
    let json = std::fs::read(fname).map_err(|_| Error::SourceUnavailable)?;
    serde_json::from_slice(&json).map_err(|_| Error::ParseError)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_gets_cps() {
        let cps = CertificationPathSettings::default();

        assert!(!cps.get_initial_explicit_policy_indicator());
        assert!(!cps.get_initial_policy_mapping_inhibit_indicator());
        assert!(!cps.get_initial_inhibit_any_policy_indicator());

        #[cfg(feature = "std")]
        {
            let before = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();
            assert!(cps.get_time_of_interest() >= before.as_secs());
        }
        #[cfg(not(feature = "std"))]
        {
            assert_eq!(cps.get_time_of_interest(), 0);
        }

        assert!(!cps.get_enforce_trust_anchor_constraints());
        assert!(cps.get_enforce_trust_anchor_validity());
        assert!(!cps.get_extended_key_usage_path());
        assert_eq!(
            PS_MAX_PATH_LENGTH_CONSTRAINT,
            cps.get_initial_path_length_constraint()
        );
        assert!(cps.get_check_revocation_status());
        assert!(!cps.get_relax_revocation_when_unavailable());
        assert!(cps.get_policy_qualifiers_rejected());
        assert!(!cps.get_ignore_expired());
        assert!(cps.get_use_validator_filter_when_building());

        assert_eq!(vec![ANY_POLICY.to_string()], cps.get_initial_policy_set());
        let oid_set = cps.get_initial_policy_set_as_oid_set();
        assert!(oid_set.contains(&ANY_POLICY));
    }

    #[test]
    fn test_no_default_gets_cps() {
        let cps = CertificationPathSettings::default();

        assert_eq!(None, cps.get_initial_permitted_subtrees());
        assert_eq!(None, cps.get_initial_excluded_subtrees());
        let mut bufs = BTreeMap::new();
        assert_eq!(
            NameConstraintsSet::default(),
            cps.get_initial_permitted_subtrees_with_default_as_set(&mut bufs)
                .unwrap()
        );
        assert_eq!(
            NameConstraintsSet::default(),
            cps.get_initial_excluded_subtrees_with_default_as_set(&mut bufs)
                .unwrap()
        );
        assert_eq!(None, cps.get_extended_key_usage());
        assert_eq!(None, cps.get_extended_key_usage_as_oid_set());
        assert_eq!(None, cps.get_target_key_usage());
    }

    #[test]
    fn test_sets_cps() {
        use const_oid::db::rfc5912::ID_KP_SERVER_AUTH;

        let mut cps = CertificationPathSettings::default();

        cps.set_initial_explicit_policy_indicator(true);
        assert!(cps.get_initial_explicit_policy_indicator());
        cps.set_initial_policy_mapping_inhibit_indicator(true);
        assert!(cps.get_initial_policy_mapping_inhibit_indicator());
        cps.set_initial_inhibit_any_policy_indicator(true);
        assert!(cps.get_initial_inhibit_any_policy_indicator());

        cps.set_time_of_interest(1672531200);
        assert_eq!(1672531200, cps.get_time_of_interest());

        cps.set_enforce_trust_anchor_constraints(true);
        assert!(cps.get_enforce_trust_anchor_constraints());
        cps.set_enforce_trust_anchor_validity(false);
        assert!(!cps.get_enforce_trust_anchor_validity());

        cps.set_target_key_usage(0x80);
        assert_eq!(Some(0x80), cps.get_target_key_usage());

        cps.set_extended_key_usage(vec![ID_KP_SERVER_AUTH.to_string()]);
        assert_eq!(
            Some(vec![ID_KP_SERVER_AUTH.to_string()]),
            cps.get_extended_key_usage()
        );
        let ekus = cps.get_extended_key_usage_as_oid_set().unwrap();
        assert!(ekus.contains(&ID_KP_SERVER_AUTH));
        let mut cps2 = CertificationPathSettings::default();
        cps2.set_extended_key_usage_from_oid_set(ekus.clone());
        assert_eq!(Some(ekus), cps2.get_extended_key_usage_as_oid_set());

        cps.set_extended_key_usage_path(true);
        assert!(cps.get_extended_key_usage_path());

        cps.set_initial_path_length_constraint(4);
        assert_eq!(4, cps.get_initial_path_length_constraint());

        cps.set_check_revocation_status(false);
        assert!(!cps.get_check_revocation_status());
        cps.set_relax_revocation_when_unavailable(true);
        assert!(cps.get_relax_revocation_when_unavailable());
        cps.set_policy_qualifiers_rejected(false);
        assert!(!cps.get_policy_qualifiers_rejected());
        cps.set_ignore_expired(true);
        assert!(cps.get_ignore_expired());
        cps.set_use_validator_filter_when_building(false);
        assert!(!cps.get_use_validator_filter_when_building());

        let mut policy_set = ObjectIdentifierSet::new();
        policy_set.insert(ANY_POLICY);
        cps.set_initial_policy_set_from_oid_set(policy_set.clone());
        assert_eq!(policy_set, cps.get_initial_policy_set_as_oid_set());
    }

    #[test]
    fn test_subtree_settings() {
        let mut cps = CertificationPathSettings::default();
        cps.set_initial_permitted_subtrees(NameConstraintsSettings {
            directory_name: Some(vec!["CN=Joe,OU=Org Unit,O=Org,C=US".to_string()]),
            rfc822_name: Some(vec!["x@example.com".to_string()]),
            user_principal_name: Some(vec!["1234567890@mil".to_string()]),
            dns_name: Some(vec!["j.example.com".to_string()]),
            uniform_resource_identifier: Some(vec!["https://j.example.com".to_string()]),
            ip_address: None,
            not_supported: None,
        });
        let perm = cps.get_initial_permitted_subtrees().unwrap();
        assert_eq!(Some(vec!["j.example.com".to_string()]), perm.dns_name);
        assert_eq!(Some(vec!["x@example.com".to_string()]), perm.rfc822_name);

        let mut bufs = BTreeMap::new();
        let perm_set = cps
            .get_initial_permitted_subtrees_with_default_as_set(&mut bufs)
            .unwrap();
        assert_eq!(1, perm_set.rfc822_name.len());
        assert_eq!(1, perm_set.dns_name.len());
        assert_eq!(1, perm_set.user_principal_name.len());
        assert_eq!(1, perm_set.directory_name.len());
        assert_eq!(1, perm_set.uniform_resource_identifier.len());

        cps.set_initial_excluded_subtrees(NameConstraintsSettings {
            directory_name: Some(vec!["CN=Sue,OU=Org Unit,O=Org,C=US".to_string()]),
            rfc822_name: None,
            user_principal_name: None,
            dns_name: Some(vec!["s.example.com".to_string()]),
            uniform_resource_identifier: None,
            ip_address: None,
            not_supported: None,
        });
        let excl = cps.get_initial_excluded_subtrees().unwrap();
        assert_eq!(Some(vec!["s.example.com".to_string()]), excl.dns_name);
        let excl_set = cps
            .get_initial_excluded_subtrees_with_default_as_set(&mut bufs)
            .unwrap();
        assert_eq!(1, excl_set.directory_name.len());
        assert_eq!(1, excl_set.dns_name.len());
        assert!(excl_set.rfc822_name.is_empty());

        let mut cps2 = CertificationPathSettings::default();
        cps2.set_initial_permitted_subtrees_from_set(&perm_set).unwrap();
        let round_tripped = cps2.get_initial_permitted_subtrees().unwrap();
        assert_eq!(Some(vec!["j.example.com".to_string()]), round_tripped.dns_name);
    }

    #[cfg(feature = "std")]
    #[test]
    fn test_settings_serde() {
        let mut cps = CertificationPathSettings::default();
        cps.set_initial_explicit_policy_indicator(true);
        cps.set_time_of_interest(1672531200);
        cps.set_initial_path_length_constraint(4);
        cps.set_extended_key_usage(vec!["1.3.6.1.5.5.7.3.1".to_string()]);

        let json = serde_json::to_vec(&cps).unwrap();
        let cps2: CertificationPathSettings = serde_json::from_slice(&json).unwrap();
        assert_eq!(cps, cps2);
    }
}
