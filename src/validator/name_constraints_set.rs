//! Name constraints state tracking for certification path validation

use alloc::{
    collections::BTreeMap,
    string::{String, ToString},
    vec,
    vec::Vec,
};

use serde::{Deserialize, Serialize};

#[cfg(feature = "std")]
use url::Url;

use der::asn1::{Any, Ia5String, ObjectIdentifier, OctetString, PrintableString, Utf8StringRef};
use der::{Decode, Encode, Tag, Tagged};
use subtle_encoding::hex;
use x509_cert::ext::pkix::{
    constraints::name::{GeneralSubtree, GeneralSubtrees},
    name::{GeneralName, OtherName},
    SubjectAltName,
};
use x509_cert::name::Name;

use crate::{buffer_to_hex, util::name_utils::*, Error, Result};

/// Microsoft User Principal Name OID (see <https://docs.microsoft.com/en-us/openspecs/windows_protocols/ms-wcce/ea9ef420-4cbf-44bc-b093-c4175139f90f>)
pub const MSFT_USER_PRINCIPAL_NAME: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.311.20.2.3");

/// [`NameConstraintsSet`] carries the permitted_subtrees and excluded_subtrees state variables
/// defined in [RFC 5280 Section 6.1.2] during certification path validation and is also used to
/// express initial-permitted-subtrees and initial-excluded-subtrees inputs.
///
/// Names are bucketed by form. An empty bucket imposes no constraint for that form. The
/// corresponding `_null` flag is set when an intersection operation yields an empty result, which
/// constrains the form completely. The not_supported bucket accumulates subtrees expressed in name
/// forms that are not evaluated.
///
/// [RFC 5280 Section 6.1.2]: <https://datatracker.ietf.org/doc/html/rfc5280#section-6.1.2>
#[derive(Clone, Debug, Eq, PartialEq, Default)]
pub struct NameConstraintsSet {
    /// user_principal_name governs use of UPN values in otherName instances in SANs
    pub user_principal_name: Vec<GeneralSubtree>,
    /// user_principal_name_null is set to true when an intersection operation yields an empty set
    pub user_principal_name_null: bool,
    /// rfc822_name governs use of email addresses in SANs
    pub rfc822_name: Vec<GeneralSubtree>,
    /// rfc822_name_null is set to true when an intersection operation yields an empty set
    pub rfc822_name_null: bool,
    /// dns_name governs use of DNS names in SANs
    pub dns_name: Vec<GeneralSubtree>,
    /// dns_name_null is set to true when an intersection operation yields an empty set
    pub dns_name_null: bool,
    /// directory_name governs use of DNs in SANs and subject fields
    pub directory_name: Vec<GeneralSubtree>,
    /// directory_name_null is set to true when an intersection operation yields an empty set
    pub directory_name_null: bool,
    /// uniform_resource_identifier governs use of URIs in SANs
    pub uniform_resource_identifier: Vec<GeneralSubtree>,
    /// uniform_resource_identifier_null is set to true when an intersection operation yields an empty set
    pub uniform_resource_identifier_null: bool,
    /// ip_address governs use of IP addresses in SANs, expressed as an address followed by a mask
    /// per [RFC 5280 Section 4.2.1.10]: <https://datatracker.ietf.org/doc/html/rfc5280#section-4.2.1.10>
    pub ip_address: Vec<GeneralSubtree>,
    /// ip_address_null is set to true when an intersection operation yields an empty set
    pub ip_address_null: bool,
    /// not_supported accumulates subtrees expressed in name forms that are not evaluated
    pub not_supported: Vec<GeneralSubtree>,
}

/// Returns the UPN value when the presented name is an otherName bearing the UPN type ID.
fn upn_value(gn: &GeneralName) -> Option<Ia5String> {
    if let GeneralName::OtherName(on) = gn {
        if on.type_id == MSFT_USER_PRINCIPAL_NAME {
            return on.value.decode_as::<Ia5String>().ok();
        }
    }
    None
}

fn has_upn(subtrees: &GeneralSubtrees) -> bool {
    subtrees
        .iter()
        .any(|subtree| upn_value(&subtree.base).is_some())
}

/// Returns true if addr falls within the subnet expressed by constraint, which carries a base
/// address followed by a mask of the same length.
fn ip_in_subtree(constraint: &OctetString, addr: &OctetString) -> bool {
    let c = constraint.as_bytes();
    let a = addr.as_bytes();
    if c.len() != 2 * a.len() || (a.len() != 4 && a.len() != 16) {
        return false;
    }
    let (base, mask) = c.split_at(a.len());
    a.iter().zip(mask).zip(base).all(|((a, m), b)| a & m == b & m)
}

/// Returns true if the subnet expressed by inner is equal to or contained within the subnet
/// expressed by outer. Both values carry a base address followed by a mask of the same length.
fn ip_subtree_within(outer: &OctetString, inner: &OctetString) -> bool {
    let o = outer.as_bytes();
    let i = inner.as_bytes();
    if o.len() != i.len() || (o.len() != 8 && o.len() != 32) {
        return false;
    }
    let half = o.len() / 2;
    let (o_base, o_mask) = o.split_at(half);
    let (i_base, i_mask) = i.split_at(half);
    if !o_mask.iter().zip(i_mask).all(|(o, i)| o & i == *o) {
        return false;
    }
    o_base
        .iter()
        .zip(i_base)
        .zip(o_mask)
        .all(|((o, i), m)| o & m == i & m)
}

/// Intersects one name form bucket with the subtrees from a nameConstraints extension, retaining
/// the narrower of any two related subtrees and setting the null flag when nothing survives.
///
/// The applies callback selects subtrees of the relevant form and within(outer, inner) returns
/// true if inner is subordinate to outer.
fn intersect_form(
    prev: &mut Vec<GeneralSubtree>,
    null: &mut bool,
    new_names: &GeneralSubtrees,
    applies: impl Fn(&GeneralSubtree) -> bool,
    within: impl Fn(&GeneralSubtree, &GeneralSubtree) -> bool,
) {
    let mut new_set = Vec::new();
    for new_name in new_names {
        if !applies(new_name) {
            continue;
        }
        if prev.is_empty() {
            new_set.push(new_name.clone());
        } else {
            for prev_name in prev.iter() {
                if new_name == prev_name {
                    new_set.push(prev_name.clone());
                } else if within(prev_name, new_name) {
                    new_set.push(new_name.clone());
                } else if within(new_name, prev_name) {
                    new_set.push(prev_name.clone());
                }
            }
        }
    }

    if new_set.is_empty() {
        *null = true;
    } else {
        *prev = new_set;
    }
}

impl NameConstraintsSet {
    /// `calculate_intersection` calculates the intersection of self and ext and saves the result
    /// in self, as required when processing permittedSubtrees values.
    pub(crate) fn calculate_intersection(&mut self, ext: &GeneralSubtrees) {
        self.calculate_intersection_dn(ext);
        self.calculate_intersection_rfc822(ext);
        self.calculate_intersection_dns_name(ext);
        self.calculate_intersection_uri(ext);
        self.calculate_intersection_upn(ext);
        self.calculate_intersection_ip(ext);
    }

    /// `calculate_union` calculates the union of self and ext and saves the result in self, as
    /// required when processing excludedSubtrees values.
    pub(crate) fn calculate_union(&mut self, ext: &GeneralSubtrees) {
        for subtree in ext {
            // buckets that have gone null stay null
            match &subtree.base {
                GeneralName::Rfc822Name(_) => {
                    #[cfg(feature = "std")]
                    if !self.rfc822_name_null {
                        self.rfc822_name.push(subtree.clone());
                    }
                    #[cfg(not(feature = "std"))]
                    {
                        self.rfc822_name_null = true;
                    }
                }
                GeneralName::DnsName(_) => {
                    #[cfg(feature = "std")]
                    if !self.dns_name_null {
                        self.dns_name.push(subtree.clone());
                    }
                    #[cfg(not(feature = "std"))]
                    {
                        self.dns_name_null = true;
                    }
                }
                GeneralName::DirectoryName(_) => {
                    if !self.directory_name_null {
                        self.directory_name.push(subtree.clone());
                    }
                }
                GeneralName::UniformResourceIdentifier(_) => {
                    #[cfg(feature = "std")]
                    if !self.uniform_resource_identifier_null {
                        self.uniform_resource_identifier.push(subtree.clone());
                    }
                    #[cfg(not(feature = "std"))]
                    {
                        self.uniform_resource_identifier_null = true;
                    }
                }
                GeneralName::OtherName(on) if on.type_id == MSFT_USER_PRINCIPAL_NAME => {
                    #[cfg(feature = "std")]
                    if !self.user_principal_name_null {
                        self.user_principal_name.push(subtree.clone());
                    }
                    #[cfg(not(feature = "std"))]
                    {
                        self.user_principal_name_null = true;
                    }
                }
                GeneralName::IpAddress(_) => {
                    if !self.ip_address_null {
                        self.ip_address.push(subtree.clone());
                    }
                }
                // x400Address, ediPartyName, registeredID and non-UPN otherNames are not evaluated
                _ => {
                    self.not_supported.push(subtree.clone());
                }
            }
        }
    }

    /// `are_any_empty` returns true if any bucket has been rendered null by an intersection
    /// operation.
    pub fn are_any_empty(&self) -> bool {
        self.user_principal_name_null
            || self.rfc822_name_null
            || self.dns_name_null
            || self.directory_name_null
            || self.uniform_resource_identifier_null
            || self.ip_address_null
    }

    /// `subject_within_permitted_subtrees` returns true if subject is within at least one
    /// permitted directory name subtree known to self or if no directory name constraint is
    /// operative. NULL subjects are unconstrained.
    pub fn subject_within_permitted_subtrees(&self, subject: &Name) -> bool {
        if subject.0.is_empty() {
            return true;
        }

        if self.directory_name_null {
            return false;
        }

        if self.directory_name.is_empty() {
            return true;
        }

        self.directory_name.iter().any(|gs| match &gs.base {
            GeneralName::DirectoryName(dn_state) => {
                descended_from_dn(dn_state, subject, gs.minimum, gs.maximum)
            }
            _ => false,
        })
    }

    /// `subject_within_excluded_subtrees` returns true if subject is within at least one excluded
    /// directory name subtree known to self.
    pub fn subject_within_excluded_subtrees(&self, subject: &Name) -> bool {
        if subject.0.is_empty() || self.directory_name_null {
            return false;
        }

        self.directory_name.iter().any(|gs| match &gs.base {
            GeneralName::DirectoryName(dn_state) => {
                descended_from_dn(dn_state, subject, gs.minimum, gs.maximum)
            }
            _ => false,
        })
    }

    /// `san_within_permitted_subtrees` returns true if every constrained name in san is within at
    /// least one permitted subtree known to self. RFC822, DNS, URI and UPN constraints cannot be
    /// evaluated without std support and fail when operative.
    pub fn san_within_permitted_subtrees(&self, san: &Option<&SubjectAltName>) -> bool {
        let san = match san {
            Some(san) => san,
            None => return true,
        };

        for general_name in san.0.iter() {
            match general_name {
                GeneralName::DirectoryName(dn_san) => {
                    if self.directory_name_null {
                        return false;
                    }
                    if !self.directory_name.is_empty()
                        && !self.directory_name.iter().any(|gs| match &gs.base {
                            GeneralName::DirectoryName(dn_state) => {
                                descended_from_dn(dn_state, dn_san, gs.minimum, gs.maximum)
                            }
                            _ => false,
                        })
                    {
                        return false;
                    }
                }
                #[allow(unused_variables)]
                GeneralName::Rfc822Name(rfc822_san) => {
                    if self.rfc822_name_null {
                        return false;
                    }
                    if !self.rfc822_name.is_empty() {
                        #[cfg(not(feature = "std"))]
                        return false;
                        #[cfg(feature = "std")]
                        if !self.rfc822_name.iter().any(|gs| match &gs.base {
                            GeneralName::Rfc822Name(rfc822_state) => {
                                descended_from_rfc822(rfc822_state, rfc822_san)
                            }
                            _ => false,
                        }) {
                            return false;
                        }
                    }
                }
                #[allow(unused_variables)]
                GeneralName::DnsName(dns_san) => {
                    if self.dns_name_null {
                        return false;
                    }
                    if !self.dns_name.is_empty() {
                        #[cfg(not(feature = "std"))]
                        return false;
                        #[cfg(feature = "std")]
                        if !self.dns_name.iter().any(|gs| match &gs.base {
                            GeneralName::DnsName(dns_state) => {
                                descended_from_host(dns_state, dns_san.as_str(), false)
                            }
                            _ => false,
                        }) {
                            return false;
                        }
                    }
                }
                #[allow(unused_variables)]
                GeneralName::UniformResourceIdentifier(uri_san) => {
                    if self.uniform_resource_identifier_null {
                        return false;
                    }
                    if !self.uniform_resource_identifier.is_empty() {
                        #[cfg(not(feature = "std"))]
                        return false;
                        #[cfg(feature = "std")]
                        {
                            let host = match Url::parse(uri_san.as_str()) {
                                Ok(url) => match url.host() {
                                    Some(host) => host.to_string(),
                                    None => return false,
                                },
                                Err(_) => return false,
                            };
                            if !self
                                .uniform_resource_identifier
                                .iter()
                                .any(|gs| match &gs.base {
                                    GeneralName::UniformResourceIdentifier(uri_state) => {
                                        descended_from_host(uri_state, host.as_str(), true)
                                    }
                                    _ => false,
                                })
                            {
                                return false;
                            }
                        }
                    }
                }
                GeneralName::OtherName(on) if on.type_id == MSFT_USER_PRINCIPAL_NAME => {
                    if self.user_principal_name_null {
                        return false;
                    }
                    if !self.user_principal_name.is_empty() {
                        #[cfg(not(feature = "std"))]
                        return false;
                        #[cfg(feature = "std")]
                        {
                            let upn_san = match on.value.decode_as::<Ia5String>() {
                                Ok(upn) => upn,
                                Err(_) => return false,
                            };
                            if !self
                                .user_principal_name
                                .iter()
                                .any(|gs| match upn_value(&gs.base) {
                                    Some(upn_state) => {
                                        descended_from_rfc822(&upn_state, &upn_san)
                                    }
                                    None => false,
                                })
                            {
                                return false;
                            }
                        }
                    }
                }
                GeneralName::IpAddress(ip_san) => {
                    if self.ip_address_null {
                        return false;
                    }
                    if !self.ip_address.is_empty()
                        && !self.ip_address.iter().any(|gs| match &gs.base {
                            GeneralName::IpAddress(ip_state) => ip_in_subtree(ip_state, ip_san),
                            _ => false,
                        })
                    {
                        return false;
                    }
                }
                // names in unconstrained forms get a free pass
                _ => {}
            }
        }
        true
    }

    /// `san_within_excluded_subtrees` returns true if any name in san is within at least one
    /// excluded subtree known to self.
    pub fn san_within_excluded_subtrees(&self, san: &Option<&SubjectAltName>) -> bool {
        let san = match san {
            Some(san) => san,
            None => return false,
        };

        for general_name in san.0.iter() {
            match general_name {
                GeneralName::DirectoryName(dn_san) => {
                    if self.directory_name_null {
                        return true;
                    }
                    if self.directory_name.iter().any(|gs| match &gs.base {
                        GeneralName::DirectoryName(dn_state) => {
                            descended_from_dn(dn_state, dn_san, gs.minimum, gs.maximum)
                        }
                        _ => false,
                    }) {
                        return true;
                    }
                }
                #[allow(unused_variables)]
                GeneralName::Rfc822Name(rfc822_san) => {
                    if self.rfc822_name_null {
                        return true;
                    }
                    #[cfg(feature = "std")]
                    if self.rfc822_name.iter().any(|gs| match &gs.base {
                        GeneralName::Rfc822Name(rfc822_state) => {
                            descended_from_rfc822(rfc822_state, rfc822_san)
                        }
                        _ => false,
                    }) {
                        return true;
                    }
                }
                #[allow(unused_variables)]
                GeneralName::DnsName(dns_san) => {
                    if self.dns_name_null {
                        return true;
                    }
                    #[cfg(feature = "std")]
                    if self.dns_name.iter().any(|gs| match &gs.base {
                        GeneralName::DnsName(dns_state) => {
                            descended_from_host(dns_state, dns_san.as_str(), false)
                        }
                        _ => false,
                    }) {
                        return true;
                    }
                }
                #[allow(unused_variables)]
                GeneralName::UniformResourceIdentifier(uri_san) => {
                    if self.uniform_resource_identifier_null {
                        return true;
                    }
                    #[cfg(feature = "std")]
                    if let Ok(url) = Url::parse(uri_san.as_str()) {
                        if let Some(host) = url.host() {
                            let host = host.to_string();
                            if self
                                .uniform_resource_identifier
                                .iter()
                                .any(|gs| match &gs.base {
                                    GeneralName::UniformResourceIdentifier(uri_state) => {
                                        descended_from_host(uri_state, host.as_str(), true)
                                    }
                                    _ => false,
                                })
                            {
                                return true;
                            }
                        }
                    }
                }
                GeneralName::OtherName(on) if on.type_id == MSFT_USER_PRINCIPAL_NAME => {
                    if self.user_principal_name_null {
                        return true;
                    }
                    #[cfg(feature = "std")]
                    if let Ok(upn_san) = on.value.decode_as::<Ia5String>() {
                        if self
                            .user_principal_name
                            .iter()
                            .any(|gs| match upn_value(&gs.base) {
                                Some(upn_state) => descended_from_rfc822(&upn_state, &upn_san),
                                None => false,
                            })
                        {
                            return true;
                        }
                    }
                }
                GeneralName::IpAddress(ip_san) => {
                    if self.ip_address_null {
                        return true;
                    }
                    if self.ip_address.iter().any(|gs| match &gs.base {
                        GeneralName::IpAddress(ip_state) => ip_in_subtree(ip_state, ip_san),
                        _ => false,
                    }) {
                        return true;
                    }
                }
                _ => {}
            }
        }
        false
    }

    fn calculate_intersection_dn(&mut self, new_names: &GeneralSubtrees) {
        if self.directory_name_null || !has_dn(new_names) {
            return;
        }

        intersect_form(
            &mut self.directory_name,
            &mut self.directory_name_null,
            new_names,
            |gs| matches!(gs.base, GeneralName::DirectoryName(_)),
            |outer, inner| match (&outer.base, &inner.base) {
                (GeneralName::DirectoryName(o), GeneralName::DirectoryName(i)) => {
                    descended_from_dn(o, i, outer.minimum, outer.maximum)
                }
                _ => false,
            },
        );
    }

    fn calculate_intersection_rfc822(&mut self, new_names: &GeneralSubtrees) {
        if self.rfc822_name_null || !has_rfc822(new_names) {
            return;
        }

        #[cfg(not(feature = "std"))]
        {
            self.rfc822_name_null = true;
        }

        #[cfg(feature = "std")]
        intersect_form(
            &mut self.rfc822_name,
            &mut self.rfc822_name_null,
            new_names,
            |gs| matches!(gs.base, GeneralName::Rfc822Name(_)),
            |outer, inner| match (&outer.base, &inner.base) {
                (GeneralName::Rfc822Name(o), GeneralName::Rfc822Name(i)) => {
                    descended_from_rfc822(o, i)
                }
                _ => false,
            },
        );
    }

    fn calculate_intersection_dns_name(&mut self, new_names: &GeneralSubtrees) {
        if self.dns_name_null || !has_dns_name(new_names) {
            return;
        }

        #[cfg(not(feature = "std"))]
        {
            self.dns_name_null = true;
        }

        #[cfg(feature = "std")]
        intersect_form(
            &mut self.dns_name,
            &mut self.dns_name_null,
            new_names,
            |gs| matches!(gs.base, GeneralName::DnsName(_)),
            |outer, inner| match (&outer.base, &inner.base) {
                (GeneralName::DnsName(o), GeneralName::DnsName(i)) => {
                    descended_from_host(o, i.as_str(), false)
                }
                _ => false,
            },
        );
    }

    fn calculate_intersection_uri(&mut self, new_names: &GeneralSubtrees) {
        if self.uniform_resource_identifier_null || !has_uri(new_names) {
            return;
        }

        #[cfg(not(feature = "std"))]
        {
            self.uniform_resource_identifier_null = true;
        }

        #[cfg(feature = "std")]
        intersect_form(
            &mut self.uniform_resource_identifier,
            &mut self.uniform_resource_identifier_null,
            new_names,
            |gs| matches!(gs.base, GeneralName::UniformResourceIdentifier(_)),
            |outer, inner| match (&outer.base, &inner.base) {
                (
                    GeneralName::UniformResourceIdentifier(o),
                    GeneralName::UniformResourceIdentifier(i),
                ) => descended_from_host(o, i.as_str(), true),
                _ => false,
            },
        );
    }

    fn calculate_intersection_upn(&mut self, new_names: &GeneralSubtrees) {
        if self.user_principal_name_null || !has_upn(new_names) {
            return;
        }

        #[cfg(not(feature = "std"))]
        {
            self.user_principal_name_null = true;
        }

        #[cfg(feature = "std")]
        intersect_form(
            &mut self.user_principal_name,
            &mut self.user_principal_name_null,
            new_names,
            |gs| upn_value(&gs.base).is_some(),
            |outer, inner| match (upn_value(&outer.base), upn_value(&inner.base)) {
                (Some(o), Some(i)) => descended_from_rfc822(&o, &i),
                _ => false,
            },
        );
    }

    fn calculate_intersection_ip(&mut self, new_names: &GeneralSubtrees) {
        if self.ip_address_null || !has_ip_address(new_names) {
            return;
        }

        intersect_form(
            &mut self.ip_address,
            &mut self.ip_address_null,
            new_names,
            |gs| matches!(gs.base, GeneralName::IpAddress(_)),
            |outer, inner| match (&outer.base, &inner.base) {
                (GeneralName::IpAddress(o), GeneralName::IpAddress(i)) => ip_subtree_within(o, i),
                _ => false,
            },
        );
    }
}

/// NameConstraintsSettings is a serializable equivalent of [`NameConstraintsSet`]. The subtree
/// getters and setters on CertificationPathSettings translate between the two.
///
/// IP address values are ASCII hex encodings of an address followed by a mask, i.e., eight octets
/// for IPv4 and thirty-two for IPv6. The not_supported field carries ASCII hex encodings of DER
/// encoded GeneralSubtree values.
#[derive(Clone, Debug, Eq, PartialEq, Default, Serialize, Deserialize)]
pub struct NameConstraintsSettings {
    /// user_principal_name governs use of UPN values in otherName instances in SANs
    pub user_principal_name: Option<Vec<String>>,
    /// rfc822_name governs use of email addresses in SANs
    pub rfc822_name: Option<Vec<String>>,
    /// dns_name governs use of DNS names in SANs
    pub dns_name: Option<Vec<String>>,
    /// directory_name governs use of DNs in SANs and subject fields
    pub directory_name: Option<Vec<String>>,
    /// uniform_resource_identifier governs use of URIs in SANs
    pub uniform_resource_identifier: Option<Vec<String>>,
    /// ip_address governs use of IP addresses in SANs
    pub ip_address: Option<Vec<String>>,
    /// not_supported carries name forms that are relayed but not evaluated
    pub not_supported: Option<Vec<String>>,
}

fn ia5_subtree(value: &str, form: fn(Ia5String) -> GeneralName) -> Result<Vec<u8>> {
    let any = Any::new(Tag::Ia5String, value.as_bytes())?;
    let ia5 = Ia5String::try_from(&any)?;
    let gs = GeneralSubtree {
        base: form(ia5),
        minimum: 0,
        maximum: None,
    };
    Ok(gs.to_der()?)
}

fn encode_ia5_subtrees(
    names: &Option<Vec<String>>,
    form: fn(Ia5String) -> GeneralName,
) -> Result<Vec<Vec<u8>>> {
    let mut encoded = vec![];
    if let Some(names) = names {
        for name in names {
            encoded.push(ia5_subtree(name.as_str(), form)?);
        }
    }
    Ok(encoded)
}

fn encode_dn_subtrees(names: &Option<Vec<String>>) -> Result<Vec<Vec<u8>>> {
    let mut encoded = vec![];
    if let Some(names) = names {
        for name in names {
            let enc_dn = encode_dn_from_string(name.as_str())?;
            let gs = GeneralSubtree {
                base: GeneralName::DirectoryName(Name::from_der(enc_dn.as_slice())?),
                minimum: 0,
                maximum: None,
            };
            encoded.push(gs.to_der()?);
        }
    }
    Ok(encoded)
}

fn encode_upn_subtrees(names: &Option<Vec<String>>) -> Result<Vec<Vec<u8>>> {
    let mut encoded = vec![];
    if let Some(names) = names {
        for name in names {
            let gs = GeneralSubtree {
                base: GeneralName::OtherName(OtherName {
                    type_id: MSFT_USER_PRINCIPAL_NAME,
                    value: Any::new(Tag::Ia5String, name.as_bytes())?,
                }),
                minimum: 0,
                maximum: None,
            };
            encoded.push(gs.to_der()?);
        }
    }
    Ok(encoded)
}

fn encode_ip_subtrees(names: &Option<Vec<String>>) -> Result<Vec<Vec<u8>>> {
    let mut encoded = vec![];
    if let Some(names) = names {
        for name in names {
            let bytes = hex::decode_upper(name).map_err(|_| Error::ParseError)?;
            if bytes.len() != 8 && bytes.len() != 32 {
                return Err(Error::LengthError);
            }
            let gs = GeneralSubtree {
                base: GeneralName::IpAddress(OctetString::new(bytes)?),
                minimum: 0,
                maximum: None,
            };
            encoded.push(gs.to_der()?);
        }
    }
    Ok(encoded)
}

fn encode_raw_subtrees(names: &Option<Vec<String>>) -> Vec<Vec<u8>> {
    let mut encoded = vec![];
    if let Some(names) = names {
        for name in names {
            if let Ok(buf) = hex::decode_upper(name) {
                encoded.push(buf);
            }
        }
    }
    encoded
}

fn decode_subtrees(bufs: &[Vec<u8>]) -> Result<Vec<GeneralSubtree>> {
    let mut subtrees = vec![];
    for buf in bufs {
        subtrees.push(GeneralSubtree::from_der(buf.as_slice())?);
    }
    Ok(subtrees)
}

/// `name_constraints_settings_to_name_constraints_set` prepares a [`NameConstraintsSet`] from a
/// [`NameConstraintsSettings`], using bufs to receive the DER encoded subtrees.
pub(crate) fn name_constraints_settings_to_name_constraints_set(
    settings: &NameConstraintsSettings,
    bufs: &mut BTreeMap<String, Vec<Vec<u8>>>,
) -> Result<NameConstraintsSet> {
    bufs.insert(
        "upn".to_string(),
        encode_upn_subtrees(&settings.user_principal_name)?,
    );
    bufs.insert(
        "rfc822".to_string(),
        encode_ia5_subtrees(&settings.rfc822_name, GeneralName::Rfc822Name)?,
    );
    bufs.insert(
        "dns".to_string(),
        encode_ia5_subtrees(&settings.dns_name, GeneralName::DnsName)?,
    );
    bufs.insert(
        "dn".to_string(),
        encode_dn_subtrees(&settings.directory_name)?,
    );
    bufs.insert(
        "uri".to_string(),
        encode_ia5_subtrees(
            &settings.uniform_resource_identifier,
            GeneralName::UniformResourceIdentifier,
        )?,
    );
    bufs.insert("ip".to_string(), encode_ip_subtrees(&settings.ip_address)?);
    bufs.insert(
        "not_supported".to_string(),
        encode_raw_subtrees(&settings.not_supported),
    );

    Ok(NameConstraintsSet {
        user_principal_name: decode_subtrees(&bufs["upn"])?,
        user_principal_name_null: false,
        rfc822_name: decode_subtrees(&bufs["rfc822"])?,
        rfc822_name_null: false,
        dns_name: decode_subtrees(&bufs["dns"])?,
        dns_name_null: false,
        directory_name: decode_subtrees(&bufs["dn"])?,
        directory_name_null: false,
        uniform_resource_identifier: decode_subtrees(&bufs["uri"])?,
        uniform_resource_identifier_null: false,
        ip_address: decode_subtrees(&bufs["ip"])?,
        ip_address_null: false,
        not_supported: decode_subtrees(&bufs["not_supported"])?,
    })
}

/// `name_constraints_set_to_name_constraints_settings` prepares a serializable
/// [`NameConstraintsSettings`] from a [`NameConstraintsSet`].
pub(crate) fn name_constraints_set_to_name_constraints_settings(
    set: &NameConstraintsSet,
) -> Result<NameConstraintsSettings> {
    let mut settings = NameConstraintsSettings::default();

    if !set.user_principal_name.is_empty() {
        let mut values = vec![];
        for gs in &set.user_principal_name {
            if let GeneralName::OtherName(on) = &gs.base {
                if on.type_id != MSFT_USER_PRINCIPAL_NAME {
                    continue;
                }
                if on.value.tag() == Tag::Ia5String {
                    if let Ok(ia5) = on.value.decode_as::<Ia5String>() {
                        values.push(ia5.to_string());
                    }
                } else if on.value.tag() == Tag::Utf8String {
                    if let Ok(utf8) = on.value.decode_as::<Utf8StringRef<'_>>() {
                        values.push(utf8.to_string());
                    }
                } else if on.value.tag() == Tag::PrintableString {
                    if let Ok(ps) = on.value.decode_as::<PrintableString>() {
                        values.push(ps.to_string());
                    }
                }
            }
        }
        settings.user_principal_name = Some(values);
    }

    if !set.rfc822_name.is_empty() {
        let mut values = vec![];
        for gs in &set.rfc822_name {
            if let GeneralName::Rfc822Name(rfc822) = &gs.base {
                values.push(rfc822.to_string());
            }
        }
        settings.rfc822_name = Some(values);
    }

    if !set.dns_name.is_empty() {
        let mut values = vec![];
        for gs in &set.dns_name {
            if let GeneralName::DnsName(dns) = &gs.base {
                values.push(dns.to_string());
            }
        }
        settings.dns_name = Some(values);
    }

    if !set.directory_name.is_empty() {
        let mut values = vec![];
        for gs in &set.directory_name {
            if let GeneralName::DirectoryName(dn) = &gs.base {
                values.push(name_to_string(dn));
            }
        }
        settings.directory_name = Some(values);
    }

    if !set.uniform_resource_identifier.is_empty() {
        let mut values = vec![];
        for gs in &set.uniform_resource_identifier {
            if let GeneralName::UniformResourceIdentifier(uri) = &gs.base {
                values.push(uri.to_string());
            }
        }
        settings.uniform_resource_identifier = Some(values);
    }

    if !set.ip_address.is_empty() {
        let mut values = vec![];
        for gs in &set.ip_address {
            if let GeneralName::IpAddress(ip) = &gs.base {
                values.push(buffer_to_hex(ip.as_bytes()));
            }
        }
        settings.ip_address = Some(values);
    }

    if !set.not_supported.is_empty() {
        let mut values = vec![];
        for gs in &set.not_supported {
            values.push(buffer_to_hex(gs.to_der()?.as_slice()));
        }
        settings.not_supported = Some(values);
    }

    Ok(settings)
}

#[test]
fn intersection_and_union_tests() {
    use crate::validator::path_settings::CertificationPathSettings;

    let joe = NameConstraintsSettings {
        directory_name: Some(vec!["CN=Joe,OU=Org Unit,O=Org,C=US".to_string()]),
        rfc822_name: Some(vec!["x@example.com".to_string()]),
        user_principal_name: Some(vec!["1234567890@mil".to_string()]),
        dns_name: Some(vec!["j.example.com".to_string()]),
        uniform_resource_identifier: Some(vec!["https://j.example.com".to_string()]),
        ip_address: None,
        not_supported: None,
    };
    let sue = NameConstraintsSettings {
        directory_name: Some(vec!["CN=Sue,OU=Org Unit,O=Org,C=US".to_string()]),
        rfc822_name: Some(vec!["y@example.com".to_string()]),
        user_principal_name: Some(vec!["0987654321@mil".to_string()]),
        dns_name: Some(vec!["s.example.com".to_string()]),
        uniform_resource_identifier: Some(vec!["https://s.example.com".to_string()]),
        ip_address: None,
        not_supported: None,
    };
    let abe = NameConstraintsSettings {
        directory_name: Some(vec!["CN=Abe,OU=Org Unit,O=Org,C=US".to_string()]),
        rfc822_name: Some(vec!["z@example.com".to_string()]),
        user_principal_name: Some(vec!["1236547890@mil".to_string()]),
        dns_name: Some(vec!["t.example.com".to_string()]),
        uniform_resource_identifier: Some(vec!["https://t.example.com".to_string()]),
        ip_address: None,
        not_supported: None,
    };

    let mut cps = CertificationPathSettings::default();
    cps.set_initial_permitted_subtrees(joe.clone());
    assert_eq!(Some(joe.clone()), cps.get_initial_permitted_subtrees());

    let mut bufs1 = BTreeMap::new();
    let mut joe_set = cps
        .get_initial_permitted_subtrees_with_default_as_set(&mut bufs1)
        .unwrap();
    let round_trip = name_constraints_set_to_name_constraints_settings(&joe_set).unwrap();
    assert_eq!(round_trip, joe);

    let mut bufs2 = BTreeMap::new();
    let sue_set = name_constraints_settings_to_name_constraints_set(&sue, &mut bufs2).unwrap();
    let mut bufs3 = BTreeMap::new();
    let abe_set = name_constraints_settings_to_name_constraints_set(&abe, &mut bufs3).unwrap();

    assert_eq!(1, joe_set.directory_name.len());
    joe_set.calculate_union(&sue_set.directory_name);
    assert_eq!(2, joe_set.directory_name.len());

    assert!(!joe_set.directory_name_null);
    joe_set.calculate_intersection(&sue_set.directory_name);
    assert_eq!(1, joe_set.directory_name.len());
    joe_set.calculate_intersection(&abe_set.directory_name);
    assert!(joe_set.directory_name_null);
    assert!(joe_set.are_any_empty());

    #[cfg(feature = "std")]
    {
        assert_eq!(1, joe_set.rfc822_name.len());
        joe_set.calculate_union(&sue_set.rfc822_name);
        assert_eq!(2, joe_set.rfc822_name.len());
        joe_set.calculate_intersection(&sue_set.rfc822_name);
        assert_eq!(1, joe_set.rfc822_name.len());
        joe_set.calculate_intersection(&abe_set.rfc822_name);
        assert!(joe_set.rfc822_name_null);

        assert_eq!(1, joe_set.dns_name.len());
        joe_set.calculate_union(&sue_set.dns_name);
        assert_eq!(2, joe_set.dns_name.len());
        joe_set.calculate_intersection(&sue_set.dns_name);
        assert_eq!(1, joe_set.dns_name.len());
        joe_set.calculate_intersection(&abe_set.dns_name);
        assert!(joe_set.dns_name_null);

        assert_eq!(1, joe_set.uniform_resource_identifier.len());
        joe_set.calculate_union(&sue_set.uniform_resource_identifier);
        assert_eq!(2, joe_set.uniform_resource_identifier.len());
        joe_set.calculate_intersection(&sue_set.uniform_resource_identifier);
        assert_eq!(1, joe_set.uniform_resource_identifier.len());
        joe_set.calculate_intersection(&abe_set.uniform_resource_identifier);
        assert!(joe_set.uniform_resource_identifier_null);

        assert_eq!(1, joe_set.user_principal_name.len());
        joe_set.calculate_union(&sue_set.user_principal_name);
        assert_eq!(2, joe_set.user_principal_name.len());
        joe_set.calculate_intersection(&sue_set.user_principal_name);
        assert_eq!(1, joe_set.user_principal_name.len());
        joe_set.calculate_intersection(&abe_set.user_principal_name);
        assert!(joe_set.user_principal_name_null);
    }

    let mut cps2 = CertificationPathSettings::default();
    cps2.set_initial_excluded_subtrees_from_set(&abe_set).unwrap();
    let mut bufs4 = BTreeMap::new();
    let abe_copy = cps2
        .get_initial_excluded_subtrees_with_default_as_set(&mut bufs4)
        .unwrap();
    assert_eq!(abe_set, abe_copy);
}

#[test]
fn ip_constraint_tests() {
    // 192.168.0.0/16
    let constraints = NameConstraintsSettings {
        ip_address: Some(vec!["C0A80000FFFF0000".to_string()]),
        ..Default::default()
    };
    let mut bufs = BTreeMap::new();
    let mut set =
        name_constraints_settings_to_name_constraints_set(&constraints, &mut bufs).unwrap();
    assert_eq!(1, set.ip_address.len());

    let round_trip = name_constraints_set_to_name_constraints_settings(&set).unwrap();
    assert_eq!(round_trip, constraints);

    let inside = OctetString::new(vec![0xC0, 0xA8, 0x01, 0x02]).unwrap();
    let outside = OctetString::new(vec![0x0A, 0x00, 0x00, 0x01]).unwrap();
    let san_inside = SubjectAltName(vec![GeneralName::IpAddress(inside)]);
    let san_outside = SubjectAltName(vec![GeneralName::IpAddress(outside)]);
    assert!(set.san_within_permitted_subtrees(&Some(&san_inside)));
    assert!(!set.san_within_permitted_subtrees(&Some(&san_outside)));
    assert!(set.san_within_excluded_subtrees(&Some(&san_inside)));
    assert!(!set.san_within_excluded_subtrees(&Some(&san_outside)));

    // a v6 address is not constrained by a v4 subtree
    let v6 = OctetString::new(vec![0x20, 0x01, 0x0D, 0xB8].repeat(4)).unwrap();
    let san_v6 = SubjectAltName(vec![GeneralName::IpAddress(v6)]);
    assert!(!set.san_within_permitted_subtrees(&Some(&san_v6)));

    // 10.0.0.0/8
    let ten = NameConstraintsSettings {
        ip_address: Some(vec!["0A000000FF000000".to_string()]),
        ..Default::default()
    };
    let mut bufs2 = BTreeMap::new();
    let ten_set = name_constraints_settings_to_name_constraints_set(&ten, &mut bufs2).unwrap();
    set.calculate_union(&ten_set.ip_address);
    assert_eq!(2, set.ip_address.len());

    // 192.168.1.0/24 narrows the /16
    let narrower = NameConstraintsSettings {
        ip_address: Some(vec!["C0A80100FFFFFF00".to_string()]),
        ..Default::default()
    };
    let mut bufs3 = BTreeMap::new();
    let narrower_set =
        name_constraints_settings_to_name_constraints_set(&narrower, &mut bufs3).unwrap();
    set.calculate_intersection(&narrower_set.ip_address);
    assert_eq!(1, set.ip_address.len());
    assert!(!set.ip_address_null);

    // 172.16.0.0/16 is disjoint from the surviving /24
    let disjoint = NameConstraintsSettings {
        ip_address: Some(vec!["AC100000FFFF0000".to_string()]),
        ..Default::default()
    };
    let mut bufs4 = BTreeMap::new();
    let disjoint_set =
        name_constraints_settings_to_name_constraints_set(&disjoint, &mut bufs4).unwrap();
    set.calculate_intersection(&disjoint_set.ip_address);
    assert!(set.ip_address_null);
    assert!(set.are_any_empty());
}

#[test]
fn subject_subtree_tests() {
    use core::str::FromStr;

    let constraints = NameConstraintsSettings {
        directory_name: Some(vec!["O=Org,C=US".to_string()]),
        ..Default::default()
    };
    let mut bufs = BTreeMap::new();
    let set = name_constraints_settings_to_name_constraints_set(&constraints, &mut bufs).unwrap();

    let inside = Name::from_str("CN=Joe,OU=Org Unit,O=Org,C=US").unwrap();
    let outside = Name::from_str("CN=Joe,O=Other,C=US").unwrap();
    let empty = Name::from_der(&[0x30, 0x00]).unwrap();
    assert!(set.subject_within_permitted_subtrees(&inside));
    assert!(!set.subject_within_permitted_subtrees(&outside));
    assert!(set.subject_within_excluded_subtrees(&inside));
    assert!(!set.subject_within_excluded_subtrees(&outside));
    assert!(set.subject_within_permitted_subtrees(&empty));
    assert!(!set.subject_within_excluded_subtrees(&empty));

    let san_inside = SubjectAltName(vec![GeneralName::DirectoryName(inside.clone())]);
    assert!(set.san_within_permitted_subtrees(&Some(&san_inside)));
    assert!(set.san_within_excluded_subtrees(&Some(&san_inside)));
    assert!(set.san_within_permitted_subtrees(&None));
    assert!(!set.san_within_excluded_subtrees(&None));

    #[cfg(feature = "std")]
    {
        let dns_constraints = NameConstraintsSettings {
            dns_name: Some(vec!["example.com".to_string()]),
            ..Default::default()
        };
        let mut bufs = BTreeMap::new();
        let dns_set =
            name_constraints_settings_to_name_constraints_set(&dns_constraints, &mut bufs)
                .unwrap();
        let good = Ia5String::new("mail.example.com").unwrap();
        let bad = Ia5String::new("mail.example.org").unwrap();
        let san_good = SubjectAltName(vec![GeneralName::DnsName(good.clone())]);
        let san_mixed = SubjectAltName(vec![
            GeneralName::DnsName(good),
            GeneralName::DnsName(bad),
        ]);
        assert!(dns_set.san_within_permitted_subtrees(&Some(&san_good)));

        // every constrained name must be permitted, one stray DNS name fails the whole SAN
        assert!(!dns_set.san_within_permitted_subtrees(&Some(&san_mixed)));
        assert!(dns_set.san_within_excluded_subtrees(&Some(&san_mixed)));
    }
}

#[test]
fn malformed_settings_tests() {
    let bad_hex = NameConstraintsSettings {
        ip_address: Some(vec!["not hex".to_string()]),
        ..Default::default()
    };
    let mut bufs = BTreeMap::new();
    assert!(name_constraints_settings_to_name_constraints_set(&bad_hex, &mut bufs).is_err());

    let bad_len = NameConstraintsSettings {
        ip_address: Some(vec!["C0A80000".to_string()]),
        ..Default::default()
    };
    let mut bufs = BTreeMap::new();
    assert_eq!(
        Err(Error::LengthError),
        name_constraints_settings_to_name_constraints_set(&bad_len, &mut bufs)
    );

    let bad_dn = NameConstraintsSettings {
        directory_name: Some(vec!["not a name".to_string()]),
        ..Default::default()
    };
    let mut bufs = BTreeMap::new();
    assert!(name_constraints_settings_to_name_constraints_set(&bad_dn, &mut bufs).is_err());
}
