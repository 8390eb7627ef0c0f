#![cfg(feature = "std")]

use certpath::CertificationPathSettings;
use certpath::NameConstraintsSettings;
use const_oid::db::rfc5280::ANY_POLICY;
use x509_cert::ext::pkix::KeyUsages;

#[test]
fn path_settings_serialize_deserialize() {
    let ps = CertificationPathSettings::default();
    let json_ps = serde_json::to_string(&ps).unwrap();
    let ps_de = serde_json::from_slice(json_ps.as_bytes()).unwrap();
    assert_eq!(ps, ps_de);
}

#[test]
fn settings_serialization_test() {
    use const_oid::db::rfc5280::ID_KP_SERVER_AUTH;
    use std::time::{SystemTime, UNIX_EPOCH};

    let mut cps = CertificationPathSettings::new();
    cps.set_initial_explicit_policy_indicator(true);
    cps.set_initial_policy_mapping_inhibit_indicator(true);
    cps.set_initial_inhibit_any_policy_indicator(true);
    cps.set_initial_policy_set(vec![ANY_POLICY.to_string()]);
    cps.set_initial_permitted_subtrees(NameConstraintsSettings {
        directory_name: Some(vec!["C=US,O=Org,OU=Org Unit,CN=Joe".to_string()]),
        rfc822_name: Some(vec!["x@example.com".to_string()]),
        user_principal_name: Some(vec!["1234567890@mil".to_string()]),
        dns_name: Some(vec!["j.example.com".to_string()]),
        uniform_resource_identifier: Some(vec!["https://j.example.com".to_string()]),
        ip_address: None,
        not_supported: None,
    });
    cps.set_initial_excluded_subtrees(NameConstraintsSettings {
        directory_name: Some(vec!["C=US,O=Org,OU=Org Unit,CN=Sue".to_string()]),
        rfc822_name: Some(vec!["y@example.com".to_string()]),
        user_principal_name: Some(vec!["0987654321@mil".to_string()]),
        dns_name: Some(vec!["s.example.com".to_string()]),
        uniform_resource_identifier: Some(vec!["https://s.example.com".to_string()]),
        ip_address: None,
        not_supported: None,
    });
    let toi = match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(n) => n.as_secs(),
        Err(_) => 0,
    };
    cps.set_time_of_interest(toi);
    cps.set_extended_key_usage(vec![ID_KP_SERVER_AUTH.to_string()]);
    cps.set_extended_key_usage_path(false);
    cps.set_initial_path_length_constraint(4);
    cps.set_enforce_trust_anchor_constraints(true);
    cps.set_enforce_trust_anchor_validity(true);
    cps.set_check_revocation_status(false);
    cps.set_target_key_usage(KeyUsages::DecipherOnly as u16 | KeyUsages::EncipherOnly as u16);

    let json = serde_json::to_vec(&cps).unwrap();
    let cps_de: CertificationPathSettings = serde_json::from_slice(&json).unwrap();
    assert_eq!(cps, cps_de);

    let perm = cps_de.get_initial_permitted_subtrees().unwrap();
    assert_eq!(Some(vec!["j.example.com".to_string()]), perm.dns_name);
    assert_eq!(4, cps_de.get_initial_path_length_constraint());
    assert_eq!(toi, cps_de.get_time_of_interest());
    assert!(!cps_de.get_check_revocation_status());
}
