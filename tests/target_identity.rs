// tests/target_identity.rs

use podexec::{ErrorKind, TargetIdentity};

#[test]
fn test_parse_and_display_round_trip() {
    let target: TargetIdentity = "kube-system/coredns-5d78c9869d-abcde/coredns"
        .parse()
        .unwrap();

    assert_eq!(target.namespace, "kube-system");
    assert_eq!(target.pod, "coredns-5d78c9869d-abcde");
    assert_eq!(target.container, "coredns");
    assert_eq!(
        target.to_string(),
        "kube-system/coredns-5d78c9869d-abcde/coredns"
    );
}

#[test]
fn test_lock_key_orders_namespace_pod_container() {
    let target = TargetIdentity::new("ns", "pod", "ctr");
    assert_eq!(target.lock_key(), "ns/pod/ctr");

    // Same pod in another namespace is a different target.
    let other = TargetIdentity::new("other", "pod", "ctr");
    assert_ne!(target.lock_key(), other.lock_key());
}

#[test]
fn test_parse_rejects_wrong_shape() {
    for bad in ["", "ns", "ns/pod", "ns/pod/ctr/extra", "ns//ctr", "/pod/ctr"] {
        let err = bad.parse::<TargetIdentity>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "input {bad:?}");
    }
}

#[test]
fn test_validate_rejects_unusable_components() {
    let cases = [
        TargetIdentity::new("", "pod", "ctr"),
        TargetIdentity::new("ns", "", "ctr"),
        TargetIdentity::new("ns", "pod", ""),
        TargetIdentity::new("ns", "a/b", "ctr"),
        TargetIdentity::new("ns", "pod name", "ctr"),
        TargetIdentity::new("ns", "pod", "ctr\n"),
    ];

    for target in cases {
        let err = target.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "target {target:?}");
    }
}

#[test]
fn test_validate_accepts_typical_names() {
    TargetIdentity::new("default", "web-7f9c", "nginx")
        .validate()
        .unwrap();
    TargetIdentity::new("team.a", "job_1", "sidecar-0")
        .validate()
        .unwrap();
}
