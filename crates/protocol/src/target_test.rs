use super::*;

fn ports(targets: &[Target]) -> Vec<u16> {
    targets.iter().map(|t| t.port).collect()
}

#[test]
fn test_single_port() {
    let targets = parse_target_spec("127.0.0.1:6721").unwrap();
    assert_eq!(targets, vec![Target::new("127.0.0.1", 6721)]);
}

#[test]
fn test_range_and_list_expansion() {
    // "A-B,C" produces {A..=B} ∪ {C}, in that order
    let targets = parse_target_spec("127.0.0.1:6721-6723,6725").unwrap();
    assert_eq!(ports(&targets), vec![6721, 6722, 6723, 6725]);
    assert!(targets.iter().all(|t| t.host == "127.0.0.1"));
}

#[test]
fn test_backwards_range_rejected() {
    let err = parse_target_spec("127.0.0.1:6723-6721").unwrap_err();
    assert!(matches!(err, TargetParseError::BackwardsRange { .. }));
}

#[test]
fn test_port_zero_rejected() {
    let err = parse_target_spec("127.0.0.1:0").unwrap_err();
    assert!(matches!(err, TargetParseError::PortOutOfRange { port: 0, .. }));
}

#[test]
fn test_port_above_u16_rejected() {
    let err = parse_target_spec("127.0.0.1:65536").unwrap_err();
    assert!(matches!(
        err,
        TargetParseError::PortOutOfRange { port: 65536, .. }
    ));
}

#[test]
fn test_non_numeric_port_rejected() {
    let err = parse_target_spec("127.0.0.1:http").unwrap_err();
    assert!(matches!(err, TargetParseError::InvalidPort { .. }));
}

#[test]
fn test_missing_colon_rejected() {
    let err = parse_target_spec("127.0.0.1").unwrap_err();
    assert!(matches!(err, TargetParseError::InvalidFormat { .. }));
}

#[test]
fn test_extra_colon_rejected() {
    let err = parse_target_spec("127.0.0.1:6721:6722").unwrap_err();
    assert!(matches!(err, TargetParseError::InvalidFormat { .. }));
}

#[test]
fn test_multiple_args_preserve_order() {
    let args = vec![
        "hostb:7000".to_string(),
        "hosta:6721-6722".to_string(),
    ];
    let targets = parse_targets(&args).unwrap();
    assert_eq!(
        targets,
        vec![
            Target::new("hostb", 7000),
            Target::new("hosta", 6721),
            Target::new("hosta", 6722),
        ]
    );
}

#[test]
fn test_duplicates_dropped_keeping_first() {
    let args = vec!["h:7000,7000-7001".to_string(), "h:7000".to_string()];
    let targets = parse_targets(&args).unwrap();
    assert_eq!(ports(&targets), vec![7000, 7001]);
}

#[test]
fn test_empty_args_rejected() {
    assert_eq!(parse_targets(&[]).unwrap_err(), TargetParseError::Empty);
}

#[test]
fn test_base_url() {
    assert_eq!(
        Target::new("127.0.0.1", 6721).base_url(),
        "http://127.0.0.1:6721"
    );
}
