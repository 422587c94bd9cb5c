// Unit tests for the axis model

use super::*;

#[test]
fn test_parse_is_case_insensitive_and_order_free() {
    assert_eq!(Axis::parse("x").unwrap(), Axis::X);
    assert_eq!(Axis::parse("XY").unwrap(), Axis::XY);
    assert_eq!(Axis::parse("YX").unwrap(), Axis::XY);
    assert_eq!(Axis::parse("ab").unwrap(), Axis::AB);
}

#[test]
fn test_parse_rejects_empty_and_unknown() {
    assert!(matches!(Axis::parse(""), Err(DomainError::Axis(_))));
    assert!(matches!(Axis::parse(" "), Err(DomainError::Axis(_))));
    assert!(matches!(Axis::parse("XQ"), Err(DomainError::Axis(_))));
}

#[test]
fn test_parameter_name_uses_canonical_order() {
    assert_eq!(Axis::X.parameter_name(), "X");
    assert_eq!((Axis::Y | Axis::X).parameter_name(), "X Y");
    assert_eq!((Axis::B | Axis::Z | Axis::Y).parameter_name(), "Y Z B");
}

#[test]
fn test_iteration_yields_single_axes() {
    let axes: Vec<Axis> = (Axis::Z | Axis::A | Axis::X).iter_single().collect();
    assert_eq!(axes, vec![Axis::X, Axis::Z, Axis::A]);
}

#[test]
fn test_single_axis_detection() {
    assert!(Axis::X.is_single_axis());
    assert!(Axis::B.is_single_axis());
    assert!(!Axis::XY.is_single_axis());
    assert!(!Axis::empty().is_single_axis());
    assert!(Axis::XY.require_single("AXISSTATUS").is_err());
}

#[test]
fn test_stage_membership() {
    assert_eq!(Stage::of(Axis::XZ), Some(Stage::Xyz));
    assert_eq!(Stage::of(Axis::B), Some(Stage::Ab));
    assert_eq!(Stage::of(Axis::X | Axis::A), None);
    assert_eq!(Stage::of(Axis::empty()), None);
    assert!(!(Axis::YZ | Axis::AB).is_from_same_stage());
}

#[test]
fn test_serde_uses_letters() {
    let json = serde_json::to_string(&Axis::XY).unwrap();
    assert_eq!(json, "\"XY\"");
    let axis: Axis = serde_json::from_str("\"ba\"").unwrap();
    assert_eq!(axis, Axis::AB);
}
