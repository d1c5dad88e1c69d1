//! Tests for error module

use tracestay::error::{OptionExt, StayError};

#[test]
fn test_error_display() {
    let err = StayError::invalid_config("workEndHour", "must be an hour in [0, 23], got 24");
    assert!(err.to_string().contains("workEndHour"));
    assert!(err.to_string().contains("got 24"));
}

#[test]
fn test_option_ext() {
    let none: Option<i32> = None;
    let result = none.ok_or_unknown_timezone("Mars/Base");
    assert!(matches!(
        result,
        Err(StayError::UnknownTimezone { ref name }) if name == "Mars/Base"
    ));
}
