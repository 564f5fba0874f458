//! Exit code contract
//!
//! For any `ToolError` variant, `exit_code()` returns 1 or 2.
//! Usage errors map to 2, operational errors map to 1, and `exit_status()`
//! agrees with `exit_code()`.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use aurora_tools::error::ToolError;
use proptest::prelude::*;

fn arb_io_kind() -> impl Strategy<Value = io::ErrorKind> {
    prop_oneof![
        Just(io::ErrorKind::NotFound),
        Just(io::ErrorKind::PermissionDenied),
        Just(io::ErrorKind::ConnectionRefused),
        Just(io::ErrorKind::ConnectionReset),
        Just(io::ErrorKind::BrokenPipe),
        Just(io::ErrorKind::TimedOut),
    ]
}

/// Strategy that produces an arbitrary `ToolError` variant.
fn arb_tool_error() -> impl Strategy<Value = ToolError> {
    let arb_string = "[a-zA-Z0-9_ /\\-\\.]{0,64}";

    (0..=12u8, arb_string, arb_string, arb_io_kind()).prop_map(|(tag, s, t, kind)| {
        let io_err = io::Error::new(kind, t.clone());
        match tag {
            // Usage errors (exit code 2)
            0 => ToolError::InvalidArgument(s),
            1 => ToolError::LayoutParse(s),
            2 => ToolError::InvalidLayout { reason: s },
            3 => ToolError::RegionOverlap { first: s, second: t },
            4 => ToolError::EmptyPayload { path: PathBuf::from(s) },

            // Operational errors (exit code 1)
            5 => ToolError::Read { path: PathBuf::from(s), source: io_err },
            6 => ToolError::Write { path: PathBuf::from(s), source: io_err },
            7 => ToolError::MalformedImage { reason: s },
            8 => ToolError::Connect(io_err),
            9 => ToolError::HeaderSend(io_err),
            10 => ToolError::Send(io_err),
            11 => ToolError::SendReturnedZero,
            _ => ToolError::InvalidArgument(t),
        }
    })
}

fn is_usage(err: &ToolError) -> bool {
    matches!(
        err,
        ToolError::InvalidArgument(_)
            | ToolError::LayoutParse(_)
            | ToolError::InvalidLayout { .. }
            | ToolError::RegionOverlap { .. }
            | ToolError::EmptyPayload { .. }
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn exit_code_is_1_or_2(err in arb_tool_error()) {
        let code = err.exit_code();
        prop_assert!(
            code == ExitCode::from(1) || code == ExitCode::from(2),
            "exit_code() must be 1 or 2, got {:?} for {:?}", code, err
        );
        prop_assert_eq!(code, ExitCode::from(err.exit_status()));
    }

    #[test]
    fn usage_errors_map_to_2(err in arb_tool_error()) {
        let expected = if is_usage(&err) { 2 } else { 1 };
        prop_assert_eq!(err.exit_status(), expected, "{:?}", err);
    }

    #[test]
    fn message_is_never_empty(err in arb_tool_error()) {
        prop_assert!(!err.to_string().is_empty());
    }
}
