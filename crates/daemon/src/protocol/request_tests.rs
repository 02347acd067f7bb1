// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Backward compatibility tests for Request deserialization.

use super::*;
use drover_core::ControlCommand;

#[test]
fn cluster_command_reason_and_updated_by_default_to_empty() {
    let json = r#"{"type":"ClusterCommand","command":"pause"}"#;
    let decoded: Request = serde_json::from_str(json).expect("deserialize failed");
    match decoded {
        Request::ClusterCommand { command, reason, updated_by } => {
            assert_eq!(command, ControlCommand::Pause);
            assert!(reason.is_empty());
            assert!(updated_by.is_empty());
        }
        _ => panic!("Expected ClusterCommand request"),
    }
}

#[test]
fn unit_requests_encode_as_type_only_objects() {
    let encoded = serde_json::to_string(&Request::Pause).expect("serialize failed");
    assert_eq!(encoded, r#"{"type":"Pause"}"#);

    let decoded: Request = serde_json::from_str(r#"{"type":"Readiness"}"#).expect("deserialize failed");
    assert_eq!(decoded, Request::Readiness);
}

#[test]
fn commands_use_lowercase_wire_names() {
    let json = r#"{"type":"ClusterCommand","command":"shutdown","reason":"maintenance","updated_by":"ops"}"#;
    let decoded: Request = serde_json::from_str(json).expect("deserialize failed");
    match decoded {
        Request::ClusterCommand { command, reason, updated_by } => {
            assert_eq!(command, ControlCommand::Shutdown);
            assert_eq!(reason, "maintenance");
            assert_eq!(updated_by, "ops");
        }
        _ => panic!("Expected ClusterCommand request"),
    }
}

#[test]
fn unknown_request_type_is_an_error() {
    let result: Result<Request, _> = serde_json::from_str(r#"{"type":"Reboot"}"#);
    assert!(result.is_err());
}
