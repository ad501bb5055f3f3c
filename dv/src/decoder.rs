//! Result document decoding
//!
//! The worker writes one JSON document per task. Its shape depends on the
//! `Plugin` field inside the same document, so decoding happens in two passes:
//! the header alone first, then the full document as the variant it names.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Discriminator of the syscall trace variant
pub const SYSCALL_PLUGIN: &str = "syscall";

/// Errors from result decoding
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("Malformed result header: {0}")]
    MalformedHeader(String),

    #[error("Malformed result payload: {0}")]
    MalformedPayload(String),

    #[error("Unsupported result variant: {0}")]
    UnsupportedVariant(String),
}

/// How result documents are handed back to callers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultMode {
    /// Strict tagged decoding; unknown variants are rejected
    #[default]
    Typed,
    /// Opt-in: hand back the document bytes without looking at them
    Raw,
}

/// Decoded analysis result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisResult {
    Syscall(SyscallReport),
    Raw(Vec<u8>),
}

impl AnalysisResult {
    /// Discriminator of a typed result
    pub fn plugin(&self) -> Option<&str> {
        match self {
            Self::Syscall(report) => Some(&report.plugin),
            Self::Raw(_) => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ResultHeader {
    #[serde(rename = "Plugin", default)]
    plugin: Option<String>,
}

/// Syscall trace produced by the `syscall` plugin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyscallReport {
    #[serde(rename = "Plugin")]
    pub plugin: String,

    #[serde(rename = "OS")]
    pub os: String,

    #[serde(rename = "Common")]
    pub common: CommonInfo,

    #[serde(rename = "Syscall")]
    pub syscall: SyscallInfo,
}

/// Execution context shared by every plugin event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommonInfo {
    #[serde(rename = "vCPU")]
    pub vcpu: i64,

    #[serde(rename = "CR3")]
    pub cr3: i64,

    #[serde(rename = "ProcName")]
    pub proc_name: String,

    #[serde(rename = "UID")]
    pub uid: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyscallInfo {
    #[serde(rename = "scModule")]
    pub module: String,

    #[serde(rename = "scName")]
    pub name: String,

    #[serde(rename = "nArgs")]
    pub arg_count: usize,

    /// Arguments in call order
    #[serde(rename = "Args")]
    pub args: Vec<SyscallArg>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyscallArg {
    /// Direction, e.g. `in` / `out`
    #[serde(rename = "ArgDir")]
    pub dir: String,

    #[serde(rename = "ArgType")]
    pub arg_type: String,

    #[serde(rename = "ArgName")]
    pub name: String,

    #[serde(rename = "ArgValue")]
    pub value: i64,
}

/// Decode a result document according to `mode`
pub fn decode_result(bytes: &[u8], mode: ResultMode) -> Result<AnalysisResult, DecodeError> {
    match mode {
        ResultMode::Typed => decode(bytes),
        ResultMode::Raw => Ok(AnalysisResult::Raw(bytes.to_vec())),
    }
}

/// Strict two-pass decode of a result document
pub fn decode(bytes: &[u8]) -> Result<AnalysisResult, DecodeError> {
    // serde also accepts a JSON array for a struct
    if bytes.iter().find(|b| !b.is_ascii_whitespace()) != Some(&b'{') {
        return Err(DecodeError::MalformedHeader("document is not a JSON object".to_string()));
    }

    let header: ResultHeader =
        serde_json::from_slice(bytes).map_err(|e| DecodeError::MalformedHeader(e.to_string()))?;

    let plugin = match header.plugin {
        Some(plugin) if !plugin.is_empty() => plugin,
        _ => return Err(DecodeError::MalformedHeader("missing Plugin field".to_string())),
    };
    debug!(%plugin, "decode: header parsed");

    match plugin.as_str() {
        SYSCALL_PLUGIN => decode_syscall(bytes).map(AnalysisResult::Syscall),
        _ => Err(DecodeError::UnsupportedVariant(plugin)),
    }
}

fn decode_syscall(bytes: &[u8]) -> Result<SyscallReport, DecodeError> {
    let report: SyscallReport =
        serde_json::from_slice(bytes).map_err(|e| DecodeError::MalformedPayload(e.to_string()))?;

    if report.syscall.arg_count != report.syscall.args.len() {
        return Err(DecodeError::MalformedPayload(format!(
            "nArgs is {} but {} arguments present",
            report.syscall.arg_count,
            report.syscall.args.len()
        )));
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> SyscallReport {
        SyscallReport {
            plugin: SYSCALL_PLUGIN.to_string(),
            os: "win7".to_string(),
            common: CommonInfo {
                vcpu: 1,
                cr3: 0x1a2b3c000,
                proc_name: "\\Device\\HarddiskVolume2\\sample.exe".to_string(),
                uid: -1,
            },
            syscall: SyscallInfo {
                module: "ntoskrnl.exe".to_string(),
                name: "NtCreateFile".to_string(),
                arg_count: 3,
                args: vec![
                    SyscallArg {
                        dir: "out".to_string(),
                        arg_type: "PHANDLE".to_string(),
                        name: "FileHandle".to_string(),
                        value: 0x2f8e0,
                    },
                    SyscallArg {
                        dir: "in".to_string(),
                        arg_type: "ACCESS_MASK".to_string(),
                        name: "DesiredAccess".to_string(),
                        value: 0x120089,
                    },
                    SyscallArg {
                        dir: "in".to_string(),
                        arg_type: "LONG".to_string(),
                        name: "Offset".to_string(),
                        value: i64::MIN,
                    },
                ],
            },
        }
    }

    #[test]
    fn test_syscall_round_trip() {
        let report = sample_report();
        let bytes = serde_json::to_vec(&report).unwrap();

        let decoded = decode(&bytes).unwrap();
        assert_eq!(decoded, AnalysisResult::Syscall(report));
        assert_eq!(decoded.plugin(), Some("syscall"));
    }

    #[test]
    fn test_worker_field_names() {
        let json = r#"{
            "Plugin": "syscall",
            "OS": "win7",
            "Common": {"vCPU": 0, "CR3": 1855488, "ProcName": "explorer.exe", "UID": 1000},
            "Syscall": {
                "scModule": "ntoskrnl.exe",
                "scName": "NtClose",
                "nArgs": 1,
                "Args": [{"ArgDir": "in", "ArgType": "HANDLE", "ArgName": "Handle", "ArgValue": 132}]
            },
            "Extra": "ignored"
        }"#;

        let AnalysisResult::Syscall(report) = decode(json.as_bytes()).unwrap() else {
            panic!("expected syscall variant");
        };
        assert_eq!(report.os, "win7");
        assert_eq!(report.common.cr3, 1855488);
        assert_eq!(report.common.proc_name, "explorer.exe");
        assert_eq!(report.syscall.name, "NtClose");
        assert_eq!(report.syscall.args[0].name, "Handle");
        assert_eq!(report.syscall.args[0].value, 132);
    }

    #[test]
    fn test_signed_common_fields() {
        let json = r#"{
            "Plugin": "syscall",
            "OS": "linux",
            "Common": {"vCPU": -1, "CR3": -4096, "ProcName": "init", "UID": -1},
            "Syscall": {"scModule": "kernel", "scName": "exit", "nArgs": 0, "Args": []}
        }"#;

        let AnalysisResult::Syscall(report) = decode(json.as_bytes()).unwrap() else {
            panic!("expected syscall variant");
        };
        assert_eq!(report.common.vcpu, -1);
        assert_eq!(report.common.cr3, -4096);
        assert_eq!(report.common.uid, -1);
    }

    #[test]
    fn test_unknown_plugin_rejected() {
        let err = decode(br#"{"Plugin": "unknown_x"}"#).unwrap_err();
        assert_eq!(err, DecodeError::UnsupportedVariant("unknown_x".to_string()));
    }

    #[test]
    fn test_malformed_headers() {
        for doc in [
            &b"not json"[..],
            b"[1, 2, 3]",
            br#"["syscall"]"#,
            b"",
            b"\"syscall\"",
            b"{}",
            br#"{"Plugin": ""}"#,
            br#"{"Plugin": 7}"#,
            br#"{"Plugin": null}"#,
        ] {
            let err = decode(doc).unwrap_err();
            assert!(
                matches!(err, DecodeError::MalformedHeader(_)),
                "{}: {err:?}",
                String::from_utf8_lossy(doc)
            );
        }
    }

    #[test]
    fn test_syscall_missing_sections() {
        let err = decode(br#"{"Plugin": "syscall", "OS": "win7"}"#).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedPayload(_)));
    }

    #[test]
    fn test_syscall_wrong_field_type() {
        let mut value = serde_json::to_value(sample_report()).unwrap();
        value["Common"]["CR3"] = serde_json::json!("0x1000");
        let err = decode(&serde_json::to_vec(&value).unwrap()).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedPayload(_)));
    }

    #[test]
    fn test_arg_count_mismatch() {
        let mut report = sample_report();
        report.syscall.arg_count = 5;
        let err = decode(&serde_json::to_vec(&report).unwrap()).unwrap_err();
        assert!(matches!(err, DecodeError::MalformedPayload(ref msg) if msg.contains("nArgs is 5")));
    }

    #[test]
    fn test_raw_mode_passes_bytes_through() {
        let doc = br#"{"Plugin": "unknown_x"}"#;
        let result = decode_result(doc, ResultMode::Raw).unwrap();
        assert_eq!(result, AnalysisResult::Raw(doc.to_vec()));
        assert_eq!(result.plugin(), None);

        assert!(decode_result(doc, ResultMode::Typed).is_err());
    }

    #[test]
    fn test_result_mode_names() {
        assert_eq!(serde_yaml::from_str::<ResultMode>("typed").unwrap(), ResultMode::Typed);
        assert_eq!(serde_yaml::from_str::<ResultMode>("raw").unwrap(), ResultMode::Raw);
        assert_eq!(ResultMode::default(), ResultMode::Typed);
    }
}
