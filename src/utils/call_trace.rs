use crate::utils::units::to_units;
use alloy_primitives::{Address, Bytes, U64, U256, hex};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::Write;

/// Longest string `decode_abi_string` accepts.
const MAX_DECODED_STRING_LEN: usize = 1000;

/// One node of a `callTracer` result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallFrame {
    #[serde(rename = "type", default)]
    pub call_type: String,
    #[serde(default)]
    pub from: Address,
    #[serde(default)]
    pub to: Option<Address>,
    #[serde(default)]
    pub value: Option<U256>,
    #[serde(default)]
    pub gas: Option<U64>,
    #[serde(default)]
    pub gas_used: Option<U64>,
    #[serde(default)]
    pub input: Bytes,
    #[serde(default)]
    pub output: Option<Bytes>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub calls: Vec<CallFrame>,
}

impl CallFrame {
    pub fn gas_used(&self) -> u64 {
        self.gas_used.map(|gas| gas.to::<u64>()).unwrap_or_default()
    }

    pub fn selector(&self) -> Option<[u8; 4]> {
        self.input.get(..4).and_then(|bytes| bytes.try_into().ok())
    }
}

/// A call flattened out of the trace tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalCall {
    pub call_type: String,
    pub from: Address,
    pub to: Option<Address>,
    pub value: U256,
    pub gas_used: u64,
    pub input: Bytes,
    pub output: Option<Bytes>,
    pub depth: usize,
}

impl InternalCall {
    pub fn value_ether(&self) -> f64 {
        to_units(self.value, 18)
    }

    /// The output decoded as an ABI string, when it is one.
    pub fn decoded_output(&self) -> Option<String> {
        self.output.as_ref().and_then(|output| decode_abi_string(output))
    }
}

/// Flattens the trace tree; children are listed before their parent.
pub fn flatten_calls(root: &CallFrame) -> Vec<InternalCall> {
    let mut calls = Vec::new();
    collect_calls(root, 0, &mut calls);
    calls
}

fn collect_calls(frame: &CallFrame, depth: usize, calls: &mut Vec<InternalCall>) {
    for child in &frame.calls {
        collect_calls(child, depth + 1, calls);
    }
    calls.push(InternalCall {
        call_type: frame.call_type.clone(),
        from: frame.from,
        to: frame.to,
        value: frame.value.unwrap_or_default(),
        gas_used: frame.gas_used(),
        input: frame.input.clone(),
        output: frame.output.clone(),
        depth,
    });
}

/// Decodes an ABI-encoded `string` return value (offset word, length word, bytes).
///
/// Returns `None` unless the length is in `1..1000`. Invalid UTF-8 is replaced.
pub fn decode_abi_string(output: &[u8]) -> Option<String> {
    let length_word = output.get(32..64)?;
    let length = U256::from_be_slice(length_word);
    if length.is_zero() || length >= U256::from(MAX_DECODED_STRING_LEN) {
        return None;
    }
    let length = length.to::<usize>();
    let data = output.get(64..)?;
    let data = &data[..length.min(data.len())];
    Some(String::from_utf8_lossy(data).into_owned())
}

/// Whether any frame in the tree calls `target` with input starting with `selector`.
pub fn contains_call(frame: &CallFrame, target: Address, selector: [u8; 4]) -> bool {
    if frame.to == Some(target) && frame.selector() == Some(selector) {
        return true;
    }
    frame.calls.iter().any(|child| contains_call(child, target, selector))
}

/// Call counts per call type and the gas used by the whole transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceSummary {
    pub total_calls: usize,
    pub gas_used: u64,
    pub calls_by_type: BTreeMap<String, usize>,
}

impl TraceSummary {
    pub fn new(root: &CallFrame, calls: &[InternalCall]) -> Self {
        let mut calls_by_type = BTreeMap::new();
        for call in calls {
            *calls_by_type.entry(call.call_type.clone()).or_insert(0) += 1;
        }
        Self { total_calls: calls.len(), gas_used: root.gas_used(), calls_by_type }
    }
}

/// Renders the flattened calls indented by depth.
pub fn render_calls(calls: &[InternalCall]) -> String {
    let mut out = String::new();
    for (i, call) in calls.iter().enumerate() {
        let indent = "  ".repeat(call.depth);
        let to = call.to.map(|to| to.to_string()).unwrap_or_else(|| "-".to_string());
        let input = match call.input.get(..4) {
            Some(selector) if call.input.len() > 4 => format!("{}...", hex::encode_prefixed(selector)),
            _ => hex::encode_prefixed(&call.input),
        };
        let _ = writeln!(out, "{indent}├─ Call {}: {}", i + 1, call.call_type);
        let _ = writeln!(out, "{indent}  From: {}", call.from);
        let _ = writeln!(out, "{indent}  To:   {}", to);
        let _ = writeln!(out, "{indent}  Gas Used: {}", call.gas_used);
        let _ = writeln!(out, "{indent}  Value: {} ETH", call.value_ether());
        let _ = writeln!(out, "{indent}  Input: {}", input);
        if let Some(decoded) = call.decoded_output() {
            let _ = writeln!(out, "{indent}  Output (decoded): {}", decoded);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const SAMPLE_OUTPUT: &str = "0x0000000000000000000000000000000000000000000000000000000000000020000000000000000000000000000000000000000000000000000000000000000b706f6e672066726f6d2043000000000000000000000000000000000000000000";

    fn sample_trace() -> CallFrame {
        let json = serde_json::json!({
            "type": "CALL",
            "from": "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266",
            "to": "0xcf7ed3acca5a467e9e704c703e8d87f634fb0fc9",
            "value": "0x0",
            "gas": "0x3335",
            "gasUsed": "0x857d",
            "input": "0x4e7fe0eb",
            "output": SAMPLE_OUTPUT,
            "calls": [{
                "type": "STATICCALL",
                "from": "0xcf7ed3acca5a467e9e704c703e8d87f634fb0fc9",
                "to": "0x9fe46736679d2d9a65f0992f2272de9f3c7fa6e0",
                "gas": "0x1f63",
                "gasUsed": "0x1ac3",
                "input": "0x281dfe7c",
                "output": SAMPLE_OUTPUT,
                "calls": [{
                    "type": "STATICCALL",
                    "from": "0x9fe46736679d2d9a65f0992f2272de9f3c7fa6e0",
                    "to": "0xe7f1725e7734ce288f8367e1bb143e90bb3f0512",
                    "gas": "0xbf6",
                    "gasUsed": "0x267",
                    "input": "0x13f88d9b",
                    "output": SAMPLE_OUTPUT
                }]
            }]
        });
        serde_json::from_value(json).unwrap()
    }

    #[test]
    fn test_flatten_children_first() {
        let calls = flatten_calls(&sample_trace());
        let depths: Vec<usize> = calls.iter().map(|call| call.depth).collect();
        assert_eq!(depths, vec![2, 1, 0]);
        assert_eq!(calls[0].gas_used, 0x267);
        assert_eq!(calls[2].call_type, "CALL");
        assert_eq!(calls[2].to, Some(address!("0xcf7ed3acca5a467e9e704c703e8d87f634fb0fc9")));
    }

    #[test]
    fn test_decode_abi_string() {
        let calls = flatten_calls(&sample_trace());
        assert_eq!(calls[0].decoded_output().as_deref(), Some("pong from C"));

        assert_eq!(decode_abi_string(&[0u8; 40]), None);
        let mut too_long = vec![0u8; 96];
        too_long[62..64].copy_from_slice(&1000u16.to_be_bytes());
        assert_eq!(decode_abi_string(&too_long), None);
    }

    #[test]
    fn test_contains_call() {
        let trace = sample_trace();
        let target = address!("0xe7f1725e7734ce288f8367e1bb143e90bb3f0512");
        assert!(contains_call(&trace, target, [0x13, 0xf8, 0x8d, 0x9b]));
        assert!(!contains_call(&trace, target, [0x02, 0xfb, 0x45, 0xe6]));
    }

    #[test]
    fn test_summary_and_render() {
        let trace = sample_trace();
        let calls = flatten_calls(&trace);
        let summary = TraceSummary::new(&trace, &calls);
        assert_eq!(summary.total_calls, 3);
        assert_eq!(summary.gas_used, 0x857d);
        assert_eq!(summary.calls_by_type.get("STATICCALL"), Some(&2));

        let rendered = render_calls(&calls);
        assert!(rendered.contains("Output (decoded): pong from C"));
        assert!(rendered.contains("├─ Call 3: CALL"));
    }
}
