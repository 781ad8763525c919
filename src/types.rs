//! Core types for struct-log trace reconstruction
//!
//! This module defines the data structures shared by the whole pipeline:
//! - Canonical struct logs and the normalized trace document
//! - Opcode classification
//! - The generic depth-indexed tree and its failure summary
//! - The nested call trace and its root-to-failure stack trace
//! - Decoded revert payloads and ABI parameters
//! - Transaction context and per-address contract metadata

use std::collections::{BTreeMap, HashMap};

pub use alloy::json_abi::JsonAbi;
pub use alloy::primitives::{Address, Bytes, Selector, B256, U256};
use serde::{Deserialize, Serialize};

/// Index of a node inside [`GenericTraceTree::nodes`]
pub type NodeId = usize;

/// One instruction's execution record, normalized
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructLog {
    /// Program counter
    pub pc: u64,
    /// Opcode mnemonic, e.g. "CALL", "SLOAD"
    pub op: String,
    /// Gas remaining before this opcode executes
    pub gas: U256,
    /// Gas charged for this opcode
    pub gas_cost: U256,
    /// Call depth as reported by the tracer
    pub depth: u64,
    /// Stack words, top of the stack last
    pub stack: Vec<U256>,
    /// Memory as hex 32-byte words
    pub memory: Vec<String>,
    /// Storage snapshot, 0x-prefixed slot to 0x-prefixed value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<BTreeMap<String, String>>,
    /// Tracer error string, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A raw trace document after normalization
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedTrace {
    /// Overall gas reported by the tracer
    pub gas: U256,
    /// Return data hex, "0x" when absent
    pub return_value: String,
    /// Tracer's `failed` flag when present
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<bool>,
    /// Canonical step sequence
    pub struct_logs: Vec<StructLog>,
}

/// Broad opcode family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OpCategory {
    /// CALL, DELEGATECALL, STATICCALL, CALLCODE
    Call,
    /// CREATE, CREATE2
    Creation,
    /// SLOAD, SSTORE
    Storage,
    /// LOG0 to LOG4
    Logging,
    /// JUMP, JUMPI, REVERT, RETURN, STOP, SELFDESTRUCT
    Control,
    /// Everything else
    Internal,
}

/// Opcode classification used by both trees
///
/// Anything that is not one of the "interesting" opcodes is `Internal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OpKind {
    Call,
    DelegateCall,
    StaticCall,
    CallCode,
    Create,
    Create2,
    SLoad,
    SStore,
    Log0,
    Log1,
    Log2,
    Log3,
    Log4,
    Jump,
    JumpI,
    Revert,
    Return,
    Stop,
    SelfDestruct,
    #[default]
    Internal,
}

impl OpKind {
    /// Classify an opcode mnemonic
    pub fn from_op(op: &str) -> Self {
        match op {
            "CALL" => OpKind::Call,
            "DELEGATECALL" => OpKind::DelegateCall,
            "STATICCALL" => OpKind::StaticCall,
            "CALLCODE" => OpKind::CallCode,
            "CREATE" => OpKind::Create,
            "CREATE2" => OpKind::Create2,
            "SLOAD" => OpKind::SLoad,
            "SSTORE" => OpKind::SStore,
            "LOG0" => OpKind::Log0,
            "LOG1" => OpKind::Log1,
            "LOG2" => OpKind::Log2,
            "LOG3" => OpKind::Log3,
            "LOG4" => OpKind::Log4,
            "JUMP" => OpKind::Jump,
            "JUMPI" => OpKind::JumpI,
            "REVERT" => OpKind::Revert,
            "RETURN" => OpKind::Return,
            "STOP" => OpKind::Stop,
            "SELFDESTRUCT" => OpKind::SelfDestruct,
            _ => OpKind::Internal,
        }
    }

    /// Mnemonic of the kind, "INTERNAL" for unclassified opcodes
    pub fn as_str(&self) -> &'static str {
        match self {
            OpKind::Call => "CALL",
            OpKind::DelegateCall => "DELEGATECALL",
            OpKind::StaticCall => "STATICCALL",
            OpKind::CallCode => "CALLCODE",
            OpKind::Create => "CREATE",
            OpKind::Create2 => "CREATE2",
            OpKind::SLoad => "SLOAD",
            OpKind::SStore => "SSTORE",
            OpKind::Log0 => "LOG0",
            OpKind::Log1 => "LOG1",
            OpKind::Log2 => "LOG2",
            OpKind::Log3 => "LOG3",
            OpKind::Log4 => "LOG4",
            OpKind::Jump => "JUMP",
            OpKind::JumpI => "JUMPI",
            OpKind::Revert => "REVERT",
            OpKind::Return => "RETURN",
            OpKind::Stop => "STOP",
            OpKind::SelfDestruct => "SELFDESTRUCT",
            OpKind::Internal => "INTERNAL",
        }
    }

    pub fn category(&self) -> OpCategory {
        match self {
            OpKind::Call | OpKind::DelegateCall | OpKind::StaticCall | OpKind::CallCode => {
                OpCategory::Call
            }
            OpKind::Create | OpKind::Create2 => OpCategory::Creation,
            OpKind::SLoad | OpKind::SStore => OpCategory::Storage,
            OpKind::Log0 | OpKind::Log1 | OpKind::Log2 | OpKind::Log3 | OpKind::Log4 => {
                OpCategory::Logging
            }
            OpKind::Jump
            | OpKind::JumpI
            | OpKind::Revert
            | OpKind::Return
            | OpKind::Stop
            | OpKind::SelfDestruct => OpCategory::Control,
            OpKind::Internal => OpCategory::Internal,
        }
    }

    /// Check if this opcode opens a message-call frame
    pub fn is_call(&self) -> bool {
        self.category() == OpCategory::Call
    }

    /// Check if this opcode is kept in the generic tree by default
    pub fn is_interesting(&self) -> bool {
        !matches!(self, OpKind::Internal)
    }
}

impl std::fmt::Display for OpKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Revert payload classified by its leading selector
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecodedError {
    /// `Error(string)`
    Revert { reason: String },
    /// `Panic(uint256)`
    Panic { code: U256 },
    /// Any other selector; the name is only known when an ABI resolved it
    CustomError {
        selector: Selector,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    /// Payload shorter than a selector, or truncated panic data
    Unknown,
}

/// Discriminant of [`DecodedError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecodedErrorKind {
    Revert,
    Panic,
    CustomError,
    Unknown,
}

impl DecodedError {
    pub fn kind(&self) -> DecodedErrorKind {
        match self {
            DecodedError::Revert { .. } => DecodedErrorKind::Revert,
            DecodedError::Panic { .. } => DecodedErrorKind::Panic,
            DecodedError::CustomError { .. } => DecodedErrorKind::CustomError,
            DecodedError::Unknown => DecodedErrorKind::Unknown,
        }
    }

    /// Revert reason, only for `Error(string)` payloads
    pub fn reason(&self) -> Option<&str> {
        match self {
            DecodedError::Revert { reason } => Some(reason),
            _ => None,
        }
    }

    /// Human-readable message
    ///
    /// Panic codes are described the way Solidity documents them, custom
    /// errors fall back to their selector when no name is known.
    pub fn message(&self) -> String {
        match self {
            DecodedError::Revert { reason } => reason.clone(),
            DecodedError::Panic { code } => {
                format!("Panic: {}", crate::utils::error_utils::panic_reason(*code))
            }
            DecodedError::CustomError { selector, name } => match name {
                Some(name) => name.clone(),
                None => format!("Custom error {selector}"),
            },
            DecodedError::Unknown => "Unknown error".to_string(),
        }
    }
}

/// One decoded ABI parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedParam {
    /// Declared parameter name, `param{index}` when the ABI leaves it empty
    pub name: String,
    /// Canonical Solidity type
    #[serde(rename = "type")]
    pub ty: String,
    /// Exact value (checksummed address, decimal integer, 0x-hex bytes...)
    pub value: String,
    /// Shortened value for display
    pub display: String,
}

/// One node of the depth-indexed generic tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericTraceNode {
    /// `"{step}-{depth}-{op}"`
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: OpKind,
    pub op: String,
    pub depth: u64,
    pub step_index: usize,
    pub pc: u64,
    pub gas_before: U256,
    pub gas_after: U256,
    pub gas_cost: U256,
    /// Id of the node that held depth-1 when this node was seen
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Arena indices of the children, in step order
    pub children: Vec<NodeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    // Call-family operands
    /// Target of the depth-indexed parent call, when there is one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Bytes>,
    /// RETURN payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Bytes>,

    // SLOAD / SSTORE
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_slot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_value: Option<String>,

    // REVERT
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revert_data: Option<Bytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoded_error: Option<DecodedError>,
}

/// Output of the generic tree builder
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericTraceTree {
    /// Retained nodes in step order
    pub nodes: Vec<GenericTraceNode>,
    /// Nodes without a parent
    pub roots: Vec<NodeId>,
    pub max_depth: u64,
    pub total_steps: usize,
    /// Sum of `gas_cost` over retained nodes
    pub total_gas_cost: U256,
    /// Opcode frequency over every step, retained or not
    pub op_counts: BTreeMap<String, u64>,
}

impl GenericTraceTree {
    pub fn node(&self, id: NodeId) -> Option<&GenericTraceNode> {
        self.nodes.get(id)
    }

    /// Looks a node up by its string id
    pub fn find_by_id(&self, id: &str) -> Option<&GenericTraceNode> {
        self.nodes.iter().find(|node| node.id == id)
    }

    /// Children of a node, in step order
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = &GenericTraceNode> {
        self.nodes
            .get(id)
            .map(|node| node.children.as_slice())
            .unwrap_or_default()
            .iter()
            .filter_map(|child| self.nodes.get(*child))
    }
}

/// Deepest revert found in the generic tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureInfo {
    pub failing_node_id: String,
    /// Node ids from a root down to the failing node
    pub failing_path: Vec<String>,
    pub revert_data: Bytes,
    pub decoded_error: DecodedError,
    pub error_kind: DecodedErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoded_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub panic_code: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_error_selector: Option<Selector>,
    /// ABI name of the custom error, when one resolved it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_error_name: Option<String>,
}

impl FailureInfo {
    /// Fills in the custom error name once an ABI has resolved `selector`
    ///
    /// Does nothing when the failure is not that custom error.
    pub fn resolve_custom_error_name(&mut self, selector: Selector, name: &str) {
        if let DecodedError::CustomError {
            selector: own,
            name: own_name,
        } = &mut self.decoded_error
        {
            if *own == selector {
                *own_name = Some(name.to_string());
                self.custom_error_name = Some(name.to_string());
            }
        }
    }
}

/// One call frame or atomic leaf operation in the nested call trace
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct CallTrace {
    /// Transaction hash, root frame only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<B256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_name: Option<String>,
    /// First step executed inside the callee
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_pc: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function_op: Option<String>,
    /// Step index where this entry starts
    pub absolute_position: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_pc: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caller_op: Option<String>,
    pub call_type: OpKind,
    /// Account whose storage this entry runs against
    pub address: Address,
    pub from: Address,
    pub to: Address,
    /// Native value, only when non-zero
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<U256>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_timestamp: Option<u64>,
    pub gas: U256,
    pub gas_used: U256,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Bytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoded_input: Option<Vec<DecodedParam>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Bytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoded_output: Option<Vec<DecodedParam>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_op: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_absolute_position: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_hex_data: Option<Bytes>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decoded_error: Option<DecodedError>,
    /// Whether this frame is where the transaction's failure originated
    pub error_origin: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_address: Option<Address>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_slot: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_value_original: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_value_dirty: Option<String>,
    /// Child indices from the root down to this entry
    pub trace_address: Vec<usize>,
    /// Nested frames and leaf operations in execution order
    pub calls: Vec<CallTrace>,
}

impl CallTrace {
    /// Check if this entry is a message-call frame (the root included)
    pub fn is_frame(&self) -> bool {
        self.call_type.is_call()
    }

    /// Child frames, skipping storage and revert leaves
    pub fn subcalls(&self) -> impl Iterator<Item = &CallTrace> {
        self.calls.iter().filter(|call| call.is_frame())
    }

    /// Leaf operations directly owned by this frame
    pub fn leaves(&self) -> impl Iterator<Item = &CallTrace> {
        self.calls.iter().filter(|call| !call.is_frame())
    }

    /// Follows a trace address down from this entry
    pub fn at(&self, trace_address: &[usize]) -> Option<&CallTrace> {
        trace_address
            .iter()
            .try_fold(self, |trace, index| trace.calls.get(*index))
    }

    /// Performs depth-first search for the frame flagged as error origin
    pub fn find_error_trace(&self) -> Option<&CallTrace> {
        if self.error_origin {
            return Some(self);
        }
        self.calls.iter().find_map(|call| call.find_error_trace())
    }
}

/// One frame of the root-to-failure path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackTraceEntry {
    pub contract: Address,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contract_name: Option<String>,
    pub name: Option<String>,
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Error opcode of the frame, or its call type
    pub op: String,
    pub error_origin: bool,
}

/// Output of the call trace builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallTraceOutput {
    pub call_trace: CallTrace,
    /// Root-first path to the failing frame, empty on success
    pub stack_trace: Vec<StackTraceEntry>,
    /// Location of the failing frame in the call tree
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_trace_address: Option<Vec<usize>>,
}

/// Transaction fields the call trace root is built from
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct TxContext {
    pub hash: B256,
    pub from: Address,
    /// `None` for contract creation
    pub to: Option<Address>,
    pub input: Bytes,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_timestamp: Option<u64>,
}

/// Per-address ABIs and display names supplied by a metadata collaborator
#[derive(Debug, Clone, Default)]
pub struct ContractRegistry {
    abis: HashMap<Address, JsonAbi>,
    names: HashMap<Address, String>,
}

impl ContractRegistry {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers an ABI, returning self for chaining
    pub fn with_abi(mut self, address: Address, abi: JsonAbi) -> Self {
        self.insert_abi(address, abi);
        self
    }

    /// Registers a display name, returning self for chaining
    pub fn with_name(mut self, address: Address, name: impl Into<String>) -> Self {
        self.insert_name(address, name);
        self
    }

    pub fn insert_abi(&mut self, address: Address, abi: JsonAbi) {
        self.abis.insert(address, abi);
    }

    pub fn insert_name(&mut self, address: Address, name: impl Into<String>) {
        self.names.insert(address, name.into());
    }

    pub fn abi(&self, address: &Address) -> Option<&JsonAbi> {
        self.abis.get(address)
    }

    pub fn name(&self, address: &Address) -> Option<&str> {
        self.names.get(address).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.abis.is_empty() && self.names.is_empty()
    }
}

/// Aggregate facts about a step sequence
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceMetadata {
    pub total_steps: usize,
    pub max_depth: u64,
    /// Sum of the tracer-reported `gasCost` of every step
    pub total_gas_cost: U256,
    pub has_storage_ops: bool,
    pub has_events: bool,
}

impl TraceMetadata {
    pub fn from_steps(steps: &[StructLog]) -> Self {
        steps.iter().fold(
            TraceMetadata {
                total_steps: steps.len(),
                ..Default::default()
            },
            |mut meta, log| {
                let kind = OpKind::from_op(&log.op);
                meta.max_depth = meta.max_depth.max(log.depth);
                meta.total_gas_cost = meta.total_gas_cost.saturating_add(log.gas_cost);
                meta.has_storage_ops |= kind.category() == OpCategory::Storage;
                meta.has_events |= kind.category() == OpCategory::Logging;
                meta
            },
        )
    }
}
