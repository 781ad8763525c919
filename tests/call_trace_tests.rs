//! Integration tests for call trace reconstruction
//!
//! Traces are written as raw `debug_traceTransaction` JSON and run through
//! the full pipeline.
//!
//! # Test Coverage
//! - Frame nesting, storage leaves and revert leaves
//! - Call input extraction from memory
//! - ABI decoding of inputs, return values and custom errors
//! - DELEGATECALL storage context
//! - Error origin tracking through propagated reverts

use alloy::{
    primitives::{address, hex, keccak256, Address, Bytes, U256},
    sol,
    sol_types::SolCall,
};
use serde_json::{json, Value};
use structlog_trace::{
    analyze_trace,
    types::{CallTrace, DecodedError, JsonAbi, OpKind},
    ContractRegistry, TraceConfig, TxContext,
};

sol! {
    function transfer(address to, uint256 amount) returns (bool);
}

const CALLER: Address = address!("1111111111111111111111111111111111111111");
const ROUTER: Address = address!("bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb");
const TOKEN: Address = address!("cccccccccccccccccccccccccccccccccccccccc");
const LIBRARY: Address = address!("dddddddddddddddddddddddddddddddddddddddd");

/// "Insufficient balance" encoded as Error(string)
const INSUFFICIENT_BALANCE: &str = "08c379a0\
    0000000000000000000000000000000000000000000000000000000000000020\
    0000000000000000000000000000000000000000000000000000000000000014\
    496e73756666696369656e742062616c616e6365000000000000000000000000";

/// Panic(0x11)
const OVERFLOW_PANIC: &str = "4e487b71\
    0000000000000000000000000000000000000000000000000000000000000011";

fn word(address: Address) -> U256 {
    U256::from_be_slice(address.as_slice())
}

/// Stack words given bottom to top
fn stack(items: &[U256]) -> Vec<String> {
    items.iter().map(|item| format!("0x{item:x}")).collect()
}

fn memory(data: &[u8]) -> Vec<String> {
    let mut padded = data.to_vec();
    padded.resize(data.len().div_ceil(32) * 32, 0);
    padded.chunks(32).map(hex::encode).collect()
}

fn step(pc: u64, op: &str, depth: u64, gas: u64, gas_cost: u64, stack: Vec<String>) -> Value {
    json!({
        "pc": pc,
        "op": op,
        "depth": depth,
        "gas": gas,
        "gasCost": gas_cost,
        "stack": stack,
        "memory": [],
    })
}

fn with_memory(mut step: Value, data: &[u8]) -> Value {
    step["memory"] = json!(memory(data));
    step
}

fn document(steps: Vec<Value>) -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": 1,
        "result": { "gas": 21000, "failed": false, "returnValue": "", "structLogs": steps }
    })
}

fn ctx(to: Address) -> TxContext {
    TxContext {
        from: CALLER,
        to: Some(to),
        block_timestamp: Some(1_700_000_000),
        ..Default::default()
    }
}

fn token_abi() -> JsonAbi {
    serde_json::from_value(json!([
        {"type":"function","name":"transfer","stateMutability":"nonpayable",
         "inputs":[{"name":"to","type":"address"},{"name":"amount","type":"uint256"}],
         "outputs":[{"name":"","type":"bool"}]},
        {"type":"error","name":"InsufficientBalance",
         "inputs":[{"name":"available","type":"uint256"}]}
    ]))
    .unwrap()
}

fn ops(trace: &CallTrace) -> Vec<OpKind> {
    trace.calls.iter().map(|call| call.call_type).collect()
}

/// Depth-0 CALL into TOKEN, which loads slot 1, writes it and reverts
fn child_revert_steps(revert_data: &[u8]) -> Vec<Value> {
    vec![
        with_memory(
            step(
                10,
                "CALL",
                0,
                100_000,
                700,
                stack(&[
                    U256::ZERO,
                    U256::ZERO,
                    U256::from(4),
                    U256::ZERO,
                    U256::ZERO,
                    word(TOKEN),
                    U256::from(50_000),
                ]),
            ),
            &hex!("a9059cbb"),
        ),
        {
            let mut sload = step(0, "SLOAD", 1, 49_000, 2_100, stack(&[U256::from(1)]));
            sload["storage"] = json!({
                "0000000000000000000000000000000000000000000000000000000000000001":
                    "0000000000000000000000000000000000000000000000000000000000000005"
            });
            sload
        },
        step(5, "SSTORE", 1, 46_900, 5_000, stack(&[U256::from(7), U256::from(1)])),
        with_memory(
            step(9, "REVERT", 1, 41_900, 0, stack(&[U256::from(revert_data.len()), U256::ZERO])),
            revert_data,
        ),
    ]
}

fn call_stack(target: Address, gas: u64) -> Vec<String> {
    stack(&[
        U256::ZERO,
        U256::ZERO,
        U256::ZERO,
        U256::ZERO,
        U256::ZERO,
        word(target),
        U256::from(gas),
    ])
}

#[test]
fn test_revert_in_child_frame() -> anyhow::Result<()> {
    let revert_data = hex::decode(INSUFFICIENT_BALANCE)?;
    let mut steps = child_revert_steps(&revert_data);
    steps.extend([
        step(11, "ISZERO", 0, 90_000, 3, stack(&[U256::ZERO])),
        step(12, "REVERT", 0, 89_997, 0, stack(&[U256::ZERO, U256::ZERO])),
    ]);

    let analysis = analyze_trace(&document(steps), &ctx(ROUTER), None, &TraceConfig::default())?;
    let output = &analysis.call_trace;
    let root = &output.call_trace;

    assert_eq!(ops(root), vec![OpKind::Call, OpKind::Revert]);
    assert_eq!(root.address, ROUTER);
    assert_eq!(root.from, CALLER);
    assert_eq!(root.gas, U256::from(100_000));
    assert_eq!(root.gas_used, U256::from(100_000 - 89_997));
    assert_eq!(root.block_timestamp, Some(1_700_000_000));
    assert_eq!(root.error.as_deref(), Some("Reverted"));
    assert!(!root.error_origin);

    let child = &root.calls[0];
    assert_eq!(child.trace_address, vec![0]);
    assert_eq!(child.address, TOKEN);
    assert_eq!(child.from, ROUTER);
    assert_eq!(child.caller_pc, Some(10));
    assert_eq!(child.absolute_position, 1);
    assert_eq!(child.input, Some(Bytes::from(hex!("a9059cbb").to_vec())));
    assert_eq!(child.value, None);
    assert_eq!(ops(child), vec![OpKind::SLoad, OpKind::SStore, OpKind::Revert]);

    // leaf costs add up to the frame's consumption
    assert_eq!(child.gas_used, U256::from(7_100));
    let leaf_gas = child
        .leaves()
        .fold(U256::ZERO, |total, leaf| total + leaf.gas_used);
    assert_eq!(leaf_gas, child.gas_used);

    let sload = &child.calls[0];
    assert_eq!(sload.trace_address, vec![0, 0]);
    assert_eq!(sload.storage_address, Some(TOKEN));
    assert_eq!(
        sload.storage_value_original.as_deref(),
        Some("0x0000000000000000000000000000000000000000000000000000000000000005")
    );

    let sstore = &child.calls[1];
    assert_eq!(
        sstore.storage_slot.as_deref(),
        Some("0x0000000000000000000000000000000000000000000000000000000000000001")
    );
    assert_eq!(
        sstore.storage_value_original.as_deref(),
        Some("0x0000000000000000000000000000000000000000000000000000000000000005")
    );
    assert_eq!(
        sstore.storage_value_dirty.as_deref(),
        Some("0x0000000000000000000000000000000000000000000000000000000000000007")
    );

    assert_eq!(child.error.as_deref(), Some("Insufficient balance"));
    assert_eq!(child.error_op.as_deref(), Some("REVERT"));
    assert_eq!(child.error_absolute_position, Some(3));
    assert_eq!(child.error_hex_data, Some(Bytes::from(revert_data.clone())));
    assert!(child.error_origin);

    // the root's own revert does not hide where the failure started
    assert_eq!(output.error_trace_address, Some(vec![0]));
    assert_eq!(output.stack_trace.len(), 2);
    assert_eq!(output.stack_trace[0].contract, ROUTER);
    assert!(!output.stack_trace[0].error_origin);
    assert_eq!(output.stack_trace[1].contract, TOKEN);
    assert_eq!(output.stack_trace[1].op, "REVERT");
    assert_eq!(
        output.stack_trace[1].error_message.as_deref(),
        Some("Insufficient balance")
    );
    assert!(output.stack_trace[1].error_origin);
    assert_eq!(root.find_error_trace(), Some(child));
    assert_eq!(root.at(&[0, 2]).map(|leaf| leaf.call_type), Some(OpKind::Revert));
    assert!(root.at(&[0, 3]).is_none());

    let failure = analysis.failure.expect("revert present");
    assert_eq!(failure.failing_node_id, "3-1-REVERT");
    assert_eq!(failure.failing_path, vec!["0-0-CALL", "3-1-REVERT"]);
    assert_eq!(failure.decoded_reason.as_deref(), Some("Insufficient balance"));
    Ok(())
}

#[test]
fn test_abi_decoding_and_delegatecall_context() -> anyhow::Result<()> {
    let recipient = address!("1f9840a85d5aF5bf1D1762F925BDADdC4201F984");
    let calldata = transferCall {
        to: recipient,
        amount: U256::from(2_500_000u64),
    }
    .abi_encode();
    let returned = U256::from(1).to_be_bytes::<32>();

    let steps = vec![
        with_memory(
            step(
                20,
                "CALL",
                1,
                200_000,
                100,
                stack(&[
                    U256::from(32),
                    U256::ZERO,
                    U256::from(calldata.len()),
                    U256::ZERO,
                    U256::ZERO,
                    word(TOKEN),
                    U256::from(150_000),
                ]),
            ),
            &calldata,
        ),
        step(0, "PUSH1", 2, 150_000, 3, stack(&[])),
        step(
            40,
            "DELEGATECALL",
            2,
            149_997,
            100,
            stack(&[
                U256::ZERO,
                U256::ZERO,
                U256::ZERO,
                U256::ZERO,
                word(LIBRARY),
                U256::from(100_000),
            ]),
        ),
        step(0, "SSTORE", 3, 100_000, 20_000, stack(&[U256::from(1), U256::from(2)])),
        step(1, "STOP", 3, 80_000, 0, stack(&[])),
        // 149_997 - 100 - 100_000 forwarded + 80_000 returned
        with_memory(
            step(50, "RETURN", 2, 129_897, 0, stack(&[U256::from(32), U256::ZERO])),
            &returned,
        ),
        // 200_000 - 100 - 150_000 forwarded + 129_897 returned
        step(21, "STOP", 1, 179_797, 0, stack(&[])),
    ];

    let registry = ContractRegistry::new()
        .with_abi(TOKEN, token_abi())
        .with_name(TOKEN, "Token");
    assert!(!registry.is_empty());
    let analysis = analyze_trace(
        &document(steps),
        &ctx(ROUTER),
        Some(&registry),
        &TraceConfig::default(),
    )?;
    let root = &analysis.call_trace.call_trace;

    let token = &root.calls[0];
    assert_eq!(token.contract_name.as_deref(), Some("Token"));
    assert_eq!(token.function_name.as_deref(), Some("transfer"));
    assert_eq!(token.function_pc, Some(0));
    assert_eq!(token.input, Some(Bytes::from(calldata.clone())));
    let args = token.decoded_input.as_ref().expect("decoded input");
    assert_eq!(args.len(), 2);
    assert_eq!(args[0].name, "to");
    assert_eq!(args[0].value, recipient.to_checksum(None));
    assert_eq!(args[1].name, "amount");
    assert_eq!(args[1].value, "2500000");
    assert_eq!(args[1].display, "2,500,000");

    assert_eq!(token.output, Some(Bytes::from(returned.to_vec())));
    let outputs = token.decoded_output.as_ref().expect("decoded output");
    assert_eq!(outputs[0].ty, "bool");
    assert_eq!(outputs[0].value, "true");
    // PUSH1 + DELEGATECALL own costs on top of the library frame
    assert_eq!(token.gas_used, U256::from(20_000 + 3 + 100));
    assert_eq!(root.gas_used, token.gas_used + U256::from(100));

    let library = &token.calls[0];
    assert_eq!(library.call_type, OpKind::DelegateCall);
    assert_eq!(library.trace_address, vec![0, 0]);
    assert_eq!(library.to, LIBRARY);
    assert_eq!(library.address, TOKEN);
    assert_eq!(library.from, TOKEN);
    assert_eq!(library.input, None);
    assert_eq!(library.gas_used, U256::from(20_000));

    let write = &library.calls[0];
    assert_eq!(write.trace_address, vec![0, 0, 0]);
    assert_eq!(write.storage_address, Some(TOKEN));
    assert_eq!(
        write.storage_value_original.as_deref(),
        Some("0x0000000000000000000000000000000000000000000000000000000000000000")
    );

    assert!(analysis.call_trace.stack_trace.is_empty());
    assert_eq!(analysis.call_trace.error_trace_address, None);
    assert!(analysis.failure.is_none());
    Ok(())
}

#[test]
fn test_propagated_panic_keeps_deepest_origin() -> anyhow::Result<()> {
    let panic = hex::decode(OVERFLOW_PANIC)?;
    let revert = |pc: u64, depth: u64, gas: u64| {
        with_memory(
            step(pc, "REVERT", depth, gas, 0, stack(&[U256::from(panic.len()), U256::ZERO])),
            &panic,
        )
    };
    let steps = vec![
        step(1, "CALL", 1, 100_000, 100, call_stack(TOKEN, 90_000)),
        step(2, "CALL", 2, 90_000, 100, call_stack(LIBRARY, 50_000)),
        revert(3, 3, 50_000),
        revert(4, 2, 80_000),
        revert(5, 1, 95_000),
    ];

    let analysis = analyze_trace(&document(steps), &ctx(ROUTER), None, &TraceConfig::default())?;
    let output = &analysis.call_trace;

    assert_eq!(output.error_trace_address, Some(vec![0, 0]));
    let contracts: Vec<Address> = output.stack_trace.iter().map(|entry| entry.contract).collect();
    assert_eq!(contracts, vec![ROUTER, TOKEN, LIBRARY]);
    let origins: Vec<bool> = output.stack_trace.iter().map(|entry| entry.error_origin).collect();
    assert_eq!(origins, vec![false, false, true]);

    for entry in &output.stack_trace {
        assert_eq!(entry.error.as_deref(), Some("Reverted"));
        assert_eq!(entry.error_message.as_deref(), Some("Panic: Arithmetic overflow"));
    }

    let token = &output.call_trace.calls[0];
    assert_eq!(ops(token), vec![OpKind::Call, OpKind::Revert]);
    assert_eq!(token.calls[1].trace_address, vec![0, 1]);
    assert_eq!(
        token.calls[0].decoded_error,
        Some(DecodedError::Panic {
            code: U256::from(0x11)
        })
    );
    Ok(())
}

#[test]
fn test_custom_error_resolved_by_name() -> anyhow::Result<()> {
    let mut payload = keccak256("InsufficientBalance(uint256)")[..4].to_vec();
    payload.extend_from_slice(&U256::from(3).to_be_bytes::<32>());

    let steps = vec![
        step(0, "PUSH1", 1, 30_000, 3, stack(&[])),
        with_memory(
            step(7, "REVERT", 1, 29_997, 0, stack(&[U256::from(payload.len()), U256::ZERO])),
            &payload,
        ),
    ];
    let registry = ContractRegistry::new().with_abi(TOKEN, token_abi());

    let analysis = analyze_trace(
        &document(steps),
        &ctx(TOKEN),
        Some(&registry),
        &TraceConfig::default(),
    )?;
    let output = &analysis.call_trace;
    let root = &output.call_trace;

    assert_eq!(output.error_trace_address, Some(vec![]));
    assert!(root.error_origin);
    assert_eq!(root.error_message.as_deref(), Some("InsufficientBalance"));
    match &root.decoded_error {
        Some(DecodedError::CustomError { name, .. }) => {
            assert_eq!(name.as_deref(), Some("InsufficientBalance"))
        }
        other => panic!("unexpected decoded error: {other:?}"),
    }
    assert_eq!(output.stack_trace.len(), 1);
    assert!(output.stack_trace[0].error_origin);

    let failure = analysis.failure.expect("revert present");
    assert_eq!(failure.custom_error_name.as_deref(), Some("InsufficientBalance"));
    assert_eq!(failure.decoded_error.message(), "InsufficientBalance");
    Ok(())
}

#[test]
fn test_call_without_frame_is_not_pushed() -> anyhow::Result<()> {
    // a CALL to an account without code never runs deeper
    let steps = vec![
        step(
            0,
            "CALL",
            1,
            10_000,
            100,
            stack(&[
                U256::ZERO,
                U256::ZERO,
                U256::ZERO,
                U256::ZERO,
                U256::from(1),
                word(TOKEN),
                U256::from(0),
            ]),
        ),
        step(1, "POP", 1, 9_900, 2, stack(&[U256::from(1)])),
        step(2, "STOP", 1, 9_898, 0, stack(&[])),
    ];
    let analysis = analyze_trace(&document(steps), &ctx(ROUTER), None, &TraceConfig::default())?;
    let root = &analysis.call_trace.call_trace;
    assert!(root.calls.is_empty());
    assert_eq!(root.gas_used, U256::from(102));
    Ok(())
}

#[test]
fn test_child_frame_open_at_end_of_trace() -> anyhow::Result<()> {
    let revert_data = hex::decode(INSUFFICIENT_BALANCE)?;
    let analysis = analyze_trace(
        &document(child_revert_steps(&revert_data)),
        &ctx(ROUTER),
        None,
        &TraceConfig::default(),
    )?;
    let output = &analysis.call_trace;
    let root = &output.call_trace;

    assert_eq!(ops(root), vec![OpKind::Call]);
    let child = &root.calls[0];
    assert_eq!(ops(child), vec![OpKind::SLoad, OpKind::SStore, OpKind::Revert]);
    // both frames close against the REVERT step's gas
    assert_eq!(child.gas_used, U256::from(49_000 - 41_900));
    assert_eq!(root.gas_used, U256::from(100_000 - 41_900));
    assert!(child.error_origin);
    assert!(!root.error_origin);

    assert_eq!(output.error_trace_address, Some(vec![0]));
    let contracts: Vec<Address> = output.stack_trace.iter().map(|entry| entry.contract).collect();
    assert_eq!(contracts, vec![ROUTER, TOKEN]);
    assert!(output.stack_trace[1].error_origin);
    Ok(())
}

#[test]
fn test_nested_frames_account_for_parent_gas() -> anyhow::Result<()> {
    // ROUTER -> TOKEN -> LIBRARY, then ROUTER -> LIBRARY; calls cost 100 on top
    // of the forwarded gas
    let steps = vec![
        step(0, "PUSH1", 1, 100_000, 3, stack(&[])),
        step(2, "CALL", 1, 99_997, 100, call_stack(TOKEN, 60_000)),
        step(0, "SLOAD", 2, 60_000, 2_100, stack(&[U256::from(1)])),
        step(1, "CALL", 2, 57_900, 100, call_stack(LIBRARY, 30_000)),
        step(0, "SSTORE", 3, 30_000, 5_000, stack(&[U256::from(1), U256::from(1)])),
        step(1, "STOP", 3, 25_000, 0, stack(&[])),
        step(2, "POP", 2, 52_800, 2, stack(&[U256::from(1)])),
        step(3, "STOP", 2, 52_798, 0, stack(&[])),
        step(3, "CALL", 1, 92_695, 100, call_stack(LIBRARY, 10_000)),
        step(0, "SLOAD", 2, 10_000, 2_100, stack(&[U256::from(1)])),
        step(1, "STOP", 2, 7_900, 0, stack(&[])),
        step(4, "STOP", 1, 90_495, 0, stack(&[])),
    ];
    let analysis = analyze_trace(&document(steps), &ctx(ROUTER), None, &TraceConfig::default())?;
    let root = &analysis.call_trace.call_trace;

    let subcalls_gas = |trace: &CallTrace| {
        trace
            .subcalls()
            .fold(U256::ZERO, |total, call| total + call.gas_used)
    };

    let token = &root.calls[0];
    let inner = token.subcalls().next().expect("inner call");
    let sibling = &root.calls[1];
    assert_eq!(inner.trace_address, vec![0, 1]);
    assert_eq!(sibling.trace_address, vec![1]);

    assert_eq!(inner.gas_used, U256::from(5_000));
    assert_eq!(sibling.gas_used, U256::from(2_100));
    // SLOAD + CALL + POP
    assert_eq!(token.gas_used, subcalls_gas(token) + U256::from(2_100 + 100 + 2));
    // PUSH1 + two CALLs
    assert_eq!(root.gas_used, subcalls_gas(root) + U256::from(3 + 100 + 100));
    assert_eq!(root.gas_used, U256::from(100_000 - 90_495));

    assert!(analysis.call_trace.stack_trace.is_empty());
    let tree = &analysis.tree;
    let first_call = tree.node(tree.roots[0]).expect("root node");
    assert_eq!(first_call.id, "1-1-CALL");
    assert!(tree.node(tree.nodes.len()).is_none());
    Ok(())
}

#[test]
fn test_caught_revert_does_not_hide_later_failure() -> anyhow::Result<()> {
    let revert_data = hex::decode(INSUFFICIENT_BALANCE)?;
    let mut steps = child_revert_steps(&revert_data);
    // the router swallows the failure, writes state and then reverts itself
    steps.extend([
        step(11, "SSTORE", 0, 90_000, 2_900, stack(&[U256::from(1), U256::from(9)])),
        step(12, "REVERT", 0, 87_100, 0, stack(&[U256::ZERO, U256::ZERO])),
    ]);

    let analysis = analyze_trace(&document(steps), &ctx(ROUTER), None, &TraceConfig::default())?;
    let output = &analysis.call_trace;
    let root = &output.call_trace;

    assert_eq!(output.error_trace_address, Some(vec![]));
    assert!(root.error_origin);
    assert!(!root.calls[0].error_origin);
    assert_eq!(output.stack_trace.len(), 1);
    assert_eq!(output.stack_trace[0].contract, ROUTER);
    Ok(())
}
