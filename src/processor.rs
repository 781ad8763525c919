//! Trace processing pipeline
//!
//! Drives inspectors over a step sequence and wires the whole analysis:
//! normalization, the generic tree with its failure summary, the nested
//! call trace and aggregate metadata.
//!
//! Each run owns its inspectors, so independent transactions can be
//! analyzed concurrently without shared state.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::TraceConfig;
use crate::errors::TraceError;
use crate::inspectors::{CallInspector, TreeInspector};
use crate::raw_trace::parse_raw_trace;
use crate::traits::{Step, TraceInspector};
use crate::types::*;

/// Runs one inspector over a step sequence
///
/// # Arguments
/// * `steps` - Normalized struct logs in execution order
/// * `inspector` - Builder to drive; its previous state is discarded
///
/// # Returns
/// The inspector's output for this sequence
///
/// # Implementation Details
/// 1. Resets inspector state
/// 2. Calls `begin` with the first step
/// 3. Calls `step` for every struct log with its neighbours
/// 4. Calls `finish` with the last step and collects the output
pub fn process_steps<I>(steps: &[StructLog], inspector: &mut I) -> I::Output
where
    I: TraceInspector,
{
    inspector.reset();
    inspector.begin(steps.first());
    for (index, log) in steps.iter().enumerate() {
        let step = Step {
            index,
            log,
            prev: index.checked_sub(1).and_then(|prev| steps.get(prev)),
            next: steps.get(index + 1),
        };
        inspector.step(&step);
    }
    inspector.finish(steps.last());
    inspector.get_output()
}

/// Everything reconstructed from one transaction trace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceAnalysis {
    /// Overall gas reported by the tracer
    pub gas: U256,
    pub return_value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed: Option<bool>,
    pub call_trace: CallTraceOutput,
    pub tree: GenericTraceTree,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureInfo>,
    pub metadata: TraceMetadata,
}

/// Analyzes a raw `debug_traceTransaction` document
///
/// # Arguments
/// * `document` - JSON-RPC envelope or bare struct-log result
/// * `ctx` - Transaction hash, sender, target, input and timestamp
/// * `registry` - Optional per-address ABIs and names
/// * `config` - Reconstruction options
///
/// # Returns
/// * `Ok(TraceAnalysis)` - Call trace, generic tree, failure and metadata
/// * `Err(TraceError::MalformedInput)` - If the document has no struct logs
pub fn analyze_trace(
    document: &Value,
    ctx: &TxContext,
    registry: Option<&ContractRegistry>,
    config: &TraceConfig,
) -> Result<TraceAnalysis, TraceError> {
    let trace = parse_raw_trace(document)?;
    let mut analysis = analyze_steps(&trace.struct_logs, ctx, registry, config);
    analysis.gas = trace.gas;
    analysis.return_value = trace.return_value;
    analysis.failed = trace.failed;

    if analysis.failed == Some(true) && analysis.call_trace.stack_trace.is_empty() {
        warn!(hash = %ctx.hash, "trace marked as failed but no revert was found");
    }
    Ok(analysis)
}

/// Copies a custom error name resolved on the call trace's origin frame
fn with_origin_error_name(mut failure: FailureInfo, call_trace: &CallTrace) -> FailureInfo {
    if let Some(DecodedError::CustomError {
        selector,
        name: Some(name),
    }) = call_trace
        .find_error_trace()
        .and_then(|origin| origin.decoded_error.as_ref())
    {
        failure.resolve_custom_error_name(*selector, name);
    }
    failure
}

/// Analyzes already normalized struct logs
///
/// `gas` and `return_value` are left at their defaults since they only
/// exist in the raw document.
pub fn analyze_steps(
    steps: &[StructLog],
    ctx: &TxContext,
    registry: Option<&ContractRegistry>,
    config: &TraceConfig,
) -> TraceAnalysis {
    let mut tree_inspector = TreeInspector::with_config(config);
    let tree = process_steps(steps, &mut tree_inspector);
    let failure = tree.find_failure();

    let mut call_inspector = CallInspector::new(ctx).with_config(config.clone());
    if let Some(registry) = registry {
        call_inspector = call_inspector.with_registry(registry);
    }
    let call_trace = process_steps(steps, &mut call_inspector);
    let failure = failure.map(|failure| with_origin_error_name(failure, &call_trace.call_trace));

    let metadata = TraceMetadata::from_steps(steps);
    debug!(
        steps = metadata.total_steps,
        max_depth = metadata.max_depth,
        nodes = tree.nodes.len(),
        failed_at = ?call_trace.error_trace_address,
        "trace analyzed"
    );

    TraceAnalysis {
        gas: U256::ZERO,
        return_value: "0x".to_string(),
        failed: None,
        call_trace,
        tree,
        failure,
        metadata,
    }
}
