//! Fault injection for the fan-out agent services.
//!
//! - [`FaultDirective`]: what to simulate at one hop, as sent on the wire.
//! - [`FaultInjector`]: applies a directive where a hop does its real work.
//! - [`FaultWeights`]: weighted random choice of fault types for the canary.
//!
//! Simulated failures are data ([`SimulatedFault`]), never panics or
//! transport errors.

pub mod directive;
pub mod injector;
pub mod weights;

pub use directive::{DirectiveError, FaultDirective, FaultKind, FaultParams};
pub use injector::{
    truncate_payload, FaultClass, FaultInjector, FinishReason, HopOutput, InjectorConfig,
    Injection, Intercept, SimulatedFault, ToolCall, ToolExecution, Toolbox,
};
pub use weights::{FaultWeights, WeightsError, WEIGHT_TOLERANCE};
