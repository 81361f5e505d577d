pub use crate::execution_engine::{
    ExecutionEngine, ExecutionPayloadParams, MockExecutionEngine, NullExecutionEngine,
};

mod execution_engine;
