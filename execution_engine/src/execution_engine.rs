#![expect(clippy::module_name_repetitions)]

use std::sync::Arc;

use anyhow::{ensure, Result};
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;
use types::{
    deneb::primitives::VersionedHash,
    phase0::primitives::{ExecutionBlockHash, H256},
    preset::Preset,
    traits::ExecutionPayload,
};

/// Extra parameters passed along with Deneb payloads.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum ExecutionPayloadParams {
    Deneb {
        versioned_hashes: Vec<VersionedHash>,
        parent_beacon_block_root: H256,
    },
}

pub trait ExecutionEngine<P: Preset> {
    const IS_NULL: bool;

    /// Hands a payload to the execution layer.
    ///
    /// Returns an error if the execution layer considers the payload invalid.
    fn notify_new_payload(
        &self,
        beacon_block_root: H256,
        payload: &dyn ExecutionPayload<P>,
        params: Option<ExecutionPayloadParams>,
    ) -> Result<()>;
}

impl<P: Preset, E: ExecutionEngine<P>> ExecutionEngine<P> for &E {
    const IS_NULL: bool = E::IS_NULL;

    fn notify_new_payload(
        &self,
        beacon_block_root: H256,
        payload: &dyn ExecutionPayload<P>,
        params: Option<ExecutionPayloadParams>,
    ) -> Result<()> {
        (*self).notify_new_payload(beacon_block_root, payload, params)
    }
}

impl<P: Preset, E: ExecutionEngine<P>> ExecutionEngine<P> for Arc<E> {
    const IS_NULL: bool = E::IS_NULL;

    fn notify_new_payload(
        &self,
        beacon_block_root: H256,
        payload: &dyn ExecutionPayload<P>,
        params: Option<ExecutionPayloadParams>,
    ) -> Result<()> {
        self.as_ref()
            .notify_new_payload(beacon_block_root, payload, params)
    }
}

#[derive(Clone, Copy)]
pub struct NullExecutionEngine;

impl<P: Preset> ExecutionEngine<P> for NullExecutionEngine {
    const IS_NULL: bool = true;

    fn notify_new_payload(
        &self,
        _beacon_block_root: H256,
        _payload: &dyn ExecutionPayload<P>,
        _params: Option<ExecutionPayloadParams>,
    ) -> Result<()> {
        Ok(())
    }
}

/// Accepts or rejects every payload and remembers the ones it was notified of.
#[derive(Default)]
pub struct MockExecutionEngine {
    execution_valid: bool,
    notified_payloads: Mutex<Vec<(ExecutionBlockHash, Option<ExecutionPayloadParams>)>>,
}

impl<P: Preset> ExecutionEngine<P> for MockExecutionEngine {
    const IS_NULL: bool = false;

    fn notify_new_payload(
        &self,
        beacon_block_root: H256,
        payload: &dyn ExecutionPayload<P>,
        params: Option<ExecutionPayloadParams>,
    ) -> Result<()> {
        let block_hash = payload.block_hash();

        debug!(
            "mock execution engine notified of payload {block_hash} \
             (beacon block root: {beacon_block_root}, valid: {})",
            self.execution_valid,
        );

        self.notified_payloads.lock().push((block_hash, params));

        ensure!(self.execution_valid, Error { block_hash });

        Ok(())
    }
}

impl MockExecutionEngine {
    #[must_use]
    pub fn new(execution_valid: bool) -> Self {
        Self {
            execution_valid,
            notified_payloads: Mutex::default(),
        }
    }

    #[must_use]
    pub fn notified_payloads(&self) -> Vec<(ExecutionBlockHash, Option<ExecutionPayloadParams>)> {
        self.notified_payloads.lock().clone()
    }
}

#[derive(Debug, Error)]
#[error("execution payload {block_hash} not valid")]
struct Error {
    block_hash: ExecutionBlockHash,
}
