use crate::error::AdmissionError;
use crate::handler::{TxContext, TxHandler, TxResult};
use meridian_primitives::{CallTx, DeployTx, MigrationTx, TaggedTx, TxKind, VmKind};
use meridian_state::ChainState;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Execution seam an engine registers per VM.
pub trait VmDispatch: Send + Sync {
    fn deploy(
        &self,
        state: &mut dyn ChainState,
        ctx: &TxContext,
        tx: &DeployTx,
    ) -> Result<TxResult, AdmissionError>;

    fn call(
        &self,
        state: &mut dyn ChainState,
        ctx: &TxContext,
        tx: &CallTx,
    ) -> Result<TxResult, AdmissionError>;
}

/// Seam for chain migrations.
pub trait MigrationDispatch: Send + Sync {
    fn migrate(
        &self,
        state: &mut dyn ChainState,
        ctx: &TxContext,
        tx: &MigrationTx,
    ) -> Result<TxResult, AdmissionError>;
}

/// Terminal pipeline handler. Unwraps the tagged envelope and dispatches
/// on kind and target VM. Unregistered routes are a rejection, not a
/// panic.
#[derive(Default)]
pub struct TxRouter {
    vms: HashMap<VmKind, Arc<dyn VmDispatch>>,
    migrations: Option<Arc<dyn MigrationDispatch>>,
}

impl TxRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_vm(&mut self, vm: VmKind, dispatch: Arc<dyn VmDispatch>) {
        self.vms.insert(vm, dispatch);
    }

    pub fn register_migrations(&mut self, dispatch: Arc<dyn MigrationDispatch>) {
        self.migrations = Some(dispatch);
    }

    pub fn with_vm(mut self, vm: VmKind, dispatch: Arc<dyn VmDispatch>) -> Self {
        self.register_vm(vm, dispatch);
        self
    }

    pub fn with_migrations(mut self, dispatch: Arc<dyn MigrationDispatch>) -> Self {
        self.register_migrations(dispatch);
        self
    }
}

impl TxHandler for TxRouter {
    fn handle(
        &self,
        state: &mut dyn ChainState,
        ctx: &mut TxContext,
        tx: &[u8],
    ) -> Result<TxResult, AdmissionError> {
        let tagged = TaggedTx::decode(tx).map_err(|e| AdmissionError::malformed("tagged", e))?;
        match tagged.kind {
            TxKind::Deploy => {
                let deploy = DeployTx::decode(&tagged.body)
                    .map_err(|e| AdmissionError::malformed("deploy", e))?;
                let dispatch = self.vms.get(&deploy.vm).ok_or(AdmissionError::Unrouted {
                    kind: TxKind::Deploy,
                    vm: Some(deploy.vm),
                })?;
                debug!(vm = ?deploy.vm, "routing deploy");
                dispatch.deploy(state, ctx, &deploy)
            }
            TxKind::Call => {
                let call = CallTx::decode(&tagged.body)
                    .map_err(|e| AdmissionError::malformed("call", e))?;
                let dispatch = self.vms.get(&call.vm).ok_or(AdmissionError::Unrouted {
                    kind: TxKind::Call,
                    vm: Some(call.vm),
                })?;
                debug!(vm = ?call.vm, "routing call");
                dispatch.call(state, ctx, &call)
            }
            TxKind::Migration => {
                let migration = MigrationTx::decode(&tagged.body)
                    .map_err(|e| AdmissionError::malformed("migration", e))?;
                let dispatch = self.migrations.as_ref().ok_or(AdmissionError::Unrouted {
                    kind: TxKind::Migration,
                    vm: None,
                })?;
                dispatch.migrate(state, ctx, &migration)
            }
        }
    }
}
