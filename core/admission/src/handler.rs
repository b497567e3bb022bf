use crate::error::AdmissionError;
use meridian_primitives::Address;
use meridian_state::ChainState;
use std::sync::Arc;
use tracing::debug;

/// Which engine pass is driving the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassKind {
    /// Mempool admission. State writes made under this pass are discarded
    /// by the caller.
    Speculative,
    /// Block application. State writes persist when the transaction
    /// succeeds.
    Commit,
}

impl PassKind {
    pub fn is_speculative(self) -> bool {
        matches!(self, PassKind::Speculative)
    }
}

/// Per-transaction processing context. The origin is attached once by the
/// signature stage and is read-only afterwards.
#[derive(Debug, Clone)]
pub struct TxContext {
    pass: PassKind,
    origin: Option<Address>,
}

impl TxContext {
    pub fn new(pass: PassKind) -> Self {
        TxContext { pass, origin: None }
    }

    pub fn pass(&self) -> PassKind {
        self.pass
    }

    pub fn origin(&self) -> Option<&Address> {
        self.origin.as_ref()
    }

    pub fn set_origin(&mut self, origin: Address) -> Result<(), AdmissionError> {
        if self.origin.is_some() {
            return Err(AdmissionError::Collaborator(anyhow::anyhow!(
                "transaction origin already set"
            )));
        }
        self.origin = Some(origin);
        Ok(())
    }

    /// The resolved origin, rejecting transactions whose sender could not
    /// be established.
    pub fn require_origin(&self) -> Result<&Address, AdmissionError> {
        match &self.origin {
            Some(origin) if !origin.is_empty() => Ok(origin),
            _ => Err(AdmissionError::MissingOrigin),
        }
    }
}

/// Outcome handed back to the engine when a transaction clears the whole
/// pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TxResult {
    pub data: Vec<u8>,
    pub info: String,
    pub events: Vec<TxEvent>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TxEvent {
    pub key: String,
    pub value: String,
}

/// Terminal of the pipeline: hands the fully unwrapped payload to an
/// execution seam.
pub trait TxHandler: Send + Sync {
    fn handle(
        &self,
        state: &mut dyn ChainState,
        ctx: &mut TxContext,
        tx: &[u8],
    ) -> Result<TxResult, AdmissionError>;
}

impl<F> TxHandler for F
where
    F: Fn(&mut dyn ChainState, &mut TxContext, &[u8]) -> Result<TxResult, AdmissionError>
        + Send
        + Sync,
{
    fn handle(
        &self,
        state: &mut dyn ChainState,
        ctx: &mut TxContext,
        tx: &[u8],
    ) -> Result<TxResult, AdmissionError> {
        self(state, ctx, tx)
    }
}

/// One pipeline stage. A stage inspects or unwraps its own envelope layer
/// and either rejects the transaction or invokes the continuation with the
/// bytes the next stage expects.
pub trait TxMiddleware: Send + Sync {
    fn handle(
        &self,
        state: &mut dyn ChainState,
        ctx: &mut TxContext,
        tx: &[u8],
        next: Next<'_>,
    ) -> Result<TxResult, AdmissionError>;
}

/// Runs after the terminal handler succeeded, in registration order. A
/// hook error fails the transaction.
pub trait PostTxHook: Send + Sync {
    fn after(
        &self,
        state: &mut dyn ChainState,
        ctx: &TxContext,
        tx: &[u8],
        result: &TxResult,
    ) -> Result<(), AdmissionError>;
}

/// Continuation over the remaining stages plus the terminal handler.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    stages: &'a [Arc<dyn TxMiddleware>],
    terminal: &'a dyn TxHandler,
}

impl<'a> Next<'a> {
    pub fn run(
        self,
        state: &mut dyn ChainState,
        ctx: &mut TxContext,
        tx: &[u8],
    ) -> Result<TxResult, AdmissionError> {
        match self.stages.split_first() {
            Some((stage, rest)) => stage.handle(
                state,
                ctx,
                tx,
                Next {
                    stages: rest,
                    terminal: self.terminal,
                },
            ),
            None => self.terminal.handle(state, ctx, tx),
        }
    }
}

/// Ordered admission pipeline. Stages run first to last, then the terminal
/// handler, then the post hooks.
pub struct Pipeline {
    stages: Vec<Arc<dyn TxMiddleware>>,
    hooks: Vec<Arc<dyn PostTxHook>>,
    terminal: Arc<dyn TxHandler>,
}

impl Pipeline {
    pub fn builder(terminal: Arc<dyn TxHandler>) -> PipelineBuilder {
        PipelineBuilder {
            stages: Vec::new(),
            hooks: Vec::new(),
            terminal,
        }
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }

    pub fn process(
        &self,
        state: &mut dyn ChainState,
        pass: PassKind,
        tx: &[u8],
    ) -> Result<TxResult, AdmissionError> {
        let mut ctx = TxContext::new(pass);
        let next = Next {
            stages: &self.stages,
            terminal: self.terminal.as_ref(),
        };
        let result = next.run(state, &mut ctx, tx)?;
        for hook in &self.hooks {
            hook.after(state, &ctx, tx, &result)?;
        }
        debug!(pass = ?pass, origin = ?ctx.origin(), "transaction admitted");
        Ok(result)
    }
}

pub struct PipelineBuilder {
    stages: Vec<Arc<dyn TxMiddleware>>,
    hooks: Vec<Arc<dyn PostTxHook>>,
    terminal: Arc<dyn TxHandler>,
}

impl PipelineBuilder {
    pub fn stage(mut self, stage: Arc<dyn TxMiddleware>) -> Self {
        self.stages.push(stage);
        self
    }

    pub fn hook(mut self, hook: Arc<dyn PostTxHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            stages: self.stages,
            hooks: self.hooks,
            terminal: self.terminal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_primitives::{ChainId, LocalAddress};
    use meridian_state::{BlockContext, MemStore, StoreState};
    use parking_lot::Mutex;

    fn test_state(store: &mut MemStore) -> StoreState<'_> {
        StoreState::new(store, BlockContext::new(1, 0, ChainId::new("meridian")))
    }

    fn ok_terminal() -> Arc<dyn TxHandler> {
        Arc::new(
            |_: &mut dyn ChainState, _: &mut TxContext, tx: &[u8]| {
                Ok(TxResult {
                    data: tx.to_vec(),
                    info: "ok".to_string(),
                    events: vec![],
                })
            },
        )
    }

    struct Recorder {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
        fail: bool,
    }

    impl TxMiddleware for Recorder {
        fn handle(
            &self,
            state: &mut dyn ChainState,
            ctx: &mut TxContext,
            tx: &[u8],
            next: Next<'_>,
        ) -> Result<TxResult, AdmissionError> {
            self.log.lock().push(self.name);
            if self.fail {
                return Err(AdmissionError::MissingOrigin);
            }
            next.run(state, ctx, tx)
        }
    }

    struct HookRecorder {
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl PostTxHook for HookRecorder {
        fn after(
            &self,
            _state: &mut dyn ChainState,
            _ctx: &TxContext,
            _tx: &[u8],
            _result: &TxResult,
        ) -> Result<(), AdmissionError> {
            self.log.lock().push("hook");
            Ok(())
        }
    }

    #[test]
    fn test_stages_run_in_registration_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder(ok_terminal())
            .stage(Arc::new(Recorder { name: "first", log: log.clone(), fail: false }))
            .stage(Arc::new(Recorder { name: "second", log: log.clone(), fail: false }))
            .hook(Arc::new(HookRecorder { log: log.clone() }))
            .build();
        assert_eq!(pipeline.stage_count(), 2);
        assert_eq!(pipeline.hook_count(), 1);

        let mut store = MemStore::new();
        let mut state = test_state(&mut store);
        let result = pipeline
            .process(&mut state, PassKind::Speculative, b"payload")
            .unwrap();

        assert_eq!(result.data, b"payload".to_vec());
        assert_eq!(*log.lock(), vec!["first", "second", "hook"]);
    }

    #[test]
    fn test_failed_stage_short_circuits_and_skips_hooks() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder(ok_terminal())
            .stage(Arc::new(Recorder { name: "first", log: log.clone(), fail: true }))
            .stage(Arc::new(Recorder { name: "second", log: log.clone(), fail: false }))
            .hook(Arc::new(HookRecorder { log: log.clone() }))
            .build();

        let mut store = MemStore::new();
        let mut state = test_state(&mut store);
        let result = pipeline.process(&mut state, PassKind::Commit, b"payload");

        assert!(matches!(result, Err(AdmissionError::MissingOrigin)));
        assert_eq!(*log.lock(), vec!["first"]);
    }

    #[test]
    fn test_origin_is_write_once() {
        let mut ctx = TxContext::new(PassKind::Commit);
        assert!(ctx.require_origin().is_err());

        let origin = Address::new(ChainId::new("meridian"), LocalAddress::new([1u8; 20]));
        ctx.set_origin(origin.clone()).unwrap();
        assert_eq!(ctx.require_origin().unwrap(), &origin);

        let another = Address::new(ChainId::new("meridian"), LocalAddress::new([2u8; 20]));
        assert!(ctx.set_origin(another).is_err());
    }

    #[test]
    fn test_empty_origin_is_rejected() {
        let mut ctx = TxContext::new(PassKind::Speculative);
        ctx.set_origin(Address::new(ChainId::new("meridian"), LocalAddress::zero()))
            .unwrap();
        assert!(matches!(
            ctx.require_origin(),
            Err(AdmissionError::MissingOrigin)
        ));
    }
}
