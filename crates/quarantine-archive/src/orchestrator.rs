use std::path::Path;
use std::sync::Arc;

use quarantine_fs::Removal;
use quarantine_platform::{ProcessRunner, ResolverChain, SystemRunner, ToolResolver};

use crate::data::{AttemptRecord, ExtractOptions, ExtractionResult};
use crate::detect::{self, ContainerKind};
use crate::error::{ExtractError, Result, StrategyError};
use crate::observer::{Observer, TracingObserver};
use crate::strategy::{AttemptContext, NativeToolDecoder, StandardDecoder, Strategy, StrongCipherDecoder};

/// Drives the strategy chain for one archive at a time.
///
/// Holds no per-request state, so a single instance can serve concurrent
/// requests; each request gets its own staging directory.
pub struct Orchestrator {
    options: ExtractOptions,
    strategies: Vec<Box<dyn Strategy>>,
    observer: Arc<dyn Observer>,
}

impl Orchestrator {
    /// Production wiring: the three decoders, the standard resolver chain,
    /// real subprocesses and `tracing` diagnostics.
    pub fn new(options: ExtractOptions) -> Self { Self::builder().options(options).build() }

    pub fn builder() -> OrchestratorBuilder { OrchestratorBuilder::default() }

    pub fn options(&self) -> &ExtractOptions { &self.options }

    /// Extract `archive` into a fresh staging directory.
    ///
    /// Strategies run in order. Only an `UnsupportedEncryption` failure moves
    /// on to the next one; any other failure ends the request. When every
    /// attempt failed the most specific failure is returned and the staging
    /// directory is already gone.
    pub fn extract(&self, archive: &Path, password: Option<&str>) -> Result<ExtractionResult> {
        let container = match detect::sniff_file(archive) {
            Ok(ContainerKind::Empty) => {
                return Err(self.fail(StrategyError::corrupt("archive is empty"), Vec::new()));
            }
            Ok(container) => container,
            Err(e) => {
                let error = StrategyError::other(format!("cannot read '{}': {e}", archive.display()));
                return Err(self.fail(error, Vec::new()));
            }
        };
        self.observer.container_detected(archive, container);

        let mut staging = self
            .options
            .staging_root
            .allocate()
            .map_err(|e| self.fail(StrategyError::from(e), Vec::new()))?;
        self.observer.staging_allocated(staging.path());

        let ctx = AttemptContext {
            limits: &self.options.limits,
            observer: self.observer.as_ref(),
        };
        let mut attempts = Vec::new();

        for strategy in &self.strategies {
            let kind = strategy.kind();
            if !strategy.handles(container) {
                let error = StrategyError::unsupported(format!("{container} container is not handled in-process"));
                self.observer.attempt_failed(kind, &error);
                attempts.push(AttemptRecord { strategy: kind, error });
                continue;
            }

            self.observer.attempt_started(kind, archive, password.is_some());
            match strategy.attempt(archive, password, staging.path(), &ctx) {
                Ok(files) => {
                    self.observer.attempt_succeeded(kind, files.len());
                    return Ok(ExtractionResult::new(files, staging, kind, container, attempts));
                }
                Err(error) => {
                    self.observer.attempt_failed(kind, &error);
                    let escalate = error.kind().escalates();
                    attempts.push(AttemptRecord { strategy: kind, error });
                    if !escalate {
                        break;
                    }
                }
            }
        }

        let error = most_specific(&attempts)
            .cloned()
            .unwrap_or_else(|| StrategyError::other("no extraction strategy is configured"));

        if let Removal::Failed(reason) = staging.cleanup() {
            self.observer.cleanup_failed(staging.path(), &reason);
        }
        Err(self.fail(error, attempts))
    }

    fn fail(&self, error: StrategyError, attempts: Vec<AttemptRecord>) -> ExtractError {
        self.observer.extraction_failed(&error);
        ExtractError::new(error, attempts)
    }
}

/// Highest ranked failure; on a tie the later attempt wins.
pub fn most_specific(attempts: &[AttemptRecord]) -> Option<&StrategyError> {
    attempts
        .iter()
        .map(|attempt| &attempt.error)
        .max_by_key(|error| error.kind().rank())
}

#[derive(Default)]
pub struct OrchestratorBuilder {
    options: ExtractOptions,
    strategies: Option<Vec<Box<dyn Strategy>>>,
    observer: Option<Arc<dyn Observer>>,
    resolver: Option<Arc<dyn ToolResolver>>,
    runner: Option<Arc<dyn ProcessRunner>>,
}

impl OrchestratorBuilder {
    pub fn options(mut self, options: ExtractOptions) -> Self {
        self.options = options;
        self
    }

    /// Replace the default strategy chain entirely.
    pub fn strategies(mut self, strategies: Vec<Box<dyn Strategy>>) -> Self {
        self.strategies = Some(strategies);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Native tool lookup used by the default chain.
    pub fn resolver(mut self, resolver: Arc<dyn ToolResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Subprocess runner used by the default chain.
    pub fn runner(mut self, runner: Arc<dyn ProcessRunner>) -> Self {
        self.runner = Some(runner);
        self
    }

    pub fn build(self) -> Orchestrator {
        let Self {
            options,
            strategies,
            observer,
            resolver,
            runner,
        } = self;

        let strategies = strategies.unwrap_or_else(|| {
            let native = match (resolver, runner) {
                (None, None) => NativeToolDecoder::system(options.native.clone()),
                (resolver, runner) => {
                    let resolver = resolver
                        .unwrap_or_else(|| Arc::new(ResolverChain::standard(options.native.override_env.clone())));
                    let runner = runner.unwrap_or_else(|| Arc::new(SystemRunner));
                    NativeToolDecoder::new(resolver, runner, options.native.clone())
                }
            };
            let defaults: Vec<Box<dyn Strategy>> =
                vec![Box::new(StandardDecoder), Box::new(StrongCipherDecoder), Box::new(native)];
            defaults
        });

        Orchestrator {
            options,
            strategies,
            observer: observer.unwrap_or_else(|| Arc::new(TracingObserver)),
        }
    }
}
