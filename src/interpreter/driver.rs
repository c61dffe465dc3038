use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::{Duration, Instant};
use crate::interpreter::ast::Node;
use crate::interpreter::environment::Environment;
use crate::interpreter::evaluator::{EvalError, Evaluator, Step, DEFAULT_MAX_CALL_DEPTH};
use crate::interpreter::host::{Host, Scheduler};
use crate::interpreter::value::Value;


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverConfig {
    /// Pause after this many loop passes. Zero disables step-based pausing.
    pub pause_interval: u64,
    /// Pause at the first loop pass after this much time has been spent in one quantum.
    pub quantum_budget: Duration,
    pub max_call_depth: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfig {
            pause_interval: 5000,
            quantum_budget: Duration::from_millis(100),
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
        }
    }
}

/// Shared cancellation flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Rc<Cell<bool>>);

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseReason {
    StepInterval,
    TimeBudget,
}

/// What one call to [`Execution::resume`] ended with.
#[derive(Debug, Clone, PartialEq)]
pub enum Quantum {
    Paused(PauseReason),
    Finished(Value),
    Failed(EvalError),
    Cancelled,
}

impl Quantum {
    pub fn is_final(&self) -> bool {
        !matches!(self, Quantum::Paused(_))
    }
}

/// A program run that can be resumed quantum by quantum. Pausing only ever happens after a
/// complete `while` pass, so an interrupted run observes the same order of effects as an
/// uninterrupted one.
pub struct Execution {
    evaluator: Option<Evaluator>,
    host: Host,
    config: DriverConfig,

    cancel: CancelToken,
    steps: u64,
    quanta: usize,
    outcome: Option<Quantum>,
}

impl Execution {
    pub fn new(program: Vec<Node>, host: Host, config: DriverConfig) -> Execution {
        let evaluator = Evaluator::new(program.into(), Environment::new_global(), config.max_call_depth);

        Execution {
            evaluator: Some(evaluator),
            host,
            config,

            cancel: CancelToken::new(),
            steps: 0,
            quanta: 0,
            outcome: None,
        }
    }

    /// Uses `token` instead of a fresh one, so it can be handed out before the run starts.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Execution {
        self.cancel = token;
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Loop passes completed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn quanta(&self) -> usize {
        self.quanta
    }

    /// The final outcome, once the run has finished, failed or been cancelled.
    pub fn outcome(&self) -> Option<&Quantum> {
        self.outcome.as_ref()
    }

    /// Runs until the next pause, or to the end. Calling this again after a final outcome
    /// returns that outcome unchanged.
    pub fn resume(&mut self) -> Quantum {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }

        if self.cancel.is_cancelled() {
            return self.finish(Quantum::Cancelled);
        }

        self.quanta += 1;
        let started = Instant::now();

        loop {
            let step = match self.evaluator.as_mut() {
                Some(evaluator) => evaluator.run(&mut self.host),
                None => return self.finish(Quantum::Cancelled),
            };

            match step {
                Ok(Step::Done(value)) => return self.finish(Quantum::Finished(value)),
                Err(err) => return self.finish(Quantum::Failed(err)),
                Ok(Step::LoopPass) => {
                    self.steps += 1;

                    if self.cancel.is_cancelled() {
                        return self.finish(Quantum::Cancelled);
                    }

                    if self.config.pause_interval > 0 && self.steps % self.config.pause_interval == 0 {
                        log::debug!("Quantum {} paused after {} loop passes", self.quanta, self.steps);
                        return Quantum::Paused(PauseReason::StepInterval);
                    }

                    if started.elapsed() >= self.config.quantum_budget {
                        log::debug!("Quantum {} used its time budget of {:?}", self.quanta, self.config.quantum_budget);
                        return Quantum::Paused(PauseReason::TimeBudget);
                    }
                },
            }
        }
    }

    fn finish(&mut self, outcome: Quantum) -> Quantum {
        // Remaining frames and environments are dropped here
        self.evaluator = None;

        match &outcome {
            Quantum::Finished(_) => log::debug!("Program finished after {} quanta", self.quanta),
            Quantum::Failed(err) => log::debug!("Program failed in quantum {}: {}", self.quanta, err),
            Quantum::Cancelled => log::debug!("Program cancelled after {} loop passes", self.steps),
            Quantum::Paused(_) => {},
        }

        self.outcome = Some(outcome.clone());
        outcome
    }
}

/// Runs programs cooperatively: the first quantum runs immediately, later ones are handed to the
/// scheduler one at a time.
pub struct Driver {
    scheduler: Rc<dyn Scheduler>,
    config: DriverConfig,
}

impl Driver {
    pub fn new(scheduler: Rc<dyn Scheduler>, config: DriverConfig) -> Driver {
        Driver { scheduler, config }
    }

    pub fn run(&self, program: Vec<Node>, host: Host) -> RunHandle {
        let execution = Rc::new(RefCell::new(Execution::new(program, host, self.config.clone())));
        let cancel = execution.borrow().cancel_token();

        Self::run_quantum(Rc::clone(&execution), Rc::clone(&self.scheduler));
        RunHandle { execution, cancel }
    }

    fn run_quantum(execution: Rc<RefCell<Execution>>, scheduler: Rc<dyn Scheduler>) {
        let quantum = execution.borrow_mut().resume();

        if let Quantum::Paused(_) = quantum {
            let next = Rc::clone(&scheduler);
            scheduler.schedule_resume(Box::new(move || {
                log::debug!("Resuming program");
                Driver::run_quantum(execution, next);
            }));
        }
    }
}

/// Observes and controls a run started by [`Driver::run`].
pub struct RunHandle {
    execution: Rc<RefCell<Execution>>,
    cancel: CancelToken,
}

impl RunHandle {
    /// Requests cancellation; the run stops at its next resumption or loop pass.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.execution.borrow().outcome().is_some()
    }

    pub fn outcome(&self) -> Option<Quantum> {
        self.execution.borrow().outcome().cloned()
    }

    pub fn quanta(&self) -> usize {
        self.execution.borrow().quanta()
    }

    pub fn steps(&self) -> u64 {
        self.execution.borrow().steps()
    }
}
