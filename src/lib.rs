pub mod util;
pub mod interpreter;

use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;
use clap::Parser as ClapParser;
use crate::interpreter::ast::Node;
use crate::interpreter::driver::{Driver, DriverConfig, Quantum};
use crate::interpreter::evaluator::{EvalError, DEFAULT_MAX_CALL_DEPTH};
use crate::interpreter::host::{Host, LoggingSurface, StdoutSink, TickLoop};
use crate::interpreter::lexer::{tokenize, LexerError};
use crate::interpreter::parser::ParseError;

#[derive(ClapParser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Config {
    #[clap(help = "Program to run")]
    pub input: PathBuf,

    #[clap(long, default_value_t = 5000, help = "Yield to the event loop after this many loop passes (0 disables)")]
    pub pause_interval: u64,
    #[clap(long, default_value_t = 100, help = "Yield to the event loop after this many milliseconds")]
    pub quantum_ms: u64,
    #[clap(long, default_value_t = DEFAULT_MAX_CALL_DEPTH, help = "Maximum depth of nested function calls")]
    pub max_call_depth: usize,

    #[clap(long, help = "Print the parsed program instead of running it")]
    pub dump_ast: bool,
    #[clap(short, long, help = "Print verbose log output")]
    pub verbose: bool,
}

impl Config {
    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            pause_interval: self.pause_interval,
            quantum_budget: Duration::from_millis(self.quantum_ms),
            max_call_depth: self.max_call_depth,
        }
    }
}

#[derive(Debug)]
pub enum Error {
    Lex(LexerError),
    Parse(ParseError),
    Eval(EvalError),
    Io(std::io::Error),
    /// The event loop went idle before the program reached an outcome.
    Incomplete,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::Lex(err) => write!(f, "Lexer error: {}", err),
            Error::Parse(err) => write!(f, "Parse error: {}", err),
            Error::Eval(err) => write!(f, "Runtime error: {}", err),
            Error::Io(err) => write!(f, "{}", err),
            Error::Incomplete => f.write_str("Program did not run to completion"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Lex(err) => Some(err),
            Error::Parse(err) => Some(err),
            Error::Eval(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Incomplete => None,
        }
    }
}

impl From<LexerError> for Error {
    fn from(err: LexerError) -> Self {
        Error::Lex(err)
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::Parse(err)
    }
}

impl From<EvalError> for Error {
    fn from(err: EvalError) -> Self {
        Error::Eval(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

/// Lexes and parses source text into its top-level forms.
pub fn parse(source: &str) -> Result<Vec<Node>, Error> {
    let tokens = tokenize(source)?;
    Ok(interpreter::parser::parse(&tokens)?)
}

pub fn run(config: Config) -> Result<(), Error> {
    let source = std::fs::read_to_string(&config.input)?;
    let program = parse(&source)?;

    if config.dump_ast {
        for node in &program {
            println!("{}", node);
        }

        return Ok(());
    }

    let tick_loop = Rc::new(TickLoop::new());
    let driver = Driver::new(tick_loop.clone(), config.driver_config());
    let handle = driver.run(program, Host::new(StdoutSink, LoggingSurface));

    tick_loop.run_until_idle();
    log::debug!("Event loop idle after {} ticks", tick_loop.ticks());

    match handle.outcome() {
        Some(Quantum::Finished(value)) => {
            log::debug!("Program result: {}", value);
            Ok(())
        },
        Some(Quantum::Failed(err)) => Err(err.into()),
        _ => Err(Error::Incomplete),
    }
}
