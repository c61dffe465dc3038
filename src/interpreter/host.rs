//! Capabilities the interpreter calls into: a text output sink, a drawing surface and a
//! scheduler that resumes a paused run on a later tick.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt::{Display, Formatter};
use std::io::Write;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostError {
    pub message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> HostError {
        HostError { message: message.into() }
    }
}

impl Display for HostError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for HostError {}

pub trait OutputSink {
    /// Appends `text` as one line to the stream called `sink_id`.
    fn write(&mut self, sink_id: &str, text: &str) -> Result<(), HostError>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

pub trait DrawingSurface {
    /// Fills `rect` on `surface_id`. A `color` sets the fill style before drawing.
    fn fill_rectangle(&mut self, surface_id: &str, rect: Rect, color: Option<&str>) -> Result<(), HostError>;
}

pub type Continuation = Box<dyn FnOnce()>;

pub trait Scheduler {
    /// Runs `continuation` on a later tick of the host loop.
    fn schedule_resume(&self, continuation: Continuation);
}

/// The side-effect capabilities handed to an evaluation.
pub struct Host {
    pub output: Box<dyn OutputSink>,
    pub surface: Box<dyn DrawingSurface>,
}

impl Host {
    pub fn new(output: impl OutputSink + 'static, surface: impl DrawingSurface + 'static) -> Host {
        Host { output: Box::new(output), surface: Box::new(surface) }
    }
}

/// Writes every stream to standard output, one line per write.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl OutputSink for StdoutSink {
    fn write(&mut self, _sink_id: &str, text: &str) -> Result<(), HostError> {
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{}", text).map_err(|err| HostError::new(format!("Failed to write output: {}", err)))
    }
}

/// Collects output in memory, per stream. Clones share the same buffers.
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    streams: Rc<RefCell<HashMap<String, String>>>,
    known_ids: Option<Rc<HashSet<String>>>,
}

impl BufferSink {
    pub fn new() -> BufferSink {
        BufferSink::default()
    }

    /// A sink that rejects writes to any stream not listed in `ids`.
    pub fn with_streams(ids: &[&str]) -> BufferSink {
        BufferSink {
            streams: Rc::default(),
            known_ids: Some(Rc::new(ids.iter().map(|id| (*id).to_owned()).collect())),
        }
    }

    pub fn contents(&self, sink_id: &str) -> String {
        self.streams.borrow().get(sink_id).cloned().unwrap_or_default()
    }
}

impl OutputSink for BufferSink {
    fn write(&mut self, sink_id: &str, text: &str) -> Result<(), HostError> {
        if let Some(known_ids) = &self.known_ids {
            if !known_ids.contains(sink_id) {
                return Err(HostError::new(format!("No output stream named '{}'", sink_id)));
            }
        }

        let mut streams = self.streams.borrow_mut();
        let stream = streams.entry(sink_id.to_owned()).or_default();
        stream.push_str(text);
        stream.push('\n');
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FillRect {
    pub surface_id: String,
    pub rect: Rect,
    pub color: Option<String>,
}

/// Remembers every fill in order. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    operations: Rc<RefCell<Vec<FillRect>>>,
}

impl RecordingSurface {
    pub fn new() -> RecordingSurface {
        RecordingSurface::default()
    }

    pub fn operations(&self) -> Vec<FillRect> {
        self.operations.borrow().clone()
    }
}

impl DrawingSurface for RecordingSurface {
    fn fill_rectangle(&mut self, surface_id: &str, rect: Rect, color: Option<&str>) -> Result<(), HostError> {
        self.operations.borrow_mut().push(FillRect {
            surface_id: surface_id.to_owned(),
            rect,
            color: color.map(str::to_owned),
        });
        Ok(())
    }
}

/// Surface for hosts without graphics: every fill is reported through the log.
#[derive(Debug, Default)]
pub struct LoggingSurface;

impl DrawingSurface for LoggingSurface {
    fn fill_rectangle(&mut self, surface_id: &str, rect: Rect, color: Option<&str>) -> Result<(), HostError> {
        log::info!("fillRect {} at ({}, {}) size {}x{} color {}", surface_id, rect.x, rect.y,
            rect.width, rect.height, color.unwrap_or("<current>"));
        Ok(())
    }
}

/// Single-threaded event loop: scheduled continuations run in FIFO order, one per tick.
#[derive(Default)]
pub struct TickLoop {
    queue: RefCell<VecDeque<Continuation>>,
    ticks: Cell<usize>,
}

impl TickLoop {
    pub fn new() -> TickLoop {
        TickLoop::default()
    }

    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    pub fn ticks(&self) -> usize {
        self.ticks.get()
    }

    /// Runs the next continuation, if any. Returns whether one ran.
    pub fn tick(&self) -> bool {
        let next = self.queue.borrow_mut().pop_front();

        match next {
            Some(continuation) => {
                self.ticks.set(self.ticks.get() + 1);
                continuation();
                true
            },
            None => false,
        }
    }

    pub fn run_until_idle(&self) {
        while self.tick() {}
    }
}

impl Scheduler for TickLoop {
    fn schedule_resume(&self, continuation: Continuation) {
        self.queue.borrow_mut().push_back(continuation);
    }
}
