use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::rc::Rc;
use lazy_static::lazy_static;
use crate::interpreter::ast::Node;
use crate::interpreter::environment::Environment;
use crate::interpreter::evaluator::builtins::Builtin;
use crate::interpreter::host::{Host, HostError, Rect};
use crate::interpreter::value::{Function, Value};

pub mod builtins;

#[cfg(test)]
mod tests;

pub const DEFAULT_MAX_CALL_DEPTH: usize = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Form {
    Define,
    Assign,
    Function,
    If,
    While,
    Switch,
    Return,
    Quote,
    And, Or,
    Output,
    Draw,
    Builtin(Builtin),
}

lazy_static! {
    static ref FORMS: HashMap<&'static str, Form> = {
        let mut forms = HashMap::new();

        for name in ["def", "var", "let", "const"] {
            forms.insert(name, Form::Define);
        }

        forms.insert("set", Form::Assign);
        forms.insert("func", Form::Function);
        forms.insert("if", Form::If);
        forms.insert("while", Form::While);
        forms.insert("switch", Form::Switch);
        forms.insert("return", Form::Return);
        forms.insert("quote", Form::Quote);
        forms.insert("and", Form::And);
        forms.insert("or", Form::Or);
        forms.insert("cout", Form::Output);
        forms.insert("fillRect", Form::Draw);

        for builtin in [
            Builtin::Add, Builtin::Subtract, Builtin::Multiply, Builtin::Divide,
            Builtin::Remainder, Builtin::Modulo,
            Builtin::Less, Builtin::Greater, Builtin::LessEqual, Builtin::GreaterEqual,
            Builtin::Equal, Builtin::NotEqual, Builtin::Not,
            Builtin::Car, Builtin::Cdr, Builtin::Cons,
            Builtin::List, Builtin::Length, Builtin::Reverse, Builtin::Append,
        ] {
            forms.insert(builtin.name(), Form::Builtin(builtin));
        }

        forms
    };
}

#[derive(Debug, Clone, PartialEq)]
pub enum EvalError {
    UndefinedVariable(String),
    UndefinedFunction(String),
    WrongArgumentType {
        operation: String,
        expected: &'static str,
        found: &'static str,
    },
    ArityMismatch {
        operation: String,
        expected: String,
        got: usize,
    },
    MalformedForm {
        form: String,
        reason: &'static str,
    },
    Host(HostError),
    CallDepthExceeded(usize),
}

impl Display for EvalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            EvalError::UndefinedVariable(name) => write!(f, "Undefined variable: {}", name),
            EvalError::UndefinedFunction(name) => write!(f, "Undefined function: {}", name),
            EvalError::WrongArgumentType { operation, expected, found } =>
                write!(f, "{} expects a {}, got {}", operation, expected, found),
            EvalError::ArityMismatch { operation, expected, got } =>
                write!(f, "{} expects {} argument(s), got {}", operation, expected, got),
            EvalError::MalformedForm { form, reason } => write!(f, "Malformed '{}': {}", form, reason),
            EvalError::Host(err) => write!(f, "Host error: {}", err),
            EvalError::CallDepthExceeded(limit) => write!(f, "Maximum call depth of {} exceeded", limit),
        }
    }
}

impl std::error::Error for EvalError {}

impl From<HostError> for EvalError {
    fn from(err: HostError) -> Self {
        EvalError::Host(err)
    }
}

pub type EvalResult<T> = Result<T, EvalError>;

/// Result of evaluating one form. `Return` unwinds until the nearest sequence boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Normal(Value),
    Return(Value),
}

/// Why [`Evaluator::run`] handed control back.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// A `while` loop finished one full pass over its body.
    LoopPass,
    /// The program ran to completion with this value.
    Done(Value),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SequenceKind {
    /// A list whose head is not a symbol
    Implicit,
    /// A function body; leaving it restores the caller's environment
    Body,
    /// The top-level forms of the program
    Program,
    /// The body of a `switch` clause; not a return boundary
    Clause,
}

enum Operation {
    Builtin(Builtin),
    Call(Rc<Function>),
    Output(Rc<str>),
    Draw(Rc<str>),
}

/// Pending work. Each frame receives the completion of the form evaluated above it.
enum Frame {
    Sequence { nodes: Rc<[Node]>, next: usize, kind: SequenceKind },
    Arguments { operation: Operation, form: Rc<[Node]>, next: usize, end: usize, values: Vec<Value> },
    Bind { name: Rc<str>, assign: bool },
    Branch { then: Node, otherwise: Option<Node> },
    And { right: Node },
    Or { right: Node },
    LoopCondition { form: Rc<[Node]> },
    LoopBody { form: Rc<[Node]>, next: usize },
    Switch { form: Rc<[Node]> },
    Return,
}

enum Control {
    Eval(Node),
    Deliver(Completion),
}

fn deliver(value: Value) -> Control {
    Control::Deliver(Completion::Normal(value))
}

/// Tree-walking evaluator driven by an explicit frame stack instead of native recursion, so that
/// a run can stop after any loop pass and later continue exactly where it left off.
pub struct Evaluator {
    stack: Vec<Frame>,
    control: Option<Control>,

    environment: Environment,
    callers: Vec<Environment>,
    max_call_depth: usize,

    loop_pass_completed: bool,
}

impl Evaluator {
    pub fn new(program: Rc<[Node]>, environment: Environment, max_call_depth: usize) -> Evaluator {
        Evaluator {
            stack: vec![Frame::Sequence { nodes: program, next: 0, kind: SequenceKind::Program }],
            control: Some(deliver(Value::Undefined)),

            environment,
            callers: Vec::new(),
            max_call_depth,

            loop_pass_completed: false,
        }
    }

    /// Environment of the innermost active call, or the global one.
    pub fn environment(&self) -> &Environment {
        &self.environment
    }

    pub fn call_depth(&self) -> usize {
        self.callers.len()
    }

    /// True once the program has finished or failed.
    pub fn is_finished(&self) -> bool {
        self.control.is_none()
    }

    pub fn into_environment(mut self) -> Environment {
        if self.callers.is_empty() {
            self.environment
        } else {
            self.callers.swap_remove(0)
        }
    }

    /// Evaluates until the program finishes or a loop completes a pass. After an error the
    /// evaluator is finished and must not be resumed.
    pub fn run(&mut self, host: &mut Host) -> EvalResult<Step> {
        let mut control = match self.control.take() {
            Some(control) => control,
            None => return Ok(Step::Done(Value::Undefined)),
        };

        loop {
            control = match control {
                Control::Eval(node) => self.eval(node, host)?,
                Control::Deliver(completion) => match self.stack.pop() {
                    Some(frame) => self.resume(frame, completion, host)?,
                    None => {
                        let (Completion::Normal(value) | Completion::Return(value)) = completion;
                        return Ok(Step::Done(value));
                    },
                },
            };

            if std::mem::take(&mut self.loop_pass_completed) {
                self.control = Some(control);
                return Ok(Step::LoopPass);
            }
        }
    }

    fn eval(&mut self, node: Node, host: &mut Host) -> EvalResult<Control> {
        match node {
            Node::Number(value) => Ok(deliver(Value::Number(value))),
            Node::String(value) => Ok(deliver(Value::Text(value))),
            Node::Symbol(name) => match self.environment.lookup(&name) {
                Some(value) => Ok(deliver(value.clone())),
                None => Err(EvalError::UndefinedVariable(name.to_string())),
            },
            Node::Quoted(inner) => Ok(deliver(Value::from_datum(&inner))),
            Node::List(form) => self.eval_form(form, host),
        }
    }

    fn eval_form(&mut self, form: Rc<[Node]>, host: &mut Host) -> EvalResult<Control> {
        let name = match form.first() {
            Some(Node::Symbol(name)) => Rc::clone(name),
            _ => return Ok(self.begin_sequence(form, 0, SequenceKind::Implicit)),
        };

        let malformed = |reason| EvalError::MalformedForm { form: name.to_string(), reason };

        match FORMS.get(&*name).copied() {
            Some(Form::Define) => {
                let target = Self::binding_target(&form).ok_or_else(|| malformed("expected a name and a value"))?;

                self.stack.push(Frame::Bind { name: target, assign: false });
                Ok(Control::Eval(form[2].clone()))
            },
            Some(Form::Assign) => {
                let target = Self::binding_target(&form).ok_or_else(|| malformed("expected a name and a value"))?;

                if !self.environment.has_variable(&target) {
                    return Err(EvalError::UndefinedVariable(target.to_string()));
                }

                self.stack.push(Frame::Bind { name: target, assign: true });
                Ok(Control::Eval(form[2].clone()))
            },
            Some(Form::Function) => {
                let function_name = form.get(1).and_then(Node::as_symbol).cloned()
                    .ok_or_else(|| malformed("expected a function name"))?;
                let params = match form.get(2) {
                    Some(Node::List(params)) => params.iter()
                        .map(|param| param.as_symbol().cloned().ok_or_else(|| malformed("parameters must be symbols")))
                        .collect::<EvalResult<Vec<Rc<str>>>>()?,
                    _ => return Err(malformed("expected a parameter list")),
                };

                let function = Value::Function(Rc::new(Function {
                    name: Rc::clone(&function_name),
                    params,
                    body: form[3..].iter().cloned().collect(),
                }));

                self.environment.define(function_name, function.clone());
                Ok(deliver(function))
            },
            Some(Form::If) => {
                let (condition, then) = match (form.get(1), form.get(2)) {
                    (Some(condition), Some(then)) => (condition.clone(), then.clone()),
                    _ => return Err(malformed("expected a condition and a branch")),
                };

                let otherwise = match form.get(3) {
                    Some(Node::Symbol(keyword)) if &**keyword == "else" => form.get(4).cloned(),
                    otherwise => otherwise.cloned(),
                };

                self.stack.push(Frame::Branch { then, otherwise });
                Ok(Control::Eval(condition))
            },
            Some(Form::While) => {
                let condition = form.get(1).cloned().ok_or_else(|| malformed("expected a condition"))?;

                self.stack.push(Frame::LoopCondition { form });
                Ok(Control::Eval(condition))
            },
            Some(Form::Switch) => {
                let scrutinee = form.get(1).cloned().ok_or_else(|| malformed("expected a value to switch on"))?;

                self.stack.push(Frame::Switch { form });
                Ok(Control::Eval(scrutinee))
            },
            Some(Form::Return) => match form.get(1).cloned() {
                Some(value) => {
                    self.stack.push(Frame::Return);
                    Ok(Control::Eval(value))
                },
                None => Ok(Control::Deliver(Completion::Return(Value::Undefined))),
            },
            Some(Form::Quote) => form.get(1)
                .map(|datum| deliver(Value::from_datum(datum)))
                .ok_or_else(|| malformed("expected an expression to quote")),
            Some(Form::And) | Some(Form::Or) => {
                if form.len() != 3 {
                    return Err(EvalError::ArityMismatch { operation: name.to_string(), expected: String::from("2"), got: form.len() - 1 });
                }

                let right = form[2].clone();
                self.stack.push(if &*name == "and" { Frame::And { right } } else { Frame::Or { right } });
                Ok(Control::Eval(form[1].clone()))
            },
            Some(Form::Output) => {
                let sink = Self::target_id(&form).ok_or_else(|| malformed("expected an output stream name"))?;

                if form.len() != 3 {
                    return Err(malformed("expected an output stream name and a value"));
                }

                self.begin_arguments(Operation::Output(sink), form, 2, 3, host)
            },
            Some(Form::Draw) => {
                let surface = Self::target_id(&form).ok_or_else(|| malformed("expected a surface name"))?;

                if form.len() != 6 && form.len() != 7 {
                    return Err(EvalError::ArityMismatch { operation: name.to_string(), expected: String::from("5 or 6"), got: form.len() - 1 });
                }

                let end = form.len();
                self.begin_arguments(Operation::Draw(surface), form, 2, end, host)
            },
            Some(Form::Builtin(builtin)) => {
                let end = form.len();
                self.begin_arguments(Operation::Builtin(builtin), form, 1, end, host)
            },
            None => {
                let function = match self.environment.lookup(&name) {
                    Some(Value::Function(function)) => Rc::clone(function),
                    _ => return Err(EvalError::UndefinedFunction(name.to_string())),
                };

                // Surplus arguments are never evaluated
                let end = 1 + function.params.len().min(form.len() - 1);
                self.begin_arguments(Operation::Call(function), form, 1, end, host)
            },
        }
    }

    fn resume(&mut self, frame: Frame, completion: Completion, host: &mut Host) -> EvalResult<Control> {
        let value = match completion {
            Completion::Normal(value) => value,
            Completion::Return(value) => return Ok(self.unwind(frame, value)),
        };

        match frame {
            Frame::Sequence { nodes, next, kind } => match nodes.get(next).cloned() {
                Some(node) => {
                    self.stack.push(Frame::Sequence { nodes, next: next + 1, kind });
                    Ok(Control::Eval(node))
                },
                None => {
                    if kind == SequenceKind::Body {
                        self.leave_call();
                    }

                    Ok(deliver(value))
                },
            },
            Frame::Arguments { operation, form, next, end, mut values } => {
                values.push(value);

                if next < end {
                    let node = form[next].clone();
                    self.stack.push(Frame::Arguments { operation, form, next: next + 1, end, values });
                    Ok(Control::Eval(node))
                } else {
                    self.apply(operation, values, host)
                }
            },
            Frame::Bind { name, assign } => {
                if assign {
                    if !self.environment.assign(&name, value.clone()) {
                        return Err(EvalError::UndefinedVariable(name.to_string()));
                    }
                } else {
                    self.environment.define(name, value.clone());
                }

                Ok(deliver(value))
            },
            Frame::Branch { then, otherwise } => {
                if value.is_truthy() {
                    Ok(Control::Eval(then))
                } else {
                    Ok(otherwise.map_or_else(|| deliver(Value::Undefined), Control::Eval))
                }
            },
            Frame::And { right } => Ok(if value.is_truthy() { Control::Eval(right) } else { deliver(value) }),
            Frame::Or { right } => Ok(if value.is_truthy() { deliver(value) } else { Control::Eval(right) }),
            Frame::LoopCondition { form } => {
                if value.is_truthy() {
                    Ok(self.continue_loop(form, 2))
                } else {
                    Ok(deliver(Value::Undefined))
                }
            },
            Frame::LoopBody { form, next } => Ok(self.continue_loop(form, next)),
            Frame::Switch { form } => self.select_clause(&form, &value),
            Frame::Return => Ok(Control::Deliver(Completion::Return(value))),
        }
    }

    /// A `return` passing through `frame`: sequence boundaries stop it, every other frame is dropped.
    fn unwind(&mut self, frame: Frame, value: Value) -> Control {
        match frame {
            Frame::Sequence { kind: SequenceKind::Body, .. } => {
                self.leave_call();
                deliver(value)
            },
            Frame::Sequence { kind: SequenceKind::Implicit | SequenceKind::Program, .. } => deliver(value),
            _ => Control::Deliver(Completion::Return(value)),
        }
    }

    fn apply(&mut self, operation: Operation, values: Vec<Value>, host: &mut Host) -> EvalResult<Control> {
        match operation {
            Operation::Builtin(builtin) => Ok(deliver(builtin.apply(values)?)),
            Operation::Call(function) => self.enter_call(function, values),
            Operation::Output(sink) => {
                let value = values.into_iter().next().unwrap_or(Value::Undefined);
                host.output.write(&sink, &value.to_string())?;
                Ok(deliver(value))
            },
            Operation::Draw(surface) => match values.as_slice() {
                [x, y, width, height, color @ ..] => {
                    let rect = Rect {
                        x: x.coerce_number(),
                        y: y.coerce_number(),
                        width: width.coerce_number(),
                        height: height.coerce_number(),
                    };
                    let color = color.first().map(Value::to_string);

                    host.surface.fill_rectangle(&surface, rect, color.as_deref())?;
                    Ok(deliver(Value::Undefined))
                },
                _ => Err(EvalError::ArityMismatch { operation: String::from("fillRect"), expected: String::from("5 or 6"), got: values.len() + 1 }),
            },
        }
    }

    fn enter_call(&mut self, function: Rc<Function>, values: Vec<Value>) -> EvalResult<Control> {
        if self.callers.len() >= self.max_call_depth {
            return Err(EvalError::CallDepthExceeded(self.max_call_depth));
        }

        log::trace!("Calling {} with {} argument(s) at depth {}", function.name, values.len(), self.callers.len() + 1);

        let mut local = self.environment.snapshot();

        for (param, value) in function.params.iter().zip(values) {
            local.define(Rc::clone(param), value);
        }

        self.callers.push(std::mem::replace(&mut self.environment, local));
        Ok(self.begin_sequence(Rc::clone(&function.body), 0, SequenceKind::Body))
    }

    fn leave_call(&mut self) {
        if let Some(caller) = self.callers.pop() {
            self.environment = caller;
        }
    }

    fn begin_sequence(&mut self, nodes: Rc<[Node]>, start: usize, kind: SequenceKind) -> Control {
        self.stack.push(Frame::Sequence { nodes, next: start, kind });
        deliver(Value::Undefined)
    }

    /// Evaluates `form[start..end]` left to right, then applies `operation` to the values.
    fn begin_arguments(&mut self, operation: Operation, form: Rc<[Node]>, start: usize, end: usize, host: &mut Host) -> EvalResult<Control> {
        match form.get(start).filter(|_| start < end).cloned() {
            Some(node) => {
                self.stack.push(Frame::Arguments { operation, form, next: start + 1, end, values: Vec::with_capacity(end - start) });
                Ok(Control::Eval(node))
            },
            None => self.apply(operation, Vec::new(), host),
        }
    }

    /// Evaluates the body form at `next`, or finishes the pass and re-tests the condition.
    fn continue_loop(&mut self, form: Rc<[Node]>, next: usize) -> Control {
        match form.get(next).cloned() {
            Some(node) => {
                self.stack.push(Frame::LoopBody { form, next: next + 1 });
                Control::Eval(node)
            },
            None => {
                let condition = form[1].clone();
                self.stack.push(Frame::LoopCondition { form });
                self.loop_pass_completed = true;
                Control::Eval(condition)
            },
        }
    }

    fn select_clause(&mut self, form: &Rc<[Node]>, value: &Value) -> EvalResult<Control> {
        let malformed = |reason| EvalError::MalformedForm { form: String::from("switch"), reason };

        for clause in form[2..].iter() {
            let clause = match clause {
                Node::List(clause) => clause,
                _ => return Err(malformed("clauses must be lists")),
            };

            match clause.first().and_then(Node::as_symbol).map(|keyword| &**keyword) {
                Some("case") => {
                    let key = match clause.get(1) {
                        Some(Node::Quoted(inner)) => Value::from_datum(inner),
                        Some(key) => Value::from_datum(key),
                        None => return Err(malformed("case clause needs a key")),
                    };

                    if value.loose_eq(&key) {
                        return Ok(self.begin_sequence(Rc::clone(clause), 2, SequenceKind::Clause));
                    }
                },
                Some("default") => return Ok(self.begin_sequence(Rc::clone(clause), 1, SequenceKind::Clause)),
                _ => return Err(malformed("expected a case or default clause")),
            }
        }

        Ok(deliver(Value::Undefined))
    }

    /// Name bound by `def` or `set`: `(def name value)`.
    fn binding_target(form: &[Node]) -> Option<Rc<str>> {
        if form.len() != 3 {
            return None;
        }

        form[1].as_symbol().cloned()
    }

    /// Stream or surface name of `cout` and `fillRect`, written as a bare symbol or a string.
    fn target_id(form: &[Node]) -> Option<Rc<str>> {
        match form.get(1)? {
            Node::Symbol(id) | Node::String(id) => Some(Rc::clone(id)),
            _ => None,
        }
    }
}

/// Evaluates one form to completion against `environment`, ignoring loop pauses.
pub fn evaluate(node: &Node, environment: &mut Environment, host: &mut Host) -> EvalResult<Value> {
    let program: Rc<[Node]> = Rc::from(vec![node.clone()]);
    let mut evaluator = Evaluator::new(program, std::mem::take(environment), DEFAULT_MAX_CALL_DEPTH);

    let result = loop {
        match evaluator.run(host) {
            Ok(Step::LoopPass) => continue,
            Ok(Step::Done(value)) => break Ok(value),
            Err(err) => break Err(err),
        }
    };

    *environment = evaluator.into_environment();
    result
}
