use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;
use crate::interpreter::ast::Node;


/// A user-defined function. The body is every form after the parameter list.
#[derive(Debug, PartialEq)]
pub struct Function {
    pub name: Rc<str>,
    pub params: Vec<Rc<str>>,
    pub body: Rc<[Node]>,
}

/// Runtime value. Lists and functions are shared, so cloning a value never copies their contents
/// and loose equality on them compares identity.
#[derive(Clone, PartialEq)]
pub enum Value {
    Undefined,
    Boolean(bool),
    Number(f64),
    Text(Rc<str>),
    List(Rc<Vec<Value>>),
    Function(Rc<Function>),
}

impl Value {
    pub fn text(value: &str) -> Value {
        Value::Text(Rc::from(value))
    }

    pub fn list(elements: Vec<Value>) -> Value {
        Value::List(Rc::new(elements))
    }

    pub fn nil() -> Value {
        Value::list(Vec::new())
    }

    /// Converts a quoted form into data. Symbols become text, a nested quote `'x` becomes
    /// the two-element list `(quote x)`.
    pub fn from_datum(node: &Node) -> Value {
        match node {
            Node::Number(value) => Value::Number(*value),
            Node::String(value) | Node::Symbol(value) => Value::Text(Rc::clone(value)),
            Node::List(elements) => Value::list(elements.iter().map(Value::from_datum).collect()),
            Node::Quoted(inner) => Value::list(vec![Value::text("quote"), Value::from_datum(inner)]),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Boolean(_) => "boolean",
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::List(_) => "list",
            Value::Function(_) => "function",
        }
    }

    pub fn as_list(&self) -> Option<&Rc<Vec<Value>>> {
        match self {
            Value::List(elements) => Some(elements),
            _ => None,
        }
    }

    /// `false`, `0`, `NaN`, `""` and `undefined` are falsy. Lists are always truthy, even when empty.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined => false,
            Value::Boolean(value) => *value,
            Value::Number(value) => *value != 0.0 && !value.is_nan(),
            Value::Text(value) => !value.is_empty(),
            Value::List(_) | Value::Function(_) => true,
        }
    }

    pub fn coerce_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Boolean(value) => if *value { 1.0 } else { 0.0 },
            Value::Number(value) => *value,
            Value::Text(value) => parse_numeric_text(value),
            Value::List(_) | Value::Function(_) => parse_numeric_text(&self.coerce_string()),
        }
    }

    /// String conversion used for concatenation and comparisons. Unlike `Display`, lists are joined
    /// with commas and an undefined element contributes nothing.
    pub fn coerce_string(&self) -> String {
        match self {
            Value::Undefined => String::from("undefined"),
            Value::List(elements) => elements.iter()
                .map(|element| match element {
                    Value::Undefined => String::new(),
                    element => element.coerce_string(),
                })
                .collect::<Vec<String>>().join(","),
            value => value.to_string(),
        }
    }

    fn is_object(&self) -> bool {
        matches!(self, Value::List(_) | Value::Function(_))
    }

    /// Loose equality (`==`): numbers and text compare numerically, booleans count as 0 or 1,
    /// and lists or functions only equal themselves unless compared against a primitive.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Undefined, _) | (_, Value::Undefined) => false,
            (Value::Number(left), Value::Number(right)) => left == right,
            (Value::Text(left), Value::Text(right)) => left == right,
            (Value::Boolean(left), Value::Boolean(right)) => left == right,
            (Value::List(left), Value::List(right)) => Rc::ptr_eq(left, right),
            (Value::Function(left), Value::Function(right)) => Rc::ptr_eq(left, right),
            (Value::Number(number), Value::Text(text)) | (Value::Text(text), Value::Number(number)) =>
                *number == parse_numeric_text(text),
            (Value::Boolean(_), _) => Value::Number(self.coerce_number()).loose_eq(other),
            (_, Value::Boolean(_)) => self.loose_eq(&Value::Number(other.coerce_number())),
            (left, right) if left.is_object() && !right.is_object() =>
                Value::Text(Rc::from(left.coerce_string())).loose_eq(right),
            (left, right) if !left.is_object() && right.is_object() =>
                left.loose_eq(&Value::Text(Rc::from(right.coerce_string()))),
            _ => false,
        }
    }

    /// Relational comparison: two texts compare lexicographically, anything else numerically.
    /// `None` when either side is not a number (`NaN`), which makes every relation false.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        let left = if self.is_object() { Value::Text(Rc::from(self.coerce_string())) } else { self.clone() };
        let right = if other.is_object() { Value::Text(Rc::from(other.coerce_string())) } else { other.clone() };

        match (&left, &right) {
            (Value::Text(left), Value::Text(right)) => Some(left.cmp(right)),
            _ => left.coerce_number().partial_cmp(&right.coerce_number()),
        }
    }

    /// `+` on two values: concatenation when either side is (or converts to) text, addition otherwise.
    pub fn add(&self, other: &Value) -> Value {
        let stringy = |value: &Value| matches!(value, Value::Text(_)) || value.is_object();

        if stringy(self) || stringy(other) {
            let mut text = self.coerce_string();
            text.push_str(&other.coerce_string());
            Value::Text(Rc::from(text))
        } else {
            Value::Number(self.coerce_number() + other.coerce_number())
        }
    }
}

/// Numeric conversion of text: surrounding whitespace is ignored, blank text is zero and
/// anything that is not a plain decimal literal is `NaN`.
fn parse_numeric_text(text: &str) -> f64 {
    let text = text.trim();

    match text {
        "" => 0.0,
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if text.chars().all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E')) =>
            text.parse().unwrap_or(f64::NAN),
        _ => f64::NAN,
    }
}

pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        String::from("NaN")
    } else if value.is_infinite() {
        String::from(if value > 0.0 { "Infinity" } else { "-Infinity" })
    } else if value == 0.0 {
        String::from("0")
    } else if value.fract() == 0.0 && value.abs() < 1e21 {
        format!("{:.0}", value)
    } else {
        format!("{}", value)
    }
}

/// Textual rendering written by `cout`: lists are parenthesized with space-separated elements.
impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Boolean(value) => write!(f, "{}", value),
            Value::Number(value) => f.write_str(&format_number(*value)),
            Value::Text(value) => f.write_str(value),
            Value::List(elements) => write!(f, "({})", elements.iter()
                .map(|element| element.to_string()).collect::<Vec<String>>().join(" ")),
            Value::Function(function) => write!(f, "[function {}]", function.name),
        }
    }
}

impl Debug for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Text(value) => write!(f, "{:?}", value),
            Value::List(elements) => f.debug_list().entries(elements.iter()).finish(),
            value => Display::fmt(value, f),
        }
    }
}
