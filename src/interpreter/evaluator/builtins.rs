use std::cmp::Ordering;
use std::rc::Rc;
use crate::interpreter::evaluator::{EvalError, EvalResult};
use crate::interpreter::value::Value;

/// Operations whose arguments are all evaluated, left to right, before they run.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Builtin {
    Add, Subtract, Multiply, Divide,
    Remainder, Modulo,

    Less, Greater,
    LessEqual, GreaterEqual,
    Equal, NotEqual,
    Not,

    Car, Cdr, Cons,
    List, Length, Reverse, Append,
}

impl Builtin {
    pub fn name(self) -> &'static str {
        match self {
            Builtin::Add => "+",
            Builtin::Subtract => "-",
            Builtin::Multiply => "*",
            Builtin::Divide => "/",
            Builtin::Remainder => "%",
            Builtin::Modulo => "mod",
            Builtin::Less => "<",
            Builtin::Greater => ">",
            Builtin::LessEqual => "<=",
            Builtin::GreaterEqual => ">=",
            Builtin::Equal => "==",
            Builtin::NotEqual => "!=",
            Builtin::Not => "!",
            Builtin::Car => "car",
            Builtin::Cdr => "cdr",
            Builtin::Cons => "cons",
            Builtin::List => "list",
            Builtin::Length => "length",
            Builtin::Reverse => "reverse",
            Builtin::Append => "append",
        }
    }

    pub fn apply(self, args: Vec<Value>) -> EvalResult<Value> {
        match self {
            Builtin::Add => {
                let mut args = args.into_iter();
                let first = args.next().unwrap_or(Value::Number(0.0));

                Ok(args.fold(first, |acc, value| acc.add(&value)))
            },
            Builtin::Multiply => Ok(Value::Number(args.iter().map(Value::coerce_number).product())),
            Builtin::Subtract => self.fold_numbers(&args, Some(|value: f64| -value), |left, right| left - right),
            Builtin::Divide => self.fold_numbers(&args, Some(|value: f64| 1.0 / value), |left, right| left / right),
            Builtin::Remainder => self.fold_numbers(&args, None, |left, right| left % right),
            Builtin::Modulo => self.fold_numbers(&args, None, |left, right| {
                let remainder = left % right;

                if remainder != 0.0 && (remainder < 0.0) != (right < 0.0) {
                    remainder + right
                } else {
                    remainder
                }
            }),

            Builtin::Less => self.relation(args, |ordering| ordering == Ordering::Less),
            Builtin::Greater => self.relation(args, |ordering| ordering == Ordering::Greater),
            Builtin::LessEqual => self.relation(args, |ordering| ordering != Ordering::Greater),
            Builtin::GreaterEqual => self.relation(args, |ordering| ordering != Ordering::Less),
            Builtin::Equal => {
                let [left, right] = self.exactly(args)?;
                Ok(Value::Boolean(left.loose_eq(&right)))
            },
            Builtin::NotEqual => {
                let [left, right] = self.exactly(args)?;
                Ok(Value::Boolean(!left.loose_eq(&right)))
            },
            Builtin::Not => {
                let [value] = self.exactly(args)?;
                Ok(Value::Boolean(!value.is_truthy()))
            },

            Builtin::Car => {
                let [list] = self.exactly(args)?;
                Ok(self.expect_list(&list)?.first().cloned().unwrap_or(Value::Undefined))
            },
            Builtin::Cdr => {
                let [list] = self.exactly(args)?;
                Ok(Value::list(self.expect_list(&list)?.iter().skip(1).cloned().collect()))
            },
            Builtin::Cons => {
                let [head, tail] = self.exactly(args)?;
                let tail = self.expect_list(&tail)?;

                let mut elements = Vec::with_capacity(tail.len() + 1);
                elements.push(head);
                elements.extend(tail.iter().cloned());
                Ok(Value::list(elements))
            },
            Builtin::List => Ok(Value::list(args)),
            Builtin::Length => {
                let [list] = self.exactly(args)?;
                Ok(Value::Number(self.expect_list(&list)?.len() as f64))
            },
            Builtin::Reverse => {
                let [list] = self.exactly(args)?;
                Ok(Value::list(self.expect_list(&list)?.iter().rev().cloned().collect()))
            },
            Builtin::Append => {
                let mut elements = Vec::new();

                for list in &args {
                    elements.extend(self.expect_list(list)?.iter().cloned());
                }

                Ok(Value::list(elements))
            },
        }
    }

    /// `-` and `/` with a single operand negate or take the reciprocal; otherwise the operands
    /// are folded from the left.
    fn fold_numbers(self, args: &[Value], unary: Option<fn(f64) -> f64>, operator: fn(f64, f64) -> f64) -> EvalResult<Value> {
        let numbers: Vec<f64> = args.iter().map(Value::coerce_number).collect();

        match (numbers.split_first(), unary) {
            (None, Some(_)) => Err(self.arity_error("at least 1", 0)),
            (None, None) => Err(self.arity_error("at least 2", 0)),
            (Some((first, [])), Some(unary)) => Ok(Value::Number(unary(*first))),
            (Some((_, [])), None) => Err(self.arity_error("at least 2", 1)),
            (Some((first, rest)), _) => Ok(Value::Number(rest.iter().fold(*first, |acc, value| operator(acc, *value)))),
        }
    }

    fn relation(self, args: Vec<Value>, test: fn(Ordering) -> bool) -> EvalResult<Value> {
        let [left, right] = self.exactly(args)?;
        Ok(Value::Boolean(left.compare(&right).map_or(false, test)))
    }

    fn exactly<const N: usize>(self, args: Vec<Value>) -> EvalResult<[Value; N]> {
        <[Value; N]>::try_from(args).map_err(|args| self.arity_error(&N.to_string(), args.len()))
    }

    fn expect_list<'a>(self, value: &'a Value) -> EvalResult<&'a Rc<Vec<Value>>> {
        value.as_list().ok_or_else(|| EvalError::WrongArgumentType {
            operation: self.name().to_owned(),
            expected: "list",
            found: value.type_name(),
        })
    }

    fn arity_error(self, expected: &str, got: usize) -> EvalError {
        EvalError::ArityMismatch { operation: self.name().to_owned(), expected: expected.to_owned(), got }
    }
}
