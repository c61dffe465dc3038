use std::fmt::{Debug, Display, Formatter};
use std::rc::Rc;

/// A parsed form. Children are reference counted so that evaluation frames can hold on to
/// a sub-tree across suspension points without borrowing the program.
#[derive(Clone, PartialEq)]
pub enum Node {
    Number(f64),
    String(Rc<str>),
    Symbol(Rc<str>),
    List(Rc<[Node]>),
    Quoted(Rc<Node>),
}

impl Node {
    pub fn symbol(name: &str) -> Node {
        Node::Symbol(Rc::from(name))
    }

    pub fn string(value: &str) -> Node {
        Node::String(Rc::from(value))
    }

    pub fn list(elements: Vec<Node>) -> Node {
        Node::List(Rc::from(elements))
    }

    pub fn as_symbol(&self) -> Option<&Rc<str>> {
        match self {
            Node::Symbol(name) => Some(name),
            _ => None,
        }
    }
}

impl Display for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Node::Number(value) => write!(f, "{}", value),
            Node::String(value) => write!(f, "\"{}\"", value),
            Node::Symbol(name) => f.write_str(name),
            Node::List(elements) => write!(f, "({})", elements.iter()
                .map(|element| element.to_string()).collect::<Vec<String>>().join(" ")),
            Node::Quoted(inner) => write!(f, "'{}", inner),
        }
    }
}

impl Debug for Node {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        Display::fmt(self, f)
    }
}
