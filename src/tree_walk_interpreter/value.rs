use std::{cell::RefCell, cmp::Ordering, fmt::Display, rc::Rc};

/// Runtime value. Lists are shared by reference: assigning a list to another
/// name aliases it.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    List(Rc<RefCell<Vec<Value>>>),
    None,
}

impl Value {
    pub fn list(items: Vec<Value>) -> Value {
        Value::List(Rc::new(RefCell::new(items)))
    }

    pub(super) fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(n) => *n != 0,
            Value::Float(n) => *n != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.borrow().is_empty(),
        }
    }

    fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Ordering used by `<`, `<=`, `>` and `>=`. Lists and mixed kinds have none.
    pub(super) fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (a, b) => a.as_float()?.partial_cmp(&b.as_float()?),
        }
    }

    pub(super) fn numeric_pair(&self, other: &Value) -> Option<(f64, f64)> {
        Some((self.as_float()?, other.as_float()?))
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::List(a), Value::List(b)) => *a.borrow() == *b.borrow(),
            (Value::None, Value::None) => true,
            (a, b) => match a.numeric_pair(b) {
                Some((a, b)) => a == b,
                None => false,
            },
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.borrow().iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    match item {
                        Value::Str(s) => write!(f, "{:?}", s)?,
                        item => write!(f, "{}", item)?,
                    }
                }
                write!(f, "]")
            }
            Value::None => write!(f, "none"),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_display() {
        let list = Value::list(vec![
            Value::Str("a".to_string()),
            Value::Int(2),
            Value::list(vec![Value::Bool(true)]),
        ]);
        assert_eq!(list.to_string(), r#"["a", 2, [true]]"#);
        assert_eq!(Value::Str("plain".to_string()).to_string(), "plain");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(Value::None.to_string(), "none");
    }

    #[test]
    fn test_equality_and_ordering() {
        assert_eq!(Value::Int(3), Value::Float(3.0));
        assert_ne!(Value::Int(3), Value::Str("3".to_string()));
        assert_eq!(
            Value::list(vec![Value::Int(1)]),
            Value::list(vec![Value::Int(1)])
        );
        assert_eq!(
            Value::Str("a".to_string()).compare(&Value::Str("b".to_string())),
            Some(Ordering::Less)
        );
        assert_eq!(Value::list(vec![]).compare(&Value::list(vec![])), None);
    }

    #[test]
    fn test_lists_alias() {
        let a = Value::list(vec![Value::Int(1)]);
        let b = a.clone();
        if let Value::List(items) = &b {
            items.borrow_mut().push(Value::Int(2));
        }
        assert_eq!(a.to_string(), "[1, 2]");
    }
}
