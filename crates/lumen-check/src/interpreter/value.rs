//! Runtime value representation for the Lumen interpreter.
//!
//! Arrays are shared references: copying a [`Value::Array`] aliases the same
//! storage, and equality on arrays is identity.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use lumen_core::ast::{BaseType, TypeRef};
use lumen_core::printer::print_type;

use super::error::RuntimeErrorKind;

/// Longest rendering of a single value in a trace, in characters.
pub const DISPLAY_LIMIT: usize = 100;

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Int(i64),
    Double(f64),
    Bool(bool),
    Char(char),
    Str(Arc<str>),
    Array(ArrayRef),
    /// Default of `string` and array slots.
    Null,
    /// Result of a method that returns nothing.
    Unit,
}

/// Shared, mutable array storage tagged with its element type.
#[derive(Debug, Clone)]
pub struct ArrayRef(Arc<ArrayData>);

#[derive(Debug)]
struct ArrayData {
    elem: TypeRef,
    items: Mutex<Vec<Value>>,
}

impl ArrayRef {
    pub fn new(elem: TypeRef, items: Vec<Value>) -> Self {
        ArrayRef(Arc::new(ArrayData {
            elem,
            items: Mutex::new(items),
        }))
    }

    pub fn elem(&self) -> &TypeRef {
        &self.0.elem
    }

    pub fn len(&self) -> usize {
        self.0.items.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Vec<Value> {
        self.0.items.lock().clone()
    }

    pub fn get(&self, index: i64) -> Result<Value, RuntimeErrorKind> {
        let items = self.0.items.lock();
        checked_index(index, items.len()).map(|i| items[i].clone())
    }

    pub fn set(&self, index: i64, value: Value) -> Result<(), RuntimeErrorKind> {
        let value = value.coerce_to(&self.0.elem)?;
        let mut items = self.0.items.lock();
        let i = checked_index(index, items.len())?;
        items[i] = value;
        Ok(())
    }

    pub fn ptr_eq(&self, other: &ArrayRef) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

fn checked_index(index: i64, length: usize) -> Result<usize, RuntimeErrorKind> {
    usize::try_from(index)
        .ok()
        .filter(|i| *i < length)
        .ok_or(RuntimeErrorKind::IndexOutOfRange { index, length })
}

impl Value {
    pub fn str(text: &str) -> Value {
        Value::Str(Arc::from(text))
    }

    /// The value a slot of type `ty` holds before assignment.
    pub fn default_for(ty: &TypeRef) -> Value {
        if ty.is_array() {
            return Value::Null;
        }
        match ty.base {
            BaseType::Int => Value::Int(0),
            BaseType::Double => Value::Double(0.0),
            BaseType::Bool => Value::Bool(false),
            BaseType::Char => Value::Char('\0'),
            BaseType::String | BaseType::Var => Value::Null,
            BaseType::Void => Value::Unit,
        }
    }

    /// Converts for storage in a slot of type `ty`, applying the implicit
    /// widenings (`char` to `int`, integers to `double`).
    pub fn coerce_to(self, ty: &TypeRef) -> Result<Value, RuntimeErrorKind> {
        let mismatch = |value: &Value| RuntimeErrorKind::TypeMismatch {
            expected: print_type(ty),
            found: value.type_name().to_string(),
        };
        if ty.base == BaseType::Var {
            return Ok(self);
        }
        if ty.is_array() {
            return match self {
                Value::Array(_) | Value::Null => Ok(self),
                other => Err(mismatch(&other)),
            };
        }
        match (ty.base, self) {
            (BaseType::Int, v @ Value::Int(_)) => Ok(v),
            (BaseType::Int, Value::Char(c)) => Ok(Value::Int(c as i64)),
            (BaseType::Double, v @ Value::Double(_)) => Ok(v),
            (BaseType::Double, Value::Int(i)) => Ok(Value::Double(i as f64)),
            (BaseType::Double, Value::Char(c)) => Ok(Value::Double(c as u32 as f64)),
            (BaseType::Bool, v @ Value::Bool(_)) => Ok(v),
            (BaseType::Char, v @ Value::Char(_)) => Ok(v),
            (BaseType::String, v @ (Value::Str(_) | Value::Null)) => Ok(v),
            (BaseType::Void, _) => Ok(Value::Unit),
            (_, other) => Err(mismatch(&other)),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Double(_) => "double",
            Value::Bool(_) => "bool",
            Value::Char(_) => "char",
            Value::Str(_) => "string",
            Value::Array(_) => "array",
            Value::Null => "null",
            Value::Unit => "void",
        }
    }

    /// Numeric view for arithmetic and comparison.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Double(d) => Some(*d),
            Value::Char(c) => Some(*c as u32 as f64),
            _ => None,
        }
    }

    /// Integer view; chars widen to their code point.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Char(c) => Some(*c as i64),
            _ => None,
        }
    }

    /// Plain text, as `print` and string concatenation see it.
    pub fn to_text(&self) -> String {
        match self {
            Value::Int(i) => i.to_string(),
            Value::Double(d) => double_text(*d),
            Value::Bool(true) => "True".to_string(),
            Value::Bool(false) => "False".to_string(),
            Value::Char(c) => c.to_string(),
            Value::Str(s) => s.to_string(),
            Value::Array(array) => format!("{}[]", print_type(array.elem())),
            Value::Null | Value::Unit => String::new(),
        }
    }

    /// Trace rendering: strings and chars quoted, arrays as `| a | b |`,
    /// everything cut to [`DISPLAY_LIMIT`] characters.
    pub fn display(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Str(s) => format!("\"{}\"", truncate(s, DISPLAY_LIMIT)),
            Value::Char(c) => format!("'{c}'"),
            Value::Array(array) => {
                let items = array.snapshot();
                if items.is_empty() {
                    return "| |".to_string();
                }
                let parts: Vec<String> = items.iter().map(Value::display).collect();
                format!("| {} |", parts.join(" | "))
            }
            other => truncate(&other.to_text(), DISPLAY_LIMIT).to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => &text[..cut],
        None => text,
    }
}

fn double_text(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        format!("{value}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::span::Span;

    fn ty(base: BaseType, rank: u8) -> TypeRef {
        TypeRef {
            base,
            rank,
            span: Span::default(),
        }
    }

    #[test]
    fn display_quotes_strings_and_chars() {
        assert_eq!(Value::str("hi").display(), "\"hi\"");
        assert_eq!(Value::Char('a').display(), "'a'");
        assert_eq!(Value::Int(-3).display(), "-3");
        assert_eq!(Value::Bool(true).display(), "True");
        assert_eq!(Value::Null.display(), "null");
    }

    #[test]
    fn display_truncates_long_strings() {
        let long = "x".repeat(150);
        let shown = Value::str(&long).display();
        assert_eq!(shown.len(), DISPLAY_LIMIT + 2);
    }

    #[test]
    fn display_renders_arrays_with_bars() {
        let array = ArrayRef::new(ty(BaseType::Int, 0), vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(Value::Array(array).display(), "| 1 | 2 |");
        let words = ArrayRef::new(ty(BaseType::String, 0), vec![Value::str("a")]);
        assert_eq!(Value::Array(words).display(), "| \"a\" |");
    }

    #[test]
    fn doubles_print_shortest_form() {
        assert_eq!(Value::Double(1.0).display(), "1");
        assert_eq!(Value::Double(0.1).display(), "0.1");
        assert_eq!(Value::Double(f64::INFINITY).display(), "Infinity");
    }

    #[test]
    fn coercion_widens_numbers() {
        let double = ty(BaseType::Double, 0);
        assert!(matches!(Value::Int(2).coerce_to(&double), Ok(Value::Double(d)) if d == 2.0));
        let int = ty(BaseType::Int, 0);
        assert!(matches!(Value::Char('a').coerce_to(&int), Ok(Value::Int(97))));
        assert!(matches!(
            Value::str("s").coerce_to(&int),
            Err(RuntimeErrorKind::TypeMismatch { .. })
        ));
    }

    #[test]
    fn arrays_alias_and_bounds_check() {
        let a = ArrayRef::new(ty(BaseType::Double, 0), vec![Value::Double(0.0); 2]);
        let alias = a.clone();
        alias.set(1, Value::Int(5)).unwrap();
        assert!(matches!(a.get(1), Ok(Value::Double(d)) if d == 5.0));
        assert!(a.ptr_eq(&alias));
        assert!(matches!(
            a.get(2),
            Err(RuntimeErrorKind::IndexOutOfRange { index: 2, length: 2 })
        ));
        assert!(a.get(-1).is_err());
    }

    #[test]
    fn defaults_follow_type() {
        assert!(matches!(Value::default_for(&ty(BaseType::Int, 0)), Value::Int(0)));
        assert!(matches!(Value::default_for(&ty(BaseType::String, 0)), Value::Null));
        assert!(matches!(Value::default_for(&ty(BaseType::Int, 1)), Value::Null));
    }
}
