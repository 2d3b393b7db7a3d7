//! Operator and builtin evaluation over runtime values.
//!
//! Everything here is pure: no variables, no probes, no control flow. The
//! statement walker in `exec.rs` evaluates operands and calls in here, and the
//! constant folder reuses the same functions so folding can never disagree
//! with execution.
//!
//! Integer arithmetic is checked unless the caller runs inside `unsafe`, in
//! which case it wraps. Division by zero is an error either way.

use lumen_core::ast::{BinaryOp, IncDec, UnaryOp};

use super::error::RuntimeErrorKind;
use super::value::Value;
use crate::builtins::Builtin;

/// How integer overflow is handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    Checked,
    Wrapping,
}

fn mismatch(expected: &str, found: &Value) -> RuntimeErrorKind {
    RuntimeErrorKind::TypeMismatch {
        expected: expected.to_string(),
        found: found.type_name().to_string(),
    }
}

/// Reads a value used as a condition.
pub fn truthy(value: &Value) -> Result<bool, RuntimeErrorKind> {
    match value {
        Value::Bool(b) => Ok(*b),
        other => Err(mismatch("bool", other)),
    }
}

/// Reads a value used as an array index or size.
pub fn integer(value: &Value) -> Result<i64, RuntimeErrorKind> {
    value.as_i64().ok_or_else(|| mismatch("int", value))
}

fn is_double(value: &Value) -> bool {
    matches!(value, Value::Double(_))
}

fn is_text(value: &Value) -> bool {
    matches!(value, Value::Str(_))
}

/// Evaluates a binary operator with both operands already computed.
///
/// `&&` and `||` are accepted on booleans for completeness; the walker
/// short-circuits them before getting here.
pub fn binary(
    op: BinaryOp,
    lhs: &Value,
    rhs: &Value,
    overflow: Overflow,
) -> Result<Value, RuntimeErrorKind> {
    match op {
        BinaryOp::Add if is_text(lhs) || is_text(rhs) => {
            let mut text = lhs.to_text();
            text.push_str(&rhs.to_text());
            Ok(Value::str(&text))
        }
        BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
            arithmetic(op, lhs, rhs, overflow)
        }
        BinaryOp::Eq => equals(lhs, rhs).map(Value::Bool),
        BinaryOp::Ne => equals(lhs, rhs).map(|eq| Value::Bool(!eq)),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => compare(op, lhs, rhs),
        BinaryOp::And | BinaryOp::Or => {
            let (a, b) = (truthy(lhs)?, truthy(rhs)?);
            Ok(Value::Bool(if op == BinaryOp::And { a && b } else { a || b }))
        }
        BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => bitwise(op, lhs, rhs),
        BinaryOp::Shl | BinaryOp::Shr => {
            let value = lhs.as_i64().ok_or_else(|| mismatch("int", lhs))?;
            let count = (rhs.as_i64().ok_or_else(|| mismatch("int", rhs))? & 63) as u32;
            Ok(Value::Int(if op == BinaryOp::Shl {
                value.wrapping_shl(count)
            } else {
                value >> count
            }))
        }
    }
}

fn arithmetic(
    op: BinaryOp,
    lhs: &Value,
    rhs: &Value,
    overflow: Overflow,
) -> Result<Value, RuntimeErrorKind> {
    if is_double(lhs) || is_double(rhs) {
        let a = lhs.as_f64().ok_or_else(|| mismatch("numeric operand", lhs))?;
        let b = rhs.as_f64().ok_or_else(|| mismatch("numeric operand", rhs))?;
        return Ok(Value::Double(match op {
            BinaryOp::Add => a + b,
            BinaryOp::Sub => a - b,
            BinaryOp::Mul => a * b,
            BinaryOp::Div => a / b,
            _ => a % b,
        }));
    }
    let a = lhs.as_i64().ok_or_else(|| mismatch("numeric operand", lhs))?;
    let b = rhs.as_i64().ok_or_else(|| mismatch("numeric operand", rhs))?;
    if matches!(op, BinaryOp::Div | BinaryOp::Rem) && b == 0 {
        return Err(RuntimeErrorKind::DivideByZero);
    }
    let checked = match op {
        BinaryOp::Add => a.checked_add(b),
        BinaryOp::Sub => a.checked_sub(b),
        BinaryOp::Mul => a.checked_mul(b),
        BinaryOp::Div => a.checked_div(b),
        _ => a.checked_rem(b),
    };
    match (checked, overflow) {
        (Some(value), _) => Ok(Value::Int(value)),
        (None, Overflow::Checked) => Err(RuntimeErrorKind::IntegerOverflow),
        (None, Overflow::Wrapping) => Ok(Value::Int(match op {
            BinaryOp::Add => a.wrapping_add(b),
            BinaryOp::Sub => a.wrapping_sub(b),
            BinaryOp::Mul => a.wrapping_mul(b),
            BinaryOp::Div => a.wrapping_div(b),
            _ => a.wrapping_rem(b),
        })),
    }
}

/// `==` semantics: value equality for scalars and strings, identity for
/// arrays, and `null` equal only to `null`.
pub fn equals(lhs: &Value, rhs: &Value) -> Result<bool, RuntimeErrorKind> {
    match (lhs, rhs) {
        (Value::Null, Value::Null) => Ok(true),
        (Value::Null, Value::Str(_) | Value::Array(_))
        | (Value::Str(_) | Value::Array(_), Value::Null) => Ok(false),
        (Value::Str(a), Value::Str(b)) => Ok(a == b),
        (Value::Bool(a), Value::Bool(b)) => Ok(a == b),
        (Value::Array(a), Value::Array(b)) => Ok(a.ptr_eq(b)),
        _ if is_double(lhs) || is_double(rhs) => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(a), Some(b)) => Ok(a == b),
            _ => Err(mismatch(lhs.type_name(), rhs)),
        },
        _ => match (lhs.as_i64(), rhs.as_i64()) {
            (Some(a), Some(b)) => Ok(a == b),
            _ => Err(mismatch(lhs.type_name(), rhs)),
        },
    }
}

fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeErrorKind> {
    let ordering = if is_double(lhs) || is_double(rhs) {
        let a = lhs.as_f64().ok_or_else(|| mismatch("numeric operand", lhs))?;
        let b = rhs.as_f64().ok_or_else(|| mismatch("numeric operand", rhs))?;
        // NaN compares false under every operator.
        match a.partial_cmp(&b) {
            Some(ordering) => ordering,
            None => return Ok(Value::Bool(false)),
        }
    } else {
        let a = lhs.as_i64().ok_or_else(|| mismatch("numeric operand", lhs))?;
        let b = rhs.as_i64().ok_or_else(|| mismatch("numeric operand", rhs))?;
        a.cmp(&b)
    };
    Ok(Value::Bool(match op {
        BinaryOp::Lt => ordering.is_lt(),
        BinaryOp::Le => ordering.is_le(),
        BinaryOp::Gt => ordering.is_gt(),
        _ => ordering.is_ge(),
    }))
}

fn bitwise(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, RuntimeErrorKind> {
    if let (Value::Bool(a), Value::Bool(b)) = (lhs, rhs) {
        return Ok(Value::Bool(match op {
            BinaryOp::BitAnd => a & b,
            BinaryOp::BitOr => a | b,
            _ => a ^ b,
        }));
    }
    let a = lhs.as_i64().ok_or_else(|| mismatch("int", lhs))?;
    let b = rhs.as_i64().ok_or_else(|| mismatch("int", rhs))?;
    Ok(Value::Int(match op {
        BinaryOp::BitAnd => a & b,
        BinaryOp::BitOr => a | b,
        _ => a ^ b,
    }))
}

pub fn unary(op: UnaryOp, operand: &Value, overflow: Overflow) -> Result<Value, RuntimeErrorKind> {
    match (op, operand) {
        (UnaryOp::Neg, Value::Double(d)) => Ok(Value::Double(-d)),
        (UnaryOp::Neg, v) => {
            let i = v.as_i64().ok_or_else(|| mismatch("numeric operand", v))?;
            match (i.checked_neg(), overflow) {
                (Some(n), _) => Ok(Value::Int(n)),
                (None, Overflow::Wrapping) => Ok(Value::Int(i.wrapping_neg())),
                (None, Overflow::Checked) => Err(RuntimeErrorKind::IntegerOverflow),
            }
        }
        (UnaryOp::Not, v) => truthy(v).map(|b| Value::Bool(!b)),
        (UnaryOp::BitNot, v) => {
            let i = v.as_i64().ok_or_else(|| mismatch("int", v))?;
            Ok(Value::Int(!i))
        }
    }
}

/// The value `++`/`--` stores back into its target.
pub fn step(value: &Value, op: IncDec, overflow: Overflow) -> Result<Value, RuntimeErrorKind> {
    let delta: i64 = match op {
        IncDec::Increment => 1,
        IncDec::Decrement => -1,
    };
    match value {
        Value::Int(i) => match (i.checked_add(delta), overflow) {
            (Some(n), _) => Ok(Value::Int(n)),
            (None, Overflow::Wrapping) => Ok(Value::Int(i.wrapping_add(delta))),
            (None, Overflow::Checked) => Err(RuntimeErrorKind::IntegerOverflow),
        },
        Value::Double(d) => Ok(Value::Double(d + delta as f64)),
        Value::Char(c) => (*c as i64)
            .checked_add(delta)
            .and_then(|code| u32::try_from(code).ok())
            .and_then(char::from_u32)
            .map(Value::Char)
            .ok_or(RuntimeErrorKind::IntegerOverflow),
        other => Err(mismatch("numeric operand", other)),
    }
}

/// Evaluates a builtin other than `print`, which needs the output buffer.
pub fn builtin(
    builtin: Builtin,
    args: &[Value],
    overflow: Overflow,
) -> Result<Value, RuntimeErrorKind> {
    let arg = |index: usize| {
        args.get(index).ok_or_else(|| RuntimeErrorKind::Internal {
            message: format!("{} expects {} arguments", builtin.name(), index + 1),
        })
    };
    match builtin {
        Builtin::Print => Ok(Value::Unit),
        Builtin::Abs => match arg(0)? {
            Value::Double(d) => Ok(Value::Double(d.abs())),
            v => {
                let i = v.as_i64().ok_or_else(|| mismatch("numeric operand", v))?;
                match (i.checked_abs(), overflow) {
                    (Some(n), _) => Ok(Value::Int(n)),
                    (None, Overflow::Wrapping) => Ok(Value::Int(i.wrapping_abs())),
                    (None, Overflow::Checked) => Err(RuntimeErrorKind::IntegerOverflow),
                }
            }
        },
        Builtin::Min | Builtin::Max => {
            let (a, b) = (arg(0)?, arg(1)?);
            let pick_lhs = compare(
                if builtin == Builtin::Min {
                    BinaryOp::Le
                } else {
                    BinaryOp::Ge
                },
                a,
                b,
            )?;
            let chosen = if truthy(&pick_lhs)? { a } else { b };
            if is_double(a) || is_double(b) {
                chosen
                    .as_f64()
                    .map(Value::Double)
                    .ok_or_else(|| mismatch("numeric operand", chosen))
            } else {
                integer(chosen).map(Value::Int)
            }
        }
        Builtin::Sqrt => {
            let v = arg(0)?;
            v.as_f64()
                .map(|f| Value::Double(f.sqrt()))
                .ok_or_else(|| mismatch("numeric operand", v))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(op: BinaryOp, a: i64, b: i64) -> Result<Value, RuntimeErrorKind> {
        binary(op, &Value::Int(a), &Value::Int(b), Overflow::Checked)
    }

    #[test]
    fn integer_arithmetic_is_checked() {
        assert!(matches!(int(BinaryOp::Add, 2, 3), Ok(Value::Int(5))));
        assert!(matches!(int(BinaryOp::Div, 7, 2), Ok(Value::Int(3))));
        assert!(matches!(int(BinaryOp::Rem, -7, 2), Ok(Value::Int(-1))));
        assert_eq!(
            int(BinaryOp::Add, i64::MAX, 1).unwrap_err(),
            RuntimeErrorKind::IntegerOverflow
        );
        assert_eq!(
            int(BinaryOp::Div, 1, 0).unwrap_err(),
            RuntimeErrorKind::DivideByZero
        );
    }

    #[test]
    fn wrapping_mode_wraps() {
        let v = binary(
            BinaryOp::Add,
            &Value::Int(i64::MAX),
            &Value::Int(1),
            Overflow::Wrapping,
        );
        assert!(matches!(v, Ok(Value::Int(i64::MIN))));
        let v = binary(BinaryOp::Div, &Value::Int(1), &Value::Int(0), Overflow::Wrapping);
        assert_eq!(v.unwrap_err(), RuntimeErrorKind::DivideByZero);
    }

    #[test]
    fn mixed_arithmetic_promotes_to_double() {
        let v = binary(BinaryOp::Div, &Value::Int(1), &Value::Double(4.0), Overflow::Checked);
        assert!(matches!(v, Ok(Value::Double(d)) if d == 0.25));
        let v = binary(BinaryOp::Div, &Value::Double(1.0), &Value::Int(0), Overflow::Checked);
        assert!(matches!(v, Ok(Value::Double(d)) if d.is_infinite()));
    }

    #[test]
    fn string_concatenation_uses_text() {
        let v = binary(BinaryOp::Add, &Value::str("n="), &Value::Int(3), Overflow::Checked);
        assert!(matches!(v, Ok(Value::Str(s)) if &*s == "n=3"));
        let v = binary(BinaryOp::Add, &Value::Bool(true), &Value::str("!"), Overflow::Checked);
        assert!(matches!(v, Ok(Value::Str(s)) if &*s == "True!"));
    }

    #[test]
    fn equality_rules() {
        assert_eq!(equals(&Value::str("a"), &Value::str("a")), Ok(true));
        assert_eq!(equals(&Value::Null, &Value::str("a")), Ok(false));
        assert_eq!(equals(&Value::Int(97), &Value::Char('a')), Ok(true));
        assert_eq!(equals(&Value::Int(1), &Value::Double(1.0)), Ok(true));
        assert!(equals(&Value::Bool(true), &Value::Int(1)).is_err());
    }

    #[test]
    fn comparisons_and_bitwise() {
        assert!(matches!(int(BinaryOp::Lt, 1, 2), Ok(Value::Bool(true))));
        assert!(matches!(int(BinaryOp::Ge, 1, 2), Ok(Value::Bool(false))));
        assert!(matches!(int(BinaryOp::BitXor, 6, 3), Ok(Value::Int(5))));
        assert!(matches!(int(BinaryOp::Shl, 1, 65), Ok(Value::Int(2))));
        let v = binary(
            BinaryOp::BitAnd,
            &Value::Bool(true),
            &Value::Bool(false),
            Overflow::Checked,
        );
        assert!(matches!(v, Ok(Value::Bool(false))));
    }

    #[test]
    fn unary_and_step() {
        assert!(matches!(
            unary(UnaryOp::Neg, &Value::Int(4), Overflow::Checked),
            Ok(Value::Int(-4))
        ));
        assert_eq!(
            unary(UnaryOp::Neg, &Value::Int(i64::MIN), Overflow::Checked).unwrap_err(),
            RuntimeErrorKind::IntegerOverflow
        );
        assert!(matches!(
            step(&Value::Int(1), IncDec::Increment, Overflow::Checked),
            Ok(Value::Int(2))
        ));
        assert!(matches!(
            step(&Value::Char('a'), IncDec::Increment, Overflow::Checked),
            Ok(Value::Char('b'))
        ));
        assert!(step(&Value::str("x"), IncDec::Decrement, Overflow::Checked).is_err());
    }

    #[test]
    fn builtins() {
        let abs = builtin(Builtin::Abs, &[Value::Int(-3)], Overflow::Checked);
        assert!(matches!(abs, Ok(Value::Int(3))));
        let min = builtin(Builtin::Min, &[Value::Int(4), Value::Int(2)], Overflow::Checked);
        assert!(matches!(min, Ok(Value::Int(2))));
        let max = builtin(Builtin::Max, &[Value::Int(4), Value::Double(4.5)], Overflow::Checked);
        assert!(matches!(max, Ok(Value::Double(d)) if d == 4.5));
        let sqrt = builtin(Builtin::Sqrt, &[Value::Int(9)], Overflow::Checked);
        assert!(matches!(sqrt, Ok(Value::Double(d)) if d == 3.0));
    }

    proptest::proptest! {
        #[test]
        fn checked_and_wrapping_agree_without_overflow(a in -1000i64..1000, b in -1000i64..1000) {
            for op in [BinaryOp::Add, BinaryOp::Sub, BinaryOp::Mul] {
                let checked = binary(op, &Value::Int(a), &Value::Int(b), Overflow::Checked);
                let wrapped = binary(op, &Value::Int(a), &Value::Int(b), Overflow::Wrapping);
                proptest::prop_assert!(matches!(
                    (checked, wrapped),
                    (Ok(Value::Int(x)), Ok(Value::Int(y))) if x == y
                ));
            }
        }

        #[test]
        fn overflow_is_an_error_only_when_checked(a in i64::MAX - 100..=i64::MAX, b in 101i64..1000) {
            let checked = binary(BinaryOp::Add, &Value::Int(a), &Value::Int(b), Overflow::Checked);
            proptest::prop_assert_eq!(checked.unwrap_err(), RuntimeErrorKind::IntegerOverflow);
            let wrapped = binary(BinaryOp::Add, &Value::Int(a), &Value::Int(b), Overflow::Wrapping);
            proptest::prop_assert!(matches!(wrapped, Ok(Value::Int(v)) if v == a.wrapping_add(b)));
        }
    }
}
