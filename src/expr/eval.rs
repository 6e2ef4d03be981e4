//! @acp:module "Expression Evaluation"
//! @acp:summary "Evaluate parsed expressions against a tag lookup"
//! @acp:domain engine
//! @acp:layer logic

use std::cmp::Ordering;

use serde_json::{Number, Value};

use super::parser::{BinaryOp, Expr};
use super::{coerce_bool, TagLookup};
use crate::error::describe_value;

/// Evaluate an expression tree; errors are plain messages, wrapped by the caller
pub(crate) fn eval(expr: &Expr, ctx: &dyn TagLookup) -> Result<Value, String> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Tag(name) => ctx
            .lookup(name)
            .cloned()
            .ok_or_else(|| format!("unknown tag '{}'", name)),
        Expr::Tags => Err("the tag index can only be used as a membership operand".to_string()),
        Expr::Not(inner) => Ok(Value::Bool(!truthy(&eval(inner, ctx)?)?)),
        Expr::Neg(inner) => negate(&eval(inner, ctx)?),
        Expr::Binary { op, lhs, rhs } => eval_binary(*op, lhs, rhs, ctx),
    }
}

fn eval_binary(op: BinaryOp, lhs: &Expr, rhs: &Expr, ctx: &dyn TagLookup) -> Result<Value, String> {
    match op {
        BinaryOp::Or => {
            if truthy(&eval(lhs, ctx)?)? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(truthy(&eval(rhs, ctx)?)?))
        }
        BinaryOp::And => {
            if !truthy(&eval(lhs, ctx)?)? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(truthy(&eval(rhs, ctx)?)?))
        }
        BinaryOp::In | BinaryOp::NotIn => {
            let needle = eval(lhs, ctx)?;
            let found = member_of(rhs, &needle, ctx)?;
            Ok(Value::Bool(if op == BinaryOp::In { found } else { !found }))
        }
        BinaryOp::Contains => {
            let needle = eval(rhs, ctx)?;
            Ok(Value::Bool(member_of(lhs, &needle, ctx)?))
        }
        _ => {
            let l = eval(lhs, ctx)?;
            let r = eval(rhs, ctx)?;
            match op {
                BinaryOp::Eq => Ok(Value::Bool(loose_eq(&l, &r))),
                BinaryOp::Ne => Ok(Value::Bool(!loose_eq(&l, &r))),
                BinaryOp::Lt => Ok(Value::Bool(compare(&l, &r)? == Ordering::Less)),
                BinaryOp::Lte => Ok(Value::Bool(compare(&l, &r)? != Ordering::Greater)),
                BinaryOp::Gt => Ok(Value::Bool(compare(&l, &r)? == Ordering::Greater)),
                BinaryOp::Gte => Ok(Value::Bool(compare(&l, &r)? != Ordering::Less)),
                _ => arithmetic(op, &l, &r),
            }
        }
    }
}

fn truthy(value: &Value) -> Result<bool, String> {
    coerce_bool(value).map_err(|e| e.to_string())
}

fn member_of(collection: &Expr, needle: &Value, ctx: &dyn TagLookup) -> Result<bool, String> {
    if let Expr::Tags = collection {
        return match needle {
            Value::String(tag) => Ok(ctx.lookup(tag).is_some()),
            other => Err(format!("tag names must be strings, got {}", describe_value(other))),
        };
    }

    match eval(collection, ctx)? {
        Value::Array(items) => Ok(items.iter().any(|item| loose_eq(item, needle))),
        Value::String(text) => match needle {
            Value::String(part) => Ok(text.contains(part.as_str())),
            other => Err(format!("cannot search {} in a string", describe_value(other))),
        },
        Value::Object(map) => match needle {
            Value::String(key) => Ok(map.contains_key(key)),
            other => Err(format!("object keys must be strings, got {}", describe_value(other))),
        },
        other => Err(format!("{} is not a collection", describe_value(&other))),
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(i), Some(j)) => i == j,
            _ => x.as_f64() == y.as_f64(),
        },
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Result<Ordering, String> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            if let (Some(i), Some(j)) = (x.as_i64(), y.as_i64()) {
                return Ok(i.cmp(&j));
            }
            let (fx, fy) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
            fx.partial_cmp(&fy)
                .ok_or_else(|| format!("cannot order {} and {}", x, y))
        }
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => Err(format!(
            "cannot compare {} with {}",
            describe_value(a),
            describe_value(b)
        )),
    }
}

fn negate(value: &Value) -> Result<Value, String> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return i
                    .checked_neg()
                    .map(Value::from)
                    .ok_or_else(|| "integer overflow".to_string());
            }
            float_value(-n.as_f64().unwrap_or(f64::NAN))
        }
        other => Err(format!("cannot negate {}", describe_value(other))),
    }
}

fn arithmetic(op: BinaryOp, a: &Value, b: &Value) -> Result<Value, String> {
    let (x, y) = match (a, b) {
        (Value::String(x), Value::String(y)) if op == BinaryOp::Add => {
            return Ok(Value::String(format!("{}{}", x, y)));
        }
        (Value::Number(x), Value::Number(y)) => (x, y),
        _ => {
            return Err(format!(
                "arithmetic needs numbers, got {} and {}",
                describe_value(a),
                describe_value(b)
            ))
        }
    };

    if let (Some(i), Some(j)) = (x.as_i64(), y.as_i64()) {
        let result = match op {
            BinaryOp::Add => i.checked_add(j),
            BinaryOp::Sub => i.checked_sub(j),
            BinaryOp::Mul => i.checked_mul(j),
            BinaryOp::Div => {
                if j == 0 {
                    return Err("division by zero".to_string());
                }
                if i % j != 0 {
                    return float_value(i as f64 / j as f64);
                }
                i.checked_div(j)
            }
            BinaryOp::Rem => {
                if j == 0 {
                    return Err("division by zero".to_string());
                }
                i.checked_rem(j)
            }
            _ => unreachable!("non-arithmetic operator {:?}", op),
        };
        return result
            .map(Value::from)
            .ok_or_else(|| "integer overflow".to_string());
    }

    let (fx, fy) = (x.as_f64().unwrap_or(f64::NAN), y.as_f64().unwrap_or(f64::NAN));
    if matches!(op, BinaryOp::Div | BinaryOp::Rem) && fy == 0.0 {
        return Err("division by zero".to_string());
    }
    float_value(match op {
        BinaryOp::Add => fx + fy,
        BinaryOp::Sub => fx - fy,
        BinaryOp::Mul => fx * fy,
        BinaryOp::Div => fx / fy,
        BinaryOp::Rem => fx % fy,
        _ => unreachable!("non-arithmetic operator {:?}", op),
    })
}

fn float_value(f: f64) -> Result<Value, String> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| format!("{} is not a finite number", f))
}
