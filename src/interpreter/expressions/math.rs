//! Math library available to expressions
//!
//! Functions are reachable both bare (`sqrt(x)`) and through the `Math`
//! record (`Math.sqrt(x)`). Arguments are coerced to numbers; a missing
//! argument reads as `NaN`.

use super::ExprError;
use crate::interpreter::types::Val;
use rand::Rng;
use std::collections::HashMap;

const CONSTANTS: &[(&str, f64)] = &[
    ("PI", std::f64::consts::PI),
    ("E", std::f64::consts::E),
    ("LN2", std::f64::consts::LN_2),
    ("LN10", std::f64::consts::LN_10),
    ("LOG2E", std::f64::consts::LOG2_E),
    ("LOG10E", std::f64::consts::LOG10_E),
    ("SQRT2", std::f64::consts::SQRT_2),
    ("SQRT1_2", std::f64::consts::FRAC_1_SQRT_2),
];

pub fn constant(name: &str) -> Option<f64> {
    CONSTANTS
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, v)| *v)
}

/// The `Math` record as seen by member access (`Math.PI`)
pub fn namespace() -> Val {
    let fields: HashMap<String, Val> = CONSTANTS
        .iter()
        .map(|(n, v)| (n.to_string(), Val::Num(*v)))
        .collect();
    Val::Obj(fields)
}

pub fn call(name: &str, args: &[Val]) -> Result<Val, ExprError> {
    let nums: Vec<f64> = args.iter().map(Val::to_number).collect();
    let arg = |i: usize| nums.get(i).copied().unwrap_or(f64::NAN);
    let x = arg(0);

    let result = match name {
        "abs" => x.abs(),
        "acos" => x.acos(),
        "asin" => x.asin(),
        "atan" => x.atan(),
        "atan2" => x.atan2(arg(1)),
        "cbrt" => x.cbrt(),
        "ceil" => x.ceil(),
        "cos" => x.cos(),
        "exp" => x.exp(),
        "floor" => x.floor(),
        "hypot" => nums.iter().map(|n| n * n).sum::<f64>().sqrt(),
        "log" => x.ln(),
        "log10" => x.log10(),
        "log2" => x.log2(),
        "max" => fold_extreme(&nums, f64::NEG_INFINITY, |a, b| b > a),
        "min" => fold_extreme(&nums, f64::INFINITY, |a, b| b < a),
        "pow" => x.powf(arg(1)),
        "random" => rand::thread_rng().gen::<f64>(),
        // Halves round towards +Infinity
        "round" => (x + 0.5).floor(),
        "sign" => {
            if x.is_nan() || x == 0.0 {
                x
            } else {
                x.signum()
            }
        }
        "sin" => x.sin(),
        "sqrt" => x.sqrt(),
        "tan" => x.tan(),
        "trunc" => x.trunc(),
        _ => return Err(ExprError::UnknownFunction(name.to_string())),
    };

    Ok(Val::Num(result))
}

/// max/min with NaN propagation
fn fold_extreme(nums: &[f64], init: f64, better: impl Fn(f64, f64) -> bool) -> f64 {
    let mut acc = init;
    for &n in nums {
        if n.is_nan() {
            return f64::NAN;
        }
        if better(acc, n) {
            acc = n;
        }
    }
    acc
}
