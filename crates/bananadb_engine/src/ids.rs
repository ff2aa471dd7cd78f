/* 📖 # Why does the first item decide how new ids look?

Mock data usually comes in one of two shapes: hand-written fixtures with ids 1, 2, 3,
or exported records with opaque string ids. Looking only at the first item keeps new
records consistent with whatever the author started with. A collection whose first id
is a number keeps counting upwards; anything else gets short random strings.
*/

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};

use serde_json::{Number, Value};

/// Field holding an item's identifier.
pub const ID_FIELD: &str = "id";

/// Length of generated string ids.
pub const GENERATED_ID_LENGTH: usize = 6;

/// Alphabet for generated string ids.
pub const ALPHANUMERIC: [char; 62] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H',
    'I', 'J', 'K', 'L', 'M', 'N', 'O', 'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z',
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r',
    's', 't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// Source of string ids for collections that do not use numeric ids.
pub trait IdGenerator: Debug + Send + Sync + 'static {
    fn generate(&self) -> String;
}

/// Random alphanumeric ids via `nanoid`.
#[derive(Debug, Clone)]
pub struct NanoIdGenerator {
    length: usize,
}

impl NanoIdGenerator {
    pub fn new(length: usize) -> Self {
        Self { length }
    }
}

impl Default for NanoIdGenerator {
    fn default() -> Self {
        Self::new(GENERATED_ID_LENGTH)
    }
}

impl IdGenerator for NanoIdGenerator {
    fn generate(&self) -> String {
        nanoid::format(nanoid::rngs::default, &ALPHANUMERIC, self.length)
    }
}

/// Predictable ids `<prefix>1`, `<prefix>2`, ... for reproducible fixtures and tests.
#[derive(Debug)]
pub struct SequentialIdGenerator {
    prefix: String,
    counter: AtomicU64,
}

impl SequentialIdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: AtomicU64::new(0),
        }
    }
}

impl IdGenerator for SequentialIdGenerator {
    fn generate(&self) -> String {
        let next = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{}{}", self.prefix, next)
    }
}

/// Pick the id for an item about to be appended to `items`.
///
/// A requested id (any value, `null` included) is used as is. Otherwise, if the first
/// item's id is a number the result is one more than the largest numeric id present,
/// and in every other case the generator supplies a fresh string.
pub fn assign_id(items: &[Value], requested: Option<&Value>, generator: &dyn IdGenerator) -> Value {
    if let Some(requested) = requested {
        return requested.clone();
    }
    let first_is_numeric = items
        .first()
        .and_then(|item| item.get(ID_FIELD))
        .is_some_and(Value::is_number);
    if first_is_numeric {
        next_numeric_id(items)
    } else {
        Value::String(generator.generate())
    }
}

fn next_numeric_id(items: &[Value]) -> Value {
    // Items without a numeric id take part as 0.
    let numeric_ids: Vec<Option<&Number>> = items
        .iter()
        .map(|item| match item.get(ID_FIELD) {
            Some(Value::Number(n)) => Some(n),
            _ => None,
        })
        .collect();

    let integer_max = numeric_ids
        .iter()
        .map(|id| id.map_or(Some(0), Number::as_i64))
        .try_fold(i64::MIN, |max, id| id.map(|id| max.max(id)));
    if let Some(next) = integer_max.and_then(|max| max.checked_add(1)) {
        return Value::from(next);
    }

    let float_max = numeric_ids
        .iter()
        .map(|id| id.and_then(Number::as_f64).unwrap_or(0.0))
        .fold(f64::NEG_INFINITY, f64::max);
    float_to_value(float_max + 1.0)
}

const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

fn float_to_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        return Value::from(value as i64);
    }
    Number::from_f64(value).map_or(Value::Null, Value::Number)
}

/// String form of an id value, as it would appear in a URL.
///
/// Follows the JavaScript `String(value)` conversion, so fixtures written for JS mock
/// servers address the same items. Numbers switch to exponent form outside
/// `1e-7..1e21`. Arrays join their elements with commas.
pub fn render_id(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        Value::Number(n) => render_number(n),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(elements) => elements
            .iter()
            .map(|element| match element {
                Value::Null => String::new(),
                other => render_id(other),
            })
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => "[object Object]".to_string(),
    }
}

fn render_number(n: &Number) -> String {
    if n.is_i64() || n.is_u64() {
        return n.to_string();
    }
    match n.as_f64() {
        Some(f) => render_float(f),
        None => n.to_string(),
    }
}

fn render_float(f: f64) -> String {
    if f == 0.0 {
        return "0".to_string();
    }
    // `{:e}` yields the shortest round-trip digits as `d.ddde<exp>`.
    let scientific = format!("{:e}", f.abs());
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return f.to_string();
    };
    let Ok(exponent) = exponent.parse::<i32>() else {
        return f.to_string();
    };
    let digits = mantissa.replace('.', "");
    let sign = if f < 0.0 { "-" } else { "" };
    let count = digits.len() as i32;
    // Position of the decimal point relative to the start of `digits`.
    let point = exponent + 1;

    let body = if count <= point && point <= 21 {
        format!("{digits}{}", "0".repeat((point - count) as usize))
    } else if 0 < point && point <= 21 {
        let (whole, fraction) = digits.split_at(point as usize);
        format!("{whole}.{fraction}")
    } else if -6 < point && point <= 0 {
        format!("0.{}{digits}", "0".repeat((-point) as usize))
    } else {
        let exponent_sign = if exponent < 0 { "-" } else { "+" };
        let (lead, rest) = digits.split_at(1);
        let fraction = if rest.is_empty() {
            String::new()
        } else {
            format!(".{rest}")
        };
        format!("{lead}{fraction}e{exponent_sign}{}", exponent.abs())
    };
    format!("{sign}{body}")
}

/// Whether `item` is an object whose id renders to `id`.
pub fn id_matches(item: &Value, id: &str) -> bool {
    item.get(ID_FIELD).is_some_and(|value| render_id(value) == id)
}
