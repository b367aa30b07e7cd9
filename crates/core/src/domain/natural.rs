// Natural (alphanumeric-aware) ordering
//
// Embedded digit runs compare by numeric value, so "item2" < "item10".
// Used by the pageable engine for its in-memory sort; the database never
// sees the ordering.

use crate::domain::value::Value;
use std::cmp::Ordering;

/// Compares two strings treating digit runs as numbers.
///
/// Case-insensitive on the non-digit chunks. Digit runs compare by
/// magnitude (leading zeros stripped via length-then-lexical comparison);
/// equal magnitudes fall back to the raw chunk so ordering stays total.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = Chunks::new(a);
    let mut right = Chunks::new(b);

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) => {
                let ord = match (x, y) {
                    (Chunk::Digits(dx), Chunk::Digits(dy)) => cmp_digit_runs(dx, dy),
                    (Chunk::Digits(_), Chunk::Other(_)) => Ordering::Less,
                    (Chunk::Other(_), Chunk::Digits(_)) => Ordering::Greater,
                    (Chunk::Other(sx), Chunk::Other(sy)) => cmp_case_insensitive(sx, sy),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Natural comparison over scalar values.
///
/// Nulls sort first; numbers compare numerically; text compares naturally;
/// dates chronologically. Mixed kinds fall back to the rendered string so
/// the ordering is total over heterogeneous columns.
pub fn natural_value_cmp(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Integer(x), Value::Integer(y)) => x.cmp(y),
        (Value::Boolean(x), Value::Boolean(y)) => x.cmp(y),
        (Value::Date(x), Value::Date(y)) => x.cmp(y),
        (Value::DateTime(x), Value::DateTime(y)) => x.cmp(y),
        (Value::Text(x), Value::Text(y)) => natural_cmp(x, y),
        _ => {
            if let (Some(x), Some(y)) = (a.as_float(), b.as_float()) {
                return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
            }
            natural_cmp(&a.render(), &b.render())
        }
    }
}

fn cmp_digit_runs(a: &str, b: &str) -> Ordering {
    let sa = a.trim_start_matches('0');
    let sb = b.trim_start_matches('0');
    sa.len()
        .cmp(&sb.len())
        .then_with(|| sa.cmp(sb))
        .then_with(|| a.cmp(b))
}

fn cmp_case_insensitive(a: &str, b: &str) -> Ordering {
    let folded = a
        .chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase));
    folded.then_with(|| a.cmp(b))
}

#[derive(Debug, PartialEq)]
enum Chunk<'a> {
    Digits(&'a str),
    Other(&'a str),
}

struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Chunks<'a> {
    fn new(s: &'a str) -> Self {
        Self { rest: s }
    }
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Chunk<'a>> {
        let first = self.rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let split = self
            .rest
            .find(|c: char| c.is_ascii_digit() != digits)
            .unwrap_or(self.rest.len());
        let (chunk, rest) = self.rest.split_at(split);
        self.rest = rest;
        Some(if digits {
            Chunk::Digits(chunk)
        } else {
            Chunk::Other(chunk)
        })
    }
}
