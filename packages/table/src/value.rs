//! Extraction helpers for values read out of the replicated containers.
//!
//! Remote replicas (including the pre-migration JavaScript client) may have
//! written numbers as floats or bigints and left fields absent, so every read
//! goes through a tolerant accessor instead of a hard cast.

use yrs::{Any, MapRef, Out};

pub(crate) fn as_str(out: &Out) -> Option<String> {
    match out {
        Out::Any(Any::String(s)) => Some(s.to_string()),
        _ => None,
    }
}

pub(crate) fn as_i64(out: &Out) -> Option<i64> {
    match out {
        Out::Any(Any::BigInt(n)) => Some(*n),
        Out::Any(Any::Number(n)) => Some(*n as i64),
        _ => None,
    }
}

pub(crate) fn as_f64(out: &Out) -> Option<f64> {
    match out {
        Out::Any(Any::Number(n)) => Some(*n),
        Out::Any(Any::BigInt(n)) => Some(*n as f64),
        _ => None,
    }
}

pub(crate) fn as_map(out: Out) -> Option<MapRef> {
    match out {
        Out::YMap(map) => Some(map),
        _ => None,
    }
}

pub(crate) fn as_str_list(out: &Out) -> Option<Vec<String>> {
    match out {
        Out::Any(Any::Array(items)) => Some(
            items
                .iter()
                .filter_map(|item| match item {
                    Any::String(s) => Some(s.to_string()),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    }
}
