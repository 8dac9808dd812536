//! `FieldSet` — a mapping from the closed `Variable` set to a `Field`,
//! for a single `(model, init_time, lead_hour)`.

use std::collections::BTreeMap;

use crate::field::Field;
use crate::variable::Variable;

/// The per-variable fields a fetcher returns for one lead hour.
///
/// `BTreeMap` over `HashMap` so the metric engine and tests iterate
/// variables in a fixed canonical order (ascending lead hours, fixed
/// canonical variable order within a single orchestrator run), instead
/// of relying on per-run hash iteration order.
pub type FieldSet = BTreeMap<Variable, Field>;
