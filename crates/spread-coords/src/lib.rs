//! Coordinate/Array Kernel: the `Field` tagged variant, the closed
//! `Variable` sum type, `FieldSet`, `BoundingBox`, and the four
//! nearest-neighbour/regrid operations the rest of SynopticSpread builds
//! on (`extract_point`, `regrid_to_regular`, `common_bbox`, `make_axis`).
//!
//! Everything here is pure — no I/O, no async. `f64` throughout;
//! distances are degree-Euclidean with no great-circle correction,
//! which is acceptable for regional comparison at CONUS latitudes and
//! the resolutions this pipeline operates at.

mod bbox;
mod error;
mod field;
mod fieldset;
mod variable;

pub use bbox::BoundingBox;
pub use error::{KernelError, Result};
pub use field::{common_bbox, extract_point, make_axis, regrid_to_regular, Field};
pub use fieldset::FieldSet;
pub use variable::{ParseVariableError, Variable};
