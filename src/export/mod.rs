//! Export of mix plans as JSON

pub mod json;

pub use json::{read_plan_json, write_json_atomic, write_plan_json};
