//! Row structs for the `runs` and `results` tables.
//!
//! Each row converts into the corresponding engine record from
//! `protobench_core::store`.

pub mod result;
pub mod run;
