pub mod benchmark;
pub mod runs;
