pub mod names;
pub mod simulate;
