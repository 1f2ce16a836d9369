pub mod brep;
pub mod classify;
pub mod mutators;
pub mod primitives;
