//! The face/face and edge/face intersection engine.

pub mod context;
pub mod coplanar;
pub mod cutter;
pub mod edge_face;
pub mod enlist;
pub mod error;
pub mod face_face;
pub mod projection;
pub mod resolve;
pub mod shells;
pub mod vertex_face;
pub mod walker;
