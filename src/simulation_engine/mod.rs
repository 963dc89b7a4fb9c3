pub mod emergency;
pub mod generator;
pub mod intersections;
pub mod patterns;
pub mod signals;
pub mod simulation;
