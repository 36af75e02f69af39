pub mod general;

pub use general::{InvalidScore, Score};
