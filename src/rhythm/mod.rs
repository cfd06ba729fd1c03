// Rhythm module - pattern generators
// Euclidean rhythms, swing, scales and the four instrument generators

pub mod bass;
pub mod drums;
pub mod euclidean;
pub mod melody;
pub mod scale;
pub mod strum;
pub mod swing;

pub use euclidean::{EuclideanSpec, euclidean};
pub use scale::{Key, Scale};
