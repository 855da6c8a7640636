pub mod bits;
pub mod comm;
pub mod dataset;
pub mod engine;
pub mod error;
pub mod matrix;
pub mod pairs;
pub mod preprocess;
pub mod source;
