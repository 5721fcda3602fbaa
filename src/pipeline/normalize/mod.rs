pub mod normalizer;
pub mod value;
pub mod vocabulary;

pub use normalizer::*;
pub use value::*;
pub use vocabulary::*;
