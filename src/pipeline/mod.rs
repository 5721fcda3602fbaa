pub mod compliance;
pub mod extraction;
pub mod normalize;
pub mod processor;
pub mod storage;
pub mod structuring;
