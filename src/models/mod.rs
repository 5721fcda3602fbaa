pub mod anomaly;
pub mod document;
pub mod enums;
pub mod limit;
pub mod measurement;
pub mod result;
pub mod verdict;

pub use anomaly::*;
pub use document::*;
pub use enums::*;
pub use limit::*;
pub use measurement::*;
pub use result::*;
pub use verdict::*;
