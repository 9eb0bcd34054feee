pub mod claim;
pub mod document;
pub mod enums;

pub use claim::*;
pub use document::*;
pub use enums::*;
