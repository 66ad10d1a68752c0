pub mod enums;
pub mod hospitalization;

pub use hospitalization::*;
