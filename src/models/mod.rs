pub mod diagnosis;
pub mod enums;
pub mod lab;
pub mod medication;
pub mod patient;
pub mod report;
pub mod vital_sign;

pub use diagnosis::*;
pub use enums::*;
pub use lab::*;
pub use medication::*;
pub use patient::*;
pub use report::*;
pub use vital_sign::*;
