pub mod diagnostic;
pub mod hole;
pub mod info;
pub mod roi;

pub use diagnostic::*;
pub use hole::*;
pub use info::*;
pub use roi::*;
