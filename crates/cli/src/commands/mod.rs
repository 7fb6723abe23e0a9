pub mod logging;
pub mod output;
pub mod symbolicate;

pub use logging::*;
pub use output::*;
pub use symbolicate::*;
