pub mod command;
pub mod driver;

pub use command::*;
pub use driver::*;
