pub mod case;
pub mod catalog;
pub mod client;
pub mod enums;
pub mod session;

pub use case::*;
pub use catalog::*;
pub use client::*;
pub use enums::*;
pub use session::*;
