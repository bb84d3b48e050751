#![deny(missing_docs)]
//! The Step Driver: advances a compiled program one operator at a time,
//! applying the Operator Runner and consulting `next` for fall-through.

mod cancel;
mod driver;
mod error;

pub use cancel::CancellationToken;
pub use driver::StepDriver;
pub use error::DriverError;
