pub mod driver;
pub mod error;
pub mod local;

pub use driver::Driver;
pub use error::DriverError;
pub use local::LocalDriver;
