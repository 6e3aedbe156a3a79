//! Safe SQL builder: identifiers from known columns only, values as parameters.

mod builder;
pub mod params;
pub use builder::*;
pub use params::*;
