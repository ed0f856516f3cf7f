pub mod errors;
pub mod observation;
pub mod values;

pub use errors::*;
pub use observation::*;
pub use values::*;
