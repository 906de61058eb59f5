pub mod gf;
pub mod scalar;

pub use gf::{poly, FieldError};
pub use scalar::{fft, ifft, root_of_unity, ScalarFieldError};
