mod dtype;
mod shape;
mod tensor;

pub use dtype::{DType, Element};
pub use shape::{format_shape, numel};
pub use tensor::{Buffer, Tensor};
