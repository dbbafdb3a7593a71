pub mod cleanup;
pub mod ocr;
pub mod pipeline;
pub mod renderer;
pub mod staging;
pub mod worker;
