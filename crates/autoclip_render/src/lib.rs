pub mod assembler;
pub mod error;
pub mod external;
pub mod ffmpeg;
pub mod pipeline;
pub mod preprocess;
pub mod probe;
pub mod renderer;
pub mod source;

#[cfg(test)]
mod testing;
