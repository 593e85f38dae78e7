pub mod buffer;
pub mod decode;
pub mod wav;

pub use buffer::SampleBuffer;
