//! Probe backend that shells out to ffprobe.

mod codecs;
pub mod ffprobe;

pub use self::codecs::codec_string;
pub use self::ffprobe::FfprobeProber;
