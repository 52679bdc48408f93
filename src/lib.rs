//! Pull-based APNG/PNG loader.
//!
//! Frames are decoded one at a time, in stream order, and handed out as
//! full-canvas RGBA8 snapshots with every dispose and blend operation already
//! applied. A plain PNG behaves like a one-frame animation.
//!
//! ```no_run
//! use apngload::ApngLoader;
//!
//! let mut loader = ApngLoader::open_from_file("spinner.png")?;
//! while loader.has_frame() {
//!     let frame = loader.next_frame()?;
//!     println!("frame {}: {:?}", frame.index, frame.delay());
//! }
//! # Ok::<(), apngload::ApngError>(())
//! ```

mod decoder;
mod utils;

pub use decoder::header::ColorType;
pub use decoder::loader::{ApngLoader, Frame};
pub use utils::error::{ApngError, ApngResult, ErrorKind};
pub use utils::image::FrameImage;
pub use utils::info::ImageInfo;
pub use utils::options::{LoaderOptions, ZeroDenominator};
pub use utils::source::{ByteSource, FileSource, MemorySource, StreamSource};
pub use utils::writer::FrameWriter;

/// Decodes every frame of an in-memory stream.
///
/// Fails with the first error encountered; frames decoded before it are dropped.
pub fn decode_all(bytes: &[u8]) -> ApngResult<Vec<Frame>> {
    ApngLoader::open_from_memory(bytes)?.collect()
}
