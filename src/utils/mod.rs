pub mod error;
pub mod image;
pub mod info;
pub mod options;
pub mod source;
pub mod traits;
pub mod writer;
