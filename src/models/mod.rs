pub mod common;
pub mod compilation;
pub mod compression;
pub mod document;

pub use common::*;
pub use compilation::*;
pub use compression::*;
pub use document::*;
