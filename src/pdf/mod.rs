pub mod assemble;
pub mod builder;
pub mod image;
pub mod objects;

#[cfg(test)]
pub(crate) mod fixtures;

pub use assemble::{concat_documents, load_document, save_document};
pub use builder::{DocumentBuilder, PageBuilder};
pub use objects::page_count;
