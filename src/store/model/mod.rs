mod document_key;
mod resource_path;

pub use document_key::DocumentKey;
pub use resource_path::ResourcePath;
