pub mod config;
pub mod error;
pub mod formats;
pub mod genome;
pub mod source;
pub mod storage;
pub mod types;

pub use config::Config;
pub use error::{Error, Result};
pub use formats::{TabixIndexedFile, VariantRecord};
pub use genome::ReferenceGenome;
pub use source::VariantSource;
pub use types::Region;
