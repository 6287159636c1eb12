pub mod image;
pub mod object_store;
pub mod validation;

pub use image::{ImageService, MAX_IMAGE_BYTES};
pub use object_store::{AzureBlobStore, ObjectStore, StorageError, StoredObject};
pub use validation::ValidationService;
