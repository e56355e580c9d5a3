pub mod memory_painting_service;
pub mod picture_files;
pub mod tracing_view;

pub use memory_painting_service::InMemoryPaintingService;
pub use picture_files::{FilePictureProvider, ImportReport, import_pictures, open_picture_file};
pub use tracing_view::TracingView;
