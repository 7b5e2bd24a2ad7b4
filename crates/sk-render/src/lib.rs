pub mod color;
pub mod hit;
pub mod paint;
pub mod registry;
pub mod surface;

pub use color::Rgba;
pub use hit::Inspector;
pub use paint::{Canvas, Ink, PaintError};
pub use registry::{CommandSpec, Registry};
pub use surface::Surface;
