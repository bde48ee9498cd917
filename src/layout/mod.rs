// Layout module
// Visual geometry for blocks, recomputed incrementally

pub mod engine;
pub mod view;

pub use engine::{LayoutEngine, LayoutError};
pub use view::{Rect, Stacking, ViewTransform};
