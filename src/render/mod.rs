pub mod canvas;
pub mod colormap;
pub mod overlay;
pub mod timeline;

pub use canvas::Canvas;
pub use colormap::{ColorMap, ColorScheme};
pub use overlay::{render_base, with_progress, RenderState, Scene, ViewSettings};
pub use timeline::TimeAxis;
