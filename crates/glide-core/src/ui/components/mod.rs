pub mod button;
pub mod canvas;
pub mod text_block;

pub use button::Button;
pub use canvas::{Canvas, DrawCommand};
pub use text_block::TextBlock;
