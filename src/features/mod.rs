pub mod card;
pub mod emoji;
pub mod font;
pub mod render;
pub mod source_image;
