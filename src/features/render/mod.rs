//! 卡片渲染管线

pub mod asset;
pub mod markup;
mod orchestrator;
mod raster;
mod svg;

pub use asset::{AssetKind, AssetLoader, AssetResolution, TextOnly};
pub use markup::{CardMarkup, Frame, ImageBlock, Insets, TextAlign, TextBlock};
pub use orchestrator::{RenderOptions, RenderOrchestrator};
pub use raster::{EncodeRequest, OutputFormat, PngEncoder};
pub use svg::{SvgCardRenderer, VectorImage, VectorOptions};
