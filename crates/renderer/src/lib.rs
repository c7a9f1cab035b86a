//! Image rendering for climate normals.
//!
//! - Colour ramps per measurement and period ([`ramp`])
//! - Rendering a Web Mercator tile from a grid ([`tile`])
//! - PNG encoding, indexed where the palette allows ([`png`])
//! - Whole tile pyramids rendered in parallel ([`pyramid`])

pub mod png;
pub mod pyramid;
pub mod ramp;
pub mod tile;

pub use pyramid::{render_pyramid, PyramidOptions, PyramidReport};
pub use ramp::{colour_for_value, Color, ColorRamp, ColorStop, LegendEntry};
pub use tile::{render_tile, RasterImage};
