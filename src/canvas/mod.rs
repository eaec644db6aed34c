pub mod render_driver;
pub mod tile_painter;
