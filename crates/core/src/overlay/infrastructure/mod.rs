pub mod cpu_overlay_renderer;
pub mod drawing;
