mod render;
mod simulation;
mod state;

pub use render::render;
pub use state::ForceGraphState;
