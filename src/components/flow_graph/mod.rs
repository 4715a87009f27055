mod render;
pub mod sankey;
mod state;

pub use render::render;
pub use state::FlowGraphState;
