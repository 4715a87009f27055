pub mod canvas;
pub mod coordinator;
pub mod flow_graph;
pub mod force_graph;
pub mod frame_loop;
pub mod investigation;
pub mod viewport;
