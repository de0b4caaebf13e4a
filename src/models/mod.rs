pub mod file_node;
pub mod plan;
