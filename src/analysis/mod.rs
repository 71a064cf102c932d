pub mod cfg;
pub mod dominators;
pub mod loop_info;
