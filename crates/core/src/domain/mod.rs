pub mod address;
pub mod build_info;
pub mod phase;
