pub mod control;
pub mod sessions;
