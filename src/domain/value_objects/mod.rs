//! 値オブジェクト

pub mod relative_path;
pub mod target;
