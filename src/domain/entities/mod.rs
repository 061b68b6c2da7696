//! ドメインエンティティ

pub mod history;
pub mod manifest;
pub mod profile;
pub mod project_state;
pub mod universe;
pub mod workspace;
