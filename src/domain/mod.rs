//! ドメイン層
//!
//! マニフェスト文書、統合されたユニバース、ワークスペースのレイアウト、
//! プロファイルの状態など、I/Oを持たないモデルを定義する。

pub mod entities;
pub mod value_objects;
