use super::universe::Universe;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 履歴エントリIDのフォーマット（ファイル名にも使う）
pub const HISTORY_ID_FORMAT: &str = "%Y-%m-%dT%H-%M-%S%.9fZ";

/// 同期成功時に記録される不変のスナップショット
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// エントリID（タイムスタンプから生成）
    pub id: String,

    /// 記録時刻
    pub timestamp: DateTime<Utc>,

    /// 同期された統合マニフェスト
    pub universe: Universe,
}

impl HistoryEntry {
    /// 新しいHistoryEntryインスタンスを作成
    pub fn new(timestamp: DateTime<Utc>, universe: Universe) -> Self {
        Self {
            id: timestamp.format(HISTORY_ID_FORMAT).to_string(),
            timestamp,
            universe,
        }
    }
}

/// latest / second-latest ポインタ
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryIndex {
    /// 最新のエントリID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,

    /// 1つ前のエントリID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub second_latest: Option<String>,
}

impl HistoryIndex {
    /// 新しいエントリでポインタを回転させる
    pub fn rotate(&self, id: impl Into<String>) -> Self {
        Self {
            latest: Some(id.into()),
            second_latest: self.latest.clone(),
        }
    }
}
