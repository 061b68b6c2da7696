use crate::domain::value_objects::target::Target;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// インストール済みプロファイル
///
/// インストールされているターゲットごとに1エントリを持つ。
/// ターゲットが空になったプロファイルはマニフェストから取り除かれる。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// プロファイル名（マネージャ名）
    pub name: String,

    /// プロファイルのインストールルート
    pub root: PathBuf,

    /// インストール済みターゲット
    #[serde(default)]
    pub targets: Vec<Target>,
}

impl Profile {
    /// 新しいProfileインスタンスを作成
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            targets: Vec::new(),
        }
    }

    /// 一致するターゲットを検索
    pub fn find_target(&self, target: &Target) -> Option<&Target> {
        self.targets.iter().find(|t| t.matches(target))
    }
}

/// プロファイルマニフェスト（インストール状態の唯一の記録）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileManifest {
    /// プロファイルのリスト（名前順）
    #[serde(default)]
    pub profiles: Vec<Profile>,
}

impl ProfileManifest {
    /// 空のProfileManifestを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 名前でプロファイルを取得
    pub fn profile(&self, name: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.name == name)
    }

    /// (プロファイル, ターゲット)の組のインストール状態を取得
    pub fn lookup(&self, name: &str, target: &Target) -> Option<&Target> {
        self.profile(name).and_then(|p| p.find_target(target))
    }

    /// ターゲットを記録する
    ///
    /// 同じアーキテクチャとOSのエントリがあれば置き換える。
    pub fn record(&mut self, name: &str, root: PathBuf, target: Target) {
        let index = match self.profiles.iter().position(|p| p.name == name) {
            Some(index) => index,
            None => {
                self.profiles.push(Profile::new(name, root));
                self.profiles.sort_by(|a, b| a.name.cmp(&b.name));
                self.profiles
                    .iter()
                    .position(|p| p.name == name)
                    .unwrap_or_default()
            }
        };

        let profile = &mut self.profiles[index];
        match profile.targets.iter_mut().find(|t| t.matches(&target)) {
            Some(existing) => *existing = target,
            None => {
                profile.targets.push(target);
                profile.targets.sort_by_key(|t| t.tag());
            }
        }
    }

    /// ターゲットのエントリを削除する
    ///
    /// 最後のターゲットだった場合はプロファイルごと削除する。
    pub fn remove(&mut self, name: &str, target: &Target) -> Option<Target> {
        let index = self.profiles.iter().position(|p| p.name == name)?;
        let profile = &mut self.profiles[index];
        let position = profile.targets.iter().position(|t| t.matches(target))?;
        let removed = profile.targets.remove(position);
        if profile.targets.is_empty() {
            self.profiles.remove(index);
        }
        Some(removed)
    }
}
