use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;

/// Target関連のエラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("Invalid target '{0}': expected <arch>-<os>[@<version>]")]
    InvalidFormat(String),

    #[error("Invalid environment variable '{0}': expected KEY=VALUE")]
    InvalidEnvVar(String),
}

/// プロファイルをインストールするビルドターゲット
///
/// アーキテクチャ・OS・バージョン・ターゲット固有の環境変数の組。
/// 同一性の判定（[`Target::matches`]）はアーキテクチャとOSのみで行う。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// アーキテクチャ（例: amd64）
    pub arch: String,

    /// OS（例: linux）
    pub os: String,

    /// インストールされたバージョン
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// ターゲット固有の環境変数（KEY=VALUE）
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<String>,

    /// インストール先ディレクトリ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_dir: Option<PathBuf>,
}

fn target_regex() -> &'static Regex {
    static TARGET_RE: OnceLock<Regex> = OnceLock::new();
    TARGET_RE.get_or_init(|| {
        Regex::new(r"^([a-z0-9_]+)-([a-z0-9_]+)(?:@([A-Za-z0-9._-]+))?$")
            .expect("target pattern is valid")
    })
}

impl Target {
    /// 新しいTargetインスタンスを作成
    pub fn new(arch: impl Into<String>, os: impl Into<String>) -> Self {
        Self {
            arch: arch.into(),
            os: os.into(),
            version: None,
            env: Vec::new(),
            install_dir: None,
        }
    }

    /// 実行中のホストを表すTargetを作成
    ///
    /// `arch_override`が与えられた場合はホストのアーキテクチャより優先する。
    pub fn host(arch_override: Option<&str>) -> Self {
        let arch = arch_override
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| canonical_arch(std::env::consts::ARCH).to_string());
        Self::new(arch, std::env::consts::OS)
    }

    /// バージョンを設定
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    /// 環境変数を設定
    pub fn with_env(mut self, env: Vec<String>) -> Self {
        self.env = env;
        self
    }

    /// インストール先を設定
    pub fn with_install_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.install_dir = Some(dir.into());
        self
    }

    /// アーキテクチャとOSが一致するか
    pub fn matches(&self, other: &Target) -> bool {
        self.arch == other.arch && self.os == other.os
    }

    /// `<arch>-<os>`形式のタグ
    pub fn tag(&self) -> String {
        format!("{}-{}", self.arch, self.os)
    }

    /// インストールディレクトリ名として使う文字列
    pub fn dir_name(&self) -> String {
        match &self.version {
            Some(version) => format!("{}_{}", self.tag(), version),
            None => self.tag(),
        }
    }

    /// 環境変数を名前で検索する
    pub fn env_var(&self, name: &str) -> Option<&str> {
        self.env.iter().rev().find_map(|entry| {
            entry
                .split_once('=')
                .filter(|(key, _)| *key == name)
                .map(|(_, value)| value)
        })
    }

    /// 環境変数を追加または置換する
    pub fn set_env_var(&mut self, name: &str, value: &str) {
        self.env
            .retain(|entry| entry.split_once('=').map(|(k, _)| k) != Some(name));
        self.env.push(format!("{}={}", name, value));
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.version {
            Some(version) => write!(f, "{}@{}", self.tag(), version),
            None => write!(f, "{}", self.tag()),
        }
    }
}

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = target_regex()
            .captures(s.trim())
            .ok_or_else(|| TargetError::InvalidFormat(s.to_string()))?;

        let mut target = Target::new(&caps[1], &caps[2]);
        if let Some(version) = caps.get(3) {
            target.version = Some(version.as_str().to_string());
        }
        Ok(target)
    }
}

/// `KEY=VALUE[,KEY=VALUE]`形式の環境変数指定を解析する
pub fn parse_env_vars(specs: &[String]) -> Result<Vec<String>, TargetError> {
    let mut vars = Vec::new();
    for spec in specs {
        for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            match entry.split_once('=') {
                Some((key, _)) if !key.is_empty() => vars.push(entry.to_string()),
                _ => return Err(TargetError::InvalidEnvVar(entry.to_string())),
            }
        }
    }
    Ok(vars)
}

fn canonical_arch(arch: &str) -> &str {
    match arch {
        "x86_64" => "amd64",
        "aarch64" => "arm64",
        "x86" => "386",
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_target_with_version() {
        let target: Target = "amd64-linux@2".parse().unwrap();
        assert_eq!(target.arch, "amd64");
        assert_eq!(target.os, "linux");
        assert_eq!(target.version.as_deref(), Some("2"));
        assert_eq!(target.to_string(), "amd64-linux@2");
    }

    #[test]
    fn test_parse_target_rejects_garbage() {
        assert!("linux".parse::<Target>().is_err());
        assert!("amd64-linux@".parse::<Target>().is_err());
        assert!("AMD64-linux".parse::<Target>().is_err());
    }

    #[test]
    fn test_matches_ignores_version_and_env() {
        let a = Target::new("arm64", "darwin").with_version("1");
        let b = Target::new("arm64", "darwin").with_env(vec!["A=1".to_string()]);
        assert!(a.matches(&b));
        assert!(!a.matches(&Target::new("amd64", "darwin")));
    }

    #[test]
    fn test_host_target_honours_override() {
        let host = Target::host(Some("riscv64"));
        assert_eq!(host.arch, "riscv64");
        assert_eq!(host.os, std::env::consts::OS);
    }

    #[test]
    fn test_env_var_helpers() {
        let mut target = Target::new("amd64", "linux").with_env(vec!["CC=gcc".to_string()]);
        target.set_env_var("CC", "clang");
        target.set_env_var("AR", "ar");
        assert_eq!(target.env_var("CC"), Some("clang"));
        assert_eq!(target.env_var("AR"), Some("ar"));
        assert_eq!(target.env_var("LD"), None);
    }

    #[test]
    fn test_parse_env_vars() {
        let vars = parse_env_vars(&["A=1,B=2".to_string(), "C=x=y".to_string()]).unwrap();
        assert_eq!(vars, vec!["A=1", "B=2", "C=x=y"]);
        assert!(parse_env_vars(&["=1".to_string()]).is_err());
        assert!(parse_env_vars(&["NOVALUE".to_string()]).is_err());
    }
}
