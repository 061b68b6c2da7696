use super::manifest::{Host, Manifest, ManifestError, Project, Tool};
use crate::domain::value_objects::relative_path;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// ユニバースの整合性エラー
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UniverseError {
    #[error("Projects '{first}' and '{second}' both use path '{path}'")]
    DuplicatePath {
        path: String,
        first: String,
        second: String,
    },

    #[error("Project '{inner}' at '{inner_path}' is nested inside project '{outer}' at '{outer_path}'")]
    NestedPath {
        outer: String,
        outer_path: String,
        inner: String,
        inner_path: String,
    },

    #[error("Project '{project}' refers to unknown host '{host}'")]
    UnknownHost { project: String, host: String },

    #[error("Tool '{tool}' is provided by unknown project '{project}'")]
    UnknownToolProject { tool: String, project: String },
}

/// 全インポートを解決した後の統合マニフェスト
///
/// 各エンティティはキーでソートされて保持されるため、
/// 同じインポートグラフからは常に同一のシリアライズ結果が得られる。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Universe {
    /// プロジェクト（名前 → プロジェクト）
    #[serde(default)]
    pub projects: BTreeMap<String, Project>,

    /// ホスト（名前 → ホスト）
    #[serde(default)]
    pub hosts: BTreeMap<String, Host>,

    /// ツール（名前 → ツール）
    #[serde(default)]
    pub tools: BTreeMap<String, Tool>,
}

impl Universe {
    /// 空のUniverseを作成
    pub fn new() -> Self {
        Self::default()
    }

    /// プロジェクトを統合する（同名の既存プロジェクトは置き換えられる）
    pub fn merge_project(&mut self, project: Project) -> Option<Project> {
        self.projects.insert(project.name.clone(), project)
    }

    /// ホストを統合する（同名の既存ホストは置き換えられる）
    pub fn merge_host(&mut self, host: Host) -> Option<Host> {
        self.hosts.insert(host.name.clone(), host)
    }

    /// ツールを統合する（同名の既存ツールは置き換えられる）
    pub fn merge_tool(&mut self, tool: Tool) -> Option<Tool> {
        self.tools.insert(tool.name.clone(), tool)
    }

    /// パスでプロジェクトを検索
    pub fn project_at(&self, path: &str) -> Option<&Project> {
        self.projects.values().find(|p| p.path == path)
    }

    /// 指定プロジェクトが提供するツールを取得
    pub fn tools_of<'a>(&'a self, project: &'a str) -> impl Iterator<Item = &'a Tool> + 'a {
        self.tools.values().filter(move |t| t.project == project)
    }

    /// ホスト相対のリモートを絶対URLに解決する
    pub fn resolve_host_remotes(&mut self) -> Result<(), UniverseError> {
        for project in self.projects.values_mut() {
            let Some(host_name) = project.host.take() else {
                continue;
            };
            let host = self
                .hosts
                .get(&host_name)
                .ok_or_else(|| UniverseError::UnknownHost {
                    project: project.name.clone(),
                    host: host_name.clone(),
                })?;
            project.remote = format!(
                "{}/{}",
                host.location.trim_end_matches('/'),
                project.remote.trim_start_matches('/')
            );
        }
        Ok(())
    }

    /// パスの一意性・非重複とツールの提供元を検証する
    pub fn validate(&self) -> Result<(), UniverseError> {
        let mut by_path: Vec<(&str, &str)> = self
            .projects
            .values()
            .map(|p| (p.path.as_str(), p.name.as_str()))
            .collect();
        // 構成要素ごとに比較すると子孫は親の直後に並ぶ（a, a/c, a-b）。
        by_path.sort_by(|(left, left_name), (right, right_name)| {
            left.split('/')
                .cmp(right.split('/'))
                .then_with(|| left_name.cmp(right_name))
        });

        let mut ancestors: Vec<(&str, &str)> = Vec::new();
        for (path, name) in by_path {
            while let Some((outer_path, _)) = ancestors.last() {
                if relative_path::contains(outer_path, path) {
                    break;
                }
                ancestors.pop();
            }
            if let Some((outer_path, outer_name)) = ancestors.last() {
                if *outer_path == path {
                    return Err(UniverseError::DuplicatePath {
                        path: path.to_string(),
                        first: outer_name.to_string(),
                        second: name.to_string(),
                    });
                }
                return Err(UniverseError::NestedPath {
                    outer: outer_name.to_string(),
                    outer_path: outer_path.to_string(),
                    inner: name.to_string(),
                    inner_path: path.to_string(),
                });
            }
            ancestors.push((path, name));
        }

        for tool in self.tools.values() {
            if !self.projects.contains_key(&tool.project) {
                return Err(UniverseError::UnknownToolProject {
                    tool: tool.name.clone(),
                    project: tool.project.clone(),
                });
            }
        }

        Ok(())
    }

    /// インポートを持たない通常のマニフェスト文書に変換する
    pub fn to_manifest(&self) -> Manifest {
        Manifest {
            imports: Vec::new(),
            projects: self.projects.values().cloned().collect(),
            hosts: self.hosts.values().cloned().collect(),
            tools: self.tools.values().cloned().collect(),
        }
    }

    /// 統合マニフェストをYAMLにシリアライズする
    pub fn to_yaml(&self) -> Result<String, ManifestError> {
        self.to_manifest().to_yaml()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn project(name: &str, path: &str) -> Project {
        Project::new(name, path, format!("https://example.com/{}.git", name))
    }

    #[test]
    fn test_later_merge_wins() {
        let mut universe = Universe::new();
        universe.merge_project(Project::new("a", "a", "R1"));
        let replaced = universe.merge_project(Project::new("a", "a", "R2"));

        assert_eq!(replaced.map(|p| p.remote), Some("R1".to_string()));
        assert_eq!(universe.projects["a"].remote, "R2");
    }

    #[test]
    fn test_validate_detects_duplicate_paths() {
        let mut universe = Universe::new();
        universe.merge_project(project("a", "src"));
        universe.merge_project(project("b", "src"));

        assert_eq!(
            universe.validate(),
            Err(UniverseError::DuplicatePath {
                path: "src".to_string(),
                first: "a".to_string(),
                second: "b".to_string(),
            })
        );
    }

    #[test]
    fn test_validate_detects_nesting_across_siblings() {
        let mut universe = Universe::new();
        universe.merge_project(project("a", "a"));
        universe.merge_project(project("sibling", "a-b"));
        universe.merge_project(project("inner", "a/c"));

        assert!(matches!(
            universe.validate(),
            Err(UniverseError::NestedPath { ref outer, ref inner, .. }) if outer == "a" && inner == "inner"
        ));
    }

    #[test]
    fn test_validate_detects_nesting_below_a_dotted_sibling() {
        let mut universe = Universe::new();
        universe.merge_project(project("lib", "lib"));
        universe.merge_project(project("lib-extra", "lib.d/x"));
        universe.merge_project(project("deep", "lib/sub/deep"));

        assert!(matches!(
            universe.validate(),
            Err(UniverseError::NestedPath { ref outer, ref inner, .. }) if outer == "lib" && inner == "deep"
        ));
    }

    #[test]
    fn test_validate_accepts_disjoint_paths() {
        let mut universe = Universe::new();
        universe.merge_project(project("a", "a"));
        universe.merge_project(project("ab", "ab"));
        universe.merge_project(project("b", "b/c"));
        universe.merge_tool(Tool::new("fmt", "a"));
        assert_eq!(universe.validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_tool_without_project() {
        let mut universe = Universe::new();
        universe.merge_tool(Tool::new("fmt", "missing"));
        assert!(matches!(
            universe.validate(),
            Err(UniverseError::UnknownToolProject { .. })
        ));
    }

    #[test]
    fn test_resolve_host_remotes() {
        let mut universe = Universe::new();
        universe.merge_host(Host::new("review", "https://review.example.com/"));
        universe.merge_project(Project::new("a", "a", "/team/a").with_host("review"));
        universe.merge_project(Project::new("b", "b", "https://plain/b.git"));

        universe.resolve_host_remotes().unwrap();

        assert_eq!(universe.projects["a"].remote, "https://review.example.com/team/a");
        assert_eq!(universe.projects["a"].host, None);
        assert_eq!(universe.projects["b"].remote, "https://plain/b.git");
    }

    #[test]
    fn test_unknown_host_is_an_error() {
        let mut universe = Universe::new();
        universe.merge_project(Project::new("a", "a", "x").with_host("nope"));
        assert_eq!(
            universe.resolve_host_remotes(),
            Err(UniverseError::UnknownHost {
                project: "a".to_string(),
                host: "nope".to_string(),
            })
        );
    }

    #[test]
    fn test_yaml_is_sorted_by_key() {
        let mut universe = Universe::new();
        universe.merge_project(project("zeta", "z"));
        universe.merge_project(project("alpha", "a"));

        let yaml = universe.to_yaml().unwrap();
        let alpha = yaml.find("alpha").unwrap();
        let zeta = yaml.find("zeta").unwrap();
        assert!(alpha < zeta);
    }
}
