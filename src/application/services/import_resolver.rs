use super::manifest_source::{ManifestSource, SourceError};
use crate::domain::entities::manifest::{Import, Manifest, ManifestError, Project};
use crate::domain::entities::universe::{Universe, UniverseError};
use crate::domain::value_objects::relative_path::{self, RelativePathError};
use futures::future::join_all;
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, info};

/// インポート解決関連のエラー
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("import cycle detected: {}", .chain.join(" -> "))]
    Cycle { chain: Vec<String> },

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error("Invalid consolidated manifest: {0}")]
    Universe(#[from] UniverseError),

    #[error("Invalid import '{import}' in {manifest}: {source}")]
    InvalidImport {
        import: String,
        manifest: PathBuf,
        #[source]
        source: RelativePathError,
    },

    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Manifest provider task failed: {0}")]
    Task(String),
}

impl ResolveError {
    /// Exit status of a failing VCS subprocess, if any
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Source(source) => source.exit_code(),
            _ => None,
        }
    }
}

/// 解決のオプション
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// 既存の提供プロジェクトもfetchする
    pub refresh: bool,

    /// 提供プロジェクトを並列に取得する最大数
    pub jobs: usize,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            refresh: false,
            jobs: num_cpus::get(),
        }
    }
}

impl ResolveOptions {
    /// refreshを設定
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// 並列度を設定
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }
}

/// 処理中のマニフェストの位置とマウントルート
#[derive(Debug, Clone)]
struct Scope {
    /// マニフェストファイルのパス
    path: PathBuf,
    /// 宣言されたパスに付与するルート
    root: String,
}

impl Scope {
    fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }
}

/// インポートチェーン上の1ノード
#[derive(Debug, Clone)]
struct ChainLink {
    identity: String,
    label: String,
}

/// ルートマニフェストからインポートグラフを辿って統合マニフェストを作る
///
/// 各マニフェストについて、未取得のリモート提供プロジェクトを並列に取得してから、
/// インポートを宣言順に逐次マージする。チェーン上に同じインポートが再登場した場合は
/// 循環として失敗する。
pub struct ImportResolver {
    source: Arc<dyn ManifestSource>,
    options: ResolveOptions,
}

impl ImportResolver {
    /// 新しいImportResolverインスタンスを作成
    pub fn new(source: Arc<dyn ManifestSource>) -> Self {
        Self {
            source,
            options: ResolveOptions::default(),
        }
    }

    /// オプションを設定
    pub fn with_options(mut self, options: ResolveOptions) -> Self {
        self.options = options;
        self
    }

    /// ルートマニフェストを解決する
    pub async fn resolve(&self, root_manifest: &Path) -> Result<Universe, ResolveError> {
        let root_manifest = lexical_normalize(root_manifest);
        let content = self.source.read(&root_manifest).await?;
        let manifest = Manifest::parse(&content, &root_manifest)?;

        let mut universe = Universe::new();
        let mut chain = vec![ChainLink {
            identity: file_identity(&root_manifest),
            label: root_manifest.display().to_string(),
        }];
        let scope = Scope {
            path: root_manifest,
            root: String::new(),
        };

        self.load(manifest, scope, &mut chain, &mut universe).await?;

        universe.resolve_host_remotes()?;
        universe.validate()?;

        info!("Resolved {} projects", universe.projects.len());
        Ok(universe)
    }

    fn load<'a>(
        &'a self,
        manifest: Manifest,
        scope: Scope,
        chain: &'a mut Vec<ChainLink>,
        universe: &'a mut Universe,
    ) -> Pin<Box<dyn Future<Output = Result<(), ResolveError>> + Send + 'a>> {
        Box::pin(async move {
            let providers = self.prefetch_providers(&manifest, &scope).await?;

            for import in &manifest.imports {
                match import {
                    Import::Remote(remote) => {
                        let provider = remote.provider_project(&scope.root).map_err(|source| {
                            ResolveError::InvalidImport {
                                import: remote.name.clone(),
                                manifest: scope.path.clone(),
                                source,
                            }
                        })?;
                        let import_root =
                            relative_path::join(&scope.root, &remote.root).map_err(|source| {
                                ResolveError::InvalidImport {
                                    import: remote.name.clone(),
                                    manifest: scope.path.clone(),
                                    source,
                                }
                            })?;

                        let link = ChainLink {
                            identity: format!("{}#{}", remote.remote, remote.manifest),
                            label: format!("{}:{}", remote.name, remote.manifest),
                        };
                        check_cycle(chain, &link)?;

                        let dir = match providers.get(&provider.path) {
                            Some(dir) => dir.clone(),
                            None => self
                                .source
                                .ensure_provider(&provider, self.options.refresh)
                                .await?,
                        };
                        let path = lexical_normalize(
                            &remote.manifest.split('/').fold(dir, |acc, part| acc.join(part)),
                        );
                        debug!("Importing {} from {}", link.label, path.display());

                        let imported = self.read_manifest(&path).await?;
                        universe.merge_project(provider);

                        chain.push(link);
                        let child = Scope {
                            path,
                            root: import_root,
                        };
                        self.load(imported, child, chain, universe).await?;
                        chain.pop();
                    }
                    Import::File(file) => {
                        let path = lexical_normalize(&scope.dir().join(&file.file));
                        let link = ChainLink {
                            identity: file_identity(&path),
                            label: path.display().to_string(),
                        };
                        check_cycle(chain, &link)?;
                        debug!("Importing file {}", path.display());

                        let imported = self.read_manifest(&path).await?;

                        chain.push(link);
                        let child = Scope {
                            path,
                            root: scope.root.clone(),
                        };
                        self.load(imported, child, chain, universe).await?;
                        chain.pop();
                    }
                }
            }

            for project in manifest.projects {
                let path = relative_path::join(&scope.root, &project.path).map_err(|source| {
                    ResolveError::InvalidImport {
                        import: project.name.clone(),
                        manifest: scope.path.clone(),
                        source,
                    }
                })?;
                universe.merge_project(Project { path, ..project });
            }
            for host in manifest.hosts {
                universe.merge_host(host);
            }
            for tool in manifest.tools {
                universe.merge_tool(tool);
            }

            Ok(())
        })
    }

    async fn read_manifest(&self, path: &Path) -> Result<Manifest, ResolveError> {
        let content = self.source.read(path).await?;
        Ok(Manifest::parse(&content, path)?)
    }

    /// このマニフェストのリモートインポートの提供プロジェクトを並列に用意する
    async fn prefetch_providers(
        &self,
        manifest: &Manifest,
        scope: &Scope,
    ) -> Result<BTreeMap<String, PathBuf>, ResolveError> {
        let mut pending: BTreeMap<String, Project> = BTreeMap::new();
        for import in &manifest.imports {
            if let Import::Remote(remote) = import {
                let provider = remote.provider_project(&scope.root).map_err(|source| {
                    ResolveError::InvalidImport {
                        import: remote.name.clone(),
                        manifest: scope.path.clone(),
                        source,
                    }
                })?;
                pending.entry(provider.path.clone()).or_insert(provider);
            }
        }

        if pending.is_empty() {
            return Ok(BTreeMap::new());
        }

        let semaphore = Arc::new(Semaphore::new(self.options.jobs.min(pending.len()).max(1)));
        let tasks: Vec<_> = pending
            .into_values()
            .map(|provider| {
                let source = self.source.clone();
                let semaphore = semaphore.clone();
                let refresh = self.options.refresh;

                tokio::spawn(async move {
                    let _permit = semaphore
                        .acquire()
                        .await
                        .map_err(|e| ResolveError::Task(e.to_string()))?;
                    let dir = source.ensure_provider(&provider, refresh).await?;
                    Ok::<_, ResolveError>((provider.path, dir))
                })
            })
            .collect();

        let mut providers = BTreeMap::new();
        for result in join_all(tasks).await {
            let (path, dir) = result.map_err(|e| ResolveError::Task(e.to_string()))??;
            providers.insert(path, dir);
        }
        Ok(providers)
    }
}

fn check_cycle(chain: &[ChainLink], link: &ChainLink) -> Result<(), ResolveError> {
    if let Some(start) = chain.iter().position(|c| c.identity == link.identity) {
        let mut cycle: Vec<String> = chain[start..].iter().map(|c| c.label.clone()).collect();
        cycle.push(link.label.clone());
        return Err(ResolveError::Cycle { chain: cycle });
    }
    Ok(())
}

fn file_identity(path: &Path) -> String {
    format!("file:{}", path.display())
}

/// `.`と`..`を字句的に畳み込む（ファイルシステムには触れない）
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !normalized.pop() {
                    normalized.push(component);
                }
            }
            other => normalized.push(other),
        }
    }
    normalized
}
