use crate::domain::entities::profile::ProfileManifest;
use crate::domain::entities::workspace::{Workspace, WorkspaceError};
use crate::domain::value_objects::target::Target;
use crate::infrastructure::filesystem::{LockError, ProfileStore, ProfileStoreError, WorkspaceLock};
use crate::infrastructure::profiles::{FlagSet, ProfileContext, ProfileError, ProfileManager, ProfileRegistry};
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// 1つの(プロファイル, ターゲット)組の失敗
#[derive(Debug)]
pub struct ProfileFailure {
    /// プロファイル名
    pub profile: String,
    /// ターゲット
    pub target: String,
    /// 原因
    pub error: ProfileError,
}

/// プロファイル管理のエラー
#[derive(Debug, Error)]
pub enum ManageProfilesError {
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),

    #[error(transparent)]
    Lock(#[from] LockError),

    #[error(transparent)]
    Store(#[from] ProfileStoreError),

    #[error(transparent)]
    Profile(#[from] ProfileError),

    #[error("{} profile operation(s) failed:{}", .failures.len(), format_failures(.failures))]
    Batch { failures: Vec<ProfileFailure> },
}

impl ManageProfilesError {
    /// 状態遷移の前提条件違反のみで失敗したか
    pub fn is_state_error(&self) -> bool {
        match self {
            Self::Profile(e) => e.is_state_error(),
            Self::Batch { failures } => failures.iter().all(|f| f.error.is_state_error()),
            _ => false,
        }
    }
}

fn format_failures(failures: &[ProfileFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("\n  {} {}: {}", f.profile, f.target, f.error))
        .collect()
}

/// プロファイル操作の対象
#[derive(Debug, Clone, Default)]
pub struct ProfileRequest {
    /// プロファイル名
    pub names: Vec<String>,
    /// ターゲット（空ならホスト）
    pub targets: Vec<Target>,
    /// インストール時にターゲットに付与する環境変数
    pub env: Vec<String>,
    /// `name=value`のフラグ
    pub flags: Vec<(String, String)>,
}

/// バッチで変更された(プロファイル, ターゲット)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfileBatchReport {
    /// 状態が変わった組
    pub changed: Vec<(String, Target)>,
    /// 既に最新だった組
    pub up_to_date: Vec<(String, Target)>,
}

/// インストール済みターゲットの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetState {
    /// 既定バージョンがインストールされている
    UpToDate,
    /// 既定と異なるバージョン
    OutOfDate,
}

/// `profile list`の1行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileListing {
    /// プロファイル名
    pub name: String,
    /// 説明
    pub info: String,
    /// インストール済みターゲットと状態
    pub targets: Vec<(Target, TargetState)>,
}

/// 選択されたマネージャとそのコンテキスト
struct Selected {
    manager: Arc<dyn ProfileManager>,
    ctx: ProfileContext,
}

/// プロファイルのインストール・更新・削除を行うユースケース
///
/// バッチ内の個々の失敗は記録して続行し、最後に必ずプロファイルマニフェストを保存する。
pub struct ManageProfilesUseCase {
    workspace: Workspace,
    registry: ProfileRegistry,
    store: ProfileStore,
}

impl ManageProfilesUseCase {
    /// 新しいManageProfilesUseCaseインスタンスを作成
    pub fn new(workspace: Workspace, registry: ProfileRegistry) -> Self {
        let store = ProfileStore::new(workspace.profile_manifest_path());
        Self {
            workspace,
            registry,
            store,
        }
    }

    /// プロファイルをインストールする
    pub async fn install(
        &self,
        request: &ProfileRequest,
    ) -> Result<ProfileBatchReport, ManageProfilesError> {
        let selected = self.select(request)?;
        self.run_batch(request, &selected, false, |db, name, selected, target| {
            Box::pin(async move {
                if db.lookup(name, &target).is_some() {
                    return Err(ProfileError::AlreadyInstalled {
                        profile: name.to_string(),
                        target: target.tag(),
                    });
                }
                let versions = selected.manager.versions();
                let version = target.version.clone().unwrap_or(versions.default.clone());
                check_version(name, &versions, &version)?;

                let desired = target.with_version(version);
                let installed = selected.manager.install(&selected.ctx, &desired).await?;
                db.record(name, selected.ctx.profiles_root.join(name), installed.clone());
                Ok(Some(installed))
            })
        })
        .await
    }

    /// プロファイルを既定（または指定）バージョンへ更新する
    ///
    /// マネージャが差分更新できない場合、または`force`の場合は
    /// アンインストールしてからインストールし直す。
    /// 要求の環境変数は更新後のエントリに上書きで反映する。
    pub async fn update(
        &self,
        request: &ProfileRequest,
        force: bool,
    ) -> Result<ProfileBatchReport, ManageProfilesError> {
        let selected = self.select(request)?;
        self.run_batch(request, &selected, false, |db, name, selected, target| {
            Box::pin(async move {
                let installed = db.lookup(name, &target).cloned().ok_or_else(|| {
                    ProfileError::NotInstalled {
                        profile: name.to_string(),
                        target: target.tag(),
                    }
                })?;
                let versions = selected.manager.versions();
                let version = target.version.clone().unwrap_or(versions.default.clone());
                check_version(name, &versions, &version)?;

                if !force && installed.version.as_deref() == Some(version.as_str()) {
                    return Ok(None);
                }

                let updated = if force {
                    None
                } else {
                    match selected.manager.update(&selected.ctx, &installed, &version).await {
                        Ok(updated) => Some(updated),
                        Err(ProfileError::NoIncrementalUpdate { .. }) => {
                            info!("{} has no incremental update for {}, reinstalling", name, installed.tag());
                            None
                        }
                        Err(e) => return Err(e),
                    }
                };

                let mut updated = match updated {
                    Some(updated) => updated,
                    None => reinstall(db, name, selected, &installed, &version)
                        .await
                        .map_err(|source| ProfileError::FallbackFailed {
                            profile: name.to_string(),
                            target: installed.tag(),
                            source: Box::new(source),
                        })?,
                };
                for entry in &target.env {
                    if let Some((key, value)) = entry.split_once('=') {
                        updated.set_env_var(key, value);
                    }
                }
                db.record(name, selected.ctx.profiles_root.join(name), updated.clone());
                Ok(Some(updated))
            })
        })
        .await
    }

    /// プロファイルをアンインストールする
    pub async fn uninstall(
        &self,
        request: &ProfileRequest,
        all_targets: bool,
    ) -> Result<ProfileBatchReport, ManageProfilesError> {
        let selected = self.select(request)?;
        self.run_batch(request, &selected, all_targets, |db, name, selected, target| {
            Box::pin(async move {
                let installed = db.lookup(name, &target).cloned().ok_or_else(|| {
                    ProfileError::NotInstalled {
                        profile: name.to_string(),
                        target: target.tag(),
                    }
                })?;
                selected.manager.uninstall(&selected.ctx, &installed).await?;
                db.remove(name, &installed);
                Ok(Some(installed))
            })
        })
        .await
    }

    /// インストール済みプロファイルの一覧
    pub fn list(&self) -> Result<Vec<ProfileListing>, ManageProfilesError> {
        let db = self.store.load()?;
        let mut listings = Vec::new();
        for profile in &db.profiles {
            let (info, default) = match self.registry.get(&profile.name) {
                Ok(manager) => (manager.info(), Some(manager.versions().default)),
                Err(_) => {
                    warn!("Profile {} is installed but not supported", profile.name);
                    (String::new(), None)
                }
            };
            let targets = profile
                .targets
                .iter()
                .map(|target| {
                    let state = if target.version.is_some() && target.version == default {
                        TargetState::UpToDate
                    } else {
                        TargetState::OutOfDate
                    };
                    (target.clone(), state)
                })
                .collect();
            listings.push(ProfileListing {
                name: profile.name.clone(),
                info,
                targets,
            });
        }
        Ok(listings)
    }

    /// 永続化されたプロファイルマニフェストのYAML
    pub fn manifest_yaml(&self) -> Result<String, ManageProfilesError> {
        Ok(self.store.load_raw()?)
    }

    /// 現在のプロファイルマニフェスト
    pub fn manifest(&self) -> Result<ProfileManifest, ManageProfilesError> {
        Ok(self.store.load()?)
    }

    /// インストール済みターゲットの環境変数
    ///
    /// `vars`が空なら全変数、そうでなければ指定された変数を`NAME=value`で返す。
    pub fn env(
        &self,
        profile: &str,
        target: &Target,
        vars: &[String],
    ) -> Result<Vec<String>, ManageProfilesError> {
        self.registry.get(profile)?;
        let db = self.store.load()?;
        let installed = db
            .lookup(profile, target)
            .ok_or_else(|| ProfileError::NotInstalled {
                profile: profile.to_string(),
                target: target.tag(),
            })?;

        if vars.is_empty() {
            return Ok(installed.env.clone());
        }
        Ok(vars
            .iter()
            .map(|var| format!("{}={}", var, installed.env_var(var).unwrap_or_default()))
            .collect())
    }

    /// 名前からマネージャを引き、フラグを割り当てる
    fn select(&self, request: &ProfileRequest) -> Result<Vec<(String, Selected)>, ManageProfilesError> {
        let mut selected = Vec::new();
        for name in &request.names {
            let manager = self.registry.get(name)?;
            let mut flags = FlagSet::new();
            manager.add_flags(&mut flags);
            selected.push((
                name.clone(),
                Selected {
                    manager,
                    ctx: ProfileContext::new(self.workspace.profiles_dir(), flags),
                },
            ));
        }

        for (flag, value) in &request.flags {
            let mut declared = false;
            for (_, s) in selected.iter_mut() {
                declared |= s.ctx.flags.set(flag, value);
            }
            if !declared {
                return Err(ProfileError::UnknownFlag(flag.clone()).into());
            }
        }
        Ok(selected)
    }

    fn targets(&self, request: &ProfileRequest) -> Vec<Target> {
        let targets = if request.targets.is_empty() {
            vec![self.workspace.host_target()]
        } else {
            request.targets.clone()
        };
        targets
            .into_iter()
            .map(|t| if request.env.is_empty() { t } else { t.with_env(request.env.clone()) })
            .collect()
    }

    /// 各(プロファイル, ターゲット)に操作を適用し、最後にマニフェストを保存する
    async fn run_batch<F>(
        &self,
        request: &ProfileRequest,
        selected: &[(String, Selected)],
        all_targets: bool,
        operation: F,
    ) -> Result<ProfileBatchReport, ManageProfilesError>
    where
        F: for<'a> Fn(
            &'a mut ProfileManifest,
            &'a str,
            &'a Selected,
            Target,
        ) -> BatchFuture<'a>,
    {
        self.workspace.ensure_layout()?;
        let mut lock = WorkspaceLock::open(self.workspace.profiles_lock_path())?;
        let _guard = lock.acquire()?;

        let mut db = self.store.load()?;
        let mut report = ProfileBatchReport::default();
        let mut failures = Vec::new();
        let requested = self.targets(request);

        for (name, selected) in selected {
            let targets = if all_targets {
                match db.profile(name).filter(|profile| !profile.targets.is_empty()) {
                    Some(profile) => profile.targets.clone(),
                    None => {
                        failures.push(ProfileFailure {
                            profile: name.clone(),
                            target: "any target".to_string(),
                            error: ProfileError::NotInstalled {
                                profile: name.clone(),
                                target: "any target".to_string(),
                            },
                        });
                        continue;
                    }
                }
            } else {
                requested.clone()
            };
            for target in &targets {
                match operation(&mut db, name, selected, target.clone()).await {
                    Ok(Some(changed)) => report.changed.push((name.clone(), changed)),
                    Ok(None) => report.up_to_date.push((name.clone(), target.clone())),
                    Err(error) => {
                        warn!("{} {}: {}", name, target.tag(), error);
                        failures.push(ProfileFailure {
                            profile: name.clone(),
                            target: target.tag(),
                            error,
                        });
                    }
                }
            }
        }

        self.store.save(&db)?;

        if failures.is_empty() {
            Ok(report)
        } else {
            Err(ManageProfilesError::Batch { failures })
        }
    }
}

type BatchFuture<'a> = std::pin::Pin<
    Box<dyn std::future::Future<Output = Result<Option<Target>, ProfileError>> + Send + 'a>,
>;

fn check_version(
    name: &str,
    versions: &crate::infrastructure::profiles::VersionInfo,
    version: &str,
) -> Result<(), ProfileError> {
    if versions.is_supported(version) {
        return Ok(());
    }
    Err(ProfileError::UnsupportedVersion {
        profile: name.to_string(),
        version: version.to_string(),
        supported: versions.supported.join(", "),
    })
}

/// アンインストールしてからインストールし直す
///
/// 利用者が`uninstall`と`install`を続けて実行した場合と同じエントリを残す。
async fn reinstall(
    db: &mut ProfileManifest,
    name: &str,
    selected: &Selected,
    installed: &Target,
    version: &str,
) -> Result<Target, ProfileError> {
    selected.manager.uninstall(&selected.ctx, installed).await?;
    db.remove(name, installed);

    let fresh = Target::new(installed.arch.clone(), installed.os.clone())
        .with_version(version)
        .with_env(installed.env.clone());
    selected.manager.install(&selected.ctx, &fresh).await
}
