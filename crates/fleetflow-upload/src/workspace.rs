//! プロジェクトファイルと状態ファイルの読み込み

use anyhow::Context;
use fleetflow_cloud::{StateManager, creation_order};
use fleetflow_cloud_s3::{
    BucketUpload, BucketUploadContext, BucketUploadDefinition, BucketUploadState,
    EnvCredentialSource, S3Connector, UPLOAD_RESOURCE_TYPE, UploadProject, Uploader,
    parse_project_file,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub struct Workspace {
    pub file: PathBuf,
    pub project: UploadProject,
    pub state: StateManager,
    ctx: BucketUploadContext,
}

impl Workspace {
    pub fn load(file: &Path, endpoint: Option<&str>, show_progress: bool) -> anyhow::Result<Self> {
        if !file.exists() {
            anyhow::bail!("プロジェクトファイルが見つかりません: {}", file.display());
        }

        let project = parse_project_file(file)
            .with_context(|| format!("{} の読み込みに失敗しました", file.display()))?;
        tracing::debug!(
            "Loaded {} buckets and {} uploads from {}",
            project.buckets.len(),
            project.uploads.len(),
            file.display()
        );

        let root = file
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));

        let credentials = Arc::new(EnvCredentialSource::from_env());
        let mut connector = S3Connector::new(credentials.clone());
        if let Some(endpoint) = endpoint {
            connector = connector.with_endpoint(endpoint);
        }

        let ctx = BucketUploadContext::new(Arc::new(connector), credentials)
            .with_uploader(Uploader::default().with_progress(show_progress));

        Ok(Self {
            file: file.to_path_buf(),
            project,
            state: StateManager::new(root),
            ctx,
        })
    }

    /// 作成順に並べたアップロード定義
    pub fn ordered_uploads(
        &self,
        name: Option<&str>,
    ) -> anyhow::Result<Vec<&BucketUploadDefinition>> {
        let resources = self.project.resources();
        let order = creation_order(&resources)?;
        let bucket_count = self.project.buckets.len();

        let uploads: Vec<_> = order
            .into_iter()
            .filter(|&i| i >= bucket_count)
            .map(|i| &self.project.uploads[i - bucket_count])
            .filter(|u| name.is_none_or(|n| u.name == n))
            .collect();

        if let Some(name) = name
            && uploads.is_empty()
        {
            anyhow::bail!("アップロード '{}' が見つかりません", name);
        }
        Ok(uploads)
    }

    /// 削除対象のアップロード名（作成順の逆順）
    ///
    /// 名前を省略すると、状態ファイルにだけ残るものも末尾に加える。
    /// 名前を指定した場合は、宣言済みでなくても状態ファイルにあれば対象にする。
    pub async fn destroy_targets(&self, name: Option<&str>) -> anyhow::Result<Vec<String>> {
        let orphans = self.orphaned_uploads().await?;

        if let Some(name) = name
            && self.project.upload(name).is_none()
        {
            if orphans.iter().any(|o| o == name) {
                tracing::debug!("Upload {} is only known from the state file", name);
                return Ok(vec![name.to_string()]);
            }
            anyhow::bail!("アップロード '{}' が見つかりません", name);
        }

        let mut names: Vec<String> = self
            .ordered_uploads(name)?
            .into_iter()
            .rev()
            .map(|defn| defn.name.clone())
            .collect();
        if name.is_none() {
            names.extend(orphans);
        }
        Ok(names)
    }

    /// 状態ファイルから復元したアップロード
    pub async fn open(&self, name: &str) -> anyhow::Result<BucketUpload> {
        let key = format!("{}:{}", UPLOAD_RESOURCE_TYPE, name);
        let record = self.state.load_resource(&key).await?;
        Ok(BucketUpload::new(
            name,
            BucketUploadState::load(record.as_ref()),
            self.ctx.clone(),
        ))
    }

    /// 状態ファイルにだけ残っているアップロード名
    pub async fn orphaned_uploads(&self) -> anyhow::Result<Vec<String>> {
        let state = self.state.load().await?;
        let prefix = format!("{}:", UPLOAD_RESOURCE_TYPE);
        let mut names: Vec<String> = state
            .resources_of_type(UPLOAD_RESOURCE_TYPE)
            .into_iter()
            .filter_map(|(key, _)| key.strip_prefix(&prefix).map(str::to_string))
            .filter(|name| self.project.upload(name).is_none())
            .collect();
        names.sort();
        Ok(names)
    }
}
