use crate::workspace::Workspace;
use colored::Colorize;
use fleetflow_cloud_s3::CreateOutcome;

pub async fn handle(ws: &Workspace, name: Option<&str>, check: bool) -> anyhow::Result<()> {
    println!("{}", "アップロードを適用中...".yellow());
    println!("プロジェクト: {}", ws.file.display().to_string().cyan());

    let uploads = ws.ordered_uploads(name)?;
    let lock = ws.state.acquire_lock().await?;

    for defn in uploads {
        println!();
        println!(
            "{}",
            format!(
                "■ {} → s3://{}/{}",
                defn.name, defn.bucket_name, defn.prefix
            )
            .yellow()
            .bold()
        );

        let mut upload = ws.open(&defn.name).await?;
        match upload.create(defn, check).await {
            Ok(CreateOutcome::Unchanged) => {
                println!("  {} 変更なし", "✓".green());
            }
            Ok(CreateOutcome::Applied(stats)) => {
                if let Some(record) = upload.record() {
                    ws.state.commit(&upload.key(), record).await?;
                    tracing::debug!("Committed {} to the state file", upload.key());
                }
                println!("  {} {}", "✓".green(), stats);
            }
            Err(e) => {
                println!("  {} {}", "✗".red(), e);
                lock.release().await?;
                return Err(anyhow::anyhow!("'{}' のアップロードに失敗しました: {}", defn.name, e));
            }
        }
    }

    lock.release().await?;
    println!();
    println!("{}", "すべてのアップロードが完了しました".green().bold());
    Ok(())
}
