use crate::workspace::Workspace;
use colored::Colorize;

pub async fn handle(ws: &Workspace, name: Option<&str>, yes: bool) -> anyhow::Result<()> {
    println!("{}", "アップロードを削除中...".yellow());

    let names = ws.destroy_targets(name).await?;

    let mut targets = Vec::new();
    for name in names {
        let upload = ws.open(&name).await?;
        let action = upload.plan_destroy();
        println!("  • {} ({})", name.cyan(), action.description);
        targets.push(upload);
    }

    if !yes {
        println!();
        println!("{}", "実行するには --yes を指定してください".yellow());
        return Ok(());
    }

    let lock = ws.state.acquire_lock().await?;
    for mut upload in targets {
        tracing::debug!("Destroying {}", upload.key());
        match upload.destroy().await {
            Ok(_) => {
                ws.state.forget(&upload.key()).await?;
                tracing::debug!("Forgot {} in the state file", upload.key());
                println!("  {} {} を削除しました", "✓".green(), upload.name());
            }
            Err(e) => {
                println!("  {} {}", "✗".red(), e);
                lock.release().await?;
                return Err(anyhow::anyhow!("'{}' の削除に失敗しました: {}", upload.name(), e));
            }
        }
    }
    lock.release().await?;
    Ok(())
}
