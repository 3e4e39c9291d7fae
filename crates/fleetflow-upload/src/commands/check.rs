use crate::workspace::Workspace;
use colored::Colorize;

pub async fn handle(ws: &Workspace, name: Option<&str>) -> anyhow::Result<()> {
    println!("{}", "バケットを確認中...".blue());

    for defn in ws.ordered_uploads(name)? {
        let upload = ws.open(&defn.name).await?;
        println!();
        println!("{} [{}]", defn.name.cyan().bold(), upload.state().status);

        let Some(report) = upload.check().await? else {
            println!("  まだアップロードされていません");
            continue;
        };

        if !report.bucket_exists {
            println!("  {} バケットが存在しません", "✗".red());
            continue;
        }

        println!("  オブジェクト数: {}", report.objects_under_prefix);
        let location = report.location.unwrap_or_default();
        if report.location_matches {
            println!("  {} ロケーション: {}", "✓".green(), location);
        } else {
            println!(
                "  {} ロケーション: {} （リージョン {} と一致しません）",
                "⚠".yellow(),
                location,
                defn.region
            );
        }
    }
    Ok(())
}
