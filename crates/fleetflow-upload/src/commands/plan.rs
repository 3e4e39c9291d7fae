use crate::workspace::Workspace;
use colored::Colorize;
use fleetflow_cloud::{ActionType, Plan};

pub async fn handle(ws: &Workspace, name: Option<&str>) -> anyhow::Result<()> {
    println!("{}", "変更内容を計算中...".blue());
    println!("プロジェクト: {}", ws.file.display().to_string().cyan());

    let mut plan = Plan::empty();
    for defn in ws.ordered_uploads(name)? {
        let upload = ws.open(&defn.name).await?;
        plan.push(upload.plan(defn));
    }

    println!();
    for action in &plan.actions {
        let marker = match action.action_type {
            ActionType::Create => "+".green(),
            ActionType::Update => "~".yellow(),
            ActionType::Delete => "-".red(),
            ActionType::NoOp => "=".dimmed(),
        };
        println!(
            "  {} {} ({})",
            marker,
            action.resource_id.cyan(),
            action.description
        );
    }

    println!();
    if plan.has_changes {
        println!("{}", plan.summary().to_string().bold());
    } else {
        println!("{}", "変更はありません".green());
    }
    Ok(())
}
