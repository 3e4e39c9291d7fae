mod commands;
mod workspace;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "fleet-upload")]
#[command(about = "ローカルのディレクトリを、宣言どおりにS3へ。", long_about = None)]
struct Cli {
    /// プロジェクトファイル
    #[arg(
        short = 'f',
        long = "file",
        env = "FLEET_UPLOAD_FILE",
        default_value = "fleet.kdl",
        global = true
    )]
    file: PathBuf,

    /// S3互換ストレージのエンドポイント（MinIO, R2 など）
    #[arg(long, env = "FLEET_UPLOAD_ENDPOINT", global = true)]
    endpoint: Option<String>,

    /// 詳細ログを出力
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 適用される変更を表示
    Plan {
        /// 対象のアップロード名（省略時はすべて）
        name: Option<String>,
    },
    /// アップロードを適用
    Up {
        /// 対象のアップロード名（省略時はすべて）
        name: Option<String>,
        /// 変更がなくてもバケットを再確認する
        #[arg(long)]
        check: bool,
        /// プログレスバーを表示しない
        #[arg(long)]
        no_progress: bool,
    },
    /// バケットの状態を確認（変更はしない）
    Check {
        /// 対象のアップロード名（省略時はすべて）
        name: Option<String>,
    },
    /// アップロードしたオブジェクトを削除
    Down {
        /// 対象のアップロード名（省略時はすべて）
        name: Option<String>,
        /// 確認なしで実行
        #[arg(short, long)]
        yes: bool,
    },
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Versionコマンドはプロジェクトファイル不要
    if matches!(cli.command, Commands::Version) {
        println!("fleet-upload {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let show_progress = matches!(
        cli.command,
        Commands::Up {
            no_progress: false,
            ..
        }
    );
    let ws = workspace::Workspace::load(&cli.file, cli.endpoint.as_deref(), show_progress)?;

    match cli.command {
        Commands::Plan { name } => commands::plan::handle(&ws, name.as_deref()).await,
        Commands::Up { name, check, .. } => commands::up::handle(&ws, name.as_deref(), check).await,
        Commands::Check { name } => commands::check::handle(&ws, name.as_deref()).await,
        Commands::Down { name, yes } => commands::down::handle(&ws, name.as_deref(), yes).await,
        Commands::Version => Ok(()),
    }
}
