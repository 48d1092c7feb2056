mod build;
mod docker;
mod utils;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "宣言的なDockerイメージビルド", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// イメージをビルド
    Build {
        /// ビルド対象のイメージ名（省略時はマニフェストの全イメージ）
        image: Option<String>,
        /// キャッシュを使用しない
        #[arg(long)]
        no_cache: bool,
        /// ビルド引数を上書き (KEY=VALUE)
        #[arg(long = "build-arg", value_name = "KEY=VALUE")]
        build_args: Vec<String>,
        /// クリーンアップモードを上書き (none, remove, try-to-remove)
        #[arg(long)]
        cleanup: Option<String>,
    },
    /// マニフェストとイメージ参照を検証
    Validate,
    /// バージョン情報を表示
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt::init();

    // Versionコマンドはマニフェスト不要
    if matches!(cli.command, Commands::Version) {
        println!("kiln {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // プロジェクトルートを検索してマニフェストをロード
    let project_root = kiln_core::find_project_root()?;
    let manifest = kiln_core::load_manifest_from_root(&project_root)?;

    match cli.command {
        Commands::Build {
            image,
            no_cache,
            build_args,
            cleanup,
        } => {
            build::handle_build_command(
                &project_root,
                &manifest,
                image.as_deref(),
                no_cache,
                &build_args,
                cleanup.as_deref(),
            )
            .await?;
        }
        Commands::Validate => {
            build::handle_validate_command(&manifest)?;
        }
        Commands::Version => {
            unreachable!("Version is handled before manifest loading");
        }
    }

    Ok(())
}
