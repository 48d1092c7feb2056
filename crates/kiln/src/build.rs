use crate::docker;
use crate::utils;
use colored::Colorize;
use kiln_build::ImageBuilder;
use kiln_core::{CleanupMode, ImageSpec, Manifest, ProjectLayout};
use std::path::Path;

/// ビルドコマンドを処理
pub async fn handle_build_command(
    project_root: &Path,
    manifest: &Manifest,
    image_filter: Option<&str>,
    no_cache: bool,
    build_arg_flags: &[String],
    cleanup_override: Option<&str>,
) -> anyhow::Result<()> {
    // 呼び出し側ビルド引数を収集: 環境変数 → --build-arg の順（CLIが優先）
    let mut caller_args = utils::collect_env_build_args();
    for flag in build_arg_flags {
        let (key, value) = utils::parse_build_arg(flag)?;
        caller_args.insert(key, value);
    }

    // クリーンアップモードの上書き
    let cleanup_override = cleanup_override
        .map(|raw| {
            CleanupMode::parse(raw)
                .ok_or_else(|| anyhow::anyhow!("無効なクリーンアップモード: {}", raw))
        })
        .transpose()?;

    // ビルド対象のイメージを決定
    let targets: Vec<&ImageSpec> = match image_filter {
        Some(name) => {
            let image = manifest.image(name).ok_or_else(|| {
                anyhow::anyhow!("イメージ '{}' はマニフェストに含まれていません", name)
            })?;
            vec![image]
        }
        None => manifest.images.iter().collect(),
    };

    if targets.is_empty() {
        println!(
            "{}",
            "ビルド対象のイメージがありません（images 設定が必要です）".yellow()
        );
        return Ok(());
    }

    println!("{}", "Dockerイメージをビルド中...".green());
    println!();
    println!(
        "{}",
        format!("ビルド対象イメージ ({} 個):", targets.len()).bold()
    );
    for image in &targets {
        println!("  • {}", image.name.cyan());
    }

    // Docker接続
    println!();
    println!("{}", "Dockerに接続中...".blue());
    let docker_conn = docker::init_docker_with_error_handling().await?;

    let builder = ImageBuilder::from_docker(docker_conn)?;
    let layout = ProjectLayout::new(project_root);

    // 各イメージを記述順にビルド
    for image in &targets {
        println!();
        println!(
            "{}",
            format!("🔨 {} をビルド中...", image.name).green().bold()
        );

        let spec = match cleanup_override {
            Some(mode) => {
                let mut spec = (*image).clone();
                spec.build.cleanup = mode;
                spec
            }
            None => (*image).clone(),
        };

        match builder
            .build_image(&spec, &layout, no_cache, &caller_args)
            .await
        {
            Ok(()) => {
                println!("  {} ビルド完了", "✓".green());
            }
            Err(e) => {
                eprintln!("  {} ビルドエラー: {}", "✗".red().bold(), e);
                return Err(anyhow::anyhow!("ビルドに失敗しました"));
            }
        }
    }

    println!();
    println!(
        "{}",
        "✓ すべてのイメージがビルドされました！".green().bold()
    );

    Ok(())
}

/// 検証コマンドを処理
///
/// イメージ参照の文法のみをチェックする。エンジンには接続しない。
pub fn handle_validate_command(manifest: &Manifest) -> anyhow::Result<()> {
    let mut ok = true;

    for image in &manifest.images {
        match kiln_build::validate(&image.name) {
            Ok(()) => {
                println!("  {} {}", "✓".green(), image.name);
            }
            Err(e) => {
                ok = false;
                eprintln!("  {} {}: {}", "✗".red().bold(), image.name, e);
            }
        }
    }

    if !ok {
        return Err(anyhow::anyhow!("マニフェストの検証に失敗しました"));
    }

    println!();
    println!("{}", "✓ マニフェストは有効です".green().bold());
    Ok(())
}
