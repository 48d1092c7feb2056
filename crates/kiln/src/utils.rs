use std::collections::HashMap;

/// 呼び出し側ビルド引数として拾う環境変数のプレフィックス
const ENV_BUILD_ARG_PREFIX: &str = "KILN_BUILD_ARG_";

/// KEY=VALUE 形式のビルド引数をパース
pub fn parse_build_arg(raw: &str) -> anyhow::Result<(String, String)> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(anyhow::anyhow!(
            "無効なビルド引数です（KEY=VALUE 形式で指定してください）: {}",
            raw
        )),
    }
}

/// KILN_BUILD_ARG_* 環境変数からビルド引数を収集
pub fn collect_env_build_args() -> HashMap<String, String> {
    std::env::vars()
        .filter_map(|(key, value)| {
            key.strip_prefix(ENV_BUILD_ARG_PREFIX)
                .map(|name| (name.to_string(), value))
        })
        .collect()
}
