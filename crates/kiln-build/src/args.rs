//! ビルド引数のマージ

use std::collections::HashMap;
use tracing::warn;

/// 呼び出し側の引数とイメージ定義側の引数をマージ
///
/// 呼び出し側（CLIや環境変数）の値が常に優先される。定義側の値は
/// 既存のキーを上書きしない形で補われる。入力はどちらも変更されず、
/// 新しく所有されたマップを返す。
pub fn merge_build_args(
    caller_args: &HashMap<String, String>,
    spec_args: &HashMap<String, String>,
) -> HashMap<String, String> {
    let mut merged = caller_args.clone();

    for (key, value) in spec_args {
        merged
            .entry(key.clone())
            .or_insert_with(|| value.clone());
    }

    merged
}

/// 機密情報らしきビルド引数に警告を出す
///
/// ビルド引数はイメージ履歴に記録されるため、資格情報の受け渡しには
/// 使うべきではない。
pub fn warn_sensitive_build_args(args: &HashMap<String, String>) {
    let sensitive_patterns = ["password", "token", "secret", "api_key", "private_key"];

    for key in args.keys() {
        let key_lower = key.to_lowercase();
        for pattern in &sensitive_patterns {
            if key_lower.contains(pattern) {
                warn!(
                    "警告: ビルド引数 '{}' は機密情報を含む可能性があります。\n\
                     ビルド引数はイメージ履歴に記録されます。",
                    key
                );
            }
        }
    }
}
