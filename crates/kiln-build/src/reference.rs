//! イメージ参照のバリデーション
//!
//! Dockerエンジンが受け付ける参照文法
//! `[registry[:port]/]name[:tag][@digest]` をエンジンに触る前に検証する。
//! ここで弾けばアーカイブ作成などの副作用は一切発生しない。

use crate::error::{BuildError, Result};

/// タグの最大長（Dockerの制約）
const MAX_TAG_LENGTH: usize = 128;

/// リポジトリ名（レジストリ込み）の最大長
const MAX_NAME_LENGTH: usize = 255;

/// ダイジェストの16進部の最小長
const MIN_DIGEST_HEX_LENGTH: usize = 32;

/// イメージ参照を検証
pub fn validate(reference: &str) -> Result<()> {
    check(reference).map_err(|reason| BuildError::InvalidReference {
        name: reference.to_string(),
        reason,
    })
}

fn check(reference: &str) -> std::result::Result<(), String> {
    if reference.is_empty() {
        return Err("reference is empty".to_string());
    }

    let (remainder, digest) = split_digest(reference);
    if let Some(digest) = digest {
        check_digest(digest)?;
    }

    let (name, tag) = split_tag(remainder);
    if let Some(tag) = tag {
        check_tag(tag)?;
    }

    if name.is_empty() {
        return Err("repository name is empty".to_string());
    }
    if name.len() > MAX_NAME_LENGTH {
        return Err(format!(
            "repository name too long ({} characters, max {})",
            name.len(),
            MAX_NAME_LENGTH
        ));
    }

    let (domain, path) = split_domain(name);
    if let Some(domain) = domain {
        check_domain(domain)?;
    }

    if path.is_empty() {
        return Err("repository name is empty".to_string());
    }
    for component in path.split('/') {
        check_path_component(component)?;
    }

    Ok(())
}

/// `@` 以降をダイジェストとして分離
fn split_digest(reference: &str) -> (&str, Option<&str>) {
    match reference.split_once('@') {
        Some((name, digest)) => (name, Some(digest)),
        None => (reference, None),
    }
}

/// 最後の `/` より後にある `:` 以降をタグとして分離
///
/// `localhost:5000/app` のポート番号をタグと誤認しないための規則。
fn split_tag(name: &str) -> (&str, Option<&str>) {
    if let Some(pos) = name.rfind(':') {
        let after_slash = name.rfind('/').is_none_or(|slash| pos > slash);
        if after_slash {
            return (&name[..pos], Some(&name[pos + 1..]));
        }
    }
    (name, None)
}

/// 先頭セグメントがレジストリホストかどうかを判定して分離
///
/// `.` か `:` を含むか、`localhost` と一致する場合のみホストとみなす。
fn split_domain(name: &str) -> (Option<&str>, &str) {
    if let Some((first, rest)) = name.split_once('/') {
        if first.contains('.') || first.contains(':') || first == "localhost" {
            return (Some(first), rest);
        }
    }
    (None, name)
}

fn check_domain(domain: &str) -> std::result::Result<(), String> {
    let (host, port) = match domain.split_once(':') {
        Some((host, port)) => (host, Some(port)),
        None => (domain, None),
    };

    if host.is_empty() {
        return Err("registry host is empty".to_string());
    }
    for label in host.split('.') {
        if label.is_empty() {
            return Err(format!("invalid registry host '{}'", host));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(format!("invalid registry host '{}'", host));
        }
        if !label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
            return Err(format!("invalid registry host '{}'", host));
        }
    }

    if let Some(port) = port {
        if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("invalid registry port '{}'", port));
        }
    }

    Ok(())
}

/// リポジトリパスの1要素を検証
///
/// 小文字英数字の並びを `.` / `_` / `__` / `-`+ で区切った形のみ許可。
fn check_path_component(component: &str) -> std::result::Result<(), String> {
    if component.is_empty() {
        return Err("repository name has an empty path component".to_string());
    }

    let bytes = component.as_bytes();
    if !bytes[0].is_ascii_lowercase() && !bytes[0].is_ascii_digit() {
        return Err(format!(
            "path component '{}' must start with a lowercase letter or digit",
            component
        ));
    }
    let last = bytes[bytes.len() - 1];
    if !last.is_ascii_lowercase() && !last.is_ascii_digit() {
        return Err(format!(
            "path component '{}' must end with a lowercase letter or digit",
            component
        ));
    }

    let mut run_char = 0u8;
    let mut run_len = 0usize;
    for &b in bytes {
        if b.is_ascii_lowercase() || b.is_ascii_digit() {
            run_char = 0;
            run_len = 0;
            continue;
        }

        match b {
            b'.' | b'_' | b'-' => {
                if run_len > 0 && run_char != b {
                    // `._` のような区切り文字の混在は不可
                    return Err(format!(
                        "path component '{}' has adjacent separators",
                        component
                    ));
                }
                run_char = b;
                run_len += 1;

                let max_run = match b {
                    b'.' => 1,
                    b'_' => 2,
                    _ => usize::MAX,
                };
                if run_len > max_run {
                    return Err(format!(
                        "path component '{}' has repeated separators",
                        component
                    ));
                }
            }
            _ if b.is_ascii_uppercase() => {
                return Err(format!(
                    "repository name '{}' must be lowercase",
                    component
                ));
            }
            _ => {
                return Err(format!(
                    "invalid character '{}' in path component '{}'",
                    b as char, component
                ));
            }
        }
    }

    Ok(())
}

fn check_tag(tag: &str) -> std::result::Result<(), String> {
    if tag.is_empty() {
        return Err("tag is empty".to_string());
    }
    if tag.len() > MAX_TAG_LENGTH {
        return Err(format!(
            "tag too long ({} characters, max {})",
            tag.len(),
            MAX_TAG_LENGTH
        ));
    }
    if tag.starts_with('.') || tag.starts_with('-') {
        return Err(format!("tag '{}' must not start with '.' or '-'", tag));
    }
    for c in tag.chars() {
        if !c.is_ascii_alphanumeric() && c != '.' && c != '-' && c != '_' {
            return Err(format!("invalid character '{}' in tag '{}'", c, tag));
        }
    }
    Ok(())
}

fn check_digest(digest: &str) -> std::result::Result<(), String> {
    let Some((algorithm, hex)) = digest.split_once(':') else {
        return Err(format!("digest '{}' is missing an algorithm", digest));
    };

    if algorithm.is_empty()
        || !algorithm.chars().all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '.' | '_' | '-')
        })
    {
        return Err(format!("invalid digest algorithm '{}'", algorithm));
    }

    if hex.len() < MIN_DIGEST_HEX_LENGTH {
        return Err(format!(
            "digest hex too short ({} characters, min {})",
            hex.len(),
            MIN_DIGEST_HEX_LENGTH
        ));
    }
    if !hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()) {
        return Err(format!("invalid digest hex '{}'", hex));
    }

    Ok(())
}
