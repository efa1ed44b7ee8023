//! Security Module
//!
//! セキュリティ対策を実装するモジュール。
//! 解析前のファイル検証（MIMEタイプ、サイズ、ファイル名）と、
//! ZIPアーカイブ内のパストラバーサル攻撃への対策を提供します。

use crate::api::SecurityPolicy;
use crate::error::SecurityViolation;
use crate::types::RawFile;

/// ログのターゲット（セキュリティ関連イベント）
pub(crate) const LOG_TARGET: &str = "xlsxdeck::security";

/// アップロードされたファイルを検証
///
/// ファイル内容には一切触れず、宣言された属性のみで判定します。
/// 以下の順に検査し、最初の違反で打ち切ります。
///
/// 1. MIMEタイプが許可リストに含まれているか
/// 2. ファイルサイズが上限以下か
/// 3. ファイル名に`..`、`/`、`\`が含まれていないか
///
/// # 引数
///
/// * `file` - 検証するファイル
/// * `policy` - 適用するセキュリティポリシー
///
/// # 戻り値
///
/// * `Ok(())` - すべての検査を通過した場合
/// * `Err(SecurityViolation)` - 最初に検出された違反
pub fn validate(file: &RawFile, policy: &SecurityPolicy) -> Result<(), SecurityViolation> {
    if !policy
        .allowed_types
        .iter()
        .any(|allowed| allowed == file.media_type())
    {
        return Err(SecurityViolation::InvalidType {
            declared: file.media_type().to_string(),
            allowed: policy.allowed_types.clone(),
        });
    }

    if file.size() > policy.max_file_size {
        return Err(SecurityViolation::TooLarge {
            size: file.size(),
            limit: policy.max_file_size,
        });
    }

    let name = file.name();
    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(SecurityViolation::InvalidName {
            name: name.to_string(),
        });
    }

    Ok(())
}

/// ZIPエントリのパスを検証
///
/// パストラバーサル攻撃を防ぐため、アーカイブ内のエントリパスを検証します。
///
/// # 引数
///
/// * `path` - 検証するエントリパス
///
/// # 戻り値
///
/// * `Ok(())` - パスが安全な場合
/// * `Err(String)` - パスが危険な場合（`..`や絶対パスを含む）
pub(crate) fn validate_zip_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("Empty entry path is not allowed".to_string());
    }

    // Windows形式の`C:\`やUnix形式の`/`で始まるパス
    let bytes = path.as_bytes();
    let has_drive = bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':';
    if path.starts_with('/') || has_drive {
        return Err(format!("Absolute entry path is not allowed: {}", path));
    }

    if path.split('/').any(|segment| segment == "..") {
        return Err(format!("Path traversal detected: {}", path));
    }

    if path.contains('\\') {
        return Err(format!("Backslash in entry path is not allowed: {}", path));
    }

    Ok(())
}
