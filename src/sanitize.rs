//! Sanitize Module
//!
//! デコード済みのデータをシリアライズ往復でディープコピーし、
//! プロトタイプ汚染に使われるキーを除去するモジュール。
//!
//! デコードされたデータはサニタイズされるまで攻撃者の制御下にあるものとして扱います。

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// 除去対象のキー
const POLLUTION_KEYS: [&str; 3] = ["__proto__", "constructor", "prototype"];

/// サニタイズ結果
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Sanitized<T> {
    /// サニタイズ済みの値
    pub value: T,
    /// 除去されたキー（出現順）
    pub removed_keys: Vec<String>,
}

/// 値をJSONで往復させ、汚染キーを再帰的に除去する
///
/// 非有限の数値は往復の過程で`null`になります。
///
/// # 引数
///
/// * `value` - サニタイズする値
///
/// # 戻り値
///
/// * `Ok(Sanitized<T>)` - サニタイズ済みの値と除去されたキー
/// * `Err(serde_json::Error)` - 往復に失敗した場合
pub(crate) fn sanitize<T>(value: &T) -> Result<Sanitized<T>, serde_json::Error>
where
    T: Serialize + DeserializeOwned,
{
    let mut tree = serde_json::to_value(value)?;
    let mut removed_keys = Vec::new();
    strip_pollution_keys(&mut tree, &mut removed_keys);
    let value = serde_json::from_value(tree)?;
    Ok(Sanitized {
        value,
        removed_keys,
    })
}

/// キーが汚染ベクターかどうか
pub(crate) fn is_pollution_key(key: &str) -> bool {
    POLLUTION_KEYS.contains(&key)
}

fn strip_pollution_keys(value: &mut Value, removed: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            let doomed: Vec<String> = map
                .keys()
                .filter(|key| is_pollution_key(key))
                .cloned()
                .collect();
            for key in doomed {
                map.remove(&key);
                removed.push(key);
            }
            for child in map.values_mut() {
                strip_pollution_keys(child, removed);
            }
        }
        Value::Array(items) => {
            for item in items {
                strip_pollution_keys(item, removed);
            }
        }
        _ => {}
    }
}
