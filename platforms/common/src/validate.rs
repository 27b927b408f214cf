//! 参数校验工具，所有函数在发出任何网络请求之前调用

use std::fmt::Display;

use serde::de::DeserializeOwned;

use crate::error::{PushError, Result};

/// 消息类型参数名
pub const MSG_TYPE: &str = "msg_type";

pub fn ensure_not_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(PushError::validation(format!("{field} is empty")));
    }
    Ok(())
}

pub fn ensure_max_items<T>(field: &str, items: &[T], max: usize) -> Result<()> {
    if items.len() > max {
        return Err(PushError::validation(format!("{field} supports up to {max}")));
    }
    Ok(())
}

pub fn ensure_items_range<T>(field: &str, items: &[T], min: usize, max: usize) -> Result<()> {
    if items.len() < min || items.len() > max {
        return Err(PushError::validation(format!("length of {field} is {min}-{max}")));
    }
    Ok(())
}

pub fn ensure_one_of<T: PartialEq + Display>(field: &str, value: T, allowed: &[T]) -> Result<()> {
    if allowed.contains(&value) {
        return Ok(());
    }
    let allowed = allowed
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ");
    Err(PushError::validation(format!(
        "invalid {field}: {value} not in [{allowed}]"
    )))
}

/// 消息类型白名单
pub fn ensure_msg_type(value: &str, allowed: &[&str]) -> Result<()> {
    if allowed.contains(&value) {
        return Ok(());
    }
    let allowed = allowed
        .iter()
        .map(|v| format!("{v:?}"))
        .collect::<Vec<_>>()
        .join(" ");
    Err(PushError::validation(format!(
        "invalid flags {MSG_TYPE}: {value:?} not in [{allowed}]"
    )))
}

/// 按字符而不是字节计数
pub fn ensure_max_chars(field: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(PushError::validation(format!(
            "{field} supports up to {max} characters"
        )));
    }
    Ok(())
}

/// 取值范围 (0, max]
pub fn ensure_interval(field: &str, value: i64, max: i64) -> Result<()> {
    if value <= 0 || value > max {
        return Err(PushError::validation(format!(
            "invalid {field}: {value} not in (0, {max}]"
        )));
    }
    Ok(())
}

/// 文件必须存在
pub fn ensure_file_exists(path: &std::path::Path) -> Result<()> {
    if !path.is_file() {
        return Err(PushError::validation(format!(
            "file is not exist, {}",
            path.display()
        )));
    }
    Ok(())
}

/// 解析以 `|` 分隔的 ID 列表
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split('|')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .collect()
}

/// 将消息体解析为指定结构
pub fn parse_json<T: DeserializeOwned>(data: &str) -> Result<T> {
    serde_json::from_str(data).map_err(|e| PushError::payload(format!("invalid json format, {e}")))
}
