//! 时间格式化 - 时间戳和持续时间的显示字符串

use chrono::{DateTime, Utc};

/// 格式化 epoch 毫秒时间戳，例如 `Mon Oct 19 08:30:00 UTC 2026`
pub fn date_to_string(epoch_millis: i64) -> String {
    match DateTime::<Utc>::from_timestamp_millis(epoch_millis) {
        Some(dt) => dt.format("%a %b %d %H:%M:%S UTC %Y").to_string(),
        None => epoch_millis.to_string(),
    }
}

/// 将持续时间格式化为文字，例如 `1 hour 0 minutes 5 seconds`
///
/// 开头和结尾为零的单位会被省略，中间为零的单位保留；全为零时输出 `0 seconds`。
pub fn duration_to_string(millis: i64) -> String {
    let total_secs = millis.max(0) / 1000;
    let units = [
        (total_secs / 86_400, "day", "days"),
        (total_secs % 86_400 / 3_600, "hour", "hours"),
        (total_secs % 3_600 / 60, "minute", "minutes"),
        (total_secs % 60, "second", "seconds"),
    ];

    let first = units.iter().position(|u| u.0 != 0).unwrap_or(units.len() - 1);
    let last = units.iter().rposition(|u| u.0 != 0).unwrap_or(first);

    units[first..=last]
        .iter()
        .map(|(value, singular, plural)| {
            format!("{} {}", value, if *value == 1 { singular } else { plural })
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// 构建完成时间：开始时间 + 持续时间；持续时间未设置时使用当前时间
pub fn completion_time(start_time: i64, duration: i64, now: i64) -> i64 {
    if duration > 0 {
        start_time + duration
    } else {
        start_time + (now - start_time)
    }
}
