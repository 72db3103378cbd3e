//! 通用工具函数

use chrono::{DateTime, NaiveDate, Utc};

/// 默认分页大小
pub const DEFAULT_PAGE_SIZE: i64 = 50;
/// 最大分页大小
pub const MAX_PAGE_SIZE: i64 = 200;

/// 规范化分页参数，返回 `(limit, offset)`
pub fn clamp_page(limit: Option<i64>, offset: Option<i64>) -> (i64, i64) {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let offset = offset.unwrap_or(0).max(0);
    (limit, offset)
}

/// 把搜索词转换为 `ILIKE` 模式，转义通配符
pub fn like_pattern(term: &str) -> String {
    let escaped = term
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

/// 当前 UTC 时间
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// 当前 UTC 日期
pub fn today_utc() -> NaiveDate {
    now_utc().date_naive()
}

/// 两个日期之间的整年数，`to` 早于 `from` 时为 0
pub fn whole_years_between(from: NaiveDate, to: NaiveDate) -> u32 {
    to.years_since(from).unwrap_or(0)
}

/// 去掉首尾空白并把内部连续空白压缩为单个空格
pub fn normalize_name(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 邮箱统一为小写
pub fn normalize_email(value: &str) -> String {
    value.trim().to_lowercase()
}

/// 大小写不敏感的包含匹配
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.trim().to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_page() {
        assert_eq!(clamp_page(None, None), (DEFAULT_PAGE_SIZE, 0));
        assert_eq!(clamp_page(Some(0), Some(-5)), (1, 0));
        assert_eq!(clamp_page(Some(10_000), Some(20)), (MAX_PAGE_SIZE, 20));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern(" smith "), "%smith%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_name_and_email_normalisation() {
        assert_eq!(normalize_name("  Mary   Ann \t"), "Mary Ann");
        assert_eq!(normalize_name("   "), "");
        assert_eq!(normalize_email(" Jane.Doe@Example.COM "), "jane.doe@example.com");
    }

    #[test]
    fn test_whole_years_between() {
        let dob = NaiveDate::from_ymd_opt(1990, 6, 15).unwrap();
        assert_eq!(whole_years_between(dob, NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()), 33);
        assert_eq!(whole_years_between(dob, NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()), 34);
        assert_eq!(whole_years_between(dob, NaiveDate::from_ymd_opt(1980, 1, 1).unwrap()), 0);
    }

    #[test]
    fn test_contains_ignore_case() {
        assert!(contains_ignore_case("Jane Doe", "DOE"));
        assert!(!contains_ignore_case("Jane Doe", "smith"));
    }
}
