/*
Ledger label translations.

This module provides:
- A tiny embedded translations store for EN/ZH (compile-time embedded JSON).
- A simple `tr` function to lookup translations by key + optional params.
- A `t` convenience wrapper using the default language (DEFAULT_LANG).

The ledger header row and the status column are written in the configured
ledger language, so a ledger kept in Chinese keeps Chinese labels across runs.

Usage:
    use crate::i18n;
    let label = i18n::tr(Some("zh"), "status.confirmed", None);
    let msg = i18n::tr(None, "skip.invalid_url", Some(&[("url", "ftp://example.com/a.ics")]));

Notes:
- Placeholders use single-brace format: `{name}`.
- Default language is `en`. If a key is missing for the requested language,
  the fallback language will be used.
*/

use std::collections::HashMap;
use std::sync::OnceLock;

pub const DEFAULT_LANG: &str = "en";

static TRANSLATIONS: OnceLock<HashMap<String, HashMap<String, String>>> = OnceLock::new();

const EN_JSON: &str = r#"
{
  "ledger.header.uid": "UID",
  "ledger.header.property_name": "Property Name",
  "ledger.header.status": "Status",
  "ledger.header.guest_info": "Guest Info",
  "ledger.header.check_in": "Check-in Date",
  "ledger.header.check_out": "Check-out Date",
  "ledger.header.nights": "Nights",
  "ledger.header.last_updated": "Last Updated",
  "status.confirmed": "confirmed",
  "status.tentative": "tentative",
  "status.cancelled": "cancelled",
  "status.possibly_cancelled": "possibly cancelled",
  "skip.disabled": "feed is not enabled",
  "skip.blank_property_name": "missing or blank property name",
  "skip.invalid_url": "missing or invalid feed URL: {url}",
  "skip.fetch_failed": "fetch failed: {err}",
  "sync.already_running": "A sync run is already in progress",
  "not_found.feed": "Feed source not found"
}
"#;

const ZH_JSON: &str = r#"
{
  "ledger.header.uid": "預訂編號 (UID)",
  "ledger.header.property_name": "房源名稱",
  "ledger.header.status": "狀態",
  "ledger.header.guest_info": "房客資訊 (摘要)",
  "ledger.header.check_in": "入住日期",
  "ledger.header.check_out": "退房日期",
  "ledger.header.nights": "晚數",
  "ledger.header.last_updated": "最後更新",
  "status.confirmed": "已確認",
  "status.tentative": "暫定",
  "status.cancelled": "已取消",
  "status.possibly_cancelled": "可能已取消?",
  "skip.disabled": "未啟用",
  "skip.blank_property_name": "缺少或無效的房源名稱",
  "skip.invalid_url": "缺少或無效的 iCal 網址：{url}",
  "skip.fetch_failed": "讀取失敗：{err}",
  "sync.already_running": "同步正在進行中",
  "not_found.feed": "找不到日曆連結"
}
"#;

/// Initialize translations map (lazy).
fn build_translations() -> HashMap<String, HashMap<String, String>> {
    let mut out: HashMap<String, HashMap<String, String>> = HashMap::new();

    let en_map: HashMap<String, String> = serde_json::from_str(EN_JSON).unwrap_or_else(|e| {
        panic!("failed to parse EN_JSON in i18n module: {}", e);
    });
    out.insert("en".to_string(), en_map);

    let zh_map: HashMap<String, String> = serde_json::from_str(ZH_JSON).unwrap_or_else(|e| {
        panic!("failed to parse ZH_JSON in i18n module: {}", e);
    });
    out.insert("zh".to_string(), zh_map);

    out
}

/// Returns the global translations map (lang -> (key -> message)).
fn translations() -> &'static HashMap<String, HashMap<String, String>> {
    TRANSLATIONS.get_or_init(build_translations)
}

/// Normalize a language tag into a short, lowercase code (e.g. "zh-TW" -> "zh").
pub fn normalize_language(lang: &str) -> String {
    lang.split('-').next().unwrap_or(lang).to_lowercase()
}

/// Returns true if the given language code has a translation table.
pub fn is_supported_language(lang: &str) -> bool {
    translations().contains_key(lang)
}

/// Translate a key using an explicit language (or default if None).
///
/// Missing keys fall back to the default language, then to the key itself.
pub fn tr(lang: Option<&str>, key: &str, params: Option<&[(&str, &str)]>) -> String {
    let map = translations();

    let desired = lang.unwrap_or(DEFAULT_LANG);

    let val = map
        .get(desired)
        .and_then(|m| m.get(key))
        .cloned()
        .or_else(|| map.get(DEFAULT_LANG).and_then(|m| m.get(key)).cloned())
        .unwrap_or_else(|| key.to_string());

    if let Some(params) = params {
        let mut s = val;
        for (k, v) in params {
            s = s.replace(&format!("{{{}}}", k), v);
        }
        s
    } else {
        val
    }
}

/// Convenience wrapper: translate using default language (DEFAULT_LANG).
pub fn t(key: &str) -> String {
    tr(None, key, None)
}

/// Every header label of every language, used to recognise a header row
/// written in another language.
pub fn all_translations_of(key: &str) -> Vec<String> {
    translations()
        .values()
        .filter_map(|m| m.get(key).cloned())
        .collect()
}
