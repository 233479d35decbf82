//! Small utility helpers used across modules.

use chrono::Local;

/// Very small and safe string templating.
/// Replaces occurrences of `{key}` in the template with provided values.
/// This is intentionally simple (no nested/conditional logic).
pub fn fill_template(tpl: &str, pairs: &[(&str, &str)]) -> String {
  let mut out = tpl.to_string();
  for (k, v) in pairs {
    let needle = format!("{{{}}}", k);
    out = out.replace(&needle, v);
  }
  out
}

/// Dedup while keeping first-seen order. Used for dropdown option lists
/// (difficulties, kinds) derived from the catalog.
pub fn unique_preserve_order<I, S>(items: I) -> Vec<String>
where
  I: IntoIterator<Item = S>,
  S: Into<String>,
{
  let mut seen = std::collections::HashSet::new();
  let mut ordered = Vec::new();
  for item in items {
    let s: String = item.into();
    if seen.insert(s.clone()) {
      ordered.push(s);
    }
  }
  ordered
}

/// Clip a string to at most `max` characters (char boundary, not bytes).
/// Used for the rechallenge hint summary limit.
pub fn clip_chars(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    s.chars().take(max).collect()
  }
}

/// Current local time as "YYYY-MM-DD HH:MM (Www)", e.g.
/// "2026-08-30 14:05 (Sun)". Stored in attempts and favorites.
pub fn format_timestamp() -> String {
  Local::now().format("%Y-%m-%d %H:%M (%a)").to_string()
}

/// Log-safe truncation for large strings.
/// Avoids spamming logs with huge request/response payloads.
pub fn trunc_for_log(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let head: String = s.chars().take(max).collect();
    format!("{}… ({} bytes total)", head, s.len())
  }
}
