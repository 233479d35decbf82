//! Record store for wrong-note attempts: append-only JSON Lines.
//!
//! Write path: one compact JSON object per line, round-trip validated
//! before it ever touches the file, appended atomically with a guaranteed
//! line separator. Read path: defensive multi-stage recovery — the file
//! has historically contained markdown headers, stray prose, and lines
//! damaged by encoding drift or double-escaping, and a single bad line
//! must never prevent the others from loading.

use std::fs;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use thiserror::Error;
use tracing::warn;
use unicode_normalization::UnicodeNormalization;

use crate::domain::{Attempt, PASS_SCORE};
use crate::util::trunc_for_log;

#[derive(Debug, Error)]
pub enum RecordStoreError {
  #[error("failed to serialize attempt: {0}")]
  Serialize(#[from] serde_json::Error),
  #[error("serialized attempt does not round-trip: {0}")]
  RoundTrip(String),
  #[error("record store I/O error: {0}")]
  Io(#[from] std::io::Error),
}

/// Append one attempt as a single JSON line.
///
/// The serialized form is deserialized again before writing; if that
/// round-trip does not reproduce the attempt, nothing is written and the
/// error propagates. We never write data known to be unparsable.
pub fn append(path: &Path, attempt: &Attempt) -> Result<(), RecordStoreError> {
  let line = serde_json::to_string(attempt)?;

  match serde_json::from_str::<Attempt>(&line) {
    Ok(back) if back == *attempt => {}
    Ok(_) => {
      return Err(RecordStoreError::RoundTrip(format!(
        "re-parsed attempt differs: {}",
        trunc_for_log(&line, 100)
      )));
    }
    Err(e) => {
      return Err(RecordStoreError::RoundTrip(format!(
        "{}: {}",
        e,
        trunc_for_log(&line, 100)
      )));
    }
  }

  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)?;
  }

  // Records must never merge: if the previous content does not already
  // end with a newline, insert one before appending.
  let mut needs_separator = false;
  if let Ok(meta) = fs::metadata(path) {
    if meta.len() > 0 {
      let mut f = fs::File::open(path)?;
      f.seek(SeekFrom::End(-1))?;
      let mut last = [0u8; 1];
      f.read_exact(&mut last)?;
      needs_separator = last[0] != b'\n';
    }
  }

  let mut f = fs::OpenOptions::new().create(true).append(true).open(path)?;
  if needs_separator {
    f.write_all(b"\n")?;
  }
  f.write_all(line.as_bytes())?;
  f.write_all(b"\n")?;
  Ok(())
}

/// Load every recoverable attempt, in file order. Never fails: a missing
/// or empty file yields an empty vec, malformed lines are logged and
/// skipped.
pub fn load_all(path: &Path) -> Vec<Attempt> {
  let bytes = match fs::read(path) {
    Ok(b) => b,
    Err(_) => return Vec::new(),
  };
  let text = decode_bytes(&bytes);
  if text.trim().is_empty() {
    return Vec::new();
  }

  let mut entries = Vec::new();
  for (line_no, raw) in text.split('\n').enumerate() {
    let line = sanitize_line(raw);
    if line.is_empty() {
      continue;
    }
    // Stray prose / markdown headers coexist in this file. Only lines
    // shaped like a JSON object are candidates; everything else is
    // silently tolerated.
    if !looks_like_record(&line) {
      continue;
    }
    match parse_record(&line) {
      Ok(attempt) => entries.push(attempt),
      Err(err) => log_parse_error(line_no + 1, &line, &err),
    }
  }
  entries
}

/// Decode the backing file bytes, tolerating encoding drift.
///
/// Order mirrors the historical readers of this file: UTF-8 with
/// signature (BOM stripped), strict UTF-8, then a cp1252/latin-1
/// fallback for legacy 8-bit content, and lossy UTF-8 as the last
/// resort. A second BOM surviving decoding is stripped as well.
fn decode_bytes(bytes: &[u8]) -> String {
  let body = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
  let text = match std::str::from_utf8(body) {
    Ok(s) => s.to_string(),
    Err(_) => decode_cp1252(body),
  };
  text.strip_prefix('\u{feff}').unwrap_or(&text).to_string()
}

/// Windows-1252 decode; the 0xA0..=0xFF range doubles as latin-1. The
/// five undefined cp1252 positions are dropped rather than failing.
fn decode_cp1252(bytes: &[u8]) -> String {
  const HIGH: [Option<char>; 32] = [
    Some('\u{20ac}'), None, Some('\u{201a}'), Some('\u{0192}'),
    Some('\u{201e}'), Some('\u{2026}'), Some('\u{2020}'), Some('\u{2021}'),
    Some('\u{02c6}'), Some('\u{2030}'), Some('\u{0160}'), Some('\u{2039}'),
    Some('\u{0152}'), None, Some('\u{017d}'), None,
    None, Some('\u{2018}'), Some('\u{2019}'), Some('\u{201c}'),
    Some('\u{201d}'), Some('\u{2022}'), Some('\u{2013}'), Some('\u{2014}'),
    Some('\u{02dc}'), Some('\u{2122}'), Some('\u{0161}'), Some('\u{203a}'),
    Some('\u{0153}'), None, Some('\u{017e}'), Some('\u{0178}'),
  ];
  let mut out = String::with_capacity(bytes.len());
  for &b in bytes {
    match b {
      0x80..=0x9f => {
        if let Some(c) = HIGH[(b - 0x80) as usize] {
          out.push(c);
        }
      }
      _ => out.push(b as char),
    }
  }
  out
}

/// Pre-parse cleanup: drop ASCII control characters (except tab), drop
/// NUL bytes, NFKC-normalize, trim surrounding whitespace.
pub fn sanitize_line(line: &str) -> String {
  let cleaned: String = line
    .chars()
    .filter(|&c| c == '\t' || c == '\n' || c >= ' ')
    .filter(|&c| c != '\u{0}')
    .collect();
  cleaned.nfkc().collect::<String>().trim().to_string()
}

/// Cheap shape test for record candidates. Prose and markdown headers
/// fail it and are skipped silently. Only the closing shape is pinned:
/// leading garbage before the opening brace is repairable (stage 3 of
/// the parser), so it must not disqualify the line here.
pub fn looks_like_record(line: &str) -> bool {
  let line = line.trim();
  line.ends_with('}') && line.contains('{')
}

/// Multi-stage JSON recovery:
/// 1. strict parse;
/// 2. retry after collapsing doubled backslashes (a known
///    double-escaping corruption mode);
/// 3. retry on the substring between the first `{` and the last `}`
///    (leading/trailing garbage).
fn robust_json_parse(line: &str) -> Option<serde_json::Value> {
  if let Ok(v) = serde_json::from_str(line) {
    return Some(v);
  }

  let collapsed = line.replace("\\\\", "\\");
  if let Ok(v) = serde_json::from_str(&collapsed) {
    return Some(v);
  }

  let start = line.find('{')?;
  let end = line.rfind('}')?;
  if end > start {
    return serde_json::from_str(&line[start..=end]).ok();
  }
  None
}

/// Parse one sanitized line into an attempt. Optional fields absent from
/// older-format lines (nickname, rechallenge hint, source catalog file)
/// are backfilled by serde defaults; missing required fields are an
/// error and the line is skipped by the caller.
fn parse_record(line: &str) -> Result<Attempt, String> {
  let value = robust_json_parse(line).ok_or_else(|| "unparsable JSON".to_string())?;
  serde_json::from_value::<Attempt>(value).map_err(|e| e.to_string())
}

fn log_parse_error(line_no: usize, line: &str, err: &str) {
  warn!(
    target: "notes",
    line = line_no,
    error = %trunc_for_log(err, 80),
    content = %trunc_for_log(line, 100),
    "Skipping unrecoverable wrong-note line"
  );
}

/// Attempts that still count as "wrong": score below the pass threshold.
/// This is the rechallenge pool.
pub fn failed_attempts(entries: &[Attempt]) -> Vec<Attempt> {
  entries
    .iter()
    .filter(|a| a.score < PASS_SCORE)
    .cloned()
    .collect()
}

/// First failed attempt per `(source_catalog_file, problem_id)`, in file
/// order. Backs the problem-level rechallenge dropdown.
pub fn unique_problem_keys(entries: &[Attempt]) -> Vec<Attempt> {
  let mut seen = std::collections::HashSet::new();
  let mut unique = Vec::new();
  for a in entries {
    let key = (a.source_catalog_file.clone(), a.problem_id.clone());
    if seen.insert(key) {
      unique.push(a.clone());
    }
  }
  unique
}

/// All attempts at one problem key, in file order. Backs the
/// attempt-level rechallenge dropdown (nickname + timestamp labels).
pub fn attempts_for_problem<'a>(
  entries: &'a [Attempt],
  source_catalog_file: &str,
  problem_id: &str,
) -> Vec<&'a Attempt> {
  entries
    .iter()
    .filter(|a| a.source_catalog_file == source_catalog_file && a.problem_id == problem_id)
    .collect()
}

/// Look up one attempt by its full composite key.
pub fn find_attempt<'a>(
  entries: &'a [Attempt],
  source_catalog_file: &str,
  problem_id: &str,
  nickname: &str,
  timestamp: &str,
) -> Option<&'a Attempt> {
  entries.iter().find(|a| {
    a.source_catalog_file == source_catalog_file
      && a.problem_id == problem_id
      && a.nickname == nickname
      && a.timestamp == timestamp
  })
}

/// Duplicate-save guard: true when an attempt with this
/// `(source_catalog_file, problem_id, nickname)` already exists.
pub fn has_saved_attempt(
  entries: &[Attempt],
  source_catalog_file: &str,
  problem_id: &str,
  nickname: &str,
) -> bool {
  entries.iter().any(|a| {
    a.source_catalog_file == source_catalog_file
      && a.problem_id == problem_id
      && a.nickname == nickname
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  fn sample_attempt(pid: &str) -> Attempt {
    Attempt {
      problem_id: pid.into(),
      title: "Window functions".into(),
      difficulty: "Level 3 – Core".into(),
      kind: "SQL".into(),
      score: 40,
      status: "retry".into(),
      submitted_code: "SELECT *\nFROM t -- \"quoted\"".into(),
      feedback_text: "라인 정리 필요:\nPARTITION BY가 빠졌습니다.".into(),
      improvement_text: "Added manually to wrong notes".into(),
      reasoning_text: "manual save".into(),
      question_text: "Rank rows per group".into(),
      timestamp: "2026-08-30 14:05 (Sun)".into(),
      rechallenge_hint: "PARTITION BY 누락".into(),
      nickname: "tricky join".into(),
      source_catalog_file: "problems.json".into(),
    }
  }

  #[test]
  fn round_trip_identity_with_newlines_quotes_and_non_ascii() {
    let a = sample_attempt("p1");
    let line = serde_json::to_string(&a).unwrap();
    assert!(!line.contains('\n'), "one record must stay one line");
    let back: Attempt = serde_json::from_str(&line).unwrap();
    assert_eq!(back, a);
  }

  #[test]
  fn append_then_load_yields_records_in_order() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wrong_notes.md");

    for pid in ["p1", "p2", "p3"] {
      append(&path, &sample_attempt(pid)).unwrap();
    }
    let loaded = load_all(&path);
    assert_eq!(loaded.len(), 3);
    let pids: Vec<_> = loaded.iter().map(|a| a.problem_id.as_str()).collect();
    assert_eq!(pids, vec!["p1", "p2", "p3"]);
    assert_eq!(loaded[0], sample_attempt("p1"));
  }

  #[test]
  fn blank_and_prose_lines_between_records_are_tolerated() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wrong_notes.md");

    let l1 = serde_json::to_string(&sample_attempt("p1")).unwrap();
    let l2 = serde_json::to_string(&sample_attempt("p2")).unwrap();
    let body = format!(
      "# Wrong notes\n\n{}\n\nsome stray prose here\n{}\n\n",
      l1, l2
    );
    fs::write(&path, body).unwrap();

    let loaded = load_all(&path);
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].problem_id, "p1");
    assert_eq!(loaded[1].problem_id, "p2");
  }

  #[test]
  fn corrupt_lines_are_recovered_or_skipped_without_panicking() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wrong_notes.md");

    let good = serde_json::to_string(&sample_attempt("good")).unwrap();
    // Double-escaping corruption: every backslash doubled. The escaped
    // quote inside submitted_code becomes invalid JSON until collapsed.
    let doubled = serde_json::to_string(&sample_attempt("doubled"))
      .unwrap()
      .replace('\\', "\\\\");
    assert!(serde_json::from_str::<serde_json::Value>(&doubled).is_err());
    let garbage_wrapped = format!(
      "corrupted prefix {}",
      serde_json::to_string(&sample_attempt("wrapped")).unwrap()
    );
    let prose = "this line is plain prose and must be skipped";

    fs::write(
      &path,
      format!("{}\n{}\n{}\n{}\n", good, doubled, garbage_wrapped, prose),
    )
    .unwrap();

    let loaded = load_all(&path);
    let pids: Vec<_> = loaded.iter().map(|a| a.problem_id.as_str()).collect();
    assert_eq!(pids, vec!["good", "doubled", "wrapped"]);
  }

  #[test]
  fn missing_optional_fields_are_backfilled() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wrong_notes.md");
    // Older-format line: no nickname, no rechallenge_hint, no
    // source_catalog_file.
    let old = r#"{"problem_id":"p1","title":"t","difficulty":"L1","kind":"SQL","score":20,"status":"retry","submitted_code":"x","feedback_text":"f","improvement_text":"i","reasoning_text":"r","question_text":"q","timestamp":"2026-01-01 09:00 (Thu)"}"#;
    fs::write(&path, format!("{}\n", old)).unwrap();

    let loaded = load_all(&path);
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].source_catalog_file, "problems.json");
    assert_eq!(loaded[0].nickname, "");
    assert_eq!(loaded[0].rechallenge_hint, "");
  }

  #[test]
  fn unknown_extra_fields_are_ignored() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wrong_notes.md");
    let mut v = serde_json::to_value(sample_attempt("p1")).unwrap();
    v["some_future_field"] = serde_json::json!({"nested": true});
    fs::write(&path, format!("{}\n", v)).unwrap();

    let loaded = load_all(&path);
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].problem_id, "p1");
  }

  #[test]
  fn missing_required_fields_skip_the_line_only() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wrong_notes.md");
    let good = serde_json::to_string(&sample_attempt("p1")).unwrap();
    fs::write(&path, format!("{{\"title\":\"no id\"}}\n{}\n", good)).unwrap();

    let loaded = load_all(&path);
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].problem_id, "p1");
  }

  #[test]
  fn missing_or_empty_file_yields_empty() {
    let dir = tempdir().unwrap();
    let missing = dir.path().join("nope.md");
    assert!(load_all(&missing).is_empty());

    let empty = dir.path().join("empty.md");
    fs::write(&empty, "").unwrap();
    assert!(load_all(&empty).is_empty());
  }

  #[test]
  fn bom_and_nul_bytes_do_not_break_the_first_record() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wrong_notes.md");
    let line = serde_json::to_string(&sample_attempt("p1")).unwrap();
    let mut bytes = b"\xef\xbb\xbf".to_vec();
    bytes.extend_from_slice(line.as_bytes());
    bytes.push(b'\n');
    fs::write(&path, bytes).unwrap();

    let loaded = load_all(&path);
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].problem_id, "p1");
  }

  #[test]
  fn legacy_eight_bit_bytes_fall_back_to_cp1252() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wrong_notes.md");
    // ASCII JSON line with one raw latin-1 byte (0xE9, 'é') inside a
    // string: invalid UTF-8, decodable via the fallback.
    let mut bytes = br#"{"problem_id":"caf"#.to_vec();
    bytes.push(0xe9);
    bytes.extend_from_slice(br#"","title":"t","difficulty":"L1","kind":"SQL","score":10,"status":"retry","submitted_code":"x","feedback_text":"f","improvement_text":"i","reasoning_text":"r","question_text":"q","timestamp":"2026-01-01 09:00 (Thu)"}"#);
    bytes.push(b'\n');
    fs::write(&path, bytes).unwrap();

    let loaded = load_all(&path);
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded[0].problem_id, "café");
  }

  #[test]
  fn append_inserts_separator_when_last_line_is_unterminated() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("wrong_notes.md");
    let first = serde_json::to_string(&sample_attempt("p1")).unwrap();
    // No trailing newline.
    fs::write(&path, &first).unwrap();

    append(&path, &sample_attempt("p2")).unwrap();
    let loaded = load_all(&path);
    assert_eq!(loaded.len(), 2, "records must never merge");
  }

  #[test]
  fn append_creates_missing_parent_directory() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("data").join("wrong_notes.md");
    append(&path, &sample_attempt("p1")).unwrap();
    assert_eq!(load_all(&path).len(), 1);
  }

  #[test]
  fn sanitize_strips_controls_and_normalizes() {
    let cleaned = sanitize_line("  {\u{0}\u{1}\"a\":\u{7}1}  ");
    assert_eq!(cleaned, "{\"a\":1}");
    // NFKC folds width variants (fullwidth brace -> ASCII brace).
    assert_eq!(sanitize_line("｛x｝"), "{x}");
  }

  #[test]
  fn failed_attempts_keep_only_scores_below_threshold() {
    let mut passed = sample_attempt("p1");
    passed.score = 95;
    passed.status = "passed".into();
    let failed = sample_attempt("p2");
    let pool = failed_attempts(&[passed, failed.clone()]);
    assert_eq!(pool, vec![failed]);
  }

  #[test]
  fn composite_key_lookups() {
    let mut a1 = sample_attempt("p1");
    a1.nickname = "first try".into();
    let mut a2 = sample_attempt("p1");
    a2.nickname = "second try".into();
    a2.timestamp = "2026-08-31 10:00 (Mon)".into();
    let a3 = sample_attempt("p2");
    let entries = vec![a1.clone(), a2.clone(), a3.clone()];

    let unique = unique_problem_keys(&entries);
    assert_eq!(unique.len(), 2);
    assert_eq!(unique[0].nickname, "first try");

    let per_problem = attempts_for_problem(&entries, "problems.json", "p1");
    assert_eq!(per_problem.len(), 2);

    let found = find_attempt(
      &entries,
      "problems.json",
      "p1",
      "second try",
      "2026-08-31 10:00 (Mon)",
    );
    assert_eq!(found, Some(&a2));

    assert!(has_saved_attempt(&entries, "problems.json", "p1", "first try"));
    assert!(!has_saved_attempt(&entries, "problems.json", "p1", "third try"));
    assert!(!has_saved_attempt(&entries, "other.json", "p1", "first try"));
  }
}
