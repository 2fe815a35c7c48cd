//! Find command implementation (OCR-based text location).

use std::path::PathBuf;
use std::sync::Arc;

use snapocr_engine::OcrEngine;
use snapocr_protocol::{LocateResult, OcrMatch, OcrResult, Response, ResponseData};

use super::{error_code, read_image};
use crate::cli::FindArgs;
use crate::output::Output;
use crate::setup::expand_path;

pub async fn run(engine: Arc<OcrEngine>, args: FindArgs, output: &Output) -> anyhow::Result<()> {
    let path: PathBuf = expand_path(&args.image);
    let shown = path.display().to_string();

    let result = match read_image(&engine, &path).await {
        Ok(result) => result,
        Err(e) => {
            output.print_error(error_code(&e), &format!("{:#}", e));
            return Err(e);
        }
    };

    let matches = find_lines(&result.lines, &args.query, args.pattern, !args.case_sensitive);
    output.print_response(&Response::success(ResponseData::LocateResult(LocateResult {
        path: shown,
        matches,
        total_lines: result.lines.len() as u32,
    })))
}

/// Lines whose text contains `query`, or matches it as a glob when `pattern` is set.
pub fn find_lines(lines: &[OcrResult], query: &str, pattern: bool, ignore_case: bool) -> Vec<OcrMatch> {
    let query_cmp = if ignore_case {
        query.to_lowercase()
    } else {
        query.to_string()
    };

    lines
        .iter()
        .filter(|line| {
            let text_cmp = if ignore_case {
                line.text.to_lowercase()
            } else {
                line.text.clone()
            };

            if pattern {
                glob_match(&query_cmp, &text_cmp)
            } else {
                text_cmp.contains(&query_cmp)
            }
        })
        .map(OcrMatch::from)
        .collect()
}

/// Glob-style matching where `*` is any run of characters and `?` is one.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let text: Vec<char> = text.chars().collect();

    let (mut p, mut t) = (0, 0);
    // Position after the last `*` and the text index it is currently absorbing up to.
    let mut backtrack: Option<(usize, usize)> = None;

    while t < text.len() {
        match pattern.get(p) {
            Some('*') => {
                p += 1;
                backtrack = Some((p, t));
            }
            Some(&c) if c == '?' || c == text[t] => {
                p += 1;
                t += 1;
            }
            _ => match backtrack {
                Some((star_p, star_t)) => {
                    p = star_p;
                    t = star_t + 1;
                    backtrack = Some((star_p, star_t + 1));
                }
                None => return false,
            },
        }
    }

    pattern[p..].iter().all(|&c| c == '*')
}

#[cfg(test)]
mod tests {
    use super::*;
    use snapocr_protocol::BoundingBox;

    #[test]
    fn test_glob_match_exact() {
        assert!(glob_match("hello", "hello"));
        assert!(!glob_match("hello", "world"));
        assert!(!glob_match("hello", "hello!"));
    }

    #[test]
    fn test_glob_match_star() {
        assert!(glob_match("*", "anything"));
        assert!(glob_match("*", ""));
        assert!(glob_match("hello*", "helloworld"));
        assert!(glob_match("*world", "helloworld"));
        assert!(glob_match("*llo*", "helloworld"));
        assert!(!glob_match("hello*", "world"));
    }

    #[test]
    fn test_glob_match_question() {
        assert!(glob_match("h?llo", "hello"));
        assert!(glob_match("h?llo", "hallo"));
        assert!(!glob_match("h?llo", "hllo"));
    }

    #[test]
    fn test_glob_match_combined() {
        assert!(glob_match("h*o", "hello"));
        assert!(glob_match("h?ll*", "helloworld"));
        assert!(glob_match("*a*b", "xxaxxbxxb"));
        assert!(!glob_match("*a*b", "xxaxxbxxc"));
    }

    #[test]
    fn test_glob_match_unicode() {
        assert!(glob_match("设?", "设置"));
        assert!(glob_match("*置", "系统设置"));
    }

    fn lines() -> Vec<OcrResult> {
        vec![
            OcrResult::new("File    Edit    View", 0.9, BoundingBox::new(0, 0, 200, 20)),
            OcrResult::new("Save changes?", 0.8, BoundingBox::new(10, 50, 110, 70)),
        ]
    }

    #[test]
    fn test_find_lines_contains_ignores_case() {
        let matches = find_lines(&lines(), "EDIT", false, true);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].center_x, 100);
        assert_eq!(matches[0].center_y, 10);
    }

    #[test]
    fn test_find_lines_case_sensitive() {
        assert!(find_lines(&lines(), "EDIT", false, false).is_empty());
        assert_eq!(find_lines(&lines(), "Edit", false, false).len(), 1);
    }

    #[test]
    fn test_find_lines_pattern() {
        let matches = find_lines(&lines(), "save*", true, true);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].text, "Save changes?");
        assert_eq!(matches[0].x, 10);
        assert_eq!(matches[0].width, 100);
    }
}
