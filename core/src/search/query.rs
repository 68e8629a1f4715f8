//! Query preparation and ripgrep argument construction

use crate::config::SearchOptions;
use crate::error::SearchError;
use ignore::overrides::OverrideBuilder;

/// Turn the user's query into the pattern ripgrep receives.
///
/// Whole-word search without regex mode is implemented through the regex
/// engine, so the literal text is escaped first and word-boundary anchors are
/// added only on sides that start or end with a word character.
pub fn prepare_query(query: &str, options: &SearchOptions) -> String {
    if !options.match_whole_word || options.use_reg_exp {
        return query.to_string();
    }

    let mut pattern = regex::escape(query);
    if query.chars().next().is_some_and(is_word_char) {
        pattern.insert_str(0, r"\b");
    }
    if query.chars().next_back().is_some_and(is_word_char) {
        pattern.push_str(r"\b");
    }
    pattern
}

/// Build the ripgrep flags for `options`; the pattern and roots follow them
pub fn search_args(options: &SearchOptions, max_count_per_file: u32) -> Vec<String> {
    let mut args = vec![
        "--json".to_string(),
        format!("--max-count={}", max_count_per_file),
        "--no-ignore-parent".to_string(),
    ];

    args.push(if options.match_case {
        "--case-sensitive".to_string()
    } else {
        "--ignore-case".to_string()
    });

    if options.include_ignored {
        args.push("-uu".to_string());
    }

    for include in options.include.iter().filter(|p| !p.is_empty()) {
        args.push(format!("--glob=**/{}", include));
    }

    for exclude in options.exclude.iter().filter(|p| !p.is_empty()) {
        args.push(format!("--glob=!**/{}", exclude));
    }

    if options.is_regex_mode() {
        args.push("--regexp".to_string());
    } else {
        args.push("--fixed-strings".to_string());
        args.push("--".to_string());
    }

    args
}

/// Reject include/exclude globs ripgrep would refuse, before anything is spawned
pub fn validate_globs(options: &SearchOptions) -> Result<(), SearchError> {
    let mut builder = OverrideBuilder::new("/");

    let includes = options
        .include
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| (p, format!("**/{}", p)));
    let excludes = options
        .exclude
        .iter()
        .filter(|p| !p.is_empty())
        .map(|p| (p, format!("!**/{}", p)));

    for (pattern, glob) in includes.chain(excludes) {
        builder
            .add(&glob)
            .map_err(|e| SearchError::InvalidGlob {
                pattern: pattern.clone(),
                message: e.to_string(),
            })?;
    }

    Ok(())
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_literal_query_is_untouched() {
        let options = SearchOptions::default();
        assert_eq!(prepare_query("a.b", &options), "a.b");
    }

    #[test]
    fn test_whole_word_escapes_literal_text() {
        let options = SearchOptions::default().with_whole_word(true);
        let pattern = prepare_query("a.b", &options);
        assert_eq!(pattern, r"\ba\.b\b");

        let re = Regex::new(&pattern).unwrap();
        assert!(re.is_match("x a.b y"));
        assert!(!re.is_match("x axb y"));
        assert!(!re.is_match("xa.b"));
    }

    #[test]
    fn test_whole_word_skips_anchor_next_to_non_word_chars() {
        let options = SearchOptions::default().with_whole_word(true);
        assert_eq!(prepare_query("(foo)", &options), r"\(foo\)");
        assert_eq!(prepare_query("foo(", &options), r"\bfoo\(");
        assert_eq!(prepare_query("_x", &options), r"\b_x\b");
    }

    #[test]
    fn test_whole_word_with_regexp_keeps_pattern() {
        let options = SearchOptions::default()
            .with_whole_word(true)
            .with_regexp(true);
        assert_eq!(prepare_query("fo+", &options), "fo+");
    }

    #[test]
    fn test_default_args() {
        let args = search_args(&SearchOptions::default(), 100);
        assert_eq!(
            args,
            vec![
                "--json",
                "--max-count=100",
                "--no-ignore-parent",
                "--ignore-case",
                "--fixed-strings",
                "--",
            ]
        );
    }

    #[test]
    fn test_args_skip_empty_globs() {
        let options = SearchOptions::default()
            .with_match_case(true)
            .with_include("*.ts")
            .with_exclude("");
        let args = search_args(&options, 100);

        assert!(args.contains(&"--case-sensitive".to_string()));
        assert!(args.contains(&"--glob=**/*.ts".to_string()));
        assert!(!args.iter().any(|a| a.starts_with("--glob=!")));
        assert!(!args.contains(&"--ignore-case".to_string()));
    }

    #[test]
    fn test_args_for_regex_and_ignored_files() {
        let options = SearchOptions::default()
            .with_regexp(true)
            .with_include_ignored(true)
            .with_exclude("node_modules");
        let args = search_args(&options, 7);

        assert!(args.contains(&"--max-count=7".to_string()));
        assert!(args.contains(&"-uu".to_string()));
        assert!(args.contains(&"--glob=!**/node_modules".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("--regexp"));
        assert!(!args.contains(&"--fixed-strings".to_string()));
    }

    #[test]
    fn test_validate_globs() {
        let good = SearchOptions::default()
            .with_include("*.{ts,tsx}")
            .with_exclude("");
        assert!(validate_globs(&good).is_ok());

        let bad = SearchOptions::default().with_exclude("src/[a-");
        match validate_globs(&bad) {
            Err(SearchError::InvalidGlob { pattern, .. }) => assert_eq!(pattern, "src/[a-"),
            other => panic!("expected InvalidGlob, got {:?}", other),
        }
    }
}
