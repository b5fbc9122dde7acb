use regex::Regex;
use std::sync::LazyLock;

/// Plan file references, most specific phrasing first
static PLAN_PATH_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)created plan at:\s*(specs/plan-[a-zA-Z0-9\-]+\.md)",
        r"(?i)plan file:\s*(specs/plan-[a-zA-Z0-9\-]+\.md)",
        r"(?i)path.*?:\s*(specs/plan-[a-zA-Z0-9\-]+\.md)",
        r"(?i)(specs/plan-[a-zA-Z0-9\-]+\.md)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("plan path pattern is valid"))
    .collect()
});

/// Find the plan file the plan phase reported, e.g. `specs/plan-add-login.md`
pub fn extract_plan_path(output: &str) -> Option<String> {
    PLAN_PATH_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(output)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
    })
}
