//! 非语言文本判定：数字、货币、日期、版本号、用户标识等
//!
//! 模式按原样保留，边界属于产品决策而不是可推导的不变量

use std::sync::OnceLock;

use regex::Regex;

/// 短于该长度的整体文本才按数字格式整体判断
const SHORT_TEXT_LIMIT: usize = 30;
/// “点击 + 标识” 只在短文本里生效
const CLICK_IDIOM_LIMIT: usize = 50;

struct Patterns {
    handle_prefix: Vec<Regex>,
    follow_idiom: Vec<Regex>,
    bare_handle: Option<Regex>,
    click_idiom: Option<Regex>,
    numeric: Vec<Regex>,
    numeric_noise: Option<Regex>,
}

fn compile(pattern: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!("正则编译失败 {}: {}", pattern, e);
            None
        }
    }
}

fn compile_all(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().filter_map(|p| compile(p)).collect()
}

fn matches(re: &Option<Regex>, text: &str) -> bool {
    re.as_ref().map(|re| re.is_match(text)).unwrap_or(false)
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        handle_prefix: compile_all(&[
            r"^@\w+",
            r"^u/\w+",
            r"^id@https?://(x\.com|twitter\.com)/[\w-]+/status/\d+",
        ]),
        follow_idiom: compile_all(&[r"关注.*\w+", r"Follow.*\w+"]),
        // 至少含一个数字或下划线，普通英文单词（如 Continue）不算标识
        bare_handle: compile(r"^[A-Za-z0-9_]*[0-9_][A-Za-z0-9_]*$"),
        click_idiom: compile(r"点击.*\w+"),
        numeric: compile_all(&[
            r"^-?\d+$",
            r"^-?(\d{1,3}(,\d{3})+)$",
            r"^\d+\s*[-~]\s*\d+$",
            r"^-?\d+\.\d+$",
            r"^-?\d+(\.\d+)?%$",
            r"(?i)^-?\d+(\.\d+)?(e[-+]\d+)?$",
            r"^[$€¥£₹₽₩]?\s*-?\d+(,\d{3})*(\.\d+)?$",
            r"^(\d{4}[-/]\d{1,2}[-/]\d{1,2}|\d{1,2}[-/]\d{1,2}[-/]\d{4}|\d{1,2}[-/]\d{1,2}[-/]\d{1,2})$",
            r"^\d{1,2}:\d{2}(:\d{2})?$",
            r"^\d+(\.\d+){1,3}(-[a-zA-Z0-9]+)?$",
            r"^id@https?://(x\.com|twitter\.com)/[\w-]+/status/\d+",
            r"^ID[:：]?\s*\d+$",
            r"(?i)^No[.:]?\s*\d+$",
            r"^#\d+$",
        ]),
        numeric_noise: compile(r"[\d,.\-%+]"),
    })
}

/// 用户名、用户 ID、“关注/点击 + 标识” 之类的文本
pub fn is_user_identifier(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }

    let p = patterns();

    if p.handle_prefix.iter().any(|re| re.is_match(trimmed)) {
        return true;
    }

    if p.follow_idiom.iter().any(|re| re.is_match(trimmed)) {
        return true;
    }

    if trimmed.chars().count() <= 15 && matches(&p.bare_handle, trimmed) {
        return true;
    }

    trimmed.chars().count() < CLICK_IDIOM_LIMIT && matches(&p.click_idiom, trimmed)
}

/// 纯数字或标准数字格式
pub fn is_numeric_content(text: &str) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }

    if is_user_identifier(trimmed) {
        return true;
    }

    let p = patterns();

    // 去掉数字符号后仍有空白，说明是多个单词
    let stripped = match &p.numeric_noise {
        Some(re) => re.replace_all(trimmed, "").into_owned(),
        None => trimmed.to_string(),
    };
    if stripped.chars().any(char::is_whitespace) {
        return false;
    }

    p.numeric.iter().any(|re| re.is_match(trimmed))
}

/// 节点内容几乎全是数字或标识
///
/// `text` 为整体文本，`runs` 为逐个文本节点（已去空白）
pub fn is_mainly_numeric(text: &str, runs: &[String]) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return false;
    }

    if trimmed.chars().count() < SHORT_TEXT_LIMIT && is_numeric_content(trimmed) {
        return true;
    }

    if is_user_identifier(trimmed) {
        return true;
    }

    !runs.is_empty() && runs.iter().all(|run| is_numeric_content(run))
}
