//! 语言检测
//!
//! 默认实现只按书写系统判断；拉丁字母等多语言共用的文字无法给出结论，
//! 调用方把错误当作“未知，不跳过”。

use crate::config::constants;
use crate::error::{TranslationError, TranslationResult};

pub trait LanguageDetector {
    /// 返回语言标签，如 `zh`、`ja`
    fn detect(&self, text: &str) -> TranslationResult<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Han,
    Kana,
    Hangul,
    Cyrillic,
    Arabic,
    Hebrew,
    Greek,
    Thai,
    Devanagari,
    Latin,
}

fn script_of(c: char) -> Option<Script> {
    let script = match c as u32 {
        0x4E00..=0x9FFF | 0x3400..=0x4DBF | 0xF900..=0xFAFF | 0x20000..=0x2A6DF => Script::Han,
        0x3040..=0x30FF | 0x31F0..=0x31FF => Script::Kana,
        0xAC00..=0xD7AF | 0x1100..=0x11FF | 0x3130..=0x318F => Script::Hangul,
        0x0400..=0x04FF => Script::Cyrillic,
        0x0600..=0x06FF | 0x0750..=0x077F => Script::Arabic,
        0x0590..=0x05FF => Script::Hebrew,
        0x0370..=0x03FF => Script::Greek,
        0x0E00..=0x0E7F => Script::Thai,
        0x0900..=0x097F => Script::Devanagari,
        _ if c.is_ascii_alphabetic() => Script::Latin,
        0x00C0..=0x024F => Script::Latin,
        _ => return None,
    };
    Some(script)
}

/// 基于 Unicode 区块的检测器
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptDetector;

impl LanguageDetector for ScriptDetector {
    fn detect(&self, text: &str) -> TranslationResult<String> {
        let mut counts = [0usize; 10];
        let mut total = 0usize;

        for script in text.chars().filter_map(script_of) {
            counts[script as usize] += 1;
            total += 1;
        }

        if total == 0 {
            return Err(TranslationError::LanguageUnknown);
        }

        let count = |script: Script| counts[script as usize];

        // 日文常夹汉字，出现假名即判为日文
        if count(Script::Kana) * 10 >= total {
            return Ok("ja".to_string());
        }

        let (dominant, dominant_count) = [
            Script::Han,
            Script::Hangul,
            Script::Cyrillic,
            Script::Arabic,
            Script::Hebrew,
            Script::Greek,
            Script::Thai,
            Script::Devanagari,
            Script::Latin,
        ]
        .into_iter()
        .map(|script| (script, count(script)))
        .max_by_key(|(_, n)| *n)
        .unwrap_or((Script::Latin, 0));

        if dominant_count * 2 <= total {
            return Err(TranslationError::LanguageUnknown);
        }

        let tag = match dominant {
            Script::Han => "zh",
            Script::Hangul => "ko",
            Script::Cyrillic => "ru",
            Script::Arabic => "ar",
            Script::Hebrew => "he",
            Script::Greek => "el",
            Script::Thai => "th",
            Script::Devanagari => "hi",
            Script::Kana => "ja",
            Script::Latin => return Err(TranslationError::LanguageUnknown),
        };
        Ok(tag.to_string())
    }
}

/// 语言标签的主子标签，`zh-CN` 与 `zh_TW` 都归为 `zh`
pub fn primary_subtag(tag: &str) -> String {
    tag.split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

/// 文本足够长且已是目标语言时跳过翻译
pub fn should_skip(detector: &dyn LanguageDetector, text: &str, target_lang: &str) -> bool {
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.chars().count() < constants::LANGUAGE_SKIP_MIN_CHARS {
        return false;
    }

    match detector.detect(&compact) {
        Ok(lang) => primary_subtag(&lang) == primary_subtag(target_lang),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_by_script() {
        let detector = ScriptDetector;
        assert_eq!(detector.detect("这是一段中文文本").unwrap(), "zh");
        assert_eq!(detector.detect("これは日本語の文章です").unwrap(), "ja");
        assert_eq!(detector.detect("한국어 문장입니다").unwrap(), "ko");
        assert_eq!(detector.detect("Это русский текст").unwrap(), "ru");
        assert!(detector.detect("Plain English sentence").is_err());
        assert!(detector.detect("12345 !!!").is_err());
    }

    #[test]
    fn test_skip_requires_length_and_match() {
        let detector = ScriptDetector;
        let long_chinese = "这是一段已经是目标语言的比较长的中文文本内容不需要再翻译";

        assert!(should_skip(&detector, long_chinese, "zh-CN"));
        assert!(!should_skip(&detector, "短中文", "zh"));
        assert!(!should_skip(&detector, long_chinese, "ja"));
        assert!(!should_skip(
            &detector,
            "A long enough English sentence to pass the length gate",
            "en"
        ));
    }
}
