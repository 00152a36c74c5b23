use thiserror::Error;
use std::path::{Path, PathBuf};

/// 自定义错误类型
#[derive(Error, Debug)]
pub enum ModError {
    #[error("Unknown mod file type: {0}")]
    UnknownFileType(i32),

    #[error("Truncated mod file: {needed} more bytes required at offset {offset}")]
    Truncated { offset: u64, needed: usize },

    #[error("Negative length {value} at offset {offset}")]
    InvalidLength { offset: u64, value: i32 },

    #[error("Invalid UTF-8 string at offset {offset}")]
    InvalidString { offset: u64 },

    #[error("Duplicate field key '{key}' at offset {offset}")]
    DuplicateFieldKey { key: String, offset: u64 },

    #[error("Dictionary file not found: {0}")]
    DictionaryMissing(PathBuf),

    #[error("Dictionary is only {0}% translated")]
    IncompleteDictionary(u32),

    #[error("Too many consecutive translation failures ({0})")]
    TooManyFailures(usize),

    #[error("Translation provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// 翻译服务错误分类
///
/// 流水线据此决定重试策略：限流退避重试，鉴权失败立即终止。
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("rate limited: {0}")]
    RateLimited(String),

    #[error("permission denied: {0}")]
    Forbidden(String),

    #[error("request failed: {0}")]
    Failed(String),
}

/// 已知的技术标识（资源标签、语言代码等），永远不送翻译
const TECHNICAL_MARKERS: &[&str] = &[
    "mesh", "material", "texture", "shader", "skeleton", "animation",
    "collision", "physics", "icon", "normal", "diffuse",
    "en", "fr", "de", "es", "it", "pt", "ru", "ja", "ko", "zh",
];

/// 常见资源文件扩展名
const KNOWN_EXTENSIONS: &[&str] = &[
    ".mesh", ".skeleton", ".xml", ".png", ".dds", ".tga", ".jpg",
    ".wav", ".mp3", ".mod", ".txt", ".lua", ".cfg",
];

/// 译文中出现即视为服务端错误回显的子串（仅严格校验使用）
const FAILURE_MARKERS: &[&str] = &["error", "timeout", "rate limit", "too many requests"];

/// 判断一段原文是否需要送翻译
///
/// mod容器里自由文本和内部标识混在同一批字符串字段中，
/// 标识一旦被翻译会直接破坏存档，宁可漏翻不可错翻。
pub fn should_translate(text: &str) -> bool {
    let trimmed = text.trim();

    if trimmed.is_empty() {
        return false;
    }

    // 短的全大写缩写，如 "RPG"
    if trimmed.chars().count() <= 3 && trimmed.chars().all(|c| c.is_ascii_uppercase()) {
        return false;
    }

    if TECHNICAL_MARKERS.contains(&trimmed.to_ascii_lowercase().as_str()) {
        return false;
    }

    if is_mostly_technical(trimmed) {
        return false;
    }

    if looks_like_filename(trimmed) {
        return false;
    }

    // 纯数字，如 "42.5"
    if trimmed.parse::<f64>().is_ok() {
        return false;
    }

    true
}

/// 检查是否大部分由大写字母/数字/下划线组成（如 "DIALOGUE_PACKAGE"）
fn is_mostly_technical(text: &str) -> bool {
    let mut technical = 0usize;
    let mut total = 0usize;

    for c in text.chars() {
        if c.is_whitespace() {
            continue;
        }
        total += 1;
        if c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_' || c == '-' {
            technical += 1;
        }
    }

    total > 0 && technical * 10 >= total * 8
}

/// 检查是否像文件名或路径
fn looks_like_filename(text: &str) -> bool {
    if text.contains(' ') {
        return false;
    }

    if text.contains('/') || text.contains('\\') {
        return true;
    }

    let lower = text.to_ascii_lowercase();
    KNOWN_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// 校验一次翻译结果是否可用
///
/// 源语言为 "auto" 时无法断言译文必须与原文不同。
pub fn is_valid_translation(original: &str, translated: &str, source_lang: &str, target_lang: &str) -> bool {
    let trimmed = translated.trim();

    if trimmed.is_empty() {
        return false;
    }

    let langs_differ = !source_lang.is_empty() && source_lang != "auto" && source_lang != target_lang;
    if langs_differ && trimmed == original.trim() {
        return false;
    }

    // 目标语言使用非拉丁字母时，译文必须出现目标字母
    if let Some(script) = expected_script(target_lang) {
        if !contains_script(trimmed, script) {
            return false;
        }
    }

    true
}

/// 严格校验：在常规校验之上再排除服务端错误回显
pub fn is_strictly_valid_translation(original: &str, translated: &str, source_lang: &str, target_lang: &str) -> bool {
    if !is_valid_translation(original, translated, source_lang, target_lang) {
        return false;
    }

    let lower = translated.to_lowercase();
    !FAILURE_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// 可校验的目标文字系统
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Cyrillic,
    Greek,
    Arabic,
    Hebrew,
    Hangul,
    Japanese,
    Cjk,
}

/// 目标语言对应的文字系统（拉丁字母语言返回None，不做检查）
fn expected_script(target_lang: &str) -> Option<Script> {
    let lang = target_lang.to_ascii_lowercase();
    let primary = lang.split(['-', '_']).next().unwrap_or("");

    match primary {
        "ru" | "uk" | "be" | "bg" | "sr" | "mk" => Some(Script::Cyrillic),
        "el" => Some(Script::Greek),
        "ar" | "fa" | "ur" => Some(Script::Arabic),
        "he" | "yi" => Some(Script::Hebrew),
        "ko" => Some(Script::Hangul),
        "ja" => Some(Script::Japanese),
        "zh" => Some(Script::Cjk),
        _ => None,
    }
}

/// 检查文本中是否出现指定文字系统的字符
fn contains_script(text: &str, script: Script) -> bool {
    text.chars().any(|c| match script {
        Script::Cyrillic => ('\u{0400}'..='\u{04FF}').contains(&c),
        Script::Greek => ('\u{0370}'..='\u{03FF}').contains(&c),
        Script::Arabic => ('\u{0600}'..='\u{06FF}').contains(&c),
        Script::Hebrew => ('\u{0590}'..='\u{05FF}').contains(&c),
        Script::Hangul => ('\u{AC00}'..='\u{D7AF}').contains(&c) || ('\u{1100}'..='\u{11FF}').contains(&c),
        Script::Japanese => {
            ('\u{3040}'..='\u{309F}').contains(&c)
                || ('\u{30A0}'..='\u{30FF}').contains(&c)
                || ('\u{4E00}'..='\u{9FFF}').contains(&c)
        }
        Script::Cjk => ('\u{4E00}'..='\u{9FFF}').contains(&c),
    })
}

/// 原地覆盖前创建一次性备份
///
/// 备份文件已存在时不再覆盖，保证 .backup 始终是最初的原始文件。
pub fn create_backup_once(file_path: &Path) -> Result<Option<PathBuf>, ModError> {
    if !file_path.exists() {
        return Ok(None);
    }

    let backup_path = file_path.with_extension("backup");
    if backup_path.exists() {
        return Ok(None);
    }

    std::fs::copy(file_path, &backup_path)?;
    Ok(Some(backup_path))
}
