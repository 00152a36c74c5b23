use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::header::ModHeader;
use crate::modfile::ModFile;
use crate::utils::{should_translate, ModError};

/// 字典文件的字段分隔符
pub const FIELD_SEPARATOR: char = '|';
/// 字典文件的条目终止符
pub const RECORD_TERMINATOR: char = '\n';

/// 一条待翻译文本：键 | 原文 | 译文
///
/// 键按模型内位置推导（不是按内容），所以字典只能导回到
/// 与导出时记录顺序完全一致的模型上。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DictEntry {
    pub key: String,
    pub original: String,
    pub translated: String,
}

impl DictEntry {
    /// 是否已有非空译文
    pub fn is_translated(&self) -> bool {
        !self.translated.trim().is_empty()
    }

    /// 导回模型时实际使用的文本：优先译文，否则原文
    pub fn effective_text(&self) -> &str {
        if self.is_translated() {
            &self.translated
        } else {
            &self.original
        }
    }
}

/// 可翻译字符串字典（外部工作文件的内存形式）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dictionary {
    pub entries: Vec<DictEntry>,
}

impl Dictionary {
    /// 从模型导出全部可翻译字符串
    ///
    /// 同一模型不加修改导出两次结果一致。格式没有转义机制，
    /// 原文含分隔符/换行的条目直接拒绝导出（已知限制）。
    pub fn from_mod(mod_file: &ModFile) -> Self {
        let mut entries = Vec::new();
        let mut push = |key: String, original: &str| {
            if original.contains(FIELD_SEPARATOR)
                || original.contains('\n')
                || original.contains('\r')
                || key.contains(FIELD_SEPARATOR)
            {
                warn!("条目 {} 含有字典分隔符，跳过导出", key);
                return;
            }
            entries.push(DictEntry {
                key,
                original: original.to_string(),
                translated: String::new(),
            });
        };

        // 描述只有类型16的头部才有
        if let ModHeader::Simple { description, .. } = &mod_file.header {
            if !description.is_empty() {
                push("description".to_string(), description);
            }
        }

        for (index, record) in mod_file.records.iter().enumerate() {
            let record_index = index + 1;

            if !record.name.is_empty() {
                push(format!("record{}_name", record_index), &record.name);
            }
            for (field_key, value) in &record.string_fields {
                if !value.is_empty() {
                    push(format!("record{}_{}", record_index, field_key), value);
                }
            }
        }

        Dictionary { entries }
    }

    /// 从字典文件文本解析
    pub fn parse(content: &str) -> Self {
        let mut entries = Vec::new();

        for line in content.lines() {
            if line.trim().is_empty() {
                continue;
            }

            let parts: Vec<&str> = line.split(FIELD_SEPARATOR).collect();
            if parts.len() < 2 {
                warn!("跳过格式错误的字典行: {}", line);
                continue;
            }

            entries.push(DictEntry {
                key: parts[0].trim().to_string(),
                original: parts[1].to_string(),
                translated: parts.get(2).copied().unwrap_or("").to_string(),
            });
        }

        Dictionary { entries }
    }

    /// 加载字典文件，文件不存在视为该操作的致命错误
    pub fn load(path: &Path) -> Result<Self, ModError> {
        if !path.exists() {
            return Err(ModError::DictionaryMissing(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Ok(Self::parse(&content))
    }

    /// 渲染为字典文件文本
    pub fn render(&self) -> String {
        let mut out = String::new();
        for entry in &self.entries {
            out.push_str(&entry.key);
            out.push(FIELD_SEPARATOR);
            out.push_str(&entry.original);
            out.push(FIELD_SEPARATOR);
            out.push_str(&entry.translated);
            out.push(RECORD_TERMINATOR);
        }
        out
    }

    /// 整体写入字典文件
    ///
    /// 单次写入完整缓冲，中途崩溃不会留下条目数变少的文件。
    pub fn save(&self, path: &Path) -> Result<(), ModError> {
        std::fs::write(path, self.render())?;
        Ok(())
    }

    /// 把译文写回模型
    ///
    /// 只覆盖键匹配且有效文本非空的既有字段，从不新增键。
    /// 无译文的条目回退为原文（等价于不动）。
    pub fn apply_to(&self, mod_file: &mut ModFile) {
        let map: HashMap<&str, &str> = self
            .entries
            .iter()
            .map(|entry| (entry.key.as_str(), entry.effective_text()))
            .collect();

        if let ModHeader::Simple { description, .. } = &mut mod_file.header {
            if let Some(text) = map.get("description") {
                if !text.trim().is_empty() {
                    *description = text.to_string();
                }
            }
        }

        for (index, record) in mod_file.records.iter_mut().enumerate() {
            let record_index = index + 1;

            let name_key = format!("record{}_name", record_index);
            if let Some(text) = map.get(name_key.as_str()) {
                if !text.trim().is_empty() {
                    record.name = text.to_string();
                }
            }

            for (field_key, value) in record.string_fields.iter_mut() {
                let key = format!("record{}_{}", record_index, field_key);
                if let Some(text) = map.get(key.as_str()) {
                    if !text.trim().is_empty() {
                        *value = text.to_string();
                    }
                }
            }
        }
    }

    /// 翻译进度（0-100，向上取整）
    ///
    /// 只统计需要翻译的条目；没有可译条目时视为完成。
    pub fn progress(&self) -> u32 {
        let eligible: Vec<&DictEntry> = self
            .entries
            .iter()
            .filter(|entry| should_translate(&entry.original))
            .collect();

        if eligible.is_empty() {
            return 100;
        }

        let translated = eligible.iter().filter(|entry| entry.is_translated()).count();
        ((translated as f64 / eligible.len() as f64) * 100.0).ceil() as u32
    }

    pub fn is_complete(&self) -> bool {
        self.progress() >= 100
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&DictEntry> {
        self.entries.iter().find(|entry| entry.key == key)
    }

    /// 以JSON形式导出条目（给外部工具用）
    pub fn to_json(&self) -> Result<String, ModError> {
        Ok(serde_json::to_string_pretty(&self.entries)?)
    }
}

/// 查询字典文件的翻译进度
///
/// 文件不存在或为空按约定报100（无事可做），调用方不要把它
/// 和"已全部翻译"混为一谈。
pub fn translation_progress(path: &Path) -> u32 {
    if !path.exists() {
        return 100;
    }

    match std::fs::read_to_string(path) {
        Ok(content) if content.trim().is_empty() => 100,
        Ok(content) => Dictionary::parse(&content).progress(),
        Err(_) => 100,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::ModRecord;

    fn sample_mod() -> ModFile {
        let mut record = ModRecord::new(10, 1, "Old Tavern", "1-sample.mod");
        record
            .string_fields
            .insert("greeting".to_string(), "Hello".to_string());
        record
            .string_fields
            .insert("marker".to_string(), "DIALOGUE_PACKAGE".to_string());

        let mut unnamed = ModRecord::new(11, 2, "", "2-sample.mod");
        unnamed
            .string_fields
            .insert("farewell".to_string(), "Goodbye".to_string());

        ModFile {
            header: ModHeader::Simple {
                mod_version: 1,
                author: "tester".to_string(),
                description: "A quiet town".to_string(),
                dependencies: String::new(),
                references: String::new(),
                unknown_int: 0,
                record_count: 2,
            },
            records: vec![record, unnamed],
            leftover: Vec::new(),
        }
    }

    #[test]
    fn test_export_keys() {
        let dict = Dictionary::from_mod(&sample_mod());
        let keys: Vec<&str> = dict.entries.iter().map(|e| e.key.as_str()).collect();

        // 名字为空的记录不导出name键，但仍占用序号
        assert_eq!(
            keys,
            vec![
                "description",
                "record1_name",
                "record1_greeting",
                "record1_marker",
                "record2_farewell"
            ]
        );
    }

    #[test]
    fn test_export_idempotent() {
        let mod_file = sample_mod();
        assert_eq!(Dictionary::from_mod(&mod_file), Dictionary::from_mod(&mod_file));
    }

    #[test]
    fn test_import_is_noop_without_translations() {
        let mut mod_file = sample_mod();
        let reference = mod_file.clone();

        let dict = Dictionary::from_mod(&mod_file);
        dict.apply_to(&mut mod_file);

        assert_eq!(mod_file, reference);
    }

    #[test]
    fn test_import_applies_translations() {
        let mut mod_file = sample_mod();

        let mut dict = Dictionary::from_mod(&mod_file);
        for entry in &mut dict.entries {
            match entry.key.as_str() {
                "description" => entry.translated = "Une ville tranquille".to_string(),
                "record1_greeting" => entry.translated = "Bonjour".to_string(),
                _ => {}
            }
        }
        dict.apply_to(&mut mod_file);

        assert_eq!(mod_file.header.description(), Some("Une ville tranquille"));
        assert_eq!(
            mod_file.records[0].string_fields.get("greeting"),
            Some(&"Bonjour".to_string())
        );
        // 没有译文的字段不动
        assert_eq!(mod_file.records[0].name, "Old Tavern");
        assert_eq!(
            mod_file.records[1].string_fields.get("farewell"),
            Some(&"Goodbye".to_string())
        );
    }

    #[test]
    fn test_import_ignores_blank_translation() {
        let mut mod_file = sample_mod();
        let mut dict = Dictionary::from_mod(&mod_file);
        dict.entries[1].translated = "   ".to_string();
        dict.apply_to(&mut mod_file);
        assert_eq!(mod_file.records[0].name, "Old Tavern");
    }

    #[test]
    fn test_parse_render_round_trip() {
        let content = "description|A quiet town|\nrecord1_greeting|Hello|Bonjour\n";
        let dict = Dictionary::parse(content);

        assert_eq!(dict.len(), 2);
        assert_eq!(dict.entries[0].translated, "");
        assert_eq!(dict.entries[1].translated, "Bonjour");
        assert_eq!(dict.render(), content);
    }

    #[test]
    fn test_progress_counts_only_eligible() {
        let mut entries = Vec::new();
        for i in 0..10 {
            entries.push(DictEntry {
                key: format!("record{}_text", i + 1),
                original: format!("Some prose number {}", i),
                translated: if i < 4 { "Translated".to_string() } else { String::new() },
            });
        }
        // 不需要翻译的技术标识不参与统计
        entries.push(DictEntry {
            key: "record11_tag".to_string(),
            original: "DIALOGUE_PACKAGE".to_string(),
            translated: String::new(),
        });

        let dict = Dictionary { entries };
        assert_eq!(dict.progress(), 40);
    }

    #[test]
    fn test_progress_no_eligible_entries() {
        let dict = Dictionary {
            entries: vec![DictEntry {
                key: "record1_tag".to_string(),
                original: "RPG".to_string(),
                translated: String::new(),
            }],
        };
        assert_eq!(dict.progress(), 100);
        assert!(dict.is_complete());
    }

    #[test]
    fn test_progress_of_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(translation_progress(&dir.path().join("absent.dict")), 100);
    }

    #[test]
    fn test_load_missing_dictionary() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Dictionary::load(&dir.path().join("absent.dict")),
            Err(ModError::DictionaryMissing(_))
        ));
    }

    #[test]
    fn test_sentinel_text_rejected_at_export() {
        let mut mod_file = sample_mod();
        mod_file.records[0]
            .string_fields
            .insert("piped".to_string(), "a|b".to_string());

        let dict = Dictionary::from_mod(&mod_file);
        assert!(dict.get("record1_piped").is_none());
        // 其余条目照常导出
        assert!(dict.get("record1_greeting").is_some());
    }
}
