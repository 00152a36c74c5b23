use parking_lot::Mutex;
use std::path::{Path, PathBuf};

use crate::dictionary::{translation_progress, Dictionary};
use crate::modfile::ModFile;
use crate::stats::ModStats;
use crate::utils::ModError;

/// 单个mod文件的编辑会话
///
/// 内存中只有一个可变的ModFile，加载/导出/导回/保存全部经由
/// 同一把锁串行化。语言识别、建字典、写回可以由不同任务发起，
/// 但对模型的访问是单飞的（按会话，不是按文件）。
pub struct ModSession {
    path: PathBuf,
    file: Mutex<Option<ModFile>>,
}

impl ModSession {
    /// 创建会话，首次访问时才加载文件
    pub fn new(path: PathBuf) -> Self {
        ModSession {
            path,
            file: Mutex::new(None),
        }
    }

    /// 创建会话并立即加载
    pub fn open(path: PathBuf) -> Result<Self, ModError> {
        let session = Self::new(path);
        session.reload()?;
        Ok(session)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 字典工作文件路径（与mod文件同名同目录）
    pub fn dict_path(&self) -> PathBuf {
        self.path.with_extension("dict")
    }

    pub fn backup_path(&self) -> PathBuf {
        self.path.with_extension("backup")
    }

    /// 重新从磁盘加载，整体替换当前模型
    pub fn reload(&self) -> Result<(), ModError> {
        let loaded = ModFile::load(&self.path)?;
        *self.file.lock() = Some(loaded);
        Ok(())
    }

    /// 在锁内访问模型，未加载时先加载
    fn with_file<T>(&self, f: impl FnOnce(&mut ModFile) -> Result<T, ModError>) -> Result<T, ModError> {
        let mut guard = self.file.lock();
        let file = match &mut *guard {
            Some(file) => file,
            slot => slot.insert(ModFile::load(&self.path)?),
        };
        f(file)
    }

    /// 导出字典工作文件
    ///
    /// 已有字典不覆盖（里面可能有未写回的翻译进度），直接复用。
    pub fn export_dictionary(&self) -> Result<PathBuf, ModError> {
        let dict_path = self.dict_path();
        if dict_path.exists() {
            return Ok(dict_path);
        }

        self.with_file(|file| Dictionary::from_mod(file).save(&dict_path))?;
        Ok(dict_path)
    }

    /// 把完成的字典导回模型并原地保存（自动创建一次性备份）
    pub fn apply_dictionary(&self) -> Result<(), ModError> {
        let dict_path = self.dict_path();
        let dict = Dictionary::load(&dict_path)?;

        let percent = dict.progress();
        if percent < 100 {
            return Err(ModError::IncompleteDictionary(percent));
        }

        let path = self.path.clone();
        self.with_file(|file| {
            dict.apply_to(file);
            file.save_in_place(&path)?;
            Ok(())
        })
    }

    /// 当前字典的翻译进度
    pub fn progress(&self) -> u32 {
        translation_progress(&self.dict_path())
    }

    /// 可翻译文本汇总（语言识别用）
    pub fn summary(&self) -> Result<String, ModError> {
        self.with_file(|file| Ok(file.summary_text()))
    }

    /// 模型统计信息
    pub fn stats(&self) -> Result<ModStats, ModError> {
        self.with_file(|file| Ok(ModStats::from_mod(file)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::ModHeader;
    use crate::record::ModRecord;

    fn write_sample_mod(dir: &Path) -> PathBuf {
        let mut record = ModRecord::new(10, 1, "Old Tavern", "1-test.mod");
        record
            .string_fields
            .insert("greeting".to_string(), "Hello".to_string());

        let mod_file = ModFile {
            header: ModHeader::Simple {
                mod_version: 1,
                author: "tester".to_string(),
                description: String::new(),
                dependencies: String::new(),
                references: String::new(),
                unknown_int: 0,
                record_count: 1,
            },
            records: vec![record],
            leftover: Vec::new(),
        };

        let path = dir.join("test.mod");
        mod_file.save(&path).unwrap();
        path
    }

    #[test]
    fn test_session_export_and_apply() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample_mod(dir.path());

        let session = ModSession::open(path.clone()).unwrap();
        let dict_path = session.export_dictionary().unwrap();
        assert!(dict_path.exists());

        // 填完译文后导回
        let mut dict = Dictionary::load(&dict_path).unwrap();
        for entry in &mut dict.entries {
            entry.translated = format!("{} (fr)", entry.original);
        }
        dict.save(&dict_path).unwrap();

        session.apply_dictionary().unwrap();
        assert!(session.backup_path().exists());

        let reloaded = ModFile::load(&path).unwrap();
        assert_eq!(
            reloaded.records[0].string_fields.get("greeting"),
            Some(&"Hello (fr)".to_string())
        );
    }

    #[test]
    fn test_session_rejects_incomplete_dictionary() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample_mod(dir.path());

        let session = ModSession::open(path).unwrap();
        session.export_dictionary().unwrap();

        assert!(matches!(
            session.apply_dictionary(),
            Err(ModError::IncompleteDictionary(_))
        ));
    }

    #[test]
    fn test_session_does_not_overwrite_dictionary() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_sample_mod(dir.path());

        let session = ModSession::open(path).unwrap();
        let dict_path = session.export_dictionary().unwrap();
        std::fs::write(&dict_path, "record1_greeting|Hello|Bonjour\n").unwrap();

        // 第二次导出必须保留已有进度
        session.export_dictionary().unwrap();
        let dict = Dictionary::load(&dict_path).unwrap();
        assert_eq!(dict.entries[0].translated, "Bonjour");
    }
}
