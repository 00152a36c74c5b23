use log::warn;
use memmap2::Mmap;
use rayon::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::header::ModHeader;
use crate::record::ModRecord;
use crate::utils::{create_backup_once, ModError};

/// 解析后的mod容器
///
/// 每次加载整体替换，一个会话同一时刻只持有一个实例。
/// 未经修改的模型重编码后与原始字节完全一致。
#[derive(Debug, Clone, PartialEq)]
pub struct ModFile {
    pub header: ModHeader,
    /// 记录按文件内顺序排列，顺序参与重编码和字典键推导
    pub records: Vec<ModRecord>,
    /// 声明记录数耗尽后剩下的尾部字节，原样保留，从不解释
    pub leftover: Vec<u8>,
}

impl ModFile {
    /// 从字节缓冲解码
    ///
    /// 任何失败都直接丢弃半成品模型，不产生部分结果。
    pub fn decode(data: &[u8]) -> Result<Self, ModError> {
        let mut cursor = Cursor::new(data);

        let header = ModHeader::parse(&mut cursor)?;
        let declared = header.record_count();
        if declared < 0 {
            return Err(ModError::InvalidLength {
                offset: cursor.position(),
                value: declared,
            });
        }

        let mut records = Vec::with_capacity((declared as usize).min(4096));
        for _ in 0..declared {
            records.push(ModRecord::parse(&mut cursor)?);
        }

        let leftover = data[cursor.position() as usize..].to_vec();
        if !leftover.is_empty() {
            warn!("检测到 {} 字节的尾部数据，原样保留", leftover.len());
        }

        Ok(ModFile {
            header,
            records,
            leftover,
        })
    }

    /// 编码为字节缓冲
    ///
    /// 记录数以实际records.len()为准写入，插入/删除记录后无需手工同步。
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::new();

        self.header.write(&mut out, self.records.len() as i32);
        for record in &self.records {
            record.write(&mut out);
        }
        out.extend_from_slice(&self.leftover);

        out
    }

    /// 同步头部记录数字段与实际记录数
    pub fn sync_record_count(&mut self) {
        self.header.set_record_count(self.records.len() as i32);
    }

    /// 从文件加载（内存映射，零拷贝解析）
    pub fn load(path: &Path) -> Result<Self, ModError> {
        let file = std::fs::File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        Self::decode(&mmap)
    }

    /// 写入到文件
    pub fn save(&self, path: &Path) -> Result<(), ModError> {
        std::fs::write(path, self.encode())?;
        Ok(())
    }

    /// 原地覆盖原始文件，覆盖前先写一次性.backup
    pub fn save_in_place(&self, path: &Path) -> Result<Option<PathBuf>, ModError> {
        let backup = create_backup_once(path)?;
        self.save(path)?;
        Ok(backup)
    }

    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    /// 汇总全部可翻译文本（供外部语言识别库使用）
    pub fn summary_text(&self) -> String {
        const SUMMARY_LIMIT: usize = 4096;

        let mut parts: Vec<&str> = Vec::new();
        if let Some(description) = self.header.description() {
            parts.push(description);
        }
        for record in &self.records {
            parts.push(&record.name);
            for value in record.string_fields.values() {
                parts.push(value);
            }
        }

        let mut summary = String::new();
        for part in parts {
            if part.is_empty() {
                continue;
            }
            if summary.len() + part.len() + 1 > SUMMARY_LIMIT {
                break;
            }
            summary.push_str(part);
            summary.push('\n');
        }

        summary
    }
}

/// 单个文件的回译校验结果
#[derive(Debug, Clone)]
pub struct RoundTripReport {
    pub path: PathBuf,
    pub identical: bool,
    pub error: Option<String>,
}

/// 校验 解码->重编码 是否逐字节还原
pub fn verify_round_trip(path: &Path) -> Result<bool, ModError> {
    let data = std::fs::read(path)?;
    let decoded = ModFile::decode(&data)?;
    Ok(decoded.encode() == data)
}

/// 并行校验一批mod文件
pub fn verify_round_trip_batch(paths: &[PathBuf]) -> Vec<RoundTripReport> {
    paths
        .par_iter()
        .map(|path| match verify_round_trip(path) {
            Ok(identical) => RoundTripReport {
                path: path.clone(),
                identical,
                error: None,
            },
            Err(e) => RoundTripReport {
                path: path.clone(),
                identical: false,
                error: Some(e.to_string()),
            },
        })
        .collect()
}
