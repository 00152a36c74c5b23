use std::io::Cursor;

use crate::datatypes::{decode_fallback, read_blob, read_i32, read_length, read_string, write_i32, write_string};
use crate::utils::ModError;

/// 普通mod文件
pub const FILE_TYPE_SIMPLE: i32 = 16;
/// 带合并详情块的mod文件
pub const FILE_TYPE_MERGED: i32 = 17;

/// mod文件头，按前导32位判别式区分两种布局
#[derive(Debug, Clone, PartialEq)]
pub enum ModHeader {
    /// 类型16：明文元数据
    Simple {
        mod_version: i32,
        author: String,
        description: String,
        dependencies: String,
        references: String,
        unknown_int: i32,
        record_count: i32,
    },
    /// 类型17：不透明详情块（长度在编码时由details重新推导）
    Merged {
        mod_version: i32,
        details: Vec<u8>,
        record_count: i32,
    },
}

impl ModHeader {
    /// 解析文件头
    pub fn parse(cursor: &mut Cursor<&[u8]>) -> Result<Self, ModError> {
        let file_type = read_i32(cursor)?;

        match file_type {
            FILE_TYPE_SIMPLE => Ok(ModHeader::Simple {
                mod_version: read_i32(cursor)?,
                author: read_string(cursor)?,
                description: read_string(cursor)?,
                dependencies: read_string(cursor)?,
                references: read_string(cursor)?,
                unknown_int: read_i32(cursor)?,
                record_count: read_i32(cursor)?,
            }),
            FILE_TYPE_MERGED => {
                let details_length = read_length(cursor)?;
                let mod_version = read_i32(cursor)?;
                let details = read_blob(cursor, details_length)?;
                let record_count = read_i32(cursor)?;
                Ok(ModHeader::Merged {
                    mod_version,
                    details,
                    record_count,
                })
            }
            other => Err(ModError::UnknownFileType(other)),
        }
    }

    /// 编码文件头
    ///
    /// 记录数由调用方传入（编码时以实际记录数为准，而不是读入时的字段值）。
    pub fn write(&self, out: &mut Vec<u8>, record_count: i32) {
        match self {
            ModHeader::Simple {
                mod_version,
                author,
                description,
                dependencies,
                references,
                unknown_int,
                ..
            } => {
                write_i32(out, FILE_TYPE_SIMPLE);
                write_i32(out, *mod_version);
                write_string(out, author);
                write_string(out, description);
                write_string(out, dependencies);
                write_string(out, references);
                write_i32(out, *unknown_int);
                write_i32(out, record_count);
            }
            ModHeader::Merged {
                mod_version,
                details,
                ..
            } => {
                write_i32(out, FILE_TYPE_MERGED);
                write_i32(out, details.len() as i32);
                write_i32(out, *mod_version);
                out.extend_from_slice(details);
                write_i32(out, record_count);
            }
        }
    }

    /// 文件类型判别式
    pub fn file_type(&self) -> i32 {
        match self {
            ModHeader::Simple { .. } => FILE_TYPE_SIMPLE,
            ModHeader::Merged { .. } => FILE_TYPE_MERGED,
        }
    }

    /// 头部声明的记录数
    pub fn record_count(&self) -> i32 {
        match self {
            ModHeader::Simple { record_count, .. } => *record_count,
            ModHeader::Merged { record_count, .. } => *record_count,
        }
    }

    /// 同步记录数字段
    pub fn set_record_count(&mut self, count: i32) {
        match self {
            ModHeader::Simple { record_count, .. } => *record_count = count,
            ModHeader::Merged { record_count, .. } => *record_count = count,
        }
    }

    pub fn mod_version(&self) -> i32 {
        match self {
            ModHeader::Simple { mod_version, .. } => *mod_version,
            ModHeader::Merged { mod_version, .. } => *mod_version,
        }
    }

    /// 描述文本（仅类型16有）
    pub fn description(&self) -> Option<&str> {
        match self {
            ModHeader::Simple { description, .. } => Some(description),
            ModHeader::Merged { .. } => None,
        }
    }

    /// 详情块的尽力文本预览（仅类型17有）
    ///
    /// 块内容不参与重编码，预览只用于展示，允许有损解码。
    pub fn details_preview(&self) -> Option<String> {
        match self {
            ModHeader::Merged { details, .. } => Some(decode_fallback(details)),
            ModHeader::Simple { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datatypes::write_string as ws;

    fn encode_simple_header() -> Vec<u8> {
        let mut out = Vec::new();
        write_i32(&mut out, FILE_TYPE_SIMPLE);
        write_i32(&mut out, 3); // mod_version
        ws(&mut out, "author");
        ws(&mut out, "a test mod");
        ws(&mut out, "gamedata.base");
        ws(&mut out, "");
        write_i32(&mut out, 0); // unknown_int
        write_i32(&mut out, 7); // record_count
        out
    }

    #[test]
    fn test_parse_simple_header() {
        let bytes = encode_simple_header();
        let mut cursor = Cursor::new(&bytes[..]);
        let header = ModHeader::parse(&mut cursor).unwrap();

        assert_eq!(header.file_type(), FILE_TYPE_SIMPLE);
        assert_eq!(header.record_count(), 7);
        assert_eq!(header.description(), Some("a test mod"));

        let mut reencoded = Vec::new();
        header.write(&mut reencoded, 7);
        assert_eq!(reencoded, bytes);
    }

    #[test]
    fn test_parse_merged_header() {
        let mut bytes = Vec::new();
        write_i32(&mut bytes, FILE_TYPE_MERGED);
        write_i32(&mut bytes, 4); // details_length
        write_i32(&mut bytes, 2); // mod_version
        bytes.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        write_i32(&mut bytes, 0); // record_count

        let mut cursor = Cursor::new(&bytes[..]);
        let header = ModHeader::parse(&mut cursor).unwrap();

        assert_eq!(header.file_type(), FILE_TYPE_MERGED);
        assert_eq!(header.description(), None);

        let mut reencoded = Vec::new();
        header.write(&mut reencoded, 0);
        assert_eq!(reencoded, bytes);
    }

    #[test]
    fn test_unknown_file_type() {
        let mut bytes = Vec::new();
        write_i32(&mut bytes, 99);

        let mut cursor = Cursor::new(&bytes[..]);
        assert!(matches!(
            ModHeader::parse(&mut cursor),
            Err(ModError::UnknownFileType(99))
        ));
    }
}
