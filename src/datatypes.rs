use byteorder::{LittleEndian, ReadBytesExt};
use indexmap::IndexMap;
use std::io::{Cursor, Read};

use crate::utils::ModError;

// 容器内所有整数为小端有符号32位，所有字符串为长度前缀UTF-8（无终止符）

/// 基础整数类型读取函数
pub fn read_i32(cursor: &mut Cursor<&[u8]>) -> Result<i32, ModError> {
    let offset = cursor.position();
    cursor
        .read_i32::<LittleEndian>()
        .map_err(|_| ModError::Truncated { offset, needed: 4 })
}

pub fn read_f32(cursor: &mut Cursor<&[u8]>) -> Result<f32, ModError> {
    let offset = cursor.position();
    cursor
        .read_f32::<LittleEndian>()
        .map_err(|_| ModError::Truncated { offset, needed: 4 })
}

pub fn read_bool(cursor: &mut Cursor<&[u8]>) -> Result<bool, ModError> {
    let offset = cursor.position();
    let byte = cursor
        .read_u8()
        .map_err(|_| ModError::Truncated { offset, needed: 1 })?;
    Ok(byte != 0)
}

/// 读取非负长度前缀
pub fn read_length(cursor: &mut Cursor<&[u8]>) -> Result<usize, ModError> {
    let offset = cursor.position();
    let value = read_i32(cursor)?;
    if value < 0 {
        return Err(ModError::InvalidLength { offset, value });
    }
    Ok(value as usize)
}

/// 读取固定长度的原始字节
pub fn read_blob(cursor: &mut Cursor<&[u8]>, length: usize) -> Result<Vec<u8>, ModError> {
    let offset = cursor.position();
    let mut buffer = vec![0u8; length];
    cursor
        .read_exact(&mut buffer)
        .map_err(|_| ModError::Truncated { offset, needed: length })?;
    Ok(buffer)
}

/// 读取长度前缀字符串
pub fn read_string(cursor: &mut Cursor<&[u8]>) -> Result<String, ModError> {
    let offset = cursor.position();
    let length = read_length(cursor)?;
    let bytes = read_blob(cursor, length)?;
    String::from_utf8(bytes).map_err(|_| ModError::InvalidString { offset })
}

/// 读取3个连续浮点
pub fn read_vec3(cursor: &mut Cursor<&[u8]>) -> Result<[f32; 3], ModError> {
    Ok([read_f32(cursor)?, read_f32(cursor)?, read_f32(cursor)?])
}

/// 读取4个连续浮点
pub fn read_vec4(cursor: &mut Cursor<&[u8]>) -> Result<[f32; 4], ModError> {
    Ok([
        read_f32(cursor)?,
        read_f32(cursor)?,
        read_f32(cursor)?,
        read_f32(cursor)?,
    ])
}

/// 读取3个连续整数（extraData条目值）
pub fn read_int_triple(cursor: &mut Cursor<&[u8]>) -> Result<[i32; 3], ModError> {
    Ok([read_i32(cursor)?, read_i32(cursor)?, read_i32(cursor)?])
}

// 写入端永远写入Vec，不会失败

pub fn write_i32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn write_f32(out: &mut Vec<u8>, value: f32) {
    out.extend_from_slice(&value.to_le_bytes());
}

pub fn write_bool(out: &mut Vec<u8>, value: bool) {
    out.push(u8::from(value));
}

pub fn write_string(out: &mut Vec<u8>, value: &str) {
    write_i32(out, value.len() as i32);
    out.extend_from_slice(value.as_bytes());
}

/// 读取类型化字段表：32位条目数，每条为 键字符串 + 类型值
///
/// 重编码必须按原始顺序写回，所以使用保序的IndexMap；
/// 重复键会让条目数对不上，按格式错误处理。
pub fn read_field_map<T>(
    cursor: &mut Cursor<&[u8]>,
    mut read_value: impl FnMut(&mut Cursor<&[u8]>) -> Result<T, ModError>,
) -> Result<IndexMap<String, T>, ModError> {
    let count = read_length(cursor)?;
    let mut map = IndexMap::with_capacity(count.min(1024));

    for _ in 0..count {
        let offset = cursor.position();
        let key = read_string(cursor)?;
        let value = read_value(cursor)?;
        if map.insert(key.clone(), value).is_some() {
            return Err(ModError::DuplicateFieldKey { key, offset });
        }
    }

    Ok(map)
}

/// 按写入顺序编码字段表
pub fn write_field_map<T>(
    out: &mut Vec<u8>,
    map: &IndexMap<String, T>,
    mut write_value: impl FnMut(&mut Vec<u8>, &T),
) {
    write_i32(out, map.len() as i32);
    for (key, value) in map {
        write_string(out, key);
        write_value(out, value);
    }
}

/// 回退解码顺序
const FALLBACK_ENCODINGS: &[&str] = &["utf-8", "windows-1252", "windows-1251"];

/// 尽力解码一段来历不明的字节（用于变体17的details块预览）
pub fn decode_fallback(data: &[u8]) -> String {
    for encoding_name in FALLBACK_ENCODINGS {
        if let Some(encoding) = encoding_rs::Encoding::for_label(encoding_name.as_bytes()) {
            let (decoded, _, had_errors) = encoding.decode(data);
            if !had_errors {
                return decoded.into_owned();
            }
        }
    }

    String::from_utf8_lossy(data).into_owned()
}
