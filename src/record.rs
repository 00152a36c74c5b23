use indexmap::IndexMap;
use std::io::Cursor;

use crate::datatypes::{
    read_bool, read_f32, read_field_map, read_i32, read_int_triple, read_length, read_string,
    read_vec3, read_vec4, write_bool, write_f32, write_field_map, write_i32, write_string,
};
use crate::utils::ModError;

/// 读取extraData的一个分类：条目名 -> 三个整数
fn read_extra_category(cursor: &mut Cursor<&[u8]>) -> Result<IndexMap<String, [i32; 3]>, ModError> {
    read_field_map(cursor, read_int_triple)
}

/// 记录内放置的实体实例
#[derive(Debug, Clone, PartialEq)]
pub struct ModInstance {
    pub id: String,
    pub target: String,
    /// 平移 (tx, ty, tz)
    pub position: [f32; 3],
    /// 旋转四元数 (rw, rx, ry, rz)
    pub rotation: [f32; 4],
    /// 状态字符串（数量在编码时由列表长度重新推导）
    pub states: Vec<String>,
}

impl ModInstance {
    /// 解析实例
    pub fn parse(cursor: &mut Cursor<&[u8]>) -> Result<Self, ModError> {
        let id = read_string(cursor)?;
        let target = read_string(cursor)?;
        let position = [read_f32(cursor)?, read_f32(cursor)?, read_f32(cursor)?];
        let rotation = [
            read_f32(cursor)?,
            read_f32(cursor)?,
            read_f32(cursor)?,
            read_f32(cursor)?,
        ];

        let state_count = read_length(cursor)?;
        let mut states = Vec::with_capacity(state_count.min(1024));
        for _ in 0..state_count {
            states.push(read_string(cursor)?);
        }

        Ok(ModInstance {
            id,
            target,
            position,
            rotation,
            states,
        })
    }

    /// 编码实例
    pub fn write(&self, out: &mut Vec<u8>) {
        write_string(out, &self.id);
        write_string(out, &self.target);
        for v in self.position {
            write_f32(out, v);
        }
        for v in self.rotation {
            write_f32(out, v);
        }
        write_i32(out, self.states.len() as i32);
        for state in &self.states {
            write_string(out, state);
        }
    }
}

/// mod记录：一个游戏实体定义及其类型化字段表
#[derive(Debug, Clone, PartialEq)]
pub struct ModRecord {
    /// 头部声明的实例数，只作参考，不一定等于instances.len()，原样保留
    pub instance_count: i32,
    pub type_code: i32,
    pub id: i32,
    pub name: String,
    pub string_id: String,
    pub mod_data_type: i32,

    pub bool_fields: IndexMap<String, bool>,
    pub float_fields: IndexMap<String, f32>,
    pub int_fields: IndexMap<String, i32>,
    pub vec3_fields: IndexMap<String, [f32; 3]>,
    pub vec4_fields: IndexMap<String, [f32; 4]>,
    pub string_fields: IndexMap<String, String>,
    pub filename_fields: IndexMap<String, String>,

    /// 分类名 -> (条目名 -> 三个整数)
    pub extra_data: IndexMap<String, IndexMap<String, [i32; 3]>>,
    pub instances: Vec<ModInstance>,
}

impl ModRecord {
    /// 创建空记录（编辑和测试用）
    pub fn new(type_code: i32, id: i32, name: &str, string_id: &str) -> Self {
        ModRecord {
            instance_count: 0,
            type_code,
            id,
            name: name.to_string(),
            string_id: string_id.to_string(),
            mod_data_type: 0,
            bool_fields: IndexMap::new(),
            float_fields: IndexMap::new(),
            int_fields: IndexMap::new(),
            vec3_fields: IndexMap::new(),
            vec4_fields: IndexMap::new(),
            string_fields: IndexMap::new(),
            filename_fields: IndexMap::new(),
            extra_data: IndexMap::new(),
            instances: Vec::new(),
        }
    }

    /// 解析记录
    pub fn parse(cursor: &mut Cursor<&[u8]>) -> Result<Self, ModError> {
        let instance_count = read_i32(cursor)?;
        let type_code = read_i32(cursor)?;
        let id = read_i32(cursor)?;
        let name = read_string(cursor)?;
        let string_id = read_string(cursor)?;
        let mod_data_type = read_i32(cursor)?;

        let bool_fields = read_field_map(cursor, read_bool)?;
        let float_fields = read_field_map(cursor, read_f32)?;
        let int_fields = read_field_map(cursor, read_i32)?;
        let vec3_fields = read_field_map(cursor, read_vec3)?;
        let vec4_fields = read_field_map(cursor, read_vec4)?;
        let string_fields = read_field_map(cursor, read_string)?;
        let filename_fields = read_field_map(cursor, read_string)?;

        let extra_data = read_field_map(cursor, read_extra_category)?;

        let found_count = read_length(cursor)?;
        let mut instances = Vec::with_capacity(found_count.min(1024));
        for _ in 0..found_count {
            instances.push(ModInstance::parse(cursor)?);
        }

        Ok(ModRecord {
            instance_count,
            type_code,
            id,
            name,
            string_id,
            mod_data_type,
            bool_fields,
            float_fields,
            int_fields,
            vec3_fields,
            vec4_fields,
            string_fields,
            filename_fields,
            extra_data,
            instances,
        })
    }

    /// 编码记录
    pub fn write(&self, out: &mut Vec<u8>) {
        write_i32(out, self.instance_count);
        write_i32(out, self.type_code);
        write_i32(out, self.id);
        write_string(out, &self.name);
        write_string(out, &self.string_id);
        write_i32(out, self.mod_data_type);

        write_field_map(out, &self.bool_fields, |o, v| write_bool(o, *v));
        write_field_map(out, &self.float_fields, |o, v| write_f32(o, *v));
        write_field_map(out, &self.int_fields, |o, v| write_i32(o, *v));
        write_field_map(out, &self.vec3_fields, |o, v| {
            for f in v {
                write_f32(o, *f);
            }
        });
        write_field_map(out, &self.vec4_fields, |o, v| {
            for f in v {
                write_f32(o, *f);
            }
        });
        write_field_map(out, &self.string_fields, |o, v| write_string(o, v));
        write_field_map(out, &self.filename_fields, |o, v| write_string(o, v));

        write_field_map(out, &self.extra_data, |o, category| {
            write_field_map(o, category, |o2, values| {
                for v in values {
                    write_i32(o2, *v);
                }
            });
        });

        write_i32(out, self.instances.len() as i32);
        for instance in &self.instances {
            instance.write(out);
        }
    }
}
