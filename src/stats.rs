use indexmap::IndexMap;
use serde::Serialize;

use crate::modfile::ModFile;
use crate::utils::{should_translate, ModError};

/// mod文件统计信息
#[derive(Debug, Clone, Serialize)]
pub struct ModStats {
    pub file_type: i32,
    pub mod_version: i32,
    pub record_count: usize,
    pub instance_count: usize,
    /// 字符串字段总数（含文件名字段）
    pub string_field_count: usize,
    /// 其中真正需要翻译的条数
    pub translatable_count: usize,
    /// 按记录类型码分组的记录数
    pub records_by_type: IndexMap<i32, usize>,
    pub leftover_bytes: usize,
}

impl ModStats {
    /// 汇总一个模型的统计信息
    pub fn from_mod(mod_file: &ModFile) -> Self {
        let mut instance_count = 0usize;
        let mut string_field_count = 0usize;
        let mut translatable_count = 0usize;
        let mut records_by_type: IndexMap<i32, usize> = IndexMap::new();

        if let Some(description) = mod_file.header.description() {
            if should_translate(description) {
                translatable_count += 1;
            }
        }

        for record in &mod_file.records {
            instance_count += record.instances.len();
            string_field_count += record.string_fields.len() + record.filename_fields.len();
            *records_by_type.entry(record.type_code).or_insert(0) += 1;

            if should_translate(&record.name) {
                translatable_count += 1;
            }
            for value in record.string_fields.values() {
                if should_translate(value) {
                    translatable_count += 1;
                }
            }
        }

        ModStats {
            file_type: mod_file.header.file_type(),
            mod_version: mod_file.header.mod_version(),
            record_count: mod_file.records.len(),
            instance_count,
            string_field_count,
            translatable_count,
            records_by_type,
            leftover_bytes: mod_file.leftover.len(),
        }
    }

    pub fn to_json(&self) -> Result<String, ModError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::ModHeader;
    use crate::record::{ModInstance, ModRecord};

    #[test]
    fn test_stats_from_mod() {
        let mut record_a = ModRecord::new(42, 1, "Explosive barrel", "1-a.mod");
        record_a
            .string_fields
            .insert("greeting".to_string(), "Hello there".to_string());
        record_a
            .string_fields
            .insert("tag".to_string(), "ARMOR_PLATE_01".to_string());
        record_a
            .filename_fields
            .insert("mesh".to_string(), "barrel.mesh".to_string());
        record_a.instances.push(ModInstance {
            id: "i1".to_string(),
            target: "t1".to_string(),
            position: [0.0; 3],
            rotation: [0.0; 4],
            states: Vec::new(),
        });

        let record_b = ModRecord::new(42, 2, "", "2-b.mod");

        let mod_file = ModFile {
            header: ModHeader::Simple {
                mod_version: 5,
                author: "tester".to_string(),
                description: "A lovely description".to_string(),
                dependencies: String::new(),
                references: String::new(),
                unknown_int: 0,
                record_count: 2,
            },
            records: vec![record_a, record_b],
            leftover: vec![1, 2, 3],
        };

        let stats = ModStats::from_mod(&mod_file);
        assert_eq!(stats.record_count, 2);
        assert_eq!(stats.instance_count, 1);
        assert_eq!(stats.string_field_count, 3);
        // description + name + greeting；技术标识和空名字不算
        assert_eq!(stats.translatable_count, 3);
        assert_eq!(stats.records_by_type.get(&42), Some(&2));
        assert_eq!(stats.leftover_bytes, 3);

        let json = stats.to_json().unwrap();
        assert!(json.contains("\"record_count\": 2"));
    }
}
