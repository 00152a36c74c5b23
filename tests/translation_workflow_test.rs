//! 完整工作流测试：解码 -> 导出字典 -> 翻译 -> 导回 -> 重编码

use kenshi_translator::{Dictionary, ModFile, ModSession};

fn push_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn push_str(out: &mut Vec<u8>, s: &str) {
    push_i32(out, s.len() as i32);
    out.extend_from_slice(s.as_bytes());
}

/// 类型16容器：1条记录，名字为空，带字符串字段 greeting=Hello
fn greeting_container() -> Vec<u8> {
    let mut out = Vec::new();

    push_i32(&mut out, 16);
    push_i32(&mut out, 1); // mod_version
    push_str(&mut out, "author");
    push_str(&mut out, ""); // description为空，不导出
    push_str(&mut out, "");
    push_str(&mut out, "");
    push_i32(&mut out, 0);
    push_i32(&mut out, 1); // record_count

    push_i32(&mut out, 0); // instance_count
    push_i32(&mut out, 7); // type_code
    push_i32(&mut out, 1); // id
    push_str(&mut out, ""); // name为空，不导出
    push_str(&mut out, "1-greeting.mod");
    push_i32(&mut out, 0); // mod_data_type

    push_i32(&mut out, 0); // bool表
    push_i32(&mut out, 0); // float表
    push_i32(&mut out, 0); // int表
    push_i32(&mut out, 0); // vec3表
    push_i32(&mut out, 0); // vec4表

    // 字符串表: greeting=Hello
    push_i32(&mut out, 1);
    push_str(&mut out, "greeting");
    push_str(&mut out, "Hello");

    push_i32(&mut out, 0); // 文件名表
    push_i32(&mut out, 0); // extraData
    push_i32(&mut out, 0); // 实例

    out
}

#[test]
fn test_full_translation_round_trip() {
    let bytes = greeting_container();
    let mut mod_file = ModFile::decode(&bytes).unwrap();

    // 导出：恰好一条 record1_greeting|Hello|
    let mut dict = Dictionary::from_mod(&mod_file);
    assert_eq!(dict.render(), "record1_greeting|Hello|\n");

    // 未翻译时导回是恒等操作
    let pristine = mod_file.clone();
    dict.apply_to(&mut mod_file);
    assert_eq!(mod_file, pristine);
    assert_eq!(mod_file.encode(), bytes);

    // 填入译文并导回
    dict.entries[0].translated = "Bonjour".to_string();
    dict.apply_to(&mut mod_file);
    assert_eq!(
        mod_file.records[0].string_fields.get("greeting"),
        Some(&"Bonjour".to_string())
    );

    // 重编码后再解码，译文在，其余结构原样
    let translated_bytes = mod_file.encode();
    let reparsed = ModFile::decode(&translated_bytes).unwrap();
    assert_eq!(
        reparsed.records[0].string_fields.get("greeting"),
        Some(&"Bonjour".to_string())
    );
    assert_eq!(reparsed.header, mod_file.header);
    assert_eq!(reparsed.records[0].instances, mod_file.records[0].instances);
    assert_eq!(reparsed.records[0].string_id, "1-greeting.mod");

    // 除greeting外的字节只在长度上有差异：还原译文后应回到原始字节
    let mut restored = reparsed;
    restored.records[0]
        .string_fields
        .insert("greeting".to_string(), "Hello".to_string());
    assert_eq!(restored.encode(), bytes);
}

#[test]
fn test_workflow_through_session() {
    let dir = tempfile::tempdir().unwrap();
    let mod_path = dir.path().join("greeting.mod");
    std::fs::write(&mod_path, greeting_container()).unwrap();

    let session = ModSession::open(mod_path.clone()).unwrap();
    let dict_path = session.export_dictionary().unwrap();
    assert_eq!(
        std::fs::read_to_string(&dict_path).unwrap(),
        "record1_greeting|Hello|\n"
    );

    // 手工填译文（模拟外部翻译流程）
    std::fs::write(&dict_path, "record1_greeting|Hello|Bonjour\n").unwrap();
    assert_eq!(session.progress(), 100);

    session.apply_dictionary().unwrap();

    // 备份是原始字节，主文件携带译文
    assert_eq!(
        std::fs::read(session.backup_path()).unwrap(),
        greeting_container()
    );
    let translated = ModFile::load(&mod_path).unwrap();
    assert_eq!(
        translated.records[0].string_fields.get("greeting"),
        Some(&"Bonjour".to_string())
    );
}
