use anyhow::{bail, Context};
use clap::Parser;
use std::path::{Path, PathBuf};

use kenshi_translator::modfile::verify_round_trip_batch;
use kenshi_translator::{
    translation_progress, Dictionary, ModFile, ModStats, SUPPORTED_EXTENSIONS,
};

#[derive(Parser)]
#[command(name = "kenshi_translator")]
#[command(about = "从Kenshi .mod文件中提取并应用翻译")]
#[command(version)]
struct Cli {
    /// 输入.mod文件路径（--test-rebuild模式下可为目录）
    #[arg(short, long)]
    input: PathBuf,

    /// 字典输出路径（默认与输入同名的.dict）
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 导出后同时以JSON打印条目
    #[arg(long)]
    json: bool,

    /// 显示mod统计信息
    #[arg(long)]
    stats: bool,

    /// 显示字典翻译进度
    #[arg(long)]
    progress: bool,

    /// 应用模式：把指定字典导回mod文件并原地保存（自动创建.backup）
    #[arg(long)]
    apply: Option<PathBuf>,

    /// 测试模式：解码后重编码，校验与原文件逐字节一致
    #[arg(long)]
    test_rebuild: bool,

    /// 静默模式（仅输出错误）
    #[arg(long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.test_rebuild {
        return handle_test_rebuild(&cli);
    }

    validate_input(&cli.input)?;

    if cli.stats {
        return handle_stats(&cli);
    }

    if cli.progress {
        return handle_progress(&cli);
    }

    if let Some(dict_path) = &cli.apply {
        return handle_apply(&cli, dict_path);
    }

    // 默认模式：导出字典
    handle_extraction(&cli)
}

/// 验证输入文件
fn validate_input(input: &Path) -> anyhow::Result<()> {
    if !input.exists() {
        bail!("输入文件不存在: {:?}", input);
    }

    let extension = input
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    if !SUPPORTED_EXTENSIONS
        .iter()
        .any(|&ext| Some(ext) == extension.as_deref())
    {
        bail!("输入文件必须是.mod文件");
    }

    Ok(())
}

/// 默认的字典输出路径
fn dict_path_for(cli: &Cli) -> PathBuf {
    cli.output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension("dict"))
}

/// 处理字典导出
fn handle_extraction(cli: &Cli) -> anyhow::Result<()> {
    let dict_path = dict_path_for(cli);

    if dict_path.exists() {
        // 已有字典里可能存着翻译进度，不覆盖
        if !cli.quiet {
            println!(
                "字典已存在: {:?} (进度 {}%)，未覆盖",
                dict_path,
                translation_progress(&dict_path)
            );
        }
        return Ok(());
    }

    let mod_file =
        ModFile::load(&cli.input).with_context(|| format!("解析失败: {:?}", cli.input))?;
    let dict = Dictionary::from_mod(&mod_file);
    dict.save(&dict_path)?;

    if !cli.quiet {
        println!("导出 {} 个条目到 {:?}", dict.len(), dict_path);
    }

    if cli.json {
        println!("{}", dict.to_json()?);
    }

    Ok(())
}

/// 处理统计信息显示
fn handle_stats(cli: &Cli) -> anyhow::Result<()> {
    let mod_file =
        ModFile::load(&cli.input).with_context(|| format!("解析失败: {:?}", cli.input))?;
    let stats = ModStats::from_mod(&mod_file);
    println!("{}", stats.to_json()?);
    Ok(())
}

/// 处理进度查询
fn handle_progress(cli: &Cli) -> anyhow::Result<()> {
    let dict_path = dict_path_for(cli);
    println!("{}", translation_progress(&dict_path));
    Ok(())
}

/// 处理翻译应用
fn handle_apply(cli: &Cli, dict_path: &Path) -> anyhow::Result<()> {
    if !dict_path.exists() {
        bail!("字典文件不存在: {:?}", dict_path);
    }

    let dict = Dictionary::load(dict_path)?;
    let percent = dict.progress();
    if percent < 100 {
        bail!("字典尚未完成翻译 (进度 {}%)", percent);
    }

    let mut mod_file =
        ModFile::load(&cli.input).with_context(|| format!("解析失败: {:?}", cli.input))?;
    dict.apply_to(&mut mod_file);

    let backup = mod_file.save_in_place(&cli.input)?;
    if !cli.quiet {
        if let Some(backup_path) = backup {
            println!("已创建备份: {:?}", backup_path);
        }
        println!("翻译已写入 {:?}", cli.input);
    }

    Ok(())
}

/// 处理回译校验（单文件或目录）
fn handle_test_rebuild(cli: &Cli) -> anyhow::Result<()> {
    let paths = collect_mod_files(&cli.input)?;
    if paths.is_empty() {
        bail!("没有找到.mod文件: {:?}", cli.input);
    }

    let reports = verify_round_trip_batch(&paths);
    let mut failures = 0usize;

    for report in &reports {
        match (&report.error, report.identical) {
            (None, true) => {
                if !cli.quiet {
                    println!("一致: {:?}", report.path);
                }
            }
            (None, false) => {
                failures += 1;
                println!("不一致: {:?}", report.path);
            }
            (Some(err), _) => {
                failures += 1;
                println!("失败: {:?}: {}", report.path, err);
            }
        }
    }

    if !cli.quiet {
        println!("校验完成: {}/{} 通过", reports.len() - failures, reports.len());
    }
    if failures > 0 {
        bail!("{} 个文件未通过回译校验", failures);
    }
    Ok(())
}

/// 收集.mod文件（目录时向下找一层子目录）
fn collect_mod_files(input: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();

    if input.is_file() {
        paths.push(input.to_path_buf());
        return Ok(paths);
    }

    if !input.is_dir() {
        bail!("输入路径不存在: {:?}", input);
    }

    for entry in std::fs::read_dir(input)? {
        let path = entry?.path();
        if path.is_dir() {
            for sub in std::fs::read_dir(&path)? {
                let sub_path = sub?.path();
                if is_mod_file(&sub_path) {
                    paths.push(sub_path);
                }
            }
        } else if is_mod_file(&path) {
            paths.push(path);
        }
    }

    paths.sort();
    Ok(paths)
}

fn is_mod_file(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
            .unwrap_or(false)
}
