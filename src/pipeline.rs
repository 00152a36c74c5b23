use log::{debug, info, warn};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::dictionary::Dictionary;
use crate::translator::TranslationProvider;
use crate::utils::{
    is_strictly_valid_translation, is_valid_translation, should_translate, ModError,
    ProviderError,
};

/// 流水线配置
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub source_lang: String,
    pub target_lang: String,
    /// 单条目最大尝试次数
    pub max_attempts: usize,
    /// 批量翻译的批大小上限
    pub batch_size: usize,
    /// 每处理多少条写一次检查点
    pub checkpoint_interval: usize,
    /// 连续失败熔断阈值
    pub failure_threshold: usize,
    /// 补翻阶段最多重试的条目数
    pub smart_retry_limit: usize,
    /// 相邻请求之间的节流延迟
    pub throttle: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            source_lang: "auto".to_string(),
            target_lang: "en".to_string(),
            max_attempts: 3,
            batch_size: 50,
            checkpoint_interval: 50,
            failure_threshold: 10,
            smart_retry_limit: 100,
            throttle: Duration::from_millis(100),
        }
    }
}

/// 条目在一次运行中的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Untranslated,
    Skipped,
    Translated,
    FailedRetryable,
    FailedTerminal,
}

/// 一次流水线运行的汇总
#[derive(Debug, Clone, Default)]
pub struct PipelineReport {
    pub total: usize,
    pub translated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub terminal: usize,
    pub cancelled: bool,
    pub failed_keys: Vec<String>,
}

/// 单条目翻译尝试的结局
enum EntryOutcome {
    /// 通过校验的译文
    Success(String),
    /// 尝试耗尽，附带期间见过的最好候选
    Exhausted(Option<String>),
    /// 鉴权类失败，不再重试
    Terminal(ProviderError),
}

/// 限流退避：延迟随尝试次数递增
pub fn rate_limit_backoff(attempt: usize) -> Duration {
    Duration::from_millis(1000 * attempt as u64)
}

/// 无效结果退避
pub fn invalid_backoff(attempt: usize) -> Duration {
    Duration::from_millis(250 * attempt as u64)
}

/// 字典翻译流水线
///
/// 直接在字典工作文件上运行：逐条（或分批）调用注入的翻译能力，
/// 周期性把整个文件落盘，中断后可以从上一个检查点续跑。
/// 批次严格串行执行，挂起点只有翻译调用和节流/退避延迟。
pub struct TranslationPipeline {
    provider: Arc<dyn TranslationProvider>,
    config: PipelineConfig,
    progress_sink: Option<Box<dyn Fn(u32) + Send + Sync>>,
    cancel_flag: Arc<AtomicBool>,
}

impl TranslationPipeline {
    pub fn new(provider: Arc<dyn TranslationProvider>, config: PipelineConfig) -> Self {
        TranslationPipeline {
            provider,
            config,
            progress_sink: None,
            cancel_flag: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 设置进度回调（0-100，单调不减）
    pub fn with_progress<F>(mut self, sink: F) -> Self
    where
        F: Fn(u32) + Send + Sync + 'static,
    {
        self.progress_sink = Some(Box::new(sink));
        self
    }

    /// 协作式取消句柄，只在条目/批次之间检查
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel_flag)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::Relaxed)
    }

    fn report_progress(&self, completed: usize, total: usize) {
        if let Some(sink) = &self.progress_sink {
            let percent = (completed * 100 / total.max(1)) as u32;
            sink(percent.min(100));
        }
    }

    /// 对字典文件运行完整的翻译流程
    ///
    /// 熔断触发时返回错误，但此前所有检查点进度都已在盘上。
    pub async fn run(&self, dict_path: &Path) -> Result<PipelineReport, ModError> {
        let mut dict = Dictionary::load(dict_path)?;
        let mut states = vec![EntryState::Untranslated; dict.len()];

        // 标记不需要翻译和续跑时已完成的条目
        for (i, entry) in dict.entries.iter().enumerate() {
            if !should_translate(&entry.original) {
                states[i] = EntryState::Skipped;
            } else if entry.is_translated() {
                states[i] = EntryState::Translated;
            }
        }

        info!(
            "开始翻译 {:?}: {} 条，提供方 {}",
            dict_path,
            dict.len(),
            self.provider.name()
        );

        if self.provider.supports_batch() {
            self.run_batch_pass(dict_path, &mut dict, &mut states).await?;
        } else {
            self.run_single_pass(dict_path, &mut dict, &mut states).await?;
        }

        if !self.is_cancelled() {
            self.run_smart_retry_pass(dict_path, &mut dict, &mut states).await?;
        }

        dict.save(dict_path)?;
        self.report_progress(dict.len(), dict.len());

        let report = self.build_report(&dict, &states);
        self.write_failed_report(dict_path, &dict, &states)?;

        info!(
            "翻译结束: {} 成功 / {} 跳过 / {} 失败",
            report.translated, report.skipped, report.failed + report.terminal
        );
        Ok(report)
    }

    /// 逐条翻译主阶段
    async fn run_single_pass(
        &self,
        dict_path: &Path,
        dict: &mut Dictionary,
        states: &mut [EntryState],
    ) -> Result<(), ModError> {
        let total = dict.len();
        let mut consecutive_failures = 0usize;
        let mut since_checkpoint = 0usize;

        for index in 0..total {
            if self.is_cancelled() {
                break;
            }

            if states[index] != EntryState::Untranslated {
                self.report_progress(index + 1, total);
                continue;
            }

            let original = dict.entries[index].original.clone();
            match self.translate_entry(&original).await {
                EntryOutcome::Success(text) => {
                    dict.entries[index].translated = text;
                    states[index] = EntryState::Translated;
                    consecutive_failures = 0;
                }
                EntryOutcome::Exhausted(best) => {
                    // 保留最好的候选，补翻阶段还有机会改进
                    if let Some(candidate) = best {
                        dict.entries[index].translated = candidate;
                    }
                    states[index] = EntryState::FailedRetryable;
                    consecutive_failures += 1;
                }
                EntryOutcome::Terminal(err) => {
                    warn!("条目 {} 终止: {}", dict.entries[index].key, err);
                    states[index] = EntryState::FailedTerminal;
                    consecutive_failures += 1;
                }
            }

            since_checkpoint += 1;
            if since_checkpoint >= self.config.checkpoint_interval {
                dict.save(dict_path)?;
                since_checkpoint = 0;
                debug!("检查点已写入 ({}/{})", index + 1, total);
            }
            self.report_progress(index + 1, total);

            if consecutive_failures >= self.config.failure_threshold {
                dict.save(dict_path)?;
                return Err(ModError::TooManyFailures(consecutive_failures));
            }

            if !self.config.throttle.is_zero() {
                tokio::time::sleep(self.config.throttle).await;
            }
        }

        dict.save(dict_path)?;
        Ok(())
    }

    /// 批量翻译主阶段
    async fn run_batch_pass(
        &self,
        dict_path: &Path,
        dict: &mut Dictionary,
        states: &mut [EntryState],
    ) -> Result<(), ModError> {
        let total = dict.len();
        let pending: Vec<usize> = (0..total)
            .filter(|&i| states[i] == EntryState::Untranslated)
            .collect();

        let mut completed = total - pending.len();
        let mut consecutive_failures = 0usize;
        let mut since_checkpoint = 0usize;

        for chunk in pending.chunks(self.config.batch_size.max(1)) {
            if self.is_cancelled() {
                break;
            }

            let texts: Vec<String> = chunk
                .iter()
                .map(|&i| dict.entries[i].original.clone())
                .collect();

            match self.translate_chunk(&texts).await {
                Ok(results) => {
                    let results = normalize_batch(&texts, results);
                    let mut any_success = false;

                    for (&index, result) in chunk.iter().zip(results.iter()) {
                        let entry = &mut dict.entries[index];
                        if is_valid_translation(
                            &entry.original,
                            result,
                            &self.config.source_lang,
                            &self.config.target_lang,
                        ) {
                            entry.translated = result.clone();
                            states[index] = EntryState::Translated;
                            any_success = true;
                        } else {
                            states[index] = EntryState::FailedRetryable;
                        }
                    }

                    if any_success {
                        consecutive_failures = 0;
                    } else {
                        consecutive_failures += 1;
                    }
                }
                Err(err @ ProviderError::Forbidden(_)) => {
                    warn!("批次终止: {}", err);
                    for &index in chunk {
                        states[index] = EntryState::FailedTerminal;
                    }
                    consecutive_failures += 1;
                }
                Err(err) => {
                    warn!("批次失败: {}", err);
                    for &index in chunk {
                        states[index] = EntryState::FailedRetryable;
                    }
                    consecutive_failures += 1;
                }
            }

            completed += chunk.len();
            since_checkpoint += chunk.len();
            if since_checkpoint >= self.config.checkpoint_interval {
                dict.save(dict_path)?;
                since_checkpoint = 0;
            }
            self.report_progress(completed, total);

            if consecutive_failures >= self.config.failure_threshold {
                dict.save(dict_path)?;
                return Err(ModError::TooManyFailures(consecutive_failures));
            }

            if !self.config.throttle.is_zero() {
                tokio::time::sleep(self.config.throttle).await;
            }
        }

        dict.save(dict_path)?;
        Ok(())
    }

    /// 补翻阶段：严格校验不过的条目再试一轮
    async fn run_smart_retry_pass(
        &self,
        dict_path: &Path,
        dict: &mut Dictionary,
        states: &mut [EntryState],
    ) -> Result<(), ModError> {
        let candidates: Vec<usize> = (0..dict.len())
            .filter(|&i| {
                !matches!(states[i], EntryState::Skipped | EntryState::FailedTerminal)
                    && !is_strictly_valid_translation(
                        &dict.entries[i].original,
                        &dict.entries[i].translated,
                        &self.config.source_lang,
                        &self.config.target_lang,
                    )
            })
            .collect();

        if candidates.is_empty() {
            return Ok(());
        }

        if candidates.len() > self.config.smart_retry_limit {
            warn!(
                "补翻候选 {} 条，超出上限 {}，只处理前一部分",
                candidates.len(),
                self.config.smart_retry_limit
            );
        }
        let candidates: Vec<usize> = candidates
            .into_iter()
            .take(self.config.smart_retry_limit)
            .collect();

        if candidates.is_empty() {
            return Ok(());
        }
        info!("补翻阶段: {} 条", candidates.len());

        if self.provider.supports_batch() {
            for chunk in candidates.chunks(self.config.batch_size.max(1)) {
                if self.is_cancelled() {
                    break;
                }

                let texts: Vec<String> = chunk
                    .iter()
                    .map(|&i| dict.entries[i].original.clone())
                    .collect();

                match self
                    .provider
                    .translate_batch(&texts, &self.config.source_lang, &self.config.target_lang)
                    .await
                {
                    Ok(results) => {
                        let results = normalize_batch(&texts, results);
                        for (&index, result) in chunk.iter().zip(results.iter()) {
                            self.apply_strict_result(dict, states, index, result);
                        }
                    }
                    Err(err) => warn!("补翻批次失败: {}", err),
                }
            }
        } else {
            for &index in &candidates {
                if self.is_cancelled() {
                    break;
                }

                let original = dict.entries[index].original.clone();
                match self
                    .provider
                    .translate(&original, &self.config.source_lang, &self.config.target_lang)
                    .await
                {
                    Ok(result) => self.apply_strict_result(dict, states, index, &result),
                    Err(err) => warn!("补翻条目 {} 失败: {}", dict.entries[index].key, err),
                }

                if !self.config.throttle.is_zero() {
                    tokio::time::sleep(self.config.throttle).await;
                }
            }
        }

        dict.save(dict_path)?;
        Ok(())
    }

    /// 补翻结果用严格校验把关
    fn apply_strict_result(
        &self,
        dict: &mut Dictionary,
        states: &mut [EntryState],
        index: usize,
        result: &str,
    ) {
        let entry = &mut dict.entries[index];
        if is_strictly_valid_translation(
            &entry.original,
            result,
            &self.config.source_lang,
            &self.config.target_lang,
        ) {
            entry.translated = result.to_string();
            states[index] = EntryState::Translated;
        } else if states[index] == EntryState::Translated {
            // 主阶段的结果没通过严格校验，降级为失败待查
            states[index] = EntryState::FailedRetryable;
        }
    }

    /// 带重试的单条目翻译
    async fn translate_entry(&self, original: &str) -> EntryOutcome {
        let mut best: Option<String> = None;

        for attempt in 1..=self.config.max_attempts.max(1) {
            match self
                .provider
                .translate(original, &self.config.source_lang, &self.config.target_lang)
                .await
            {
                Ok(candidate) => {
                    if is_valid_translation(
                        original,
                        &candidate,
                        &self.config.source_lang,
                        &self.config.target_lang,
                    ) {
                        return EntryOutcome::Success(candidate);
                    }

                    // 记住最长的非原样候选
                    let trimmed = candidate.trim();
                    if !trimmed.is_empty()
                        && trimmed != original.trim()
                        && best.as_ref().map_or(true, |b| candidate.len() > b.len())
                    {
                        best = Some(candidate);
                    }

                    if attempt < self.config.max_attempts {
                        tokio::time::sleep(invalid_backoff(attempt)).await;
                    }
                }
                Err(ProviderError::RateLimited(reason)) => {
                    debug!("限流 (第{}次): {}", attempt, reason);
                    if attempt < self.config.max_attempts {
                        tokio::time::sleep(rate_limit_backoff(attempt)).await;
                    }
                }
                Err(err @ ProviderError::Forbidden(_)) => {
                    return EntryOutcome::Terminal(err);
                }
                Err(ProviderError::Failed(reason)) => {
                    debug!("请求失败 (第{}次): {}", attempt, reason);
                    if attempt < self.config.max_attempts {
                        tokio::time::sleep(invalid_backoff(attempt)).await;
                    }
                }
            }
        }

        EntryOutcome::Exhausted(best)
    }

    /// 带重试的批次调用
    async fn translate_chunk(&self, texts: &[String]) -> Result<Vec<String>, ProviderError> {
        let mut last_err = ProviderError::Failed("batch translation failed".to_string());

        for attempt in 1..=self.config.max_attempts.max(1) {
            match self
                .provider
                .translate_batch(texts, &self.config.source_lang, &self.config.target_lang)
                .await
            {
                Ok(results) => return Ok(results),
                Err(ProviderError::RateLimited(reason)) => {
                    debug!("批次限流 (第{}次): {}", attempt, reason);
                    last_err = ProviderError::RateLimited(reason);
                    if attempt < self.config.max_attempts {
                        tokio::time::sleep(rate_limit_backoff(attempt)).await;
                    }
                }
                Err(err @ ProviderError::Forbidden(_)) => return Err(err),
                Err(ProviderError::Failed(reason)) => {
                    debug!("批次失败 (第{}次): {}", attempt, reason);
                    last_err = ProviderError::Failed(reason);
                    if attempt < self.config.max_attempts {
                        tokio::time::sleep(invalid_backoff(attempt)).await;
                    }
                }
            }
        }

        Err(last_err)
    }

    fn build_report(&self, dict: &Dictionary, states: &[EntryState]) -> PipelineReport {
        let mut report = PipelineReport {
            total: dict.len(),
            cancelled: self.is_cancelled(),
            ..Default::default()
        };

        for (i, state) in states.iter().enumerate() {
            match state {
                EntryState::Translated => report.translated += 1,
                EntryState::Skipped => report.skipped += 1,
                EntryState::FailedTerminal => {
                    report.terminal += 1;
                    report.failed_keys.push(dict.entries[i].key.clone());
                }
                EntryState::FailedRetryable | EntryState::Untranslated => {
                    report.failed += 1;
                    report.failed_keys.push(dict.entries[i].key.clone());
                }
            }
        }

        report
    }

    /// 把失败条目写成旁路报告文件
    fn write_failed_report(
        &self,
        dict_path: &Path,
        dict: &Dictionary,
        states: &[EntryState],
    ) -> Result<(), ModError> {
        let failed: Vec<&str> = states
            .iter()
            .enumerate()
            .filter(|(_, s)| {
                matches!(s, EntryState::FailedRetryable | EntryState::FailedTerminal)
            })
            .map(|(i, _)| dict.entries[i].original.as_str())
            .collect();

        if failed.is_empty() {
            return Ok(());
        }

        let mut content = format!(
            "# 翻译失败条目 {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        for original in failed {
            content.push_str(original);
            content.push('\n');
        }

        std::fs::write(dict_path.with_extension("failed.txt"), content)?;
        Ok(())
    }
}

/// 对齐批量结果数量：少了用原文补齐，多了截断
fn normalize_batch(texts: &[String], mut results: Vec<String>) -> Vec<String> {
    if results.len() != texts.len() {
        warn!(
            "批量翻译数量不一致: 发送 {} 条，返回 {} 条",
            texts.len(),
            results.len()
        );

        if results.len() > texts.len() {
            results.truncate(texts.len());
        } else {
            for text in &texts[results.len()..] {
                results.push(text.clone());
            }
        }
    }

    results
}
