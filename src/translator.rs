use async_trait::async_trait;

use crate::utils::ProviderError;

/// 翻译服务的抽象接口
///
/// 具体的服务客户端（HTTP API等）由调用方注入，本库只消费该能力。
/// 实现方应把服务端错误归类为限流/鉴权/一般失败三类，
/// 流水线据此选择退避重试还是立即终止。
#[async_trait]
pub trait TranslationProvider: Send + Sync {
    /// 服务名（用于日志和报告）
    fn name(&self) -> &str;

    /// 翻译一段文本
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
    ) -> Result<String, ProviderError>;

    /// 是否支持批量接口
    fn supports_batch(&self) -> bool {
        false
    }

    /// 批量翻译，返回列表应与输入等长
    ///
    /// 默认实现退化为逐条调用。
    async fn translate_batch(
        &self,
        texts: &[String],
        source_lang: &str,
        target_lang: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.translate(text, source_lang, target_lang).await?);
        }
        Ok(results)
    }
}
