pub mod datatypes;
pub mod header;
pub mod record;
pub mod modfile;
pub mod dictionary;
pub mod translator;
pub mod pipeline;
pub mod session;
pub mod stats;
pub mod utils;

// 重新导出主要结构
pub use header::ModHeader;
pub use record::{ModInstance, ModRecord};
pub use modfile::{ModFile, RoundTripReport};
pub use dictionary::{translation_progress, DictEntry, Dictionary};
pub use translator::TranslationProvider;
pub use pipeline::{PipelineConfig, PipelineReport, TranslationPipeline};
pub use session::ModSession;
pub use stats::ModStats;
pub use utils::{is_valid_translation, should_translate, ModError, ProviderError};

// 常量定义
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mod"];
