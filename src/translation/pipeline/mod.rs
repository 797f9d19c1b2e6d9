//! 文本处理管道
//!
//! - [`fingerprint`]: 文本指纹与待翻译条目
//! - [`batch`]: 缓存优先的批量解析
//! - [`coalescer`]: 单条请求的微批次合并
//! - [`streaming`]: 渐进式交付
//! - [`collector`] / [`filters`]: 从 HTML 中收集可翻译文本

pub mod batch;
pub mod coalescer;
pub mod collector;
pub mod filters;
pub mod fingerprint;
pub mod streaming;

pub use batch::{BatchOutcome, BatchResolver};
pub use coalescer::RequestCoalescer;
pub use collector::{HtmlDocument, TextSegment, TextSource};
pub use filters::TextFilter;
pub use fingerprint::{Fingerprint, TranslatableItem};
pub use streaming::{DeliveryPhase, StreamEvent, StreamedTranslation, StreamingDelivery};
