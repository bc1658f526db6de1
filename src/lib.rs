pub mod classification;
pub mod config;
pub mod data_source;
pub mod error;
pub mod estat;
pub mod fuzzy_matcher;
pub mod nowcast;
pub mod period;
pub mod pipeline;
pub mod presets;
pub mod region;
pub mod resolver;
pub mod series;
pub mod summary;

pub use classification::{ClassificationEntry, ClassificationIndex, ClassificationLookup, MatchKind};
pub use config::Settings;
pub use data_source::{fetch_with_timeout, SeriesRequest, StaticSource, StatisticsSource};
pub use error::{NowcastError, Result};
pub use estat::EstatSource;
pub use nowcast::{Confidence, GrowthMethod, NowcastEngine, NowcastResult};
pub use period::{Granularity, Period, PeriodRange};
pub use pipeline::{AnalysisPipeline, AnalysisRequest};
pub use presets::{PresetCatalog, TablePreset};
pub use region::Region;
pub use resolver::{IndustryQuery, IndustryResolver, ResolutionCandidate};
pub use series::{NormalizedSeries, RawPoint, SeriesNormalizer, SeriesPoint};
pub use summary::{Kpis, Report, SummaryAssembler};
