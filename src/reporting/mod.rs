pub mod metrics;

pub use metrics::{BusinessMetrics, MetricInputs, PipelineMetrics, ProductRevenue, QualityMetrics};
