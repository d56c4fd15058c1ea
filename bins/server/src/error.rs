#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("config ({context}): {detail}")]
    Config { context: &'static str, detail: String },

    #[error("{0}")]
    Pipeline(#[from] pipeline::PipelineError),

    #[error("sink: {0}")]
    Sink(#[from] ingest_api::IngestError),

    #[error("signal: {0}")]
    Signal(#[from] std::io::Error),
}
