use snafu::Snafu;

/// Run configuration problems, all detected before the first request.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display(
        "Exactly one execution discipline must be selected (concurrency={}, throughput={})",
        concurrency,
        throughput
    ))]
    ConflictingDiscipline { concurrency: bool, throughput: bool },

    #[snafu(display("Invalid pressure: {}", details))]
    InvalidPressure { details: String },

    #[snafu(display("No pressure could be built from the given arguments"))]
    MissingPressure,

    #[snafu(display("Failed to build HTTP client: {}", source))]
    BuildClient { source: reqwest::Error },
}
