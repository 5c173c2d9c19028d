use snafu::Snafu;

pub type TransportResult<T> = Result<T, TransportError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TransportError {
    #[snafu(display("failed to build http client on `{stage}`: {source}"))]
    BuildClient {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("invalid agent url '{url}' on `{stage}`: {source}"))]
    InvalidUrl {
        stage: &'static str,
        url: String,
        source: url::ParseError,
    },
    #[snafu(display("request to {endpoint} failed on `{stage}`: {source}"))]
    Request {
        stage: &'static str,
        endpoint: String,
        source: reqwest::Error,
    },
    #[snafu(display("{endpoint} returned status {status}: {body}"))]
    Status {
        stage: &'static str,
        endpoint: String,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to decode {endpoint} response on `{stage}`: {source}"))]
    Decode {
        stage: &'static str,
        endpoint: String,
        source: serde_json::Error,
    },
    #[snafu(display("malformed {endpoint} reply: {details}"))]
    MalformedReply {
        stage: &'static str,
        endpoint: String,
        details: String,
    },
    #[snafu(display("failed to encode request payload on `{stage}`: {source}"))]
    Encode {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("upload mime type '{mime}' is invalid: {source}"))]
    InvalidMime {
        stage: &'static str,
        mime: String,
        source: reqwest::Error,
    },
}

impl TransportError {
    /// Returns the pipeline stage that produced this error.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::BuildClient { stage, .. }
            | Self::InvalidUrl { stage, .. }
            | Self::Request { stage, .. }
            | Self::Status { stage, .. }
            | Self::Decode { stage, .. }
            | Self::MalformedReply { stage, .. }
            | Self::Encode { stage, .. }
            | Self::InvalidMime { stage, .. } => stage,
        }
    }

    /// True for failures that happened before a usable response arrived.
    pub fn is_network_failure(&self) -> bool {
        matches!(self, Self::Request { .. } | Self::Status { .. })
    }

    /// True when the server answered but the body did not match the contract.
    pub fn is_malformed_response(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::MalformedReply { .. })
    }
}
