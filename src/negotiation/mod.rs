//! Format and parameter negotiation.
//!
//! # Responsibilities
//! - Merge parameters from query string, `X-YT-Parameters` and POST body
//! - Pick input and output formats from override headers, MIME headers or defaults
//! - Reject format names the engine does not know
//!
//! # Data Flow
//! ```text
//! parameters:    query  <  X-YT-Parameters  <  POST body     (later wins per key)
//! input format:  X-YT-Input-Format  →  Content-Type  →  default for input type
//! output format: X-YT-Output-Format →  Accept        →  default for output type
//! ```
//!
//! # Design Decisions
//! - A direction whose data type is `none` skips MIME inference
//! - An output override header suppresses the response `Content-Type`

pub mod parameters;

use axum::http::HeaderMap;
use thiserror::Error;

use crate::engine::{CommandDescriptor, DataType, Engine};
use crate::format::{self, Format, FormatError, MimeError};
use crate::tree::{self, DecodeError, Tree};

pub const PARAMETERS_HEADER: &str = "x-yt-parameters";
pub const INPUT_FORMAT_HEADER: &str = "x-yt-input-format";
pub const OUTPUT_FORMAT_HEADER: &str = "x-yt-output-format";

/// The parts of a request negotiation looks at.
#[derive(Debug, Clone, Copy)]
pub struct RequestView<'a> {
    pub query: Option<&'a str>,
    pub headers: &'a HeaderMap,
    /// Fully read body, present for POST commands only.
    pub body: Option<&'a [u8]>,
}

/// Outcome of a successful negotiation.
#[derive(Debug, Clone, PartialEq)]
pub struct Negotiated {
    pub input_format: Format,
    pub output_format: Format,
    /// `Content-Type` for the response, if any.
    pub output_mime: Option<&'static str>,
    pub parameters: Tree,
}

/// Client input problems found during negotiation.
#[derive(Debug, Error)]
pub enum NegotiationError {
    #[error("header {0} is not valid text")]
    InvalidHeader(&'static str),

    #[error("unable to parse {header} header")]
    MalformedFormat {
        header: &'static str,
        #[source]
        source: FormatError,
    },

    #[error("unable to parse parameters from {origin}")]
    MalformedParameters {
        origin: &'static str,
        #[source]
        source: DecodeError,
    },

    #[error(transparent)]
    Mime(#[from] MimeError),

    #[error("format {0:?} is not registered")]
    UnknownFormat(String),
}

/// Negotiate formats and parameters for one command request.
pub fn negotiate(
    descriptor: &CommandDescriptor,
    request: RequestView<'_>,
    engine: &dyn Engine,
) -> Result<Negotiated, NegotiationError> {
    let parameters = negotiate_parameters(request)?;

    let input_format = match override_format(request.headers, INPUT_FORMAT_HEADER)? {
        Some(format) => format,
        None => infer_input_format(descriptor.input_type, request.headers)?,
    };

    let (output_format, output_mime) = match override_format(request.headers, OUTPUT_FORMAT_HEADER)? {
        Some(format) => (format, None),
        None => infer_output_format(descriptor.output_type, request.headers)?,
    };

    for format in [&input_format, &output_format] {
        if !engine.is_format_registered(format.name()) {
            return Err(NegotiationError::UnknownFormat(format.name().to_string()));
        }
    }

    Ok(Negotiated {
        input_format,
        output_format,
        output_mime,
        parameters,
    })
}

fn negotiate_parameters(request: RequestView<'_>) -> Result<Tree, NegotiationError> {
    let from_query = request.query.map(parameters::from_query).unwrap_or_default();

    let from_header = match request.headers.get(PARAMETERS_HEADER) {
        Some(value) => parameters::from_header(value.as_bytes()).map_err(|source| {
            NegotiationError::MalformedParameters {
                origin: "X-YT-Parameters header",
                source,
            }
        })?,
        None => Tree::new(),
    };

    let from_body = match request.body {
        Some(body) => parameters::from_body(body).map_err(|source| {
            NegotiationError::MalformedParameters {
                origin: "request body",
                source,
            }
        })?,
        None => Tree::new(),
    };

    Ok(tree::merge([from_query, from_header, from_body]))
}

fn header_text<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<Option<&'a str>, NegotiationError> {
    headers
        .get(name)
        .map(|value| value.to_str().map_err(|_| NegotiationError::InvalidHeader(name)))
        .transpose()
}

fn override_format(headers: &HeaderMap, header: &'static str) -> Result<Option<Format>, NegotiationError> {
    header_text(headers, header)?
        .map(|text| Format::parse(text).map_err(|source| NegotiationError::MalformedFormat { header, source }))
        .transpose()
}

fn infer_input_format(data_type: DataType, headers: &HeaderMap) -> Result<Format, NegotiationError> {
    let (default, _) = Format::default_for(data_type);
    if data_type == DataType::None {
        return Ok(default);
    }
    match header_text(headers, "content-type")? {
        Some(content_type) => Ok(format::format_for_content_type(content_type)?),
        None => Ok(default),
    }
}

fn infer_output_format(
    data_type: DataType,
    headers: &HeaderMap,
) -> Result<(Format, Option<&'static str>), NegotiationError> {
    let default = Format::default_for(data_type);
    if data_type == DataType::None {
        return Ok(default);
    }
    match header_text(headers, "accept")? {
        Some(accept) => Ok(format::negotiate_accept(accept)?
            .map(|(format, mime)| (format, Some(mime)))
            .unwrap_or(default)),
        None => Ok(default),
    }
}
