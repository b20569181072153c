//! Line-delimited JSON protocol: one request object per line in, one response
//! object per line out, in order.

use std::io;
use std::sync::Arc;
use std::time::Instant;

use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LinesCodec, LinesCodecError};
use tracing::{debug, warn};

use crate::engine::EngineError;
use crate::limits::MAX_FRAME_LEN;
use crate::model::*;
use crate::observability::{self, REQUESTS_TOTAL, REQUEST_DURATION_SECONDS};
use crate::service::{Placement, PlacementRequest, ReservationService};
use crate::snapshot::ReservationRecord;

/// Every request may carry its own catalog; otherwise the server default applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Reserve {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        catalog: Option<Vec<CatalogEntry>>,
        document: Value,
    },
    Optimize {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        catalog: Option<Vec<CatalogEntry>>,
        document: Value,
    },
    Place {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        catalog: Option<Vec<CatalogEntry>>,
        #[serde(default)]
        reservations: Vec<ReservationRecord>,
        request: PlacementRequest,
    },
    Defragment {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        catalog: Option<Vec<CatalogEntry>>,
        #[serde(default)]
        reservations: Vec<ReservationRecord>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Response {
    Reserved {
        document: Value,
        placements: Vec<Placement>,
    },
    Optimized {
        document: Value,
        gap_before: Minutes,
        gap_after: Minutes,
        unassigned: Vec<String>,
    },
    Placement {
        resource: Option<String>,
        reservations: Vec<ReservationRecord>,
    },
    Timetable {
        reservations: Vec<ReservationRecord>,
    },
    Error {
        message: String,
    },
}

/// Run one request to completion against a fresh service.
pub fn handle_request(request: Request, default_catalog: &[CatalogEntry]) -> Response {
    let op = observability::op_label(&request);
    let started = Instant::now();
    let result = execute(request, default_catalog);

    let status = if result.is_ok() { "ok" } else { "error" };
    metrics::counter!(REQUESTS_TOTAL, "op" => op, "status" => status).increment(1);
    metrics::histogram!(REQUEST_DURATION_SECONDS, "op" => op)
        .record(started.elapsed().as_secs_f64());

    result.unwrap_or_else(|e| {
        warn!(op, "request rejected: {e}");
        Response::Error {
            message: e.to_string(),
        }
    })
}

fn execute(request: Request, default_catalog: &[CatalogEntry]) -> Result<Response, EngineError> {
    let service_for =
        |catalog: Option<Vec<CatalogEntry>>| ReservationService::new(catalog.unwrap_or_else(|| default_catalog.to_vec()));

    match request {
        Request::Reserve { catalog, document } => {
            let outcome = service_for(catalog).reserve(document)?;
            Ok(Response::Reserved {
                document: outcome.document,
                placements: outcome.placements,
            })
        }
        Request::Optimize { catalog, document } => {
            let outcome = service_for(catalog).optimize(document)?;
            Ok(Response::Optimized {
                document: outcome.document,
                gap_before: outcome.gap_before,
                gap_after: outcome.gap_after,
                unassigned: outcome.unassigned,
            })
        }
        Request::Place {
            catalog,
            reservations,
            request,
        } => {
            let (resource, reservations) = service_for(catalog).place(reservations, request)?;
            Ok(Response::Placement {
                resource,
                reservations,
            })
        }
        Request::Defragment {
            catalog,
            reservations,
        } => {
            let reservations = service_for(catalog).defragment(reservations)?;
            Ok(Response::Timetable { reservations })
        }
    }
}

fn codec_err(e: LinesCodecError) -> io::Error {
    match e {
        LinesCodecError::Io(e) => e,
        other => io::Error::other(other),
    }
}

/// Serve one client until it hangs up. Bad frames get an error response and
/// the connection stays open.
pub async fn process_connection(
    socket: TcpStream,
    default_catalog: Arc<Vec<CatalogEntry>>,
) -> io::Result<()> {
    let mut framed = Framed::new(socket, LinesCodec::new_with_max_length(MAX_FRAME_LEN));

    while let Some(frame) = framed.next().await {
        let response = match frame {
            Ok(line) if line.trim().is_empty() => continue,
            Ok(line) => match serde_json::from_str::<Request>(&line) {
                Ok(request) => {
                    debug!(op = observability::op_label(&request), "request");
                    let catalog = default_catalog.clone();
                    // Placement and repacking are CPU-bound; keep them off the reactor.
                    tokio::task::spawn_blocking(move || handle_request(request, &catalog))
                        .await
                        .map_err(io::Error::other)?
                }
                Err(e) => {
                    warn!("unparsable frame: {e}");
                    Response::Error {
                        message: EngineError::MalformedInput(e.to_string()).to_string(),
                    }
                }
            },
            Err(LinesCodecError::MaxLineLengthExceeded) => {
                warn!("frame over {MAX_FRAME_LEN} bytes dropped");
                Response::Error {
                    message: EngineError::LimitExceeded("frame too large").to_string(),
                }
            }
            Err(e) => return Err(codec_err(e)),
        };

        let encoded = serde_json::to_string(&response).map_err(io::Error::other)?;
        framed.send(encoded).await.map_err(codec_err)?;
    }
    Ok(())
}
