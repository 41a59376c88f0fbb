//! OpenAPI documentation.

use utoipa::OpenApi;

use crate::error::ErrorResponse;
use crate::handlers;
use ferry_core::{ChunkReceipt, FileInfo, SessionStatus, SweepReport};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Ferry API",
        version = "0.1.0",
        description = "Ephemeral file sharing: chunked uploads assembled exactly once, optional access codes, time-limited downloads."
    ),
    paths(
        handlers::upload::upload_chunk,
        handlers::download::download_file,
        handlers::files::verify_access,
        handlers::files::file_info,
        handlers::cleanup::cleanup_all,
        handlers::cleanup::cleanup_expired,
        handlers::cleanup::cleanup_temp,
        handlers::health::health_check,
    ),
    components(schemas(
        ErrorResponse,
        ChunkReceipt,
        FileInfo,
        SessionStatus,
        SweepReport,
        handlers::upload::UploadChunkResponse,
        handlers::files::VerifyRequest,
        handlers::files::VerifyResponse,
        handlers::cleanup::CleanupResponse,
        handlers::health::HealthResponse,
    )),
    tags(
        (name = "uploads", description = "Chunked upload intake"),
        (name = "files", description = "Download and file information"),
        (name = "cleanup", description = "Admin-triggered retention sweeps"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;
