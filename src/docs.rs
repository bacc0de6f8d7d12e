use utoipa::OpenApi;

use crate::common::response::{RpcErrorObject, RpcRequest};
use crate::modules::status::dto::StatusReply;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::modules::status::handler::rpc,
    ),
    components(
        schemas(RpcRequest, RpcErrorObject, StatusReply)
    ),
    tags(
        (name = "Status", description = "Live progress of the running transcode job")
    )
)]
pub struct ApiDoc;
