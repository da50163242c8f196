//! Inbound gRPC service (port 50051, spec §6): `NodeManagement`.
//!
//! Thin translation layer over [`gwctl_core::node_registry::NodeRegistry`] —
//! every RPC maps directly to one registry call and a taxonomy of tonic
//! status codes.

use std::sync::Arc;

use gwctl_core::error::RegistryError;
use gwctl_core::node_registry::NodeRegistry;
use gwctl_proto::node_management::node_management_server::NodeManagement;
use gwctl_proto::node_management::{
    Empty, HeartbeatRequest, RegisterNodeReply, RegisterNodeRequest, UnregisterNodeRequest,
};
use gwctl_store::StoreAdapter;
use tonic::{Request, Response, Status};

pub struct NodeManagementService<S: StoreAdapter> {
    registry: Arc<NodeRegistry<S>>,
}

impl<S: StoreAdapter> NodeManagementService<S> {
    pub fn new(registry: Arc<NodeRegistry<S>>) -> Self {
        Self { registry }
    }
}

fn status_for(err: RegistryError) -> Status {
    match err {
        RegistryError::NotRegistered { uuid } => Status::not_found(format!("node not registered: {uuid}")),
        RegistryError::Malformed { reason } => Status::invalid_argument(reason),
        RegistryError::Store(e) => Status::unavailable(e.to_string()),
    }
}

#[tonic::async_trait]
impl<S: StoreAdapter> NodeManagement for NodeManagementService<S> {
    async fn register_node(
        &self,
        request: Request<RegisterNodeRequest>,
    ) -> Result<Response<RegisterNodeReply>, Status> {
        let req = request.into_inner();
        match self.registry.register(&req.uuid, &req.ip, &req.version).await {
            Ok(()) => Ok(Response::new(RegisterNodeReply { success: true, message: "registered".to_string() })),
            Err(e) => Ok(Response::new(RegisterNodeReply { success: false, message: e.to_string() })),
        }
    }

    async fn unregister_node(&self, request: Request<UnregisterNodeRequest>) -> Result<Response<Empty>, Status> {
        let req = request.into_inner();
        self.registry.unregister(&req.uuid).await.map_err(status_for)?;
        Ok(Response::new(Empty {}))
    }

    async fn heartbeat(&self, request: Request<HeartbeatRequest>) -> Result<Response<Empty>, Status> {
        let req = request.into_inner();
        self.registry.heartbeat(&req.uuid, &req.node_ip, req.uptime_seconds).await.map_err(status_for)?;
        Ok(Response::new(Empty {}))
    }
}
