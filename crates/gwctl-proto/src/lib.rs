//! Generated gRPC bindings for `gwctl`'s inbound and outbound services.
//!
//! `node_management` is the inbound service nodes dial in to (port 50051);
//! `fastrg` is the outbound scrape service the control plane dials out to on
//! each node (port 50052). See the `.proto` sources under `proto/` for the
//! wire contract.

pub mod gwctl {
    pub mod nodemgmt {
        pub mod v1 {
            tonic::include_proto!("gwctl.nodemgmt.v1");
        }
    }
    pub mod fastrg {
        pub mod v1 {
            tonic::include_proto!("gwctl.fastrg.v1");
        }
    }
}

pub use gwctl::nodemgmt::v1 as node_management;
pub use gwctl::fastrg::v1 as fastrg;
