//! Binding target handed to services for the RPC transport.

use std::convert::Infallible;

use axum::http::Request;
use axum::response::IntoResponse;
use axum::Router;
use tonic::body::Body;
use tonic::server::NamedService;
use tonic::service::RoutesBuilder;
use tonic_reflection::server::{Builder as ReflectionBuilder, Error as ReflectionError};
use tower_http::trace::TraceLayer;

/// Collects gRPC services before the RPC transport starts.
#[derive(Default)]
pub struct RpcRegistrar {
    routes: RoutesBuilder,
    names: Vec<&'static str>,
    descriptors: Vec<&'static [u8]>,
}

impl RpcRegistrar {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a generated tonic server (e.g. `GreeterServer::new(svc)`).
    pub fn add_service<S>(&mut self, svc: S) -> &mut Self
    where
        S: tower::Service<Request<Body>, Error = Infallible>
            + NamedService
            + Clone
            + Send
            + Sync
            + 'static,
        S::Response: IntoResponse,
        S::Future: Send + 'static,
    {
        tracing::debug!(rpc_service = S::NAME, "RPC service registered");
        self.names.push(S::NAME);
        self.routes.add_service(svc);
        self
    }

    /// Publish an encoded `FileDescriptorSet` through server reflection.
    pub fn add_file_descriptor_set(&mut self, encoded: &'static [u8]) -> &mut Self {
        self.descriptors.push(encoded);
        self
    }

    /// Fully-qualified names of the registered gRPC services.
    pub fn service_names(&self) -> &[&'static str] {
        &self.names
    }

    /// Consume the registrar into the router served by the RPC transport.
    ///
    /// With `reflection`, the v1 and v1alpha reflection services are added,
    /// describing every registered descriptor set.
    pub fn into_router(mut self, reflection: bool) -> Result<Router, ReflectionError> {
        if reflection {
            let v1 = self.reflection().build_v1()?;
            let v1alpha = self.reflection().build_v1alpha()?;
            self.add_service(v1);
            self.add_service(v1alpha);
        }
        Ok(self
            .routes
            .routes()
            .into_axum_router()
            .layer(TraceLayer::new_for_grpc()))
    }

    fn reflection(&self) -> ReflectionBuilder<'static> {
        self.descriptors
            .iter()
            .copied()
            .fold(ReflectionBuilder::configure(), |builder, set| {
                builder.register_encoded_file_descriptor_set(set)
            })
    }
}
