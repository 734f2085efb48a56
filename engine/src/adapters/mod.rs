//! Driving Adapters Layer
//!
//! Adapters that accept requests from outside and translate them into
//! supervisor operations.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use progd_engine::adapters::grpc;
//! use progd_engine::application::Agent;
//! use progd_engine::domain::AutoStartMode;
//! use progd_engine::infrastructure::TokioProcessExecutor;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), grpc::TransportError> {
//! let agent = Agent::new(Arc::new(TokioProcessExecutor), AutoStartMode::OptIn, "127.0.0.1");
//! let listener = grpc::bind("127.0.0.1:9090").await?;
//! grpc::serve_with_shutdown(listener, agent.control_service(), async {
//!     let _ = tokio::signal::ctrl_c().await;
//! })
//! .await?;
//! # Ok(())
//! # }
//! ```

pub mod grpc;
