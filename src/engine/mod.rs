// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod dispatcher;
pub mod node;
pub mod service;
pub mod state;
pub mod status_handler;

pub use dispatcher::{publish_with_retry, Dispatcher};
pub use node::LocalNode;
pub use service::ControlPlane;
pub use status_handler::StatusHandler;
