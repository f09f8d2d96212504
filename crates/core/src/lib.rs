//! Message distribution engine for corvid.
//!
//! This crate decouples the synchronous request-serving path from slow,
//! failure-prone side-effect processing. The client API and the inbound
//! federation handler fire [`Activity`] values into the [`Processor`] and
//! return immediately; the processor drains its two inbound queues
//! asynchronously, routes each activity to the matching side-effect handler,
//! and hands remote fan-out work to the delivery scheduler via the
//! [`services::ActivityDelivery`] capability.
//!
//! - **Activity model**: [`activity`], entity + verb + actor, pure data
//! - **Handlers**: [`handlers`], one per (origin, entity kind, verb)
//! - **Processor**: [`processor`], queues, dispatch loop, lifecycle
//! - **Capabilities**: [`services`], storage, notifications, delivery

pub mod activity;
pub mod handlers;
pub mod model;
pub mod payload;
pub mod processor;
pub mod services;

pub use activity::{Activity, ActivityOrigin, ActivityVerb, EntityKind};
pub use handlers::{HandlerContext, HandlerRegistry, SideEffectHandler};
pub use processor::{Processor, ProcessorState};
