//! Call negotiation test harness
//!
//! Provides test doubles for the three collaborators of a
//! [`CallController`](remotemedia_duo::CallController):
//! - [`ScriptedTransport`]: presence channel driven by the test, records publishes
//! - [`MockConnectionFactory`]: peer connections that log every call and
//!   refuse ICE candidates before a remote description is set
//! - [`FakeMedia`]: media devices that can be told to fail
//!
//! Multi-controller tests use [`MemoryRoom`](remotemedia_duo::MemoryRoom)
//! instead of the scripted transport.

#![allow(dead_code)]

pub mod media;
pub mod peer;
pub mod transport;

use remotemedia_duo::{CallController, DuoConfig, MemoryRoom, SampleMediaSource};
use std::sync::Arc;

pub use media::FakeMedia;
pub use peer::MockConnectionFactory;
pub use transport::ScriptedTransport;

/// Session name used throughout the tests
pub const ROOM: &str = "presence-room";

/// Initialize test logging (safe to call from every test)
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("info,remotemedia_duo=debug")
        .with_test_writer()
        .try_init();
}

/// Controller wired to scripted collaborators
pub struct ScriptedCall {
    pub controller: CallController,
    pub transport: Arc<ScriptedTransport>,
    pub media: Arc<FakeMedia>,
    pub factory: Arc<MockConnectionFactory>,
}

impl ScriptedCall {
    /// Build a controller with fresh doubles
    pub fn new() -> Self {
        Self::with_factory(Arc::new(MockConnectionFactory::new()))
    }

    /// Build a controller sharing `factory` (to count connections across calls)
    pub fn with_factory(factory: Arc<MockConnectionFactory>) -> Self {
        let transport = Arc::new(ScriptedTransport::new());
        let media = Arc::new(FakeMedia::new());
        let controller = CallController::new(
            DuoConfig::default(),
            transport.clone(),
            media.clone(),
            factory.clone(),
        )
        .unwrap();

        Self {
            controller,
            transport,
            media,
            factory,
        }
    }

    /// Join and settle as the `count`-th member of the session
    pub async fn joined_as(count: usize) -> Self {
        let mut call = Self::new();
        call.controller.join(ROOM).await.unwrap();
        call.transport.subscribed(count);
        call.controller.process_pending().await.unwrap();
        call
    }
}

/// Controller joined to a shared [`MemoryRoom`]
pub async fn room_member(room: &MemoryRoom, factory: Arc<MockConnectionFactory>) -> CallController {
    let mut controller = CallController::new(
        DuoConfig::default(),
        Arc::new(room.transport()),
        Arc::new(SampleMediaSource::new()),
        factory,
    )
    .unwrap();
    controller.join(ROOM).await.unwrap();
    controller
}

/// Let every controller handle what is queued, a few rounds over
///
/// Messages published by one controller are consumed by the others on the
/// next round.
pub async fn settle(controllers: &mut [&mut CallController]) {
    for _ in 0..8 {
        for controller in controllers.iter_mut() {
            let _ = controller.process_pending().await;
        }
    }
}
