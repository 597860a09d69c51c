//! Embassy task wrapper for the capture instance loop — hardware target only.
//!
//! Enabled only when `feature = "hardware"` is active (links `embassy-executor`).
//! The pool size matches [`MAX_CAPTURE_INSTANCES`]: the application spawns one
//! task per instance slot at startup.
//!
//! ```ignore
//! let pool: &'static CapturePool = CAPTURE_POOL.init(CapturePool::new());
//! for index in 0..pool.capacity() {
//!     let component = pool.component(index, driver, buffers).unwrap();
//!     spawner.must_spawn(capture_task(component));
//! }
//! ```
//!
//! [`MAX_CAPTURE_INSTANCES`]: crate::pool::MAX_CAPTURE_INSTANCES

use crate::component::CaptureComponent;

/// Run one capture instance's event loop to completion (it never returns).
#[embassy_executor::task(pool_size = crate::pool::MAX_CAPTURE_INSTANCES)]
pub async fn capture_task(component: CaptureComponent) {
    component.run().await;
}
