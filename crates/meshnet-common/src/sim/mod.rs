//! In-memory collaborators.
//!
//! Every type here is a cheap handle onto shared state (`Rc<RefCell<_>>`), so a
//! test or the simulator can keep one clone for inspection and hand another to
//! the firmware. All of them are single-threaded by construction; the runner
//! drives every device from one cooperative loop.

mod clock;
mod hardware;
mod mesh;
mod serial;

pub use clock::ManualClock;
pub use hardware::SimHardware;
pub use mesh::{SimMesh, SimPacket, SimTransport};
pub use serial::SimSerial;
