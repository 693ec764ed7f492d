use biogate_core::DeviceSettings;
use biogate_network::RelayController;
use std::future::Future;

/// Something that can release the door lock.
///
/// The scan processor only needs this one operation, which keeps it testable
/// without a terminal on the other end.
pub trait DoorRelay: Send + Sync {
    /// Pulse the relay for `seconds`. Resolves `true` on acknowledgment.
    fn unlock(&self, settings: &DeviceSettings, seconds: u8) -> impl Future<Output = bool> + Send;
}

impl DoorRelay for RelayController {
    async fn unlock(&self, settings: &DeviceSettings, seconds: u8) -> bool {
        RelayController::unlock(self, settings, seconds).await
    }
}
