/// The service's coarse lifecycle state. Transitions are one-directional
/// except the final SERVING → STOPPING → STOPPED path; any failure
/// before SERVING moves to FAILED and stays there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceState {
    New,
    Configuring,
    Bringup,
    Loading,
    Serving,
    Stopping,
    Stopped,
    Failed,
}
