pub mod error;
pub mod nvpair;
pub mod types;

pub use error::DomainError;
pub use nvpair::{NameValuePair, NvList, ProtocolPropertiesList};
pub use types::{
    AdminState, Addressable, AutoEvent, CommandDefinition, CookedEvent, Device,
    DeviceCallbackEvent, DeviceDescriptor, DeviceId, DeviceProfile, DeviceSectionConfig,
    DeviceServiceRecord, EffectiveConfig, EndpointConfig, EndpointsConfig, LoggingConfig,
    OperState, ProfileId, ProvisionWatcher, RawReading, ResourceDefinition, ServiceConfig,
    WatcherId,
};
